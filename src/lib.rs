//! # CronJob Label Controller
//!
//! A Kubernetes controller that makes sure every CronJob carries a label
//! matching its own name, at all three levels where labels live: the object,
//! its job template, and the job template's pod template.
//!
//! ## Overview
//!
//! 1. **Watching CronJobs** - A watch bridge lists and watches CronJobs and
//!    keeps a local cache of the last observed state per object
//! 2. **Filtering resyncs** - Re-announcements with an unchanged
//!    resourceVersion are dropped before reconciliation
//! 3. **Label reconciliation** - A pure pass over the three label maps adds
//!    the configured key where missing; existing keys are never overwritten
//! 4. **Write-back** - Only objects that actually changed are sent back to
//!    the API server; failed writes are logged and dropped
//!
//! ## Features
//!
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health probes**: HTTP endpoints for liveness and readiness checks
//! - **Graceful shutdown**: Stops cleanly on SIGTERM or ctrl-c

pub mod constants;
pub mod controller;
pub mod labeler;
pub mod metrics;
pub mod server;
pub mod watch;
