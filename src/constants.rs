//! # Constants
//!
//! Shared constants used throughout the controller.

/// Agent name, used in logs and as the clap command name
pub const CONTROLLER_NAME: &str = "cronjob-label-controller";

/// Default label key enforced on CronJobs and their templates
pub const DEFAULT_LABEL_KEY: &str = "cronjob-name";

/// Default worker count hint accepted by the run loop
pub const DEFAULT_WORKERS: usize = 2;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;
