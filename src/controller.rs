//! # Controller
//!
//! Dispatches CronJob notifications and persists corrected objects.
//!
//! ## Flow
//!
//! 1. Block until the informer cache reports its initial sync (or shutdown
//!    fires first, which is fatal to the run)
//! 2. For each notification: adds are always processed; updates are dropped
//!    when the resourceVersion did not change (periodic resync echo)
//! 3. Run the labeler on the in-memory copy
//! 4. Only if a label was added, write the object back through the update
//!    client
//!
//! A failed write is logged and dropped. No requeue is scheduled: the object
//! stays uncorrected until its next real change triggers another pass.

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::labeler;
use crate::metrics;
use crate::watch::ResourceEvent;

#[derive(Debug, Error)]
pub enum Error {
    /// The informer cache never reported ready before shutdown.
    #[error("failed to wait for caches to sync")]
    CacheSyncFailed,
    /// The watch task went away while the controller was still running.
    #[error("event stream closed before shutdown was requested")]
    EventStreamClosed,
}

/// Remote update client for CronJobs.
///
/// The server checks the object's resourceVersion on write, so a concurrent
/// change surfaces as a conflict error rather than a lost update.
#[async_trait]
pub trait CronJobUpdater: Send + Sync {
    async fn update(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob, kube::Error>;
}

/// [`CronJobUpdater`] backed by the cluster API.
#[derive(Clone)]
pub struct KubeCronJobUpdater {
    client: Client,
}

impl KubeCronJobUpdater {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeCronJobUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCronJobUpdater").finish_non_exhaustive()
    }
}

#[async_trait]
impl CronJobUpdater for KubeCronJobUpdater {
    async fn update(&self, namespace: &str, cron_job: &CronJob) -> Result<CronJob, kube::Error> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        api.replace(&cron_job.name_any(), &PostParams::default(), cron_job)
            .await
    }
}

/// The label controller: event dispatch plus conditional persistence.
#[derive(Debug)]
pub struct Controller<U> {
    updater: U,
    label: String,
}

impl<U: CronJobUpdater> Controller<U> {
    #[must_use]
    pub fn new(updater: U, label: String) -> Self {
        Self { updater, label }
    }

    /// Block until `shutdown` resolves, processing notifications as they
    /// arrive.
    ///
    /// `workers` is accepted but not yet wired to a worker pool; events are
    /// handled one at a time in arrival order.
    ///
    /// # Errors
    ///
    /// [`Error::CacheSyncFailed`] when shutdown fires (or the informer dies)
    /// before the cache finished its initial listing;
    /// [`Error::EventStreamClosed`] when the informer goes away mid-run.
    pub async fn run(
        &self,
        workers: usize,
        mut events: mpsc::UnboundedReceiver<ResourceEvent>,
        mut synced: watch::Receiver<bool>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let mut shutdown = std::pin::pin!(shutdown);

        info!("Waiting for informer caches to sync");
        tokio::select! {
            res = synced.wait_for(|ready| *ready) => {
                if res.is_err() {
                    return Err(Error::CacheSyncFailed);
                }
            }
            () = &mut shutdown => return Err(Error::CacheSyncFailed),
        }

        info!("Caches synced, starting dispatch (worker hint: {workers}, currently unused)");
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => return Err(Error::EventStreamClosed),
                },
            }
        }
    }

    /// Route one notification, dropping resync echoes.
    pub async fn dispatch(&self, event: ResourceEvent) {
        match event {
            ResourceEvent::Added(cron_job) => {
                metrics::record_event("add");
                self.handle_cron_job(cron_job).await;
            }
            ResourceEvent::Updated(old, new) => {
                metrics::record_event("update");
                if old.resource_version() == new.resource_version() {
                    // Periodic resync re-announces every known CronJob. Two
                    // different versions of the same object never share a
                    // resourceVersion.
                    metrics::increment_resyncs_filtered();
                    debug!(
                        "Ignoring resync of CronJob {}/{}",
                        new.namespace().unwrap_or_default(),
                        new.name_any()
                    );
                    return;
                }
                self.handle_cron_job(new).await;
            }
        }
    }

    /// Reconcile one CronJob and persist it when a label was added.
    async fn handle_cron_job(&self, mut cron_job: CronJob) {
        let namespace = cron_job.namespace().unwrap_or_default();
        let name = cron_job.name_any();
        debug!("Processing CronJob {namespace}/{name}");
        metrics::increment_reconciliations();
        let start = Instant::now();

        if labeler::ensure_cron_job_labels(&mut cron_job, &self.label) {
            info!("Adding cronjob label to {namespace}/{name}");
            match self.updater.update(&namespace, &cron_job).await {
                Ok(_) => metrics::increment_updates(),
                Err(err) => {
                    // No requeue: the object stays unlabelled until its next
                    // real change.
                    error!("Error updating CronJob {namespace}/{name}: {err}");
                    metrics::increment_update_errors();
                }
            }
        }

        metrics::observe_reconcile_duration(start.elapsed().as_secs_f64());
    }
}
