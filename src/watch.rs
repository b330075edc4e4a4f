//! # Watch Bridge
//!
//! Watches CronJob resources and maintains a local cache of the last state
//! observed for each object. Raw watch events are folded into typed
//! notifications:
//!
//! - first sight of an object (including the initial listing) -> [`ResourceEvent::Added`]
//! - re-announcement of a cached object -> [`ResourceEvent::Updated`] carrying
//!   the previous and the new state
//!
//! Periodic resyncs re-announce unchanged objects; those surface as `Updated`
//! events with an identical resourceVersion and are filtered downstream by the
//! dispatcher, not here. Deletions only evict the cache entry.
//!
//! Once the initial listing completes, the `synced` flag flips to true. The
//! controller gates its dispatch loop on that flag and the readiness probe
//! reports it.

use std::collections::HashMap;

use futures::{pin_mut, StreamExt};
use k8s_openapi::api::batch::v1::CronJob;
use kube::Api;
use kube_runtime::reflector::ObjectRef;
use kube_runtime::watcher;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Typed add/update notification delivered to the dispatcher.
#[derive(Debug, Clone)]
pub enum ResourceEvent {
    /// Object seen for the first time.
    Added(CronJob),
    /// Object re-announced: `(previous, current)` as observed by the cache.
    Updated(CronJob, CronJob),
}

/// Local list/watch cache for CronJobs.
pub struct CronJobInformer {
    cache: HashMap<ObjectRef<CronJob>, CronJob>,
    events: mpsc::UnboundedSender<ResourceEvent>,
    synced: watch::Sender<bool>,
}

impl std::fmt::Debug for CronJobInformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronJobInformer")
            .field("cached_objects", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl CronJobInformer {
    /// Create an informer plus the receiving ends of its event stream and
    /// synced flag.
    #[must_use]
    pub fn new() -> (
        Self,
        mpsc::UnboundedReceiver<ResourceEvent>,
        watch::Receiver<bool>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (synced_tx, synced_rx) = watch::channel(false);
        let informer = Self {
            cache: HashMap::new(),
            events: events_tx,
            synced: synced_tx,
        };
        (informer, events_rx, synced_rx)
    }

    /// Drive the watch stream until the event receiver goes away.
    ///
    /// The watcher re-lists and resumes on its own after API hiccups; stream
    /// errors here are diagnostics, not termination.
    pub async fn run(mut self, cronjobs: Api<CronJob>) {
        let stream = watcher(cronjobs, watcher::Config::default());
        pin_mut!(stream);

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => self.observe(event),
                // A notification we cannot interpret is dropped; the next
                // event is processed normally.
                Err(err) => warn!("Watch stream error: {err}"),
            }
            if self.events.is_closed() {
                debug!("Event receiver dropped, stopping watch");
                break;
            }
        }
    }

    /// Fold one raw watch event into the cache, emitting a typed notification
    /// where one is due.
    pub fn observe(&mut self, event: watcher::Event<CronJob>) {
        match event {
            // A re-list starts; keep the cache so re-listed objects dedupe
            // against their previous state.
            watcher::Event::Init => {}
            watcher::Event::InitApply(cron_job) | watcher::Event::Apply(cron_job) => {
                self.upsert(cron_job);
            }
            watcher::Event::InitDone => {
                self.synced.send_replace(true);
            }
            watcher::Event::Delete(cron_job) => {
                // Deletions are not reconciled; dropping the cached state
                // makes a recreated object register as an add.
                self.cache.remove(&ObjectRef::from_obj(&cron_job));
            }
        }
    }

    fn upsert(&mut self, cron_job: CronJob) {
        let key = ObjectRef::from_obj(&cron_job);
        let event = match self.cache.insert(key, cron_job.clone()) {
            Some(previous) => ResourceEvent::Updated(previous, cron_job),
            None => ResourceEvent::Added(cron_job),
        };
        // Send only fails once the controller is gone; nothing left to notify.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::ResourceExt;

    fn cron_job(name: &str, resource_version: &str) -> CronJob {
        CronJob {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("ns".to_owned()),
                resource_version: Some(resource_version.to_owned()),
                ..ObjectMeta::default()
            },
            ..CronJob::default()
        }
    }

    #[test]
    fn test_initial_listing_emits_adds_then_synced() {
        let (mut informer, mut events, synced) = CronJobInformer::new();

        informer.observe(watcher::Event::Init);
        informer.observe(watcher::Event::InitApply(cron_job("job1", "1")));
        informer.observe(watcher::Event::InitApply(cron_job("job2", "7")));
        assert!(!*synced.borrow());
        informer.observe(watcher::Event::InitDone);
        assert!(*synced.borrow());

        match events.try_recv().expect("first event") {
            ResourceEvent::Added(cj) => assert_eq!(cj.name_any(), "job1"),
            other => panic!("expected Added, got {other:?}"),
        }
        match events.try_recv().expect("second event") {
            ResourceEvent::Added(cj) => assert_eq!(cj.name_any(), "job2"),
            other => panic!("expected Added, got {other:?}"),
        }
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_reannouncement_carries_cached_previous_state() {
        let (mut informer, mut events, _synced) = CronJobInformer::new();

        informer.observe(watcher::Event::Apply(cron_job("job1", "1")));
        informer.observe(watcher::Event::Apply(cron_job("job1", "2")));

        let _added = events.try_recv().expect("add event");
        match events.try_recv().expect("update event") {
            ResourceEvent::Updated(old, new) => {
                assert_eq!(old.resource_version(), Some("1".to_owned()));
                assert_eq!(new.resource_version(), Some("2".to_owned()));
            }
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[test]
    fn test_resync_redelivery_surfaces_as_update_with_same_version() {
        let (mut informer, mut events, _synced) = CronJobInformer::new();

        informer.observe(watcher::Event::Apply(cron_job("job1", "1")));
        informer.observe(watcher::Event::Apply(cron_job("job1", "1")));

        let _added = events.try_recv().expect("add event");
        match events.try_recv().expect("update event") {
            ResourceEvent::Updated(old, new) => {
                assert_eq!(old.resource_version(), new.resource_version());
            }
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[test]
    fn test_delete_evicts_so_recreation_is_an_add() {
        let (mut informer, mut events, _synced) = CronJobInformer::new();

        informer.observe(watcher::Event::Apply(cron_job("job1", "1")));
        informer.observe(watcher::Event::Delete(cron_job("job1", "1")));
        informer.observe(watcher::Event::Apply(cron_job("job1", "9")));

        let _added = events.try_recv().expect("add event");
        match events.try_recv().expect("event after recreation") {
            ResourceEvent::Added(cj) => {
                assert_eq!(cj.resource_version(), Some("9".to_owned()));
            }
            other => panic!("expected Added, got {other:?}"),
        }
    }
}
