//! # Labeler
//!
//! Pure label reconciliation for `CronJob` resources.
//!
//! There are three levels of labels on a CronJob:
//! - on the CronJob object itself
//! - on `spec.jobTemplate`
//! - on `spec.jobTemplate.spec.template` (the pod template)
//!
//! [`ensure_cron_job_labels`] makes sure all three carry an entry for the
//! controller's label key, valued with the object's name. A key that is
//! already present is left alone, whatever its value: operators may pin their
//! own value and the controller must not fight them over it.
//!
//! Nothing in this module talks to the cluster; callers decide what to do
//! with the returned change flag.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

/// Insert `key -> value` into a label map unless the key already exists.
///
/// A missing map is allocated first. Returns whether the map was changed.
pub fn ensure_label(labels: &mut Option<BTreeMap<String, String>>, key: &str, value: &str) -> bool {
    let labels = labels.get_or_insert_with(BTreeMap::new);
    if labels.contains_key(key) {
        // label already exists, possibly with an operator-chosen value
        return false;
    }
    labels.insert(key.to_owned(), value.to_owned());
    true
}

/// Apply the label invariant to all three label maps of a CronJob.
///
/// Every map is visited even once a change has been recorded, so one
/// pre-labelled level never shadows a missing label on another. Absent
/// `spec`/`metadata` sub-objects are allocated on the way down rather than
/// skipped. Returns true if any map was changed.
pub fn ensure_cron_job_labels(cron_job: &mut CronJob, label: &str) -> bool {
    let name = cron_job.name_any();

    let mut changed = ensure_label(&mut cron_job.metadata.labels, label, &name);

    let spec = cron_job.spec.get_or_insert_with(CronJobSpec::default);

    let template_meta = spec
        .job_template
        .metadata
        .get_or_insert_with(ObjectMeta::default);
    changed |= ensure_label(&mut template_meta.labels, label, &name);

    let job_spec = spec.job_template.spec.get_or_insert_with(JobSpec::default);
    let pod_meta = job_spec
        .template
        .metadata
        .get_or_insert_with(ObjectMeta::default);
    changed |= ensure_label(&mut pod_meta.labels, label, &name);

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::batch::v1::JobTemplateSpec;

    fn cron_job(name: &str) -> CronJob {
        CronJob {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("ns".to_owned()),
                ..ObjectMeta::default()
            },
            spec: Some(CronJobSpec {
                schedule: "*/5 * * * *".to_owned(),
                job_template: JobTemplateSpec::default(),
                ..CronJobSpec::default()
            }),
            status: None,
        }
    }

    fn labels_at_all_levels(cron_job: &CronJob) -> [Option<&BTreeMap<String, String>>; 3] {
        let spec = cron_job.spec.as_ref().expect("spec");
        [
            cron_job.metadata.labels.as_ref(),
            spec.job_template
                .metadata
                .as_ref()
                .and_then(|m| m.labels.as_ref()),
            spec.job_template
                .spec
                .as_ref()
                .and_then(|s| s.template.metadata.as_ref())
                .and_then(|m| m.labels.as_ref()),
        ]
    }

    #[test]
    fn test_ensure_label_allocates_missing_map() {
        let mut labels = None;
        assert!(ensure_label(&mut labels, "app", "job1"));
        assert_eq!(
            labels.expect("map allocated").get("app"),
            Some(&"job1".to_owned())
        );
    }

    #[test]
    fn test_ensure_label_inserts_missing_key() {
        let mut labels = Some(BTreeMap::from([("team".to_owned(), "sre".to_owned())]));
        assert!(ensure_label(&mut labels, "app", "job1"));
        let labels = labels.expect("map present");
        assert_eq!(labels.get("app"), Some(&"job1".to_owned()));
        assert_eq!(labels.get("team"), Some(&"sre".to_owned()));
    }

    #[test]
    fn test_ensure_label_never_overwrites_existing_value() {
        let mut labels = Some(BTreeMap::from([("app".to_owned(), "custom".to_owned())]));
        assert!(!ensure_label(&mut labels, "app", "job1"));
        assert_eq!(
            labels.expect("map present").get("app"),
            Some(&"custom".to_owned())
        );
    }

    #[test]
    fn test_labels_all_three_levels() {
        let mut cj = cron_job("job1");
        assert!(ensure_cron_job_labels(&mut cj, "app"));

        let expected = BTreeMap::from([("app".to_owned(), "job1".to_owned())]);
        for level in labels_at_all_levels(&cj) {
            assert_eq!(level, Some(&expected));
        }
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        let mut cj = cron_job("job1");
        assert!(ensure_cron_job_labels(&mut cj, "app"));

        let before = cj.clone();
        assert!(!ensure_cron_job_labels(&mut cj, "app"));
        assert_eq!(cj, before);
    }

    #[test]
    fn test_operator_value_is_preserved_while_other_levels_fill_in() {
        let mut cj = cron_job("job1");
        cj.metadata.labels = Some(BTreeMap::from([("app".to_owned(), "custom".to_owned())]));

        // one level already satisfied still counts as a change overall
        assert!(ensure_cron_job_labels(&mut cj, "app"));

        let [object, template, pod_template] = labels_at_all_levels(&cj);
        assert_eq!(
            object.expect("object labels").get("app"),
            Some(&"custom".to_owned())
        );
        let expected = BTreeMap::from([("app".to_owned(), "job1".to_owned())]);
        assert_eq!(template, Some(&expected));
        assert_eq!(pod_template, Some(&expected));
    }

    #[test]
    fn test_allocates_missing_spec_and_template_metadata() {
        let mut cj = cron_job("job1");
        cj.spec = None;

        assert!(ensure_cron_job_labels(&mut cj, "app"));

        let expected = BTreeMap::from([("app".to_owned(), "job1".to_owned())]);
        for level in labels_at_all_levels(&cj) {
            assert_eq!(level, Some(&expected));
        }
    }
}
