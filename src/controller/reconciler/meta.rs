//! # Metadata Helpers
//!
//! Annotation bookkeeping on managed resources: external name, pause flag and
//! the create-pending/succeeded/failed timestamps that guard against creating
//! an external resource twice.

use crate::constants::{
    ANNOTATION_EXTERNAL_CREATE_FAILED, ANNOTATION_EXTERNAL_CREATE_PENDING,
    ANNOTATION_EXTERNAL_CREATE_SUCCEEDED, ANNOTATION_EXTERNAL_NAME, ANNOTATION_PAUSED,
};
use chrono::{DateTime, SecondsFormat, Utc};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::time::Duration;

/// External name of the resource, if set
#[must_use]
pub fn external_name<K: Resource>(obj: &K) -> Option<String> {
    obj.annotations().get(ANNOTATION_EXTERNAL_NAME).cloned()
}

pub fn set_external_name<K: Resource>(obj: &mut K, name: &str) {
    obj.annotations_mut()
        .insert(ANNOTATION_EXTERNAL_NAME.to_string(), name.to_string());
}

/// The pause annotation is set to "true"
#[must_use]
pub fn is_paused<K: Resource>(obj: &K) -> bool {
    obj.annotations()
        .get(ANNOTATION_PAUSED)
        .is_some_and(|v| v == "true")
}

/// Deletion of the resource has been requested
#[must_use]
pub fn was_deleted<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

/// Merge annotations into the resource, overwriting existing keys
pub fn add_annotations<K: Resource>(obj: &mut K, annotations: &BTreeMap<String, String>) {
    obj.annotations_mut()
        .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
}

fn set_timestamp<K: Resource>(obj: &mut K, key: &str, t: DateTime<Utc>) {
    obj.annotations_mut().insert(
        key.to_string(),
        t.to_rfc3339_opts(SecondsFormat::Nanos, true),
    );
}

/// Timestamp annotation; unparseable values count as unset
fn timestamp<K: Resource>(obj: &K, key: &str) -> Option<DateTime<Utc>> {
    obj.annotations()
        .get(key)
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

pub fn set_external_create_pending<K: Resource>(obj: &mut K, t: DateTime<Utc>) {
    set_timestamp(obj, ANNOTATION_EXTERNAL_CREATE_PENDING, t);
}

#[must_use]
pub fn external_create_pending<K: Resource>(obj: &K) -> Option<DateTime<Utc>> {
    timestamp(obj, ANNOTATION_EXTERNAL_CREATE_PENDING)
}

pub fn set_external_create_succeeded<K: Resource>(obj: &mut K, t: DateTime<Utc>) {
    set_timestamp(obj, ANNOTATION_EXTERNAL_CREATE_SUCCEEDED, t);
}

#[must_use]
pub fn external_create_succeeded<K: Resource>(obj: &K) -> Option<DateTime<Utc>> {
    timestamp(obj, ANNOTATION_EXTERNAL_CREATE_SUCCEEDED)
}

pub fn set_external_create_failed<K: Resource>(obj: &mut K, t: DateTime<Utc>) {
    set_timestamp(obj, ANNOTATION_EXTERNAL_CREATE_FAILED, t);
}

#[must_use]
pub fn external_create_failed<K: Resource>(obj: &K) -> Option<DateTime<Utc>> {
    timestamp(obj, ANNOTATION_EXTERNAL_CREATE_FAILED)
}

/// A create was started but neither its success nor its failure was recorded
///
/// The external resource may or may not exist, so creating it again could
/// leak a duplicate.
#[must_use]
pub fn external_create_incomplete<K: Resource>(obj: &K) -> bool {
    let Some(pending) = external_create_pending(obj) else {
        return false;
    };
    let resolved = |t: Option<DateTime<Utc>>| t.is_some_and(|t| t > pending);
    !(resolved(external_create_succeeded(obj)) || resolved(external_create_failed(obj)))
}

/// A create succeeded less than `window` ago
#[must_use]
pub fn external_create_succeeded_during<K: Resource>(obj: &K, window: Duration) -> bool {
    let Some(succeeded) = external_create_succeeded(obj) else {
        return false;
    };
    let Ok(window) = chrono::Duration::from_std(window) else {
        return true;
    };
    Utc::now() < succeeded + window
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_create_incomplete_when_only_pending() {
        let mut obj = ConfigMap::default();
        assert!(!external_create_incomplete(&obj));
        set_external_create_pending(&mut obj, at(100));
        assert!(external_create_incomplete(&obj));
    }

    #[test]
    fn test_create_complete_after_success_or_failure() {
        let mut obj = ConfigMap::default();
        set_external_create_pending(&mut obj, at(100));
        set_external_create_succeeded(&mut obj, at(101));
        assert!(!external_create_incomplete(&obj));

        let mut obj = ConfigMap::default();
        set_external_create_pending(&mut obj, at(100));
        set_external_create_failed(&mut obj, at(101));
        assert!(!external_create_incomplete(&obj));
    }

    #[test]
    fn test_newer_pending_reopens_create() {
        let mut obj = ConfigMap::default();
        set_external_create_pending(&mut obj, at(100));
        set_external_create_failed(&mut obj, at(101));
        set_external_create_pending(&mut obj, at(102));
        assert!(external_create_incomplete(&obj));
    }

    #[test]
    fn test_timestamps_keep_nanoseconds() {
        let mut obj = ConfigMap::default();
        let t = DateTime::from_timestamp(100, 123_456_789).unwrap();
        set_external_create_pending(&mut obj, t);
        assert_eq!(external_create_pending(&obj), Some(t));
    }

    #[test]
    fn test_succeeded_during_window() {
        let mut obj = ConfigMap::default();
        assert!(!external_create_succeeded_during(&obj, Duration::from_secs(30)));
        set_external_create_succeeded(&mut obj, Utc::now());
        assert!(external_create_succeeded_during(&obj, Duration::from_secs(30)));

        set_external_create_succeeded(&mut obj, at(100));
        assert!(!external_create_succeeded_during(&obj, Duration::from_secs(30)));
    }

    #[test]
    fn test_pause_annotation() {
        let mut obj = ConfigMap::default();
        assert!(!is_paused(&obj));
        obj.annotations_mut()
            .insert(ANNOTATION_PAUSED.to_string(), "true".to_string());
        assert!(is_paused(&obj));
    }
}
