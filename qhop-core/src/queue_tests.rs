use serde_json::json;

use super::{normalize_vhost, temp_queue_name, QueueDescriptor, QueueRef, QueueType};
use crate::errors::MigrationError;

#[test]
fn queue_type_parses_case_insensitively() {
    assert_eq!("Quorum".parse::<QueueType>().unwrap(), QueueType::Quorum);
    assert_eq!(" stream ".parse::<QueueType>().unwrap(), QueueType::Stream);
    assert_eq!("CLASSIC".parse::<QueueType>().unwrap(), QueueType::Classic);

    let err = "mirrored".parse::<QueueType>().unwrap_err();
    assert!(matches!(err, MigrationError::Validation(_)));
    assert!(err.to_string().contains("unknown queue type 'mirrored'"));
}

#[test]
fn only_quorum_and_stream_are_targets() {
    assert!(QueueType::Quorum.ensure_target().is_ok());
    assert!(QueueType::Stream.ensure_target().is_ok());

    let err = QueueType::Classic.ensure_target().unwrap_err();
    assert!(matches!(err, MigrationError::Validation(_)));
}

#[test]
fn temp_queue_name_is_deterministic() {
    assert_eq!(temp_queue_name("orders"), "orders_temp_migrated");
    let d = QueueDescriptor::new("/", "orders", QueueType::Classic);
    assert_eq!(d.temp_queue_name(), temp_queue_name("orders"));
}

#[test]
fn encoded_default_vhost_is_normalized() {
    assert_eq!(normalize_vhost("%2f"), "/");
    assert_eq!(normalize_vhost("%2F"), "/");
    assert_eq!(normalize_vhost("/"), "/");
    assert_eq!(normalize_vhost("staging"), "staging");
}

#[test]
fn queue_ref_display_names_queue_and_vhost() {
    let r = QueueRef::new("/", "orders");
    assert_eq!(r.to_string(), "'orders' in vhost '/'");
}

/// What this test validates
///
/// - Identity checks run before any broker call.
/// - Expectation: empty names, reserved `amq.` names and names too long to
///   carry the temp suffix are all rejected as validation errors.
#[test]
fn descriptor_validation_rejects_unusable_identities() {
    assert!(QueueDescriptor::new("/", "orders", QueueType::Classic)
        .validate()
        .is_ok());

    let cases = [
        QueueDescriptor::new("", "orders", QueueType::Classic),
        QueueDescriptor::new("/", "", QueueType::Classic),
        QueueDescriptor::new("/", "amq.gen-abc", QueueType::Classic),
        QueueDescriptor::new("/", "x".repeat(250), QueueType::Classic),
    ];
    for d in cases {
        let err = d.validate().unwrap_err();
        assert!(matches!(err, MigrationError::Validation(_)), "{err}");
    }
}

#[test]
fn descriptor_serializes_without_empty_policy_fields() {
    let d = QueueDescriptor::new("/", "orders", QueueType::Classic)
        .with_argument("x-max-length", 10)
        .with_message_count(4);
    let value = serde_json::to_value(&d).unwrap();

    assert_eq!(value["current_type"], "classic");
    assert_eq!(value["arguments"], json!({"x-max-length": 10}));
    assert_eq!(value["message_count"], 4);
    assert!(value.get("policy").is_none());
    assert!(value.get("effective_policy").is_none());
}
