use crate::broker::{BrokerClient, BrokerError, BrokerOp, MemoryBroker, QueueDeclaration};
use crate::queue::{QueueArguments, QueueDescriptor, QueueType};

fn broker_with(names: &[&str]) -> MemoryBroker {
    let broker = MemoryBroker::new();
    for name in names {
        broker.declare(QueueDescriptor::new("/", *name, QueueType::Classic));
    }
    broker
}

fn declaration(name: &str) -> QueueDeclaration {
    QueueDeclaration {
        name: name.to_string(),
        queue_type: QueueType::Quorum,
        durable: true,
        arguments: QueueArguments::new(),
    }
}

#[tokio::test]
async fn list_filters_by_vhost_and_name_sorted() {
    let broker = broker_with(&["payments", "orders", "orders-dlq"]);
    broker.declare(QueueDescriptor::new("staging", "orders", QueueType::Classic));

    let all = broker.list_queues("/", None).await.unwrap();
    let names: Vec<_> = all.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "orders-dlq", "payments"]);

    let filtered = broker.list_queues("/", Some("orders")).await.unwrap();
    assert_eq!(filtered.len(), 2);
    assert!(broker.list_queues("other", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_reports_live_message_count() {
    let broker = broker_with(&["orders"]);
    broker.publish("/", "orders", b"a".to_vec()).unwrap();
    broker.publish("/", "orders", b"b".to_vec()).unwrap();

    let d = broker.get_queue("/", "orders").await.unwrap();
    assert_eq!(d.message_count, 2);

    let err = broker.get_queue("/", "missing").await.unwrap_err();
    assert_eq!(err, BrokerError::NotFound("missing".into()));
}

#[tokio::test]
async fn create_refuses_existing_names() {
    let broker = broker_with(&["orders"]);

    let err = broker
        .create_queue("/", &declaration("orders"))
        .await
        .unwrap_err();
    assert_eq!(err, BrokerError::AlreadyExists("orders".into()));

    broker
        .create_queue("/", &declaration("orders_temp_migrated"))
        .await
        .unwrap();
    let created = broker.descriptor("/", "orders_temp_migrated").unwrap();
    assert_eq!(created.current_type, QueueType::Quorum);
    assert!(created.durable);
}

/// What this test validates
///
/// - `delete_queue` with `if_empty` on a queue that still holds messages.
/// - Expectation: rejected and the queue with its messages survives.
///
/// Why this matters
/// - Every delete the migrator issues relies on this guard to never lose data.
#[tokio::test]
async fn if_empty_delete_keeps_non_empty_queue() {
    let broker = broker_with(&["orders"]);
    broker.publish("/", "orders", b"m".to_vec()).unwrap();

    let err = broker.delete_queue("/", "orders", true).await.unwrap_err();
    assert!(matches!(err, BrokerError::Rejected { status: 400, .. }));
    assert_eq!(broker.messages("/", "orders").unwrap().len(), 1);

    broker.delete_queue("/", "orders", false).await.unwrap();
    assert!(!broker.contains("/", "orders"));

    let err = broker.delete_queue("/", "orders", true).await.unwrap_err();
    assert_eq!(err, BrokerError::NotFound("orders".into()));
}

#[tokio::test]
async fn drain_moves_messages_in_fifo_order() {
    let broker = broker_with(&["src", "dst"]);
    for payload in ["1", "2", "3"] {
        broker.publish("/", "src", payload.as_bytes().to_vec()).unwrap();
    }

    let moved = broker.drain_to("/", "src", "dst").await.unwrap();
    assert_eq!(moved, 3);
    assert!(broker.messages("/", "src").unwrap().is_empty());
    assert_eq!(
        broker.messages("/", "dst").unwrap(),
        vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]
    );

    // an empty source is a no-op
    assert_eq!(broker.drain_to("/", "src", "dst").await.unwrap(), 0);
}

#[tokio::test]
async fn drain_requires_both_queues() {
    let broker = broker_with(&["src"]);

    let err = broker.drain_to("/", "src", "dst").await.unwrap_err();
    assert_eq!(err.moved, 0);
    assert_eq!(err.error, BrokerError::NotFound("dst".into()));

    let err = broker.drain_to("/", "src", "src").await.unwrap_err();
    assert!(matches!(err.error, BrokerError::Protocol(_)));
}

/// What this test validates
///
/// - A drain fault that trips after two messages.
/// - Expectation: the error carries `moved = 2` and the rest stays on the source.
#[tokio::test]
async fn drain_fault_reports_partial_progress() {
    let broker = broker_with(&["src", "dst"]);
    for i in 0..5u8 {
        broker.publish("/", "src", vec![i]).unwrap();
    }
    broker.fail_drain_after("src", 2, BrokerError::Transient("connection reset".into()));

    let err = broker.drain_to("/", "src", "dst").await.unwrap_err();
    assert_eq!(err.moved, 2);
    assert!(err.error.is_transient());
    assert_eq!(broker.messages("/", "src").unwrap().len(), 3);
    assert_eq!(broker.messages("/", "dst").unwrap().len(), 2);

    // the fault stays armed until cleared
    let err = broker.drain_to("/", "src", "dst").await.unwrap_err();
    assert_eq!(err.moved, 0);

    broker.clear_faults();
    assert_eq!(broker.drain_to("/", "src", "dst").await.unwrap(), 3);
}

#[tokio::test]
async fn operation_fault_fires_a_limited_number_of_times() {
    let broker = broker_with(&["orders"]);
    broker.fail_operation(
        BrokerOp::Get,
        "orders",
        BrokerError::Transient("503".into()),
        Some(2),
    );

    assert!(broker.get_queue("/", "orders").await.is_err());
    assert!(broker.get_queue("/", "orders").await.is_err());
    assert!(broker.get_queue("/", "orders").await.is_ok());

    broker.fail_operation(
        BrokerOp::List,
        "/",
        BrokerError::Unauthorized("bad credentials".into()),
        None,
    );
    for _ in 0..3 {
        assert!(matches!(
            broker.list_queues("/", None).await,
            Err(BrokerError::Unauthorized(_))
        ));
    }
}

#[test]
fn publish_to_missing_queue_fails() {
    let broker = MemoryBroker::new();
    assert_eq!(
        broker.publish("/", "nope", b"x".to_vec()),
        Err(BrokerError::NotFound("nope".into()))
    );
}

/// What this test validates
///
/// - Draining a stream queue into a classic queue, twice.
/// - Expectation: every read copies the whole log in order and the stream keeps
///   its messages, so an if-empty delete is refused and a plain delete is not.
///
/// Why this matters
/// - Reading a stream never consumes it; whoever drains one has to remove it
///   explicitly once the copy is known to be complete.
#[tokio::test]
async fn stream_drain_copies_without_consuming() {
    let broker = broker_with(&["dst"]);
    broker.declare(QueueDescriptor::new("/", "log", QueueType::Stream));
    for i in 0..3u8 {
        broker.publish("/", "log", vec![i]).unwrap();
    }

    assert_eq!(broker.drain_to("/", "log", "dst").await.unwrap(), 3);
    assert_eq!(broker.messages("/", "log").unwrap(), vec![vec![0u8], vec![1], vec![2]]);
    assert_eq!(broker.messages("/", "dst").unwrap(), vec![vec![0u8], vec![1], vec![2]]);

    // a second reader starts from the first offset again
    assert_eq!(broker.drain_to("/", "log", "dst").await.unwrap(), 3);
    assert_eq!(broker.messages("/", "dst").unwrap().len(), 6);

    assert!(matches!(
        broker.delete_queue("/", "log", true).await,
        Err(BrokerError::Rejected { status: 400, .. })
    ));
    broker.delete_queue("/", "log", false).await.unwrap();
    assert!(!broker.contains("/", "log"));
}

#[tokio::test]
async fn stream_drain_fault_reports_partial_copy() {
    let broker = broker_with(&["dst"]);
    broker.declare(QueueDescriptor::new("/", "log", QueueType::Stream));
    for i in 0..4u8 {
        broker.publish("/", "log", vec![i]).unwrap();
    }
    broker.fail_drain_after("log", 1, BrokerError::Protocol("channel closed".into()));

    let err = broker.drain_to("/", "log", "dst").await.unwrap_err();
    assert_eq!(err.moved, 1);
    assert_eq!(broker.messages("/", "log").unwrap().len(), 4);
    assert_eq!(broker.messages("/", "dst").unwrap(), vec![vec![0u8]]);
}
