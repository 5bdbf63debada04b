use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::config::{ExchangeType, Settings};
use crate::testing::{Op, RecordingChannel, RecordingConnector};
use crate::utils::BrokerError;

fn gateway_over(channel: &Arc<RecordingChannel>) -> BrokerGateway {
    let mut settings = Settings::default().amqp;
    settings.uri = "amqp://localhost".to_string();
    BrokerGateway::new(
        settings,
        Arc::new(RecordingConnector {
            channel: Some(Arc::clone(channel)),
        }),
    )
}

fn position(ops: &[Op], wanted: &Op) -> usize {
    ops.iter()
        .position(|op| op == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not found in {ops:?}"))
}

fn declared(name: &str) -> Op {
    Op::DeclareQueue {
        name: name.to_string(),
        arguments: if name.ends_with(".dlq") {
            QueueArguments::default()
        } else {
            QueueTopology::new(name, "wpp-agent").working_arguments()
        },
    }
}

#[test]
fn test_topology_new() {
    let topology = QueueTopology::new("orders", "wpp-agent");
    assert_eq!(topology.queue, "orders");
    assert_eq!(topology.dead_letter_queue, "orders.dlq");
    assert_eq!(
        topology.working_arguments(),
        QueueArguments {
            dead_letter_exchange: Some("wpp-agent".to_string()),
            dead_letter_routing_key: Some("orders.dlq".to_string()),
        }
    );
}

#[test]
fn test_topology_for_settings() {
    let entries = QueueTopology::for_settings(&Settings::default().amqp);
    let queues: Vec<_> = entries.iter().map(|t| t.queue.as_str()).collect();
    assert_eq!(queues, ["wpp-agent.msg.send", "wpp-agent.chat.status"]);
}

#[tokio::test]
async fn test_connect_declares_exchange_and_topology() {
    let channel = Arc::new(RecordingChannel::default());
    let gateway = gateway_over(&channel);

    gateway.connect().await.unwrap();

    let ops = channel.ops();
    assert_eq!(
        ops[0],
        Op::DeclareExchange {
            name: "wpp-agent".to_string(),
            kind: ExchangeType::Topic,
        }
    );
    assert!(ops.contains(&Op::Prefetch(10)));

    for queue in ["wpp-agent.msg.send", "wpp-agent.chat.status"] {
        let dlq = format!("{queue}.dlq");
        let dlq_declared = position(&ops, &declared(&dlq));
        let dlq_bound = position(
            &ops,
            &Op::Bind {
                queue: dlq.clone(),
                exchange: "wpp-agent".to_string(),
                routing_key: dlq.clone(),
            },
        );
        let queue_declared = position(&ops, &declared(queue));
        let queue_bound = position(
            &ops,
            &Op::Bind {
                queue: queue.to_string(),
                exchange: "wpp-agent".to_string(),
                routing_key: queue.to_string(),
            },
        );
        assert!(dlq_declared < dlq_bound);
        assert!(dlq_bound < queue_declared);
        assert!(queue_declared < queue_bound);
    }
}

#[tokio::test]
async fn test_declare_queue_declares_dlq_first() {
    let channel = Arc::new(RecordingChannel::default());
    let gateway = gateway_over(&channel);
    gateway.connect().await.unwrap();
    let before = channel.ops().len();

    gateway.declare_queue("q").await.unwrap();

    let ops = channel.ops()[before..].to_vec();
    assert_eq!(ops.len(), 4);
    assert_eq!(ops[0], declared("q.dlq"));
    assert_eq!(ops[2], declared("q"));
}

#[tokio::test]
async fn test_connect_unreachable_broker() {
    let gateway = BrokerGateway::new(
        Settings::default().amqp,
        Arc::new(RecordingConnector { channel: None }),
    );
    let err = gateway.connect().await.unwrap_err();
    assert!(matches!(err, BrokerError::Connection { .. }));

    // still not connected afterwards
    let err = gateway.publish("q", b"{}").await.unwrap_err();
    assert!(matches!(err, BrokerError::NotConnected));
}

#[tokio::test]
async fn test_connect_rejected_declaration() {
    let mut channel = RecordingChannel::default();
    channel.reject_queue = Some("wpp-agent.chat.status".to_string());
    let channel = Arc::new(channel);
    let gateway = gateway_over(&channel);

    let err = gateway.connect().await.unwrap_err();
    assert!(matches!(err, BrokerError::Topology { .. }));
    assert!(matches!(
        gateway.publish("q", b"{}").await,
        Err(BrokerError::NotConnected)
    ));
}

#[tokio::test]
async fn test_publish_before_connect() {
    let channel = Arc::new(RecordingChannel::default());
    let gateway = gateway_over(&channel);
    let err = gateway.publish("q", b"{}").await.unwrap_err();
    assert!(matches!(err, BrokerError::NotConnected));
    assert!(channel.ops().is_empty());
}

#[tokio::test]
async fn test_publish_uses_exchange_and_queue_as_routing_key() {
    let channel = Arc::new(RecordingChannel::default());
    let gateway = gateway_over(&channel);
    gateway.connect().await.unwrap();

    gateway.publish("*.msg.received", b"{\"id\":\"1\"}").await.unwrap();

    let last = channel.ops().pop().unwrap();
    assert_eq!(
        last,
        Op::Publish {
            exchange: "wpp-agent".to_string(),
            routing_key: "*.msg.received".to_string(),
            payload: b"{\"id\":\"1\"}".to_vec(),
        }
    );
}

struct ScriptedHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl DeliveryHandler for ScriptedHandler {
    async fn handle(&self, payload: &[u8]) -> Disposition {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match payload {
            b"ok" => Disposition::Accept,
            b"slow" => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Disposition::Accept
            }
            b"panic" => panic!("handler exploded"),
            _ => Disposition::Reject,
        }
    }
}

#[tokio::test]
async fn test_consume_settles_every_delivery_exactly_once() {
    let channel = Arc::new(RecordingChannel::with_payloads(vec![
        b"ok".to_vec(),
        b"bad".to_vec(),
        b"slow".to_vec(),
        b"panic".to_vec(),
        b"ok".to_vec(),
    ]));
    let gateway = gateway_over(&channel);
    gateway.connect().await.unwrap();

    let handler = Arc::new(ScriptedHandler {
        calls: AtomicUsize::new(0),
    });
    gateway
        .consume("wpp-agent.msg.send", handler.clone())
        .await
        .unwrap();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 5);
    assert_eq!(
        channel.settlements(),
        vec![
            (1, Disposition::Accept),
            (2, Disposition::Reject),
            (3, Disposition::Accept),
            (4, Disposition::Reject),
            (5, Disposition::Accept),
        ]
    );
    assert!(channel.ops().contains(&Op::Consume {
        queue: "wpp-agent.msg.send".to_string(),
        consumer_tag: "wpp-agent".to_string(),
    }));
}

#[tokio::test]
async fn test_consume_before_connect() {
    let channel = Arc::new(RecordingChannel::default());
    let gateway = gateway_over(&channel);
    let handler = Arc::new(ScriptedHandler {
        calls: AtomicUsize::new(0),
    });
    let err = gateway.consume("q", handler).await.unwrap_err();
    assert!(matches!(err, BrokerError::NotConnected));
}
