// Copyright 2025 Benchwatch Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// ABOUTME: Notification hub: an owner task fanning events out to subscribers
// Subscriber state lives only inside the owner task; broadcasts write to
// bounded per-subscriber queues and a subscriber that cannot keep up is
// dropped rather than blocking the publisher.

use benchwatch_types::{Event, EventKind, Result, WsEnvelope};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hub limits and heartbeat settings.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub max_subscribers: usize,
    /// Serialized envelopes above this size are dropped with a warning
    pub max_message_bytes: usize,
    /// Per-subscriber queue depth before the drop-slowest policy triggers
    pub subscriber_queue_depth: usize,
    /// Server ping cadence on WebSocket connections
    pub ping_interval: Duration,
    /// A missed pong within this deadline closes the connection
    pub pong_deadline: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 256,
            max_message_bytes: 512 * 1024,
            subscriber_queue_depth: 64,
            ping_interval: Duration::from_secs(54),
            pong_deadline: Duration::from_secs(60),
        }
    }
}

/// Counters reported by the owner task.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HubStats {
    pub subscribers: usize,
    pub published: u64,
    pub delivered: u64,
    pub dropped_subscribers: u64,
    pub oversized_dropped: u64,
}

enum Command {
    Subscribe {
        reply: oneshot::Sender<Result<Subscription>>,
    },
    Unsubscribe {
        id: String,
    },
    Publish {
        event: Event,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

/// A registered subscriber's receiving half.
pub struct Subscription {
    pub id: String,
    pub receiver: mpsc::Receiver<Arc<WsEnvelope>>,
}

struct Subscriber {
    sender: mpsc::Sender<Arc<WsEnvelope>>,
}

/// Handle to the hub owner task.
#[derive(Clone)]
pub struct NotificationHub {
    commands: mpsc::Sender<Command>,
    config: HubConfig,
}

impl NotificationHub {
    /// Spawn the owner task and return its handle.
    pub fn spawn(config: HubConfig) -> Self {
        let (commands, inbox) = mpsc::channel(1024);
        let owner_config = config.clone();
        tokio::spawn(async move {
            owner_loop(owner_config, inbox).await;
        });
        Self { commands, config }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a subscriber; fails when the subscriber limit is reached.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Subscribe { reply })
            .await
            .map_err(|_| benchwatch_types::BenchwatchError::Fatal("notification hub is gone".into()))?;
        response
            .await
            .map_err(|_| benchwatch_types::BenchwatchError::Fatal("notification hub is gone".into()))?
    }

    /// Deregister a subscriber. Safe to call for an already-dropped id.
    pub async fn unsubscribe(&self, id: &str) {
        let _ = self
            .commands
            .send(Command::Unsubscribe { id: id.to_string() })
            .await;
    }

    /// Publish a domain event to every live subscriber. Best-effort: a
    /// stopped hub only logs.
    pub async fn publish(&self, event: Event) {
        if self
            .commands
            .send(Command::Publish { event })
            .await
            .is_err()
        {
            warn!("event dropped: notification hub is gone");
        }
    }

    pub async fn publish_kind(&self, kind: EventKind, data: serde_json::Value) {
        self.publish(Event::new(kind, data)).await;
    }

    pub async fn stats(&self) -> HubStats {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Stats { reply }).await.is_err() {
            return HubStats::default();
        }
        response.await.unwrap_or_default()
    }
}

async fn owner_loop(config: HubConfig, mut inbox: mpsc::Receiver<Command>) {
    let mut subscribers: HashMap<String, Subscriber> = HashMap::new();
    let mut stats = HubStats::default();

    while let Some(command) = inbox.recv().await {
        match command {
            Command::Subscribe { reply } => {
                if subscribers.len() >= config.max_subscribers {
                    let _ = reply.send(Err(benchwatch_types::BenchwatchError::validation(
                        format!("subscriber limit {} reached", config.max_subscribers),
                    )));
                    continue;
                }
                let id = Uuid::new_v4().to_string();
                let (sender, receiver) = mpsc::channel(config.subscriber_queue_depth);
                subscribers.insert(id.clone(), Subscriber { sender });
                debug!(subscriber = %id, total = subscribers.len(), "subscriber registered");
                let _ = reply.send(Ok(Subscription { id, receiver }));
            }
            Command::Unsubscribe { id } => {
                if subscribers.remove(&id).is_some() {
                    debug!(subscriber = %id, "subscriber deregistered");
                }
            }
            Command::Publish { event } => {
                stats.published += 1;
                let envelope = Arc::new(WsEnvelope::from_event(&event));

                match serde_json::to_vec(&*envelope) {
                    Ok(bytes) if bytes.len() > config.max_message_bytes => {
                        stats.oversized_dropped += 1;
                        warn!(
                            kind = %event.kind,
                            size = bytes.len(),
                            "event exceeds message size limit; dropped"
                        );
                        continue;
                    }
                    Err(e) => {
                        warn!(kind = %event.kind, error = %e, "unserializable event dropped");
                        continue;
                    }
                    Ok(_) => {}
                }

                let mut slow = Vec::new();
                for (id, subscriber) in &subscribers {
                    match subscriber.sender.try_send(envelope.clone()) {
                        Ok(()) => stats.delivered += 1,
                        Err(mpsc::error::TrySendError::Full(_))
                        | Err(mpsc::error::TrySendError::Closed(_)) => {
                            slow.push(id.clone());
                        }
                    }
                }
                for id in slow {
                    subscribers.remove(&id);
                    stats.dropped_subscribers += 1;
                    warn!(subscriber = %id, "subscriber dropped: queue full or closed");
                }
            }
            Command::Stats { reply } => {
                stats.subscribers = subscribers.len();
                let _ = reply.send(stats.clone());
            }
        }
    }
    info!("notification hub stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchwatch_types::EventKind;

    fn test_config() -> HubConfig {
        HubConfig {
            max_subscribers: 2,
            subscriber_queue_depth: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let hub = NotificationHub::spawn(test_config());
        let mut subscription = hub.subscribe().await.unwrap();

        hub.publish(Event::for_run(
            EventKind::NewRun,
            "run-1",
            serde_json::json!({"test_name": "suite"}),
        ))
        .await;

        let envelope = subscription.receiver.recv().await.unwrap();
        assert_eq!(envelope.kind, EventKind::NewRun);
        assert_eq!(envelope.id.as_deref(), Some("run-1"));
    }

    #[tokio::test]
    async fn test_per_run_events_arrive_in_publication_order() {
        let hub = NotificationHub::spawn(HubConfig {
            subscriber_queue_depth: 16,
            ..test_config()
        });
        let mut subscription = hub.subscribe().await.unwrap();

        for i in 0..5 {
            hub.publish(Event::for_run(
                EventKind::AnalysisComplete,
                "run-1",
                serde_json::json!({"seq": i}),
            ))
            .await;
        }

        for i in 0..5 {
            let envelope = subscription.receiver.recv().await.unwrap();
            assert_eq!(envelope.data["seq"], i);
        }
    }

    #[tokio::test]
    async fn test_subscriber_limit() {
        let hub = NotificationHub::spawn(test_config());
        let _a = hub.subscribe().await.unwrap();
        let _b = hub.subscribe().await.unwrap();
        assert!(hub.subscribe().await.is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped_not_blocking() {
        let hub = NotificationHub::spawn(test_config());
        // Never drained: its queue (depth 2) fills after two events.
        let _stalled = hub.subscribe().await.unwrap();

        for _ in 0..4 {
            hub.publish(Event::new(EventKind::NewRun, serde_json::Value::Null))
                .await;
        }

        // Give the owner a turn to process the queue.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = hub.stats().await;
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.dropped_subscribers, 1);
        assert_eq!(stats.published, 4);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = NotificationHub::spawn(test_config());
        let subscription = hub.subscribe().await.unwrap();
        hub.unsubscribe(&subscription.id).await;
        hub.unsubscribe(&subscription.id).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hub.stats().await.subscribers, 0);
    }
}
