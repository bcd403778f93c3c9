use std::sync::Arc;
use std::time::Duration;

use bridge_parse::ParsedEvent;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::StreamError;
use crate::event::EventFrame;
use crate::stream::Stream;
use crate::subscriber::{BackpressurePolicy, Subscriber};

/// Grace period a finished stream stays registered so late subscribers can
/// drain its backlog before it's dropped (§4.6's `finish`).
pub const DEFAULT_FINISH_GRACE: Duration = Duration::from_secs(30);

pub struct StreamManagerConfig {
    pub ring_capacity: usize,
    pub finish_grace: Duration,
}

impl Default for StreamManagerConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 1000,
            finish_grace: DEFAULT_FINISH_GRACE,
        }
    }
}

/// Registry of in-flight (and recently finished) streams, keyed by
/// invocation id. Transport-agnostic: this crate never touches a socket —
/// the HTTP/WebSocket collaborator drains a [`Subscriber`] on its own.
pub struct StreamManager {
    config: StreamManagerConfig,
    streams: Arc<DashMap<Uuid, Arc<Stream>>>,
}

impl StreamManager {
    pub fn new(config: StreamManagerConfig) -> Self {
        Self {
            config,
            streams: Arc::new(DashMap::new()),
        }
    }

    pub fn register(&self, invocation_id: Uuid) -> Arc<Stream> {
        let stream = Arc::new(Stream::new(invocation_id, self.config.ring_capacity));
        self.streams.insert(invocation_id, stream.clone());
        stream
    }

    pub fn publish(&self, stream_id: Uuid, event: ParsedEvent) -> Result<(), StreamError> {
        let stream = self
            .streams
            .get(&stream_id)
            .ok_or(StreamError::NotFound(stream_id))?;
        stream.publish(event);
        Ok(())
    }

    pub fn subscribe(
        &self,
        stream_id: Uuid,
        principal_id: impl Into<String>,
        queue_capacity: usize,
        policy: BackpressurePolicy,
    ) -> Result<(Arc<Subscriber>, Vec<EventFrame>), StreamError> {
        let stream = self
            .streams
            .get(&stream_id)
            .ok_or(StreamError::NotFound(stream_id))?;
        Ok(stream.subscribe(principal_id, queue_capacity, policy))
    }

    pub fn unsubscribe(&self, stream_id: Uuid, subscriber_id: Uuid) {
        if let Some(stream) = self.streams.get(&stream_id) {
            stream.unsubscribe(subscriber_id);
        }
    }

    /// Appends the terminal event, marks the stream closed, and schedules
    /// its removal after the finish grace period.
    pub fn finish(&self, stream_id: Uuid, terminal_event: ParsedEvent) -> Result<(), StreamError> {
        let stream = self
            .streams
            .get(&stream_id)
            .ok_or(StreamError::NotFound(stream_id))?
            .clone();
        stream.finish(terminal_event);

        let streams = self.streams.clone();
        let grace = self.config.finish_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some((_, stream)) = streams.remove(&stream_id) {
                stream.disconnect_all();
                debug!(%stream_id, "removed finished stream after grace period");
            }
        });
        Ok(())
    }

    /// Signals every active stream's subscribers to disconnect, for
    /// `Shutdown` (§5): no further delivery is attempted once called.
    pub fn shutdown(&self) {
        for entry in self.streams.iter() {
            entry.disconnect_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_publish_subscribe_round_trip() {
        let manager = StreamManager::new(StreamManagerConfig::default());
        let stream_id = Uuid::new_v4();
        manager.register(stream_id);

        manager
            .publish(
                stream_id,
                ParsedEvent::Output {
                    raw_line: "hello".to_string(),
                    parsed_structure: None,
                },
            )
            .unwrap();

        let (subscriber, backlog) = manager
            .subscribe(stream_id, "user-1", 8, BackpressurePolicy::DropOldest)
            .unwrap();
        assert_eq!(backlog.len(), 1);

        manager
            .publish(
                stream_id,
                ParsedEvent::Complete {
                    success: true,
                    exit_code: Some(0),
                    structured_result: None,
                },
            )
            .unwrap();
        let frame = subscriber.recv().await.unwrap();
        assert!(matches!(frame.event, ParsedEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn publish_against_unknown_stream_reports_not_found() {
        let manager = StreamManager::new(StreamManagerConfig::default());
        let result = manager.publish(
            Uuid::new_v4(),
            ParsedEvent::Warning {
                message: "orphaned".to_string(),
            },
        );
        assert!(matches!(result, Err(StreamError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn finish_removes_the_stream_after_the_grace_period() {
        let manager = StreamManager::new(StreamManagerConfig {
            ring_capacity: 8,
            finish_grace: Duration::from_millis(20),
        });
        let stream_id = Uuid::new_v4();
        manager.register(stream_id);
        manager
            .finish(
                stream_id,
                ParsedEvent::Complete {
                    success: true,
                    exit_code: Some(0),
                    structured_result: None,
                },
            )
            .unwrap();

        assert!(manager.streams.contains_key(&stream_id));
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert!(!manager.streams.contains_key(&stream_id));
    }
}
