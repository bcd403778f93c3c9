use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bridge_parse::ParsedEvent;
use dashmap::DashMap;
use uuid::Uuid;

use crate::event::{history_truncated_warning, EventFrame};
use crate::ring::RingBuffer;
use crate::subscriber::{BackpressurePolicy, Subscriber};

/// One invocation's event history plus its attached subscribers (§3's
/// Stream / §4.6).
pub struct Stream {
    pub id: Uuid,
    buffer: Mutex<RingBuffer>,
    subscribers: DashMap<Uuid, Arc<Subscriber>>,
    next_seq: AtomicU64,
    finished: AtomicBool,
}

impl Stream {
    pub fn new(id: Uuid, ring_capacity: usize) -> Self {
        Self {
            id,
            buffer: Mutex::new(RingBuffer::new(ring_capacity)),
            subscribers: DashMap::new(),
            next_seq: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Appends `event` to the ring buffer and hands it to every attached
    /// subscriber, dropping (not blocking on) any that can't keep up.
    /// A no-op once the stream has finished (§3 invariant i).
    pub fn publish(&self, event: ParsedEvent) {
        if self.is_finished() {
            return;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let frame = EventFrame {
            stream_id: self.id,
            seq,
            event,
        };
        self.buffer.lock().unwrap().push(frame.clone());

        self.subscribers.retain(|_, subscriber| subscriber.push(frame.clone()));
    }

    /// Attaches a new subscriber, synchronously returning the events already
    /// retained in the ring buffer (prefixed with a truncation warning if any
    /// earlier history was already evicted).
    pub fn subscribe(
        &self,
        principal_id: impl Into<String>,
        queue_capacity: usize,
        policy: BackpressurePolicy,
    ) -> (Arc<Subscriber>, Vec<EventFrame>) {
        let subscriber = Arc::new(Subscriber::new(principal_id, queue_capacity, policy));
        let id = subscriber.id;

        let buffer = self.buffer.lock().unwrap();
        let mut backlog = Vec::new();
        if buffer.truncated() {
            backlog.push(EventFrame {
                stream_id: self.id,
                seq: 0,
                event: history_truncated_warning(),
            });
        }
        backlog.extend(buffer.snapshot());
        drop(buffer);

        self.subscribers.insert(id, subscriber.clone());
        (subscriber, backlog)
    }

    pub fn unsubscribe(&self, subscriber_id: Uuid) {
        if let Some((_, subscriber)) = self.subscribers.remove(&subscriber_id) {
            subscriber.disconnect();
        }
    }

    pub fn subscriber(&self, subscriber_id: Uuid) -> Option<Arc<Subscriber>> {
        self.subscribers.get(&subscriber_id).map(|entry| entry.clone())
    }

    /// Appends the terminal event and marks the stream closed. No further
    /// `publish` calls have any effect after this.
    pub fn finish(&self, terminal_event: ParsedEvent) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let frame = EventFrame {
            stream_id: self.id,
            seq,
            event: terminal_event,
        };
        self.buffer.lock().unwrap().push(frame.clone());
        for subscriber in self.subscribers.iter() {
            subscriber.push(frame.clone());
        }
    }

    pub fn disconnect_all(&self) {
        for subscriber in self.subscribers.iter() {
            subscriber.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_joiner_sees_a_truncation_warning_once_history_has_been_evicted() {
        let stream = Stream::new(Uuid::new_v4(), 1);
        stream.publish(ParsedEvent::Output {
            raw_line: "a".to_string(),
            parsed_structure: None,
        });
        stream.publish(ParsedEvent::Output {
            raw_line: "b".to_string(),
            parsed_structure: None,
        });

        let (_, backlog) = stream.subscribe("user-1", 8, BackpressurePolicy::DropOldest);
        assert_eq!(backlog.len(), 2);
        assert!(matches!(backlog[0].event, ParsedEvent::Warning { .. }));
    }

    #[test]
    fn publish_after_finish_is_a_no_op() {
        let stream = Stream::new(Uuid::new_v4(), 8);
        stream.finish(ParsedEvent::Complete {
            success: true,
            exit_code: Some(0),
            structured_result: None,
        });
        stream.publish(ParsedEvent::Output {
            raw_line: "too-late".to_string(),
            parsed_structure: None,
        });

        let (_, backlog) = stream.subscribe("user-1", 8, BackpressurePolicy::DropOldest);
        assert_eq!(backlog.len(), 1);
    }
}
