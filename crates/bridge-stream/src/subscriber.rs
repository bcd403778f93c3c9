use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::Notify;
use uuid::Uuid;

use crate::event::{is_lag_warning, lag_warning, EventFrame};

/// How a subscriber's queue behaves once it fills up (§4.6 backpressure).
/// Publishers never block on a slow subscriber either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Evict the oldest queued frame and leave a lag marker in its place.
    /// Default for log-shaped streams, where a gap is tolerable.
    DropOldest,
    /// Disconnect the subscriber outright. Default for progress streams,
    /// where a silently-incomplete sequence would mislead the caller.
    Disconnect,
}

struct QueueState {
    frames: VecDeque<EventFrame>,
    disconnected: bool,
}

/// A subscriber's bounded outbound queue plus the bookkeeping the Stream
/// Manager needs to enforce its backpressure policy (§3's Subscriber).
pub struct Subscriber {
    pub id: Uuid,
    pub principal_id: String,
    capacity: usize,
    policy: BackpressurePolicy,
    state: Mutex<QueueState>,
    notify: Notify,
    last_activity: Mutex<Instant>,
}

impl Subscriber {
    pub fn new(principal_id: impl Into<String>, capacity: usize, policy: BackpressurePolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id: principal_id.into(),
            capacity: capacity.max(1),
            policy,
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                disconnected: false,
            }),
            notify: Notify::new(),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Enqueues `frame` for delivery. Returns `false` if the subscriber has
    /// been (or as a result of this push now is) disconnected — the caller
    /// should drop it from the stream's subscriber set.
    pub fn push(&self, frame: EventFrame) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return false;
        }

        if state.frames.len() >= self.capacity {
            match self.policy {
                BackpressurePolicy::Disconnect => {
                    state.disconnected = true;
                    return false;
                }
                BackpressurePolicy::DropOldest => {
                    let front_is_lag_marker = state
                        .frames
                        .front()
                        .map(|f| is_lag_warning(&f.event))
                        .unwrap_or(false);
                    state.frames.pop_front();
                    if !front_is_lag_marker {
                        state.frames.push_front(EventFrame {
                            stream_id: frame.stream_id,
                            seq: frame.seq,
                            event: lag_warning(),
                        });
                    }
                }
            }
        }
        state.frames.push_back(frame);
        drop(state);
        self.notify.notify_one();
        true
    }

    /// Pulls the next queued frame, waiting if none is available yet.
    /// Returns `None` once the subscriber has disconnected with nothing left
    /// to drain.
    pub async fn recv(&self) -> Option<EventFrame> {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if let Some(frame) = state.frames.pop_front() {
                    drop(state);
                    *self.last_activity.lock().unwrap() = Instant::now();
                    return Some(frame);
                }
                if state.disconnected {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
        self.notify.notify_one();
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.lock().unwrap().disconnected
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity.lock().unwrap().elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_parse::ParsedEvent;

    fn frame(stream_id: Uuid, seq: u64) -> EventFrame {
        EventFrame {
            stream_id,
            seq,
            event: ParsedEvent::Output {
                raw_line: seq.to_string(),
                parsed_structure: None,
            },
        }
    }

    #[tokio::test]
    async fn drop_oldest_inserts_a_lag_marker_and_keeps_accepting() {
        let stream_id = Uuid::new_v4();
        let sub = Subscriber::new("user-1", 2, BackpressurePolicy::DropOldest);
        assert!(sub.push(frame(stream_id, 1)));
        assert!(sub.push(frame(stream_id, 2)));
        assert!(sub.push(frame(stream_id, 3)));

        let first = sub.recv().await.unwrap();
        assert!(is_lag_warning(&first.event));
        let second = sub.recv().await.unwrap();
        assert_eq!(second.seq, 3);
    }

    #[tokio::test]
    async fn disconnect_policy_drops_the_subscriber_on_overflow() {
        let stream_id = Uuid::new_v4();
        let sub = Subscriber::new("user-1", 1, BackpressurePolicy::Disconnect);
        assert!(sub.push(frame(stream_id, 1)));
        assert!(!sub.push(frame(stream_id, 2)));
        assert!(sub.is_disconnected());
    }
}
