use std::collections::VecDeque;

use crate::event::EventFrame;

/// Fixed-capacity history of recently published frames. Oldest is evicted
/// once full (§3's Stream: "ring buffer of recent events, oldest evicted").
pub struct RingBuffer {
    capacity: usize,
    frames: VecDeque<EventFrame>,
    truncated: bool,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            frames: VecDeque::with_capacity(capacity),
            truncated: false,
        }
    }

    pub fn push(&mut self, frame: EventFrame) {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
            self.truncated = true;
        }
        self.frames.push_back(frame);
    }

    /// Whether any frame has ever been evicted from this buffer — a late
    /// joiner sees the earliest surviving frame, not the stream's start.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Every frame currently retained, oldest first.
    pub fn snapshot(&self) -> Vec<EventFrame> {
        self.frames.iter().cloned().collect()
    }
}
