//! Event bus
//!
//! Decoupled many-to-many delivery of typed, timestamped records across
//! concurrent services. Each topic owns a bounded FIFO; when a buffer is
//! full the oldest event is discarded and a cumulative dropped counter is
//! incremented. Overflow is observable, never an error: publishers do not
//! block and `publish` cannot fail.
//!
//! A single mutex guards the whole bus. At the target rates (≤ ~10⁴
//! events/s) contention is negligible and per-topic FIFO ordering falls
//! out of the critical section; no ordering is promised across topics.

use melvin_core::events::{monotonic_micros, Event, Payload};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 1024;

struct TopicBuffer {
    events: VecDeque<Event>,
}

pub struct EventBus {
    topics: Mutex<HashMap<String, TopicBuffer>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Stamp and enqueue a payload. When the topic buffer is at capacity
    /// the head element is discarded and the dropped counter moves by
    /// exactly one before the append.
    pub fn publish(&self, topic: &str, payload: Payload) {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        // Stamped inside the critical section so per-topic FIFO order and
        // timestamp order agree.
        let event = Event {
            topic: topic.to_string(),
            timestamp_us: monotonic_micros(),
            payload,
        };
        let buffer = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicBuffer {
                events: VecDeque::with_capacity(16),
            });
        if buffer.events.len() >= self.capacity {
            buffer.events.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(topic, "topic buffer full, dropped oldest event");
        }
        buffer.events.push_back(event);
    }

    /// Atomically drain the topic, oldest first. Empty Vec when the topic
    /// has no buffer or it is empty.
    pub fn poll(&self, topic: &str) -> Vec<Event> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        match topics.get_mut(topic) {
            Some(buffer) => buffer.events.drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// Non-destructive: the most recently published event, if any.
    pub fn get_latest(&self, topic: &str) -> Option<Event> {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).and_then(|b| b.events.back().cloned())
    }

    /// Empty the topic's buffer. Does not touch the dropped counter.
    pub fn clear(&self, topic: &str) {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(buffer) = topics.get_mut(topic) {
            buffer.events.clear();
        }
    }

    /// Cumulative overflow count across all topics. Non-decreasing.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Current depth of one topic buffer (diagnostics).
    pub fn depth(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).map_or(0, |b| b.events.len())
    }
}
