use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Recently accepted client action ids, bounded by both age and count.
#[derive(Debug, Clone)]
pub struct IdempotencyCache {
    seen: VecDeque<(String, Instant)>,
    ttl: Duration,
    capacity: usize,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            seen: VecDeque::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&mut self, action_id: &str, now: Instant) -> bool {
        self.evict_expired(now);
        self.seen.iter().any(|(id, _)| id == action_id)
    }

    pub fn record(&mut self, action_id: impl Into<String>, now: Instant) {
        self.evict_expired(now);
        self.seen.push_back((action_id.into(), now));
        while self.seen.len() > self.capacity {
            self.seen.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some((_, at)) = self.seen.front() {
            if now.saturating_duration_since(*at) >= self.ttl {
                self.seen.pop_front();
            } else {
                break;
            }
        }
    }
}
