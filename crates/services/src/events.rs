//! Per-board event bus: every mutation publishes a typed event after its
//! transaction commits (never before — a rolled-back transaction produces
//! no event), tagged with a monotonic per-board sequence number so
//! subscribers can detect gaps. Each subscriber gets its own bounded
//! queue; a slow consumer has its oldest event dropped to make room
//! rather than the publisher ever blocking on it.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// Default bound on a subscriber's undelivered-event queue.
pub const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskMoved,
    TaskStatusChanged,
    NoteAdded,
    TagCreated,
    TagAttached,
    TagDetached,
    DependencyAdded,
    DependencyRemoved,
    DependencyBlocked,
    DependencyUnblocked,
    PriorityChanged,
    SubtaskCompleted,
    BackupStarted,
    BackupCompleted,
    BackupFailed,
}

impl EventKind {
    /// The part before `:` in the wire name — what a subscription's topic
    /// mask filters on.
    pub fn topic(self) -> &'static str {
        match self {
            EventKind::TaskCreated
            | EventKind::TaskUpdated
            | EventKind::TaskMoved
            | EventKind::TaskStatusChanged => "task",
            EventKind::NoteAdded => "note",
            EventKind::TagCreated | EventKind::TagAttached | EventKind::TagDetached => "tag",
            EventKind::DependencyAdded
            | EventKind::DependencyRemoved
            | EventKind::DependencyBlocked
            | EventKind::DependencyUnblocked => "dependency",
            EventKind::PriorityChanged => "priority",
            EventKind::SubtaskCompleted => "subtask",
            EventKind::BackupStarted | EventKind::BackupCompleted | EventKind::BackupFailed => "backup",
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::TaskCreated => "task:created",
            EventKind::TaskUpdated => "task:updated",
            EventKind::TaskMoved => "task:moved",
            EventKind::TaskStatusChanged => "task:status_changed",
            EventKind::NoteAdded => "note:added",
            EventKind::TagCreated => "tag:created",
            EventKind::TagAttached => "tag:attached",
            EventKind::TagDetached => "tag:detached",
            EventKind::DependencyAdded => "dependency:added",
            EventKind::DependencyRemoved => "dependency:removed",
            EventKind::DependencyBlocked => "dependency:blocked",
            EventKind::DependencyUnblocked => "dependency:unblocked",
            EventKind::PriorityChanged => "priority:changed",
            EventKind::SubtaskCompleted => "subtask:completed",
            EventKind::BackupStarted => "backup:started",
            EventKind::BackupCompleted => "backup:completed",
            EventKind::BackupFailed => "backup:failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub board_id: Uuid,
    pub seq: u64,
    #[serde(rename = "type", serialize_with = "serialize_wire_name")]
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

fn serialize_wire_name<S: serde::Serializer>(kind: &EventKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.wire_name())
}

struct Queue {
    buffer: VecDeque<Arc<Event>>,
    lost: u64,
}

struct Subscriber {
    board_filter: Option<Uuid>,
    topics: Option<HashSet<&'static str>>,
    queue: Arc<Mutex<Queue>>,
    notify: Arc<Notify>,
}

/// A handle a caller polls for events. `recv` returns the next event along
/// with how many events were dropped immediately before it (0 unless the
/// consumer fell behind).
pub struct Subscription {
    id: Uuid,
    queue: Arc<Mutex<Queue>>,
    notify: Arc<Notify>,
    hub: EventHub,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&mut self) -> (Arc<Event>, u64) {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(event) = queue.buffer.pop_front() {
                    let lost = std::mem::take(&mut queue.lost);
                    return (event, lost);
                }
            }
            self.notify.notified().await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

#[derive(Clone, Default)]
pub struct EventHub {
    sequences: Arc<DashMap<Uuid, AtomicU64>>,
    subscribers: Arc<DashMap<Uuid, Subscriber>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// `board_filter = None` subscribes to every board (the WebSocket
    /// gateway's `"*"` room). `topics = None` subscribes to every event
    /// type.
    pub fn subscribe(&self, board_filter: Option<Uuid>, topics: Option<HashSet<&'static str>>) -> Subscription {
        let id = Uuid::new_v4();
        let queue = Arc::new(Mutex::new(Queue {
            buffer: VecDeque::with_capacity(QUEUE_CAPACITY),
            lost: 0,
        }));
        let notify = Arc::new(Notify::new());
        self.subscribers.insert(
            id,
            Subscriber { board_filter, topics, queue: queue.clone(), notify: notify.clone() },
        );
        Subscription { id, queue, notify, hub: self.clone() }
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Assigns the next per-board sequence number and fans the event out
    /// to every matching subscriber, then returns it (for the caller's own
    /// logging, not for re-publishing). Call only after the transaction
    /// producing this event has committed.
    pub async fn publish(&self, board_id: Uuid, kind: EventKind, payload: serde_json::Value) -> Arc<Event> {
        let seq = self
            .sequences
            .entry(board_id)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        let event = Arc::new(Event { board_id, seq, kind, payload, occurred_at: Utc::now() });

        for entry in self.subscribers.iter() {
            let sub = entry.value();
            if sub.board_filter.is_some_and(|b| b != board_id) {
                continue;
            }
            if let Some(topics) = &sub.topics {
                if !topics.contains(kind.topic()) {
                    continue;
                }
            }
            let mut queue = sub.queue.lock().await;
            if queue.buffer.len() >= QUEUE_CAPACITY {
                queue.buffer.pop_front();
                queue.lost += 1;
            }
            queue.buffer.push_back(event.clone());
            sub.notify.notify_one();
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_events_for_its_board_only() {
        let hub = EventHub::new();
        let board_a = Uuid::new_v4();
        let board_b = Uuid::new_v4();
        let mut sub = hub.subscribe(Some(board_a), None);

        hub.publish(board_a, EventKind::TaskCreated, serde_json::json!({})).await;
        hub.publish(board_b, EventKind::TaskCreated, serde_json::json!({})).await;
        hub.publish(board_a, EventKind::TaskUpdated, serde_json::json!({})).await;

        let (first, lost) = sub.recv().await;
        assert_eq!(first.board_id, board_a);
        assert_eq!(lost, 0);
        let (second, _) = sub.recv().await;
        assert_eq!(second.kind, EventKind::TaskUpdated);
    }

    #[tokio::test]
    async fn sequence_numbers_are_monotonic_per_board() {
        let hub = EventHub::new();
        let board = Uuid::new_v4();
        let first = hub.publish(board, EventKind::TaskCreated, serde_json::json!({})).await;
        let second = hub.publish(board, EventKind::TaskUpdated, serde_json::json!({})).await;
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
    }

    #[tokio::test]
    async fn topic_mask_filters_out_unrelated_events() {
        let hub = EventHub::new();
        let board = Uuid::new_v4();
        let mut sub = hub.subscribe(Some(board), Some(HashSet::from(["note"])));
        hub.publish(board, EventKind::TaskCreated, serde_json::json!({})).await;
        hub.publish(board, EventKind::NoteAdded, serde_json::json!({})).await;
        let (event, _) = sub.recv().await;
        assert_eq!(event.kind, EventKind::NoteAdded);
    }

    #[tokio::test]
    async fn full_queue_drops_oldest_and_counts_the_loss() {
        let hub = EventHub::new();
        let board = Uuid::new_v4();
        let mut sub = hub.subscribe(Some(board), None);
        for _ in 0..(QUEUE_CAPACITY + 5) {
            hub.publish(board, EventKind::TaskUpdated, serde_json::json!({})).await;
        }
        let (_, lost) = sub.recv().await;
        assert_eq!(lost, 5);
    }
}
