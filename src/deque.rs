//! A concurrency-safe double-ended work queue built on
//! `tokio::sync::Mutex` + `tokio::sync::Notify`.
//!
//! Priority discipline: priority items (terminal sentinels, sitemaps,
//! feeds, explicit `high_priority`) push right and are popped next; normal
//! items push left and are only popped once the right side has drained.
//! This is weighted LIFO for priority, FIFO among normals relative to
//! priority items — priority-preemptive, intentionally not strict FIFO.

use crate::model::WorkItem;
use std::collections::VecDeque;
use tokio::sync::{Mutex, Notify};

pub struct WorkDeque {
    items: Mutex<VecDeque<WorkItem>>,
    notify: Notify,
}

impl Default for WorkDeque {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkDeque {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Insert at the left end (normal-priority items).
    pub async fn push_left(&self, item: WorkItem) {
        self.items.lock().await.push_front(item);
        self.notify.notify_one();
    }

    /// Insert at the right end (priority items).
    pub async fn push_right(&self, item: WorkItem) {
        self.items.lock().await.push_back(item);
        self.notify.notify_one();
    }

    /// Insert at whichever end `item.enters_priority_side()` dictates.
    pub async fn push(&self, item: WorkItem) {
        if item.enters_priority_side() {
            self.push_right(item).await;
        } else {
            self.push_left(item).await;
        }
    }

    /// Remove and return the rightmost item, waiting while the deque is
    /// empty.
    pub async fn pop_right(&self) -> WorkItem {
        loop {
            // Register for a wake-up *before* checking, so a push that
            // races us between the check and the wait is never missed.
            let notified = self.notify.notified();
            {
                let mut items = self.items.lock().await;
                if let Some(item) = items.pop_back() {
                    return item;
                }
            }
            notified.await;
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}
