//! Bounded hand-off queue between the capture task and the pipeline worker
//!
//! `push` never waits: when the queue is full the oldest pending item is
//! dropped so the reader keeps up with the card reader.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    capacity: usize,
}

/// Cloneable handle; all clones share one queue
pub struct HandoffQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for HandoffQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> HandoffQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity.max(1)),
                    closed: false,
                }),
                notify: Notify::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Enqueue `item`, returning the evicted oldest item if the queue was full
    ///
    /// After `close` the item is handed back as `Err`.
    pub fn push(&self, item: T) -> Result<Option<T>, T> {
        let evicted = {
            let mut state = self.lock();
            if state.closed {
                return Err(item);
            }
            let evicted = if state.items.len() >= self.shared.capacity {
                state.items.pop_front()
            } else {
                None
            };
            state.items.push_back(item);
            evicted
        };
        self.shared.notify.notify_one();
        Ok(evicted)
    }

    /// Wait for the next item; None once the queue is closed and drained
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting items; pending items can still be popped
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<T>> {
        // Never held across an await; a poisoned lock still guards valid data
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
