//! Admission-controlled work scheduler
//!
//! Runs at most a fixed number of submitted work items concurrently and
//! promotes queued items in submission order as slots free up. The
//! scheduler never preempts or cancels running work; cooperative stopping
//! is the work item's own business (see the pipeline's cancellation flag).

use crate::lock_unpoisoned;
use std::sync::{Arc, Mutex};
use std::thread;

/// Maximum number of reader work items running at the same time.
pub const MAX_CONCURRENT_READERS: usize = 3;

/// Lifecycle state of one submitted work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    Queued,
    Running,
    Finished,
}

type Work = Box<dyn FnOnce() + Send + 'static>;

struct WorkItem {
    state: WorkState,
    // present only while Queued
    work: Option<Work>,
}

struct Inner {
    items: Vec<WorkItem>,
    limit: usize,
}

impl Inner {
    fn running(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.state == WorkState::Running)
            .count()
    }
}

/// Handle to one submitted work item.
pub struct WorkHandle {
    id: usize,
    inner: Arc<Mutex<Inner>>,
}

impl WorkHandle {
    pub fn state(&self) -> WorkState {
        lock_unpoisoned(&self.inner).items[self.id].state
    }

    pub fn is_finished(&self) -> bool {
        self.state() == WorkState::Finished
    }
}

/// Admission-controlled scheduler running at most `limit` items at once.
#[derive(Clone)]
pub struct BoundedScheduler {
    inner: Arc<Mutex<Inner>>,
}

impl BoundedScheduler {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                items: Vec::new(),
                limit,
            })),
        }
    }

    /// Submits a unit of work. It starts immediately when a slot is free,
    /// otherwise it waits Queued in submission order.
    pub fn submit<F>(&self, work: F) -> WorkHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let boxed: Work = Box::new(work);
        let (id, start_now) = {
            let mut inner = lock_unpoisoned(&self.inner);
            let id = inner.items.len();
            if inner.running() < inner.limit {
                inner.items.push(WorkItem {
                    state: WorkState::Running,
                    work: None,
                });
                (id, Some(boxed))
            } else {
                inner.items.push(WorkItem {
                    state: WorkState::Queued,
                    work: Some(boxed),
                });
                (id, None)
            }
        };

        if let Some(work) = start_now {
            self.spawn(id, work);
        }

        WorkHandle {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Items observed started and not yet finished. A heuristic: exact
    /// consistency with concurrent promotions is not required.
    pub fn running_count(&self) -> usize {
        lock_unpoisoned(&self.inner).running()
    }

    /// Drops all queued-but-unstarted items so they are never promoted.
    /// Running items are unaffected.
    pub fn discard_queued(&self) {
        let mut inner = lock_unpoisoned(&self.inner);
        for item in &mut inner.items {
            if item.state == WorkState::Queued {
                item.state = WorkState::Finished;
                item.work = None;
            }
        }
    }

    fn spawn(&self, id: usize, work: Work) {
        let scheduler = self.clone();
        thread::spawn(move || {
            work();
            scheduler.complete(id);
        });
    }

    // Marks `id` finished and promotes the first queued item, all under
    // one critical section so two racing completions cannot promote into
    // the same freed slot.
    fn complete(&self, id: usize) {
        let promoted = {
            let mut inner = lock_unpoisoned(&self.inner);
            inner.items[id].state = WorkState::Finished;

            let next = inner
                .items
                .iter()
                .position(|item| item.state == WorkState::Queued);
            match next {
                Some(next) => {
                    debug_assert!(inner.running() < inner.limit);
                    inner.items[next].state = WorkState::Running;
                    inner.items[next].work.take().map(|work| (next, work))
                }
                None => None,
            }
        };

        if let Some((next, work)) = promoted {
            self.spawn(next, work);
        }
    }
}
