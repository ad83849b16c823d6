//! Task identity and progress reporting types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque identifier for a running conversion task.
///
/// Identifiers are assigned at task creation time and are stable for the
/// lifetime of a run, independent of whichever thread happens to execute
/// the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Point-in-time copy of per-task completion fractions in `[0, 1]`.
///
/// Entries are never removed; a task that finished normally reports
/// exactly `1.0`.
pub type ProgressSnapshot = HashMap<TaskId, f32>;
