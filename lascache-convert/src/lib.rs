//! Bounded-concurrency LAS to pcache conversion
//!
//! This crate provides the operational layer of lascache: a generic
//! admission-controlled work scheduler and the conversion pipeline that
//! fans decoding work across input files, buffers decoded points through
//! per-job or merged queues, and drains them into pcache writers with
//! live progress reporting and cooperative cancellation.

pub mod pipeline;
pub mod scheduler;

pub use pipeline::{
    ConversionRun, ConvertOptions, FileFailure, OutputMode, OutputReport, RunSummary,
    MAX_POINT_SKIP,
};
pub use scheduler::{BoundedScheduler, WorkHandle, WorkState, MAX_CONCURRENT_READERS};

use std::sync::{Mutex, MutexGuard};

// Locks without propagating poisoning; a panicked task must not wedge
// progress reporting or slot promotion for the rest of the run.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
