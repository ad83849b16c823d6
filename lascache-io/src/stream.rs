//! Streaming LAS point record decoder
//!
//! Scans the point-data section of a LAS buffer sequentially, decodes the
//! raw XYZ integer fields into output coordinates and delivers them in
//! fixed-size batches. The scan is cooperative: a shared cancellation flag
//! is checked once per record, and a partially accumulated batch is always
//! flushed before the scan ends so no decoded point is silently dropped.
//!
//! A single file can hold tens of millions of records; callers are expected
//! to run this off their main control path (see `lascache-convert`).

use crate::error::DecodeError;
use crate::las::LasHeader;
use lascache_core::Point3f;
use std::sync::atomic::{AtomicBool, Ordering};

/// Points delivered per batch callback invocation.
pub const READER_BATCH_SIZE: usize = 1000;

// Byte positions of the raw i32 coordinate fields inside one point record.
// Shared by every LAS point data format.
const RECORD_X: usize = 0;
const RECORD_Y: usize = 4;
const RECORD_Z: usize = 8;

fn record_i32(record: &[u8], at: usize) -> i32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&record[at..at + 4]);
    i32::from_le_bytes(buf)
}

// raw integer * scale + offset per axis, computed in f64 and narrowed to
// the public single-precision point type.
fn decode_record(record: &[u8], header: &LasHeader) -> Point3f {
    let x = f64::from(record_i32(record, RECORD_X)) * header.scale.x + header.offset.x;
    let y = f64::from(record_i32(record, RECORD_Y)) * header.scale.y + header.offset.y;
    let z = f64::from(record_i32(record, RECORD_Z)) * header.scale.z + header.offset.z;
    Point3f::new(x as f32, y as f32, z as f32)
}

/// Scans every point record in `bytes` and emits decoded points in batches.
///
/// A record is kept only when its zero-based index modulo `1 + point_skip`
/// is zero; skipped records are still traversed so the scan stays strictly
/// sequential. Full batches of [`READER_BATCH_SIZE`] points are handed to
/// `on_batch`, with any remainder flushed at end of stream.
///
/// When `cancel` is observed set, scanning stops, the accumulated partial
/// batch is flushed and the remaining records are abandoned.
///
/// Returns the number of points emitted.
pub fn stream_points<F>(
    bytes: &[u8],
    header: &LasHeader,
    point_skip: usize,
    cancel: &AtomicBool,
    mut on_batch: F,
) -> Result<usize, DecodeError>
where
    F: FnMut(Vec<Point3f>),
{
    let record_length = header.point_data_record_length as usize;
    let start = header.offset_to_point_data as usize;
    let stride = 1 + point_skip;

    let mut batch = Vec::with_capacity(READER_BATCH_SIZE);
    let mut emitted = 0usize;

    for index in 0..header.number_of_point_records as usize {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if index % stride != 0 {
            continue;
        }

        let begin = start + index * record_length;
        let record = bytes.get(begin..begin + record_length).ok_or_else(|| {
            DecodeError::BadLayout(format!(
                "point record {} out of range at byte {}",
                index, begin
            ))
        })?;

        batch.push(decode_record(record, header));
        emitted += 1;

        if batch.len() == READER_BATCH_SIZE {
            on_batch(std::mem::replace(
                &mut batch,
                Vec::with_capacity(READER_BATCH_SIZE),
            ));
        }
    }

    if !batch.is_empty() {
        on_batch(batch);
    }

    Ok(emitted)
}

/// Decodes only the first point record of a file.
///
/// Used as an anchor preview without running a full conversion job.
pub fn first_point(bytes: &[u8], header: &LasHeader) -> Result<Point3f, DecodeError> {
    if header.number_of_point_records == 0 {
        return Err(DecodeError::BadLayout(
            "file contains no point records".to_string(),
        ));
    }
    let start = header.offset_to_point_data as usize;
    let record = bytes
        .get(start..start + header.point_data_record_length as usize)
        .ok_or_else(|| {
            DecodeError::BadLayout(format!("point record 0 out of range at byte {}", start))
        })?;
    Ok(decode_record(record, header))
}
