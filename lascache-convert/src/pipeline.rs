//! LAS to pcache conversion pipeline
//!
//! One conversion run fans reader tasks across the input files through the
//! [`BoundedScheduler`], routes decoded point batches into per-job queues
//! (separate mode) or one shared queue (merged mode), and drives one writer
//! task per output file. Writers start immediately and are never subject to
//! the reader concurrency cap; in separate mode they outnumber the readers
//! by design.
//!
//! Coordination is channel-shaped: a reader owns the sending side of its
//! queue and drops it when the scan ends, so a writer that has drained a
//! disconnected queue knows its reader both stopped and left nothing in
//! flight. Cancellation is one cooperative flag shared by every task in
//! the run.

use crate::lock_unpoisoned;
use crate::scheduler::{BoundedScheduler, MAX_CONCURRENT_READERS};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use lascache_core::{Error, Point3f, ProgressSnapshot, Result, TaskId, Vector3f};
use lascache_io::las::LasHeader;
use lascache_io::pcache::{PcacheWriter, PCACHE_EXTENSION};
use lascache_io::{decode_header, stream_points};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Upper bound on the skip stride; larger requests are clamped.
pub const MAX_POINT_SKIP: usize = 10_000;

/// Writer progress is recomputed every this many written lines.
const PROGRESS_INTERVAL: u64 = 1000;

/// How long a writer waits on an empty queue before rechecking.
const WRITER_POLL: Duration = Duration::from_millis(10);

/// Output routing for a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One pcache file per input file, one writer per job.
    Separate,
    /// One shared pcache file for the whole run, exactly one writer.
    Merged,
}

/// Settings for one conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub mode: OutputMode,
    /// Records skipped between two consecutively emitted points.
    pub point_skip: usize,
    /// Translate the whole run so its first decoded point becomes the
    /// origin.
    pub anchor_to_first_point: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Separate,
            point_skip: 0,
            anchor_to_first_point: false,
        }
    }
}

/// Input file that was rejected before any task was scheduled, or whose
/// header failed to decode. Other files of the run proceed regardless.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// One finished output file as reported by [`ConversionRun::wait`].
#[derive(Debug, Clone, Serialize)]
pub struct OutputReport {
    pub task: TaskId,
    pub path: PathBuf,
    /// Point count declared in the pcache header.
    pub elements: u64,
    /// Data lines actually written; less than `elements` after
    /// cancellation.
    pub written: u64,
}

/// Final accounting for a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outputs: Vec<OutputReport>,
    pub cancelled: bool,
}

// Run-global anchor translation. The zero vector is a legitimate anchor,
// so captured state is tracked explicitly instead of being inferred from
// the vector's value.
struct Anchor {
    captured: bool,
    offset: Vector3f,
}

impl Anchor {
    fn new() -> Self {
        Self {
            captured: false,
            offset: Vector3f::zeros(),
        }
    }

    fn apply(&mut self, batch: &mut [Point3f]) {
        if batch.is_empty() {
            return;
        }
        if !self.captured {
            self.offset = batch[0].coords;
            self.captured = true;
        }
        for point in batch.iter_mut() {
            *point -= self.offset;
        }
    }
}

struct WriterTask {
    id: TaskId,
    path: PathBuf,
    elements: u64,
    handle: JoinHandle<Result<u64>>,
}

// Everything a writer thread needs for progress accounting.
struct WriterCtx {
    id: TaskId,
    cancel: Arc<AtomicBool>,
    progress: Arc<Mutex<HashMap<TaskId, f32>>>,
}

impl WriterCtx {
    // Progress never decreases, even with out-of-order updates.
    fn update(&self, fraction: f32) {
        let mut progress = lock_unpoisoned(&self.progress);
        let entry = progress.entry(self.id).or_insert(0.0);
        if fraction > *entry {
            *entry = fraction;
        }
    }
}

/// A started conversion run.
///
/// Owns every reader and writer task it created. Dropping the run implies
/// cancellation; tasks observe the flag at their next cooperative check
/// rather than stopping instantly.
pub struct ConversionRun {
    cancel: Arc<AtomicBool>,
    progress: Arc<Mutex<HashMap<TaskId, f32>>>,
    scheduler: BoundedScheduler,
    writers: Vec<WriterTask>,
    failures: Vec<FileFailure>,
}

impl ConversionRun {
    /// Starts converting `inputs` into `output_dir`.
    ///
    /// Inputs that do not exist, lack the `.las` extension or carry a
    /// malformed header are recorded in [`failures`](Self::failures) and
    /// never scheduled; the remaining files proceed. Reader tasks are
    /// admission-controlled to [`MAX_CONCURRENT_READERS`]; every output
    /// file gets its writer immediately.
    pub fn start<P: AsRef<Path>>(
        inputs: &[P],
        output_dir: &Path,
        options: &ConvertOptions,
    ) -> Result<Self> {
        let point_skip = options.point_skip.min(MAX_POINT_SKIP);
        let cancel = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(Mutex::new(HashMap::new()));
        let scheduler = BoundedScheduler::new(MAX_CONCURRENT_READERS);
        let anchor = options
            .anchor_to_first_point
            .then(|| Arc::new(Mutex::new(Anchor::new())));

        info!(
            "starting conversion run: {} file(s), {:?} output, skip {}",
            inputs.len(),
            options.mode,
            point_skip
        );

        let mut run = Self {
            cancel,
            progress,
            scheduler,
            writers: Vec::new(),
            failures: Vec::new(),
        };
        let mut next_task = 0u32;

        // Merged mode: the queue and the projected total exist before any
        // reader is admitted; the single writer starts after the loop.
        let merged = (options.mode == OutputMode::Merged).then(unbounded::<Vec<Point3f>>);
        let mut merged_total = 0u64;
        let mut merged_jobs = 0usize;

        for input in inputs {
            let path = input.as_ref();
            let (bytes, header) = match load_input(path) {
                Ok(job) => job,
                Err(error) => {
                    warn!("skipping {}: {}", path.display(), error);
                    run.failures.push(FileFailure {
                        path: path.to_path_buf(),
                        error,
                    });
                    continue;
                }
            };

            let target = header.target_point_count(point_skip);
            debug!(
                "job {}: {} records, {} projected points",
                path.display(),
                header.number_of_point_records,
                target
            );

            match &merged {
                None => {
                    let file_name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "input".to_string());
                    let out_path =
                        output_dir.join(format!("{}.{}", file_name, PCACHE_EXTENSION));

                    let writer = match open_output(&out_path, target) {
                        Ok(writer) => writer,
                        Err(error) => {
                            warn!("skipping {}: {}", path.display(), error);
                            run.failures.push(FileFailure {
                                path: path.to_path_buf(),
                                error,
                            });
                            continue;
                        }
                    };

                    let id = TaskId(next_task);
                    next_task += 1;
                    lock_unpoisoned(&run.progress).insert(id, 0.0);

                    let (tx, rx) = unbounded();
                    let ctx = WriterCtx {
                        id,
                        cancel: Arc::clone(&run.cancel),
                        progress: Arc::clone(&run.progress),
                    };
                    let handle =
                        thread::spawn(move || run_writer(writer, rx, target, false, ctx));
                    run.writers.push(WriterTask {
                        id,
                        path: out_path,
                        elements: target,
                        handle,
                    });

                    submit_reader(
                        &run.scheduler,
                        bytes,
                        header,
                        point_skip,
                        tx,
                        Arc::clone(&run.cancel),
                        anchor.clone(),
                        path.to_path_buf(),
                    );
                }
                Some((tx, _)) => {
                    merged_total += target;
                    merged_jobs += 1;
                    submit_reader(
                        &run.scheduler,
                        bytes,
                        header,
                        point_skip,
                        tx.clone(),
                        Arc::clone(&run.cancel),
                        anchor.clone(),
                        path.to_path_buf(),
                    );
                }
            }
        }

        if let Some((tx, rx)) = merged {
            // readers hold their own clones
            drop(tx);

            if merged_jobs == 0 {
                warn!("merged run has no readable inputs, skipping output");
            } else {
                let timestamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|elapsed| elapsed.as_secs())
                    .unwrap_or(0);
                let out_path =
                    output_dir.join(format!("MERGED{}.{}", timestamp, PCACHE_EXTENSION));
                info!(
                    "merging {} job(s) into {} ({} points)",
                    merged_jobs,
                    out_path.display(),
                    merged_total
                );

                let writer = match open_output(&out_path, merged_total) {
                    Ok(writer) => writer,
                    Err(error) => {
                        // without its writer the whole run is pointless
                        run.cancel.store(true, Ordering::Relaxed);
                        return Err(error);
                    }
                };

                let id = TaskId(next_task);
                lock_unpoisoned(&run.progress).insert(id, 0.0);
                let ctx = WriterCtx {
                    id,
                    cancel: Arc::clone(&run.cancel),
                    progress: Arc::clone(&run.progress),
                };
                let handle =
                    thread::spawn(move || run_writer(writer, rx, merged_total, true, ctx));
                run.writers.push(WriterTask {
                    id,
                    path: out_path,
                    elements: merged_total,
                    handle,
                });
            }
        }

        Ok(run)
    }

    /// Point-in-time copy of every writer task's completion fraction.
    pub fn progress(&self) -> ProgressSnapshot {
        lock_unpoisoned(&self.progress).clone()
    }

    /// Inputs rejected before any task was scheduled.
    pub fn failures(&self) -> &[FileFailure] {
        &self.failures
    }

    /// Requests cooperative cancellation of every task in the run.
    ///
    /// Idempotent; safe after the run has already finished. Tasks exit at
    /// their next cooperative check, so callers must not assume an
    /// immediate stop.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.scheduler.discard_queued();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Blocks until every writer has finished and reports per-output line
    /// counts. Writer I/O errors surface here.
    pub fn wait(mut self) -> Result<RunSummary> {
        let mut outputs = Vec::new();
        for task in self.writers.drain(..) {
            let WriterTask {
                id,
                path,
                elements,
                handle,
            } = task;
            let written = handle.join().map_err(|_| {
                Error::TaskFailed(format!("writer for {} panicked", path.display()))
            })??;
            outputs.push(OutputReport {
                task: id,
                path,
                elements,
                written,
            });
        }
        Ok(RunSummary {
            outputs,
            cancelled: self.cancel.load(Ordering::Relaxed),
        })
    }
}

impl Drop for ConversionRun {
    fn drop(&mut self) {
        self.cancel();
    }
}

// Synchronous per-file admission: existence, extension, header decode.
fn load_input(path: &Path) -> Result<(Vec<u8>, LasHeader)> {
    if !path.is_file() {
        return Err(Error::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let is_las = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("las"))
        .unwrap_or(false);
    if !is_las {
        return Err(Error::UnsupportedFormat {
            path: path.display().to_string(),
        });
    }

    let bytes = fs::read(path)?;
    // offsets suppressed: normalized into the safe small-number range
    let header = decode_header(&bytes, true)
        .map_err(|err| Error::InvalidData(format!("{}: {}", path.display(), err)))?;
    Ok((bytes, header))
}

fn open_output(path: &Path, elements: u64) -> Result<PcacheWriter<BufWriter<File>>> {
    let file = File::create(path)?;
    Ok(PcacheWriter::new(BufWriter::new(file), elements)?)
}

#[allow(clippy::too_many_arguments)]
fn submit_reader(
    scheduler: &BoundedScheduler,
    bytes: Vec<u8>,
    header: LasHeader,
    point_skip: usize,
    tx: Sender<Vec<Point3f>>,
    cancel: Arc<AtomicBool>,
    anchor: Option<Arc<Mutex<Anchor>>>,
    path: PathBuf,
) {
    scheduler.submit(move || {
        let result = stream_points(&bytes, &header, point_skip, &cancel, |mut batch| {
            if let Some(anchor) = &anchor {
                lock_unpoisoned(anchor).apply(&mut batch);
            }
            // the writer may already be gone (cancelled or target reached)
            let _ = tx.send(batch);
        });
        match result {
            Ok(count) => debug!("decoded {} point(s) from {}", count, path.display()),
            Err(err) => warn!("decoding {} stopped: {}", path.display(), err),
        }
    });
}

// Drains one queue into one pcache file.
//
// Termination: the run-level cancellation flag, a disconnected *and*
// drained queue (the paired readers dropped their senders after their last
// batch), or - when `stop_at_target` - the precomputed total, after which
// still-arriving batches are deliberately never drained.
fn run_writer(
    mut writer: PcacheWriter<BufWriter<File>>,
    rx: Receiver<Vec<Point3f>>,
    target: u64,
    stop_at_target: bool,
    ctx: WriterCtx,
) -> Result<u64> {
    loop {
        if ctx.cancel.load(Ordering::Relaxed) {
            // cancelled output is best effort: flush what was written and
            // leave progress at its last value
            let written = writer.written();
            writer.finish()?;
            return Ok(written);
        }
        if stop_at_target && writer.written() >= target {
            break;
        }

        match rx.recv_timeout(WRITER_POLL) {
            Ok(batch) => {
                for point in &batch {
                    if stop_at_target && writer.written() >= target {
                        break;
                    }
                    writer.write_point(point)?;
                    if writer.written() % PROGRESS_INTERVAL == 0 {
                        ctx.update(writer.written() as f32 / target.max(1) as f32);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    ctx.update(1.0);
    let written = writer.written();
    writer.finish()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lascache_core::Vector3d;
    use lascache_io::las::{encode_header, HEADER_SIZE};
    use std::io::Write;
    use std::time::Instant;
    use tempfile::TempDir;

    const RECORD_LENGTH: u16 = 20;

    fn write_las_file(
        dir: &Path,
        name: &str,
        raw_points: &[(i32, i32, i32)],
        scale: f64,
    ) -> PathBuf {
        let header = LasHeader {
            version_major: 1,
            version_minor: 2,
            header_size: HEADER_SIZE as u16,
            offset_to_point_data: HEADER_SIZE as u32,
            point_data_format: 0,
            point_data_record_length: RECORD_LENGTH,
            number_of_point_records: raw_points.len() as u32,
            scale: Vector3d::new(scale, scale, scale),
            offset: Vector3d::zeros(),
            offset_suppressed: false,
        };
        let mut bytes = encode_header(&header);
        for (x, y, z) in raw_points {
            let mut record = vec![0u8; RECORD_LENGTH as usize];
            record[0..4].copy_from_slice(&x.to_le_bytes());
            record[4..8].copy_from_slice(&y.to_le_bytes());
            record[8..12].copy_from_slice(&z.to_le_bytes());
            bytes.extend_from_slice(&record);
        }
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn data_lines(path: &Path) -> (u64, Vec<String>) {
        let text = fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("pcache"));
        assert_eq!(lines.next(), Some("format ascii 1.0"));
        let elements = lines
            .next()
            .unwrap()
            .strip_prefix("elements ")
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(lines.next(), Some("property float position.x"));
        assert_eq!(lines.next(), Some("property float position.y"));
        assert_eq!(lines.next(), Some("property float position.z"));
        assert_eq!(lines.next(), Some("end_header"));
        (elements, lines.map(str::to_string).collect())
    }

    fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn separate_mode_converts_one_file() {
        let dir = TempDir::new().unwrap();
        let input = write_las_file(
            dir.path(),
            "points.las",
            &[(100, 200, 300), (400, 500, 600)],
            0.01,
        );

        let run =
            ConversionRun::start(&[&input], dir.path(), &ConvertOptions::default()).unwrap();
        assert!(run.failures().is_empty());
        let summary = run.wait().unwrap();

        assert!(!summary.cancelled);
        assert_eq!(summary.outputs.len(), 1);
        assert_eq!(summary.outputs[0].written, 2);

        let out_path = dir.path().join("points.las.pcache");
        assert_eq!(summary.outputs[0].path, out_path);
        let (elements, lines) = data_lines(&out_path);
        assert_eq!(elements, 2);
        assert_eq!(lines, vec!["1 2 3", "4 5 6"]);
    }

    #[test]
    fn separate_mode_preserves_record_order_across_skips() {
        let dir = TempDir::new().unwrap();
        let raw: Vec<(i32, i32, i32)> = (0..50).map(|i| (i, 0, 0)).collect();

        for skip in [0usize, 1, 3, 7] {
            let input = write_las_file(dir.path(), &format!("skip{}.las", skip), &raw, 1.0);
            let options = ConvertOptions {
                point_skip: skip,
                ..ConvertOptions::default()
            };
            let summary = ConversionRun::start(&[&input], dir.path(), &options)
                .unwrap()
                .wait()
                .unwrap();

            let stride = 1 + skip;
            let expected = (50 + stride as u64 - 1) / stride as u64;
            let (elements, lines) = data_lines(&summary.outputs[0].path);
            assert_eq!(elements, expected);
            assert_eq!(lines.len(), expected as usize);
            for (i, line) in lines.iter().enumerate() {
                assert_eq!(line, &format!("{} 0 0", i * stride));
            }
        }
    }

    #[test]
    fn merged_mode_declares_and_writes_total() {
        let dir = TempDir::new().unwrap();
        let a = write_las_file(dir.path(), "a.las", &[(1, 1, 1), (2, 2, 2), (3, 3, 3)], 1.0);
        let b = write_las_file(dir.path(), "b.las", &[(4, 4, 4), (5, 5, 5)], 1.0);

        let options = ConvertOptions {
            mode: OutputMode::Merged,
            ..ConvertOptions::default()
        };
        let summary = ConversionRun::start(&[&a, &b], dir.path(), &options)
            .unwrap()
            .wait()
            .unwrap();

        assert_eq!(summary.outputs.len(), 1);
        assert_eq!(summary.outputs[0].elements, 5);
        assert_eq!(summary.outputs[0].written, 5);

        let name = summary.outputs[0]
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("MERGED"), "unexpected name {}", name);
        assert!(name.ends_with(".pcache"));

        let (elements, lines) = data_lines(&summary.outputs[0].path);
        assert_eq!(elements, 5);
        assert_eq!(lines.len(), 5);
        // no inter-file ordering in merged mode; verify the multiset
        let mut sorted = lines.clone();
        sorted.sort();
        let mut expected: Vec<String> = (1..=5).map(|i| format!("{0} {0} {0}", i)).collect();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn anchor_zeroes_the_first_point_of_the_run() {
        let dir = TempDir::new().unwrap();
        let input = write_las_file(
            dir.path(),
            "anchored.las",
            &[(100, 200, 300), (400, 500, 600)],
            0.01,
        );

        let options = ConvertOptions {
            anchor_to_first_point: true,
            ..ConvertOptions::default()
        };
        let summary = ConversionRun::start(&[&input], dir.path(), &options)
            .unwrap()
            .wait()
            .unwrap();

        let (_, lines) = data_lines(&summary.outputs[0].path);
        assert_eq!(lines, vec!["0 0 0", "3 3 3"]);
    }

    #[test]
    fn anchor_is_shared_across_files_in_a_run() {
        let dir = TempDir::new().unwrap();
        let a = write_las_file(dir.path(), "a.las", &[(10, 10, 10), (11, 11, 11)], 1.0);
        let b = write_las_file(dir.path(), "b.las", &[(20, 20, 20), (22, 22, 22)], 1.0);

        let options = ConvertOptions {
            mode: OutputMode::Merged,
            anchor_to_first_point: true,
            ..ConvertOptions::default()
        };
        let summary = ConversionRun::start(&[&a, &b], dir.path(), &options)
            .unwrap()
            .wait()
            .unwrap();

        let (_, lines) = data_lines(&summary.outputs[0].path);
        assert_eq!(lines.len(), 4);
        // one anchor for the whole run, donated by whichever reader
        // decodes its first batch first
        assert_eq!(lines.iter().filter(|line| *line == "0 0 0").count(), 1);

        let mut sorted = lines.clone();
        sorted.sort();
        let anchored_to_a = vec!["0 0 0", "1 1 1", "10 10 10", "12 12 12"];
        let anchored_to_b = vec!["-10 -10 -10", "-9 -9 -9", "0 0 0", "2 2 2"];
        assert!(
            sorted == anchored_to_a || sorted == anchored_to_b,
            "points not shifted by a single run-wide anchor: {:?}",
            sorted
        );
    }

    #[test]
    fn invalid_inputs_are_rejected_before_scheduling() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.las");
        let wrong_ext = dir.path().join("notes.txt");
        fs::write(&wrong_ext, "not a point cloud").unwrap();
        let truncated = dir.path().join("truncated.las");
        let mut file = File::create(&truncated).unwrap();
        file.write_all(&[0u8; 32]).unwrap();
        drop(file);

        let run = ConversionRun::start(
            &[&missing, &wrong_ext, &truncated],
            dir.path(),
            &ConvertOptions::default(),
        )
        .unwrap();

        assert_eq!(run.failures().len(), 3);
        assert!(matches!(
            run.failures()[0].error,
            Error::FileNotFound { .. }
        ));
        assert!(matches!(
            run.failures()[1].error,
            Error::UnsupportedFormat { .. }
        ));
        assert!(matches!(run.failures()[2].error, Error::InvalidData(_)));
        assert!(run.progress().is_empty());

        let summary = run.wait().unwrap();
        assert!(summary.outputs.is_empty());
    }

    #[test]
    fn bad_file_does_not_abort_the_rest_of_the_run() {
        let dir = TempDir::new().unwrap();
        let good = write_las_file(dir.path(), "good.las", &[(7, 8, 9)], 1.0);
        let bad = dir.path().join("bad.las");
        fs::write(&bad, &[0u8; 16]).unwrap();

        let summary = ConversionRun::start(&[&bad, &good], dir.path(), &ConvertOptions::default())
            .map(|run| {
                assert_eq!(run.failures().len(), 1);
                run
            })
            .unwrap()
            .wait()
            .unwrap();

        assert_eq!(summary.outputs.len(), 1);
        assert_eq!(summary.outputs[0].written, 1);
        let (_, lines) = data_lines(&summary.outputs[0].path);
        assert_eq!(lines, vec!["7 8 9"]);
    }

    #[test]
    fn progress_is_readable_and_finalizes_to_one() {
        let dir = TempDir::new().unwrap();
        let raw: Vec<(i32, i32, i32)> = (0..5000).map(|i| (i, i, i)).collect();
        let input = write_las_file(dir.path(), "big.las", &raw, 1.0);

        let run =
            ConversionRun::start(&[&input], dir.path(), &ConvertOptions::default()).unwrap();
        assert_eq!(run.progress().len(), 1);

        wait_until("progress to reach 1.0", || {
            run.progress().values().all(|fraction| *fraction >= 1.0)
        });

        let summary = run.wait().unwrap();
        assert_eq!(summary.outputs[0].written, 5000);
    }

    #[test]
    fn cancellation_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let raw: Vec<(i32, i32, i32)> = (0..200_000).map(|i| (i, i, i)).collect();
        let input = write_las_file(dir.path(), "large.las", &raw, 1.0);

        let run =
            ConversionRun::start(&[&input], dir.path(), &ConvertOptions::default()).unwrap();
        run.cancel();
        run.cancel();
        assert!(run.is_cancelled());

        let summary = run.wait().unwrap();
        assert!(summary.cancelled);
        // the declared count may overstate the written lines
        let (elements, lines) = data_lines(&summary.outputs[0].path);
        assert_eq!(elements, 200_000);
        assert!(lines.len() <= 200_000);
    }

    #[test]
    fn cancel_after_completion_is_harmless() {
        let dir = TempDir::new().unwrap();
        let input = write_las_file(dir.path(), "small.las", &[(1, 2, 3)], 1.0);

        let run =
            ConversionRun::start(&[&input], dir.path(), &ConvertOptions::default()).unwrap();
        wait_until("run to complete", || {
            run.progress().values().all(|fraction| *fraction >= 1.0)
        });

        run.cancel();
        run.cancel();
        let summary = run.wait().unwrap();
        assert_eq!(summary.outputs[0].written, 1);
        let (_, lines) = data_lines(&summary.outputs[0].path);
        assert_eq!(lines, vec!["1 2 3"]);
    }

    #[test]
    fn skip_is_clamped_to_maximum() {
        let dir = TempDir::new().unwrap();
        let raw: Vec<(i32, i32, i32)> = (0..3).map(|i| (i, 0, 0)).collect();
        let input = write_las_file(dir.path(), "clamped.las", &raw, 1.0);

        let options = ConvertOptions {
            point_skip: usize::MAX,
            ..ConvertOptions::default()
        };
        let summary = ConversionRun::start(&[&input], dir.path(), &options)
            .unwrap()
            .wait()
            .unwrap();

        // skip clamps to MAX_POINT_SKIP, keeping only record 0
        assert_eq!(summary.outputs[0].written, 1);
    }
}
