//! Sequential batch execution on a background worker.
//!
//! Jobs run strictly in input order, one at a time, on a dedicated thread
//! so the invoking layer stays responsive. Progress is delivered through a
//! channel of [`BatchEvent`]s, always in job order. Cancellation is
//! cooperative: it is checked only between jobs, so an in-flight
//! reconstruction always runs to completion (there are no timeouts; a hung
//! backend hangs the batch).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::detection::DetectionParams;
use crate::engine::WatermarkRemover;
use crate::error::Error;

/// One unit of batch work: a single input image, its output path, and the
/// parameters to process it with. Consumed by exactly one processing
/// attempt; failed jobs are never retried.
#[derive(Debug, Clone)]
pub struct ImageJob {
    /// Image to read.
    pub input: PathBuf,
    /// Where the processed image is written.
    pub output: PathBuf,
    /// Detection parameters for this job.
    pub params: DetectionParams,
}

/// Progress notifications emitted by the batch worker, in job order.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A job is about to be processed.
    Started {
        /// The job's input path.
        input: PathBuf,
    },
    /// A job finished successfully. Failed jobs emit no event; they are
    /// logged and skipped.
    Finished {
        /// The job's output path.
        output: PathBuf,
    },
    /// A job reached a terminal outcome (success or failure).
    Progress {
        /// Jobs processed so far.
        completed: usize,
        /// Total jobs in the batch.
        total: usize,
    },
    /// The batch reached a terminal state. Emitted exactly once.
    BatchFinished {
        /// False only when the output directory could not be created.
        success: bool,
        /// Human-readable summary.
        message: String,
    },
}

/// Terminal state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Every job was processed (some may have failed individually).
    Completed,
    /// Cancellation was requested; remaining jobs never started.
    Cancelled,
    /// The output directory could not be created; no jobs ran.
    Failed,
}

/// Summary returned when the batch worker exits.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// How the batch ended.
    pub state: BatchState,
    /// Total jobs submitted.
    pub total: usize,
    /// Jobs that reached a terminal outcome (success or failure).
    pub processed: usize,
    /// Jobs that produced an output image.
    pub succeeded: usize,
    /// Human-readable summary, identical to the terminal event's message.
    pub message: String,
}

/// Handle to a running batch.
///
/// Owns the event channel, the cancellation flag, and the worker thread.
pub struct BatchHandle {
    /// Ordered stream of progress events from the worker.
    pub events: Receiver<BatchEvent>,
    cancel: Arc<AtomicBool>,
    worker: JoinHandle<BatchOutcome>,
}

impl BatchHandle {
    /// Request cooperative cancellation.
    ///
    /// Guarantees no new job starts; the in-flight job (if any) still runs
    /// to completion.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Block until the batch terminates and return its outcome.
    ///
    /// # Panics
    ///
    /// Panics if the worker thread itself panicked. Job failures do not
    /// panic the worker; they are part of the outcome.
    #[must_use]
    pub fn wait(self) -> BatchOutcome {
        self.worker.join().expect("batch worker panicked")
    }
}

/// Runs batches of [`ImageJob`]s against one shared engine.
///
/// The engine is passed in explicitly and reused across jobs; it is
/// stateless per call, so no cross-job contamination is possible.
pub struct BatchRunner {
    engine: Arc<WatermarkRemover>,
}

impl BatchRunner {
    /// Create a runner around a shared engine.
    #[must_use]
    pub fn new(engine: Arc<WatermarkRemover>) -> Self {
        Self { engine }
    }

    /// Spawn the batch worker and return a handle to it.
    ///
    /// The worker first creates every distinct output parent directory; a
    /// failure there is fatal for the whole batch and is reported once,
    /// before any job runs. It then processes jobs in order, emitting
    /// [`BatchEvent`]s as it goes and finishing with exactly one
    /// [`BatchEvent::BatchFinished`].
    #[must_use]
    pub fn start(&self, jobs: Vec<ImageJob>) -> BatchHandle {
        let (tx, events) = channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let engine = Arc::clone(&self.engine);
        let flag = Arc::clone(&cancel);
        let worker = thread::spawn(move || run_batch(&engine, &jobs, &flag, &tx));

        BatchHandle {
            events,
            cancel,
            worker,
        }
    }
}

fn run_batch(
    engine: &WatermarkRemover,
    jobs: &[ImageJob],
    cancel: &AtomicBool,
    tx: &Sender<BatchEvent>,
) -> BatchOutcome {
    let total = jobs.len();

    if let Err(outcome) = create_output_dirs(jobs, total, tx) {
        return outcome;
    }

    let mut processed = 0;
    let mut succeeded = 0;
    let mut cancelled = false;

    for job in jobs {
        if cancel.load(Ordering::SeqCst) {
            cancelled = true;
            break;
        }

        let _ = tx.send(BatchEvent::Started {
            input: job.input.clone(),
        });

        match engine.process_file(&job.input, &job.output, &job.params) {
            Ok(output) => {
                succeeded += 1;
                let _ = tx.send(BatchEvent::Finished { output });
            }
            Err(e) => {
                warn!(input = %job.input.display(), error = %e, "job failed; continuing");
            }
        }

        processed += 1;
        let _ = tx.send(BatchEvent::Progress {
            completed: processed,
            total,
        });
    }

    let (state, message) = if cancelled {
        (
            BatchState::Cancelled,
            format!("batch cancelled after {processed} of {total} images"),
        )
    } else {
        (
            BatchState::Completed,
            format!("batch complete: {succeeded} of {total} images processed"),
        )
    };
    info!(%message, "batch worker exiting");

    let _ = tx.send(BatchEvent::BatchFinished {
        success: true,
        message: message.clone(),
    });

    BatchOutcome {
        state,
        total,
        processed,
        succeeded,
        message,
    }
}

/// Create every distinct output parent directory up front.
///
/// Returns the fatal [`BatchOutcome`] (already reported through `tx`) when
/// a directory cannot be created.
fn create_output_dirs(
    jobs: &[ImageJob],
    total: usize,
    tx: &Sender<BatchEvent>,
) -> Result<(), BatchOutcome> {
    let mut dirs: Vec<&Path> = Vec::new();
    for job in jobs {
        if let Some(parent) = job.output.parent() {
            if !parent.as_os_str().is_empty() && !dirs.contains(&parent) {
                dirs.push(parent);
            }
        }
    }

    for dir in dirs {
        if let Err(source) = std::fs::create_dir_all(dir) {
            let message = Error::Directory {
                path: dir.to_path_buf(),
                source,
            }
            .to_string();
            warn!(%message, "aborting batch");
            let _ = tx.send(BatchEvent::BatchFinished {
                success: false,
                message: message.clone(),
            });
            return Err(BatchOutcome {
                state: BatchState::Failed,
                total,
                processed: 0,
                succeeded: 0,
                message,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::{BoxError, Restorer};
    use image::{GrayImage, RgbImage};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct CloneRestorer;

    impl Restorer for CloneRestorer {
        fn restore(
            &self,
            image: &RgbImage,
            _mask: &GrayImage,
        ) -> std::result::Result<RgbImage, BoxError> {
            Ok(image.clone())
        }
    }

    /// Restorer that blocks until the test releases it, so tests can
    /// interleave cancellation with an in-flight job deterministically.
    struct GatedRestorer {
        calls: AtomicUsize,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl Restorer for GatedRestorer {
        fn restore(
            &self,
            image: &RgbImage,
            _mask: &GrayImage,
        ) -> std::result::Result<RgbImage, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(10))
                .expect("test never released the gate");
            Ok(image.clone())
        }
    }

    fn runner() -> BatchRunner {
        BatchRunner::new(Arc::new(WatermarkRemover::new(Arc::new(CloneRestorer))))
    }

    fn write_png(path: &Path) {
        RgbImage::new(32, 32).save(path).unwrap();
    }

    fn job(input: &Path, output_dir: &Path) -> ImageJob {
        ImageJob {
            input: input.to_path_buf(),
            output: output_dir.join(input.file_name().unwrap()),
            params: DetectionParams::default(),
        }
    }

    #[test]
    fn batch_continues_past_failed_job() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("cleaned");

        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png"); // never created: job 2 must fail
        let c = dir.path().join("c.png");
        write_png(&a);
        write_png(&c);

        let jobs = vec![job(&a, &out_dir), job(&b, &out_dir), job(&c, &out_dir)];
        let handle = runner().start(jobs);

        // The event iterator ends when the worker drops its sender.
        let events: Vec<BatchEvent> = handle.events.iter().collect();
        let outcome = handle.wait();

        assert_eq!(outcome.state, BatchState::Completed);
        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.succeeded, 2);
        assert!(out_dir.join("a.png").exists());
        assert!(out_dir.join("c.png").exists());

        let started: Vec<&PathBuf> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Started { input } => Some(input),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![&a, &b, &c], "all jobs start, in order");

        let finished = events
            .iter()
            .filter(|e| matches!(e, BatchEvent::Finished { .. }))
            .count();
        assert_eq!(finished, 2, "only successful jobs emit Finished");

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress { completed, .. } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2, 3], "progress counts every job");

        match events.last().unwrap() {
            BatchEvent::BatchFinished { success, .. } => assert!(*success),
            other => panic!("expected terminal event, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_stops_before_next_job() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("cleaned");

        let inputs: Vec<PathBuf> = (1..=3)
            .map(|i| {
                let p = dir.path().join(format!("img{i}.png"));
                write_png(&p);
                p
            })
            .collect();
        let jobs: Vec<ImageJob> = inputs.iter().map(|p| job(p, &out_dir)).collect();

        let (gate_tx, gate_rx) = mpsc::channel();
        let restorer = Arc::new(GatedRestorer {
            calls: AtomicUsize::new(0),
            gate: Mutex::new(gate_rx),
        });
        let runner = BatchRunner::new(Arc::new(WatermarkRemover::new(restorer.clone())));

        let handle = runner.start(jobs);

        // Job 1 is now in flight (its restorer is blocked on the gate).
        match handle.events.recv_timeout(Duration::from_secs(10)).unwrap() {
            BatchEvent::Started { input } => assert_eq!(input, inputs[0]),
            other => panic!("expected Started, got {other:?}"),
        }

        // Cancel while job 1 runs, then let it finish.
        handle.cancel();
        gate_tx.send(()).unwrap();

        let remaining: Vec<BatchEvent> = handle.events.iter().collect();
        let outcome = handle.wait();

        assert_eq!(outcome.state, BatchState::Cancelled);
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(
            restorer.calls.load(Ordering::SeqCst),
            1,
            "jobs 2 and 3 must never start"
        );

        assert!(
            remaining
                .iter()
                .all(|e| !matches!(e, BatchEvent::Started { .. })),
            "no job starts after cancellation"
        );
        match remaining.last().unwrap() {
            BatchEvent::BatchFinished { success, message } => {
                assert!(*success);
                assert!(message.contains("cancelled"));
            }
            other => panic!("expected terminal event, got {other:?}"),
        }
        assert!(out_dir.join("img1.png").exists(), "in-flight job completes");
    }

    #[test]
    fn directory_failure_aborts_before_any_job() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let input = dir.path().join("img.png");
        write_png(&input);

        let jobs = vec![ImageJob {
            input,
            output: blocker.join("out.png"),
            params: DetectionParams::default(),
        }];
        let handle = runner().start(jobs);
        let events: Vec<BatchEvent> = handle.events.iter().collect();
        let outcome = handle.wait();

        assert_eq!(outcome.state, BatchState::Failed);
        assert_eq!(outcome.processed, 0);
        assert_eq!(events.len(), 1, "only the terminal event is emitted");
        match &events[0] {
            BatchEvent::BatchFinished { success, message } => {
                assert!(!success);
                assert!(message.contains("output directory"));
            }
            other => panic!("expected terminal event, got {other:?}"),
        }
    }
}
