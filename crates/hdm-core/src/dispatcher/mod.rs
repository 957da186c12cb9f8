//! Dispatcher: worker budget, priority queue, and the registry of downloads.
//!
//! Flow: `submit_file` registers a file and queues its planning probe; the
//! probe adds parts and queues one chunk task per part; chunk workers run
//! under the budget and the last one to finish assembles the output.
//! Pause, cancel, resume and resize are observed by workers between reads.

mod error;
mod evict;
mod pool;
mod queue;
mod registry;
mod removal;

pub use error::{DispatchError, SubmitError};
pub use queue::TaskPriority;
pub use removal::remove_deferred;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::comms::Communication;
use crate::config::HdmConfig;
use crate::downloader::{run_check, run_chunk};
use crate::file::{DownloadFile, FilePart};
use crate::state::{FileState, PartState};
use crate::url_model::derive_filename;

use pool::WorkerPool;
use registry::Registry;

pub(crate) enum Task {
    Check(Arc<DownloadFile>),
    Chunk(Arc<FilePart>),
}

/// State shared by the public handle and every worker.
pub(crate) struct DispatchCore {
    config: HdmConfig,
    comm: Arc<dyn Communication>,
    registry: Mutex<Registry>,
    pool: WorkerPool<Task>,
    closed: AtomicBool,
}

impl DispatchCore {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, task: Task) {
        match task {
            Task::Check(file) => run_check(self, &file),
            Task::Chunk(part) => run_chunk(self, &part),
        }
    }

    pub(crate) fn config(&self) -> &HdmConfig {
        &self.config
    }

    pub(crate) fn comm(&self) -> &dyn Communication {
        self.comm.as_ref()
    }

    fn enqueue(
        &self,
        registry: &mut Registry,
        part: &Arc<FilePart>,
        priority: TaskPriority,
    ) -> Result<(), DispatchError> {
        registry.track(part.id())?;
        if !self.pool.submit(Task::Chunk(Arc::clone(part)), priority) {
            registry.release(part.id());
            tracing::debug!(part = part.index(), "pool is shut down; task dropped");
        }
        Ok(())
    }

    pub(crate) fn submit_task(&self, part: &Arc<FilePart>, priority: TaskPriority) -> Result<(), DispatchError> {
        let mut registry = self.registry();
        self.enqueue(&mut registry, part, priority)
    }

    /// Appends planned parts to `file` and queues them, all in one critical
    /// section so a concurrent forget either sees every part or none.
    pub(crate) fn add_parts(
        &self,
        file: &Arc<DownloadFile>,
        planned: Vec<FilePart>,
    ) -> Result<Vec<Arc<FilePart>>, DispatchError> {
        let mut registry = self.registry();
        if !registry.contains(file) {
            return Err(DispatchError::UnknownFile(file.locator().to_string()));
        }
        let mut parts = Vec::with_capacity(planned.len());
        for part in planned {
            registry.register_part(file, &part)?;
            parts.push(file.add_part(part));
        }
        for part in &parts {
            if part.status() == PartState::Pending {
                self.enqueue(&mut registry, part, TaskPriority::NewPartDownload)?;
            }
        }
        Ok(parts)
    }

    /// Worker entry guard: moves a pending (or evicted and requeued) part to
    /// downloading. On refusal the part's in-flight slot is released.
    pub(crate) fn begin_chunk(&self, part: &FilePart) -> Result<(), PartState> {
        let mut registry = self.registry();
        let status = part.status();
        if matches!(status, PartState::Pending | PartState::SuspendRequested) {
            if part.start_download().is_ok() {
                return Ok(());
            }
        }
        registry.release(part.id());
        Err(part.status())
    }

    /// Releases the part's in-flight slot and applies the worker's final
    /// transition without letting a resume slip in between.
    pub(crate) fn finish_chunk<R>(&self, part: &FilePart, last: impl FnOnce() -> R) -> R {
        let mut registry = self.registry();
        registry.release(part.id());
        last()
    }

    /// Hands an evicted part back to the queue ahead of all other work.
    pub(crate) fn resubmit_evicted(&self, part: &Arc<FilePart>) -> Result<(), DispatchError> {
        let mut registry = self.registry();
        registry.release(part.id());
        self.enqueue(&mut registry, part, TaskPriority::EvictedTask)
    }

    pub(crate) fn owner_of(&self, part: &FilePart) -> Option<Arc<DownloadFile>> {
        self.registry().owner(part.id()).cloned()
    }
}

/// Segmented download scheduler. Cheap to share behind an `Arc`; dropping it closes it.
pub struct Dispatcher {
    core: Arc<DispatchCore>,
}

impl Dispatcher {
    pub fn new(config: HdmConfig, comm: Arc<dyn Communication>) -> Self {
        let core = Arc::new_cyclic(|weak: &Weak<DispatchCore>| {
            let weak = weak.clone();
            let pool = WorkerPool::new(
                config.max_threads,
                config.worker_keep_alive(),
                move |task: Task| {
                    if let Some(core) = weak.upgrade() {
                        core.run(task);
                    }
                },
            );
            DispatchCore {
                config,
                comm,
                registry: Mutex::new(Registry::default()),
                pool,
                closed: AtomicBool::new(false),
            }
        });
        Self { core }
    }

    /// Registers a download of `locator` into `output_dir` split into at most
    /// `part_count` parts, and queues its planning probe.
    pub fn submit_file(
        &self,
        locator: &str,
        output_dir: &Path,
        part_count: usize,
    ) -> Result<Arc<DownloadFile>, SubmitError> {
        if self.core.closed.load(Ordering::Acquire) {
            return Err(SubmitError::Closed);
        }
        let locator = locator.trim();
        let name = derive_filename(locator).ok_or_else(|| SubmitError::BadLocator(locator.to_string()))?;
        let dir = output_dir
            .canonicalize()
            .ok()
            .filter(|d| d.is_dir())
            .ok_or_else(|| SubmitError::NotADirectory(output_dir.to_path_buf()))?;
        let file = Arc::new(DownloadFile::new(locator, dir.join(name), part_count));

        let mut registry = self.core.registry();
        if registry.by_locator(locator).is_some() {
            return Err(SubmitError::DuplicateLocator(locator.to_string()));
        }
        if registry.by_output(file.output_path()).is_some() {
            return Err(SubmitError::DuplicateOutputPath(file.output_path().to_path_buf()));
        }
        registry.insert(Arc::clone(&file));
        if !self.core.pool.submit(Task::Check(Arc::clone(&file)), TaskPriority::NewCheck) {
            registry.remove(&file);
            return Err(SubmitError::Closed);
        }
        tracing::info!(locator, output = %file.output_path().display(), parts = file.max_part_count(), "file submitted");
        Ok(file)
    }

    /// Removes `file` from the dispatcher. Unless it finished, it is cancelled
    /// and its temp and output files are deleted in the background.
    pub fn forget_file(&self, file: &Arc<DownloadFile>) -> bool {
        let should_cancel = {
            let mut registry = self.core.registry();
            if !registry.remove(file) {
                return false;
            }
            let should_cancel = file.status() != FileState::Done;
            if should_cancel {
                file.cancel();
            }
            should_cancel
        };
        tracing::info!(locator = file.locator(), should_cancel, "file forgotten");
        if should_cancel {
            removal::spawn_removal(file.written_paths(true), self.core.config.removal());
        }
        true
    }

    /// Requeues the paused and failed parts of a paused file, or of a failed
    /// file that got as far as having parts. False when resume is not legal.
    pub fn resume_download(&self, file: &Arc<DownloadFile>) -> bool {
        let mut registry = self.core.registry();
        if !registry.contains(file) {
            return false;
        }
        let status = file.status();
        let legal = status == FileState::Paused || (status == FileState::Failed && file.part_count() > 0);
        if !legal {
            tracing::debug!(locator = file.locator(), %status, "resume refused");
            return false;
        }
        for part in file.parts() {
            if !matches!(part.status(), PartState::Paused | PartState::Failed) {
                continue;
            }
            if part.resume().to != PartState::Pending {
                continue;
            }
            if registry.is_tracked(part.id()) {
                tracing::debug!(part = part.index(), "part still queued; not requeued");
                continue;
            }
            if let Err(e) = self.core.enqueue(&mut registry, &part, TaskPriority::PausedTask) {
                tracing::warn!(part = part.index(), "resume dropped: {}", e);
            }
        }
        tracing::info!(locator = file.locator(), "download resumed");
        true
    }

    /// Changes the worker budget. When shrinking below the number of running
    /// tasks, suspends downloading parts to cover the deficit; their workers
    /// requeue them. Returns how many parts were asked to suspend.
    pub fn set_thread_pool_size(&self, size: usize, evict_non_resumable: bool) -> usize {
        let mut registry = self.core.registry();
        let busy = self.core.pool.resize(size);
        let leaving = registry.suspending_count();
        let deficit = busy.saturating_sub(size.max(1)).saturating_sub(leaving);
        let mut evicted = 0;
        if deficit > 0 {
            for part in evict::evict_parts(&registry.downloading_parts(), deficit, evict_non_resumable) {
                registry.mark_suspending(part.id());
                evicted += 1;
            }
        }
        tracing::info!(size, busy, leaving, deficit, evicted, "worker budget changed");
        evicted
    }

    pub fn thread_pool_size(&self) -> usize {
        self.core.pool.size()
    }

    /// Tasks running right now.
    pub fn active_workers(&self) -> usize {
        self.core.pool.active_count()
    }

    /// Tasks waiting for a worker.
    pub fn queued_tasks(&self) -> usize {
        self.core.pool.queued()
    }

    /// Queues `part` of a known file at new-download priority. Errors if the
    /// part already has a queued or running task.
    pub fn submit_new_task(&self, part: &Arc<FilePart>) -> Result<(), DispatchError> {
        self.core.submit_task(part, TaskPriority::NewPartDownload)
    }

    /// Snapshot of the registered files in submission order.
    pub fn get_all_files(&self) -> Vec<Arc<DownloadFile>> {
        self.core.registry().files().to_vec()
    }

    /// Cancels everything, stops the workers, closes the communication
    /// component, then deletes temp files and unfinished outputs.
    pub fn close(&self) {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let files = self.get_all_files();
        for file in &files {
            file.cancel();
        }
        self.core.pool.shutdown();
        self.core.comm.close();
        if !self.core.pool.wait_idle(self.core.config.shutdown_grace()) {
            tracing::warn!("workers still running after shutdown grace period");
        }
        let paths = files
            .iter()
            .flat_map(|f| f.written_paths(f.status() != FileState::Done))
            .collect();
        removal::remove_now(paths);
        tracing::info!(files = files.len(), "dispatcher closed");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}
