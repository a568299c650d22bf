//! Per-job optimization locks
//!
//! Create and recompute for the same delivery job must not run at the same
//! time. A job is locked while a `JobLockGuard` for it is alive; the guard
//! releases the lock when dropped.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Process-wide lock registry
pub static JOB_LOCKS: Lazy<JobLockRegistry> = Lazy::new(JobLockRegistry::default);

/// RAII guard that releases the job lock when dropped.
/// Must be kept alive for the duration of the optimization.
#[derive(Debug)]
pub struct JobLockGuard {
    job_id: Uuid,
    registry: JobLockRegistry,
}

impl JobLockGuard {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        self.registry.release(&self.job_id);
    }
}

/// Error type for lock acquisition
#[derive(Debug, PartialEq, Eq, Error)]
pub enum JobLockError {
    /// Another optimization for this job is in progress
    #[error("delivery job {0} is already locked")]
    AlreadyLocked(Uuid),
}

/// Thread-safe set of jobs currently being optimized.
#[derive(Debug, Clone, Default)]
pub struct JobLockRegistry {
    locked: Arc<Mutex<HashSet<Uuid>>>,
}

impl JobLockRegistry {
    /// Lock `job_id`, or fail immediately if it is already locked
    pub fn try_acquire(&self, job_id: Uuid) -> Result<JobLockGuard, JobLockError> {
        if !self.locked.lock().insert(job_id) {
            return Err(JobLockError::AlreadyLocked(job_id));
        }
        Ok(JobLockGuard {
            job_id,
            registry: self.clone(),
        })
    }

    pub fn is_locked(&self, job_id: &Uuid) -> bool {
        self.locked.lock().contains(job_id)
    }

    fn release(&self, job_id: &Uuid) {
        self.locked.lock().remove(job_id);
    }
}
