//! Resource coordinator - process-wide admission control.
//!
//! Gates tool executions against a shared token budget and a concurrency cap.
//! The pool lives behind one mutex; every read-check-mutate sequence runs
//! inside a single critical section, so concurrent callers never overshoot
//! capacity. Work is denied, never queued.

mod guard;
mod pool;

pub use guard::AllocationGuard;
pub use pool::{
    Allocation, AllocationResult, AllocationStatus, DenialReason, PoolSnapshot, Priority,
    ReleaseResult, ReleaseStatus, ResourcePool,
};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::{CoordinationConfig, Error, Result};

/// Result of [`ResourceCoordinator::acquire`].
#[derive(Debug)]
pub enum Admission {
    /// Allocation held until the guard is released or dropped.
    Granted(AllocationGuard),
    /// Capacity exhausted; nothing was reserved.
    Denied(AllocationResult),
}

#[derive(Debug)]
struct Shared {
    pool: Mutex<ResourcePool>,
    config: CoordinationConfig,
    closed: AtomicBool,
}

/// Cloneable handle to one shared resource pool.
#[derive(Debug, Clone)]
pub struct ResourceCoordinator {
    shared: Arc<Shared>,
}

impl ResourceCoordinator {
    pub fn new(config: CoordinationConfig) -> Self {
        let pool = ResourcePool::new(config.max_tokens, config.max_concurrent);
        Self {
            shared: Arc::new(Shared {
                pool: Mutex::new(pool),
                config,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Coordinator with the given limits and default budgets.
    pub fn with_capacity(max_tokens: u64, max_concurrent: usize) -> Self {
        Self::new(CoordinationConfig {
            max_tokens,
            max_concurrent,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.shared.config
    }

    /// Reserve `token_budget` tokens and one slot for `agent_id`.
    pub fn allocate(
        &self,
        agent_id: &str,
        token_budget: u64,
        priority: Priority,
    ) -> Result<AllocationResult> {
        self.ensure_open()?;

        let result = {
            let mut pool = self.shared.pool.lock();
            pool.allocate(agent_id, token_budget, priority)?
        };

        if result.is_allocated() {
            tracing::debug!(
                agent_id,
                tokens = token_budget,
                ?priority,
                pool_remaining = result.pool_remaining,
                "Allocation granted"
            );
        } else {
            tracing::info!(
                agent_id,
                tokens = token_budget,
                reason = ?result.reason,
                pool_remaining = result.pool_remaining,
                "Allocation denied"
            );
        }
        Ok(result)
    }

    /// Release the allocation held by `agent_id`. Unknown ids are a no-op.
    pub fn release(&self, agent_id: &str) -> Result<ReleaseResult> {
        let result = self.shared.pool.lock().release(agent_id);
        match &result {
            Ok(r) if r.status == ReleaseStatus::Released => {
                tracing::debug!(
                    agent_id,
                    tokens_freed = r.tokens_freed,
                    pool_remaining = r.pool_remaining,
                    "Allocation released"
                );
            }
            Ok(_) => tracing::debug!(agent_id, "Release for unknown agent ignored"),
            Err(e) => tracing::error!(agent_id, error = %e, "Pool invariant violated"),
        }
        result
    }

    /// Allocate the default budget for `operation` and hand back a scoped guard.
    pub fn acquire(&self, agent_id: &str, operation: &str) -> Result<Admission> {
        let budget = self.shared.config.budget_for(operation);
        let result = self.allocate(agent_id, budget, Priority::Normal)?;
        if !result.is_allocated() {
            return Ok(Admission::Denied(result));
        }
        Ok(Admission::Granted(AllocationGuard::new(
            self.clone(),
            agent_id.to_string(),
            budget,
        )))
    }

    /// Read-only pool summary.
    pub fn status(&self) -> PoolSnapshot {
        self.shared.pool.lock().snapshot()
    }

    /// Check pool accounting.
    pub fn verify(&self) -> Result<()> {
        self.shared.pool.lock().verify()
    }

    /// Stop granting allocations. Releases keep working so live guards drain.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("Resource coordinator closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::unavailable("resource coordinator is closed"));
        }
        Ok(())
    }
}
