//! Scoped allocation guard.

use super::pool::{ReleaseResult, ReleaseStatus};
use super::ResourceCoordinator;
use crate::types::Result;

/// Holds one allocation and returns it to the pool exactly once.
///
/// Released explicitly via [`AllocationGuard::release`] or implicitly on drop,
/// which covers early returns, errors, unwinding, and dropped futures.
#[derive(Debug)]
pub struct AllocationGuard {
    coordinator: ResourceCoordinator,
    agent_id: String,
    tokens: u64,
    released: bool,
}

impl AllocationGuard {
    pub(super) fn new(coordinator: ResourceCoordinator, agent_id: String, tokens: u64) -> Self {
        Self {
            coordinator,
            agent_id,
            tokens,
            released: false,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Tokens reserved by this guard.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Release now and report what was freed.
    pub fn release(mut self) -> Result<ReleaseResult> {
        self.released = true;
        self.coordinator.release(&self.agent_id)
    }
}

impl Drop for AllocationGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.coordinator.release(&self.agent_id) {
            Ok(result) if result.status == ReleaseStatus::NotFound => {
                tracing::warn!(agent_id = %self.agent_id, "Guarded allocation already released");
            }
            Ok(result) => {
                tracing::debug!(
                    agent_id = %self.agent_id,
                    tokens_freed = result.tokens_freed,
                    pool_remaining = result.pool_remaining,
                    "Allocation released on guard drop"
                );
            }
            Err(e) => {
                tracing::error!(agent_id = %self.agent_id, error = %e, "Failed to release allocation");
            }
        }
    }
}
