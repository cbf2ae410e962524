//! Resource pool accounting.
//!
//! Plain struct owned by the coordinator and mutated only inside its critical
//! section. `used_tokens` and `active_tasks` always equal the sum and count of
//! `allocations`, because every mutation goes through `allocate`/`release`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::{Error, Result};

/// Allocation priority. Recorded for observability, never used for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// One live reservation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub tokens: u64,
    pub priority: Priority,
    pub allocated_at: DateTime<Utc>,
}

/// Why an allocation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    InsufficientTokens,
    MaxConcurrentReached,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::InsufficientTokens => write!(f, "insufficient_tokens"),
            DenialReason::MaxConcurrentReached => write!(f, "max_concurrent_reached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Allocated,
    Denied,
}

/// Outcome of `allocate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationResult {
    pub agent_id: String,
    pub status: AllocationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    pub tokens: u64,
    pub pool_remaining: u64,
}

impl AllocationResult {
    pub fn is_allocated(&self) -> bool {
        self.status == AllocationStatus::Allocated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    Released,
    NotFound,
}

/// Outcome of `release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseResult {
    pub agent_id: String,
    pub status: ReleaseStatus,
    pub tokens_freed: u64,
    pub pool_remaining: u64,
}

/// Read-only pool summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub max_tokens: u64,
    pub used_tokens: u64,
    pub available_tokens: u64,
    pub max_concurrent: usize,
    pub active_tasks: usize,
    pub agents: Vec<String>,
}

/// Token budget and concurrency slots shared by every execution in the process.
#[derive(Debug)]
pub struct ResourcePool {
    max_tokens: u64,
    used_tokens: u64,
    max_concurrent: usize,
    active_tasks: usize,
    allocations: HashMap<String, Allocation>,
}

impl ResourcePool {
    pub fn new(max_tokens: u64, max_concurrent: usize) -> Self {
        Self {
            max_tokens,
            used_tokens: 0,
            max_concurrent,
            active_tasks: 0,
            allocations: HashMap::new(),
        }
    }

    /// Tokens not yet reserved.
    pub fn remaining(&self) -> u64 {
        self.max_tokens.saturating_sub(self.used_tokens)
    }

    /// Reserve `tokens` and one slot for `agent_id`.
    ///
    /// Capacity exhaustion is a `Denied` result. An already-active `agent_id`
    /// is rejected as a validation error so its budget is never double-counted.
    pub fn allocate(
        &mut self,
        agent_id: &str,
        tokens: u64,
        priority: Priority,
    ) -> Result<AllocationResult> {
        if agent_id.is_empty() {
            return Err(Error::validation("agent_id cannot be empty"));
        }
        if self.allocations.contains_key(agent_id) {
            return Err(Error::validation(format!(
                "agent {} already holds an allocation; release it first",
                agent_id
            )));
        }

        let reason = if tokens > self.remaining() {
            Some(DenialReason::InsufficientTokens)
        } else if self.active_tasks >= self.max_concurrent {
            Some(DenialReason::MaxConcurrentReached)
        } else {
            None
        };

        if let Some(reason) = reason {
            return Ok(AllocationResult {
                agent_id: agent_id.to_string(),
                status: AllocationStatus::Denied,
                reason: Some(reason),
                tokens,
                pool_remaining: self.remaining(),
            });
        }

        self.used_tokens += tokens;
        self.active_tasks += 1;
        self.allocations.insert(
            agent_id.to_string(),
            Allocation {
                tokens,
                priority,
                allocated_at: Utc::now(),
            },
        );

        Ok(AllocationResult {
            agent_id: agent_id.to_string(),
            status: AllocationStatus::Allocated,
            reason: None,
            tokens,
            pool_remaining: self.remaining(),
        })
    }

    /// Return the reservation held by `agent_id`, if any.
    ///
    /// Errors only when the counters no longer cover the allocation, which
    /// means the accounting is corrupted.
    pub fn release(&mut self, agent_id: &str) -> Result<ReleaseResult> {
        let Some(allocation) = self.allocations.get(agent_id) else {
            return Ok(ReleaseResult {
                agent_id: agent_id.to_string(),
                status: ReleaseStatus::NotFound,
                tokens_freed: 0,
                pool_remaining: self.remaining(),
            });
        };

        let tokens = allocation.tokens;
        let used = self.used_tokens.checked_sub(tokens);
        let active = self.active_tasks.checked_sub(1);
        let (Some(used), Some(active)) = (used, active) else {
            return Err(Error::internal(format!(
                "pool accounting underflow releasing {} ({} tokens, used={}, active={})",
                agent_id, tokens, self.used_tokens, self.active_tasks
            )));
        };

        self.allocations.remove(agent_id);
        self.used_tokens = used;
        self.active_tasks = active;

        Ok(ReleaseResult {
            agent_id: agent_id.to_string(),
            status: ReleaseStatus::Released,
            tokens_freed: tokens,
            pool_remaining: self.remaining(),
        })
    }

    /// Get the allocation held by `agent_id`.
    pub fn get(&self, agent_id: &str) -> Option<&Allocation> {
        self.allocations.get(agent_id)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let mut agents: Vec<String> = self.allocations.keys().cloned().collect();
        agents.sort();
        PoolSnapshot {
            max_tokens: self.max_tokens,
            used_tokens: self.used_tokens,
            available_tokens: self.remaining(),
            max_concurrent: self.max_concurrent,
            active_tasks: self.active_tasks,
            agents,
        }
    }

    /// Recompute the counters from `allocations` and compare.
    pub fn verify(&self) -> Result<()> {
        let sum: u64 = self.allocations.values().map(|a| a.tokens).sum();
        if sum != self.used_tokens || self.allocations.len() != self.active_tasks {
            return Err(Error::internal(format!(
                "pool accounting mismatch: used={} sum={} active={} count={}",
                self.used_tokens,
                sum,
                self.active_tasks,
                self.allocations.len()
            )));
        }
        if self.used_tokens > self.max_tokens || self.active_tasks > self.max_concurrent {
            return Err(Error::internal(format!(
                "pool over capacity: used={}/{} active={}/{}",
                self.used_tokens, self.max_tokens, self.active_tasks, self.max_concurrent
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let mut pool = ResourcePool::new(1000, 2);

        let result = pool.allocate("a", 600, Priority::Normal).unwrap();
        assert!(result.is_allocated());
        assert_eq!(result.pool_remaining, 400);
        assert_eq!(pool.get("a").unwrap().tokens, 600);

        let released = pool.release("a").unwrap();
        assert_eq!(released.status, ReleaseStatus::Released);
        assert_eq!(released.tokens_freed, 600);
        assert_eq!(released.pool_remaining, 1000);
        pool.verify().unwrap();
    }

    #[test]
    fn test_token_denial_checked_before_slots() {
        let mut pool = ResourcePool::new(100, 1);
        pool.allocate("a", 10, Priority::Low).unwrap();

        // Both limits are hit; tokens are reported first.
        let result = pool.allocate("b", 500, Priority::Low).unwrap();
        assert_eq!(result.reason, Some(DenialReason::InsufficientTokens));
    }

    #[test]
    fn test_zero_budget_still_needs_a_slot() {
        let mut pool = ResourcePool::new(100, 1);
        pool.allocate("a", 0, Priority::Low).unwrap();

        let result = pool.allocate("b", 0, Priority::Low).unwrap();
        assert_eq!(result.reason, Some(DenialReason::MaxConcurrentReached));
        assert_eq!(pool.snapshot().active_tasks, 1);
    }

    #[test]
    fn test_duplicate_agent_rejected_without_mutation() {
        let mut pool = ResourcePool::new(1000, 5);
        pool.allocate("a", 100, Priority::Normal).unwrap();

        assert!(pool.allocate("a", 100, Priority::High).is_err());
        let snap = pool.snapshot();
        assert_eq!(snap.used_tokens, 100);
        assert_eq!(snap.active_tasks, 1);
    }

    #[test]
    fn test_empty_agent_rejected() {
        let mut pool = ResourcePool::new(1000, 5);
        assert!(pool.allocate("", 1, Priority::Normal).is_err());
    }

    #[test]
    fn test_release_unknown_is_not_found() {
        let mut pool = ResourcePool::new(1000, 5);
        let result = pool.release("ghost").unwrap();
        assert_eq!(result.status, ReleaseStatus::NotFound);
        assert_eq!(result.tokens_freed, 0);
        assert_eq!(result.pool_remaining, 1000);
    }

    #[test]
    fn test_snapshot_lists_sorted_agents() {
        let mut pool = ResourcePool::new(1000, 5);
        pool.allocate("zeta", 1, Priority::Normal).unwrap();
        pool.allocate("alpha", 2, Priority::Critical).unwrap();

        let snap = pool.snapshot();
        assert_eq!(snap.agents, vec!["alpha", "zeta"]);
        assert_eq!(snap.used_tokens, 3);
        assert_eq!(snap.available_tokens, 997);
    }

    #[test]
    fn test_denial_reason_display() {
        assert_eq!(DenialReason::InsufficientTokens.to_string(), "insufficient_tokens");
        assert_eq!(
            DenialReason::MaxConcurrentReached.to_string(),
            "max_concurrent_reached"
        );
    }
}
