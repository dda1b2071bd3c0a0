//! Lease-based exclusive locks
//!
//! A lease expires on its own if the holder dies, so a crashed worker never
//! blocks schema changes for longer than the lease.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::{EvolutionError, EvolutionResult};

/// Guards ALTER and CREATE on the variants table
pub const SCHEMA_LOCK: &str = "schema";

/// Guards secondary index creation
pub const INDEX_LOCK: &str = "index";

/// Proof of holding a lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub id: Uuid,
    pub resource: String,
    pub acquired_at: DateTime<Utc>,
    pub lease: Duration,
}

/// Distributed lock boundary
pub trait SchemaLock: Send + Sync {
    /// Block up to `timeout` for `resource`. Fails with `LockTimeout`.
    fn lock(&self, resource: &str, lease: Duration, timeout: Duration) -> EvolutionResult<LockToken>;

    /// Release a held lock. A token whose lease was lost or taken over fails
    /// with `IllegalLockStatus`.
    fn unlock(&self, token: &LockToken) -> EvolutionResult<()>;
}

#[derive(Debug)]
struct Lease {
    token: Uuid,
    expires_at: Instant,
}

/// In-process `SchemaLock` on `Mutex` + `Condvar`
#[derive(Debug, Default)]
pub struct LeaseLock {
    leases: Mutex<HashMap<String, Lease>>,
    released: Condvar,
}

impl LeaseLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `resource` is currently held by a live lease
    pub fn is_held(&self, resource: &str) -> bool {
        let leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        leases
            .get(resource)
            .map_or(false, |lease| lease.expires_at > Instant::now())
    }
}

impl SchemaLock for LeaseLock {
    fn lock(&self, resource: &str, lease: Duration, timeout: Duration) -> EvolutionResult<LockToken> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            let now = Instant::now();
            let wake_at = match leases.get(resource) {
                Some(current) if current.expires_at > now => current.expires_at.min(deadline),
                _ => {
                    let token = LockToken {
                        id: Uuid::new_v4(),
                        resource: resource.to_string(),
                        acquired_at: Utc::now(),
                        lease,
                    };
                    leases.insert(
                        resource.to_string(),
                        Lease {
                            token: token.id,
                            expires_at: now + lease,
                        },
                    );
                    return Ok(token);
                }
            };

            if now >= deadline {
                return Err(EvolutionError::LockTimeout {
                    resource: resource.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            let (guard, _) = self
                .released
                .wait_timeout(leases, wake_at.saturating_duration_since(now))
                .unwrap_or_else(PoisonError::into_inner);
            leases = guard;
        }
    }

    fn unlock(&self, token: &LockToken) -> EvolutionResult<()> {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        match leases.get(&token.resource) {
            Some(current) if current.token == token.id => {
                leases.remove(&token.resource);
                self.released.notify_all();
                Ok(())
            }
            _ => Err(EvolutionError::IllegalLockStatus(format!(
                "lock '{}' is not held by token {}",
                token.resource, token.id
            ))),
        }
    }
}
