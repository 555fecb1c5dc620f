//! Per-host connection pool with a freshness window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use alertmachine_core::HostId;

use crate::error::ExecError;
use crate::transport::{Session, Transport};

/// Connections older than this are never reused.
pub const CONNECTION_TTL: Duration = Duration::from_secs(60 * 60);

/// A reusable session and the moment it was opened.
struct PooledConnection {
    session: Arc<dyn Session>,
    created: Instant,
}

/// One host's slot. The async mutex is held across `Transport::open` so
/// concurrent first use of a host opens exactly one session.
type Slot = Arc<tokio::sync::Mutex<Option<PooledConnection>>>;

/// Sessions shared across all tasks and checks, keyed by host.
pub struct ConnectionPool {
    transport: Arc<dyn Transport>,
    /// host → slot. The outer lock only guards slot lookup.
    slots: Mutex<HashMap<HostId, Slot>>,
    ttl: Duration,
}

impl ConnectionPool {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            slots: Mutex::new(HashMap::new()),
            ttl: CONNECTION_TTL,
        }
    }

    /// Override the freshness window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Return the pooled session for `host`, opening a new one if there is
    /// none or the stored one has outlived the TTL.
    pub async fn get_or_create(&self, host: &str) -> Result<Arc<dyn Session>, ExecError> {
        let slot = self.slot(host);
        let mut guard = slot.lock().await;

        if let Some(conn) = guard.as_ref() {
            if conn.created.elapsed() <= self.ttl {
                return Ok(conn.session.clone());
            }
            debug!(%host, age_secs = conn.created.elapsed().as_secs(), "replacing stale connection");
        }

        let session = self.transport.open(host).await?;
        *guard = Some(PooledConnection {
            session: session.clone(),
            created: Instant::now(),
        });
        debug!(%host, "connection opened");
        Ok(session)
    }

    /// Drop the pooled session for `host` so the next use reconnects.
    pub async fn evict(&self, host: &str) {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get(host).cloned()
        };
        if let Some(slot) = slot {
            if slot.lock().await.take().is_some() {
                debug!(%host, "connection evicted");
            }
        }
    }

    /// Number of hosts currently holding a session.
    pub async fn connection_count(&self) -> usize {
        let slots: Vec<Slot> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.values().cloned().collect()
        };
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    fn slot(&self, host: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(host.to_string()).or_default().clone()
    }
}
