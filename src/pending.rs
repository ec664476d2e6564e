//! Pending-async-call table.
//!
//! One record per outstanding `invoke_async`, keyed by correlation token.
//! The table is mutated concurrently by application tasks issuing calls and
//! by the transport's inbound dispatch delivering correlated responses, so
//! every operation holds one mutex for the duration of the table access
//! only. Completions fire after the entry has been removed and the lock
//! released -- a completion that issues another `invoke_async` re-enters
//! the table without deadlocking.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::error::{CallError, WirecallError};
use crate::protocol::CallToken;

/// Type-erased completion. Receives the raw response payload on success, or
/// the call-level failure when the entry expires.
pub(crate) type Completion = Box<dyn FnOnce(Result<&[u8], CallError>) + Send>;

/// One outstanding asynchronous call.
pub(crate) struct PendingCall {
    /// Method name, kept for diagnostics.
    pub name: String,
    /// When the call was issued.
    pub issued_at: Instant,
    /// Fires exactly once: on correlated arrival or on expiry.
    pub complete: Completion,
}

/// Token-keyed table of outstanding asynchronous calls.
///
/// Entries are owned exclusively by the table from insertion until removal;
/// nothing else holds a reference to a pending record, so firing the
/// completion after removal cannot race a concurrent lookup.
pub(crate) struct PendingTable {
    calls: Mutex<HashMap<CallToken, PendingCall>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a record. Must happen before the request is transmitted so
    /// the correlation entry exists before any reply could arrive.
    pub fn insert(&self, token: CallToken, call: PendingCall) {
        self.lock().insert(token, call);
    }

    /// Remove the entry for `token` and fire its completion with `payload`.
    ///
    /// Returns `false` when the token is unknown (stale or already
    /// completed); the response is dropped in that case.
    pub fn complete(&self, token: CallToken, payload: &[u8]) -> bool {
        let entry = self.lock().remove(&token);
        match entry {
            Some(call) => {
                (call.complete)(Ok(payload));
                true
            }
            None => false,
        }
    }

    /// Remove every entry older than `max_age` and fire its completion
    /// once with a communication failure. Returns how many expired.
    pub fn expire_older_than(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<PendingCall> = {
            let mut calls = self.lock();
            let tokens: Vec<CallToken> = calls
                .iter()
                .filter(|(_, call)| now.duration_since(call.issued_at) >= max_age)
                .map(|(token, _)| *token)
                .collect();
            tokens
                .into_iter()
                .filter_map(|token| calls.remove(&token))
                .collect()
        };

        let count = expired.len();
        for call in expired {
            tracing::warn!("pending call '{}' expired without a response", call.name);
            (call.complete)(Err(CallError::Comm(WirecallError::CallExpired)));
        }
        count
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CallToken, PendingCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawn the expiry sweeper shared by Client and Server: every
/// `sweep_interval`, age out entries older than `max_age`.
pub(crate) fn spawn_sweeper(
    pending: std::sync::Arc<PendingTable>,
    max_age: Duration,
    sweep_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(sweep_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let expired = pending.expire_older_than(max_age);
            if expired > 0 {
                tracing::debug!("expired {} pending call(s)", expired);
            }
        }
    })
}
