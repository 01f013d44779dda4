//! Usage: Single-flight gate for authorization handshakes.
//!
//! The gate is an explicit `Idle -> Authorizing -> Idle` state machine published through a
//! `watch` channel. Each finished round bumps `completed_rounds`, which is what waiters key on:
//! a waiter that saw round N in progress is released exactly when round N ends, even if round
//! N+1 starts before it gets scheduled.
//!
//! Starting a round also cancels the shared [`CancellationToken`] and installs a fresh one, so
//! every authenticated request still in flight is interrupted and retried with the new token.

use crate::shared::mutex_ext::MutexExt;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    Authorizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GateState {
    phase: GatePhase,
    completed_rounds: u64,
}

#[derive(Debug)]
pub struct ReauthCoordinator {
    gate: watch::Sender<GateState>,
    cancel: Mutex<CancellationToken>,
}

impl Default for ReauthCoordinator {
    fn default() -> Self {
        let (gate, _) = watch::channel(GateState {
            phase: GatePhase::Idle,
            completed_rounds: 0,
        });
        Self {
            gate,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }
}

impl ReauthCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn phase(&self) -> GatePhase {
        self.gate.borrow().phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase() == GatePhase::Authorizing
    }

    pub fn completed_rounds(&self) -> u64 {
        self.gate.borrow().completed_rounds
    }

    /// `Idle -> Authorizing`. Returns `None` when a round is already running; the caller should
    /// then [`wait_if_busy`](Self::wait_if_busy) instead of starting its own handshake.
    pub fn begin_authorization(self: &Arc<Self>) -> Option<AuthorizationRound> {
        let mut started = false;
        self.gate.send_if_modified(|state| {
            if state.phase == GatePhase::Authorizing {
                return false;
            }
            state.phase = GatePhase::Authorizing;
            started = true;
            true
        });
        if !started {
            return None;
        }

        let superseded = {
            let mut guard = self.cancel.lock_or_recover();
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        superseded.cancel();

        let round = self.completed_rounds();
        tracing::debug!(round, "authorization round started");
        Some(AuthorizationRound {
            coordinator: Arc::clone(self),
            round,
        })
    }

    fn end_authorization(&self) {
        self.gate.send_modify(|state| {
            state.phase = GatePhase::Idle;
            state.completed_rounds = state.completed_rounds.saturating_add(1);
        });
    }

    /// Returns immediately when idle, otherwise suspends until the running round ends.
    pub async fn wait_if_busy(&self) {
        let mut rx = self.gate.subscribe();
        let observed = *rx.borrow_and_update();
        if observed.phase == GatePhase::Idle {
            return;
        }
        // The sender lives inside `self`, so this can only fail once the coordinator is gone.
        let _ = rx
            .wait_for(|state| state.completed_rounds > observed.completed_rounds)
            .await;
    }

    /// Cancellation signal for a request built right now; fires when the next round starts.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.lock_or_recover().clone()
    }
}

/// Proof that the caller owns the running round. Dropping it runs `Authorizing -> Idle`, so the
/// gate is released on success, on error, and when the handshake future itself is dropped.
#[derive(Debug)]
pub struct AuthorizationRound {
    coordinator: Arc<ReauthCoordinator>,
    round: u64,
}

impl AuthorizationRound {
    pub fn round(&self) -> u64 {
        self.round
    }
}

impl Drop for AuthorizationRound {
    fn drop(&mut self) {
        self.coordinator.end_authorization();
        tracing::debug!(round = self.round, "authorization round finished");
    }
}
