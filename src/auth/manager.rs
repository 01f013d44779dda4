//! Usage: Owns the token store, the re-authorization gate and the handshake; the single entry point
//! for "make sure there is a fresh token".

use crate::auth::coordinator::ReauthCoordinator;
use crate::auth::flow::AuthorizationFlow;
use crate::auth::indicator::{AuthIndicator, IndicatorState};
use crate::auth::token_store::TokenStore;
use crate::shared::error::AppResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct AuthManager {
    tokens: TokenStore,
    coordinator: Arc<ReauthCoordinator>,
    flow: AuthorizationFlow,
}

impl AuthManager {
    pub fn new(flow: AuthorizationFlow) -> Self {
        Self {
            tokens: TokenStore::new(),
            coordinator: ReauthCoordinator::new(),
            flow,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn coordinator(&self) -> &Arc<ReauthCoordinator> {
        &self.coordinator
    }

    pub fn indicator(&self) -> &Arc<AuthIndicator> {
        self.flow.indicator()
    }

    /// Runs a handshake unless one is already running, in which case it waits for that one.
    /// Only the caller that owns the round sees the handshake's error; waiters observe its effect
    /// through the token store. An interactive waiter still left without a token runs its own
    /// round, so an `authorize` request always ends with a prompt or a fresh token.
    pub async fn authorize(&self, interactive: bool) -> AppResult<()> {
        let round = loop {
            if let Some(round) = self.coordinator.begin_authorization() {
                break round;
            }
            tracing::debug!(interactive, "authorization already running, waiting for it");
            self.coordinator.wait_if_busy().await;
            if !interactive || self.is_authorized() {
                return Ok(());
            }
        };

        tracing::info!(interactive, round = round.round(), "authorization started");
        let result = self.flow.request_access_token(interactive).await;
        match result {
            Ok(grant) => {
                self.tokens.set(grant.access_token, grant.expires_in_seconds);
                drop(round);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(interactive, error = %err, "authorization failed");
                drop(round);
                Err(err)
            }
        }
    }

    pub fn is_authorized(&self) -> bool {
        !self.tokens.is_expired()
    }

    pub fn bearer(&self) -> Option<String> {
        self.tokens.bearer()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.coordinator.cancellation()
    }

    pub async fn wait_if_busy(&self) {
        self.coordinator.wait_if_busy().await;
    }

    pub fn is_busy(&self) -> bool {
        self.coordinator.is_busy()
    }

    /// Startup state: nothing verified yet, so the indicator shows "not authorized".
    pub fn mark_unauthorized(&self) {
        self.indicator().set(IndicatorState::Invalid);
    }
}
