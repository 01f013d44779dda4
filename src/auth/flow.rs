//! Usage: Implicit-grant authorization handshake (nonce, surface, fragment parsing, verification).

use crate::auth::indicator::{AuthIndicator, IndicatorState};
use crate::auth::nonce::generate_nonce;
use crate::auth::surface::{AuthorizationRequest, AuthorizationSurface};
use crate::auth::verifier::TokenVerifier;
use crate::infra::settings::AppSettings;
use crate::shared::error::{AppError, AppResult, MALFORMED_RESPONSE};
use crate::shared::security::{constant_time_eq, mask_token};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Provider-facing parameters of a handshake that do not change between rounds.
#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    pub client_id: String,
    pub auth_url: String,
    pub scopes: Vec<String>,
    pub interactive_timeout: Duration,
    pub silent_timeout: Duration,
}

impl AuthorizationConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            auth_url: settings.auth_url.clone(),
            scopes: settings.scopes.clone(),
            interactive_timeout: Duration::from_secs(u64::from(settings.authorization_timeout_seconds)),
            silent_timeout: Duration::from_secs(u64::from(
                settings.silent_authorization_timeout_seconds,
            )),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in_seconds: u64,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &mask_token(&self.access_token))
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

fn malformed(message: impl Into<String>) -> AppError {
    AppError::new(MALFORMED_RESPONSE, message)
}

/// Parses the redirect address the surface returned. The answer lives in the fragment
/// (`#state=..&access_token=..&expires_in=..`), and its `state` must equal the nonce that was sent.
pub fn parse_authorization_response(redirect: &str, expected_state: &str) -> AppResult<TokenGrant> {
    let url = Url::parse(redirect).map_err(|e| malformed(format!("invalid redirect address: {e}")))?;
    let fragment = url
        .fragment()
        .filter(|fragment| !fragment.is_empty())
        .ok_or_else(|| malformed("redirect address has no fragment"))?;

    let mut state: Option<String> = None;
    let mut access_token: Option<String> = None;
    let mut expires_in: Option<String> = None;
    let mut error: Option<String> = None;
    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "state" => state = Some(value.into_owned()),
            "access_token" => access_token = Some(value.into_owned()),
            "expires_in" => expires_in = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    let state = state.ok_or_else(|| malformed("redirect is missing state"))?;
    if !constant_time_eq(state.as_bytes(), expected_state.as_bytes()) {
        return Err(malformed("state mismatch"));
    }

    let access_token = access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| match error.as_deref() {
            Some(error) => malformed(format!("no access token (provider error: {error})")),
            None => malformed("no access token"),
        })?;
    let expires_in = expires_in
        .filter(|value| !value.is_empty())
        .ok_or_else(|| malformed("no expiry"))?;
    let expires_in_seconds = expires_in
        .trim()
        .parse::<u64>()
        .map_err(|_| malformed(format!("invalid expires_in: {expires_in}")))?;

    Ok(TokenGrant {
        access_token,
        expires_in_seconds,
    })
}

pub struct AuthorizationFlow {
    config: AuthorizationConfig,
    surface: Arc<dyn AuthorizationSurface>,
    verifier: Arc<dyn TokenVerifier>,
    indicator: Arc<AuthIndicator>,
}

impl std::fmt::Debug for AuthorizationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationFlow")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuthorizationFlow {
    pub fn new(
        config: AuthorizationConfig,
        surface: Arc<dyn AuthorizationSurface>,
        verifier: Arc<dyn TokenVerifier>,
        indicator: Arc<AuthIndicator>,
    ) -> Self {
        Self {
            config,
            surface,
            verifier,
            indicator,
        }
    }

    pub fn indicator(&self) -> &Arc<AuthIndicator> {
        &self.indicator
    }

    /// Runs one handshake. Does not touch the token store; the caller owns that.
    pub async fn request_access_token(&self, interactive: bool) -> AppResult<TokenGrant> {
        if self.config.client_id.trim().is_empty() {
            return Err("SEC_INVALID_INPUT: cannot authorize without client_id"
                .to_string()
                .into());
        }

        let nonce = generate_nonce();
        let request = AuthorizationRequest {
            auth_url: self.config.auth_url.clone(),
            client_id: self.config.client_id.clone(),
            scopes: self.config.scopes.clone(),
            state: nonce.clone(),
            interactive,
            timeout: if interactive {
                self.config.interactive_timeout
            } else {
                self.config.silent_timeout
            },
        };

        let redirect = self.surface.launch(&request).await?;
        let grant = parse_authorization_response(&redirect, &nonce)?;

        let valid = match self.verifier.verify(&grant.access_token).await {
            Ok(valid) => valid,
            Err(err) => {
                self.indicator.set(IndicatorState::Invalid);
                return Err(err);
            }
        };
        if !valid {
            self.indicator.set(IndicatorState::Invalid);
            return Err(malformed("access token rejected by verification endpoint"));
        }
        self.indicator.set(IndicatorState::Valid);

        tracing::info!(
            interactive,
            token = %mask_token(&grant.access_token),
            expires_in_seconds = grant.expires_in_seconds,
            "authorization handshake succeeded"
        );
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSurface, FakeVerifier};

    const REDIRECT: &str = "http://127.0.0.1:37180/callback";

    fn config(client_id: &str) -> AuthorizationConfig {
        AuthorizationConfig {
            client_id: client_id.to_string(),
            auth_url: "https://accounts.example.com/auth".to_string(),
            scopes: vec!["scope.readonly".to_string()],
            interactive_timeout: Duration::from_secs(5),
            silent_timeout: Duration::from_secs(1),
        }
    }

    fn flow(
        client_id: &str,
        surface: Arc<FakeSurface>,
        verifier: Arc<FakeVerifier>,
    ) -> (AuthorizationFlow, Arc<AuthIndicator>) {
        let indicator = Arc::new(AuthIndicator::default());
        let flow = AuthorizationFlow::new(
            config(client_id),
            surface,
            verifier,
            Arc::clone(&indicator),
        );
        (flow, indicator)
    }

    #[test]
    fn parses_fragment_with_matching_state() {
        let grant = parse_authorization_response(
            &format!("{REDIRECT}#state=n%2Bonce%3D%3D&access_token=ya29.token&token_type=Bearer&expires_in=3599"),
            "n+once==",
        )
        .expect("grant");
        assert_eq!(grant.access_token, "ya29.token");
        assert_eq!(grant.expires_in_seconds, 3599);
    }

    #[test]
    fn rejects_missing_fragment() {
        let err = parse_authorization_response(REDIRECT, "nonce").expect_err("no fragment");
        assert_eq!(err.code(), MALFORMED_RESPONSE);

        let err =
            parse_authorization_response(&format!("{REDIRECT}#"), "nonce").expect_err("empty");
        assert_eq!(err.code(), MALFORMED_RESPONSE);
    }

    #[test]
    fn rejects_state_mismatch() {
        let err = parse_authorization_response(
            &format!("{REDIRECT}#state=forged&access_token=t&expires_in=60"),
            "nonce",
        )
        .expect_err("forged");
        assert_eq!(err.code(), MALFORMED_RESPONSE);
        assert!(err.message().contains("state mismatch"));
    }

    #[test]
    fn rejects_missing_token_and_reports_provider_error() {
        let err = parse_authorization_response(
            &format!("{REDIRECT}#state=nonce&error=interaction_required"),
            "nonce",
        )
        .expect_err("no token");
        assert_eq!(err.code(), MALFORMED_RESPONSE);
        assert!(err.message().contains("interaction_required"));
    }

    #[test]
    fn rejects_missing_or_invalid_expiry() {
        let err = parse_authorization_response(
            &format!("{REDIRECT}#state=nonce&access_token=t"),
            "nonce",
        )
        .expect_err("no expiry");
        assert_eq!(err.code(), MALFORMED_RESPONSE);

        let err = parse_authorization_response(
            &format!("{REDIRECT}#state=nonce&access_token=t&expires_in=soon"),
            "nonce",
        )
        .expect_err("bad expiry");
        assert_eq!(err.code(), MALFORMED_RESPONSE);
    }

    #[tokio::test]
    async fn handshake_echoes_nonce_and_marks_indicator_valid() {
        let surface = Arc::new(FakeSurface::granting("fresh-token", 3600));
        let verifier = Arc::new(FakeVerifier::accepting());
        let (flow, indicator) = flow("client-1", Arc::clone(&surface), verifier);

        let grant = flow.request_access_token(false).await.expect("grant");
        assert_eq!(grant.access_token, "fresh-token");
        assert_eq!(grant.expires_in_seconds, 3600);
        assert_eq!(indicator.current(), IndicatorState::Valid);

        let launched = surface.launched();
        assert_eq!(launched.len(), 1);
        assert!(!launched[0].interactive);
        assert_eq!(launched[0].timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn rejected_token_fails_and_marks_indicator_invalid() {
        let surface = Arc::new(FakeSurface::granting("stale-token", 3600));
        let verifier = Arc::new(FakeVerifier::rejecting());
        let (flow, indicator) = flow("client-1", surface, verifier);

        let err = flow.request_access_token(true).await.expect_err("rejected");
        assert_eq!(err.code(), MALFORMED_RESPONSE);
        assert_eq!(indicator.current(), IndicatorState::Invalid);
    }

    #[tokio::test]
    async fn forged_state_from_surface_is_rejected() {
        let surface = Arc::new(FakeSurface::forging_state("token"));
        let verifier = Arc::new(FakeVerifier::accepting());
        let (flow, _) = flow("client-1", surface, Arc::clone(&verifier));

        let err = flow.request_access_token(true).await.expect_err("forged");
        assert_eq!(err.code(), MALFORMED_RESPONSE);
        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn empty_client_id_never_opens_surface() {
        let surface = Arc::new(FakeSurface::granting("token", 60));
        let verifier = Arc::new(FakeVerifier::accepting());
        let (flow, _) = flow("  ", Arc::clone(&surface), verifier);

        let err = flow.request_access_token(true).await.expect_err("no client");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
        assert!(surface.launched().is_empty());
    }
}
