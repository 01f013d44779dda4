//! Usage: Bearer-token lifecycle (store, handshake, single-flight re-authorization).

pub(crate) mod callback_server;
pub mod coordinator;
pub mod flow;
pub mod indicator;
pub mod manager;
pub(crate) mod nonce;
pub mod surface;
pub mod token_store;
pub mod verifier;

pub use coordinator::{AuthorizationRound, GatePhase, ReauthCoordinator};
pub use flow::{AuthorizationConfig, AuthorizationFlow, TokenGrant};
pub use indicator::{AuthIndicator, IndicatorState};
pub use manager::AuthManager;
pub use surface::{AuthorizationRequest, AuthorizationSurface, LoopbackSurface};
pub use token_store::TokenStore;
pub use verifier::{HttpTokenVerifier, TokenVerifier};
