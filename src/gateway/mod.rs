//! Usage: Loopback HTTP gateway that carries page-domain messages to the background service.

mod listen;
mod manager;
mod routes;

pub use manager::{start, RunningGateway};
