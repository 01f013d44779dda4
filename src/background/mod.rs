//! Usage: Privileged background domain (token lifecycle, title cache, message service).

pub mod context;
pub mod messages;
pub mod service;
pub mod title_cache;

pub use context::BackgroundContext;
pub use messages::{BackgroundMessage, BackgroundReply};
pub use service::BackgroundHandle;
pub use title_cache::{CachedTitle, TitleCache, TitleSource};
