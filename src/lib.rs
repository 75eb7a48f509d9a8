//! 多厂商流式聊天客户端

pub mod abort;
pub mod account;
pub mod animation;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod http;
pub mod locale;
pub mod logging;
pub mod model;
pub mod moderation;
pub mod provider;
mod session;
pub mod transport;
pub mod types;

pub use abort::{AbortHandle, AbortReason};
pub use client::{ChatClient, ChatClientBuilder};
pub use error::ChatError;
pub use provider::{ChatProvider, DynProvider};
pub use types::*;
