//! # plugin-runtime-sdk
//!
//! Wire protocol, unix-socket client, and plugin runtime contract shared by
//! the plugin host's HTTP edge and its child worker processes.
//!
//! ## Overview
//!
//! A plugin bundle ships one or more [`plugin::Plugin`] implementations. The
//! host spawns one child process per `(package, version)` pair; each child
//! links this crate's dispatcher, which decodes a [`envelope::Req`] off a
//! unix socket, invokes the matching plugin, and writes back an
//! [`envelope::Resp`]. The host's process manager uses [`client`] to talk to
//! that socket, including the bootstrap retry a freshly spawned child needs.
//!
//! This crate intentionally does not depend on `axum` or `tokio::process` —
//! those belong to the host binary. A plugin author only needs
//! [`plugin::Plugin`] and [`metadata::Metadata`].

pub mod client;
pub mod envelope;
pub mod error;
pub mod metadata;
pub mod plugin;

pub use envelope::{Action, Req, Resp};
pub use error::{ErrorEnvelope, PluginError};
pub use metadata::{Labels, Metadata, PackageInfo, ToolMetadata};
pub use plugin::{Plugin, ToolStream};

/// Result type for runtime-contract operations.
pub type Result<T> = std::result::Result<T, PluginError>;
