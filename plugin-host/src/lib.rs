//! # plugin-host
//!
//! A plugin execution runtime: installs zip bundles, supervises one child
//! worker process per `(package, version)` under an LRU cap, multiplexes
//! tool calls over unix sockets, and exposes the whole thing behind an
//! HTTP/JSON edge.
//!
//! ## Overview
//!
//! - [`bundle`] reads a plugin bundle's declarations without executing it.
//! - [`installer`] unpacks bundles into the versioned extensions directory
//!   and resolves their declared dependencies.
//! - [`job_queue`] runs installs asynchronously on a bounded worker pool.
//! - [`process_manager`] owns the LRU map of live child workers.
//! - [`registry`] is the statically linked plugin implementations a child
//!   binary can dispatch to (see [`plugins`]).
//! - [`server`] and [`handlers`] wire the `/v1/*` HTTP surface onto all of
//!   the above.
//!
//! The child worker itself is a separate binary, `plugin-child`
//! (`src/bin/plugin_child.rs`), linking `plugin_runtime_sdk` for the wire
//! protocol and plugin trait it dispatches against.

pub mod bundle;
pub mod config;
pub mod duration_serde;
pub mod error;
pub mod handlers;
pub mod installer;
pub mod job_queue;
pub mod model;
pub mod plugins;
pub mod process_manager;
pub mod registry;
pub mod server;

pub use server::create_server;
