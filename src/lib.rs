//! Hostdeck — role-gated host tool execution with a real-time event gateway.
//!
//! The crate is organised around two subsystems:
//!
//! - the **tool pipeline**: a [`tools::ToolRegistry`] catalog of named,
//!   enableable tools, a [`permissions::PermissionPolicy`] gate, and the
//!   [`dispatcher::ExecutionDispatcher`] that runs a tool capability and
//!   produces an execution record;
//! - the **event gateway**: a [`hub::BroadcastHub`] that fans chat and
//!   tool-call events out to every open WebSocket observer, served by
//!   [`gateway`], and consumed by the reconnecting [`client::GatewayClient`].

pub mod analytics;
pub mod chat;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod hub;
pub mod logging;
pub mod permissions;
pub mod tools;
