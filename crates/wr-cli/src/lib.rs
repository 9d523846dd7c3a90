//! wa-relay: operator CLI for the tenant session gateway
//!
//! Provides the `wa-relay` binary, which runs the gateway daemon and drives
//! tenant activation, pairing and teardown over its IPC interface.

pub mod commands;
pub mod ipc;
pub mod output;
