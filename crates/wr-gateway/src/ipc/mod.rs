//! IPC server for CLI communication

mod server;

pub use server::IpcServer;
