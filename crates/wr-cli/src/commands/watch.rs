//! Watch command implementation

use anyhow::Result;

use wr_core::{Notification, Phone};

use crate::ipc::{GatewayClient, IpcEvent};
use crate::output::{format_notification, print_error, print_info, print_success, print_warning};

use super::parse_phone;

/// Execute the watch command
pub async fn watch_command(client: &mut GatewayClient, phone: &str) -> Result<()> {
    let phone = parse_phone(phone)?;
    client.subscribe(&phone).await?;
    print_info(&format!("Watching {} (Ctrl+C to stop)", phone));
    watch_notifications(client, &phone).await
}

/// Print notifications for an already-subscribed phone until the handshake
/// reaches a final state
pub async fn watch_notifications(client: &mut GatewayClient, phone: &Phone) -> Result<()> {
    loop {
        let event = tokio::select! {
            event = client.next_event() => event?,
            _ = tokio::signal::ctrl_c() => {
                print_warning("Stopped watching");
                return Ok(());
            }
        };

        let Some(IpcEvent::Notification { phone: from, payload }) = event else {
            print_error("Gateway closed the connection");
            anyhow::bail!("Gateway closed the connection while watching {}", phone);
        };
        if from != phone.as_str() {
            continue;
        }

        let line = format_notification(&payload);
        match payload {
            Notification::Authenticating { .. } => print_info(&line),
            Notification::Authenticated | Notification::Connected => {
                print_success(&line);
                return Ok(());
            }
            Notification::Timeout { .. } => {
                print_warning(&line);
                anyhow::bail!("Pairing for {} timed out", phone);
            }
        }
    }
}
