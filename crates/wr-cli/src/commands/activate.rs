//! Activate command implementation

use anyhow::Result;

use crate::ipc::GatewayClient;
use crate::output::{print_error, print_info, print_success};

use super::{parse_phone, watch_notifications};

/// Execute the activate command
///
/// With `watch`, the client subscribes before activating so the first
/// pairing code is not missed, then follows the handshake to its end.
pub async fn activate_command(client: &mut GatewayClient, phone: &str, watch: bool) -> Result<()> {
    let phone = parse_phone(phone)?;

    if watch {
        client.subscribe(&phone).await?;
    }

    let view = match client.activate(&phone).await {
        Ok(view) => view,
        Err(e) => {
            print_error(&format!("Failed to activate {}: {}", phone, e));
            return Err(e);
        }
    };

    if view.authenticated {
        print_success(&format!("{} connected (session {})", phone, view.id));
        return Ok(());
    }

    print_success(&format!("{} activated, pairing started (session {})", phone, view.id));
    if watch {
        watch_notifications(client, &phone).await
    } else {
        print_info(&format!("Follow the handshake with: wa-relay watch {}", phone));
        Ok(())
    }
}
