//! Deactivate command implementation

use anyhow::Result;

use crate::ipc::GatewayClient;
use crate::output::{print_success, print_warning};

use super::parse_phone;

/// Execute the deactivate command
pub async fn deactivate_command(client: &mut GatewayClient, phone: &str) -> Result<()> {
    let phone = parse_phone(phone)?;

    if client.deactivate(&phone).await? {
        print_success(&format!("Deactivated {}", phone));
    } else {
        print_warning(&format!("No session for {}", phone));
    }

    Ok(())
}
