//! Status command implementation

use anyhow::Result;

use crate::ipc::GatewayClient;
use crate::output::{format_status, format_tenant_status, print_error};

use super::parse_phone;

/// Execute the status command
///
/// With a phone, reports that tenant's activation flag and its persisted
/// authentication flag; otherwise reports on the gateway itself.
pub async fn status_command(client: &mut GatewayClient, phone: Option<&str>) -> Result<()> {
    let Some(phone) = phone else {
        let status = match client.status().await {
            Ok(s) => s,
            Err(e) => {
                print_error(&format!("Failed to get gateway status: {}", e));
                print_error("Is the gateway running? Try: wa-relay serve");
                return Err(e);
            }
        };
        println!("{}", format_status(&status));
        return Ok(());
    };

    let phone = parse_phone(phone)?;
    let active = client.check_activation(&phone).await?;
    let authenticated = client.check_authentication(&phone).await?;
    print!("{}", format_tenant_status(&phone, active, authenticated));

    Ok(())
}
