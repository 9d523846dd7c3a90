//! List command implementation

use anyhow::Result;

use crate::ipc::GatewayClient;
use crate::output::format_sessions;

/// Execute the list command
pub async fn list_command(client: &mut GatewayClient) -> Result<()> {
    let sessions = client.list_sessions().await?;
    println!("{}", format_sessions(&sessions));
    Ok(())
}
