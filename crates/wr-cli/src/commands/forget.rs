//! Forget command implementation

use anyhow::Result;

use crate::ipc::GatewayClient;
use crate::output::{print_success, print_warning};

use super::parse_phone;

/// Execute the forget command: deactivate and erase all tenant state
pub async fn forget_command(client: &mut GatewayClient, phone: &str) -> Result<()> {
    let phone = parse_phone(phone)?;

    if client.forget(&phone).await? {
        print_success(&format!("Forgot {}; the next activation pairs again", phone));
    } else {
        print_warning(&format!("Nothing stored for {}", phone));
    }

    Ok(())
}
