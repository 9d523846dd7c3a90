//! CLI command implementations

mod activate;
mod deactivate;
mod forget;
mod list;
mod status;
mod watch;

pub use activate::activate_command;
pub use deactivate::deactivate_command;
pub use forget::forget_command;
pub use list::list_command;
pub use status::status_command;
pub use watch::{watch_command, watch_notifications};

use wr_core::Phone;

/// Normalize and validate a phone argument
pub fn parse_phone(raw: &str) -> anyhow::Result<Phone> {
    let phone = Phone::new(raw);
    if !phone.is_valid() {
        anyhow::bail!("Invalid phone number {:?}: expected digits only", raw);
    }
    Ok(phone)
}
