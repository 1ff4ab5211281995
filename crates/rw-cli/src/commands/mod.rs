//! Subcommand implementations.

mod catalog;
mod process;
mod validate;

pub use catalog::{cmd_actions, cmd_playbooks};
pub use process::{cmd_process, ProcessOptions};
pub use validate::cmd_validate;
