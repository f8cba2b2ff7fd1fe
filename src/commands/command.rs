//! Command trait definition for CLI commands.
//!
//! The trait uses `enum_dispatch` for efficient dynamic dispatch across
//! command variants.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all dupcall CLI commands.
#[enum_dispatch]
pub trait Command {
    /// Runs the command's main logic.
    fn execute(&self) -> Result<()>;
}
