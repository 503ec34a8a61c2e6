//! CLI command handlers, one per file.

mod apply;
mod check;
mod checksum;

pub use apply::{run_apply, ApplyArgs};
pub use check::run_check;
pub use checksum::run_checksum;
