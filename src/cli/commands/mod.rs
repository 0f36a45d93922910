//! Command implementations, one module per subcommand.

pub mod check;
pub mod completions;
pub mod edit;
pub mod find;
pub mod list;
pub mod reset;
pub mod show;
pub mod vaults;
