//! Subcommand implementations

pub mod character;
pub mod info;
