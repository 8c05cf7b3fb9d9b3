//! Subcommand implementations

pub mod fpm;
pub mod load;
pub mod probe;
pub mod worker;
