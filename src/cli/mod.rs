//! CLI subcommand implementations for the shelfscout binary.

pub mod doctor;
pub mod output;
pub mod run_cmd;
