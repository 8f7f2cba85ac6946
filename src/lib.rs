pub mod backup;
pub mod bootloader;
pub mod cli;
pub mod command;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod objects;
pub mod orchestrator;
pub mod period;
pub mod retention;
pub mod schedule;
pub mod snapshot_name;
pub mod subvolume;
