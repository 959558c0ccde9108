//! HTTrack integration: command lines, process execution and output layout.

pub mod command;
pub mod reconcile;
pub mod runner;

pub use command::{extract_urls, hostnames, target_urls, CommandBuilder};
pub use reconcile::{reconcile, Reconciled};
pub use runner::{CommandRunner, ProcessError, ShellRunner};
