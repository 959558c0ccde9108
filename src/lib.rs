//! Arkivdium: website archiving on top of HTTrack.
//!
//! A run crawls a site twice (a light preview and the full archive), folds
//! the crawler's output into one tree, zips it, records it and emails the
//! owner. Scheduled jobs repeat runs daily, weekly or monthly.

pub mod archiver;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod notify;
pub mod repository;
pub mod schema;
pub mod server;
pub mod services;

pub use config::Settings;
pub use error::{ServiceError, ServiceResult};
