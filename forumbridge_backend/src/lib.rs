//! Mirrors a forum conversation feed into Slack threads without reposting
//! anything that was already mirrored.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod feed;
pub mod format;
pub mod identity;
pub mod ledger;
pub mod mirror;
pub mod node;
pub mod scheduler;
pub mod sink;
pub mod telemetry;
pub mod utils;
