// Library root: incident model, SQLite store, on-call rotation, and the
// reporting helpers shared by the listener and the CLI.

pub mod config;
pub mod db;
pub mod incident;
pub mod manager;
pub mod metrics;
pub mod oncall;
pub mod postmortem;
pub mod report;
