pub mod cadence;
pub mod commands;
pub mod config;
pub mod context;
pub mod database;
pub mod export;
pub mod ledger;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod projection;
mod retry;
pub mod snapshot;
pub mod statistics;
pub mod trajectory;
