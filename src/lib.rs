pub mod apis;
pub mod charts;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod metrics_push;
pub mod pipeline;
pub mod storage;
pub mod types;
