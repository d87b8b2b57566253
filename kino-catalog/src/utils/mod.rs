//! Utility modules for kino-catalog

pub mod db_retry;
pub mod pool_monitor;

pub use db_retry::{retry_on_lock, TransientError};
pub use pool_monitor::{begin_monitored, MonitoredTransaction};
