//! Retention of sensitive booking documents

pub mod service;

pub use service::RetentionSweeper;
