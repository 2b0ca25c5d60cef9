//! Cascading address verification against USPS Web Tools, with change detection
//! and a paced, checkpointed batch driver.

pub mod config;
pub mod error;
pub mod storage;
pub mod telemetry;
pub mod workflows;
