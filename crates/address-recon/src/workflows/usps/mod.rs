//! USPS Web Tools adapter for the reconciliation cascade.

mod client;
mod xml;

pub use client::{UspsClient, UspsClientError};
