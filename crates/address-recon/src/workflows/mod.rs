pub mod reconciliation;
pub mod usps;
