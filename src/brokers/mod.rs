//! Venue gateway implementations - pluggable broker adapters

pub mod master_trust;

pub use master_trust::MasterTrust;
