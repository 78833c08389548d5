//! Raw REST client for the MasterTrust venue API.

pub mod client;
pub mod model;

pub use client::MasterTrustClient;
