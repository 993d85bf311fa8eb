//! Adapters for the domain ports: workflow storage and the simulated payment collaborator.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated_gateway;
