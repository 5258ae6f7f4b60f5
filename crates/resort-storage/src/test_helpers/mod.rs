//! Test helpers for object store consumers
//!
//! This module provides an in-memory `ObjectStore` with failure injection so
//! the client, the image services and the retention sweeper can be tested
//! without a remote store.

pub mod memory_store;

pub use memory_store::MemoryObjectStore;
