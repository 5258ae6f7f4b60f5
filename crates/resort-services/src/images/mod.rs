//! Image collections on activities and vehicles

pub mod mutator;
pub mod service;

pub use mutator::{apply, remove_at};
pub use service::ImageCollectionService;
