//! Data models for the media lifecycle core
//!
//! Sub-modules are organised by the entity family that owns the data: image
//! collections on listings and vehicles, sensitive documents on bookings.

mod document;
mod entity;
mod image;

pub use document::*;
pub use entity::*;
pub use image::*;
