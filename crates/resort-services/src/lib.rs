//! Resort Services Layer
//!
//! Orchestration on top of the entity store and the media store client:
//! image collection updates with optimistic retries, license document
//! uploads, and the retention sweeper that purges those documents once a
//! booking has aged past the retention window.

pub mod documents;
pub mod images;
pub mod retention;

pub use documents::LicenseDocumentService;
pub use images::ImageCollectionService;
pub use retention::RetentionSweeper;
