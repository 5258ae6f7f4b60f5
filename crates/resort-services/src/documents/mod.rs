//! Sensitive booking documents (driver's-license photos)

pub mod service;

pub use service::LicenseDocumentService;
