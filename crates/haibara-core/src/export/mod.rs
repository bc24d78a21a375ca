//! Admin data export.
//!
//! Exports go through three backend calls: a permission check, a query for
//! the formats the business type supports, and the download itself. The
//! download name comes from the `Content-Disposition` header when present.

pub mod error;
pub mod exporter;
pub mod service;
pub mod types;

pub use error::ExportError;
pub use exporter::{default_file_name, Exporter};
pub use service::{filename_from_content_disposition, ExportService, ExportedFile};
pub use types::{BusinessType, ExportFormat};
