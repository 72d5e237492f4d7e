//! # formsheet
//!
//! Export form submissions to a self-contained Excel workbook (`.xlsx`).
//!
//! ## Features
//!
//! - **Hand-built OOXML**: every part (workbook, sheets, shared strings, styles,
//!   theme, drawings, relationships, content types) is written directly
//! - **Embedded attachments**: image uploads are placed in their cells, PDFs are
//!   packaged as binary parts with an audit sheet
//! - **Graceful degradation**: an attachment that cannot be downloaded stays in
//!   the workbook as a link
//! - **Messy input**: serialized PHP, JSON and nested upload descriptors are
//!   normalized into plain text and links
//! - **Atomic output**: the archive is staged next to the destination and moved
//!   into place only when complete
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formsheet::{
//!     export_workbook_with, prepare_columns, ExportOptions, FieldDescriptor, Form,
//!     OfflineFetcher, Submission,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fields = vec![
//!     FieldDescriptor::new(1, "name", "Name"),
//!     FieldDescriptor::new(2, "photo", "Photo").with_type("file_upload"),
//! ];
//! let columns = prepare_columns(&fields, "Submission Date");
//!
//! let submissions = vec![Submission::new(1, "2024-01-05 10:00:00")
//!     .with_meta("name", "Alice")
//!     .with_meta("photo", "https://example.com/uploads/alice.png")];
//!
//! let summary = export_workbook_with(
//!     Form::new(7, "Contact"),
//!     columns,
//!     &submissions,
//!     "contact.xlsx",
//!     ExportOptions::default(),
//!     OfflineFetcher,
//! )?;
//! println!("{} rows written", summary.rows);
//! # Ok(())
//! # }
//! ```
//!
//! With the default `http` feature, [`export_workbook`] downloads attachments
//! with a blocking HTTP client instead.

pub mod assets;
pub mod columns;
pub mod config;
pub mod error;
pub mod exporter;
pub mod extract;
pub mod layout;
pub mod types;
pub mod xlsx;

#[cfg(feature = "http")]
pub use assets::HttpFetcher;
pub use assets::{FetchResult, FetchedBody, Fetcher, OfflineFetcher};
pub use columns::{prepare_columns, select_columns};
pub use config::{ExportOptions, Labels, UploadRoot};
pub use error::{ExportError, FetchError, Result};
#[cfg(feature = "http")]
pub use exporter::export_workbook;
pub use exporter::{export_workbook_with, ExportSummary, WorkbookExporter};
pub use extract::extract;
pub use types::{Column, FieldDescriptor, Form, Payload, RawValue, Submission};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        let _ = std::marker::PhantomData::<ExportError>;
        let _ = std::marker::PhantomData::<WorkbookExporter<OfflineFetcher>>;
        let _ = std::marker::PhantomData::<ExportSummary>;
    }
}
