//! ZIP container assembly with an atomic move into place

use crate::error::{ExportError, Result};
use log::debug;
use s_zip::StreamingZipWriter;
use std::borrow::Cow;
use std::path::Path;

/// One entry of the package, by exact part name
#[derive(Debug, Clone)]
pub struct PackagePart<'a> {
    pub path: String,
    pub bytes: Cow<'a, [u8]>,
}

impl<'a> PackagePart<'a> {
    pub fn owned(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        PackagePart {
            path: path.into(),
            bytes: Cow::Owned(bytes),
        }
    }

    pub fn borrowed(path: impl Into<String>, bytes: &'a [u8]) -> Self {
        PackagePart {
            path: path.into(),
            bytes: Cow::Borrowed(bytes),
        }
    }
}

/// Write `parts` into a ZIP at `dest`.
///
/// The archive is staged in a temporary file next to `dest` and renamed over
/// it only once the central directory is written; on any failure the staging
/// file is removed and `dest` is left untouched.
pub fn write_package(dest: &Path, parts: &[PackagePart<'_>], compression_level: u32) -> Result<()> {
    let dest_display = dest.display().to_string();
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let staging = tempfile::Builder::new()
        .prefix(".formsheet-")
        .suffix(".xlsx.tmp")
        .tempfile_in(dir)
        .map_err(|e| ExportError::ArchiveOpen {
            path: dest_display.clone(),
            reason: e.to_string(),
        })?
        .into_temp_path();

    let mut zip = StreamingZipWriter::with_compression(&*staging, compression_level.min(9))
        .map_err(|e| ExportError::ArchiveOpen {
            path: dest_display.clone(),
            reason: e.to_string(),
        })?;

    for part in parts {
        zip.start_entry(&part.path).map_err(ExportError::archive_write)?;
        zip.write_data(&part.bytes).map_err(ExportError::archive_write)?;
        debug!("wrote part {} ({} bytes)", part.path, part.bytes.len());
    }
    zip.finish().map_err(ExportError::archive_write)?;

    staging.persist(dest).map_err(|e| ExportError::Persist {
        path: dest_display,
        reason: e.error.to_string(),
    })?;

    Ok(())
}
