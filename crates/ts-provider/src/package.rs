//! Packaging of inline handler source into a Lambda deployment archive.

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ProviderError, ProviderResult};

/// Module file the inline source is stored as; matches the `index.` prefix
/// of the default handler entry.
pub const INLINE_MODULE: &str = "index.py";

/// Zip `source` as a single `index.py` entry.
pub fn inline_archive(source: &str) -> ProviderResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    zip.start_file(INLINE_MODULE, options)
        .map_err(|e| ProviderError::Packaging(format!("failed to start {INLINE_MODULE}: {e}")))?;
    zip.write_all(source.as_bytes())
        .map_err(|e| ProviderError::Packaging(format!("failed to write {INLINE_MODULE}: {e}")))?;

    let cursor = zip
        .finish()
        .map_err(|e| ProviderError::Packaging(format!("failed to finish archive: {e}")))?;
    Ok(cursor.into_inner())
}
