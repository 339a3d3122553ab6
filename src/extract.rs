//! Save-archive extraction: one zip file in, one XML document out.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to open archive: {0}")]
    Open(#[source] std::io::Error),
    #[error("not a valid zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("expected exactly one entry in archive, found {found}")]
    EntryCount { found: usize },
    #[error("failed to read archive entry: {0}")]
    Read(#[source] std::io::Error),
    #[error("archive entry is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Read the single XML document embedded in a save archive.
///
/// The archive must contain exactly one entry. The source file is only
/// read, never modified.
pub fn read_save_xml(path: &Path) -> Result<String, ExtractError> {
    let file = File::open(path).map_err(ExtractError::Open)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    if archive.len() != 1 {
        return Err(ExtractError::EntryCount {
            found: archive.len(),
        });
    }

    let mut entry = archive.by_index(0)?;
    let mut xml = String::with_capacity(entry.size() as usize);
    entry
        .read_to_string(&mut xml)
        .map_err(ExtractError::Read)?;
    Ok(xml)
}
