//! File helpers.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use bytes::Bytes;
use log::trace;

use super::error::CertIoError;

/// Reads the complete file at `path`.
pub fn read(path: &Path) -> Result<Bytes, CertIoError> {
    let mut f = File::open(path).map_err(|e| {
        CertIoError::new(format!("Could not open: '{}'", path.to_string_lossy()), e)
    })?;
    let mut bytes = Vec::new();
    f.read_to_end(&mut bytes).map_err(|e| {
        CertIoError::new(format!("Could not read: '{}'", path.to_string_lossy()), e)
    })?;
    Ok(Bytes::from(bytes))
}

/// Saves `content` to `full_path`, creating parent directories if needed.
pub fn save(content: &[u8], full_path: &Path) -> Result<(), CertIoError> {
    let mut f = create_file_with_path(full_path)?;
    f.write_all(content).map_err(|e| {
        CertIoError::new(format!("Could not write to: '{}'", full_path.to_string_lossy()), e)
    })?;

    trace!("Saved file: {}", full_path.to_string_lossy());
    Ok(())
}

fn create_file_with_path(path: &Path) -> Result<File, CertIoError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CertIoError::new(
                    format!("Could not create dir path for: '{}'", parent.to_string_lossy()),
                    e,
                )
            })?;
        }
    }
    File::create(path).map_err(|e| {
        CertIoError::new(format!("Could not create file: '{}'", path.to_string_lossy()), e)
    })
}
