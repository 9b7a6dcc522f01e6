//! Zip container output.
//!
//! The bundle is written to a temporary path next to the destination and
//! renamed into place only after a clean finish, so a failed run never
//! leaves a valid-looking archive behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::Result;

use super::manifest::{Manifest, MANIFEST_PATH};

/// Writes the rewritten file tree plus the manifest into a single archive
/// at `output`
pub fn write_archive(output: &Path, files: &[(String, Vec<u8>)], manifest: &Manifest) -> Result<()> {
    let tmp = temp_path(output);

    if let Err(e) = write_zip(&tmp, files, manifest) {
        // Never leave a partial archive behind
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, output)?;
    info!("Wrote archive {} ({} files)", output.display(), files.len() + 1);
    Ok(())
}

fn write_zip(tmp: &Path, files: &[(String, Vec<u8>)], manifest: &Manifest) -> Result<()> {
    if let Some(parent) = tmp.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut zip = ZipWriter::new(File::create(tmp)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_PATH, options)?;
    zip.write_all(&serde_json::to_vec_pretty(manifest)?)?;

    for (path, bytes) in files {
        debug!("Adding {} ({} bytes)", path, bytes.len());
        zip.start_file(path.as_str(), options)?;
        zip.write_all(bytes)?;
    }

    zip.finish()?;
    Ok(())
}

fn temp_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("archive.page"))
        .to_os_string();
    name.push(".tmp");
    output.with_file_name(name)
}
