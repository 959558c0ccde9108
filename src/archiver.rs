//! Zip a staging directory into a downloadable archive.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Errors that can occur while building an archive.
#[derive(Debug, Error)]
pub enum ArchiveFailure {
    #[error("Source directory not found: {0}")]
    MissingSource(PathBuf),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Zip every file and directory under `source` into `dest`.
///
/// Entries are stored relative to `source`. Returns the size of the written
/// zip file in bytes, which is the size shown to users.
pub fn zip_directory(source: &Path, dest: &Path) -> Result<u64, ArchiveFailure> {
    if !source.is_dir() {
        return Err(ArchiveFailure::MissingSource(source.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(dest)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    add_tree(&mut zip, source, source, options)?;

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;
    drop(writer);

    Ok(fs::metadata(dest)?.len())
}

fn add_tree<W: io::Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    base: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<(), ArchiveFailure> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    // Stable entry order keeps archives of identical trees identical.
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry_name(base, &path);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
            add_tree(zip, base, &path, options)?;
        } else if file_type.is_file() {
            zip.start_file(name, options)?;
            let mut input = File::open(&path)?;
            io::copy(&mut input, zip)?;
        }
        // Symlinks are not followed.
    }
    Ok(())
}

/// Zip entry name with forward slashes regardless of platform.
fn entry_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Human-readable size for emails, e.g. `1.4 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
