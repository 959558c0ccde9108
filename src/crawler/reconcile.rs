//! Normalize HTTrack's output tree into a single staging directory.
//!
//! HTTrack names its output after the host it actually fetched, which may be
//! `host/`, `www.host/` or a generic `web/` directory. Everything is moved
//! under `staging/`, with `www.` variants folded into the bare host name and
//! `web/` merged into the staging root.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

/// Directory under the crawl root that gets zipped.
pub const STAGING_DIR: &str = "staging";
/// HTTrack's list of files written during the crawl, relative to the crawl root.
pub const MANIFEST_PATH: &str = "hts-cache/new.lst";
/// HTTrack's fallback directory when it cannot name output after a host.
const GENERIC_DIR: &str = "web";

/// Result of reconciling one crawl root.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub staging: PathBuf,
    /// Top-level directories that were moved into staging.
    pub moved: Vec<String>,
    /// Whether the move list came from the crawler's manifest.
    pub from_manifest: bool,
}

/// Move the crawler's output under `root/staging`.
///
/// Missing variants are skipped. Fails if nothing at all was produced.
pub fn reconcile(root: &Path, hostnames: &[String]) -> io::Result<Reconciled> {
    let staging = root.join(STAGING_DIR);
    fs::create_dir_all(&staging)?;

    let mut moved = Vec::new();
    let mut from_manifest = false;

    if let Some(dirs) = read_manifest(root)? {
        for dir in dirs {
            let dest = canonical_destination(&staging, &dir, hostnames);
            if move_tolerant(&root.join(&dir), &dest)? {
                moved.push(dir);
            }
        }
        from_manifest = !moved.is_empty();
    }

    if moved.is_empty() {
        for (dir, dest) in candidate_moves(&staging, hostnames) {
            if move_tolerant(&root.join(&dir), &dest)? {
                moved.push(dir);
            }
        }
    }

    if moved.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "crawler produced no output for {} in {}",
                hostnames.join(", "),
                root.display()
            ),
        ));
    }

    debug!(
        "Reconciled {} ({}): {:?}",
        root.display(),
        if from_manifest { "manifest" } else { "candidates" },
        moved
    );

    Ok(Reconciled {
        staging,
        moved,
        from_manifest,
    })
}

/// Every directory name the crawler might have used, with its destination.
fn candidate_moves(staging: &Path, hostnames: &[String]) -> Vec<(String, PathBuf)> {
    let mut moves = Vec::with_capacity(hostnames.len() * 2 + 1);
    for host in hostnames {
        let bare = host.strip_prefix("www.").unwrap_or(host);
        moves.push((bare.to_string(), staging.join(bare)));
        moves.push((format!("www.{}", bare), staging.join(bare)));
    }
    moves.push((GENERIC_DIR.to_string(), staging.to_path_buf()));
    moves
}

fn canonical_destination(staging: &Path, dir: &str, hostnames: &[String]) -> PathBuf {
    if dir == GENERIC_DIR {
        return staging.to_path_buf();
    }
    if let Some(bare) = dir.strip_prefix("www.") {
        let known = hostnames
            .iter()
            .any(|h| h == bare || h.strip_prefix("www.") == Some(bare));
        if known {
            return staging.join(bare);
        }
    }
    staging.join(dir)
}

/// Top-level output directories listed in the crawler manifest, if there is one.
fn read_manifest(root: &Path) -> io::Result<Option<Vec<String>>> {
    // HTTrack writes paths in whatever encoding the server used.
    let bytes = match fs::read(root.join(MANIFEST_PATH)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let content = String::from_utf8_lossy(&bytes);

    let mut seen = HashSet::new();
    let mut dirs = Vec::new();
    for line in content.lines() {
        let line = line.trim().trim_start_matches('[').trim_end_matches(']');
        if line.is_empty() {
            continue;
        }
        let path = Path::new(line);
        let relative = path.strip_prefix(root).unwrap_or(path);

        let mut components = relative.components().filter_map(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        });
        let (Some(first), Some(_)) = (components.next(), components.next()) else {
            // Files directly under the root are HTTrack's own index pages.
            continue;
        };
        if first.starts_with("hts-") || first == STAGING_DIR {
            continue;
        }
        if seen.insert(first.to_string()) {
            dirs.push(first.to_string());
        }
    }
    Ok(Some(dirs))
}

/// Move `src` to `dest`, merging into `dest` if it already exists.
///
/// Returns `Ok(false)` when `src` does not exist.
pub fn move_tolerant(src: &Path, dest: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(src) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Skipping missing {}", src.display());
            return Ok(false);
        }
        Err(e) => return Err(e),
    }
    merge_move(src, dest)?;
    Ok(true)
}

fn merge_move(src: &Path, dest: &Path) -> io::Result<()> {
    if !dest.exists() {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        return fs::rename(src, dest);
    }

    if src.is_dir() && dest.is_dir() {
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            merge_move(&entry.path(), &dest.join(entry.file_name()))?;
        }
        // Only entries already present at the destination remain.
        fs::remove_dir_all(src)
    } else {
        warn!(
            "Keeping existing {}, discarding {}",
            dest.display(),
            src.display()
        );
        if src.is_dir() {
            fs::remove_dir_all(src)
        } else {
            fs::remove_file(src)
        }
    }
}
