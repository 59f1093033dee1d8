//! Completed-file placement
//!
//! Default listener for the standalone server. When the last byte of a file
//! arrives it is moved out of the session directory into the storage root,
//! so closing the session afterwards only removes leftovers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use crate::bits::{BitsEvent, EventListener};

pub struct FilePlacer {
    root: PathBuf,
}

impl FilePlacer {
    /// Create the storage root if needed
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create storage root {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EventListener for FilePlacer {
    fn on_event(&self, event: &BitsEvent) -> anyhow::Result<()> {
        match event {
            BitsEvent::FileReceived { session_id, path } => {
                let Some(name) = path.file_name() else {
                    bail!("Received file has no name: {}", path.display());
                };
                let destination = self.root.join(name);
                move_file(path, &destination)?;

                tracing::info!(
                    session_id = %session_id,
                    destination = %destination.display(),
                    "Stored received file"
                );
            }
            BitsEvent::SessionCreated { session_id, .. } => {
                tracing::debug!(session_id = %session_id, "Session opened");
            }
            BitsEvent::SessionClosed { .. } | BitsEvent::SessionCanceled { .. } => {}
        }
        Ok(())
    }
}

/// Move `src` to `dst`: hard link, else rename, else copy
///
/// An existing destination is replaced unless it already is the source.
pub fn move_file(src: &Path, dst: &Path) -> anyhow::Result<()> {
    let src_meta = fs::metadata(src).with_context(|| format!("Failed to stat {}", src.display()))?;
    if !src_meta.is_file() {
        bail!("Source is not a regular file: {}", src.display());
    }

    match fs::metadata(dst) {
        Ok(dst_meta) => {
            if !dst_meta.is_file() {
                bail!("Destination is not a regular file: {}", dst.display());
            }
            if same_file(src, &src_meta, dst, &dst_meta) {
                return Ok(());
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to stat {}", dst.display())),
    }

    if fs::hard_link(src, dst).is_ok() {
        return remove_source(src);
    }
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    remove_source(src)
}

fn remove_source(src: &Path) -> anyhow::Result<()> {
    fs::remove_file(src).with_context(|| format!("Failed to remove {}", src.display()))
}

#[cfg(unix)]
fn same_file(_src: &Path, src_meta: &fs::Metadata, _dst: &Path, dst_meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    src_meta.dev() == dst_meta.dev() && src_meta.ino() == dst_meta.ino()
}

#[cfg(not(unix))]
fn same_file(src: &Path, _src_meta: &fs::Metadata, dst: &Path, _dst_meta: &fs::Metadata) -> bool {
    match (fs::canonicalize(src), fs::canonicalize(dst)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
