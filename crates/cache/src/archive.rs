//! Packing declared task outputs into `outputs.tar.gz` and back
//!
//! Entries are stored relative to the repository root so an archive can be
//! restored into any checkout. Unpacking extracts into a temporary directory
//! inside the root first; a corrupt archive therefore never touches the
//! working tree. Moving the extracted files into place is per-file atomic
//! but not transactional as a whole.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ripple_core::{Error, Result, TaskSpec, OUTPUTS_ARCHIVE_NAME, UNPACK_DIR_PREFIX};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Component, Path, PathBuf};
use tar::Header;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ArtifactPackager {
    root: PathBuf,
}

impl ArtifactPackager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive every existing declared output of `task` into
    /// `<staging>/<key>/outputs.tar.gz`. Returns `None` when no output exists.
    pub fn pack(&self, task: &TaskSpec, key: &str, staging: &Path) -> Result<Option<PathBuf>> {
        let mut relative: Vec<PathBuf> = Vec::new();
        for output in &task.outputs {
            let absolute = if output.path.is_absolute() {
                output.path.clone()
            } else {
                self.root.join(&output.path)
            };
            if !absolute.exists() {
                tracing::debug!(task = %task.name, output = %absolute.display(), "declared output missing; not archived");
                continue;
            }
            match absolute.strip_prefix(&self.root) {
                Ok(rel) if !rel.as_os_str().is_empty() => relative.push(rel.to_path_buf()),
                _ => tracing::warn!(
                    task = %task.name,
                    output = %absolute.display(),
                    "output lies outside the repository root; not archived"
                ),
            }
        }
        if relative.is_empty() {
            return Ok(None);
        }
        relative.sort();
        relative.dedup();

        let dir = staging.join(key);
        fs::create_dir_all(&dir).map_err(|e| Error::file_system(&dir, "create staging dir", e))?;
        let archive_path = dir.join(OUTPUTS_ARCHIVE_NAME);

        let temp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| Error::file_system(&dir, "create temporary archive", e))?;
        let encoder = GzEncoder::new(BufWriter::new(temp.reopen()?), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        for rel in &relative {
            self.append_tree(&mut builder, rel)
                .map_err(|e| Error::archive(&archive_path, format!("failed to add '{}': {e}", rel.display())))?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| Error::archive(&archive_path, e.to_string()))?;
        let writer = encoder
            .finish()
            .map_err(|e| Error::archive(&archive_path, e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| Error::archive(&archive_path, e.to_string()))?
            .sync_all()
            .map_err(|e| Error::file_system(&archive_path, "sync archive", e))?;
        temp.persist(&archive_path)
            .map_err(|e| Error::file_system(&archive_path, "persist archive", e.error))?;

        tracing::debug!(task = %task.name, entries = relative.len(), archive = %archive_path.display(), "outputs packed");
        Ok(Some(archive_path))
    }

    fn append_tree<W: std::io::Write>(
        &self,
        builder: &mut tar::Builder<W>,
        rel: &Path,
    ) -> std::io::Result<()> {
        let start = self.root.join(rel);
        for entry in WalkDir::new(&start).sort_by(|a, b| a.path().cmp(b.path())) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(%err, "skipping path during archive walk");
                    continue;
                }
            };
            let path = entry.path();
            let Ok(entry_rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let metadata = fs::symlink_metadata(path)?;
            let mut header = Header::new_gnu();
            header.set_uid(0);
            header.set_gid(0);
            header.set_mtime(0);
            if metadata.is_dir() {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, entry_rel, std::io::empty())?;
            } else if metadata.is_file() {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(file_mode(&metadata));
                header.set_size(metadata.len());
                builder.append_data(&mut header, entry_rel, File::open(path)?)?;
            } else {
                tracing::debug!(path = %path.display(), "skipping non-regular output entry");
            }
        }
        Ok(())
    }

    /// Restore an archive into the root.
    ///
    /// `Ok(false)` means the archive is missing or unreadable and nothing was
    /// written. An error means extraction succeeded but moving files into
    /// place failed part-way.
    pub fn unpack(&self, archive: &Path) -> Result<bool> {
        let file = match File::open(archive) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::file_system(archive, "open archive", e)),
        };

        fs::create_dir_all(&self.root)
            .map_err(|e| Error::file_system(&self.root, "create root", e))?;
        let staging = tempfile::Builder::new()
            .prefix(UNPACK_DIR_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| Error::file_system(&self.root, "create unpack dir", e))?;

        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        // Restored files are stamped with the current time so freshness
        // checks see them as newer than the inputs they were built from.
        tar.set_preserve_mtime(false);
        tar.set_overwrite(true);
        if let Err(e) = tar.unpack(staging.path()) {
            tracing::warn!(archive = %archive.display(), error = %e, "corrupt cache archive ignored");
            return Ok(false);
        }

        let mut moved = 0usize;
        for entry in WalkDir::new(staging.path()).min_depth(1).sort_by(|a, b| a.path().cmp(b.path())) {
            let entry = entry.map_err(|e| Error::archive(archive, e.to_string()))?;
            let Ok(rel) = entry.path().strip_prefix(staging.path()) else {
                continue;
            };
            if !is_safe_relative(rel) {
                continue;
            }
            let dest = self.root.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)
                    .map_err(|e| Error::file_system(&dest, "create output dir", e))?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| Error::file_system(parent, "create output dir", e))?;
                }
                fs::rename(entry.path(), &dest)
                    .map_err(|e| Error::file_system(&dest, "move restored output", e))?;
                moved += 1;
            }
        }

        tracing::debug!(archive = %archive.display(), files = moved, "outputs restored");
        Ok(true)
    }
}

fn is_safe_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}
