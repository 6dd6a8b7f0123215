//! Task fingerprints and output freshness
//!
//! A fingerprint hashes the task command and the *metadata* of its inputs
//! (path, modification time in nanoseconds, size), not their contents.
//! Touching a file without changing it therefore changes the key. That
//! trades precision for speed: hashing metadata never reads file bodies.

use ripple_core::{TaskSpec, DEFAULT_STATE_DIR, UNPACK_DIR_PREFIX};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::{DirEntry, WalkDir};

/// Paths that never count as task inputs.
///
/// Version control metadata, ripple's own state and cache and unpack scratch
/// directories change on every run; hashing them would make every key
/// unique. The default skips `.git`, `.ripple` and unpack directories by
/// name. Configured state and cache locations are added with
/// [`InputFilter::exclude`].
#[derive(Debug, Clone)]
pub struct InputFilter {
    names: Vec<String>,
    dirs: Vec<PathBuf>,
}

impl Default for InputFilter {
    fn default() -> Self {
        Self {
            names: vec![".git".to_string(), DEFAULT_STATE_DIR.to_string()],
            dirs: Vec::new(),
        }
    }
}

impl InputFilter {
    /// Also skip everything under `dir`
    #[must_use]
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let named = path.file_name().is_some_and(|name| {
            let name = name.to_string_lossy();
            name.starts_with(UNPACK_DIR_PREFIX) || self.names.iter().any(|n| *n == name)
        });
        named || self.dirs.iter().any(|dir| path.starts_with(dir))
    }

    /// Walk `root`, pruning excluded directories. The root itself is kept.
    fn walk<'a>(&'a self, root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
        WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| entry.depth() == 0 || !self.is_excluded(entry.path()))
    }
}

/// What went into a fingerprint, for `ripple cache key --explain`
#[derive(Debug, Default, Clone, Serialize)]
pub struct FingerprintManifest {
    pub label: String,
    pub entries: Vec<String>,
}

/// Incremental fingerprint builder
#[derive(Debug)]
pub struct Fingerprinter {
    hasher: Sha256,
    filter: InputFilter,
    pub manifest: FingerprintManifest,
}

impl Fingerprinter {
    pub fn new(label: &str) -> Self {
        Self {
            hasher: Sha256::new(),
            filter: InputFilter::default(),
            manifest: FingerprintManifest {
                label: label.to_string(),
                entries: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: InputFilter) -> Self {
        self.filter = filter;
        self
    }

    fn update(&mut self, entry: String) {
        self.hasher.update(entry.as_bytes());
        self.hasher.update([0u8]);
        self.manifest.entries.push(entry);
    }

    pub fn add_command(&mut self, command: &str) {
        self.update(format!("command:{command}"));
    }

    pub fn add_key_override(&mut self, key: &str) {
        self.update(format!("cache_key:{key}"));
    }

    /// Add one input; directories contribute every file beneath them
    pub fn add_input(&mut self, path: &Path) {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                let mut files: Vec<(PathBuf, std::fs::Metadata)> = self
                    .filter
                    .walk(path)
                    .filter_map(|entry| match entry {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unreadable input entry");
                            None
                        }
                    })
                    .filter(|entry| entry.file_type().is_file())
                    .filter_map(|entry| {
                        let meta = entry.metadata().ok()?;
                        Some((entry.into_path(), meta))
                    })
                    .collect();
                files.sort_by(|a, b| a.0.cmp(&b.0));
                if files.is_empty() {
                    self.update(format!("dir:{}:empty", path.display()));
                }
                for (file, meta) in files {
                    self.add_file(&file, &meta);
                }
            }
            Ok(meta) => self.add_file(path, &meta),
            Err(_) => self.update(format!("input:{}:missing", path.display())),
        }
    }

    fn add_file(&mut self, path: &Path, meta: &std::fs::Metadata) {
        let mtime = meta.modified().map(nanos_since_epoch).unwrap_or(0);
        self.update(format!("input:{}:{mtime}:{}", path.display(), meta.len()));
    }

    /// Hex-encoded SHA-256 of everything added so far
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

fn nanos_since_epoch(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Build the fingerprinter for a task with its inputs in sorted order
pub fn fingerprinter_for(task: &TaskSpec, filter: &InputFilter) -> Fingerprinter {
    let mut fp = Fingerprinter::new(&task.name).with_filter(filter.clone());
    fp.add_command(&task.command);

    let mut overrides: Vec<&str> = task
        .outputs
        .iter()
        .filter_map(|o| o.cache_key.as_deref())
        .collect();
    overrides.sort_unstable();
    overrides.dedup();
    for key in overrides {
        fp.add_key_override(key);
    }

    let mut inputs: Vec<&PathBuf> = task.inputs.iter().collect();
    inputs.sort();
    for input in inputs {
        fp.add_input(input);
    }
    fp
}

/// Deterministic cache key for a task. Never fails: missing inputs hash as
/// a `missing` marker.
pub fn hash_inputs(task: &TaskSpec, filter: &InputFilter) -> String {
    fingerprinter_for(task, filter).finish()
}

/// Newest modification time among a path's files, `None` if absent
fn newest_mtime(path: &Path, filter: &InputFilter) -> Option<SystemTime> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_dir() {
        return meta.modified().ok();
    }
    filter
        .walk(path)
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok()?.modified().ok())
        .max()
}

/// Oldest modification time among a path's files. An empty directory uses
/// its own mtime.
fn oldest_mtime(path: &Path, filter: &InputFilter) -> Option<SystemTime> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_dir() {
        return meta.modified().ok();
    }
    filter
        .walk(path)
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok()?.modified().ok())
        .min()
        .or_else(|| meta.modified().ok())
}

/// True when every declared output exists and none is older than the newest
/// input. A task without outputs is never fresh.
pub fn outputs_fresh(task: &TaskSpec, filter: &InputFilter) -> bool {
    if task.outputs.is_empty() {
        return false;
    }

    let mut oldest_output: Option<SystemTime> = None;
    for output in &task.outputs {
        match oldest_mtime(&output.path, filter) {
            Some(mtime) => {
                oldest_output = Some(oldest_output.map_or(mtime, |o| o.min(mtime)));
            }
            None => return false,
        }
    }

    let newest_input = task.inputs.iter().filter_map(|p| newest_mtime(p, filter)).max();
    match (oldest_output, newest_input) {
        (Some(output), Some(input)) => output >= input,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::OutputSpec;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    fn filter() -> InputFilter {
        InputFilter::default()
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn task_in(temp: &TempDir) -> TaskSpec {
        TaskSpec::new("build", "make build")
            .with_inputs([temp.path().join("src/x.txt")])
            .with_outputs([temp.path().join("out/y.txt")])
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_hash_is_deterministic() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/x.txt"), "hello");
        let task = task_in(&temp);
        assert_eq!(hash_inputs(&task, &filter()), hash_inputs(&task, &filter()));
        assert_eq!(hash_inputs(&task, &filter()).len(), 64);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        write(&a, "a");
        write(&b, "b");
        let one = TaskSpec::new("t", "cmd").with_inputs([a.clone(), b.clone()]);
        let two = TaskSpec::new("t", "cmd").with_inputs([b, a]);
        assert_eq!(hash_inputs(&one, &filter()), hash_inputs(&two, &filter()));
    }

    #[test]
    fn test_hash_changes_with_command_mtime_and_size() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("src/x.txt");
        write(&input, "hello");
        let base = hash_inputs(&task_in(&temp), &filter());

        let mut other = task_in(&temp);
        other.command = "make all".to_string();
        assert_ne!(hash_inputs(&other, &filter()), base);

        set_mtime(&input, SystemTime::now() + Duration::from_secs(60));
        let touched = hash_inputs(&task_in(&temp), &filter());
        assert_ne!(touched, base);

        fs::write(&input, "hello world").unwrap();
        assert_ne!(hash_inputs(&task_in(&temp), &filter()), touched);
    }

    #[test]
    fn test_missing_input_is_hashable() {
        let temp = TempDir::new().unwrap();
        let task = task_in(&temp);
        let missing = hash_inputs(&task, &filter());
        write(&temp.path().join("src/x.txt"), "now present");
        assert_ne!(hash_inputs(&task, &filter()), missing);
    }

    #[test]
    fn test_cache_key_override_is_folded_in() {
        let temp = TempDir::new().unwrap();
        let plain = task_in(&temp);
        let mut keyed = task_in(&temp);
        keyed.outputs = vec![OutputSpec {
            path: temp.path().join("out/y.txt"),
            cache_key: Some("v2".to_string()),
        }];
        assert_ne!(hash_inputs(&plain, &filter()), hash_inputs(&keyed, &filter()));
    }

    #[test]
    fn test_directory_inputs_cover_nested_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("src");
        write(&dir.join("nested/a.txt"), "a");
        let task = TaskSpec::new("t", "cmd").with_inputs([dir.clone()]);
        let before = hash_inputs(&task, &filter());
        write(&dir.join("nested/b.txt"), "b");
        assert_ne!(hash_inputs(&task, &filter()), before);
    }

    #[test]
    fn test_outputs_fresh() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("src/x.txt");
        let output = temp.path().join("out/y.txt");
        let task = task_in(&temp);
        let now = SystemTime::now();

        write(&input, "in");
        assert!(!outputs_fresh(&task, &filter()), "missing output is never fresh");

        write(&output, "out");
        set_mtime(&input, now - Duration::from_secs(10));
        set_mtime(&output, now);
        assert!(outputs_fresh(&task, &filter()));

        set_mtime(&input, now + Duration::from_secs(10));
        assert!(!outputs_fresh(&task, &filter()));
    }

    #[test]
    fn test_task_without_outputs_is_never_fresh() {
        let task = TaskSpec::new("lint", "make lint");
        assert!(!outputs_fresh(&task, &filter()));
    }

    #[test]
    fn test_state_and_scratch_directories_are_not_inputs() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/x.txt"), "x");
        let task = TaskSpec::new("all", "make").with_inputs([temp.path().to_path_buf()]);
        let base = hash_inputs(&task, &filter());

        write(&temp.path().join(".ripple/last_results.json"), "{}");
        write(&temp.path().join(".ripple/cache/k/manifest.json"), "{}");
        write(&temp.path().join(".git/index"), "idx");
        write(&temp.path().join(".ripple-unpack-abc/out/y.txt"), "y");
        assert_eq!(hash_inputs(&task, &filter()), base);

        write(&temp.path().join("src/z.txt"), "z");
        assert_ne!(hash_inputs(&task, &filter()), base);
    }

    #[test]
    fn test_configured_directories_are_excluded() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/x.txt"), "x");
        let cache_dir = temp.path().join("build-cache");
        let custom = filter().exclude(&cache_dir);
        let task = TaskSpec::new("all", "make").with_inputs([temp.path().to_path_buf()]);
        let base = hash_inputs(&task, &custom);

        write(&cache_dir.join("k/outputs.tar.gz"), "blob");
        assert_eq!(hash_inputs(&task, &custom), base);
        assert_ne!(hash_inputs(&task, &filter()), base);
    }

    #[test]
    fn test_state_writes_do_not_make_outputs_stale() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("src/x.txt");
        let output = temp.path().join("out/y.txt");
        let state = temp.path().join(".ripple/state.json");
        write(&input, "x");
        write(&output, "y");
        write(&state, "{}");
        let task = TaskSpec::new("all", "make")
            .with_inputs([temp.path().to_path_buf()])
            .with_outputs([output.clone()]);

        let now = SystemTime::now();
        set_mtime(&input, now - Duration::from_secs(20));
        set_mtime(&output, now - Duration::from_secs(10));
        set_mtime(&state, now);
        assert!(outputs_fresh(&task, &filter()));

        set_mtime(&input, now);
        assert!(!outputs_fresh(&task, &filter()));
    }
}
