//! Extraction cache
//!
//! Materializes selected embedded jars as plain files on disk. Each key is
//! extracted at most once per cache, however many tasks ask for it at the
//! same time, and every asker sees the same outcome.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jarjar_schema::ArtifactVersion;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::selection::{ArchiveId, SelectedJar};

/// Fallback file name when an internal path has no usable last component.
const FALLBACK_FILE_NAME: &str = "embedded.jar";

/// Extraction failures. Cloneable so one failure can reach every waiter.
#[derive(Error, Debug, Clone)]
pub enum ExtractionError {
    /// The outer jar could not be opened.
    #[error("Failed to open {archive}: {source}")]
    Open {
        /// Outer jar.
        archive: ArchiveId,
        /// Underlying I/O error.
        source: Arc<io::Error>,
    },

    /// The outer jar is not a readable zip archive.
    #[error("{archive} is not a valid jar: {source}")]
    Corrupt {
        /// Outer jar.
        archive: ArchiveId,
        /// Zip reader error.
        source: Arc<ZipError>,
    },

    /// The outer jar lacks the entry the manifest names.
    #[error("{archive} has no entry {path}")]
    MissingEntry {
        /// Outer jar.
        archive: ArchiveId,
        /// Internal path that was looked up.
        path: String,
    },

    /// Reading the embedded entry failed part way.
    #[error("Failed to read {path} from {archive}: {source}")]
    Copy {
        /// Outer jar.
        archive: ArchiveId,
        /// Internal path being copied.
        path: String,
        /// Underlying I/O error.
        source: Arc<io::Error>,
    },

    /// The cache file could not be written or moved into place.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Destination inside the cache.
        path: PathBuf,
        /// Underlying I/O error.
        source: Arc<io::Error>,
    },

    /// The task performing the extraction went away without reporting.
    #[error("Extraction of {0} was abandoned before it finished")]
    Abandoned(String),
}

/// What to extract: one embedded entry of one outer jar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractionKey {
    /// Outer jar.
    pub source: ArchiveId,
    /// Entry inside the outer jar.
    pub path: String,
    /// Resolved version of the entry.
    pub version: ArtifactVersion,
}

impl ExtractionKey {
    /// BLAKE3 over the key fields, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.source.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(self.path.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.version.as_str().as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Last component of the internal path.
    pub fn file_name(&self) -> &str {
        match self.path.rsplit(['/', '\\']).next() {
            Some(name) if !matches!(name, "" | "." | "..") => name,
            _ => FALLBACK_FILE_NAME,
        }
    }
}

impl From<&SelectedJar> for ExtractionKey {
    fn from(jar: &SelectedJar) -> Self {
        Self {
            source: jar.source.clone(),
            path: jar.path.clone(),
            version: jar.version.clone(),
        }
    }
}

/// Reads embedded entries out of outer archives.
pub trait ArchiveSource: Send + Sync + 'static {
    /// Copy the bytes of `path` inside `archive` into `out`, returning the byte count.
    fn copy_entry(
        &self,
        archive: &ArchiveId,
        path: &str,
        out: &mut dyn Write,
    ) -> Result<u64, ExtractionError>;
}

/// Reads entries from jar files on disk, treating the archive id as a path.
#[derive(Debug, Clone, Copy, Default)]
pub struct JarSource;

impl ArchiveSource for JarSource {
    fn copy_entry(
        &self,
        archive: &ArchiveId,
        path: &str,
        out: &mut dyn Write,
    ) -> Result<u64, ExtractionError> {
        let file = File::open(archive.as_path()).map_err(|e| ExtractionError::Open {
            archive: archive.clone(),
            source: Arc::new(e),
        })?;
        let mut zip = ZipArchive::new(file).map_err(|e| ExtractionError::Corrupt {
            archive: archive.clone(),
            source: Arc::new(e),
        })?;
        let mut entry = zip.by_name(path).map_err(|e| match e {
            ZipError::FileNotFound => ExtractionError::MissingEntry {
                archive: archive.clone(),
                path: path.to_string(),
            },
            other => ExtractionError::Corrupt {
                archive: archive.clone(),
                source: Arc::new(other),
            },
        })?;

        io::copy(&mut entry, out).map_err(|e| ExtractionError::Copy {
            archive: archive.clone(),
            path: path.to_string(),
            source: Arc::new(e),
        })
    }
}

type Outcome = Option<Result<PathBuf, ExtractionError>>;
type InFlight = Arc<Mutex<HashMap<ExtractionKey, watch::Receiver<Outcome>>>>;

/// Content-addressed cache of extracted jars.
///
/// Files live at `<root>/<h[..2]>/<h>/<file name>` where `h` is the key digest.
pub struct ExtractionCache<S = JarSource> {
    root: PathBuf,
    source: Arc<S>,
    inflight: InFlight,
}

impl<S> Clone for ExtractionCache<S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            source: Arc::clone(&self.source),
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<S> fmt::Debug for ExtractionCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionCache")
            .field("root", &self.root)
            .field("in_flight", &lock(&self.inflight).len())
            .finish_non_exhaustive()
    }
}

impl ExtractionCache<JarSource> {
    /// A cache reading jars from disk.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::new(root, JarSource)
    }
}

impl<S: ArchiveSource> ExtractionCache<S> {
    /// A cache rooted at `root` reading entries through `source`.
    pub fn new(root: impl Into<PathBuf>, source: S) -> Self {
        Self {
            root: root.into(),
            source: Arc::new(source),
            inflight: Arc::default(),
        }
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `key` is (or will be) materialized.
    pub fn location(&self, key: &ExtractionKey) -> PathBuf {
        let digest = key.digest();
        self.root
            .join(&digest[..2])
            .join(&digest)
            .join(key.file_name())
    }

    /// Materialize `key` on disk and return its path.
    ///
    /// Concurrent calls for the same key share one extraction. A failed
    /// extraction is forgotten, so calling again retries it.
    pub async fn materialize(&self, key: &ExtractionKey) -> Result<PathBuf, ExtractionError> {
        let mut rx = {
            let mut inflight = lock(&self.inflight);
            if let Some(rx) = inflight.get(key) {
                rx.clone()
            } else {
                let (tx, rx) = watch::channel(None);
                inflight.insert(key.clone(), rx.clone());
                self.spawn_extraction(key.clone(), tx);
                rx
            }
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        match outcome {
            Some(result) => result,
            None => {
                let mut inflight = lock(&self.inflight);
                if inflight.get(key).is_some_and(|slot| slot.same_channel(&rx)) {
                    inflight.remove(key);
                }
                Err(ExtractionError::Abandoned(key.path.clone()))
            }
        }
    }

    fn spawn_extraction(&self, key: ExtractionKey, tx: watch::Sender<Outcome>) {
        let source = Arc::clone(&self.source);
        let inflight = Arc::clone(&self.inflight);
        let target = self.location(&key);

        // The job publishes its own outcome so callers may be cancelled freely.
        tokio::task::spawn_blocking(move || {
            let result = extract(source.as_ref(), &key, &target);
            if let Err(e) = &result {
                warn!(source = %key.source, path = %key.path, "extraction failed: {e}");
                lock(&inflight).remove(&key);
            }
            tx.send_replace(Some(result));
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn extract<S: ArchiveSource + ?Sized>(
    source: &S,
    key: &ExtractionKey,
    target: &Path,
) -> Result<PathBuf, ExtractionError> {
    if target.is_file() {
        debug!(path = %key.path, "reusing {}", target.display());
        return Ok(target.to_path_buf());
    }

    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e: io::Error| ExtractionError::Write {
            path,
            source: Arc::new(e),
        }
    };

    let dir = target.parent().unwrap_or(target);
    fs::create_dir_all(dir).map_err(write_err(dir))?;

    // Staged next to the target; dropped (and deleted) on any failure.
    let mut staged = NamedTempFile::new_in(dir).map_err(write_err(dir))?;
    let bytes = source.copy_entry(&key.source, &key.path, staged.as_file_mut())?;
    staged.as_file_mut().flush().map_err(write_err(staged.path()))?;
    staged
        .persist(target)
        .map_err(|e| write_err(target)(e.error))?;

    info!(
        source = %key.source,
        path = %key.path,
        bytes,
        "extracted to {}",
        target.display()
    );
    Ok(target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    const FAIL: usize = 1;
    const PANIC: usize = 2;

    /// Serves fixed bytes after a short delay and counts reads.
    #[derive(Default)]
    struct FakeSource {
        reads: AtomicUsize,
        mode: AtomicUsize,
    }

    impl FakeSource {
        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl ArchiveSource for Arc<FakeSource> {
        fn copy_entry(
            &self,
            archive: &ArchiveId,
            path: &str,
            out: &mut dyn Write,
        ) -> Result<u64, ExtractionError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            match self.mode.load(Ordering::SeqCst) {
                FAIL => {
                    out.write_all(b"partial").unwrap();
                    Err(ExtractionError::MissingEntry {
                        archive: archive.clone(),
                        path: path.to_string(),
                    })
                }
                PANIC => panic!("source blew up"),
                _ => {
                    let body = format!("{archive}!{path}");
                    out.write_all(body.as_bytes()).unwrap();
                    Ok(body.len() as u64)
                }
            }
        }
    }

    fn key(path: &str) -> ExtractionKey {
        ExtractionKey {
            source: ArchiveId::new("outer.jar"),
            path: path.to_string(),
            version: ArtifactVersion::new("1.0"),
        }
    }

    fn fake_cache(dir: &TempDir) -> (ExtractionCache<Arc<FakeSource>>, Arc<FakeSource>) {
        let source = Arc::new(FakeSource::default());
        (
            ExtractionCache::new(dir.path().join("cache"), Arc::clone(&source)),
            source,
        )
    }

    #[test]
    fn test_location_layout() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = fake_cache(&dir);
        let k = key("META-INF/jarjar/lib-1.0.jar");
        let digest = k.digest();

        let location = cache.location(&k);
        assert_eq!(
            location,
            dir.path()
                .join("cache")
                .join(&digest[..2])
                .join(&digest)
                .join("lib-1.0.jar")
        );
    }

    #[test]
    fn test_file_name_fallback() {
        assert_eq!(key("META-INF/jarjar/").file_name(), "embedded.jar");
        assert_eq!(key("META-INF/..").file_name(), "embedded.jar");
        assert_eq!(key("lib.jar").file_name(), "lib.jar");
    }

    #[test]
    fn test_digest_separates_fields() {
        let a = ExtractionKey {
            source: ArchiveId::new("ab"),
            path: "c".into(),
            version: ArtifactVersion::new("1"),
        };
        let b = ExtractionKey {
            source: ArchiveId::new("a"),
            path: "bc".into(),
            version: ArtifactVersion::new("1"),
        };
        assert_ne!(a.digest(), b.digest());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_extraction() {
        let dir = TempDir::new().unwrap();
        let (cache, source) = fake_cache(&dir);
        let k = key("META-INF/jarjar/lib-1.0.jar");

        let mut tasks = JoinSet::new();
        for _ in 0..50 {
            let cache = cache.clone();
            let k = k.clone();
            tasks.spawn(async move { cache.materialize(&k).await });
        }

        let mut paths = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            paths.push(joined.unwrap().unwrap());
        }

        assert_eq!(paths.len(), 50);
        assert!(paths.iter().all(|p| p == &paths[0]));
        assert_eq!(source.reads(), 1);
        assert_eq!(
            fs::read_to_string(&paths[0]).unwrap(),
            "outer.jar!META-INF/jarjar/lib-1.0.jar"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_reaches_every_waiter_and_is_retried() {
        let dir = TempDir::new().unwrap();
        let (cache, source) = fake_cache(&dir);
        source.mode.store(FAIL, Ordering::SeqCst);
        let k = key("META-INF/jarjar/lib-1.0.jar");

        let mut tasks = JoinSet::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let k = k.clone();
            tasks.spawn(async move { cache.materialize(&k).await });
        }
        while let Some(joined) = tasks.join_next().await {
            assert!(matches!(
                joined.unwrap(),
                Err(ExtractionError::MissingEntry { .. })
            ));
        }
        assert_eq!(source.reads(), 1);

        // Nothing partial left behind.
        let target = cache.location(&k);
        assert!(!target.exists());
        let leftovers = target
            .parent()
            .map(|d| fs::read_dir(d).map(Iterator::count).unwrap_or(0))
            .unwrap_or(0);
        assert_eq!(leftovers, 0);

        source.mode.store(0, Ordering::SeqCst);
        let path = cache.materialize(&k).await.unwrap();
        assert_eq!(path, target);
        assert_eq!(source.reads(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_job_is_abandoned_and_retried() {
        let dir = TempDir::new().unwrap();
        let (cache, source) = fake_cache(&dir);
        source.mode.store(PANIC, Ordering::SeqCst);
        let k = key("lib.jar");

        assert!(matches!(
            cache.materialize(&k).await,
            Err(ExtractionError::Abandoned(_))
        ));

        source.mode.store(0, Ordering::SeqCst);
        assert!(cache.materialize(&k).await.is_ok());
        assert_eq!(source.reads(), 2);
    }

    #[tokio::test]
    async fn test_success_is_memoized() {
        let dir = TempDir::new().unwrap();
        let (cache, source) = fake_cache(&dir);
        let k = key("lib.jar");

        let first = cache.materialize(&k).await.unwrap();
        let second = cache.materialize(&k).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.reads(), 1);
    }

    #[tokio::test]
    async fn test_existing_file_is_reused_without_reading() {
        let dir = TempDir::new().unwrap();
        let (cache, source) = fake_cache(&dir);
        let k = key("lib.jar");

        let target = cache.location(&k);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, b"already here").unwrap();

        let path = cache.materialize(&k).await.unwrap();
        assert_eq!(path, target);
        assert_eq!(source.reads(), 0);
        assert_eq!(fs::read(&path).unwrap(), b"already here");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_distinct_keys_extract_independently() {
        let dir = TempDir::new().unwrap();
        let (cache, source) = fake_cache(&dir);

        let (first, second) = (key("a.jar"), key("b.jar"));
        let (a, b) = tokio::join!(cache.materialize(&first), cache.materialize(&second));
        assert_ne!(a.unwrap(), b.unwrap());
        assert_eq!(source.reads(), 2);
    }

    fn write_outer_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_debug_shows_root() {
        let dir = TempDir::new().unwrap();
        let (cache, _source) = fake_cache(&dir);
        let text = format!("{cache:?}");
        assert!(text.starts_with("ExtractionCache"), "{text}");
        assert!(text.contains("in_flight: 0"), "{text}");
        assert!(text.contains(&format!("{:?}", cache.root())), "{text}");
    }

    #[tokio::test]
    async fn test_jar_source_reads_embedded_entry() {
        let dir = TempDir::new().unwrap();
        let outer = dir.path().join("outer.jar");
        write_outer_jar(&outer, &[("META-INF/jarjar/lib-1.0.jar", b"inner bytes")]);

        let cache = ExtractionCache::open(dir.path().join("cache"));
        let k = ExtractionKey {
            source: ArchiveId::from(outer.as_path()),
            path: "META-INF/jarjar/lib-1.0.jar".into(),
            version: ArtifactVersion::new("1.0"),
        };
        let path = cache.materialize(&k).await.unwrap();
        assert_eq!(fs::read(path).unwrap(), b"inner bytes");
    }

    #[tokio::test]
    async fn test_jar_source_errors() {
        let dir = TempDir::new().unwrap();
        let outer = dir.path().join("outer.jar");
        write_outer_jar(&outer, &[("other.txt", b"x")]);
        let garbage = dir.path().join("garbage.jar");
        fs::write(&garbage, b"not a zip at all").unwrap();

        let cache = ExtractionCache::open(dir.path().join("cache"));
        let at = |archive: &Path| ExtractionKey {
            source: ArchiveId::from(archive),
            path: "lib.jar".into(),
            version: ArtifactVersion::new("1.0"),
        };

        assert!(matches!(
            cache.materialize(&at(&outer)).await,
            Err(ExtractionError::MissingEntry { .. })
        ));
        assert!(matches!(
            cache.materialize(&at(&garbage)).await,
            Err(ExtractionError::Corrupt { .. })
        ));
        assert!(matches!(
            cache.materialize(&at(&dir.path().join("absent.jar"))).await,
            Err(ExtractionError::Open { .. })
        ));
    }
}
