//! Jar reading and writing
//!
//! Reads the jar-in-jar manifest out of a jar and writes planned jars.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use jarjar_schema::{METADATA_PATH, Metadata, MetadataError};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::planner::Plan;

/// Errors reading or writing a jar.
#[derive(Error, Debug)]
pub enum JarError {
    /// Filesystem failure on `path`.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// `path` is not a readable zip archive.
    #[error("Invalid jar {}: {source}", path.display())]
    Zip {
        /// Offending jar.
        path: PathBuf,
        /// Zip reader or writer error.
        source: ZipError,
    },

    /// The manifest inside `path` failed to decode or validate.
    #[error("Invalid jar-in-jar manifest in {}: {source}", path.display())]
    Metadata {
        /// Jar carrying the manifest.
        path: PathBuf,
        /// Decode or validation error.
        source: MetadataError,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> JarError + '_ {
    move |source| JarError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn zip_err(path: &Path) -> impl FnOnce(ZipError) -> JarError + '_ {
    move |source| JarError::Zip {
        path: path.to_path_buf(),
        source,
    }
}

fn open(path: &Path) -> Result<ZipArchive<File>, JarError> {
    let file = File::open(path).map_err(io_err(path))?;
    ZipArchive::new(file).map_err(zip_err(path))
}

/// Read the manifest stored in `jar`, or `None` if the jar has none.
pub fn read_metadata(jar: &Path) -> Result<Option<Metadata>, JarError> {
    let mut archive = open(jar)?;
    let mut entry = match archive.by_name(METADATA_PATH) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(zip_err(jar)(e)),
    };

    // The declared size comes from the archive and is not trusted.
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).map_err(io_err(jar))?;
    Metadata::decode(&bytes)
        .map(Some)
        .map_err(|source| JarError::Metadata {
            path: jar.to_path_buf(),
            source,
        })
}

/// Names of all file entries in `jar`.
pub fn entry_names(jar: &Path) -> Result<Vec<String>, JarError> {
    let archive = open(jar)?;
    Ok(archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect())
}

/// Write `plan` into a jar at `output`.
///
/// Entries of `host` are copied through unchanged, except an old manifest
/// or an entry that a planned write replaces. Embedded jars are stored
/// uncompressed, and the manifest is written last. The output appears
/// atomically.
pub fn write_jar(host: Option<&Path>, plan: &Plan, output: &Path) -> Result<(), JarError> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(io_err(dir))?;

    let mut reserved: HashSet<&str> = plan.writes.iter().map(|w| w.destination.as_str()).collect();
    reserved.insert(METADATA_PATH);

    let stored = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default());
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    {
        let mut writer = ZipWriter::new(staged.as_file_mut());

        if let Some(host) = host {
            let mut archive = open(host)?;
            for i in 0..archive.len() {
                let entry = archive.by_index_raw(i).map_err(zip_err(host))?;
                if reserved.contains(entry.name()) {
                    debug!("replacing {} from host jar", entry.name());
                    continue;
                }
                writer.raw_copy_file(entry).map_err(zip_err(output))?;
            }
        }

        for write in &plan.writes {
            let mut source = File::open(&write.source).map_err(io_err(&write.source))?;
            writer
                .start_file(write.destination.as_str(), stored)
                .map_err(zip_err(output))?;
            let bytes = io::copy(&mut source, &mut writer).map_err(io_err(&write.source))?;
            debug!(bytes, "embedded {} at {}", write.source.display(), write.destination);
        }

        let manifest = plan
            .metadata
            .encode()
            .map_err(|source| JarError::Metadata {
                path: output.to_path_buf(),
                source,
            })?;
        writer
            .start_file(METADATA_PATH, deflated)
            .map_err(zip_err(output))?;
        writer.write_all(&manifest).map_err(io_err(output))?;
        writer.finish().map_err(zip_err(output))?;
    }

    staged
        .persist(output)
        .map_err(|e| io_err(output)(e.error))?;
    info!(
        embedded = plan.writes.len(),
        entries = plan.metadata.len(),
        "wrote {}",
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Declaration, Planner};
    use jarjar_schema::ArtifactCoordinate;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    fn read_entry(jar: &Path, name: &str) -> Vec<u8> {
        let mut archive = open(jar).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn sample_plan(dir: &TempDir) -> Plan {
        let lib = dir.path().join("lib-1.0.jar");
        write_zip(&lib, &[("org/example/Lib.class", b"cafebabe")]);
        Planner::default()
            .plan(&[
                Declaration::embedded(ArtifactCoordinate::new("org.example", "lib"), "1.0", &lib),
                Declaration::constraint(ArtifactCoordinate::new("org.example", "api"), "2.0"),
            ])
            .unwrap()
    }

    #[test]
    fn test_write_then_read_metadata() {
        let dir = TempDir::new().unwrap();
        let plan = sample_plan(&dir);
        let output = dir.path().join("out.jar");

        write_jar(None, &plan, &output).unwrap();

        let metadata = read_metadata(&output).unwrap().unwrap();
        assert_eq!(metadata, plan.metadata);
        assert_eq!(
            read_entry(&output, "META-INF/jarjar/lib-1.0.jar"),
            std::fs::read(dir.path().join("lib-1.0.jar")).unwrap()
        );
        // Constraint entries have no bytes.
        assert!(
            !entry_names(&output)
                .unwrap()
                .contains(&"META-INF/jarjar/api-2.0.jar".to_string())
        );
    }

    #[test]
    fn test_host_entries_are_kept_and_manifest_replaced() {
        let dir = TempDir::new().unwrap();
        let plan = sample_plan(&dir);
        let host = dir.path().join("host.jar");
        write_zip(
            &host,
            &[
                ("com/host/Main.class", b"main"),
                (METADATA_PATH, b"{\"jars\": []}"),
            ],
        );
        let output = dir.path().join("out.jar");

        write_jar(Some(&host), &plan, &output).unwrap();

        assert_eq!(read_entry(&output, "com/host/Main.class"), b"main");
        let names = entry_names(&output).unwrap();
        assert_eq!(names.iter().filter(|n| *n == METADATA_PATH).count(), 1);
        assert_eq!(read_metadata(&output).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_embedded_jars_are_stored() {
        let dir = TempDir::new().unwrap();
        let plan = sample_plan(&dir);
        let output = dir.path().join("out.jar");
        write_jar(None, &plan, &output).unwrap();

        let mut archive = open(&output).unwrap();
        let entry = archive.by_name("META-INF/jarjar/lib-1.0.jar").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn test_output_is_reproducible() {
        let dir = TempDir::new().unwrap();
        let plan = sample_plan(&dir);
        let first = dir.path().join("first.jar");
        let second = dir.path().join("second.jar");

        write_jar(None, &plan, &first).unwrap();
        write_jar(None, &plan, &second).unwrap();
        assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
    }

    #[test]
    fn test_jar_without_manifest() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain.jar");
        write_zip(&plain, &[("a.txt", b"a")]);
        assert!(read_metadata(&plain).unwrap().is_none());
    }

    #[test]
    fn test_manifest_size_field_is_not_trusted() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("forged.jar");
        let manifest = br#"{"jars":[{"identifier":{"group":"g","artifact":"a"},"path":"a.jar"}]}"#;
        let mut zip = ZipWriter::new(File::create(&jar).unwrap());
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(METADATA_PATH, stored).unwrap();
        zip.write_all(manifest).unwrap();
        zip.finish().unwrap();

        // Claim an uncompressed size of almost 4 GiB in the central directory.
        let mut bytes = std::fs::read(&jar).unwrap();
        let header = bytes
            .windows(4)
            .position(|w| *w == [0x50, 0x4b, 0x01, 0x02])
            .unwrap();
        bytes[header + 24..header + 28].copy_from_slice(&0xFFFF_FFF0_u32.to_le_bytes());
        std::fs::write(&jar, &bytes).unwrap();

        if let Ok(found) = read_metadata(&jar) {
            assert_eq!(found.unwrap().len(), 1);
        }
    }

    #[test]
    fn test_invalid_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("bad.jar");
        write_zip(&jar, &[(METADATA_PATH, b"{ not json")]);
        assert!(matches!(
            read_metadata(&jar),
            Err(JarError::Metadata { .. })
        ));
    }

    #[test]
    fn test_missing_source_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let mut plan = sample_plan(&dir);
        plan.writes[0].source = dir.path().join("gone.jar");
        let output = dir.path().join("out.jar");

        assert!(matches!(
            write_jar(None, &plan, &output),
            Err(JarError::Io { .. })
        ));
        assert!(!output.exists());
    }
}
