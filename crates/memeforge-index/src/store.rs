//! Template index persistence.
//!
//! The index is stored as one JSON document. Every write goes to its own
//! uniquely named sibling temp file that is fsynced and renamed over the
//! target, so readers only ever see a complete previous or complete new
//! index, even with several writers in one process.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::IndexError;
use crate::record::{TemplateIndex, TemplateRecord};

/// Current on-disk format version
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    embedding_model: &'a str,
    dimension: usize,
    records: &'a [TemplateRecord],
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    embedding_model: String,
    dimension: usize,
    records: Vec<TemplateRecord>,
}

/// Persist `index` to `path` atomically.
pub fn persist(index: &TemplateIndex, path: &Path) -> Result<(), IndexError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "template-index".to_string());

    let doc = IndexFileRef {
        format_version: INDEX_FORMAT_VERSION,
        embedding_model: index.embedding_model(),
        dimension: index.dimension(),
        records: index.records(),
    };

    // removed on drop unless persisted
    let tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    write_document(&doc, tmp.as_file())?;
    tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;

    info!(path = ?path, templates = index.len(), "Saved template index");
    Ok(())
}

fn write_document(doc: &IndexFileRef<'_>, file: &fs::File) -> Result<(), IndexError> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, doc)
        .map_err(|e| IndexError::Serialization(e.to_string()))?;
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| IndexError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

/// Load and validate the index stored at `path`.
///
/// `IndexMissing` when there is no file; `IndexCorrupt` when the file
/// cannot be parsed or violates an index invariant.
pub fn load(path: &Path) -> Result<TemplateIndex, IndexError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(IndexError::IndexMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let corrupt = |reason: String| IndexError::IndexCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.is_empty() {
        return Err(corrupt("file is empty".to_string()));
    }

    let doc: IndexFile = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;

    if doc.format_version != INDEX_FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {} (expected {})",
            doc.format_version, INDEX_FORMAT_VERSION
        )));
    }
    if let Some(bad) = doc
        .records
        .iter()
        .find(|r| r.embedding().dimension() != doc.dimension)
    {
        return Err(corrupt(format!(
            "record {:?} has dimension {}, header says {}",
            bad.id(),
            bad.embedding().dimension(),
            doc.dimension
        )));
    }

    let index = TemplateIndex::new(doc.embedding_model, doc.records).map_err(|e| match e {
        IndexError::InvalidIndex(reason) => corrupt(reason),
        other => other,
    })?;

    debug!(path = ?path, templates = index.len(), "Loaded template index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memeforge_embeddings::Embedding;
    use tempfile::TempDir;

    fn sample_index() -> TemplateIndex {
        TemplateIndex::new(
            "mock-clip",
            vec![
                TemplateRecord::new("t/drake.jpg", Embedding::new(vec![1.0, 0.0, 0.0])),
                TemplateRecord::new("t/doge.png", Embedding::new(vec![0.2, 0.9, 0.1])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("models").join("index.json");
        let index = sample_index();

        persist(&index, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_persist_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");
        persist(&sample_index(), &path).unwrap();

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["index.json".to_string()]);
    }

    #[test]
    fn test_concurrent_writers_never_expose_partial_index() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");
        let records = (0..1500)
            .map(|i| {
                let vector = (0..32).map(|d| ((i * 31 + d) % 17) as f32 + 1.0).collect();
                TemplateRecord::new(format!("t/{i:04}.png"), Embedding::new(vector))
            })
            .collect();
        let index = TemplateIndex::new("mock-clip", records).unwrap();
        persist(&index, &path).unwrap();

        let writers_done = AtomicBool::new(false);
        let bad_loads = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            let writers: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        for _ in 0..20 {
                            persist(&index, &path).unwrap();
                        }
                    })
                })
                .collect();
            scope.spawn(|| {
                while !writers_done.load(Ordering::SeqCst) {
                    match load(&path) {
                        Ok(loaded) => assert_eq!(loaded.len(), 1500),
                        Err(_) => {
                            bad_loads.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            });
            let results: Vec<_> = writers.into_iter().map(|w| w.join()).collect();
            writers_done.store(true, Ordering::SeqCst);
            assert!(results.iter().all(Result::is_ok), "a writer failed");
        });

        assert_eq!(bad_loads.load(Ordering::SeqCst), 0);
        assert_eq!(load(&path).unwrap(), index);
        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["index.json".to_string()]);
    }

    #[test]
    fn test_persist_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");
        fs::write(&path, b"old contents").unwrap();

        persist(&sample_index(), &path).unwrap();
        assert_eq!(load(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        let result = load(&temp.path().join("nope.json"));
        assert!(matches!(result, Err(IndexError::IndexMissing(_))));
    }

    #[test]
    fn test_load_truncated_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");
        persist(&sample_index(), &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(load(&path), Err(IndexError::IndexCorrupt { .. })));
    }

    #[test]
    fn test_load_empty_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");
        fs::write(&path, b"").unwrap();
        assert!(matches!(load(&path), Err(IndexError::IndexCorrupt { .. })));
    }

    #[test]
    fn test_load_structurally_invalid_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");

        let no_records = r#"{"format_version":1,"embedding_model":"m","dimension":2,"records":[]}"#;
        fs::write(&path, no_records).unwrap();
        assert!(matches!(load(&path), Err(IndexError::IndexCorrupt { .. })));

        let ragged = r#"{"format_version":1,"embedding_model":"m","dimension":2,
            "records":[{"id":"a","embedding":[1.0,0.0]},{"id":"b","embedding":[1.0]}]}"#;
        fs::write(&path, ragged).unwrap();
        assert!(matches!(load(&path), Err(IndexError::IndexCorrupt { .. })));

        let future = r#"{"format_version":9,"embedding_model":"m","dimension":2,
            "records":[{"id":"a","embedding":[1.0,0.0]}]}"#;
        fs::write(&path, future).unwrap();
        assert!(matches!(load(&path), Err(IndexError::IndexCorrupt { .. })));
    }
}
