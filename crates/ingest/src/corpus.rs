//! Loads a legal corpus laid out as `<root>/<category>/*.json`.
//!
//! Each file holds a JSON array of [`RawDocument`]s. The subdirectory name
//! (e.g. `statutes`, `case_law`) is copied into every document's metadata
//! under `category`. Files that cannot be read or parsed are skipped and
//! reported; they never abort the load. Inside a readable file each record
//! is decoded on its own, so one malformed record costs only itself.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{IngestError, RawDocument};

/// Result of walking a corpus directory.
#[derive(Debug, Default)]
pub struct CorpusLoad {
    pub documents: Vec<RawDocument>,
    /// Per-file and per-record failures, in the order they were hit.
    pub errors: Vec<IngestError>,
    pub files_read: usize,
}

impl CorpusLoad {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub fn load_corpus_dir(root: impl AsRef<Path>) -> Result<CorpusLoad, IngestError> {
    let root = root.as_ref();
    let mut load = CorpusLoad::default();
    if !root.is_dir() {
        warn!(path = %root.display(), "corpus.missing_root");
        return Ok(load);
    }

    for category_dir in sorted_entries(root)? {
        if !category_dir.is_dir() {
            continue;
        }
        let category = category_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let files = match sorted_entries(&category_dir) {
            Ok(files) => files,
            Err(err) => {
                warn!(path = %category_dir.display(), error = %err, "corpus.unreadable_dir");
                load.errors.push(corpus_error(&category_dir, err));
                continue;
            }
        };

        for file in files
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        {
            match read_corpus_file(&file, &category) {
                Ok((docs, bad_records)) => {
                    load.files_read += 1;
                    load.documents.extend(docs);
                    for err in bad_records {
                        warn!(path = %file.display(), error = %err, "corpus.bad_record");
                        load.errors.push(err);
                    }
                }
                Err(err) => {
                    warn!(path = %file.display(), error = %err, "corpus.bad_file");
                    load.errors.push(err);
                }
            }
        }
    }

    info!(
        path = %root.display(),
        documents = load.documents.len(),
        files = load.files_read,
        failed = load.errors.len(),
        "corpus.loaded"
    );
    Ok(load)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();
    Ok(paths)
}

/// Documents decoded from `path`, plus one error per record that failed.
fn read_corpus_file(
    path: &Path,
    category: &str,
) -> Result<(Vec<RawDocument>, Vec<IngestError>), IngestError> {
    let bytes = fs::read(path).map_err(|e| corpus_error(path, e))?;
    let records: Vec<Value> = serde_json::from_slice(&bytes).map_err(|e| corpus_error(path, e))?;

    let mut docs = Vec::with_capacity(records.len());
    let mut errors = Vec::new();
    for (position, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<RawDocument>(record) {
            Ok(mut doc) => {
                doc.metadata
                    .entry("category")
                    .or_insert_with(|| Value::String(category.to_string()));
                docs.push(doc);
            }
            Err(err) => errors.push(corpus_error(path, format!("record {position}: {err}"))),
        }
    }
    Ok((docs, errors))
}

fn corpus_error(path: &Path, err: impl std::fmt::Display) -> IngestError {
    IngestError::Corpus {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
