//! Paired on-disk persistence of the vector index and the chunk store.
//!
//! Each ingestion writes both files into a fresh generation directory and
//! only then flips the `CURRENT` pointer (write temp + rename), so a reader
//! always sees either the old pair or the new pair. The previous generation
//! is kept for readers that resolved the pointer just before the flip.

use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use docqa_core::error::{Error, Result};
use docqa_core::types::Chunk;

use crate::chunk_store;
use crate::index::FlatIndex;

pub const INDEX_FILE: &str = "index.bin";
pub const CHUNKS_FILE: &str = "chunks.json";
const CURRENT_FILE: &str = "CURRENT";
const GENERATION_PREFIX: &str = "gen-";

/// A vector index and its chunk metadata, row `i` describing `chunks[i]`.
///
/// The halves can only be set together, through [`Corpus::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    index: FlatIndex,
    chunks: Vec<Chunk>,
}

impl Corpus {
    pub fn new(index: FlatIndex, chunks: Vec<Chunk>) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(Error::CorruptStore(format!(
                "index has {} rows but chunk store has {} records",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self { index, chunks })
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, row: usize) -> Option<&Chunk> {
        self.chunks.get(row)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }
}

#[derive(Debug, Clone)]
pub struct CorpusStore {
    root: PathBuf,
}

impl CorpusStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the generation readers currently see, if any ingestion completed.
    pub fn current_generation(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(raw) => {
                let name = raw.trim().to_string();
                if !is_generation_name(&name) {
                    return Err(Error::CorruptStore(format!(
                        "CURRENT names an invalid generation '{name}'"
                    )));
                }
                Ok(Some(name))
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `corpus` as a new generation and make it current.
    ///
    /// Fully replaces whatever was current before; never merges.
    pub fn replace(&self, corpus: &Corpus) -> Result<String> {
        fs::create_dir_all(&self.root)?;
        let previous = self.current_generation().ok().flatten();
        let (name, dir) = self.create_generation_dir()?;

        if let Err(e) = write_pair(&dir, corpus) {
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                tracing::warn!(
                    generation = %name,
                    error = %cleanup,
                    "failed to remove partial generation"
                );
            }
            return Err(e);
        }
        self.flip_current(&name)?;
        tracing::info!(
            generation = %name,
            rows = corpus.len(),
            dim = corpus.dim(),
            "published corpus generation"
        );

        let mut keep = vec![name.as_str()];
        if let Some(prev) = previous.as_deref() {
            keep.push(prev);
        }
        self.prune(&keep);
        Ok(name)
    }

    /// Load the current pair. `Ok(None)` means nothing was ever ingested.
    pub fn load(&self) -> Result<Option<Corpus>> {
        match self.current_generation()? {
            Some(name) => self.load_generation(&name).map(Some),
            None => Ok(None),
        }
    }

    pub fn load_generation(&self, name: &str) -> Result<Corpus> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(Error::CorruptStore(format!(
                "generation '{name}' is missing from {}",
                self.root.display()
            )));
        }
        let bytes = fs::read(dir.join(INDEX_FILE)).map_err(|e| missing(name, INDEX_FILE, &e))?;
        let index = FlatIndex::from_bytes(&bytes)?;
        let chunks = chunk_store::load(&dir.join(CHUNKS_FILE)).map_err(|e| match e {
            Error::Io(io) => missing(name, CHUNKS_FILE, &io),
            other => Error::CorruptStore(format!("{name}/{CHUNKS_FILE}: {other}")),
        })?;
        Corpus::new(index, chunks)
    }

    fn create_generation_dir(&self) -> Result<(String, PathBuf)> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6f").to_string();
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{GENERATION_PREFIX}{stamp}")
            } else {
                format!("{GENERATION_PREFIX}{stamp}-{attempt}")
            };
            let dir = self.root.join(&name);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((name, dir)),
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn flip_current(&self, name: &str) -> Result<()> {
        let tmp = self.root.join(format!("{CURRENT_FILE}.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(name.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.root.join(CURRENT_FILE))?;
        Ok(())
    }

    fn prune(&self, keep: &[&str]) {
        let Ok(entries) = fs::read_dir(&self.root) else { return };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_generation_name(&name) || keep.contains(&name.as_str()) {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => tracing::debug!(generation = %name, "pruned old generation"),
                Err(e) => {
                    tracing::warn!(generation = %name, error = %e, "failed to prune old generation")
                }
            }
        }
    }
}

fn write_pair(dir: &Path, corpus: &Corpus) -> Result<()> {
    let mut file = fs::File::create(dir.join(INDEX_FILE))?;
    file.write_all(&corpus.index().to_bytes())?;
    file.sync_all()?;
    chunk_store::save(&dir.join(CHUNKS_FILE), corpus.chunks())
}

fn is_generation_name(name: &str) -> bool {
    name.starts_with(GENERATION_PREFIX) && !name.contains(['/', '\\']) && !name.contains("..")
}

fn missing(generation: &str, file: &str, err: &std::io::Error) -> Error {
    Error::CorruptStore(format!("{generation}/{file} unreadable: {err}"))
}
