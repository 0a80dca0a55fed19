//! Ordered chunk metadata persisted as a JSON array.
//!
//! Array position is the join key against the vector index, so the file is
//! written and read strictly in order and never keyed by chunk id.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use docqa_core::error::Result;
use docqa_core::types::Chunk;

pub fn save(path: &Path, chunks: &[Chunk]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, chunks)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<Chunk>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
