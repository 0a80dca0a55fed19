//! Vector index engine, chunk store, and their paired persistence.

pub mod chunk_store;
pub mod index;
pub mod store;

pub use index::{l2_normalize, FlatIndex, Neighbor};
pub use store::{Corpus, CorpusStore};
