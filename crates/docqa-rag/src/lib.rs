//! Ingestion, retrieval and answer synthesis over the local corpus.

pub mod answer;
pub mod chat;
pub mod ingest;
pub mod retrieve;
pub mod service;

pub use answer::{Synthesizer, DONT_KNOW_ANSWER, SYSTEM_PROMPT};
pub use chat::OpenAiChat;
pub use ingest::{IngestReport, Ingestor};
pub use retrieve::Retriever;
pub use service::QaService;
