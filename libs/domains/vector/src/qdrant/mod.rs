mod client;
mod config;

pub use client::QdrantRepository;
pub use config::{DEFAULT_COLLECTION, DEFAULT_SCORE_THRESHOLD, QdrantConfig};
