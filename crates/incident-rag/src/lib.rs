//! incident-rag: incident-intelligence retrieval engine
//!
//! Given a natural-language description of a production problem, returns
//! grounded fix suggestions drawn exclusively from a curated corpus of
//! previously resolved incidents, with full source citations and a quantified
//! confidence score. Out-of-domain queries are refused, never improvised.

pub mod config;
pub mod corpus;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod sparse;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::RagPipeline;
pub use types::{
    Incident, QueryComplexity, QueryRequest, RagResponse, RagStrategy, RetrievalCandidate,
};
