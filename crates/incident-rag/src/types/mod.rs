//! Core record types: incidents, queries, and responses

pub mod incident;
pub mod query;
pub mod response;

pub use incident::{Category, Incident, Priority};
pub use query::{MatchKind, QueryComplexity, QueryRequest, RetrievalCandidate};
pub use response::{
    ConfidenceLevel, RagResponse, RagStrategy, RefusalReason, ResponseMetadata, ResponseStatus,
    RetrievedIncident,
};
