//! Grounded answer generation with typed prompt templates

pub mod grounded;
pub mod prompt;

pub use grounded::GroundedGenerator;
pub use prompt::{build_context, sanitize_query, PromptSlots, PromptTemplate};
