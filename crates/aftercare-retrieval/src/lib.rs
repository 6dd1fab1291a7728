//! Confidence-gated retrieval for Aftercare.
//!
//! Composes the passage index, confidence evaluator, and web search
//! providers into one pipeline that always yields an evidence bundle,
//! degrading gracefully when providers fail.

pub mod confidence;
pub mod lexical;
pub mod pipeline;
pub mod providers;

pub use confidence::{ConfidencePolicy, ThresholdPolicy, Verdict};
pub use lexical::LexicalPassageIndex;
pub use pipeline::RetrievalPipeline;
pub use providers::{PassageSearch, ScoredPassage, WebHit, WebSearch};
