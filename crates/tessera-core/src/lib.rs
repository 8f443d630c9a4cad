//! tessera-core — Identity verification engine core.
//!
//! Defines the embedding type and similarity math, the match/decision
//! policy, and the trait seams for the external collaborators (face
//! capability, probe capture device).

pub mod capability;
pub mod engine;
pub mod types;

pub use capability::{FaceCapability, FaceError, ProbeError, ProbeSource, DEFAULT_MATCH_THRESHOLD};
pub use engine::{MatchDecision, MatchEngine};
pub use types::{Embedding, RawImage};
