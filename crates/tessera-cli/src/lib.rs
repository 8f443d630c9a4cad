//! tessera-cli — operator-facing workflows and configuration.
//!
//! The binary in `main.rs` is thin; enrollment and verification
//! orchestration live here so they can be exercised against fake
//! collaborators.

pub mod capture;
pub mod config;
pub mod workflow;

pub use config::Config;
pub use workflow::{
    AccessDecision, DenialReason, EnrollmentOutcome, EnrollmentSession, SampleSource,
    VerificationWorkflow, WorkflowError, MAX_SAMPLES_PER_ENROLLMENT,
};
