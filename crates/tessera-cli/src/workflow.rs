//! Operator workflows: guided enrollment and claim verification.
//!
//! Both are strictly sequential; a terminal outcome ends the session and
//! the operator reruns the command to retry. Denials are values, not
//! errors — every denial names its reason so "not enrolled", "not
//! recognized", and "the system failed" stay distinguishable.

use chrono::Local;
use thiserror::Error;

use tessera_core::{
    Embedding, FaceCapability, FaceError, MatchDecision, MatchEngine, ProbeError, ProbeSource,
    RawImage,
};
use tessera_store::{
    AttendanceLedger, EmbeddingStore, GalleryError, Identity, IdentityDraft, IdentityLedger,
    LedgerError,
};

/// Hard cap on samples captured in one enrollment session.
pub const MAX_SAMPLES_PER_ENROLLMENT: usize = 10;

/// Per-sample pose guidance, one entry per capture slot.
pub const CAPTURE_GUIDANCE: [&str; 10] = [
    "Look straight",
    "Look to your left",
    "Look to your right",
    "Look up",
    "Look down",
    "Slight tilt to left",
    "Slight tilt to right",
    "Smile slightly",
    "Raise your eyebrows",
    "Close your eyes",
];

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error(transparent)]
    Face(#[from] FaceError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Why access was denied. Shown verbatim to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The claimed email matches no enrolled identity.
    NoSuchEmail,
    /// The identity exists but has no usable enrolled samples.
    NoGallery,
    /// No face was detected in the live capture.
    NoProbeFace,
    /// A face was present but did not match the stored gallery.
    NoMatch,
}

/// Terminal outcome of a verification session.
#[derive(Debug)]
pub enum AccessDecision {
    Granted { identity: Identity, similarity: f32 },
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted { .. })
    }
}

/// claim → lookup → gallery load → probe capture → decision, with the
/// attendance append as the single side effect of a grant.
pub struct VerificationWorkflow<'a> {
    identities: &'a IdentityLedger,
    store: &'a EmbeddingStore,
    attendance: &'a AttendanceLedger,
    engine: MatchEngine,
}

impl<'a> VerificationWorkflow<'a> {
    pub fn new(
        identities: &'a IdentityLedger,
        store: &'a EmbeddingStore,
        attendance: &'a AttendanceLedger,
        engine: MatchEngine,
    ) -> Self {
        Self {
            identities,
            store,
            attendance,
            engine,
        }
    }

    pub fn run(
        &self,
        claim_email: &str,
        face: &mut dyn FaceCapability,
        probe: &mut dyn ProbeSource,
    ) -> Result<AccessDecision, WorkflowError> {
        let Some(identity) = self.identities.find_by_email(claim_email)? else {
            tracing::info!(email = claim_email, "denied: no such email");
            return Ok(AccessDecision::Denied(DenialReason::NoSuchEmail));
        };

        let gallery = match self.store.load_gallery(identity.identity_id, face) {
            Ok(entries) => entries,
            Err(GalleryError::NoEnrolledData(_)) => {
                tracing::info!(
                    identity_id = identity.identity_id,
                    "denied: no usable enrolled data"
                );
                return Ok(AccessDecision::Denied(DenialReason::NoGallery));
            }
            Err(e) => return Err(e.into()),
        };
        let stored: Vec<Embedding> = gallery.into_iter().map(|entry| entry.embedding).collect();

        let live = probe.capture_probe()?;
        let probes = face.detect_and_encode(&live)?;

        match self.engine.decide(&probes, &stored) {
            MatchDecision::NoProbeFace => {
                tracing::info!(email = claim_email, "denied: no face in probe frame");
                Ok(AccessDecision::Denied(DenialReason::NoProbeFace))
            }
            MatchDecision::NotMatched { best_similarity } => {
                tracing::info!(email = claim_email, best_similarity, "denied: no match");
                Ok(AccessDecision::Denied(DenialReason::NoMatch))
            }
            MatchDecision::Matched { similarity } => {
                self.attendance.record(&identity.email)?;
                tracing::info!(
                    identity_id = identity.identity_id,
                    similarity,
                    "access granted"
                );
                Ok(AccessDecision::Granted {
                    identity,
                    similarity,
                })
            }
        }
    }
}

/// Source of enrollment samples. `None` means the operator stopped early.
pub trait SampleSource {
    fn next_sample(&mut self, seq: usize, guidance: &str) -> Result<Option<RawImage>, ProbeError>;
}

#[derive(Debug)]
pub struct EnrollmentOutcome {
    pub identity: Identity,
    pub samples_stored: usize,
    pub samples_requested: usize,
}

/// Assigns an id, appends the identity row, then captures and seals up to
/// ten guided samples.
///
/// The row is written before capture (reference behavior): a session
/// aborted mid-capture leaves an identity whose verification reports
/// "no enrolled data" rather than "no such email".
pub struct EnrollmentSession<'a> {
    identities: &'a IdentityLedger,
    store: &'a EmbeddingStore,
}

impl<'a> EnrollmentSession<'a> {
    pub fn new(identities: &'a IdentityLedger, store: &'a EmbeddingStore) -> Self {
        Self { identities, store }
    }

    pub fn run(
        &self,
        draft: IdentityDraft,
        samples_requested: usize,
        source: &mut dyn SampleSource,
    ) -> Result<EnrollmentOutcome, WorkflowError> {
        let samples_requested = samples_requested.min(MAX_SAMPLES_PER_ENROLLMENT);

        let identity_id = self.identities.next_identity_id()?;
        let identity = draft.into_identity(identity_id)?;
        self.identities.append(&identity)?;

        let mut samples_stored = 0usize;
        for seq in 1..=samples_requested {
            let guidance = CAPTURE_GUIDANCE[(seq - 1) % CAPTURE_GUIDANCE.len()];
            let Some(image) = source.next_sample(seq, guidance)? else {
                tracing::info!(identity_id, captured = samples_stored, "enrollment stopped early");
                break;
            };
            self.store
                .store_sample(identity_id, seq as u32, Local::now(), &image)?;
            samples_stored += 1;
        }

        tracing::info!(identity_id, samples_stored, samples_requested, "enrollment complete");
        Ok(EnrollmentOutcome {
            identity,
            samples_stored,
            samples_requested,
        })
    }
}
