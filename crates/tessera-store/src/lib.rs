//! tessera-store — everything persisted to disk.
//!
//! The key vault (secret.key), the sealed-sample envelope format, the
//! identity ledger (records.csv), the attendance ledger (attendance.csv),
//! and the encrypted per-identity sample tree (certified/).

pub mod attendance;
pub mod gallery;
pub mod identities;
pub mod keyvault;
pub mod paths;
pub mod seal;

pub use attendance::{AttendanceLedger, AttendanceRecord};
pub use gallery::{EmbeddingStore, GalleryEmbedding, GalleryError};
pub use identities::{Identity, IdentityDraft, IdentityLedger, LedgerError};
pub use keyvault::{KeyVault, KeyVaultError, SealKey};
pub use paths::StorePaths;
