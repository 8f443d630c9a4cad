//! Append-only identity ledger backed by `records.csv`.
//!
//! Column order is part of the on-disk contract:
//! `first_name,last_name,email,phone_number,home_address,id`.
//!
//! Lookups are full scans; acceptable at this scale, and the first row
//! matching an email wins. Id assignment is read-count-then-append and is
//! only safe under the single-operator assumption.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger row malformed: {0}")]
    Csv(#[from] csv::Error),
    #[error("identity record incomplete: missing {field}")]
    Incomplete { field: &'static str },
}

/// An enrolled person. Created once, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub home_address: String,
    #[serde(rename = "id")]
    pub identity_id: u32,
}

impl Identity {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Operator-supplied fields, before an id is assigned.
///
/// Name and email are required; phone and address are free-form and may be
/// empty. Email format is not validated, and duplicate emails are not
/// rejected — lookup is first-match-wins.
#[derive(Debug, Clone, Default)]
pub struct IdentityDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub home_address: String,
}

impl IdentityDraft {
    /// Attach an assigned id, rejecting drafts with missing required fields.
    pub fn into_identity(self, identity_id: u32) -> Result<Identity, LedgerError> {
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(LedgerError::Incomplete { field });
            }
        }
        Ok(Identity {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
            home_address: self.home_address,
            identity_id,
        })
    }
}

/// Append-only store of enrolled identities.
pub struct IdentityLedger {
    path: PathBuf,
}

impl IdentityLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Next id to assign: row count + 1, or 1 when the ledger does not
    /// exist yet.
    pub fn next_identity_id(&self) -> Result<u32, LedgerError> {
        if !self.path.is_file() {
            return Ok(1);
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut count: u32 = 0;
        for record in reader.byte_records() {
            record?;
            count += 1;
        }
        Ok(count + 1)
    }

    /// Append one identity, writing the header row on first-ever write.
    /// A pre-created empty file counts as a first write.
    pub fn append(&self, identity: &Identity) -> Result<(), LedgerError> {
        let first_write = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(first_write)
            .from_writer(file);
        writer.serialize(identity)?;
        writer.flush()?;
        tracing::info!(
            identity_id = identity.identity_id,
            email = %identity.email,
            "identity enrolled"
        );
        Ok(())
    }

    /// Full scan, first matching row in file order. `Ok(None)` covers both
    /// an unknown email and a ledger that does not exist yet.
    pub fn find_by_email(&self, email: &str) -> Result<Option<Identity>, LedgerError> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        for record in reader.deserialize::<Identity>() {
            let identity = record?;
            if identity.email == email {
                return Ok(Some(identity));
            }
        }
        Ok(None)
    }

    /// All identities in file order.
    pub fn list(&self) -> Result<Vec<Identity>, LedgerError> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut identities = Vec::new();
        for record in reader.deserialize::<Identity>() {
            identities.push(record?);
        }
        Ok(identities)
    }
}
