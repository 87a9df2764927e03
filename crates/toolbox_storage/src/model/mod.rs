//! Record contract and the default note payload.
//!
//! # Responsibility
//! - Define the capability set every storage-eligible type implements.
//! - Ship the default `NoteStorage` payload used by ephemeral stores.
//!
//! # Invariants
//! - Mapping between fields and columns is explicit, never reflected.

pub mod note;
pub mod record;
