//! # legis_core
//!
//! Reconciles Polish legislative-process records from the government work-plan
//! registry, the legislative-coordination portal (RCL) and the parliamentary API
//! into one canonical document store:
//! - title normalization, edit-distance similarity and candidate prefiltering
//! - identity resolution (strong keys first, fuzzy title fallback)
//! - field merge policy, dictionary get-or-create, append-if-absent timeline writes
//! - source adapters and sequential, paced sync passes

pub mod adapters;
pub mod candidates;
pub mod classify;
pub mod config;
pub mod db;
pub mod dictionary;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod reconcile;
pub mod resolver;
pub mod schema;
pub mod similarity;
pub mod sync;
pub mod timeline;

pub use dictionary::{get_or_create as get_or_create_dictionary_entity, DictionaryKind};
pub use error::{Error, Result};
pub use merge::{upsert_document, MergePolicy};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use resolver::resolve;
pub use schema::{NormalizedCandidate, ResolutionResult, SourceKind};
pub use timeline::{upsert_attachment, upsert_external_link, upsert_timeline_event};
