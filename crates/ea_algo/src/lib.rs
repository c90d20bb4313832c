// crates/ea_algo/src/lib.rs
#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// ----------------------------- Components (leaf to root) -----------------------------

pub mod ledger;
pub mod normalize;
pub mod resolve;
pub mod fallback;

// Tight, explicit re-exports (avoid wildcard export drift).
pub use ledger::{CapacityError, CapacityLedger, LedgerEntry, LedgerError};
pub use normalize::{
    normalize_all, normalize_submission, validate_submission, NormalizedStudent,
    UnpreferencedReason, ValidationError,
};
pub use resolve::{resolve_preferences, ResolveOutput, Unassigned, UnassignedCause};
pub use fallback::{assign_least_filled, FallbackOutput};

// Core IDs and entities used in every signature above.
pub use ea_core::{
    entities::{Allotment, Offering, OfferingRef, PreferenceSubmission},
    ids::{StudentId, SubjectId},
    variables::FallbackPolicy,
};

// ----------------------------- Test fixtures ---------------------------------------
