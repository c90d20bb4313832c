//! ea_core: Core types, identifiers, run parameters, and ordering helpers.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! engine (`ea_io`, `ea_algo`, `ea_pipeline`, `ea_report`, `ea_cli`).
//!
//! - Token identifiers: `StudentId`, `SubjectId`, `CourseId`, `BucketId`
//! - `RegistrationNumber` with the exact processing order used by a run
//! - Entities: `Student`, `Offering` (course | bucket), `PreferenceSubmission`, `Allotment`
//! - Run parameters: `AllotmentParams` (max preferences, fallback policy)
//! - Deterministic ordering helpers
//!
//! Serialization derives are gated behind the `serde` feature.

#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod errors {
    use core::fmt;

    /// Minimal error set for core-domain validation & parsing.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum CoreError {
        InvalidId,
        DomainOutOfRange(&'static str),
    }

    impl fmt::Display for CoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CoreError::InvalidId => write!(f, "invalid id"),
                CoreError::DomainOutOfRange(k) => write!(f, "domain out of range: {k}"),
            }
        }
    }

    #[cfg(feature = "std")]
    impl std::error::Error for CoreError {}
}

pub mod ids;
pub mod entities;
pub mod determinism;
pub mod variables;

pub use errors::CoreError;
pub use ids::{BucketId, CourseId, IdError, RegistrationNumber, StudentId, SubjectId};
pub use entities::{
    Allotment, BucketMember, Course, CourseBucket, Offering, OfferingKind, OfferingRef,
    PreferenceSubmission, RankedChoice, Student,
};
pub use variables::{AllotmentParams, FallbackPolicy};
