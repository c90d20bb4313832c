//! Domain entities shared by every layer.
//!
//! `Offering` is the tagged variant {Course, Bucket}. Everything downstream of
//! the snapshot (ledger, resolver, fallback) talks to it only through
//! `OfferingRef` and the seat accessors, never through the variant.

use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::{BucketId, CourseId, RegistrationNumber, StudentId, SubjectId};

#[cfg(feature = "serde")]
fn default_active() -> bool {
    true
}

/// Student snapshot row. Immutable for the duration of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub registration_number: RegistrationNumber,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub program: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub department: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub semester: Option<u8>,
}

/// Which variant an `OfferingRef` points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OfferingKind {
    Course,
    Bucket,
}

/// Reference to an allottable unit. Courses order before buckets, then by id.
///
/// Wire shape: `{"kind":"course","id":"CS401"}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "id", rename_all = "snake_case"))]
pub enum OfferingRef {
    Course(CourseId),
    Bucket(BucketId),
}

impl OfferingRef {
    pub fn kind(&self) -> OfferingKind {
        match self {
            OfferingRef::Course(_) => OfferingKind::Course,
            OfferingRef::Bucket(_) => OfferingKind::Bucket,
        }
    }

    pub fn id_str(&self) -> &str {
        match self {
            OfferingRef::Course(id) => id.as_str(),
            OfferingRef::Bucket(id) => id.as_str(),
        }
    }
}

impl core::fmt::Display for OfferingRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OfferingRef::Course(id) => write!(f, "course:{id}"),
            OfferingRef::Bucket(id) => write!(f, "bucket:{id}"),
        }
    }
}

/// Standalone course offering.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct Course {
    pub id: CourseId,
    pub subject_id: SubjectId,
    pub code: String,
    pub name: String,
    pub total_seats: u32,
    pub available_seats: u32,
    /// False once an admin withdrew the course; kept in the snapshot so
    /// preferences pointing at it can be pruned rather than rejected.
    #[cfg_attr(feature = "serde", serde(default = "default_active"))]
    pub active: bool,
}

/// Course listed inside a bucket (display only; seats live on the bucket).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct BucketMember {
    pub course_id: CourseId,
    pub code: String,
    pub name: String,
}

/// A bucket groups several courses but is allotted as one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct CourseBucket {
    pub id: BucketId,
    pub subject_id: SubjectId,
    pub name: String,
    pub total_seats: u32,
    pub available_seats: u32,
    /// Ordered member courses.
    #[cfg_attr(feature = "serde", serde(default))]
    pub courses: Vec<BucketMember>,
    #[cfg_attr(feature = "serde", serde(default = "default_active"))]
    pub active: bool,
}

/// Offering snapshot row, internally tagged on the wire (`"kind": "course" | "bucket"`).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Offering {
    Course(Course),
    Bucket(CourseBucket),
}

impl Offering {
    pub fn offering_ref(&self) -> OfferingRef {
        match self {
            Offering::Course(c) => OfferingRef::Course(c.id.clone()),
            Offering::Bucket(b) => OfferingRef::Bucket(b.id.clone()),
        }
    }

    pub fn subject_id(&self) -> &SubjectId {
        match self {
            Offering::Course(c) => &c.subject_id,
            Offering::Bucket(b) => &b.subject_id,
        }
    }

    pub fn total_seats(&self) -> u32 {
        match self {
            Offering::Course(c) => c.total_seats,
            Offering::Bucket(b) => b.total_seats,
        }
    }

    pub fn available_seats(&self) -> u32 {
        match self {
            Offering::Course(c) => c.available_seats,
            Offering::Bucket(b) => b.available_seats,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Offering::Course(c) => c.active,
            Offering::Bucket(b) => b.active,
        }
    }

    /// Human label: course code, or bucket name.
    pub fn label(&self) -> &str {
        match self {
            Offering::Course(c) => &c.code,
            Offering::Bucket(b) => &b.name,
        }
    }
}

/// One ranked entry of a raw submission. Ranks are 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct RankedChoice {
    pub rank: u8,
    pub offering: OfferingRef,
}

/// Raw preference submission of one student for one subject, as stored.
/// Not yet validated: ranks may have gaps, repeat, or point at withdrawn offerings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct PreferenceSubmission {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub choices: Vec<RankedChoice>,
}

/// Output entity. `rank == None` marks a fallback assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct Allotment {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub offering: OfferingRef,
    pub rank: Option<u8>,
}

impl Allotment {
    #[inline]
    pub fn is_fallback(&self) -> bool {
        self.rank.is_none()
    }
}
