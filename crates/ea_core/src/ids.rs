//! crates/ea_core/src/ids.rs
//! Token identifiers for students, subjects, courses and buckets, plus the
//! registration number that fixes a run's processing order.
//! Deterministic, ASCII-only, strict shapes; no I/O.

use alloc::borrow::ToOwned;
use alloc::string::String;
use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors returned when validating or parsing IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    NonAscii,
    TooLong,
    BadShape,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::NonAscii => f.write_str("identifier must be ASCII without NUL"),
            IdError::TooLong => f.write_str("identifier longer than 64 bytes"),
            IdError::BadShape => f.write_str("identifier must match [A-Za-z0-9_.:-]{1,64}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IdError {}

const TOKEN_MAX_LEN: usize = 64;

#[inline]
fn is_ascii_no_nul(s: &str) -> bool {
    !s.as_bytes().iter().any(|&b| b == 0 || b > 0x7F)
}

/// Token: ^[A-Za-z0-9_.:-]{1,64}$ (ASCII only)
#[inline]
pub fn is_valid_token(s: &str) -> bool {
    let bs = s.as_bytes();
    if bs.is_empty() || bs.len() > TOKEN_MAX_LEN || !is_ascii_no_nul(s) {
        return false;
    }
    bs.iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-'))
}

fn check_token(s: &str) -> Result<(), IdError> {
    if !is_ascii_no_nul(s) {
        return Err(IdError::NonAscii);
    }
    if s.len() > TOKEN_MAX_LEN {
        return Err(IdError::TooLong);
    }
    if !is_valid_token(s) {
        return Err(IdError::BadShape);
    }
    Ok(())
}

macro_rules! token_newtype {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            #[inline] pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl FromStr for $name {
            type Err = IdError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                check_token(s)?;
                Ok($name(s.to_owned()))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;
            #[inline]
            fn try_from(value: &str) -> Result<Self, Self::Error> { value.parse() }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;
            fn try_from(value: String) -> Result<Self, Self::Error> {
                check_token(&value)?;
                Ok($name(value))
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(v: $name) -> String { v.0 }
        }
    }
}

token_newtype!(
    /// Student primary key as issued by the surrounding system.
    StudentId
);
token_newtype!(
    /// Subject (elective slot) a run allots for.
    SubjectId
);
token_newtype!(
    /// Standalone course id.
    CourseId
);
token_newtype!(
    /// Course bucket id. Independent id space from `CourseId`.
    BucketId
);

/// University registration number; the processing key of every run.
///
/// Ordering is *natural*: two all-digit numbers compare by numeric value
/// (leading zeros ignored, then fewer leading zeros first); all-digit numbers
/// sort before alphanumeric ones; alphanumeric numbers compare bytewise.
/// `Ord` agrees with `Eq`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct RegistrationNumber(String);

impl RegistrationNumber {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    fn is_numeric(&self) -> bool {
        self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl Ord for RegistrationNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => {
                let a = self.0.trim_start_matches('0');
                let b = other.0.trim_start_matches('0');
                a.len()
                    .cmp(&b.len())
                    .then_with(|| a.cmp(b))
                    .then_with(|| self.0.len().cmp(&other.0.len()))
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.as_bytes().cmp(other.0.as_bytes()),
        }
    }
}

impl PartialOrd for RegistrationNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RegistrationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegistrationNumber {
    type Err = IdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_token(s)?;
        Ok(RegistrationNumber(s.to_owned()))
    }
}

impl TryFrom<String> for RegistrationNumber {
    type Error = IdError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        check_token(&value)?;
        Ok(RegistrationNumber(value))
    }
}

impl From<RegistrationNumber> for String {
    fn from(v: RegistrationNumber) -> String {
        v.0
    }
}

// === Tests ===
