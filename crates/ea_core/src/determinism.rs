//! Determinism utilities: the processing order of a run and canonical sorts.
//!
//! This module is **I/O-free**. Contention for a scarce seat is decided purely
//! by processing order, so the order defined here is normative:
//! students ascend by `RegistrationNumber` (see its `Ord`), then by `StudentId`.

use core::cmp::Ordering;

use crate::entities::{Allotment, Offering, Student};

/* -------------------------------------------------------------------------- */
/*                               Stable Ordering                              */
/* -------------------------------------------------------------------------- */

/// Provide a **total**, stable order for values that must sort canonically.
pub trait StableOrd {
    fn stable_cmp(&self, other: &Self) -> Ordering;
}

impl StableOrd for Student {
    /// Canonical student order is **always** `(registration_number, id)`.
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.registration_number
            .cmp(&other.registration_number)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl StableOrd for Offering {
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.offering_ref().cmp(&other.offering_ref())
    }
}

impl StableOrd for Allotment {
    /// Allotments sort by `(offering, student)`; used for canonical digests
    /// where processing order is not available.
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.offering
            .cmp(&other.offering)
            .then_with(|| self.student_id.cmp(&other.student_id))
    }
}

/* -------------------------------------------------------------------------- */
/*                            Canonical sort helpers                           */
/* -------------------------------------------------------------------------- */

/// Compare two students by processing order.
#[inline]
pub fn cmp_students_by_registration(a: &Student, b: &Student) -> Ordering {
    a.stable_cmp(b)
}

/// Sort students **in place** into processing order.
#[inline]
pub fn sort_students_canonical(xs: &mut [Student]) {
    xs.sort_by(|a, b| a.stable_cmp(b));
}

/// Sort any slice of `StableOrd` values canonically.
#[inline]
pub fn sort_canonical<T: StableOrd>(xs: &mut [T]) {
    xs.sort_by(|a, b| a.stable_cmp(b));
}

/* ---------------------------------- Tests --------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;

    fn student(id: &str, reg: &str) -> Student {
        Student {
            id: id.parse().unwrap(),
            name: id.to_string(),
            registration_number: reg.parse().unwrap(),
            program: None,
            department: None,
            semester: None,
        }
    }

    #[test]
    fn students_sort_by_registration_not_id() {
        let mut v = vec![student("a", "1002"), student("b", "999"), student("c", "1001")];
        sort_students_canonical(&mut v);
        let got: Vec<&str> = v.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(got, vec!["b", "c", "a"]);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut fwd = vec![student("x", "10"), student("y", "2"), student("z", "33")];
        let mut rev: Vec<Student> = fwd.iter().rev().cloned().collect();
        sort_students_canonical(&mut fwd);
        sort_students_canonical(&mut rev);
        assert_eq!(fwd, rev);
    }
}
