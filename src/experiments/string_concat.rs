//! String building: a fresh allocation per part vs amortized growth vs one
//! reservation up front vs `concat`.
//!
//! Every strategy yields the same bytes; they differ only in how many
//! allocations and copies it takes to get there. Subjects are part counts
//! (2 to 64 parts of [`PART_LEN`] bytes), so per-byte costs are comparable
//! across sizes.

use crate::error::Result;
use crate::experiment::{Experiment, Subject};
use crate::variant::{Strategy, Variant, VariantGroup};

/// Bytes per part.
pub const PART_LEN: usize = 8;

/// Part counts measured, one subject each.
pub const PART_COUNTS: [usize; 6] = [2, 4, 8, 16, 32, 64];

/// `count` parts of exactly [`PART_LEN`] hex digits, distinct per index.
pub fn parts(index: u64, count: usize) -> Vec<String> {
    (0..count as u64)
        .map(|k| format!("{:08x}", index.wrapping_mul(count as u64).wrapping_add(k) as u32))
        .collect()
}

/// New string per part; every step copies everything built so far.
pub fn concat_fresh(parts: &[String]) -> String {
    let mut built = String::new();
    for part in parts {
        let mut next = String::with_capacity(built.len() + part.len());
        next.push_str(&built);
        next.push_str(part);
        built = next;
    }
    built
}

/// One buffer grown on demand.
pub fn concat_push(parts: &[String]) -> String {
    let mut built = String::new();
    for part in parts {
        built.push_str(part);
    }
    built
}

/// One buffer sized up front.
pub fn concat_reserved(parts: &[String]) -> String {
    let total = parts.iter().map(String::len).sum();
    let mut built = String::with_capacity(total);
    for part in parts {
        built.push_str(part);
    }
    built
}

/// The standard library's slice concatenation.
pub fn concat_slice(parts: &[String]) -> String {
    parts.concat()
}

/// The four strategies.
pub fn concat_group() -> VariantGroup<Vec<String>, String> {
    VariantGroup::new("concat")
        .with(Variant::infallible("fresh", Strategy::direct(), |p: &Vec<String>| {
            concat_fresh(p)
        }))
        .with(Variant::infallible("push", Strategy::direct(), |p: &Vec<String>| {
            concat_push(p)
        }))
        .with(Variant::infallible("reserved", Strategy::direct(), |p: &Vec<String>| {
            concat_reserved(p)
        }))
        .with(Variant::infallible(
            "slice_concat",
            Strategy::direct(),
            |p: &Vec<String>| concat_slice(p),
        ))
}

/// Subject name for a part count.
pub fn subject_name(count: usize) -> String {
    format!("parts_{}", count)
}

/// The `string_concat` experiment.
pub fn experiment() -> Result<Experiment> {
    let mut builder = Experiment::builder("string_concat");
    for count in PART_COUNTS {
        builder = builder.subject(Subject::opaque(subject_name(count)));
    }
    for count in PART_COUNTS {
        builder = builder.group_with_units(
            &subject_name(count),
            concat_group(),
            move |index| parts(index, count),
            (count * PART_LEN) as u64,
        );
    }
    builder.build()
}
