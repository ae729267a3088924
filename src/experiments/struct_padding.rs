//! Field ordering: the same four fields declared in an order that forces
//! padding and in one that avoids it.
//!
//! `Unpadded` is 24 bytes, `Padded` 16 bytes. Allocating and walking many
//! of them shows what the extra bytes cost in allocation volume and cache
//! traffic. Both layouts are audited against the model and the compiler
//! before anything is timed: the experiment is meaningless if the sizes
//! drift.

use std::mem::size_of;
use std::sync::Arc;

use static_assertions::const_assert_eq;

use crate::error::Result;
use crate::experiment::{Experiment, Subject};
use crate::layout::{FieldSpec, SubjectLayout};
use crate::native_layout;
use crate::variant::{Strategy, Variant, VariantGroup};

/// Elements per `alloc` invocation.
pub const ALLOC_LEN: usize = 4_096;

/// Elements in the prebuilt traversal arrays.
pub const TRAVERSE_LEN: usize = 1 << 16;

/// Elements summed per `traverse` invocation.
pub const WINDOW: usize = 1_024;

/// Fields in declaration order `bool, i64, bool, i32`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Unpadded {
    /// Flag
    pub a: bool,
    /// Wide value
    pub b: i64,
    /// Flag
    pub c: bool,
    /// Narrow value
    pub d: i32,
}

/// The same fields ordered by descending size.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padded {
    /// Wide value
    pub b: i64,
    /// Narrow value
    pub d: i32,
    /// Flag
    pub a: bool,
    /// Flag
    pub c: bool,
}

#[cfg(target_pointer_width = "64")]
const_assert_eq!(size_of::<Unpadded>(), 24);
#[cfg(target_pointer_width = "64")]
const_assert_eq!(size_of::<Padded>(), 16);

/// Record type with a layout under test.
pub trait Record: Copy + Send + Sync + 'static {
    /// Record for element `i`.
    fn from_index(i: usize) -> Self;

    /// `b + d`, the traversal payload.
    fn weight(&self) -> i64;
}

impl Record for Unpadded {
    #[inline]
    fn from_index(i: usize) -> Self {
        Self {
            a: true,
            b: i as i64,
            c: false,
            d: i as i32,
        }
    }

    #[inline]
    fn weight(&self) -> i64 {
        self.b + i64::from(self.d)
    }
}

impl Record for Padded {
    #[inline]
    fn from_index(i: usize) -> Self {
        Self {
            b: i as i64,
            d: i as i32,
            a: true,
            c: false,
        }
    }

    #[inline]
    fn weight(&self) -> i64 {
        self.b + i64::from(self.d)
    }
}

/// Declared layout of [`Unpadded`].
pub fn unpadded_layout() -> SubjectLayout {
    SubjectLayout::new("unpadded", 24)
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::scalar("b", 8))
        .field(FieldSpec::scalar("c", 1))
        .field(FieldSpec::scalar("d", 4))
        .offsets([0, 8, 16, 20])
}

/// Declared layout of [`Padded`].
pub fn padded_layout() -> SubjectLayout {
    SubjectLayout::new("padded", 16)
        .field(FieldSpec::scalar("b", 8))
        .field(FieldSpec::scalar("d", 4))
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::scalar("c", 1))
        .offsets([0, 8, 12, 13])
}

/// Allocation sizes vary slightly so every call is a distinct request.
fn alloc_len(index: u64) -> usize {
    ALLOC_LEN + (index % 16) as usize
}

fn allocate<R: Record>(len: &usize) -> usize {
    let records: Vec<R> = (0..*len).map(R::from_index).collect();
    std::hint::black_box(&records);
    records.len()
}

/// `alloc`: allocate and fill a vector, returning its length.
pub fn alloc_group() -> VariantGroup<usize, usize> {
    VariantGroup::new("alloc")
        .with(Variant::infallible(
            "unpadded",
            Strategy::direct(),
            allocate::<Unpadded>,
        ))
        .with(Variant::infallible("padded", Strategy::direct(), allocate::<Padded>))
}

/// Start of the traversal window for a sample index.
fn window_start(index: u64) -> usize {
    (index as usize).wrapping_mul(WINDOW) % (TRAVERSE_LEN - WINDOW + 1)
}

fn traverse_variant<R: Record>(name: &'static str) -> Variant<usize, i64> {
    let records: Arc<Vec<R>> = Arc::new((0..TRAVERSE_LEN).map(R::from_index).collect());
    Variant::infallible(name, Strategy::direct(), move |start: &usize| {
        let mut acc = 0i64;
        for record in &records[*start..*start + WINDOW] {
            acc += record.weight();
        }
        acc
    })
}

/// `traverse`: sum `b + d` over a [`WINDOW`] of a prebuilt array.
pub fn traverse_group() -> VariantGroup<usize, i64> {
    VariantGroup::new("traverse")
        .with(traverse_variant::<Unpadded>("unpadded"))
        .with(traverse_variant::<Padded>("padded"))
}

/// The `struct_padding` experiment.
pub fn experiment() -> Result<Experiment> {
    let both = ["unpadded", "padded"];

    Experiment::builder("struct_padding")
        .subject(Subject::audited_native(
            unpadded_layout(),
            native_layout!(Unpadded { a: bool, b: i64, c: bool, d: i32 }),
        ))
        .subject(Subject::audited_native(
            padded_layout(),
            native_layout!(Padded { b: i64, d: i32, a: bool, c: bool }),
        ))
        .group_across(&both, alloc_group(), alloc_len, Some(ALLOC_LEN as u64))
        .group_across(&both, traverse_group(), window_start, Some(WINDOW as u64))
        .build()
}
