//! Struct layout modelling and auditing.
//!
//! Several experiments only mean something if a subject has exactly the
//! physical shape they assume: the padding experiment measures the padding
//! itself, and the receiver experiment compares copy cost across fixed sizes.
//! This module makes that assumption explicit:
//!
//! - [`SubjectLayout`] declares fields in declaration order plus the size
//!   (and optionally the offsets) the experiment depends on.
//! - [`compute_layout`] applies C struct-layout rules for a target pointer
//!   width and exposes every field offset as well as the total size.
//! - [`SizeAudit`] compares the computed layout against the declaration and,
//!   through [`NativeLayout`], against what the compiler actually produced.
//!
//! # Example
//!
//! ```rust
//! use variant_lab::layout::{FieldSpec, SizeAudit, SubjectLayout};
//!
//! let unpadded = SubjectLayout::new("Unpadded", 24)
//!     .field(FieldSpec::scalar("a", 1))
//!     .field(FieldSpec::scalar("b", 8))
//!     .field(FieldSpec::scalar("c", 1))
//!     .field(FieldSpec::scalar("d", 4))
//!     .offsets([0, 8, 16, 20]);
//!
//! let report = SizeAudit::new(8).audit(&unpadded).unwrap();
//! assert_eq!(report.computed.size, 24);
//! assert_eq!(report.computed.padding(), 10);
//! ```

mod audit;
mod native;

#[cfg(test)]
mod tests;

pub use audit::{LayoutReport, SizeAudit};
pub use native::{NativeField, NativeLayout};

use crate::error::{LabError, Result};

/// How a field's size and alignment are derived for a target pointer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Primitive of the given byte size, naturally aligned but never beyond
    /// the pointer width (an `i64` aligns to 4 on 32-bit targets).
    Scalar(usize),
    /// `len` primitives of `elem` bytes each, aligned like one element.
    Array {
        /// Element size in bytes
        elem: usize,
        /// Number of elements
        len: usize,
    },
    /// `n` pointer-sized words (a `String` or `Vec` header is three).
    Words(usize),
    /// Fixed size and alignment independent of the target.
    Explicit {
        /// Size in bytes
        size: usize,
        /// Alignment in bytes
        align: usize,
    },
}

/// One declared field of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as written in the struct declaration
    pub name: &'static str,
    /// Size/alignment rule
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Primitive field of `size` bytes (`bool` = 1, `i32` = 4, `i64`/`f64` = 8).
    pub const fn scalar(name: &'static str, size: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar(size),
        }
    }

    /// Fixed-length array of primitives.
    pub const fn array(name: &'static str, elem: usize, len: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Array { elem, len },
        }
    }

    /// Field made of `n` pointer-sized words.
    pub const fn words(name: &'static str, n: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Words(n),
        }
    }

    /// Field with an explicit size and alignment.
    pub const fn explicit(name: &'static str, size: usize, align: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Explicit { size, align },
        }
    }

    /// Resolve size and alignment for a pointer width.
    pub fn resolve(&self, pointer_width: usize) -> Result<(usize, usize)> {
        let (size, align) = match self.kind {
            FieldKind::Scalar(size) => (size, size.min(pointer_width)),
            FieldKind::Array { elem, len } => (elem * len, elem.min(pointer_width)),
            FieldKind::Words(n) => (n * pointer_width, pointer_width),
            FieldKind::Explicit { size, align } => (size, align),
        };

        if !align.is_power_of_two() {
            return Err(LabError::InvalidConfig(format!(
                "field {} resolves to alignment {}, which is not a power of two",
                self.name, align
            )));
        }

        Ok((size, align))
    }
}

/// Declared physical shape of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectLayout {
    /// Subject name
    pub name: String,
    /// Size in bytes the experiment depends on
    pub expected_size: usize,
    /// Fields in declaration order
    pub fields: Vec<FieldSpec>,
    /// Expected per-field offsets, when the experiment depends on them
    pub expected_offsets: Option<Vec<usize>>,
}

impl SubjectLayout {
    /// Start declaring a subject with its expected total size.
    pub fn new(name: impl Into<String>, expected_size: usize) -> Self {
        Self {
            name: name.into(),
            expected_size,
            fields: Vec::new(),
            expected_offsets: None,
        }
    }

    /// Append a field in declaration order.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare the expected offset of every field, in declaration order.
    pub fn offsets<O: IntoIterator<Item = usize>>(mut self, offsets: O) -> Self {
        self.expected_offsets = Some(offsets.into_iter().collect());
        self
    }
}

/// Placement of one field in a computed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffset {
    /// Field name
    pub name: &'static str,
    /// Byte offset from the start of the struct
    pub offset: usize,
    /// Field size in bytes
    pub size: usize,
    /// Field alignment in bytes
    pub align: usize,
}

/// Result of applying struct-layout rules to a field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedLayout {
    /// Fields with their offsets, in declaration order
    pub fields: Vec<FieldOffset>,
    /// Total size including tail padding
    pub size: usize,
    /// Struct alignment (largest field alignment, 1 for an empty struct)
    pub align: usize,
}

impl ComputedLayout {
    /// Offsets in declaration order.
    pub fn offsets(&self) -> Vec<usize> {
        self.fields.iter().map(|f| f.offset).collect()
    }

    /// Offset of a named field.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.offset)
    }

    /// Bytes spent on padding, interior and tail.
    pub fn padding(&self) -> usize {
        self.size - self.fields.iter().map(|f| f.size).sum::<usize>()
    }
}

/// Lay out `fields` in declaration order for `pointer_width`.
///
/// Before each field the running offset is rounded up to the field's
/// alignment; the final offset is rounded up to the struct alignment.
pub fn compute_layout(fields: &[FieldSpec], pointer_width: usize) -> Result<ComputedLayout> {
    if !pointer_width.is_power_of_two() {
        return Err(LabError::InvalidConfig(format!(
            "pointer width {} is not a power of two",
            pointer_width
        )));
    }

    let mut offset = 0usize;
    let mut struct_align = 1usize;
    let mut placed = Vec::with_capacity(fields.len());

    for field in fields {
        let (size, align) = field.resolve(pointer_width)?;
        offset = offset.next_multiple_of(align);
        placed.push(FieldOffset {
            name: field.name,
            offset,
            size,
            align,
        });
        offset += size;
        struct_align = struct_align.max(align);
    }

    Ok(ComputedLayout {
        fields: placed,
        size: offset.next_multiple_of(struct_align),
        align: struct_align,
    })
}
