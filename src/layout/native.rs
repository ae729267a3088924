//! Compiler-reported layouts.

use super::{FieldKind, FieldSpec, SubjectLayout};

/// One field of a concrete type as laid out by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeField {
    /// Field name
    pub name: &'static str,
    /// `offset_of!` value
    pub offset: usize,
    /// `size_of` of the field type
    pub size: usize,
    /// `align_of` of the field type
    pub align: usize,
}

/// True size, alignment and field offsets of a concrete type.
///
/// Built with [`native_layout!`](crate::native_layout), which reads the values
/// from `size_of`, `align_of` and `offset_of!` rather than estimating them.
/// Only `#[repr(C)]` types have a declaration-order layout worth comparing;
/// the default Rust representation is free to reorder fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeLayout {
    /// Type name as written at the macro call site
    pub type_name: &'static str,
    /// `size_of::<T>()`
    pub size: usize,
    /// `align_of::<T>()`
    pub align: usize,
    /// Fields in the order they were listed
    pub fields: Vec<NativeField>,
}

impl NativeLayout {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&NativeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declare a subject whose field list mirrors this type.
    ///
    /// Field sizes and alignments are taken from the compiler; offsets are
    /// left for the layout model to compute, so an audit still checks the
    /// placement rules independently.
    pub fn to_subject(&self, name: impl Into<String>, expected_size: usize) -> SubjectLayout {
        self.fields.iter().fold(
            SubjectLayout::new(name, expected_size),
            |subject, field| {
                subject.field(FieldSpec {
                    name: field.name,
                    kind: FieldKind::Explicit {
                        size: field.size,
                        align: field.align,
                    },
                })
            },
        )
    }
}

/// Capture the compiler's layout of a struct.
///
/// Fields must be listed in declaration order with their types.
///
/// ```rust
/// use variant_lab::native_layout;
///
/// #[repr(C)]
/// struct Padded {
///     b: i64,
///     d: i32,
///     a: bool,
///     c: bool,
/// }
///
/// let native = native_layout!(Padded { b: i64, d: i32, a: bool, c: bool });
/// assert_eq!(native.field("a").map(|f| f.offset), Some(12));
/// ```
#[macro_export]
macro_rules! native_layout {
    ($ty:ty { $($field:ident : $fty:ty),* $(,)? }) => {
        $crate::layout::NativeLayout {
            type_name: stringify!($ty),
            size: ::std::mem::size_of::<$ty>(),
            align: ::std::mem::align_of::<$ty>(),
            fields: vec![$(
                $crate::layout::NativeField {
                    name: stringify!($field),
                    offset: ::std::mem::offset_of!($ty, $field),
                    size: ::std::mem::size_of::<$fty>(),
                    align: ::std::mem::align_of::<$fty>(),
                }
            ),*],
        }
    };
}
