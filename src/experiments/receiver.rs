//! Receiver passing: by value vs by reference vs through a trait object,
//! with and without inlining, across four receiver sizes.
//!
//! Every variant sums the same fields in the same order, so their `f64`
//! outputs are bit-identical and the oracle can compare them exactly. What
//! differs is how the receiver reaches the summing code: copied, borrowed,
//! or behind a vtable call. The by-value dynamic variant boxes a copy of the
//! receiver first, so it also pays for the heap allocation a value-to-trait
//! object conversion costs.

use std::fmt::Debug;
use std::mem::{align_of, size_of};

use static_assertions::const_assert_eq;

use crate::error::Result;
use crate::experiment::{Experiment, ExperimentBuilder, Subject};
use crate::layout::{FieldSpec, NativeLayout, SubjectLayout};
use crate::native_layout;
use crate::variant::{Dispatch, Inlining, Strategy, Variant, VariantGroup};

/// Sum behind dynamic dispatch.
pub trait DynReceiver {
    /// Sum through the trait object.
    fn dyn_sum(&self) -> f64;
}

/// Receiver type measured by this experiment.
pub trait Receiver: DynReceiver + Copy + Debug + Send + Sync + 'static {
    /// Subject name.
    const NAME: &'static str;

    /// Deterministic instance for a sample index.
    fn from_index(index: u64) -> Self;

    /// Sum with the receiver passed by value.
    fn sum_by_value(self) -> f64;

    /// Sum with the receiver passed by reference.
    fn sum_by_ref(&self) -> f64;

    /// By-value sum kept behind a call boundary.
    fn sum_by_value_opaque(self) -> f64;

    /// By-reference sum kept behind a call boundary.
    fn sum_by_ref_opaque(&self) -> f64;

    /// Declared layout.
    fn layout() -> SubjectLayout;

    /// Compiler-reported layout.
    fn native() -> NativeLayout;
}

/// 24 bytes: three named `f64` fields.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Small {
    /// First component
    pub x: f64,
    /// Second component
    pub y: f64,
    /// Third component
    pub z: f64,
}

impl Small {
    #[inline(always)]
    fn total(&self) -> f64 {
        self.x + self.y + self.z
    }
}

impl DynReceiver for Small {
    fn dyn_sum(&self) -> f64 {
        self.total()
    }
}

impl Receiver for Small {
    const NAME: &'static str = "small";

    fn from_index(index: u64) -> Self {
        let base = index as f64;
        Self {
            x: base * 0.5,
            y: base + 0.25,
            z: 3.0 - base,
        }
    }

    #[inline]
    fn sum_by_value(self) -> f64 {
        self.total()
    }

    #[inline]
    fn sum_by_ref(&self) -> f64 {
        self.total()
    }

    #[inline(never)]
    fn sum_by_value_opaque(self) -> f64 {
        self.total()
    }

    #[inline(never)]
    fn sum_by_ref_opaque(&self) -> f64 {
        self.total()
    }

    fn layout() -> SubjectLayout {
        SubjectLayout::new(Self::NAME, 24)
            .field(FieldSpec::scalar("x", 8))
            .field(FieldSpec::scalar("y", 8))
            .field(FieldSpec::scalar("z", 8))
            .offsets([0, 8, 16])
    }

    fn native() -> NativeLayout {
        native_layout!(Small { x: f64, y: f64, z: f64 })
    }
}

macro_rules! array_receiver {
    ($(#[$meta:meta])* $ty:ident, $name:literal, $len:literal) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $ty {
            /// Summed values
            pub data: [f64; $len],
        }

        impl $ty {
            #[inline(always)]
            fn total(&self) -> f64 {
                let mut acc = 0.0;
                for v in self.data {
                    acc += v;
                }
                acc
            }
        }

        impl DynReceiver for $ty {
            fn dyn_sum(&self) -> f64 {
                self.total()
            }
        }

        impl Receiver for $ty {
            const NAME: &'static str = $name;

            fn from_index(index: u64) -> Self {
                let mut data = [0.0; $len];
                for (k, slot) in data.iter_mut().enumerate() {
                    *slot = (index as f64) * 0.5 + k as f64;
                }
                Self { data }
            }

            #[inline]
            fn sum_by_value(self) -> f64 {
                self.total()
            }

            #[inline]
            fn sum_by_ref(&self) -> f64 {
                self.total()
            }

            #[inline(never)]
            fn sum_by_value_opaque(self) -> f64 {
                self.total()
            }

            #[inline(never)]
            fn sum_by_ref_opaque(&self) -> f64 {
                self.total()
            }

            fn layout() -> SubjectLayout {
                SubjectLayout::new(Self::NAME, $len * 8)
                    .field(FieldSpec::array("data", 8, $len))
                    .offsets([0])
            }

            fn native() -> NativeLayout {
                native_layout!($ty { data: [f64; $len] })
            }
        }
    };
}

array_receiver!(
    /// 64 bytes: eight `f64`.
    Medium, "medium", 8
);
array_receiver!(
    /// 128 bytes: sixteen `f64`.
    Large, "large", 16
);
array_receiver!(
    /// 256 bytes: thirty-two `f64`.
    XLarge, "xlarge", 32
);

const_assert_eq!(size_of::<Small>(), 24);
const_assert_eq!(size_of::<Medium>(), 64);
const_assert_eq!(size_of::<Large>(), 128);
const_assert_eq!(size_of::<XLarge>(), 256);
const_assert_eq!(align_of::<XLarge>(), align_of::<f64>());

#[inline(never)]
fn call_dyn(receiver: &dyn DynReceiver) -> f64 {
    receiver.dyn_sum()
}

/// The six receiver variants for one receiver type.
pub fn sum_group<R: Receiver>() -> VariantGroup<R, f64> {
    use Dispatch::{ByReference, ByValue, Dynamic};
    use Inlining::{Inlined, Opaque};

    VariantGroup::new("sum")
        .with(Variant::infallible(
            "value",
            Strategy::new(ByValue, Inlined),
            |r: &R| R::sum_by_value(*r),
        ))
        .with(Variant::infallible(
            "reference",
            Strategy::new(ByReference, Inlined),
            |r: &R| r.sum_by_ref(),
        ))
        .with(Variant::infallible(
            "value_opaque",
            Strategy::new(ByValue, Opaque),
            |r: &R| R::sum_by_value_opaque(*r),
        ))
        .with(Variant::infallible(
            "reference_opaque",
            Strategy::new(ByReference, Opaque),
            |r: &R| r.sum_by_ref_opaque(),
        ))
        .with(Variant::infallible(
            "value_dyn",
            Strategy::new(Dynamic, Opaque),
            |r: &R| {
                let boxed: Box<dyn DynReceiver> = Box::new(*r);
                call_dyn(std::hint::black_box(&*boxed))
            },
        ))
        .with(Variant::infallible(
            "reference_dyn",
            Strategy::new(Dynamic, Opaque),
            |r: &R| call_dyn(std::hint::black_box(r)),
        ))
}

fn register<R: Receiver>(builder: ExperimentBuilder) -> ExperimentBuilder {
    builder
        .subject(Subject::audited_native(R::layout(), R::native()))
        .group_with_units(R::NAME, sum_group::<R>(), R::from_index, size_of::<R>() as u64)
}

/// The `receiver` experiment: one subject and one group per size.
pub fn experiment() -> Result<Experiment> {
    let builder = Experiment::builder("receiver");
    let builder = register::<Small>(builder);
    let builder = register::<Medium>(builder);
    let builder = register::<Large>(builder);
    let builder = register::<XLarge>(builder);
    builder.build()
}
