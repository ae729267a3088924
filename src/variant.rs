//! Variants: interchangeable implementations of one observable operation.
//!
//! A [`Variant`] is a named function from an input to an output, tagged with
//! the [`Strategy`] it exercises. Variants implementing the same operation on
//! the same subject form a [`VariantGroup`]; the group's first variant is its
//! reference, against which the oracle compares every other one.
//!
//! Every variant body is reached through one boxed-closure call. That call
//! costs the same for every member of a group, so it cancels out of the
//! comparison; the dispatch being studied happens inside the body.
//!
//! A body that panics is reported as a [`VariantFailure`] carrying the panic
//! message, so one misbehaving variant cannot take down the rest of a run.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::VariantFailure;

/// Outcome of a single variant invocation.
pub type VariantResult<O> = std::result::Result<O, VariantFailure>;

/// How a variant reaches the code under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatch {
    /// Receiver passed by value (copied)
    ByValue,
    /// Receiver passed by reference
    ByReference,
    /// Call through a trait object
    Dynamic,
    /// Plain function call; the variants differ in what the body does
    Direct,
}

/// Whether the compiler may inline the call under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inlining {
    /// Inlining left to the compiler
    Inlined,
    /// Call kept behind `#[inline(never)]`
    Opaque,
}

/// Dispatch and inlining tags of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strategy {
    /// Dispatch form
    pub dispatch: Dispatch,
    /// Inlining form
    pub inlining: Inlining,
}

impl Strategy {
    /// Strategy with explicit dispatch and inlining.
    pub const fn new(dispatch: Dispatch, inlining: Inlining) -> Self {
        Self { dispatch, inlining }
    }

    /// Direct call the compiler may inline.
    pub const fn direct() -> Self {
        Self::new(Dispatch::Direct, Inlining::Inlined)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dispatch = match self.dispatch {
            Dispatch::ByValue => "by-value",
            Dispatch::ByReference => "by-reference",
            Dispatch::Dynamic => "dynamic",
            Dispatch::Direct => "direct",
        };
        let inlining = match self.inlining {
            Inlining::Inlined => "inlined",
            Inlining::Opaque => "opaque",
        };
        write!(f, "{}/{}", dispatch, inlining)
    }
}

type Body<I, O> = dyn Fn(&I) -> VariantResult<O> + Send + Sync;

/// One named implementation strategy.
pub struct Variant<I, O> {
    name: String,
    strategy: Strategy,
    body: Box<Body<I, O>>,
}

impl<I, O> Variant<I, O> {
    /// Create a variant from a fallible body.
    pub fn new<F>(name: impl Into<String>, strategy: Strategy, body: F) -> Self
    where
        F: Fn(&I) -> VariantResult<O> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            strategy,
            body: Box::new(body),
        }
    }

    /// Create a variant from a body that cannot fail.
    pub fn infallible<F>(name: impl Into<String>, strategy: Strategy, body: F) -> Self
    where
        F: Fn(&I) -> O + Send + Sync + 'static,
    {
        Self::new(name, strategy, move |input| Ok(body(input)))
    }

    /// Variant name, unique within its group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strategy tags.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Run the variant once.
    ///
    /// A panic inside the body is caught and returned as a failure.
    #[inline]
    pub fn invoke(&self, input: &I) -> VariantResult<O> {
        panic::catch_unwind(AssertUnwindSafe(|| (self.body)(input)))
            .unwrap_or_else(|payload| Err(panic_failure(payload.as_ref())))
    }
}

fn panic_failure(payload: &(dyn Any + Send)) -> VariantFailure {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    VariantFailure::new(format!("panicked: {}", message))
}

impl<I, O> fmt::Debug for Variant<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Variants of one logical operation on one subject.
pub struct VariantGroup<I, O> {
    name: String,
    variants: Vec<Variant<I, O>>,
}

impl<I, O> VariantGroup<I, O> {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
        }
    }

    /// Append a variant (builder style).
    pub fn with(mut self, variant: Variant<I, O>) -> Self {
        self.variants.push(variant);
        self
    }

    /// Append a variant.
    pub fn push(&mut self, variant: Variant<I, O>) {
        self.variants.push(variant);
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variants in registration order; the first one is the reference.
    pub fn variants(&self) -> &[Variant<I, O>] {
        &self.variants
    }

    /// Look up a variant by name.
    pub fn variant(&self, name: &str) -> Option<&Variant<I, O>> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Number of variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the group has no variants.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// First name that appears more than once, if any.
    pub(crate) fn duplicate_name(&self) -> Option<&str> {
        self.variants.iter().enumerate().find_map(|(i, v)| {
            self.variants[..i]
                .iter()
                .any(|earlier| earlier.name == v.name)
                .then_some(v.name.as_str())
        })
    }
}

impl<I, O> fmt::Debug for VariantGroup<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantGroup")
            .field("name", &self.name)
            .field("variants", &self.variants)
            .finish()
    }
}
