//! Composite map keys: a formatted string vs an `(i64, String)` struct vs an
//! `(i64, i64)` struct.
//!
//! The logical key is always `(id, code)`. The string strategy renders it as
//! `"{id}:{code}"`, the composite strategy stores both fields, and the integer
//! pair stores `id` with the derived `7 * id`. All strategies map the same
//! logical key to the same stored value, which is what the oracle checks.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::mem::size_of;
use std::sync::Arc;

use static_assertions::const_assert_eq;

use crate::error::Result;
use crate::experiment::{Experiment, Subject};
use crate::layout::{FieldSpec, SubjectLayout};
use crate::native_layout;
use crate::variant::{Strategy, Variant, VariantGroup};

/// Entries in the prebuilt lookup maps.
pub const MAP_SIZE: i64 = 10_000;

/// Entries inserted per `insert` invocation.
pub const INSERT_BATCH: i64 = 256;

/// Code shared by every logical key.
pub const CODE: &str = "abc";

/// `(id, code)` key held in one struct.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    /// Numeric part
    pub id: i64,
    /// Text part
    pub code: String,
}

/// `(id, 7 * id)` key of two integers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntPairKey {
    /// The id
    pub x: i64,
    /// Derived second component
    pub y: i64,
}

const_assert_eq!(size_of::<IntPairKey>(), 16);

/// Renders the logical key as `"{id}:{code}"`.
pub fn string_key(id: i64, code: &str) -> String {
    let mut key = id.to_string();
    key.push(':');
    key.push_str(code);
    key
}

/// One way of turning a logical key into a hashable map key.
pub trait KeyStrategy: Send + Sync + 'static {
    /// Concrete key type.
    type Key: Hash + Eq + Debug + Send + Sync;

    /// Variant name.
    const NAME: &'static str;

    /// Build the key.
    fn key(id: i64, code: &str) -> Self::Key;

    /// Recover the id, proving the encoding kept it.
    fn id_of(key: &Self::Key) -> Option<i64>;
}

/// `"{id}:{code}"` strings.
#[derive(Debug)]
pub struct StringKeys;

/// [`CompositeKey`] structs.
#[derive(Debug)]
pub struct CompositeKeys;

/// [`IntPairKey`] structs.
#[derive(Debug)]
pub struct IntPairKeys;

impl KeyStrategy for StringKeys {
    type Key = String;
    const NAME: &'static str = "string";

    #[inline]
    fn key(id: i64, code: &str) -> String {
        string_key(id, code)
    }

    fn id_of(key: &String) -> Option<i64> {
        key.split_once(':')?.0.parse().ok()
    }
}

impl KeyStrategy for CompositeKeys {
    type Key = CompositeKey;
    const NAME: &'static str = "composite";

    #[inline]
    fn key(id: i64, code: &str) -> CompositeKey {
        CompositeKey {
            id,
            code: code.to_string(),
        }
    }

    fn id_of(key: &CompositeKey) -> Option<i64> {
        Some(key.id)
    }
}

impl KeyStrategy for IntPairKeys {
    type Key = IntPairKey;
    const NAME: &'static str = "int_pair";

    #[inline]
    fn key(id: i64, _code: &str) -> IntPairKey {
        IntPairKey { x: id, y: id * 7 }
    }

    fn id_of(key: &IntPairKey) -> Option<i64> {
        (key.y == key.x * 7).then_some(key.x)
    }
}

/// Logical key used as oracle and harness input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    /// Numeric part
    pub id: i64,
    /// Text part
    pub code: &'static str,
}

impl KeyInput {
    /// Input whose ids walk the map in a scattered order, with one in eleven
    /// landing past the end of the map as a miss.
    pub fn scattered(index: u64) -> Self {
        let span = (MAP_SIZE + MAP_SIZE / 10) as u64;
        Self {
            id: (index.wrapping_mul(7_919) % span) as i64,
            code: CODE,
        }
    }

    /// Input for batch operations: consecutive, non-overlapping id ranges.
    pub fn batch(index: u64) -> Self {
        Self {
            id: index as i64 * INSERT_BATCH,
            code: CODE,
        }
    }
}

/// Build a map of `ids` to themselves under strategy `S`.
pub fn build_map<S: KeyStrategy>(ids: std::ops::Range<i64>, code: &str) -> HashMap<S::Key, i64> {
    let mut map = HashMap::with_capacity(ids.end.saturating_sub(ids.start).max(0) as usize);
    for id in ids {
        map.insert(S::key(id, code), id);
    }
    map
}

/// Insert a batch starting at `input.id`, then sum what the batch stored.
fn insert_batch<S: KeyStrategy>(input: &KeyInput) -> i64 {
    let map = build_map::<S>(input.id..input.id + INSERT_BATCH, input.code);
    (input.id..input.id + INSERT_BATCH)
        .filter_map(|id| map.get(&S::key(id, input.code)))
        .sum()
}

fn lookup_variant<S: KeyStrategy>() -> Variant<KeyInput, Option<i64>> {
    let map = Arc::new(build_map::<S>(0..MAP_SIZE, CODE));
    Variant::infallible(S::NAME, Strategy::direct(), move |input: &KeyInput| {
        map.get(&S::key(input.id, input.code)).copied()
    })
}

/// `insert`: build an [`INSERT_BATCH`]-entry map per call.
pub fn insert_group() -> VariantGroup<KeyInput, i64> {
    VariantGroup::new("insert")
        .with(Variant::infallible(
            StringKeys::NAME,
            Strategy::direct(),
            insert_batch::<StringKeys>,
        ))
        .with(Variant::infallible(
            CompositeKeys::NAME,
            Strategy::direct(),
            insert_batch::<CompositeKeys>,
        ))
        .with(Variant::infallible(
            IntPairKeys::NAME,
            Strategy::direct(),
            insert_batch::<IntPairKeys>,
        ))
}

/// `lookup`: build the key, then probe a prebuilt [`MAP_SIZE`]-entry map.
pub fn lookup_group() -> VariantGroup<KeyInput, Option<i64>> {
    VariantGroup::new("lookup")
        .with(lookup_variant::<StringKeys>())
        .with(lookup_variant::<CompositeKeys>())
        .with(lookup_variant::<IntPairKeys>())
}

/// Lookup input carrying a string key rendered ahead of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrebuiltKey {
    /// Logical key
    pub input: KeyInput,
    /// `string_key(input.id, input.code)`
    pub rendered: String,
}

impl PrebuiltKey {
    /// Scattered input with its rendered key.
    pub fn scattered(index: u64) -> Self {
        let input = KeyInput::scattered(index);
        Self {
            rendered: string_key(input.id, input.code),
            input,
        }
    }
}

/// `lookup_prebuilt`: string keys rendered per lookup vs ahead of time,
/// isolating the map probe from key construction.
pub fn lookup_prebuilt_group() -> VariantGroup<PrebuiltKey, Option<i64>> {
    let map = Arc::new(build_map::<StringKeys>(0..MAP_SIZE, CODE));
    let rendered_map = Arc::clone(&map);

    VariantGroup::new("lookup_prebuilt")
        .with(Variant::infallible(
            "render_per_lookup",
            Strategy::direct(),
            move |key: &PrebuiltKey| map.get(&string_key(key.input.id, key.input.code)).copied(),
        ))
        .with(Variant::infallible(
            "prebuilt",
            Strategy::direct(),
            move |key: &PrebuiltKey| rendered_map.get(key.rendered.as_str()).copied(),
        ))
}

/// `key_build`: construction cost only; each key decodes back to its id.
pub fn key_build_group() -> VariantGroup<KeyInput, Option<i64>> {
    fn build<S: KeyStrategy>(input: &KeyInput) -> Option<i64> {
        let key = std::hint::black_box(S::key(input.id, input.code));
        S::id_of(&key)
    }

    VariantGroup::new("key_build")
        .with(Variant::infallible(StringKeys::NAME, Strategy::direct(), build::<StringKeys>))
        .with(Variant::infallible(
            CompositeKeys::NAME,
            Strategy::direct(),
            build::<CompositeKeys>,
        ))
        .with(Variant::infallible(IntPairKeys::NAME, Strategy::direct(), build::<IntPairKeys>))
}

fn composite_layout() -> SubjectLayout {
    let pointer = size_of::<usize>();
    SubjectLayout::new("composite_key", 8 + 3 * pointer)
        .field(FieldSpec::scalar("id", 8))
        .field(FieldSpec::words("code", 3))
}

fn int_pair_layout() -> SubjectLayout {
    SubjectLayout::new("int_pair_key", 16)
        .field(FieldSpec::scalar("x", 8))
        .field(FieldSpec::scalar("y", 8))
        .offsets([0, 8])
}

/// The `map_keys` experiment.
///
/// Groups compare all three key types, so each one requires both audited
/// key structs alongside the opaque string key.
pub fn experiment() -> Result<Experiment> {
    let subjects = ["string_key", "composite_key", "int_pair_key"];

    Experiment::builder("map_keys")
        .subject(Subject::opaque("string_key"))
        .subject(Subject::audited_native(
            composite_layout(),
            native_layout!(CompositeKey { id: i64, code: String }),
        ))
        .subject(Subject::audited_native(
            int_pair_layout(),
            native_layout!(IntPairKey { x: i64, y: i64 }),
        ))
        .group_across(
            &subjects,
            insert_group(),
            KeyInput::batch,
            Some(INSERT_BATCH as u64),
        )
        .group_across(&subjects, lookup_group(), KeyInput::scattered, None)
        .group_across(
            &["string_key"],
            lookup_prebuilt_group(),
            PrebuiltKey::scattered,
            None,
        )
        .group_across(&subjects, key_build_group(), KeyInput::scattered, None)
        .build()
}
