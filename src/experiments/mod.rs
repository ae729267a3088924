//! The experiment catalog.
//!
//! Each module registers one [`Experiment`](crate::Experiment): its subjects,
//! the variant groups comparing strategies on them, and the input
//! generators. [`catalog`] collects them all into a [`Registry`].

pub mod map_keys; // string vs struct composite map keys
pub mod receiver; // by-value vs by-reference vs dynamic receivers
pub mod spawn_sync; // spawn-and-wait completion primitives
pub mod string_concat; // string building strategies
pub mod struct_padding; // field ordering and padding
pub mod write_path; // file vs trait object vs raw syscall writes

use crate::error::Result;
use crate::experiment::Registry;

/// Registry holding every built-in experiment.
///
/// Building the catalog opens the resources experiments keep for their
/// lifetime (prebuilt maps, the task runtime, the null device).
pub fn catalog() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register(receiver::experiment()?)?;
    registry.register(map_keys::experiment()?)?;
    registry.register(struct_padding::experiment()?)?;
    registry.register(string_concat::experiment()?)?;
    registry.register(spawn_sync::experiment()?)?;
    registry.register(write_path::experiment()?)?;
    Ok(registry)
}
