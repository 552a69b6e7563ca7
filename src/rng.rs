//! Flow id generation.
//!
//! Managers draw their flow ids from an [`IdGenerator`]. Each manager may be
//! given its own (seeded) generator; otherwise the process-wide one from
//! [`global`] is used.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::core::{FlowId, MAX_NUM_FLOWS};

static GLOBAL: OnceLock<Arc<IdGenerator>> = OnceLock::new();

/// Random source for flow ids.
#[derive(Debug)]
pub struct IdGenerator {
    rng: Mutex<StdRng>,
}

impl IdGenerator {
    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick a random id in `1..=MAX_NUM_FLOWS` for which `is_taken` is false.
    ///
    /// Returns `None` when every id is taken.
    pub fn pick_free(&self, is_taken: impl Fn(FlowId) -> bool) -> Option<FlowId> {
        let free: Vec<FlowId> = (1..=MAX_NUM_FLOWS).filter(|id| !is_taken(*id)).collect();
        let mut rng = self.rng.lock();
        free.choose(&mut *rng).copied()
    }
}

/// Seed the process-wide generator.
///
/// Returns `false` if it was already initialised (explicitly or by a call to
/// [`global`]); the existing generator is kept.
pub fn init_global(seed: u64) -> bool {
    GLOBAL.set(Arc::new(IdGenerator::from_seed(seed))).is_ok()
}

/// The process-wide generator, seeded from entropy on first use.
pub fn global() -> Arc<IdGenerator> {
    GLOBAL
        .get_or_init(|| Arc::new(IdGenerator::from_entropy()))
        .clone()
}
