//! MCS category pool
//!
//! Tracks which `s0:cX,cY` levels have been handed out so two containers
//! never share a category pair. The pool is an ordinary value owned by a
//! [`Selinux`](crate::selinux::Selinux) handle, not process-global state.

use crate::error::{LabelError, LabelResult};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;

/// Number of categories used for container levels
pub const DEFAULT_CATEGORY_RANGE: u32 = 1024;

/// Largest id `int_to_mcs` maps (1024 choose 2)
const MAX_MCS_ID: u32 = 523_776;

/// Set of reserved MCS levels
#[derive(Debug, Default)]
pub struct McsPool {
    reserved: Mutex<HashSet<String>>,
}

impl McsPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `level` as used; errors if it already is
    pub fn reserve(&self, level: &str) -> LabelResult<()> {
        if self.reserved.lock().insert(level.to_string()) {
            Ok(())
        } else {
            Err(LabelError::McsInUse {
                level: level.to_string(),
            })
        }
    }

    /// Return `level` to the pool
    pub fn release(&self, level: &str) {
        self.reserved.lock().remove(level);
    }

    /// Check if `level` is currently reserved
    pub fn is_reserved(&self, level: &str) -> bool {
        self.reserved.lock().contains(level)
    }

    /// Number of reserved levels
    pub fn len(&self) -> usize {
        self.reserved.lock().len()
    }

    /// Check if nothing is reserved
    pub fn is_empty(&self) -> bool {
        self.reserved.lock().is_empty()
    }

    /// Reserve a random unused `s0:cX,cY` level with `X < Y < cat_range`.
    ///
    /// Only reserved pairs inside `cat_range` count towards exhaustion.
    pub fn allocate(&self, cat_range: u32) -> LabelResult<String> {
        let pairs = u64::from(cat_range) * u64::from(cat_range.saturating_sub(1)) / 2;

        // Held across the draw so the free-pair count stays valid
        let mut reserved = self.reserved.lock();
        let taken = reserved
            .iter()
            .filter(|level| category_pair(level).is_some_and(|(_, hi)| hi < cat_range))
            .count() as u64;
        if taken >= pairs {
            return Err(LabelError::McsExhausted { range: cat_range });
        }

        let mut rng = rand::thread_rng();
        loop {
            let c1 = rng.gen_range(0..cat_range);
            let c2 = rng.gen_range(0..cat_range);
            if c1 == c2 {
                continue;
            }
            let (lo, hi) = if c1 < c2 { (c1, c2) } else { (c2, c1) };

            let level = format!("s0:c{},c{}", lo, hi);
            if reserved.insert(level.clone()) {
                return Ok(level);
            }
        }
    }
}

/// Categories of an `s0:cX,cY` level with `X < Y`
fn category_pair(level: &str) -> Option<(u32, u32)> {
    let (lo, hi) = level.strip_prefix("s0:c")?.split_once(",c")?;
    let (lo, hi): (u32, u32) = (lo.parse().ok()?, hi.parse().ok()?);
    (lo < hi).then_some((lo, hi))
}

/// Deterministically map `id` (1..=523776) onto a category pair
pub fn int_to_mcs(id: u32, cat_range: u32) -> LabelResult<String> {
    if id < 1 || id > MAX_MCS_ID {
        return Err(LabelError::McsOutOfRange {
            id,
            range: cat_range,
        });
    }

    let set_size = cat_range;
    let mut tier = set_size;
    let mut ord = id;
    while ord > tier && tier > 0 {
        ord -= tier;
        tier -= 1;
    }
    let tier = set_size - tier;
    let ord = ord + tier;
    Ok(format!("s0:c{},c{}", tier, ord))
}
