//! Script entry points for the block transform, and the plan cache behind
//! them.

use std::sync::{Arc, LazyLock, OnceLock};

use crate::constants::{MDCT_MAX_LEN, MDCT_MIN_LEN};
use crate::mdct::MdctPlan;
use crate::ram::{RamCell, RamTable};

const SLOTS: usize = MDCT_MAX_LEN.trailing_zeros() as usize + 1;

/// One lazily built plan per supported block length.
///
/// Each slot is built at most once; later lookups are a single atomic load.
#[derive(Debug, Default)]
pub struct TransformCache {
    slots: [OnceLock<Arc<MdctPlan>>; SLOTS],
}

static GLOBAL: LazyLock<TransformCache> = LazyLock::new(TransformCache::new);

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> &'static TransformCache {
        &GLOBAL
    }

    /// Plan for script-visible block length `n`, or `None` if `n` is not a
    /// power of two in the supported range.
    pub fn plan(&self, n: usize) -> Option<Arc<MdctPlan>> {
        if !n.is_power_of_two() || !(MDCT_MIN_LEN..=MDCT_MAX_LEN).contains(&n) {
            return None;
        }
        let slot = &self.slots[n.trailing_zeros() as usize];
        Some(Arc::clone(slot.get_or_init(|| Arc::new(MdctPlan::build(n)))))
    }

    /// Number of plans built so far.
    pub fn built(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}

/// Resolve an `n`-cell script block and its plan, or `None` if the call
/// must be rejected.
fn prepare<'r>(
    ram: &'r RamTable,
    cache: &TransformCache,
    addr: f64,
    len: f64,
) -> Option<(&'r [RamCell], Arc<MdctPlan>)> {
    let n = crate::ram::script_int(len);
    if n < 1 {
        return None;
    }
    let plan = cache.plan(n as usize)?;
    let cells = ram.contiguous(addr, plan.len())?;
    Some((cells, plan))
}

/// `mdct(addr, len)`: window `len` cells in place, transform them, and
/// store the `len/2` coefficients at the start of the block. Returns `addr`.
///
/// A length that is not a power of two in `[64, 4096]`, a block that
/// crosses a page, or an address that does not resolve leaves memory
/// untouched.
pub fn mdct(ram: &RamTable, cache: &TransformCache, addr: f64, len: f64) -> f64 {
    let Some((cells, plan)) = prepare(ram, cache, addr, len) else {
        tracing::debug!(addr, len, "mdct rejected");
        return addr;
    };
    let n = plan.len();
    let mut block = [0.0; MDCT_MAX_LEN];
    let block = &mut block[..n];
    for (x, cell) in block.iter_mut().zip(cells) {
        *x = cell.get();
    }
    plan.window_in_place(block);
    let mut out = [0.0; MDCT_MAX_LEN / 2];
    let out = &mut out[..n / 2];
    plan.forward(block, out);
    for (cell, v) in cells.iter().zip(out.iter()) {
        cell.set(*v);
    }
    addr
}

/// `imdct(addr, len)`: read `len/2` coefficients, inverse transform, window,
/// and write `len` samples back over the block. Returns `addr`. Rejects the
/// same calls as [`mdct`].
pub fn imdct(ram: &RamTable, cache: &TransformCache, addr: f64, len: f64) -> f64 {
    let Some((cells, plan)) = prepare(ram, cache, addr, len) else {
        tracing::debug!(addr, len, "imdct rejected");
        return addr;
    };
    let n = plan.len();
    let mut coeffs = [0.0; MDCT_MAX_LEN / 2];
    let coeffs = &mut coeffs[..n / 2];
    for (x, cell) in coeffs.iter_mut().zip(cells) {
        *x = cell.get();
    }
    let mut samples = [0.0; MDCT_MAX_LEN];
    let samples = &mut samples[..n];
    plan.inverse(coeffs, samples);
    plan.window_in_place(samples);
    for (cell, v) in cells.iter().zip(samples.iter()) {
        cell.set(*v);
    }
    addr
}
