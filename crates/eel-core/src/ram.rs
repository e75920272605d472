//! Segmented script memory.
//!
//! A [`RamTable`] is a lazily populated array of fixed-size pages of `f64`
//! cells. Pages are allocated on first touch under a per-table lock; once a
//! page exists, reads and writes go straight to its atomic cells with no
//! locking. Every failure (address out of range, page cap, budget exhausted,
//! allocation refused) resolves to one shared failure cell, so scripts can
//! neither crash the host nor observe why an access failed.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;

use crate::config::RamConfig;
use crate::constants::ADDR_EPSILON;

/// One script-addressable numeric cell.
///
/// Stores the bits of an `f64` so that cells can be shared between script
/// instances without locking. Ordering is relaxed: scripts get no
/// cross-cell ordering guarantees.
#[derive(Debug, Default)]
pub struct RamCell(AtomicU64);

impl RamCell {
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Soft cap on page storage, shared by every table built against it.
#[derive(Debug, Default)]
pub struct MemoryBudget {
    limit: AtomicUsize,
    used: AtomicUsize,
}

impl MemoryBudget {
    /// A budget of `limit_bytes`; 0 means unlimited.
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            limit: AtomicUsize::new(limit_bytes),
            used: AtomicUsize::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    pub fn set_limit(&self, limit_bytes: usize) {
        self.limit.store(limit_bytes, Ordering::Relaxed);
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    fn try_reserve(&self, bytes: usize) -> bool {
        let limit = self.limit();
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.checked_add(bytes)?;
                if limit != 0 && next > limit {
                    None
                } else {
                    Some(next)
                }
            })
            .is_ok()
    }

    fn release(&self, bytes: usize) {
        let _ = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(bytes))
            });
    }
}

/// Snapshot of a table's allocation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RamStats {
    pub pages_allocated: usize,
    pub page_cap: usize,
    pub page_size: usize,
    pub bytes_in_use: usize,
}

type Page = Box<[RamCell]>;

/// Page table of one script memory space.
pub struct RamTable {
    pages: Box<[OnceLock<Page>]>,
    page_size: usize,
    page_shift: u32,
    budget: Arc<MemoryBudget>,
    alloc_lock: Mutex<()>,
    /// 0 = no free pending, otherwise first retired address + 1.
    retire_from: AtomicUsize,
    fail: RamCell,
    refusal_logged: AtomicBool,
}

impl std::fmt::Debug for RamTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RamTable")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Convert a script address to an integer, truncating after the epsilon.
/// Saturates out-of-range values; NaN becomes 0.
#[inline]
pub(crate) fn script_int(v: f64) -> i64 {
    (v + ADDR_EPSILON) as i64
}

impl RamTable {
    /// Build an empty table. `config` must have passed validation
    /// (power-of-two page size).
    pub fn new(config: &RamConfig, budget: Arc<MemoryBudget>) -> Self {
        let page_size = config.page_size.next_power_of_two();
        Self {
            pages: (0..config.pages).map(|_| OnceLock::new()).collect(),
            page_size,
            page_shift: page_size.trailing_zeros(),
            budget,
            alloc_lock: Mutex::new(()),
            retire_from: AtomicUsize::new(0),
            fail: RamCell::default(),
            refusal_logged: AtomicBool::new(false),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_cap(&self) -> usize {
        self.pages.len()
    }

    /// Total addressable cells: page cap × page size.
    pub fn capacity(&self) -> usize {
        self.pages.len() << self.page_shift
    }

    pub fn budget(&self) -> &Arc<MemoryBudget> {
        &self.budget
    }

    /// Whether `cell` is the shared failure cell.
    pub fn is_failure(&self, cell: &RamCell) -> bool {
        ptr::eq(cell, &self.fail)
    }

    /// Resolve a script address, allocating its page on first touch.
    pub fn resolve(&self, addr: f64) -> &RamCell {
        let v = addr + ADDR_EPSILON;
        if !(v >= 0.0) || v >= self.capacity() as f64 {
            return &self.fail;
        }
        self.resolve_index(v as usize)
    }

    pub fn resolve_index(&self, idx: usize) -> &RamCell {
        match self.page(idx >> self.page_shift) {
            Some(page) => &page[idx & (self.page_size - 1)],
            None => &self.fail,
        }
    }

    /// Read a cell without allocating. Unallocated pages read as zero.
    pub fn resolve_for_read(&self, addr: f64) -> f64 {
        let v = addr + ADDR_EPSILON;
        if !(v >= 0.0) || v >= self.capacity() as f64 {
            return self.fail.get();
        }
        let idx = v as usize;
        match self.pages[idx >> self.page_shift].get() {
            Some(page) => page[idx & (self.page_size - 1)].get(),
            None => 0.0,
        }
    }

    fn page(&self, which: usize) -> Option<&Page> {
        let slot = self.pages.get(which)?;
        if let Some(page) = slot.get() {
            return Some(page);
        }
        self.allocate(which, slot)
    }

    #[cold]
    fn allocate<'a>(&'a self, which: usize, slot: &'a OnceLock<Page>) -> Option<&'a Page> {
        let _guard = self
            .alloc_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(page) = slot.get() {
            return Some(page);
        }

        let bytes = self.page_bytes();
        if !self.budget.try_reserve(bytes) {
            if !self.refusal_logged.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    page = which,
                    used = self.budget.used(),
                    limit = self.budget.limit(),
                    "script memory budget exhausted"
                );
            }
            return None;
        }

        let mut cells: Vec<RamCell> = Vec::new();
        if cells.try_reserve_exact(self.page_size).is_err() {
            self.budget.release(bytes);
            tracing::debug!(page = which, "page allocation failed");
            return None;
        }
        cells.resize_with(self.page_size, RamCell::default);

        if slot.set(cells.into_boxed_slice()).is_err() {
            // Only this lock's holder sets slots.
            self.budget.release(bytes);
        }
        slot.get()
    }

    fn page_bytes(&self) -> usize {
        self.page_size * std::mem::size_of::<RamCell>()
    }

    /// Cells from `idx` up to the end of its page, at most `max_len` long.
    fn run(&self, idx: usize, max_len: usize) -> Option<&[RamCell]> {
        let page = self.page(idx >> self.page_shift)?;
        let offset = idx & (self.page_size - 1);
        let len = max_len.min(self.page_size - offset);
        Some(&page[offset..offset + len])
    }

    /// The `len` cells starting at `addr`, provided they lie in a single
    /// page. Allocates that page on first touch.
    pub fn contiguous(&self, addr: f64, len: usize) -> Option<&[RamCell]> {
        let v = addr + ADDR_EPSILON;
        if !(v >= 0.0) || v >= self.capacity() as f64 || len == 0 {
            return None;
        }
        let idx = v as usize;
        if (idx & (self.page_size - 1)) + len > self.page_size {
            return None;
        }
        self.run(idx, len)
    }

    /// `memcpy(dest, src, len)`: copy with memmove semantics. Leading
    /// negative offsets shrink the run; copying stops at the first page
    /// that cannot be resolved. Returns `dest`.
    pub fn copy(&self, dest: f64, src: f64, len: f64) -> f64 {
        let mem_size = self.capacity() as i64;
        let mut dest_offs = script_int(dest);
        let mut src_offs = script_int(src);
        let mut len = script_int(len);

        if src_offs < 0 {
            len = len.saturating_add(src_offs);
            dest_offs = dest_offs.saturating_sub(src_offs);
            src_offs = 0;
        }
        if dest_offs < 0 {
            len = len.saturating_add(dest_offs);
            src_offs = src_offs.saturating_sub(dest_offs);
            dest_offs = 0;
        }
        if src_offs.saturating_add(len) > mem_size {
            len = mem_size - src_offs;
        }
        if dest_offs.saturating_add(len) > mem_size {
            len = mem_size - dest_offs;
        }
        if src_offs == dest_offs || len < 1 {
            return dest;
        }

        let (d, s, n) = (dest_offs as usize, src_offs as usize, len as usize);
        if s < d && s + n > d {
            self.copy_backward(d + n, s + n, n);
        } else {
            self.copy_forward(d, s, n);
        }
        dest
    }

    fn copy_forward(&self, mut dest: usize, mut src: usize, mut len: usize) {
        while len > 0 {
            let Some(s) = self.run(src, len) else { return };
            let Some(d) = self.run(dest, s.len()) else { return };
            let n = d.len();
            for (to, from) in d.iter().zip(&s[..n]) {
                to.set(from.get());
            }
            dest += n;
            src += n;
            len -= n;
        }
    }

    /// Copy right to left from the exclusive ends `dest_end`/`src_end`.
    fn copy_backward(&self, mut dest_end: usize, mut src_end: usize, mut len: usize) {
        let mask = self.page_size - 1;
        while len > 0 {
            let max_d = ((dest_end - 1) & mask) + 1;
            let max_s = ((src_end - 1) & mask) + 1;
            let n = len.min(max_d).min(max_s);
            let Some(s) = self.run(src_end - n, n) else { return };
            let Some(d) = self.run(dest_end - n, n) else { return };
            for (to, from) in d.iter().zip(s).rev() {
                to.set(from.get());
            }
            dest_end -= n;
            src_end -= n;
            len -= n;
        }
    }

    /// `memset(dest, value, len)`. Returns `dest`.
    pub fn fill(&self, dest: f64, value: f64, len: f64) -> f64 {
        let mem_size = self.capacity() as i64;
        let mut offs = script_int(dest);
        let mut len = script_int(len);
        if offs < 0 {
            len = len.saturating_add(offs);
            offs = 0;
        }
        if offs >= mem_size {
            return dest;
        }
        if offs.saturating_add(len) > mem_size {
            len = mem_size - offs;
        }
        if len <= 0 {
            return dest;
        }

        let (mut offs, mut len) = (offs as usize, len as usize);
        while len > 0 {
            let Some(run) = self.run(offs, len) else { break };
            for cell in run {
                cell.set(value);
            }
            offs += run.len();
            len -= run.len();
        }
        dest
    }

    /// `free(from)`: mark everything at or past `from` for release. Nothing
    /// is freed until [`free_if_requested`](Self::free_if_requested).
    pub fn request_free(&self, from: f64) -> f64 {
        let d = script_int(from).max(0) as usize;
        if d < self.capacity() {
            self.retire_from.store(d + 1, Ordering::Relaxed);
        }
        from
    }

    pub fn wants_free(&self) -> bool {
        self.retire_from.load(Ordering::Relaxed) != 0
    }

    /// Release pages retired by [`request_free`](Self::request_free). The page
    /// straddling the watermark is kept and its tail zeroed. Returns the bytes
    /// handed back to the budget.
    pub fn free_if_requested(&mut self) -> usize {
        let mark = std::mem::take(self.retire_from.get_mut());
        if mark == 0 {
            return 0;
        }
        let start = mark - 1;
        let page_bytes = self.page_bytes();
        let page_size = self.page_size;
        let mut released = 0;

        for (x, slot) in self.pages.iter_mut().enumerate() {
            let pos = x * page_size;
            if pos >= start {
                if slot.take().is_some() {
                    released += page_bytes;
                }
            } else if start < pos + page_size
                && let Some(page) = slot.get()
            {
                for cell in &page[start - pos..] {
                    cell.set(0.0);
                }
            }
        }

        self.budget.release(released);
        if released > 0 {
            tracing::debug!(from = start, released, "released script memory");
        }
        released
    }

    /// Release every page (context teardown). Returns the bytes released.
    pub fn release_all(&mut self) -> usize {
        self.retire_from.store(1, Ordering::Relaxed);
        self.free_if_requested()
    }

    /// `memtop()`: one past the last address of the highest allocated page.
    pub fn top(&self) -> f64 {
        let used = self
            .pages
            .iter()
            .rposition(|slot| slot.get().is_some())
            .map_or(0, |i| i + 1);
        (used * self.page_size) as f64
    }

    /// `mem_set_values(addr, ...)`: write `values` to consecutive cells.
    /// Returns the number of cells written.
    pub fn set_values(&self, addr: f64, values: &[f64]) -> usize {
        let offs = script_int(addr);
        let (start, values) = match clamp_leading(offs, values.len()) {
            Some((start, skip)) => (start, &values[skip..]),
            None => return 0,
        };
        let mut written = 0;
        let mut idx = start;
        while written < values.len() && idx < self.capacity() {
            let Some(run) = self.run(idx, values.len() - written) else { break };
            for (cell, v) in run.iter().zip(&values[written..]) {
                cell.set(*v);
            }
            written += run.len();
            idx += run.len();
        }
        written
    }

    /// `mem_get_values(addr, ...)`: read consecutive cells into `out`.
    /// Outputs before a negative leading offset are left untouched. Returns
    /// the number of cells read.
    pub fn get_values(&self, addr: f64, out: &mut [f64]) -> usize {
        let offs = script_int(addr);
        let (start, out) = match clamp_leading(offs, out.len()) {
            Some((start, skip)) => (start, &mut out[skip..]),
            None => return 0,
        };
        let mut read = 0;
        let mut idx = start;
        while read < out.len() && idx < self.capacity() {
            let Some(run) = self.run(idx, out.len() - read) else { break };
            for (slot, cell) in out[read..].iter_mut().zip(run) {
                *slot = cell.get();
            }
            read += run.len();
            idx += run.len();
        }
        read
    }

    /// `mem_multiply_sum(a, b, len)`: dot product of two regions. A `b` of
    /// -1, -2 or -3 sums `a`, its squares, or its absolute values instead.
    pub fn multiply_sum(&self, a: f64, b: f64, len: f64) -> f64 {
        let a_offs = script_int(a);
        let b_offs = script_int(b);
        let len = script_int(len);
        if len < 1 || a_offs < 0 {
            return 0.0;
        }
        let (mut ia, mut len) = (a_offs as usize, len as usize);
        let mut sum = 0.0;

        if b_offs < 0 {
            let f: fn(f64) -> f64 = match b_offs {
                -1 => |v| v,
                -2 => |v| v * v,
                -3 => f64::abs,
                _ => return 0.0,
            };
            while len > 0 && ia < self.capacity() {
                let Some(run) = self.run(ia, len) else { break };
                sum += run.iter().map(|c| f(c.get())).sum::<f64>();
                ia += run.len();
                len -= run.len();
            }
            return sum;
        }

        let mut ib = b_offs as usize;
        while len > 0 && ia < self.capacity() && ib < self.capacity() {
            let Some(ra) = self.run(ia, len) else { break };
            let Some(rb) = self.run(ib, ra.len()) else { break };
            sum += ra.iter().zip(rb).map(|(x, y)| x.get() * y.get()).sum::<f64>();
            ia += rb.len();
            ib += rb.len();
            len -= rb.len();
        }
        sum
    }

    /// `mem_insert_shuffle(addr, len, value)`: shift the region up one cell,
    /// store `value` at the front, and return the value shifted out.
    pub fn insert_shuffle(&self, addr: f64, len: f64, value: f64) -> f64 {
        let offs = script_int(addr);
        let n = script_int(len);
        if offs < 0 || n < 1 || offs.saturating_add(n) > self.capacity() as i64 {
            return 0.0;
        }
        let last = self.resolve_index((offs + n - 1) as usize);
        if self.is_failure(last) {
            return 0.0;
        }
        let dropped = last.get();
        if n > 1 {
            self.copy(addr + 1.0, addr, (n - 1) as f64);
        }
        self.resolve_index(offs as usize).set(value);
        dropped
    }

    pub fn stats(&self) -> RamStats {
        let pages_allocated = self.pages.iter().filter(|s| s.get().is_some()).count();
        RamStats {
            pages_allocated,
            page_cap: self.pages.len(),
            page_size: self.page_size,
            bytes_in_use: pages_allocated * self.page_bytes(),
        }
    }
}

impl Drop for RamTable {
    fn drop(&mut self) {
        let bytes = self.stats().bytes_in_use;
        self.budget.release(bytes);
    }
}

/// Clamp a negative leading offset by skipping that many items.
/// Returns `(start, skip)` or `None` if nothing remains.
fn clamp_leading(offs: i64, count: usize) -> Option<(usize, usize)> {
    if offs >= 0 {
        return Some((offs as usize, 0));
    }
    let skip = offs.unsigned_abs();
    if skip >= count as u64 {
        None
    } else {
        Some((0, skip as usize))
    }
}

/// Owner of the shared memory budget and the global ("gmem") table.
pub struct RamRegistry {
    config: RamConfig,
    budget: Arc<MemoryBudget>,
    gmem: OnceLock<Arc<RamTable>>,
}

impl RamRegistry {
    pub fn new(config: RamConfig) -> Self {
        let budget = Arc::new(MemoryBudget::new(config.memory_limit_bytes));
        Self::with_budget(config, budget)
    }

    pub fn with_budget(config: RamConfig, budget: Arc<MemoryBudget>) -> Self {
        Self {
            config,
            budget,
            gmem: OnceLock::new(),
        }
    }

    pub fn budget(&self) -> &Arc<MemoryBudget> {
        &self.budget
    }

    pub fn config(&self) -> &RamConfig {
        &self.config
    }

    /// A fresh per-instance table charged against this registry's budget.
    pub fn new_table(&self) -> RamTable {
        RamTable::new(&self.config, Arc::clone(&self.budget))
    }

    /// The global table: `explicit` if the host supplied one, else this
    /// registry's default, created on first use.
    pub fn gmem(&self, explicit: Option<&Arc<RamTable>>) -> Arc<RamTable> {
        match explicit {
            Some(table) => Arc::clone(table),
            None => Arc::clone(self.gmem.get_or_init(|| Arc::new(self.new_table()))),
        }
    }
}
