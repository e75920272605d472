//! The transform entry points run on an audio thread, so once a plan and
//! its page exist, `mdct`/`imdct` must not allocate. A counting allocator
//! wraps the system one for this test binary only.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use eel_core::natives;
use eel_core::{RamConfig, RamRegistry, TransformCache};

struct CountingAlloc;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|c| c.set(c.get() + 1));
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOCATOR: CountingAlloc = CountingAlloc;

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

#[test]
fn test_warm_transform_does_not_allocate() {
    let registry = RamRegistry::new(RamConfig::default());
    let ram = registry.new_table();
    let cache = TransformCache::new();

    let values: Vec<f64> = (0..4096).map(|i| (i as f64 * 0.01).sin()).collect();
    natives::mem_set_values(&ram, 0.0, &values);
    for n in [64.0, 256.0, 4096.0] {
        natives::mdct(&ram, &cache, 0.0, n);
        natives::imdct(&ram, &cache, 0.0, n);
    }
    natives::mdct(&ram, &cache, 0.0, 100.0);

    let before = allocations();
    for n in [64.0, 256.0, 4096.0] {
        natives::mdct(&ram, &cache, 0.0, n);
        natives::imdct(&ram, &cache, 0.0, n);
    }
    natives::mdct(&ram, &cache, 0.0, 100.0);
    assert_eq!(allocations(), before);
}
