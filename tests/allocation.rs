//! Teardown accounting under a counting allocator.
//!
//! Live bytes are tracked per thread so the harness's own threads do not
//! disturb the measurement.

use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::Cell,
    fs,
    path::Path,
};

use jshost::{HostConfig, SharedBuffer, State, Status};
use tempfile::tempdir;

struct Counting;

thread_local! {
    static LIVE_BYTES: Cell<isize> = const { Cell::new(0) };
}

fn adjust(delta: isize) {
    let _ = LIVE_BYTES.try_with(|live| live.set(live.get() + delta));
}

fn live_bytes() -> isize {
    LIVE_BYTES.with(Cell::get)
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            adjust(layout.size() as isize);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        adjust(-(layout.size() as isize));
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            adjust(new_size as isize - layout.size() as isize);
        }
        new_ptr
    }
}

#[global_allocator]
static ALLOCATOR: Counting = Counting;

fn mixed_session(dir: &Path) {
    let stdout = SharedBuffer::new();
    let stderr = SharedBuffer::new();
    let mut state = State::with_config(HostConfig::captured(stdout.clone(), stderr.clone()));

    assert_eq!(
        state.run_from_string(r#"var greeting = "hi"; print(greeting)"#),
        Status::Success
    );
    assert_eq!(state.run_from_string("print("), Status::Failure);
    assert_eq!(state.run_from_string("missing()"), Status::Failure);
    assert_eq!(state.run_from_file(dir.join("script.js")), Status::Success);
    assert_eq!(state.run_from_file(dir.join("absent.js")), Status::Failure);
    assert_eq!(
        state.run_from_string(
            r#"
            function outer() {
                var inner = function () { return 1; };
                return inner();
            }
            var calls = 0;
            while (calls < 100) { outer(); calls = calls + 1; }
            var ring = { name: "ring" };
            ring.next = { prev: ring };
            ring.self = ring;
            "#
        ),
        Status::Success
    );
    let too_deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    assert_eq!(state.run_from_string(&too_deep), Status::Failure);
    assert!(state.scratch_capacity() > 0);

    let held = live_bytes();
    state.destroy();
    assert!(live_bytes() < held, "destroy must release state memory");
}

#[test]
fn destroy_releases_everything_after_mixed_loads() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("script.js"),
        "function twice(x) { return x * 2; }\nprint(twice(21), eval(\"'nested'\"))\n",
    )
    .expect("write script");

    // First pass settles one-time allocations made by std and tracing.
    mixed_session(dir.path());

    let before = live_bytes();
    mixed_session(dir.path());
    assert_eq!(live_bytes(), before, "a session must not leak");
}
