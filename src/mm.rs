//! The physical memory allocator boundary. Out of scope per spec.md §1:
//! the kernel only ever calls `allocate`/`free` and never looks inside.
//!
//! On the real target these are `extern "C"` symbols supplied by the
//! allocator the spec explicitly excludes from this crate. For host
//! unit tests there is no such allocator linked in, so `cfg(test)` backs
//! them with a tiny bump-leak pool — good enough to exercise `create()`
//! and friends without pulling the real allocator into this repo.

#[cfg(not(test))]
extern "C" {
    #[link_name = "allocate"]
    fn ffi_allocate(n: usize) -> *mut u8;
    #[link_name = "free"]
    fn ffi_free(ptr: *mut u8);
}

/// Request `n` bytes. Returns null on exhaustion, exactly like the
/// external allocator's contract.
pub fn allocate(n: usize) -> *mut u8 {
    #[cfg(not(test))]
    unsafe {
        ffi_allocate(n)
    }
    #[cfg(test)]
    {
        test_pool::allocate(n)
    }
}

pub fn free(ptr: *mut u8) {
    #[cfg(not(test))]
    unsafe {
        ffi_free(ptr)
    }
    #[cfg(test)]
    {
        test_pool::free(ptr)
    }
}

#[cfg(test)]
mod test_pool {
    use std::alloc::{alloc, dealloc, Layout};
    use std::collections::HashMap;
    use std::sync::Mutex;

    static LAYOUTS: Mutex<Option<HashMap<usize, Layout>>> = Mutex::new(None);

    pub fn allocate(n: usize) -> *mut u8 {
        let layout = Layout::from_size_align(n.max(1), 16).unwrap();
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            return ptr;
        }
        let mut guard = LAYOUTS.lock().unwrap();
        guard.get_or_insert_with(HashMap::new).insert(ptr as usize, layout);
        ptr
    }

    pub fn free(ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let mut guard = LAYOUTS.lock().unwrap();
        if let Some(layout) = guard.get_or_insert_with(HashMap::new).remove(&(ptr as usize)) {
            unsafe { dealloc(ptr, layout) };
        }
    }
}
