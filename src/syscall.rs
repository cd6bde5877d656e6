//! Syscall numbering and the variadic-argument decoding convention
//! (spec.md §6). A process crosses into the kernel by loading a request
//! code into the accumulator and a pointer to its argument list into the
//! data register before taking the trap; this module is the one place
//! that agrees with user code on what those numbers and argument shapes
//! mean.

pub const CREATE: i32 = 1;
pub const YIELD: i32 = 2;
pub const STOP: i32 = 3;
pub const GETPID: i32 = 4;
pub const PUTS: i32 = 5;
pub const KILL_PROC: i32 = 6;
pub const SLEEP: i32 = 7;
pub const KILL: i32 = 8;
pub const GETCPUTIMES: i32 = 9;
pub const SIGHANDLER: i32 = 10;
pub const SIGRETURN: i32 = 11;
pub const WAIT: i32 = 12;
pub const OPEN: i32 = 13;
pub const CLOSE: i32 = 14;
pub const READ: i32 = 15;
pub const WRITE: i32 = 16;
pub const IOCTL: i32 = 17;

/// Synthetic request code the trap gateway substitutes for a timer
/// interrupt, so the dispatcher's request table can treat "my quantum
/// expired" exactly like any other request.
pub const TIMER_TICK: i32 = 1000;
/// Synthetic request code for a keyboard interrupt reaching the
/// dispatcher (as opposed to a process's own software trap).
pub const KEYBD_INT: i32 = 1001;

/// One argument slot read out of a process's variadic argument array.
/// Arguments are packed as `usize`-sized words starting at
/// `Proc::trap_args`; `nth` reads the word at that offset.
///
/// # Safety
/// `args_ptr` must point at a live argument array in process memory the
/// kernel is allowed to read for the duration of the call.
pub unsafe fn nth_arg(args_ptr: usize, n: usize) -> usize {
    let base = args_ptr as *const usize;
    core::ptr::read(base.add(n))
}

/// Decoded create-request arguments: entry point and requested stack size.
pub struct CreateArgs {
    pub entry: usize,
    pub stack_size: usize,
}

/// # Safety
/// See [`nth_arg`].
pub unsafe fn decode_create(args_ptr: usize) -> CreateArgs {
    CreateArgs { entry: nth_arg(args_ptr, 0), stack_size: nth_arg(args_ptr, 1) }
}
