//! Named negative return codes. Kept as bare `i32`s returned straight to
//! user code, mirroring the way the teacher's syscalls return raw
//! integers rather than a wrapped `Result` — the ABI boundary to user
//! space is not a place to introduce `Result`.

/// `create()` found no free slot, or the allocator returned null.
pub const CREATE_FAILURE: i32 = -1;

/// `kill(pid, sig)`: no such pid.
pub const KILL_NO_SUCH_PID: i32 = -712;

/// `kill(pid, sig)`: signal number out of range.
pub const KILL_BAD_SIGNAL: i32 = -651;

/// `wait`/`sighandler`/device calls: generic failure / not found.
pub const ERR_GENERIC: i32 = -1;

/// `wait`/`kill_proc`/`sighandler`: semantic error (self-wait, self-kill,
/// bad handler address).
pub const ERR_SEMANTIC: i32 = -2;

/// `read` was interrupted by a signal while blocked with zero bytes
/// collected so far.
pub const READ_INTERRUPTED: i32 = -362;

/// A device method, or the DI layer, asks the dispatcher to suspend the
/// caller instead of returning a value now. Value matches the original
/// xeroskernel `BLOCK` constant.
pub const BLOCK: i32 = -6;
