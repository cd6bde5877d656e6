//! Kernel-wide tuning constants. Mirrors the teacher's flat `param.rs`
//! convention: one place every other module pulls sizing knobs from.

/// Size of the fixed process table.
pub const MAX_PROC: usize = 64;

/// Number of distinct signal numbers, and width of a process's pending mask.
pub const MAX_SIGNALS: usize = 32;

/// Per-process open file descriptor slots.
pub const MAX_PROC_DEVICES: usize = 4;

/// Number of device records in the kernel device table (two keyboard
/// personalities).
pub const MAX_KERN_DEVICES: usize = 2;

/// Sentinel stored in a process's fd table for a closed slot.
pub const NULL_DEVICE: i32 = -1;

/// Floor applied to a requested process stack size.
pub const PROC_STACK_MIN: usize = 16 * 1024;

/// Length of the timer quantum in milliseconds.
pub const MILLISECONDS_TICK: u32 = 10;

/// Byte the context-frame allocator pre-fills a new stack with, to make
/// uninitialized-stack bugs visible under a debugger.
pub const STACK_FILL: u8 = 0xA5;

/// Starting EFLAGS image for a freshly built context frame (interrupt
/// flag cleared; armed explicitly by whoever wants the frame to run with
/// interrupts enabled).
pub const STARTING_EFLAGS: u32 = 0x0000_3000;

/// ORed into `STARTING_EFLAGS` for any frame meant to execute with
/// interrupts enabled (the IF bit).
pub const ARM_INTERRUPTS: u32 = 0x0000_0200;

/// Kernel ring buffer size for buffered-but-unread keyboard input.
pub const KEYBOARD_RING_SIZE: usize = 256;

/// Highest legal ASCII value accepted for an EOF byte via ioctl.
pub const MAX_ASCII: u8 = 0x7f;

/// Ceiling address for user-supplied buffers and signal handlers
/// (spec.md §6). This crate models a flat address space with no real
/// physical memory limit, so the ceiling is the type's own maximum.
pub const MAX_ADDR: usize = usize::MAX;

/// The kernel's reserved memory-hole region (the classic PC 640KiB-1MiB
/// hole) that user buffers and signal handlers may never overlap.
pub const HOLE_START: usize = 0x000A_0000;
pub const HOLE_END: usize = 0x0010_0000;
