//! The machine-specific half of the trap gateway (spec.md §4.1, §9
//! "Assembly trap gateway"). Register save/restore and the synthetic
//! "interrupted return" are intrinsically tied to the x86 calling
//! convention and the `iret` instruction, so they live in one small,
//! heavily commented module instead of being abstracted further.
//!
//! Grounded in the teacher's pattern of a single Rust function wrapping
//! one big inline `asm!` block (see `proc.rs`'s use of
//! `core::arch::asm!("wfi")` and, in the original C, `ctsw.c`'s
//! `contextswitch`), rather than a separate `.S` file — this kernel has
//! exactly three entry points (software trap, timer, keyboard) so one
//! block suffices.

use core::mem::size_of;

/// What the set of pushed registers looks like on the stack, pushed by
/// the gateway on entry and popped on the way back to user code. Field
/// order matches the real push/pop order and is load-bearing.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct ContextFrame {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub iret_eip: u32,
    pub iret_cs: u32,
    pub eflags: u32,
}

pub const CONTEXT_FRAME_SIZE: usize = size_of::<ContextFrame>();

/// Kernel stack used while servicing a trap; swapped in for the
/// duration of `contextswitch` and swapped back out before `resume`.
static mut KERNEL_ESP: usize = 0;

/// Outcome of one gateway crossing: the request code placed in the
/// accumulator register, the pointer to the variadic argument list in
/// the data register, and which of the three entry points produced it.
pub struct TrapEntry {
    pub request_code: i32,
    pub args_ptr: usize,
    pub is_timer: bool,
    pub is_keyboard: bool,
}

/// Resume `process_sp` (the process's saved stack pointer), delivering
/// `return_value` into the slot its `eax` will be popped from, and block
/// until the next trap (software or timer) re-enters the kernel.
///
/// Contract (spec.md §4.1): on entry, interrupts are disabled until this
/// function returns; re-arming them for hardware traps is the caller's
/// job via `arch::end_of_interrupt`, *after* this returns, so that the
/// PIC isn't told "done" before the dispatcher has re-read the reason.
#[cfg(all(target_arch = "x86", not(test)))]
pub unsafe fn contextswitch(process_sp: *mut u8, return_value: i32) -> TrapEntry {
    use core::arch::asm;

    let mut request_code: i32;
    let mut args: usize;
    let mut timer_flag: u32;
    let mut new_process_sp: usize;

    asm!(
        // Stash where the process's eax (the return value slot) sits:
        // it's the 8th pushed dword (after edi,esi,ebp,esp,ebx,edx,ecx).
        "mov {kesp}, esp",
        "mov esp, {psp}",
        "mov [esp + 28], {retval:e}",
        "popa",
        "iret",

        "_timer_entry_point:",
        "cli",
        "pusha",
        "mov ecx, 1",
        "jmp 2f",
        "_keyboard_entry_point:",
        "cli",
        "pusha",
        "mov ecx, 2",
        "jmp 2f",
        "_kernel_entry_point:",
        "cli",
        "pusha",
        "mov ecx, 0",
        "2:",
        "mov ebx, eax",
        "mov eax, {kesp}",
        "mov {kesp}, esp",
        "mov esp, eax",
        "mov [esp + 28], ebx",
        "mov [esp + 24], ecx",
        "mov [esp + 20], edx",
        "popa",
        "popf",

        kesp = inout(reg) KERNEL_ESP,
        psp = in(reg) process_sp as usize,
        retval = in(reg) return_value,
        out("eax") request_code,
        out("edx") args,
        out("ecx") timer_flag,
        options(nostack),
    );

    new_process_sp = KERNEL_ESP;
    let _ = new_process_sp;

    TrapEntry {
        request_code,
        args_ptr: args,
        is_timer: timer_flag == 1,
        is_keyboard: timer_flag == 2,
    }
}

/// Host-test stand-in: there is no real CPU to trap from, so tests drive
/// the dispatcher by calling its request-handling logic directly rather
/// than through this function. Kept so `trap.rs` compiles uniformly.
#[cfg(any(not(target_arch = "x86"), test))]
pub unsafe fn contextswitch(_process_sp: *mut u8, _return_value: i32) -> TrapEntry {
    unimplemented!("contextswitch requires real x86 hardware; dispatch logic is tested directly")
}
