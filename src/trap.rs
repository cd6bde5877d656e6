//! Trap gateway (spec.md §4.1): the bidirectional crossing between a
//! process and the kernel. `contextswitch` resumes a process and blocks
//! (from the dispatcher's point of view) until that process re-enters
//! the kernel via a software trap or the timer, returning the decoded
//! reason.

use crate::arch::x86::{ContextFrame, CONTEXT_FRAME_SIZE};
use crate::proc::{ProcId, ProcTable};
use crate::syscall::{KEYBD_INT, TIMER_TICK};

/// Decoded outcome of one trap gateway crossing.
pub struct TrapEntry {
    pub request_code: i32,
    pub args_ptr: usize,
    pub is_timer: bool,
}

/// Resume `id`, then block until it traps back into the kernel.
///
/// A timer or keyboard trap is translated to its synthetic request code
/// (`TIMER_TICK`/`KEYBD_INT`); the interrupted process's real
/// accumulator value (its pending user-level return value) is preserved
/// in `return_value` rather than clobbered, per spec.md §4.1's contract
/// — neither hardware trap carries a meaningful request code of its own
/// the way a software trap's `eax` does.
#[cfg(not(test))]
pub fn contextswitch(table: &mut ProcTable, id: ProcId) -> TrapEntry {
    use crate::arch::x86;

    let p = &mut table[id];
    let sp = p.saved_sp.expect("resuming a process with no saved stack");
    let raw = unsafe { x86::contextswitch(sp, p.return_value) };

    if raw.is_timer {
        p.return_value = raw.request_code;
        TrapEntry { request_code: TIMER_TICK, args_ptr: raw.args_ptr, is_timer: true }
    } else if raw.is_keyboard {
        p.return_value = raw.request_code;
        TrapEntry { request_code: KEYBD_INT, args_ptr: raw.args_ptr, is_timer: false }
    } else {
        TrapEntry { request_code: raw.request_code, args_ptr: raw.args_ptr, is_timer: false }
    }
}

/// Host-test double: dispatch tests drive requests directly through
/// `dispatch::service` rather than a simulated CPU, so this is never
/// called in `cfg(test)` builds, but is kept so `dispatch.rs` stays free
/// of cfg noise.
#[cfg(test)]
pub fn contextswitch(_table: &mut ProcTable, _id: ProcId) -> TrapEntry {
    unreachable!("tests call dispatch::service directly instead of trapping through hardware")
}

/// Build the initial context frame for a brand-new process stack so
/// that resuming it for the first time behaves like returning from a
/// trap the process never actually took.
///
/// Layout and poisoning match the original `create()`: the whole frame
/// area is first filled with `STACK_FILL` (0xA5) for debuggability, then
/// `iret_eip`/`iret_cs`/`eflags` are set so the process starts executing
/// `entry` with the current code segment, and a synthetic return address
/// (`stop_trampoline`) is pushed just below the frame so a function that
/// falls off its own end traps cleanly into `sys_stop`.
pub unsafe fn build_initial_frame(
    stack_top: *mut u8,
    entry: usize,
    stop_trampoline: usize,
) -> *mut u8 {
    // Reserve one word below the frame for the synthetic return address,
    // then the frame itself, mirroring `top_of_stack - 8 - sizeof(frame)`.
    let sp = stack_top.sub(8 + CONTEXT_FRAME_SIZE);

    core::ptr::write_bytes(sp, crate::param::STACK_FILL, CONTEXT_FRAME_SIZE + 8);

    let ret_slot = sp.add(CONTEXT_FRAME_SIZE) as *mut usize;
    core::ptr::write(ret_slot, stop_trampoline);

    let cf = sp as *mut ContextFrame;
    (*cf).edi = 0;
    (*cf).esi = 0;
    (*cf).ebx = 0;
    (*cf).edx = 0;
    (*cf).ecx = 0;
    (*cf).eax = 0;
    (*cf).iret_eip = entry as u32;
    (*cf).iret_cs = crate::arch::get_cs() as u32;
    (*cf).eflags = crate::param::STARTING_EFLAGS | crate::param::ARM_INTERRUPTS;
    let frame_esp = sp as u32;
    (*cf).esp = frame_esp;
    (*cf).ebp = frame_esp;

    sp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_frame_stamps_entry_point_and_return_trampoline() {
        let mut buf = [0u8; 256];
        let stack_top = unsafe { buf.as_mut_ptr().add(buf.len()) };
        let entry = 0x1234usize;
        let stop_tramp = 0x5678usize;

        let sp = unsafe { build_initial_frame(stack_top, entry, stop_tramp) };
        let cf = sp as *const ContextFrame;

        unsafe {
            assert_eq!((*cf).iret_eip, entry as u32);
            assert_eq!((*cf).eflags & crate::param::ARM_INTERRUPTS, crate::param::ARM_INTERRUPTS);
            assert_eq!((*cf).esp, sp as u32);
            assert_eq!((*cf).ebp, sp as u32);

            let ret_slot = sp.add(CONTEXT_FRAME_SIZE) as *const usize;
            assert_eq!(*ret_slot, stop_tramp);
        }
    }
}
