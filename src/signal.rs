//! Signal subsystem (spec.md §4.6). Per-process handler table and
//! pending bitset; delivery builds a trampoline frame on the process's
//! own stack so the handler runs in user mode and returns via a
//! syscall. Priority rule: highest signal number first, one delivered
//! per dispatch iteration.

use crate::arch::x86::{ContextFrame, CONTEXT_FRAME_SIZE};
use crate::errno::{ERR_SEMANTIC, READ_INTERRUPTED};
use crate::param::{MAX_SIGNALS, MILLISECONDS_TICK};
use crate::proc::{ProcId, ProcState, ProcTable};
use crate::sleepq::SleepList;

/// `signal(pid, n)`. Sets the bit only if the target has a registered
/// handler; silently ignored otherwise. If the target is blocked in a
/// cancellable state, unblocks it with the documented return value.
///
/// `wait_queue_of` lets the caller locate and unlink the target from
/// whatever process it is waiting on, without this module needing to
/// reach into the whole process table's wait graph itself.
pub fn raise(
    table: &mut ProcTable,
    sleeping: &mut SleepList,
    target: ProcId,
    signal_num: u32,
) -> Result<(), ()> {
    if signal_num as usize >= MAX_SIGNALS {
        return Err(());
    }
    if table[target].signal_handlers[signal_num as usize] == 0 {
        return Ok(());
    }

    match table[target].state {
        ProcState::Sleep => {
            let ticks_left = sleeping.remove_early(table, target);
            table[target].return_value = (ticks_left * MILLISECONDS_TICK) as i32;
            table[target].state = ProcState::Ready;
        }
        ProcState::Wait => {
            if let Some(waited_on) = table[target].waiting_for.take() {
                let mut waiters = core::mem::take(&mut table[waited_on].wait_queue);
                waiters.remove(table, target);
                table[waited_on].wait_queue = waiters;
            }
            table[target].return_value = ERR_SEMANTIC;
            table[target].state = ProcState::Ready;
        }
        ProcState::Read => {
            if table[target].read_filled == 0 {
                table[target].return_value = READ_INTERRUPTED;
            } else {
                table[target].return_value = table[target].read_filled as i32;
            }
            table[target].state = ProcState::Ready;
            table[target].read_buffer = None;
        }
        _ => {}
    }

    table[target].pending_signals |= 1 << signal_num;
    Ok(())
}

/// `sighandler(pid, n, new, old)`: swap the handler, return the old one.
pub fn set_handler(
    table: &mut ProcTable,
    id: ProcId,
    signal_num: u32,
    new_handler: usize,
    max_addr: usize,
    hole: core::ops::Range<usize>,
) -> Result<usize, i32> {
    if signal_num as usize >= MAX_SIGNALS {
        return Err(-1);
    }
    if new_handler != 0 && (new_handler > max_addr || hole.contains(&new_handler)) {
        return Err(ERR_SEMANTIC);
    }
    let old = table[id].signal_handlers[signal_num as usize];
    table[id].signal_handlers[signal_num as usize] = new_handler;
    Ok(old)
}

/// Highest-numbered pending signal, if any, clearing its bit.
fn take_highest_pending(table: &mut ProcTable, id: ProcId) -> Option<u32> {
    let pending = table[id].pending_signals;
    if pending == 0 {
        return None;
    }
    let bit = 31 - pending.leading_zeros();
    table[id].pending_signals &= !(1 << bit);
    Some(bit)
}

/// Build a trampoline frame on `id`'s stack for its highest-priority
/// pending signal and splice it in as the process's new saved stack
/// pointer. No-op if nothing is pending or the process is already
/// inside a signal frame.
///
/// Frame layout (bottom to top, matching the original `setup_sigtramp`):
/// the process's old return value, then its old stack pointer (these
/// two scratch slots are what `sigreturn` reads back), then the handler
/// pointer and a null return address for the trampoline call, then a
/// full zeroed context frame pointing at `trampoline_entry`.
pub unsafe fn deliver_pending(
    table: &mut ProcTable,
    id: ProcId,
    trampoline_entry: usize,
    code_segment: u16,
) {
    if table[id].in_signal_frame {
        return;
    }
    let Some(signal_num) = take_highest_pending(table, id) else { return };
    let handler = table[id].signal_handlers[signal_num as usize];
    if handler == 0 {
        return;
    }

    let old_sp = table[id].saved_sp.expect("signaling a process with no stack");
    let old_ret = table[id].return_value;

    // Walk down from old_sp pushing words, matching the original's
    // pointer-decrement style exactly (stack grows down).
    let mut sp = old_sp as *mut usize;

    sp = sp.sub(1);
    core::ptr::write(sp, old_ret as usize);
    let saved_ret_slot = sp;

    sp = sp.sub(1);
    core::ptr::write(sp, old_sp as usize);
    let saved_sp_slot = sp;
    debug_assert_eq!(saved_sp_slot.add(1), saved_ret_slot);

    sp = sp.sub(1);
    core::ptr::write(sp, handler);

    sp = sp.sub(1);
    core::ptr::write(sp, 0); // null return address: trampoline must never fall through

    let frame_words = CONTEXT_FRAME_SIZE / core::mem::size_of::<usize>();
    sp = sp.sub(frame_words);
    let cf = sp as *mut ContextFrame;
    (*cf).edi = 0;
    (*cf).esi = 0;
    (*cf).ebx = 0;
    (*cf).edx = 0;
    (*cf).ecx = 0;
    (*cf).eax = 0;
    (*cf).iret_eip = trampoline_entry as u32;
    (*cf).iret_cs = code_segment as u32;
    (*cf).eflags = crate::param::STARTING_EFLAGS | crate::param::ARM_INTERRUPTS;
    (*cf).esp = sp as u32;
    (*cf).ebp = sp as u32;

    table[id].saved_sp = Some(sp as *mut u8);
    table[id].in_signal_frame = true;
}

/// `sigreturn(old_sp)`: restore the context the trampoline preempted.
/// The preserved return value sits one word above `old_sp`; the process
/// resumes with the stack pointer it had before the signal arrived.
pub unsafe fn sigreturn(table: &mut ProcTable, id: ProcId, old_sp: *mut u8) -> i32 {
    let slot = (old_sp as *mut usize).sub(1);
    let restored_return = core::ptr::read(slot) as i32;
    table[id].saved_sp = Some(old_sp);
    table[id].in_signal_frame = false;
    restored_return
}
