//! Boot sequence (spec.md design notes: memory, then the dispatcher,
//! then trap vectors, then devices, then the first process, then idle).
//! Everything here assumes real hardware — there is no host-test
//! equivalent of "the machine has just reset" — so the whole module is
//! compiled only for the real target.

#![cfg(not(test))]

use crate::dispatch::{self, Kernel};
use crate::keyboard::KeyboardDevice;
use crate::param::{MILLISECONDS_TICK, PROC_STACK_MIN};

const TIMER_VECTOR: u32 = 0x20;
const KEYBOARD_VECTOR: u32 = 0x21;
const KEYBOARD_IRQ: u32 = 1;

/// Small assembly stubs the platform links in alongside the real
/// `contextswitch`: the synthetic "process fell off its own entry
/// point" return address, the signal trampoline's entry point, and the
/// two interrupt service routines that re-enter `contextswitch`'s
/// labeled entry points. None of these have meaningful Rust bodies —
/// they are glue, not logic — so they stay `extern "C"` rather than
/// being ported.
extern "C" {
    fn stop_trampoline();
    fn sigtramp_entry();
    fn timer_isr();
    fn keyboard_isr();
}

static mut KEYBOARD_DRIVER: KeyboardDevice = KeyboardDevice::new();

/// Bring up the kernel and hand control to the dispatcher. `entry` and
/// `stack_size` describe the first (root) user process; never returns.
pub fn boot(entry: usize, stack_size: usize) -> ! {
    console_init();
    log::info!("booting");

    let code_segment = crate::arch::get_cs();
    let mut kernel = Kernel::new(
        stop_trampoline as usize,
        code_segment,
        sigtramp_entry as usize,
    );

    let keyboard = unsafe { &mut *core::ptr::addr_of_mut!(KEYBOARD_DRIVER) };
    kernel.install_keyboard(keyboard);

    crate::arch::set_trap_vector(TIMER_VECTOR, timer_isr as usize);
    crate::arch::set_trap_vector(KEYBOARD_VECTOR, keyboard_isr as usize);
    crate::arch::init_pit(MILLISECONDS_TICK);
    crate::arch::enable_irq(KEYBOARD_IRQ, false);

    let idle_pid = kernel.create(idle_main as usize, PROC_STACK_MIN);
    kernel.idle = kernel.procs.find_by_pid(idle_pid as u32);
    let idle_id = kernel.idle.expect("idle process creation must succeed");
    kernel.ready.remove(&mut kernel.procs, idle_id);

    let root_pid = kernel.create(entry, stack_size);
    log::info!("root process created, pid={}", root_pid);

    dispatch::run(&mut kernel)
}

fn console_init() {
    crate::console::init(log::LevelFilter::Info);
}

/// Entry point for the idle process: spins yielding the CPU whenever
/// nothing else is runnable. `next()` only falls back to this process
/// when the ready queue is empty, so it never competes for real work.
extern "C" fn idle_main() -> ! {
    loop {
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
    }
}
