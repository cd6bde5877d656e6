#![no_std]
#![no_main]

use skrtos::param::PROC_STACK_MIN;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    skrtos::kprintf!("kernel panic: {}\n", info);
    loop {
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}

/// The first process the dispatcher ever runs. A real image would point
/// this at a linked-in init program; this placeholder just proves the
/// dispatcher loop runs by yielding forever.
extern "C" fn root_main() -> ! {
    loop {
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
    }
}

#[no_mangle]
pub extern "C" fn _start() -> ! {
    skrtos::init::boot(root_main as usize, PROC_STACK_MIN)
}
