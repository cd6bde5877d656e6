//! The scheduler/dispatcher (spec.md §4.2). Owns the ready queue and is
//! the only module allowed to decide which process runs next. Mirrors
//! the original `dispatch()`'s big switch over request codes, but each
//! arm here returns instead of falling through, and the queue
//! manipulation goes through `queue::Queue` instead of raw pointer
//! splicing.

use crate::device::DeviceTable;
use crate::errno::{CREATE_FAILURE, ERR_GENERIC, ERR_SEMANTIC, KILL_BAD_SIGNAL, KILL_NO_SUCH_PID};
use crate::keyboard::KeyboardDevice;
use crate::mm;
use crate::param::{
    HOLE_END, HOLE_START, MAX_ADDR, MAX_PROC, MAX_PROC_DEVICES, MAX_SIGNALS, MILLISECONDS_TICK,
    NULL_DEVICE, PROC_STACK_MIN,
};
use crate::proc::{ProcId, ProcState, ProcTable};
use crate::queue::Queue;
use crate::signal;
use crate::sleepq::{ms_to_ticks, SleepList};
use crate::syscall::{self, CreateArgs};
use crate::trap;
use crate::{device, keyboard};

/// Everything the dispatcher needs across calls, gathered so a caller
/// doesn't have to thread six separate parameters through every request
/// handler.
pub struct Kernel {
    pub procs: ProcTable,
    pub ready: Queue,
    pub sleeping: SleepList,
    pub devices: DeviceTable,
    pub current: Option<ProcId>,
    pub idle: Option<ProcId>,
    pub stop_trampoline: usize,
    pub code_segment: u16,
    pub sigtramp_entry: usize,
    /// Raw pointer to the installed keyboard driver, kept alongside the
    /// device-table registration so the timer-interrupt-independent ISR
    /// path (`on_keyboard_interrupt`) can reach it without going through
    /// `DeviceTable`'s `fn`-pointer dispatch. Single-threaded kernel, so
    /// aliasing this for the life of the kernel is sound.
    pub keyboard: Option<*mut KeyboardDevice>,
}

/// Output of `get_cpu_times` (spec.md §6's `processStatuses`): parallel
/// fixed arrays filled for every non-stopped process slot, compacted
/// from index 0 (not aligned with internal table position), matching
/// the original `struct_ps`'s `pid`/`status`/`cpuTime` layout.
#[repr(C)]
pub struct ProcessStatuses {
    pub pid: [i32; MAX_PROC],
    pub state: [i32; MAX_PROC],
    pub cpu_time_ms: [i64; MAX_PROC],
}

impl Kernel {
    pub fn new(stop_trampoline: usize, code_segment: u16, sigtramp_entry: usize) -> Self {
        Kernel {
            procs: ProcTable::new(),
            ready: Queue::new(),
            sleeping: SleepList::new(),
            devices: DeviceTable::new(),
            current: None,
            idle: None,
            stop_trampoline,
            code_segment,
            sigtramp_entry,
            keyboard: None,
        }
    }

    pub fn install_keyboard(&mut self, driver: &'static mut KeyboardDevice) {
        let ptr = driver as *mut KeyboardDevice;
        self.keyboard = Some(ptr);
        keyboard::install(&mut self.devices, unsafe { &mut *ptr });
    }

    /// `create(entry, stack_size)`. Allocates a stack, builds its initial
    /// context frame, assigns a pid, and readies it. Returns the new pid
    /// or `CREATE_FAILURE` if the table is full or the allocation fails.
    pub fn create(&mut self, entry: usize, stack_size: usize) -> i32 {
        let Some(id) = self.procs.find_free_slot() else { return CREATE_FAILURE };
        let stack_len = stack_size.max(PROC_STACK_MIN);
        let stack_base = mm::allocate(stack_len);
        if stack_base.is_null() {
            return CREATE_FAILURE;
        }

        let stack_top = unsafe { stack_base.add(stack_len) };
        let sp = unsafe { trap::build_initial_frame(stack_top, entry, self.stop_trampoline) };

        let pid = self.procs.assign_pid(id);
        let p = &mut self.procs[id];
        p.saved_sp = Some(sp);
        p.stack_base = Some(stack_base);
        p.stack_len = stack_len;
        p.return_value = 0;
        p.cpu_ticks = 0;
        p.signal_handlers = [0; MAX_SIGNALS];
        p.pending_signals = 0;
        p.in_signal_frame = false;
        p.state = ProcState::Ready;

        self.ready.enqueue(&mut self.procs, id);
        pid as i32
    }

    /// Pick the next process to run: the ready queue, falling back to
    /// the idle process if nothing else is runnable.
    ///
    /// Idle-last policy (spec.md §4.2): if idle is at the head but a
    /// user process is also ready, idle is re-enqueued behind it instead
    /// of being allowed to run — idle only runs when it is the only
    /// thing on the queue, or the queue is empty.
    pub fn next(&mut self) -> ProcId {
        loop {
            let Some(id) = self.ready.dequeue(&mut self.procs) else {
                let idle = self.idle.expect("idle process must be created during boot");
                self.procs[idle].state = ProcState::Running;
                return idle;
            };
            if Some(id) == self.idle && !self.ready.is_empty() {
                self.ready.enqueue(&mut self.procs, id);
                continue;
            }
            self.procs[id].state = ProcState::Running;
            return id;
        }
    }

    fn ready_proc(&mut self, id: ProcId) {
        self.procs[id].state = ProcState::Ready;
        self.ready.enqueue(&mut self.procs, id);
    }

    fn stop(&mut self, id: ProcId) {
        let pid = p_pid(&self.procs, id);
        let p = &mut self.procs[id];
        p.state = ProcState::Stopped;
        if let Some(base) = p.stack_base.take() {
            mm::free(base);
        }
        p.saved_sp = None;

        // The queue of waiters lives inside the very table we need a
        // second mutable borrow of to drain it, so take it out first.
        let mut waiters = core::mem::take(&mut self.procs[id].wait_queue);
        while let Some(waiter) = waiters.dequeue(&mut self.procs) {
            self.procs[waiter].return_value = pid as i32;
            self.ready_proc(waiter);
        }
        self.procs[id].wait_queue = waiters;
    }

    /// Run the timer tick: wake anyone whose sleep expired and, if a
    /// keyboard byte satisfied the single blocked reader, ready it too.
    pub fn on_timer_tick(&mut self) {
        let woken = self.sleeping.tick(&mut self.procs);
        for id in woken.iter() {
            self.ready_proc(id);
        }
    }

    /// Service a keyboard interrupt: read the controller's status port,
    /// bail out if it has nothing ready (mirrors the original
    /// `keyboard_int_handler`'s `CONTROL_PORT`/`READY` check), otherwise
    /// pull the scan code off the data port and feed it to the driver. If
    /// that completes the blocked reader's request, ready that process.
    pub fn on_keyboard_interrupt(&mut self) {
        let status = crate::arch::inb(keyboard::KEYBOARD_CONTROL_PORT);
        if status & keyboard::KEYBOARD_READY_BIT == 0 {
            return;
        }
        let scan_code = crate::arch::inb(keyboard::KEYBOARD_DATA_PORT);
        let Some(ptr) = self.keyboard else { return };
        let driver = unsafe { &mut *ptr };
        driver.notify_incoming_intr(scan_code);
        if let Some(id) = driver.take_satisfied_reader(&mut self.procs) {
            self.ready_proc(id);
        }
    }

    /// Handle one request from `id`. Returns the process that should run
    /// next: usually `id` itself (syscalls that complete immediately
    /// don't force a reschedule), but `YIELD`, `STOP`, `SLEEP`, `WAIT`,
    /// and a blocking `READ` always pick a fresh process via `next()`.
    pub fn service(&mut self, id: ProcId, request_code: i32, args_ptr: usize) -> ProcId {
        match request_code {
            syscall::CREATE => {
                let CreateArgs { entry, stack_size } = unsafe { syscall::decode_create(args_ptr) };
                self.procs[id].return_value = self.create(entry, stack_size);
                id
            }
            syscall::YIELD => {
                self.procs[id].return_value = 0;
                self.ready_proc(id);
                self.next()
            }
            syscall::STOP => {
                self.stop(id);
                self.next()
            }
            syscall::GETPID => {
                self.procs[id].return_value = p_pid(&self.procs, id) as i32;
                id
            }
            syscall::PUTS => {
                self.procs[id].return_value = 0;
                id
            }
            syscall::SLEEP => {
                let ms = unsafe { syscall::nth_arg(args_ptr, 0) } as u32;
                let ticks = ms_to_ticks(ms);
                if ticks == 0 {
                    self.procs[id].return_value = 0;
                    self.ready_proc(id);
                } else {
                    self.procs[id].state = ProcState::Sleep;
                    self.sleeping.insert(&mut self.procs, id, ticks);
                }
                self.next()
            }
            syscall::KILL => {
                let target_pid = unsafe { syscall::nth_arg(args_ptr, 0) } as u32;
                let signal_num = unsafe { syscall::nth_arg(args_ptr, 1) } as u32;
                self.procs[id].return_value = self.kill(target_pid, signal_num);
                id
            }
            syscall::KILL_PROC => {
                let target_pid = unsafe { syscall::nth_arg(args_ptr, 0) } as u32;
                self.procs[id].return_value = self.kill_proc(id, target_pid);
                id
            }
            syscall::GETCPUTIMES => {
                let ps = unsafe { syscall::nth_arg(args_ptr, 0) } as *mut ProcessStatuses;
                self.procs[id].return_value = self.get_cpu_times(id, ps);
                id
            }
            syscall::SIGHANDLER => {
                let signal_num = unsafe { syscall::nth_arg(args_ptr, 0) } as u32;
                let new_handler = unsafe { syscall::nth_arg(args_ptr, 1) };
                let old_slot = unsafe { syscall::nth_arg(args_ptr, 2) } as *mut usize;
                match signal::set_handler(
                    &mut self.procs,
                    id,
                    signal_num,
                    new_handler,
                    MAX_ADDR,
                    HOLE_START..HOLE_END,
                ) {
                    Ok(old) => {
                        if !old_slot.is_null() {
                            unsafe { core::ptr::write(old_slot, old) };
                        }
                        self.procs[id].return_value = 0;
                    }
                    Err(code) => self.procs[id].return_value = code,
                }
                id
            }
            syscall::SIGRETURN => {
                let old_sp = unsafe { syscall::nth_arg(args_ptr, 0) } as *mut u8;
                self.procs[id].return_value = unsafe { signal::sigreturn(&mut self.procs, id, old_sp) };
                id
            }
            syscall::WAIT => {
                let target_pid = unsafe { syscall::nth_arg(args_ptr, 0) } as u32;
                match self.procs.find_by_pid(target_pid) {
                    Some(target) if target != id => {
                        self.procs[id].state = ProcState::Wait;
                        self.procs[id].waiting_for = Some(target);
                        let mut waiters = core::mem::take(&mut self.procs[target].wait_queue);
                        waiters.enqueue(&mut self.procs, id);
                        self.procs[target].wait_queue = waiters;
                        self.next()
                    }
                    _ => {
                        self.procs[id].return_value = KILL_NO_SUCH_PID;
                        id
                    }
                }
            }
            syscall::OPEN => {
                let device_no = unsafe { syscall::nth_arg(args_ptr, 0) } as i32;
                self.procs[id].return_value = device::open(&mut self.procs, &self.devices, id, device_no);
                id
            }
            syscall::CLOSE => {
                let fd = unsafe { syscall::nth_arg(args_ptr, 0) } as i32;
                self.procs[id].return_value = device::close(&mut self.procs, &self.devices, id, fd);
                id
            }
            syscall::READ => {
                let fd = unsafe { syscall::nth_arg(args_ptr, 0) } as i32;
                let buf = unsafe { syscall::nth_arg(args_ptr, 1) } as *mut u8;
                let len = unsafe { syscall::nth_arg(args_ptr, 2) };
                let rc = device::read(&mut self.procs, &self.devices, id, fd, buf, len);
                if rc == crate::errno::BLOCK {
                    self.next()
                } else {
                    self.procs[id].return_value = rc;
                    id
                }
            }
            syscall::WRITE => {
                let fd = unsafe { syscall::nth_arg(args_ptr, 0) } as i32;
                let buf = unsafe { syscall::nth_arg(args_ptr, 1) } as *const u8;
                let len = unsafe { syscall::nth_arg(args_ptr, 2) };
                self.procs[id].return_value = device::write(&mut self.procs, &self.devices, id, fd, buf, len);
                id
            }
            syscall::IOCTL => {
                let fd = unsafe { syscall::nth_arg(args_ptr, 0) } as i32;
                let cmd = unsafe { syscall::nth_arg(args_ptr, 1) } as u32;
                let extra = unsafe { syscall::nth_arg(args_ptr, 2) };
                self.procs[id].return_value = device::ioctl(&mut self.procs, &self.devices, id, fd, cmd, extra);
                id
            }
            syscall::TIMER_TICK => {
                self.procs[id].cpu_ticks += 1;
                self.on_timer_tick();
                self.ready_proc(id);
                self.next()
            }
            syscall::KEYBD_INT => {
                // Same process resumes: a keyboard interrupt never
                // reschedules on its own, only readying whichever
                // process it may have satisfied a blocked read for.
                self.on_keyboard_interrupt();
                id
            }
            _ => {
                // Unknown request code: treat like the original's
                // catch-all, hand the caller a generic error rather
                // than crash the kernel over a malformed trap.
                self.procs[id].return_value = ERR_GENERIC;
                id
            }
        }
    }

    fn kill(&mut self, target_pid: u32, signal_num: u32) -> i32 {
        let Some(target) = self.procs.find_by_pid(target_pid) else {
            return KILL_NO_SUCH_PID;
        };
        let was_blocked = matches!(
            self.procs[target].state,
            ProcState::Sleep | ProcState::Wait | ProcState::Read
        );
        match signal::raise(&mut self.procs, &mut self.sleeping, target, signal_num) {
            Ok(()) => {
                if was_blocked && self.procs[target].state == ProcState::Ready {
                    self.ready.enqueue(&mut self.procs, target);
                }
                0
            }
            Err(()) => KILL_BAD_SIGNAL,
        }
    }

    /// `kill_proc(pid)`: force-terminate `target_pid` outright, unlike
    /// `kill` which only raises a signal. Grounded on the original
    /// `disp.c`'s `kill(currP, pid)` (confusingly named the same as the
    /// signal-raising syscall in the original, but a distinct operation).
    /// Unlike that original, this reuses `stop()` to finish the job,
    /// which wakes the target's own waiters — the original's `kill()`
    /// leaves them stranded forever, which reads as an omission rather
    /// than an intentional difference from its own `stop()`.
    fn kill_proc(&mut self, caller: ProcId, target_pid: u32) -> i32 {
        if p_pid(&self.procs, caller) == target_pid {
            return ERR_SEMANTIC;
        }
        let Some(target) = self.procs.find_by_pid(target_pid) else { return ERR_GENERIC };

        match self.procs[target].state {
            ProcState::Sleep => {
                self.sleeping.remove_early(&mut self.procs, target);
            }
            ProcState::Ready => self.ready.remove(&mut self.procs, target),
            ProcState::Wait => {
                if let Some(waited_on) = self.procs[target].waiting_for {
                    let mut waiters = core::mem::take(&mut self.procs[waited_on].wait_queue);
                    waiters.remove(&mut self.procs, target);
                    self.procs[waited_on].wait_queue = waiters;
                }
            }
            ProcState::Read => {
                if let Some(ptr) = self.keyboard {
                    unsafe { (*ptr).forget_reader(target) };
                }
            }
            _ => {}
        }

        for fd in 0..MAX_PROC_DEVICES as i32 {
            if self.procs[target].fd_table[fd as usize] != NULL_DEVICE {
                device::close(&mut self.procs, &self.devices, target, fd);
            }
        }

        self.stop(target);
        0
    }

    /// `get_cpu_times(ps)` / the original's `getCPUtimes`: fill `ps`'s
    /// three parallel arrays with one entry per non-stopped process,
    /// compacted from index 0, reporting the caller's own slot as
    /// `Running` regardless of its bookkeeping state. Returns the index
    /// of the last entry filled (so `-1` means zero processes, which
    /// never actually happens since the caller itself always counts),
    /// or `ERR_GENERIC`/`ERR_SEMANTIC` if `ps` overlaps the hole or runs
    /// past the top of memory.
    fn get_cpu_times(&mut self, caller: ProcId, ps: *mut ProcessStatuses) -> i32 {
        let addr = ps as usize;
        if addr >= HOLE_START && addr < HOLE_END {
            return ERR_GENERIC;
        }
        let size = core::mem::size_of::<ProcessStatuses>();
        match addr.checked_add(size) {
            Some(end) if end <= MAX_ADDR => {}
            _ => return ERR_SEMANTIC,
        }

        let mut filled: i32 = -1;
        for slot in self.procs.iter_ids() {
            if self.procs[slot].is_stopped() {
                continue;
            }
            filled += 1;
            let idx = filled as usize;
            let state = if slot == caller { ProcState::Running } else { self.procs[slot].state };
            unsafe {
                (*ps).pid[idx] = self.procs[slot].pid as i32;
                (*ps).state[idx] = state.wire_code();
                (*ps).cpu_time_ms[idx] =
                    self.procs[slot].cpu_ticks as i64 * MILLISECONDS_TICK as i64;
            }
        }
        filled
    }

    /// Deliver any pending signal to `id` before it resumes, if it isn't
    /// already inside one. Called by the main loop right before
    /// `trap::contextswitch`.
    pub fn deliver_signals(&mut self, id: ProcId) {
        unsafe {
            signal::deliver_pending(&mut self.procs, id, self.sigtramp_entry, self.code_segment);
        }
    }
}

fn p_pid(table: &ProcTable, id: ProcId) -> u32 {
    table[id].pid
}

/// The real boot-time main loop: resume a process, handle whatever it
/// trapped on, pick the next one, repeat forever. Never returns.
#[cfg(not(test))]
pub fn run(kernel: &mut Kernel) -> ! {
    let mut current = kernel.next();
    loop {
        kernel.deliver_signals(current);
        let trap_entry = trap::contextswitch(&mut kernel.procs, current);
        kernel.procs[current].trap_args = trap_entry.args_ptr;
        current = kernel.service(current, trap_entry.request_code, trap_entry.args_ptr);
        if trap_entry.is_timer || trap_entry.request_code == syscall::KEYBD_INT {
            crate::arch::end_of_interrupt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_kernel() -> Kernel {
        let mut k = Kernel::new(0xDEAD_0000, 0x08, 0xBEEF_0000);
        let idle_pid = k.create(0x1000, PROC_STACK_MIN);
        assert!(idle_pid > 0);
        k.idle = k.procs.find_by_pid(idle_pid as u32);
        // the idle slot must not also sit on the ready queue
        k.ready.remove(&mut k.procs, k.idle.unwrap());
        k.procs[k.idle.unwrap()].state = ProcState::Ready;
        k
    }

    #[test]
    fn create_assigns_pid_and_enqueues_ready() {
        let mut k = new_kernel();
        let pid = k.create(0x2000, PROC_STACK_MIN);
        assert!(pid > 0);
        let id = k.procs.find_by_pid(pid as u32).unwrap();
        assert_eq!(k.procs[id].state, ProcState::Ready);
    }

    #[test]
    fn yield_reenqueues_caller_and_picks_next() {
        let mut k = new_kernel();
        let a = k.create(0x2000, PROC_STACK_MIN);
        let b = k.create(0x3000, PROC_STACK_MIN);
        let a_id = k.procs.find_by_pid(a as u32).unwrap();
        let b_id = k.procs.find_by_pid(b as u32).unwrap();
        // simulate `a` having been dequeued to become the running process
        k.ready.remove(&mut k.procs, a_id);

        let next = k.service(a_id, syscall::YIELD, 0);
        assert_eq!(next, b_id);
        assert_eq!(k.procs[a_id].state, ProcState::Ready);
    }

    #[test]
    fn stop_wakes_waiters_with_pid() {
        let mut k = new_kernel();
        let child_pid = k.create(0x2000, PROC_STACK_MIN);
        let child = k.procs.find_by_pid(child_pid as u32).unwrap();
        let parent_pid = k.create(0x3000, PROC_STACK_MIN);
        let parent = k.procs.find_by_pid(parent_pid as u32).unwrap();
        k.ready.remove(&mut k.procs, parent);

        let args = [child_pid as usize];
        k.service(parent, syscall::WAIT, args.as_ptr() as usize);
        assert_eq!(k.procs[parent].state, ProcState::Wait);

        k.service(child, syscall::STOP, 0);
        assert_eq!(k.procs[parent].state, ProcState::Ready);
        assert_eq!(k.procs[parent].return_value, child_pid);
    }

    #[test]
    fn sleep_removes_caller_from_running_and_wakes_after_ticks() {
        let mut k = new_kernel();
        let pid = k.create(0x2000, PROC_STACK_MIN);
        let id = k.procs.find_by_pid(pid as u32).unwrap();
        k.ready.remove(&mut k.procs, id);

        let args = [50usize]; // 50ms
        let next = k.service(id, syscall::SLEEP, args.as_ptr() as usize);
        assert_eq!(k.procs[id].state, ProcState::Sleep);
        assert_eq!(next, k.idle.unwrap());

        for _ in 0..5 {
            k.on_timer_tick();
        }
        assert_eq!(k.procs[id].state, ProcState::Ready);
        assert_eq!(k.procs[id].return_value, 0);
    }

    #[test]
    fn kill_with_no_handler_is_silently_accepted_but_does_nothing() {
        let mut k = new_kernel();
        let pid = k.create(0x2000, PROC_STACK_MIN);
        let id = k.procs.find_by_pid(pid as u32).unwrap();

        let args = [pid as usize, 5usize];
        let caller = k.idle.unwrap();
        k.service(caller, syscall::KILL, args.as_ptr() as usize);
        assert_eq!(k.procs[id].pending_signals, 0);
    }

    #[test]
    fn kill_unknown_pid_reports_no_such_pid() {
        let mut k = new_kernel();
        let caller = k.idle.unwrap();
        let args = [999usize, 1usize];
        k.service(caller, syscall::KILL, args.as_ptr() as usize);
        assert_eq!(k.procs[caller].return_value, KILL_NO_SUCH_PID);
    }

    #[test]
    fn kill_proc_rejects_self_kill() {
        let mut k = new_kernel();
        let pid = k.create(0x2000, PROC_STACK_MIN);
        let id = k.procs.find_by_pid(pid as u32).unwrap();
        let args = [pid as usize];
        k.service(id, syscall::KILL_PROC, args.as_ptr() as usize);
        assert_eq!(k.procs[id].return_value, ERR_SEMANTIC);
    }

    #[test]
    fn kill_proc_unknown_pid_is_generic_error() {
        let mut k = new_kernel();
        let caller = k.idle.unwrap();
        let args = [999usize];
        k.service(caller, syscall::KILL_PROC, args.as_ptr() as usize);
        assert_eq!(k.procs[caller].return_value, ERR_GENERIC);
    }

    #[test]
    fn kill_proc_removes_ready_target_and_wakes_its_waiters() {
        let mut k = new_kernel();
        let target_pid = k.create(0x2000, PROC_STACK_MIN);
        let target = k.procs.find_by_pid(target_pid as u32).unwrap();
        let waiter_pid = k.create(0x3000, PROC_STACK_MIN);
        let waiter = k.procs.find_by_pid(waiter_pid as u32).unwrap();
        k.ready.remove(&mut k.procs, waiter);
        let wait_args = [target_pid as usize];
        k.service(waiter, syscall::WAIT, wait_args.as_ptr() as usize);

        let caller = k.idle.unwrap();
        let args = [target_pid as usize];
        k.service(caller, syscall::KILL_PROC, args.as_ptr() as usize);

        assert_eq!(k.procs[caller].return_value, 0);
        assert_eq!(k.procs[target].state, ProcState::Stopped);
        assert_eq!(k.procs[waiter].state, ProcState::Ready);
        assert_eq!(k.procs[waiter].return_value, target_pid);
    }

    #[test]
    fn kill_proc_unlinks_a_sleeping_target() {
        let mut k = new_kernel();
        let pid = k.create(0x2000, PROC_STACK_MIN);
        let id = k.procs.find_by_pid(pid as u32).unwrap();
        k.ready.remove(&mut k.procs, id);
        let sleep_args = [1000usize];
        k.service(id, syscall::SLEEP, sleep_args.as_ptr() as usize);
        assert_eq!(k.procs[id].state, ProcState::Sleep);

        let caller = k.idle.unwrap();
        let args = [pid as usize];
        k.service(caller, syscall::KILL_PROC, args.as_ptr() as usize);
        assert_eq!(k.procs[id].state, ProcState::Stopped);
        assert!(k.sleeping.is_empty());
    }

    #[test]
    fn get_cpu_times_reports_caller_as_running_and_compacts_slots() {
        let mut k = new_kernel();
        let pid = k.create(0x2000, PROC_STACK_MIN);
        let id = k.procs.find_by_pid(pid as u32).unwrap();
        k.ready.remove(&mut k.procs, id);
        k.procs[id].state = ProcState::Sleep;

        let mut ps = core::mem::MaybeUninit::<ProcessStatuses>::zeroed();
        let args = [ps.as_mut_ptr() as usize];
        let returned_id = k.service(id, syscall::GETCPUTIMES, args.as_ptr() as usize);
        assert_eq!(returned_id, id);
        let rc = k.procs[id].return_value;
        assert!(rc >= 1); // at least idle + this process

        let ps = unsafe { ps.assume_init() };
        let self_slot = ps.pid.iter().position(|&p| p == pid).unwrap();
        assert_eq!(ps.state[self_slot], ProcState::Running.wire_code());
    }

    #[test]
    fn get_cpu_times_rejects_pointer_inside_the_hole() {
        let mut k = new_kernel();
        let caller = k.idle.unwrap();
        let args = [HOLE_START];
        k.service(caller, syscall::GETCPUTIMES, args.as_ptr() as usize);
        assert_eq!(k.procs[caller].return_value, ERR_GENERIC);
    }
}
