//! Process table & descriptor (spec.md §3, §4.3, §4.4).

use core::ops::{Index, IndexMut};

use crate::param::{MAX_PROC, MAX_PROC_DEVICES, MAX_SIGNALS, NULL_DEVICE};
use crate::queue::Queue;

/// Index into the fixed process table. Distinct from a `pid`: a slot is
/// reused across many pids over the table's lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcId(u32);

impl ProcId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn from_index(i: usize) -> Self {
        debug_assert!(i < MAX_PROC);
        ProcId(i as u32)
    }

    /// Slot a given pid lives in, per spec.md's invariant
    /// `(pid - 1) mod N == slot index`.
    pub fn from_pid(pid: u32) -> Self {
        ProcId(((pid - 1) as usize % MAX_PROC) as u32)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcState {
    Stopped,
    Ready,
    Running,
    Sleep,
    Wait,
    Read,
    BlockedSend,
    BlockedRecv,
}

impl ProcState {
    /// Status code written into `get_cpu_times`'s output array, matching
    /// the original `xeroskernel.h`'s `STATE_*` numbering so a userland
    /// `processStatuses` consumer sees the same values it always has.
    /// `BlockedSend`/`BlockedRecv` are never actually entered (see
    /// DESIGN.md) but are given distinct numbers rather than panicking.
    pub fn wire_code(self) -> i32 {
        match self {
            ProcState::Stopped => 0,
            ProcState::Ready => 1,
            ProcState::Sleep => 22,
            ProcState::Running => 23,
            ProcState::Wait => 24,
            ProcState::Read => 25,
            ProcState::BlockedSend => 26,
            ProcState::BlockedRecv => 27,
        }
    }
}

/// One process's descriptor. `prev`/`next` realize queue membership per
/// `queue::Queue`; a descriptor belongs to at most one queue at a time.
pub struct Proc {
    pub pid: u32,
    pub state: ProcState,

    /// Saved stack pointer — top of the context frame, in process
    /// address space. `None` while `Stopped`.
    pub saved_sp: Option<*mut u8>,
    /// Owning pointer to the stack allocation. `None` while `Stopped`.
    pub stack_base: Option<*mut u8>,
    pub stack_len: usize,

    /// Pointer into the process stack where the trap-time variadic
    /// argument list begins.
    pub trap_args: usize,
    /// Value delivered back to the process on resume.
    pub return_value: i32,
    pub cpu_ticks: u64,

    pub signal_handlers: [usize; MAX_SIGNALS],
    pub pending_signals: u32,
    pub in_signal_frame: bool,

    /// Valid only while `state == Sleep`: ticks past the previous
    /// sleeper in the delta list.
    pub sleep_delta: i64,

    /// Valid only while `state == Read`: the reader's buffer and how
    /// many bytes have already been filled.
    pub read_buffer: Option<*mut u8>,
    pub read_len: usize,
    pub read_filled: usize,

    /// Valid only while `state == Wait`: the descriptor being waited on.
    pub waiting_for: Option<ProcId>,
    /// Queue of processes waiting on *this* process to stop.
    pub wait_queue: Queue,

    pub fd_table: [i32; MAX_PROC_DEVICES],

    pub prev: Option<ProcId>,
    pub next: Option<ProcId>,
}

impl Proc {
    const fn empty() -> Self {
        Proc {
            pid: 0,
            state: ProcState::Stopped,
            saved_sp: None,
            stack_base: None,
            stack_len: 0,
            trap_args: 0,
            return_value: 0,
            cpu_ticks: 0,
            signal_handlers: [0; MAX_SIGNALS],
            pending_signals: 0,
            in_signal_frame: false,
            sleep_delta: 0,
            read_buffer: None,
            read_len: 0,
            read_filled: 0,
            waiting_for: None,
            wait_queue: Queue::new(),
            fd_table: [NULL_DEVICE; MAX_PROC_DEVICES],
            prev: None,
            next: None,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state == ProcState::Stopped
    }
}

pub struct ProcTable {
    slots: [Proc; MAX_PROC],
}

impl ProcTable {
    pub fn new() -> Self {
        ProcTable {
            slots: core::array::from_fn(|_| Proc::empty()),
        }
    }

    /// First slot in `Stopped` state, if any.
    pub fn find_free_slot(&self) -> Option<ProcId> {
        self.slots
            .iter()
            .position(Proc::is_stopped)
            .map(|i| ProcId::from_index(i))
    }

    /// Assign the next pid for a slot about to be (re)used, following
    /// the original `create()`'s reuse rule: a never-used slot (pid 0)
    /// or one about to wrap gets reseeded to `index + 1`; otherwise the
    /// pid advances by `MAX_PROC` so it never aliases a live slot.
    pub fn assign_pid(&mut self, id: ProcId) -> u32 {
        let idx = id.index();
        let p = &mut self.slots[idx];
        let next = p.pid.checked_add(MAX_PROC as u32);
        p.pid = match (p.pid, next) {
            (0, _) => idx as u32 + 1,
            (_, None) => idx as u32 + 1, // overflow: reseed per design notes
            (_, Some(n)) => n,
        };
        p.pid
    }

    /// Look up a live (non-stopped) process by pid. The idle process's
    /// pid is a valid slot but callers that must exclude it (wait/kill)
    /// do so themselves — spec.md only special-cases pid 0 in the
    /// original, and this crate never hands out pid 0.
    pub fn find_by_pid(&self, pid: u32) -> Option<ProcId> {
        if pid == 0 {
            return None;
        }
        let id = ProcId::from_pid(pid);
        if self.slots[id.index()].pid == pid && !self.slots[id.index()].is_stopped() {
            Some(id)
        } else {
            None
        }
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = ProcId> + '_ {
        (0..MAX_PROC).map(ProcId::from_index)
    }
}

impl Index<ProcId> for ProcTable {
    type Output = Proc;
    fn index(&self, id: ProcId) -> &Proc {
        &self.slots[id.index()]
    }
}

impl IndexMut<ProcId> for ProcTable {
    fn index_mut(&mut self, id: ProcId) -> &mut Proc {
        &mut self.slots[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_encodes_slot() {
        let mut table = ProcTable::new();
        let id = ProcId::from_index(3);
        let pid = table.assign_pid(id);
        assert_eq!(pid, 4); // index + 1 on first use
        assert_eq!(ProcId::from_pid(pid), id);
    }

    #[test]
    fn pid_reuse_advances_by_max_proc() {
        let mut table = ProcTable::new();
        let id = ProcId::from_index(3);
        let first = table.assign_pid(id);
        table[id].state = ProcState::Stopped;
        let second = table.assign_pid(id);
        assert_eq!(second, first + MAX_PROC as u32);
        assert_eq!(ProcId::from_pid(second), id);
    }

    #[test]
    fn find_by_pid_rejects_stale_pid_after_slot_reuse() {
        let mut table = ProcTable::new();
        let id = ProcId::from_index(0);
        let stale = table.assign_pid(id);
        table[id].state = ProcState::Ready;
        let fresh = table.assign_pid(id);
        table[id].state = ProcState::Ready;

        assert_ne!(stale, fresh);
        assert_eq!(table.find_by_pid(fresh), Some(id));
        // the stale pid maps to the same slot index but must not match
        // because the slot's stored pid has moved on.
        assert_eq!(ProcId::from_pid(stale), id);
        assert_ne!(table[id].pid, stale);
    }

    #[test]
    fn find_free_slot_skips_running_processes() {
        let mut table = ProcTable::new();
        table[ProcId::from_index(0)].state = ProcState::Ready;
        assert_eq!(table.find_free_slot(), Some(ProcId::from_index(1)));
    }
}
