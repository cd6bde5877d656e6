//! Sleep delta-list (spec.md §4.5). A sorted list of sleepers where each
//! node's `sleep_delta` is ticks past its predecessor's wake time;
//! summing deltas from the head to a node gives that node's absolute
//! ticks-until-wake. Built on the same intrusive queue primitives as the
//! ready queue (a sleeper is never simultaneously in any other queue).

use crate::param::{MAX_PROC, MILLISECONDS_TICK};
use crate::proc::{ProcId, ProcTable};
use crate::queue::Queue;

pub struct SleepList {
    queue: Queue,
}

impl SleepList {
    pub const fn new() -> Self {
        SleepList { queue: Queue::new() }
    }

    /// Insert `id` to sleep for `ticks` timer ticks, walking the list to
    /// find its place and rebalancing the deltas of its neighbors.
    pub fn insert(&mut self, table: &mut ProcTable, id: ProcId, ticks: u32) {
        let mut remaining = ticks as i64;
        let mut cursor = self.queue.head;
        let mut prev = None;

        while let Some(node) = cursor {
            let delta = table[node].sleep_delta;
            if delta > remaining {
                break;
            }
            remaining -= delta;
            prev = Some(node);
            cursor = table[node].next;
        }

        table[id].sleep_delta = remaining;
        self.queue.insert_after(table, prev, id);

        if let Some(next) = table[id].next {
            table[next].sleep_delta -= remaining;
        }
    }

    /// Advance the list by one timer tick. Returns every process that
    /// just reached zero remaining delta, in wake order, each already
    /// carrying `return_value = 0` (natural wake).
    pub fn tick(&mut self, table: &mut ProcTable) -> TickWoken {
        let mut woken = TickWoken { ids: [None; MAX_PROC], len: 0 };

        let Some(head) = self.queue.head else { return woken };
        table[head].sleep_delta -= 1;

        while let Some(node) = self.queue.head {
            if table[node].sleep_delta > 0 {
                break;
            }
            self.queue.dequeue(table);
            table[node].return_value = 0;
            if woken.len < woken.ids.len() {
                woken.ids[woken.len] = Some(node);
                woken.len += 1;
            }
        }

        woken
    }

    /// Remove `id` before it naturally wakes (killed, or signaled).
    /// Folds its remaining delta into its successor so the rest of the
    /// list stays correctly ordered, and returns the ticks that were
    /// left until `id` would have woken — used by the signal subsystem
    /// to compute `remaining_ms`.
    pub fn remove_early(&mut self, table: &mut ProcTable, id: ProcId) -> u32 {
        let ticks_left = ticks_until_wake(table, &self.queue, id);
        let delta = table[id].sleep_delta;
        let next = table[id].next;
        self.queue.remove(table, id);
        if let Some(next) = next {
            table[next].sleep_delta += delta;
        }
        ticks_left
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Fixed-capacity result of one `tick()`: almost always 0 or 1 wakes,
/// occasionally a handful when several sleepers share a wake tick. Sized
/// to `MAX_PROC` so every resident sleeper waking on the same tick fits —
/// the sleep list can never hold more entries than the process table has
/// slots, so this can never silently drop a waker.
pub struct TickWoken {
    ids: [Option<ProcId>; MAX_PROC],
    len: usize,
}

impl TickWoken {
    pub fn iter(&self) -> impl Iterator<Item = ProcId> + '_ {
        self.ids[..self.len].iter().filter_map(|x| *x)
    }
}

fn ticks_until_wake(table: &ProcTable, queue: &Queue, id: ProcId) -> u32 {
    let mut sum: i64 = 0;
    for node in queue.iter(table) {
        sum += table[node].sleep_delta;
        if node == id {
            return sum.max(0) as u32;
        }
    }
    0
}

/// `ms -> ticks`, rounding up, per spec.md §4.5.
pub fn ms_to_ticks(ms: u32) -> u32 {
    (ms + MILLISECONDS_TICK - 1) / MILLISECONDS_TICK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ProcId;

    #[test]
    fn wakes_in_absolute_time_order() {
        let mut table = ProcTable::new();
        let mut list = SleepList::new();
        let p1 = ProcId::from_index(0); // sleeps 100ms -> 10 ticks
        let p2 = ProcId::from_index(1); // sleeps 50ms -> 5 ticks
        let p3 = ProcId::from_index(2); // sleeps 75ms -> 8 ticks (rounds up)

        list.insert(&mut table, p1, ms_to_ticks(100));
        list.insert(&mut table, p2, ms_to_ticks(50));
        list.insert(&mut table, p3, ms_to_ticks(75));

        let mut order = alloc_vec::Vec::new();
        for _ in 0..10 {
            for w in list.tick(&mut table).iter() {
                order.push(w);
            }
        }

        assert_eq!(order, [p2, p3, p1]);
        assert!(list.is_empty());
    }

    mod alloc_vec {
        pub use std::vec::Vec;
    }

    #[test]
    fn deltas_sum_to_absolute_wake_tick() {
        let mut table = ProcTable::new();
        let mut list = SleepList::new();
        let p1 = ProcId::from_index(0);
        let p2 = ProcId::from_index(1);
        list.insert(&mut table, p1, 10);
        list.insert(&mut table, p2, 4);

        let sum: i64 = list.queue.iter(&table).map(|id| table[id].sleep_delta).sum();
        assert_eq!(sum, 10);
    }

    #[test]
    fn remove_early_folds_delta_into_successor() {
        let mut table = ProcTable::new();
        let mut list = SleepList::new();
        let p1 = ProcId::from_index(0);
        let p2 = ProcId::from_index(1);
        list.insert(&mut table, p1, 10);
        list.insert(&mut table, p2, 20); // delta 10 relative to p1

        let left = list.remove_early(&mut table, p1);
        assert_eq!(left, 10);
        // p2's delta absorbs p1's remaining 10 ticks, staying at absolute 20
        assert_eq!(table[p2].sleep_delta, 20);
    }
}
