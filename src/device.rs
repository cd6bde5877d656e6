//! Device-independent I/O (spec.md §4.7). A process never talks to a
//! device driver directly: it opens a device number into one of its
//! `MAX_PROC_DEVICES` file descriptor slots, and every subsequent call
//! goes through this layer's dispatch, which forwards to whichever
//! driver is bound to that kernel device number.
//!
//! The device table is a fixed array of function-pointer records, one
//! per kernel device, mirroring the original `devsw[]` switch table
//! instead of a trait-object vtable — there is no heap here to put
//! `Box<dyn Device>` in, and a plain fn-pointer struct is the natural
//! `no_std` shape for what the original already expressed as a struct of
//! function pointers.

use core::ops::Range;

use crate::errno::{BLOCK, ERR_GENERIC};
use crate::param::{HOLE_END, HOLE_START, MAX_ADDR, MAX_KERN_DEVICES, NULL_DEVICE};
use crate::proc::{ProcId, ProcTable};

pub type OpenFn = fn(ctx: *mut (), table: &mut ProcTable, id: ProcId, arg: i32) -> i32;
pub type CloseFn = fn(ctx: *mut (), table: &mut ProcTable, id: ProcId) -> i32;
pub type ReadFn =
    fn(ctx: *mut (), table: &mut ProcTable, id: ProcId, buf: *mut u8, len: usize) -> i32;
pub type WriteFn =
    fn(ctx: *mut (), table: &mut ProcTable, id: ProcId, buf: *const u8, len: usize) -> i32;
pub type IoctlFn =
    fn(ctx: *mut (), table: &mut ProcTable, id: ProcId, cmd: u32, args: usize) -> i32;

#[derive(Copy, Clone)]
pub struct DeviceOps {
    pub open: OpenFn,
    pub close: CloseFn,
    pub read: ReadFn,
    pub write: WriteFn,
    pub ioctl: IoctlFn,
}

#[derive(Copy, Clone)]
pub struct DeviceEntry {
    pub ops: DeviceOps,
    /// Opaque pointer to the driver's own state (e.g. a `KeyboardDevice`).
    /// Raw rather than a reference because the kernel is single-threaded
    /// and the driver outlives the table for the life of the kernel.
    pub ctx: *mut (),
}

pub struct DeviceTable {
    entries: [Option<DeviceEntry>; MAX_KERN_DEVICES],
}

impl DeviceTable {
    pub const fn new() -> Self {
        DeviceTable { entries: [None; MAX_KERN_DEVICES] }
    }

    pub fn register(&mut self, device_no: usize, entry: DeviceEntry) {
        self.entries[device_no] = Some(entry);
    }

    fn get(&self, device_no: i32) -> Option<&DeviceEntry> {
        if device_no < 0 {
            return None;
        }
        self.entries.get(device_no as usize)?.as_ref()
    }
}

/// A buffer is valid only if it is non-null, has a positive length, lies
/// entirely below `max_addr`, and does not overlap the kernel's memory
/// hole, matching the original's `verify_buffer` guard used before
/// trusting a user pointer.
pub fn verify_buffer(ptr: usize, len: usize, max_addr: usize, hole: Range<usize>) -> bool {
    if ptr == 0 || len == 0 {
        return false;
    }
    let Some(end) = ptr.checked_add(len) else { return false };
    if end > max_addr {
        return false;
    }
    ptr >= hole.end || end <= hole.start
}

/// `open(device_no)`: bind the first free fd slot in `id`'s descriptor
/// to `device_no`, calling the driver's own `open`.
pub fn open(table: &mut ProcTable, devices: &DeviceTable, id: ProcId, device_no: i32) -> i32 {
    let Some(entry) = devices.get(device_no) else { return ERR_GENERIC };
    let Some(fd) = table[id].fd_table.iter().position(|d| *d == NULL_DEVICE) else {
        return ERR_GENERIC;
    };
    let rc = (entry.ops.open)(entry.ctx, table, id, 0);
    if rc < 0 {
        return rc;
    }
    table[id].fd_table[fd] = device_no;
    fd as i32
}

pub fn close(table: &mut ProcTable, devices: &DeviceTable, id: ProcId, fd: i32) -> i32 {
    let Some(device_no) = bound_device(table, id, fd) else { return ERR_GENERIC };
    let Some(entry) = devices.get(device_no) else { return ERR_GENERIC };
    let rc = (entry.ops.close)(entry.ctx, table, id);
    if rc >= 0 {
        table[id].fd_table[fd as usize] = NULL_DEVICE;
    }
    rc
}

/// Returns `BLOCK` when the driver wants the caller suspended (e.g. the
/// keyboard has nothing buffered). The caller (dispatch) is responsible
/// for moving the process to a blocked state on that signal; this layer
/// never blocks by itself.
pub fn read(
    table: &mut ProcTable,
    devices: &DeviceTable,
    id: ProcId,
    fd: i32,
    buf: *mut u8,
    len: usize,
) -> i32 {
    let Some(device_no) = bound_device(table, id, fd) else { return ERR_GENERIC };
    if !verify_buffer(buf as usize, len, MAX_ADDR, HOLE_START..HOLE_END) {
        return ERR_GENERIC;
    }
    let Some(entry) = devices.get(device_no) else { return ERR_GENERIC };
    (entry.ops.read)(entry.ctx, table, id, buf, len)
}

pub fn write(
    table: &mut ProcTable,
    devices: &DeviceTable,
    id: ProcId,
    fd: i32,
    buf: *const u8,
    len: usize,
) -> i32 {
    let Some(device_no) = bound_device(table, id, fd) else { return ERR_GENERIC };
    if !verify_buffer(buf as usize, len, MAX_ADDR, HOLE_START..HOLE_END) {
        return ERR_GENERIC;
    }
    let Some(entry) = devices.get(device_no) else { return ERR_GENERIC };
    (entry.ops.write)(entry.ctx, table, id, buf, len)
}

pub fn ioctl(
    table: &mut ProcTable,
    devices: &DeviceTable,
    id: ProcId,
    fd: i32,
    cmd: u32,
    args: usize,
) -> i32 {
    let Some(device_no) = bound_device(table, id, fd) else { return ERR_GENERIC };
    let Some(entry) = devices.get(device_no) else { return ERR_GENERIC };
    (entry.ops.ioctl)(entry.ctx, table, id, cmd, args)
}

fn bound_device(table: &ProcTable, id: ProcId, fd: i32) -> Option<i32> {
    let slot = table[id].fd_table.get(usize::try_from(fd).ok()?)?;
    if *slot == NULL_DEVICE {
        None
    } else {
        Some(*slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ProcTable;

    fn noop_open(_ctx: *mut (), _t: &mut ProcTable, _id: ProcId, _arg: i32) -> i32 {
        0
    }
    fn noop_close(_ctx: *mut (), _t: &mut ProcTable, _id: ProcId) -> i32 {
        0
    }
    fn block_read(_ctx: *mut (), _t: &mut ProcTable, _id: ProcId, _b: *mut u8, _l: usize) -> i32 {
        BLOCK
    }
    fn echo_write(
        _ctx: *mut (),
        _t: &mut ProcTable,
        _id: ProcId,
        _b: *const u8,
        len: usize,
    ) -> i32 {
        len as i32
    }
    fn noop_ioctl(_ctx: *mut (), _t: &mut ProcTable, _id: ProcId, _c: u32, _a: usize) -> i32 {
        0
    }

    fn stub_ops() -> DeviceOps {
        DeviceOps {
            open: noop_open,
            close: noop_close,
            read: block_read,
            write: echo_write,
            ioctl: noop_ioctl,
        }
    }

    #[test]
    fn open_binds_first_free_fd() {
        let mut table = ProcTable::new();
        let mut devices = DeviceTable::new();
        devices.register(0, DeviceEntry { ops: stub_ops(), ctx: core::ptr::null_mut() });
        let id = ProcId::from_index(0);

        let fd = open(&mut table, &devices, id, 0);
        assert_eq!(fd, 0);
        assert_eq!(table[id].fd_table[0], 0);
    }

    #[test]
    fn read_from_unopened_fd_is_an_error() {
        let mut table = ProcTable::new();
        let devices = DeviceTable::new();
        let id = ProcId::from_index(0);
        let mut buf = [0u8; 4];
        assert_eq!(read(&mut table, &devices, id, 0, buf.as_mut_ptr(), 4), ERR_GENERIC);
    }

    #[test]
    fn read_can_propagate_block_sentinel() {
        let mut table = ProcTable::new();
        let mut devices = DeviceTable::new();
        devices.register(0, DeviceEntry { ops: stub_ops(), ctx: core::ptr::null_mut() });
        let id = ProcId::from_index(0);
        open(&mut table, &devices, id, 0);

        let mut buf = [0u8; 4];
        assert_eq!(read(&mut table, &devices, id, 0, buf.as_mut_ptr(), 4), BLOCK);
    }

    #[test]
    fn close_frees_the_fd_slot() {
        let mut table = ProcTable::new();
        let mut devices = DeviceTable::new();
        devices.register(0, DeviceEntry { ops: stub_ops(), ctx: core::ptr::null_mut() });
        let id = ProcId::from_index(0);
        let fd = open(&mut table, &devices, id, 0);

        assert_eq!(close(&mut table, &devices, id, fd), 0);
        assert_eq!(table[id].fd_table[fd as usize], NULL_DEVICE);
    }

    #[test]
    fn verify_buffer_rejects_hole_overlap_and_out_of_range() {
        let max_addr = 0x10_0000;
        let hole = 0xA_0000..0xC_0000;
        assert!(verify_buffer(0x1000, 0x100, max_addr, hole.clone()));
        assert!(!verify_buffer(0xA_0010, 0x10, max_addr, hole.clone()));
        assert!(!verify_buffer(max_addr - 4, 0x100, max_addr, hole));
    }
}
