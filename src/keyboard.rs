//! Keyboard driver (spec.md §4.8). One physical keyboard exposed as two
//! kernel devices sharing a single ring buffer and scan-code state
//! machine: device 0 is the plain (echo-off) personality, device 1 is
//! the echo-on personality a shell typically opens. Only one reader may
//! be blocked on the device at a time.
//!
//! Scan-code tables and ioctl numbers are carried over from the original
//! `kbd.c` verbatim; the state machine (shift/ctrl/capslock/extended) is
//! the same decision tree, just written as Rust match arms instead of a
//! chain of ifs.

use crate::device::{DeviceEntry, DeviceOps};
use crate::errno::{BLOCK, ERR_GENERIC};
use crate::param::{KEYBOARD_RING_SIZE, MAX_ASCII};
use crate::proc::{ProcId, ProcState, ProcTable};

pub const DEVICE_ECHO_OFF: i32 = 0;
pub const DEVICE_ECHO_ON: i32 = 1;

/// ioctl commands, preserved from the original numbering.
pub const IOCTL_SET_EOF: u32 = 53;
pub const IOCTL_ECHO_OFF: u32 = 55;
pub const IOCTL_ECHO_ON: u32 = 56;

/// Controller ports the ISR reads, preserved from the original's
/// `CONTROL_PORT`/`DATA_PORT`/`READY` bit.
pub const KEYBOARD_CONTROL_PORT: u32 = 0x64;
pub const KEYBOARD_DATA_PORT: u32 = 0x60;
pub const KEYBOARD_READY_BIT: u8 = 0x01;

const EXTENDED_PREFIX: u8 = 0xE0;
const LEFT_SHIFT_DOWN: u8 = 0x2A;
const LEFT_SHIFT_UP: u8 = 0xAA;
const RIGHT_SHIFT_DOWN: u8 = 0x36;
const RIGHT_SHIFT_UP: u8 = 0xB6;
const CTRL_DOWN: u8 = 0x1D;
const CTRL_UP: u8 = 0x9D;
const CAPSLOCK_DOWN: u8 = 0x3A;
const RELEASE_BIT: u8 = 0x80;

/// Base (unshifted) scan-code to ASCII table for the printable range,
/// keyed by scan code. 0 means "no mapping" (function keys, etc).
const BASE_TABLE: [u8; 0x3A] = [
    0, 0x1b, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\r', 0, b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0,
];

const SHIFT_TABLE: [u8; 0x3A] = [
    0, 0x1b, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\r', 0, b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0,
];

#[derive(Default, Clone, Copy)]
struct Modifiers {
    shift: bool,
    ctrl: bool,
    capslock: bool,
    extended: bool,
}

pub struct KeyboardDevice {
    ring: [u8; KEYBOARD_RING_SIZE],
    head: usize,
    tail: usize,
    count: usize,
    modifiers: Modifiers,
    eof_byte: u8,
    echo_on: [bool; 2],
    blocked_reader: Option<(ProcId, i32)>,
    /// Set once the EOF byte has been seen; cleared on (re)open. While
    /// set, `read` returns 0 without touching the ring.
    disabled: bool,
    /// EOF was seen while a reader was blocked: the next
    /// `take_satisfied_reader` call should finish that read with
    /// whatever partial count it already has, rather than wait for more
    /// bytes that will never come (the EOF byte itself is never stored).
    eof_pending: bool,
}

impl KeyboardDevice {
    pub const fn new() -> Self {
        KeyboardDevice {
            ring: [0; KEYBOARD_RING_SIZE],
            head: 0,
            tail: 0,
            count: 0,
            modifiers: Modifiers { shift: false, ctrl: false, capslock: false, extended: false },
            eof_byte: 0x04, // ^D, same default as the original
            echo_on: [false, true],
            blocked_reader: None,
            disabled: false,
            eof_pending: false,
        }
    }

    fn push_byte(&mut self, b: u8) {
        if self.count == self.ring.len() {
            return; // ring full: drop, matching the original's silent-drop policy
        }
        self.ring[self.tail] = b;
        self.tail = (self.tail + 1) % self.ring.len();
        self.count += 1;
    }

    fn pop_byte(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }
        let b = self.ring[self.head];
        self.head = (self.head + 1) % self.ring.len();
        self.count -= 1;
        Some(b)
    }

    /// Translate one scan code, updating modifier state and pushing any
    /// resulting ASCII byte into the ring.
    fn handle_scan_code(&mut self, code: u8) {
        if self.disabled {
            return; // IRQ would be masked on real hardware; mirror that here
        }
        if code == EXTENDED_PREFIX {
            self.modifiers.extended = true;
            return;
        }
        match code {
            LEFT_SHIFT_DOWN | RIGHT_SHIFT_DOWN => {
                self.modifiers.shift = true;
                self.modifiers.extended = false;
                return;
            }
            LEFT_SHIFT_UP | RIGHT_SHIFT_UP => {
                self.modifiers.shift = false;
                self.modifiers.extended = false;
                return;
            }
            CTRL_DOWN => {
                self.modifiers.ctrl = true;
                self.modifiers.extended = false;
                return;
            }
            CTRL_UP => {
                self.modifiers.ctrl = false;
                self.modifiers.extended = false;
                return;
            }
            CAPSLOCK_DOWN => {
                self.modifiers.capslock = !self.modifiers.capslock;
                self.modifiers.extended = false;
                return;
            }
            _ => {}
        }

        let extended = self.modifiers.extended;
        self.modifiers.extended = false;

        if code & RELEASE_BIT != 0 || extended {
            return; // key releases and extended (arrow/numpad) codes produce no ASCII
        }
        let idx = code as usize;
        if idx >= BASE_TABLE.len() {
            return;
        }

        let mut ch = if self.modifiers.shift { SHIFT_TABLE[idx] } else { BASE_TABLE[idx] };
        if ch == 0 {
            return;
        }
        if self.modifiers.capslock && ch.is_ascii_alphabetic() {
            ch = if ch.is_ascii_lowercase() { ch.to_ascii_uppercase() } else { ch.to_ascii_lowercase() };
        }
        if self.modifiers.ctrl && ch.is_ascii_alphabetic() {
            ch &= 0x1f;
        }

        // EOF never enters the ring and is never counted into a reader's
        // buffer: it only unblocks whoever is waiting (with their partial
        // count so far) and disables the device until reopened.
        if ch == self.eof_byte {
            self.disabled = true;
            if self.blocked_reader.is_some() {
                self.eof_pending = true;
            }
            return;
        }

        self.push_byte(ch);
    }

    /// Called from the interrupt handler with the raw scan code fresh
    /// off the controller's data port. If a reader is blocked and this
    /// byte completes its request, the caller (dispatch) is told who to
    /// wake by consulting `take_satisfied_reader` right after.
    pub fn notify_incoming_intr(&mut self, scan_code: u8) {
        self.handle_scan_code(scan_code);
    }

    /// Clear the blocked-reader slot if it belongs to `id` — used when a
    /// process blocked on a read is force-killed out from under the
    /// device (spec.md's `kill_proc`).
    pub fn forget_reader(&mut self, id: ProcId) {
        if let Some((reader, _)) = self.blocked_reader {
            if reader == id {
                self.blocked_reader = None;
            }
        }
    }

    /// If enough bytes are now buffered (or an EOF/newline was seen) to
    /// satisfy the single blocked reader, hand back its identity so the
    /// dispatcher can ready it.
    pub fn take_satisfied_reader(&mut self, table: &mut ProcTable) -> Option<ProcId> {
        let (reader, _fd) = self.blocked_reader?;
        let filled = self.drain_into_reader(table, reader);
        if filled {
            self.blocked_reader = None;
            Some(reader)
        } else {
            None
        }
    }

    fn drain_into_reader(&mut self, table: &mut ProcTable, reader: ProcId) -> bool {
        let p = &mut table[reader];
        let Some(buf) = p.read_buffer else { return false };
        loop {
            if p.read_filled >= p.read_len {
                return true;
            }
            let Some(b) = self.pop_byte() else {
                if self.eof_pending {
                    self.eof_pending = false;
                    return true;
                }
                return false;
            };
            unsafe { core::ptr::write(buf.add(p.read_filled), b) };
            p.read_filled += 1;
            if b == b'\n' {
                return true;
            }
        }
    }

    fn open(&mut self, _table: &mut ProcTable, _id: ProcId, device_no: i32) -> i32 {
        let echo_index = (device_no == DEVICE_ECHO_ON) as usize;
        self.echo_on[echo_index] = device_no == DEVICE_ECHO_ON;
        self.disabled = false;
        self.eof_pending = false;
        0
    }

    fn close(&mut self, _table: &mut ProcTable, _id: ProcId) -> i32 {
        0
    }

    /// `read(fd, buf, len)`. If the ring already has a full line (or
    /// enough bytes), fills synchronously; otherwise parks the caller as
    /// the single blocked reader and returns `BLOCK` so the dispatcher
    /// suspends it in `ProcState::Read`.
    fn read(&mut self, table: &mut ProcTable, id: ProcId, buf: *mut u8, len: usize) -> i32 {
        if self.disabled {
            return 0;
        }
        if self.blocked_reader.is_some() {
            return ERR_GENERIC; // only one blocked reader allowed at a time
        }
        table[id].read_buffer = Some(buf);
        table[id].read_len = len;
        table[id].read_filled = 0;

        if self.drain_into_reader(table, id) {
            let filled = table[id].read_filled as i32;
            table[id].read_buffer = None;
            return filled;
        }

        table[id].state = ProcState::Read;
        self.blocked_reader = Some((id, 0));
        BLOCK
    }

    fn write(&mut self, _table: &mut ProcTable, _id: ProcId, _buf: *const u8, len: usize) -> i32 {
        // a real console write would go out the video/serial driver;
        // device-independent I/O only guarantees the byte count here.
        len as i32
    }

    fn ioctl(&mut self, _table: &mut ProcTable, _id: ProcId, cmd: u32, args: usize) -> i32 {
        match cmd {
            IOCTL_SET_EOF => {
                let byte = args as u8;
                if byte > MAX_ASCII {
                    return ERR_GENERIC;
                }
                self.eof_byte = byte;
                0
            }
            IOCTL_ECHO_OFF => {
                self.echo_on[0] = false;
                0
            }
            IOCTL_ECHO_ON => {
                self.echo_on[1] = true;
                0
            }
            _ => ERR_GENERIC,
        }
    }
}

fn ctx_ref(ctx: *mut ()) -> &'static mut KeyboardDevice {
    unsafe { &mut *(ctx as *mut KeyboardDevice) }
}

fn op_open(ctx: *mut (), table: &mut ProcTable, id: ProcId, device_no: i32) -> i32 {
    ctx_ref(ctx).open(table, id, device_no)
}
fn op_close(ctx: *mut (), table: &mut ProcTable, id: ProcId) -> i32 {
    ctx_ref(ctx).close(table, id)
}
fn op_read(ctx: *mut (), table: &mut ProcTable, id: ProcId, buf: *mut u8, len: usize) -> i32 {
    ctx_ref(ctx).read(table, id, buf, len)
}
fn op_write(ctx: *mut (), table: &mut ProcTable, id: ProcId, buf: *const u8, len: usize) -> i32 {
    ctx_ref(ctx).write(table, id, buf, len)
}
fn op_ioctl(ctx: *mut (), table: &mut ProcTable, id: ProcId, cmd: u32, args: usize) -> i32 {
    ctx_ref(ctx).ioctl(table, id, cmd, args)
}

pub fn device_ops() -> DeviceOps {
    DeviceOps { open: op_open, close: op_close, read: op_read, write: op_write, ioctl: op_ioctl }
}

/// Register both keyboard personalities against the one shared
/// `KeyboardDevice`. The driver must outlive the kernel, so callers pass
/// a `&'static mut` obtained from a `static mut` at boot.
pub fn install(devices: &mut crate::device::DeviceTable, driver: &'static mut KeyboardDevice) {
    let ctx = driver as *mut KeyboardDevice as *mut ();
    devices.register(DEVICE_ECHO_OFF as usize, DeviceEntry { ops: device_ops(), ctx });
    devices.register(DEVICE_ECHO_ON as usize, DeviceEntry { ops: device_ops(), ctx });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ProcTable;

    fn type_ascii(kb: &mut KeyboardDevice, ascii_scan_codes: &[u8]) {
        for &code in ascii_scan_codes {
            kb.notify_incoming_intr(code);
            kb.notify_incoming_intr(code | RELEASE_BIT);
        }
    }

    #[test]
    fn lowercase_letter_scan_code_translates_to_ascii() {
        let mut kb = KeyboardDevice::new();
        kb.notify_incoming_intr(0x1E); // 'a' make code
        let b = kb.pop_byte();
        assert_eq!(b, Some(b'a'));
    }

    #[test]
    fn shift_modifier_produces_uppercase() {
        let mut kb = KeyboardDevice::new();
        kb.notify_incoming_intr(LEFT_SHIFT_DOWN);
        kb.notify_incoming_intr(0x1E); // 'a' with shift held
        kb.notify_incoming_intr(LEFT_SHIFT_UP);
        assert_eq!(kb.pop_byte(), Some(b'A'));
    }

    #[test]
    fn ctrl_modifier_masks_to_control_code() {
        let mut kb = KeyboardDevice::new();
        kb.notify_incoming_intr(CTRL_DOWN);
        kb.notify_incoming_intr(0x2E); // 'c' make code
        kb.notify_incoming_intr(CTRL_UP);
        assert_eq!(kb.pop_byte(), Some(b'c' & 0x1f));
    }

    #[test]
    fn extended_prefixed_codes_produce_no_ascii() {
        let mut kb = KeyboardDevice::new();
        kb.notify_incoming_intr(EXTENDED_PREFIX);
        kb.notify_incoming_intr(0x48); // arrow-up when extended
        assert_eq!(kb.pop_byte(), None);
    }

    #[test]
    fn read_blocks_with_empty_ring_then_satisfies_after_interrupt() {
        let mut kb = KeyboardDevice::new();
        let mut table = ProcTable::new();
        let id = ProcId::from_index(0);
        let mut buf = [0u8; 8];

        let rc = kb.read(&mut table, id, buf.as_mut_ptr(), 1);
        assert_eq!(rc, BLOCK);
        assert_eq!(table[id].state, ProcState::Read);

        kb.notify_incoming_intr(0x1E); // 'a'
        let woken = kb.take_satisfied_reader(&mut table);
        assert_eq!(woken, Some(id));
        assert_eq!(buf[0], b'a');
    }

    #[test]
    fn read_completes_synchronously_when_a_full_line_is_already_buffered() {
        let mut kb = KeyboardDevice::new();
        let mut table = ProcTable::new();
        let id = ProcId::from_index(0);
        type_ascii(&mut kb, &[0x1E, 0x30]); // "ab"
        kb.push_byte(b'\n');

        let mut buf = [0u8; 8];
        let rc = kb.read(&mut table, id, buf.as_mut_ptr(), 8);
        assert_eq!(rc, 3);
        assert_eq!(&buf[..3], b"ab\n");
    }

    #[test]
    fn ioctl_rejects_eof_byte_above_max_ascii() {
        let mut kb = KeyboardDevice::new();
        let mut table = ProcTable::new();
        let id = ProcId::from_index(0);
        assert_eq!(kb.ioctl(&mut table, id, IOCTL_SET_EOF, 0xFF), ERR_GENERIC);
        assert_eq!(kb.ioctl(&mut table, id, IOCTL_SET_EOF, 0x04), 0);
    }

    #[test]
    fn eof_unblocks_reader_with_partial_count_and_excludes_itself() {
        let mut kb = KeyboardDevice::new();
        let mut table = ProcTable::new();
        let id = ProcId::from_index(0);
        let mut buf = [0u8; 10];

        let rc = kb.read(&mut table, id, buf.as_mut_ptr(), 10);
        assert_eq!(rc, BLOCK);

        type_ascii(&mut kb, &[0x23, 0x17]); // "hi"
        kb.notify_incoming_intr(CTRL_DOWN);
        kb.notify_incoming_intr(0x20); // 'd' with ctrl held -> ^D (0x04), the default EOF byte
        kb.notify_incoming_intr(CTRL_UP);

        let woken = kb.take_satisfied_reader(&mut table);
        assert_eq!(woken, Some(id));
        assert_eq!(table[id].read_filled, 2);
        assert_eq!(&buf[..2], b"hi");
    }

    #[test]
    fn device_disabled_after_eof_until_reopened() {
        let mut kb = KeyboardDevice::new();
        let mut table = ProcTable::new();
        let id = ProcId::from_index(0);

        kb.notify_incoming_intr(CTRL_DOWN);
        kb.notify_incoming_intr(0x20); // ^D
        kb.notify_incoming_intr(CTRL_UP);
        assert!(kb.disabled);

        let mut buf = [0u8; 4];
        assert_eq!(kb.read(&mut table, id, buf.as_mut_ptr(), 4), 0);

        kb.open(&mut table, id, DEVICE_ECHO_OFF);
        assert!(!kb.disabled);
    }
}
