// tests/channel_tests.rs
//
// Drives DriverChannel against a scripted peer standing in for the kernel
// driver: decodes each exchange the way the driver would, keeps a latch per
// port, and records every call so tests can assert on exchange counts and
// exact wire bytes.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;

use hwgate::protocol::{IOCTL_MAP, IOCTL_READ_PORT, IOCTL_UNMAP, IOCTL_WRITE_PORT};
use hwgate::{DeviceControl, DriverChannel, PortWidth};

const MAP_BASE: u64 = 0xA000_0000;

struct MockPeer {
    ports: RefCell<HashMap<u16, u32>>,
    exchanges: RefCell<Vec<(u32, Vec<u8>)>>,
    fail: Cell<bool>,
}

impl MockPeer {
    fn new() -> Self {
        Self {
            ports: RefCell::new(HashMap::new()),
            exchanges: RefCell::new(Vec::new()),
            fail: Cell::new(false),
        }
    }

    fn seed_port(&self, port: u16, value: u32) {
        self.ports.borrow_mut().insert(port, value);
    }

    fn port(&self, port: u16) -> u32 {
        self.ports.borrow().get(&port).copied().unwrap_or(0)
    }

    fn count(&self, code: u32) -> usize {
        self.exchanges.borrow().iter().filter(|(c, _)| *c == code).count()
    }

    fn total(&self) -> usize {
        self.exchanges.borrow().len()
    }

    fn last_input(&self, code: u32) -> Vec<u8> {
        self.exchanges
            .borrow()
            .iter()
            .rev()
            .find(|(c, _)| *c == code)
            .map(|(_, input)| input.clone())
            .expect("no exchange with that code")
    }
}

fn width_mask(wire_width: u8) -> u32 {
    match wire_width {
        1 => 0xFF,
        2 => 0xFFFF,
        _ => u32::MAX,
    }
}

impl DeviceControl for MockPeer {
    fn exchange(&self, code: u32, input: &[u8], output: &mut [u8]) -> io::Result<usize> {
        self.exchanges.borrow_mut().push((code, input.to_vec()));
        if self.fail.get() {
            return Err(io::Error::from_raw_os_error(31)); // ERROR_GEN_FAILURE
        }
        match code {
            IOCTL_READ_PORT => {
                let port = u16::from_le_bytes([input[0], input[1]]);
                let value = self.port(port) & width_mask(input[2]);
                output[..4].copy_from_slice(&value.to_le_bytes());
                Ok(4)
            }
            IOCTL_WRITE_PORT => {
                let value = u32::from_le_bytes(input[..4].try_into().unwrap());
                let port = u16::from_le_bytes([input[4], input[5]]);
                self.ports.borrow_mut().insert(port, value & width_mask(input[6]));
                Ok(0)
            }
            IOCTL_MAP => {
                output[..8].copy_from_slice(&MAP_BASE.to_le_bytes());
                Ok(8)
            }
            IOCTL_UNMAP => Ok(0),
            _ => Err(io::Error::other("unknown control code")),
        }
    }
}

fn channel() -> DriverChannel<MockPeer> {
    DriverChannel::new(MockPeer::new(), true)
}

#[test]
fn write_then_read_round_trips_each_width() {
    let cases = [
        (PortWidth::Byte, 0xABu32),
        (PortWidth::Word, 0xBEEF),
        (PortWidth::Dword, 0xDEAD_BEEF),
    ];
    for (width, value) in cases {
        let ch = channel();
        ch.device().seed_port(0x2F8, 0x77); // bystander port

        ch.write_port(0x1F0, value, width);
        assert_eq!(ch.read_port(0x1F0, width), value, "{width:?}");
        assert_eq!(ch.device().port(0x2F8), 0x77, "{width:?} altered a bystander port");
    }
}

#[test]
fn narrow_entry_points_mask_to_width() {
    let ch = channel();
    ch.device().seed_port(0x60, 0x5A);
    ch.device().seed_port(0x170, 0x1234);

    assert_eq!(ch.read_port8(0x60), 0x5A);
    assert_eq!(ch.read_port16(0x170), 0x1234);

    ch.write_port8(0x80, 0xFE);
    assert_eq!(ch.device().port(0x80), 0xFE);
    ch.write_port16(0x80, 0xCAFE);
    assert_eq!(ch.device().port(0x80), 0xCAFE);
    ch.write_port32(0x80, 0xFFFF_FFFF);
    assert_eq!(ch.device().port(0x80), 0xFFFF_FFFF);
}

#[test]
fn keyboard_controller_read_is_one_exact_exchange() {
    let ch = channel();
    ch.device().seed_port(0x60, 0xF1);

    let value = ch.read_port8(0x60);

    assert_eq!(value, 0xF1);
    assert_eq!(ch.device().count(IOCTL_READ_PORT), 1);
    assert_eq!(ch.device().total(), 1);
    // {port=0x60, width=1}, zero pad byte
    assert_eq!(ch.device().last_input(IOCTL_READ_PORT), vec![0x60, 0x00, 0x01, 0x00]);
}

#[test]
fn failed_exchanges_yield_safe_defaults() {
    let ch = channel();
    ch.device().fail.set(true);

    assert_eq!(ch.read_port8(0x60), 0);
    assert_eq!(ch.read_port32(0xCF8), 0);
    ch.write_port8(0x80, 0x42); // must not panic
    assert!(ch.map_physical(0xFED0_0000, 0x1000).is_none());
}

#[test]
fn map_refused_without_remap_protection() {
    let ch = DriverChannel::new(MockPeer::new(), false);

    assert!(ch.map_physical(0xFED0_0000, 0x1000).is_none());
    // refused before any peer exchange
    assert_eq!(ch.device().total(), 0);
}

#[test]
fn map_then_unmap_pairs_one_exchange_each() {
    let ch = channel();

    let base = ch.map_physical(0xFED0_0000, 0x1000).expect("map failed");
    assert_eq!(base.as_ptr() as usize as u64, MAP_BASE);
    assert_eq!(ch.device().count(IOCTL_MAP), 1);
    let map_input = ch.device().last_input(IOCTL_MAP);
    assert_eq!(&map_input[..8], &0xFED0_0000u64.to_le_bytes());
    assert_eq!(&map_input[8..], &0x1000u64.to_le_bytes());

    ch.unmap_physical(base);
    assert_eq!(ch.device().count(IOCTL_UNMAP), 1);
    assert_eq!(ch.device().last_input(IOCTL_UNMAP), MAP_BASE.to_le_bytes().to_vec());
}
