//! Host-side fakes for the hardware collaborators.

use std::{collections::VecDeque, sync::Mutex};

use crate::{
    drivers::CharSink,
    interrupts::{
        cpu::PortIo,
        dispatch::Registers,
        idt::{Platform, TableDescriptor, VectorTable},
        registry::Context,
    },
};

/// Records every port write and read, and answers reads from a queue.
#[derive(Debug, Default)]
pub struct RecordingPorts {
    writes: Mutex<Vec<(u16, u8)>>,
    reads: Mutex<Vec<u16>>,
    input: Mutex<VecDeque<u8>>,
}

impl RecordingPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        let ports = Self::new();
        ports.input.lock().unwrap().extend(bytes.iter().copied());
        ports
    }

    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<u16> {
        self.reads.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap().clear();
        self.reads.lock().unwrap().clear();
    }
}

impl PortIo for RecordingPorts {
    fn write_u8(&self, port: u16, value: u8) {
        self.writes.lock().unwrap().push((port, value));
    }

    fn read_u8(&self, port: u16) -> u8 {
        self.reads.lock().unwrap().push(port);
        self.input.lock().unwrap().pop_front().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    chars: Mutex<Vec<u8>>,
}

impl RecordingSink {
    pub fn chars(&self) -> Vec<u8> {
        self.chars.lock().unwrap().clone()
    }
}

impl CharSink for RecordingSink {
    fn put_char(&self, c: u8) {
        self.chars.lock().unwrap().push(c);
    }
}

/// Boot collaborator fake: stub addresses are `STUB_BASE + 16 * vector` and
/// the table is reported at `TABLE_BASE`. Port writes and boot steps share one
/// timeline so their relative order can be checked.
#[derive(Debug, Default)]
pub struct FakePlatform {
    pub ports: RecordingPorts,
    timeline: Mutex<Vec<BootEvent>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootEvent {
    PortWrite { port: u16, value: u8 },
    LoadTable { base: u32, limit: u16 },
    EnableInterrupts,
}

impl FakePlatform {
    pub const STUB_BASE: usize = 0x0010_0000;
    pub const TABLE_BASE: usize = 0x0020_0000;

    /// Boot steps only, without port traffic.
    pub fn events(&self) -> Vec<BootEvent> {
        self.timeline()
            .into_iter()
            .filter(|event| !matches!(event, BootEvent::PortWrite { .. }))
            .collect()
    }

    pub fn timeline(&self) -> Vec<BootEvent> {
        self.timeline.lock().unwrap().clone()
    }
}

impl PortIo for FakePlatform {
    fn write_u8(&self, port: u16, value: u8) {
        self.ports.write_u8(port, value);
        self.timeline.lock().unwrap().push(BootEvent::PortWrite { port, value });
    }

    fn read_u8(&self, port: u16) -> u8 {
        self.ports.read_u8(port)
    }
}

impl Platform for FakePlatform {
    fn entry_stub(&self, vector: u8) -> Option<usize> {
        (vector < 48).then(|| Self::STUB_BASE + 16 * usize::from(vector))
    }

    fn table_address(&self, _: &VectorTable) -> usize {
        Self::TABLE_BASE
    }

    fn load_table(&self, descriptor: &TableDescriptor) {
        self.timeline.lock().unwrap().push(BootEvent::LoadTable {
            base: descriptor.base(),
            limit: descriptor.limit(),
        });
    }

    fn enable_interrupts(&self) {
        self.timeline.lock().unwrap().push(BootEvent::EnableInterrupts);
    }
}

/// Snapshots seen by `counting_handler` when registered with this log as
/// its context.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Registers>>,
}

impl CallLog {
    pub fn leak() -> &'static CallLog {
        Box::leak(Box::default())
    }

    pub fn calls(&self) -> Vec<Registers> {
        self.calls.lock().unwrap().clone()
    }

    pub fn context(&'static self) -> Context {
        Context::from_static(self)
    }
}

pub fn counting_handler(regs: &Registers, context: Context) {
    // SAFETY: every registration of this handler passes a `CallLog`.
    let log = unsafe { context.as_ref::<CallLog>() }.expect("handler registered without a CallLog");
    log.calls.lock().unwrap().push(*regs);
}

pub fn registers_for(vector: u8) -> Registers {
    Registers {
        int_no: u32::from(vector),
        eip: 0xC010_0000 + u32::from(vector),
        cs: 0x08,
        eflags: 0x202,
        ..Registers::default()
    }
}
