//! # Programmable Interrupt Controller (8259 PIC)
//!
//! Programs the legacy chained 8259 pair and acknowledges their interrupts.
//!
//! ## PIC Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Master)   │◀────│  (Slave)    │
//! │ IRQ 0-7     │ IR2 │ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! ## Vector Remapping
//!
//! IRQ 0-15 collide with CPU exception vectors at power-on. We remap them:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! The controllers acknowledge nothing during initialization; each expects
//! exactly four command words in order, so the sequence is a constant.
//!
//! ## Interrupt Assignments
//!
//! | IRQ | Vector | Device    |
//! |-----|--------|-----------|
//! | 0   | 32     | Timer     |
//! | 1   | 33     | Keyboard  |
//! | 2   | 34     | Cascade   |
//! | 12  | 44     | Mouse     |

use crate::interrupts::cpu::PortIo;

pub const PIC_1_OFFSET: u8 = 32; // Primary PIC handles IRQs 0-7
pub const PIC_2_OFFSET: u8 = 40; // Secondary PIC handles IRQs 8-15
pub const IRQ_COUNT: usize = 16;

pub const PIC_1_COMMAND: u16 = 0x20;
pub const PIC_1_DATA: u16 = 0x21;
pub const PIC_2_COMMAND: u16 = 0xA0;
pub const PIC_2_DATA: u16 = 0xA1;

/// ICW1: edge triggered, cascade mode, ICW4 follows.
const ICW1_INIT: u8 = 0x11;
/// ICW3 (master): slave attached to IR2.
const ICW3_SLAVE_ON_IR2: u8 = 0x04;
/// ICW3 (slave): cascade identity 2.
const ICW3_CASCADE_ID: u8 = 0x02;
/// ICW4: 8086 mode.
const ICW4_8086: u8 = 0x01;
const UNMASK_ALL: u8 = 0x00;
const CMD_END_OF_INTERRUPT: u8 = 0x20;

// Interrupt indices - these are the actual vector numbers the CPU sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,        // 32 - IRQ0
    Keyboard = PIC_1_OFFSET + 1, // 33 - IRQ1
    Mouse = PIC_2_OFFSET + 4,    // 44 - IRQ12 (IRQ4 on PIC2)
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Controller line, 0-15.
    pub fn line(self) -> u8 {
        self.as_u8() - PIC_1_OFFSET
    }
}

#[derive(Debug)]
struct Pic {
    offset: u8,
    command: u16,
    data: u16,
}

impl Pic {
    fn handles_interrupt(&self, vector: u8) -> bool {
        self.offset <= vector && vector < self.offset + 8
    }

    fn end_of_interrupt(&self, io: &impl PortIo) {
        io.write_u8(self.command, CMD_END_OF_INTERRUPT);
    }
}

/// The master/slave pair. Stateless: the ports are passed in per call.
#[derive(Debug)]
pub struct ChainedPics {
    master: Pic,
    slave: Pic,
}

pub static PICS: ChainedPics = ChainedPics::new();

impl ChainedPics {
    pub const fn new() -> Self {
        Self {
            master: Pic {
                offset: PIC_1_OFFSET,
                command: PIC_1_COMMAND,
                data: PIC_1_DATA,
            },
            slave: Pic {
                offset: PIC_2_OFFSET,
                command: PIC_2_COMMAND,
                data: PIC_2_DATA,
            },
        }
    }

    /// Remap both controllers to 32-47 and unmask every line.
    pub fn initialize(&self, io: &impl PortIo) {
        let (master, slave) = (&self.master, &self.slave);

        io.write_u8(master.command, ICW1_INIT);
        io.write_u8(slave.command, ICW1_INIT);

        io.write_u8(master.data, master.offset);
        io.write_u8(slave.data, slave.offset);

        io.write_u8(master.data, ICW3_SLAVE_ON_IR2);
        io.write_u8(slave.data, ICW3_CASCADE_ID);

        io.write_u8(master.data, ICW4_8086);
        io.write_u8(slave.data, ICW4_8086);

        io.write_u8(master.data, UNMASK_ALL);
        io.write_u8(slave.data, UNMASK_ALL);
    }

    pub fn handles_interrupt(&self, vector: u8) -> bool {
        self.master.handles_interrupt(vector) || self.slave.handles_interrupt(vector)
    }

    /// Line number for a remapped vector, `None` outside 32-47.
    pub fn line_for(&self, vector: u8) -> Option<u8> {
        self.handles_interrupt(vector).then(|| vector - self.master.offset)
    }

    pub fn vector_for(&self, line: u8) -> Option<u8> {
        (usize::from(line) < IRQ_COUNT).then(|| self.master.offset + line)
    }

    /// Acknowledge `vector`: the slave first when it raised the line, then
    /// always the master, which saw it through the cascade.
    pub fn notify_end_of_interrupt(&self, io: &impl PortIo, vector: u8) {
        if !self.handles_interrupt(vector) {
            return;
        }
        if self.slave.handles_interrupt(vector) {
            self.slave.end_of_interrupt(io);
        }
        self.master.end_of_interrupt(io);
    }
}

impl Default for ChainedPics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::testing::RecordingPorts;

    #[test]
    fn initialize_emits_exact_sequence() {
        let ports = RecordingPorts::new();
        PICS.initialize(&ports);

        assert_eq!(
            ports.writes(),
            [
                (0x20, 0x11),
                (0xA0, 0x11),
                (0x21, 0x20),
                (0xA1, 0x28),
                (0x21, 0x04),
                (0xA1, 0x02),
                (0x21, 0x01),
                (0xA1, 0x01),
                (0x21, 0x00),
                (0xA1, 0x00),
            ]
        );
        assert!(ports.reads().is_empty());
    }

    #[test]
    fn master_line_acknowledges_master_only() {
        let ports = RecordingPorts::new();
        PICS.notify_end_of_interrupt(&ports, InterruptIndex::Keyboard.as_u8());

        assert_eq!(ports.writes(), [(0x20, 0x20)]);
    }

    #[test]
    fn slave_line_acknowledges_both() {
        let ports = RecordingPorts::new();
        PICS.notify_end_of_interrupt(&ports, InterruptIndex::Mouse.as_u8());

        assert_eq!(ports.writes(), [(0xA0, 0x20), (0x20, 0x20)]);
    }

    #[test]
    fn non_pic_vector_is_not_acknowledged() {
        let ports = RecordingPorts::new();
        for vector in [0u8, 14, 31, 48, 0x80, 255] {
            PICS.notify_end_of_interrupt(&ports, vector);
        }

        assert!(ports.writes().is_empty());
    }

    #[test]
    fn vector_line_mapping() {
        assert_eq!(PICS.line_for(32), Some(0));
        assert_eq!(PICS.line_for(40), Some(8));
        assert_eq!(PICS.line_for(47), Some(15));
        assert_eq!(PICS.line_for(31), None);
        assert_eq!(PICS.line_for(48), None);
        assert_eq!(PICS.vector_for(1), Some(33));
        assert_eq!(PICS.vector_for(16), None);
        assert_eq!(InterruptIndex::Timer.line(), 0);
        assert_eq!(PICS.line_for(InterruptIndex::Timer.as_u8()), Some(0));
        assert_eq!(InterruptIndex::Mouse.line(), 12);
    }
}
