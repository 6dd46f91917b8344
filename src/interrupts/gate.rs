//! # 32-bit Gate Descriptors
//!
//! One IDT slot, packed by hand into a `u64` whose little-endian bytes are
//! the hardware layout:
//!
//! ```text
//! byte  0..2   offset bits 0..16
//! byte  2..4   code segment selector
//! byte  4      reserved, always 0
//! byte  5      attributes: P | DPL(2) | 0 | type(4)
//! byte  6..8   offset bits 16..32
//! ```

use core::fmt;

use x86_64::{structures::gdt::SegmentSelector, PrivilegeLevel};

/// The attribute byte of a gate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct GateFlags(u8);

impl GateFlags {
    pub const PRESENT: Self = Self(0x80);
    /// Both DPL bits set: the gate may be raised from ring 3 with `int n`.
    pub const DPL_RING3: Self = Self(0x60);
    pub const INTERRUPT_GATE_32: Self = Self(0x0E);
    pub const TRAP_GATE_32: Self = Self(0x0F);

    /// Present ring-0 32-bit interrupt gate, `0x8E`.
    pub const KERNEL_INTERRUPT: Self = Self(Self::PRESENT.0 | Self::INTERRUPT_GATE_32.0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Debug for GateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GateFlags({:#04x})", self.0)
    }
}

/// How caller-supplied flags are turned into the stored attribute byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegePolicy {
    /// OR in both DPL bits so every gate is callable from ring 3.
    #[default]
    ForceUser,
    /// Store the flags unchanged.
    AsGiven,
}

impl PrivilegePolicy {
    pub const fn apply(self, flags: GateFlags) -> GateFlags {
        match self {
            PrivilegePolicy::ForceUser => flags.union(GateFlags::DPL_RING3),
            PrivilegePolicy::AsGiven => flags,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct GateDescriptor(u64);

const OFFSET_LOW_SHIFT: u32 = 0;
const SELECTOR_SHIFT: u32 = 16;
const RESERVED_SHIFT: u32 = 32;
const FLAGS_SHIFT: u32 = 40;
const OFFSET_HIGH_SHIFT: u32 = 48;

impl GateDescriptor {
    pub const SIZE: usize = 8;

    pub const fn new(address: u32, selector: SegmentSelector, flags: GateFlags) -> Self {
        let low = (address & 0xFFFF) as u64;
        let high = ((address >> 16) & 0xFFFF) as u64;

        Self(
            low << OFFSET_LOW_SHIFT
                | (selector.0 as u64) << SELECTOR_SHIFT
                | (flags.0 as u64) << FLAGS_SHIFT
                | high << OFFSET_HIGH_SHIFT,
        )
    }

    /// A slot nobody installed: present bit clear, so taking it raises #NP
    /// instead of jumping to address zero.
    pub const fn missing(selector: SegmentSelector) -> Self {
        Self::new(0, selector, GateFlags::INTERRUPT_GATE_32)
    }

    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub const fn address(self) -> u32 {
        let low = (self.0 >> OFFSET_LOW_SHIFT) & 0xFFFF;
        let high = (self.0 >> OFFSET_HIGH_SHIFT) & 0xFFFF;
        (high << 16 | low) as u32
    }

    pub const fn selector(self) -> SegmentSelector {
        SegmentSelector(((self.0 >> SELECTOR_SHIFT) & 0xFFFF) as u16)
    }

    pub const fn reserved(self) -> u8 {
        (self.0 >> RESERVED_SHIFT) as u8
    }

    pub const fn flags(self) -> GateFlags {
        GateFlags((self.0 >> FLAGS_SHIFT) as u8)
    }

    pub const fn is_present(self) -> bool {
        self.flags().contains(GateFlags::PRESENT)
    }

    pub fn privilege_level(self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16(((self.flags().0 >> 5) & 0b11) as u16)
    }
}

impl fmt::Debug for GateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateDescriptor")
            .field("address", &format_args!("{:#010x}", self.address()))
            .field("selector", &format_args!("{:#06x}", self.selector().0))
            .field("flags", &self.flags())
            .finish()
    }
}
