//! # Interrupt Descriptor Table
//!
//! Owns the 256 gates and runs the boot sequence that fills, wires and loads
//! them.
//!
//! ## Vector Layout After `initialize`
//!
//! | Vector | Gate                         |
//! |--------|------------------------------|
//! | 0-31   | `isr0`..`isr31` entry stubs  |
//! | 32-47  | `irq0`..`irq15` entry stubs  |
//! | 48-255 | not present (#NP if raised)  |

use core::{fmt, mem::size_of};

use spin::{Mutex, RwLock};
use x86_64::structures::gdt::SegmentSelector;

use crate::{
    interrupts::{
        config::InterruptConfig,
        cpu::PortIo,
        error::InterruptError,
        gate::{GateDescriptor, GateFlags},
        pic::PICS,
        registry::{HandlerRegistry, IrqBinding, IDT_ENTRIES},
    },
    println,
};

/// Vectors 0-47 get real gates: CPU exceptions and the remapped IRQ lines.
pub const INSTALLED_VECTORS: u8 = 48;

/// Narrow a pointer-sized address to a protected-mode linear address.
pub fn linear_address(address: usize) -> Result<u32, InterruptError> {
    u32::try_from(address).map_err(|_| InterruptError::AddressOutOfRange(address))
}

#[repr(C, align(8))]
pub struct VectorTable {
    gates: [GateDescriptor; IDT_ENTRIES],
}

const _: () = assert!(size_of::<VectorTable>() == IDT_ENTRIES * GateDescriptor::SIZE);

impl VectorTable {
    pub const fn new() -> Self {
        Self {
            gates: [GateDescriptor::missing(InterruptConfig::DEFAULT.code_selector); IDT_ENTRIES],
        }
    }

    /// Mark every slot not present.
    pub fn fill_missing(&mut self, selector: SegmentSelector) {
        self.gates = [GateDescriptor::missing(selector); IDT_ENTRIES];
    }

    /// Store a gate for `vector`. `flags` are written as given; apply a
    /// [`PrivilegePolicy`](crate::interrupts::gate::PrivilegePolicy) first.
    pub fn install_gate(&mut self, vector: u8, address: u32, selector: SegmentSelector, flags: GateFlags) {
        self.gates[usize::from(vector)] = GateDescriptor::new(address, selector, flags);
    }

    pub fn gate(&self, vector: u8) -> GateDescriptor {
        self.gates[usize::from(vector)]
    }

    pub fn gates(&self) -> &[GateDescriptor; IDT_ENTRIES] {
        &self.gates
    }

    pub fn address(&self) -> usize {
        self.gates.as_ptr() as usize
    }

    /// The `lidt` operand for this table where it lives now.
    pub fn descriptor(&self) -> Result<TableDescriptor, InterruptError> {
        TableDescriptor::new(self.address())
    }
}

impl Default for VectorTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The 6-byte operand of `lidt`.
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    limit: u16,
    base: u32,
}

const _: () = assert!(size_of::<TableDescriptor>() == 6);

impl TableDescriptor {
    pub const LIMIT: u16 = (size_of::<VectorTable>() - 1) as u16;

    /// Descriptor for a full table at `base`.
    pub fn new(base: usize) -> Result<Self, InterruptError> {
        Ok(Self {
            limit: Self::LIMIT,
            base: linear_address(base)?,
        })
    }

    pub fn limit(&self) -> u16 {
        self.limit
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        let mut bytes = [0; 6];
        bytes[..2].copy_from_slice(&self.limit().to_le_bytes());
        bytes[2..].copy_from_slice(&self.base().to_le_bytes());
        bytes
    }
}

impl fmt::Debug for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("base", &format_args!("{:#010x}", self.base()))
            .field("limit", &self.limit())
            .finish()
    }
}

/// Everything the boot sequence needs from the machine.
pub trait Platform: PortIo {
    /// Address of the entry stub for `vector`, for every vector below
    /// [`INSTALLED_VECTORS`].
    fn entry_stub(&self, vector: u8) -> Option<usize>;
    /// Linear address IDTR will hold for `table`.
    fn table_address(&self, table: &VectorTable) -> usize {
        table.address()
    }
    /// Point IDTR at `descriptor`.
    fn load_table(&self, descriptor: &TableDescriptor);
    /// Set IF.
    fn enable_interrupts(&self);
}

/// Build and load the vector table, program the controllers and install
/// `boot_handlers`, then enable interrupts.
///
/// Runs once, before IF is first set, with nothing else touching `table`.
/// Arguments and addresses are validated before any hardware is touched.
/// Every registration already in `registry` is discarded. The registry write
/// lock is released before interrupts are enabled.
pub fn initialize<P: Platform>(
    table: &mut VectorTable,
    registry: &RwLock<HandlerRegistry>,
    platform: &P,
    config: &InterruptConfig,
    boot_handlers: &[IrqBinding],
) -> Result<TableDescriptor, InterruptError> {
    let mut stubs = [0u32; INSTALLED_VECTORS as usize];
    for (vector, stub) in (0..INSTALLED_VECTORS).zip(stubs.iter_mut()) {
        let address = platform
            .entry_stub(vector)
            .ok_or(InterruptError::MissingEntryStub(vector))?;
        *stub = linear_address(address)?;
    }
    if let Some(bad) = boot_handlers.iter().find(|b| PICS.vector_for(b.line).is_none()) {
        return Err(InterruptError::InvalidIrqLine(bad.line));
    }

    let descriptor = TableDescriptor::new(platform.table_address(table))?;
    table.fill_missing(config.code_selector);

    let mut handlers = registry.write();
    handlers.clear();

    PICS.initialize(platform);
    println!("[pic] remapped IRQ 0-15 to vectors 32-47");

    for binding in boot_handlers {
        handlers.bind(binding)?;
    }
    drop(handlers);

    let flags = config.privilege.apply(config.gate_flags);
    for (vector, &address) in (0..INSTALLED_VECTORS).zip(stubs.iter()) {
        table.install_gate(vector, address, config.code_selector, flags);
    }

    platform.load_table(&descriptor);
    println!("[idt] loaded {:?} ({} gates installed, flags {:?})", descriptor, INSTALLED_VECTORS, flags);

    platform.enable_interrupts();
    Ok(descriptor)
}

struct BootState {
    table: VectorTable,
    loaded: Option<TableDescriptor>,
}

/// A vector table that is initialized at most once.
///
/// Only a successful [`initialize`] counts. A failed attempt is rejected
/// before any hardware is touched, so it can be retried.
pub struct BootTable {
    state: Mutex<BootState>,
}

impl BootTable {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(BootState {
                table: VectorTable::new(),
                loaded: None,
            }),
        }
    }

    pub fn initialize<P: Platform>(
        &self,
        registry: &RwLock<HandlerRegistry>,
        platform: &P,
        config: &InterruptConfig,
        boot_handlers: &[IrqBinding],
    ) -> Result<TableDescriptor, InterruptError> {
        let mut state = self.state.lock();
        if state.loaded.is_some() {
            return Err(InterruptError::AlreadyInitialized);
        }

        let descriptor = initialize(&mut state.table, registry, platform, config, boot_handlers)?;
        state.loaded = Some(descriptor);
        Ok(descriptor)
    }

    /// The descriptor IDTR was loaded with, once initialized.
    pub fn loaded(&self) -> Option<TableDescriptor> {
        self.state.lock().loaded
    }
}

impl Default for BootTable {
    fn default() -> Self {
        Self::new()
    }
}
