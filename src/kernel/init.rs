//! Kernel initialization phases
use core::fmt::Display;

use crate::{interrupts, println, serial};

/// Bring up the console and the interrupt system, in that order. The first
/// failing phase stops the boot.
pub fn init_kernel() -> Result<(), interrupts::InterruptError> {
    serial::init();

    println!("╔════════════════════════════════════════╗");
    println!("║     Protected-Mode Interrupt Core      ║");
    println!("╚════════════════════════════════════════╝\n");

    init_phase(1, "Interrupt System", interrupts::init)?;

    println!("\n✅ Kernel initialization complete!\n");
    Ok(())
}

fn init_phase<E: Display>(
    step: usize,
    name: &'static str,
    init_fn: fn() -> Result<(), E>,
) -> Result<(), E> {
    println!("[{}/{}] Initializing {}...", step, PHASES, name);

    match init_fn() {
        Ok(()) => {
            println!("    ✓ {} initialized successfully\n", name);
            Ok(())
        }
        Err(e) => {
            println!("    ✗ {} failed: {}\n", name, e);
            Err(e)
        }
    }
}

const PHASES: usize = 1;
