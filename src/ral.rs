//! Register access for the SIE
//!
//! Re-exports the `ral-registers` macros, and turns a [`Peripherals`]
//! implementation into a typed register block. This is the only module
//! that sees raw register addresses.

use core::ops::Deref;

use crate::{sie::RegisterBlock, Peripherals};

pub use ral_registers::{modify_reg, read_reg, write_reg};

/// A handle to the SIE registers
pub struct Instance {
    ptr: *const RegisterBlock,
}

// Safety: the register block is `Sync`, and the instance is the only way
// for the driver to reach it.
unsafe impl Send for Instance {}

impl Deref for Instance {
    type Target = RegisterBlock;
    fn deref(&self) -> &RegisterBlock {
        // Safety: Peripherals implementation guarantees that the
        // pointer is valid for the life of the driver.
        unsafe { &*self.ptr }
    }
}

/// Acquire the register block from the user's peripherals
pub fn instance<P: Peripherals>(peripherals: P) -> Instance {
    Instance {
        ptr: peripherals.sie().cast(),
    }
}
