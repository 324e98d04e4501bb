//! Serial interface engine (SIE) registers
//!
//! The module implements a RAL-compatible interface for the byte-wide
//! USB controller registers. Field positions follow the classic
//! full-speed SIE found next to a buffer descriptor table.

#![allow(non_snake_case, non_upper_case_globals)]

use crate::vcell::VCell;

/// The maximum number of endpoints the SIE can address
pub const MAX_ENDPOINTS: usize = 16;

#[repr(C)]
pub struct RegisterBlock {
    /// Interrupt status
    pub UIR: VCell<u8>,
    /// Interrupt enable
    pub UIE: VCell<u8>,
    /// Error interrupt status
    pub UEIR: VCell<u8>,
    /// Error interrupt enable
    pub UEIE: VCell<u8>,
    /// Last completed token
    pub USTAT: VCell<u8>,
    pub UCTRL: VCell<u8>,
    pub UADDR: VCell<u8>,
    /// Software-maintained device state, visible to the SIE
    pub USWSTAT: VCell<u8>,
    UEP: [VCell<u8>; MAX_ENDPOINTS],
}

// Safety: the register block is only shared between the driver and the
// hardware (or the test model of the hardware). All access is volatile.
unsafe impl Sync for RegisterBlock {}

impl RegisterBlock {
    /// Create a register block with all registers cleared
    ///
    /// Only useful when the "hardware" is memory you own, like in tests.
    pub const fn new() -> Self {
        const ZERO: VCell<u8> = VCell::new(0);
        RegisterBlock {
            UIR: ZERO,
            UIE: ZERO,
            UEIR: ZERO,
            UEIE: ZERO,
            USTAT: ZERO,
            UCTRL: ZERO,
            UADDR: ZERO,
            USWSTAT: ZERO,
            UEP: [ZERO; MAX_ENDPOINTS],
        }
    }
}

impl Default for RegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Declares the interrupt bits shared by `UIR` and `UIE`
macro_rules! interrupt_fields {
    () => {
        pub mod URST {
            pub const offset: u8 = 0;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod UERR {
            pub const offset: u8 = 1;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod ACTIVITY {
            pub const offset: u8 = 2;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod TOKDNE {
            pub const offset: u8 = 3;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod UIDLE {
            pub const offset: u8 = 4;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod STALL {
            pub const offset: u8 = 5;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    };
}

pub mod UIR {
    interrupt_fields!();
}

pub mod UIE {
    interrupt_fields!();
}

pub mod USTAT {
    pub mod DIR {
        pub const offset: u8 = 2;
        pub const mask: u8 = 1 << offset;
        pub mod RW {
            pub const OUT: u8 = 0;
            pub const IN: u8 = 1;
        }
        pub mod R {}
        pub mod W {}
    }
    pub mod ENDP {
        pub const offset: u8 = 3;
        pub const mask: u8 = 0xF << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

pub mod UCTRL {
    pub mod SUSPND {
        pub const offset: u8 = 1;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod DEVATT {
        pub const offset: u8 = 3;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod PKTDIS {
        pub const offset: u8 = 4;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    /// Read only; live single-ended zero on the bus
    pub mod SE0 {
        pub const offset: u8 = 5;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

pub mod UADDR {
    pub mod ADDR {
        pub const offset: u8 = 0;
        pub const mask: u8 = 0x7F << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

pub mod USWSTAT {
    pub mod STATE {
        pub const offset: u8 = 0;
        pub const mask: u8 = 0x3 << offset;
        pub mod RW {
            pub const POWERED: u8 = 0;
            pub const DEFAULT: u8 = 1;
            pub const ADDRESS: u8 = 2;
            pub const CONFIGURED: u8 = 3;
        }
        pub mod R {}
        pub mod W {}
    }
}

/// The RAL API requires us to treat all endpoint control registers as unique.
/// We can make it a little easier with this function, the `Uep` type,
/// and the helper module.
pub mod endpoint_control {
    use super::RegisterBlock;
    use crate::vcell::VCell;

    pub struct Uep<'a> {
        pub UEP: &'a VCell<u8>,
    }

    pub fn register(sie: &RegisterBlock, endpoint: usize) -> Uep<'_> {
        Uep {
            UEP: sie
                .UEP
                .get(endpoint)
                .unwrap_or_else(|| unreachable!("UEP register {} doesn't exist", endpoint)),
        }
    }

    pub mod UEP {
        /// Set by the SIE after it sent a STALL handshake
        pub mod EPSTALL {
            pub const offset: u8 = 0;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod EPINEN {
            pub const offset: u8 = 1;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod EPOUTEN {
            pub const offset: u8 = 2;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod EPCONDIS {
            pub const offset: u8 = 3;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }
}
