//! Device states and interrupt sources

use crate::{ral, sie::RegisterBlock};

/// The USB device state
///
/// A normal enumeration visits every state, in declaration order. A bus
/// reset returns the device to `Default` from any state but `Detached`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum DeviceState {
    /// The device isn't signaling its presence on the bus
    Detached,
    /// Signaling presence, waiting for the bus to settle
    Attached,
    /// The bus is up; waiting for the first reset
    Powered,
    /// Reset, responding at address 0
    Default,
    /// Responding at a unique address
    Address,
    /// Non-control endpoints are active
    Configured,
}

impl DeviceState {
    /// Mirror the state into the SIE's software state register
    pub(crate) fn apply(self, sie: &RegisterBlock) {
        match self {
            DeviceState::Detached | DeviceState::Attached | DeviceState::Powered => {
                ral::write_reg!(crate::sie, sie, USWSTAT, STATE: POWERED)
            }
            DeviceState::Default => ral::write_reg!(crate::sie, sie, USWSTAT, STATE: DEFAULT),
            DeviceState::Address => ral::write_reg!(crate::sie, sie, USWSTAT, STATE: ADDRESS),
            DeviceState::Configured => {
                ral::write_reg!(crate::sie, sie, USWSTAT, STATE: CONFIGURED)
            }
        }
    }
}

bitflags::bitflags! {
    /// SIE interrupt causes, as they appear in `UIR` and `UIE`
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Interrupts : u8 {
        /// Bus reset
        const RESET = 1 << 0;
        /// Transfer error; see `UEIR`
        const ERROR = 1 << 1;
        /// Bus activity after an idle period
        const ACTIVITY = 1 << 2;
        /// A token completed
        const TOKEN = 1 << 3;
        /// The bus was idle for at least 3ms
        const IDLE = 1 << 4;
        /// The SIE sent a STALL handshake
        const STALL = 1 << 5;
    }
}

impl Interrupts {
    /// Sources enabled right after attaching to the bus
    pub(crate) const ATTACH: Self = Self::IDLE.union(Self::RESET);
}

// The flags have to match the SIE register fields.
const _: [(); 1] = [(); (Interrupts::RESET.bits() == crate::sie::UIR::URST::mask) as usize];
const _: [(); 1] = [(); (Interrupts::TOKEN.bits() == crate::sie::UIR::TOKDNE::mask) as usize];
const _: [(); 1] = [(); (Interrupts::STALL.bits() == crate::sie::UIE::STALL::mask) as usize];
