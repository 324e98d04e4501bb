//! Buffer descriptors (BD)
//!
//! The module implements a RAL-compatible interface for working
//! with buffer descriptors. A buffer descriptor is shared between the
//! firmware and the SIE. The `UOWN` bit decides who may touch it: when
//! set, the SIE owns the descriptor and its buffer, and the firmware must
//! treat both as read-only until the SIE hands them back.
//!
//! The `STAT` byte changes meaning with ownership. While the firmware owns
//! the descriptor, bits 5..2 hold the PID of the last token. While the SIE
//! owns it, bit 3 enables data toggle synchronization and bit 2 requests a
//! STALL handshake.

#![allow(non_snake_case, non_upper_case_globals)]

use crate::{ral, vcell::VCell};

/// A data toggle (packet sequence) value
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Toggle {
    Data0,
    Data1,
}

impl Toggle {
    /// Returns the other toggle value
    pub const fn flip(self) -> Self {
        match self {
            Toggle::Data0 => Toggle::Data1,
            Toggle::Data1 => Toggle::Data0,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Toggle::Data0 => 0,
            Toggle::Data1 => 1,
        }
    }
}

/// Who may access a buffer descriptor
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Owner {
    /// The firmware (this driver, or its users)
    Cpu,
    /// The serial interface engine
    Sie,
}

/// The token that completed on a firmware-owned descriptor
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Pid {
    Out,
    In,
    Setup,
}

/// How the SIE should check the toggle of received packets
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ToggleCheck {
    /// Only accept packets carrying this toggle
    Checked(Toggle),
    /// Accept any toggle
    Ignored,
}

#[repr(C)]
pub struct Bd {
    pub STAT: VCell<u8>,
    pub CNT: VCell<u8>,
    /// Offset of the buffer in the endpoint memory pool
    pub ADR: VCell<u16>,
}

impl Bd {
    pub const fn new() -> Self {
        Bd {
            STAT: VCell::new(0),
            CNT: VCell::new(0),
            ADR: VCell::new(0),
        }
    }

    pub fn owner(&self) -> Owner {
        if ral::read_reg!(crate::bd, self, STAT, UOWN == 1) {
            Owner::Sie
        } else {
            Owner::Cpu
        }
    }

    /// The toggle of the last packet, or the toggle of the next packet
    /// while the SIE owns the descriptor
    pub fn toggle(&self) -> Toggle {
        if ral::read_reg!(crate::bd, self, STAT, DTS == 1) {
            Toggle::Data1
        } else {
            Toggle::Data0
        }
    }

    /// The PID of the last completed token
    ///
    /// Returns `None` while the SIE owns the descriptor, or if the
    /// PID isn't a token PID.
    pub fn pid(&self) -> Option<Pid> {
        if self.owner() == Owner::Sie {
            return None;
        }
        match ral::read_reg!(crate::bd, self, STAT, PID) {
            STAT::PID::RW::OUT => Some(Pid::Out),
            STAT::PID::RW::IN => Some(Pid::In),
            STAT::PID::RW::SETUP => Some(Pid::Setup),
            _ => None,
        }
    }

    /// Indicates if the SIE answers this descriptor with a STALL handshake
    pub fn is_stalled(&self) -> bool {
        ral::read_reg!(crate::bd, self, STAT, UOWN == 1)
            && ral::read_reg!(crate::bd, self, STAT, BSTALL == 1)
    }

    pub fn count(&self) -> usize {
        self.CNT.read() as usize
    }

    pub fn set_count(&self, count: usize) {
        self.CNT.write(count.min(u8::MAX as usize) as u8);
    }

    pub fn address(&self) -> usize {
        self.ADR.read() as usize
    }

    pub fn set_address(&self, address: usize) {
        self.ADR.write(address as u16);
    }

    /// Hand the descriptor to the SIE
    ///
    /// The count is written before the status byte, so the SIE never
    /// observes ownership with a stale count.
    pub fn give(&self, count: usize, check: ToggleCheck) {
        self.set_count(count);
        match check {
            ToggleCheck::Checked(toggle) => {
                ral::write_reg!(crate::bd, self, STAT, UOWN: 1, DTS: toggle.bit(), DTSEN: 1)
            }
            ToggleCheck::Ignored => ral::write_reg!(crate::bd, self, STAT, UOWN: 1),
        }
    }

    /// Hand the descriptor to the SIE, answering every token with STALL
    pub fn stall(&self) {
        ral::write_reg!(crate::bd, self, STAT, UOWN: 1, BSTALL: 1);
    }

    /// Take the descriptor back from, or keep it away from, the SIE
    ///
    /// `toggle` is remembered as the last toggle used.
    pub fn release(&self, toggle: Toggle) {
        ral::write_reg!(crate::bd, self, STAT, DTS: toggle.bit());
    }

    /// Clear everything, leaving the descriptor with the firmware
    pub fn clear(&self) {
        ral::write_reg!(crate::bd, self, STAT, 0);
    }
}

/// The OUT and IN descriptors of one endpoint
#[repr(C)]
pub struct BdPair {
    pub out: Bd,
    pub r#in: Bd,
}

impl BdPair {
    pub const fn new() -> Self {
        BdPair {
            out: Bd::new(),
            r#in: Bd::new(),
        }
    }
}

pub mod STAT {
    pub mod UOWN {
        pub const offset: u8 = 7;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod DTS {
        pub const offset: u8 = 6;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    /// Only meaningful when the firmware owns the descriptor
    pub mod PID {
        pub const offset: u8 = 2;
        pub const mask: u8 = 0xF << offset;
        pub mod RW {
            pub const OUT: u8 = 0b0001;
            pub const IN: u8 = 0b1001;
            pub const SETUP: u8 = 0b1101;
        }
        pub mod R {}
        pub mod W {}
    }
    /// Only meaningful when the SIE owns the descriptor
    pub mod DTSEN {
        pub const offset: u8 = 3;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    /// Only meaningful when the SIE owns the descriptor
    pub mod BSTALL {
        pub const offset: u8 = 2;
        pub const mask: u8 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

const _: [(); 1] = [(); (core::mem::size_of::<Bd>() == 4) as usize];
const _: [(); 1] = [(); (core::mem::size_of::<BdPair>() == 8) as usize];

#[cfg(test)]
mod test {
    use super::{Bd, Owner, Pid, Toggle, ToggleCheck};
    use crate::ral;

    #[test]
    fn uown() {
        let bd = Bd::new();
        ral::write_reg!(super, &bd, STAT, UOWN: 1);
        assert_eq!(bd.STAT.read(), 0x80);
        assert_eq!(bd.owner(), Owner::Sie);
    }

    #[test]
    fn dts() {
        let bd = Bd::new();
        ral::write_reg!(super, &bd, STAT, DTS: 1);
        assert_eq!(bd.STAT.read(), 0x40);
        assert_eq!(bd.toggle(), Toggle::Data1);
    }

    #[test]
    fn pid() {
        let bd = Bd::new();
        ral::write_reg!(super, &bd, STAT, PID: SETUP);
        assert_eq!(bd.STAT.read(), 0x34);
        assert_eq!(bd.pid(), Some(Pid::Setup));

        ral::write_reg!(super, &bd, STAT, PID: IN);
        assert_eq!(bd.STAT.read(), 0x24);
        assert_eq!(bd.pid(), Some(Pid::In));

        ral::write_reg!(super, &bd, STAT, PID: OUT, DTS: 1);
        assert_eq!(bd.STAT.read(), 0x44);
        assert_eq!(bd.pid(), Some(Pid::Out));
        assert_eq!(bd.toggle(), Toggle::Data1);
    }

    #[test]
    fn no_pid_while_sie_owned() {
        let bd = Bd::new();
        bd.give(8, ToggleCheck::Checked(Toggle::Data0));
        assert_eq!(bd.pid(), None);
    }

    #[test]
    fn give_checked() {
        let bd = Bd::new();
        bd.give(8, ToggleCheck::Checked(Toggle::Data0));
        assert_eq!(bd.STAT.read(), 0x88);
        assert_eq!(bd.count(), 8);

        bd.give(3, ToggleCheck::Checked(Toggle::Data1));
        assert_eq!(bd.STAT.read(), 0xC8);
        assert_eq!(bd.count(), 3);
    }

    #[test]
    fn give_ignored() {
        let bd = Bd::new();
        bd.give(8, ToggleCheck::Ignored);
        assert_eq!(bd.STAT.read(), 0x80);
    }

    #[test]
    fn stall() {
        let bd = Bd::new();
        bd.stall();
        assert_eq!(bd.STAT.read(), 0x84);
        assert!(bd.is_stalled());
        assert_eq!(bd.owner(), Owner::Sie);

        // A firmware-owned OUT PID has bit 2 set, but it's not a stall
        bd.clear();
        ral::write_reg!(super, &bd, STAT, PID: OUT);
        assert!(!bd.is_stalled());
    }

    #[test]
    fn release() {
        let bd = Bd::new();
        bd.give(8, ToggleCheck::Checked(Toggle::Data0));
        bd.release(Toggle::Data1);
        assert_eq!(bd.STAT.read(), 0x40);
        assert_eq!(bd.owner(), Owner::Cpu);
    }

    #[test]
    fn toggle_flip() {
        assert_eq!(Toggle::Data0.flip(), Toggle::Data1);
        assert_eq!(Toggle::Data1.flip(), Toggle::Data0);
    }
}
