//! A model of the SIE and the host, for testing the driver
//!
//! The [`Host`] plays the hardware side of the ownership protocol. It only
//! touches a descriptor that the SIE owns, and it hands the descriptor back
//! when a token completes. Like the real SIE, it queues a single completed
//! token; further tokens are NAKed until the driver clears `TOKDNE`.

use std::{boxed::Box, vec::Vec};

use crate::{
    bd::{Bd, Owner, Toggle},
    buffer::Buffer,
    device::Interrupts,
    endpoint::Endpoints,
    errors::ErrorFlags,
    handler::{Ep0Response, TokenHandler},
    ral,
    sie::{endpoint_control, RegisterBlock, MAX_ENDPOINTS},
    state::{Resources, UsbRam},
    Config, Driver, Peripherals,
};

/// Allocate a value for the rest of the test program
pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// SIE registers in host memory
pub struct Sie {
    block: &'static RegisterBlock,
}

impl Sie {
    pub fn new() -> Self {
        Sie {
            block: leak(RegisterBlock::new()),
        }
    }
}

unsafe impl Peripherals for Sie {
    fn sie(&self) -> *const () {
        self.block as *const RegisterBlock as *const ()
    }
}

/// Create a driver, and a host that's connected to it
pub fn device<const COUNT: usize, const SIZE: usize>(
    endpoints: Endpoints<COUNT>,
    config: Config,
) -> (Driver, Host) {
    let ram = leak(UsbRam::<COUNT, SIZE>::new(endpoints));
    let sie = Sie::new();
    let host = Host {
        sie: sie.block,
        ram: ram.resources(),
        address: 0,
    };
    (Driver::new(sie, ram, config), host)
}

/// A handler that rejects every control request
pub struct Stalls;

impl TokenHandler for Stalls {
    fn setup(&mut self, _: &mut Driver) -> Ep0Response {
        Ep0Response::Stall
    }
}

/// The outcome of a transaction, from the host's view
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Transaction {
    Ack,
    Nak,
    Stall,
    /// Acknowledged, but dropped by the SIE because of a toggle mismatch
    Discarded,
    /// No response; the device isn't listening on this address or endpoint
    Ignored,
}

/// Data received from an IN endpoint
#[derive(PartialEq, Eq, Debug)]
pub struct Packet {
    pub data: Vec<u8>,
    pub toggle: Toggle,
}

pub struct Host {
    sie: &'static RegisterBlock,
    ram: Resources<'static>,
    address: u8,
}

impl Host {
    pub fn sie(&self) -> &RegisterBlock {
        self.sie
    }

    pub fn ram(&self) -> &Resources<'static> {
        &self.ram
    }

    /// The endpoint control register
    pub fn uep(&self, endpoint: usize) -> u8 {
        endpoint_control::register(self.sie, endpoint).UEP.read()
    }

    /// Talk to the device at this address
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Drive (or release) a single-ended zero on the bus
    pub fn se0(&self, se0: bool) {
        ral::modify_reg!(crate::sie, self.sie, UCTRL, SE0: se0 as u8);
    }

    /// Signal a bus reset
    ///
    /// The host talks to address 0 afterwards.
    pub fn reset(&mut self) {
        self.address = 0;
        self.raise(Interrupts::RESET);
    }

    pub fn idle(&self) {
        self.raise(Interrupts::IDLE);
    }

    pub fn activity(&self) {
        self.raise(Interrupts::ACTIVITY);
    }

    /// Signal transfer errors
    pub fn error(&self, flags: ErrorFlags) {
        ral::modify_reg!(crate::sie, self.sie, UEIR, |ueir| ueir | flags.bits());
        self.raise(Interrupts::ERROR);
    }

    fn raise(&self, interrupts: Interrupts) {
        ral::modify_reg!(crate::sie, self.sie, UIR, |uir| uir | interrupts.bits());
    }

    /// Checks if the device listens for this token
    fn listening(&self, endpoint: usize, enable: u8) -> Result<(), Transaction> {
        if ral::read_reg!(crate::sie, self.sie, UCTRL, DEVATT == 0)
            || ral::read_reg!(crate::sie, self.sie, UADDR, ADDR) != self.address
            || endpoint >= MAX_ENDPOINTS
            || self.uep(endpoint) & enable == 0
        {
            return Err(Transaction::Ignored);
        }
        if ral::read_reg!(crate::sie, self.sie, UIR, TOKDNE == 1) {
            return Err(Transaction::Nak);
        }
        Ok(())
    }

    /// Checks if the SIE may use the descriptor
    fn ready(&self, endpoint: usize, bd: &Bd) -> Result<(), Transaction> {
        if bd.owner() == Owner::Cpu {
            Err(Transaction::Nak)
        } else if bd.is_stalled() {
            let uep = endpoint_control::register(self.sie, endpoint);
            ral::modify_reg!(crate::sie::endpoint_control, &uep, UEP, EPSTALL: 1);
            self.raise(Interrupts::STALL);
            Err(Transaction::Stall)
        } else {
            Ok(())
        }
    }

    fn complete(&self, endpoint: usize, is_in: bool) {
        ral::write_reg!(crate::sie, self.sie, USTAT, ENDP: endpoint as u8, DIR: is_in as u8);
        self.raise(Interrupts::TOKEN);
    }

    fn receive(&self, bd: &Bd, data: &[u8]) {
        assert!(data.len() <= bd.count(), "Packet exceeds the descriptor's buffer");
        Buffer::new(self.ram.memory, bd.address(), data.len()).volatile_write(data);
        bd.set_count(data.len());
    }

    /// Send a SETUP packet
    pub fn setup(&self, endpoint: usize, packet: [u8; 8]) -> Transaction {
        use crate::sie::endpoint_control::UEP;
        if let Err(handshake) = self.listening(endpoint, UEP::EPOUTEN::mask) {
            return handshake;
        }
        if self.uep(endpoint) & UEP::EPCONDIS::mask != 0 {
            return Transaction::Ignored;
        }
        if ral::read_reg!(crate::sie, self.sie, UCTRL, PKTDIS == 1) {
            return Transaction::Nak;
        }
        // A SETUP is never stalled. Accepting it clears the descriptor's
        // stall.
        let bd = self.ram.bdt.out(endpoint);
        if bd.owner() == Owner::Cpu {
            return Transaction::Nak;
        }

        self.receive(bd, &packet);
        ral::write_reg!(crate::bd, bd, STAT, PID: SETUP);
        ral::modify_reg!(crate::sie, self.sie, UCTRL, PKTDIS: 1);
        self.complete(endpoint, false);
        Transaction::Ack
    }

    /// Send an OUT packet
    pub fn out(&self, endpoint: usize, data: &[u8], toggle: Toggle) -> Transaction {
        use crate::sie::endpoint_control::UEP;
        if let Err(handshake) = self.listening(endpoint, UEP::EPOUTEN::mask) {
            return handshake;
        }
        let bd = self.ram.bdt.out(endpoint);
        if let Err(handshake) = self.ready(endpoint, bd) {
            return handshake;
        }
        if ral::read_reg!(crate::bd, bd, STAT, DTSEN == 1) && bd.toggle() != toggle {
            return Transaction::Discarded;
        }

        self.receive(bd, data);
        ral::write_reg!(crate::bd, bd, STAT, PID: OUT, DTS: toggle as u8);
        self.complete(endpoint, false);
        Transaction::Ack
    }

    /// Ask for an IN packet, and acknowledge it
    pub fn r#in(&self, endpoint: usize) -> Result<Packet, Transaction> {
        use crate::sie::endpoint_control::UEP;
        self.listening(endpoint, UEP::EPINEN::mask)?;
        let bd = self.ram.bdt.r#in(endpoint);
        self.ready(endpoint, bd)?;

        let mut data = [0; 64];
        let len = Buffer::new(self.ram.memory, bd.address(), bd.count()).volatile_read(&mut data);
        let toggle = bd.toggle();
        ral::write_reg!(crate::bd, bd, STAT, PID: IN, DTS: toggle as u8);
        self.complete(endpoint, true);
        Ok(Packet {
            data: data[..len].to_vec(),
            toggle,
        })
    }
}
