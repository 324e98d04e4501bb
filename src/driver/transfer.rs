//! Endpoint transfers
//!
//! Every operation checks descriptor ownership before it touches a buffer.
//! A descriptor that belongs to the SIE is never modified, except to stall
//! it, or when a reset revokes it.

use super::Driver;
use crate::{
    bd::{Owner, Toggle, ToggleCheck},
    buffer::Buffer,
    ral,
    sie::endpoint_control,
};
use usb_device::{endpoint::EndpointAddress, UsbDirection, UsbError};

/// Selects the data toggle of the next packet
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TogglePolicy {
    Data0,
    Data1,
    /// The opposite of the descriptor's last toggle
    Alternate,
    /// The last toggle of the endpoint's OUT descriptor
    ///
    /// Endpoint 0 answers control requests this way. When re-arming an OUT
    /// descriptor, this keeps the last toggle.
    MirrorOut,
}

impl Driver {
    fn resolve(&self, endpoint: usize, last: Toggle, policy: TogglePolicy) -> Toggle {
        match policy {
            TogglePolicy::Data0 => Toggle::Data0,
            TogglePolicy::Data1 => Toggle::Data1,
            TogglePolicy::Alternate => last.flip(),
            TogglePolicy::MirrorOut => self.ram.bdt.out(endpoint).toggle(),
        }
    }

    /// Send `len` bytes from the endpoint's IN buffer
    ///
    /// Returns `WouldBlock` if the previous packet is still waiting for the
    /// host.
    pub fn flush_in(
        &mut self,
        endpoint: usize,
        len: usize,
        policy: TogglePolicy,
    ) -> Result<(), UsbError> {
        let (bd, size) = self.in_endpoint(endpoint)?;
        if len > size {
            return Err(UsbError::BufferOverflow);
        }
        if bd.owner() == Owner::Sie {
            return Err(UsbError::WouldBlock);
        }

        let toggle = self.resolve(endpoint, bd.toggle(), policy);
        bd.give(len, ToggleCheck::Checked(toggle));
        trace!("EP{=usize} IN {=usize} DATA{=u8}", endpoint, len, toggle as u8);
        Ok(())
    }

    /// Prepare the endpoint to receive the next packet
    ///
    /// Any unread data is dropped.
    pub fn flush_out(&mut self, endpoint: usize, policy: TogglePolicy) -> Result<(), UsbError> {
        let (bd, size) = self.out_endpoint(endpoint)?;
        if bd.owner() == Owner::Sie {
            return Err(UsbError::WouldBlock);
        }

        let toggle = self.resolve(endpoint, bd.toggle(), policy);
        self.pending &= !(1 << endpoint);
        bd.give(size, self.rx_check(toggle));
        Ok(())
    }

    /// Send a packet to the host
    ///
    /// Copies `data` into the endpoint's IN buffer, then hands the buffer
    /// to the SIE. Returns the number of bytes queued.
    ///
    /// If the endpoint is stalled, the packet is held until you
    /// [`unstall()`](Driver::unstall) the endpoint. It then goes out as
    /// DATA0, regardless of `policy`.
    ///
    /// Endpoint 0 answers through your [`TokenHandler`](crate::TokenHandler);
    /// writing to it here returns `InvalidEndpoint`.
    pub fn put_packet(
        &mut self,
        endpoint: usize,
        data: &[u8],
        policy: TogglePolicy,
    ) -> Result<usize, UsbError> {
        if endpoint == 0 {
            return Err(UsbError::InvalidEndpoint);
        }
        let (bd, size) = self.in_endpoint(endpoint)?;
        if data.len() > size {
            return Err(UsbError::BufferOverflow);
        }

        let buffer = Buffer::new(self.ram.memory, bd.address(), size);
        if bd.is_stalled() {
            if self.held[endpoint].is_some() {
                return Err(UsbError::WouldBlock);
            }
            let written = buffer.volatile_write(data);
            self.held[endpoint] = Some(written);
            debug!("EP{=usize} IN held {=usize}", endpoint, written);
            return Ok(written);
        }
        if bd.owner() == Owner::Sie {
            return Err(UsbError::WouldBlock);
        }

        let written = buffer.volatile_write(data);
        self.flush_in(endpoint, written, policy)?;
        Ok(written)
    }

    /// Read a packet received from the host
    ///
    /// Copies the packet into `buffer`, truncating it if `buffer` is too
    /// small, then re-arms the endpoint for the next packet. Returns the
    /// number of bytes copied, or `WouldBlock` if there's nothing to read.
    ///
    /// Endpoint 0 data is read with [`read_ep0()`](Driver::read_ep0).
    pub fn get_packet(&mut self, endpoint: usize, buffer: &mut [u8]) -> Result<usize, UsbError> {
        if endpoint == 0 {
            return Err(UsbError::InvalidEndpoint);
        }
        let (bd, size) = self.out_endpoint(endpoint)?;
        if bd.owner() == Owner::Sie || !self.data_available(endpoint) {
            return Err(UsbError::WouldBlock);
        }

        let received = bd.count().min(size);
        let read = Buffer::new(self.ram.memory, bd.address(), received).volatile_read(buffer);
        self.flush_out(endpoint, TogglePolicy::Alternate)?;
        trace!("EP{=usize} OUT {=usize}", endpoint, read);
        Ok(read)
    }

    /// Indicates if [`put_packet()`](Driver::put_packet) can send a packet
    /// without waiting
    pub fn tx_ready(&self, endpoint: usize) -> bool {
        match self.in_endpoint(endpoint) {
            Ok((bd, _)) => bd.owner() == Owner::Cpu,
            Err(_) => false,
        }
    }

    /// Indicates if [`get_packet()`](Driver::get_packet) has data to return
    pub fn data_available(&self, endpoint: usize) -> bool {
        endpoint < self.endpoint_count() && self.pending & (1 << endpoint) != 0
    }

    /// Answer every token on the endpoint with STALL
    pub fn stall(&mut self, address: EndpointAddress) -> Result<(), UsbError> {
        let endpoint = address.index();
        match address.direction() {
            UsbDirection::Out => {
                let (bd, _) = self.out_endpoint(endpoint)?;
                self.pending &= !(1 << endpoint);
                bd.stall();
            }
            UsbDirection::In => {
                let (bd, _) = self.in_endpoint(endpoint)?;
                // A packet that the host hasn't taken is held until unstall.
                if bd.owner() == Owner::Sie && !bd.is_stalled() && endpoint != 0 {
                    self.held[endpoint] = Some(bd.count());
                }
                bd.stall();
            }
        }
        debug!("EP{=usize} STALL", endpoint);
        Ok(())
    }

    /// Stop stalling the endpoint, and restart its data toggle at DATA0
    ///
    /// An OUT endpoint is ready to receive. An IN endpoint sends the packet
    /// held by [`put_packet()`](Driver::put_packet), if any.
    pub fn unstall(&mut self, address: EndpointAddress) -> Result<(), UsbError> {
        let endpoint = address.index();
        match address.direction() {
            UsbDirection::Out => {
                let (bd, size) = self.out_endpoint(endpoint)?;
                if bd.is_stalled() {
                    bd.give(size, self.rx_check(Toggle::Data0));
                }
            }
            UsbDirection::In => {
                let (bd, _) = self.in_endpoint(endpoint)?;
                if bd.is_stalled() {
                    match self.held[endpoint].take() {
                        Some(len) => bd.give(len, ToggleCheck::Checked(Toggle::Data0)),
                        // The next alternating packet is DATA0.
                        None => bd.release(Toggle::Data1),
                    }
                }
            }
        }
        let uep = endpoint_control::register(&self.sie, endpoint);
        ral::modify_reg!(crate::sie::endpoint_control, &uep, UEP, EPSTALL: 0);
        debug!("EP{=usize} UNSTALL", endpoint);
        Ok(())
    }

    /// Indicates if the endpoint answers with STALL
    pub fn is_stalled(&self, address: EndpointAddress) -> bool {
        let endpoint = address.index();
        let bd = match address.direction() {
            UsbDirection::Out => self.out_endpoint(endpoint),
            UsbDirection::In => self.in_endpoint(endpoint),
        };
        bd.map(|(bd, _)| bd.is_stalled()).unwrap_or(false)
    }

    /// The last (or next, while the SIE owns the descriptor) data toggle
    ///
    /// Returns `None` if the endpoint isn't usable.
    pub fn toggle(&self, address: EndpointAddress) -> Option<Toggle> {
        let endpoint = address.index();
        let bd = match address.direction() {
            UsbDirection::Out => self.out_endpoint(endpoint),
            UsbDirection::In => self.in_endpoint(endpoint),
        };
        bd.ok().map(|(bd, _)| bd.toggle())
    }
}
