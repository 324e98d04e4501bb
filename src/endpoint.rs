//! Endpoint requirements
//!
//! Describe the endpoints of your device with [`Endpoints`]. The table is
//! built in a `const` context, so that mistakes (an endpoint that doesn't
//! exist, a packet that's too large) fail the build instead of the device.
//!
//! ```
//! use bdt_usbd::Endpoints;
//!
//! // Endpoint 0 uses 8 byte packets. Endpoint 1 is a 32 byte bidirectional
//! // pipe, and endpoint 2 only sends 8 byte packets to the host.
//! const ENDPOINTS: Endpoints<3> = Endpoints::new(8)
//!     .bidirectional(1, 32, 32)
//!     .in_only(2, 8);
//!
//! assert_eq!(ENDPOINTS.required_memory(), 2 * 8 + 32 + 32 + 8);
//! ```

use crate::sie::MAX_ENDPOINTS;

/// The largest packet of a full-speed bulk or interrupt endpoint
pub const MAX_PACKET_SIZE: usize = 64;

/// Hardware endpoint control codes
///
/// These are the values written to an endpoint's `UEP` register.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum EndpointMode {
    Disabled = 0x00,
    InOnly = 0x02,
    OutOnly = 0x04,
    /// IN, OUT and SETUP tokens. Only used with endpoint 0.
    Control = 0x06,
    /// IN and OUT tokens, no SETUP
    Bidirectional = 0x0E,
}

/// Packet sizes for one endpoint
///
/// A size of zero disables that direction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct EndpointConfig {
    /// Max packet size received from the host
    pub out_size: usize,
    /// Max packet size sent to the host
    pub in_size: usize,
}

impl EndpointConfig {
    /// A disabled endpoint
    pub const DISABLED: Self = EndpointConfig {
        out_size: 0,
        in_size: 0,
    };

    /// Computes the hardware enable code for a non-control endpoint
    ///
    /// Both directions always produce the bidirectional code.
    pub const fn mode(&self) -> EndpointMode {
        match (self.out_size > 0, self.in_size > 0) {
            (false, false) => EndpointMode::Disabled,
            (true, false) => EndpointMode::OutOnly,
            (false, true) => EndpointMode::InOnly,
            (true, true) => EndpointMode::Bidirectional,
        }
    }

    pub const fn is_disabled(&self) -> bool {
        self.out_size == 0 && self.in_size == 0
    }
}

/// The endpoint requirements of a device
///
/// `COUNT` is the number of endpoints, including endpoint 0. It must be
/// between 1 and 16.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Endpoints<const COUNT: usize> {
    configs: [EndpointConfig; COUNT],
}

impl<const COUNT: usize> Endpoints<COUNT> {
    /// Start a table with a control endpoint 0
    ///
    /// All other endpoints are disabled.
    ///
    /// # Panics
    ///
    /// Panics if `COUNT` isn't supported, or if `ep0_max_packet` isn't one of
    /// 8, 16, 32 or 64. In a `const` context, this is a build error.
    pub const fn new(ep0_max_packet: usize) -> Self {
        assert!(
            COUNT >= 1 && COUNT <= MAX_ENDPOINTS,
            "Endpoint count must be between 1 and 16"
        );
        assert!(
            matches!(ep0_max_packet, 8 | 16 | 32 | 64),
            "Endpoint 0 max packet size must be 8, 16, 32 or 64"
        );
        let mut configs = [EndpointConfig::DISABLED; COUNT];
        configs[0] = EndpointConfig {
            out_size: ep0_max_packet,
            in_size: ep0_max_packet,
        };
        Endpoints { configs }
    }

    const fn with(mut self, endpoint: usize, out_size: usize, in_size: usize) -> Self {
        assert!(
            endpoint >= 1 && endpoint < COUNT,
            "Endpoint index out of range"
        );
        assert!(
            out_size <= MAX_PACKET_SIZE && in_size <= MAX_PACKET_SIZE,
            "Packet size exceeds the full-speed limit"
        );
        self.configs[endpoint] = EndpointConfig { out_size, in_size };
        self
    }

    /// Enable OUT (host to device) transfers on `endpoint`
    pub const fn out_only(self, endpoint: usize, size: usize) -> Self {
        self.with(endpoint, size, 0)
    }

    /// Enable IN (device to host) transfers on `endpoint`
    pub const fn in_only(self, endpoint: usize, size: usize) -> Self {
        self.with(endpoint, 0, size)
    }

    /// Enable transfers in both directions on `endpoint`
    pub const fn bidirectional(self, endpoint: usize, out_size: usize, in_size: usize) -> Self {
        self.with(endpoint, out_size, in_size)
    }

    /// The number of pool bytes needed by all endpoints
    ///
    /// Endpoint 0 reserves one packet in each direction.
    pub const fn required_memory(&self) -> usize {
        let mut total = 0;
        let mut idx = 0;
        while idx < COUNT {
            total += self.configs[idx].out_size + self.configs[idx].in_size;
            idx += 1;
        }
        total
    }

    /// The max packet size of endpoint 0
    pub const fn ep0_max_packet(&self) -> usize {
        self.configs[0].out_size
    }

    pub(crate) fn as_slice(&self) -> &[EndpointConfig] {
        &self.configs
    }
}

#[cfg(test)]
mod tests {
    use super::{EndpointConfig, EndpointMode, Endpoints};

    #[test]
    fn modes() {
        let ep = |out_size, in_size| EndpointConfig { out_size, in_size }.mode();
        assert_eq!(ep(0, 0), EndpointMode::Disabled);
        assert_eq!(ep(8, 0), EndpointMode::OutOnly);
        assert_eq!(ep(0, 8), EndpointMode::InOnly);
        assert_eq!(ep(8, 8), EndpointMode::Bidirectional);
        assert_eq!(EndpointMode::Bidirectional as u8, 0x0E);
        assert_eq!(EndpointMode::Control as u8, 0x06);
    }

    #[test]
    fn builder() {
        const ENDPOINTS: Endpoints<4> = Endpoints::new(16)
            .out_only(1, 8)
            .in_only(2, 64)
            .bidirectional(3, 32, 16);

        let configs = ENDPOINTS.as_slice();
        assert_eq!(configs.len(), 4);
        assert_eq!(configs[0].mode(), EndpointMode::Bidirectional);
        assert_eq!(ENDPOINTS.ep0_max_packet(), 16);
        assert_eq!(configs[1], EndpointConfig { out_size: 8, in_size: 0 });
        assert_eq!(configs[2], EndpointConfig { out_size: 0, in_size: 64 });
        assert_eq!(configs[3], EndpointConfig { out_size: 32, in_size: 16 });
        assert_eq!(ENDPOINTS.required_memory(), 32 + 8 + 64 + 48);
    }

    #[test]
    fn control_only() {
        let endpoints = Endpoints::<1>::new(64);
        assert_eq!(endpoints.required_memory(), 128);
    }

    #[test]
    #[should_panic]
    fn endpoint_zero_is_reserved() {
        let _ = Endpoints::<3>::new(8).out_only(0, 8);
    }

    #[test]
    #[should_panic]
    fn endpoint_out_of_range() {
        let _ = Endpoints::<3>::new(8).in_only(3, 8);
    }

    #[test]
    #[should_panic]
    fn packet_too_large() {
        let _ = Endpoints::<3>::new(8).bidirectional(1, 8, 65);
    }

    #[test]
    #[should_panic]
    fn bad_ep0_size() {
        let _ = Endpoints::<3>::new(12);
    }
}
