//! USB device driver
//!
//! The driver owns the SIE registers and the USB RAM. It keeps the device
//! state, moves buffer descriptors between the firmware and the SIE, and
//! calls into a [`TokenHandler`](crate::TokenHandler) when tokens complete.

mod isr;
mod transfer;

pub use transfer::TogglePolicy;

use crate::{
    bd::{Bd, Owner, Toggle, ToggleCheck},
    buffer::Buffer,
    config::Config,
    device::{DeviceState, Interrupts},
    endpoint::{EndpointConfig, EndpointMode},
    errors::ErrorCounters,
    handler::Ep0Response,
    ral,
    sie::{endpoint_control, MAX_ENDPOINTS},
    state::{Resources, UsbRam},
    Peripherals,
};
use usb_device::UsbError;

/// Size of a SETUP packet
const SETUP_LEN: usize = 8;

/// A USB device driver
///
/// After you allocate a `Driver` with [`new()`](Driver::new), you must call
/// [`init()`](Driver::init) or [`init_cs()`](Driver::init_cs) once. Then,
/// call [`isr()`](Driver::isr) from your USB interrupt handler, and
/// [`task()`](Driver::task) from your main loop.
///
/// To share the driver between your interrupt handler and your
/// application, see [`BusAdapter`](crate::BusAdapter).
pub struct Driver {
    sie: ral::Instance,
    ram: Resources<'static>,
    config: Config,
    state: DeviceState,
    /// OUT data that hasn't been read, one bit per endpoint.
    pending: u16,
    /// IN packets written while the endpoint was stalled.
    held: [Option<usize>; MAX_ENDPOINTS],
    configuration: u8,
    ep0_response: Ep0Response,
    errors: ErrorCounters,
}

impl Driver {
    /// Create a new `Driver`
    ///
    /// Creation does nothing except for assign static memory to the driver.
    /// The device starts out detached.
    ///
    /// # Panics
    ///
    /// Panics if the USB RAM has already been assigned to another USB
    /// driver.
    pub fn new<P: Peripherals, const COUNT: usize, const SIZE: usize>(
        peripherals: P,
        ram: &'static UsbRam<COUNT, SIZE>,
        config: Config,
    ) -> Self {
        let ram = ram.take().expect("USB RAM already assigned");
        Driver {
            sie: ral::instance(peripherals),
            ram,
            config,
            state: DeviceState::Detached,
            pending: 0,
            held: [None; MAX_ENDPOINTS],
            configuration: 0,
            ep0_response: Ep0Response::Stall,
            errors: ErrorCounters::new(),
        }
    }

    /// Reset the SIE and the driver, leaving the device detached
    ///
    /// Every endpoint is disabled, and every descriptor belongs to the
    /// firmware. Interrupts are disabled.
    pub fn init_cs(&mut self) {
        ral::write_reg!(crate::sie, self.sie, UCTRL, 0);
        ral::write_reg!(crate::sie, self.sie, UIE, 0);
        ral::write_reg!(crate::sie, self.sie, UEIE, 0);
        ral::write_reg!(crate::sie, self.sie, UIR, 0);
        ral::write_reg!(crate::sie, self.sie, UEIR, 0);
        ral::write_reg!(crate::sie, self.sie, UADDR, 0);
        for ep in 0..MAX_ENDPOINTS {
            self.set_mode(ep, EndpointMode::Disabled);
        }
        for ep in 0..self.ram.bdt.len() {
            self.ram.bdt.out(ep).clear();
            self.ram.bdt.r#in(ep).clear();
        }

        self.pending = 0;
        self.held = [None; MAX_ENDPOINTS];
        self.configuration = 0;
        self.ep0_response = Ep0Response::Stall;
        self.errors.clear();
        self.set_state(DeviceState::Detached);
    }

    /// Reset, attach, and power the device
    ///
    /// Use this when the device is powered by the bus, and there's no need
    /// to wait for the bus to settle.
    pub fn init(&mut self) {
        self.init_cs();
        self.attach();
        self.power();
    }

    /// Signal the device's presence on the bus
    ///
    /// The device waits for a bus reset; call [`task()`](Driver::task) to
    /// finish powering the device.
    pub fn attach(&mut self) {
        self.set_state(DeviceState::Attached);
        ral::write_reg!(crate::sie, self.sie, UCTRL, 0);
        ral::write_reg!(crate::sie, self.sie, UIR, 0);
        ral::write_reg!(crate::sie, self.sie, UIE, Interrupts::ATTACH.bits());
        ral::modify_reg!(crate::sie, self.sie, UCTRL, DEVATT: 1);
        debug!("ATTACH");
    }

    /// Leave the bus
    ///
    /// Unread OUT data is dropped.
    pub fn detach(&mut self) {
        self.set_state(DeviceState::Detached);
        ral::write_reg!(crate::sie, self.sie, UCTRL, 0);
        ral::write_reg!(crate::sie, self.sie, UIE, 0);
        self.pending = 0;
        self.held = [None; MAX_ENDPOINTS];
        self.config.set_interrupt_line(false);
        debug!("DETACH");
    }

    /// Follow the bus connection, and power the device once the bus settles
    ///
    /// Call this periodically from your main loop. Without a
    /// [bus sense](Config::bus_sense), the bus is always connected.
    pub fn task(&mut self) {
        let sensed = self.config.is_bus_attached();
        let attached = ral::read_reg!(crate::sie, self.sie, UCTRL, DEVATT == 1);
        if sensed && !attached {
            self.attach();
        } else if !sensed && attached {
            self.detach();
        }

        if self.state == DeviceState::Attached
            && ral::read_reg!(crate::sie, self.sie, UCTRL, SE0 == 0)
        {
            self.power();
        }
    }

    fn power(&mut self) {
        self.set_state(DeviceState::Powered);
        self.config.set_interrupt_line(true);
        debug!("POWERED");
    }

    /// Apply the address assigned by the host
    ///
    /// Call this after the status stage of SET_ADDRESS, usually from
    /// [`TokenHandler::ep0_in`](crate::TokenHandler::ep0_in). Address 0
    /// returns the device to the default state.
    pub fn set_address(&mut self, address: u8) {
        ral::write_reg!(crate::sie, self.sie, UADDR, ADDR: address);
        if address != 0 {
            self.set_state(DeviceState::Address);
        } else {
            self.set_state(DeviceState::Default);
        }
        debug!("ADDRESS {=u8}", address);
    }

    /// Select a configuration
    ///
    /// A non-zero `configuration` enables the endpoints described by your
    /// [`Endpoints`](crate::Endpoints), and moves the device into the
    /// configured state. OUT endpoints are ready to receive DATA0, and IN
    /// endpoints are ready for [`put_packet()`](Driver::put_packet).
    /// Configuration 0 disables every endpoint but endpoint 0, and returns
    /// the device to the address state.
    pub fn configure(&mut self, configuration: u8) {
        self.release_endpoints();
        self.configuration = configuration;
        if configuration == 0 {
            self.set_state(DeviceState::Address);
            debug!("DECONFIGURED");
            return;
        }

        let endpoints = self.ram.endpoints;
        let mut offset = 2 * self.ep0_max_packet();
        for (ep, requirements) in endpoints.iter().enumerate().skip(1) {
            let out = self.ram.bdt.out(ep);
            let r#in = self.ram.bdt.r#in(ep);

            out.set_address(offset);
            offset += requirements.out_size;
            r#in.set_address(offset);
            offset += requirements.in_size;

            if requirements.out_size > 0 {
                out.give(requirements.out_size, self.rx_check(Toggle::Data0));
            }
            // The next alternating packet is DATA0.
            if requirements.in_size > 0 {
                r#in.release(Toggle::Data1);
            }
            self.set_mode(ep, requirements.mode());
        }
        debug_assert!(offset <= self.ram.memory.len());

        self.set_state(DeviceState::Configured);
        debug!("CONFIGURED {=u8}", configuration);
    }

    /// Disable every non-control endpoint, and take back its descriptors
    fn release_endpoints(&mut self) {
        for ep in 1..self.ram.endpoints.len() {
            self.set_mode(ep, EndpointMode::Disabled);
            self.ram.bdt.out(ep).clear();
            self.ram.bdt.r#in(ep).clear();
        }
        self.pending = 0;
        self.held = [None; MAX_ENDPOINTS];
    }

    /// Prepare endpoint 0 for the next SETUP packet
    fn init_ep0_setup(&mut self) {
        let size = self.ep0_max_packet();
        let out = self.ram.bdt.out(0);
        out.set_address(0);
        out.give(size, self.rx_check(Toggle::Data0));

        let r#in = self.ram.bdt.r#in(0);
        r#in.clear();
        r#in.set_address(size);
    }

    /// Answer the next endpoint 0 token, in both directions, with STALL
    fn stall_ep0(&mut self) {
        self.ram.bdt.out(0).stall();
        self.ram.bdt.r#in(0).stall();
        debug!("EP0 STALL");
    }

    fn set_mode(&self, endpoint: usize, mode: EndpointMode) {
        let uep = endpoint_control::register(&self.sie, endpoint);
        ral::write_reg!(crate::sie::endpoint_control, &uep, UEP, mode as u8);
    }

    fn set_state(&mut self, state: DeviceState) {
        self.state = state;
        state.apply(&self.sie);
    }

    /// How to check the toggle of the next received packet
    fn rx_check(&self, toggle: Toggle) -> ToggleCheck {
        if self.config.ignore_rx_toggle {
            ToggleCheck::Ignored
        } else {
            ToggleCheck::Checked(toggle)
        }
    }

    fn ep0_max_packet(&self) -> usize {
        self.ram.endpoints[0].out_size
    }

    /// The device state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// The address assigned by the host
    pub fn address(&self) -> u8 {
        ral::read_reg!(crate::sie, self.sie, UADDR, ADDR)
    }

    /// The configuration selected by the host, or 0 if unconfigured
    pub fn configuration(&self) -> u8 {
        self.configuration
    }

    /// Indicates if the bus is suspended
    pub fn is_suspended(&self) -> bool {
        ral::read_reg!(crate::sie, self.sie, UCTRL, SUSPND == 1)
    }

    /// The last decision about endpoint 0
    ///
    /// While a SETUP packet is being handled, this is
    /// [`Stall`](Ep0Response::Stall).
    pub fn ep0_response(&self) -> Ep0Response {
        self.ep0_response
    }

    /// Transfer error counts
    ///
    /// The counters only advance when [enabled](Config::error_counters).
    pub fn error_counters(&self) -> &ErrorCounters {
        &self.errors
    }

    /// The configuration supplied to [`new()`](Driver::new)
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The last SETUP packet
    ///
    /// Only meaningful during [`TokenHandler::setup`](crate::TokenHandler::setup).
    pub fn setup_packet(&self) -> [u8; SETUP_LEN] {
        let out = self.ram.bdt.out(0);
        let mut setup = [0; SETUP_LEN];
        Buffer::new(self.ram.memory, out.address(), SETUP_LEN).volatile_read(&mut setup);
        setup
    }

    /// Read the data received on endpoint 0 OUT
    ///
    /// Only meaningful during [`TokenHandler::ep0_out`](crate::TokenHandler::ep0_out).
    /// Returns the number of bytes copied into `buffer`.
    pub fn read_ep0(&self, buffer: &mut [u8]) -> usize {
        let out = self.ram.bdt.out(0);
        if out.owner() == Owner::Sie {
            return 0;
        }
        let len = out.count().min(self.ep0_max_packet());
        Buffer::new(self.ram.memory, out.address(), len).volatile_read(buffer)
    }

    /// Stage response data in the endpoint 0 IN buffer
    ///
    /// The data goes out when your handler answers with
    /// [`Respond`](Ep0Response::Respond). Returns the number of bytes
    /// staged.
    pub fn write_ep0(&mut self, data: &[u8]) -> Result<usize, UsbError> {
        let r#in = self.ram.bdt.r#in(0);
        if data.len() > self.ep0_max_packet() {
            return Err(UsbError::BufferOverflow);
        }
        if r#in.owner() == Owner::Sie {
            return Err(UsbError::WouldBlock);
        }
        Ok(Buffer::new(self.ram.memory, r#in.address(), data.len()).volatile_write(data))
    }

    fn endpoint_count(&self) -> usize {
        self.ram.endpoints.len()
    }

    /// The OUT descriptor and max packet size of a usable endpoint
    fn out_endpoint(&self, endpoint: usize) -> Result<(&'static Bd, usize), UsbError> {
        let size = self.usable_size(endpoint, |requirements| requirements.out_size)?;
        Ok((self.ram.bdt.out(endpoint), size))
    }

    /// The IN descriptor and max packet size of a usable endpoint
    fn in_endpoint(&self, endpoint: usize) -> Result<(&'static Bd, usize), UsbError> {
        let size = self.usable_size(endpoint, |requirements| requirements.in_size)?;
        Ok((self.ram.bdt.r#in(endpoint), size))
    }

    /// Endpoint 0 is always usable. Other endpoints need a configuration.
    fn usable_size(
        &self,
        endpoint: usize,
        size: impl Fn(&EndpointConfig) -> usize,
    ) -> Result<usize, UsbError> {
        let configured = endpoint == 0 || self.state == DeviceState::Configured;
        match self.ram.endpoints.get(endpoint).map(size) {
            Some(size) if size > 0 && configured => Ok(size),
            _ => Err(UsbError::InvalidEndpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        endpoint::Endpoints,
        sim::{self, Host},
    };

    const ENDPOINTS: Endpoints<3> = Endpoints::new(8).bidirectional(1, 32, 32).in_only(2, 16);

    fn device(config: Config) -> (Driver, Host) {
        sim::device::<3, 96>(ENDPOINTS, config)
    }

    #[test]
    fn new_is_detached() {
        let (usb, host) = device(Config::new());
        assert_eq!(usb.state(), DeviceState::Detached);
        assert_eq!(host.sie().UCTRL.read(), 0);
    }

    #[test]
    #[should_panic]
    fn ram_is_taken_once() {
        let ram = sim::leak(UsbRam::<1, 16>::new(Endpoints::new(8)));
        let _first = Driver::new(sim::Sie::new(), ram, Config::new());
        let _second = Driver::new(sim::Sie::new(), ram, Config::new());
    }

    #[test]
    fn attach_detach() {
        let (mut usb, host) = device(Config::new());
        usb.init_cs();
        usb.attach();
        assert_eq!(usb.state(), DeviceState::Attached);
        assert_eq!(host.sie().UIE.read(), 0x11);
        assert_eq!(host.sie().UCTRL.read(), 1 << 3);

        usb.detach();
        assert_eq!(usb.state(), DeviceState::Detached);
        assert_eq!(host.sie().UIE.read(), 0);
        assert_eq!(host.sie().UCTRL.read(), 0);
    }

    #[test]
    fn task_waits_for_se0_to_clear() {
        let (mut usb, host) = device(Config::new());
        usb.init_cs();
        usb.attach();
        host.se0(true);
        usb.task();
        assert_eq!(usb.state(), DeviceState::Attached);
        usb.task();
        assert_eq!(usb.state(), DeviceState::Attached);

        host.se0(false);
        usb.task();
        assert_eq!(usb.state(), DeviceState::Powered);
    }

    #[test]
    fn task_follows_bus_sense() {
        use core::sync::atomic::{AtomicBool, Ordering};
        static VBUS: AtomicBool = AtomicBool::new(false);
        static LINE: AtomicBool = AtomicBool::new(false);

        let config = Config::new()
            .bus_sense(|| VBUS.load(Ordering::SeqCst))
            .interrupt_line(|enable| LINE.store(enable, Ordering::SeqCst));
        let (mut usb, _host) = device(config);
        usb.init_cs();

        usb.task();
        assert_eq!(usb.state(), DeviceState::Detached);

        VBUS.store(true, Ordering::SeqCst);
        usb.task();
        assert_eq!(usb.state(), DeviceState::Powered);
        assert!(LINE.load(Ordering::SeqCst));

        VBUS.store(false, Ordering::SeqCst);
        usb.task();
        assert_eq!(usb.state(), DeviceState::Detached);
        assert!(!LINE.load(Ordering::SeqCst));
    }

    #[test]
    fn init_powers_the_device() {
        let (mut usb, host) = device(Config::new());
        usb.init();
        assert_eq!(usb.state(), DeviceState::Powered);
        assert_eq!(host.sie().USWSTAT.read(), 0);
    }

    #[test]
    fn configure_assigns_buffers() {
        let (mut usb, mut host) = device(Config::new());
        usb.init();
        host.reset();
        usb.isr(&mut sim::Stalls);
        usb.set_address(7);
        usb.configure(1);
        assert_eq!(usb.state(), DeviceState::Configured);
        assert_eq!(usb.configuration(), 1);
        assert_eq!(host.sie().USWSTAT.read(), 3);

        let bdt = &host.ram().bdt;
        assert_eq!(bdt.out(1).address(), 16);
        assert_eq!(bdt.r#in(1).address(), 48);
        assert_eq!(bdt.r#in(2).address(), 80);

        assert_eq!(bdt.out(1).STAT.read(), 0x88);
        assert_eq!(bdt.out(1).count(), 32);
        assert_eq!(bdt.r#in(1).owner(), Owner::Cpu);
        assert_eq!(bdt.r#in(2).owner(), Owner::Cpu);
        assert_eq!(bdt.out(2).owner(), Owner::Cpu);

        assert_eq!(host.uep(0), 0x06);
        assert_eq!(host.uep(1), 0x0E);
        assert_eq!(host.uep(2), 0x02);
    }

    #[test]
    fn configure_ignoring_rx_toggle() {
        let (mut usb, mut host) = device(Config::new().ignore_rx_toggle(true));
        usb.init();
        host.reset();
        usb.isr(&mut sim::Stalls);
        assert_eq!(host.ram().bdt.out(0).STAT.read(), 0x80);
        usb.configure(1);
        assert_eq!(host.ram().bdt.out(1).STAT.read(), 0x80);
    }

    #[test]
    fn deconfigure() {
        let (mut usb, mut host) = device(Config::new());
        usb.init();
        host.reset();
        usb.isr(&mut sim::Stalls);
        usb.set_address(7);
        usb.configure(1);
        usb.configure(0);
        assert_eq!(usb.state(), DeviceState::Address);
        assert_eq!(host.sie().USWSTAT.read(), 2);
        assert_eq!(host.uep(1), 0);
        assert_eq!(host.uep(2), 0);
        assert_eq!(host.ram().bdt.out(1).owner(), Owner::Cpu);
        assert_eq!(usb.put_packet(1, &[1], TogglePolicy::Alternate), Err(UsbError::InvalidEndpoint));
    }

    #[test]
    fn set_address() {
        let (mut usb, host) = device(Config::new());
        usb.init();
        usb.set_address(0x12);
        assert_eq!(usb.state(), DeviceState::Address);
        assert_eq!(usb.address(), 0x12);
        assert_eq!(host.sie().USWSTAT.read(), 2);

        usb.set_address(0);
        assert_eq!(usb.state(), DeviceState::Default);
        assert_eq!(usb.address(), 0);
    }

    #[test]
    fn write_ep0_checks_size() {
        let (mut usb, mut host) = device(Config::new());
        usb.init();
        host.reset();
        usb.isr(&mut sim::Stalls);
        assert_eq!(usb.write_ep0(&[0; 9]), Err(UsbError::BufferOverflow));
        assert_eq!(usb.write_ep0(&[1, 2, 3]), Ok(3));
    }
}
