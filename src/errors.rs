//! Transfer error diagnostics
//!
//! The SIE flags transmission errors that the host will retry. None of them
//! stop the device. When enabled, the driver counts them by cause.

bitflags::bitflags! {
    /// Transfer error causes, as signaled in `UEIR`
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ErrorFlags : u8 {
        /// PID check failed
        const PID = 1 << 0;
        /// Token CRC5 failed
        const CRC5 = 1 << 1;
        /// Data CRC16 failed
        const CRC16 = 1 << 2;
        /// Data field wasn't a whole number of bytes
        const DFN8 = 1 << 3;
        /// Bus turnaround timeout
        const BTO = 1 << 4;
        /// Write to a register while the SIE was writing
        const WRT = 1 << 5;
        /// Token for a descriptor the firmware owned
        const OWN = 1 << 6;
        /// Bit stuff violation
        const BTS = 1 << 7;
    }
}

/// Per-cause transfer error counters
///
/// Counters wrap on overflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorCounters {
    counts: [u16; 8],
}

impl ErrorCounters {
    pub const fn new() -> Self {
        ErrorCounters { counts: [0; 8] }
    }

    /// Increment the counter of every cause in `flags`
    pub fn record(&mut self, flags: ErrorFlags) {
        for (bit, count) in self.counts.iter_mut().enumerate() {
            if flags.bits() & (1 << bit) != 0 {
                *count = count.wrapping_add(1);
            }
        }
    }

    /// Returns the total for all causes in `flags`
    pub fn count(&self, flags: ErrorFlags) -> u32 {
        self.counts
            .iter()
            .enumerate()
            .filter(|(bit, _)| flags.bits() & (1 << bit) != 0)
            .map(|(_, count)| *count as u32)
            .sum()
    }

    /// The raw counters, one per `UEIR` bit
    pub fn as_array(&self) -> &[u16; 8] {
        &self.counts
    }

    pub fn clear(&mut self) {
        self.counts = [0; 8];
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCounters, ErrorFlags};

    #[test]
    fn record_and_count() {
        let mut counters = ErrorCounters::new();
        counters.record(ErrorFlags::CRC16 | ErrorFlags::BTS);
        counters.record(ErrorFlags::CRC16);
        assert_eq!(counters.count(ErrorFlags::CRC16), 2);
        assert_eq!(counters.count(ErrorFlags::BTS), 1);
        assert_eq!(counters.count(ErrorFlags::PID), 0);
        assert_eq!(counters.count(ErrorFlags::all()), 3);
        assert_eq!(counters.as_array(), &[0, 0, 2, 0, 0, 0, 0, 1]);

        counters.clear();
        assert_eq!(counters.count(ErrorFlags::all()), 0);
    }

    #[test]
    fn counters_wrap() {
        let mut counters = ErrorCounters::new();
        for _ in 0..=u16::MAX {
            counters.record(ErrorFlags::OWN);
        }
        assert_eq!(counters.count(ErrorFlags::OWN), 0);
    }
}
