//! User port lines driven by VIA1.
//!
//! PB0-PB7 are shared with whatever device is plugged in (wired-AND). Pin M
//! (PA2 in the user port naming) follows CB2 and pin 8 (PA6) shares the
//! tape sense line. A PB store with PA6 low is seen by the device as a
//! strobe.

/// Computer and device side of the user port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPort {
    /// Levels the VIA drives on PB0-PB7.
    pb: u8,
    /// Levels the plugged-in device drives on PB0-PB7 (0xFF = nothing).
    device_pb: u8,
    /// Pin M.
    pa2: bool,
    /// Pin 8, shared with tape sense.
    pa6: bool,
    /// PB stores that reached the device as strobes.
    strobes: u64,
}

impl UserPort {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pb: 0xFF,
            device_pb: 0xFF,
            pa2: true,
            pa6: true,
            strobes: 0,
        }
    }

    /// Let go of every computer-driven line.
    pub fn release(&mut self) {
        self.pb = 0xFF;
        self.pa2 = true;
        self.pa6 = true;
    }

    pub fn store_pb(&mut self, value: u8) {
        self.pb = value;
        if !self.pa6 {
            self.strobes += 1;
        }
    }

    /// Restore PB without a strobe.
    pub fn restore_pb(&mut self, value: u8) {
        self.pb = value;
    }

    /// Wire levels on PB0-PB7 given what the VIA drives.
    #[must_use]
    pub fn read_pb(&self, driven: u8) -> u8 {
        driven & self.device_pb
    }

    pub fn set_device_pb(&mut self, value: u8) {
        self.device_pb = value;
    }

    pub fn set_pa2(&mut self, level: bool) {
        self.pa2 = level;
    }

    pub fn set_pa6(&mut self, level: bool) {
        self.pa6 = level;
    }

    #[must_use]
    pub fn pb(&self) -> u8 {
        self.pb
    }

    #[must_use]
    pub fn pa2(&self) -> bool {
        self.pa2
    }

    #[must_use]
    pub fn pa6(&self) -> bool {
        self.pa6
    }

    #[must_use]
    pub fn strobes(&self) -> u64 {
        self.strobes
    }
}

impl Default for UserPort {
    fn default() -> Self {
        Self::new()
    }
}
