//! Control port joystick.
//!
//! Switch bits follow the usual digital joystick layout (bit 0 up, 1 down,
//! 2 left, 3 right, 4 fire), active low on the wire.

/// Switch bit masks in the active-high form used by [`Joystick::pressed`].
pub const UP: u8 = 0x01;
pub const DOWN: u8 = 0x02;
pub const LEFT: u8 = 0x04;
pub const RIGHT: u8 = 0x08;
pub const FIRE: u8 = 0x10;

/// One digital joystick plugged into the control port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Joystick {
    /// Currently closed switches, active high.
    pressed: u8,
    /// Last value the computer drove onto the port's output-capable pins.
    output: u8,
}

impl Joystick {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, switches: u8) {
        self.pressed |= switches & 0x1F;
    }

    pub fn release(&mut self, switches: u8) {
        self.pressed &= !switches;
    }

    #[must_use]
    pub fn pressed(&self) -> u8 {
        self.pressed
    }

    /// Wire levels: a closed switch grounds its pin.
    #[must_use]
    pub fn lines(&self) -> u8 {
        !self.pressed & 0x1F
    }

    pub fn store_output(&mut self, value: u8) {
        self.output = value;
    }

    #[must_use]
    pub fn output(&self) -> u8 {
        self.output
    }
}
