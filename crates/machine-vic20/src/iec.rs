//! IEC serial bus as seen from the VIC-20.
//!
//! Three open-collector lines: ATN, CLK, DATA. The computer and the drive
//! can each pull a line low; it reads high only while nobody does.
//!
//! VIA1 wiring:
//!   Output: PA7 = 1 pulls ATN low (through an inverter)
//!   Input:  PA0 = CLK, PA1 = DATA, PA7 = ATN (1 = line high)
//!
//! CLK and DATA outputs live on VIA2 and are driven here through
//! [`IecBus::set_computer_clk`] and [`IecBus::set_computer_data`].

const COMPUTER: usize = 0;
const DRIVE: usize = 1;

/// IEC serial bus with two participants: computer and drive.
#[derive(Debug, Clone, Default)]
pub struct IecBus {
    /// Pull-downs indexed by participant. true = pulling low.
    atn_pulls: [bool; 2],
    clk_pulls: [bool; 2],
    data_pulls: [bool; 2],
}

impl IecBus {
    /// Bus with every line released (high).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Computer side ---

    pub fn set_computer_atn(&mut self, pull_low: bool) {
        self.atn_pulls[COMPUTER] = pull_low;
    }

    pub fn set_computer_clk(&mut self, pull_low: bool) {
        self.clk_pulls[COMPUTER] = pull_low;
    }

    pub fn set_computer_data(&mut self, pull_low: bool) {
        self.data_pulls[COMPUTER] = pull_low;
    }

    // --- Drive side ---

    pub fn set_drive_clk(&mut self, pull_low: bool) {
        self.clk_pulls[DRIVE] = pull_low;
    }

    pub fn set_drive_data(&mut self, pull_low: bool) {
        self.data_pulls[DRIVE] = pull_low;
    }

    // --- Line state (true = high) ---

    #[must_use]
    pub fn atn(&self) -> bool {
        !self.atn_pulls.contains(&true)
    }

    #[must_use]
    pub fn clk(&self) -> bool {
        !self.clk_pulls.contains(&true)
    }

    #[must_use]
    pub fn data(&self) -> bool {
        !self.data_pulls.contains(&true)
    }

    /// Apply the VIA1 port A pin image.
    pub fn write_port_a(&mut self, pins: u8) {
        self.set_computer_atn(pins & 0x80 != 0);
    }

    /// Bus bits for VIA1 port A. Non-IEC bits read as 0.
    #[must_use]
    pub fn read_port_a(&self) -> u8 {
        u8::from(self.clk()) | (u8::from(self.data()) << 1) | (u8::from(self.atn()) << 7)
    }
}
