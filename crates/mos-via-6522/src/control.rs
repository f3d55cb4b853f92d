//! Handshake lines CA1/CA2 and CB1/CB2.
//!
//! PCR layout, one nibble per port:
//!
//! | Bits | Function                                   |
//! |------|--------------------------------------------|
//! | 0    | CA1 active edge (0 = falling, 1 = rising)  |
//! | 3-1  | CA2 mode                                   |
//! | 4    | CB1 active edge                            |
//! | 7-5  | CB2 mode                                   |

use emu_core::Ticks;
use tracing::trace;

use crate::shift::ShiftMode;
use crate::{
    ACR_PA_LATCH, ACR_PB_LATCH, ACR_T2_PULSE, IFR_CA1, IFR_CA2, IFR_CB1, IFR_CB2, Via6522,
    ViaAdapter,
};

/// External signals the machine can report through [`Via6522::notify_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    Ca1,
    Ca2,
    Cb1,
    Cb2,
    /// Port B bit 6, counted by Timer 2 in pulse mode.
    Pb6,
}

/// Mode of a secondary handshake line (CA2 or CB2), from three PCR bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ca2Mode {
    /// Input, flag on falling edge, cleared by port access.
    InputNegative,
    /// Input, flag on falling edge, port access leaves the flag alone.
    IndependentNegative,
    /// Input, flag on rising edge, cleared by port access.
    InputPositive,
    /// Input, flag on rising edge, port access leaves the flag alone.
    IndependentPositive,
    /// Output, low on port access until the next active primary-line edge.
    Handshake,
    /// Output, low for the duration of one port access.
    Pulse,
    FixedLow,
    FixedHigh,
}

impl Ca2Mode {
    /// Decode bits 2-0 of a PCR nibble shifted down to bit 0.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::InputNegative,
            1 => Self::IndependentNegative,
            2 => Self::InputPositive,
            3 => Self::IndependentPositive,
            4 => Self::Handshake,
            5 => Self::Pulse,
            6 => Self::FixedLow,
            _ => Self::FixedHigh,
        }
    }

    #[must_use]
    pub fn is_output(self) -> bool {
        matches!(
            self,
            Self::Handshake | Self::Pulse | Self::FixedLow | Self::FixedHigh
        )
    }

    fn is_independent(self) -> bool {
        matches!(self, Self::IndependentNegative | Self::IndependentPositive)
    }

    fn rising(self) -> bool {
        matches!(self, Self::InputPositive | Self::IndependentPositive)
    }
}

/// Whether a change from `old` to `new` is the active edge.
fn active_edge(old: bool, new: bool, rising: bool) -> bool {
    if rising { !old && new } else { old && !new }
}

impl<A: ViaAdapter> Via6522<A> {
    #[must_use]
    pub fn ca2_mode(&self) -> Ca2Mode {
        Ca2Mode::from_bits(self.pcr >> 1)
    }

    #[must_use]
    pub fn cb2_mode(&self) -> Ca2Mode {
        Ca2Mode::from_bits(self.pcr >> 5)
    }

    /// Report a level change on an input line.
    ///
    /// Sets the matching interrupt flag on the configured edge and runs any
    /// effect tied to it: input latching, handshake release, external shift
    /// clock, Timer 2 pulse counting. Levels equal to the previous report
    /// are ignored.
    pub fn notify_edge(&mut self, now: Ticks, line: Line, level: bool) {
        self.dispatch_alarms(now);
        trace!(via = %self.config.name, ?line, level, %now, "edge");
        match line {
            Line::Ca1 => {
                let old = std::mem::replace(&mut self.ca1_in, level);
                if active_edge(old, level, self.pcr & 0x01 != 0) {
                    self.ifr |= IFR_CA1;
                    if self.acr & ACR_PA_LATCH != 0 {
                        self.ila = self.adapter.read_port_a(self.port_a_pins());
                    }
                    if self.ca2_mode() == Ca2Mode::Handshake && !self.ca2_out {
                        self.drive_ca2(true);
                    }
                }
            }
            Line::Cb1 => {
                let old = std::mem::replace(&mut self.cb1_in, level);
                if active_edge(old, level, self.pcr & 0x10 != 0) {
                    self.ifr |= IFR_CB1;
                    if self.acr & ACR_PB_LATCH != 0 {
                        self.ilb = self.adapter.read_port_b(self.port_b_pins());
                    }
                    if self.shift_mode() == ShiftMode::Disabled
                        && self.cb2_mode() == Ca2Mode::Handshake
                        && !self.cb2_out
                    {
                        self.drive_cb2(true);
                    }
                }
                if old != level {
                    self.external_shift_clock(level);
                }
            }
            Line::Ca2 => {
                let old = std::mem::replace(&mut self.ca2_in, level);
                let mode = self.ca2_mode();
                if !mode.is_output() && active_edge(old, level, mode.rising()) {
                    self.ifr |= IFR_CA2;
                }
            }
            Line::Cb2 => {
                let old = std::mem::replace(&mut self.cb2_in, level);
                let mode = self.cb2_mode();
                if !mode.is_output()
                    && self.shift_mode() == ShiftMode::Disabled
                    && active_edge(old, level, mode.rising())
                {
                    self.ifr |= IFR_CB2;
                }
            }
            Line::Pb6 => {
                let old = std::mem::replace(&mut self.pb6_in, level);
                if self.acr & ACR_T2_PULSE != 0 && old && !level {
                    self.timer2_pulse();
                }
            }
        }
        self.update_irq(now);
    }

    /// Port A access through $1: clear CA1, and CA2 unless independent.
    pub(crate) fn clear_port_a_flags(&mut self) {
        self.ifr &= !IFR_CA1;
        if !self.ca2_mode().is_independent() {
            self.ifr &= !IFR_CA2;
        }
    }

    /// Port B access through $0: clear CB1, and CB2 unless independent.
    pub(crate) fn clear_port_b_flags(&mut self) {
        self.ifr &= !IFR_CB1;
        if !self.cb2_mode().is_independent() {
            self.ifr &= !IFR_CB2;
        }
    }

    /// CA2 response to a port A read or write.
    pub(crate) fn ca2_handshake(&mut self) {
        match self.ca2_mode() {
            // Held low until CA1; a repeat access is not a new level.
            Ca2Mode::Handshake if self.ca2_out => self.drive_ca2(false),
            Ca2Mode::Pulse => {
                self.drive_ca2(false);
                self.drive_ca2(true);
            }
            _ => {}
        }
    }

    /// CB2 response to a port B write.
    pub(crate) fn cb2_handshake(&mut self) {
        if self.shift_mode() != ShiftMode::Disabled {
            return;
        }
        match self.cb2_mode() {
            Ca2Mode::Handshake if self.cb2_out => self.drive_cb2(false),
            Ca2Mode::Pulse => {
                self.drive_cb2(false);
                self.drive_cb2(true);
            }
            _ => {}
        }
    }

    /// Re-derive CA2/CB2 after a PCR or ACR store.
    ///
    /// Each line that is (or becomes) an output is set straight to its final
    /// level with at most one callback.
    pub(crate) fn refresh_control_lines(&mut self) {
        let level = match self.ca2_mode() {
            Ca2Mode::FixedLow => Some(false),
            Ca2Mode::FixedHigh => Some(true),
            // A handshake in progress keeps its level; a fresh one idles high.
            Ca2Mode::Handshake => Some(!self.ca2_driven || self.ca2_out),
            Ca2Mode::Pulse => Some(true),
            _ => None,
        };
        let (was, old) = (self.ca2_driven, self.ca2_out);
        self.ca2_driven = level.is_some();
        if let Some(level) = level
            && (!was || level != old)
        {
            self.drive_ca2(level);
        }

        let shift = self.shift_mode();
        let level = if shift.drives_cb2() {
            Some(self.cb2_out)
        } else if shift != ShiftMode::Disabled {
            None
        } else {
            match self.cb2_mode() {
                Ca2Mode::FixedLow => Some(false),
                Ca2Mode::FixedHigh => Some(true),
                Ca2Mode::Handshake => Some(!self.cb2_driven || self.cb2_out),
                Ca2Mode::Pulse => Some(true),
                _ => None,
            }
        };
        let (was, old) = (self.cb2_driven, self.cb2_out);
        self.cb2_driven = level.is_some();
        if let Some(level) = level
            && (!was || level != old)
        {
            self.drive_cb2(level);
        }
    }

    pub(crate) fn drive_ca2(&mut self, level: bool) {
        self.ca2_out = level;
        self.adapter.set_ca2(level);
    }

    pub(crate) fn drive_cb2(&mut self, level: bool) {
        self.cb2_out = level;
        self.adapter.set_cb2(level);
    }
}
