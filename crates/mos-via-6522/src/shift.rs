//! Serial shift register.
//!
//! ACR bits 4-2 pick the direction and the clock. Shifting out drives bit 7
//! onto CB2 and recirculates it into bit 0; shifting in samples CB2 into
//! bit 0. After eight clocks the SR flag is set and the shifter stops until
//! the CPU touches the register again.

use emu_core::Ticks;

use crate::{IFR_SR, Via6522, ViaAdapter, ViaAlarm};

/// Shift register mode from ACR bits 4-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftMode {
    Disabled,
    InT2,
    InPhi2,
    InExternal,
    /// Shift out forever at the Timer 2 rate, never setting the flag.
    OutFreeRunning,
    OutT2,
    OutPhi2,
    OutExternal,
}

/// Where shift clocks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShiftClock {
    None,
    /// Each Timer 2 low-byte period.
    Timer2,
    /// Every second system cycle.
    Phi2,
    /// CB1 edges reported by the machine.
    External,
}

impl ShiftMode {
    #[must_use]
    pub fn from_acr(acr: u8) -> Self {
        match (acr >> 2) & 0x07 {
            0 => Self::Disabled,
            1 => Self::InT2,
            2 => Self::InPhi2,
            3 => Self::InExternal,
            4 => Self::OutFreeRunning,
            5 => Self::OutT2,
            6 => Self::OutPhi2,
            _ => Self::OutExternal,
        }
    }

    /// Shift-out modes own CB2 as an output.
    #[must_use]
    pub fn drives_cb2(self) -> bool {
        matches!(
            self,
            Self::OutFreeRunning | Self::OutT2 | Self::OutPhi2 | Self::OutExternal
        )
    }

    fn clock(self) -> ShiftClock {
        match self {
            Self::Disabled => ShiftClock::None,
            Self::InT2 | Self::OutT2 | Self::OutFreeRunning => ShiftClock::Timer2,
            Self::InPhi2 | Self::OutPhi2 => ShiftClock::Phi2,
            Self::InExternal | Self::OutExternal => ShiftClock::External,
        }
    }
}

impl<A: ViaAdapter> Via6522<A> {
    #[must_use]
    pub fn shift_mode(&self) -> ShiftMode {
        ShiftMode::from_acr(self.acr)
    }

    /// Whether another shift clock will be honoured.
    fn shift_running(&self) -> bool {
        match self.shift_mode() {
            ShiftMode::Disabled => false,
            ShiftMode::OutFreeRunning => true,
            _ => self.sr_bits < 8,
        }
    }

    /// Cycles between internally generated shift clocks.
    pub(crate) fn shift_period(&self) -> Option<u64> {
        match self.shift_mode().clock() {
            ShiftClock::Timer2 => Some(u64::from(self.t2_latch_lo) + 2),
            ShiftClock::Phi2 => Some(2),
            ShiftClock::None | ShiftClock::External => None,
        }
    }

    /// Any access to the SR register: restart the eight-bit count.
    pub(crate) fn restart_shift(&mut self, now: Ticks) {
        self.sr_bits = 0;
        self.ifr &= !IFR_SR;
        self.rearm_shift(now);
    }

    /// Schedule the next internal shift clock, or cancel it if there is none.
    pub(crate) fn rearm_shift(&mut self, now: Ticks) {
        match self.shift_period() {
            Some(period) if self.shift_running() => {
                self.alarms.set(ViaAlarm::Shift, now + period);
            }
            _ => self.alarms.cancel(ViaAlarm::Shift),
        }
    }

    pub(crate) fn shift_alarm(&mut self, at: Ticks) {
        if !self.shift_running() {
            return;
        }
        self.shift_bit();
        self.rearm_shift(at);
        self.update_irq(at);
    }

    /// A CB1 level change while the shifter is clocked externally.
    pub(crate) fn external_shift_clock(&mut self, level: bool) {
        if !self.shift_running() {
            return;
        }
        // Data goes out on the falling edge and is sampled on the rising one.
        match self.shift_mode() {
            ShiftMode::InExternal if level => self.shift_bit(),
            ShiftMode::OutExternal if !level => self.shift_bit(),
            _ => {}
        }
    }

    fn shift_bit(&mut self) {
        let mode = self.shift_mode();
        if mode.drives_cb2() {
            let bit = self.sr & 0x80 != 0;
            self.sr = self.sr.rotate_left(1);
            self.drive_cb2(bit);
        } else {
            self.sr = (self.sr << 1) | u8::from(self.cb2_in);
        }

        if mode != ShiftMode::OutFreeRunning {
            self.sr_bits += 1;
            if self.sr_bits == 8 {
                self.ifr |= IFR_SR;
                self.alarms.cancel(ViaAlarm::Shift);
            }
        }
    }
}
