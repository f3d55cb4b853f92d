//! Timer 1 and Timer 2.
//!
//! Counters are not decremented cycle by cycle. A load records the cycle at
//! which the counter will underflow and schedules an alarm there; reads
//! reconstruct the live value from the distance to that cycle.
//!
//! Load timing: a counter loaded with `N` by a store at cycle `C` reads `N`
//! at `C+1`, reaches 0 at `C+N+1` and underflows (flag set, counter `$FFFF`)
//! at `C+N+2`. In continuous mode Timer 1 then reloads and underflows every
//! `N+2` cycles.

use emu_core::Ticks;
use tracing::trace;

use crate::{
    ACR_T1_CONTINUOUS, ACR_T1_PB7, ACR_T2_PULSE, IFR_T1, IFR_T2, Via6522, ViaAdapter, ViaAlarm,
};

/// Cycles from the counter-high store to the underflow, on top of the count.
pub(crate) const LOAD_LATENCY: u64 = 2;

impl<A: ViaAdapter> Via6522<A> {
    /// T1C-H store: reload the counter from the latch and start counting.
    pub(crate) fn load_timer1(&mut self, now: Ticks) {
        self.t1_target = now + u64::from(self.t1_latch) + LOAD_LATENCY;
        self.t1_reloaded_at = None;
        self.t1_running = true;
        self.t1_fired = false;
        self.ifr &= !IFR_T1;
        self.alarms.set(ViaAlarm::Timer1, self.t1_target);
        trace!(via = %self.config.name, latch = self.t1_latch, target = %self.t1_target, "T1 load");

        if self.acr & ACR_T1_PB7 != 0 && self.pb7 {
            let old = self.port_b_pins();
            self.pb7 = false;
            self.adapter.store_port_b(self.port_b_pins(), old);
        } else {
            self.pb7 = false;
        }
    }

    /// T2C-H store: load `count` into the counter and arm the interrupt.
    pub(crate) fn load_timer2(&mut self, now: Ticks, count: u16) {
        self.t2_running = true;
        self.ifr &= !IFR_T2;
        if self.t2_pulse_mode {
            self.t2_counter = count;
            self.alarms.cancel(ViaAlarm::Timer2);
        } else {
            self.t2_target = now + u64::from(count) + LOAD_LATENCY;
            self.alarms.set(ViaAlarm::Timer2, self.t2_target);
        }
        trace!(via = %self.config.name, count, pulse = self.t2_pulse_mode, "T2 load");
    }

    /// Live Timer 1 counter at `now`, as the CPU reads it.
    pub(crate) fn timer1_counter(&self, now: Ticks) -> u16 {
        // The reload alarm has already moved the target a full period on.
        if self.t1_reloaded_at == Some(now) && self.acr & ACR_T1_CONTINUOUS != 0 {
            return 0xFFFF;
        }
        self.timer1_remaining(now)
    }

    /// Cycles left before the next scheduled underflow, minus one.
    pub(crate) fn timer1_remaining(&self, now: Ticks) -> u16 {
        let target = self.t1_target.get();
        let now = now.get();
        if now > target && self.t1_running && self.acr & ACR_T1_CONTINUOUS != 0 {
            // Underflows not yet dispatched: fold them in.
            let period = u64::from(self.t1_latch) + LOAD_LATENCY;
            let over = (now - target) % period;
            if over == 0 {
                return 0xFFFF;
            }
            return (period - over - 1) as u16;
        }
        target.wrapping_sub(now).wrapping_sub(1) as u16
    }

    /// Live Timer 2 counter at `now`.
    pub(crate) fn timer2_counter(&self, now: Ticks) -> u16 {
        if self.t2_pulse_mode {
            self.t2_counter
        } else {
            self.t2_target.get().wrapping_sub(now.get()).wrapping_sub(1) as u16
        }
    }

    pub(crate) fn timer1_alarm(&mut self, at: Ticks) {
        if self.acr & ACR_T1_CONTINUOUS != 0 {
            self.ifr |= IFR_T1;
            self.t1_fired = false;
            self.t1_target = at + u64::from(self.t1_latch) + LOAD_LATENCY;
            self.t1_reloaded_at = Some(at);
            self.alarms.set(ViaAlarm::Timer1, self.t1_target);
            if self.acr & ACR_T1_PB7 != 0 {
                let old = self.port_b_pins();
                self.pb7 = !self.pb7;
                self.adapter.store_port_b(self.port_b_pins(), old);
            }
        } else {
            if !self.t1_fired {
                self.ifr |= IFR_T1;
                self.t1_fired = true;
                if self.acr & ACR_T1_PB7 != 0 && !self.pb7 {
                    let old = self.port_b_pins();
                    self.pb7 = true;
                    self.adapter.store_port_b(self.port_b_pins(), old);
                }
            }
            self.t1_running = false;
        }
        self.update_irq(at);
    }

    pub(crate) fn timer2_alarm(&mut self, at: Ticks) {
        if self.t2_running && !self.t2_pulse_mode {
            self.ifr |= IFR_T2;
            self.t2_running = false;
            self.update_irq(at);
        }
    }

    /// A PB6 falling edge while Timer 2 counts pulses.
    pub(crate) fn timer2_pulse(&mut self) {
        self.t2_counter = self.t2_counter.wrapping_sub(1);
        if self.t2_counter == 0 && self.t2_running {
            self.ifr |= IFR_T2;
            self.t2_running = false;
        }
    }

    /// ACR bit 5 flipped: carry the current count over to the new mode.
    pub(crate) fn switch_timer2_mode(&mut self, now: Ticks) {
        let count = self.timer2_counter(now);
        self.t2_pulse_mode = self.acr & ACR_T2_PULSE != 0;
        if self.t2_pulse_mode {
            self.t2_counter = count;
            self.alarms.cancel(ViaAlarm::Timer2);
        } else {
            self.t2_target = now + u64::from(count) + 1;
            if self.t2_running {
                self.alarms.set(ViaAlarm::Timer2, self.t2_target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use emu_core::Ticks;

    use crate::testing::via;
    use crate::{IFR_T1, IFR_T2, ViaAlarm, reg};

    fn start_t1(via: &mut crate::Via6522<crate::testing::Recorder>, at: u64, count: u16) {
        via.store(Ticks(at), reg::T1CL, count as u8);
        via.store(Ticks(at), reg::T1CH, (count >> 8) as u8);
    }

    #[test]
    fn timer1_counter_counts_down_from_latch() {
        let mut via = via();
        start_t1(&mut via, 100, 3);
        assert_eq!(via.peek(Ticks(101), reg::T1CL), 3);
        assert_eq!(via.peek(Ticks(103), reg::T1CL), 1);
        assert_eq!(via.peek(Ticks(104), reg::T1CL), 0);
        assert_eq!(via.peek(Ticks(105), reg::T1CL), 0xFF);
        assert_eq!(via.peek(Ticks(105), reg::T1CH), 0xFF);
    }

    #[test]
    fn timer1_underflow_sets_flag_at_load_latency() {
        let mut via = via();
        start_t1(&mut via, 100, 3);
        via.dispatch_alarms(Ticks(104));
        assert_eq!(via.ifr() & IFR_T1, 0);
        via.dispatch_alarms(Ticks(105));
        assert_ne!(via.ifr() & IFR_T1, 0);
    }

    #[test]
    fn timer1_one_shot_stops() {
        let mut via = via();
        start_t1(&mut via, 0, 2);
        via.dispatch_alarms(Ticks(4));
        assert_ne!(via.ifr() & IFR_T1, 0);
        assert_eq!(via.next_alarm(), None);
        // Counter keeps falling after the timeout.
        assert_eq!(via.peek(Ticks(5), reg::T1CL), 0xFE);
    }

    #[test]
    fn timer1_free_run_reloads() {
        let mut via = via();
        via.store(Ticks(0), reg::ACR, 0x40);
        start_t1(&mut via, 0, 2);
        via.dispatch_alarms(Ticks(4));
        assert_ne!(via.ifr() & IFR_T1, 0);
        assert_eq!(via.next_alarm(), Some(Ticks(8)));
        assert_eq!(via.peek(Ticks(5), reg::T1CL), 2);
    }

    #[test]
    fn timer1_free_run_read_on_underflow_cycle() {
        let mut pending = via();
        pending.store(Ticks(0), reg::ACR, 0x40);
        start_t1(&mut pending, 0, 2);
        let mut via = via();
        via.store(Ticks(0), reg::ACR, 0x40);
        start_t1(&mut via, 0, 2);

        // read() dispatches the reload first; the value must not change.
        assert_eq!(pending.peek(Ticks(4), reg::T1CL), 0xFF);
        assert_eq!(via.read(Ticks(4), reg::T1CL), 0xFF);
        assert_eq!(via.peek(Ticks(4), reg::T1CH), 0xFF);
        assert_eq!(via.next_alarm(), Some(Ticks(8)));
        assert_eq!(via.read(Ticks(5), reg::T1CL), 2);

        via.dispatch_alarms(Ticks(8));
        assert_eq!(via.read(Ticks(8), reg::T1CH), 0xFF);
    }

    #[test]
    fn timer1_live_value_folds_in_missed_reloads() {
        let mut via = via();
        via.store(Ticks(0), reg::ACR, 0x40);
        start_t1(&mut via, 0, 2);
        // Period 4, underflows at 4, 8, 12 ...; nothing dispatched yet.
        assert_eq!(via.peek(Ticks(8), reg::T1CL), 0xFF);
        assert_eq!(via.peek(Ticks(9), reg::T1CL), 2);
        assert_eq!(via.peek(Ticks(11), reg::T1CL), 0);
    }

    #[test]
    fn timer1_write_high_starts_and_clears_irq() {
        let mut via = via();
        via.ifr = IFR_T1;
        start_t1(&mut via, 10, 10);
        assert_eq!(via.ifr() & IFR_T1, 0);
        assert_eq!(via.next_alarm(), Some(Ticks(22)));
    }

    #[test]
    fn timer1_latch_write_does_not_start() {
        let mut via = via();
        via.store(Ticks(0), reg::T1LL, 0x10);
        via.store(Ticks(0), reg::T1LH, 0x00);
        assert_eq!(via.next_alarm(), None);
        via.ifr = IFR_T1;
        via.store(Ticks(0), reg::T1LH, 0x00);
        assert_eq!(via.ifr() & IFR_T1, 0);
        assert_eq!(via.peek(Ticks(0), reg::T1LL), 0x10);
    }

    #[test]
    fn timer1_reload_replaces_pending_alarm() {
        let mut via = via();
        start_t1(&mut via, 0, 100);
        start_t1(&mut via, 50, 10);
        assert_eq!(via.alarms.pending(ViaAlarm::Timer1), Some(Ticks(62)));
        via.dispatch_alarms(Ticks(102));
        assert_eq!(via.next_alarm(), None);
    }

    #[test]
    fn timer1_read_low_clears_irq() {
        let mut via = via();
        via.ifr = IFR_T1;
        via.read(Ticks(0), reg::T1CL);
        assert_eq!(via.ifr() & IFR_T1, 0);
    }

    #[test]
    fn timer2_one_shot() {
        let mut via = via();
        via.store(Ticks(0), reg::T2CL, 3);
        via.store(Ticks(0), reg::T2CH, 0);
        assert_eq!(via.peek(Ticks(1), reg::T2CL), 3);
        via.dispatch_alarms(Ticks(4));
        assert_eq!(via.ifr() & IFR_T2, 0);
        via.dispatch_alarms(Ticks(5));
        assert_ne!(via.ifr() & IFR_T2, 0);
        assert_eq!(via.next_alarm(), None);
    }

    #[test]
    fn timer2_read_low_clears_irq() {
        let mut via = via();
        via.ifr = IFR_T2;
        via.read(Ticks(0), reg::T2CL);
        assert_eq!(via.ifr() & IFR_T2, 0);
    }

    #[test]
    fn timer2_mode_switch_keeps_count() {
        let mut via = via();
        via.store(Ticks(0), reg::T2CL, 0x20);
        via.store(Ticks(0), reg::T2CH, 0);
        via.store(Ticks(11), reg::ACR, 0x20);
        assert_eq!(via.peek(Ticks(50), reg::T2CL), 0x16);
        assert_eq!(via.next_alarm(), None);

        via.store(Ticks(60), reg::ACR, 0x00);
        assert_eq!(via.peek(Ticks(60), reg::T2CL), 0x16);
        assert_eq!(via.next_alarm(), Some(Ticks(60 + 0x16 + 1)));
    }
}
