//! MOS 6522 Versatile Interface Adapter (VIA).
//!
//! The 6522 provides two 8-bit I/O ports, two 16-bit timers, a serial
//! shift register, four handshake lines (CA1/CA2, CB1/CB2) and an
//! interrupt flag/enable pair. The same engine serves every machine that
//! carries the chip; what the port bits mean is supplied by a
//! [`ViaAdapter`].
//!
//! The engine is not ticked. Timer underflows and shift clocks are
//! registered as alarms at absolute cycles; the machine asks for
//! [`Via6522::next_alarm`] and calls [`Via6522::dispatch_alarms`] before
//! running the CPU past that cycle. Every bus access passes the current
//! cycle so live counter values can be reconstructed on demand.
//!
//! # Registers ($0-$F)
//!
//! | Reg | Name | Description                              |
//! |-----|------|------------------------------------------|
//! | $0  | ORB  | Port B data (handshake)                  |
//! | $1  | ORA  | Port A data (handshake)                  |
//! | $2  | DDRB | Port B data direction (1 = output)       |
//! | $3  | DDRA | Port A data direction (1 = output)       |
//! | $4  | T1CL | Timer 1 counter low (read clears T1 IRQ) |
//! | $5  | T1CH | Timer 1 counter high (write starts T1)   |
//! | $6  | T1LL | Timer 1 latch low                        |
//! | $7  | T1LH | Timer 1 latch high                       |
//! | $8  | T2CL | Timer 2 counter low (read clears T2 IRQ) |
//! | $9  | T2CH | Timer 2 counter high (write starts T2)   |
//! | $A  | SR   | Shift register                           |
//! | $B  | ACR  | Auxiliary control register               |
//! | $C  | PCR  | Peripheral control register              |
//! | $D  | IFR  | Interrupt flag register                  |
//! | $E  | IER  | Interrupt enable register                |
//! | $F  | ORA  | Port A data (no handshake)               |

mod adapter;
mod config;
mod control;
mod shift;
mod snapshot;
mod timer;

use emu_core::{AlarmQueue, Observable, Ticks, Value};
use tracing::{debug, trace};

pub use adapter::ViaAdapter;
pub use config::ViaConfig;
pub use control::{Ca2Mode, Line};
pub use shift::ShiftMode;
pub use snapshot::{SNAPSHOT_MAJOR, SNAPSHOT_MINOR};

/// Register offsets within the chip's 16-byte window.
pub mod reg {
    pub const ORB: u8 = 0x0;
    pub const ORA: u8 = 0x1;
    pub const DDRB: u8 = 0x2;
    pub const DDRA: u8 = 0x3;
    pub const T1CL: u8 = 0x4;
    pub const T1CH: u8 = 0x5;
    pub const T1LL: u8 = 0x6;
    pub const T1LH: u8 = 0x7;
    pub const T2CL: u8 = 0x8;
    pub const T2CH: u8 = 0x9;
    pub const SR: u8 = 0xA;
    pub const ACR: u8 = 0xB;
    pub const PCR: u8 = 0xC;
    pub const IFR: u8 = 0xD;
    pub const IER: u8 = 0xE;
    pub const ORA_NHS: u8 = 0xF;
}

// IFR/IER bit masks
pub const IFR_CA2: u8 = 0x01;
pub const IFR_CA1: u8 = 0x02;
pub const IFR_SR: u8 = 0x04;
pub const IFR_CB2: u8 = 0x08;
pub const IFR_CB1: u8 = 0x10;
pub const IFR_T2: u8 = 0x20;
pub const IFR_T1: u8 = 0x40;
pub const IFR_IRQ: u8 = 0x80;

// ACR bits
const ACR_PA_LATCH: u8 = 0x01;
const ACR_PB_LATCH: u8 = 0x02;
const ACR_T2_PULSE: u8 = 0x20;
const ACR_T1_CONTINUOUS: u8 = 0x40;
const ACR_T1_PB7: u8 = 0x80;

/// Deferred work owned by one VIA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViaAlarm {
    Timer1,
    Timer2,
    Shift,
}

/// MOS 6522 Versatile Interface Adapter bound to one machine adapter.
pub struct Via6522<A: ViaAdapter> {
    config: ViaConfig,
    adapter: A,
    alarms: AlarmQueue<ViaAlarm>,

    /// Output registers.
    ora: u8,
    orb: u8,
    /// Data direction registers (1 = output).
    ddra: u8,
    ddrb: u8,
    /// Input latches, captured on the active CA1/CB1 edge when ACR enables it.
    ila: u8,
    ilb: u8,

    /// Timer 1 latch (reloaded into the counter on underflow).
    t1_latch: u16,
    /// Cycle of the next (or most recent) Timer 1 underflow. The live counter
    /// is `t1_target - now - 1`.
    t1_target: Ticks,
    /// Cycle of the last dispatched continuous-mode reload. On that cycle
    /// the counter still shows `$FFFF`.
    t1_reloaded_at: Option<Ticks>,
    /// Timer 1 alarm is armed.
    t1_running: bool,
    /// One-shot underflow already raised its interrupt for this load.
    t1_fired: bool,
    /// PB7 level when Timer 1 drives it (ACR bit 7).
    pb7: bool,

    /// Timer 2 low latch. The high byte is written straight to the counter.
    t2_latch_lo: u8,
    /// Cycle of the Timer 2 underflow in timed mode.
    t2_target: Ticks,
    /// Timer 2 counter while counting PB6 pulses.
    t2_counter: u16,
    /// Timer 2 will still raise its interrupt for this load.
    t2_running: bool,
    /// Timer 2 counter is held in `t2_counter` (pulse counting).
    t2_pulse_mode: bool,

    /// Shift register.
    sr: u8,
    /// Bits shifted since the last SR access; 8 = complete, halted.
    sr_bits: u8,

    acr: u8,
    pcr: u8,
    /// Interrupt flags. Bit 7 is derived, see `update_irq`.
    ifr: u8,
    ier: u8,

    /// Last levels reported through `notify_edge`.
    ca1_in: bool,
    cb1_in: bool,
    ca2_in: bool,
    cb2_in: bool,
    pb6_in: bool,

    /// CA2/CB2 output levels and whether the chip currently drives them.
    ca2_out: bool,
    cb2_out: bool,
    ca2_driven: bool,
    cb2_driven: bool,
}

impl<A: ViaAdapter> Via6522<A> {
    /// Create a VIA bound to `adapter`, with no alarms pending.
    ///
    /// Registers start at their power-on values. The adapter is not called;
    /// use [`reset`](Self::reset) to put the machine side in a known state.
    #[must_use]
    pub fn new(config: ViaConfig, adapter: A) -> Self {
        Self {
            config,
            adapter,
            alarms: AlarmQueue::new(),
            ora: 0,
            orb: 0,
            ddra: 0,
            ddrb: 0,
            ila: 0,
            ilb: 0,
            t1_latch: 0xFFFF,
            t1_target: Ticks::new(0x1_0000),
            t1_reloaded_at: None,
            t1_running: false,
            t1_fired: false,
            pb7: false,
            t2_latch_lo: 0xFF,
            t2_target: Ticks::new(0x1_0000),
            t2_counter: 0xFFFF,
            t2_running: false,
            t2_pulse_mode: false,
            sr: 0,
            sr_bits: 8,
            acr: 0,
            pcr: 0,
            ifr: 0,
            ier: 0,
            ca1_in: true,
            cb1_in: true,
            ca2_in: true,
            cb2_in: true,
            pb6_in: true,
            ca2_out: true,
            cb2_out: true,
            ca2_driven: false,
            cb2_driven: false,
        }
    }

    /// Force power-on defaults and reset the machine side.
    ///
    /// Both ports become inputs, both timers stop, IFR/IER/PCR/ACR/SR clear
    /// and every pending alarm is cancelled.
    pub fn reset(&mut self, now: Ticks) {
        debug!(via = %self.config.name, %now, "reset");
        self.alarms.clear();
        self.ora = 0;
        self.orb = 0;
        self.ddra = 0;
        self.ddrb = 0;
        self.ila = 0;
        self.ilb = 0;
        self.t1_latch = 0xFFFF;
        self.t1_target = now + 0x1_0000;
        self.t1_reloaded_at = None;
        self.t1_running = false;
        self.t1_fired = false;
        self.pb7 = false;
        self.t2_latch_lo = 0xFF;
        self.t2_target = now + 0x1_0000;
        self.t2_counter = 0xFFFF;
        self.t2_running = false;
        self.t2_pulse_mode = false;
        self.sr = 0;
        self.sr_bits = 8;
        self.acr = 0;
        self.pcr = 0;
        self.ifr = 0;
        self.ier = 0;
        self.ca2_out = true;
        self.cb2_out = true;
        self.ca2_driven = false;
        self.cb2_driven = false;

        self.adapter.reset();
        self.update_irq(now);
    }

    /// Earliest cycle at which [`dispatch_alarms`](Self::dispatch_alarms)
    /// has work to do.
    #[must_use]
    pub fn next_alarm(&self) -> Option<Ticks> {
        self.alarms.next_due()
    }

    /// Run every alarm due at or before `now`, in cycle order.
    pub fn dispatch_alarms(&mut self, now: Ticks) {
        while let Some((at, alarm)) = self.alarms.pop_due(now) {
            trace!(via = %self.config.name, ?alarm, %at, "alarm");
            match alarm {
                ViaAlarm::Timer1 => self.timer1_alarm(at),
                ViaAlarm::Timer2 => self.timer2_alarm(at),
                ViaAlarm::Shift => self.shift_alarm(at),
            }
        }
    }

    /// Write a VIA register.
    pub fn store(&mut self, now: Ticks, addr: u8, value: u8) {
        debug_assert!(addr < 0x10, "VIA register {addr:#X} out of range");
        let now = Ticks::new(now.get().saturating_sub(self.config.write_offset));
        self.dispatch_alarms(now);
        trace!(via = %self.config.name, addr, value, %now, "store");

        match addr & 0x0F {
            reg::ORB => {
                let old = self.port_b_pins();
                self.orb = value;
                self.clear_port_b_flags();
                self.adapter.store_port_b(self.port_b_pins(), old);
                self.cb2_handshake();
            }
            reg::ORA | reg::ORA_NHS => {
                let old = self.port_a_pins();
                self.ora = value;
                if addr & 0x0F == reg::ORA {
                    self.clear_port_a_flags();
                }
                self.adapter.store_port_a(self.port_a_pins(), old);
                if addr & 0x0F == reg::ORA {
                    self.ca2_handshake();
                }
            }
            reg::DDRB => {
                let old = self.port_b_pins();
                self.ddrb = value;
                self.adapter.store_port_b(self.port_b_pins(), old);
            }
            reg::DDRA => {
                let old = self.port_a_pins();
                self.ddra = value;
                self.adapter.store_port_a(self.port_a_pins(), old);
            }
            reg::T1CL | reg::T1LL => {
                self.t1_latch = (self.t1_latch & 0xFF00) | u16::from(value);
            }
            reg::T1CH => {
                self.t1_latch = (self.t1_latch & 0x00FF) | (u16::from(value) << 8);
                self.load_timer1(now);
            }
            reg::T1LH => {
                self.t1_latch = (self.t1_latch & 0x00FF) | (u16::from(value) << 8);
                self.ifr &= !IFR_T1;
            }
            reg::T2CL => {
                self.t2_latch_lo = value;
                self.adapter.store_t2_low(value);
            }
            reg::T2CH => {
                let count = u16::from(self.t2_latch_lo) | (u16::from(value) << 8);
                self.load_timer2(now, count);
            }
            reg::SR => {
                self.sr = value;
                self.adapter.store_sr(value);
                self.restart_shift(now);
            }
            reg::ACR => {
                let old = self.acr;
                let old_pins = self.port_b_pins();
                self.acr = value;
                self.adapter.store_acr(value);
                self.acr_changed(now, old, old_pins);
            }
            reg::PCR => {
                self.pcr = value;
                self.adapter.store_pcr(value);
                self.refresh_control_lines();
            }
            reg::IFR => {
                self.ifr &= !(value & 0x7F);
            }
            reg::IER => {
                if value & 0x80 != 0 {
                    self.ier |= value & 0x7F;
                } else {
                    self.ier &= !(value & 0x7F);
                }
            }
            _ => unreachable!(),
        }

        self.update_irq(now);
    }

    /// Read a VIA register, applying its side effects.
    pub fn read(&mut self, now: Ticks, addr: u8) -> u8 {
        debug_assert!(addr < 0x10, "VIA register {addr:#X} out of range");
        self.dispatch_alarms(now);

        let value = match addr & 0x0F {
            reg::ORB => {
                self.clear_port_b_flags();
                self.read_port_b()
            }
            reg::ORA => {
                self.clear_port_a_flags();
                let value = self.read_port_a();
                self.ca2_handshake();
                value
            }
            reg::T1CL => {
                self.ifr &= !IFR_T1;
                self.timer1_counter(now) as u8
            }
            reg::T2CL => {
                self.ifr &= !IFR_T2;
                self.timer2_counter(now) as u8
            }
            reg::SR => {
                self.restart_shift(now);
                self.sr
            }
            other => return self.peek(now, other),
        };

        self.update_irq(now);
        value
    }

    /// Read a VIA register without side effects.
    ///
    /// Interrupt flags, handshake lines and the shift counter are left alone.
    /// Port reads still ask the adapter for the current input levels.
    pub fn peek(&mut self, now: Ticks, addr: u8) -> u8 {
        debug_assert!(addr < 0x10, "VIA register {addr:#X} out of range");
        match addr & 0x0F {
            reg::ORB => self.read_port_b(),
            reg::ORA | reg::ORA_NHS => self.read_port_a(),
            reg::DDRB => self.ddrb,
            reg::DDRA => self.ddra,
            reg::T1CL => self.timer1_counter(now) as u8,
            reg::T1CH => (self.timer1_counter(now) >> 8) as u8,
            reg::T1LL => self.t1_latch as u8,
            reg::T1LH => (self.t1_latch >> 8) as u8,
            reg::T2CL => self.timer2_counter(now) as u8,
            reg::T2CH => (self.timer2_counter(now) >> 8) as u8,
            reg::SR => self.sr,
            reg::ACR => self.acr,
            reg::PCR => self.pcr,
            reg::IFR => self.ifr,
            reg::IER => self.ier | 0x80,
            _ => unreachable!(),
        }
    }

    /// Interrupt flag register, bit 7 included.
    #[must_use]
    pub fn ifr(&self) -> u8 {
        self.ifr
    }

    /// Interrupt enable register (bit 7 clear).
    #[must_use]
    pub fn ier(&self) -> u8 {
        self.ier
    }

    #[must_use]
    pub fn acr(&self) -> u8 {
        self.acr
    }

    #[must_use]
    pub fn pcr(&self) -> u8 {
        self.pcr
    }

    /// Whether the chip's interrupt output is asserted.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.ifr & IFR_IRQ != 0
    }

    #[must_use]
    pub fn config(&self) -> &ViaConfig {
        &self.config
    }

    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    // --- Internal helpers ---

    /// Recompute IFR bit 7 and drive the interrupt output.
    fn update_irq(&mut self, at: Ticks) {
        let active = self.ifr & self.ier & 0x7F != 0;
        if active {
            self.ifr |= IFR_IRQ;
        } else {
            self.ifr &= !IFR_IRQ;
        }
        self.adapter.set_interrupt(active, at);
    }

    /// Port A pin image: outputs from ORA, inputs pulled high.
    fn port_a_pins(&self) -> u8 {
        self.ora | !self.ddra
    }

    /// Port B pin image, with PB7 taken from Timer 1 when ACR bit 7 is set.
    fn port_b_pins(&self) -> u8 {
        let pins = self.orb | !self.ddrb;
        if self.acr & ACR_T1_PB7 != 0 {
            (pins & 0x7F) | if self.pb7 { 0x80 } else { 0 }
        } else {
            pins
        }
    }

    fn read_port_a(&mut self) -> u8 {
        let input = if self.acr & ACR_PA_LATCH != 0 {
            self.ila
        } else {
            self.adapter.read_port_a(self.port_a_pins())
        };
        (self.ora & self.ddra) | (input & !self.ddra)
    }

    fn read_port_b(&mut self) -> u8 {
        let input = if self.acr & ACR_PB_LATCH != 0 {
            self.ilb
        } else {
            self.adapter.read_port_b(self.port_b_pins())
        };
        let value = (self.orb & self.ddrb) | (input & !self.ddrb);
        if self.acr & ACR_T1_PB7 != 0 {
            (value & 0x7F) | if self.pb7 { 0x80 } else { 0 }
        } else {
            value
        }
    }

    /// Side effects of an ACR store on timers, shifter and PB7.
    fn acr_changed(&mut self, now: Ticks, old: u8, old_pins: u8) {
        if (old ^ self.acr) & ACR_T2_PULSE != 0 {
            self.switch_timer2_mode(now);
        }
        if (old ^ self.acr) & 0x1C != 0 {
            debug!(via = %self.config.name, mode = ?self.shift_mode(), "shift mode");
            self.rearm_shift(now);
        }
        if self.port_b_pins() != old_pins {
            self.adapter.store_port_b(self.port_b_pins(), old_pins);
        }
        self.refresh_control_lines();
    }
}

impl<A: ViaAdapter> Observable for Via6522<A> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "ora" => Some(self.ora.into()),
            "orb" => Some(self.orb.into()),
            "ddra" => Some(self.ddra.into()),
            "ddrb" => Some(self.ddrb.into()),
            "t1.latch" => Some(self.t1_latch.into()),
            "t1.target" => Some(self.t1_target.get().into()),
            "t1.running" => Some(self.t1_running.into()),
            "t2.latch_lo" => Some(self.t2_latch_lo.into()),
            "t2.target" => Some(self.t2_target.get().into()),
            "t2.running" => Some(self.t2_running.into()),
            "sr" => Some(self.sr.into()),
            "sr.bits" => Some(self.sr_bits.into()),
            "acr" => Some(self.acr.into()),
            "pcr" => Some(self.pcr.into()),
            "ifr" => Some(self.ifr.into()),
            "ier" => Some(self.ier.into()),
            "ca2" => Some(self.ca2_out.into()),
            "cb2" => Some(self.cb2_out.into()),
            "pb7" => Some(self.pb7.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "ora",
            "orb",
            "ddra",
            "ddrb",
            "t1.latch",
            "t1.target",
            "t1.running",
            "t2.latch_lo",
            "t2.target",
            "t2.running",
            "sr",
            "sr.bits",
            "acr",
            "pcr",
            "ifr",
            "ier",
            "ca2",
            "cb2",
            "pb7",
        ]
    }
}
