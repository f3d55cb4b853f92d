//! Save and restore of chip state.
//!
//! One section per chip, tagged with [`ViaConfig::name`](crate::ViaConfig).
//! Payload:
//!
//! | Bytes | Field                                                        |
//! |-------|--------------------------------------------------------------|
//! | 18    | ORA ORB DDRA DDRB T1C-L T1C-H T1L-L T1L-H T2C-L T2C-H T2L-L  |
//! |       | SR ACR PCR IFR IER, PA input latch, PB input latch           |
//! | 1     | flags (see `FLAG_*`)                                         |
//! | 1     | shift bit count (0-8)                                        |
//! | 1     | input levels (see `INPUT_*`)                                 |
//! | 2     | cycles to the next internal shift clock, LE (0 = none)       |
//!
//! Counters hold their live values at the save cycle. Restore rebuilds the
//! underflow cycles relative to the restore cycle and reports the result to
//! the adapter through its `undump_*` slots, never through the live ones.

use emu_core::snapshot::Cursor;
use emu_core::{SnapshotError, SnapshotReader, SnapshotResult, SnapshotWriter, Ticks};
use tracing::{debug, warn};

use crate::shift::ShiftMode;
use crate::timer::LOAD_LATENCY;
use crate::{ACR_T1_CONTINUOUS, IFR_IRQ, Via6522, ViaAdapter, ViaAlarm};

pub const SNAPSHOT_MAJOR: u8 = 1;
pub const SNAPSHOT_MINOR: u8 = 0;

const REGISTER_BYTES: usize = 18;

const FLAG_T1_RUNNING: u8 = 0x01;
const FLAG_T1_FIRED: u8 = 0x02;
const FLAG_T2_RUNNING: u8 = 0x04;
const FLAG_T2_PULSE: u8 = 0x08;
const FLAG_CA2_OUT: u8 = 0x10;
const FLAG_CB2_OUT: u8 = 0x20;
const FLAG_PB7: u8 = 0x40;

const INPUT_CA1: u8 = 0x01;
const INPUT_CB1: u8 = 0x02;
const INPUT_CB2: u8 = 0x04;
const INPUT_PB6: u8 = 0x08;
const INPUT_CA2: u8 = 0x10;

/// A decoded payload. Nothing touches the chip until every field checks out.
struct Saved {
    regs: [u8; REGISTER_BYTES],
    flags: u8,
    sr_bits: u8,
    inputs: u8,
    shift_phase: u16,
}

impl Saved {
    fn parse(cur: &mut Cursor<'_>) -> SnapshotResult<Self> {
        let regs = cur.array::<REGISTER_BYTES>()?;
        let flags = cur.u8()?;
        if flags & 0x80 != 0 {
            return Err(SnapshotError::InvalidField("flags"));
        }
        let sr_bits = cur.u8()?;
        if sr_bits > 8 {
            return Err(SnapshotError::InvalidField("shift bit count"));
        }
        let inputs = cur.u8()?;
        if inputs & 0xE0 != 0 {
            return Err(SnapshotError::InvalidField("input levels"));
        }
        let shift_phase = u16::from_le_bytes(cur.array::<2>()?);
        Ok(Self {
            regs,
            flags,
            sr_bits,
            inputs,
            shift_phase,
        })
    }

    fn flag(&self, mask: u8) -> bool {
        self.flags & mask != 0
    }

    fn input(&self, mask: u8) -> bool {
        self.inputs & mask != 0
    }
}

impl<A: ViaAdapter> Via6522<A> {
    /// Append this chip's section to `w`.
    ///
    /// Alarms due at or before `now` must already have been dispatched.
    pub fn snapshot_write(&self, w: &mut SnapshotWriter, now: Ticks) {
        debug_assert!(
            self.alarms.next_due().is_none_or(|at| at > now),
            "snapshot taken with alarms still due"
        );
        let t1 = self.timer1_remaining(now);
        let t2 = self.timer2_counter(now);
        let regs = [
            self.ora,
            self.orb,
            self.ddra,
            self.ddrb,
            t1 as u8,
            (t1 >> 8) as u8,
            self.t1_latch as u8,
            (self.t1_latch >> 8) as u8,
            t2 as u8,
            (t2 >> 8) as u8,
            self.t2_latch_lo,
            self.sr,
            self.acr,
            self.pcr,
            self.ifr,
            self.ier,
            self.ila,
            self.ilb,
        ];

        let mut flags = 0;
        for (set, mask) in [
            (self.t1_running, FLAG_T1_RUNNING),
            (self.t1_fired, FLAG_T1_FIRED),
            (self.t2_running, FLAG_T2_RUNNING),
            (self.t2_pulse_mode, FLAG_T2_PULSE),
            (self.ca2_out, FLAG_CA2_OUT),
            (self.cb2_out, FLAG_CB2_OUT),
            (self.pb7, FLAG_PB7),
        ] {
            if set {
                flags |= mask;
            }
        }

        let mut inputs = 0;
        for (level, mask) in [
            (self.ca1_in, INPUT_CA1),
            (self.cb1_in, INPUT_CB1),
            (self.cb2_in, INPUT_CB2),
            (self.pb6_in, INPUT_PB6),
            (self.ca2_in, INPUT_CA2),
        ] {
            if level {
                inputs |= mask;
            }
        }

        let shift_phase = self
            .alarms
            .pending(ViaAlarm::Shift)
            .map_or(0, |at| at.since(now) as u16);

        w.section(&self.config.name, SNAPSHOT_MAJOR, SNAPSHOT_MINOR)
            .bytes(&regs)
            .u8(flags)
            .u8(self.sr_bits)
            .u8(inputs)
            .bytes(&shift_phase.to_le_bytes());
        debug!(via = %self.config.name, %now, "snapshot saved");
    }

    /// Restore this chip's section from `r`.
    ///
    /// On error the chip and its adapter are left exactly as they were.
    pub fn snapshot_read(&mut self, r: &SnapshotReader<'_>, now: Ticks) -> SnapshotResult<()> {
        let saved = self.parse_section(r).inspect_err(|err| {
            warn!(via = %self.config.name, %err, "snapshot rejected");
        })?;
        self.apply(&saved, now);
        debug!(via = %self.config.name, %now, "snapshot restored");
        Ok(())
    }

    fn parse_section(&self, r: &SnapshotReader<'_>) -> SnapshotResult<Saved> {
        let section = r.section(&self.config.name)?;
        if section.major != SNAPSHOT_MAJOR {
            return Err(SnapshotError::UnsupportedVersion {
                section: self.config.name.clone(),
                major: section.major,
                minor: section.minor,
            });
        }
        let mut cur = section.cursor();
        let saved = Saved::parse(&mut cur)?;
        // Later minor versions may append fields we do not know about.
        if section.minor <= SNAPSHOT_MINOR {
            cur.finish()?;
        }
        Ok(saved)
    }

    fn apply(&mut self, s: &Saved, now: Ticks) {
        let [
            ora,
            orb,
            ddra,
            ddrb,
            t1_lo,
            t1_hi,
            t1_latch_lo,
            t1_latch_hi,
            t2_lo,
            t2_hi,
            t2_latch_lo,
            sr,
            acr,
            pcr,
            ifr,
            ier,
            ila,
            ilb,
        ] = s.regs;

        self.alarms.clear();
        self.ora = ora;
        self.orb = orb;
        self.ddra = ddra;
        self.ddrb = ddrb;
        self.ila = ila;
        self.ilb = ilb;
        self.sr = sr;
        self.sr_bits = s.sr_bits;
        self.acr = acr;
        self.pcr = pcr;
        self.ifr = ifr & !IFR_IRQ;
        self.ier = ier & 0x7F;

        self.t1_latch = u16::from_le_bytes([t1_latch_lo, t1_latch_hi]);
        self.t1_running = s.flag(FLAG_T1_RUNNING);
        self.t1_fired = s.flag(FLAG_T1_FIRED);
        self.pb7 = s.flag(FLAG_PB7);
        let t1 = u16::from_le_bytes([t1_lo, t1_hi]);
        self.t1_target = now + u64::from(t1) + 1;
        let continuous = self.acr & ACR_T1_CONTINUOUS != 0;
        self.t1_reloaded_at = (self.t1_running
            && continuous
            && u64::from(t1) + 1 == u64::from(self.t1_latch) + LOAD_LATENCY)
            .then_some(now);
        if self.t1_running {
            self.alarms.set(ViaAlarm::Timer1, self.t1_target);
        }

        self.t2_latch_lo = t2_latch_lo;
        self.t2_running = s.flag(FLAG_T2_RUNNING);
        self.t2_pulse_mode = s.flag(FLAG_T2_PULSE);
        let t2 = u16::from_le_bytes([t2_lo, t2_hi]);
        self.t2_counter = t2;
        self.t2_target = now + u64::from(t2) + 1;
        if self.t2_running && !self.t2_pulse_mode {
            self.alarms.set(ViaAlarm::Timer2, self.t2_target);
        }

        if s.shift_phase != 0 && self.shift_period().is_some() {
            self.alarms
                .set(ViaAlarm::Shift, now + u64::from(s.shift_phase));
        }

        self.ca1_in = s.input(INPUT_CA1);
        self.cb1_in = s.input(INPUT_CB1);
        self.cb2_in = s.input(INPUT_CB2);
        self.pb6_in = s.input(INPUT_PB6);
        self.ca2_in = s.input(INPUT_CA2);

        self.ca2_out = s.flag(FLAG_CA2_OUT);
        self.cb2_out = s.flag(FLAG_CB2_OUT);
        self.ca2_driven = self.ca2_mode().is_output();
        let shift = self.shift_mode();
        self.cb2_driven =
            shift.drives_cb2() || (shift == ShiftMode::Disabled && self.cb2_mode().is_output());

        let active = self.ifr & self.ier != 0;
        if active {
            self.ifr |= IFR_IRQ;
        }

        self.adapter.undump_port_a(self.port_a_pins());
        self.adapter.undump_port_b(self.port_b_pins());
        self.adapter.undump_pcr(self.pcr);
        self.adapter.undump_acr(self.acr);
        self.adapter.restore_interrupt(active);
    }
}

#[cfg(test)]
mod tests {
    use emu_core::{SnapshotError, SnapshotReader, SnapshotWriter, Ticks};

    use crate::testing::via;
    use crate::{IFR_IRQ, IFR_T1, Line, reg};

    fn save(via: &crate::Via6522<crate::testing::Recorder>, now: u64) -> Vec<u8> {
        let mut w = SnapshotWriter::new();
        via.snapshot_write(&mut w, Ticks(now));
        w.finish()
    }

    #[test]
    fn round_trip_preserves_registers_and_alarms() {
        let mut src = via();
        src.store(Ticks(0), reg::DDRA, 0xF0);
        src.store(Ticks(0), reg::ORA, 0xA5);
        src.store(Ticks(0), reg::ACR, 0xC0);
        src.store(Ticks(0), reg::IER, 0xC0);
        src.store(Ticks(0), reg::T1CL, 0x40);
        src.store(Ticks(0), reg::T1CH, 0x00);
        src.store(Ticks(0), reg::T2CL, 0x80);
        src.store(Ticks(0), reg::T2CH, 0x01);
        src.dispatch_alarms(Ticks(100));
        let data = save(&src, 100);

        let mut dst = via();
        dst.snapshot_read(&SnapshotReader::new(&data), Ticks(100))
            .unwrap();
        for addr in 0..0x10 {
            assert_eq!(
                dst.peek(Ticks(100), addr),
                src.peek(Ticks(100), addr),
                "register {addr:#X}"
            );
        }
        assert_eq!(dst.next_alarm(), src.next_alarm());
        assert_eq!(dst.adapter().pins_a, Some(0xAF));
        assert_eq!(dst.adapter().irq, src.adapter().irq);
    }

    #[test]
    fn free_run_underflow_cycle_survives() {
        let mut src = via();
        src.store(Ticks(0), reg::ACR, 0x40);
        src.store(Ticks(0), reg::T1CL, 0x02);
        src.store(Ticks(0), reg::T1CH, 0x00);
        src.dispatch_alarms(Ticks(4));
        let data = save(&src, 4);

        let mut dst = via();
        dst.snapshot_read(&SnapshotReader::new(&data), Ticks(4))
            .unwrap();
        assert_eq!(dst.peek(Ticks(4), reg::T1CL), 0xFF);
        assert_eq!(dst.peek(Ticks(5), reg::T1CL), 2);
        assert_eq!(dst.next_alarm(), Some(Ticks(8)));
    }

    #[test]
    fn restore_uses_undump_slots_only() {
        let mut src = via();
        src.store(Ticks(0), reg::PCR, 0x0A); // CA2 pulse output
        let data = save(&src, 0);

        let mut dst = via();
        let irq_calls = dst.adapter().irq_calls;
        dst.snapshot_read(&SnapshotReader::new(&data), Ticks(0))
            .unwrap();
        assert!(dst.adapter().ca2.is_empty());
        assert_eq!(dst.adapter().irq_calls, irq_calls);

        // The pulse line is known to be driven, so a PCR rewrite is silent.
        dst.store(Ticks(1), reg::PCR, 0x0A);
        assert!(dst.adapter().ca2.is_empty());
    }

    #[test]
    fn restore_recomputes_irq_bit() {
        let mut src = via();
        src.ifr = IFR_T1 | IFR_IRQ;
        src.ier = IFR_T1;
        let mut data = save(&src, 0);
        // Name length, name, version, payload length, then IER at offset 15.
        let ier_at = 1 + "TEST".len() + 2 + 4 + 15;
        data[ier_at] = 0x00;

        let mut dst = via();
        dst.snapshot_read(&SnapshotReader::new(&data), Ticks(0))
            .unwrap();
        assert_eq!(dst.ifr(), IFR_T1);
        assert!(!dst.irq_active());
    }

    #[test]
    fn shift_phase_survives() {
        let mut src = via();
        src.store(Ticks(0), reg::ACR, 0x18);
        src.store(Ticks(0), reg::SR, 0x81);
        src.dispatch_alarms(Ticks(3));
        let data = save(&src, 3);

        let mut dst = via();
        dst.snapshot_read(&SnapshotReader::new(&data), Ticks(3))
            .unwrap();
        assert_eq!(dst.next_alarm(), Some(Ticks(4)));
        assert_eq!(dst.sr_bits, 1);
    }

    #[test]
    fn input_levels_survive() {
        let mut src = via();
        src.notify_edge(Ticks(0), Line::Ca1, false);
        src.store(Ticks(0), reg::IFR, 0x7F);
        let data = save(&src, 0);

        let mut dst = via();
        dst.snapshot_read(&SnapshotReader::new(&data), Ticks(0))
            .unwrap();
        // CA1 is already low: reporting low again is not an edge.
        dst.notify_edge(Ticks(1), Line::Ca1, false);
        assert_eq!(dst.ifr(), 0);
    }

    #[test]
    fn wrong_major_is_rejected() {
        let mut w = SnapshotWriter::new();
        w.section("TEST", 2, 0).bytes(&[0; 23]);
        let data = w.finish();

        let mut dst = via();
        let err = dst
            .snapshot_read(&SnapshotReader::new(&data), Ticks(0))
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnsupportedVersion { major: 2, .. }
        ));
    }

    #[test]
    fn bad_fields_leave_state_alone() {
        let mut dst = via();
        dst.store(Ticks(0), reg::DDRB, 0x3C);

        for payload in [
            vec![0u8; 10],
            [vec![0; 18], vec![0x80, 0, 0, 0, 0]].concat(),
            [vec![0; 18], vec![0, 9, 0, 0, 0]].concat(),
            [vec![0; 18], vec![0, 0, 0, 0, 0, 0]].concat(),
        ] {
            let mut w = SnapshotWriter::new();
            w.section("TEST", 1, 0).bytes(&payload);
            let data = w.finish();
            assert!(
                dst.snapshot_read(&SnapshotReader::new(&data), Ticks(0))
                    .is_err()
            );
            assert_eq!(dst.peek(Ticks(0), reg::DDRB), 0x3C);
        }
    }

    #[test]
    fn newer_minor_may_append_fields() {
        let current = save(&via(), 0);
        let payload = &current[1 + "TEST".len() + 2 + 4..];
        let mut w = SnapshotWriter::new();
        w.section("TEST", 1, 1).bytes(payload).u8(0xEE);
        let data = w.finish();

        let mut dst = via();
        assert!(
            dst.snapshot_read(&SnapshotReader::new(&data), Ticks(0))
                .is_ok()
        );
    }

    #[test]
    fn missing_section_is_an_error() {
        let mut w = SnapshotWriter::new();
        w.section("VIA2", 1, 0).bytes(&[0; 23]);
        let data = w.finish();
        let mut dst = via();
        assert_eq!(
            dst.snapshot_read(&SnapshotReader::new(&data), Ticks(0)),
            Err(SnapshotError::MissingSection("TEST".to_string()))
        );
    }
}
