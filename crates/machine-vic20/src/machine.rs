//! VIA1 as the VIC-20's CPU sees it.
//!
//! The CPU owns the clock. Before every bus access, and before running past
//! [`Vic20Via1Machine::next_event`], the machine lets the chip catch up to
//! the current cycle.

use emu_core::{IrqLine, SnapshotReader, SnapshotResult, SnapshotWriter, Ticks};
use mos_via_6522::{Line, Via6522, ViaConfig};
use tracing::debug;

use crate::via1::Vic20Via1;

/// First address of the VIA1 register window.
pub const VIA1_BASE: u16 = 0x9110;

/// VIA1 plus the wiring around it.
pub struct Vic20Via1Machine {
    via: Via6522<Vic20Via1>,
}

impl Vic20Via1Machine {
    /// Power up and reset at cycle 0.
    #[must_use]
    pub fn new() -> Self {
        let mut via = Via6522::new(ViaConfig::named("VIA1"), Vic20Via1::new());
        via.reset(Ticks::ZERO);
        Self { via }
    }

    pub fn reset(&mut self, now: Ticks) {
        debug!(%now, "VIA1 reset");
        self.via.reset(now);
    }

    /// Whether `addr` falls in the VIA1 window.
    #[must_use]
    pub fn decodes(addr: u16) -> bool {
        addr & 0xFFF0 == VIA1_BASE
    }

    /// CPU read. `None` when the address belongs to someone else.
    pub fn read(&mut self, now: Ticks, addr: u16) -> Option<u8> {
        Self::decodes(addr).then(|| self.via.read(now, (addr & 0x0F) as u8))
    }

    /// Debugger read without side effects.
    pub fn peek(&mut self, now: Ticks, addr: u16) -> Option<u8> {
        Self::decodes(addr).then(|| self.via.peek(now, (addr & 0x0F) as u8))
    }

    /// CPU write. Returns whether the address was claimed.
    pub fn write(&mut self, now: Ticks, addr: u16, value: u8) -> bool {
        if !Self::decodes(addr) {
            return false;
        }
        self.via.store(now, (addr & 0x0F) as u8, value);
        true
    }

    /// Cycle of the next timer or shift event, if any.
    #[must_use]
    pub fn next_event(&self) -> Option<Ticks> {
        self.via.next_alarm()
    }

    /// Bring the chip up to `now`.
    pub fn run_until(&mut self, now: Ticks) {
        self.via.dispatch_alarms(now);
    }

    /// RESTORE key on CA1. The line idles high.
    pub fn set_restore_key(&mut self, now: Ticks, pressed: bool) {
        self.via.notify_edge(now, Line::Ca1, !pressed);
    }

    /// User port pin B (CB1).
    pub fn set_user_port_cb1(&mut self, now: Ticks, level: bool) {
        self.via.notify_edge(now, Line::Cb1, level);
    }

    /// User port pin M (CB2) when CB2 is an input.
    pub fn set_user_port_cb2(&mut self, now: Ticks, level: bool) {
        self.via.notify_edge(now, Line::Cb2, level);
    }

    #[must_use]
    pub fn nmi_asserted(&self) -> bool {
        self.via.adapter().interrupts().asserted(IrqLine::Nmi)
    }

    /// Append VIA1's snapshot section.
    pub fn save(&mut self, w: &mut SnapshotWriter, now: Ticks) {
        self.via.dispatch_alarms(now);
        self.via.snapshot_write(w, now);
    }

    /// Restore VIA1 from a snapshot. On error nothing changes.
    pub fn load(&mut self, r: &SnapshotReader<'_>, now: Ticks) -> SnapshotResult<()> {
        self.via.snapshot_read(r, now)
    }

    #[must_use]
    pub fn via(&self) -> &Via6522<Vic20Via1> {
        &self.via
    }

    pub fn via_mut(&mut self) -> &mut Via6522<Vic20Via1> {
        &mut self.via
    }

    #[must_use]
    pub fn adapter(&self) -> &Vic20Via1 {
        self.via.adapter()
    }

    pub fn adapter_mut(&mut self) -> &mut Vic20Via1 {
        self.via.adapter_mut()
    }
}

impl Default for Vic20Via1Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joystick::FIRE;

    const IER: u16 = VIA1_BASE + 0xE;
    const IFR: u16 = VIA1_BASE + 0xD;

    #[test]
    fn decodes_only_its_window() {
        let mut m = Vic20Via1Machine::new();
        assert!(m.read(Ticks(0), 0x9120).is_none());
        assert!(!m.write(Ticks(0), 0x910F, 0));
        assert_eq!(m.read(Ticks(0), IER), Some(0x80));
    }

    #[test]
    fn timer1_raises_nmi() {
        let mut m = Vic20Via1Machine::new();
        m.write(Ticks(0), IER, 0xC0);
        m.write(Ticks(0), VIA1_BASE + 4, 0x10);
        m.write(Ticks(0), VIA1_BASE + 5, 0x00);
        assert_eq!(m.next_event(), Some(Ticks(0x12)));

        m.run_until(Ticks(0x11));
        assert!(!m.nmi_asserted());
        m.run_until(Ticks(0x12));
        assert!(m.nmi_asserted());

        m.read(Ticks(0x20), VIA1_BASE + 4);
        assert!(!m.nmi_asserted());
    }

    #[test]
    fn restore_key_sets_ca1_flag() {
        let mut m = Vic20Via1Machine::new();
        m.write(Ticks(0), IER, 0x82);
        m.set_restore_key(Ticks(5), true);
        assert!(m.nmi_asserted());
        assert_eq!(m.peek(Ticks(6), IFR), Some(0x82));
        m.set_restore_key(Ticks(7), false);
        m.read(Ticks(8), VIA1_BASE + 1);
        assert!(!m.nmi_asserted());
    }

    #[test]
    fn joystick_fire_reads_on_pa5() {
        let mut m = Vic20Via1Machine::new();
        m.adapter_mut().joystick_mut().press(FIRE);
        let pa = m.read(Ticks(0), VIA1_BASE + 0xF).unwrap_or(0xFF);
        assert_eq!(pa & 0x20, 0);
    }

    #[test]
    fn pa5_output_triggers_light_pen() {
        let mut m = Vic20Via1Machine::new();
        m.write(Ticks(0), VIA1_BASE + 3, 0x20);
        m.write(Ticks(1), VIA1_BASE + 0xF, 0x00);
        assert!(m.adapter().light_pen());
        m.write(Ticks(2), VIA1_BASE + 3, 0x00);
        assert!(!m.adapter().light_pen());

        m.adapter_mut().joystick_mut().press(FIRE);
        m.adapter_mut().check_light_pen();
        assert!(m.adapter().light_pen());
    }

    #[test]
    fn snapshot_round_trip() {
        let mut m = Vic20Via1Machine::new();
        m.write(Ticks(0), VIA1_BASE + 2, 0xFF);
        m.write(Ticks(0), VIA1_BASE, 0x5A);
        m.write(Ticks(0), VIA1_BASE + 8, 0x00);
        m.write(Ticks(0), VIA1_BASE + 9, 0x02);

        let mut w = SnapshotWriter::new();
        m.save(&mut w, Ticks(40));
        let data = w.finish();

        let mut restored = Vic20Via1Machine::new();
        restored
            .load(&SnapshotReader::new(&data), Ticks(40))
            .unwrap();
        assert_eq!(restored.adapter().user_port().pb(), 0x5A);
        assert_eq!(restored.next_event(), m.next_event());
        assert_eq!(
            restored.peek(Ticks(40), VIA1_BASE + 8),
            m.peek(Ticks(40), VIA1_BASE + 8)
        );
    }

    #[test]
    fn restored_nmi_is_not_a_new_edge() {
        let mut m = Vic20Via1Machine::new();
        m.write(Ticks(0), IER, 0x82);
        m.set_restore_key(Ticks(1), true);
        assert!(m.nmi_asserted());

        let mut w = SnapshotWriter::new();
        m.save(&mut w, Ticks(2));
        let data = w.finish();

        let mut restored = Vic20Via1Machine::new();
        restored
            .load(&SnapshotReader::new(&data), Ticks(2))
            .unwrap();
        assert!(restored.nmi_asserted());
        let nmi = restored.adapter().interrupts();
        assert_eq!(nmi.edge_count(IrqLine::Nmi), 0);
    }
}
