//! VIA1 ($9110-$911F) adapter.
//!
//! Port A:
//!
//! | Bit | Function                                 |
//! |-----|------------------------------------------|
//! | 0   | IEC CLK in                               |
//! | 1   | IEC DATA in                              |
//! | 2   | Joystick up                              |
//! | 3   | Joystick down                            |
//! | 4   | Joystick left                            |
//! | 5   | Joystick fire, light pen                 |
//! | 6   | Tape sense in (0 = button down), PA6 out |
//! | 7   | IEC ATN out / in                         |
//!
//! Port B is the user port. PB0-PB3 also select the colour RAM bank for
//! the VFLI modification. CA1 is the RESTORE key, CB1/CB2 are user port
//! pins B and M. The interrupt output is wired to the CPU's NMI.

use emu_core::{InterruptController, IrqLine, Ticks};
use mos_via_6522::ViaAdapter;
use tracing::trace;

use crate::iec::IecBus;
use crate::joystick::Joystick;
use crate::user_port::UserPort;

/// Source number VIA1 uses on the interrupt controller.
pub const VIA1_INT_SOURCE: u8 = 0;

/// Datasette connector lines handled by VIA1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TapePort {
    /// A play/record button is held down.
    pub sense: bool,
    /// Motor power, switched by CA2.
    pub motor: bool,
    /// Level the computer drives back onto the sense line.
    pub sense_out: bool,
    /// Write line as reported by the recorder.
    pub write_in: bool,
    /// Motor line as reported by the recorder.
    pub motor_in: bool,
}

/// Everything VIA1 is soldered to.
#[derive(Debug, Clone, Default)]
pub struct Vic20Via1 {
    iec: IecBus,
    joystick: Joystick,
    tape: TapePort,
    user_port: UserPort,
    /// PA pins last pulled low by the chip, for the light pen check.
    pa_low: u8,
    /// Light pen input of the VIC is triggered (PA5 pulled low).
    light_pen: bool,
    /// PB0-PB3 as the colour RAM bank select.
    vfli_bank: u8,
    /// Last PCR seen, so only changes reach the tape motor.
    pcr: u8,
    interrupts: InterruptController,
}

impl Vic20Via1 {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn iec(&self) -> &IecBus {
        &self.iec
    }

    pub fn iec_mut(&mut self) -> &mut IecBus {
        &mut self.iec
    }

    #[must_use]
    pub fn joystick(&self) -> &Joystick {
        &self.joystick
    }

    pub fn joystick_mut(&mut self) -> &mut Joystick {
        &mut self.joystick
    }

    #[must_use]
    pub fn tape(&self) -> &TapePort {
        &self.tape
    }

    pub fn set_tape_sense(&mut self, pressed: bool) {
        self.tape.sense = pressed;
    }

    pub fn set_tape_write_in(&mut self, level: bool) {
        self.tape.write_in = level;
    }

    pub fn set_tape_motor_in(&mut self, level: bool) {
        self.tape.motor_in = level;
    }

    /// Whether the VIC's light pen input is triggered.
    #[must_use]
    pub fn light_pen(&self) -> bool {
        self.light_pen
    }

    /// Re-evaluate the light pen after the joystick changed.
    ///
    /// The fire switch shares PA5 with the light pen: the pen triggers while
    /// either the switch or the chip pulls that pin low.
    pub fn check_light_pen(&mut self) {
        self.update_light_pen(!self.pa_low);
    }

    fn update_light_pen(&mut self, pins: u8) {
        let triggered = self.joystick_pins() & pins & 0x20 == 0;
        if triggered != self.light_pen {
            trace!(triggered, "light pen");
        }
        self.light_pen = triggered;
    }

    /// Joystick switches in port A bit positions (PA2-PA5), active low.
    fn joystick_pins(&self) -> u8 {
        let joy = self.joystick.lines();
        ((joy & 0x07) << 2) | ((joy & 0x10) << 1) | 0xC3
    }

    #[must_use]
    pub fn user_port(&self) -> &UserPort {
        &self.user_port
    }

    pub fn user_port_mut(&mut self) -> &mut UserPort {
        &mut self.user_port
    }

    #[must_use]
    pub fn vfli_bank(&self) -> u8 {
        self.vfli_bank
    }

    #[must_use]
    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }
}

impl ViaAdapter for Vic20Via1 {
    fn read_port_a(&mut self, _driven: u8) -> u8 {
        let joy_bits = self.joystick_pins() & 0x3C;
        let sense = if self.tape.sense { 0 } else { 0x40 };
        self.iec.read_port_a() | joy_bits | sense
    }

    fn read_port_b(&mut self, driven: u8) -> u8 {
        self.user_port.read_pb(driven)
    }

    fn store_port_a(&mut self, pins: u8, _old_pins: u8) {
        self.pa_low = !pins;
        self.update_light_pen(pins);
        self.iec.write_port_a(pins);
        self.joystick
            .store_output(((pins & 0x20) >> 1) | ((pins & 0x1C) >> 2));
        self.tape.sense_out = pins & 0x40 != 0;
        self.user_port.set_pa6(pins & 0x40 != 0);
    }

    fn store_port_b(&mut self, pins: u8, _old_pins: u8) {
        self.vfli_bank = pins & 0x0F;
        self.user_port.store_pb(pins);
    }

    fn store_pcr(&mut self, pcr: u8) {
        if pcr == self.pcr {
            return;
        }
        self.pcr = pcr;
        let motor = pcr & 0x02 == 0;
        if motor != self.tape.motor {
            trace!(motor, "tape motor");
        }
        self.tape.motor = motor;
        self.user_port.set_pa2(pcr & 0x20 != 0);
    }

    fn store_acr(&mut self, _acr: u8) {}

    fn store_sr(&mut self, _sr: u8) {}

    fn store_t2_low(&mut self, _value: u8) {}

    fn undump_port_a(&mut self, pins: u8) {
        self.pa_low = !pins;
        self.iec.write_port_a(pins);
    }

    fn undump_port_b(&mut self, pins: u8) {
        self.user_port.restore_pb(pins);
    }

    fn undump_pcr(&mut self, pcr: u8) {
        self.pcr = pcr;
    }

    fn undump_acr(&mut self, _acr: u8) {}

    fn set_interrupt(&mut self, asserted: bool, at: Ticks) {
        self.interrupts
            .set(IrqLine::Nmi, VIA1_INT_SOURCE, asserted, at);
    }

    fn restore_interrupt(&mut self, asserted: bool) {
        self.interrupts
            .restore(IrqLine::Nmi, VIA1_INT_SOURCE, asserted);
    }

    fn set_ca2(&mut self, _level: bool) {}

    fn set_cb2(&mut self, level: bool) {
        self.user_port.set_pa2(level);
    }

    fn reset(&mut self) {
        self.user_port.release();
        self.pcr = 0;
        self.pa_low = 0;
        self.check_light_pen();
    }
}
