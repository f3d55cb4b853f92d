//! Machine-side wiring of a VIA.

use emu_core::Ticks;

/// Callbacks through which a VIA talks to the machine it is soldered into.
///
/// The chip only knows about generic port bits and control lines. Each host
/// machine implements this trait once to say what those bits mean (joystick
/// switches, serial bus lines, tape sense, ...). The adapter is moved into
/// the [`Via6522`](crate::Via6522) at construction and stays bound for the
/// chip's lifetime. No method has a default body: a machine has to decide
/// what every slot does, even if the answer is "nothing".
///
/// Callbacks run synchronously inside the bus access or alarm that caused
/// them and only get `&mut self` of the adapter, so they cannot reach back
/// into the chip.
///
/// Port images passed to the `store_*`/`undump_*` methods are pin levels:
/// output bits carry the output register, input bits read as 1 (pulled up).
pub trait ViaAdapter {
    /// External levels on the port A pins.
    ///
    /// `driven` is the chip's own pin image, for open-collector wiring where
    /// the result is the AND of both sides. Only bits configured as input are
    /// used by the chip.
    fn read_port_a(&mut self, driven: u8) -> u8;

    /// External levels on the port B pins. See [`read_port_a`](Self::read_port_a).
    fn read_port_b(&mut self, driven: u8) -> u8;

    /// Port A pins changed because of an ORA or DDRA store.
    fn store_port_a(&mut self, pins: u8, old_pins: u8);

    /// Port B pins changed because of an ORB or DDRB store, an ACR store, or
    /// a Timer 1 PB7 toggle.
    fn store_port_b(&mut self, pins: u8, old_pins: u8);

    /// The peripheral control register was written.
    fn store_pcr(&mut self, pcr: u8);

    /// The auxiliary control register was written.
    fn store_acr(&mut self, acr: u8);

    /// The shift register was written.
    fn store_sr(&mut self, sr: u8);

    /// The Timer 2 low latch was written.
    fn store_t2_low(&mut self, value: u8);

    /// Port A pins after a snapshot restore. Must not act like a live write.
    fn undump_port_a(&mut self, pins: u8);

    /// Port B pins after a snapshot restore.
    fn undump_port_b(&mut self, pins: u8);

    /// PCR after a snapshot restore.
    fn undump_pcr(&mut self, pcr: u8);

    /// ACR after a snapshot restore.
    fn undump_acr(&mut self, acr: u8);

    /// Drive the chip's interrupt output. Called after every IFR/IER change;
    /// the adapter picks which CPU line (IRQ or NMI) it is wired to.
    fn set_interrupt(&mut self, asserted: bool, at: Ticks);

    /// Interrupt output after a snapshot restore (no edge).
    fn restore_interrupt(&mut self, asserted: bool);

    /// New output level on CA2.
    fn set_ca2(&mut self, level: bool);

    /// New output level on CB2.
    fn set_cb2(&mut self, level: bool);

    /// The chip was reset.
    fn reset(&mut self);
}
