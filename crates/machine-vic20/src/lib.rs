//! VIC-20 VIA1 wiring.
//!
//! VIA1 sits at $9110-$911F. Its port A carries the IEC serial bus inputs,
//! ATN output, joystick switches and tape sense; port B is the user port.
//! CA1 is the RESTORE key and the interrupt output drives NMI.
//!
//! [`Vic20Via1`] is the [`ViaAdapter`](mos_via_6522::ViaAdapter) that gives
//! those bits meaning. [`Vic20Via1Machine`] owns the chip and its adapter
//! and presents the CPU-facing address window.

mod iec;
pub mod joystick;
mod machine;
mod user_port;
mod via1;

pub use iec::IecBus;
pub use joystick::Joystick;
pub use machine::{VIA1_BASE, Vic20Via1Machine};
pub use user_port::UserPort;
pub use via1::{TapePort, VIA1_INT_SOURCE, Vic20Via1};
