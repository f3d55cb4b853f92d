//! Core types shared by the chip emulations.
//!
//! Time is counted in virtual clock cycles ([`Ticks`]). Chips never poll a
//! wall clock: future work is registered in an [`AlarmQueue`] and interrupt
//! outputs are wired through an [`InterruptController`].

mod alarm;
mod interrupt;
mod observable;
pub mod snapshot;
mod ticks;

pub use alarm::AlarmQueue;
pub use interrupt::{InterruptController, IrqLine};
pub use observable::{Observable, Value};
pub use snapshot::{SnapshotError, SnapshotReader, SnapshotResult, SnapshotWriter};
pub use ticks::Ticks;
