//! Interrupt line aggregation.
//!
//! Several chips can pull the same CPU interrupt line. Each source is
//! identified by a small number and the line is asserted while any source
//! holds it.

use crate::Ticks;

/// CPU interrupt input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IrqLine {
    /// Maskable interrupt request.
    Irq,
    /// Non-maskable interrupt.
    Nmi,
}

#[derive(Debug, Clone, Copy, Default)]
struct LineState {
    /// One bit per source currently holding the line.
    sources: u32,
    /// Cycle of the last assert/deassert transition.
    changed_at: Option<Ticks>,
    /// Number of deasserted -> asserted transitions (NMI is edge-triggered).
    edges: u64,
}

/// Wired-OR interrupt lines for one machine.
#[derive(Debug, Clone, Default)]
pub struct InterruptController {
    irq: LineState,
    nmi: LineState,
}

impl InterruptController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert or release `line` on behalf of `source` at cycle `at`.
    pub fn set(&mut self, line: IrqLine, source: u8, asserted: bool, at: Ticks) {
        debug_assert!(source < 32, "interrupt source {source} out of range");
        let state = self.line_mut(line);
        let was = state.sources != 0;
        let bit = 1u32 << (source & 31);
        if asserted {
            state.sources |= bit;
        } else {
            state.sources &= !bit;
        }
        let now = state.sources != 0;
        if was != now {
            state.changed_at = Some(at);
            if now {
                state.edges += 1;
            }
        }
    }

    /// Restore a source's level after loading a snapshot.
    ///
    /// Unlike [`set`](Self::set) this never counts an edge, so a restored
    /// NMI is not taken a second time.
    pub fn restore(&mut self, line: IrqLine, source: u8, asserted: bool) {
        let state = self.line_mut(line);
        let bit = 1u32 << (source & 31);
        if asserted {
            state.sources |= bit;
        } else {
            state.sources &= !bit;
        }
    }

    /// Whether any source holds `line`.
    #[must_use]
    pub fn asserted(&self, line: IrqLine) -> bool {
        self.line(line).sources != 0
    }

    /// Whether `source` is holding `line`.
    #[must_use]
    pub fn source_asserted(&self, line: IrqLine, source: u8) -> bool {
        self.line(line).sources & (1u32 << (source & 31)) != 0
    }

    /// Cycle of the last transition on `line`.
    #[must_use]
    pub fn changed_at(&self, line: IrqLine) -> Option<Ticks> {
        self.line(line).changed_at
    }

    /// Number of times `line` went from released to asserted.
    #[must_use]
    pub fn edge_count(&self, line: IrqLine) -> u64 {
        self.line(line).edges
    }

    fn line(&self, line: IrqLine) -> &LineState {
        match line {
            IrqLine::Irq => &self.irq,
            IrqLine::Nmi => &self.nmi,
        }
    }

    fn line_mut(&mut self, line: IrqLine) -> &mut LineState {
        match line {
            IrqLine::Irq => &mut self.irq,
            IrqLine::Nmi => &mut self.nmi,
        }
    }
}
