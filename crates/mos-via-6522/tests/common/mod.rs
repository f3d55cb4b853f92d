//! Adapter that logs every callback, shared by the integration tests.

#![allow(dead_code)]

use emu_core::Ticks;
use mos_via_6522::{Via6522, ViaAdapter, ViaConfig};

/// One adapter callback, in the order the chip made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StorePortA(u8),
    StorePortB(u8),
    Pcr(u8),
    Acr(u8),
    UndumpPortA(u8),
    UndumpPortB(u8),
    UndumpPcr(u8),
    UndumpAcr(u8),
    Interrupt(bool, Ticks),
    RestoreInterrupt(bool),
    Ca2(bool),
    Cb2(bool),
    Reset,
}

#[derive(Debug, Default)]
pub struct RecordingAdapter {
    pub port_a_in: u8,
    pub port_b_in: u8,
    pub events: Vec<Event>,
    /// Level of the interrupt output as last reported.
    pub irq: bool,
}

impl RecordingAdapter {
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Events other than interrupt reports, which arrive after every access.
    pub fn take_without_interrupts(&mut self) -> Vec<Event> {
        self.take()
            .into_iter()
            .filter(|e| !matches!(e, Event::Interrupt(..)))
            .collect()
    }

    /// Cycles at which the interrupt output went from low to high.
    pub fn rising_interrupts(&self) -> Vec<Ticks> {
        let mut level = false;
        let mut edges = Vec::new();
        for event in &self.events {
            if let Event::Interrupt(asserted, at) = *event {
                if asserted && !level {
                    edges.push(at);
                }
                level = asserted;
            }
        }
        edges
    }
}

impl ViaAdapter for RecordingAdapter {
    fn read_port_a(&mut self, _driven: u8) -> u8 {
        self.port_a_in
    }
    fn read_port_b(&mut self, _driven: u8) -> u8 {
        self.port_b_in
    }
    fn store_port_a(&mut self, pins: u8, _old_pins: u8) {
        self.events.push(Event::StorePortA(pins));
    }
    fn store_port_b(&mut self, pins: u8, _old_pins: u8) {
        self.events.push(Event::StorePortB(pins));
    }
    fn store_pcr(&mut self, pcr: u8) {
        self.events.push(Event::Pcr(pcr));
    }
    fn store_acr(&mut self, acr: u8) {
        self.events.push(Event::Acr(acr));
    }
    fn store_sr(&mut self, _sr: u8) {}
    fn store_t2_low(&mut self, _value: u8) {}
    fn undump_port_a(&mut self, pins: u8) {
        self.events.push(Event::UndumpPortA(pins));
    }
    fn undump_port_b(&mut self, pins: u8) {
        self.events.push(Event::UndumpPortB(pins));
    }
    fn undump_pcr(&mut self, pcr: u8) {
        self.events.push(Event::UndumpPcr(pcr));
    }
    fn undump_acr(&mut self, acr: u8) {
        self.events.push(Event::UndumpAcr(acr));
    }
    fn set_interrupt(&mut self, asserted: bool, at: Ticks) {
        self.irq = asserted;
        self.events.push(Event::Interrupt(asserted, at));
    }
    fn restore_interrupt(&mut self, asserted: bool) {
        self.irq = asserted;
        self.events.push(Event::RestoreInterrupt(asserted));
    }
    fn set_ca2(&mut self, level: bool) {
        self.events.push(Event::Ca2(level));
    }
    fn set_cb2(&mut self, level: bool) {
        self.events.push(Event::Cb2(level));
    }
    fn reset(&mut self) {
        self.events.push(Event::Reset);
    }
}

/// A freshly reset chip with an empty event log.
pub fn via(name: &str) -> Via6522<RecordingAdapter> {
    let mut via = Via6522::new(ViaConfig::named(name), RecordingAdapter::default());
    via.reset(Ticks::ZERO);
    via.adapter_mut().events.clear();
    via
}
