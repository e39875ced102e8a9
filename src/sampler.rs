use std::hint;

use crate::bus::SnoopPins;
use crate::queue::{Observation, Producer};
use crate::registers::ViaRegister;

// The two halves of the register file the sampler alternates between. RS0 is
// the only address line it drives, so it can only tell these two apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn for_address(high: bool) -> Self {
        if high { Slot::A } else { Slot::B }
    }

    pub fn register(self) -> ViaRegister {
        match self {
            Slot::A => ViaRegister::PortA,
            Slot::B => ViaRegister::PortB,
        }
    }
}

// Watches the target's bus and turns every phase-2 cycle into an Observation.
//
// Nothing in here may block on anything but the qualifier line, log, or
// allocate: it owns its core and must keep up with the target's clock.
pub struct Sampler<P: SnoopPins> {
    pins: P,
    queue: Producer,

    // RS0 level for the next transaction
    address: bool,
}

impl<P: SnoopPins> Sampler<P> {
    pub fn new_sampler(pins: P, queue: Producer) -> Self {
        Self {
            pins: pins,
            queue: queue,

            address: false,
        }
    }

    // Holds until the target is selected and phase-2 is low, so the first
    // transaction starts on a clean cycle after reset.
    pub fn synchronise(&mut self) {
        while !self.pins.secondary_enable() || self.pins.qualifier() {
            hint::spin_loop();
        }
    }

    // One full bus cycle: select, wait for valid data, sample, deselect.
    pub fn transaction(&mut self) -> Observation {
        while self.pins.qualifier() {
            hint::spin_loop();
        }

        let address = self.address;
        self.pins.set_address_select(address);
        self.address = !address;
        self.pins.set_enable(true);

        while !self.pins.qualifier() {
            hint::spin_loop();
        }

        let data = self.pins.data();
        self.pins.set_enable(false);

        let observation = Observation::new(Slot::for_address(address).register().index(), data);
        self.queue.push(observation);

        observation
    }

    pub fn run(mut self) -> ! {
        self.synchronise();
        debug!("bus sampler synchronised, {} queue slots", self.queue.capacity());

        loop {
            self.transaction();
        }
    }
}
