use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;

// Phase-2 rate of the VIC-20 (PAL) the VIA normally sits in.
pub const VIC_PAL_CLOCK: u64 = 4_433_618;
pub const VIC_CPU_CLOCK: u64 = VIC_PAL_CLOCK / 4;

// What the data bus reads as while nothing is driving it.
pub const FLOATING_BUS: u8 = 0xff;

// The handful of lines the sampler watches and drives. Implementations must
// answer with sub-microsecond latency; the sampler polls them in a tight loop.
pub trait SnoopPins {
    // Phase-2 qualifier: high while the data bus is valid.
    fn qualifier(&mut self) -> bool;

    // High once the target is out of reset and selected.
    fn secondary_enable(&mut self) -> bool;

    // RS0: low selects port B, high selects port A.
    fn set_address_select(&mut self, _high: bool) { }

    // Gates the target's outputs onto the shared data bus.
    fn set_enable(&mut self, _enabled: bool) { }

    fn data(&mut self) -> u8 { FLOATING_BUS }
}

struct Target {
    reset_released: AtomicBool,
    port_a: AtomicU8,
    port_b: AtomicU8,
}

// Handle for whoever plays the part of the host machine: releases the target
// from reset and sets what its ports output.
#[derive(Clone)]
pub struct TargetControl {
    target: Arc<Target>,
}

impl TargetControl {
    pub fn release_reset(&self) {
        self.target.reset_released.store(true, Ordering::Release);
    }

    pub fn set_ports(&self, port_a: u8, port_b: u8) {
        self.target.port_a.store(port_a, Ordering::Relaxed);
        self.target.port_b.store(port_b, Ordering::Relaxed);
    }

    pub fn ports(&self) -> (u8, u8) {
        (self.target.port_a.load(Ordering::Relaxed), self.target.port_b.load(Ordering::Relaxed))
    }
}

// A software stand-in for the target: a VIA whose phase-2 clock is derived
// from wall time, held in reset until released.
pub struct SimulatedBus {
    target: Arc<Target>,
    start: Instant,
    half_period_ns: u128,

    address: bool,
    enabled: bool,
}

impl SimulatedBus {
    pub fn new_bus(clock_hz: u64) -> (Self, TargetControl) {
        let clock_hz = clock_hz.max(1).min(VIC_CPU_CLOCK);

        // Same patterns the tester drives onto the port pins at power-up.
        let target = Arc::new(Target {
            reset_released: AtomicBool::new(false),
            port_a: AtomicU8::new(0b1010_1010),
            port_b: AtomicU8::new(0b0101_0101),
        });

        let bus = Self {
            target: target.clone(),
            start: Instant::now(),
            half_period_ns: (1_000_000_000 / (2 * clock_hz as u128)).max(1),

            address: false,
            enabled: false,
        };

        (bus, TargetControl { target: target })
    }
}

impl SnoopPins for SimulatedBus {
    fn qualifier(&mut self) -> bool {
        let half_periods = self.start.elapsed().as_nanos() / self.half_period_ns;
        (half_periods & 1) == 1
    }

    fn secondary_enable(&mut self) -> bool {
        self.target.reset_released.load(Ordering::Acquire)
    }

    fn set_address_select(&mut self, high: bool) {
        self.address = high;
    }

    fn set_enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn data(&mut self) -> u8 {
        if !self.enabled {
            return FLOATING_BUS;
        }

        if self.address {
            self.target.port_a.load(Ordering::Relaxed)
        } else {
            self.target.port_b.load(Ordering::Relaxed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use std::thread;

    #[test]
    fn test_held_in_reset() {
        let (mut bus, control) = SimulatedBus::new_bus(1000);

        assert!(!bus.secondary_enable());
        control.release_reset();
        assert!(bus.secondary_enable());
    }

    #[test]
    fn test_data_follows_address_select() {
        let (mut bus, control) = SimulatedBus::new_bus(1000);

        assert_eq!(bus.data(), FLOATING_BUS);

        bus.set_enable(true);
        bus.set_address_select(false);
        assert_eq!(bus.data(), 0x55);
        bus.set_address_select(true);
        assert_eq!(bus.data(), 0xaa);

        control.set_ports(0x12, 0x34);
        assert_eq!(control.ports(), (0x12, 0x34));
        assert_eq!(bus.data(), 0x12);

        bus.set_enable(false);
        assert_eq!(bus.data(), FLOATING_BUS);
    }

    #[test]
    fn test_qualifier_toggles() {
        let (mut bus, _control) = SimulatedBus::new_bus(1000);

        // 500us half period, the level must change within a few of them.
        let first = bus.qualifier();
        let mut changed = false;
        for _ in 0 .. 20 {
            thread::sleep(Duration::from_micros(250));
            if bus.qualifier() != first {
                changed = true;
                break;
            }
        }

        assert!(changed);
    }

    #[test]
    fn test_clock_is_clamped() {
        let (bus, _control) = SimulatedBus::new_bus(0);
        assert_eq!(bus.half_period_ns, 500_000_000);

        let (bus, _control) = SimulatedBus::new_bus(u64::MAX);
        assert_eq!(bus.half_period_ns, 1_000_000_000 / (2 * VIC_CPU_CLOCK as u128));
    }
}
