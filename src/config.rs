use std::env;

use crate::queue::QUEUE_CAPACITY;
use crate::scanout::VGA_FPS;

// Simulated target's phase-2 rate unless VIASNOOP_CLOCK_HZ says otherwise.
pub const DEFAULT_CLOCK_HZ: u64 = 1_000;

// Fastest simulated clock: one full queue per displayed frame. Anything faster
// would overflow the queue whenever a frame's drawing holds off the drain.
pub const MAX_CLOCK_HZ: u64 = QUEUE_CAPACITY as u64 * VGA_FPS as u64;

lazy_static!{
    pub static ref VIASNOOP_TRACE: bool = flag(env::var("VIASNOOP_TRACE").ok());

    pub static ref VIASNOOP_ANIMATE: bool = flag(env::var("VIASNOOP_ANIMATE").ok());

    pub static ref VIASNOOP_CLOCK_HZ: u64 = clock_hz(env::var("VIASNOOP_CLOCK_HZ").ok());
}

fn flag(val: Option<String>) -> bool {
    match val {
        Some(val) => val != "" && val != "0",
        None      => false,
    }
}

fn clock_hz(val: Option<String>) -> u64 {
    let val = match val {
        Some(val) => val,
        None      => return DEFAULT_CLOCK_HZ,
    };

    match val.trim().parse::<u64>() {
        Ok(hz) if hz > MAX_CLOCK_HZ => {
            warn!("VIASNOOP_CLOCK_HZ={} is faster than the display can drain, using {} Hz", hz, MAX_CLOCK_HZ);
            MAX_CLOCK_HZ
        },
        Ok(hz) if hz > 0 => hz,
        _ => {
            warn!("ignoring VIASNOOP_CLOCK_HZ={:?}, using {} Hz", val, DEFAULT_CLOCK_HZ);
            DEFAULT_CLOCK_HZ
        },
    }
}
