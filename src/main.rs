#[macro_use] extern crate log;
#[macro_use] extern crate lazy_static;

mod bus;
mod config;
mod queue;
mod registers;
mod renderer;
mod sampler;
mod scanout;
mod surface;

use std::panic;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::bus::{SimulatedBus, TargetControl};
use crate::config::{VIASNOOP_ANIMATE, VIASNOOP_CLOCK_HZ};
use crate::renderer::Renderer;
use crate::sampler::Sampler;
use crate::surface::Surface;

const HOST_STEP: Duration = Duration::from_millis(250);

type PanicHook = Box<dyn Fn(&panic::PanicInfo) + Sync + Send + 'static>;

// Wraps `report` so that once a panic has been reported, `halt` is called.
//
// The device is useless once the sampler has overflowed the queue, and the
// sampler thread dying on its own would leave a frozen display that looks
// alive. `main` passes `process::abort` as `halt`, so a panic on any thread
// stops everything.
fn halting_hook<H>(report: PanicHook, halt: H) -> PanicHook
    where H: Fn() + Sync + Send + 'static
{
    Box::new(move |info| {
        report(info);
        error!("halting: {}", info);
        halt();
    })
}

fn halt_on_panic() {
    panic::set_hook(halting_hook(panic::take_hook(), || { process::abort(); }));
}

// Plays the host machine: keeps writing new values to the target's ports.
fn spawn_host(target: TargetControl) -> Result<(), String> {
    thread::Builder::new()
        .name("host".to_string())
        .spawn(move || {
            loop {
                thread::sleep(HOST_STEP);

                let (port_a, port_b) = target.ports();
                target.set_ports(port_a.wrapping_add(1), port_b.rotate_left(1));
            }
        })
        .map_err(|e| format!("unable to start host thread: {}", e))?;

    Ok(())
}

fn run() -> Result<(), String> {
    let surface = Arc::new(Surface::new_surface());
    let (producer, consumer) = queue::channel();

    let (bus, target) = SimulatedBus::new_bus(*VIASNOOP_CLOCK_HZ);
    info!("simulated target clocked at {} Hz", *VIASNOOP_CLOCK_HZ);

    // The sampler gets a thread of its own and holds it until power-off. It
    // sits in its synchronisation wait until the target leaves reset.
    let sampler = Sampler::new_sampler(bus, producer);
    thread::Builder::new()
        .name("bus-sampler".to_string())
        .spawn(move || sampler.run())
        .map_err(|e| format!("unable to start bus sampler: {}", e))?;

    let mut renderer = Renderer::new_renderer(consumer, surface.clone());
    renderer.draw_layout();

    target.release_reset();
    info!("target released from reset");

    if *VIASNOOP_ANIMATE {
        spawn_host(target.clone())?;
    }

    scanout::run(&mut renderer, &surface)
}

fn main() {
    env_logger::init();
    halt_on_panic();

    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::queue::{channel, Observation};

    #[test]
    fn test_overflow_halts_device() {
        static HALTS: AtomicUsize = AtomicUsize::new(0);

        let reported = Arc::new(Mutex::new(Vec::new()));
        let record = reported.clone();

        panic::set_hook(halting_hook(
            Box::new(move |info| record.lock().unwrap().push(info.to_string())),
            || { HALTS.fetch_add(1, Ordering::SeqCst); },
        ));

        let overflowed = thread::Builder::new()
            .name("bus-sampler".to_string())
            .spawn(|| {
                let (mut tx, _rx) = channel::<4>();
                for i in 0 ..= 4 {
                    tx.push(Observation::new(1, i));
                }
            })
            .unwrap()
            .join();

        // Back to the standard hook before asserting.
        let _ = panic::take_hook();

        assert!(overflowed.is_err());
        assert!(HALTS.load(Ordering::SeqCst) >= 1);

        // Other tests may panic while the hook is installed, so look for ours.
        let reported = reported.lock().unwrap();
        assert!(reported.iter().any(|msg| msg.contains("observation queue full, overflowed at register 1 = 04")));
    }
}
