use std::thread;
use std::time::{Duration, Instant};

use crate::registers::RegisterFile;
use crate::renderer::Renderer;
use crate::surface::Surface;

pub const VGA_FPS: f64 = 60.0;
const FRAME_DURATION: Duration = Duration::from_millis(((1.0 / VGA_FPS) * 1000.0) as u64);

// How often the queue is emptied while waiting for the next frame.
const DRAIN_INTERVAL: Duration = Duration::from_millis(1);

// Sleeps out the rest of the frame that began at `frame_start`, draining the
// queue as it goes. The sampler only has to be buffered across the frame's
// own work, not across the whole frame.
fn finish_frame(renderer: &mut Renderer, frame_start: Instant) {
    while let Some(remaining) = FRAME_DURATION.checked_sub(frame_start.elapsed()) {
        renderer.drain();
        thread::sleep(remaining.min(DRAIN_INTERVAL));
    }
}

// Presents the surface in an SDL window, one renderer update per frame, until
// the window is closed.
#[cfg(feature = "sdl")]
pub fn run(renderer: &mut Renderer, surface: &Surface) -> Result<(), String> {
    use sdl2::event::Event;
    use sdl2::keyboard::Keycode;
    use sdl2::pixels::PixelFormatEnum;

    use crate::surface::{Colour, BYTES_PER_ROW, HEIGHT, WIDTH};

    let palette = (0 .. 8).map(|bits| Colour::from_bits(bits).rgb()).collect::<Vec<_>>();

    let sdl_context = sdl2::init()?;
    let video_subsystem = sdl_context.video()?;

    let window = video_subsystem.window("viasnoop", WIDTH as u32, HEIGHT as u32)
        .position_centered()
        .build()
        .map_err(|e| e.to_string())?;

    let mut canvas = window.into_canvas()
        .target_texture()
        .build()
        .map_err(|e| e.to_string())?;

    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator.create_texture_streaming(PixelFormatEnum::RGB24, WIDTH as u32, HEIGHT as u32)
        .map_err(|e| e.to_string())?;

    let mut event_pump = sdl_context.event_pump()?;

    info!("scanning out {}x{} to an SDL window", WIDTH, HEIGHT);

    'running: loop {
        let frame_start = Instant::now();

        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => { break 'running },
                Event::KeyDown { keycode: Some(Keycode::Escape), .. } => { break 'running },
                _ => { },
            }
        }

        renderer.update();

        texture.with_lock(None, |buffer: &mut [u8], pitch: usize| {
            for (i, pair) in surface.bytes().enumerate() {
                let y = i / BYTES_PER_ROW;
                let x = (i % BYTES_PER_ROW) * 2;
                let offset = (y * pitch) + (x * 3);

                let (r, g, b) = palette[(pair & 0b111) as usize];
                buffer[offset]   = r;
                buffer[offset+1] = g;
                buffer[offset+2] = b;

                let (r, g, b) = palette[((pair >> 3) & 0b111) as usize];
                buffer[offset+3] = r;
                buffer[offset+4] = g;
                buffer[offset+5] = b;
            }
        })?;

        canvas.clear();
        canvas.copy(&texture, None, None)?;
        canvas.present();

        finish_frame(renderer, frame_start);
    }

    info!("window closed after {} observations, last registers {}", renderer.drained(), dump(renderer.registers()));
    Ok(())
}

// Without a window the surface still gets drawn, and the register file is
// logged about once a second instead.
#[cfg(not(feature = "sdl"))]
pub fn run(renderer: &mut Renderer, _surface: &Surface) -> Result<(), String> {
    info!("no display, logging registers");

    let mut frames = 0u64;

    loop {
        let frame_start = Instant::now();

        renderer.update();
        frames += 1;

        if frames % (VGA_FPS as u64) == 0 {
            info!("{} ({} observations, {} queued)", dump(renderer.registers()), renderer.drained(), renderer.pending());
        }

        finish_frame(renderer, frame_start);
    }
}

// The register file by name, timers as 16-bit values.
pub fn dump(registers: &RegisterFile) -> String {
    format!("PB={:02X} PA={:02X} DDRB={:02X} DDRA={:02X} T1={:04X} T1L={:04X} T2={:04X} \
             SR={:02X} ACR={:02X} PCR={:02X} IFR={:02X} IER={:02X} PA*={:02X}",
        registers.port_b(),
        registers.port_a(),
        registers.ddr_b(),
        registers.ddr_a(),
        registers.timer1(),
        registers.timer1_latch(),
        registers.timer2(),
        registers.shift_register(),
        registers.acr(),
        registers.pcr(),
        registers.ifr(),
        registers.ier(),
        registers.port_a_no_handshake())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::bus::SimulatedBus;
    use crate::config::MAX_CLOCK_HZ;
    use crate::queue::{channel, Observation};
    use crate::sampler::Sampler;

    #[test]
    fn test_dump() {
        let (mut tx, rx) = channel();
        let mut renderer = Renderer::new_renderer(rx, Arc::new(Surface::new_surface()));

        for (reg, val) in [(0, 0x55), (1, 0xaa), (4, 0x34), (5, 0x12), (9, 0x80), (14, 0xc0), (15, 0x01)].iter() {
            tx.push(Observation::new(*reg, *val));
        }
        renderer.update();

        assert_eq!(dump(renderer.registers()),
            "PB=55 PA=AA DDRB=00 DDRA=00 T1=1234 T1L=0000 T2=8000 SR=00 ACR=00 PCR=00 IFR=00 IER=C0 PA*=01");
    }

    #[test]
    fn test_frame_duration() {
        assert_eq!(FRAME_DURATION, Duration::from_millis(16));
        assert!(DRAIN_INTERVAL < FRAME_DURATION);
    }

    #[test]
    fn test_fastest_clock_keeps_up() {
        // About a quarter of a second of bus traffic.
        let transactions = MAX_CLOCK_HZ / 4;

        let (bus, target) = SimulatedBus::new_bus(MAX_CLOCK_HZ);
        let (tx, rx) = channel();
        let mut renderer = Renderer::new_renderer(rx, Arc::new(Surface::new_surface()));

        target.release_reset();

        let sampler = thread::spawn(move || {
            let mut sampler = Sampler::new_sampler(bus, tx);
            sampler.synchronise();
            for _ in 0 .. transactions {
                sampler.transaction();
            }
        });

        // The same frame cadence as the display loop.
        while !sampler.is_finished() {
            let frame_start = Instant::now();
            renderer.update();
            finish_frame(&mut renderer, frame_start);
        }

        assert!(sampler.join().is_ok(), "sampler overflowed the queue");

        renderer.update();
        assert_eq!(renderer.drained(), transactions);
        assert_eq!(renderer.registers().port_b(), 0x55);
        assert_eq!(renderer.registers().port_a(), 0xaa);
    }
}
