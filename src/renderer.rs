use std::sync::Arc;

use crate::config::VIASNOOP_TRACE;
use crate::queue::Consumer;
use crate::registers::{RegisterFile, ViaRegister, ALL_IRQ_FLAGS, ALL_REGISTERS, REGISTER_COUNT};
use crate::surface::font::glyph_code;
use crate::surface::{Colour, Surface, CELL_SIZE, HEIGHT, WIDTH};

// Where VIA #1 sits in the VIC-20's I/O block.
pub const BASE_ADDRESS: u16 = 0x9110;

pub const HEX_DIGITS: [u8; 16] = *b"0123456789ABCDEF";

// Character grid layout
const TITLE_COLUMN: usize = 20;
const TITLE_ROW: usize = 18;
const FIRST_REGISTER_ROW: usize = 20;
const ADDRESS_COLUMN: usize = 13;
const PREFIX_COLUMN: usize = 20;
const VALUE_COLUMN: usize = 22;
const NAME_COLUMN: usize = 25;
const IRQ_ROW: usize = FIRST_REGISTER_ROW + REGISTER_COUNT + 1;
const IER_ROW: usize = IRQ_ROW + 1;
const TIMER_ROW: usize = IRQ_ROW + 2;

// 16-bit timer views: label, label column, value column
const TIMER_FIELDS: [(&str, usize, usize); 3] = [
    ("T1", 20, 23),
    ("LATCH", 28, 34),
    ("T2", 39, 42),
];

// Glyph codes for a byte, high nibble first.
pub fn hex_glyphs(val: u8) -> [u8; 2] {
    [
        glyph_code(HEX_DIGITS[(val >> 4) as usize] as char),
        glyph_code(HEX_DIGITS[(val & 0x0f) as usize] as char),
    ]
}

// Inverse of `hex_glyphs`.
pub fn hex_value(glyphs: [u8; 2]) -> Option<u8> {
    let nibble = |code: u8| {
        HEX_DIGITS.iter()
            .position(|&digit| glyph_code(digit as char) == code)
            .map(|n| n as u8)
    };

    Some((nibble(glyphs[0])? << 4) | nibble(glyphs[1])?)
}

// Drains observations into the shadow register file and keeps the on-screen
// listing in step with it.
pub struct Renderer {
    queue: Consumer,
    registers: RegisterFile,
    surface: Arc<Surface>,

    drained: u64,
}

impl Renderer {
    pub fn new_renderer(queue: Consumer, surface: Arc<Surface>) -> Self {
        Self {
            queue: queue,
            registers: RegisterFile::new_register_file(),
            surface: surface,

            drained: 0,
        }
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn drained(&self) -> u64 {
        self.drained
    }

    // Everything that never changes: border, title, and per register the bus
    // address, the "0x" prefix and the name.
    pub fn draw_layout(&self) {
        let surface = &self.surface;

        surface.clear(Colour::Green);
        surface.fill_rect(1, 1, WIDTH - 2, HEIGHT - 2, Colour::Black);

        surface.draw_string(TITLE_COLUMN, TITLE_ROW, "VIA 6522", Colour::Cyan);

        for reg in ALL_REGISTERS.iter() {
            let row = FIRST_REGISTER_ROW + reg.index() as usize;
            let address = format!("0x{:04X}", BASE_ADDRESS + reg.index() as u16);

            surface.draw_string(ADDRESS_COLUMN, row, &address, Colour::Blue);
            surface.draw_string(PREFIX_COLUMN, row, "0x", Colour::Yellow);
            surface.draw_string(NAME_COLUMN, row, reg.label(), Colour::Cyan);
        }

        surface.draw_string(ADDRESS_COLUMN, IRQ_ROW, "IFR", Colour::Blue);
        surface.draw_string(ADDRESS_COLUMN, IER_ROW, "IER", Colour::Blue);
        surface.draw_string(ADDRESS_COLUMN, TIMER_ROW, "TMR", Colour::Blue);

        for &(label, column, _) in TIMER_FIELDS.iter() {
            surface.draw_string(column, TIMER_ROW, label, Colour::Cyan);
        }
    }

    // Applies pending observations in the order they were taken off the bus.
    // Takes at most a queue's worth, so a busy bus can't hold off a redraw.
    pub fn drain(&mut self) -> usize {
        let budget = self.queue.capacity();
        let mut n = 0;

        while n < budget {
            let observation = match self.queue.try_pop() {
                Some(observation) => observation,
                None => break,
            };

            if *VIASNOOP_TRACE {
                trace!("{:?} <- 0x{:02X}", ViaRegister::from_index(observation.register), observation.value);
            }

            self.registers.apply(observation);
            n += 1;
        }

        self.drained += n as u64;
        n
    }

    // Backlog left in the queue after the last drain.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn draw_hex(&self, column: usize, row: usize, val: u8) {
        let [hi, lo] = hex_glyphs(val);

        self.surface.draw_glyph(column * CELL_SIZE, row * CELL_SIZE, hi, Colour::Yellow);
        self.surface.draw_glyph((column + 1) * CELL_SIZE, row * CELL_SIZE, lo, Colour::Yellow);
    }

    // Interrupt bit names, green where the bit is set.
    fn draw_flags(&self, row: usize, bits: u8) {
        let mut column = PREFIX_COLUMN;

        for flag in ALL_IRQ_FLAGS.iter() {
            let colour = if flag.is_set(bits) { Colour::Green } else { Colour::Blue };

            self.surface.draw_string(column, row, flag.mnemonic(), colour);
            column += flag.mnemonic().len() + 1;
        }
    }

    // Redraws every value, which is cheaper than tracking what changed.
    pub fn refresh(&self) {
        for (reg, &val) in ALL_REGISTERS.iter().zip(self.registers.as_bytes().iter()) {
            self.draw_hex(VALUE_COLUMN, FIRST_REGISTER_ROW + reg.index() as usize, val);
        }

        self.draw_flags(IRQ_ROW, self.registers.ifr());
        self.draw_flags(IER_ROW, self.registers.ier());

        let timers = [
            self.registers.timer1(),
            self.registers.timer1_latch(),
            self.registers.timer2(),
        ];
        for (&(_, _, column), &val) in TIMER_FIELDS.iter().zip(timers.iter()) {
            self.draw_hex(column, TIMER_ROW, (val >> 8) as u8);
            self.draw_hex(column + 2, TIMER_ROW, val as u8);
        }
    }

    pub fn update(&mut self) -> usize {
        let n = self.drain();
        self.refresh();
        n
    }
}
