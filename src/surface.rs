pub mod font;

use std::sync::atomic::{AtomicU8, Ordering};

use crate::surface::font::{glyph_code, GLYPHS, GLYPH_COUNT, UNKNOWN_GLYPH};

pub const WIDTH: usize = 640;
pub const HEIGHT: usize = 480;
pub const BYTES_PER_ROW: usize = WIDTH / 2;

pub const CELL_SIZE: usize = 8;
pub const COLUMNS: usize = WIDTH / CELL_SIZE;
pub const ROWS: usize = HEIGHT / CELL_SIZE;

// 3-bit colour, one bit per gun.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Colour {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Colour {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Colour::Black,
            1 => Colour::Red,
            2 => Colour::Green,
            3 => Colour::Yellow,
            4 => Colour::Blue,
            5 => Colour::Magenta,
            6 => Colour::Cyan,
            7 => Colour::White,
            _ => unreachable!(),
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        let bits = self.bits();
        let gun = |mask: u8| if (bits & mask) != 0 { 0xff } else { 0x00 };

        (gun(0b001), gun(0b010), gun(0b100))
    }
}

// The framebuffer the scan-out streams from. Two pixels per byte: the even
// pixel in bits 0-2, the odd pixel in bits 3-5.
//
// Scan-out reads while the renderer writes and nothing orders the two. Bytes
// are atomics so that is merely a torn frame, which the next frame repairs.
pub struct Surface {
    pixels: Box<[AtomicU8]>,
}

impl Surface {
    pub fn new_surface() -> Self {
        let pixels = (0 .. BYTES_PER_ROW * HEIGHT)
            .map(|_| AtomicU8::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            pixels: pixels,
        }
    }

    fn offset(x: usize, y: usize) -> usize {
        (y * BYTES_PER_ROW) + (x >> 1)
    }

    fn load(&self, offset: usize) -> u8 {
        self.pixels[offset].load(Ordering::Relaxed)
    }

    fn store(&self, offset: usize, val: u8) {
        self.pixels[offset].store(val, Ordering::Relaxed);
    }

    // Only the renderer writes, so a plain load/store read-modify-write is
    // enough to keep the neighbouring pixel intact.
    fn plot(&self, x: usize, y: usize, colour: Colour) {
        let offset = Self::offset(x, y);
        let byte = self.load(offset);

        let byte = if (x & 1) == 0 {
            (byte & 0b1111_1000) | colour.bits()
        } else {
            (byte & 0b1100_0111) | (colour.bits() << 3)
        };

        self.store(offset, byte);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Colour {
        let byte = self.load(Self::offset(x, y));

        if (x & 1) == 0 {
            Colour::from_bits(byte)
        } else {
            Colour::from_bits(byte >> 3)
        }
    }

    // Packed bytes in scan-out order.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.pixels.iter().map(|b| b.load(Ordering::Relaxed))
    }

    pub fn clear(&self, colour: Colour) {
        self.fill_rect(0, 0, WIDTH, HEIGHT, colour);
    }

    // Anything falling off the right or bottom edge is silently dropped.
    pub fn fill_rect(&self, x: usize, y: usize, width: usize, height: usize, colour: Colour) {
        if x >= WIDTH || y >= HEIGHT {
            return;
        }

        let mut width = width.min(WIDTH - x);
        let height = height.min(HEIGHT - y);

        if width == 0 || height == 0 {
            return;
        }

        let mut x = x;

        // Leading odd pixel shares its byte with a pixel outside the rect.
        if (x & 1) == 1 {
            for row in y .. y + height {
                self.plot(x, row, colour);
            }
            x += 1;
            width -= 1;
        }

        let pair = (colour.bits() << 3) | colour.bits();
        while width > 1 {
            let mut offset = Self::offset(x, y);
            for _ in 0 .. height {
                self.store(offset, pair);
                offset += BYTES_PER_ROW;
            }
            x += 2;
            width -= 2;
        }

        if width == 1 {
            for row in y .. y + height {
                self.plot(x, row, colour);
            }
        }
    }

    // Blits one 8x8 cell: set pixels in `colour`, clear pixels black. Clipped
    // like `fill_rect`.
    pub fn draw_glyph(&self, x: usize, y: usize, code: u8, colour: Colour) {
        if x >= WIDTH || y >= HEIGHT {
            return;
        }

        let code = if (code as usize) < GLYPH_COUNT { code } else { UNKNOWN_GLYPH };
        let glyph = &GLYPHS[code as usize];

        // From here on x and y are on the surface, so offsets of up to a cell
        // can't overflow.
        let aligned = (x & 1) == 0 && x + CELL_SIZE <= WIDTH;

        for (line, &bits) in glyph.iter().enumerate() {
            let row = y + line;
            if row >= HEIGHT {
                break;
            }

            if aligned {
                // Whole pixel pairs, leftmost pair first.
                let mut offset = Self::offset(x, row);
                let mut bits = bits;
                for _ in 0 .. CELL_SIZE / 2 {
                    let mut pair = 0;
                    if (bits & 0x80) != 0 {
                        pair |= colour.bits();
                    }
                    if (bits & 0x40) != 0 {
                        pair |= colour.bits() << 3;
                    }

                    self.store(offset, pair);
                    offset += 1;
                    bits <<= 2;
                }
            } else {
                for col in 0 .. CELL_SIZE {
                    if x + col >= WIDTH {
                        break;
                    }

                    let set = (bits & (0x80 >> col)) != 0;
                    self.plot(x + col, row, if set { colour } else { Colour::Black });
                }
            }
        }
    }

    // Draws text on the character grid. Wraps to column 1 of the next row at
    // the last column, and stops at the last row.
    pub fn draw_string(&self, column: usize, row: usize, text: &str, colour: Colour) {
        let mut column = column;
        let mut row = row;

        for ch in text.chars() {
            if column >= COLUMNS - 1 {
                column = 1;
                row += 1;
            }

            if row >= ROWS - 1 {
                return;
            }

            self.draw_glyph(column * CELL_SIZE, row * CELL_SIZE, glyph_code(ch), colour);
            column += 1;
        }
    }
}
