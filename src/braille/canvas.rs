/// Braille Unicode canvas for terminal graphics.
/// Each character cell holds a 2x4 dot grid (U+2800..U+28FF).
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    cells: Vec<u8>, // Dot bits, row-major
}

/// Dot bit for (x % 2, y % 4):
/// ```text
/// (0,0) (1,0)   0x01 0x08
/// (0,1) (1,1)   0x02 0x10
/// (0,2) (1,2)   0x04 0x20
/// (0,3) (1,3)   0x40 0x80
/// ```
const DOT_BITS: [[u8; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];

impl BrailleCanvas {
    /// Canvas of `width` x `height` characters, i.e. `width*2` x `height*4` dots.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }

    /// Set a dot; out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        let (cx, cy) = (x / 2, y / 4);
        if cx >= self.width || cy >= self.height {
            return;
        }
        self.cells[cy * self.width + cx] |= DOT_BITS[x % 2][y % 4];
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|&b| b == 0)
    }

    /// Non-empty cells as `(column, row, glyph)`.
    pub fn glyphs(&self) -> impl Iterator<Item = (u16, u16, char)> + '_ {
        self.cells.iter().enumerate().filter_map(move |(idx, &bits)| {
            if bits == 0 {
                return None;
            }
            let col = (idx % self.width) as u16;
            let row = (idx / self.width) as u16;
            Some((col, row, glyph(bits)))
        })
    }

    #[cfg(test)]
    pub fn to_string(&self) -> String {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(|&b| glyph(b)).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn glyph(bits: u8) -> char {
    char::from_u32(0x2800 + bits as u32).unwrap_or(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pixel() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(0, 0);
        assert_eq!(canvas.to_string(), "⠁");
    }

    #[test]
    fn test_full_cell() {
        let mut canvas = BrailleCanvas::new(1, 1);
        for x in 0..2 {
            for y in 0..4 {
                canvas.set_pixel(x, y);
            }
        }
        assert_eq!(canvas.to_string(), "⣿");
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut canvas = BrailleCanvas::new(2, 1);
        canvas.set_pixel(-1, 0);
        canvas.set_pixel(4, 0);
        canvas.set_pixel(0, 4);
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_glyph_positions() {
        let mut canvas = BrailleCanvas::new(3, 2);
        canvas.set_pixel(5, 7);
        let glyphs: Vec<_> = canvas.glyphs().collect();
        assert_eq!(glyphs, vec![(2, 1, '⢀')]);
        assert_eq!(canvas.pixel_width(), 6);
        assert_eq!(canvas.pixel_height(), 8);
    }
}
