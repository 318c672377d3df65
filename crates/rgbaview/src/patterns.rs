//! Synthetic BGRA frame producers.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Solid,
    Gradient,
    Checker,
}

const CHECKER_CELL: u32 = 16;

/// Renders frames into one reusable, row-padded buffer.
pub struct FrameProducer {
    pattern: Pattern,
    width: u32,
    height: u32,
    padding: u32,
    buffer: Vec<u8>,
}

impl FrameProducer {
    pub fn new(pattern: Pattern, width: u32, height: u32, padding: u32) -> Self {
        let mut producer = Self {
            pattern,
            width,
            height,
            padding,
            buffer: Vec::new(),
        };
        producer.resize(width, height);
        producer
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        let len = self.stride() as usize * self.height as usize;
        self.buffer.resize(len, 0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.width * 4 + self.padding
    }

    /// Draws frame number `index` and returns the whole padded buffer.
    pub fn render(&mut self, index: u64) -> &[u8] {
        let stride = self.stride() as usize;
        let (width, height) = (self.width, self.height);
        let phase = (index % 256) as u8;
        for (y, row) in self.buffer.chunks_exact_mut(stride).enumerate() {
            let y = y as u32;
            for (x, pixel) in row[..width as usize * 4].chunks_exact_mut(4).enumerate() {
                let x = x as u32;
                let [r, g, b] = match self.pattern {
                    Pattern::Solid => [phase, 0x80, 0xFF - phase],
                    Pattern::Gradient => [
                        (x * 255 / width.max(1)) as u8,
                        (y * 255 / height.max(1)) as u8,
                        phase,
                    ],
                    Pattern::Checker => {
                        let offset = (index / 4) as u32;
                        let on = ((x + offset) / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0;
                        if on {
                            [0xFF, 0xFF, 0xFF]
                        } else {
                            [0x20, 0x20, 0x20]
                        }
                    }
                };
                pixel.copy_from_slice(&[b, g, r, 0xFF]);
            }
        }
        &self.buffer
    }
}
