use crate::render::{frame_begin, frame_end, Frame, Renderer};
use std::io::Write;

/// 2x4 pixels per cell via braille dots: bright pixels become dots drawn in
/// their average color, the rest become the cell background.
pub struct BrailleRenderer {
    last_fg: Option<(u8, u8, u8)>,
    last_bg: Option<(u8, u8, u8)>,
}

impl BrailleRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }
}

impl Default for BrailleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn luma_u16(r: u8, g: u8, b: u8) -> u16 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u16
}

impl Renderer for BrailleRenderer {
    fn name(&self) -> &'static str {
        "braille"
    }

    fn cell_geometry(&self) -> (usize, usize) {
        (2, 4)
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((cols, visual_rows, w)) = frame_begin(frame, 2, 4, out)? else {
            return Ok(());
        };

        self.last_fg = None;
        self.last_bg = None;

        // Dot bit layout of U+2800..U+28FF, row-major within the cell.
        const DOT_BITS: [u8; 8] = [0x01, 0x08, 0x02, 0x10, 0x04, 0x20, 0x40, 0x80];

        for row in 0..visual_rows {
            let base_y = row * 4;
            for col in 0..cols {
                let base_x = col * 2;

                let mut lum = [0u16; 8];
                let mut rgb = [(0u8, 0u8, 0u8); 8];
                for dy in 0..4usize {
                    for dx in 0..2usize {
                        let i = dy * 2 + dx;
                        let idx = ((base_y + dy) * w + base_x + dx) * 4;
                        let r = frame.pixels_rgba[idx];
                        let g = frame.pixels_rgba[idx + 1];
                        let b = frame.pixels_rgba[idx + 2];
                        rgb[i] = (r, g, b);
                        lum[i] = luma_u16(r, g, b);
                    }
                }

                // Per-cell threshold: midpoint of the local luma range.
                let min_l = *lum.iter().min().unwrap();
                let max_l = *lum.iter().max().unwrap();
                let thr = (min_l + max_l) / 2;

                let mut bits = 0u8;
                let mut fg_acc = (0u32, 0u32, 0u32, 0u32);
                let mut bg_acc = (0u32, 0u32, 0u32, 0u32);
                for i in 0..8usize {
                    let (r, g, b) = rgb[i];
                    if max_l > 8 && lum[i] > thr {
                        bits |= DOT_BITS[i];
                        fg_acc = (
                            fg_acc.0 + r as u32,
                            fg_acc.1 + g as u32,
                            fg_acc.2 + b as u32,
                            fg_acc.3 + 1,
                        );
                    } else {
                        bg_acc = (
                            bg_acc.0 + r as u32,
                            bg_acc.1 + g as u32,
                            bg_acc.2 + b as u32,
                            bg_acc.3 + 1,
                        );
                    }
                }

                let avg = |acc: (u32, u32, u32, u32)| {
                    let n = acc.3.max(1);
                    ((acc.0 / n) as u8, (acc.1 / n) as u8, (acc.2 / n) as u8)
                };
                let fg = if fg_acc.3 > 0 { avg(fg_acc) } else { (0, 0, 0) };
                let bg = avg(bg_acc);

                if self.last_fg != Some(fg) {
                    write!(out, "\x1b[38;2;{};{};{}m", fg.0, fg.1, fg.2)?;
                    self.last_fg = Some(fg);
                }
                if self.last_bg != Some(bg) {
                    write!(out, "\x1b[48;2;{};{};{}m", bg.0, bg.1, bg.2)?;
                    self.last_bg = Some(bg);
                }

                let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
                write!(out, "{ch}")?;
            }
            out.write_all(b"\r\n")?;
        }

        frame_end(frame, cols, visual_rows, out)
    }
}
