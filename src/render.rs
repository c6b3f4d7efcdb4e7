use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use std::io::{self, Write};

use crate::texture::{Rgb, Texture};
use crate::vec2::Vec2;

// Subpixel alphas at or above this count as silhouette ink.
pub(crate) const SILHOUETTE_ALPHA: u8 = 128;
// Below the silhouette but above this, the accumulated field feeds the
// glow tint.
pub(crate) const GLOW_ALPHA: u8 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            c.ch = ' ';
            c.fg = Color::White;
            c.bg = bg;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

// Off-screen accumulation target at braille resolution (2x4 per cell).
// Additive blending saturates per channel, which is what makes
// overlapping blobs fuse.
pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self) {
        self.px.fill(Pixel::default());
    }

    pub(crate) fn blend_add(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8, a: u8) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let p = &mut self.px[i];
        let am = a as u32;
        p.r = p.r.saturating_add(((r as u32 * am) / 255) as u8);
        p.g = p.g.saturating_add(((g as u32 * am) / 255) as u8);
        p.b = p.b.saturating_add(((b as u32 * am) / 255) as u8);
        p.a = p.a.saturating_add(a);
    }
}

// Additively blits one blob texture centered on a world position,
// sampling nearest texels through the world-to-canvas scale.
pub(crate) fn draw_blob(canvas: &mut PixelCanvas, tex: &Texture, center: Vec2, sx: f32, sy: f32) {
    let r = tex.radius as f32;
    let x0 = ((center.x - r) * sx).floor() as i32;
    let x1 = ((center.x + r) * sx).ceil() as i32;
    let y0 = ((center.y - r) * sy).floor() as i32;
    let y1 = ((center.y + r) * sy).ceil() as i32;

    for cy in y0..y1 {
        if cy < 0 || cy as u32 >= canvas.h {
            continue;
        }
        for cx in x0..x1 {
            if cx < 0 || cx as u32 >= canvas.w {
                continue;
            }
            let wx = (cx as f32 + 0.5) / sx;
            let wy = (cy as f32 + 0.5) / sy;
            let tx = wx - (center.x - r);
            let ty = wy - (center.y - r);
            if tx < 0.0 || ty < 0.0 {
                continue;
            }
            let (tx, ty) = (tx as u32, ty as u32);
            if tx >= tex.size || ty >= tex.size {
                continue;
            }
            let t = tex.texel(tx, ty);
            if t.a == 0 {
                continue;
            }
            canvas.blend_add(cx, cy, t.r, t.g, t.b, t.a);
        }
    }
}

pub(crate) fn draw_circle_outline(
    canvas: &mut PixelCanvas,
    center: Vec2,
    radius: f32,
    sx: f32,
    sy: f32,
    color: Rgb,
) {
    let steps = ((radius * sx.max(sy)) * std::f32::consts::TAU).ceil().max(16.0) as u32;
    for k in 0..steps {
        let a = k as f32 / steps as f32 * std::f32::consts::TAU;
        let x = ((center.x + a.cos() * radius) * sx).round() as i32;
        let y = ((center.y + a.sin() * radius) * sy).round() as i32;
        canvas.blend_add(x, y, color.r, color.g, color.b, 255);
    }
}

fn braille_bit(dx: u32, dy: u32) -> u8 {
    // Dot mapping:
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

// Alpha-threshold composite: subpixels past SILHOUETTE_ALPHA become
// braille ink colored by their accumulated field; the sub-threshold
// remainder tints the cell background toward the preset glow.
pub(crate) fn composite(
    canvas: &PixelCanvas,
    out: &mut CellBuffer,
    glow: Rgb,
    glow_factor: f32,
    enable_color: bool,
    bg: Rgb,
) {
    let cols = out.w as u32;
    let rows = out.h as u32;

    for cy in 0..rows {
        for cx in 0..cols {
            let px0 = cx * 2;
            let py0 = cy * 4;

            let mut mask: u8 = 0;
            let mut sum_r: u32 = 0;
            let mut sum_g: u32 = 0;
            let mut sum_b: u32 = 0;
            let mut ink_count: u32 = 0;
            let mut glow_sum: u32 = 0;

            for dy in 0..4 {
                for dx in 0..2 {
                    let x = px0 + dx;
                    let y = py0 + dy;
                    if x >= canvas.w || y >= canvas.h {
                        continue;
                    }
                    let p = canvas.px[canvas.idx(x, y)];
                    if p.a >= SILHOUETTE_ALPHA {
                        mask |= braille_bit(dx, dy);
                        sum_r += p.r as u32;
                        sum_g += p.g as u32;
                        sum_b += p.b as u32;
                        ink_count += 1;
                    } else if p.a >= GLOW_ALPHA {
                        glow_sum += p.a as u32;
                    }
                }
            }

            let ch = char::from_u32(0x2800 + (mask as u32)).unwrap_or(' ');

            let cell_bg = if enable_color && glow_sum > 0 {
                let t = (glow_sum as f32 / (8.0 * 255.0)) * glow_factor;
                Rgb::lerp(bg, glow, t).to_color()
            } else {
                bg.to_color()
            };

            let fg = if enable_color && ink_count > 0 {
                Color::Rgb {
                    r: (sum_r / ink_count) as u8,
                    g: (sum_g / ink_count) as u8,
                    b: (sum_b / ink_count) as u8,
                }
            } else {
                Color::White
            };

            out.set(
                cx as u16,
                cy as u16,
                Cell {
                    ch: if mask == 0 { ' ' } else { ch },
                    fg,
                    bg: cell_bg,
                },
            );
        }
    }
}

pub(crate) fn draw_text(out: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x as usize + i;
        if xx >= out.w as usize {
            break;
        }
        out.set(xx as u16, y, Cell { ch, fg, bg });
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let prev = CellBuffer::new(cols, rows);
        let cur = CellBuffer::new(cols, rows);
        let canvas = PixelCanvas::new(cols as u32 * 2, rows as u32 * 4);

        Ok(Self {
            out,
            cols,
            rows,
            prev,
            cur,
            canvas,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.canvas = PixelCanvas::new(c as u32 * 2, r as u32 * 4);
        Ok(true)
    }

    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{ColorMap, Falloff, Texture};

    #[test]
    fn additive_blending_saturates() {
        let mut c = PixelCanvas::new(1, 1);
        c.blend_add(0, 0, 200, 200, 200, 200);
        c.blend_add(0, 0, 200, 200, 200, 200);
        let p = c.px[0];
        assert_eq!(p.a, 255);
        assert!(p.r > 200);
    }

    #[test]
    fn full_block_composites_to_solid_braille() {
        let mut canvas = PixelCanvas::new(2, 4);
        for y in 0..4 {
            for x in 0..2 {
                canvas.blend_add(x, y, 255, 255, 255, 255);
            }
        }
        let mut out = CellBuffer::new(1, 1);
        composite(
            &canvas,
            &mut out,
            Rgb { r: 0, g: 0, b: 0 },
            0.0,
            true,
            Rgb { r: 0, g: 0, b: 0 },
        );
        assert_eq!(out.cells[0].ch, '\u{28FF}');
    }

    #[test]
    fn faint_field_tints_the_background_glow() {
        let mut canvas = PixelCanvas::new(2, 4);
        for y in 0..4 {
            for x in 0..2 {
                canvas.blend_add(x, y, 255, 0, 0, 100);
            }
        }
        let mut out = CellBuffer::new(1, 1);
        let bg = Rgb { r: 0, g: 0, b: 0 };
        composite(&canvas, &mut out, Rgb { r: 139, g: 0, b: 0 }, 0.8, true, bg);
        // below the silhouette threshold: no ink, but a warmed background
        assert_eq!(out.cells[0].ch, ' ');
        assert_ne!(out.cells[0].bg, bg.to_color());
    }

    #[test]
    fn blob_blit_lands_ink_at_the_projected_center() {
        let tex = Texture::generate(
            10,
            &Falloff::Cubic {
                max_distance: 1.0,
                scaling: 1.0,
            },
            &Falloff::Flat(0.0),
            &ColorMap::Solid(Rgb {
                r: 255,
                g: 255,
                b: 255,
            }),
        );
        let mut canvas = PixelCanvas::new(64, 64);
        draw_blob(&mut canvas, &tex, Vec2::new(32.0, 32.0), 1.0, 1.0);
        let i = canvas.idx(32, 32);
        assert!(canvas.px[i].a >= SILHOUETTE_ALPHA);
        // far corner stays untouched
        assert_eq!(canvas.px[canvas.idx(0, 0)].a, 0);
    }
}
