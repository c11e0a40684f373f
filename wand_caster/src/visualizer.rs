//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌───────────────────────────────────────────────┬────────────┐
//! │ spell name · mode · stage        [progress]   │  SPELLS    │
//! │                                               │  > Lumos   │
//! │        guide path, checkpoints, ghost         │    Accio   │
//! │        trail, cursor, particles               │    ...     │
//! │                                               │            │
//! ├───────────────────────────────────────────────┴────────────┤
//! │ status line                                                │
//! │ key legend                                                 │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The play area is the normalized cursor space: `(0,0)` top-left,
//! `(1,1)` bottom-right.  Particles live in world space and are projected
//! through a pinhole camera on the `+z` axis so that the `z = 0` plane fills
//! the play area exactly.

use std::sync::mpsc::Sender;
use std::time::Duration;

use glam::{Vec2, Vec3};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use spell_matcher::WORLD_HALF_EXTENT;
use spell_tutor::SpellStatus;

use crate::app::{FrameView, GuideView, Mode};
use crate::config::WindowSection;
use crate::perception::{SimInput, SimKey};
use crate::AppError;

// ════════════════════════════════════════════════════════════════════════════
// Layout / palette
// ════════════════════════════════════════════════════════════════════════════

const PANEL_W:   usize = 200;
const STATUS_H:  usize = 44;
/// Camera distance from the `z = 0` plane.
const CAM_Z:     f32   = 10.0;
const NEAR:      f32   = 0.5;

const BG:        u32 = 0xFF101322;
const PANEL_BG:  u32 = 0xFF181C33;
const STATUS_BG: u32 = 0xFF0C2A4A;
const TEXT:      u32 = 0xFFE8E8F0;
const DIM_TEXT:  u32 = 0xFF7C8098;
const CURSOR:    u32 = 0xFFFFFFFF;
const GHOST:     u32 = 0xFFB0C4FF;

fn status_color(s: SpellStatus) -> u32 {
    match s {
        SpellStatus::Locked   => 0xFF5A5A6E,
        SpellStatus::Learning => 0xFFFFD36E,
        SpellStatus::Learned  => 0xFF7CFFA0,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Projection
// ════════════════════════════════════════════════════════════════════════════

/// Project a world point into play-area pixels.  Returns `(x, y, scale)`,
/// where `scale` is 1.0 on the `z = 0` plane, or `None` behind the near
/// plane.
pub fn world_to_screen(p: Vec3, play_w: f32, play_h: f32) -> Option<(f32, f32, f32)> {
    let depth = CAM_Z - p.z;
    if depth < NEAR { return None; }
    let scale = CAM_Z / depth;
    let ppu_x = play_w / (2.0 * WORLD_HALF_EXTENT.x);
    let ppu_y = play_h / (2.0 * WORLD_HALF_EXTENT.y);
    Some((
        play_w * 0.5 + p.x * scale * ppu_x,
        play_h * 0.5 - p.y * scale * ppu_y,
        scale,
    ))
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas: ARGB framebuffer with drawing primitives
// ════════════════════════════════════════════════════════════════════════════

pub struct Canvas {
    pub buf: Vec<u32>,
    pub w:   usize,
    pub h:   usize,
}

impl Canvas {
    pub fn new(w: usize, h: usize) -> Self {
        Canvas { buf: vec![BG; w * h], w, h }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.w && y < self.h).then(|| self.buf[y * self.w + x])
    }

    fn put(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            self.buf[y as usize * self.w + x as usize] = color;
        }
    }

    /// Mix `color` over what is already there.
    fn tint(&mut self, x: i32, y: i32, color: u32, alpha: f32) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            let i = y as usize * self.w + x as usize;
            self.buf[i] = blend(self.buf[i], color, alpha);
        }
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.h) {
            let start = row * self.w;
            for col in x..(x + w).min(self.w) {
                self.buf[start + col] = color;
            }
        }
    }

    /// Bresenham line, endpoints inclusive.
    pub fn line(&mut self, a: (i32, i32), b: (i32, i32), color: u32, alpha: f32) {
        let (mut x, mut y) = a;
        let dx =  (b.0 - x).abs();
        let dy = -(b.1 - y).abs();
        let sx = if x < b.0 { 1 } else { -1 };
        let sy = if y < b.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.tint(x, y, color, alpha);
            if (x, y) == b { break; }
            let e2 = 2 * err;
            if e2 >= dy { err += dy; x += sx; }
            if e2 <= dx { err += dx; y += sy; }
        }
    }

    pub fn disc(&mut self, cx: f32, cy: f32, r: f32, color: u32, alpha: f32) {
        let r = r.max(0.5);
        let (x0, x1) = ((cx - r).floor() as i32, (cx + r).ceil() as i32);
        let (y0, y1) = ((cy - r).floor() as i32, (cy + r).ceil() as i32);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
                if dx * dx + dy * dy <= r * r { self.tint(x, y, color, alpha); }
            }
        }
    }

    pub fn ring(&mut self, cx: f32, cy: f32, r: f32, color: u32) {
        let steps = ((r * 6.0) as usize).max(16);
        for i in 0..steps {
            let a = i as f32 / steps as f32 * std::f32::consts::TAU;
            self.put((cx + r * a.cos()) as i32, (cy + r * a.sin()) as i32, color);
        }
    }

    /// Draw `text` in the 3×5 font, each font pixel `scale` screen pixels.
    /// Returns the x just past the last glyph.
    pub fn text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) -> usize {
        let mut cx = x;
        for ch in text.chars() {
            if cx + 3 * scale > self.w { break; }
            let bits = glyph(ch);
            for row in 0..5 {
                for col in 0..3 {
                    if bits & (1 << (14 - row * 3 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale;
        }
        cx
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer: the window
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:       Window,
    canvas:       Canvas,
    sim_tx:       Sender<SimInput>,
    pointer_down: bool,
}

impl Visualizer {
    pub fn new(cfg: &WindowSection, sim_tx: Sender<SimInput>) -> Result<Self, AppError> {
        let mut window = Window::new(
            "Wand Caster",
            cfg.width, cfg.height,
            WindowOptions { resize: false, ..WindowOptions::default() },
        ).map_err(|e| AppError::Window(e.to_string()))?;

        window.limit_update_rate(Some(Duration::from_micros(1_000_000 / u64::from(cfg.fps.max(1)))));

        Ok(Visualizer {
            window,
            canvas: Canvas::new(cfg.width, cfg.height),
            sim_tx,
            pointer_down: false,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    fn play_size(&self) -> (usize, usize) {
        (self.canvas.w - PANEL_W, self.canvas.h - STATUS_H)
    }

    /// Translate window input into [`SimInput`].  Returns false when the
    /// window should close.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }

        let pressed = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let send = |i: SimInput| { let _ = self.sim_tx.send(i); };

        if pressed(Key::Q) || pressed(Key::Escape) {
            send(SimInput::Key(SimKey::Quit));
            return false;
        }

        const DIGITS: [Key; 8] = [
            Key::Key1, Key::Key2, Key::Key3, Key::Key4,
            Key::Key5, Key::Key6, Key::Key7, Key::Key8,
        ];
        for (i, k) in DIGITS.into_iter().enumerate() {
            if pressed(k) { send(SimInput::Key(SimKey::Digit(i as u8 + 1))); }
        }
        for (k, sk) in [
            (Key::Left,  SimKey::Left),
            (Key::Right, SimKey::Right),
            (Key::Tab,   SimKey::Tab),
            (Key::Enter, SimKey::Enter),
            (Key::C,     SimKey::Cast),
            (Key::M,     SimKey::Master),
        ] {
            if pressed(k) { send(SimInput::Key(sk)); }
        }

        // Holding the left button draws with the pointer as the fingertip.
        let (pw, ph) = self.play_size();
        let pointer = self.window.get_mouse_pos(MouseMode::Discard)
            .filter(|_| self.window.get_mouse_down(MouseButton::Left))
            .filter(|&(mx, my)| mx < pw as f32 && my < ph as f32);
        match pointer {
            Some((mx, my)) => {
                send(SimInput::Pointer { x: mx / pw as f32, y: my / ph as f32 });
                self.pointer_down = true;
            }
            None if self.pointer_down => {
                send(SimInput::PointerLost);
                self.pointer_down = false;
            }
            None => {}
        }
        true
    }

    /// Render one frame.
    pub fn render(&mut self, frame: &FrameView) {
        let (pw, ph) = self.play_size();
        let (w, h) = (self.canvas.w, self.canvas.h);
        let to_px = |p: Vec2| (p.x * pw as f32, p.y * ph as f32);

        let c = &mut self.canvas;
        c.buf.fill(BG);

        // ── guide path ────────────────────────────────────────────────────
        if let Some(guide) = &frame.guide {
            draw_guide(c, guide, pw, ph);
        }

        // ── demonstration ghost ───────────────────────────────────────────
        if let Some(g) = frame.ghost {
            let (x, y) = to_px(g);
            c.disc(x, y, 9.0, GHOST, 0.35);
            c.disc(x, y, 5.0, GHOST, 0.9);
        }

        // ── trail, fading toward the tail ─────────────────────────────────
        let n = frame.trail.len();
        for (i, pair) in frame.trail.windows(2).enumerate() {
            let (a, b) = (to_px(pair[0]), to_px(pair[1]));
            let alpha = (i + 1) as f32 / n as f32;
            c.line((a.0 as i32, a.1 as i32), (b.0 as i32, b.1 as i32), CURSOR, alpha * 0.8);
        }

        // ── particles ─────────────────────────────────────────────────────
        let ppu = pw as f32 / (2.0 * WORLD_HALF_EXTENT.x);
        for p in &frame.particles {
            let Some((x, y, scale)) = world_to_screen(p.position, pw as f32, ph as f32) else { continue };
            if x < 0.0 || y < 0.0 || x >= pw as f32 || y >= ph as f32 { continue; }
            c.disc(x, y, (p.size * scale * ppu).max(1.0), p.color, p.alpha);
        }

        // ── cursor ────────────────────────────────────────────────────────
        if let Some(cur) = frame.cursor {
            let (x, y) = to_px(cur);
            c.ring(x, y, 7.0, CURSOR);
            c.disc(x, y, 2.0, CURSOR, 1.0);
        }

        // ── header ────────────────────────────────────────────────────────
        let x = c.text(&frame.spell_name, 12, 12, 3, TEXT);
        c.text(&frame.incantation, x + 12, 18, 2, DIM_TEXT);
        let mut line = frame.mode.label().to_string();
        if let Some(stage) = frame.stage { line += " - "; line += stage.as_str(); }
        if let Some((done, need)) = frame.practice { line += &format!(" {done}/{need}"); }
        c.text(&line, 12, 36, 2, DIM_TEXT);

        let bar_w = pw / 4;
        let bar_x = pw - bar_w - 12;
        c.fill_rect(bar_x, 14, bar_w, 8, PANEL_BG);
        c.fill_rect(bar_x, 14, (bar_w as f32 * frame.progress.clamp(0.0, 1.0)) as usize, 8, 0xFF7CFFA0);

        // ── curriculum panel ──────────────────────────────────────────────
        c.fill_rect(pw, 0, PANEL_W, ph, PANEL_BG);
        c.text("SPELLS", pw + 12, 12, 2, TEXT);
        for (i, badge) in frame.spells.iter().enumerate() {
            let y = 40 + i * 22;
            if y + 14 > ph { break; }
            let marker = if badge.selected { ">" } else { " " };
            let label = format!("{marker}{} {}", i + 1, badge.name);
            c.text(&label, pw + 8, y, 2, status_color(badge.status));
            c.text(badge.status.as_str(), pw + 24, y + 11, 1, DIM_TEXT);
        }

        // ── status bar ────────────────────────────────────────────────────
        c.fill_rect(0, ph, w, STATUS_H, STATUS_BG);
        c.text(&frame.status, 10, ph + 8, 2, TEXT);
        let legend = match frame.mode {
            Mode::FreePlay => "hold mouse=trace  1-8/arrows=spell  tab=teach  c=cast  q=quit",
            Mode::Teaching => "hold mouse=trace  enter=next stage  tab=free play  m=master  q=quit",
        };
        c.text(legend, 10, h - 12, 1, DIM_TEXT);

        self.window.update_with_buffer(&self.canvas.buf, w, h).ok();
    }
}

fn draw_guide(c: &mut Canvas, guide: &GuideView, pw: usize, ph: usize) {
    let to_px = |p: Vec2| ((p.x * pw as f32) as i32, (p.y * ph as f32) as i32);
    let spine: Vec<Vec2> = if guide.curve.len() >= 2 {
        guide.curve.clone()
    } else {
        guide.points.iter().map(|p| p.at).collect()
    };
    for pair in spine.windows(2) {
        c.line(to_px(pair[0]), to_px(pair[1]), guide.color, 0.45);
    }

    let r = guide.radius * ph.min(pw) as f32;
    for p in guide.points.iter().filter(|p| p.checkpoint) {
        let (x, y) = (p.at.x * pw as f32, p.at.y * ph as f32);
        if p.satisfied {
            c.disc(x, y, r, guide.color, 0.55);
        } else {
            c.ring(x, y, r, guide.color);
        }
        if let Some(label) = &p.label {
            c.text(label, (x + r + 4.0) as usize, (y - 3.0).max(0.0) as usize, 1, DIM_TEXT);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Colour and font helpers
// ════════════════════════════════════════════════════════════════════════════

/// Linear ARGB mix; `t = 0` gives `a`, `t = 1` gives `b`.  Result is opaque.
pub fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let ch = |shift: u32| {
        let (ca, cb) = ((a >> shift) & 0xFF, (b >> shift) & 0xFF);
        ((ca as f32 + (cb as f32 - ca as f32) * t).round() as u32) << shift
    };
    0xFF00_0000 | ch(16) | ch(8) | ch(0)
}

/// 3×5 glyph packed row-major into the low 15 bits, top row highest.
fn glyph(c: char) -> u16 {
    match c.to_ascii_uppercase() {
        'A' => 0b010_101_111_101_101, 'B' => 0b110_101_110_101_110,
        'C' => 0b011_100_100_100_011, 'D' => 0b110_101_101_101_110,
        'E' => 0b111_100_110_100_111, 'F' => 0b111_100_110_100_100,
        'G' => 0b011_100_101_101_011, 'H' => 0b101_101_111_101_101,
        'I' => 0b111_010_010_010_111, 'J' => 0b001_001_001_101_010,
        'K' => 0b101_110_100_110_101, 'L' => 0b100_100_100_100_111,
        'M' => 0b101_111_111_101_101, 'N' => 0b110_101_101_101_101,
        'O' => 0b010_101_101_101_010, 'P' => 0b110_101_110_100_100,
        'Q' => 0b010_101_101_110_011, 'R' => 0b110_101_110_101_101,
        'S' => 0b011_100_010_001_110, 'T' => 0b111_010_010_010_010,
        'U' => 0b101_101_101_101_111, 'V' => 0b101_101_101_101_010,
        'W' => 0b101_101_111_111_101, 'X' => 0b101_101_010_101_101,
        'Y' => 0b101_101_010_010_010, 'Z' => 0b111_001_010_100_111,
        '0' => 0b111_101_101_101_111, '1' => 0b010_110_010_010_111,
        '2' => 0b110_001_010_100_111, '3' => 0b110_001_010_001_110,
        '4' => 0b101_101_111_001_001, '5' => 0b111_100_110_001_110,
        '6' => 0b011_100_111_101_111, '7' => 0b111_001_010_010_010,
        '8' => 0b111_101_111_101_111, '9' => 0b111_101_111_001_110,
        ' ' => 0,
        '!' => 0b010_010_010_000_010, '?' => 0b110_001_010_000_010,
        '-' => 0b000_000_111_000_000, '_' => 0b000_000_000_000_111,
        '+' => 0b000_010_111_010_000, '=' => 0b000_111_000_111_000,
        '/' => 0b001_001_010_100_100, ':' => 0b000_010_000_010_000,
        '.' => 0b000_000_000_000_010, ',' => 0b000_000_000_010_100,
        '>' => 0b100_010_001_010_100, '<' => 0b001_010_100_010_001,
        '(' => 0b010_100_100_100_010, ')' => 0b010_001_001_001_010,
        '\'' => 0b010_010_000_000_000,
        _   => 0b000_000_010_000_000,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use spell_matcher::cursor_to_world;

    #[test]
    fn world_plane_fills_play_area() {
        let p = cursor_to_world(Vec2::new(0.25, 0.75));
        let (x, y, scale) = world_to_screen(p, 800.0, 600.0).unwrap();
        assert_eq!((x, y, scale), (200.0, 450.0, 1.0));
    }

    #[test]
    fn receding_particles_shrink_toward_centre() {
        let near = world_to_screen(Vec3::new(2.0, 0.0, 0.0), 800.0, 600.0).unwrap();
        let far  = world_to_screen(Vec3::new(2.0, 0.0, -10.0), 800.0, 600.0).unwrap();
        assert!(far.2 < near.2);
        assert!(far.0 < near.0 && far.0 > 400.0);
    }

    #[test]
    fn behind_camera_is_not_drawn() {
        assert!(world_to_screen(Vec3::new(0.0, 0.0, CAM_Z), 800.0, 600.0).is_none());
    }

    #[test]
    fn blend_endpoints_and_midpoint() {
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
        assert_eq!(blend(0xFF000000, 0xFF00C800, 0.5), 0xFF006400);
    }

    #[test]
    fn line_hits_both_endpoints() {
        let mut c = Canvas::new(20, 20);
        c.line((2, 3), (15, 11), 0xFFFFFFFF, 1.0);
        assert_eq!(c.pixel(2, 3), Some(0xFFFFFFFF));
        assert_eq!(c.pixel(15, 11), Some(0xFFFFFFFF));
    }

    #[test]
    fn off_canvas_drawing_is_clipped() {
        let mut c = Canvas::new(10, 10);
        c.disc(-5.0, -5.0, 8.0, 0xFFFFFFFF, 1.0);
        c.line((-20, 5), (30, 5), 0xFFFFFFFF, 1.0);
        assert_eq!(c.pixel(0, 5), Some(0xFFFFFFFF));
        assert_eq!(c.pixel(10, 5), None);
    }

    #[test]
    fn text_advances_four_cells_per_glyph() {
        let mut c = Canvas::new(100, 20);
        assert_eq!(c.text("AB", 0, 0, 2, TEXT), 16);
        // Top-middle pixel of 'A' is set, top-left is not.
        assert_eq!(c.pixel(2, 0), Some(TEXT));
        assert_eq!(c.pixel(0, 0), Some(BG));
    }
}
