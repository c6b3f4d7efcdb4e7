use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::style::Color;

use crate::config::{load_settings, save_settings_atomic, settings_path, Settings};
use crate::entity::BlobField;
use crate::fluid::{FluidModel, FluidSettings, FluidSim};
use crate::input::{collect_input_nonblocking, map_event_to_action, Action};
use crate::presets::{Preset, PRESETS};
use crate::render::{composite, draw_blob, draw_circle_outline, draw_text, Terminal};
use crate::texture::Rgb;
use crate::vec2::Vec2;
use crate::world::{Drag, Shape, World};

pub(crate) const WORLD_W: f32 = 1024.0;
pub(crate) const WORLD_H: f32 = 768.0;

const SIM_STEP: f32 = 1.0 / 60.0;
const MAX_STEPS_PER_FRAME: u32 = 4;
const GRAVITY: f32 = 900.0;
const GRAB_RADIUS: f32 = 48.0;
const DRAG_STRENGTH: f32 = 25.0;
const OBSTACLE_CENTER: Vec2 = Vec2 { x: 512.0, y: 520.0 };
const OBSTACLE_RADIUS: f32 = 90.0;
const BG: Rgb = Rgb { r: 6, g: 7, b: 11 };
const STONE: Rgb = Rgb {
    r: 120,
    g: 120,
    b: 130,
};

pub(crate) struct App {
    settings: Settings,
    term: Terminal,
    preset_idx: usize,
    preset: Preset,
    fluid_settings: FluidSettings,
    world: World,
    blobs: BlobField,
    sim: Option<FluidSim>,
    model: FluidModel,
    gravity_on: bool,
    obstacle_on: bool,
    texture_dirty: bool,
    paused: bool,
    show_hud: bool,
    should_quit: bool,
    fps_smoothed: f32,
    frames: u32,
    last_fps: Instant,
}

impl App {
    fn init() -> anyhow::Result<Self> {
        let settings = load_settings(&settings_path()?);

        let preset = Preset::by_name(&settings.preset_name);
        let preset_idx = Preset::index_of(&settings.preset_name);
        let texture = Rc::new(preset.build_texture());

        let bounds = Vec2::new(WORLD_W, WORLD_H);
        let blobs = BlobField::new(settings.seed, bounds, settings.ball_count.max(1), texture);

        let mut world = World::new(Vec2::ZERO);
        world.shapes = border_shapes(false);

        let term = Terminal::begin()?;

        Ok(Self {
            settings,
            term,
            preset_idx,
            preset,
            fluid_settings: FluidSettings::default(),
            world,
            blobs,
            sim: None,
            model: FluidModel::Viscoelastic,
            gravity_on: false,
            obstacle_on: false,
            texture_dirty: false,
            paused: false,
            show_hud: true,
            should_quit: false,
            fps_smoothed: 60.0,
            frames: 0,
            last_fps: Instant::now(),
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        let mut last_frame = Instant::now();
        let mut acc = 0.0f32;

        while !self.should_quit {
            self.term.resize_if_needed()?;

            for ev in collect_input_nonblocking(frame_dt)? {
                if let Some(action) = map_event_to_action(&ev) {
                    self.apply_action(action);
                }
            }

            if self.texture_dirty {
                self.regenerate_texture();
            }

            let now = Instant::now();
            let real_dt = (now - last_frame).as_secs_f32().min(0.1);
            last_frame = now;

            if !self.paused {
                acc += real_dt;
                let mut steps = 0;
                while acc >= SIM_STEP && steps < MAX_STEPS_PER_FRAME {
                    self.step_world(SIM_STEP);
                    acc -= SIM_STEP;
                    steps += 1;
                }
                // never let a stall build up a burst of catch-up steps
                if acc > SIM_STEP {
                    acc = SIM_STEP;
                }
            }

            self.update_fps(now);
            self.render_frame()?;

            spin_sleep(frame_dt, Instant::now());
        }

        self.term.end()?;
        save_settings_atomic(&settings_path()?, &self.settings)?;
        Ok(())
    }

    fn step_world(&mut self, dt: f32) {
        if let Some(sim) = &mut self.sim {
            // a stale grab (particle removed meanwhile) is nulled out by
            // its owner, not by a callback
            if let Some(d) = self.world.drag {
                if d.particle >= sim.len() {
                    self.world.drag = None;
                }
            }
            sim.step(&self.world, dt);
        }
        self.blobs.update(self.sim.as_ref(), dt);
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::TogglePause => self.paused = !self.paused,
            Action::ToggleHud => self.show_hud = !self.show_hud,
            Action::ToggleGravity => {
                self.gravity_on = !self.gravity_on;
                if self.gravity_on {
                    self.world.gravity = Vec2::new(0.0, GRAVITY);
                    self.rebind_fluid();
                } else {
                    self.world.gravity = Vec2::ZERO;
                    self.world.drag = None;
                    self.sim = None;
                    self.blobs.enter_free();
                }
            }
            Action::ToggleSprings => {
                self.model = match self.model {
                    FluidModel::Simple => FluidModel::Viscoelastic,
                    FluidModel::Viscoelastic => FluidModel::Simple,
                };
                if self.gravity_on {
                    self.rebind_fluid();
                }
            }
            Action::ToggleObstacle => {
                self.obstacle_on = !self.obstacle_on;
                self.world.shapes = border_shapes(self.obstacle_on);
            }
            Action::CyclePreset => {
                self.preset_idx = (self.preset_idx + 1) % PRESETS.len();
                self.preset = PRESETS[self.preset_idx];
                self.settings.preset_name = self.preset.name.to_string();
                self.texture_dirty = true;
            }
            Action::Reset => {
                let tex = self.blobs.texture().clone();
                self.blobs = BlobField::new(
                    self.settings.seed,
                    Vec2::new(WORLD_W, WORLD_H),
                    self.settings.ball_count.max(1),
                    tex,
                );
                if self.gravity_on {
                    self.rebind_fluid();
                }
            }
            Action::AdjustBalls(d) => {
                let count = (self.settings.ball_count as i32 + d).clamp(1, 400) as usize;
                self.settings.ball_count = count;
                self.blobs.set_count(count, self.sim.as_mut());
            }
            Action::AdjustStiffness(d) => {
                self.fluid_settings.stiffness =
                    (self.fluid_settings.stiffness + d).clamp(0.0, 20_000.0);
                self.sync_fluid_settings();
            }
            Action::AdjustViscosity(d) => {
                self.fluid_settings.viscosity_sigma =
                    (self.fluid_settings.viscosity_sigma + d).clamp(0.0, 50.0);
                self.sync_fluid_settings();
            }
            Action::AdjustRadius(d) => {
                self.fluid_settings.influence_radius =
                    (self.fluid_settings.influence_radius + d).clamp(4.0, 240.0);
                self.sync_fluid_settings();
            }
            Action::AdjustGlow(d) => {
                self.preset.glow_factor = (self.preset.glow_factor + d).clamp(0.0, 1.0);
            }
            Action::AdjustScaling(d) => {
                self.preset.scaling_factor = (self.preset.scaling_factor + d).clamp(0.05, 1.0);
                self.texture_dirty = true;
            }
            Action::Grab(col, row) => {
                let p = self.cell_to_world(col, row);
                if let Some(sim) = &self.sim {
                    if let Some(i) = sim.particle_at(p, GRAB_RADIUS) {
                        self.world.drag = Some(Drag {
                            particle: i,
                            anchor: p,
                            strength: DRAG_STRENGTH,
                        });
                    }
                }
            }
            Action::DragTo(col, row) => {
                let p = self.cell_to_world(col, row);
                if let Some(d) = &mut self.world.drag {
                    d.anchor = p;
                }
            }
            Action::Release => self.world.drag = None,
        }
    }

    // Mode switch: the old engine is dropped, a fresh one gets a particle
    // per live blob.
    fn rebind_fluid(&mut self) {
        self.sim = Some(self.blobs.enter_fluid(self.model, self.fluid_settings));
    }

    fn sync_fluid_settings(&mut self) {
        if let Some(sim) = &mut self.sim {
            sim.settings = self.fluid_settings;
        }
    }

    // Regenerate, repoint every blob, then let the old texture drop.
    fn regenerate_texture(&mut self) {
        let tex = Rc::new(self.preset.build_texture());
        self.blobs.set_texture(tex);
        self.texture_dirty = false;
    }

    fn cell_to_world(&self, col: u16, row: u16) -> Vec2 {
        let sx = self.term.canvas.w as f32 / WORLD_W;
        let sy = self.term.canvas.h as f32 / WORLD_H;
        Vec2::new(
            (col as f32 * 2.0 + 1.0) / sx,
            (row as f32 * 4.0 + 2.0) / sy,
        )
    }

    fn update_fps(&mut self, now: Instant) {
        self.frames += 1;
        let window = (now - self.last_fps).as_secs_f32();
        if window >= 0.33 {
            let fps = self.frames as f32 / window.max(1e-6);
            self.fps_smoothed = self.fps_smoothed * 0.85 + fps * 0.15;
            self.frames = 0;
            self.last_fps = now;
        }
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        self.term.cur.clear(Color::Black);
        self.term.canvas.clear();

        let sx = self.term.canvas.w as f32 / WORLD_W;
        let sy = self.term.canvas.h as f32 / WORLD_H;

        for b in &self.blobs.blobs {
            draw_blob(&mut self.term.canvas, &b.texture, b.position, sx, sy);
        }
        if self.obstacle_on {
            draw_circle_outline(
                &mut self.term.canvas,
                OBSTACLE_CENTER,
                OBSTACLE_RADIUS,
                sx,
                sy,
                STONE,
            );
        }

        composite(
            &self.term.canvas,
            &mut self.term.cur,
            self.preset.glow,
            self.preset.glow_factor,
            self.settings.enable_color,
            BG,
        );

        if self.show_hud && self.term.rows >= 3 {
            let line1 = format!(
                "Metaballs  preset:{}  balls:{}  fluid:{}  springs:{}  stiff:{:.0}  visc:{:.1}  h:{:.0}  glow:{:.2}  {:>4.0} fps{}",
                self.preset.name,
                self.blobs.blobs.len(),
                if self.gravity_on { "on" } else { "off" },
                if self.model == FluidModel::Viscoelastic { "on" } else { "off" },
                self.fluid_settings.stiffness,
                self.fluid_settings.viscosity_sigma,
                self.fluid_settings.influence_radius,
                self.preset.glow_factor,
                self.fps_smoothed,
                if self.paused { "  [PAUSED]" } else { "" }
            );
            let line2 = "Keys: G fluid  V springs  P preset  O obstacle  [/] balls  Up/Dn stiffness  L/R viscosity  ,/. radius  -/= glow  ;/' scale  Space pause  R reset  H hud  Q quit  mouse drags";
            let fg = Color::Rgb {
                r: 210,
                g: 220,
                b: 245,
            };
            let dim = Color::Rgb {
                r: 170,
                g: 185,
                b: 210,
            };
            draw_text(&mut self.term.cur, 0, 0, &line1, fg, Color::Black);
            draw_text(&mut self.term.cur, 0, 1, line2, dim, Color::Black);
        }

        self.term.present()?;
        Ok(())
    }
}

fn border_shapes(with_obstacle: bool) -> Vec<Shape> {
    let tl = Vec2::new(0.0, 0.0);
    let tr = Vec2::new(WORLD_W, 0.0);
    let br = Vec2::new(WORLD_W, WORLD_H);
    let bl = Vec2::new(0.0, WORLD_H);
    let mut shapes = vec![
        Shape::Segment { a: tl, b: tr },
        Shape::Segment { a: tr, b: br },
        Shape::Segment { a: br, b: bl },
        Shape::Segment { a: bl, b: tl },
    ];
    if with_obstacle {
        shapes.push(Shape::Circle {
            center: OBSTACLE_CENTER,
            radius: OBSTACLE_RADIUS,
        });
    }
    shapes
}

pub(crate) fn run() -> anyhow::Result<()> {
    let mut app = App::init()?;
    app.run()
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_shapes_enclose_the_world() {
        let shapes = border_shapes(false);
        assert_eq!(shapes.len(), 4);
        let with = border_shapes(true);
        assert_eq!(with.len(), 5);
        assert!(matches!(with[4], Shape::Circle { .. }));
    }
}
