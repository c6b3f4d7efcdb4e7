use std::rc::Rc;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::fluid::{FluidModel, FluidSettings, FluidSim};
use crate::texture::Texture;
use crate::vec2::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MotionMode {
    FreeMotion,
    FluidBound,
}

pub(crate) struct Metaball {
    pub(crate) position: Vec2,
    pub(crate) trajectory: Vec2,
    pub(crate) velocity: f32,
    pub(crate) particle: Option<usize>,
    pub(crate) texture: Rc<Texture>,
}

impl Metaball {
    pub(crate) fn spawn(rng: &mut StdRng, bounds: Vec2, texture: Rc<Texture>) -> Self {
        let t = Vec2::new(rng.gen_range(-1.0..1.0f32), rng.gen_range(-1.0..1.0f32));
        let trajectory = if t.len2() < 1e-6 {
            Vec2::new(1.0, 0.0)
        } else {
            t.norm()
        };
        Self {
            position: Vec2::new(
                rng.gen_range(0.0..bounds.x),
                rng.gen_range(0.0..bounds.y),
            ),
            trajectory,
            velocity: rng.gen_range(20.0..240.0),
            particle: None,
            texture,
        }
    }

    // Elastic wall bounce: clamp per axis and flip that trajectory
    // component.
    pub(crate) fn update_free(&mut self, bounds: Vec2, dt: f32) {
        self.position = self.position.add(self.trajectory.mul(self.velocity * dt));
        if self.position.x < 0.0 {
            self.position.x = 0.0;
            self.trajectory.x = -self.trajectory.x;
        } else if self.position.x > bounds.x {
            self.position.x = bounds.x;
            self.trajectory.x = -self.trajectory.x;
        }
        if self.position.y < 0.0 {
            self.position.y = 0.0;
            self.trajectory.y = -self.trajectory.y;
        } else if self.position.y > bounds.y {
            self.position.y = bounds.y;
            self.trajectory.y = -self.trajectory.y;
        }
    }
}

pub(crate) struct BlobField {
    pub(crate) blobs: Vec<Metaball>,
    pub(crate) mode: MotionMode,
    pub(crate) bounds: Vec2,
    texture: Rc<Texture>,
    rng: StdRng,
}

impl BlobField {
    pub(crate) fn new(seed: u64, bounds: Vec2, count: usize, texture: Rc<Texture>) -> Self {
        let mut field = Self {
            blobs: Vec::new(),
            mode: MotionMode::FreeMotion,
            bounds,
            texture,
            rng: StdRng::seed_from_u64(seed),
        };
        for _ in 0..count {
            let b = Metaball::spawn(&mut field.rng, bounds, field.texture.clone());
            field.blobs.push(b);
        }
        field
    }

    // Swap the shared texture; the previous one is released when the last
    // blob lets go of it.
    pub(crate) fn set_texture(&mut self, texture: Rc<Texture>) {
        self.texture = texture;
        for b in &mut self.blobs {
            b.texture = self.texture.clone();
        }
    }

    pub(crate) fn texture(&self) -> &Rc<Texture> {
        &self.texture
    }

    // The rebuild-and-rebind half of the mode switch: a fresh engine gets
    // one particle per live blob, seeded with the blob's current motion.
    pub(crate) fn enter_fluid(
        &mut self,
        model: FluidModel,
        settings: FluidSettings,
    ) -> FluidSim {
        let mut sim = FluidSim::new(model, settings, self.bounds);
        for b in &mut self.blobs {
            let vel = b.trajectory.mul(b.velocity);
            b.particle = Some(sim.insert(b.position, vel));
        }
        self.mode = MotionMode::FluidBound;
        sim
    }

    pub(crate) fn enter_free(&mut self) {
        for b in &mut self.blobs {
            b.particle = None;
        }
        self.mode = MotionMode::FreeMotion;
    }

    pub(crate) fn set_count(&mut self, count: usize, mut sim: Option<&mut FluidSim>) {
        if count < self.blobs.len() {
            let removed: Vec<Metaball> = self.blobs.split_off(count);
            if let Some(sim) = sim.as_deref_mut() {
                for b in &removed {
                    if let Some(i) = b.particle {
                        sim.queue_remove(i);
                    }
                }
                for (old, new) in sim.flush_pending() {
                    for b in &mut self.blobs {
                        if b.particle == Some(old) {
                            b.particle = Some(new);
                        }
                    }
                }
            }
            return;
        }
        while self.blobs.len() < count {
            let mut b = Metaball::spawn(&mut self.rng, self.bounds, self.texture.clone());
            if self.mode == MotionMode::FluidBound {
                if let Some(sim) = sim.as_deref_mut() {
                    let vel = b.trajectory.mul(b.velocity);
                    b.particle = Some(sim.insert(b.position, vel));
                }
            }
            self.blobs.push(b);
        }
    }

    pub(crate) fn update(&mut self, sim: Option<&FluidSim>, dt: f32) {
        match self.mode {
            MotionMode::FreeMotion => {
                for b in &mut self.blobs {
                    b.update_free(self.bounds, dt);
                }
            }
            MotionMode::FluidBound => {
                let Some(sim) = sim else { return };
                for b in &mut self.blobs {
                    if let Some(i) = b.particle {
                        if let Some(p) = sim.position(i) {
                            b.position = p;
                        }
                    }
                }
            }
        }
    }
}
