//! # spell_burst
//!
//! Visual feedback for a successful cast: a short-lived batch of particles
//! thrown from the cast origin.
//!
//! ## Model
//!
//! Each spell looks up one [`BurstParams`] row (count, color, speed,
//! directional [`Bias`], spread, life, size and decay ranges).  Unknown
//! spells get [`NEUTRAL`], a small white burst.  A single spawn never emits
//! more than [`MAX_BURST`] particles and never grows the live pool past the
//! simulator's `max_live`.
//!
//! Every [`BurstSimulator::tick`]:
//!
//! ```text
//! life     -= dt * decay
//! position += velocity * dt
//! drop if life <= 0 or |position.z - origin.z| > CULL_DEPTH
//! ```
//!
//! after which [`BurstSimulator::snapshot`] hands the renderer an owned list
//! of [`ParticleView`]s; the renderer never touches live particles.
//!
//! World axes: `x` right, `y` up, `z` toward the viewer, so a forward shot
//! travels along `-z`.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

/// Hard per-spawn particle cap.
pub const MAX_BURST: usize = 50;

/// Depth displacement from the spawn origin beyond which a particle is culled.
pub const CULL_DEPTH: f32 = 8.0;

/// Default bound on the whole live pool.
pub const DEFAULT_MAX_LIVE: usize = 600;

// ════════════════════════════════════════════════════════════════════════════
// Parameter table
// ════════════════════════════════════════════════════════════════════════════

/// The direction a burst favours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bias {
    /// Away from the viewer along `-z`.
    ForwardShot,
    /// Spawned on a shell, collapsing onto the origin.
    InwardPull,
    /// Uniformly in every direction.
    OutwardBurst,
    UpwardRise,
    DownwardSlam,
    /// Evenly spaced around a ring in the screen plane.
    RadialExpand,
}

/// Burst parameters for one spell type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BurstParams {
    /// Nominal particle count before the [`MAX_BURST`] clamp.
    pub count:  usize,
    /// Packed ARGB.
    pub color:  u32,
    pub speed:  f32,
    pub bias:   Bias,
    /// Uniform perturbation added to every velocity axis, ± this value.
    pub spread: f32,
    /// Starting (and max) life in seconds at decay 1.0.
    pub life:   f32,
    pub size:   (f32, f32),
    pub decay:  (f32, f32),
}

/// Fallback for spell types without a row.
pub const NEUTRAL: BurstParams = BurstParams {
    count:  20,
    color:  0xFFFFFFFF,
    speed:  2.0,
    bias:   Bias::OutwardBurst,
    spread: 0.4,
    life:   0.8,
    size:   (0.04, 0.08),
    decay:  (0.9, 1.1),
};

const TABLE: &[(&str, BurstParams)] = &[
    ("lumos", BurstParams {
        count: 40, color: 0xFFFFF2A8, speed: 3.0, bias: Bias::UpwardRise,
        spread: 0.8, life: 1.2, size: (0.06, 0.14), decay: (0.8, 1.2),
    }),
    ("descendo", BurstParams {
        count: 45, color: 0xFF9C7BFF, speed: 4.5, bias: Bias::DownwardSlam,
        spread: 1.0, life: 0.9, size: (0.08, 0.16), decay: (0.9, 1.3),
    }),
    ("accio", BurstParams {
        count: 48, color: 0xFF7FE3FF, speed: 3.5, bias: Bias::InwardPull,
        spread: 0.3, life: 1.0, size: (0.05, 0.10), decay: (0.9, 1.1),
    }),
    ("wingardium_leviosa", BurstParams {
        count: 36, color: 0xFFB8FFB0, speed: 2.0, bias: Bias::UpwardRise,
        spread: 0.5, life: 1.6, size: (0.05, 0.12), decay: (0.7, 1.0),
    }),
    ("incendio", BurstParams {
        count: 80, color: 0xFFFF8A3D, speed: 3.2, bias: Bias::RadialExpand,
        spread: 0.9, life: 1.1, size: (0.08, 0.20), decay: (1.0, 1.5),
    }),
    ("protego", BurstParams {
        count: 60, color: 0xFF5DA9FF, speed: 4.0, bias: Bias::OutwardBurst,
        spread: 0.0, life: 1.0, size: (0.06, 0.12), decay: (0.9, 1.1),
    }),
    ("expelliarmus", BurstParams {
        count: 50, color: 0xFFFF4D4D, speed: 9.0, bias: Bias::ForwardShot,
        spread: 0.6, life: 0.8, size: (0.05, 0.10), decay: (0.9, 1.1),
    }),
    ("stupefy", BurstParams {
        count: 70, color: 0xFFFF5FD2, speed: 8.0, bias: Bias::ForwardShot,
        spread: 1.2, life: 0.7, size: (0.06, 0.12), decay: (1.0, 1.2),
    }),
];

/// Dedicated parameter row for `spell`, if any.
pub fn lookup(spell: &str) -> Option<&'static BurstParams> {
    TABLE.iter()
        .find(|(id, _)| *id == spell)
        .map(|(_, p)| p)
}

/// Parameter row for `spell`, or [`NEUTRAL`] when there is none.
pub fn params_for(spell: &str) -> &'static BurstParams {
    lookup(spell).unwrap_or(&NEUTRAL)
}

// ════════════════════════════════════════════════════════════════════════════
// Particle / ParticleView
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub id:       u64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub life:     f32,
    pub max_life: f32,
    pub color:    u32,
    pub size:     f32,
    pub decay:    f32,
    /// Spawn origin; the cull test measures depth from here.
    pub origin:   Vec3,
}

/// What the renderer gets for one live particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleView {
    pub id:       u64,
    pub position: Vec3,
    /// Render size scaled by remaining life.
    pub size:     f32,
    pub color:    u32,
    /// `life / max_life`, in (0, 1].
    pub alpha:    f32,
}

// ════════════════════════════════════════════════════════════════════════════
// BurstSimulator
// ════════════════════════════════════════════════════════════════════════════

/// Owns the live particle pool.  Sole writer; readers take snapshots.
pub struct BurstSimulator {
    particles: Vec<Particle>,
    max_live:  usize,
    next_id:   u64,
    rng:       StdRng,
}

impl BurstSimulator {
    pub fn new(max_live: usize) -> Self {
        Self::with_rng(max_live, StdRng::from_entropy())
    }

    /// Deterministic simulator for replays and tests.
    pub fn with_seed(max_live: usize, seed: u64) -> Self {
        Self::with_rng(max_live, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_live: usize, rng: StdRng) -> Self {
        BurstSimulator { particles: Vec::new(), max_live, next_id: 0, rng }
    }

    /// Spawn the nominal burst for `spell` at `origin`.  Returns how many
    /// particles were actually created.
    pub fn spawn(&mut self, spell: &str, origin: Vec3) -> usize {
        let params = match lookup(spell) {
            Some(p) => p,
            None    => {
                debug!(spell, "no burst row, using neutral");
                &NEUTRAL
            }
        };
        self.spawn_with(params, params.count, origin)
    }

    /// Spawn with explicit parameters.
    pub fn spawn_with(&mut self, params: &BurstParams, requested: usize, origin: Vec3) -> usize {
        let room = self.max_live.saturating_sub(self.particles.len());
        let n = requested.min(MAX_BURST).min(room);
        if n < requested.min(MAX_BURST) {
            warn!(requested, spawned = n, live = self.particles.len(), "particle pool full");
        }

        for i in 0..n {
            let (position, velocity) = self.launch(params, origin, i, n);
            let size  = sample(&mut self.rng, params.size);
            let decay = sample(&mut self.rng, params.decay);
            self.particles.push(Particle {
                id: self.next_id,
                position,
                velocity,
                life:     params.life,
                max_life: params.life,
                color:    params.color,
                size,
                decay,
                origin,
            });
            self.next_id += 1;
        }
        n
    }

    /// Starting position and velocity of particle `i` of `n`.
    fn launch(&mut self, params: &BurstParams, origin: Vec3, i: usize, n: usize) -> (Vec3, Vec3) {
        let speed = params.speed;
        let (position, mut velocity) = match params.bias {
            Bias::ForwardShot  => (origin, Vec3::NEG_Z * speed),
            Bias::UpwardRise   => (origin, Vec3::Y * speed),
            Bias::DownwardSlam => (origin, Vec3::NEG_Y * speed),
            Bias::OutwardBurst => (origin, random_unit(&mut self.rng) * speed),
            Bias::InwardPull   => {
                let dir = random_unit(&mut self.rng);
                // Shell radius such that particles reach the centre mid-life.
                let radius = speed * params.life * 0.5;
                (origin + dir * radius, -dir * speed)
            }
            Bias::RadialExpand => {
                let jitter = self.rng.gen_range(-0.5..=0.5_f32);
                let a = (i as f32 + jitter) / n.max(1) as f32 * TAU;
                (origin, Vec3::new(a.cos(), a.sin(), 0.0) * speed)
            }
        };
        if params.spread > 0.0 {
            let s = params.spread;
            velocity += Vec3::new(
                self.rng.gen_range(-s..=s),
                self.rng.gen_range(-s..=s),
                self.rng.gen_range(-s..=s),
            );
        }
        (position, velocity)
    }

    /// Advance every particle by `dt` seconds and drop the dead ones.
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        let before = self.particles.len();
        self.particles.retain_mut(|p| {
            p.life -= dt * p.decay;
            p.position += p.velocity * dt;
            p.life > 0.0 && (p.position.z - p.origin.z).abs() <= CULL_DEPTH
        });
        let culled = before - self.particles.len();
        if culled > 0 {
            debug!(culled, live = self.particles.len(), "particles retired");
        }
    }

    /// Owned view of every live particle.
    pub fn snapshot(&self) -> Vec<ParticleView> {
        self.particles.iter()
            .filter(|p| p.life > 0.0)
            .map(|p| {
                let alpha = (p.life / p.max_life).clamp(0.0, 1.0);
                ParticleView {
                    id:       p.id,
                    position: p.position,
                    size:     p.size * alpha,
                    color:    p.color,
                    alpha,
                }
            })
            .collect()
    }

    pub fn particles(&self) -> &[Particle] { &self.particles }
    pub fn len(&self) -> usize { self.particles.len() }
    pub fn is_empty(&self) -> bool { self.particles.is_empty() }
    pub fn max_live(&self) -> usize { self.max_live }
    pub fn clear(&mut self) { self.particles.clear(); }
}

impl Default for BurstSimulator {
    fn default() -> Self { Self::new(DEFAULT_MAX_LIVE) }
}

/// Uniform in `[lo, hi]`; a collapsed or inverted range yields `lo`.
fn sample(rng: &mut StdRng, (lo, hi): (f32, f32)) -> f32 {
    if lo < hi { rng.gen_range(lo..=hi) } else { lo }
}

/// Uniformly distributed unit vector.
fn random_unit(rng: &mut StdRng) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let a: f32 = rng.gen_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * a.cos(), r * a.sin(), z)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
