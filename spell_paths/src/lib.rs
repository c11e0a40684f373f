//! # spell_paths
//!
//! The catalogue of gesture spells.  Each [`SpellPath`] is an ordered run of
//! [`PathPoint`]s in normalized screen space (`x`, `y` ∈ [0, 1], `y` grows
//! downward).  Points flagged as checkpoints are the targets a fingertip
//! must reach; the remaining points and the optional display `curve` only
//! shape what the guide overlay draws.
//!
//! Matching code trusts the order of `points` as the traversal order, so the
//! builtin table below is authored in the order a player draws each stroke.
//!
//! ## Builtin curriculum
//!
//! | # | Id | Stroke |
//! |---|---|---|
//! | 1 | `lumos` | single upward stroke |
//! | 2 | `descendo` | single downward stroke |
//! | 3 | `accio` | V-shaped pull toward the body |
//! | 4 | `wingardium_leviosa` | swish and flick |
//! | 5 | `incendio` | flame zigzag |
//! | 6 | `protego` | shield circle |
//! | 7 | `expelliarmus` | rising diagonal slash |
//! | 8 | `stupefy` | Z stroke |

use serde::Deserialize;
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// PathPoint / SpellPath
// ════════════════════════════════════════════════════════════════════════════

/// One authored point of a spell path.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PathPoint {
    pub x: f32,
    pub y: f32,
    /// Only checkpoints take part in matching.
    #[serde(default)]
    pub checkpoint: bool,
    #[serde(default)]
    pub label: Option<String>,
}

impl PathPoint {
    /// A checkpoint the fingertip must pass through.
    pub fn checkpoint(x: f32, y: f32, label: &str) -> Self {
        PathPoint { x, y, checkpoint: true, label: Some(label.to_string()) }
    }

    /// A shaping point, ignored by matching.
    pub fn via(x: f32, y: f32) -> Self {
        PathPoint { x, y, checkpoint: false, label: None }
    }
}

/// A named gesture: display metadata plus the ordered point sequence.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SpellPath {
    pub id:          String,
    pub name:        String,
    #[serde(default)]
    pub incantation: String,
    #[serde(default)]
    pub description: String,
    /// Packed ARGB used for the guide overlay.
    #[serde(default = "default_color")]
    pub color:       u32,
    pub points:      Vec<PathPoint>,
    /// Purely decorative polyline; never consulted by matching.
    #[serde(default)]
    pub curve:       Vec<[f32; 2]>,
}

fn default_color() -> u32 { 0xFFE0E0E0 }

impl SpellPath {
    /// Indices into `points` of every checkpoint, in traversal order.
    pub fn checkpoint_indices(&self) -> Vec<usize> {
        self.points.iter()
            .enumerate()
            .filter(|(_, p)| p.checkpoint)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.points.iter().filter(|p| p.checkpoint).count()
    }

    /// Point along the drawn stroke at fraction `t` of its arc length.
    ///
    /// Walks the display curve when one is authored (two or more vertices),
    /// otherwise the point sequence.  `t` is clamped to [0, 1].  Returns
    /// `None` only for a path with no geometry at all.
    pub fn trace_at(&self, t: f32) -> Option<(f32, f32)> {
        let line: Vec<(f32, f32)> = if self.curve.len() >= 2 {
            self.curve.iter().map(|c| (c[0], c[1])).collect()
        } else {
            self.points.iter().map(|p| (p.x, p.y)).collect()
        };

        let first = *line.first()?;
        if line.len() == 1 { return Some(first); }

        let seg_len = |a: (f32, f32), b: (f32, f32)| {
            ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
        };
        let total: f32 = line.windows(2).map(|w| seg_len(w[0], w[1])).sum();
        if total <= f32::EPSILON || t <= 0.0 { return Some(first); }
        if t >= 1.0 { return line.last().copied(); }

        let mut remaining = t * total;
        for w in line.windows(2) {
            let len = seg_len(w[0], w[1]);
            if remaining <= len {
                let f = if len > 0.0 { remaining / len } else { 0.0 };
                return Some((
                    w[0].0 + (w[1].0 - w[0].0) * f,
                    w[0].1 + (w[1].1 - w[0].1) * f,
                ));
            }
            remaining -= len;
        }
        line.last().copied()
    }

    /// Check the invariants every registered path must hold.
    pub fn validate(&self) -> Result<(), PathError> {
        if self.id.trim().is_empty() {
            return Err(PathError::EmptyId);
        }
        if self.checkpoint_count() == 0 {
            return Err(PathError::NoCheckpoints(self.id.clone()));
        }
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        for (index, p) in self.points.iter().enumerate() {
            if !in_unit(p.x) || !in_unit(p.y) {
                return Err(PathError::OutOfRange { id: self.id.clone(), index });
            }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PathError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error, PartialEq)]
pub enum PathError {
    #[error("spell path has an empty identifier")]
    EmptyId,
    #[error("spell `{0}` is already registered")]
    Duplicate(String),
    #[error("spell `{0}` has no checkpoints")]
    NoCheckpoints(String),
    #[error("spell `{id}` point {index} lies outside the unit square")]
    OutOfRange { id: String, index: usize },
}

// ════════════════════════════════════════════════════════════════════════════
// PathRegistry
// ════════════════════════════════════════════════════════════════════════════

/// Identifier → path lookup.  Filled once at start-up, read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct PathRegistry {
    paths: Vec<SpellPath>,
}

impl PathRegistry {
    /// Registry holding the builtin catalogue, in curriculum order.
    pub fn builtin() -> Self {
        PathRegistry { paths: builtin_paths() }
    }

    pub fn empty() -> Self { Self::default() }

    /// Add a path after validating it.
    pub fn register(&mut self, path: SpellPath) -> Result<(), PathError> {
        path.validate()?;
        if self.lookup(&path.id).is_some() {
            return Err(PathError::Duplicate(path.id));
        }
        self.paths.push(path);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<&SpellPath> {
        self.paths.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool { self.lookup(id).is_some() }

    /// Identifiers in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.paths.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpellPath> { self.paths.iter() }
    pub fn len(&self) -> usize { self.paths.len() }
    pub fn is_empty(&self) -> bool { self.paths.is_empty() }
}

// ════════════════════════════════════════════════════════════════════════════
// Builtin catalogue
// ════════════════════════════════════════════════════════════════════════════

/// Circular arc from `start` to `end` radians, `steps` segments.
fn arc(cx: f32, cy: f32, r: f32, start: f32, end: f32, steps: usize) -> Vec<[f32; 2]> {
    (0..=steps)
        .map(|i| {
            let a = start + (end - start) * i as f32 / steps as f32;
            [cx + r * a.cos(), cy + r * a.sin()]
        })
        .collect()
}

fn spell(
    id: &str,
    name: &str,
    incantation: &str,
    description: &str,
    color: u32,
    points: Vec<PathPoint>,
    curve: Vec<[f32; 2]>,
) -> SpellPath {
    SpellPath {
        id:          id.to_string(),
        name:        name.to_string(),
        incantation: incantation.to_string(),
        description: description.to_string(),
        color,
        points,
        curve,
    }
}

/// The builtin spells in curriculum order.
pub fn builtin_paths() -> Vec<SpellPath> {
    use std::f32::consts::{FRAC_PI_2, TAU};

    vec![
        spell(
            "lumos", "Lumos", "LOO-mos",
            "Raise the wand straight up to kindle light.",
            0xFFFFF2A8,
            vec![
                PathPoint::checkpoint(0.50, 0.80, "base"),
                PathPoint::checkpoint(0.50, 0.50, "mid"),
                PathPoint::checkpoint(0.50, 0.20, "tip"),
            ],
            vec![],
        ),
        spell(
            "descendo", "Descendo", "deh-SEN-doh",
            "Drive the wand straight down to bring things low.",
            0xFF9C7BFF,
            vec![
                PathPoint::checkpoint(0.50, 0.20, "top"),
                PathPoint::via(0.50, 0.50),
                PathPoint::checkpoint(0.50, 0.80, "floor"),
            ],
            vec![],
        ),
        spell(
            "accio", "Accio", "AK-ee-oh",
            "Reach out, dip, and pull the object toward you.",
            0xFF7FE3FF,
            vec![
                PathPoint::checkpoint(0.25, 0.30, "reach"),
                PathPoint::checkpoint(0.50, 0.70, "dip"),
                PathPoint::checkpoint(0.75, 0.30, "pull"),
            ],
            vec![],
        ),
        spell(
            "wingardium_leviosa", "Wingardium Leviosa", "win-GAR-dee-um lev-ee-OH-sa",
            "Swish low, then flick up to lift.",
            0xFFB8FFB0,
            vec![
                PathPoint::checkpoint(0.20, 0.50, "start"),
                PathPoint::via(0.40, 0.65),
                PathPoint::checkpoint(0.60, 0.50, "swish"),
                PathPoint::checkpoint(0.75, 0.30, "flick"),
            ],
            vec![
                [0.20, 0.50], [0.28, 0.60], [0.40, 0.65],
                [0.52, 0.60], [0.60, 0.50], [0.75, 0.30],
            ],
        ),
        spell(
            "incendio", "Incendio", "in-SEN-dee-oh",
            "Trace the flickering tongues of a flame.",
            0xFFFF8A3D,
            vec![
                PathPoint::checkpoint(0.20, 0.70, "ember"),
                PathPoint::checkpoint(0.35, 0.35, "first tongue"),
                PathPoint::checkpoint(0.50, 0.70, "hearth"),
                PathPoint::checkpoint(0.65, 0.35, "second tongue"),
                PathPoint::checkpoint(0.80, 0.70, "blaze"),
            ],
            vec![],
        ),
        spell(
            "protego", "Protego", "pro-TAY-go",
            "Draw a full circle to raise a shield.",
            0xFF5DA9FF,
            vec![
                PathPoint::checkpoint(0.50, 0.20, "top"),
                PathPoint::checkpoint(0.80, 0.50, "right"),
                PathPoint::checkpoint(0.50, 0.80, "bottom"),
                PathPoint::checkpoint(0.20, 0.50, "left"),
            ],
            arc(0.50, 0.50, 0.30, -FRAC_PI_2, TAU - FRAC_PI_2, 48),
        ),
        spell(
            "expelliarmus", "Expelliarmus", "ex-PEL-ee-AR-mus",
            "Slash upward across the body to disarm.",
            0xFFFF4D4D,
            vec![
                PathPoint::checkpoint(0.20, 0.80, "low"),
                PathPoint::checkpoint(0.80, 0.20, "high"),
            ],
            vec![],
        ),
        spell(
            "stupefy", "Stupefy", "STOO-puh-fye",
            "Cut a sharp Z to stun.",
            0xFFFF5FD2,
            vec![
                PathPoint::checkpoint(0.25, 0.25, "top left"),
                PathPoint::checkpoint(0.75, 0.25, "top right"),
                PathPoint::checkpoint(0.25, 0.75, "bottom left"),
                PathPoint::checkpoint(0.75, 0.75, "bottom right"),
            ],
            vec![],
        ),
    ]
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn two_point() -> SpellPath {
        SpellPath {
            id:          "slash".into(),
            name:        "Slash".into(),
            incantation: String::new(),
            description: String::new(),
            color:       default_color(),
            points: vec![
                PathPoint::checkpoint(0.2, 0.8, "a"),
                PathPoint::checkpoint(0.8, 0.2, "b"),
            ],
            curve: vec![],
        }
    }

    #[test]
    fn builtin_paths_are_valid() {
        for p in builtin_paths() {
            assert_eq!(p.validate(), Ok(()), "{} should validate", p.id);
        }
    }

    #[test]
    fn builtin_ids_unique() {
        let reg = PathRegistry::builtin();
        let mut ids = reg.ids();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), reg.len());
        assert_eq!(reg.len(), 8);
    }

    #[test]
    fn lookup_known_and_unknown() {
        let reg = PathRegistry::builtin();
        assert_eq!(reg.lookup("protego").map(|p| p.checkpoint_count()), Some(4));
        assert!(reg.lookup("avada").is_none());
    }

    #[test]
    fn checkpoint_indices_skip_via_points() {
        let reg = PathRegistry::builtin();
        let descendo = reg.lookup("descendo").unwrap();
        assert_eq!(descendo.checkpoint_indices(), vec![0, 2]);
    }

    #[test]
    fn register_rejects_duplicate() {
        let mut reg = PathRegistry::empty();
        reg.register(two_point()).unwrap();
        assert_eq!(reg.register(two_point()), Err(PathError::Duplicate("slash".into())));
    }

    #[test]
    fn register_rejects_no_checkpoints() {
        let mut p = two_point();
        for pt in &mut p.points { pt.checkpoint = false; }
        let mut reg = PathRegistry::empty();
        assert_eq!(reg.register(p), Err(PathError::NoCheckpoints("slash".into())));
        assert!(reg.is_empty());
    }

    #[test]
    fn register_rejects_out_of_range() {
        let mut p = two_point();
        p.points[1].x = 1.3;
        assert_eq!(
            p.validate(),
            Err(PathError::OutOfRange { id: "slash".into(), index: 1 })
        );
    }

    #[test]
    fn trace_endpoints_and_midpoint() {
        let p = two_point();
        assert_eq!(p.trace_at(0.0), Some((0.2, 0.8)));
        assert_eq!(p.trace_at(1.0), Some((0.8, 0.2)));
        let (mx, my) = p.trace_at(0.5).unwrap();
        assert!((mx - 0.5).abs() < 1e-5 && (my - 0.5).abs() < 1e-5);
        // Clamped outside [0, 1]
        assert_eq!(p.trace_at(3.0), Some((0.8, 0.2)));
    }

    #[test]
    fn trace_prefers_curve() {
        let reg = PathRegistry::builtin();
        let protego = reg.lookup("protego").unwrap();
        // Circle starts and ends at the top.
        let (x0, y0) = protego.trace_at(0.0).unwrap();
        let (x1, y1) = protego.trace_at(1.0).unwrap();
        assert!((x0 - 0.5).abs() < 1e-4 && (y0 - 0.2).abs() < 1e-4);
        assert!((x1 - x0).abs() < 1e-4 && (y1 - y0).abs() < 1e-4);
    }
}
