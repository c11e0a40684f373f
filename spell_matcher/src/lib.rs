//! # spell_matcher
//!
//! The ordered-checkpoint path matcher.  One [`PathMatcher`] follows the
//! active spell for one player: every frame it is fed the latest cursor
//! position, marks each checkpoint the cursor comes within the threshold
//! radius of, and reports a [`CastCompleted`] once every checkpoint of the
//! path is satisfied.
//!
//! ## Per-sample algorithm
//!
//! 1. Record the cursor and push it onto the bounded trail (cosmetic only).
//! 2. Walk the checkpoints in path order, skipping satisfied ones; mark any
//!    within `threshold` of the cursor.  Under [`OrderPolicy::Lenient`] any
//!    unsatisfied checkpoint may be taken; under [`OrderPolicy::Strict`] only
//!    the earliest unsatisfied one.
//! 3. When all checkpoints are satisfied, emit the completion and hold the
//!    satisfied set for `reset_delay` seconds (advanced by [`PathMatcher::tick`])
//!    so the same gesture cannot re-trigger, then clear it.
//!
//! An unknown spell or a path without checkpoints leaves the matcher inert.

use std::collections::{BTreeSet, VecDeque};

use glam::{Vec2, Vec3};
use spell_paths::SpellPath;
use tracing::{debug, info};

pub mod landmarks;

pub use landmarks::{
    fingertip_cursor, HandLandmarks, Handedness, Keypoint, LandmarkSample,
    INDEX_FINGER_TIP, KEYPOINT_COUNT,
};

/// Half-size of the world plane (`z = 0`) the normalized screen maps onto.
pub const WORLD_HALF_EXTENT: Vec2 = Vec2::new(4.0, 3.0);

// ════════════════════════════════════════════════════════════════════════════
// Configuration
// ════════════════════════════════════════════════════════════════════════════

/// Which threshold applies.  Exam ("ghost") mode has no guide on screen and
/// demands a tighter radius.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Guided,
    Exam,
}

/// Whether checkpoints must be taken in the order the path lists them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Any unsatisfied checkpoint within reach counts.
    #[default]
    Lenient,
    /// Only the earliest unsatisfied checkpoint counts.
    Strict,
}

/// Where a completed cast originates in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CastOrigin {
    Fixed(Vec3),
    /// Project the cursor onto the `z = 0` world plane.
    Cursor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    pub guided_threshold: f32,
    pub exam_threshold:   f32,
    pub trail_capacity:   usize,
    /// Seconds the completed set is held before it clears.
    pub reset_delay:      f32,
    pub order:            OrderPolicy,
    pub origin:           CastOrigin,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            guided_threshold: 0.08,
            exam_threshold:   0.05,
            trail_capacity:   32,
            reset_delay:      0.6,
            order:            OrderPolicy::Lenient,
            origin:           CastOrigin::Fixed(Vec3::ZERO),
        }
    }
}

/// Map a normalized cursor (`y` down) onto the world plane (`y` up).
pub fn cursor_to_world(cursor: Vec2) -> Vec3 {
    Vec3::new(
        (cursor.x - 0.5) * 2.0 * WORLD_HALF_EXTENT.x,
        (0.5 - cursor.y) * 2.0 * WORLD_HALF_EXTENT.y,
        0.0,
    )
}

// ════════════════════════════════════════════════════════════════════════════
// CastCompleted
// ════════════════════════════════════════════════════════════════════════════

/// Emitted once per full traversal of the active path.
#[derive(Clone, Debug, PartialEq)]
pub struct CastCompleted {
    pub spell_id: String,
    pub origin:   Vec3,
}

// ════════════════════════════════════════════════════════════════════════════
// MatchSession
// ════════════════════════════════════════════════════════════════════════════

/// Progress of one attempt at the active spell.
#[derive(Clone, Debug, Default)]
pub struct MatchSession {
    cursor:     Option<Vec2>,
    satisfied:  BTreeSet<usize>,
    trail:      VecDeque<Vec2>,
    started_at: f64,
}

impl MatchSession {
    fn restart(&mut self, now: f64) {
        self.satisfied.clear();
        self.trail.clear();
        self.started_at = now;
    }

    /// Last known cursor; kept across restarts.
    pub fn cursor(&self) -> Option<Vec2> { self.cursor }
    /// Satisfied point indices, ascending.
    pub fn satisfied(&self) -> &BTreeSet<usize> { &self.satisfied }
    /// Recent cursor positions, most recent last.
    pub fn trail(&self) -> &VecDeque<Vec2> { &self.trail }
    pub fn started_at(&self) -> f64 { self.started_at }
}

// ════════════════════════════════════════════════════════════════════════════
// PathMatcher
// ════════════════════════════════════════════════════════════════════════════

pub struct PathMatcher {
    config:      MatchConfig,
    mode:        MatchMode,
    path:        Option<SpellPath>,
    /// Checkpoint indices of `path`, cached at activation.
    checkpoints: Vec<usize>,
    session:     MatchSession,
    /// Seconds left before a completed set clears.
    cooldown:    Option<f32>,
}

impl PathMatcher {
    pub fn new(config: MatchConfig) -> Self {
        PathMatcher {
            config,
            mode:        MatchMode::Guided,
            path:        None,
            checkpoints: Vec::new(),
            session:     MatchSession::default(),
            cooldown:    None,
        }
    }

    // ── session control ──────────────────────────────────────────────────

    /// Make `path` the active spell, discarding any progress.  `None` (an
    /// unknown spell) leaves the matcher inert.
    pub fn activate(&mut self, path: Option<&SpellPath>, now: f64) {
        self.path = path.cloned();
        self.checkpoints = self.path.as_ref()
            .map(SpellPath::checkpoint_indices)
            .unwrap_or_default();
        self.cooldown = None;
        self.session.restart(now);
        match &self.path {
            Some(p) => debug!(spell = %p.id, checkpoints = self.checkpoints.len(), "matcher activated"),
            None    => debug!("matcher inert"),
        }
    }

    /// Clear satisfied checkpoints and trail, keeping the active spell.
    pub fn reset_session(&mut self, now: f64) {
        self.cooldown = None;
        self.session.restart(now);
    }

    pub fn set_mode(&mut self, mode: MatchMode) {
        if self.mode != mode {
            debug!(?mode, "match mode changed");
            self.mode = mode;
        }
    }

    // ── input ────────────────────────────────────────────────────────────

    /// Feed one perception frame.  Frames captured before the current
    /// session began are dropped; frames with no hand keep the last cursor.
    pub fn on_landmarks(&mut self, sample: &LandmarkSample) -> Option<CastCompleted> {
        if self.path.is_none() { return None; }
        if sample.timestamp < self.session.started_at {
            debug!(ts = sample.timestamp, "dropping sample from a previous session");
            return None;
        }
        let cursor = fingertip_cursor(sample)?;
        self.on_cursor_sample(cursor)
    }

    /// Feed the latest normalized cursor position.
    pub fn on_cursor_sample(&mut self, position: Vec2) -> Option<CastCompleted> {
        let path = self.path.as_ref()?;
        if !position.is_finite() { return None; }

        self.session.cursor = Some(position);
        self.session.trail.push_back(position);
        while self.session.trail.len() > self.config.trail_capacity {
            self.session.trail.pop_front();
        }

        if self.cooldown.is_some() || self.checkpoints.is_empty() {
            return None;
        }

        let threshold = self.threshold();
        for &idx in &self.checkpoints {
            if self.session.satisfied.contains(&idx) { continue; }
            let p = &path.points[idx];
            let hit = position.distance(Vec2::new(p.x, p.y)) < threshold;
            if hit {
                self.session.satisfied.insert(idx);
                debug!(spell = %path.id, checkpoint = idx, "checkpoint satisfied");
            } else if self.config.order == OrderPolicy::Strict {
                break;
            }
        }

        if self.session.satisfied.len() < self.checkpoints.len() {
            return None;
        }

        let origin = match self.config.origin {
            CastOrigin::Fixed(o) => o,
            CastOrigin::Cursor   => cursor_to_world(position),
        };
        info!(spell = %path.id, ?origin, "cast completed");
        let event = CastCompleted { spell_id: path.id.clone(), origin };

        if self.config.reset_delay > 0.0 {
            self.cooldown = Some(self.config.reset_delay);
        } else {
            self.session.satisfied.clear();
        }
        Some(event)
    }

    /// Advance the post-completion hold by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        match self.cooldown.as_mut() {
            Some(remaining) => {
                *remaining -= dt.max(0.0);
                if *remaining > 0.0 { return; }
            }
            None => return,
        }
        self.cooldown = None;
        self.session.satisfied.clear();
    }

    // ── projections ──────────────────────────────────────────────────────

    pub fn active_path(&self) -> Option<&SpellPath> { self.path.as_ref() }
    pub fn active_id(&self) -> Option<&str> { self.path.as_ref().map(|p| p.id.as_str()) }
    pub fn session(&self) -> &MatchSession { &self.session }
    pub fn cursor(&self) -> Option<Vec2> { self.session.cursor }
    pub fn satisfied(&self) -> &BTreeSet<usize> { &self.session.satisfied }
    pub fn trail(&self) -> &VecDeque<Vec2> { &self.session.trail }
    pub fn mode(&self) -> MatchMode { self.mode }
    pub fn config(&self) -> &MatchConfig { &self.config }
    pub fn is_cooling_down(&self) -> bool { self.cooldown.is_some() }

    pub fn threshold(&self) -> f32 {
        match self.mode {
            MatchMode::Guided => self.config.guided_threshold,
            MatchMode::Exam   => self.config.exam_threshold,
        }
    }

    /// Fraction of checkpoints satisfied, 0.0 when inert.
    pub fn progress(&self) -> f32 {
        if self.checkpoints.is_empty() { return 0.0; }
        self.session.satisfied.len() as f32 / self.checkpoints.len() as f32
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use spell_paths::{PathPoint, PathRegistry};

    fn path(points: Vec<PathPoint>) -> SpellPath {
        SpellPath {
            id:          "test".into(),
            name:        "Test".into(),
            incantation: String::new(),
            description: String::new(),
            color:       0xFFFFFFFF,
            points,
            curve:       vec![],
        }
    }

    fn diagonal() -> SpellPath {
        path(vec![
            PathPoint::checkpoint(0.2, 0.8, "a"),
            PathPoint::checkpoint(0.8, 0.2, "b"),
        ])
    }

    fn matcher_on(p: &SpellPath) -> PathMatcher {
        let mut m = PathMatcher::new(MatchConfig::default());
        m.activate(Some(p), 0.0);
        m
    }

    fn feed(m: &mut PathMatcher, pts: &[(f32, f32)]) -> usize {
        pts.iter()
            .filter_map(|&(x, y)| m.on_cursor_sample(Vec2::new(x, y)))
            .count()
    }

    #[test]
    fn diagonal_scenario() {
        let p = diagonal();
        let mut m = matcher_on(&p);
        assert!(m.on_cursor_sample(Vec2::new(0.2, 0.8)).is_none());
        assert!(m.on_cursor_sample(Vec2::new(0.5, 0.5)).is_none());
        let done = m.on_cursor_sample(Vec2::new(0.8, 0.2));
        assert_eq!(done, Some(CastCompleted { spell_id: "test".into(), origin: Vec3::ZERO }));
        assert_eq!(m.satisfied().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn partial_traversal_emits_nothing() {
        let reg = PathRegistry::builtin();
        let protego = reg.lookup("protego").unwrap();
        let mut m = matcher_on(protego);
        let hits = feed(&mut m, &[(0.5, 0.2), (0.8, 0.5), (0.5, 0.8)]);
        assert_eq!(hits, 0);
        assert_eq!(m.satisfied().len(), 3);
        assert!((m.progress() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn every_builtin_completes_once_per_traversal() {
        let reg = PathRegistry::builtin();
        for p in reg.iter() {
            let mut m = matcher_on(p);
            let visits: Vec<(f32, f32)> = p.points.iter()
                .filter(|pt| pt.checkpoint)
                .map(|pt| (pt.x, pt.y))
                .collect();
            assert_eq!(feed(&mut m, &visits), 1, "{} should cast once", p.id);
            // Replaying while the completed set is held does nothing.
            assert_eq!(feed(&mut m, &visits), 0, "{} re-triggered", p.id);
            m.tick(1.0);
            assert!(m.satisfied().is_empty());
            assert_eq!(feed(&mut m, &visits), 1, "{} second traversal", p.id);
        }
    }

    #[test]
    fn satisfied_set_never_shrinks_until_reset() {
        let p = diagonal();
        let mut m = matcher_on(&p);
        m.on_cursor_sample(Vec2::new(0.2, 0.8));
        for _ in 0..20 {
            m.on_cursor_sample(Vec2::new(0.5, 0.95));
            m.tick(0.016);
            assert!(m.satisfied().contains(&0));
        }
        m.reset_session(1.0);
        assert!(m.satisfied().is_empty());
    }

    #[test]
    fn cooldown_holds_then_clears() {
        let p = diagonal();
        let mut m = matcher_on(&p);
        feed(&mut m, &[(0.2, 0.8), (0.8, 0.2)]);
        assert!(m.is_cooling_down());
        m.tick(0.3);
        assert_eq!(m.satisfied().len(), 2);
        m.tick(0.31);
        assert!(!m.is_cooling_down());
        assert!(m.satisfied().is_empty());
    }

    #[test]
    fn zero_delay_clears_immediately() {
        let p = diagonal();
        let mut m = PathMatcher::new(MatchConfig { reset_delay: 0.0, ..MatchConfig::default() });
        m.activate(Some(&p), 0.0);
        assert_eq!(feed(&mut m, &[(0.2, 0.8), (0.8, 0.2)]), 1);
        assert!(m.satisfied().is_empty());
        assert!(!m.is_cooling_down());
    }

    #[test]
    fn inert_without_path() {
        let mut m = PathMatcher::new(MatchConfig::default());
        m.activate(None, 0.0);
        assert_eq!(feed(&mut m, &[(0.2, 0.8), (0.8, 0.2)]), 0);
        assert_eq!(m.cursor(), None);
        assert!(m.trail().is_empty());
        assert_eq!(m.progress(), 0.0);
    }

    #[test]
    fn zero_checkpoint_path_never_completes() {
        let p = path(vec![PathPoint::via(0.5, 0.5), PathPoint::via(0.6, 0.6)]);
        let mut m = matcher_on(&p);
        assert_eq!(feed(&mut m, &[(0.5, 0.5), (0.6, 0.6), (0.1, 0.1)]), 0);
        assert!(m.satisfied().is_empty());
        assert_eq!(m.cursor(), Some(Vec2::new(0.1, 0.1)));
    }

    #[test]
    fn via_points_are_ignored() {
        let reg = PathRegistry::builtin();
        let descendo = reg.lookup("descendo").unwrap();
        let mut m = matcher_on(descendo);
        assert_eq!(feed(&mut m, &[(0.5, 0.2), (0.5, 0.8)]), 1);
        assert!(!m.satisfied().contains(&1));
    }

    #[test]
    fn exam_threshold_is_stricter() {
        let p = diagonal();
        let near = Vec2::new(0.2 + 0.06, 0.8);

        let mut guided = matcher_on(&p);
        guided.on_cursor_sample(near);
        assert!(guided.satisfied().contains(&0));

        let mut exam = matcher_on(&p);
        exam.set_mode(MatchMode::Exam);
        exam.on_cursor_sample(near);
        assert!(exam.satisfied().is_empty());
        assert!(exam.threshold() < guided.threshold());
    }

    #[test]
    fn lenient_accepts_out_of_order() {
        let p = diagonal();
        let mut m = matcher_on(&p);
        assert_eq!(feed(&mut m, &[(0.8, 0.2), (0.2, 0.8)]), 1);
    }

    #[test]
    fn strict_rejects_out_of_order() {
        let p = diagonal();
        let mut m = PathMatcher::new(MatchConfig { order: OrderPolicy::Strict, ..MatchConfig::default() });
        m.activate(Some(&p), 0.0);
        assert_eq!(feed(&mut m, &[(0.8, 0.2)]), 0);
        assert!(m.satisfied().is_empty());
        assert_eq!(feed(&mut m, &[(0.2, 0.8), (0.8, 0.2)]), 1);
    }

    #[test]
    fn overlapping_checkpoints_in_one_sample() {
        let p = path(vec![
            PathPoint::checkpoint(0.50, 0.50, "a"),
            PathPoint::checkpoint(0.52, 0.50, "b"),
        ]);
        let mut m = matcher_on(&p);
        assert_eq!(feed(&mut m, &[(0.51, 0.50)]), 1);
    }

    #[test]
    fn trail_is_bounded_most_recent_last() {
        let p = diagonal();
        let mut m = PathMatcher::new(MatchConfig { trail_capacity: 4, ..MatchConfig::default() });
        m.activate(Some(&p), 0.0);
        for i in 0..10 {
            m.on_cursor_sample(Vec2::new(i as f32 / 10.0, 0.5));
        }
        assert_eq!(m.trail().len(), 4);
        assert_eq!(m.trail().back(), Some(&Vec2::new(0.9, 0.5)));
    }

    #[test]
    fn landmarks_mirror_and_absent_hand_keeps_cursor() {
        let p = diagonal();
        let mut m = matcher_on(&p);
        // Raw 0.8 mirrors to display 0.2.
        m.on_landmarks(&LandmarkSample::fingertip(0.1, 0.8, 0.8));
        assert!(m.satisfied().contains(&0));
        let before = m.cursor();
        m.on_landmarks(&LandmarkSample::no_hands(0.2));
        assert_eq!(m.cursor(), before);
    }

    #[test]
    fn stale_samples_are_dropped() {
        let p = diagonal();
        let mut m = PathMatcher::new(MatchConfig::default());
        m.activate(Some(&p), 5.0);
        assert!(m.on_landmarks(&LandmarkSample::fingertip(4.9, 0.8, 0.8)).is_none());
        assert!(m.satisfied().is_empty());
        m.on_landmarks(&LandmarkSample::fingertip(5.1, 0.8, 0.8));
        assert!(m.satisfied().contains(&0));
    }

    #[test]
    fn switching_spell_discards_progress() {
        let reg = PathRegistry::builtin();
        let p = diagonal();
        let mut m = matcher_on(&p);
        m.on_cursor_sample(Vec2::new(0.2, 0.8));
        m.activate(reg.lookup("lumos"), 1.0);
        assert!(m.satisfied().is_empty());
        assert_eq!(m.active_id(), Some("lumos"));
    }

    #[test]
    fn cursor_origin_projects_onto_world_plane() {
        let p = diagonal();
        let mut m = PathMatcher::new(MatchConfig { origin: CastOrigin::Cursor, ..MatchConfig::default() });
        m.activate(Some(&p), 0.0);
        m.on_cursor_sample(Vec2::new(0.2, 0.8));
        let done = m.on_cursor_sample(Vec2::new(0.8, 0.2)).unwrap();
        let expected = cursor_to_world(Vec2::new(0.8, 0.2));
        assert!((done.origin - expected).length() < 1e-5);
        assert!(done.origin.x > 0.0 && done.origin.y > 0.0);
    }
}
