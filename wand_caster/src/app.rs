//! Top-level application state machine.
//!
//! `AppState` owns the path matcher, the burst simulator and the tutor, and
//! wires them together through the [`CastBus`].  Input arrives as
//! [`InputEvent`]s; each frame the state is ticked once and projected into a
//! [`FrameView`] for the visualizer.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;

use glam::{Vec2, Vec3};
use spell_burst::{BurstSimulator, ParticleView};
use spell_matcher::{cursor_to_world, CastOrigin, LandmarkSample, MatchMode, PathMatcher};
use spell_paths::{PathError, PathRegistry};
use spell_tutor::{LearningStage, SpellStatus, Transition, Tutor, PRACTICE_PASSES};
use tracing::{debug, info, warn};

use crate::bus::{CastBus, CastEvent, CastSource};
use crate::chime::{Chime, ChimeSettings};
use crate::config::CasterConfig;
use crate::perception::{
    spawn_perception_source, ControlEvent, InputEvent, SimPerceptionSource,
};
use crate::visualizer::Visualizer;
use crate::AppError;

/// Longest step a single tick may simulate; longer stalls are clamped.
const MAX_DT: f32 = 0.25;
/// Seconds the demonstration ghost takes to trace the whole path.
const DEMO_SECS: f32 = 2.5;

// ════════════════════════════════════════════════════════════════════════════
// Mode / Launch
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode { FreePlay, Teaching }

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::FreePlay => "free play",
            Mode::Teaching => "teaching",
        }
    }
}

/// Command-line choices that shape the first frame.
#[derive(Debug, Clone, Default)]
pub struct Launch {
    pub initial_spell: Option<String>,
    pub teach:         bool,
}

/// Builtin spells plus any authored in the config file.
pub fn build_registry(cfg: &CasterConfig) -> Result<PathRegistry, PathError> {
    let mut registry = PathRegistry::builtin();
    for spell in &cfg.spells {
        registry.register(spell.clone())?;
        info!(spell = %spell.id, "custom spell registered");
    }
    Ok(registry)
}

// ════════════════════════════════════════════════════════════════════════════
// FrameView: immutable per-frame snapshot
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct GuidePoint {
    pub at:         Vec2,
    pub checkpoint: bool,
    pub satisfied:  bool,
    pub label:      Option<String>,
}

/// The active path as drawn under the cursor.
#[derive(Clone, Debug, PartialEq)]
pub struct GuideView {
    pub color:  u32,
    pub curve:  Vec<Vec2>,
    pub points: Vec<GuidePoint>,
    /// Match radius in normalized units.
    pub radius: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpellBadge {
    pub name:     String,
    pub status:   SpellStatus,
    pub selected: bool,
}

#[derive(Clone, Debug)]
pub struct FrameView {
    pub particles:   Vec<ParticleView>,
    /// Hidden during the exam.
    pub guide:       Option<GuideView>,
    pub cursor:      Option<Vec2>,
    pub trail:       Vec<Vec2>,
    /// Ghost fingertip animating the path during demonstration.
    pub ghost:       Option<Vec2>,
    pub spell_name:  String,
    pub incantation: String,
    pub mode:        Mode,
    pub stage:       Option<LearningStage>,
    /// `(successes, required)` while practising.
    pub practice:    Option<(u32, u32)>,
    pub progress:    f32,
    pub spells:      Vec<SpellBadge>,
    pub status:      String,
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    // ── spell data ───────────────────────────────────────────────────────
    registry: PathRegistry,
    /// Curriculum ids; `selected` indexes into it.
    order:    Vec<String>,
    selected: usize,

    // ── engines ──────────────────────────────────────────────────────────
    matcher:  PathMatcher,
    burst:    BurstSimulator,
    tutor:    Tutor,

    // ── cast fan-out ─────────────────────────────────────────────────────
    bus:      CastBus,
    burst_rx: Receiver<CastEvent>,
    tutor_rx: Receiver<CastEvent>,
    chime:    Option<Chime>,

    // ── session ──────────────────────────────────────────────────────────
    mode:     Mode,
    /// Session clock at the last tick, seconds.
    clock:    f64,
    /// Session time of the newest control event; may run ahead of `clock`.
    input_at: f64,
    demo_t:   f32,
    casts:    u64,

    pub status: String,
}

impl AppState {
    pub fn new(cfg: &CasterConfig, registry: PathRegistry, launch: Launch) -> Result<Self, AppError> {
        let order = cfg.curriculum_ids(&registry)?;
        let tutor = Tutor::new(order.iter().map(|id| {
            let name = registry.lookup(id).map_or_else(|| id.clone(), |p| p.name.clone());
            (id.clone(), name)
        }));

        let burst = match cfg.burst.seed {
            Some(seed) => BurstSimulator::with_seed(cfg.burst.max_live, seed),
            None       => BurstSimulator::new(cfg.burst.max_live),
        };

        let mut bus  = CastBus::new();
        let burst_rx = bus.subscribe("burst");
        let tutor_rx = bus.subscribe("tutor");
        let chime = cfg.chime.enabled
            .then(|| Chime::spawn(ChimeSettings::from(&cfg.chime), bus.subscribe("chime")));

        let selected = match launch.initial_spell.as_deref() {
            Some(id) => order.iter().position(|o| o == id).unwrap_or_else(|| {
                warn!(spell = id, "requested spell not in curriculum, starting at the top");
                0
            }),
            None => 0,
        };

        let mut app = AppState {
            registry,
            order,
            selected,
            matcher: PathMatcher::new(cfg.matcher.to_match_config()),
            burst,
            tutor,
            bus,
            burst_rx,
            tutor_rx,
            chime,
            mode:   if launch.teach { Mode::Teaching } else { Mode::FreePlay },
            clock:  0.0,
            input_at: 0.0,
            demo_t: 0.0,
            casts:  0,
            status: String::new(),
        };
        app.select_index(selected);
        info!(mode = app.mode.label(), spell = %app.selected_id(), "wand caster ready");
        Ok(app)
    }

    // ── input ─────────────────────────────────────────────────────────────

    /// Feed one perception frame to the matcher; a completed trace is
    /// published on the cast bus.
    pub fn on_sample(&mut self, sample: &LandmarkSample) {
        if let Some(done) = self.matcher.on_landmarks(sample) {
            self.bus.publish(CastEvent {
                spell_id: done.spell_id,
                origin:   done.origin,
                source:   CastSource::Gesture,
            });
        }
    }

    /// Apply a control event that arrived at session time `now`.  Any
    /// matcher session it starts ignores samples taken before `now`.
    pub fn handle_control(&mut self, event: ControlEvent, now: f64) {
        self.input_at = self.input_at.max(now);
        match event {
            ControlEvent::SelectSpell(i) => self.select_index(i),
            ControlEvent::NextSpell => {
                let n = self.order.len();
                self.select_index((self.selected + 1) % n);
            }
            ControlEvent::PrevSpell => {
                let n = self.order.len();
                self.select_index((self.selected + n - 1) % n);
            }
            ControlEvent::ToggleTeaching => {
                self.mode = match self.mode {
                    Mode::FreePlay => Mode::Teaching,
                    Mode::Teaching => Mode::FreePlay,
                };
                info!(mode = self.mode.label(), "mode switched");
                match self.mode {
                    Mode::Teaching => {
                        self.status = "Teaching".to_string();
                        let t = self.tutor.begin_lesson();
                        self.apply_transition(t);
                    }
                    Mode::FreePlay => {
                        self.tutor.end_lesson();
                        self.status = "Free play".to_string();
                    }
                }
                self.refresh_matcher();
            }
            ControlEvent::Advance => {
                if self.mode != Mode::Teaching { return; }
                let t = match self.tutor.session() {
                    None    => self.tutor.begin_lesson(),
                    Some(_) => self.tutor.advance(),
                };
                self.apply_transition(t);
            }
            ControlEvent::TriggerCast => self.trigger_cast(),
            ControlEvent::ForceMaster => {
                let t = self.tutor.force_master();
                self.apply_transition(t);
            }
            ControlEvent::Quit => {}
        }
    }

    /// Select the `index`-th curriculum spell.  Out-of-range indices are
    /// ignored.
    pub fn select_index(&mut self, index: usize) {
        let Some(id) = self.order.get(index).cloned() else {
            debug!(index, "no spell at that slot");
            return;
        };
        self.selected = index;
        self.tutor.select(&id);
        self.demo_t = 0.0;

        let name = self.display_name(&id);
        self.status = match self.tutor.status(&id) {
            Some(SpellStatus::Locked) => format!("{name} is locked"),
            _                         => format!("Selected {name}"),
        };
        if self.mode == Mode::Teaching && self.tutor.session().is_none() {
            let t = self.tutor.begin_lesson();
            self.apply_transition(t);
        }
        self.refresh_matcher();
    }

    fn trigger_cast(&mut self) {
        let Some(id) = self.matcher.active_id().map(str::to_string) else {
            self.status = format!("{} cannot be cast yet", self.display_name(self.selected_id()));
            return;
        };
        let origin = match self.matcher.config().origin {
            CastOrigin::Fixed(o) => o,
            CastOrigin::Cursor   => self.matcher.cursor().map_or(Vec3::ZERO, cursor_to_world),
        };
        self.bus.publish(CastEvent { spell_id: id, origin, source: CastSource::Trigger });
    }

    // ── lesson plumbing ───────────────────────────────────────────────────

    /// Point the matcher at the selected spell if it may be cast, in the
    /// threshold mode the lesson stage calls for.
    fn refresh_matcher(&mut self) {
        let id = self.selected_id().to_string();
        let mode = match self.tutor.stage() {
            Some(LearningStage::Exam) => MatchMode::Exam,
            _                         => MatchMode::Guided,
        };
        self.matcher.set_mode(mode);
        let path = if self.tutor.is_castable(&id) { self.registry.lookup(&id) } else { None };
        self.matcher.activate(path, self.clock.max(self.input_at));
    }

    fn apply_transition(&mut self, t: Transition) {
        match t {
            Transition::None => return,
            Transition::Began { spell } => {
                self.demo_t = 0.0;
                self.status = format!("Watch {}, then press Enter", self.display_name(&spell));
            }
            Transition::EnteredPractice => {
                self.status = format!("Practice: trace it {PRACTICE_PASSES} times");
            }
            Transition::PracticeProgress { successes } => {
                self.status = format!("Practice {successes}/{PRACTICE_PASSES}");
                return;
            }
            Transition::EnteredExam => {
                self.status = "Exam: trace it from memory".to_string();
            }
            Transition::Mastered { spell, unlocked } => {
                let name = self.display_name(&spell);
                self.status = match &unlocked {
                    Some(next) => format!("{name} learned! {} unlocked", self.display_name(next)),
                    None       => format!("{name} learned!"),
                };
                if self.mode == Mode::Teaching {
                    if let Some(i) = unlocked.and_then(|n| self.order.iter().position(|o| *o == n)) {
                        let status = std::mem::take(&mut self.status);
                        self.select_index(i);
                        self.status = status;
                        return;
                    }
                }
            }
        }
        self.refresh_matcher();
    }

    // ── per-frame tick ────────────────────────────────────────────────────

    /// Advance everything to session time `now` (seconds).
    pub fn tick(&mut self, now: f64) {
        let dt = ((now - self.clock) as f32).clamp(0.0, MAX_DT);
        self.clock = self.clock.max(now);

        self.matcher.tick(dt);

        while let Ok(cast) = self.burst_rx.try_recv() {
            self.burst.spawn(&cast.spell_id, cast.origin);
        }
        while let Ok(cast) = self.tutor_rx.try_recv() {
            self.casts += 1;
            if self.mode == Mode::FreePlay {
                self.status = format!("{}!", self.incantation(&cast.spell_id));
            }
            let t = self.tutor.on_cast(&cast.spell_id);
            self.apply_transition(t);
        }

        self.burst.tick(dt);

        if self.tutor.stage() == Some(LearningStage::Demonstration) {
            self.demo_t = (self.demo_t + dt / DEMO_SECS).fract();
        }
    }

    // ── projection ────────────────────────────────────────────────────────

    pub fn frame(&self) -> FrameView {
        let id = self.selected_id();
        let path = self.registry.lookup(id);
        let stage = self.tutor.stage();

        let guide = match (self.matcher.active_path(), stage) {
            (_, Some(LearningStage::Exam)) | (None, _) => None,
            (Some(p), _) => Some(GuideView {
                color:  p.color,
                curve:  p.curve.iter().map(|&[x, y]| Vec2::new(x, y)).collect(),
                points: p.points.iter().enumerate().map(|(i, pt)| GuidePoint {
                    at:         Vec2::new(pt.x, pt.y),
                    checkpoint: pt.checkpoint,
                    satisfied:  self.matcher.satisfied().contains(&i),
                    label:      pt.label.clone(),
                }).collect(),
                radius: self.matcher.threshold(),
            }),
        };

        let ghost = match (stage, path) {
            (Some(LearningStage::Demonstration), Some(p)) =>
                p.trace_at(self.demo_t).map(|(x, y)| Vec2::new(x, y)),
            _ => None,
        };

        let practice = self.tutor.session()
            .filter(|s| s.stage == LearningStage::Practice)
            .map(|s| (s.practice_successes, PRACTICE_PASSES));

        let spells = self.tutor.records().iter().enumerate()
            .map(|(i, r)| SpellBadge {
                name:     r.name.clone(),
                status:   r.status,
                selected: i == self.selected,
            })
            .collect();

        FrameView {
            particles:   self.burst.snapshot(),
            guide,
            cursor:      self.matcher.cursor(),
            trail:       self.matcher.trail().iter().copied().collect(),
            ghost,
            spell_name:  self.display_name(id),
            incantation: self.incantation(id),
            mode:        self.mode,
            stage,
            practice,
            progress:    self.matcher.progress(),
            spells,
            status:      self.status.clone(),
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn selected_id(&self) -> &str { &self.order[self.selected] }
    pub fn mode(&self)        -> Mode { self.mode }
    pub fn tutor(&self)       -> &Tutor { &self.tutor }
    pub fn matcher(&self)     -> &PathMatcher { &self.matcher }
    pub fn burst(&self)       -> &BurstSimulator { &self.burst }
    pub fn cast_count(&self)  -> u64 { self.casts }

    fn display_name(&self, id: &str) -> String {
        self.registry.lookup(id).map_or_else(|| id.to_string(), |p| p.name.clone())
    }

    fn incantation(&self, id: &str) -> String {
        match self.registry.lookup(id) {
            Some(p) if !p.incantation.is_empty() => p.incantation.clone(),
            _ => self.display_name(id),
        }
    }

    /// Stop background threads.
    pub fn shutdown(mut self) {
        if let Some(chime) = self.chime.take() { chime.quit(); }
        info!(casts = self.casts, "wand caster shut down");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Open the window and drive input, simulation and rendering until quit.
pub fn run(cfg: &CasterConfig, registry: PathRegistry, launch: Launch) -> Result<(), AppError> {
    let epoch = Instant::now();

    let (sim_tx, sim_rx)     = mpsc::channel();
    let (input_tx, input_rx) = mpsc::channel();
    spawn_perception_source(SimPerceptionSource::new(sim_rx, epoch), input_tx.clone());
    #[cfg(feature = "leap")]
    spawn_perception_source(crate::perception::LeapPerceptionSource { epoch }, input_tx.clone());
    drop(input_tx);

    let mut vis = Visualizer::new(&cfg.window, sim_tx)?;
    let mut app = AppState::new(cfg, registry, launch)?;

    'frames: while vis.is_open() {
        if !vis.poll_input() { break; }

        // Only the newest landmark frame matters; older ones are stale.
        let mut latest = None;
        loop {
            match input_rx.try_recv() {
                Ok(InputEvent::Landmarks(s))                => latest = Some(s),
                Ok(InputEvent::Control(ControlEvent::Quit)) => break 'frames,
                Ok(InputEvent::Control(c))                  => {
                    app.handle_control(c, epoch.elapsed().as_secs_f64());
                }
                Err(TryRecvError::Empty)                    => break,
                Err(TryRecvError::Disconnected)             => break 'frames,
            }
        }
        if let Some(sample) = latest { app.on_sample(&sample); }

        app.tick(epoch.elapsed().as_secs_f64());
        vis.render(&app.frame());
    }

    app.shutdown();
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
