//! # spell_tutor
//!
//! Teaches the curriculum one spell at a time.
//!
//! ## Stages
//!
//! ```text
//!            begin_lesson           advance            3 casts            1 cast
//!  (none) ───────────────▶ Demonstration ───────▶ Practice ───────▶ Exam ───────▶ (none)
//!                                                                                │
//!                                               status Learning → Learned,       │
//!                                               next spell Locked → Learning  ◀──┘
//! ```
//!
//! Only a spell whose status is `Learning` can start a lesson.  Casts of any
//! other spell, casts while no lesson runs, and casts during the
//! demonstration leave the state untouched.  [`Tutor::force_master`] applies
//! the exam-success outcome directly.

use tracing::{debug, info, warn};

/// Casts needed in practice before the exam opens.
pub const PRACTICE_PASSES: u32 = 3;

// ════════════════════════════════════════════════════════════════════════════
// Records and sessions
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpellStatus { Locked, Learning, Learned }

impl SpellStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked   => "locked",
            Self::Learning => "learning",
            Self::Learned  => "learned",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpellRecord {
    pub id:     String,
    pub name:   String,
    pub status: SpellStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LearningStage { Demonstration, Practice, Exam }

impl LearningStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demonstration => "demonstration",
            Self::Practice      => "practice",
            Self::Exam          => "exam",
        }
    }
}

/// The lesson in progress.
#[derive(Clone, Debug, PartialEq)]
pub struct LearningSession {
    pub spell_id:           String,
    pub stage:              LearningStage,
    pub practice_successes: u32,
}

/// What an operation changed, for the UI to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    None,
    Began { spell: String },
    EnteredPractice,
    PracticeProgress { successes: u32 },
    EnteredExam,
    Mastered { spell: String, unlocked: Option<String> },
}

// ════════════════════════════════════════════════════════════════════════════
// Tutor
// ════════════════════════════════════════════════════════════════════════════

pub struct Tutor {
    /// Curriculum order.
    records: Vec<SpellRecord>,
    current: Option<String>,
    session: Option<LearningSession>,
}

impl Tutor {
    /// Build from `(id, name)` pairs in curriculum order.  The first spell
    /// starts as `Learning`, the rest `Locked`.  Repeated ids are dropped.
    pub fn new<I, A, B>(curriculum: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut records: Vec<SpellRecord> = Vec::new();
        for (id, name) in curriculum {
            let id = id.into();
            if records.iter().any(|r| r.id == id) {
                warn!(spell = %id, "duplicate curriculum entry dropped");
                continue;
            }
            let status = if records.is_empty() { SpellStatus::Learning } else { SpellStatus::Locked };
            records.push(SpellRecord { id, name: name.into(), status });
        }
        Tutor { records, current: None, session: None }
    }

    // ── selection ────────────────────────────────────────────────────────

    /// Make `id` the player's current spell.  Switching away from the spell
    /// being taught discards the lesson.  Unknown ids are ignored.
    pub fn select(&mut self, id: &str) -> bool {
        if self.record(id).is_none() {
            warn!(spell = id, "select: not in curriculum");
            return false;
        }
        if self.current.as_deref() != Some(id) {
            self.current = Some(id.to_string());
            if self.session.as_ref().is_some_and(|s| s.spell_id != id) {
                info!(spell = id, "lesson discarded by spell change");
                self.session = None;
            }
        }
        true
    }

    /// Start teaching the current spell.  Requires status `Learning` and no
    /// lesson already running.
    pub fn begin_lesson(&mut self) -> Transition {
        let Some(id) = self.current.clone() else { return Transition::None };
        if self.session.is_some() || self.status(&id) != Some(SpellStatus::Learning) {
            return Transition::None;
        }
        info!(spell = %id, "lesson begins");
        self.session = Some(LearningSession {
            spell_id:           id.clone(),
            stage:              LearningStage::Demonstration,
            practice_successes: 0,
        });
        Transition::Began { spell: id }
    }

    /// Abandon the running lesson without changing any status.
    pub fn end_lesson(&mut self) {
        if let Some(s) = self.session.take() {
            info!(spell = %s.spell_id, stage = s.stage.as_str(), "lesson ended");
        }
    }

    // ── stage transitions ────────────────────────────────────────────────

    /// Player-triggered move from demonstration to practice.
    pub fn advance(&mut self) -> Transition {
        match self.session.as_mut() {
            Some(s) if s.stage == LearningStage::Demonstration => {
                s.stage = LearningStage::Practice;
                s.practice_successes = 0;
                info!(spell = %s.spell_id, "practice begins");
                Transition::EnteredPractice
            }
            _ => Transition::None,
        }
    }

    /// React to a completed cast of `spell_id`.
    pub fn on_cast(&mut self, spell_id: &str) -> Transition {
        let Some(s) = self.session.as_mut() else {
            debug!(spell = spell_id, "cast ignored: no lesson");
            return Transition::None;
        };
        if s.spell_id != spell_id {
            debug!(spell = spell_id, lesson = %s.spell_id, "cast ignored: other spell");
            return Transition::None;
        }
        match s.stage {
            LearningStage::Demonstration => Transition::None,
            LearningStage::Practice => {
                s.practice_successes += 1;
                if s.practice_successes >= PRACTICE_PASSES {
                    s.stage = LearningStage::Exam;
                    info!(spell = spell_id, "exam begins");
                    Transition::EnteredExam
                } else {
                    Transition::PracticeProgress { successes: s.practice_successes }
                }
            }
            LearningStage::Exam => self.master(spell_id),
        }
    }

    /// Debug override: treat the lesson (or the current `Learning` spell when
    /// no lesson runs) as passed.
    pub fn force_master(&mut self) -> Transition {
        let target = match (&self.session, &self.current) {
            (Some(s), _) => s.spell_id.clone(),
            (None, Some(id)) if self.status(id) == Some(SpellStatus::Learning) => id.clone(),
            _ => return Transition::None,
        };
        warn!(spell = %target, "mastery forced");
        self.master(&target)
    }

    fn master(&mut self, id: &str) -> Transition {
        if let Some(r) = self.records.iter_mut().find(|r| r.id == id) {
            r.status = SpellStatus::Learned;
        }
        self.session = None;
        let unlocked = self.unlock_next(id);
        info!(spell = id, unlocked = ?unlocked, "spell mastered");
        Transition::Mastered { spell: id.to_string(), unlocked }
    }

    /// Move the spell after `id` in curriculum order from `Locked` to
    /// `Learning`.  Returns the unlocked id; `None` for the last spell or one
    /// already unlocked.
    pub fn unlock_next(&mut self, id: &str) -> Option<String> {
        let pos = self.records.iter().position(|r| r.id == id)?;
        let next = self.records.get_mut(pos + 1)?;
        if next.status != SpellStatus::Locked { return None; }
        next.status = SpellStatus::Learning;
        Some(next.id.clone())
    }

    // ── projections ──────────────────────────────────────────────────────

    pub fn records(&self) -> &[SpellRecord] { &self.records }
    pub fn record(&self, id: &str) -> Option<&SpellRecord> {
        self.records.iter().find(|r| r.id == id)
    }
    pub fn status(&self, id: &str) -> Option<SpellStatus> { self.record(id).map(|r| r.status) }
    pub fn current(&self) -> Option<&str> { self.current.as_deref() }
    pub fn session(&self) -> Option<&LearningSession> { self.session.as_ref() }
    pub fn stage(&self) -> Option<LearningStage> { self.session.as_ref().map(|s| s.stage) }

    /// Free play only lets the player cast spells that are not locked.
    pub fn is_castable(&self, id: &str) -> bool {
        matches!(self.status(id), Some(SpellStatus::Learning | SpellStatus::Learned))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn tutor() -> Tutor {
        Tutor::new([("lumos", "Lumos"), ("accio", "Accio"), ("protego", "Protego")])
    }

    fn in_practice() -> Tutor {
        let mut t = tutor();
        t.select("lumos");
        t.begin_lesson();
        t.advance();
        t
    }

    #[test]
    fn initial_statuses() {
        let t = tutor();
        assert_eq!(t.status("lumos"),   Some(SpellStatus::Learning));
        assert_eq!(t.status("accio"),   Some(SpellStatus::Locked));
        assert_eq!(t.status("protego"), Some(SpellStatus::Locked));
        assert_eq!(t.stage(), None);
    }

    #[test]
    fn duplicate_ids_dropped() {
        let t = Tutor::new([("a", "A"), ("b", "B"), ("a", "A again")]);
        assert_eq!(t.records().len(), 2);
    }

    #[test]
    fn locked_spell_does_not_start_lesson() {
        let mut t = tutor();
        assert!(t.select("accio"));
        assert_eq!(t.begin_lesson(), Transition::None);
        assert_eq!(t.stage(), None);
        assert!(!t.is_castable("accio"));
    }

    #[test]
    fn unknown_spell_selection_ignored() {
        let mut t = tutor();
        assert!(!t.select("avada"));
        assert_eq!(t.current(), None);
    }

    #[test]
    fn lesson_starts_in_demonstration() {
        let mut t = tutor();
        t.select("lumos");
        assert_eq!(t.begin_lesson(), Transition::Began { spell: "lumos".into() });
        assert_eq!(t.stage(), Some(LearningStage::Demonstration));
        // Already running: no restart.
        assert_eq!(t.begin_lesson(), Transition::None);
    }

    #[test]
    fn demonstration_ignores_casts() {
        let mut t = tutor();
        t.select("lumos");
        t.begin_lesson();
        assert_eq!(t.on_cast("lumos"), Transition::None);
        assert_eq!(t.stage(), Some(LearningStage::Demonstration));
    }

    #[test]
    fn three_practice_casts_open_exam() {
        let mut t = in_practice();
        assert_eq!(t.stage(), Some(LearningStage::Practice));
        assert_eq!(t.on_cast("lumos"), Transition::PracticeProgress { successes: 1 });
        assert_eq!(t.on_cast("lumos"), Transition::PracticeProgress { successes: 2 });
        assert_eq!(t.on_cast("lumos"), Transition::EnteredExam);
        assert_eq!(t.stage(), Some(LearningStage::Exam));
    }

    #[test]
    fn fourth_cast_is_exam_success_not_reentry() {
        let mut t = in_practice();
        for _ in 0..3 { t.on_cast("lumos"); }
        let tr = t.on_cast("lumos");
        assert_eq!(tr, Transition::Mastered { spell: "lumos".into(), unlocked: Some("accio".into()) });
        assert_eq!(t.status("lumos"), Some(SpellStatus::Learned));
        assert_eq!(t.status("accio"), Some(SpellStatus::Learning));
        assert_eq!(t.stage(), None);
    }

    #[test]
    fn other_spell_casts_do_not_count() {
        let mut t = in_practice();
        for _ in 0..5 {
            assert_eq!(t.on_cast("protego"), Transition::None);
        }
        assert_eq!(t.session().unwrap().practice_successes, 0);
        assert_eq!(t.stage(), Some(LearningStage::Practice));
    }

    #[test]
    fn cast_without_lesson_ignored() {
        let mut t = tutor();
        assert_eq!(t.on_cast("lumos"), Transition::None);
        assert_eq!(t.status("lumos"), Some(SpellStatus::Learning));
    }

    #[test]
    fn force_master_from_any_stage() {
        let mut t = tutor();
        t.select("lumos");
        t.begin_lesson();
        assert!(matches!(t.force_master(), Transition::Mastered { .. }));
        assert_eq!(t.status("lumos"), Some(SpellStatus::Learned));
        assert_eq!(t.status("accio"), Some(SpellStatus::Learning));
        assert_eq!(t.stage(), None);
    }

    #[test]
    fn force_master_without_lesson_needs_learning_spell() {
        let mut t = tutor();
        t.select("accio");
        assert_eq!(t.force_master(), Transition::None);
        t.select("lumos");
        assert!(matches!(t.force_master(), Transition::Mastered { .. }));
    }

    #[test]
    fn unlocking_last_spell_is_noop() {
        let mut t = tutor();
        assert_eq!(t.unlock_next("protego"), None);
        assert_eq!(t.unlock_next("avada"), None);
        t.select("lumos");
        t.force_master();
        t.select("accio");
        t.force_master();
        t.select("protego");
        let tr = t.force_master();
        assert_eq!(tr, Transition::Mastered { spell: "protego".into(), unlocked: None });
        assert!(t.records().iter().all(|r| r.status == SpellStatus::Learned));
    }

    #[test]
    fn switching_spell_discards_lesson() {
        let mut t = tutor();
        t.unlock_next("lumos");
        t.select("lumos");
        t.begin_lesson();
        t.advance();
        t.on_cast("lumos");
        t.select("accio");
        assert_eq!(t.stage(), None);
        // Back again: fresh lesson, counter reset.
        t.select("lumos");
        t.begin_lesson();
        t.advance();
        assert_eq!(t.session().unwrap().practice_successes, 0);
    }

    #[test]
    fn reselecting_same_spell_keeps_lesson() {
        let mut t = in_practice();
        t.on_cast("lumos");
        t.select("lumos");
        assert_eq!(t.session().unwrap().practice_successes, 1);
    }

    #[test]
    fn advance_only_from_demonstration() {
        let mut t = in_practice();
        assert_eq!(t.advance(), Transition::None);
        let mut t = tutor();
        assert_eq!(t.advance(), Transition::None);
    }
}
