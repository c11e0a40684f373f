//! Input sources: hand landmarks from a tracker plus discrete controls.
//!
//! Everything downstream consumes [`InputEvent`]s from one `mpsc` channel and
//! cannot tell whether a fingertip came from LeapMotion hardware or from the
//! mouse in the simulation window.

use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Instant;

use spell_matcher::LandmarkSample;
use tracing::debug;

// ════════════════════════════════════════════════════════════════════════════
// InputEvent
// ════════════════════════════════════════════════════════════════════════════

/// A discrete command, independent of the device that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// Select the n-th curriculum spell (0-based).
    SelectSpell(usize),
    NextSpell,
    PrevSpell,
    /// Switch between free play and teaching.
    ToggleTeaching,
    /// Move the lesson on (demonstration → practice, or begin a lesson).
    Advance,
    /// Cast the selected spell without tracing it.
    TriggerCast,
    /// Mark the selected spell learned and unlock the next.
    ForceMaster,
    Quit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Landmarks(LandmarkSample),
    Control(ControlEvent),
}

// ════════════════════════════════════════════════════════════════════════════
// PerceptionSource trait
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`InputEvent`]s over a channel.
pub trait PerceptionSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<InputEvent>);
}

/// Run `source` on its own thread, feeding `tx`.  Several sources may share
/// one sender.
pub fn spawn_perception_source<P: PerceptionSource>(source: P, tx: Sender<InputEvent>) {
    thread::spawn(move || Box::new(source).run(tx));
}

// ════════════════════════════════════════════════════════════════════════════
// SimPerceptionSource: mouse + keyboard from the window (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    /// Pointer held down at display-normalized `(x, y)`.
    Pointer { x: f32, y: f32 },
    /// Pointer released or left the play area.
    PointerLost,
    Key(SimKey),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    Digit(u8),  // 1–8
    Left,
    Right,
    Tab,
    Enter,
    Cast,       // C
    Master,     // M
    Quit,       // Q / Escape
}

/// Turns [`SimInput`] from the window into [`InputEvent`]s.
///
/// The pointer stands in for the index fingertip.  It is emitted in raw
/// camera coordinates (mirrored x) so it goes through exactly the same
/// cursor derivation as a tracked hand.
pub struct SimPerceptionSource {
    rx:    Receiver<SimInput>,
    epoch: Instant,
}

impl SimPerceptionSource {
    /// `epoch` is the zero of the session clock shared with the app loop.
    pub fn new(rx: Receiver<SimInput>, epoch: Instant) -> Self {
        SimPerceptionSource { rx, epoch }
    }

    pub fn translate(input: SimInput, timestamp: f64) -> Option<InputEvent> {
        let event = match input {
            SimInput::Pointer { x, y } =>
                InputEvent::Landmarks(LandmarkSample::fingertip(timestamp, 1.0 - x, y)),
            SimInput::PointerLost =>
                InputEvent::Landmarks(LandmarkSample::no_hands(timestamp)),
            SimInput::Key(key) => InputEvent::Control(match key {
                SimKey::Digit(d @ 1..=9) => ControlEvent::SelectSpell(d as usize - 1),
                SimKey::Digit(_)         => return None,
                SimKey::Left             => ControlEvent::PrevSpell,
                SimKey::Right            => ControlEvent::NextSpell,
                SimKey::Tab              => ControlEvent::ToggleTeaching,
                SimKey::Enter            => ControlEvent::Advance,
                SimKey::Cast             => ControlEvent::TriggerCast,
                SimKey::Master           => ControlEvent::ForceMaster,
                SimKey::Quit             => ControlEvent::Quit,
            }),
        };
        Some(event)
    }
}

impl PerceptionSource for SimPerceptionSource {
    fn run(self: Box<Self>, tx: Sender<InputEvent>) {
        for input in self.rx.iter() {
            let ts = self.epoch.elapsed().as_secs_f64();
            let Some(event) = Self::translate(input, ts) else { continue };
            let quit = event == InputEvent::Control(ControlEvent::Quit);
            if tx.send(event).is_err() || quit { return; }
        }
        debug!("simulation input closed");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapPerceptionSource: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Landmark source backed by a LeapMotion controller.
///
/// Each tracking frame is converted into the 21-point hand layout: the palm
/// stands in for the wrist, then knuckle, two inner joints and tip for each
/// digit from thumb to pinky.  Positions are projected onto the interaction
/// box below and expressed as raw camera coordinates, so the mirroring in
/// the cursor derivation lines the cursor up with the hand.
#[cfg(feature = "leap")]
pub struct LeapPerceptionSource {
    pub epoch: Instant,
}

#[cfg(feature = "leap")]
impl PerceptionSource for LeapPerceptionSource {
    fn run(self: Box<Self>, tx: Sender<InputEvent>) {
        use leaprs::*;
        use spell_matcher::{HandLandmarks, Handedness, Keypoint};

        // Interaction box, millimetres above the device.
        const X_HALF: f32 = 200.0;
        const Y_LOW:  f32 = 100.0;
        const Y_HIGH: f32 = 400.0;

        macro_rules! project {
            ($v:expr) => {{
                let v = $v;
                Keypoint {
                    x: 1.0 - (v.x + X_HALF) / (2.0 * X_HALF),
                    y: 1.0 - (v.y - Y_LOW) / (Y_HIGH - Y_LOW),
                    z: v.z / X_HALF,
                }
            }};
        }

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c)  => c,
            Err(e) => { tracing::error!("LeapC connection failed: {e:?}"); return; }
        };
        if let Err(e) = connection.open() {
            tracing::error!("LeapMotion device failed to open: {e:?}");
            return;
        }
        tracing::info!("LeapMotion tracking started");

        let mut had_hand = false;
        loop {
            let msg = match connection.poll(100) {
                Ok(m)  => m,
                Err(_) => continue,
            };
            let Event::Tracking(frame) = msg.event() else { continue };
            let ts = self.epoch.elapsed().as_secs_f64();

            let hands: Vec<HandLandmarks> = frame.hands().map(|hand| {
                let mut keypoints = Vec::with_capacity(spell_matcher::KEYPOINT_COUNT);
                keypoints.push(project!(hand.palm().position()));
                for digit in hand.digits() {
                    keypoints.push(project!(digit.proximal().prev_joint()));
                    keypoints.push(project!(digit.intermediate().prev_joint()));
                    keypoints.push(project!(digit.distal().prev_joint()));
                    keypoints.push(project!(digit.distal().next_joint()));
                }
                let handedness = match hand.hand_type() {
                    HandType::Left  => Handedness::Left,
                    HandType::Right => Handedness::Right,
                };
                HandLandmarks { handedness, keypoints }
            }).collect();

            // Only the first empty frame after a hand leaves is worth sending.
            if hands.is_empty() && !had_hand { continue; }
            had_hand = !hands.is_empty();

            let sample = LandmarkSample { timestamp: ts, hands };
            if tx.send(InputEvent::Landmarks(sample)).is_err() { return; }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use glam::Vec2;
    use spell_matcher::fingertip_cursor;

    #[test]
    fn pointer_round_trips_through_mirroring() {
        let ev = SimPerceptionSource::translate(SimInput::Pointer { x: 0.25, y: 0.6 }, 1.5);
        let Some(InputEvent::Landmarks(sample)) = ev else { panic!("expected landmarks") };
        assert_eq!(sample.timestamp, 1.5);
        assert_eq!(fingertip_cursor(&sample), Some(Vec2::new(0.25, 0.6)));
    }

    #[test]
    fn pointer_lost_is_empty_frame() {
        let ev = SimPerceptionSource::translate(SimInput::PointerLost, 2.0);
        assert_eq!(ev, Some(InputEvent::Landmarks(LandmarkSample::no_hands(2.0))));
    }

    #[test]
    fn digits_select_zero_based() {
        let ev = SimPerceptionSource::translate(SimInput::Key(SimKey::Digit(3)), 0.0);
        assert_eq!(ev, Some(InputEvent::Control(ControlEvent::SelectSpell(2))));
        assert_eq!(SimPerceptionSource::translate(SimInput::Key(SimKey::Digit(0)), 0.0), None);
    }

    #[test]
    fn source_thread_forwards_and_stops_on_quit() {
        let (sim_tx, sim_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();
        spawn_perception_source(SimPerceptionSource::new(sim_rx, Instant::now()), tx);

        sim_tx.send(SimInput::Key(SimKey::Tab)).unwrap();
        sim_tx.send(SimInput::Key(SimKey::Quit)).unwrap();
        let _ = sim_tx.send(SimInput::Key(SimKey::Enter));

        let got: Vec<InputEvent> = rx.iter().collect();
        assert_eq!(got, vec![
            InputEvent::Control(ControlEvent::ToggleTeaching),
            InputEvent::Control(ControlEvent::Quit),
        ]);
    }
}
