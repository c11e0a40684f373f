//! MIDI chime thread: a short arpeggio for every cast.
//!
//! The thread is one more cast-bus subscriber.  It never touches simulation
//! state; a missing synthesiser only costs the sound.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bus::{CastEvent, CastSource};
use crate::config::ChimeSection;

// ════════════════════════════════════════════════════════════════════════════
// ChimeCommand
// ════════════════════════════════════════════════════════════════════════════

pub enum ChimeCommand {
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// MidiOut: abstraction over midir / null
// ════════════════════════════════════════════════════════════════════════════

pub trait MidiOut: Send {
    fn program_change(&mut self, channel: u8, program: u8);
    fn note_on(&mut self,  channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8);
}

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn program_change(&mut self, channel: u8, program: u8) {
        let _ = self.conn.send(&[0xC0 | (channel & 0x0F), program & 0x7F]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let _ = self.conn.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        let _ = self.conn.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0]);
    }
}

pub struct NullOut;

impl MidiOut for NullOut {
    fn program_change(&mut self, _ch: u8, _p: u8)  {}
    fn note_on(&mut self, _ch: u8, _n: u8, _v: u8) {}
    fn note_off(&mut self, _ch: u8, _n: u8)        {}
}

/// Open the first MIDI output port, preferring a software synth.
/// Falls back to [`NullOut`] with a warning.
pub fn open_midi_output() -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("wand_caster") {
        Ok(m)  => m,
        Err(e) => {
            warn!("MIDI init error: {e}; chimes muted");
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports; chimes muted (try `timidity -iA` or `fluidsynth`)");
        return Box::new(NullOut);
    }

    let port = ports.iter()
        .find(|p| {
            midi_out.port_name(p).map(|n| {
                let n = n.to_lowercase();
                n.contains("fluid") || n.contains("timidity") || n.contains("synth")
            }).unwrap_or(false)
        })
        .unwrap_or(&ports[0]);
    let name = midi_out.port_name(port).unwrap_or_else(|_| "unknown".to_string());

    match midi_out.connect(port, "wand-chime") {
        Ok(conn) => {
            info!(port = %name, "MIDI chime output opened");
            Box::new(MidirOut { conn })
        }
        Err(e) => {
            warn!(port = %name, "MIDI connect failed: {e}; chimes muted");
            Box::new(NullOut)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Notes
// ════════════════════════════════════════════════════════════════════════════

/// Per-spell arpeggio, in play order.
const ARPEGGIOS: &[(&str, [u8; 3])] = &[
    ("lumos",              [72, 76, 79]),
    ("descendo",           [67, 63, 60]),
    ("accio",              [67, 71, 74]),
    ("wingardium_leviosa", [65, 69, 72]),
    ("incendio",           [62, 66, 69]),
    ("protego",            [57, 60, 64]),
    ("expelliarmus",       [64, 67, 71]),
    ("stupefy",            [59, 62, 65]),
];

const FALLBACK_ARPEGGIO: [u8; 3] = [60, 64, 67];

/// Arpeggio notes for `spell`.  Spells without a row get C major.
pub fn chime_notes(spell: &str) -> [u8; 3] {
    ARPEGGIOS.iter()
        .find(|(id, _)| *id == spell)
        .map_or(FALLBACK_ARPEGGIO, |(_, notes)| *notes)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChimeSettings {
    pub program:  u8,
    pub velocity: u8,
    pub channel:  u8,
    pub note_ms:  u64,
}

impl From<&ChimeSection> for ChimeSettings {
    fn from(s: &ChimeSection) -> Self {
        ChimeSettings {
            program:  s.program,
            velocity: s.velocity,
            channel:  s.channel,
            note_ms:  s.note_ms,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Chime: handle to the thread
// ════════════════════════════════════════════════════════════════════════════

pub struct Chime {
    cmd_tx: Sender<ChimeCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Chime {
    /// Spawn the chime thread on the system MIDI output.
    pub fn spawn(settings: ChimeSettings, casts: Receiver<CastEvent>) -> Self {
        Self::spawn_with(settings, casts, open_midi_output)
    }

    /// Spawn with a custom output; `open` runs on the chime thread.
    pub fn spawn_with<F>(settings: ChimeSettings, casts: Receiver<CastEvent>, open: F) -> Self
    where
        F: FnOnce() -> Box<dyn MidiOut> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let handle = thread::spawn(move || chime_thread(open(), settings, cmd_rx, casts));
        Chime { cmd_tx, handle: Some(handle) }
    }

    /// Stop the thread and wait for it.
    pub fn quit(mut self) {
        let _ = self.cmd_tx.send(ChimeCommand::Quit);
        self.join_inner();
    }

    /// Wait for the thread to finish on its own (cast bus disconnected).
    pub fn join(mut self) {
        self.join_inner();
    }

    fn join_inner(&mut self) {
        if let Some(h) = self.handle.take() {
            if h.join().is_err() { warn!("chime thread panicked"); }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// chime_thread
// ════════════════════════════════════════════════════════════════════════════

fn chime_thread(
    mut midi:     Box<dyn MidiOut>,
    settings:     ChimeSettings,
    cmd_rx:       Receiver<ChimeCommand>,
    casts:        Receiver<CastEvent>,
) {
    let ChimeSettings { channel, velocity, note_ms, .. } = settings;
    midi.program_change(channel, settings.program);

    loop {
        loop {
            match cmd_rx.try_recv() {
                Ok(ChimeCommand::Quit) => return,
                Err(_)                 => break,
            }
        }

        let cast = match casts.try_recv() {
            Ok(c) => c,
            Err(TryRecvError::Empty) => {
                thread::sleep(Duration::from_millis(10));
                continue;
            }
            Err(TryRecvError::Disconnected) => {
                debug!("cast bus closed, chime thread exiting");
                return;
            }
        };

        // Triggered casts ring a little softer than traced ones.
        let vel = match cast.source {
            CastSource::Gesture => velocity,
            CastSource::Trigger => (u16::from(velocity) * 3 / 4) as u8,
        };
        for n in chime_notes(&cast.spell_id) {
            midi.note_on(channel, n, vel);
            thread::sleep(Duration::from_millis(note_ms));
            midi.note_off(channel, n);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    enum Msg { Program(u8), On(u8, u8), Off(u8) }

    struct Recorder(Arc<Mutex<Vec<Msg>>>);

    impl MidiOut for Recorder {
        fn program_change(&mut self, _ch: u8, p: u8) { self.0.lock().unwrap().push(Msg::Program(p)); }
        fn note_on(&mut self, _ch: u8, n: u8, v: u8) { self.0.lock().unwrap().push(Msg::On(n, v)); }
        fn note_off(&mut self, _ch: u8, n: u8)       { self.0.lock().unwrap().push(Msg::Off(n)); }
    }

    fn settings() -> ChimeSettings {
        ChimeSettings { program: 11, velocity: 100, channel: 0, note_ms: 1 }
    }

    #[test]
    fn each_cast_plays_its_arpeggio() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        let sink = Recorder(Arc::clone(&log));
        let chime = Chime::spawn_with(settings(), rx, move || Box::new(sink));

        tx.send(CastEvent { spell_id: "lumos".into(), origin: Vec3::ZERO, source: CastSource::Gesture })
            .unwrap();
        drop(tx);
        chime.join();

        let log = log.lock().unwrap();
        assert_eq!(log[0], Msg::Program(11));
        assert_eq!(&log[1..], &[
            Msg::On(72, 100), Msg::Off(72),
            Msg::On(76, 100), Msg::Off(76),
            Msg::On(79, 100), Msg::Off(79),
        ]);
    }

    #[test]
    fn trigger_rings_softer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        let sink = Recorder(Arc::clone(&log));
        let chime = Chime::spawn_with(settings(), rx, move || Box::new(sink));

        tx.send(CastEvent { spell_id: "unknown".into(), origin: Vec3::ZERO, source: CastSource::Trigger })
            .unwrap();
        drop(tx);
        chime.join();

        assert!(log.lock().unwrap().contains(&Msg::On(60, 75)));
    }

    #[test]
    fn every_builtin_spell_has_its_own_arpeggio() {
        let registry = spell_paths::PathRegistry::builtin();
        for id in registry.ids() {
            assert_ne!(chime_notes(id), FALLBACK_ARPEGGIO, "{id} has no arpeggio");
        }
        let mut rows: Vec<[u8; 3]> = ARPEGGIOS.iter().map(|(_, n)| *n).collect();
        rows.sort_unstable();
        rows.dedup();
        assert_eq!(rows.len(), ARPEGGIOS.len());
    }

    #[test]
    fn quit_stops_thread_while_bus_open() {
        let (_tx, rx) = mpsc::channel::<CastEvent>();
        let chime = Chime::spawn_with(settings(), rx, || Box::new(NullOut));
        chime.quit();
    }
}
