// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    cmp::min,
    error::Error,
    fmt,
    ops::Add,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use nodi::{Connection, Player, Timer};
use tracing::{error, info, span, Level};

use crate::{
    assets::{parse_midi, MidiSheet},
    instrument::Instrument,
    playsync::CancelHandle,
    util::duration_seconds,
};

/// The most ticks slept at once, so that cancellation is noticed promptly.
const MAX_TICK_SIZE_FOR_SLEEP: u32 = 50;

/// A parsed MIDI sequence, ready to be played.
pub struct Sequence {
    name: String,
    path: PathBuf,
    midi_sheet: Arc<MidiSheet>,
    duration: Duration,
}

impl Sequence {
    /// Parses the MIDI file at the given path.
    pub fn load(name: &str, path: &Path) -> Result<Sequence, Box<dyn Error>> {
        let midi_sheet = parse_midi(path)?;
        let duration = midi_sheet.duration();
        Ok(Sequence {
            name: name.to_string(),
            path: path.to_path_buf(),
            midi_sheet: Arc::new(midi_sheet),
            duration,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, duration_seconds(self.duration))
    }
}

/// A playback in progress.
struct Playback {
    cancel_handle: CancelHandle,
    join_handle: Option<thread::JoinHandle<()>>,
}

/// Plays a loaded sequence into an instrument on a worker thread.
pub struct Sequencer {
    instrument: Arc<dyn Instrument>,
    sequence: Option<Arc<Sequence>>,
    /// Ticks played since the sequence was last started.
    position: Arc<AtomicU32>,
    playback: Option<Playback>,
}

impl Sequencer {
    pub fn new(instrument: Arc<dyn Instrument>) -> Sequencer {
        Sequencer {
            instrument,
            sequence: None,
            position: Arc::new(AtomicU32::new(0)),
            playback: None,
        }
    }

    /// Replaces the loaded sequence, stopping any playback first.
    pub fn load(&mut self, sequence: Sequence) {
        self.stop();
        info!(sequence = sequence.to_string(), "Loaded sequence.");
        self.sequence = Some(Arc::new(sequence));
        self.preroll();
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        self.sequence.as_deref()
    }

    /// Stops any playback and rewinds to the start of the sequence.
    pub fn preroll(&mut self) {
        self.stop();
        self.position.store(0, Ordering::Relaxed);
    }

    /// Starts playing the loaded sequence from the beginning. Returns false if there
    /// is nothing to play. Playing while already playing does nothing.
    pub fn play(&mut self) -> Result<bool, Box<dyn Error>> {
        let sequence = match self.sequence.as_ref() {
            Some(sequence) => sequence.clone(),
            None => return Ok(false),
        };
        if self.is_playing() {
            return Ok(true);
        }
        self.preroll();

        let span = span!(Level::INFO, "play sequence");
        let _enter = span.enter();

        let cancel_handle = CancelHandle::new();
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            let midi_sheet = sequence.midi_sheet.clone();
            let connection = InstrumentConnection {
                instrument: self.instrument.clone(),
                cancel_handle: cancel_handle.clone(),
            };
            let timer = AccurateTimer::new(
                midi_sheet.ticker,
                cancel_handle.clone(),
                self.position.clone(),
            );

            thread::Builder::new()
                .name(format!("sequence-{}", sequence.name()))
                .spawn(move || {
                    let mut player = Player::new(timer, connection);
                    if player.play(&midi_sheet.sheet) {
                        cancel_handle.finish();
                    }
                })?
        };

        info!(
            sequence = sequence.name(),
            duration = duration_seconds(sequence.duration()),
            "Playing sequence."
        );
        self.playback = Some(Playback {
            cancel_handle,
            join_handle: Some(join_handle),
        });
        Ok(true)
    }

    /// Stops playback and releases any sounding notes. Does nothing if not playing.
    pub fn stop(&mut self) {
        let mut playback = match self.playback.take() {
            Some(playback) => playback,
            None => return,
        };

        let was_playing = !playback.cancel_handle.is_done();
        playback.cancel_handle.cancel();
        if let Some(join_handle) = playback.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Sequence thread panicked.");
            }
        }
        self.instrument.silence();

        if was_playing {
            info!(
                position = self.position.load(Ordering::Relaxed),
                "Sequence playback stopped."
            );
        }
    }

    /// Returns true while the worker is still playing the sequence.
    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|playback| !playback.cancel_handle.is_done())
    }

    /// Ticks played since the sequence was last started.
    pub fn position(&self) -> u32 {
        self.position.load(Ordering::Relaxed)
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// AccurateTimer is a timer for the nodi player that allows a more accurate clock. It uses the last
/// known instant to properly calculate the next intended sleep duration, and counts the ticks slept.
struct AccurateTimer<T: Timer> {
    timer: T,
    last_instant: Option<Instant>,
    cancel_handle: CancelHandle,
    position: Arc<AtomicU32>,
}

impl<T: Timer> AccurateTimer<T> {
    fn new(timer: T, cancel_handle: CancelHandle, position: Arc<AtomicU32>) -> AccurateTimer<T> {
        AccurateTimer {
            timer,
            last_instant: None,
            cancel_handle,
            position,
        }
    }
}

impl<T: Timer> Timer for AccurateTimer<T> {
    fn sleep_duration(&mut self, n_ticks: u32) -> Duration {
        let mut duration = self.timer.sleep_duration(n_ticks);

        match self.last_instant {
            Some(last_instant) => {
                self.last_instant = Some(last_instant.add(duration));

                // Subtract the time already spent, unless we're running behind.
                duration = match duration.checked_sub(Instant::now().duration_since(last_instant)) {
                    Some(duration) => duration,
                    None => duration,
                };
            }
            None => self.last_instant = Some(Instant::now()),
        };

        duration
    }

    fn change_tempo(&mut self, tempo: u32) {
        self.timer.change_tempo(tempo);
    }

    fn sleep(&mut self, n_ticks: u32) {
        // Sleep in chunks of MAX_TICK_SIZE_FOR_SLEEP or less.
        let mut remaining_ticks = n_ticks;
        while remaining_ticks > 0 {
            if self.cancel_handle.is_cancelled() {
                return;
            }

            let num_ticks = min(remaining_ticks, MAX_TICK_SIZE_FOR_SLEEP);
            self.timer.sleep(num_ticks);
            self.position.fetch_add(num_ticks, Ordering::Relaxed);
            remaining_ticks -= num_ticks;
        }
    }
}

/// A nodi connection that feeds an instrument and can be cancelled.
struct InstrumentConnection {
    instrument: Arc<dyn Instrument>,
    cancel_handle: CancelHandle,
}

impl Connection for InstrumentConnection {
    fn play(&mut self, event: nodi::MidiEvent) -> bool {
        if self.cancel_handle.is_cancelled() {
            return false;
        };

        self.instrument.handle(event.channel.as_int(), event.message);
        true
    }
}
