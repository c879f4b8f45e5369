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
    error::Error,
    fmt,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use midly::MidiMessage;
use parking_lot::Mutex;
use tracing::info;

/// A mock instrument. Records what it is asked to do and renders silence.
pub struct Instrument {
    sample_rate: u32,
    sound_font: Mutex<Option<(PathBuf, u8, u8)>>,
    events: Mutex<Vec<(u8, MidiMessage)>>,
    silenced: AtomicUsize,
    rendered_frames: AtomicUsize,
}

impl Instrument {
    pub fn new(sample_rate: u32) -> Instrument {
        Instrument {
            sample_rate,
            sound_font: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            silenced: AtomicUsize::new(0),
            rendered_frames: AtomicUsize::new(0),
        }
    }

    /// The loaded sound font with its bank and preset.
    pub fn sound_font(&self) -> Option<(PathBuf, u8, u8)> {
        self.sound_font.lock().clone()
    }

    /// Every message handled so far.
    pub fn events(&self) -> Vec<(u8, MidiMessage)> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Returns true if a note on for the key was handled.
    pub fn struck(&self, key: u8) -> bool {
        self.events.lock().iter().any(|(_, message)| {
            matches!(message, MidiMessage::NoteOn { key: k, vel } if k.as_int() == key && vel.as_int() > 0)
        })
    }

    /// How many times the instrument was silenced.
    pub fn silenced(&self) -> usize {
        self.silenced.load(Ordering::Relaxed)
    }

    pub fn rendered_frames(&self) -> usize {
        self.rendered_frames.load(Ordering::Relaxed)
    }
}

impl super::Instrument for Instrument {
    fn load_sound_font(&self, path: &Path, bank: u8, preset: u8) -> Result<(), Box<dyn Error>> {
        if !path.is_file() {
            return Err(format!("sound font {} does not exist", path.display()).into());
        }

        info!(sound_font = path.display().to_string(), bank, preset, "Loaded sound font (mock).");
        *self.sound_font.lock() = Some((path.to_path_buf(), bank, preset));
        Ok(())
    }

    fn handle(&self, channel: u8, message: MidiMessage) {
        self.events.lock().push((channel, message));
    }

    fn silence(&self) {
        self.silenced.fetch_add(1, Ordering::Relaxed);
    }

    fn render(&self, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        if channels > 0 {
            self.rendered_frames
                .fetch_add(output.len() / channels, Ordering::Relaxed);
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz (Mock)", self.sample_rate)
    }
}
