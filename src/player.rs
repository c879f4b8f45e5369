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
use std::{fmt, sync::Arc};

use thiserror::Error;
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::{
    assets::Assets,
    audio,
    instrument::Instrument,
    sequencer::{Sequence, Sequencer},
    util::filename_display,
};

/// Where the controller is in its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// The controller is still binding its instrument and device.
    Idle,
    /// The instrument is bound. A sequence may be armed but nothing is playing.
    Loaded,
    /// A sequence is playing.
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loaded => write!(f, "loaded"),
            PlaybackState::Playing => write!(f, "playing"),
        }
    }
}

/// Failures the controller recovers from. They are logged and handed to the
/// diagnostics hook, never returned.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("unable to load {resource}: {reason}")]
    ResourceLoad { resource: String, reason: String },

    #[error("unable to start audio device {device}: {reason}")]
    DeviceStart { device: String, reason: String },

    #[error("no bundled asset named {0}")]
    AssetNotFound(String),

    #[error("unable to start playback of {sequence}: {reason}")]
    Transport { sequence: String, reason: String },
}

/// Receives every failure the controller recovers from.
pub type Diagnostics = Box<dyn Fn(&PlaybackError) + Send + Sync>;

/// How the instrument is bound at construction.
#[derive(Clone, Debug, Default)]
pub struct Binding {
    pub bank: u8,
    pub preset: u8,
    /// A sequence to arm, but not play, once the instrument is bound.
    pub initial_sequence: Option<String>,
}

/// Owns the instrument, the output device and the sequencer for its whole lifetime.
pub struct PlaybackController {
    device: Arc<dyn audio::Device>,
    instrument: Arc<dyn Instrument>,
    assets: Assets,
    sequencer: Sequencer,
    state: PlaybackState,
    diagnostics: Option<Diagnostics>,
    span: Span,
}

impl PlaybackController {
    /// Binds the device to the instrument and loads the sound font. Never fails:
    /// a missing sound font leaves the instrument silent and a device that won't
    /// start is left inert.
    pub fn new(
        device: Arc<dyn audio::Device>,
        instrument: Arc<dyn Instrument>,
        assets: Assets,
        binding: Binding,
        diagnostics: Option<Diagnostics>,
    ) -> PlaybackController {
        let mut controller = PlaybackController {
            sequencer: Sequencer::new(instrument.clone()),
            device,
            instrument,
            assets,
            state: PlaybackState::Idle,
            diagnostics,
            span: span!(Level::INFO, "playback controller"),
        };

        {
            let span = controller.span.clone();
            let _enter = span.enter();

            controller.load_instrument(binding.bank, binding.preset);
            if let Some(name) = binding.initial_sequence.as_deref() {
                if let Some(sequence) = controller.load_sequence(name) {
                    controller.sequencer.load(sequence);
                }
            }
            controller.start_device();
        }

        controller.state = PlaybackState::Loaded;
        controller
    }

    fn load_instrument(&self, bank: u8, preset: u8) {
        let result = self.assets.sound_font().and_then(|path| {
            self.instrument
                .load_sound_font(&path, bank, preset)
                .map(|_| path)
        });

        match result {
            Ok(path) => info!(
                sound_font = filename_display(&path),
                instrument = self.instrument.to_string(),
                "Instrument bound."
            ),
            Err(e) => self.report(PlaybackError::ResourceLoad {
                resource: "sound font".to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn start_device(&self) {
        match self.device.start(self.instrument.clone()) {
            Ok(()) => info!(device = self.device.to_string(), "Audio device started."),
            Err(e) => self.report(PlaybackError::DeviceStart {
                device: self.device.name().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Resolves and parses a bundled sequence.
    fn load_sequence(&self, name: &str) -> Option<Sequence> {
        let path = match self.assets.resolve(name) {
            Some(path) => path,
            None => {
                self.report(PlaybackError::AssetNotFound(name.to_string()));
                return None;
            }
        };

        match Sequence::load(name, &path) {
            Ok(sequence) => Some(sequence),
            Err(e) => {
                self.report(PlaybackError::ResourceLoad {
                    resource: filename_display(&path).to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn start_sequencer(&mut self) {
        match self.sequencer.play() {
            Ok(true) => {}
            Ok(false) => debug!("No sequence armed."),
            Err(e) => {
                let sequence = self
                    .sequencer
                    .sequence()
                    .map(|sequence| sequence.name().to_string())
                    .unwrap_or_default();
                self.report(PlaybackError::Transport {
                    sequence,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Replaces the current sequence with the named asset and plays it from the
    /// start. An unknown or unreadable asset changes nothing.
    pub fn load_and_play(&mut self, name: &str) {
        let span = self.span.clone();
        let _enter = span.enter();

        let sequence = match self.load_sequence(name) {
            Some(sequence) => sequence,
            None => return,
        };

        self.sequencer.load(sequence);
        self.start_sequencer();
    }

    /// Halts playback and parks the transport at the start. The sequence stays armed.
    pub fn stop(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();

        self.sequencer.preroll();
    }

    /// Plays the armed sequence from the start. Does nothing if no sequence is armed.
    pub fn play(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.sequencer.sequence().is_none() {
            debug!("No sequence armed, ignoring play.");
            return;
        }
        self.sequencer.preroll();
        self.start_sequencer();
    }

    pub fn state(&self) -> PlaybackState {
        match self.state {
            PlaybackState::Loaded if self.sequencer.is_playing() => PlaybackState::Playing,
            state => state,
        }
    }

    /// The name of the armed sequence.
    pub fn current_sequence(&self) -> Option<&str> {
        self.sequencer.sequence().map(|sequence| sequence.name())
    }

    pub fn device_running(&self) -> bool {
        self.device.is_running()
    }

    /// Ticks played since the armed sequence last started.
    pub fn position(&self) -> u32 {
        self.sequencer.position()
    }

    fn report(&self, err: PlaybackError) {
        match err {
            PlaybackError::AssetNotFound(_) => warn!(err = err.to_string(), "Ignoring request."),
            _ => error!(err = err.to_string(), "Playback failure."),
        }

        if let Some(diagnostics) = self.diagnostics.as_ref() {
            diagnostics(&err);
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, sync::Arc};

    use parking_lot::Mutex;

    use crate::{
        assets::Assets,
        audio,
        instrument::{self, mock},
        testutil::{asset_dir_with_hold, eventually, SOUND_FONT, TICKS_PER_BEAT},
    };

    use super::{Binding, Diagnostics, PlaybackController, PlaybackError, PlaybackState};

    /// Long enough that a sequence is still playing when the test looks at it.
    const LONG_HOLD: u32 = TICKS_PER_BEAT as u32 * 20;

    struct Harness {
        _dir: tempfile::TempDir,
        instrument: Arc<mock::Instrument>,
        errors: Arc<Mutex<Vec<String>>>,
        controller: PlaybackController,
    }

    fn harness(
        device: &str,
        sound_font: &str,
        initial_sequence: Option<&str>,
    ) -> Result<Harness, Box<dyn Error>> {
        let dir = asset_dir_with_hold(&["E", "C", "Cm", "Am"], LONG_HOLD)?;
        let instrument = Arc::new(mock::Instrument::new(44100));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let diagnostics: Diagnostics = {
            let errors = errors.clone();
            Box::new(move |err: &PlaybackError| {
                errors.lock().push(format!("{:?}", err));
            })
        };

        let controller = PlaybackController::new(
            audio::get_device(device),
            instrument.clone(),
            Assets::new(dir.path(), sound_font),
            Binding {
                bank: 0,
                preset: 4,
                initial_sequence: initial_sequence.map(str::to_string),
            },
            Some(diagnostics),
        );

        Ok(Harness {
            _dir: dir,
            instrument,
            errors,
            controller,
        })
    }

    #[test]
    fn test_construct() -> Result<(), Box<dyn Error>> {
        let h = harness("mock-device", SOUND_FONT, None)?;

        assert_eq!(PlaybackState::Loaded, h.controller.state());
        assert!(h.controller.device_running());
        assert_eq!(None, h.controller.current_sequence());
        let (_, bank, preset) = h.instrument.sound_font().ok_or("no sound font")?;
        assert_eq!((0, 4), (bank, preset));
        assert!(h.errors.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_construct_missing_sound_font() -> Result<(), Box<dyn Error>> {
        let h = harness("mock-device", "missing.sf2", None)?;

        assert_eq!(PlaybackState::Loaded, h.controller.state());
        assert!(h.controller.device_running());
        assert!(h.instrument.sound_font().is_none());
        let errors = h.errors.lock().clone();
        assert_eq!(1, errors.len());
        assert!(errors[0].starts_with("ResourceLoad"));
        Ok(())
    }

    #[test]
    fn test_corrupt_sound_font_is_not_fatal() -> Result<(), Box<dyn Error>> {
        let dir = asset_dir_with_hold(&["E"], TICKS_PER_BEAT as u32)?;
        fs::write(dir.path().join("bad.sf2"), b"RIFF\x04\0\0\0sfbk")?;
        let errors = Arc::new(Mutex::new(Vec::new()));
        let diagnostics: Diagnostics = {
            let errors = errors.clone();
            Box::new(move |err: &PlaybackError| {
                errors.lock().push(format!("{:?}", err));
            })
        };

        let mut controller = PlaybackController::new(
            audio::get_device("mock-device"),
            instrument::sampler(44100, 0.5)?,
            Assets::new(dir.path(), "bad.sf2"),
            Binding::default(),
            Some(diagnostics),
        );

        assert_eq!(PlaybackState::Loaded, controller.state());
        assert!(controller.device_running());
        let reported = errors.lock().clone();
        assert_eq!(1, reported.len());
        assert!(reported[0].starts_with("ResourceLoad"));

        // The instrument stays usable without a font.
        controller.load_and_play("E");
        assert_eq!(Some("E"), controller.current_sequence());
        Ok(())
    }

    #[test]
    fn test_device_start_failure_is_not_fatal() -> Result<(), Box<dyn Error>> {
        let mut h = harness("mock-fail", SOUND_FONT, None)?;

        assert!(!h.controller.device_running());
        assert!(h.errors.lock()[0].starts_with("DeviceStart"));

        // Playback still runs, it just isn't heard.
        h.controller.load_and_play("E");
        assert_eq!(PlaybackState::Playing, h.controller.state());
        eventually(|| h.instrument.struck(60), "Chord never struck");
        Ok(())
    }

    #[test]
    fn test_initial_sequence_is_armed() -> Result<(), Box<dyn Error>> {
        let mut h = harness("mock-device", SOUND_FONT, Some("C"))?;

        assert_eq!(Some("C"), h.controller.current_sequence());
        assert_eq!(PlaybackState::Loaded, h.controller.state());
        assert!(h.instrument.events().is_empty());

        h.controller.play();
        assert_eq!(PlaybackState::Playing, h.controller.state());
        eventually(|| h.instrument.struck(60), "Chord never struck");
        Ok(())
    }

    #[test]
    fn test_load_and_play() -> Result<(), Box<dyn Error>> {
        let mut h = harness("mock-device", SOUND_FONT, None)?;

        h.controller.load_and_play("E");
        assert_eq!(Some("E"), h.controller.current_sequence());
        assert_eq!(PlaybackState::Playing, h.controller.state());
        eventually(|| h.instrument.struck(60), "Chord never struck");
        Ok(())
    }

    #[test]
    fn test_stop_is_idempotent() -> Result<(), Box<dyn Error>> {
        let mut h = harness("mock-device", SOUND_FONT, None)?;

        // Stopping with nothing loaded is fine.
        h.controller.stop();
        assert_eq!(PlaybackState::Loaded, h.controller.state());

        h.controller.load_and_play("Am");
        eventually(|| h.instrument.struck(60), "Chord never struck");

        h.controller.stop();
        let silenced = h.instrument.silenced();
        let events = h.instrument.events().len();
        assert_eq!(PlaybackState::Loaded, h.controller.state());
        assert_eq!(0, h.controller.position());

        h.controller.stop();
        assert_eq!(PlaybackState::Loaded, h.controller.state());
        assert_eq!(Some("Am"), h.controller.current_sequence());
        assert_eq!(0, h.controller.position());
        assert_eq!(silenced, h.instrument.silenced());
        assert_eq!(events, h.instrument.events().len());
        Ok(())
    }

    #[test]
    fn test_stop_then_play_restarts() -> Result<(), Box<dyn Error>> {
        let mut h = harness("mock-device", SOUND_FONT, None)?;

        h.controller.load_and_play("C");
        eventually(|| h.instrument.struck(60), "Chord never struck");
        h.controller.stop();
        h.instrument.clear_events();

        h.controller.play();
        assert_eq!(PlaybackState::Playing, h.controller.state());
        assert_eq!(Some("C"), h.controller.current_sequence());
        eventually(|| h.instrument.struck(60), "Chord never struck again");
        Ok(())
    }

    #[test]
    fn test_play_without_sequence() -> Result<(), Box<dyn Error>> {
        let mut h = harness("mock-device", SOUND_FONT, None)?;

        h.controller.play();
        assert_eq!(PlaybackState::Loaded, h.controller.state());
        assert!(h.instrument.events().is_empty());
        assert!(h.errors.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_asset_changes_nothing() -> Result<(), Box<dyn Error>> {
        let mut h = harness("mock-device", SOUND_FONT, None)?;

        h.controller.load_and_play("C");
        eventually(|| h.instrument.struck(60), "Chord never struck");
        let silenced = h.instrument.silenced();

        h.controller.load_and_play("H");
        assert_eq!(Some("C"), h.controller.current_sequence());
        assert_eq!(PlaybackState::Playing, h.controller.state());
        assert_eq!(silenced, h.instrument.silenced());
        assert_eq!(
            vec!["AssetNotFound(\"H\")".to_string()],
            h.errors.lock().clone()
        );
        Ok(())
    }

    #[test]
    fn test_load_and_play_replaces_sequence() -> Result<(), Box<dyn Error>> {
        let mut h = harness("mock-device", SOUND_FONT, None)?;

        h.controller.load_and_play("E");
        eventually(|| h.instrument.struck(60), "Chord never struck");
        assert_eq!(0, h.instrument.silenced());

        h.controller.load_and_play("Cm");
        assert_eq!(1, h.instrument.silenced());
        assert_eq!(Some("Cm"), h.controller.current_sequence());
        assert_eq!(PlaybackState::Playing, h.controller.state());
        Ok(())
    }
}
