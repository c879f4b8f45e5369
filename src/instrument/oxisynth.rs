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
    fs::File,
    io::Read,
    panic::{self, AssertUnwindSafe},
    path::Path,
};

use midly::MidiMessage;
use oxisynth::{MidiEvent, SoundFont, Synth, SynthDescriptor};
use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use super::MIDI_CHANNELS;
use crate::util::filename_display;

/// Bank select MSB.
const BANK_SELECT: u8 = 0;

/// The RIFF form type of an SF2 file.
const SF2_FORM: &[u8; 4] = b"sfbk";

/// Reads a sound font, refusing files that don't carry an SF2 RIFF header. The
/// underlying parser panics on truncated or malformed chunks, so those panics
/// are turned into errors.
fn read_sound_font(path: &Path) -> Result<SoundFont, Box<dyn Error>> {
    let mut file = File::open(path)?;
    let mut header = [0_u8; 12];
    file.read_exact(&mut header)
        .map_err(|e| format!("unable to read sound font {}: {}", path.display(), e))?;
    if &header[0..4] != b"RIFF" || &header[8..12] != SF2_FORM {
        return Err(format!("{} is not an SF2 sound font", path.display()).into());
    }

    let mut file = File::open(path)?;
    match panic::catch_unwind(AssertUnwindSafe(|| SoundFont::load(&mut file))) {
        Ok(Ok(font)) => Ok(font),
        Ok(Err(e)) => {
            Err(format!("unable to load sound font {}: {:?}", path.display(), e).into())
        }
        Err(_) => Err(format!("sound font {} is malformed", path.display()).into()),
    }
}

/// A sound font sampler backed by oxisynth.
pub struct Sampler {
    synth: Mutex<Synth>,
    sample_rate: u32,
    sound_font: Mutex<Option<String>>,
}

impl Sampler {
    pub fn new(sample_rate: u32, gain: f32) -> Result<Sampler, Box<dyn Error>> {
        let synth = Synth::new(SynthDescriptor {
            sample_rate: sample_rate as f32,
            gain,
            ..Default::default()
        })
        .map_err(|e| format!("unable to create synthesizer: {:?}", e))?;

        Ok(Sampler {
            synth: Mutex::new(synth),
            sample_rate,
            sound_font: Mutex::new(None),
        })
    }
}

/// Converts a MIDI channel message into a synthesizer event. Program changes are
/// dropped so that the preset bound at load time stays in effect.
fn to_synth_event(channel: u8, message: MidiMessage) -> Option<MidiEvent> {
    match message {
        MidiMessage::NoteOff { key, .. } => Some(MidiEvent::NoteOff {
            channel,
            key: key.as_int(),
        }),
        MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Some(MidiEvent::NoteOff {
            channel,
            key: key.as_int(),
        }),
        MidiMessage::NoteOn { key, vel } => Some(MidiEvent::NoteOn {
            channel,
            key: key.as_int(),
            vel: vel.as_int(),
        }),
        MidiMessage::Aftertouch { key, vel } => Some(MidiEvent::PolyphonicKeyPressure {
            channel,
            key: key.as_int(),
            value: vel.as_int(),
        }),
        MidiMessage::Controller { controller, value } => Some(MidiEvent::ControlChange {
            channel,
            ctrl: controller.as_int(),
            value: value.as_int(),
        }),
        MidiMessage::ChannelAftertouch { vel } => Some(MidiEvent::ChannelPressure {
            channel,
            value: vel.as_int(),
        }),
        MidiMessage::PitchBend { bend } => Some(MidiEvent::PitchBend {
            channel,
            value: bend.0.as_int(),
        }),
        MidiMessage::ProgramChange { .. } => None,
    }
}

impl super::Instrument for Sampler {
    fn load_sound_font(&self, path: &Path, bank: u8, preset: u8) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "load sound font");
        let _enter = span.enter();

        let font = read_sound_font(path)?;

        let mut synth = self.synth.lock();
        synth.add_font(font, true);
        for channel in 0..MIDI_CHANNELS {
            synth
                .send_event(MidiEvent::ControlChange {
                    channel,
                    ctrl: BANK_SELECT,
                    value: bank,
                })
                .map_err(|e| format!("unable to select bank {}: {:?}", bank, e))?;
            synth
                .send_event(MidiEvent::ProgramChange {
                    channel,
                    program_id: preset,
                })
                .map_err(|e| format!("unable to select preset {}: {:?}", preset, e))?;
        }

        let name = filename_display(path).to_string();
        info!(sound_font = name, bank, preset, "Loaded sound font.");
        *self.sound_font.lock() = Some(name);
        Ok(())
    }

    fn handle(&self, channel: u8, message: MidiMessage) {
        let event = match to_synth_event(channel, message) {
            Some(event) => event,
            None => {
                debug!(channel, "Ignoring program change.");
                return;
            }
        };

        if let Err(e) = self.synth.lock().send_event(event) {
            warn!(channel, err = format!("{:?}", e), "Synthesizer rejected event.");
        }
    }

    fn silence(&self) {
        let mut synth = self.synth.lock();
        for channel in 0..MIDI_CHANNELS {
            if let Err(e) = synth.send_event(MidiEvent::AllNotesOff { channel }) {
                warn!(channel, err = format!("{:?}", e), "Unable to release notes.");
            }
        }
    }

    fn render(&self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        let mut synth = self.synth.lock();
        for frame in output.chunks_mut(channels) {
            let (left, right) = synth.read_next();
            match frame {
                [mono] => *mono = (left + right) / 2.0,
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sound_font.lock().as_ref() {
            Some(name) => write!(f, "{} ({}Hz)", name, self.sample_rate),
            None => write!(f, "no sound font ({}Hz)", self.sample_rate),
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::fs;

    use midly::num::{u14, u7};
    use midly::{MidiMessage, PitchBend};
    use oxisynth::MidiEvent;

    use super::{to_synth_event, Sampler};
    use crate::instrument::Instrument;

    #[test]
    fn test_to_synth_event() {
        let key = u7::new(60);

        match to_synth_event(3, MidiMessage::NoteOn { key, vel: u7::new(90) }) {
            Some(MidiEvent::NoteOn { channel, key, vel }) => {
                assert_eq!((3, 60, 90), (channel, key, vel))
            }
            _ => panic!("expected note on"),
        }

        // A zero velocity note on is a release.
        match to_synth_event(0, MidiMessage::NoteOn { key, vel: u7::new(0) }) {
            Some(MidiEvent::NoteOff { channel, key }) => assert_eq!((0, 60), (channel, key)),
            _ => panic!("expected note off"),
        }

        match to_synth_event(1, MidiMessage::PitchBend { bend: PitchBend(u14::new(8192)) }) {
            Some(MidiEvent::PitchBend { channel, value }) => assert_eq!((1, 8192), (channel, value)),
            _ => panic!("expected pitch bend"),
        }

        assert!(to_synth_event(
            0,
            MidiMessage::ProgramChange {
                program: u7::new(5)
            }
        )
        .is_none());
    }

    #[test]
    fn test_render_without_font_is_silent() -> Result<(), Box<dyn Error>> {
        let sampler = Sampler::new(44100, 0.5)?;
        let mut output = vec![1.0_f32; 64];
        sampler.render(&mut output, 2);
        assert!(output.iter().all(|sample| sample.abs() < 1e-4));
        assert_eq!(44100, sampler.sample_rate());
        Ok(())
    }

    #[test]
    fn test_load_invalid_sound_font() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("font.sf2");
        fs::write(&path, b"definitely not a sound font")?;

        let sampler = Sampler::new(44100, 0.5)?;
        assert!(sampler.load_sound_font(&path, 0, 0).is_err());

        // A truncated RIFF file passes the header check but not the parser.
        let truncated = dir.path().join("truncated.sf2");
        fs::write(&truncated, b"RIFF\x04\0\0\0sfbk")?;
        assert!(sampler.load_sound_font(&truncated, 0, 0).is_err());

        let short = dir.path().join("short.sf2");
        fs::write(&short, b"RIFF")?;
        assert!(sampler.load_sound_font(&short, 0, 0).is_err());
        assert!(sampler
            .load_sound_font(&dir.path().join("missing.sf2"), 0, 0)
            .is_err());
        assert_eq!("no sound font (44100Hz)", sampler.to_string());
        Ok(())
    }
}
