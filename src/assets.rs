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

//! Bundled, read-only assets: one sound font and one MIDI file per wheel sector.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use midly::{Format, Smf};
use nodi::timers::Ticker;
use nodi::{Event, Sheet, Timer};
use tracing::debug;

use crate::wheel::WheelPosition;

/// The extension of bundled MIDI assets.
pub const MIDI_EXTENSION: &str = "mid";

/// Contains a parsed timer and MIDI sheet for playback.
pub struct MidiSheet {
    pub ticker: Ticker,
    pub sheet: Sheet,
}

impl MidiSheet {
    /// How long the sheet takes to play, up to its last event.
    pub fn duration(&self) -> Duration {
        let mut ticker = self.ticker;
        let mut total = Duration::ZERO;
        let mut pending_ticks = 0_u32;

        for moment in self.sheet.iter() {
            if !moment.is_empty() {
                total += ticker.sleep_duration(pending_ticks);
                pending_ticks = 0;
                for event in moment.events.iter() {
                    if let Event::Tempo(tempo) = event {
                        ticker.change_tempo(*tempo);
                    }
                }
            }
            pending_ticks += 1;
        }

        total
    }
}

/// Returns a MIDI sheet for the given file.
pub fn parse_midi(midi_file: &Path) -> Result<MidiSheet, Box<dyn Error>> {
    let buf: Vec<u8> = fs::read(midi_file)?;
    let smf = Smf::parse(&buf)?;
    let ticker = Ticker::try_from(smf.header.timing)?;

    Ok(MidiSheet {
        ticker,
        sheet: match smf.header.format {
            Format::SingleTrack | Format::Sequential => Sheet::sequential(&smf.tracks),
            Format::Parallel => Sheet::parallel(&smf.tracks),
        },
    })
}

/// The result of checking one sector's asset.
pub struct AssetCheck {
    pub position: WheelPosition,
    pub result: Result<Duration, Box<dyn Error>>,
}

/// Resolves asset names against the bundled asset directory.
#[derive(Clone, Debug)]
pub struct Assets {
    /// The directory holding the sound font and MIDI files.
    root: PathBuf,
    /// The sound font file name, relative to the root.
    sound_font: String,
}

impl Assets {
    pub fn new(root: &Path, sound_font: &str) -> Assets {
        Assets {
            root: root.to_path_buf(),
            sound_font: sound_font.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path to the sound font if it exists.
    pub fn sound_font(&self) -> Result<PathBuf, Box<dyn Error>> {
        let path = self.root.join(&self.sound_font);
        if !path.is_file() {
            return Err(format!("sound font {} does not exist", path.display()).into());
        }
        Ok(path)
    }

    /// Resolves a MIDI asset by name. Names never reach outside the asset directory.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            debug!(name, "Rejecting asset name");
            return None;
        }

        let path = self.root.join(format!("{}.{}", name, MIDI_EXTENSION));
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    /// Checks that every sector of the wheel has a playable MIDI asset.
    pub fn verify(&self) -> Vec<AssetCheck> {
        WheelPosition::all()
            .map(|position| {
                let result = match self.resolve(position.asset()) {
                    Some(path) => parse_midi(&path).map(|sheet| sheet.duration()),
                    None => Err(format!("no asset named {}", position.asset()).into()),
                };
                AssetCheck { position, result }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::fs;

    use crate::testutil::{asset_dir, write_chord, SOUND_FONT};

    use super::{parse_midi, Assets};

    #[test]
    fn test_resolve() -> Result<(), Box<dyn Error>> {
        let dir = asset_dir(&["C", "C#m"])?;
        let assets = Assets::new(dir.path(), SOUND_FONT);

        assert_eq!(Some(dir.path().join("C.mid")), assets.resolve("C"));
        assert_eq!(Some(dir.path().join("C#m.mid")), assets.resolve("C#m"));
        assert_eq!(None, assets.resolve("Db"));
        assert_eq!(None, assets.resolve(""));
        assert_eq!(None, assets.resolve("../C"));
        Ok(())
    }

    #[test]
    fn test_sound_font() -> Result<(), Box<dyn Error>> {
        let dir = asset_dir(&[])?;
        assert!(Assets::new(dir.path(), SOUND_FONT).sound_font().is_ok());
        assert!(Assets::new(dir.path(), "missing.sf2").sound_font().is_err());
        Ok(())
    }

    #[test]
    fn test_parse_midi_duration() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("chord.mid");
        // 96 ticks per beat at 120 BPM: one beat is half a second.
        write_chord(&path, &[60, 64, 67], 96)?;

        let sheet = parse_midi(&path)?;
        let millis = sheet.duration().as_millis();
        assert!((490..=510).contains(&millis), "duration was {}ms", millis);
        Ok(())
    }

    #[test]
    fn test_parse_midi_garbage() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.mid");
        fs::write(&path, b"not a midi file")?;
        assert!(parse_midi(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_verify() -> Result<(), Box<dyn Error>> {
        let dir = asset_dir(&["E", "Cm"])?;
        let checks = Assets::new(dir.path(), SOUND_FONT).verify();

        assert_eq!(24, checks.len());
        let ok: Vec<&str> = checks
            .iter()
            .filter(|check| check.result.is_ok())
            .map(|check| check.position.asset())
            .collect();
        assert_eq!(vec!["E", "Cm"], ok);
        Ok(())
    }
}
