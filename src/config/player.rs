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
use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::assets::Assets;
use crate::player::Binding;
use crate::wheel::DEFAULT_WHEEL_SIZE;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_GAIN: f32 = 0.5;
const DEFAULT_RELEASE_TAIL: Duration = Duration::from_secs(1);

/// The loudest gain the synthesizer accepts.
const MAX_GAIN: f32 = 10.0;

/// The configuration for the wheel player.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The audio device to use. "default" is the host's default output.
    audio_device: String,
    /// The asset directory. Relative paths are resolved against the config file.
    assets: String,
    /// The sound font file inside the asset directory.
    sound_font: String,
    /// The sound font bank every channel is bound to.
    #[serde(default)]
    bank: u8,
    /// The sound font preset every channel is bound to.
    #[serde(default)]
    preset: u8,
    /// A sequence to arm at start-up.
    initial_sequence: Option<String>,
    /// The synthesizer gain.
    gain: Option<f32>,
    /// The sample rate to render at.
    sample_rate: Option<u32>,
    /// The side of the square canvas taps are measured on.
    wheel_size: Option<f64>,
    /// How long to keep rendering after a sequence ends, e.g. "1s" or "500ms".
    release_tail: Option<String>,
}

impl Player {
    pub fn audio_device(&self) -> &str {
        &self.audio_device
    }

    /// The asset directory, relative to `base` unless absolute.
    pub fn asset_dir(&self, base: &Path) -> PathBuf {
        let assets = PathBuf::from(&self.assets);
        if assets.is_absolute() {
            assets
        } else {
            base.join(assets)
        }
    }

    pub fn assets(&self, base: &Path) -> Assets {
        Assets::new(&self.asset_dir(base), &self.sound_font)
    }

    pub fn binding(&self) -> Binding {
        Binding {
            bank: self.bank,
            preset: self.preset,
            initial_sequence: self.initial_sequence.clone(),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain.unwrap_or(DEFAULT_GAIN)
    }

    /// The configured sample rate. When unset, the device's own rate is used.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn wheel_size(&self) -> f64 {
        self.wheel_size.unwrap_or(DEFAULT_WHEEL_SIZE)
    }

    pub fn release_tail(&self) -> Result<Duration, ConfigError> {
        match &self.release_tail {
            Some(release_tail) => Ok(DurationString::from_string(release_tail.clone())
                .map_err(|e| ConfigError::Invalid {
                    field: "release_tail",
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_RELEASE_TAIL),
        }
    }

    /// Checks values the deserializer can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preset > 127 {
            return Err(ConfigError::Invalid {
                field: "preset",
                reason: format!("{} is not a MIDI program (0-127)", self.preset),
            });
        }
        if self.bank > 127 {
            return Err(ConfigError::Invalid {
                field: "bank",
                reason: format!("{} is not a MIDI bank (0-127)", self.bank),
            });
        }
        if !(0.0..=MAX_GAIN).contains(&self.gain()) {
            return Err(ConfigError::Invalid {
                field: "gain",
                reason: format!("{} is outside 0.0-{}", self.gain(), MAX_GAIN),
            });
        }
        if self.sample_rate == Some(0) {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: "must be positive".to_string(),
            });
        }
        if !(self.wheel_size().is_finite() && self.wheel_size() > 0.0) {
            return Err(ConfigError::Invalid {
                field: "wheel_size",
                reason: format!("{} is not a positive size", self.wheel_size()),
            });
        }
        self.release_tail()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;
    use std::time::Duration;

    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Player {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal() {
        let player = parse(
            r#"
            audio_device: default
            assets: assets
            sound_font: RLNDGM.sf2
        "#,
        );

        assert!(player.validate().is_ok());
        assert_eq!("default", player.audio_device());
        assert_eq!(DEFAULT_GAIN, player.gain());
        assert_eq!(None, player.sample_rate());
        assert_eq!(DEFAULT_WHEEL_SIZE, player.wheel_size());
        assert_eq!(Duration::from_secs(1), player.release_tail().unwrap());
        assert_eq!(
            Path::new("/etc/fifths/assets"),
            player.asset_dir(Path::new("/etc/fifths"))
        );

        let binding = player.binding();
        assert_eq!((0, 0, None), (binding.bank, binding.preset, binding.initial_sequence));
    }

    #[test]
    fn test_full() {
        let player = parse(
            r#"
            audio_device: mock-device
            assets: /srv/fifths
            sound_font: piano.sf2
            bank: 1
            preset: 4
            initial_sequence: Cchord
            gain: 0.8
            sample_rate: 48000
            wheel_size: 500
            release_tail: 250ms
        "#,
        );

        assert!(player.validate().is_ok());
        assert_eq!(0.8, player.gain());
        assert_eq!(Some(48000), player.sample_rate());
        assert_eq!(500.0, player.wheel_size());
        assert_eq!(Duration::from_millis(250), player.release_tail().unwrap());
        assert_eq!(
            Path::new("/srv/fifths"),
            player.asset_dir(Path::new("/etc/fifths"))
        );

        let binding = player.binding();
        assert_eq!(1, binding.bank);
        assert_eq!(4, binding.preset);
        assert_eq!(Some("Cchord".to_string()), binding.initial_sequence);
    }

    #[test]
    fn test_invalid() {
        let base = r#"
            audio_device: default
            assets: assets
            sound_font: RLNDGM.sf2
        "#;

        for (extra, field) in [
            ("preset: 128", "preset"),
            ("bank: 200", "bank"),
            ("gain: 11.0", "gain"),
            ("sample_rate: 0", "sample_rate"),
            ("wheel_size: -1", "wheel_size"),
            ("release_tail: soon", "release_tail"),
        ] {
            let player = parse(&format!("{}\n            {}", base, extra));
            match player.validate() {
                Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(field, f),
                other => panic!("expected {} to be invalid, got {:?}", field, other),
            }
        }

        for size in [f64::NAN, f64::INFINITY, 0.0] {
            let mut player = parse(base);
            player.wheel_size = Some(size);
            assert!(matches!(
                player.validate(),
                Err(ConfigError::Invalid {
                    field: "wheel_size",
                    ..
                })
            ));
        }
    }
}
