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
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use config::{Config, File};
use tracing::info;

use crate::audio::Device;
use crate::controller::{keyboard, Controller, Dispatcher};
use crate::player::PlaybackController;
use crate::{audio, instrument};

mod error;
mod player;

pub use self::error::ConfigError;
pub use self::player::{Player, DEFAULT_SAMPLE_RATE};

/// Parses and validates the player configuration.
pub fn parse_player(file: &Path) -> Result<Player, ConfigError> {
    let player: Player = Config::builder()
        .add_source(File::from(file))
        .build()?
        .try_deserialize()?;
    player.validate()?;
    Ok(player)
}

/// The directory relative asset paths are resolved against.
pub fn base_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// The rate to render at: the configured rate, then the device's own, then the default.
pub fn output_sample_rate(player: &Player, device: &dyn Device) -> u32 {
    player
        .sample_rate()
        .or_else(|| device.preferred_sample_rate())
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

/// Builds the playback controller for the given configuration.
pub fn build_playback(
    player: &Player,
    base: &Path,
) -> Result<PlaybackController, Box<dyn Error>> {
    let device = audio::get_device(player.audio_device());
    let sample_rate = output_sample_rate(player, device.as_ref());
    let instrument = instrument::sampler(sample_rate, player.gain())?;
    let assets = player.assets(base);

    info!(
        device = player.audio_device(),
        sample_rate,
        assets = assets.root().display().to_string(),
        "Building playback controller."
    );
    Ok(PlaybackController::new(
        device,
        instrument,
        assets,
        player.binding(),
        None,
    ))
}

/// Initializes the playback controller and the keyboard controller from the given config
/// file and returns the controller, which can be waited on until input closes.
pub fn init_controller(file: &Path) -> Result<Controller, Box<dyn Error>> {
    let player = parse_player(file)?;
    let playback = build_playback(&player, base_dir(file))?;

    Ok(Controller::new(
        Dispatcher::new(playback, player.wheel_size()),
        Arc::new(keyboard::Driver::new()),
    ))
}
