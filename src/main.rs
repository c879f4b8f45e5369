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
use std::path::PathBuf;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use fifths::player::PlaybackState;
use fifths::util::duration_seconds;
use fifths::wheel::{self, DEFAULT_WHEEL_SIZE};
use fifths::{audio, config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A circle of fifths wheel that plays each key."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will run the wheel, taking taps from the keyboard.
    Start {
        /// The path to the player config.
        player_path: String,
    },
    /// Plays a single asset through the audio interface until it finishes.
    Play {
        /// The path to the player config.
        player_path: String,
        /// The asset to play, e.g. Gb or C#m.
        asset: String,
    },
    /// Prints the sectors of the wheel.
    Wheel {
        /// The side of the square canvas the wheel is laid out on.
        #[arg[short, long]]
        size: Option<f64>,
        /// Print YAML instead of a table.
        #[arg[short, long]]
        yaml: bool,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Verifies that the sound font and every sector's MIDI asset can be loaded.
    Verify {
        /// The path to the player config.
        player_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { player_path } => {
            config::init_controller(&PathBuf::from(player_path))?
                .join()
                .await?;
        }
        Commands::Play { player_path, asset } => {
            let path = PathBuf::from(player_path);
            let player = config::parse_player(&path)?;
            let mut playback = config::build_playback(&player, config::base_dir(&path))?;

            playback.load_and_play(&asset);
            if playback.current_sequence() != Some(asset.as_str()) {
                return Err(format!("unable to play {}", asset).into());
            }
            while playback.state() == PlaybackState::Playing {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            // Let the last notes ring out.
            tokio::time::sleep(player.release_tail()?).await;
            playback.stop();
        }
        Commands::Wheel { size, yaml } => {
            let sectors = wheel::summarize(size.unwrap_or(DEFAULT_WHEEL_SIZE));

            if yaml {
                print!("{}", serde_yml::to_string(&sectors)?);
                return Ok(());
            }

            println!("Sectors (count: {}):", sectors.len());
            for sector in sectors.iter() {
                println!(
                    "- {} {:>2}: {:<4} asset={:<4} {:>5.1}°-{:>5.1}° label=({:.1}, {:.1}) color={}",
                    sector.ring,
                    sector.index + 1,
                    sector.label,
                    sector.asset,
                    sector.start_degrees,
                    sector.end_degrees,
                    sector.label_x,
                    sector.label_y,
                    sector.color,
                );
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { player_path } => {
            let path = PathBuf::from(player_path);
            let player = config::parse_player(&path)?;
            let assets = player.assets(config::base_dir(&path));

            let mut failures = 0;
            match assets.sound_font() {
                Ok(sound_font) => println!("Sound font: {}", sound_font.display()),
                Err(e) => {
                    failures += 1;
                    println!("Sound font: {}", e);
                }
            }

            println!("Assets:");
            for check in assets.verify() {
                match check.result {
                    Ok(duration) => println!(
                        "- {}: {} ({})",
                        check.position,
                        check.position.asset(),
                        duration_seconds(duration)
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("- {}: {}", check.position, e);
                    }
                }
            }

            if failures > 0 {
                return Err(format!("{} asset(s) failed verification", failures).into());
            }
        }
    }

    Ok(())
}
