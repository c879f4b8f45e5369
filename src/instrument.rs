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
use std::{error::Error, fmt, path::Path, sync::Arc};

use midly::MidiMessage;

pub mod mock;
pub mod oxisynth;

/// The number of MIDI channels an instrument responds on.
pub const MIDI_CHANNELS: u8 = 16;

/// A sampled instrument. Sequencers feed it MIDI messages while an audio device
/// pulls rendered samples from it.
pub trait Instrument: fmt::Display + Send + Sync {
    /// Loads the sound font and binds every channel to the given bank and preset.
    fn load_sound_font(&self, path: &Path, bank: u8, preset: u8) -> Result<(), Box<dyn Error>>;

    /// Handles a MIDI channel message.
    fn handle(&self, channel: u8, message: MidiMessage);

    /// Releases every sounding note on every channel.
    fn silence(&self);

    /// Renders interleaved frames into the output buffer.
    fn render(&self, output: &mut [f32], channels: usize);

    /// The sample rate the instrument renders at.
    fn sample_rate(&self) -> u32;
}

/// Creates the sound font sampler.
pub fn sampler(sample_rate: u32, gain: f32) -> Result<Arc<dyn Instrument>, Box<dyn Error>> {
    Ok(Arc::new(oxisynth::Sampler::new(sample_rate, gain)?))
}
