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
    fs,
    path::Path,
    thread,
    time::{Duration, SystemTime},
};

use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
};
use tempfile::TempDir;

/// The sound font file name used by test asset directories.
pub const SOUND_FONT: &str = "font.sf2";

/// Ticks per beat of the generated MIDI files. At the default tempo a beat is half a second.
pub const TICKS_PER_BEAT: u16 = 96;

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }

        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}

fn midi_event(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(channel),
            message,
        },
    }
}

/// Writes a single track MIDI file that strikes the given notes together on channel 0
/// and releases them after `hold_ticks`.
pub fn write_chord(path: &Path, notes: &[u8], hold_ticks: u32) -> Result<(), Box<dyn Error>> {
    let mut track = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
    }];

    for note in notes {
        track.push(midi_event(
            0,
            0,
            MidiMessage::NoteOn {
                key: u7::new(*note),
                vel: u7::new(100),
            },
        ));
    }
    for (i, note) in notes.iter().enumerate() {
        track.push(midi_event(
            if i == 0 { hold_ticks } else { 0 },
            0,
            MidiMessage::NoteOff {
                key: u7::new(*note),
                vel: u7::new(0),
            },
        ));
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(TICKS_PER_BEAT)),
        ),
        tracks: vec![track],
    };
    smf.save(path)?;
    Ok(())
}

/// Creates an asset directory holding a placeholder sound font and a short chord
/// for each of the given asset names.
pub fn asset_dir(names: &[&str]) -> Result<TempDir, Box<dyn Error>> {
    asset_dir_with_hold(names, u32::from(TICKS_PER_BEAT))
}

/// Like `asset_dir`, but every chord is held for the given number of ticks.
pub fn asset_dir_with_hold(names: &[&str], hold_ticks: u32) -> Result<TempDir, Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join(SOUND_FONT), b"sfbk")?;

    for name in names {
        write_chord(
            &dir.path().join(format!("{}.mid", name)),
            &[60, 64, 67],
            hold_ticks,
        )?;
    }

    Ok(dir)
}
