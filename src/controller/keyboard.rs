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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::wheel::{Point, Ring, WheelPosition, SECTOR_COUNT};

const PLAY: &str = "play";
const STOP: &str = "stop";
const TAP: &str = "tap";
const KEY: &str = "key";

/// A controller that taps the wheel using the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses one line of input. Sectors are numbered from 1. Only the command word is
    /// case insensitive since key names are not, e.g. "Cm".
    fn parse(input: &str) -> Option<Event> {
        let mut words = input.split_whitespace();
        let command = words.next()?.to_lowercase();
        let mut words: Vec<&str> = words.collect();
        words.insert(0, &command);
        match words.as_slice() {
            [PLAY] => Some(Event::Play),
            [STOP] => Some(Event::Stop),
            [TAP, x, y] => Some(Event::TapAt(Point::new(x.parse().ok()?, y.parse().ok()?))),
            [KEY, name] => WheelPosition::find(name).map(Event::Tap),
            [ring, number] => {
                let ring: Ring = ring.parse().ok()?;
                let number: usize = number.parse().ok()?;
                WheelPosition::new(number.checked_sub(1)?, ring).map(Event::Tap)
            }
            _ => None,
        }
    }

    /// Reads and handles one command. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command (outer <1-{count}>, inner <1-{count}>, {} <name>, {} <x> <y>, {}, {}): ",
            KEY,
            TAP,
            PLAY,
            STOP,
            count = SECTOR_COUNT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let line = input.trim();
        if line.is_empty() {
            return Ok(true);
        }

        match Driver::parse(line) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => warn!(input = line, "Unrecognized input"),
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard input closed.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::Event;
    use crate::wheel::{Point, Ring, WheelPosition};

    use super::{Driver, PLAY, STOP};

    fn get_event(event: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(event.as_bytes());
        let writer = BufWriter::new(Vec::new());
        assert!(Driver::monitor_io(&sender, reader, writer)?);

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    fn tap(index: usize, ring: Ring) -> Option<Event> {
        WheelPosition::new(index, ring).map(Event::Tap)
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(Some(Event::Play), get_event(PLAY)?);
        assert_eq!(Some(Event::Stop), get_event(STOP)?);
        assert_eq!(Some(Event::Stop), get_event("  STOP \n")?);
        assert_eq!(tap(0, Ring::Outer), get_event("outer 1")?);
        assert_eq!(tap(11, Ring::Outer), get_event("major 12")?);
        assert_eq!(tap(5, Ring::Inner), get_event("inner 6")?);
        assert_eq!(tap(5, Ring::Inner), get_event("key Cm")?);
        assert_eq!(tap(2, Ring::Outer), get_event("key Gb")?);
        assert_eq!(tap(5, Ring::Inner), get_event("KEY Cm")?);
        assert_eq!(tap(0, Ring::Inner), get_event("Key C#m")?);
        assert_eq!(tap(3, Ring::Outer), get_event("OUTER 4")?);
        assert_eq!(
            Some(Event::TapAt(Point::new(175.0, 20.5))),
            get_event("tap 175 20.5")?
        );
        Ok(())
    }

    #[test]
    fn test_keyboard_rejects() -> Result<(), io::Error> {
        assert_eq!(None, get_event("unrecognized")?);
        assert_eq!(None, get_event("outer 0")?);
        assert_eq!(None, get_event("inner 13")?);
        assert_eq!(None, get_event("middle 2")?);
        assert_eq!(None, get_event("key H")?);
        assert_eq!(None, get_event("KEY cm")?);
        assert_eq!(None, get_event("tap 1")?);
        assert_eq!(None, get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_keyboard_eof() -> Result<(), io::Error> {
        let (sender, _receiver) = mpsc::channel::<Event>(1);
        let reader = BufReader::new("".as_bytes());
        let writer = BufWriter::new(Vec::new());
        assert!(!Driver::monitor_io(&sender, reader, writer)?);
        Ok(())
    }
}
