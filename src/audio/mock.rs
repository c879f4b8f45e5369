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
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use crate::instrument::Instrument;

/// The rate mock devices claim to run at.
pub const MOCK_SAMPLE_RATE: u32 = 48000;

/// A mock device. Doesn't actually play anything. Devices whose name contains
/// "fail" refuse to start.
#[derive(Clone)]
pub struct Device {
    name: String,
    instrument: Arc<Mutex<Option<Arc<dyn Instrument>>>>,
    starts: Arc<AtomicUsize>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            instrument: Arc::new(Mutex::new(None)),
            starts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times the device was successfully started.
    #[cfg(test)]
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    /// Pulls the given number of stereo frames from the attached instrument, as an
    /// audio callback would.
    #[cfg(test)]
    pub fn pull(&self, frames: usize) -> Result<Vec<f32>, Box<dyn Error>> {
        let instrument = self
            .instrument
            .lock()
            .clone()
            .ok_or("mock device is not started")?;
        let mut output = vec![0.0_f32; frames * 2];
        instrument.render(&mut output, 2);
        Ok(output)
    }
}

impl crate::audio::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, instrument: Arc<dyn Instrument>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "start output (mock)");
        let _enter = span.enter();

        if self.name.contains("fail") {
            return Err(format!("mock device {} failed to start", self.name).into());
        }

        let mut current = self.instrument.lock();
        if current.is_none() {
            info!(device = self.name, instrument = instrument.to_string(), "Output started.");
            *current = Some(instrument);
            self.starts.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.instrument.lock().is_some()
    }

    fn preferred_sample_rate(&self) -> Option<u32> {
        Some(MOCK_SAMPLE_RATE)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
