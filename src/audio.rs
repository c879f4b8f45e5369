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
use std::{error::Error, fmt, sync::Arc};

use crate::instrument::Instrument;

pub mod cpal;
pub mod mock;

/// The device name that selects the host's default output.
pub const DEFAULT_DEVICE: &str = "default";

/// An audio output. Once started, the device continuously pulls rendered audio
/// from an instrument until it is dropped.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// The configured name of the device.
    fn name(&self) -> &str;

    /// Starts pulling audio from the instrument. Starting a running device does nothing.
    fn start(&self, instrument: Arc<dyn Instrument>) -> Result<(), Box<dyn Error>>;

    /// Returns true if the device is producing audio.
    fn is_running(&self) -> bool;

    /// The sample rate the device runs at by default, if it can be found.
    fn preferred_sample_rate(&self) -> Option<u32>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name. The hardware is only looked up when the
/// device is started.
pub fn get_device(name: &str) -> Arc<dyn Device> {
    if name.starts_with("mock") {
        return Arc::new(mock::Device::get(name));
    };

    Arc::new(cpal::Device::get(name))
}

#[cfg(test)]
mod test {
    use super::get_device;

    #[test]
    fn test_get_device() {
        let device = get_device("mock-device");
        assert!(device.to_mock().is_ok());
        assert_eq!("mock-device", device.name());

        assert_eq!(Some(48000), device.preferred_sample_rate());

        let device = get_device("default");
        assert!(device.to_mock().is_err());
        assert!(!device.is_running());
    }
}
