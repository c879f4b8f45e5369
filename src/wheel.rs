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

//! The circle of fifths wheel.
//!
//! This module provides:
//! - The fixed key tables (display labels and asset names) for both rings
//! - Wheel positions, validated at construction
//! - Sector geometry for drawing, label placement and hit testing

use std::{error::Error, fmt, str::FromStr};

use serde::Serialize;

mod geometry;

pub use geometry::{
    angle_from, angular_range, band_region, hit_radii, hit_region, hsv_to_rgb, label_anchor,
    ring_radii, sector_at, sector_hue, sector_range, PathSegment, Point, WedgePath,
};

/// The number of sectors in each ring.
pub const SECTOR_COUNT: usize = 12;

/// Where the first sector starts, in degrees.
pub const SECTOR_OFFSET_DEGREES: f64 = 15.0;

/// The side of the square canvas the wheel is laid out on by default.
pub const DEFAULT_WHEEL_SIZE: f64 = 350.0;

const OUTER_LABELS: [&str; SECTOR_COUNT] = [
    "E", "B", "G♭", "D♭", "A♭", "E♭", "B♭", "F", "C", "G", "D", "A",
];
const OUTER_ASSETS: [&str; SECTOR_COUNT] = [
    "E", "B", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A",
];
const INNER_LABELS: [&str; SECTOR_COUNT] = [
    "C♯m", "G♯m", "E♭m", "B♭m", "Fm", "Cm", "Gm", "Dm", "Am", "Em", "Bm", "F♯m",
];
const INNER_ASSETS: [&str; SECTOR_COUNT] = [
    "C#m", "G#m", "Ebm", "Bbm", "Fm", "Cm", "Gm", "Dm", "Am", "Em", "Bm", "F#m",
];

/// One of the two concentric bands of the wheel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ring {
    /// Major keys.
    Outer,
    /// Relative minor keys.
    Inner,
}

impl Ring {
    /// Both rings, in drawing order. The inner ring is drawn on top.
    pub const ALL: [Ring; 2] = [Ring::Outer, Ring::Inner];

    fn labels(&self) -> &'static [&'static str; SECTOR_COUNT] {
        match self {
            Ring::Outer => &OUTER_LABELS,
            Ring::Inner => &INNER_LABELS,
        }
    }

    fn assets(&self) -> &'static [&'static str; SECTOR_COUNT] {
        match self {
            Ring::Outer => &OUTER_ASSETS,
            Ring::Inner => &INNER_ASSETS,
        }
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ring::Outer => write!(f, "outer"),
            Ring::Inner => write!(f, "inner"),
        }
    }
}

impl FromStr for Ring {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "outer" | "major" => Ok(Ring::Outer),
            "inner" | "minor" => Ok(Ring::Inner),
            _ => Err(format!("unknown ring {}", s).into()),
        }
    }
}

/// The display label and asset name of one sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorLabel {
    /// The label drawn on the wheel, e.g. "G♭".
    pub label: &'static str,
    /// The bundled asset played for the sector, e.g. "Gb".
    pub asset: &'static str,
}

/// A sector of the wheel. The index is always within `0..SECTOR_COUNT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WheelPosition {
    index: usize,
    ring: Ring,
}

impl WheelPosition {
    /// Creates a position, returning None if the index is out of range.
    pub fn new(index: usize, ring: Ring) -> Option<WheelPosition> {
        if index < SECTOR_COUNT {
            Some(WheelPosition { index, ring })
        } else {
            None
        }
    }

    /// All 24 positions, outer ring first.
    pub fn all() -> impl Iterator<Item = WheelPosition> {
        Ring::ALL
            .into_iter()
            .flat_map(|ring| (0..SECTOR_COUNT).map(move |index| WheelPosition { index, ring }))
    }

    /// Finds the position whose asset name or display label matches.
    pub fn find(name: &str) -> Option<WheelPosition> {
        WheelPosition::all().find(|position| {
            let sector = position.sector_label();
            sector.asset == name || sector.label == name
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ring(&self) -> Ring {
        self.ring
    }

    pub fn label(&self) -> &'static str {
        self.ring.labels()[self.index]
    }

    pub fn asset(&self) -> &'static str {
        self.ring.assets()[self.index]
    }

    pub fn sector_label(&self) -> SectorLabel {
        SectorLabel {
            label: self.label(),
            asset: self.asset(),
        }
    }
}

impl fmt::Display for WheelPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.ring, self.index + 1, self.label())
    }
}

/// A printable description of one sector, used by the CLI.
#[derive(Debug, Serialize)]
pub struct SectorSummary {
    pub ring: Ring,
    pub index: usize,
    pub label: &'static str,
    pub asset: &'static str,
    pub start_degrees: f64,
    pub end_degrees: f64,
    pub label_x: f64,
    pub label_y: f64,
    pub color: String,
}

impl SectorSummary {
    pub fn new(position: WheelPosition, wheel_size: f64) -> SectorSummary {
        let (start_degrees, end_degrees) = sector_range(position.index());
        let anchor = label_anchor(position.index(), position.ring(), wheel_size);
        let [r, g, b] = hsv_to_rgb(sector_hue(position.index(), position.ring()), 1.0, 1.0);
        SectorSummary {
            ring: position.ring(),
            index: position.index(),
            label: position.label(),
            asset: position.asset(),
            start_degrees,
            end_degrees,
            label_x: anchor.x,
            label_y: anchor.y,
            color: format!("#{:02x}{:02x}{:02x}", r, g, b),
        }
    }
}

/// Summarizes every sector of the wheel.
pub fn summarize(wheel_size: f64) -> Vec<SectorSummary> {
    WheelPosition::all()
        .map(|position| SectorSummary::new(position, wheel_size))
        .collect()
}
