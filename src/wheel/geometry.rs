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

//! Sector geometry. Angles are in degrees, measured clockwise from the positive
//! x axis of a canvas whose y axis grows downward.

use super::{Ring, SECTOR_COUNT, SECTOR_OFFSET_DEGREES};

/// Label distance from the center as a fraction of the wheel radius.
const OUTER_LABEL_RATIO: f64 = 6.0 / 7.0;
const INNER_LABEL_RATIO: f64 = 4.0 / 7.0;

/// The inner ring is laid out on a 250 px frame inside the 350 px wheel.
const INNER_FRAME_RATIO: f64 = 5.0 / 7.0;

/// A point on the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }
}

/// Partitions a full circle into `sector_count` equal wedges starting at `offset_degrees`
/// and returns the start and end angle of the wedge at `index`.
pub fn angular_range(index: usize, sector_count: usize, offset_degrees: f64) -> (f64, f64) {
    let sector_degrees = 360.0 / sector_count as f64;
    (
        index as f64 * sector_degrees + offset_degrees,
        (index + 1) as f64 * sector_degrees + offset_degrees,
    )
}

/// The angular range of a wheel sector.
pub fn sector_range(index: usize) -> (f64, f64) {
    angular_range(index, SECTOR_COUNT, SECTOR_OFFSET_DEGREES)
}

/// The index of the sector an angle falls in. Every angle maps to exactly one sector.
pub fn sector_at(degrees: f64) -> usize {
    let sector_degrees = 360.0 / SECTOR_COUNT as f64;
    let offset = (degrees - SECTOR_OFFSET_DEGREES).rem_euclid(360.0);
    (offset / sector_degrees).floor() as usize % SECTOR_COUNT
}

/// The angle of a point as seen from the center.
pub fn angle_from(center: Point, point: Point) -> f64 {
    (point.y - center.y).atan2(point.x - center.x).to_degrees()
}

/// The drawn band of a ring as (inner, outer) fractions of the wheel radius.
pub fn ring_radii(ring: Ring) -> (f64, f64) {
    match ring {
        Ring::Outer => (0.7, 1.0),
        Ring::Inner => (0.6 * INNER_FRAME_RATIO, INNER_FRAME_RATIO),
    }
}

/// The tap-sensitive band of a ring as (inner, outer) fractions of the wheel radius.
/// The bands overlap and the inner ring takes precedence.
pub fn hit_radii(ring: Ring) -> (f64, f64) {
    match ring {
        Ring::Outer => (0.5, 1.0),
        Ring::Inner => (0.0, INNER_FRAME_RATIO),
    }
}

fn label_ratio(ring: Ring) -> f64 {
    match ring {
        Ring::Outer => OUTER_LABEL_RATIO,
        Ring::Inner => INNER_LABEL_RATIO,
    }
}

/// Where the label of a sector is drawn on a square canvas of side `wheel_size`.
pub fn label_anchor(index: usize, ring: Ring, wheel_size: f64) -> Point {
    let (start, end) = sector_range(index);
    let midpoint = ((start + end) / 2.0).to_radians();
    let half = wheel_size / 2.0;
    let distance = half * label_ratio(ring);

    Point {
        x: half + distance * midpoint.cos(),
        y: half + distance * midpoint.sin(),
    }
}

/// The fill hue of a sector in `0.0..1.0`. The inner ring is shifted by a quarter turn.
pub fn sector_hue(index: usize, ring: Ring) -> f64 {
    let step = match ring {
        Ring::Outer => index,
        Ring::Inner => index + 3,
    };
    (step as f64 / SECTOR_COUNT as f64).rem_euclid(1.0)
}

/// Converts hue, saturation and brightness in `0.0..=1.0` to 8 bit RGB.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> [u8; 3] {
    let h = hue.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));

    let (r, g, b) = match sector as u8 {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };

    [r, g, b].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// A segment of a wedge outline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    ArcTo {
        center: Point,
        radius: f64,
        start_degrees: f64,
        end_degrees: f64,
        clockwise: bool,
    },
    LineTo(Point),
    Close,
}

/// An annular wedge: two arcs joined by two radial lines.
#[derive(Clone, Debug, PartialEq)]
pub struct WedgePath {
    center: Point,
    inner_radius: f64,
    outer_radius: f64,
    start_degrees: f64,
    end_degrees: f64,
}

impl WedgePath {
    /// Creates a wedge inside a circle of `outer_radius`. The inner arc sits at
    /// `inner_ratio * outer_radius`.
    pub fn new(
        center: Point,
        outer_radius: f64,
        inner_ratio: f64,
        start_degrees: f64,
        end_degrees: f64,
    ) -> WedgePath {
        WedgePath {
            center,
            inner_radius: outer_radius * inner_ratio,
            outer_radius,
            start_degrees,
            end_degrees,
        }
    }

    pub fn inner_radius(&self) -> f64 {
        self.inner_radius
    }

    pub fn outer_radius(&self) -> f64 {
        self.outer_radius
    }

    fn point_at(&self, radius: f64, degrees: f64) -> Point {
        let radians = degrees.to_radians();
        Point {
            x: self.center.x + radius * radians.cos(),
            y: self.center.y + radius * radians.sin(),
        }
    }

    /// The outline of the wedge, ready to hand to a renderer.
    pub fn segments(&self) -> [PathSegment; 5] {
        [
            PathSegment::MoveTo(self.point_at(self.inner_radius, self.start_degrees)),
            PathSegment::ArcTo {
                center: self.center,
                radius: self.inner_radius,
                start_degrees: self.start_degrees,
                end_degrees: self.end_degrees,
                clockwise: false,
            },
            PathSegment::LineTo(self.point_at(self.outer_radius, self.end_degrees)),
            PathSegment::ArcTo {
                center: self.center,
                radius: self.outer_radius,
                start_degrees: self.end_degrees,
                end_degrees: self.start_degrees,
                clockwise: true,
            },
            PathSegment::Close,
        ]
    }

    /// Returns true if the point is inside the wedge. The start edge is inclusive and
    /// the end edge exclusive so adjacent wedges never both claim a point.
    pub fn contains(&self, point: Point) -> bool {
        if !self.within_radii(point) {
            return false;
        }

        let angle = angle_from(self.center, point);
        let sweep = self.end_degrees - self.start_degrees;
        // rem_euclid rounds tiny negative offsets up to a full turn.
        let offset = (angle - self.start_degrees).rem_euclid(360.0) % 360.0;
        offset < sweep
    }

    /// Returns true if the point lies between the inner and outer arcs, at any angle.
    pub fn within_radii(&self, point: Point) -> bool {
        let distance = (point.x - self.center.x).hypot(point.y - self.center.y);
        distance >= self.inner_radius && distance <= self.outer_radius
    }
}

fn region(index: usize, wheel_size: f64, (inner, outer): (f64, f64)) -> WedgePath {
    let half = wheel_size / 2.0;
    let (start, end) = sector_range(index);
    WedgePath::new(
        Point::new(half, half),
        half * outer,
        inner / outer,
        start,
        end,
    )
}

/// The tap-sensitive region of a sector.
pub fn hit_region(index: usize, ring: Ring, wheel_size: f64) -> WedgePath {
    region(index, wheel_size, hit_radii(ring))
}

/// The drawn region of a sector.
pub fn band_region(index: usize, ring: Ring, wheel_size: f64) -> WedgePath {
    region(index, wheel_size, ring_radii(ring))
}
