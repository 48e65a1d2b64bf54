// Copyright (C) 2017 Hove and/or its affiliates.
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, version 3.

// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.

// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>

//! Lon-lat geometry helpers used by station clustering and track
//! reconstruction. Numerics stay in an equirectangular approximation with
//! latitude scaling: adequate at city scales, where the engine never deals
//! with spans of more than a few kilometers.

use geo::Point;
use serde::{Deserialize, Serialize};

/// A geographic point, longitude first to match the OSM/GeoJSON convention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// Longitude, in degrees.
    pub lon: f64,
    /// Latitude, in degrees.
    pub lat: f64,
}

impl Coord {
    /// Builds a coordinate from `(lon, lat)`.
    pub fn new(lon: f64, lat: f64) -> Self {
        Coord { lon, lat }
    }

    /// Returns a proxy allowing repeated cheap distance computations against
    /// this coordinate's local tangent plane.
    pub fn approx(&self) -> Approx {
        let lat_rad = self.lat.to_radians();
        Approx {
            origin: *self,
            cos_lat: lat_rad.cos(),
        }
    }
}

impl From<Coord> for Point<f64> {
    fn from(coord: Coord) -> Self {
        Point::new(coord.lon, coord.lat)
    }
}

impl From<Point<f64>> for Coord {
    fn from(point: Point<f64>) -> Self {
        Coord {
            lon: point.x(),
            lat: point.y(),
        }
    }
}

// Mean Earth radius in meters.
const EARTH_RADIUS: f64 = 6_371_000.0;
// Degrees-to-meters scale along a meridian, used for the planar approximation.
const METERS_PER_DEGREE_LAT: f64 = EARTH_RADIUS * std::f64::consts::PI / 180.0;

/// Proxy object caching the trig of one coordinate's latitude so that
/// projecting many other points onto the local tangent plane is cheap.
#[derive(Clone, Copy, Debug)]
pub struct Approx {
    origin: Coord,
    cos_lat: f64,
}

impl Approx {
    /// Projects `coord` onto the local tangent plane centred on this
    /// proxy's origin, in meters (east, north).
    pub fn planar(&self, coord: Coord) -> (f64, f64) {
        let dlon = coord.lon - self.origin.lon;
        let dlat = coord.lat - self.origin.lat;
        (
            dlon * METERS_PER_DEGREE_LAT * self.cos_lat,
            dlat * METERS_PER_DEGREE_LAT,
        )
    }

    /// Converts a local tangent-plane offset (east, north, in meters) back
    /// into a coordinate.
    pub fn unplanar(&self, east: f64, north: f64) -> Coord {
        Coord {
            lon: self.origin.lon + east / (METERS_PER_DEGREE_LAT * self.cos_lat),
            lat: self.origin.lat + north / METERS_PER_DEGREE_LAT,
        }
    }
}

/// Orthodromic (great-circle) distance in meters between two coordinates.
/// Used for every threshold comparison in the spec (100 m, 300 m, ...); at
/// city scale this agrees with the planar approximation to within
/// millimeters, but stays correct if a dataset ever spans a wider bbox.
pub fn distance(a: Coord, b: Coord) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let lambda1 = a.lon.to_radians();
    let lambda2 = b.lon.to_radians();

    let x = ((phi2 - phi1) / 2.0).sin().powi(2);
    let y = phi1.cos() * phi2.cos() * ((lambda2 - lambda1) / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS * (x + y).sqrt().asin()
}

/// Angle in degrees at vertex `b`, formed by the segments `a-b` and `b-c`.
/// A straight line through `b` is 180 degrees; a sharp U-turn is close to 0.
pub fn angle_between(a: Coord, b: Coord, c: Coord) -> f64 {
    let approx = b.approx();
    let (ax, ay) = approx.planar(a);
    let (cx, cy) = approx.planar(c);
    let dot = ax * cx + ay * cy;
    let mag = (ax * ax + ay * ay).sqrt() * (cx * cx + cy * cy).sqrt();
    if mag == 0.0 {
        return 180.0;
    }
    (dot / mag).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Result of projecting a point onto a polyline.
#[derive(Clone, Debug, Default)]
pub struct Projection {
    /// The nearest point on the polyline to the queried point, or `None` if
    /// the polyline is empty.
    pub projected_point: Option<Coord>,
    /// Cumulative along-line arclength (in meters, from the polyline start)
    /// of every segment whose perpendicular foot is within
    /// [`MAX_DISTANCE_STOP_TO_LINE`](crate::track_geometry::MAX_DISTANCE_STOP_TO_LINE)
    /// of the queried point. Sorted ascending; a self-overlapping (circular)
    /// polyline can contribute more than one entry.
    pub positions_on_line: Vec<f64>,
}

/// Per-segment cumulative arclength, used to convert a (segment, u) pair
/// into a single along-line distance.
fn cumulative_lengths(line: &[Coord]) -> Vec<f64> {
    let mut lengths = Vec::with_capacity(line.len());
    let mut acc = 0.0;
    lengths.push(0.0);
    for w in line.windows(2) {
        acc += distance(w[0], w[1]);
        lengths.push(acc);
    }
    lengths
}

/// Projects `point` perpendicularly onto every segment of `line`, keeping
/// every segment within `near_threshold` meters as a distinct candidate
/// along-line position, and returning the single closest projected point.
pub fn project_on_line(point: Coord, line: &[Coord], near_threshold: f64) -> Projection {
    if line.len() < 2 {
        return Projection::default();
    }
    let cum = cumulative_lengths(line);
    let mut best: Option<(f64, Coord)> = None;
    let mut positions = Vec::new();

    for (i, w) in line.windows(2).enumerate() {
        let (p0, p1) = (w[0], w[1]);
        let approx = p0.approx();
        let (x0, y0) = (0.0, 0.0);
        let (x1, y1) = approx.planar(p1);
        let (xp, yp) = approx.planar(point);

        let seg_len_sq = (x1 - x0).powi(2) + (y1 - y0).powi(2);
        let u = if seg_len_sq == 0.0 {
            0.0
        } else {
            (((xp - x0) * (x1 - x0) + (yp - y0) * (y1 - y0)) / seg_len_sq).clamp(0.0, 1.0)
        };
        let foot = approx.unplanar(x0 + u * (x1 - x0), y0 + u * (y1 - y0));
        let d = distance(point, foot);

        if d <= near_threshold {
            let seg_len = seg_len_sq.sqrt();
            positions.push(cum[i] + u * seg_len);
        }
        if best.map(|(bd, _)| d < bd).unwrap_or(true) {
            best = Some((d, foot));
        }
    }

    positions.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Projection {
        projected_point: best.map(|(_, foot)| foot),
        positions_on_line: positions,
    }
}

/// Finds the segment of `line` (by index) and the parameter `u` in `[0, 1]`
/// along it whose perpendicular foot is nearest to `point`. Returns `None`
/// for a degenerate (< 2 points) line.
pub fn find_segment(point: Coord, line: &[Coord]) -> Option<(usize, f64)> {
    if line.len() < 2 {
        return None;
    }
    let mut best: Option<(usize, f64, f64)> = None; // (segment, u, distance)
    for (i, w) in line.windows(2).enumerate() {
        let (p0, p1) = (w[0], w[1]);
        let approx = p0.approx();
        let (x1, y1) = approx.planar(p1);
        let (xp, yp) = approx.planar(point);
        let seg_len_sq = x1 * x1 + y1 * y1;
        let u = if seg_len_sq == 0.0 {
            0.0
        } else {
            ((xp * x1 + yp * y1) / seg_len_sq).clamp(0.0, 1.0)
        };
        let foot = approx.unplanar(u * x1, u * y1);
        let d = distance(point, foot);
        if best.map(|(_, _, bd)| d < bd).unwrap_or(true) {
            best = Some((i, u, d));
        }
    }
    best.map(|(seg, u, _)| (seg, u))
}

/// Along-line distance between `a` and `b`, searching for `a`'s segment no
/// earlier than `start_vertex` and requiring `b`'s segment to come no
/// earlier than `a`'s (monotonicity, matching the route's stop order).
/// Returns the distance in meters and the vertex index to resume the next
/// search from, or `None` if no such monotonic pair of segments exists.
pub fn distance_on_line(
    a: Coord,
    b: Coord,
    line: &[Coord],
    start_vertex: usize,
) -> Option<(f64, usize)> {
    if line.len() < 2 || start_vertex >= line.len() - 1 {
        return None;
    }
    let cum = cumulative_lengths(line);
    let (seg_a, u_a) = find_segment(a, &line[start_vertex..])
        .map(|(seg, u)| (seg + start_vertex, u))?;
    let (seg_b, u_b) = find_segment(b, &line[seg_a..]).map(|(seg, u)| (seg + seg_a, u))?;

    let seg_len_a = distance(line[seg_a], line[seg_a + 1]);
    let seg_len_b = distance(line[seg_b], line[seg_b + 1]);
    let pos_a = cum[seg_a] + u_a * seg_len_a;
    let pos_b = cum[seg_b] + u_b * seg_len_b;
    if pos_b < pos_a {
        return None;
    }
    Some((pos_b - pos_a, seg_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn distance_is_symmetric_and_zero_at_origin() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(1.0, 0.0);
        assert_eq!(distance(a, a), 0.0);
        assert!((distance(a, b) - distance(b, a)).abs() < 1e-6);
        assert!(distance(a, b) > 0.0);
    }

    #[test]
    fn angle_is_straight_on_a_line() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(1.0, 0.0);
        let c = Coord::new(2.0, 0.0);
        assert!((angle_between(a, b, c) - 180.0).abs() < 1e-6);
    }

    #[test]
    fn angle_is_sharp_on_a_u_turn() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(1.0, 0.0);
        let c = Coord::new(0.1, 0.0);
        assert!(angle_between(a, b, c) < 20.0);
    }

    #[test]
    fn project_on_line_finds_the_closest_segment() {
        let line = vec![
            Coord::new(0.0, 0.0),
            Coord::new(1.0, 0.0),
            Coord::new(2.0, 0.0),
        ];
        let projection = project_on_line(Coord::new(1.0, 0.0001), &line, 100.0);
        let projected = projection.projected_point.expect("should project");
        assert!((projected.lon - 1.0).abs() < 1e-6);
        assert!(!projection.positions_on_line.is_empty());
    }

    #[test]
    fn project_on_line_is_empty_for_degenerate_line() {
        let projection = project_on_line(Coord::new(0.0, 0.0), &[], 100.0);
        assert!(projection.projected_point.is_none());
        assert!(projection.positions_on_line.is_empty());
    }
}
