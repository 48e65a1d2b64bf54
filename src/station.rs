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

//! A `railway=station` (or tram-mode `railway=tram_stop`) element promoted
//! to a validated station: its modes, display name, colour and centroid.

use crate::classify::{ALL_MODES, CONSTRUCTION_KEYS};
use crate::colour::{normalize_colour, Rgb};
use crate::diagnostics::Diagnostics;
use crate::element::{RawElement, TypedId};
use crate::geo_utils::Coord;
use crate::index::ElementIndex;
use std::collections::HashSet;

/// A promoted station.
#[derive(Clone, Debug)]
pub struct Station {
    /// The backing element's id.
    pub id: TypedId,
    /// Every mode this station claims (`subway=yes`, `station=light_rail`, ...).
    pub modes: HashSet<String>,
    /// Display name, `"?"` if untagged.
    pub name: String,
    /// International name, preferring `int_name` then `name:en`.
    pub int_name: Option<String>,
    /// Normalized line colour, if a valid one was tagged.
    pub colour: Option<Rgb>,
    /// The station's centroid.
    pub center: Coord,
}

impl Station {
    /// The set of modes this element claims: every `ALL_MODES` entry tagged
    /// `=yes`, plus the value of `station=*` if present.
    pub fn get_modes(element: &RawElement) -> HashSet<String> {
        let mut modes: HashSet<String> = ALL_MODES
            .iter()
            .filter(|m| element.tag(m) == Some("yes"))
            .map(|m| m.to_string())
            .collect();
        if let Some(station_mode) = element.tag("station") {
            modes.insert(station_mode.to_string());
        }
        modes
    }

    /// Whether `element` is a station relevant to `expected_modes`:
    /// `railway=tram_stop` when `tram` is expected, otherwise
    /// `railway=station` or `railway=halt`, not under construction, and
    /// sharing at least one mode with `expected_modes` unless it's a train
    /// station (`train` is never checked for disjointness, matching how
    /// heavy rail stations rarely tag every mode they serve).
    pub fn is_station(element: &RawElement, expected_modes: &HashSet<String>) -> bool {
        if expected_modes.contains("tram") && element.tag("railway") == Some("tram_stop") {
            return true;
        }
        match element.tag("railway") {
            Some("station") | Some("halt") => {}
            _ => return false,
        }
        if CONSTRUCTION_KEYS.iter().any(|k| element.tags.contains_key(*k)) {
            return false;
        }
        let modes = Station::get_modes(element);
        if !modes.contains("train") && modes.is_disjoint(expected_modes) {
            return false;
        }
        true
    }

    /// Builds a station from a `railway=station` element. Returns `None`
    /// (with an error recorded) if the element's centroid can't be
    /// determined; everything else defaults rather than fails.
    pub fn new(
        element: &RawElement,
        index: &ElementIndex,
        diagnostics: &mut Diagnostics,
    ) -> Option<Station> {
        let center = match index.centroid(element.id) {
            Some(c) => c,
            None => {
                diagnostics.error_at("could not determine the center of station", element);
                return None;
            }
        };

        let colour = match normalize_colour(element.tag("colour")) {
            Ok(colour) => colour,
            Err(e) => {
                diagnostics.warning_at(e, element);
                None
            }
        };

        Some(Station {
            id: element.id,
            modes: Station::get_modes(element),
            name: element.tag("name").unwrap_or("?").to_string(),
            int_name: element
                .tag("int_name")
                .or_else(|| element.tag("name:en"))
                .map(str::to_string),
            colour,
            center,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::RawElement;
    use pretty_assertions::assert_eq;

    fn sample_index() -> (ElementIndex, RawElement) {
        let mut index = ElementIndex::new();
        let el = RawElement::node(1, Coord::new(10.0, 20.0)).with_tags([
            ("railway", "station"),
            ("subway", "yes"),
            ("name", "Central"),
        ]);
        index.add(el.clone());
        (index, el)
    }

    #[test]
    fn builds_a_station_with_defaults() {
        let (index, el) = sample_index();
        let mut diagnostics = Diagnostics::new();
        let station = Station::new(&el, &index, &mut diagnostics).unwrap();
        assert_eq!(station.name, "Central");
        assert!(station.modes.contains("subway"));
        assert_eq!(station.int_name, None);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn missing_centroid_is_reported_as_an_error() {
        let index = ElementIndex::new();
        let el = RawElement::node(2, Coord::new(0.0, 0.0)).with_tags([("railway", "station")]);
        // The node itself isn't indexed, so its centroid can't be found.
        let mut diagnostics = Diagnostics::new();
        assert!(Station::new(&el, &index, &mut diagnostics).is_none());
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn tram_stop_counts_as_a_station_only_when_tram_is_expected() {
        let tram_stop =
            RawElement::node(3, Coord::new(0.0, 0.0)).with_tags([("railway", "tram_stop")]);
        let tram_modes: HashSet<String> = ["tram".to_string()].into_iter().collect();
        let subway_modes: HashSet<String> = ["subway".to_string()].into_iter().collect();
        assert!(Station::is_station(&tram_stop, &tram_modes));
        assert!(!Station::is_station(&tram_stop, &subway_modes));
    }
}
