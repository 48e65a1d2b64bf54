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

//! Recovery data: a previously-known-good stop order for a route, supplied
//! out of band (e.g. from an earlier successful validation run) and used to
//! re-sort a route whose current member order can't be trusted, rather than
//! rejecting it outright.

use crate::colour::Rgb;
use crate::geo_utils::Coord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A station's expected name and position within a recovery itinerary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryStation {
    /// The station's expected display name.
    pub name: String,
    /// The station's expected centroid.
    pub center: Coord,
}

/// One previously-known-good stop sequence for a route.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryItinerary {
    /// The expected stations, in order.
    pub stations: Vec<RecoveryStation>,
    /// The route's expected `from` tag, used to disambiguate when more than
    /// one itinerary otherwise matches.
    #[serde(default)]
    pub from: Option<String>,
    /// The route's expected `to` tag, used to disambiguate when more than
    /// one itinerary otherwise matches.
    #[serde(default)]
    pub to: Option<String>,
}

/// A station is considered displaced, and the itinerary unsuitable, once it
/// has moved more than this many meters from its recorded position.
pub const DISPLACEMENT_TOLERANCE: f64 = 300.0;

/// Recovery itineraries, keyed by a route's `(colour, ref)` pair.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecoveryData {
    itineraries: HashMap<(Option<Rgb>, Option<String>), Vec<RecoveryItinerary>>,
}

impl RecoveryData {
    /// Builds an empty recovery data set.
    pub fn new() -> Self {
        RecoveryData::default()
    }

    /// Registers an itinerary under a route's `(colour, ref)` key.
    pub fn insert(&mut self, colour: Option<Rgb>, route_ref: Option<String>, itinerary: RecoveryItinerary) {
        self.itineraries
            .entry((colour, route_ref))
            .or_default()
            .push(itinerary);
    }

    /// The itineraries recorded for a route's `(colour, ref)` pair, if any.
    pub fn itineraries_for(&self, colour: Option<Rgb>, route_ref: Option<&str>) -> &[RecoveryItinerary] {
        self.itineraries
            .get(&(colour, route_ref.map(str::to_string)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn itineraries_for_looks_up_by_colour_and_ref() {
        let mut data = RecoveryData::new();
        let colour = Some(Rgb {
            red: 255,
            green: 0,
            blue: 0,
        });
        data.insert(
            colour,
            Some("1".to_string()),
            RecoveryItinerary {
                stations: vec![],
                from: None,
                to: None,
            },
        );
        assert_eq!(data.itineraries_for(colour, Some("1")).len(), 1);
        assert_eq!(data.itineraries_for(colour, Some("2")).len(), 0);
    }
}
