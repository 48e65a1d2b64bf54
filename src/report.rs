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

//! The final, serializable result of validating one city: its found-vs-expected
//! counts and the three diagnostic lists.

use serde::{Deserialize, Serialize};

/// A city's found-vs-expected line counts, shaped differently for a
/// rapid-transit network than for an overground one — mirroring
/// [`ExpectedCounts`](crate::config::ExpectedCounts).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LineCounts {
    /// Subway/light-rail counts.
    Rapid {
        /// Expected subway line count.
        subway_lines_expected: i64,
        /// Found subway line count.
        subway_lines_found: i64,
        /// Expected light rail line count.
        light_rail_lines_expected: i64,
        /// Found light rail line count.
        light_rail_lines_found: i64,
        /// Expected interchange count.
        interchanges_expected: i64,
    },
    /// Tram/bus/trolleybus counts.
    Overground {
        /// Expected tram line count.
        tram_lines_expected: i64,
        /// Found tram line count.
        tram_lines_found: i64,
        /// Expected bus line count.
        bus_lines_expected: i64,
        /// Found bus line count.
        bus_lines_found: i64,
        /// Expected trolleybus line count.
        trolleybus_lines_expected: i64,
        /// Found trolleybus line count.
        trolleybus_lines_found: i64,
        /// Expected count of lines in any other overground mode.
        other_lines_expected: i64,
        /// Found count of lines in any other overground mode.
        other_lines_found: i64,
    },
}

/// The complete result of validating one city.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// The city's name, as configured.
    pub name: String,
    /// The city's country, as configured.
    pub country: String,
    /// The city's continent, as configured.
    pub continent: String,
    /// Number of distinct stations found across every route.
    pub stations_found: i64,
    /// Expected station count (rapid networks only; `0` otherwise).
    pub stations_expected: i64,
    /// Number of interchanges found.
    pub transfers_found: i64,
    /// Number of entrances that belong to no resolved stop area and are not
    /// referenced by any `stop_area` relation either.
    pub unused_entrances: i64,
    /// Number of networks found among the assembled route masters.
    pub networks_found: i64,
    /// Per-mode line counts.
    pub lines: LineCounts,
    /// Whether this city validated without any error-severity diagnostic.
    pub is_good: bool,
    /// Informational diagnostics.
    pub notices: Vec<String>,
    /// Likely-a-problem diagnostics.
    pub warnings: Vec<String>,
    /// Diagnostics that degraded or rejected the object they concern.
    pub errors: Vec<String>,
}
