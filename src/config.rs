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

//! Per-city configuration: the metadata that tells the engine which bbox,
//! modes, and networks a city's elements should be read against, and what
//! counts to expect once validation finishes. Loading this from a city-list
//! file is the external adapter's job (see spec §1); parsing the raw string
//! fields into typed values — including the quirky "empty means default,
//! non-empty-but-unparseable means a config error" rule for the integer
//! fields — is the core's.

use crate::classify::{DEFAULT_MODES_OVERGROUND, DEFAULT_MODES_RAPID};
use crate::diagnostics::Diagnostics;
use std::collections::HashSet;

/// A city's bounding box, reordered from the input's `(min_lat, min_lon,
/// max_lat, max_lon)` into `(min_lon, min_lat, max_lon, max_lat)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    /// Minimum longitude.
    pub min_lon: f64,
    /// Minimum latitude.
    pub min_lat: f64,
    /// Maximum longitude.
    pub max_lon: f64,
    /// Maximum latitude.
    pub max_lat: f64,
}

impl BBox {
    /// Whether `(lon, lat)` falls within this box.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.min_lon <= lon && lon <= self.max_lon && self.min_lat <= lat && lat <= self.max_lat
    }

    fn parse(raw: &str) -> Option<BBox> {
        let parts: Vec<&str> = raw.split(',').collect();
        if parts.len() != 4 {
            return None;
        }
        let values: Vec<f64> = parts.iter().filter_map(|p| p.trim().parse().ok()).collect();
        if values.len() != 4 {
            return None;
        }
        let (min_lat, min_lon, max_lat, max_lon) = (values[0], values[1], values[2], values[3]);
        Some(BBox {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

/// The line-count expectations a city declares, shaped differently for a
/// rapid-transit network (subway/light rail, checked against interchanges)
/// than for an overground one (tram/bus/trolleybus, no interchange check).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpectedCounts {
    /// Subway/light-rail expectations.
    Rapid {
        /// Expected number of stations across every route.
        num_stations: i64,
        /// Expected number of subway lines.
        num_lines: i64,
        /// Expected number of light rail lines.
        num_light_lines: i64,
        /// Expected number of interchanges.
        num_interchanges: i64,
    },
    /// Tram/bus/trolleybus expectations.
    Overground {
        /// Expected number of tram lines.
        num_tram_lines: i64,
        /// Expected number of bus lines.
        num_bus_lines: i64,
        /// Expected number of trolleybus lines.
        num_trolleybus_lines: i64,
        /// Expected number of lines in any other overground mode.
        num_other_lines: i64,
    },
}

/// The raw, still-stringly-typed fields of one city-list row, as an external
/// loader would hand them to the engine. Every integer field is a string so
/// "absent" and "present but garbage" can be told apart.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawCityFields<'a> {
    /// The city's numeric id.
    pub id: &'a str,
    /// The city's display name.
    pub name: &'a str,
    /// The city's country.
    pub country: &'a str,
    /// The city's continent.
    pub continent: &'a str,
    /// `"min_lat,min_lon,max_lat,max_lon"`.
    pub bbox: &'a str,
    /// `"modes_csv:names_semicolon_list"`, either half optional.
    pub networks: &'a str,
    /// Whether this city's expected counts are shaped for an overground
    /// (tram/bus/trolleybus) network rather than a rapid-transit one.
    pub overground: bool,
    /// Expected station count (rapid only).
    pub num_stations: &'a str,
    /// Expected subway line count (rapid only).
    pub num_lines: &'a str,
    /// Expected light rail line count (rapid only).
    pub num_light_lines: &'a str,
    /// Expected interchange count (rapid only).
    pub num_interchanges: &'a str,
    /// Expected tram line count (overground only).
    pub num_tram_lines: &'a str,
    /// Expected bus line count (overground only).
    pub num_bus_lines: &'a str,
    /// Expected trolleybus line count (overground only).
    pub num_trolleybus_lines: &'a str,
    /// Expected count of lines in any other overground mode.
    pub num_other_lines: &'a str,
}

/// A parsed, typed city configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct CityConfig {
    /// The city's numeric id; `0` (with a config error) if unparseable.
    pub id: i64,
    /// The city's display name.
    pub name: String,
    /// The city's country.
    pub country: String,
    /// The city's continent.
    pub continent: String,
    /// The reordered bounding box, if the input parsed.
    pub bbox: Option<BBox>,
    /// Whether this is an overground (tram/bus/trolleybus) network.
    pub overground: bool,
    /// The modes expected in this city's elements.
    pub modes: HashSet<String>,
    /// The named networks this city's routes must belong to, if restricted.
    pub networks: HashSet<String>,
    /// The declared line/station/interchange expectations.
    pub expected: ExpectedCounts,
}

/// Parses a string field as an integer. An empty `raw` falls back to
/// `default` without reporting anything; a non-empty but unparseable `raw`
/// is a config error (and yields `0` if no default was given, the default
/// otherwise) — matching the `try_fill_int_attribute` rule of the source
/// this engine reconstructs from.
fn parse_int_field(
    field_name: &str,
    raw: &str,
    default_if_empty: Option<i64>,
    diagnostics: &mut Diagnostics,
) -> i64 {
    let effective = if raw.is_empty() {
        match default_if_empty {
            Some(default) => return default,
            None => raw,
        }
    } else {
        raw
    };
    match effective.trim().parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            let shown = if effective.is_empty() { "<empty>" } else { effective };
            diagnostics.error(format!(
                "Configuration error: wrong value for {}: {}",
                field_name, shown
            ));
            0
        }
    }
}

fn default_modes(overground: bool) -> HashSet<String> {
    let defaults = if overground {
        DEFAULT_MODES_OVERGROUND
    } else {
        DEFAULT_MODES_RAPID
    };
    defaults.iter().map(|s| s.to_string()).collect()
}

/// Parses the `"modes_csv:names_semicolon_list"` grammar into a mode set
/// (falling back to this network kind's defaults when unspecified) and a
/// named-network set (empty when unspecified).
fn parse_networks(raw: &str, overground: bool) -> (HashSet<String>, HashSet<String>) {
    if raw.is_empty() {
        return (default_modes(overground), HashSet::new());
    }
    let parts: Vec<&str> = raw.split(':').collect();

    let networks = match parts.last() {
        Some(last) if !last.is_empty() => last
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => HashSet::new(),
    };

    let modes = if parts.len() < 2 || parts[0].is_empty() {
        default_modes(overground)
    } else {
        parts[0].split(',').map(|s| s.trim().to_string()).collect()
    };

    (modes, networks)
}

impl CityConfig {
    /// Parses a raw city-list row into a typed configuration, reporting any
    /// unparseable integer field as a config error on `diagnostics`.
    pub fn parse(fields: RawCityFields<'_>, diagnostics: &mut Diagnostics) -> CityConfig {
        let id = parse_int_field("id", fields.id, None, diagnostics);
        let (modes, networks) = parse_networks(fields.networks, fields.overground);
        let bbox = BBox::parse(fields.bbox);

        let expected = if fields.overground {
            ExpectedCounts::Overground {
                num_tram_lines: parse_int_field("num_tram_lines", fields.num_tram_lines, Some(0), diagnostics),
                num_bus_lines: parse_int_field("num_bus_lines", fields.num_bus_lines, Some(0), diagnostics),
                num_trolleybus_lines: parse_int_field(
                    "num_trolleybus_lines",
                    fields.num_trolleybus_lines,
                    Some(0),
                    diagnostics,
                ),
                num_other_lines: parse_int_field("num_other_lines", fields.num_other_lines, Some(0), diagnostics),
            }
        } else {
            ExpectedCounts::Rapid {
                num_stations: parse_int_field("num_stations", fields.num_stations, Some(0), diagnostics),
                num_lines: parse_int_field("num_lines", fields.num_lines, Some(0), diagnostics),
                num_light_lines: parse_int_field("num_light_lines", fields.num_light_lines, Some(0), diagnostics),
                num_interchanges: parse_int_field(
                    "num_interchanges",
                    fields.num_interchanges,
                    Some(0),
                    diagnostics,
                ),
            }
        };

        CityConfig {
            id,
            name: fields.name.to_string(),
            country: fields.country.to_string(),
            continent: fields.continent.to_string(),
            bbox,
            overground: fields.overground,
            modes,
            networks,
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rapid_fields() -> RawCityFields<'static> {
        RawCityFields {
            id: "42",
            name: "Metropolis",
            country: "Testland",
            continent: "Testamerica",
            bbox: "1.0,2.0,3.0,4.0",
            networks: "",
            overground: false,
            num_stations: "10",
            num_lines: "2",
            num_light_lines: "",
            num_interchanges: "1",
            ..Default::default()
        }
    }

    #[test]
    fn bbox_is_reordered_to_lon_lat_lon_lat() {
        let mut diagnostics = Diagnostics::new();
        let config = CityConfig::parse(rapid_fields(), &mut diagnostics);
        assert_eq!(
            config.bbox,
            Some(BBox {
                min_lon: 2.0,
                min_lat: 1.0,
                max_lon: 4.0,
                max_lat: 3.0,
            })
        );
    }

    #[test]
    fn empty_count_defaults_to_zero_without_an_error() {
        let mut diagnostics = Diagnostics::new();
        let config = CityConfig::parse(rapid_fields(), &mut diagnostics);
        assert_eq!(
            config.expected,
            ExpectedCounts::Rapid {
                num_stations: 10,
                num_lines: 2,
                num_light_lines: 0,
                num_interchanges: 1,
            }
        );
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn unparseable_count_is_a_config_error() {
        let mut fields = rapid_fields();
        fields.num_lines = "two";
        let mut diagnostics = Diagnostics::new();
        let config = CityConfig::parse(fields, &mut diagnostics);
        assert!(diagnostics.has_errors());
        assert_eq!(
            config.expected,
            ExpectedCounts::Rapid {
                num_stations: 10,
                num_lines: 0,
                num_light_lines: 0,
                num_interchanges: 1,
            }
        );
    }

    #[test]
    fn networks_grammar_splits_modes_and_names() {
        let (modes, networks) = parse_networks("subway,light_rail:Foo Metro;Bar Metro", false);
        assert_eq!(modes, ["subway", "light_rail"].into_iter().map(String::from).collect());
        assert_eq!(
            networks,
            ["Foo Metro", "Bar Metro"].into_iter().map(String::from).collect()
        );
    }

    #[test]
    fn networks_grammar_defaults_modes_when_half_missing() {
        let (modes, networks) = parse_networks(":Foo Metro", false);
        assert_eq!(modes, default_modes(false));
        assert_eq!(networks, ["Foo Metro"].into_iter().map(String::from).collect());
    }

    #[test]
    fn overground_defaults_differ_from_rapid() {
        assert_eq!(default_modes(true), ["tram", "trolleybus", "bus"].into_iter().map(String::from).collect());
        assert_eq!(default_modes(false), ["subway", "light_rail"].into_iter().map(String::from).collect());
    }
}
