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

//! Tag-based element classification. These are total, side-effect-free
//! predicates over a [`RawElement`]'s tags; they never consult the index, so
//! they can be called while iterating over it.

use crate::element::{ElementKind, RawElement};

/// Every public transport mode the engine recognizes.
pub const ALL_MODES: &[&str] = &[
    "subway",
    "light_rail",
    "monorail",
    "train",
    "tram",
    "trolleybus",
    "bus",
    "aerialway",
    "ferry",
];

/// The modes a "rapid transit" network defaults to when a city's `networks`
/// configuration leaves the mode set unspecified.
pub const DEFAULT_MODES_RAPID: &[&str] = &["subway", "light_rail"];

/// The modes an "overground" network defaults to when a city's `networks`
/// configuration leaves the mode set unspecified.
pub const DEFAULT_MODES_OVERGROUND: &[&str] = &["tram", "trolleybus", "bus"];

/// `railway=*` values that denote a running track (as opposed to a platform,
/// a signal, or other trackside infrastructure).
pub const RAILWAY_TRACK_TYPES: &[&str] =
    &["rail", "light_rail", "subway", "monorail", "tram", "narrow_gauge"];

/// Tag keys whose presence marks an element as not-yet-built.
pub const CONSTRUCTION_KEYS: &[&str] = &["construction", "proposed", "planned", "disused"];

/// Whether `element` is a stop position (`railway=stop` or
/// `public_transport=stop_position`).
pub fn is_stop(element: &RawElement) -> bool {
    element.tag("railway") == Some("stop") || element.tag("public_transport") == Some("stop_position")
}

/// Whether `element` is a platform (`railway ∈ {platform, platform_edge}` or
/// `public_transport=platform`).
pub fn is_platform(element: &RawElement) -> bool {
    matches!(element.tag("railway"), Some("platform") | Some("platform_edge"))
        || element.tag("public_transport") == Some("platform")
}

/// Whether `element` is a subway/light rail/tram entrance.
pub fn is_entrance(element: &RawElement) -> bool {
    element.tag("railway") == Some("subway_entrance")
        || element.tag("railway") == Some("train_station_entrance")
}

/// Whether `element` is a way carrying a running track for any recognized
/// rail-based mode, not under construction.
pub fn is_track(element: &RawElement) -> bool {
    if element.id.kind != ElementKind::Way || element.is_under_construction() {
        return false;
    }
    element
        .tag("railway")
        .map(|v| RAILWAY_TRACK_TYPES.contains(&v))
        .unwrap_or(false)
}

/// Whether `element` is a route relation (`type=route` with a recognized
/// `route=*` mode).
pub fn is_route(element: &RawElement) -> bool {
    element.id.kind == ElementKind::Relation
        && element.tag("type") == Some("route")
        && element
            .tag("route")
            .map(|v| ALL_MODES.contains(&v))
            .unwrap_or(false)
}

/// Whether `element` is a route master relation (`type=route_master`).
pub fn is_route_master(element: &RawElement) -> bool {
    element.id.kind == ElementKind::Relation && element.tag("type") == Some("route_master")
}

/// Whether `element` is a `public_transport=stop_area` relation.
pub fn is_stop_area(element: &RawElement) -> bool {
    element.id.kind == ElementKind::Relation
        && element.tag("type") == Some("public_transport")
        && element.tag("public_transport") == Some("stop_area")
}

/// Whether `element` is a `public_transport=stop_area_group` relation.
pub fn is_stop_area_group(element: &RawElement) -> bool {
    element.id.kind == ElementKind::Relation
        && element.tag("type") == Some("public_transport")
        && element.tag("public_transport") == Some("stop_area_group")
}

/// Whether access to `element` is restricted in a way that should exclude
/// it from a route (`access=no` or `access=private`).
pub fn is_access_restricted(element: &RawElement) -> bool {
    matches!(element.tag("access"), Some("no") | Some("private"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::RawElement;
    use crate::geo_utils::Coord;

    fn node_with(tags: &[(&str, &str)]) -> RawElement {
        RawElement::node(1, Coord::new(0.0, 0.0)).with_tags(tags.iter().copied())
    }

    #[test]
    fn recognizes_stop_positions_and_platforms_distinctly() {
        let stop = node_with(&[("railway", "stop")]);
        let platform = node_with(&[("public_transport", "platform")]);
        assert!(is_stop(&stop) && !is_platform(&stop));
        assert!(is_platform(&platform) && !is_stop(&platform));
    }

    #[test]
    fn recognizes_platform_edge_and_stop_position() {
        assert!(is_platform(&node_with(&[("railway", "platform_edge")])));
        assert!(is_stop(&node_with(&[("public_transport", "stop_position")])));
    }

    #[test]
    fn narrow_gauge_is_a_track_type() {
        assert!(RAILWAY_TRACK_TYPES.contains(&"narrow_gauge"));
    }

    #[test]
    fn entrance_tag_alone_without_railway_entrance_value_is_not_an_entrance() {
        assert!(!is_entrance(&node_with(&[
            ("entrance", "yes"),
            ("railway", "level_crossing"),
        ])));
    }

    #[test]
    fn access_no_and_private_are_restricted() {
        assert!(is_access_restricted(&node_with(&[("access", "no")])));
        assert!(is_access_restricted(&node_with(&[("access", "private")])));
        assert!(!is_access_restricted(&node_with(&[("access", "yes")])));
    }
}
