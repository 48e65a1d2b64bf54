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

//! `subway_validator` validates and reconstructs urban rail transit networks
//! (subway, light rail, tram, bus, trolleybus) from a flat collection of
//! tagged map elements (nodes, ways, relations) and per-city metadata.
//!
//! The crate is the pure transformation at the heart of such a pipeline: it
//! does not fetch or parse raw map data, does not load city configuration
//! lists, and does not emit GeoJSON or any other report format. Those are
//! adapters that sit on either side of [`validate_city`].
//!
//! # Pipeline
//!
//! 1. [`ElementIndex`](index::ElementIndex) indexes the raw elements.
//! 2. [`StationResolver`](stop_area::StationResolver) promotes elements to
//!    [`Station`](station::Station)s and clusters them into
//!    [`StopArea`](stop_area::StopArea)s and [`Transfer`](stop_area::Transfer)s.
//! 3. The route assembler (see [`route`]) turns route relations into ordered
//!    [`Route`](route::Route)s of [`RouteStop`](route::RouteStop)s.
//! 4. [`track_geometry`] stitches track ways and projects stops onto them.
//! 5. [`MasterAggregator`](route_master::MasterAggregator) groups routes
//!    under [`RouteMaster`](route_master::RouteMaster)s and pairs twins.
//!
//! All diagnostics are collected in a single [`Diagnostics`](diagnostics::Diagnostics)
//! sink per city; the final [`ValidationReport`](report::ValidationReport) is
//! returned once [`City::validate`](city::City::validate) completes.

#![deny(missing_docs)]

pub mod city;
pub mod classify;
pub mod colour;
pub mod config;
pub mod diagnostics;
pub mod element;
pub mod geo_utils;
pub mod index;
pub mod recovery;
pub mod report;
pub mod route;
pub mod route_master;
pub mod station;
pub mod stop_area;
pub mod track_geometry;

pub use crate::city::{find_transfers, validate_city, City, EngineError};
pub use crate::config::CityConfig;
pub use crate::report::ValidationReport;

/// The error type used by the crate for non-diagnostic failures.
pub type Error = anyhow::Error;

/// The corresponding result type used by the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
