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

//! Colour tag normalization: OSM `colour`/`colour:infill` values are either
//! a `#RRGGBB` hex string or a named CSS colour; anything else is invalid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// A normalized RGB colour.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub red: u8,
    /// Green channel.
    pub green: u8,
    /// Blue channel.
    pub blue: u8,
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

/// Why a colour string failed to normalize.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ColourError {
    /// The `#RRGGBB` body was not valid hexadecimal.
    #[error("'{0}' is not a valid hexadecimal colour")]
    NotHexa(String),
    /// Neither a recognized hex form nor a known CSS colour name.
    #[error("'{0}' is not a hex colour or a recognized CSS colour name")]
    Unrecognized(String),
}

fn parse_hex(body: &str) -> Result<Rgb, ColourError> {
    if body.len() != 6 {
        return Err(ColourError::NotHexa(body.to_string()));
    }
    let value = u32::from_str_radix(body, 16).map_err(|_| ColourError::NotHexa(body.to_string()))?;
    Ok(Rgb {
        red: (value >> 16) as u8,
        green: (value >> 8) as u8,
        blue: value as u8,
    })
}

impl FromStr for Rgb {
    type Err = ColourError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Some(body) = trimmed.strip_prefix('#') {
            return parse_hex(body);
        }
        if let Ok(rgb) = parse_hex(trimmed) {
            return Ok(rgb);
        }
        CSS_COLOURS
            .get(trimmed.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| ColourError::Unrecognized(trimmed.to_string()))
    }
}

macro_rules! css_colours {
    ($(($name:expr, $r:expr, $g:expr, $b:expr)),* $(,)?) => {
        lazy_static::lazy_static! {
            static ref CSS_COLOURS: HashMap<&'static str, Rgb> = {
                let mut m = HashMap::new();
                $(m.insert($name, Rgb { red: $r, green: $g, blue: $b });)*
                m
            };
        }
    };
}

// A working subset of the CSS named-colour table; OSM transit data
// overwhelmingly sticks to this set plus hex codes.
css_colours![
    ("black", 0, 0, 0),
    ("white", 255, 255, 255),
    ("red", 255, 0, 0),
    ("green", 0, 128, 0),
    ("blue", 0, 0, 255),
    ("yellow", 255, 255, 0),
    ("orange", 255, 165, 0),
    ("purple", 128, 0, 128),
    ("pink", 255, 192, 203),
    ("brown", 165, 42, 42),
    ("gray", 128, 128, 128),
    ("grey", 128, 128, 128),
    ("darkgray", 169, 169, 169),
    ("darkgrey", 169, 169, 169),
    ("lightgray", 211, 211, 211),
    ("lightgrey", 211, 211, 211),
    ("cyan", 0, 255, 255),
    ("magenta", 255, 0, 255),
    ("lime", 0, 255, 0),
    ("maroon", 128, 0, 0),
    ("navy", 0, 0, 128),
    ("olive", 128, 128, 0),
    ("teal", 0, 128, 128),
    ("silver", 192, 192, 192),
    ("gold", 255, 215, 0),
    ("indigo", 75, 0, 130),
    ("violet", 238, 130, 238),
    ("turquoise", 64, 224, 208),
    ("salmon", 250, 128, 114),
    ("khaki", 240, 230, 140),
    ("crimson", 220, 20, 60),
    ("coral", 255, 127, 80),
    ("chocolate", 210, 105, 30),
    ("darkgreen", 0, 100, 0),
    ("darkred", 139, 0, 0),
    ("darkblue", 0, 0, 139),
    ("lightblue", 173, 216, 230),
    ("lightgreen", 144, 238, 144),
    ("skyblue", 135, 206, 235),
    ("beige", 245, 245, 220),
];

/// Normalizes an optional colour tag value. A missing value normalizes to
/// `None` without error. An unrecognized non-empty value is an error the
/// caller should report as a warning and then fall back to `None`, per
/// spec §6.
pub fn normalize_colour(value: Option<&str>) -> Result<Option<Rgb>, ColourError> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => Rgb::from_str(v).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_hex_with_and_without_hash() {
        assert_eq!(
            Rgb::from_str("#FF0000").unwrap(),
            Rgb {
                red: 255,
                green: 0,
                blue: 0
            }
        );
        assert_eq!(
            Rgb::from_str("00FF00").unwrap(),
            Rgb {
                red: 0,
                green: 255,
                blue: 0
            }
        );
    }

    #[test]
    fn parses_named_css_colour_case_insensitively() {
        assert_eq!(
            Rgb::from_str("Red").unwrap(),
            Rgb {
                red: 255,
                green: 0,
                blue: 0
            }
        );
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(Rgb::from_str("not-a-colour").is_err());
    }

    #[test]
    fn normalize_colour_treats_missing_as_none() {
        assert_eq!(normalize_colour(None).unwrap(), None);
        assert_eq!(normalize_colour(Some("")).unwrap(), None);
    }

    #[test]
    fn normalize_colour_surfaces_parse_error() {
        assert!(normalize_colour(Some("plaid")).is_err());
    }
}
