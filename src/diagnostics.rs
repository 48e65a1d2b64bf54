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

//! Per-city diagnostics collection. Unlike [`EngineError`](crate::city::EngineError),
//! which aborts processing of the current city, every diagnostic here is
//! recorded and processing continues; the accumulated messages are surfaced
//! in the final [`ValidationReport`](crate::report::ValidationReport).

use crate::element::RawElement;
use serde::{Deserialize, Serialize};

/// The three severities a diagnostic can carry, in ascending order of
/// importance. `Notice` flags something worth knowing about but almost
/// certainly benign; `Warning` flags something likely wrong that the engine
/// could still route around; `Error` flags something that invalidates the
/// object it's attached to (but not necessarily the whole city).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational; no action implied.
    Notice,
    /// Likely a problem; the engine proceeded with a fallback or best guess.
    Warning,
    /// The affected object (station, route, ...) was rejected or degraded.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// One recorded diagnostic: a severity, a message, and the text already
/// formatted with the trailing `(kind id, "name")` element reference, if one
/// was given.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The diagnostic's severity.
    pub severity: Severity,
    /// The fully formatted message, including the element suffix if any.
    pub message: String,
}

/// Formats the `(kind id, "name")` suffix appended to messages that concern
/// a specific element, e.g. `(way 123, "Main Street")`. The name is omitted
/// when the element carries none.
pub fn format_element_ref(element: &RawElement) -> String {
    let name = element.display_name();
    if name.is_empty() {
        format!("({})", element.id)
    } else {
        format!("({}, \"{}\")", element.id, name)
    }
}

/// The diagnostics sink for a single city's validation run. Messages
/// accumulate in insertion order within each severity, mirroring the
/// separate notice/warning/error lists the engine reports on.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    notices: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Diagnostics {
    /// Builds an empty sink.
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Records a notice.
    pub fn notice(&mut self, message: impl Into<String>) {
        self.notices.push(message.into());
    }

    /// Records a notice about a specific element, appending its reference.
    pub fn notice_at(&mut self, message: impl std::fmt::Display, element: &RawElement) {
        self.notice(format!("{} {}", message, format_element_ref(element)));
    }

    /// Records a warning.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Records a warning about a specific element, appending its reference.
    pub fn warning_at(&mut self, message: impl std::fmt::Display, element: &RawElement) {
        self.warning(format!("{} {}", message, format_element_ref(element)));
    }

    /// Records an error.
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Records an error about a specific element, appending its reference.
    pub fn error_at(&mut self, message: impl std::fmt::Display, element: &RawElement) {
        self.error(format!("{} {}", message, format_element_ref(element)));
    }

    /// The recorded notices, in insertion order.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// The recorded warnings, in insertion order.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The recorded errors, in insertion order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Whether any error has been recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Merges another sink's diagnostics into this one, preserving relative
    /// order within each severity. Used when cross-city passes (like
    /// transfer detection) need to report against the aggregate.
    pub fn extend(&mut self, other: Diagnostics) {
        self.notices.extend(other.notices);
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::RawElement;
    use crate::geo_utils::Coord;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_element_ref_with_and_without_a_name() {
        let named = RawElement::node(1, Coord::new(0.0, 0.0)).with_tags([("name", "Central")]);
        assert_eq!(format_element_ref(&named), "(node 1, \"Central\")");

        let unnamed = RawElement::node(2, Coord::new(0.0, 0.0));
        assert_eq!(format_element_ref(&unnamed), "(node 2)");
    }

    #[test]
    fn has_errors_reflects_only_the_error_list() {
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());
        diagnostics.warning("a warning");
        assert!(!diagnostics.has_errors());
        diagnostics.error("an error");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn preserves_insertion_order_per_severity() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.notice("first");
        diagnostics.notice("second");
        assert_eq!(diagnostics.notices(), ["first", "second"]);
    }
}
