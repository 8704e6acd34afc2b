// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Typed assessment results and the steps that produce them from raw text

pub mod consistency;
pub mod extract;
pub mod schema;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::media::ViewType;

/// Placeholder for a measurement that could not be read
pub const NOT_AVAILABLE: &str = "not available";

/// A tyre-size field: a concrete reading or the sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeField {
    Value(String),
    NotAvailable,
}

impl SizeField {
    pub fn is_available(&self) -> bool {
        matches!(self, SizeField::Value(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            SizeField::Value(v) => v,
            SizeField::NotAvailable => NOT_AVAILABLE,
        }
    }
}

impl From<&str> for SizeField {
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case(NOT_AVAILABLE) {
            SizeField::NotAvailable
        } else {
            SizeField::Value(s.trim().to_string())
        }
    }
}

impl Serialize for SizeField {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SizeField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SizeField::from(s.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TyreSize {
    pub width: SizeField,
    pub aspect_ratio: SizeField,
    pub wheel_diameter: SizeField,
    pub full_size: SizeField,
    pub is_image_clear: bool,
}

impl TyreSize {
    /// Every field set to the sentinel
    pub fn unreadable() -> Self {
        Self {
            width: SizeField::NotAvailable,
            aspect_ratio: SizeField::NotAvailable,
            wheel_diameter: SizeField::NotAvailable,
            full_size: SizeField::NotAvailable,
            is_image_clear: false,
        }
    }

    pub fn measurements_available(&self) -> bool {
        self.width.is_available() && self.aspect_ratio.is_available() && self.wheel_diameter.is_available()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyInfo {
    pub is_safe_to_drive: bool,
    pub visible_damage: bool,
    pub sufficient_tread: bool,
    pub uneven_wear: bool,
    pub needs_replacement: bool,
}

/// Free-text rationale behind each safety flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanations {
    pub safety: String,
    pub damage: String,
    pub tread: String,
    pub wear: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tyre_size: Option<TyreSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<SafetyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanations: Option<Explanations>,
}

impl AnalysisResult {
    pub fn sidewall(tyre_size: TyreSize) -> Self {
        Self { tyre_size: Some(tyre_size), ..Self::default() }
    }

    pub fn tread(safety: SafetyInfo, explanations: Explanations) -> Self {
        Self {
            safety: Some(safety),
            explanations: Some(explanations),
            ..Self::default()
        }
    }
}

/// Results committed so far in one pipeline invocation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisState {
    results: BTreeMap<ViewType, AnalysisResult>,
}

impl AnalysisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed result for a view, if any
    pub fn get(&self, view: ViewType) -> Option<&AnalysisResult> {
        self.results.get(&view)
    }

    pub fn is_committed(&self, view: ViewType) -> bool {
        self.results.contains_key(&view)
    }

    pub fn views(&self) -> impl Iterator<Item = ViewType> + '_ {
        self.results.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub(crate) fn commit(&mut self, view: ViewType, result: AnalysisResult) {
        self.results.insert(view, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_size_field_wire_format() {
        assert_eq!(serde_json::to_value(SizeField::NotAvailable).unwrap(), json!("not available"));
        assert_eq!(serde_json::to_value(SizeField::from("205")).unwrap(), json!("205"));
        assert_eq!(SizeField::from(" Not Available "), SizeField::NotAvailable);
    }

    #[test]
    fn test_result_omits_absent_sections() {
        let result = AnalysisResult::sidewall(TyreSize::unreadable());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"tyreSize": {
                "width": "not available",
                "aspectRatio": "not available",
                "wheelDiameter": "not available",
                "fullSize": "not available",
                "isImageClear": false
            }})
        );
    }

    #[test]
    fn test_state_serializes_by_view_name() {
        let mut state = AnalysisState::new();
        state.commit(ViewType::SidewallView, AnalysisResult::sidewall(TyreSize::unreadable()));

        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("sidewallView").is_some());
        assert!(value.get("treadView").is_none());

        let back: AnalysisState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
