// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Per-view validation of extracted JSON into typed results

use serde_json::{Map, Value};

use super::{AnalysisResult, Explanations, SafetyInfo, SizeField, TyreSize, NOT_AVAILABLE};
use crate::config::SchemaProfile;
use crate::media::ViewType;
use crate::{Result, TyrescanError};

type Object = Map<String, Value>;

/// Parse `json` and check it against the shape expected for `view`.
///
/// Fails on the first missing or mistyped required field. Extra fields are
/// ignored.
pub fn validate(view: ViewType, json: &str, profile: SchemaProfile) -> Result<AnalysisResult> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| TyrescanError::Schema(format!("response is not valid JSON: {}", e)))?;
    let root = value
        .as_object()
        .ok_or_else(|| TyrescanError::Schema("response is not a JSON object".to_string()))?;

    match view {
        ViewType::SidewallView => {
            let size = match profile {
                SchemaProfile::Nested => tyre_size(object(root, "tyreSize", "tyreSize")?, "tyreSize.")?,
                SchemaProfile::LegacyFlat => legacy_tyre_size(root)?,
            };
            Ok(AnalysisResult::sidewall(size))
        }
        ViewType::TreadView => {
            let safety = safety_info(object(root, "safety", "safety")?)?;
            let explanations = explanations(object(root, "explanations", "explanations")?)?;
            Ok(AnalysisResult::tread(safety, explanations))
        }
    }
}

fn field<'a>(obj: &'a Object, key: &str, path: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| TyrescanError::Schema(format!("missing field {}", path)))
}

fn object<'a>(obj: &'a Object, key: &str, path: &str) -> Result<&'a Object> {
    field(obj, key, path)?
        .as_object()
        .ok_or_else(|| mistyped(path, "an object"))
}

fn boolean(obj: &Object, key: &str, path: &str) -> Result<bool> {
    field(obj, key, path)?
        .as_bool()
        .ok_or_else(|| mistyped(path, "a boolean"))
}

fn mistyped(path: &str, expected: &str) -> TyrescanError {
    TyrescanError::Schema(format!("{}: expected {}", path, expected))
}

/// Width, aspect ratio or rim diameter
fn measurement(value: &Value, path: &str) -> Result<SizeField> {
    let expected = "a positive number or \"not available\"";
    match value {
        Value::Null => Ok(SizeField::NotAvailable),
        Value::Number(n) => match n.as_f64() {
            Some(x) if x > 0.0 => Ok(SizeField::Value(n.to_string())),
            _ => Err(mistyped(path, expected)),
        },
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case(NOT_AVAILABLE) {
                return Ok(SizeField::NotAvailable);
            }
            match s.parse::<f64>() {
                Ok(x) if x.is_finite() && x > 0.0 => Ok(SizeField::Value(s.to_string())),
                _ => Err(mistyped(path, expected)),
            }
        }
        _ => Err(mistyped(path, expected)),
    }
}

fn full_size(value: &Value, path: &str) -> Result<SizeField> {
    match value {
        Value::Null => Ok(SizeField::NotAvailable),
        Value::String(s) if !s.trim().is_empty() => Ok(SizeField::from(s.as_str())),
        _ => Err(mistyped(path, "a non-empty string")),
    }
}

fn tyre_size(obj: &Object, prefix: &str) -> Result<TyreSize> {
    let path = |key: &str| format!("{}{}", prefix, key);

    Ok(TyreSize {
        width: measurement(field(obj, "width", &path("width"))?, &path("width"))?,
        aspect_ratio: measurement(field(obj, "aspectRatio", &path("aspectRatio"))?, &path("aspectRatio"))?,
        wheel_diameter: measurement(field(obj, "wheelDiameter", &path("wheelDiameter"))?, &path("wheelDiameter"))?,
        full_size: full_size(field(obj, "fullSize", &path("fullSize"))?, &path("fullSize"))?,
        is_image_clear: boolean(obj, "isImageClear", &path("isImageClear"))?,
    })
}

/// Older flat schema: size fields at the top level, clarity flag optional
fn legacy_tyre_size(root: &Object) -> Result<TyreSize> {
    let mut size = TyreSize {
        width: measurement(field(root, "width", "width")?, "width")?,
        aspect_ratio: measurement(field(root, "aspectRatio", "aspectRatio")?, "aspectRatio")?,
        wheel_diameter: measurement(field(root, "wheelDiameter", "wheelDiameter")?, "wheelDiameter")?,
        full_size: full_size(field(root, "fullSize", "fullSize")?, "fullSize")?,
        is_image_clear: false,
    };
    size.is_image_clear = match root.get("isImageClear") {
        Some(v) => v.as_bool().ok_or_else(|| mistyped("isImageClear", "a boolean"))?,
        None => size.measurements_available(),
    };
    Ok(size)
}

fn safety_info(obj: &Object) -> Result<SafetyInfo> {
    Ok(SafetyInfo {
        is_safe_to_drive: boolean(obj, "isSafeToDrive", "safety.isSafeToDrive")?,
        visible_damage: boolean(obj, "visibleDamage", "safety.visibleDamage")?,
        sufficient_tread: boolean(obj, "sufficientTread", "safety.sufficientTread")?,
        uneven_wear: boolean(obj, "unevenWear", "safety.unevenWear")?,
        needs_replacement: boolean(obj, "needsReplacement", "safety.needsReplacement")?,
    })
}

fn explanations(obj: &Object) -> Result<Explanations> {
    let text = |key: &str| -> Result<String> {
        let path = format!("explanations.{}", key);
        match field(obj, key, &path)? {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(mistyped(&path, "a non-empty string")),
        }
    };

    Ok(Explanations {
        safety: text("safety")?,
        damage: text("damage")?,
        tread: text("tread")?,
        wear: text("wear")?,
        replacement: text("replacement")?,
    })
}
