// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! All-or-nothing disclosure of tyre size readings

use tracing::debug;

use super::{AnalysisResult, SizeField, TyreSize};

/// Apply the size invariant: `fullSize` is concrete iff width, aspect ratio
/// and wheel diameter all are.
///
/// A partial reading is discarded entirely and `isImageClear` forced to
/// false, whatever the backend claimed. A complete reading without a
/// `fullSize` gets one composed from its parts. Idempotent.
pub fn enforce(size: TyreSize) -> TyreSize {
    if !size.measurements_available() {
        if size.is_image_clear || size.full_size.is_available() {
            debug!(
                "Discarding partial tyre size {}/{}R{} ({})",
                size.width.as_str(),
                size.aspect_ratio.as_str(),
                size.wheel_diameter.as_str(),
                size.full_size.as_str()
            );
        }
        return TyreSize::unreadable();
    }

    if size.full_size.is_available() {
        return size;
    }

    let full_size = SizeField::Value(format!(
        "{}/{}R{}",
        size.width.as_str(),
        size.aspect_ratio.as_str(),
        size.wheel_diameter.as_str()
    ));
    TyreSize { full_size, ..size }
}

/// Enforce the size invariant on a result's `tyreSize`, if present
pub fn enforce_result(mut result: AnalysisResult) -> AnalysisResult {
    result.tyre_size = result.tyre_size.map(enforce);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(w: &str, a: &str, d: &str, full: &str, clear: bool) -> TyreSize {
        TyreSize {
            width: SizeField::from(w),
            aspect_ratio: SizeField::from(a),
            wheel_diameter: SizeField::from(d),
            full_size: SizeField::from(full),
            is_image_clear: clear,
        }
    }

    #[test]
    fn test_partial_reading_collapses() {
        let na = "not available";
        let partials = [
            size("215", "55", na, "215/55R?", true),
            size(na, "55", "17", "?/55R17", true),
            size("215", na, "17", na, false),
            size(na, na, na, "215/55R17", true),
        ];
        for input in partials {
            assert_eq!(enforce(input), TyreSize::unreadable());
        }
    }

    #[test]
    fn test_complete_reading_kept() {
        let input = size("205", "55", "16", "205/55R16", true);
        assert_eq!(enforce(input.clone()), input);
    }

    #[test]
    fn test_missing_full_size_composed() {
        let out = enforce(size("195", "65", "15", "not available", true));
        assert_eq!(out.full_size.as_str(), "195/65R15");
        assert!(out.is_image_clear);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            size("215", "55", "not available", "215/55R?", true),
            size("205", "55", "16", "not available", false),
            size("205", "55", "16", "205/55R16", true),
        ];
        for input in inputs {
            let once = enforce(input);
            assert_eq!(enforce(once.clone()), once);
        }
    }

    #[test]
    fn test_enforce_result_leaves_tread_alone() {
        let result = AnalysisResult::default();
        assert_eq!(enforce_result(result.clone()), result);
    }
}
