// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tyrescan::assessment::{consistency, extract, schema};
use tyrescan::config::SchemaProfile;
use tyrescan::media::ViewType;

#[derive(Arbitrary, Debug)]
struct Input {
    sidewall: bool,
    legacy: bool,
    raw: String,
}

fuzz_target!(|input: Input| {
    let Ok(json) = extract::extract_json(&input.raw) else {
        return;
    };

    // Extracted spans are always brace-delimited
    assert!(json.starts_with('{') && json.ends_with('}'));

    let view = if input.sidewall { ViewType::SidewallView } else { ViewType::TreadView };
    let profile = if input.legacy { SchemaProfile::LegacyFlat } else { SchemaProfile::Nested };

    if let Ok(result) = schema::validate(view, &json, profile) {
        let once = consistency::enforce_result(result);
        assert_eq!(consistency::enforce_result(once.clone()), once);
    }
});
