//! Area name abbreviation.
//!
//! The prefix list is empirically derived German administrative phrasing
//! (see spec.md §9 Open Questions: "treat the list as data, not code").
//! Grounded literally on
//! `examples/original_source/src/mowas.py`'s `area_desc.replace(...)` chain.

/// Well-known German administrative prefixes stripped, in order, from the
/// start of an area description to produce its abbreviated form. Only the
/// first occurrence of each is removed, and removal stops at the first
/// prefix that matches (mirroring the Python original, which chains
/// `str.replace(prefix, "", 1)` calls — later prefixes can still fire on
/// what remains, so this is a fixed, ordered pipeline, not a single match).
const PREFIXES: &[&str] = &[
    "Gemeinde/Stadt: ",
    "Landkreis/Stadt: ",
    "Bundesland: ",
    "Freistaat ",
    "Freie Hansestadt ",
    "Land: ",
    "Land ",
];

/// Derive the abbreviated form of an area description by stripping the
/// first occurrence of each known administrative prefix, in order.
pub fn abbreviate_area(area_desc: &str) -> String {
    let mut result = area_desc.to_owned();
    for prefix in PREFIXES {
        if let Some(pos) = result.find(prefix) {
            result.replace_range(pos..pos + prefix.len(), "");
        }
    }
    result
}
