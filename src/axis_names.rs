// src/axis_names.rs
//
// Spatial axis labels for position triples, used in log fields and diagnostics.

/// Number of spatial axes per tracked point
pub const AXIS_COUNT: usize = 3;

/// Labels in column order of a position triple
pub const AXIS_NAMES: [&str; AXIS_COUNT] = ["X", "Y", "Z"];

/// Label of position axis `index` (0 = X, 1 = Y, 2 = Z).
///
/// Panics for any other index; callers iterate over `0..AXIS_COUNT`.
pub fn axis_name(index: usize) -> &'static str {
    match AXIS_NAMES.get(index) {
        Some(name) => name,
        None => panic!("Position axis index {index} out of range (expected 0..{AXIS_COUNT})"),
    }
}


// src/axis_names.rs
