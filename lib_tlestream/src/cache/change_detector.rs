//! # Change Detector
//!
//! Decides whether a freshly fetched record is worth a broadcast.

/// `true` unless `old` exists and equals `new` line for line.
///
/// A missing previous record is always a change. An empty `new` is compared
/// like any other value.
pub fn has_changed(old: Option<&[String]>, new: &[String]) -> bool {
    match old {
        None => true,
        Some(old) => old != new,
    }
}
