//! Dotted-numeric version comparison
//!
//! Versions are sequences of dot-separated non-negative integers. The
//! shorter sequence is padded with zeros, so `"1.2"` and `"1.2.0"` compare
//! equal - that is intentional, not an accident of parsing.

use std::cmp::Ordering;

/// Compare two dotted-numeric version strings component-wise.
///
/// Non-numeric components are treated as 0.
pub fn compare(a: &str, b: &str) -> Ordering {
    let left: Vec<u64> = a.split('.').map(|p| p.parse().unwrap_or(0)).collect();
    let right: Vec<u64> = b.split('.').map(|p| p.parse().unwrap_or(0)).collect();

    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Whether `installed` satisfies a minimum `required` version.
pub fn is_compatible(installed: &str, required: &str) -> bool {
    compare(installed, required) != Ordering::Less
}
