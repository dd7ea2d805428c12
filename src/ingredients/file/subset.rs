//! Sorted-sequence subset check, the primitive behind `contains`.

use std::cmp::Ordering;

/// Check whether every element of `required` occurs in `haystack`.
///
/// Both slices must be sorted ascending. Returns whether `required` is a
/// subset, plus the elements of `required` not found, in their original
/// order. A single merge pass, linear in the combined length.
pub fn subset_check<T: Ord + Clone>(required: &[T], haystack: &[T]) -> (bool, Vec<T>) {
    let mut missing = Vec::new();
    let (mut a, mut b) = (0, 0);
    while a < required.len() && b < haystack.len() {
        match required[a].cmp(&haystack[b]) {
            Ordering::Equal => {
                a += 1;
                b += 1;
            }
            Ordering::Less => {
                missing.push(required[a].clone());
                a += 1;
            }
            Ordering::Greater => b += 1,
        }
    }
    missing.extend_from_slice(&required[a..]);
    (missing.is_empty(), missing)
}
