//! Order-insensitive, multiplicity-aware containment check.

/// Checks that every element of `reference` occurs in `candidate`, ignoring
/// order but respecting duplicates.
///
/// Each matched reference element consumes one equal occurrence from a
/// working copy of `candidate`, so an element appearing `k` times in
/// `reference` needs at least `k` occurrences in `candidate`. Returns whether
/// everything matched, plus the reference elements left unmatched.
///
/// If either side is empty the result is `(false, [])`.
pub fn is_subsequence_unordered<T: PartialEq + Clone>(
    reference: &[T],
    candidate: &[T],
) -> (bool, Vec<T>) {
    if reference.is_empty() || candidate.is_empty() {
        return (false, Vec::new());
    }

    let mut remaining: Vec<&T> = candidate.iter().collect();
    let mut missing = Vec::new();

    for item in reference {
        match remaining.iter().position(|c| *c == item) {
            Some(idx) => {
                remaining.swap_remove(idx);
            }
            None => missing.push(item.clone()),
        }
    }

    (missing.is_empty(), missing)
}
