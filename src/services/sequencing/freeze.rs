//! Freeze-first constraint

/// Rotate `tour` so that `depot` comes first.
///
/// Everything after the depot follows it, then everything that was before
/// it; the relative order of the other stops is kept. A tour that already
/// starts with the depot (or does not contain it) is returned unchanged.
pub fn freeze_first(tour: &[usize], depot: usize) -> Vec<usize> {
    match tour.iter().position(|&w| w == depot) {
        Some(p) if p > 0 => {
            let mut rotated = Vec::with_capacity(tour.len());
            rotated.push(depot);
            rotated.extend_from_slice(&tour[p + 1..]);
            rotated.extend_from_slice(&tour[..p]);
            rotated
        }
        _ => tour.to_vec(),
    }
}
