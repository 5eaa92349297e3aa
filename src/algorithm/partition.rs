use crate::algorithm::tolerance::ppm_difference;

/// Sorts `items` along `axis` and splits the sorted sequence into contiguous
/// blocks wherever the ppm gap between neighbors exceeds `ppm_tolerance`.
///
/// The gap test is against the immediately preceding element, not the block's
/// first element, so a chain of small gaps can carry a block's total span
/// beyond the tolerance. That chain behavior is deliberate: downstream
/// mergers re-test every candidate pair against the tolerance box, the
/// partition only has to guarantee that no in-tolerance pair is split across
/// blocks. Ties always co-partition; empty input yields no blocks.
pub fn partition_by_gap<T, F>(mut items: Vec<T>, axis: F, ppm_tolerance: f64) -> Vec<Vec<T>>
where
    F: Fn(&T) -> f64,
{
    if items.is_empty() {
        return Vec::new();
    }
    items.sort_by(|a, b| axis(a).total_cmp(&axis(b)));

    let mut blocks: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut previous: Option<f64> = None;

    for item in items {
        let value = axis(&item);
        if let Some(prev) = previous {
            if ppm_difference(value, prev).abs() > ppm_tolerance {
                blocks.push(std::mem::take(&mut current));
            }
        }
        previous = Some(value);
        current.push(item);
    }
    blocks.push(current);
    blocks
}

/// Index-based variant of [`partition_by_gap`]: returns blocks of indices
/// into `items` so callers can keep the collection itself immutable (the
/// linkage merger clusters against a shared track slice).
pub fn partition_indices_by_gap<T, F>(items: &[T], axis: F, ppm_tolerance: f64) -> Vec<Vec<usize>>
where
    F: Fn(&T) -> f64,
{
    if items.is_empty() {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| axis(&items[a]).total_cmp(&axis(&items[b])));

    let mut blocks: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut previous: Option<f64> = None;

    for idx in order {
        let value = axis(&items[idx]);
        if let Some(prev) = previous {
            if ppm_difference(value, prev).abs() > ppm_tolerance {
                blocks.push(std::mem::take(&mut current));
            }
        }
        previous = Some(value);
        current.push(idx);
    }
    blocks.push(current);
    blocks
}
