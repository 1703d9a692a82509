//! Weighted variant selection.
//!
//! A pure function over the active variants and an injectable random
//! source, so distribution properties are verifiable with a seeded
//! generator. Selection is a cumulative-weight binary search: draw a
//! number in `[0, total)` and find the first cumulative weight above it.

use rand::{Rng, RngExt};

use crate::storage::Variant;

/// Select one variant by weighted random draw.
///
/// Inactive and zero-weight variants never win. Returns `None` when the
/// active weight total is zero, in which case the caller falls back to
/// the link's primary destination.
pub fn select<'a, R: Rng + ?Sized>(variants: &'a [Variant], rng: &mut R) -> Option<&'a Variant> {
    let mut cumulative: Vec<(u64, &Variant)> = Vec::with_capacity(variants.len());
    let mut total: u64 = 0;

    for variant in variants {
        if !variant.active || variant.weight == 0 {
            continue;
        }
        total += u64::from(variant.weight);
        cumulative.push((total, variant));
    }

    if total == 0 {
        return None;
    }

    let draw = rng.random_range(0..total);
    let idx = cumulative.partition_point(|(bound, _)| *bound <= draw);
    Some(cumulative[idx].1)
}
