//! Document-level fan-out

use rayon::prelude::*;

/// Apply `f` to every item, on the rayon pool when `parallel` is set.
///
/// Results keep the order of `items` either way.
pub(crate) fn map_items<I, T, F>(items: &[I], parallel: bool, f: F) -> Vec<T>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_kept() {
        let items: Vec<u32> = (0..100).collect();
        let sequential = map_items(&items, false, |n| n * 2);
        let parallel = map_items(&items, true, |n| n * 2);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[99], 198);
    }
}
