//! Row iteration that is parallel only when asked for.
//!
//! Per-row loops are written as `(0..rows).into_par_iter().flat_map(..)`.
//! With the `parallel` feature that resolves to rayon; without it the same
//! chain runs on plain std iterators, which is the default.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Stand-in for `rayon::prelude::IntoParallelIterator` that just calls
    /// `into_iter()`, so `.flat_map()` and `.collect()` are the std ones.
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_flat_map_keeps_order() {
        let out: Vec<usize> = (0..3usize)
            .into_par_iter()
            .flat_map(|row| vec![row * 10, row * 10 + 1])
            .collect();
        assert_eq!(out, vec![0, 1, 10, 11, 20, 21]);
    }
}
