//! Sequential or rayon-backed iteration, selected by the `parallel` feature.
//!
//! The `cfg` switch lives here so callers stay free of it.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Map `f` over `slice`, in parallel when the feature is enabled. Output order
/// matches input order either way.
pub fn map_slice<T, F, R>(slice: &[T], f: F, force_sequential: bool) -> Vec<R>
where
    T: Sync,
    F: Fn(&T) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            slice.iter().map(f).collect()
        } else {
            slice.par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        slice.iter().map(f).collect()
    }
}
