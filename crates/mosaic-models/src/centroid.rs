//! Shared helpers for centroid-removed weighted fits.

use mosaic_core::{Coord, FitError, PointMatch, Real};

/// Fail with `NotEnoughDataPoints` unless at least `required` matches are
/// given.
pub(crate) fn require_matches<const D: usize>(
    matches: &[PointMatch<D>],
    required: usize,
) -> Result<(), FitError> {
    if matches.len() < required {
        return Err(FitError::NotEnoughDataPoints {
            required,
            given: matches.len(),
        });
    }
    Ok(())
}

/// Weighted centroids of the source locals (`p1.l`) and target worlds
/// (`p2.w`), plus the total weight.
///
/// Fails when the total weight vanishes; a fit over zero total weight has
/// no defined solution.
pub(crate) fn weighted_centroids<const D: usize>(
    matches: &[PointMatch<D>],
) -> Result<(Coord<D>, Coord<D>, Real), FitError> {
    let mut pc = Coord::<D>::zeros();
    let mut qc = Coord::<D>::zeros();
    let mut ws = 0.0;
    for m in matches {
        let w = m.weight();
        pc += *m.p1().l() * w;
        qc += *m.p2().w() * w;
        ws += w;
    }
    if ws <= 0.0 {
        return Err(FitError::IllDefinedDataPoints("total match weight is zero"));
    }
    Ok((pc / ws, qc / ws, ws))
}
