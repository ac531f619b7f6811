//! Batch prediction over dense matrices.
//!
//! Rows are independent and form the parallel axis. Each row's results are
//! written by index into its own chunk of a preallocated row-major output
//! buffer, so output order never depends on scheduling. The first failing
//! row (in input order) aborts the batch and no partial output escapes.

use crate::core::constants::MIN_PARALLEL_ROWS;
use crate::core::error::{EvaluationError, InternalInconsistencyError, Result};
use crate::prediction::Predictor;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use rayon::ThreadPool;

impl Predictor {
    /// Score a dense `nrow x ncol` matrix stored in `data`.
    ///
    /// Returns a row-major buffer of `nrow * num_predict_per_row()` values.
    pub fn predict_for_mat(
        &self,
        data: &[f64],
        nrow: usize,
        ncol: usize,
        row_major: bool,
    ) -> Result<Vec<f64>> {
        if nrow.checked_mul(ncol) != Some(data.len()) {
            return Err(EvaluationError::InvalidShape {
                len: data.len(),
                nrow,
                ncol,
            }
            .into());
        }
        self.check_shape(ncol)?;

        let width = self.num_predict_per_row();
        log::debug!(
            "Scoring {} rows x {} columns ({}), {} values per row",
            nrow,
            ncol,
            if row_major { "row-major" } else { "column-major" },
            width
        );

        score_rows(nrow, width, self.pool.as_deref(), |index, out, scratch| {
            let row: &[f64] = if row_major {
                &data[index * ncol..(index + 1) * ncol]
            } else {
                scratch.clear();
                scratch.extend((0..ncol).map(|column| data[column * nrow + index]));
                scratch
            };
            self.predict_row_into(row, out)
        })
    }

    /// Score every row of `features`.
    ///
    /// Standard and Fortran layouts are read in place; other layouts are
    /// copied once.
    pub fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let (nrow, ncol) = features.dim();
        let values = if let Some(data) = features.as_slice() {
            self.predict_for_mat(data, nrow, ncol, true)?
        } else if let Some(data) = features.t().as_slice() {
            self.predict_for_mat(data, nrow, ncol, false)?
        } else {
            let data: Vec<f64> = features.iter().copied().collect();
            self.predict_for_mat(&data, nrow, ncol, true)?
        };

        let width = self.num_predict_per_row();
        let actual = values.len();
        Array2::from_shape_vec((nrow, width), values).map_err(|_| {
            InternalInconsistencyError::OutputLengthMismatch {
                expected: nrow * width,
                actual,
            }
            .into()
        })
    }
}

/// Run `score(row_index, output_chunk, scratch)` for every row and collect
/// the chunks into one buffer.
///
/// Small batches stay on the calling thread. Larger ones run on `pool`, or
/// on rayon's global pool when none is given. Each worker owns one scratch
/// vector for gathering column-major rows.
pub(crate) fn score_rows<F>(
    nrow: usize,
    width: usize,
    pool: Option<&ThreadPool>,
    score: F,
) -> Result<Vec<f64>>
where
    F: Fn(usize, &mut [f64], &mut Vec<f64>) -> Result<()> + Sync,
{
    let mut out = vec![0.0; nrow * width];
    if nrow == 0 || width == 0 {
        return Ok(out);
    }

    if nrow < MIN_PARALLEL_ROWS {
        let mut scratch = Vec::new();
        for (index, chunk) in out.chunks_mut(width).enumerate() {
            score(index, chunk, &mut scratch)?;
        }
        return Ok(out);
    }

    let run = |out: &mut [f64]| {
        out.par_chunks_mut(width)
            .enumerate()
            .map_init(Vec::new, |scratch, (index, chunk)| score(index, chunk, scratch))
            .find_first(|result| result.is_err())
    };
    let failure = match pool {
        Some(pool) => pool.install(|| run(&mut out)),
        None => run(&mut out),
    };
    match failure {
        Some(Err(err)) => Err(err),
        _ => Ok(out),
    }
}
