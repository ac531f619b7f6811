//! Core prediction engine.
//!
//! A [`Predictor`] pairs a shared [`Ensemble`] with a [`PredictionConfig`]
//! and scores one row at a time. The iteration range and output width are
//! fixed when the predictor is created, so callers can size output buffers
//! up front with [`Predictor::num_predict_per_row`].

use crate::boosting::Ensemble;
use crate::config::PredictionConfig;
use crate::core::error::{EvaluationError, InternalInconsistencyError, Result};
use crate::core::types::PredictType;
use crate::prediction::{leaf_index, shap};
use rayon::{ThreadPool, ThreadPoolBuilder};
use static_assertions::assert_impl_all;
use std::ops::Range;
use std::sync::Arc;

/// Scores rows against a shared ensemble.
#[derive(Debug, Clone)]
pub struct Predictor {
    ensemble: Arc<Ensemble>,
    config: PredictionConfig,
    iterations: Range<usize>,
    pub(crate) pool: Option<Arc<ThreadPool>>,
}

assert_impl_all!(Predictor: Send, Sync);

impl Predictor {
    /// Create a predictor, validating the configuration.
    ///
    /// A dedicated worker pool is built when `num_threads` is set; otherwise
    /// batches run on rayon's global pool.
    pub fn new(ensemble: Arc<Ensemble>, config: PredictionConfig) -> Result<Self> {
        config.validate()?;
        let iterations = ensemble.iteration_range(config.start_iteration, config.num_iteration);
        let pool = match config.num_threads {
            0 => None,
            threads => Some(Arc::new(
                ThreadPoolBuilder::new().num_threads(threads).build()?,
            )),
        };
        log::debug!(
            "Predictor ready: {} output, iterations {}..{}, {} threads",
            config.predict_type,
            iterations.start,
            iterations.end,
            config.effective_num_threads()
        );
        Ok(Predictor {
            ensemble,
            config,
            iterations,
            pool,
        })
    }

    /// Predictor with the default configuration.
    pub fn with_defaults(ensemble: Arc<Ensemble>) -> Result<Self> {
        Self::new(ensemble, PredictionConfig::default())
    }

    /// The shared ensemble.
    pub fn ensemble(&self) -> &Arc<Ensemble> {
        &self.ensemble
    }

    /// Active configuration.
    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Iterations used for every prediction.
    pub fn iterations(&self) -> Range<usize> {
        self.iterations.clone()
    }

    /// Number of values produced for one row.
    pub fn num_predict_per_row(&self) -> usize {
        let num_class = self.ensemble.num_class();
        match self.config.predict_type {
            PredictType::Normal | PredictType::RawScore => num_class,
            PredictType::LeafIndex => num_class * self.iterations.len(),
            PredictType::Contrib => num_class * (self.ensemble.num_features() + 1),
        }
    }

    /// Score one row into a new vector.
    pub fn predict_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.num_predict_per_row()];
        self.predict_row_into(row, &mut out)?;
        Ok(out)
    }

    /// Score one row into `out`, which must hold
    /// [`num_predict_per_row`](Self::num_predict_per_row) values.
    pub fn predict_row_into(&self, row: &[f64], out: &mut [f64]) -> Result<()> {
        let expected = self.num_predict_per_row();
        if out.len() != expected {
            return Err(InternalInconsistencyError::OutputLengthMismatch {
                expected,
                actual: out.len(),
            }
            .into());
        }
        self.check_shape(row.len())?;

        let written = match self.config.predict_type {
            PredictType::Normal => {
                let written = self.raw_scores(row, out)?;
                self.ensemble.objective().transform(out);
                written
            }
            PredictType::RawScore => self.raw_scores(row, out)?,
            PredictType::LeafIndex => {
                leaf_index::leaf_indices(&self.ensemble, row, self.iterations(), out)?
            }
            PredictType::Contrib => self.contributions(row, out)?,
        };

        if written != expected {
            return Err(InternalInconsistencyError::OutputLengthMismatch {
                expected,
                actual: written,
            }
            .into());
        }
        Ok(())
    }

    /// Reject rows whose width differs from the model's feature count,
    /// unless the shape check is disabled.
    pub(crate) fn check_shape(&self, ncol: usize) -> std::result::Result<(), EvaluationError> {
        let expected = self.ensemble.num_features();
        if !self.config.disable_shape_check && ncol != expected {
            return Err(EvaluationError::FeatureCountMismatch {
                expected,
                actual: ncol,
            });
        }
        Ok(())
    }

    fn raw_scores(&self, row: &[f64], out: &mut [f64]) -> std::result::Result<usize, EvaluationError> {
        let num_class = self.ensemble.num_class();
        let scores = &mut out[..num_class];
        scores.fill(0.0);
        for iteration in self.iterations() {
            for (class, score) in scores.iter_mut().enumerate() {
                if let Some(tree) = self.ensemble.tree(iteration, class) {
                    *score += tree.predict(row)?;
                }
            }
        }
        self.finish_block(scores);
        Ok(num_class)
    }

    fn contributions(&self, row: &[f64], out: &mut [f64]) -> std::result::Result<usize, EvaluationError> {
        let width = self.ensemble.num_features() + 1;
        let mut written = 0;
        for (class, phi) in out.chunks_mut(width).enumerate() {
            phi.fill(0.0);
            for iteration in self.iterations() {
                if let Some(tree) = self.ensemble.tree(iteration, class) {
                    shap::tree_contributions(tree, row, phi)?;
                }
            }
            self.finish_block(phi);
            written += phi.len();
        }
        Ok(written)
    }

    /// Average over iterations when requested and add the base score to the
    /// last slot of a block (the class score, or the bias of a contribution
    /// block).
    fn finish_block(&self, block: &mut [f64]) {
        let used = self.iterations.len();
        if self.ensemble.average_output() && used > 0 {
            for value in block.iter_mut() {
                *value /= used as f64;
            }
        }
        if self.config.predict_type == PredictType::Contrib {
            if let Some(bias) = block.last_mut() {
                *bias += self.ensemble.base_score();
            }
        } else {
            for value in block.iter_mut() {
                *value += self.ensemble.base_score();
            }
        }
    }
}
