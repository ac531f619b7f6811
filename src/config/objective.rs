//! Objective recorded in a model and its output transform.
//!
//! The objective line of a LightGBM model (`objective=binary sigmoid:1`)
//! names the loss the ensemble was trained with. At inference time only its
//! inverse link matters: the function mapping summed raw scores to the
//! model's output space.

use crate::core::error::{Location, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loss of a regression-family objective. All share the identity link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegressionLoss {
    /// Squared error
    L2,
    /// Absolute error
    L1,
    /// Huber loss
    Huber,
    /// Fair loss
    Fair,
    /// Quantile (pinball) loss
    Quantile,
    /// Mean absolute percentage error
    Mape,
}

impl RegressionLoss {
    fn name(self) -> &'static str {
        match self {
            RegressionLoss::L2 => "regression",
            RegressionLoss::L1 => "regression_l1",
            RegressionLoss::Huber => "huber",
            RegressionLoss::Fair => "fair",
            RegressionLoss::Quantile => "quantile",
            RegressionLoss::Mape => "mape",
        }
    }
}

/// Training objective of an ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Objective {
    /// Regression family; `sqrt` models were trained on `sqrt(label)`
    Regression {
        /// Loss function
        loss: RegressionLoss,
        /// Label was square-root transformed
        sqrt: bool,
    },
    /// Poisson regression (log link)
    Poisson,
    /// Gamma regression (log link)
    Gamma,
    /// Tweedie regression (log link)
    Tweedie,
    /// Binary log loss
    Binary {
        /// Sigmoid slope
        sigmoid: f64,
    },
    /// Softmax multiclass
    Multiclass {
        /// Number of classes
        num_class: usize,
    },
    /// One-vs-all multiclass
    MulticlassOva {
        /// Number of classes
        num_class: usize,
        /// Sigmoid slope
        sigmoid: f64,
    },
    /// Cross entropy on probability labels
    CrossEntropy,
    /// Cross entropy, lambda parameterisation
    CrossEntropyLambda,
    /// LambdaRank
    LambdaRank,
    /// XE-NDCG ranking
    RankXendcg,
    /// No objective recorded (custom training loss)
    Custom,
}

impl Objective {
    /// Parse the value of an `objective=` header line.
    ///
    /// `num_class` from the header fills in a multiclass objective that does
    /// not carry its own `num_class:` parameter.
    pub fn parse(text: &str, num_class: usize) -> Result<Self, ParseError> {
        let invalid = |message: String| ParseError::invalid_value(Location::Header, "objective", message);

        let mut tokens = text.split_whitespace();
        let name = match tokens.next() {
            Some(name) => name,
            None => return Ok(Objective::Custom),
        };

        let mut sqrt = false;
        let mut sigmoid = 1.0;
        let mut declared_classes = None;
        for token in tokens {
            if token == "sqrt" {
                sqrt = true;
                continue;
            }
            let Some((key, value)) = token.split_once(':') else {
                return Err(invalid(format!("unexpected token `{}`", token)));
            };
            match key {
                "sigmoid" => {
                    sigmoid = value
                        .parse::<f64>()
                        .ok()
                        .filter(|s| *s > 0.0)
                        .ok_or_else(|| invalid(format!("bad sigmoid `{}`", value)))?;
                }
                "num_class" => {
                    declared_classes = Some(
                        value
                            .parse::<usize>()
                            .map_err(|_| invalid(format!("bad num_class `{}`", value)))?,
                    );
                }
                // Training-only parameters such as `alpha:` or `max_delta_step:`
                _ => {}
            }
        }
        let num_class = declared_classes.unwrap_or(num_class);

        let regression = |loss| Objective::Regression { loss, sqrt };
        let objective = match name {
            "regression" | "regression_l2" | "l2" | "mean_squared_error" | "mse" | "l2_root"
            | "root_mean_squared_error" | "rmse" => regression(RegressionLoss::L2),
            "regression_l1" | "l1" | "mean_absolute_error" | "mae" => {
                regression(RegressionLoss::L1)
            }
            "huber" => regression(RegressionLoss::Huber),
            "fair" => regression(RegressionLoss::Fair),
            "quantile" => regression(RegressionLoss::Quantile),
            "mape" | "mean_absolute_percentage_error" => regression(RegressionLoss::Mape),
            "poisson" => Objective::Poisson,
            "gamma" => Objective::Gamma,
            "tweedie" => Objective::Tweedie,
            "binary" => Objective::Binary { sigmoid },
            "multiclass" | "softmax" => Objective::Multiclass { num_class },
            "multiclassova" | "multiclass_ova" | "ova" | "ovr" => {
                Objective::MulticlassOva { num_class, sigmoid }
            }
            "cross_entropy" | "xentropy" => Objective::CrossEntropy,
            "cross_entropy_lambda" | "xentlambda" => Objective::CrossEntropyLambda,
            "lambdarank" => Objective::LambdaRank,
            "rank_xendcg" | "xendcg" | "xe_ndcg" | "xe_ndcg_mart" | "xendcg_mart" => {
                Objective::RankXendcg
            }
            "custom" | "none" | "null" | "na" => Objective::Custom,
            other => return Err(invalid(format!("unknown objective `{}`", other))),
        };

        if let Objective::Multiclass { num_class } | Objective::MulticlassOva { num_class, .. } =
            &objective
        {
            if *num_class < 2 {
                return Err(invalid(format!(
                    "multiclass objective needs at least 2 classes, got {}",
                    num_class
                )));
            }
        }
        Ok(objective)
    }

    /// Number of outputs the objective scores per row, if it fixes one.
    pub fn num_outputs(&self) -> Option<usize> {
        match self {
            Objective::Multiclass { num_class } | Objective::MulticlassOva { num_class, .. } => {
                Some(*num_class)
            }
            Objective::Custom => None,
            _ => Some(1),
        }
    }

    /// Whether the transform is the identity.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            Objective::Regression { sqrt: false, .. }
                | Objective::LambdaRank
                | Objective::RankXendcg
                | Objective::Custom
        )
    }

    /// Apply the inverse link to one row of summed scores in place.
    pub fn transform(&self, scores: &mut [f64]) {
        match self {
            Objective::Regression { sqrt: true, .. } => {
                for score in scores.iter_mut() {
                    *score = score.signum() * *score * *score;
                }
            }
            Objective::Poisson | Objective::Gamma | Objective::Tweedie => {
                for score in scores.iter_mut() {
                    *score = score.exp();
                }
            }
            Objective::Binary { sigmoid } | Objective::MulticlassOva { sigmoid, .. } => {
                for score in scores.iter_mut() {
                    *score = 1.0 / (1.0 + (-sigmoid * *score).exp());
                }
            }
            Objective::CrossEntropy => {
                for score in scores.iter_mut() {
                    *score = 1.0 / (1.0 + (-*score).exp());
                }
            }
            Objective::CrossEntropyLambda => {
                for score in scores.iter_mut() {
                    *score = score.exp().ln_1p();
                }
            }
            Objective::Multiclass { .. } => softmax(scores),
            Objective::Regression { sqrt: false, .. }
            | Objective::LambdaRank
            | Objective::RankXendcg
            | Objective::Custom => {}
        }
    }
}

impl Default for Objective {
    fn default() -> Self {
        Objective::Regression {
            loss: RegressionLoss::L2,
            sqrt: false,
        }
    }
}

impl fmt::Display for Objective {
    /// Writes the `objective=` value in LightGBM's own spelling.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::Regression { loss, sqrt } => {
                write!(f, "{}", loss.name())?;
                if *sqrt {
                    write!(f, " sqrt")?;
                }
                Ok(())
            }
            Objective::Poisson => write!(f, "poisson"),
            Objective::Gamma => write!(f, "gamma"),
            Objective::Tweedie => write!(f, "tweedie"),
            Objective::Binary { sigmoid } => write!(f, "binary sigmoid:{}", sigmoid),
            Objective::Multiclass { num_class } => write!(f, "multiclass num_class:{}", num_class),
            Objective::MulticlassOva { num_class, sigmoid } => {
                write!(f, "multiclassova num_class:{} sigmoid:{}", num_class, sigmoid)
            }
            Objective::CrossEntropy => write!(f, "cross_entropy"),
            Objective::CrossEntropyLambda => write!(f, "cross_entropy_lambda"),
            Objective::LambdaRank => write!(f, "lambdarank"),
            Objective::RankXendcg => write!(f, "rank_xendcg"),
            Objective::Custom => write!(f, "custom"),
        }
    }
}

/// Numerically stable softmax in place.
pub fn softmax(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for score in scores.iter_mut() {
        *score = (*score - max).exp();
        sum += *score;
    }
    for score in scores.iter_mut() {
        *score /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_lightgbm_spellings() {
        assert_eq!(
            Objective::parse("binary sigmoid:1", 1).unwrap(),
            Objective::Binary { sigmoid: 1.0 }
        );
        assert_eq!(
            Objective::parse("multiclass num_class:3", 3).unwrap(),
            Objective::Multiclass { num_class: 3 }
        );
        assert_eq!(
            Objective::parse("regression sqrt", 1).unwrap(),
            Objective::Regression {
                loss: RegressionLoss::L2,
                sqrt: true
            }
        );
        assert_eq!(
            Objective::parse("quantile alpha:0.9", 1).unwrap(),
            Objective::Regression {
                loss: RegressionLoss::Quantile,
                sqrt: false
            }
        );
        assert_eq!(Objective::parse("xentlambda", 1).unwrap(), Objective::CrossEntropyLambda);
        assert_eq!(Objective::parse("", 1).unwrap(), Objective::Custom);
    }

    #[test]
    fn test_parse_rejects_unknown_and_bad_params() {
        assert!(Objective::parse("hinge", 1).is_err());
        assert!(Objective::parse("binary sigmoid:-2", 1).is_err());
        assert!(Objective::parse("multiclass", 1).is_err());
        assert!(Objective::parse("binary garbage", 1).is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for text in [
            "regression",
            "regression_l1 sqrt",
            "binary sigmoid:0.5",
            "multiclass num_class:4",
            "multiclassova num_class:3 sigmoid:2",
            "cross_entropy",
            "lambdarank",
        ] {
            let objective = Objective::parse(text, 1).unwrap();
            assert_eq!(objective.to_string(), text);
        }
    }

    #[test]
    fn test_transforms() {
        let mut scores = [0.0];
        Objective::Binary { sigmoid: 1.0 }.transform(&mut scores);
        assert_abs_diff_eq!(scores[0], 0.5);

        let mut scores = [2.0_f64.ln()];
        Objective::Poisson.transform(&mut scores);
        assert_abs_diff_eq!(scores[0], 2.0, epsilon = 1e-12);

        let mut scores = [-3.0];
        Objective::parse("regression sqrt", 1).unwrap().transform(&mut scores);
        assert_abs_diff_eq!(scores[0], -9.0);

        let mut scores = [0.0];
        Objective::CrossEntropyLambda.transform(&mut scores);
        assert_abs_diff_eq!(scores[0], 2.0_f64.ln(), epsilon = 1e-12);

        let mut scores = [1.5, -0.5];
        Objective::LambdaRank.transform(&mut scores);
        assert_eq!(scores, [1.5, -0.5]);
    }

    #[test]
    fn test_softmax_is_stable() {
        let mut scores = [1000.0, 1000.0, 1000.0 + 2.0_f64.ln()];
        softmax(&mut scores);
        assert_abs_diff_eq!(scores[0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[2], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(scores.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
}
