//! # Model Ensemble Module
//!
//! Opaque scalar regression over a fixed-shape tensor. Fold-models are pure
//! functions supplied by the model-loading layer; the ensemble invokes each
//! fold, takes the last element of its output and averages the folds that
//! succeeded. The call fails only when every fold failed.

use crate::error::{EnsembleError, ModelError};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Model input of shape `(1, window_length, channels)`, channels interleaved
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    window_length: usize,
    channels: usize,
}

impl Tensor {
    /// Interleave equally long channel signals: `[c0[0], c1[0], c0[1], c1[1], ...]`
    pub fn from_channels(channels: &[Vec<f32>]) -> Option<Tensor> {
        let window_length = channels.first()?.len();
        if channels.iter().any(|c| c.len() != window_length) {
            return None;
        }

        let mut data = Vec::with_capacity(window_length * channels.len());
        for t in 0..window_length {
            for channel in channels {
                data.push(channel[t]);
            }
        }

        Some(Tensor {
            data,
            window_length,
            channels: channels.len(),
        })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (1, self.window_length, self.channels)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, t: usize, channel: usize) -> Option<f32> {
        if channel >= self.channels {
            return None;
        }
        self.data.get(t * self.channels + channel).copied()
    }
}

/// What a fold returns: a bare scalar, or a sequence whose last element is the estimate
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Scalar(f32),
    Sequence(Vec<f32>),
}

impl ModelOutput {
    pub fn last_value(&self) -> Result<f32, ModelError> {
        let value = match self {
            ModelOutput::Scalar(value) => *value,
            ModelOutput::Sequence(values) => *values
                .last()
                .ok_or_else(|| ModelError::Malformed("empty output sequence".to_string()))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ModelError::Malformed(format!("non-finite output {}", value)))
        }
    }
}

/// One trained fold
pub trait FoldModel: Send + Sync {
    fn predict(&self, tensor: &Tensor) -> Result<ModelOutput, ModelError>;
}

impl<F> FoldModel for F
where
    F: Fn(&Tensor) -> Result<ModelOutput, ModelError> + Send + Sync,
{
    fn predict(&self, tensor: &Tensor) -> Result<ModelOutput, ModelError> {
        self(tensor)
    }
}

#[derive(Clone)]
pub struct ModelEnsemble {
    folds: Vec<Arc<dyn FoldModel>>,
    input_shape: (usize, usize, usize),
}

impl ModelEnsemble {
    pub fn new(input_shape: (usize, usize, usize)) -> Self {
        Self {
            folds: Vec::new(),
            input_shape,
        }
    }

    pub fn with_fold(mut self, fold: impl FoldModel + 'static) -> Self {
        self.folds.push(Arc::new(fold));
        self
    }

    pub fn push(&mut self, fold: Arc<dyn FoldModel>) {
        self.folds.push(fold);
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn input_shape(&self) -> (usize, usize, usize) {
        self.input_shape
    }

    /// Mean of the last output element of every fold that succeeded.
    ///
    /// A fold that errors, panics or returns a malformed output is skipped.
    pub fn predict(&self, tensor: &Tensor) -> Result<f32, EnsembleError> {
        if tensor.shape() != self.input_shape {
            return Err(EnsembleError::ShapeMismatch {
                expected: self.input_shape,
                actual: tensor.shape(),
            });
        }

        let mut sum = 0.0f64;
        let mut succeeded = 0usize;

        for (index, fold) in self.folds.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| fold.predict(tensor)))
                .unwrap_or_else(|_| Err(ModelError::Failed("fold panicked".to_string())))
                .and_then(|output| output.last_value());

            match outcome {
                Ok(value) => {
                    sum += f64::from(value);
                    succeeded += 1;
                }
                Err(e) => {
                    log::debug!("Fold {} of {} skipped: {}", index + 1, self.folds.len(), e);
                }
            }
        }

        if succeeded == 0 {
            return Err(EnsembleError::AllFoldsFailed {
                folds: self.folds.len(),
            });
        }
        Ok((sum / succeeded as f64) as f32)
    }
}

impl fmt::Debug for ModelEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEnsemble")
            .field("folds", &self.folds.len())
            .field("input_shape", &self.input_shape)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f32) -> impl Fn(&Tensor) -> Result<ModelOutput, ModelError> + Send + Sync {
        move |_: &Tensor| Ok(ModelOutput::Scalar(value))
    }

    fn failing(_: &Tensor) -> Result<ModelOutput, ModelError> {
        Err(ModelError::Failed("boom".to_string()))
    }

    fn tensor() -> Tensor {
        Tensor::from_channels(&[vec![0.0; 4]]).unwrap()
    }

    #[test]
    fn test_tensor_interleaves_channels() {
        let tensor = Tensor::from_channels(&[vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]]).unwrap();
        assert_eq!(tensor.shape(), (1, 3, 2));
        assert_eq!(tensor.data(), &[1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);
        assert_eq!(tensor.get(2, 1), Some(30.0));
        assert_eq!(tensor.get(0, 2), None);
        assert!(Tensor::from_channels(&[vec![1.0], vec![1.0, 2.0]]).is_none());
        assert!(Tensor::from_channels(&[]).is_none());
    }

    #[test]
    fn test_output_conventions() {
        assert_eq!(ModelOutput::Scalar(72.0).last_value(), Ok(72.0));
        assert_eq!(ModelOutput::Sequence(vec![1.0, 2.0, 68.0]).last_value(), Ok(68.0));
        assert!(ModelOutput::Sequence(vec![]).last_value().is_err());
        assert!(ModelOutput::Scalar(f32::NAN).last_value().is_err());
    }

    #[test]
    fn test_mean_of_folds() {
        let ensemble = ModelEnsemble::new((1, 4, 1))
            .with_fold(constant(70.0))
            .with_fold(|_: &Tensor| -> Result<ModelOutput, ModelError> {
                Ok(ModelOutput::Sequence(vec![0.0, 80.0]))
            });
        assert_eq!(ensemble.predict(&tensor()), Ok(75.0));
    }

    #[test]
    fn test_degrade_not_fail() {
        let ensemble = ModelEnsemble::new((1, 4, 1))
            .with_fold(constant(60.0))
            .with_fold(failing)
            .with_fold(constant(90.0));
        assert_eq!(ensemble.predict(&tensor()), Ok(75.0));
    }

    #[test]
    fn test_all_folds_failing_is_an_error() {
        let ensemble = ModelEnsemble::new((1, 4, 1))
            .with_fold(failing)
            .with_fold(failing)
            .with_fold(|_: &Tensor| -> Result<ModelOutput, ModelError> { Ok(ModelOutput::Scalar(f32::NAN)) });
        assert_eq!(
            ensemble.predict(&tensor()),
            Err(EnsembleError::AllFoldsFailed { folds: 3 })
        );
    }

    #[test]
    fn test_panicking_fold_is_skipped() {
        let ensemble = ModelEnsemble::new((1, 4, 1))
            .with_fold(|_: &Tensor| -> Result<ModelOutput, ModelError> { panic!("fold crashed") })
            .with_fold(constant(97.0));
        assert_eq!(ensemble.predict(&tensor()), Ok(97.0));
    }

    #[test]
    fn test_shape_mismatch() {
        let ensemble = ModelEnsemble::new((1, 8, 2)).with_fold(constant(1.0));
        assert_eq!(
            ensemble.predict(&tensor()),
            Err(EnsembleError::ShapeMismatch {
                expected: (1, 8, 2),
                actual: (1, 4, 1),
            })
        );
    }
}
