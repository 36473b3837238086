use crate::prelude::*;
use crate::core::activations::{relu_backward, relu_forward, ReluCache};

/// Whether a forward pass is part of training or inference. Batch
/// normalization and dropout behave differently in the two modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Dense<A = f64> {
    pub w: Array2<A>,
    pub b: Array1<A>,
}

impl<A> Dense<A>
where
    A: NdFloat,
    StandardNormal: Distribution<A>,
{
    /// Gaussian weights with standard deviation `weight_scale`, zero biases.
    pub fn new(fan_in: usize, fan_out: usize, weight_scale: A, rng: &mut StdRng) -> Result<Self> {
        if fan_in == 0 || fan_out == 0 {
            return Err(NNError::InvalidConfiguration(
                "layer dimensions must be greater than 0".to_string(),
            ));
        }
        let normal = Normal::new(A::zero(), weight_scale)
            .map_err(|err| NNError::InvalidConfiguration(format!("weight scale: {}", err)))?;
        Ok(Self {
            w: Array2::random_using((fan_in, fan_out), normal, rng),
            b: Array1::zeros(fan_out),
        })
    }

    pub fn from_parts(w: Array2<A>, b: Array1<A>) -> Result<Self> {
        if w.ncols() != b.len() {
            return Err(NNError::ShapeMismatch(format!(
                "weight matrix has {} columns but bias has {} entries",
                w.ncols(),
                b.len()
            )));
        }
        Ok(Self { w, b })
    }
}

/// Gradients of the loss with respect to one layer's parameters.
#[derive(Debug, Clone)]
pub struct LayerGrads<A = f64> {
    pub dw: Array2<A>,
    pub db: Array1<A>,
}

/// Values saved by [`affine_forward`] for the backward pass.
#[derive(Debug, Clone)]
pub struct AffineCache<A> {
    x: Array2<A>,
    w: Array2<A>,
}

/// y = x.w + b with the bias broadcast over rows.
pub fn affine_forward<A: NdFloat>(
    x: Array2<A>,
    w: &Array2<A>,
    b: &Array1<A>,
) -> Result<(Array2<A>, AffineCache<A>)> {
    if x.ncols() != w.nrows() {
        return Err(NNError::ShapeMismatch(format!(
            "input has {} features but weights expect {}",
            x.ncols(),
            w.nrows()
        )));
    }
    if b.len() != w.ncols() {
        return Err(NNError::ShapeMismatch(format!(
            "weight matrix has {} columns but bias has {} entries",
            w.ncols(),
            b.len()
        )));
    }
    let y = x.dot(w) + b;
    Ok((y, AffineCache { x, w: w.clone() }))
}

/// Returns (dx, dw, db) for the affine map whose forward produced `cache`.
pub fn affine_backward<A: NdFloat>(
    dout: Array2<A>,
    cache: AffineCache<A>,
) -> (Array2<A>, Array2<A>, Array1<A>) {
    let dx = dout.dot(&cache.w.t());
    let dw = cache.x.t().dot(&dout);
    let db = dout.sum_axis(Axis(0));
    (dx, dw, db)
}

#[derive(Debug, Clone)]
pub struct AffineReluCache<A> {
    affine: AffineCache<A>,
    relu: ReluCache<A>,
}

pub fn affine_relu_forward<A: NdFloat>(
    x: Array2<A>,
    w: &Array2<A>,
    b: &Array1<A>,
) -> Result<(Array2<A>, AffineReluCache<A>)> {
    let (z, affine) = affine_forward(x, w, b)?;
    let (a, relu) = relu_forward(z);
    Ok((a, AffineReluCache { affine, relu }))
}

pub fn affine_relu_backward<A: NdFloat>(
    dout: Array2<A>,
    cache: AffineReluCache<A>,
) -> (Array2<A>, Array2<A>, Array1<A>) {
    let dz = relu_backward(dout, cache.relu);
    affine_backward(dz, cache.affine)
}

/// Per-feature running statistics for batch normalization. Training
/// passes fold batch statistics into the running ones; inference
/// standardizes by the running values. There is no learned scale or
/// shift, the parameter set of a network stays one weight matrix and
/// one bias vector per layer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BatchNorm<A = f64> {
    pub running_mean: Array1<A>,
    pub running_var: Array1<A>,
    pub momentum: A,
    pub eps: A,
}

impl<A: NdFloat> BatchNorm<A> {
    pub fn new(dim: usize) -> Self {
        Self {
            running_mean: Array1::zeros(dim),
            running_var: Array1::ones(dim),
            momentum: A::from(0.9).unwrap(),
            eps: A::from(1e-5).unwrap(),
        }
    }

    /// Standardize by the running statistics without touching them.
    pub fn normalize(&self, x: &Array2<A>) -> Result<Array2<A>> {
        if x.ncols() != self.running_mean.len() {
            return Err(NNError::ShapeMismatch(format!(
                "input has {} features but normalization tracks {}",
                x.ncols(),
                self.running_mean.len()
            )));
        }
        let std = (&self.running_var + self.eps).mapv(|v| v.sqrt());
        Ok((x - &self.running_mean) / &std)
    }
}

#[derive(Debug, Clone)]
pub struct BatchNormCache<A> {
    x_hat: Array2<A>,
    std: Array1<A>,
    mode: Mode,
}

pub fn batchnorm_forward<A: NdFloat>(
    x: Array2<A>,
    state: &mut BatchNorm<A>,
    mode: Mode,
) -> Result<(Array2<A>, BatchNormCache<A>)> {
    if x.ncols() != state.running_mean.len() {
        return Err(NNError::ShapeMismatch(format!(
            "input has {} features but normalization tracks {}",
            x.ncols(),
            state.running_mean.len()
        )));
    }
    match mode {
        Mode::Train => {
            let n = x.nrows();
            if n == 0 {
                return Err(NNError::ShapeMismatch(
                    "cannot normalize an empty batch".to_string(),
                ));
            }
            let nf = A::from(n).unwrap();
            let mean = x.sum_axis(Axis(0)) / nf;
            let centered = x - &mean;
            let var = centered.mapv(|c| c * c).sum_axis(Axis(0)) / nf;
            let std = (&var + state.eps).mapv(|v| v.sqrt());
            let x_hat = centered / &std;

            let m = state.momentum;
            state.running_mean = &state.running_mean * m + &mean * (A::one() - m);
            state.running_var = &state.running_var * m + &var * (A::one() - m);

            let out = x_hat.clone();
            Ok((out, BatchNormCache { x_hat, std, mode }))
        }
        Mode::Eval => {
            let out = state.normalize(&x)?;
            let std = (&state.running_var + state.eps).mapv(|v| v.sqrt());
            Ok((
                out.clone(),
                BatchNormCache {
                    x_hat: out,
                    std,
                    mode,
                },
            ))
        }
    }
}

pub fn batchnorm_backward<A: NdFloat>(dout: Array2<A>, cache: BatchNormCache<A>) -> Array2<A> {
    match cache.mode {
        Mode::Eval => dout / &cache.std,
        Mode::Train => {
            let n = A::from(dout.nrows()).unwrap();
            let sum_dout = dout.sum_axis(Axis(0));
            let sum_dout_xhat = (&dout * &cache.x_hat).sum_axis(Axis(0));
            let num = dout * n - &sum_dout - &cache.x_hat * &sum_dout_xhat;
            num / &(cache.std * n)
        }
    }
}

/// Mask saved by [`dropout_forward`]; `None` outside of training.
#[derive(Debug, Clone)]
pub struct DropoutCache<A> {
    mask: Option<Array2<A>>,
}

/// Inverted dropout: each entry is dropped with probability `p` and the
/// survivors are scaled by 1/(1-p), so inference needs no rescaling.
pub fn dropout_forward<A>(
    x: Array2<A>,
    p: A,
    mode: Mode,
    rng: &mut StdRng,
) -> (Array2<A>, DropoutCache<A>)
where
    A: NdFloat + SampleUniform,
{
    match mode {
        Mode::Eval => (x, DropoutCache { mask: None }),
        Mode::Train => {
            let scale = A::one() / (A::one() - p);
            let mask = Array2::random_using(x.raw_dim(), Uniform::new(A::zero(), A::one()), rng)
                .mapv(|u| if u < p { A::zero() } else { scale });
            let out = x * &mask;
            (out, DropoutCache { mask: Some(mask) })
        }
    }
}

pub fn dropout_backward<A: NdFloat>(dout: Array2<A>, cache: DropoutCache<A>) -> Array2<A> {
    match cache.mask {
        Some(mask) => dout * &mask,
        None => dout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_forward_values() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let w = array![[1.0, 0.0, -1.0], [2.0, 1.0, 0.0]];
        let b = array![0.5, -0.5, 1.0];
        let (y, _) = affine_forward(x, &w, &b).unwrap();
        assert_eq!(y, array![[5.5, 1.5, 0.0], [11.5, 3.5, -2.0]]);
    }

    #[test]
    fn test_affine_forward_rejects_bad_shapes() {
        let x = array![[1.0, 2.0, 3.0]];
        let w = array![[1.0, 0.0], [0.0, 1.0]];
        let b = array![0.0, 0.0];
        let result = affine_forward(x, &w, &b);
        assert!(matches!(result, Err(NNError::ShapeMismatch(_))));
    }

    #[test]
    fn test_affine_backward_values() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let w = array![[1.0, 0.0, -1.0], [2.0, 1.0, 0.0]];
        let b = array![0.5, -0.5, 1.0];
        let (_, cache) = affine_forward(x, &w, &b).unwrap();
        let dout = Array2::ones((2, 3));
        let (dx, dw, db) = affine_backward(dout, cache);
        assert_eq!(db, array![2.0, 2.0, 2.0]);
        assert_eq!(dw, array![[4.0, 4.0, 4.0], [6.0, 6.0, 6.0]]);
        assert_eq!(dx, array![[0.0, 3.0], [0.0, 3.0]]);
    }

    #[test]
    fn test_dense_new_shapes_and_zero_bias() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer: Dense<f64> = Dense::new(4, 6, 1e-2, &mut rng).unwrap();
        assert_eq!(layer.w.dim(), (4, 6));
        assert_eq!(layer.b, Array1::zeros(6));
    }

    #[test]
    fn test_dense_rejects_zero_dims() {
        let mut rng = StdRng::seed_from_u64(1);
        let result: Result<Dense<f64>> = Dense::new(0, 6, 1e-2, &mut rng);
        assert!(matches!(result, Err(NNError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_batchnorm_train_standardizes_and_tracks() {
        let mut state: BatchNorm<f64> = BatchNorm::new(2);
        let x = array![[1.0, 2.0], [3.0, 6.0]];
        let (out, _) = batchnorm_forward(x, &mut state, Mode::Train).unwrap();
        // batch mean [2, 4], population variance [1, 4]
        let expected = array![[-1.0, -1.0], [1.0, 1.0]];
        let diff = (&out - &expected).mapv(f64::abs);
        assert!(diff.iter().all(|&d| d < 1e-3));
        let rm_diff = (&state.running_mean - &array![0.2, 0.4]).mapv(f64::abs);
        let rv_diff = (&state.running_var - &array![1.0, 1.3]).mapv(f64::abs);
        assert!(rm_diff.iter().all(|&d| d < 1e-12));
        assert!(rv_diff.iter().all(|&d| d < 1e-12));
    }

    #[test]
    fn test_batchnorm_eval_uses_running_stats() {
        let mut state: BatchNorm<f64> = BatchNorm::new(2);
        state.running_mean = array![1.0, -1.0];
        state.running_var = array![4.0, 0.25];
        let before = state.clone();
        let x = array![[3.0, 0.0], [1.0, -2.0]];
        let (out, _) = batchnorm_forward(x, &mut state, Mode::Eval).unwrap();
        let expected = array![[1.0, 2.0], [0.0, -2.0]];
        let diff = (&out - &expected).mapv(f64::abs);
        assert!(diff.iter().all(|&d| d < 1e-3));
        // eval never moves the running statistics
        assert_eq!(state.running_mean, before.running_mean);
        assert_eq!(state.running_var, before.running_var);
    }

    #[test]
    fn test_dropout_train_zeroes_or_scales() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = Array2::<f64>::from_elem((4, 5), 2.0);
        let (out, _) = dropout_forward(x, 0.5, Mode::Train, &mut rng);
        for &v in out.iter() {
            assert!(v == 0.0 || (v - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_dropout_eval_is_identity() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = array![[1.0, -2.0], [3.0, 0.5]];
        let (out, cache) = dropout_forward(x.clone(), 0.5, Mode::Eval, &mut rng);
        assert_eq!(out, x);
        let dout = array![[1.0, 1.0], [1.0, 1.0]];
        assert_eq!(dropout_backward(dout.clone(), cache), dout);
    }

    #[test]
    fn test_dropout_backward_reuses_mask() {
        let mut rng = StdRng::seed_from_u64(7);
        let x = Array2::from_elem((3, 3), 1.0);
        let (out, cache) = dropout_forward(x, 0.4, Mode::Train, &mut rng);
        let dout = Array2::from_elem((3, 3), 1.0);
        let dx = dropout_backward(dout, cache);
        // gradient is blocked exactly where the activation was dropped
        assert_eq!(out, dx);
    }
}
