use crate::prelude::*;
use crate::core::losses::{l2_regularization, softmax_loss};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{Read, Write};

/// Construction-time settings for a [`FullyConnectedNet`].
///
/// An empty `hidden_dims` is valid and yields a single affine layer mapping
/// the input straight to class scores.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetConfig<A = f64> {
    pub hidden_dims: Vec<usize>,
    pub input_dim: usize,
    pub num_classes: usize,
    pub weight_scale: A,
    pub reg: A,
    /// Probability of dropping a hidden activation, in [0, 1).
    pub dropout: Option<A>,
    pub batchnorm: bool,
    pub seed: Option<u64>,
}

impl<A: NdFloat> Default for NetConfig<A> {
    fn default() -> Self {
        Self {
            hidden_dims: Vec::new(),
            input_dim: 3 * 32 * 32,
            num_classes: 10,
            weight_scale: A::from(1e-2).unwrap(),
            reg: A::zero(),
            dropout: None,
            batchnorm: false,
            seed: None,
        }
    }
}

impl<A: NdFloat> NetConfig<A> {
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.num_classes == 0 {
            return Err(NNError::InvalidConfiguration(
                "input_dim and num_classes must be greater than 0".to_string(),
            ));
        }
        if self.hidden_dims.iter().any(|&d| d == 0) {
            return Err(NNError::InvalidConfiguration(
                "hidden layer widths must be greater than 0".to_string(),
            ));
        }
        if !self.weight_scale.is_finite() || self.weight_scale < A::zero() {
            return Err(NNError::InvalidConfiguration(
                "weight_scale must be finite and non-negative".to_string(),
            ));
        }
        if !self.reg.is_finite() || self.reg < A::zero() {
            return Err(NNError::InvalidConfiguration(
                "reg must be finite and non-negative".to_string(),
            ));
        }
        if let Some(p) = self.dropout {
            if !(p >= A::zero() && p < A::one()) {
                return Err(NNError::InvalidConfiguration(
                    "dropout probability must lie in [0, 1)".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Fixed affine-relu-affine classifier with softmax cross-entropy loss.
///
/// Parameters are public so an external solver can update them in place
/// between [`TwoLayerNet::loss`] calls; the network itself never steps them.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TwoLayerNet<A = f64> {
    pub hidden: Dense<A>,
    pub output: Dense<A>,
    pub reg: A,
}

impl<A> TwoLayerNet<A>
where
    A: NdFloat,
    StandardNormal: Distribution<A>,
{
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        num_classes: usize,
        weight_scale: A,
        reg: A,
        seed: Option<u64>,
    ) -> Result<Self> {
        if !weight_scale.is_finite() || weight_scale < A::zero() {
            return Err(NNError::InvalidConfiguration(
                "weight_scale must be finite and non-negative".to_string(),
            ));
        }
        if !reg.is_finite() || reg < A::zero() {
            return Err(NNError::InvalidConfiguration(
                "reg must be finite and non-negative".to_string(),
            ));
        }
        let mut rng = seeded_rng(seed);
        Ok(Self {
            hidden: Dense::new(input_dim, hidden_dim, weight_scale, &mut rng)?,
            output: Dense::new(hidden_dim, num_classes, weight_scale, &mut rng)?,
            reg,
        })
    }

    /// Loss and parameter gradients for a labelled batch. `grads[0]` belongs
    /// to the hidden layer, `grads[1]` to the output layer.
    pub fn loss(&self, x: &Array2<A>, y: &Array1<usize>) -> Result<(A, Vec<LayerGrads<A>>)> {
        let (a, hidden_cache) = affine_relu_forward(x.clone(), &self.hidden.w, &self.hidden.b)?;
        let (scores, output_cache) = affine_forward(a, &self.output.w, &self.output.b)?;

        let (data_loss, dscores) = softmax_loss(&scores, y)?;
        let loss = data_loss + l2_regularization(self.reg, &[&self.hidden.w, &self.output.w]);

        let (da, dw2, db2) = affine_backward(dscores, output_cache);
        let (_, dw1, db1) = affine_relu_backward(da, hidden_cache);

        let grads = vec![
            LayerGrads {
                dw: dw1 + &self.hidden.w * self.reg,
                db: db1,
            },
            LayerGrads {
                dw: dw2 + &self.output.w * self.reg,
                db: db2,
            },
        ];
        Ok((loss, grads))
    }

    /// Class scores of shape (n, num_classes). No caches, no gradients.
    pub fn predict(&self, x: &Array2<A>) -> Result<Array2<A>> {
        let (a, _) = affine_relu_forward(x.clone(), &self.hidden.w, &self.hidden.b)?;
        let (scores, _) = affine_forward(a, &self.output.w, &self.output.b)?;
        Ok(scores)
    }
}

/// Classifier with an arbitrary number of hidden layers. Every hidden block
/// runs affine, then batch normalization when configured, then relu, then
/// dropout when configured; the final layer is affine alone.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FullyConnectedNet<A = f64> {
    pub layers: Vec<Dense<A>>,
    pub batchnorm: Option<Vec<BatchNorm<A>>>,
    pub dropout: Option<A>,
    pub seed: Option<u64>,
    pub reg: A,
}

struct BlockCache<A> {
    affine: AffineCache<A>,
    batchnorm: Option<BatchNormCache<A>>,
    relu: ReluCache<A>,
    dropout: Option<DropoutCache<A>>,
}

impl<A> FullyConnectedNet<A>
where
    A: NdFloat + SampleUniform,
    StandardNormal: Distribution<A>,
{
    pub fn new(config: NetConfig<A>) -> Result<Self> {
        config.validate()?;
        let mut rng = seeded_rng(config.seed);
        let mut dims = vec![config.input_dim];
        dims.extend(&config.hidden_dims);
        dims.push(config.num_classes);

        let mut layers = Vec::with_capacity(dims.len() - 1);
        for pair in dims.windows(2) {
            layers.push(Dense::new(pair[0], pair[1], config.weight_scale, &mut rng)?);
        }
        let batchnorm = config
            .batchnorm
            .then(|| config.hidden_dims.iter().map(|&d| BatchNorm::new(d)).collect());

        Ok(Self {
            layers,
            batchnorm,
            dropout: config.dropout,
            seed: config.seed,
            reg: config.reg,
        })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn count_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.w.len() + layer.b.len())
            .sum()
    }

    pub fn summary(&self) {
        let mut total_param = 0;
        let mut res = "\nModel FullyConnectedNet\n".to_string();
        res.push_str("-------------------------------------------------------------\n");
        res.push_str("Layer (Type)\t\t Output shape\t\t No.of params\n");
        for layer in self.layers.iter() {
            let a = layer.w.len();
            let b = layer.b.len();
            total_param += a + b;
            res.push_str(&format!("Dense\t\t\t  (None, {})\t\t  {}\n", b, a + b));
        }
        res.push_str("-------------------------------------------------------------\n");
        res.push_str(&format!("Total params: {}\n", total_param));
        println!("{}", res);
    }

    /// Loss and parameter gradients for a labelled batch, one [`LayerGrads`]
    /// per layer in layer order. Takes `&mut self` because training-mode
    /// batch normalization folds batch statistics into the running ones.
    pub fn loss(&mut self, x: &Array2<A>, y: &Array1<usize>) -> Result<(A, Vec<LayerGrads<A>>)> {
        let last = self.layers.len() - 1;

        // a failed call must not move the running statistics
        let num_classes = self.layers[last].b.len();
        if y.len() != x.nrows() {
            return Err(NNError::ShapeMismatch(format!(
                "{} input rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        for &label in y.iter() {
            if label >= num_classes {
                return Err(NNError::LabelOutOfRange { label, num_classes });
            }
        }

        let mut dropout_rng = match (self.dropout, self.seed) {
            (Some(_), Some(seed)) => Some(StdRng::seed_from_u64(seed)),
            (Some(_), None) => Some(StdRng::from_entropy()),
            _ => None,
        };

        // forward through the hidden blocks, keeping one cache per block
        let mut caches = Vec::with_capacity(last);
        let mut a = x.clone();
        for i in 0..last {
            let layer = &self.layers[i];
            let (z, affine) = affine_forward(a, &layer.w, &layer.b)?;
            let (z, batchnorm) = match self.batchnorm.as_mut() {
                Some(states) => {
                    let (z, cache) = batchnorm_forward(z, &mut states[i], Mode::Train)?;
                    (z, Some(cache))
                }
                None => (z, None),
            };
            let (out, relu) = relu_forward(z);
            let (out, dropout) = match (self.dropout, dropout_rng.as_mut()) {
                (Some(p), Some(rng)) => {
                    let (out, cache) = dropout_forward(out, p, Mode::Train, rng);
                    (out, Some(cache))
                }
                _ => (out, None),
            };
            caches.push(BlockCache {
                affine,
                batchnorm,
                relu,
                dropout,
            });
            a = out;
        }
        let (scores, final_cache) =
            affine_forward(a, &self.layers[last].w, &self.layers[last].b)?;

        let (data_loss, dscores) = softmax_loss(&scores, y)?;
        let weights: Vec<&Array2<A>> = self.layers.iter().map(|layer| &layer.w).collect();
        let loss = data_loss + l2_regularization(self.reg, &weights);

        // backward in reverse layer order, consuming each cache once
        let mut grads: Vec<LayerGrads<A>> = Vec::with_capacity(self.layers.len());
        let (mut da, dw, db) = affine_backward(dscores, final_cache);
        grads.push(LayerGrads {
            dw: dw + &self.layers[last].w * self.reg,
            db,
        });
        for (layer, cache) in self
            .layers
            .iter()
            .take(last)
            .rev()
            .zip(caches.into_iter().rev())
        {
            let dz = match cache.dropout {
                Some(c) => dropout_backward(da, c),
                None => da,
            };
            let dz = relu_backward(dz, cache.relu);
            let dz = match cache.batchnorm {
                Some(c) => batchnorm_backward(dz, c),
                None => dz,
            };
            let (dx, dw, db) = affine_backward(dz, cache.affine);
            grads.push(LayerGrads {
                dw: dw + &layer.w * self.reg,
                db,
            });
            da = dx;
        }
        grads.reverse();
        Ok((loss, grads))
    }

    /// Class scores of shape (n, num_classes). Batch normalization reads its
    /// running statistics and dropout is skipped entirely.
    pub fn predict(&self, x: &Array2<A>) -> Result<Array2<A>> {
        self.eval_forward(x)
    }

    /// Test-mode loss (data loss plus the L2 penalty), no gradients.
    pub fn evaluate(&self, x: &Array2<A>, y: &Array1<usize>) -> Result<A> {
        let scores = self.eval_forward(x)?;
        let (data_loss, _) = softmax_loss(&scores, y)?;
        let weights: Vec<&Array2<A>> = self.layers.iter().map(|layer| &layer.w).collect();
        Ok(data_loss + l2_regularization(self.reg, &weights))
    }

    fn eval_forward(&self, x: &Array2<A>) -> Result<Array2<A>> {
        let last = self.layers.len() - 1;
        let mut a = x.clone();
        for (i, layer) in self.layers.iter().take(last).enumerate() {
            let (z, _) = affine_forward(a, &layer.w, &layer.b)?;
            let z = match &self.batchnorm {
                Some(states) => states[i].normalize(&z)?,
                None => z,
            };
            let (out, _) = relu_forward(z);
            a = out;
        }
        let (scores, _) = affine_forward(a, &self.layers[last].w, &self.layers[last].b)?;
        Ok(scores)
    }

    pub fn save(&self, path: &str) -> Result<()>
    where
        A: Serialize,
    {
        let encoded: Vec<u8> = bincode::serialize(self).map_err(NNError::SerializationError)?;

        File::create(path)
            .map_err(NNError::IoError)?
            .write_all(&encoded)
            .map_err(NNError::IoError)?;

        Ok(())
    }

    pub fn load(path: &str) -> Result<FullyConnectedNet<A>>
    where
        A: DeserializeOwned,
    {
        let mut buffer = Vec::new();

        File::open(path)
            .map_err(NNError::IoError)?
            .read_to_end(&mut buffer)
            .map_err(NNError::IoError)?;

        let net: FullyConnectedNet<A> =
            bincode::deserialize(&buffer).map_err(NNError::SerializationError)?;

        if net.layers.is_empty() {
            return Err(NNError::InvalidConfiguration(
                "model file contains no layers".to_string(),
            ));
        }

        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_zero_dims() {
        let config = NetConfig::<f64> {
            hidden_dims: vec![5, 0],
            input_dim: 4,
            num_classes: 3,
            ..Default::default()
        };
        assert!(matches!(
            FullyConnectedNet::new(config),
            Err(NNError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_config_rejects_bad_dropout() {
        for p in [-0.1, 1.0, 1.5, f64::NAN] {
            let config = NetConfig {
                hidden_dims: vec![5],
                input_dim: 4,
                num_classes: 3,
                dropout: Some(p),
                ..Default::default()
            };
            assert!(matches!(
                FullyConnectedNet::new(config),
                Err(NNError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_count_parameters() {
        let config = NetConfig::<f64> {
            hidden_dims: vec![5],
            input_dim: 4,
            num_classes: 3,
            seed: Some(0),
            ..Default::default()
        };
        let net = FullyConnectedNet::new(config).unwrap();
        // (4*5 + 5) + (5*3 + 3)
        assert_eq!(net.count_parameters(), 43);
        assert_eq!(net.num_layers(), 2);
    }

    #[test]
    fn test_batchnorm_states_only_for_hidden_layers() {
        let config = NetConfig::<f64> {
            hidden_dims: vec![6, 4],
            input_dim: 3,
            num_classes: 2,
            batchnorm: true,
            seed: Some(0),
            ..Default::default()
        };
        let net = FullyConnectedNet::new(config).unwrap();
        let states = net.batchnorm.as_ref().unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].running_mean.len(), 6);
        assert_eq!(states[1].running_mean.len(), 4);
    }

    #[test]
    fn test_seeded_construction_is_reproducible() {
        let config = NetConfig::<f64> {
            hidden_dims: vec![5],
            input_dim: 4,
            num_classes: 3,
            seed: Some(42),
            ..Default::default()
        };
        let a = FullyConnectedNet::new(config.clone()).unwrap();
        let b = FullyConnectedNet::new(config).unwrap();
        assert_eq!(a.layers[0].w, b.layers[0].w);
        assert_eq!(a.layers[1].w, b.layers[1].w);
    }
}
