use std::path::Path;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::layers::{Activation, Convolution, Flatten, Layer, Linear, LogRegression, MaxPool};
use crate::network::chain::Chain;
use crate::network::recurrent::RecurrentChain;
use crate::shadow::policy::Recurrence;

fn default_weight_scale() -> f64 {
    0.5
}

/// One layer of a [`ChainSpec`].
///
/// Linear, activation, flatten and log-regression layers take their input
/// shape from the layer before them. Convolution and max pooling spell out
/// their tiling, and it has to multiply out to the running shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    Linear {
        output_cols: usize,
        #[serde(default = "default_weight_scale")]
        weight_scale: f64,
        #[serde(default)]
        weight_decay: f64,
        #[serde(default)]
        bias: bool,
    },
    Activation {
        #[serde(default)]
        function: ActivationFunction,
    },
    Convolution {
        items: usize,
        in_channels: usize,
        out_channels: usize,
        item_rows: usize,
        item_cols: usize,
        kernel_rows: usize,
        kernel_cols: usize,
        #[serde(default)]
        weight_decay: f64,
    },
    MaxPool {
        items: usize,
        channels: usize,
        item_rows: usize,
        item_cols: usize,
        pool_rows: usize,
        pool_cols: usize,
    },
    Flatten,
    LogRegression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(flatten)]
    pub kind: LayerKind,
    /// Shadow policy when built into a recurrent chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl LayerSpec {
    pub fn new(kind: LayerKind) -> LayerSpec {
        LayerSpec { kind, recurrence: None }
    }

    pub fn with_recurrence(kind: LayerKind, recurrence: Recurrence) -> LayerSpec {
        LayerSpec { kind, recurrence: Some(recurrence) }
    }

    fn build<R: Rng + ?Sized>(&self, input: (usize, usize), rng: &mut R) -> Result<Box<dyn Layer>> {
        let (rows, cols) = input;
        let layer: Box<dyn Layer> = match self.kind {
            LayerKind::Linear { output_cols, weight_scale, weight_decay, bias } => Box::new(Linear::new(
                rng,
                rows,
                cols,
                output_cols,
                weight_scale,
                weight_decay,
                bias,
            )),
            LayerKind::Activation { function } => Box::new(Activation::new(rows, cols, function)),
            LayerKind::Convolution {
                items,
                in_channels,
                out_channels,
                item_rows,
                item_cols,
                kernel_rows,
                kernel_cols,
                weight_decay,
            } => Box::new(Convolution::new(
                rng,
                items,
                in_channels,
                out_channels,
                item_rows,
                item_cols,
                kernel_rows,
                kernel_cols,
                weight_decay,
            )),
            LayerKind::MaxPool { items, channels, item_rows, item_cols, pool_rows, pool_cols } => {
                Box::new(MaxPool::new(items, channels, item_rows, item_cols, pool_rows, pool_cols)?)
            }
            LayerKind::Flatten => Box::new(Flatten::new(rows, cols)),
            LayerKind::LogRegression => Box::new(LogRegression::new(rows, cols)),
        };
        if layer.input_dim() != input {
            return Err(NnError::shape("layer spec tiling", input, layer.input_dim()));
        }
        Ok(layer)
    }
}

/// Serializable architecture of a chain: input shape plus layers.
///
/// Only the architecture is described; weights are drawn fresh on every
/// build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub name: String,
    /// `(rows, cols)` of the input matrix.
    pub input: (usize, usize),
    #[serde(default)]
    pub recurrent: bool,
    pub layers: Vec<LayerSpec>,
}

impl ChainSpec {
    pub fn from_json_str(json: &str) -> Result<ChainSpec> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `ChainSpec` from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<ChainSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Builds a feed-forward chain. `recurrence` entries are ignored.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Chain> {
        let mut chain = Chain::new();
        let mut shape = self.input;
        for (i, spec) in self.layers.iter().enumerate() {
            if spec.recurrence.is_some() {
                warn!("{}: layer {i} has a recurrence but the chain is feed-forward", self.name);
            }
            let layer = spec.build(shape, rng)?;
            shape = layer.output_dim();
            chain.push_boxed(layer);
        }
        debug!("built chain {} with {} layer(s), output {:?}", self.name, chain.len(), shape);
        Ok(chain)
    }

    /// Builds a recurrent chain; layers without a `recurrence` get the
    /// default delayed-update input recording.
    pub fn build_recurrent<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RecurrentChain> {
        let mut chain = RecurrentChain::new();
        let mut shape = self.input;
        for spec in &self.layers {
            let layer = spec.build(shape, rng)?;
            shape = layer.output_dim();
            chain.add_recurrent_boxed(layer, spec.recurrence.unwrap_or_default(), rng);
        }
        debug!("built recurrent chain {} with {} layer(s), output {:?}", self.name, chain.len(), shape);
        Ok(chain)
    }
}

impl ChainSpec {
    /// Builds whichever chain `recurrent` asks for.
    pub fn build_layer<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Box<dyn Layer>> {
        if self.recurrent {
            Ok(Box::new(self.build_recurrent(rng)?))
        } else {
            Ok(Box::new(self.build(rng)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const CONV_NET: &str = r#"{
        "name": "tiny-conv",
        "input": [4, 4],
        "layers": [
            { "type": "convolution", "items": 1, "in_channels": 1, "out_channels": 2,
              "item_rows": 4, "item_cols": 4, "kernel_rows": 3, "kernel_cols": 3 },
            { "type": "max_pool", "items": 1, "channels": 2, "item_rows": 4, "item_cols": 4,
              "pool_rows": 2, "pool_cols": 2 },
            { "type": "flatten" },
            { "type": "linear", "output_cols": 3, "bias": true },
            { "type": "log_regression" }
        ]
    }"#;

    #[test]
    fn parses_tagged_layers_with_defaults() {
        let spec = ChainSpec::from_json_str(CONV_NET).unwrap();
        assert!(!spec.recurrent);
        assert_eq!(
            spec.layers[3].kind,
            LayerKind::Linear { output_cols: 3, weight_scale: 0.5, weight_decay: 0.0, bias: true }
        );
        assert_eq!(spec.layers[2].recurrence, None);
    }

    #[test]
    fn builds_and_runs_a_conv_pipeline() {
        let spec = ChainSpec::from_json_str(CONV_NET).unwrap();
        let mut chain = spec.build(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(chain.len(), 5);
        assert_eq!(chain.output_dim(), (1, 3));
        let out = chain.predict(&Matrix::filled(4, 4, 0.5)).unwrap();
        assert!((out.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_tiling_is_rejected() {
        let mut spec = ChainSpec::from_json_str(CONV_NET).unwrap();
        spec.input = (4, 5);
        let err = spec.build(&mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch { .. }));
    }

    #[test]
    fn recurrent_build_applies_each_policy() {
        let spec = ChainSpec {
            name: "rnn".into(),
            input: (1, 2),
            recurrent: true,
            layers: vec![
                LayerSpec::new(LayerKind::Linear { output_cols: 3, weight_scale: 0.5, weight_decay: 0.0, bias: false }),
                LayerSpec::with_recurrence(
                    LayerKind::Activation { function: ActivationFunction::Tanh },
                    Recurrence::BasicRecurrence,
                ),
            ],
        };
        let json = spec.to_json_string().unwrap();
        assert!(json.contains("\"recurrence\": \"basic_recurrence\""));
        assert_eq!(ChainSpec::from_json_str(&json).unwrap(), spec);

        let mut net = spec.build_recurrent(&mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(net.layer(1).unwrap().name(), "Shadow");
        let x = Matrix::filled(1, 2, 1.0);
        assert_ne!(net.predict(&x).unwrap(), net.predict(&x).unwrap());

        let layer = spec.build_layer(&mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(layer.name(), "RecurrentChain");
    }

    #[test]
    fn unknown_layer_type_is_a_json_error() {
        let err = ChainSpec::from_json_str(r#"{"name":"x","input":[1,1],"layers":[{"type":"dropout"}]}"#)
            .unwrap_err();
        assert!(matches!(err, NnError::Json(_)));
    }
}
