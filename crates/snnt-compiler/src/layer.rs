//! Layer model
//!
//! A trained network is consumed through the [`SourceLayer`] contract and
//! translated once into the closed [`Layer`] enum. Every shape excludes the
//! batch dimension; image-like tensors are channel-first `(c, h, w)`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};

use ndarray::{Array1, Array2, Array4, ArrayD, Ix2, Ix4, IxDyn};
use serde::{Deserialize, Serialize};
use snnt_storage::{Structure, INPUT_LABEL};

use crate::error::{ConversionError, Result};

/// What the conversion needs to know about one layer of a trained network
pub trait SourceLayer {
    /// Class name of the layer (`Dense`, `Conv2D`, ...)
    fn class_name(&self) -> &str;

    /// Unique layer name
    fn name(&self) -> &str;

    /// Input shape without the batch dimension (empty when unknown)
    fn input_shape(&self) -> &[usize];

    /// Output shape without the batch dimension
    fn output_shape(&self) -> &[usize];

    /// Weight tensor and bias vector, for layers that carry parameters
    fn weights(&self) -> Result<Option<(ArrayD<f64>, Array1<f64>)>>;

    /// Activation function name
    fn activation(&self) -> Option<&str> {
        None
    }

    /// Pooling window `(h, w)`
    fn pool_size(&self) -> Option<(usize, usize)> {
        None
    }

    /// Strides `(y, x)`
    fn strides(&self) -> Option<(usize, usize)> {
        None
    }

    /// Padding mode name
    fn padding(&self) -> Option<&str> {
        None
    }
}

/// Dense tensor in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    /// Dimensions
    pub shape: Vec<usize>,
    /// Row-major values
    pub data: Vec<f64>,
}

impl TensorSpec {
    /// Wrap an array
    pub fn from_array(array: &ArrayD<f64>) -> Self {
        Self {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    /// Build the array, checking that `data` fills `shape`
    pub fn to_array(&self) -> std::result::Result<ArrayD<f64>, String> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone())
            .map_err(|e| format!("tensor of shape {:?} with {} values: {}", self.shape, self.data.len(), e))
    }
}

/// Serialisable description of one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Class name used for dispatch
    pub class_name: String,
    /// Unique layer name
    pub name: String,
    /// Input shape without batch dimension
    #[serde(default)]
    pub input_shape: Vec<usize>,
    /// Output shape without batch dimension
    pub output_shape: Vec<usize>,
    /// Activation function name
    #[serde(default)]
    pub activation: Option<String>,
    /// Weight tensor
    #[serde(default)]
    pub weights: Option<TensorSpec>,
    /// Bias vector
    #[serde(default)]
    pub biases: Option<Vec<f64>>,
    /// Pooling window `(h, w)`
    #[serde(default)]
    pub pool_size: Option<(usize, usize)>,
    /// Strides `(y, x)`
    #[serde(default)]
    pub strides: Option<(usize, usize)>,
    /// Padding mode
    #[serde(default)]
    pub padding: Option<String>,
}

impl LayerSpec {
    /// Describe a layer without parameters
    pub fn new(class_name: impl Into<String>, name: impl Into<String>, output_shape: Vec<usize>) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            input_shape: Vec::new(),
            output_shape,
            activation: None,
            weights: None,
            biases: None,
            pool_size: None,
            strides: None,
            padding: None,
        }
    }

    /// Describe a dense layer
    pub fn dense(name: impl Into<String>, weights: Array2<f64>, biases: Vec<f64>) -> Self {
        let (rows, cols) = weights.dim();
        let mut spec = Self::new("Dense", name, vec![cols]);
        spec.input_shape = vec![rows];
        spec.activation = Some("relu".to_string());
        spec.weights = Some(TensorSpec::from_array(&weights.into_dyn()));
        spec.biases = Some(biases);
        spec
    }

    /// Set the activation
    pub fn with_activation(mut self, activation: impl Into<String>) -> Self {
        self.activation = Some(activation.into());
        self
    }

    /// Set the input shape
    pub fn with_input_shape(mut self, shape: Vec<usize>) -> Self {
        self.input_shape = shape;
        self
    }
}

impl SourceLayer for LayerSpec {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn weights(&self) -> Result<Option<(ArrayD<f64>, Array1<f64>)>> {
        let Some(tensor) = &self.weights else {
            return Ok(None);
        };
        let weights = tensor
            .to_array()
            .map_err(|reason| ConversionError::invalid_layer(&self.name, reason))?;
        let biases = match &self.biases {
            Some(b) => Array1::from(b.clone()),
            None => {
                let outputs = weights.shape().last().copied().unwrap_or(0);
                Array1::zeros(outputs)
            }
        };
        Ok(Some((weights, biases)))
    }

    fn activation(&self) -> Option<&str> {
        self.activation.as_deref()
    }

    fn pool_size(&self) -> Option<(usize, usize)> {
        self.pool_size
    }

    fn strides(&self) -> Option<(usize, usize)> {
        self.strides
    }

    fn padding(&self) -> Option<&str> {
        self.padding.as_deref()
    }
}

/// Serialisable description of a whole network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Input shape without batch dimension; taken from the first layer when absent
    #[serde(default)]
    pub input_shape: Option<Vec<usize>>,
    /// Layers in execution order
    pub layers: Vec<LayerSpec>,
}

/// Activation functions the source network may use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Identity
    Linear,
    /// Rectified linear
    Relu,
    /// Softmax, not representable with spikes
    Softmax,
    /// Anything else
    Other(String),
}

impl Activation {
    /// Parse an activation name; missing means linear
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            None | Some("linear") => Activation::Linear,
            Some("relu") => Activation::Relu,
            Some("softmax") => Activation::Softmax,
            Some(other) => Activation::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Linear => f.write_str("linear"),
            Activation::Relu => f.write_str("relu"),
            Activation::Softmax => f.write_str("softmax"),
            Activation::Other(name) => f.write_str(name),
        }
    }
}

/// Convolution border handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Only positions where the kernel fits entirely
    Valid,
    /// Output keeps the input size (before striding)
    Same,
}

/// Pooling operation of the source layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolingKind {
    /// Mean over the window
    Average,
    /// Maximum over the window; lowered as average
    Max,
}

/// Fully connected layer
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    /// Layer name
    pub name: String,
    /// Weights, rows = inputs, columns = outputs
    pub weights: Array2<f64>,
    /// One bias per output
    pub biases: Array1<f64>,
    /// Activation
    pub activation: Activation,
}

/// 2-D convolution layer
#[derive(Debug, Clone, PartialEq)]
pub struct ConvLayer {
    /// Layer name
    pub name: String,
    /// Kernel, shaped `(ky, kx, in_channels, out_channels)`
    pub kernel: Array4<f64>,
    /// One bias per output channel
    pub biases: Array1<f64>,
    /// Input `(c, h, w)`
    pub input_shape: [usize; 3],
    /// Output `(c, h, w)`
    pub output_shape: [usize; 3],
    /// Strides `(y, x)`
    pub strides: (usize, usize),
    /// Border handling
    pub padding: Padding,
    /// Activation
    pub activation: Activation,
}

impl ConvLayer {
    /// Kernel height and width
    pub fn kernel_size(&self) -> (usize, usize) {
        let (ky, kx, _, _) = self.kernel.dim();
        (ky, kx)
    }
}

/// 2-D pooling layer
#[derive(Debug, Clone, PartialEq)]
pub struct PoolingLayer {
    /// Layer name
    pub name: String,
    /// Source operation
    pub kind: PoolingKind,
    /// Input `(c, h, w)`
    pub input_shape: [usize; 3],
    /// Output `(c, h, w)`
    pub output_shape: [usize; 3],
    /// Window `(h, w)`
    pub pool_size: (usize, usize),
    /// Strides `(y, x)`
    pub strides: (usize, usize),
}

/// A layer of the network, after translation
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// Rate-coded input
    Input {
        /// Input shape
        shape: Vec<usize>,
    },
    /// Fully connected
    Dense(DenseLayer),
    /// Convolution
    Convolution(ConvLayer),
    /// Pooling
    Pooling(PoolingLayer),
    /// Reshape only; creates no population
    Flatten {
        /// Layer name
        name: String,
        /// Output shape
        output_shape: Vec<usize>,
    },
}

impl Layer {
    /// Translate a source layer, dispatching on its class name
    pub fn from_source<L: SourceLayer + ?Sized>(source: &L) -> Result<Self> {
        let name = source.name();
        match source.class_name() {
            "InputLayer" => {
                let shape = if source.output_shape().is_empty() {
                    source.input_shape().to_vec()
                } else {
                    source.output_shape().to_vec()
                };
                if shape.is_empty() || shape.contains(&0) {
                    return Err(ConversionError::invalid_layer(name, "input shape must be non-empty"));
                }
                Ok(Layer::Input { shape })
            }
            "Dense" => dense_from_source(source).map(Layer::Dense),
            "Conv2D" | "Convolution2D" => conv_from_source(source).map(Layer::Convolution),
            "AveragePooling2D" => pooling_from_source(source, PoolingKind::Average).map(Layer::Pooling),
            "MaxPooling2D" => pooling_from_source(source, PoolingKind::Max).map(Layer::Pooling),
            "Flatten" => Ok(Layer::Flatten {
                name: name.to_string(),
                output_shape: source.output_shape().to_vec(),
            }),
            other => Err(ConversionError::unsupported_layer(
                name,
                other,
                "no spiking counterpart",
            )),
        }
    }

    /// Population label of the layer
    pub fn name(&self) -> &str {
        match self {
            Layer::Input { .. } => INPUT_LABEL,
            Layer::Dense(l) => &l.name,
            Layer::Convolution(l) => &l.name,
            Layer::Pooling(l) => &l.name,
            Layer::Flatten { name, .. } => name,
        }
    }

    /// Output shape without batch dimension
    pub fn output_shape(&self) -> Vec<usize> {
        match self {
            Layer::Input { shape } => shape.clone(),
            Layer::Dense(l) => vec![l.weights.ncols()],
            Layer::Convolution(l) => l.output_shape.to_vec(),
            Layer::Pooling(l) => l.output_shape.to_vec(),
            Layer::Flatten { output_shape, .. } => output_shape.clone(),
        }
    }

    /// Number of neurons the layer's population needs
    pub fn size(&self) -> usize {
        self.output_shape().iter().product()
    }

    /// Spatial arrangement of the population
    pub fn structure(&self) -> Structure {
        structure_for_shape(&self.output_shape())
    }

    /// True for layers that create a population
    pub fn creates_population(&self) -> bool {
        !matches!(self, Layer::Flatten { .. })
    }
}

/// Line for vectors, a grid for `(c, h, w)` feature maps
pub fn structure_for_shape(shape: &[usize]) -> Structure {
    match shape {
        [_, h, w] if *h > 0 => Structure::Grid2D {
            aspect_ratio: *w as f64 / *h as f64,
        },
        _ => Structure::Line,
    }
}

/// Check that `name` can be used as a file name inside an output directory.
///
/// Connection files are named after their layer, so a name must be a single
/// plain path component.
pub fn check_label(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == name
    );
    if !single || name.contains(['/', '\\', '\0']) {
        return Err(ConversionError::invalid_layer(
            name,
            "layer name must be a plain file name",
        ));
    }
    Ok(())
}

/// Translate a whole model.
///
/// An input layer is prepended when the model does not start with one.
/// Layer names must be unique plain file names.
pub fn translate_model(model: &ModelSpec) -> Result<Vec<Layer>> {
    let mut layers = Vec::with_capacity(model.layers.len() + 1);

    let starts_with_input = model
        .layers
        .first()
        .map(|l| l.class_name == "InputLayer")
        .unwrap_or(false);
    if !starts_with_input {
        let shape = model
            .input_shape
            .clone()
            .or_else(|| model.layers.first().map(|l| l.input_shape.clone()))
            .unwrap_or_default();
        if shape.is_empty() {
            return Err(ConversionError::invalid_layer(
                INPUT_LABEL,
                "model has no input layer and no input shape",
            ));
        }
        layers.push(Layer::Input { shape });
    }

    let mut seen = HashSet::new();
    seen.insert(INPUT_LABEL.to_string());
    for spec in &model.layers {
        let layer = Layer::from_source(spec)?;
        check_label(layer.name())?;
        if !matches!(layer, Layer::Input { .. }) && !seen.insert(layer.name().to_string()) {
            return Err(ConversionError::invalid_layer(layer.name(), "duplicate layer name"));
        }
        log::debug!("Translated layer '{}' ({})", layer.name(), spec.class_name);
        layers.push(layer);
    }

    if layers.iter().filter(|l| matches!(l, Layer::Input { .. })).count() != 1 {
        return Err(ConversionError::invalid_layer(INPUT_LABEL, "model must have exactly one input layer"));
    }
    Ok(layers)
}

fn dense_from_source<L: SourceLayer + ?Sized>(source: &L) -> Result<DenseLayer> {
    let name = source.name();
    let (weights, biases) = source
        .weights()?
        .ok_or_else(|| ConversionError::invalid_layer(name, "dense layer has no weights"))?;
    let weights = weights
        .into_dimensionality::<Ix2>()
        .map_err(|_| ConversionError::invalid_layer(name, "dense weights must be 2-D"))?;

    let (rows, cols) = weights.dim();
    if biases.len() != cols {
        return Err(ConversionError::invalid_layer(
            name,
            format!("{} biases for {} outputs", biases.len(), cols),
        ));
    }
    let out: usize = source.output_shape().iter().product();
    if !source.output_shape().is_empty() && out != cols {
        return Err(ConversionError::invalid_layer(
            name,
            format!("output shape {:?} does not match {} weight columns", source.output_shape(), cols),
        ));
    }
    let input: usize = source.input_shape().iter().product();
    if !source.input_shape().is_empty() && input != rows {
        return Err(ConversionError::invalid_layer(
            name,
            format!("input shape {:?} does not match {} weight rows", source.input_shape(), rows),
        ));
    }

    Ok(DenseLayer {
        name: name.to_string(),
        weights,
        biases,
        activation: Activation::from_name(source.activation()),
    })
}

fn image_shape<L: SourceLayer + ?Sized>(source: &L, shape: &[usize], what: &str) -> Result<[usize; 3]> {
    match shape {
        [c, h, w] if *c > 0 && *h > 0 && *w > 0 => Ok([*c, *h, *w]),
        [_, _, _] => Err(ConversionError::invalid_layer(
            source.name(),
            format!("{} shape {:?} has an empty dimension", what, shape),
        )),
        other => Err(ConversionError::invalid_layer(
            source.name(),
            format!("{} shape must be (c, h, w), got {:?}", what, other),
        )),
    }
}

fn conv_from_source<L: SourceLayer + ?Sized>(source: &L) -> Result<ConvLayer> {
    let name = source.name();
    let (kernel, biases) = source
        .weights()?
        .ok_or_else(|| ConversionError::invalid_layer(name, "convolution layer has no weights"))?;
    let kernel = kernel
        .into_dimensionality::<Ix4>()
        .map_err(|_| ConversionError::invalid_layer(name, "convolution kernel must be 4-D (ky, kx, in, out)"))?;
    let input_shape = image_shape(source, source.input_shape(), "input")?;
    let output_shape = image_shape(source, source.output_shape(), "output")?;

    let (ky, kx, fin, fout) = kernel.dim();
    if ky % 2 == 0 || kx % 2 == 0 {
        return Err(ConversionError::unsupported_layer(
            name,
            source.class_name(),
            format!("even kernel size {}x{}", ky, kx),
        ));
    }
    if fin != input_shape[0] || fout != output_shape[0] {
        return Err(ConversionError::invalid_layer(
            name,
            format!(
                "kernel channels {}->{} do not match shapes {:?} -> {:?}",
                fin, fout, input_shape, output_shape
            ),
        ));
    }
    if biases.len() != fout {
        return Err(ConversionError::invalid_layer(
            name,
            format!("{} biases for {} output channels", biases.len(), fout),
        ));
    }

    let padding = match source.padding() {
        None | Some("valid") => Padding::Valid,
        Some("same") => Padding::Same,
        Some(other) => {
            return Err(ConversionError::unsupported_layer(
                name,
                source.class_name(),
                format!("padding '{}'", other),
            ))
        }
    };
    let strides = source.strides().unwrap_or((1, 1));
    if strides.0 == 0 || strides.1 == 0 {
        return Err(ConversionError::invalid_layer(name, "strides must be positive"));
    }

    let [_, ny, nx] = input_shape;
    let (my, mx) = match padding {
        Padding::Valid => {
            if ny < ky || nx < kx {
                return Err(ConversionError::invalid_layer(name, "kernel larger than input"));
            }
            ((ny - ky) / strides.0 + 1, (nx - kx) / strides.1 + 1)
        }
        Padding::Same => ((ny - 1) / strides.0 + 1, (nx - 1) / strides.1 + 1),
    };
    if [fout, my, mx] != output_shape {
        return Err(ConversionError::invalid_layer(
            name,
            format!("expected output shape {:?}, layer reports {:?}", [fout, my, mx], output_shape),
        ));
    }

    Ok(ConvLayer {
        name: name.to_string(),
        kernel,
        biases,
        input_shape,
        output_shape,
        strides,
        padding,
        activation: Activation::from_name(source.activation()),
    })
}

fn pooling_from_source<L: SourceLayer + ?Sized>(source: &L, kind: PoolingKind) -> Result<PoolingLayer> {
    let name = source.name();
    let input_shape = image_shape(source, source.input_shape(), "input")?;
    let output_shape = image_shape(source, source.output_shape(), "output")?;
    let pool_size = source
        .pool_size()
        .ok_or_else(|| ConversionError::invalid_layer(name, "pooling layer has no pool size"))?;
    let strides = source.strides().unwrap_or(pool_size);
    if pool_size.0 == 0 || pool_size.1 == 0 || strides.0 == 0 || strides.1 == 0 {
        return Err(ConversionError::invalid_layer(name, "pool size and strides must be positive"));
    }

    let [c, ny, nx] = input_shape;
    if ny < pool_size.0 || nx < pool_size.1 {
        return Err(ConversionError::invalid_layer(name, "pool window larger than input"));
    }
    let expected = [c, (ny - pool_size.0) / strides.0 + 1, (nx - pool_size.1) / strides.1 + 1];
    if expected != output_shape {
        return Err(ConversionError::invalid_layer(
            name,
            format!("expected output shape {:?}, layer reports {:?}", expected, output_shape),
        ));
    }

    Ok(PoolingLayer {
        name: name.to_string(),
        kind,
        input_shape,
        output_shape,
        pool_size,
        strides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn conv_spec(input: Vec<usize>, output: Vec<usize>, kernel: (usize, usize, usize, usize)) -> LayerSpec {
        let (ky, kx, fin, fout) = kernel;
        let mut spec = LayerSpec::new("Conv2D", "conv_1", output).with_input_shape(input);
        spec.weights = Some(TensorSpec {
            shape: vec![ky, kx, fin, fout],
            data: vec![0.1; ky * kx * fin * fout],
        });
        spec.biases = Some(vec![0.0; fout]);
        spec
    }

    #[test]
    fn test_dense_dispatch() {
        let spec = LayerSpec::dense("dense_1", array![[0.5, -0.2, 0.0], [-0.1, 0.3, 0.4]], vec![0.0; 3]);
        let layer = Layer::from_source(&spec).unwrap();
        match &layer {
            Layer::Dense(dense) => {
                assert_eq!(dense.weights.dim(), (2, 3));
                assert_eq!(dense.activation, Activation::Relu);
            }
            other => panic!("expected dense, got {:?}", other),
        }
        assert_eq!(layer.size(), 3);
        assert_eq!(layer.structure(), Structure::Line);
    }

    #[test]
    fn test_unsupported_class() {
        let spec = LayerSpec::new("BatchNormalization", "bn", vec![4]);
        let err = Layer::from_source(&spec).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedLayer { ref class_name, .. } if class_name == "BatchNormalization"));
    }

    #[test]
    fn test_dense_rejects_bad_rank_and_biases() {
        let mut spec = LayerSpec::new("Dense", "d", vec![2]);
        spec.weights = Some(TensorSpec { shape: vec![2, 2, 1], data: vec![0.0; 4] });
        assert!(matches!(Layer::from_source(&spec), Err(ConversionError::InvalidLayer { .. })));

        let mut spec = LayerSpec::dense("d", Array2::zeros((2, 2)), vec![0.0; 2]);
        spec.biases = Some(vec![0.0; 3]);
        assert!(matches!(Layer::from_source(&spec), Err(ConversionError::InvalidLayer { .. })));

        let mut spec = LayerSpec::dense("d", Array2::zeros((2, 2)), vec![0.0; 2]);
        spec.weights = Some(TensorSpec { shape: vec![2, 2], data: vec![0.0; 3] });
        assert!(matches!(Layer::from_source(&spec), Err(ConversionError::InvalidLayer { .. })));
    }

    #[test]
    fn test_conv_dispatch_and_grid_structure() {
        let spec = conv_spec(vec![1, 4, 6], vec![2, 2, 4], (3, 3, 1, 2));
        let layer = Layer::from_source(&spec).unwrap();
        assert!(matches!(layer, Layer::Convolution(_)));
        assert_eq!(layer.size(), 16);
        assert_eq!(layer.structure(), Structure::Grid2D { aspect_ratio: 2.0 });

        let mut same = conv_spec(vec![1, 4, 6], vec![2, 4, 6], (3, 3, 1, 2));
        same.class_name = "Convolution2D".to_string();
        same.padding = Some("same".to_string());
        assert!(Layer::from_source(&same).is_ok());
    }

    #[test]
    fn test_conv_rejections() {
        let even = conv_spec(vec![1, 4, 4], vec![1, 3, 3], (2, 2, 1, 1));
        assert!(matches!(Layer::from_source(&even), Err(ConversionError::UnsupportedLayer { .. })));

        let mut causal = conv_spec(vec![1, 4, 4], vec![1, 2, 2], (3, 3, 1, 1));
        causal.padding = Some("causal".to_string());
        assert!(matches!(Layer::from_source(&causal), Err(ConversionError::UnsupportedLayer { .. })));

        let wrong_out = conv_spec(vec![1, 4, 4], vec![1, 4, 4], (3, 3, 1, 1));
        assert!(matches!(Layer::from_source(&wrong_out), Err(ConversionError::InvalidLayer { .. })));

        let mut empty = conv_spec(vec![1, 0, 3], vec![1, 0, 3], (3, 3, 1, 1));
        empty.padding = Some("same".to_string());
        assert!(matches!(Layer::from_source(&empty), Err(ConversionError::InvalidLayer { .. })));

        let mut empty_pool = LayerSpec::new("AveragePooling2D", "pool_1", vec![2, 1, 0]).with_input_shape(vec![2, 2, 0]);
        empty_pool.pool_size = Some((2, 2));
        assert!(matches!(Layer::from_source(&empty_pool), Err(ConversionError::InvalidLayer { .. })));
    }

    #[test]
    fn test_pooling_dispatch() {
        let mut spec = LayerSpec::new("MaxPooling2D", "pool_1", vec![2, 2, 2]).with_input_shape(vec![2, 4, 4]);
        spec.pool_size = Some((2, 2));
        match Layer::from_source(&spec).unwrap() {
            Layer::Pooling(pool) => {
                assert_eq!(pool.kind, PoolingKind::Max);
                assert_eq!(pool.strides, (2, 2));
            }
            other => panic!("expected pooling, got {:?}", other),
        }

        spec.pool_size = None;
        assert!(Layer::from_source(&spec).is_err());
    }

    #[test]
    fn test_translate_model_prepends_input() {
        let model = ModelSpec {
            input_shape: Some(vec![1, 2, 2]),
            layers: vec![
                LayerSpec::new("Flatten", "flatten", vec![4]).with_input_shape(vec![1, 2, 2]),
                LayerSpec::dense("dense", Array2::zeros((4, 2)), vec![0.0; 2]).with_activation("softmax"),
            ],
        };
        let layers = translate_model(&model).unwrap();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], Layer::Input { shape: vec![1, 2, 2] });
        assert_eq!(layers[0].name(), INPUT_LABEL);
        assert!(!layers[1].creates_population());
        match &layers[2] {
            Layer::Dense(d) => assert_eq!(d.activation, Activation::Softmax),
            other => panic!("expected dense, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_model_rejects_duplicates_and_missing_input() {
        let model = ModelSpec {
            input_shape: Some(vec![2]),
            layers: vec![
                LayerSpec::dense("d", Array2::zeros((2, 2)), vec![0.0; 2]),
                LayerSpec::dense("d", Array2::zeros((2, 2)), vec![0.0; 2]),
            ],
        };
        assert!(matches!(translate_model(&model), Err(ConversionError::InvalidLayer { .. })));

        let model = ModelSpec {
            input_shape: None,
            layers: vec![LayerSpec::new("Flatten", "f", vec![4])],
        };
        assert!(translate_model(&model).is_err());
    }

    #[test]
    fn test_layer_names_must_be_plain_file_names() {
        for bad in ["../escape", "nested/dense", "/abs", "..", ".", "", "dense/", "win\\dense"] {
            let model = ModelSpec {
                input_shape: Some(vec![2]),
                layers: vec![LayerSpec::dense(bad, Array2::zeros((2, 2)), vec![0.0; 2])],
            };
            assert!(
                matches!(translate_model(&model), Err(ConversionError::InvalidLayer { .. })),
                "{:?} accepted",
                bad
            );
        }
        assert!(check_label("dense_1").is_ok());
        assert!(check_label("conv.2d").is_ok());
    }

    #[test]
    fn test_model_spec_from_json() {
        let json = r#"{
            "input_shape": [2],
            "layers": [{
                "class_name": "Dense",
                "name": "dense_1",
                "output_shape": [3],
                "activation": "relu",
                "weights": {"shape": [2, 3], "data": [0.5, -0.2, 0.0, -0.1, 0.3, 0.4]},
                "biases": [0.0, 0.1, 0.0]
            }]
        }"#;
        let model: ModelSpec = serde_json::from_str(json).unwrap();
        let layers = translate_model(&model).unwrap();
        match &layers[1] {
            Layer::Dense(d) => {
                assert_eq!(d.weights, array![[0.5, -0.2, 0.0], [-0.1, 0.3, 0.4]]);
                assert_eq!(d.biases[1], 0.1);
            }
            other => panic!("expected dense, got {:?}", other),
        }
    }
}
