//! Flattening convolution and pooling kernels into connection lists
//!
//! Feature maps are flattened channel-major: neuron `x + y * w + c * w * h`.

use snnt_storage::Connection;

use crate::layer::{ConvLayer, Padding, PoolingLayer};

/// Connections and per-neuron biases of a convolution layer.
///
/// For a source at offset `(k, l)` from the kernel centre the weight is
/// `kernel[py - k, px - l]`, or `kernel[py + k, px + l]` when
/// `transpose_kernel` is set. Sources outside the input are skipped.
pub fn build_convolution(layer: &ConvLayer, delay: f64, transpose_kernel: bool) -> (Vec<Connection>, Vec<f64>) {
    let [_, ny, nx] = layer.input_shape;
    let [nf_out, my, mx] = layer.output_shape;
    let (ky, kx) = layer.kernel_size();
    let nf_in = layer.input_shape[0];
    let (sy, sx) = layer.strides;
    let py = (ky - 1) / 2;
    let px = (kx - 1) / 2;
    let (y0, x0) = match layer.padding {
        Padding::Valid => (py, px),
        Padding::Same => (0, 0),
    };

    let mut connections = Vec::new();
    for fout in 0..nf_out {
        for oy in 0..my {
            let y = y0 + oy * sy;
            for ox in 0..mx {
                let x = x0 + ox * sx;
                let target = ox + oy * mx + fout * mx * my;
                for fin in 0..nf_in {
                    for dk in 0..ky {
                        // Row offset from the centre, in [-py, py]
                        let k = dk as isize - py as isize;
                        let yy = y as isize + k;
                        if yy < 0 || yy >= ny as isize {
                            continue;
                        }
                        for dl in 0..kx {
                            let l = dl as isize - px as isize;
                            let xx = x as isize + l;
                            if xx < 0 || xx >= nx as isize {
                                continue;
                            }
                            let (wy, wx) = if transpose_kernel {
                                (dk, dl)
                            } else {
                                (ky - 1 - dk, kx - 1 - dl)
                            };
                            let weight = layer.kernel[[wy, wx, fin, fout]];
                            let source = xx as usize + yy as usize * nx + fin * nx * ny;
                            connections.push(Connection::new(source, target, weight, delay));
                        }
                    }
                }
            }
        }
    }

    let per_channel = mx * my;
    let biases = layer
        .biases
        .iter()
        .flat_map(|&b| std::iter::repeat(b).take(per_channel))
        .collect();

    (connections, biases)
}

/// Connections of an average pooling layer, one per window element with
/// weight `1 / (pool_h * pool_w)`.
pub fn build_pooling(layer: &PoolingLayer, delay: f64) -> Vec<Connection> {
    let [nf, ny, nx] = layer.input_shape;
    let [_, my, mx] = layer.output_shape;
    let (dy, dx) = layer.pool_size;
    let (sy, sx) = layer.strides;
    let weight = 1.0 / (dy * dx) as f64;

    let mut connections = Vec::with_capacity(nf * my * mx * dy * dx);
    for f in 0..nf {
        for oy in 0..my {
            for ox in 0..mx {
                let target = ox + oy * mx + f * mx * my;
                for k in 0..dy {
                    let row = (oy * sy + k) * nx + f * nx * ny;
                    for j in 0..dx {
                        connections.push(Connection::new(row + ox * sx + j, target, weight, delay));
                    }
                }
            }
        }
    }
    connections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Activation, PoolingKind};
    use ndarray::{Array1, Array4};

    /// 3x3 kernel with distinct weights 1..=9 in row-major order
    fn conv_layer(input: [usize; 3], output: [usize; 3], padding: Padding) -> ConvLayer {
        let kernel = Array4::from_shape_fn((3, 3, 1, 1), |(y, x, _, _)| (y * 3 + x + 1) as f64);
        ConvLayer {
            name: "conv".to_string(),
            kernel,
            biases: Array1::from(vec![0.25]),
            input_shape: input,
            output_shape: output,
            strides: (1, 1),
            padding,
            activation: Activation::Relu,
        }
    }

    fn weight_of(conns: &[Connection], source: usize, target: usize) -> Option<f64> {
        conns
            .iter()
            .find(|c| c.source == source && c.target == target)
            .map(|c| c.weight)
    }

    #[test]
    fn test_valid_convolution_single_output() {
        let layer = conv_layer([1, 3, 3], [1, 1, 1], Padding::Valid);
        let (conns, biases) = build_convolution(&layer, 1.0, true);

        assert_eq!(conns.len(), 9);
        assert!(conns.iter().all(|c| c.target == 0 && c.delay == 1.0));
        // Transposed: source (y, x) reads kernel[y, x]
        for source in 0..9 {
            assert_eq!(weight_of(&conns, source, 0), Some(source as f64 + 1.0));
        }
        assert_eq!(biases, vec![0.25]);
    }

    #[test]
    fn test_kernel_orientation_is_flipped_without_transpose() {
        let layer = conv_layer([1, 3, 3], [1, 1, 1], Padding::Valid);
        let (conns, _) = build_convolution(&layer, 1.0, false);

        // Top-left source reads the bottom-right kernel weight
        assert_eq!(weight_of(&conns, 0, 0), Some(9.0));
        assert_eq!(weight_of(&conns, 8, 0), Some(1.0));
        assert_eq!(weight_of(&conns, 4, 0), Some(5.0));
    }

    #[test]
    fn test_same_padding_skips_out_of_bounds() {
        let layer = conv_layer([1, 3, 3], [1, 3, 3], Padding::Same);
        let (conns, biases) = build_convolution(&layer, 1.0, true);

        // Corner targets see 4 sources, edges 6, centre 9
        assert_eq!(conns.len(), 4 * 4 + 4 * 6 + 9);
        assert_eq!(conns.iter().filter(|c| c.target == 0).count(), 4);
        assert_eq!(conns.iter().filter(|c| c.target == 4).count(), 9);
        // Target 0 at (0, 0): source (0, 0) is offset (0, 0) -> centre weight
        assert_eq!(weight_of(&conns, 0, 0), Some(5.0));
        // Source (1, 1) is offset (+1, +1) -> kernel[2, 2]
        assert_eq!(weight_of(&conns, 4, 0), Some(9.0));
        assert_eq!(biases.len(), 9);
    }

    #[test]
    fn test_bias_repeated_per_channel() {
        let mut layer = conv_layer([1, 3, 3], [2, 3, 3], Padding::Same);
        layer.kernel = Array4::ones((3, 3, 1, 2));
        layer.biases = Array1::from(vec![1.0, -2.0]);
        let (conns, biases) = build_convolution(&layer, 1.0, true);

        assert_eq!(biases.len(), 18);
        assert!(biases[..9].iter().all(|&b| b == 1.0));
        assert!(biases[9..].iter().all(|&b| b == -2.0));
        assert!(conns.iter().any(|c| c.target >= 9));
    }

    #[test]
    fn test_average_pooling() {
        let layer = PoolingLayer {
            name: "pool".to_string(),
            kind: PoolingKind::Average,
            input_shape: [2, 4, 4],
            output_shape: [2, 2, 2],
            pool_size: (2, 2),
            strides: (2, 2),
        };
        let conns = build_pooling(&layer, 1.0);

        assert_eq!(conns.len(), 2 * 4 * 4);
        assert!(conns.iter().all(|c| c.weight == 0.25));
        let mut sources: Vec<usize> = conns.iter().filter(|c| c.target == 3).map(|c| c.source).collect();
        sources.sort_unstable();
        assert_eq!(sources, vec![10, 11, 14, 15]);
        let mut sources: Vec<usize> = conns.iter().filter(|c| c.target == 4).map(|c| c.source).collect();
        sources.sort_unstable();
        assert_eq!(sources, vec![16, 17, 20, 21]);
    }
}
