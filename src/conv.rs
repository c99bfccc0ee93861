use crate::error::{ParcError, Result};
use crate::integrator::FieldTransform;
use ndarray::{Array1, Array3, Array4, ArrayView3, ArrayView4, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Tanh,
    Relu,
    Identity,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::Identity => x,
        }
    }
}

/// Stride-1, same-padded 2-D convolution over (batch, x, y, channel) tensors.
#[derive(Debug, Clone)]
pub struct Conv2d {
    weights: Array4<f64>, // (kernel, kernel, in, out)
    bias: Array1<f64>,
    activation: Activation,
}

impl Conv2d {
    pub fn new(weights: Array4<f64>, bias: Array1<f64>, activation: Activation) -> Result<Self> {
        let (kx, ky, _, out) = weights.dim();
        if kx != ky || kx % 2 == 0 {
            return Err(ParcError::InvalidParameter(format!(
                "kernel must be square with odd side, got {}x{}",
                kx, ky
            )));
        }
        if bias.len() != out {
            return Err(ParcError::shape("convolution bias", out, bias.len()));
        }
        Ok(Self {
            weights,
            bias,
            activation,
        })
    }

    /// All-zero weights and bias.
    pub fn zeros(in_channels: usize, out_channels: usize, kernel: usize, activation: Activation) -> Result<Self> {
        Self::new(
            Array4::zeros((kernel, kernel, in_channels, out_channels)),
            Array1::zeros(out_channels),
            activation,
        )
    }

    /// He-normal weights (std = sqrt(2 / fan_in)) and zero bias.
    pub fn he_normal<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let fan_in = (kernel * kernel * in_channels) as f64;
        let normal = Normal::new(0.0, (2.0 / fan_in).sqrt())
            .map_err(|e| ParcError::InvalidParameter(format!("he_normal: {}", e)))?;
        let weights = Array4::from_shape_simple_fn((kernel, kernel, in_channels, out_channels), || {
            normal.sample(&mut *rng)
        });
        Self::new(weights, Array1::zeros(out_channels), activation)
    }

    pub fn kernel(&self) -> usize {
        self.weights.len_of(Axis(0))
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn forward_one(&self, input: ArrayView3<f64>) -> Array3<f64> {
        let (w, h, in_channels) = input.dim();
        let out_channels = self.bias.len();
        let k = self.kernel();
        let pad = (k / 2) as isize;
        let mut out = Array3::<f64>::zeros((w, h, out_channels));

        for i in 0..w {
            for j in 0..h {
                for o in 0..out_channels {
                    let mut acc = self.bias[o];
                    for di in 0..k {
                        let x = i as isize + di as isize - pad;
                        if x < 0 || x >= w as isize {
                            continue;
                        }
                        for dj in 0..k {
                            let y = j as isize + dj as isize - pad;
                            if y < 0 || y >= h as isize {
                                continue;
                            }
                            for c in 0..in_channels {
                                acc += self.weights[[di, dj, c, o]]
                                    * input[[x as usize, y as usize, c]];
                            }
                        }
                    }
                    out[[i, j, o]] = self.activation.apply(acc);
                }
            }
        }
        out
    }
}

impl FieldTransform for Conv2d {
    fn in_channels(&self) -> usize {
        self.weights.len_of(Axis(2))
    }

    fn out_channels(&self) -> usize {
        self.weights.len_of(Axis(3))
    }

    fn apply(&self, input: ArrayView4<f64>) -> Result<Array4<f64>> {
        let (batch, w, h, channels) = input.dim();
        if channels != self.in_channels() {
            return Err(ParcError::shape(
                "convolution input channels",
                self.in_channels(),
                channels,
            ));
        }

        // Batch items are independent
        let items: Vec<Array3<f64>> = (0..batch)
            .into_par_iter()
            .map(|b| self.forward_one(input.index_axis(Axis(0), b)))
            .collect();

        let mut out = Array4::<f64>::zeros((batch, w, h, self.out_channels()));
        for (b, item) in items.into_iter().enumerate() {
            out.index_axis_mut(Axis(0), b).assign(&item);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn identity_kernel_copies_input() {
        let mut weights = Array4::<f64>::zeros((3, 3, 2, 2));
        weights[[1, 1, 0, 0]] = 1.0;
        weights[[1, 1, 1, 1]] = 1.0;
        let conv = Conv2d::new(weights, Array1::zeros(2), Activation::Identity).unwrap();
        let input = Array::from_shape_fn((2, 4, 5, 2), |(b, i, j, c)| (b + i * j + c) as f64);
        let out = conv.apply(input.view()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn box_filter_uses_zero_padding() {
        let weights = Array4::<f64>::ones((3, 3, 1, 1));
        let conv = Conv2d::new(weights, Array1::from_elem(1, 0.5), Activation::Identity).unwrap();
        let input = Array4::<f64>::ones((1, 3, 3, 1));
        let out = conv.apply(input.view()).unwrap();
        assert_relative_eq!(out[[0, 1, 1, 0]], 9.5);
        assert_relative_eq!(out[[0, 0, 0, 0]], 4.5);
        assert_relative_eq!(out[[0, 0, 1, 0]], 6.5);
    }

    #[test]
    fn activation_is_applied() {
        let weights = Array4::<f64>::from_elem((1, 1, 1, 1), 2.0);
        let input = Array4::<f64>::from_elem((1, 1, 2, 1), -1.0);
        let relu = Conv2d::new(weights.clone(), Array1::zeros(1), Activation::Relu).unwrap();
        assert_eq!(relu.apply(input.view()).unwrap()[[0, 0, 0, 0]], 0.0);
        let tanh = Conv2d::new(weights, Array1::zeros(1), Activation::Tanh).unwrap();
        assert_relative_eq!(tanh.apply(input.view()).unwrap()[[0, 0, 1, 0]], (-2.0f64).tanh());
    }

    #[test]
    fn he_normal_is_seeded() {
        let a = Conv2d::he_normal(4, 2, 3, Activation::Tanh, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = Conv2d::he_normal(4, 2, 3, Activation::Tanh, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.in_channels(), 4);
        assert_eq!(a.out_channels(), 2);
        assert!(a.weights.iter().any(|&w| w != 0.0));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(Conv2d::zeros(1, 1, 2, Activation::Tanh).is_err());
        assert!(Conv2d::new(Array4::zeros((3, 3, 1, 2)), Array1::zeros(1), Activation::Tanh).is_err());
        let conv = Conv2d::zeros(3, 1, 3, Activation::Tanh).unwrap();
        assert!(conv.apply(Array4::<f64>::zeros((1, 2, 2, 2)).view()).is_err());
    }
}
