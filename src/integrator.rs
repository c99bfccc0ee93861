//! Recurrent rollout of a field under learned derivative and integration
//! transforms.

use crate::constants::DEFAULT_HORIZON;
use crate::conv::{Activation, Conv2d};
use crate::error::{ParcError, Result};
use log::debug;
use ndarray::{concatenate, Array4, ArrayView4, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A per-pixel map from (batch, x, y, in) to (batch, x, y, out).
pub trait FieldTransform: Send + Sync {
    fn in_channels(&self) -> usize;
    fn out_channels(&self) -> usize;
    fn apply(&self, input: ArrayView4<f64>) -> Result<Array4<f64>>;
}

/// Predicted trajectory, step-major along the channel axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub states: Array4<f64>, // (batch, x, y, horizon * channels)
    pub rates: Array4<f64>,  // (batch, x, y, horizon * channels)
}

/// Rolls a field forward for a fixed number of steps. Every step runs the
/// same two transforms; the integrator owns exactly one instance of each.
pub struct RecurrentIntegrator<D, I> {
    derivative: D,
    integral: I,
    horizon: usize,
}

impl<D: FieldTransform, I: FieldTransform> RecurrentIntegrator<D, I> {
    pub fn new(derivative: D, integral: I, horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ParcError::InvalidParameter(
                "horizon must be at least 1".into(),
            ));
        }
        if integral.in_channels() != derivative.out_channels() {
            return Err(ParcError::shape(
                "integration transform input",
                derivative.out_channels(),
                integral.in_channels(),
            ));
        }
        if integral.out_channels() != derivative.out_channels() {
            return Err(ParcError::shape(
                "integration transform output",
                derivative.out_channels(),
                integral.out_channels(),
            ));
        }
        Ok(Self {
            derivative,
            integral,
            horizon,
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Channels of the evolving state.
    pub fn state_channels(&self) -> usize {
        self.derivative.out_channels()
    }

    pub fn derivative(&self) -> &D {
        &self.derivative
    }

    pub fn integral(&self) -> &I {
        &self.integral
    }

    fn check_inputs(&self, state: &ArrayView4<f64>, features: &ArrayView4<f64>) -> Result<()> {
        let (b, w, h, c) = state.dim();
        let (fb, fw, fh, fc) = features.dim();
        if (b, w, h) != (fb, fw, fh) {
            return Err(ParcError::shape("feature map", (b, w, h), (fb, fw, fh)));
        }
        if c != self.state_channels() {
            return Err(ParcError::shape("state channels", self.state_channels(), c));
        }
        if c + fc != self.derivative.in_channels() {
            return Err(ParcError::shape(
                "derivative transform input",
                self.derivative.in_channels(),
                c + fc,
            ));
        }
        Ok(())
    }

    /// One transition: returns (next state, rate estimate).
    pub fn step(
        &self,
        state: ArrayView4<f64>,
        features: ArrayView4<f64>,
    ) -> Result<(Array4<f64>, Array4<f64>)> {
        self.check_inputs(&state, &features)?;
        let joined = concatenate(Axis(3), &[state.view(), features.view()])
            .map_err(|e| ParcError::shape("state and feature concat", state.dim(), e.to_string()))?;
        let rate = self.derivative.apply(joined.view())?;
        let increment = self.integral.apply(rate.view())?;
        if increment.dim() != state.dim() {
            return Err(ParcError::shape("increment", state.dim(), increment.dim()));
        }
        Ok((&state + &increment, rate))
    }

    /// Runs `horizon` steps from `initial` with a static feature map.
    pub fn integrate(
        &self,
        initial: ArrayView4<f64>,
        features: ArrayView4<f64>,
    ) -> Result<Trajectory> {
        self.check_inputs(&initial, &features)?;

        let mut states = Vec::with_capacity(self.horizon);
        let mut rates = Vec::with_capacity(self.horizon);
        let mut current = initial.to_owned();
        for step in 0..self.horizon {
            let (next, rate) = self.step(current.view(), features)?;
            debug!("Integrated step {}/{}", step + 1, self.horizon);
            states.push(next.clone());
            rates.push(rate);
            current = next;
        }

        let state_views: Vec<_> = states.iter().map(|s| s.view()).collect();
        let rate_views: Vec<_> = rates.iter().map(|r| r.view()).collect();
        let context = "trajectory concat";
        Ok(Trajectory {
            states: concatenate(Axis(3), &state_views)
                .map_err(|e| ParcError::shape(context, self.horizon, e.to_string()))?,
            rates: concatenate(Axis(3), &rate_views)
                .map_err(|e| ParcError::shape(context, self.horizon, e.to_string()))?,
        })
    }
}

impl RecurrentIntegrator<Conv2d, Conv2d> {
    /// Convolutional integrator: a 3x3 tanh convolution estimates the rate
    /// from state and features, a second one turns the rate into an increment.
    pub fn with_conv(state_channels: usize, feature_channels: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let derivative = Conv2d::he_normal(
            state_channels + feature_channels,
            state_channels,
            3,
            Activation::Tanh,
            &mut rng,
        )?;
        let integral = Conv2d::he_normal(state_channels, state_channels, 3, Activation::Tanh, &mut rng)?;
        Self::new(derivative, integral, DEFAULT_HORIZON)
    }
}
