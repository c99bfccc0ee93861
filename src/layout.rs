//! Conversions between the 5-D field layout and the flattened layouts used by
//! older models and by the recurrent integrator.
//!
//! Neither flattened layout stores the rate at timestep 0: it is derived from
//! the initial values, which live outside these tensors.

use crate::constants::{FIELD_CHANNELS, STATE_CHANNELS};
use crate::error::{ParcError, Result};
use ndarray::{s, Array4, Array5, ArrayView4, Axis};

/// Tensor rank tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVariant {
    /// (case, x, y, time, channel)
    Expanded,
    /// (case, x, y, flattened channel)
    Flattened,
}

impl LayoutVariant {
    pub fn of_shape(shape: &[usize]) -> Result<Self> {
        match shape.len() {
            5 => Ok(LayoutVariant::Expanded),
            4 => Ok(LayoutVariant::Flattened),
            n => Err(ParcError::UnsupportedLayout(format!(
                "rank {} tensor is neither expanded (5) nor flattened (4)",
                n
            ))),
        }
    }
}

/// Flattened protocol versions. They place the rate of step `t` at different
/// offsets and are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVersion {
    /// One tensor: states of every step, then rates of steps 1..T.
    Legacy,
    /// Separate state and rate tensors for steps 1..T, initial state apart.
    Recurrent,
}

impl LayoutVersion {
    /// Offset of the first rate channel of step `t` (t >= 1).
    pub fn rate_offset(self, time_steps: usize, t: usize) -> usize {
        match self {
            LayoutVersion::Legacy => 2 * time_steps + 2 * (t - 1),
            LayoutVersion::Recurrent => 2 * (t - 1),
        }
    }

    /// Offset of the first state channel of step `t`.
    pub fn state_offset(self, t: usize) -> usize {
        match self {
            LayoutVersion::Legacy => 2 * t,
            LayoutVersion::Recurrent => 2 * (t - 1),
        }
    }
}

/// Width of the legacy flattened tensor for `time_steps` steps.
pub fn flattened_width(time_steps: usize, channels: usize) -> Result<usize> {
    match channels {
        STATE_CHANNELS if time_steps >= 1 => Ok(STATE_CHANNELS * time_steps),
        FIELD_CHANNELS if time_steps >= 1 => Ok(4 * time_steps - 2),
        _ => Err(ParcError::UnsupportedLayout(format!(
            "{} channels over {} time steps",
            channels, time_steps
        ))),
    }
}

fn time_steps_for_width(width: usize, channels: usize) -> Result<usize> {
    let steps = match channels {
        STATE_CHANNELS if width % 2 == 0 && width > 0 => Some(width / 2),
        FIELD_CHANNELS if (width + 2) % 4 == 0 => Some((width + 2) / 4),
        _ => None,
    };
    steps.ok_or_else(|| {
        ParcError::UnsupportedLayout(format!(
            "flattened width {} does not hold {} channels",
            width, channels
        ))
    })
}

/// Legacy flattening. With T steps and 4 channels the output has 4T-2
/// channels: `[0, 2T)` holds (temperature, pressure) per step, `[2T, 4T-2)`
/// holds the rates of steps 1..T. Two-channel input yields only the states.
pub fn to_flattened(fields: &Array5<f64>) -> Result<Array4<f64>> {
    let (n, w, h, time_steps, channels) = fields.dim();
    let width = flattened_width(time_steps, channels)?;
    let version = LayoutVersion::Legacy;

    let mut flat = Array4::<f64>::zeros((n, w, h, width));
    for t in 0..time_steps {
        let at = version.state_offset(t);
        flat.slice_mut(s![.., .., .., at..at + STATE_CHANNELS])
            .assign(&fields.slice(s![.., .., .., t, ..STATE_CHANNELS]));
    }
    if channels == FIELD_CHANNELS {
        for t in 1..time_steps {
            let at = version.rate_offset(time_steps, t);
            flat.slice_mut(s![.., .., .., at..at + STATE_CHANNELS])
                .assign(&fields.slice(s![.., .., .., t, STATE_CHANNELS..]));
        }
    }
    Ok(flat)
}

/// Inverse of [`to_flattened`]. The timestep-0 rates are taken from
/// `leading_rates` (case, x, y, 2) when given and are zero otherwise.
pub fn to_expanded(
    flat: &Array4<f64>,
    channels: usize,
    leading_rates: Option<ArrayView4<f64>>,
) -> Result<Array5<f64>> {
    let (n, w, h, width) = flat.dim();
    let time_steps = time_steps_for_width(width, channels)?;
    let version = LayoutVersion::Legacy;

    let mut fields = Array5::<f64>::zeros((n, w, h, time_steps, channels));
    for t in 0..time_steps {
        let at = version.state_offset(t);
        fields
            .slice_mut(s![.., .., .., t, ..STATE_CHANNELS])
            .assign(&flat.slice(s![.., .., .., at..at + STATE_CHANNELS]));
    }
    if channels == FIELD_CHANNELS {
        for t in 1..time_steps {
            let at = version.rate_offset(time_steps, t);
            fields
                .slice_mut(s![.., .., .., t, STATE_CHANNELS..])
                .assign(&flat.slice(s![.., .., .., at..at + STATE_CHANNELS]));
        }
        if let Some(rates) = leading_rates {
            if rates.dim() != (n, w, h, STATE_CHANNELS) {
                return Err(ParcError::shape(
                    "leading rates",
                    (n, w, h, STATE_CHANNELS),
                    rates.dim(),
                ));
            }
            fields
                .slice_mut(s![.., .., .., 0, STATE_CHANNELS..])
                .assign(&rates);
        }
    }
    Ok(fields)
}

/// Field tensor split the way the integrator consumes and produces it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentTargets {
    pub initial: Array4<f64>, // (case, x, y, 2), state at timestep 0
    pub states: Array4<f64>,  // (case, x, y, 2 * (T - 1))
    pub rates: Array4<f64>,   // (case, x, y, 2 * (T - 1))
}

impl RecurrentTargets {
    pub fn horizon(&self) -> usize {
        self.states.len_of(Axis(3)) / STATE_CHANNELS
    }
}

/// Splits a 4-channel field tensor into an initial state plus per-step state
/// and rate targets for steps 1..T.
pub fn to_recurrent(fields: &Array5<f64>) -> Result<RecurrentTargets> {
    let (n, w, h, time_steps, channels) = fields.dim();
    if channels != FIELD_CHANNELS || time_steps < 2 {
        return Err(ParcError::UnsupportedLayout(format!(
            "recurrent targets need 4 channels and at least 2 steps, got {} channels, {} steps",
            channels, time_steps
        )));
    }
    let version = LayoutVersion::Recurrent;
    let width = STATE_CHANNELS * (time_steps - 1);
    let mut states = Array4::<f64>::zeros((n, w, h, width));
    let mut rates = Array4::<f64>::zeros((n, w, h, width));
    for t in 1..time_steps {
        let at = version.state_offset(t);
        states
            .slice_mut(s![.., .., .., at..at + STATE_CHANNELS])
            .assign(&fields.slice(s![.., .., .., t, ..STATE_CHANNELS]));
        let at = version.rate_offset(time_steps, t);
        rates
            .slice_mut(s![.., .., .., at..at + STATE_CHANNELS])
            .assign(&fields.slice(s![.., .., .., t, STATE_CHANNELS..]));
    }
    Ok(RecurrentTargets {
        initial: fields.slice(s![.., .., .., 0, ..STATE_CHANNELS]).to_owned(),
        states,
        rates,
    })
}

/// Inverse of [`to_recurrent`], with the same treatment of timestep-0 rates
/// as [`to_expanded`].
pub fn from_recurrent(
    targets: &RecurrentTargets,
    leading_rates: Option<ArrayView4<f64>>,
) -> Result<Array5<f64>> {
    let (n, w, h, width) = targets.states.dim();
    if targets.rates.dim() != targets.states.dim() {
        return Err(ParcError::shape(
            "recurrent rates",
            targets.states.dim(),
            targets.rates.dim(),
        ));
    }
    if targets.initial.dim() != (n, w, h, STATE_CHANNELS) {
        return Err(ParcError::shape(
            "recurrent initial state",
            (n, w, h, STATE_CHANNELS),
            targets.initial.dim(),
        ));
    }
    if width == 0 || width % STATE_CHANNELS != 0 {
        return Err(ParcError::UnsupportedLayout(format!(
            "recurrent width {} is not a positive multiple of {}",
            width, STATE_CHANNELS
        )));
    }
    let time_steps = width / STATE_CHANNELS + 1;
    let version = LayoutVersion::Recurrent;

    let mut fields = Array5::<f64>::zeros((n, w, h, time_steps, FIELD_CHANNELS));
    fields
        .slice_mut(s![.., .., .., 0, ..STATE_CHANNELS])
        .assign(&targets.initial);
    for t in 1..time_steps {
        let at = version.state_offset(t);
        fields
            .slice_mut(s![.., .., .., t, ..STATE_CHANNELS])
            .assign(&targets.states.slice(s![.., .., .., at..at + STATE_CHANNELS]));
        let at = version.rate_offset(time_steps, t);
        fields
            .slice_mut(s![.., .., .., t, STATE_CHANNELS..])
            .assign(&targets.rates.slice(s![.., .., .., at..at + STATE_CHANNELS]));
    }
    if let Some(rates) = leading_rates {
        if rates.dim() != (n, w, h, STATE_CHANNELS) {
            return Err(ParcError::shape(
                "leading rates",
                (n, w, h, STATE_CHANNELS),
                rates.dim(),
            ));
        }
        fields
            .slice_mut(s![.., .., .., 0, STATE_CHANNELS..])
            .assign(&rates);
    }
    Ok(fields)
}
