use crate::constants::{MICROSTRUCTURE_THRESHOLD, TEMPERATURE_MAX, TEMPERATURE_MIN};
use crate::error::{ParcError, Result};
use crate::field::{extrema, FieldChannel};
use ndarray::{Array4, Array5, ArrayBase, Axis, Data, Dimension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Recorded extrema of one channel. The affine map to [-1, 1] is only
/// invertible with these values at hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub min: f64,
    pub max: f64,
}

impl ChannelRange {
    /// Range of temperature after clipping.
    pub const TEMPERATURE_CLIP: ChannelRange = ChannelRange {
        min: TEMPERATURE_MIN,
        max: TEMPERATURE_MAX,
    };

    pub fn new(min: f64, max: f64) -> Self {
        ChannelRange { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.span().abs() > 0.0)
    }

    pub fn normalize(&self, x: f64) -> f64 {
        2.0 * (x - self.min) / self.span() - 1.0
    }

    pub fn denormalize(&self, x: f64) -> f64 {
        (x + 1.0) / 2.0 * self.span() + self.min
    }

    fn check(&self, channel: &str) -> Result<()> {
        if self.is_degenerate() {
            return Err(ParcError::DegenerateChannel {
                channel: channel.to_string(),
                value: self.min,
            });
        }
        Ok(())
    }
}

/// Global per-channel extrema of a FieldTensor, computed once across every
/// case, pixel and timestep. Parsing a different subset of cases yields
/// different constants for every case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConstants {
    pub temperature: ChannelRange,
    pub pressure: ChannelRange,
    pub temperature_rate: ChannelRange,
    pub pressure_rate: ChannelRange,
}

impl NormalizationConstants {
    pub fn from_fields(fields: &Array5<f64>) -> Result<Self> {
        let channels = fields.len_of(Axis(4));
        if channels != FieldChannel::ALL.len() {
            return Err(ParcError::shape(
                "field tensor channels",
                FieldChannel::ALL.len(),
                channels,
            ));
        }
        let mut ranges = [ChannelRange::new(0.0, 0.0); 4];
        for channel in FieldChannel::ALL {
            let (min, max) = extrema(&fields.index_axis(Axis(4), channel.index())).ok_or_else(
                || ParcError::InvalidParameter("cannot compute extrema of an empty field tensor".into()),
            )?;
            ranges[channel.index()] = ChannelRange::new(min, max);
        }
        Ok(NormalizationConstants {
            temperature: ranges[0],
            pressure: ranges[1],
            temperature_rate: ranges[2],
            pressure_rate: ranges[3],
        })
    }

    pub fn get(&self, channel: FieldChannel) -> ChannelRange {
        match channel {
            FieldChannel::Temperature => self.temperature,
            FieldChannel::Pressure => self.pressure,
            FieldChannel::TemperatureRate => self.temperature_rate,
            FieldChannel::PressureRate => self.pressure_rate,
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ParcError::Serialization(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ParcError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_toml_string()?).map_err(|source| ParcError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ParcError::MissingData {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|source| ParcError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ParcError::Serialization(e.to_string()))
    }
}

fn map_channels(
    fields: &Array5<f64>,
    constants: &NormalizationConstants,
    f: fn(&ChannelRange, f64) -> f64,
) -> Result<Array5<f64>> {
    let channels = fields.len_of(Axis(4));
    if channels != FieldChannel::ALL.len() {
        return Err(ParcError::shape(
            "field tensor channels",
            FieldChannel::ALL.len(),
            channels,
        ));
    }
    // Reject degenerate channels before touching any data
    for channel in FieldChannel::ALL {
        constants.get(channel).check(channel.name())?;
    }

    let mut out = fields.clone();
    for channel in FieldChannel::ALL {
        let range = constants.get(channel);
        out.index_axis_mut(Axis(4), channel.index())
            .mapv_inplace(|x| f(&range, x));
    }
    Ok(out)
}

/// Rescales every field channel to [-1, 1] with the recorded extrema.
pub fn normalize_fields(
    fields: &Array5<f64>,
    constants: &NormalizationConstants,
) -> Result<Array5<f64>> {
    map_channels(fields, constants, ChannelRange::normalize)
}

/// Inverse of [`normalize_fields`].
pub fn denormalize_fields(
    fields: &Array5<f64>,
    constants: &NormalizationConstants,
) -> Result<Array5<f64>> {
    map_channels(fields, constants, ChannelRange::denormalize)
}

fn unit_range<S, D>(values: &ArrayBase<S, D>, channel: &str) -> Result<ChannelRange>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let (min, max) = extrema(values).ok_or_else(|| {
        ParcError::InvalidParameter(format!("{} channel is empty", channel))
    })?;
    let range = ChannelRange::new(min, max);
    range.check(channel)?;
    Ok(range)
}

/// First binarization stage of the microstructure tensor.
///
/// Channel 0 is min-max scaled to [0, 1], thresholded at 0.5 and mapped to
/// {-1, +1}. Channel 1 (wave map) is min-max scaled to [-1, 1] without
/// thresholding.
pub fn normalize_microstructure(micro: &Array4<f64>) -> Result<Array4<f64>> {
    let channels = micro.len_of(Axis(3));
    if channels != 2 {
        return Err(ParcError::shape("microstructure channels", 2, channels));
    }

    let indicator_range = unit_range(&micro.index_axis(Axis(3), 0), "microstructure")?;
    let wave_range = unit_range(&micro.index_axis(Axis(3), 1), "wave_map")?;

    let mut out = micro.clone();
    out.index_axis_mut(Axis(3), 0).mapv_inplace(|x| {
        let unit = (x - indicator_range.min) / indicator_range.span();
        if unit > MICROSTRUCTURE_THRESHOLD {
            1.0
        } else {
            -1.0
        }
    });
    out.index_axis_mut(Axis(3), 1)
        .mapv_inplace(|x| wave_range.normalize(x));
    Ok(out)
}
