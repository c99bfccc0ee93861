//! Calibration values tied to the source simulations. Changing any of these
//! changes what a trained model sees, so they are fixed here rather than
//! exposed through configuration.

/// Lower clip bound for temperature (K), also the initial temperature.
pub const TEMPERATURE_MIN: f64 = 300.0;
/// Upper clip bound for temperature (K).
pub const TEMPERATURE_MAX: f64 = 4000.0;
/// Initial pressure before the first snapshot.
pub const INITIAL_PRESSURE: f64 = 0.0;

/// Spatial crop applied before pooling, matches the sensor resolution.
pub const CROP_SIZE: usize = 480;
/// Side of the non-overlapping pooling window.
pub const POOL_SIZE: usize = 2;

/// Number of recurrent steps the model was trained with.
pub const DEFAULT_HORIZON: usize = 19;

/// Threshold applied to the [0,1]-rescaled microstructure indicator.
pub const MICROSTRUCTURE_THRESHOLD: f64 = 0.5;
/// Threshold applied to the mean-pooled [-1,1] indicator.
pub const POOLED_MICROSTRUCTURE_THRESHOLD: f64 = 0.0;

/// Hotspot temperature threshold (K) used for saliency masks.
pub const HOTSPOT_TEMPERATURE: f64 = 875.0;
/// Hotspot threshold on the [0,1]-rescaled normalized temperature.
pub const HOTSPOT_AREA_THRESHOLD: f64 = 0.1554;
/// Time slices (half-open) scanned for hotspot area sensitivity.
pub const SENSITIVITY_STEPS: std::ops::Range<usize> = 3..18;

/// Colour channel of the microstructure image used as the structural indicator.
pub const INDICATOR_CHANNEL: usize = 1;

/// Field channels in a FieldTensor.
pub const FIELD_CHANNELS: usize = 4;
/// State channels (temperature, pressure).
pub const STATE_CHANNELS: usize = 2;
