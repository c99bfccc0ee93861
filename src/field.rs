use ndarray::{ArrayBase, Data, Dimension};
use std::fmt;

/// Channels of a FieldTensor, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldChannel {
    Temperature,
    Pressure,
    TemperatureRate,
    PressureRate,
}

impl FieldChannel {
    pub const ALL: [FieldChannel; 4] = [
        FieldChannel::Temperature,
        FieldChannel::Pressure,
        FieldChannel::TemperatureRate,
        FieldChannel::PressureRate,
    ];

    pub fn index(self) -> usize {
        match self {
            FieldChannel::Temperature => 0,
            FieldChannel::Pressure => 1,
            FieldChannel::TemperatureRate => 2,
            FieldChannel::PressureRate => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldChannel::Temperature => "temperature",
            FieldChannel::Pressure => "pressure",
            FieldChannel::TemperatureRate => "temperature_rate",
            FieldChannel::PressureRate => "pressure_rate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FieldChannel::ALL.into_iter().find(|c| c.name() == name)
    }

    /// The rate channel paired with a state channel.
    pub fn rate(self) -> Option<Self> {
        match self {
            FieldChannel::Temperature => Some(FieldChannel::TemperatureRate),
            FieldChannel::Pressure => Some(FieldChannel::PressureRate),
            _ => None,
        }
    }
}

impl fmt::Display for FieldChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Smallest and largest element, or `None` for an empty array.
pub fn extrema<S, D>(values: &ArrayBase<S, D>) -> Option<(f64, f64)>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if values.is_empty() {
        return None;
    }
    Some(values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    }))
}
