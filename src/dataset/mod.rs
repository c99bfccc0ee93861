//! Raw simulation data ingestion.

mod parser;

pub use parser::{
    field_path, microstructure_path, parse, parse_field_file, RawDatasetParser,
};

use crate::constants::{INITIAL_PRESSURE, TEMPERATURE_MIN};
use crate::grid::Grid;
use crate::normalize::NormalizationConstants;
use ndarray::{Array4, Array5, Axis};

/// Which raw field a per-timestep file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Temperature,
    Pressure,
}

impl FieldKind {
    pub fn directory(self) -> &'static str {
        match self {
            FieldKind::Temperature => "temperatures",
            FieldKind::Pressure => "pressures",
        }
    }

    pub fn file_prefix(self) -> &'static str {
        match self {
            FieldKind::Temperature => "Temp",
            FieldKind::Pressure => "pres",
        }
    }
}

/// Everything produced by one parsing run. The constants belong to exactly
/// this set of cases.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub microstructure: Array4<f64>, // (cases, width, height, 2)
    pub fields: Array5<f64>,         // (cases, width, height, time_steps, 4)
    pub initial_values: Array4<f64>, // (cases, width, height, 2)
    pub constants: NormalizationConstants,
}

impl Dataset {
    pub fn cases(&self) -> usize {
        self.fields.len_of(Axis(0))
    }

    pub fn time_steps(&self) -> usize {
        self.fields.len_of(Axis(3))
    }

    pub fn grid(&self) -> Grid {
        let (_, width, height, _, _) = self.fields.dim();
        Grid::new(width, height)
    }
}

/// State before the first snapshot: temperature 300 K, pressure 0.
pub fn initial_values(cases: usize, grid: Grid) -> Array4<f64> {
    let mut values = Array4::<f64>::zeros((cases, grid.width, grid.height, 2));
    values.index_axis_mut(Axis(3), 0).fill(TEMPERATURE_MIN);
    values.index_axis_mut(Axis(3), 1).fill(INITIAL_PRESSURE);
    values
}
