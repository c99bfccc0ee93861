use super::{initial_values, Dataset, FieldKind};
use crate::constants::{
    INDICATOR_CHANNEL, INITIAL_PRESSURE, STATE_CHANNELS, TEMPERATURE_MAX, TEMPERATURE_MIN,
};
use crate::error::{ParcError, Result};
use crate::field::FieldChannel;
use crate::grid::Grid;
use crate::normalize::NormalizationConstants;
use crate::wave_map;
use log::{debug, info};
use ndarray::{s, Array2, Array4, Array5, ArrayViewMut4, Axis};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const MICROSTRUCTURE_DIR: &str = "microstructures";

pub fn microstructure_path(root: &Path, case: usize) -> PathBuf {
    root.join(MICROSTRUCTURE_DIR)
        .join(format!("data_{:02}.pgm", case))
}

pub fn field_path(root: &Path, kind: FieldKind, case: usize, timestep: usize) -> PathBuf {
    root.join(kind.directory())
        .join(format!("data_{:02}", case))
        .join(format!("{}_{:02}.txt", kind.file_prefix(), timestep))
}

/// Reads a whitespace-delimited scalar grid and reshapes it row-major.
pub fn parse_field_file(path: &Path, case: usize, timestep: usize, grid: Grid) -> Result<Array2<f64>> {
    if !path.is_file() {
        return Err(ParcError::MissingData {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path).map_err(|source| ParcError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let values = content
        .split_whitespace()
        .enumerate()
        .map(|(idx, token)| {
            let malformed = |detail: String| ParcError::MalformedField {
                case,
                timestep,
                path: path.to_path_buf(),
                detail: format!("value {} ({:?}): {}", idx + 1, token, detail),
            };
            match token.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                Ok(_) => Err(malformed("not a finite number".into())),
                Err(e) => Err(malformed(e.to_string())),
            }
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() != grid.cells() {
        return Err(ParcError::shape(
            format!("case {} timestep {} ({})", case, timestep, path.display()),
            (grid.width, grid.height),
            values.len(),
        ));
    }
    grid.from_flat(values)
}

fn load_indicator(path: &Path) -> Result<Array2<f64>> {
    if !path.is_file() {
        return Err(ParcError::MissingData {
            path: path.to_path_buf(),
        });
    }
    let img = image::open(path)
        .map_err(|source| ParcError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let (cols, rows) = img.dimensions();

    // Rows map to the first spatial axis, as with a decoded pixel matrix
    Ok(Array2::from_shape_fn(
        (rows as usize, cols as usize),
        |(r, c)| img.get_pixel(c as u32, r as u32)[INDICATOR_CHANNEL] as f64,
    ))
}

/// Loads a dataset laid out as
/// `microstructures/data_NN.pgm`, `temperatures/data_NN/Temp_MM.txt` and
/// `pressures/data_NN/pres_MM.txt` under one root.
#[derive(Debug, Clone)]
pub struct RawDatasetParser {
    root: PathBuf,
    time_steps: usize,
    delta_t: f64,
}

impl RawDatasetParser {
    pub fn new(root: impl Into<PathBuf>, time_steps: usize, delta_t: f64) -> Result<Self> {
        if time_steps == 0 {
            return Err(ParcError::InvalidParameter(
                "time_steps must be at least 1".into(),
            ));
        }
        if !(delta_t.is_finite() && delta_t > 0.0) {
            return Err(ParcError::InvalidParameter(format!(
                "delta_t must be positive and finite, got {}",
                delta_t
            )));
        }
        Ok(Self {
            root: root.into(),
            time_steps,
            delta_t,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of entries in the microstructure directory.
    pub fn count_cases(&self) -> Result<usize> {
        let dir = self.root.join(MICROSTRUCTURE_DIR);
        if !dir.is_dir() {
            return Err(ParcError::MissingData { path: dir });
        }
        let entries = fs::read_dir(&dir).map_err(|source| ParcError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(entries.filter_map(|e| e.ok()).count())
    }

    /// Parses every case found under the root.
    pub fn parse(&self) -> Result<Dataset> {
        let cases = self.count_cases()?;
        let ids: Vec<usize> = (1..=cases).collect();
        self.parse_cases(&ids)
    }

    /// Parses the given 1-based cases. The normalization constants cover only
    /// these cases, so a subset yields different constants than a full run.
    pub fn parse_cases(&self, cases: &[usize]) -> Result<Dataset> {
        let first = *cases.first().ok_or_else(|| ParcError::MissingData {
            path: microstructure_path(&self.root, 1),
        })?;
        let probe = load_indicator(&microstructure_path(&self.root, first))?;
        let grid = Grid::new(probe.nrows(), probe.ncols());
        info!(
            "Parsing {} case(s), {} time step(s) on a {}x{} grid from {}",
            cases.len(),
            self.time_steps,
            grid.width,
            grid.height,
            self.root.display()
        );

        let n = cases.len();
        let mut microstructure = Array4::<f64>::zeros((n, grid.width, grid.height, 2));
        let mut fields = Array5::<f64>::zeros((
            n,
            grid.width,
            grid.height,
            self.time_steps,
            FieldChannel::ALL.len(),
        ));
        microstructure.slice_mut(s![0, .., .., 0]).assign(&probe);
        drop(probe);
        let wave = wave_map::generate(grid.width, grid.height);
        for mut case in microstructure.axis_iter_mut(Axis(0)) {
            case.index_axis_mut(Axis(2), 1).assign(&wave);
        }

        // Cases are independent and fill their own slot; any failure discards
        // the whole tensor
        fields
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(microstructure.axis_iter_mut(Axis(0)).into_par_iter())
            .zip(cases.par_iter())
            .enumerate()
            .try_for_each(|(idx, ((case_fields, mut case_micro), &case))| {
                if idx > 0 {
                    let indicator = self.load_case_indicator(case, grid)?;
                    case_micro.index_axis_mut(Axis(2), 0).assign(&indicator);
                }
                self.parse_case_fields(case, grid, case_fields)
            })?;

        // Global extrema only once every case is in
        let constants = NormalizationConstants::from_fields(&fields)?;
        for channel in FieldChannel::ALL {
            let range = constants.get(channel);
            info!("{}: min {}, max {}", channel, range.min, range.max);
        }

        Ok(Dataset {
            microstructure,
            fields,
            initial_values: initial_values(n, grid),
            constants,
        })
    }

    fn load_case_indicator(&self, case: usize, grid: Grid) -> Result<Array2<f64>> {
        let image_path = microstructure_path(&self.root, case);
        let indicator = load_indicator(&image_path)?;
        if indicator.dim() != (grid.width, grid.height) {
            return Err(ParcError::shape(
                format!("microstructure image {}", image_path.display()),
                (grid.width, grid.height),
                indicator.dim(),
            ));
        }
        Ok(indicator)
    }

    /// Fills one case's (width, height, time_steps, 4) slot.
    fn parse_case_fields(
        &self,
        case: usize,
        grid: Grid,
        mut fields: ArrayViewMut4<f64>,
    ) -> Result<()> {
        let mut previous = [
            Array2::from_elem((grid.width, grid.height), TEMPERATURE_MIN),
            Array2::from_elem((grid.width, grid.height), INITIAL_PRESSURE),
        ];

        for timestep in 1..=self.time_steps {
            let temperature = parse_field_file(
                &field_path(&self.root, FieldKind::Temperature, case, timestep),
                case,
                timestep,
                grid,
            )?
            .mapv(|v| v.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX));
            let pressure = parse_field_file(
                &field_path(&self.root, FieldKind::Pressure, case, timestep),
                case,
                timestep,
                grid,
            )?;

            let current = [temperature, pressure];
            let t = timestep - 1;
            for state in 0..STATE_CHANNELS {
                let rate = (&current[state] - &previous[state]) / self.delta_t;
                fields.slice_mut(s![.., .., t, state]).assign(&current[state]);
                fields
                    .slice_mut(s![.., .., t, state + STATE_CHANNELS])
                    .assign(&rate);
            }
            previous = current;
        }
        debug!("Parsed case {:02}", case);
        Ok(())
    }
}

/// Parses every case under `root`.
pub fn parse(root: &Path, time_steps: usize, delta_t: f64) -> Result<Dataset> {
    RawDatasetParser::new(root, time_steps, delta_t)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{GrayImage, Luma};
    use tempfile::{tempdir, TempDir};

    fn write_field(root: &Path, kind: FieldKind, case: usize, timestep: usize, values: &[f64]) {
        let path = field_path(root, kind, case, timestep);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let text: Vec<String> = values.iter().map(|v| format!("{:e}", v)).collect();
        fs::write(path, text.join(" ")).unwrap();
    }

    fn write_image(root: &Path, case: usize, side: u32) {
        let path = microstructure_path(root, case);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let img = GrayImage::from_fn(side, side, |x, y| Luma([((x + y) % 2 * 200) as u8]));
        img.save(path).unwrap();
    }

    /// Two 3x3 cases, two steps. Temperatures step by 10 K per timestep.
    fn small_dataset() -> TempDir {
        let dir = tempdir().unwrap();
        for case in 1..=2 {
            write_image(dir.path(), case, 3);
            for t in 1..=2 {
                let temp = vec![300.0 + 10.0 * t as f64 * case as f64; 9];
                let pres = vec![-(t as f64); 9];
                write_field(dir.path(), FieldKind::Temperature, case, t, &temp);
                write_field(dir.path(), FieldKind::Pressure, case, t, &pres);
            }
        }
        dir
    }

    #[test]
    fn builds_expected_shapes() {
        let dir = small_dataset();
        let data = parse(dir.path(), 2, 5.0).unwrap();
        assert_eq!(data.microstructure.dim(), (2, 3, 3, 2));
        assert_eq!(data.fields.dim(), (2, 3, 3, 2, 4));
        assert_eq!(data.initial_values.dim(), (2, 3, 3, 2));
        assert_eq!(data.cases(), 2);
        assert_eq!(data.grid(), Grid::square(3));
        assert_eq!(data.microstructure[[0, 0, 1, 0]], 200.0);
        assert_eq!(data.microstructure[[0, 0, 0, 0]], 0.0);
        assert_relative_eq!(data.microstructure[[1, 2, 2, 1]], 2.0 / 3.0);
    }

    #[test]
    fn first_rate_uses_initial_values() {
        let dir = small_dataset();
        let data = parse(dir.path(), 2, 5.0).unwrap();
        // Case 1: 300 -> 310 at the first step
        assert_relative_eq!(data.fields[[0, 1, 1, 0, 0]], 310.0);
        assert_relative_eq!(data.fields[[0, 1, 1, 0, 2]], 2.0);
        // Pressure 0 -> -1 -> -2
        assert_relative_eq!(data.fields[[0, 0, 0, 0, 3]], -0.2);
        assert_relative_eq!(data.fields[[0, 0, 0, 1, 3]], -0.2);
        // Case 2: 320 -> 340
        assert_relative_eq!(data.fields[[1, 0, 0, 1, 2]], 4.0);
    }

    #[test]
    fn extrema_are_global() {
        let dir = small_dataset();
        let data = parse(dir.path(), 2, 5.0).unwrap();
        assert_relative_eq!(data.constants.temperature.min, 310.0);
        assert_relative_eq!(data.constants.temperature.max, 340.0);

        // Parsing only the first case changes the constants
        let parser = RawDatasetParser::new(dir.path(), 2, 5.0).unwrap();
        let subset = parser.parse_cases(&[1]).unwrap();
        assert_relative_eq!(subset.constants.temperature.max, 320.0);
    }

    #[test]
    fn temperature_is_clipped() {
        let dir = small_dataset();
        write_field(dir.path(), FieldKind::Temperature, 1, 1, &[5000.0, 10.0, 300.0, 300.0, 300.0, 300.0, 300.0, 300.0, 300.0]);
        let data = parse(dir.path(), 2, 5.0).unwrap();
        assert_eq!(data.fields[[0, 0, 0, 0, 0]], 4000.0);
        assert_eq!(data.fields[[0, 0, 1, 0, 0]], 300.0);
        assert_relative_eq!(data.fields[[0, 0, 0, 0, 2]], 740.0);
    }

    #[test]
    fn missing_directory() {
        let dir = tempdir().unwrap();
        let err = parse(dir.path(), 2, 5.0).unwrap_err();
        assert!(matches!(err, ParcError::MissingData { .. }));
    }

    #[test]
    fn missing_timestep_file() {
        let dir = small_dataset();
        fs::remove_file(field_path(dir.path(), FieldKind::Pressure, 2, 2)).unwrap();
        match parse(dir.path(), 2, 5.0).unwrap_err() {
            ParcError::MissingData { path } => assert!(path.ends_with("data_02/pres_02.txt")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_value_reports_context() {
        let dir = small_dataset();
        let path = field_path(dir.path(), FieldKind::Temperature, 2, 1);
        fs::write(&path, "300 300 abc 300 300 300 300 300 300").unwrap();
        match parse(dir.path(), 2, 5.0).unwrap_err() {
            ParcError::MalformedField { case, timestep, .. } => {
                assert_eq!(case, 2);
                assert_eq!(timestep, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_finite_value_is_malformed() {
        for (kind, token) in [
            (FieldKind::Temperature, "NaN"),
            (FieldKind::Pressure, "inf"),
            (FieldKind::Pressure, "-infinity"),
        ] {
            let dir = small_dataset();
            let path = field_path(dir.path(), kind, 1, 2);
            fs::write(&path, format!("{} 300 300 300 300 300 300 300 300", token)).unwrap();
            match parse(dir.path(), 2, 5.0).unwrap_err() {
                ParcError::MalformedField {
                    case,
                    timestep,
                    detail,
                    ..
                } => {
                    assert_eq!((case, timestep), (1, 2));
                    assert!(detail.contains(token), "{detail}");
                }
                other => panic!("unexpected error for {token}: {other}"),
            }
        }
    }

    #[test]
    fn cases_fill_slots_in_request_order() {
        let dir = small_dataset();
        let parser = RawDatasetParser::new(dir.path(), 2, 5.0).unwrap();
        let data = parser.parse_cases(&[2, 1]).unwrap();
        assert_relative_eq!(data.fields[[0, 0, 0, 1, 0]], 340.0);
        assert_relative_eq!(data.fields[[1, 0, 0, 1, 0]], 320.0);
        assert_eq!(data.microstructure[[1, 0, 1, 0]], 200.0);
        assert_relative_eq!(data.microstructure[[0, 2, 2, 1]], 2.0 / 3.0);
    }

    #[test]
    fn later_image_of_other_size_is_rejected() {
        let dir = small_dataset();
        write_image(dir.path(), 2, 4);
        assert!(matches!(
            parse(dir.path(), 2, 5.0),
            Err(ParcError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn short_grid_is_shape_mismatch() {
        let dir = small_dataset();
        write_field(dir.path(), FieldKind::Temperature, 1, 2, &[300.0; 8]);
        assert!(matches!(
            parse(dir.path(), 2, 5.0),
            Err(ParcError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(RawDatasetParser::new("x", 0, 5.0).is_err());
        assert!(RawDatasetParser::new("x", 2, 0.0).is_err());
        assert!(RawDatasetParser::new("x", 2, f64::NAN).is_err());
    }
}
