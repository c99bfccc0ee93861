use crate::error::{ParcError, Result};
use ndarray::{Array2, ArrayView2};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

pub struct FieldVisualiser {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    // Store as a boxed trait object
    gradient: Box<dyn colorgrad::Gradient>,
}

impl FieldVisualiser {
    pub fn new(output_dir: &Path, width: u32, height: u32) -> Result<Self> {
        std::fs::create_dir_all(output_dir).map_err(|source| ParcError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            width,
            height,
            gradient: Box::new(colorgrad::preset::rd_yl_bu()),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Renders one spatial slice as a heat map, returns the written path.
    pub fn plot_field(
        &self,
        data: ArrayView2<f64>,
        field_name: &str,
        step: usize,
    ) -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
        let filename = self
            .output_dir
            .join(format!("{}_{:03}.png", field_name, step));
        let root = BitMapBackend::new(&filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let (nx, ny) = data.dim();
        let (min_val, max_val) = crate::field::extrema(&data).unwrap_or((0.0, 0.0));

        let title = format!("{} (step {})", field_name, step);
        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 30))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0..ny, 0..nx)?;

        chart
            .configure_mesh()
            .x_desc("y (pixels)")
            .y_desc("x (pixels)")
            .draw()?;

        chart.draw_series(data.indexed_iter().map(|((i, j), &value)| {
            let color = self.value_to_color(value, min_val, max_val);
            Rectangle::new([(j, i), (j + 1, i + 1)], color.filled())
        }))?;

        root.present()?;
        log::info!("Saved frame: {}", filename.display());
        Ok(filename.clone())
    }

    /// Renders a boolean mask, true pixels at the hot end of the gradient.
    pub fn plot_mask(
        &self,
        mask: &Array2<bool>,
        name: &str,
        step: usize,
    ) -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
        // Gradient runs red to blue, so hot pixels map to 0
        let values = mask.mapv(|hot| if hot { 0.0 } else { 1.0 });
        self.plot_field(values.view(), name, step)
    }

    fn value_to_color(&self, value: f64, min_val: f64, max_val: f64) -> RGBColor {
        let normalized = if max_val > min_val {
            (value - min_val) / (max_val - min_val)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}
