use crate::constants::{CROP_SIZE, POOL_SIZE, POOLED_MICROSTRUCTURE_THRESHOLD};
use crate::error::{ParcError, Result};
use crate::grid::Grid;
use ndarray::{s, Array4, Array5, Axis, Zip};

fn check_resolution(width: usize, height: usize, size: usize) -> Result<()> {
    let grid = Grid::new(width, height);
    if !grid.covers(size) {
        return Err(ParcError::InsufficientResolution {
            required: size,
            actual_width: grid.width,
            actual_height: grid.height,
        });
    }
    Ok(())
}

pub fn crop_fields(fields: &Array5<f64>, size: usize) -> Result<Array5<f64>> {
    let (_, width, height, _, _) = fields.dim();
    check_resolution(width, height, size)?;
    Ok(fields.slice(s![.., ..size, ..size, .., ..]).to_owned())
}

pub fn crop_microstructure(micro: &Array4<f64>, size: usize) -> Result<Array4<f64>> {
    let (_, width, height, _) = micro.dim();
    check_resolution(width, height, size)?;
    Ok(micro.slice(s![.., ..size, ..size, ..]).to_owned())
}

/// Maximum over non-overlapping `window`x`window` spatial blocks. Trailing rows
/// or columns that do not fill a block are dropped.
pub fn max_pool(fields: &Array5<f64>, window: usize) -> Array5<f64> {
    let (n, width, height, t, c) = fields.dim();
    let pooled = Grid::new(width, height).pooled(window);
    let mut out = Array5::<f64>::zeros((n, pooled.width, pooled.height, t, c));
    Zip::from(&mut out)
        .and(fields.exact_chunks((1, window, window, 1, 1)))
        .for_each(|o, block| *o = block.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)));
    out
}

/// Mean over non-overlapping `window`x`window` spatial blocks.
pub fn mean_pool(micro: &Array4<f64>, window: usize) -> Array4<f64> {
    let (n, width, height, c) = micro.dim();
    let pooled = Grid::new(width, height).pooled(window);
    let mut out = Array4::<f64>::zeros((n, pooled.width, pooled.height, c));
    let cells = (window * window) as f64;
    Zip::from(&mut out)
        .and(micro.exact_chunks((1, window, window, 1)))
        .for_each(|o, block| *o = block.sum() / cells);
    out
}

/// Second binarization stage: the pooled indicator is centred on zero, so
/// anything above zero becomes +1.
pub fn rebinarize(micro: &mut Array4<f64>) {
    micro.index_axis_mut(Axis(3), 0).mapv_inplace(|v| {
        if v > POOLED_MICROSTRUCTURE_THRESHOLD {
            1.0
        } else {
            -1.0
        }
    });
}

/// Crops both tensors to 480x480 and halves the resolution. Fields keep the
/// block maximum so peak temperature and pressure survive; the microstructure
/// takes the block mean and is binarized again.
pub fn downsample(
    micro: &Array4<f64>,
    fields: &Array5<f64>,
) -> Result<(Array4<f64>, Array5<f64>)> {
    let micro = crop_microstructure(micro, CROP_SIZE)?;
    let fields = crop_fields(fields, CROP_SIZE)?;

    let mut pooled_micro = mean_pool(&micro, POOL_SIZE);
    rebinarize(&mut pooled_micro);
    let pooled_fields = max_pool(&fields, POOL_SIZE);

    log::info!(
        "Downsampled microstructure to {:?}, fields to {:?}",
        pooled_micro.dim(),
        pooled_fields.dim()
    );
    Ok((pooled_micro, pooled_fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn all_ones_max_pool() {
        let fields = Array5::<f64>::ones((1, 480, 480, 1, 1));
        let pooled = max_pool(&fields, 2);
        assert_eq!(pooled.dim(), (1, 240, 240, 1, 1));
        assert!(pooled.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn max_pool_keeps_peaks() {
        let fields = Array::from_shape_fn((1, 4, 4, 2, 1), |(_, i, j, t, _)| {
            (i * 4 + j) as f64 * if t == 0 { 1.0 } else { -1.0 }
        });
        let pooled = max_pool(&fields, 2);
        assert_eq!(pooled[[0, 0, 0, 0, 0]], 5.0);
        assert_eq!(pooled[[0, 1, 1, 0, 0]], 15.0);
        assert_eq!(pooled[[0, 0, 1, 1, 0]], -2.0);
    }

    #[test]
    fn checkerboard_mean_pool() {
        let micro = Array::from_shape_fn((1, 4, 4, 1), |(_, i, j, _)| ((i + j) % 2) as f64);
        let pooled = mean_pool(&micro, 2);
        assert_eq!(pooled.dim(), (1, 2, 2, 1));
        assert!(pooled.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn rebinarize_thresholds_at_zero() {
        let mut micro = Array::from_shape_vec((1, 2, 2, 2), vec![0.5, 0.3, 0.0, 0.3, -0.5, 0.3, 1.0, 0.3])
            .unwrap();
        rebinarize(&mut micro);
        assert_eq!(micro[[0, 0, 0, 0]], 1.0);
        assert_eq!(micro[[0, 0, 1, 0]], -1.0);
        assert_eq!(micro[[0, 1, 0, 0]], -1.0);
        assert_eq!(micro[[0, 1, 1, 0]], 1.0);
        // Wave map untouched
        assert_eq!(micro[[0, 1, 1, 1]], 0.3);
    }

    #[test]
    fn downsample_crops_then_pools() {
        let micro = Array::from_shape_fn((1, 485, 485, 2), |(_, i, _, c)| {
            if c == 0 {
                if i % 2 == 0 { 1.0 } else { -1.0 }
            } else {
                0.25
            }
        });
        let fields = Array::from_shape_fn((1, 485, 485, 1, 4), |(_, i, j, _, _)| (i + j) as f64);
        let (m, f) = downsample(&micro, &fields).unwrap();
        assert_eq!(m.dim(), (1, 240, 240, 2));
        assert_eq!(f.dim(), (1, 240, 240, 1, 4));
        // Rows alternate +1/-1, every block mean is 0 and maps to -1
        assert!(m.index_axis(Axis(3), 0).iter().all(|&v| v == -1.0));
        assert!(m.index_axis(Axis(3), 1).iter().all(|&v| v == 0.25));
        // Cropped region ends at pixel 479
        assert_eq!(f[[0, 239, 239, 0, 2]], 958.0);
    }

    #[test]
    fn too_small_input() {
        let micro = Array4::<f64>::zeros((1, 479, 480, 2));
        let fields = Array5::<f64>::zeros((1, 479, 480, 1, 4));
        match downsample(&micro, &fields).unwrap_err() {
            ParcError::InsufficientResolution {
                required,
                actual_width,
                ..
            } => {
                assert_eq!(required, 480);
                assert_eq!(actual_width, 479);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
