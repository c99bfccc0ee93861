use ndarray::Array2;

/// Normalized distance from the left edge, used as the second microstructure
/// channel. Column `w` holds `w / width`; column 0 stays zero.
pub fn generate(width: usize, height: usize) -> Array2<f64> {
    let mut map = Array2::<f64>::zeros((width, height));
    if width == 0 {
        return map;
    }
    for w in 1..height {
        map.column_mut(w).fill(w as f64 / width as f64);
    }
    map
}
