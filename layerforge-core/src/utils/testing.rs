use crate::tensor::{Tensor, TensorDim};

/// Checks that a tensor has the expected shape and values within `tolerance`.
///
/// Values of any dtype are compared after widening to f32.
/// Panics on the first mismatch.
pub fn check_tensor_near(actual: &Tensor, expected_dim: TensorDim, expected_data: &[f32], tolerance: f32) {
    assert_eq!(actual.dim(), expected_dim, "Shape mismatch");

    let actual_data = match actual.to_vec() {
        Ok(data) => data,
        Err(e) => panic!("Failed to read tensor in check_tensor_near: {}", e),
    };
    assert_eq!(actual_data.len(), expected_data.len(), "Data length mismatch");

    for (i, (a, e)) in actual_data.iter().zip(expected_data).enumerate() {
        if !approx::relative_eq!(*a, *e, epsilon = tolerance, max_relative = tolerance) {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, tolerance={:?}",
                i, a, e, tolerance
            );
        }
    }
}

/// Central-difference estimate of the gradient of `f` at `point`.
///
/// `f` is evaluated twice per coordinate, at `point ± h` along that axis.
pub fn numeric_gradient<F>(mut f: F, point: &[f32], h: f32) -> Vec<f32>
where
    F: FnMut(&[f32]) -> f32,
{
    let mut shifted = point.to_vec();
    (0..point.len())
        .map(|i| {
            shifted[i] = point[i] + h;
            let up = f(&shifted);
            shifted[i] = point[i] - h;
            let down = f(&shifted);
            shifted[i] = point[i];
            (up - down) / (2.0 * h)
        })
        .collect()
}
