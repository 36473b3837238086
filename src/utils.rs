use crate::prelude::*;
use rayon::prelude::*;

/// Worst-case elementwise relative error, max |a - b| / max(|a| + |b|, 1e-8).
/// Both arrays must have the same shape.
pub fn rel_error<D: Dimension>(a: &Array<f64, D>, b: &Array<f64, D>) -> f64 {
    Zip::from(a).and(b).fold(0.0, |worst, &x, &y| {
        let err = (x - y).abs() / (x.abs() + y.abs()).max(1e-8);
        worst.max(err)
    })
}

/// Central-difference gradient of `f` at `x`, one matrix entry at a time.
/// Entries are evaluated in parallel; `f` sees a fresh perturbed copy per call.
pub fn numerical_gradient2<F>(f: F, x: &Array2<f64>, h: f64) -> Result<Array2<f64>>
where
    F: Fn(&Array2<f64>) -> Result<f64> + Sync,
{
    let (rows, cols) = x.dim();
    let entries: Vec<f64> = (0..rows * cols)
        .into_par_iter()
        .map(|i| {
            let idx = [i / cols, i % cols];
            let mut probe = x.clone();
            probe[idx] = x[idx] + h;
            let up = f(&probe)?;
            probe[idx] = x[idx] - h;
            let down = f(&probe)?;
            Ok((up - down) / (2.0 * h))
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(Array2::from_shape_vec((rows, cols), entries)?)
}

/// Central-difference gradient for vector-valued parameters.
pub fn numerical_gradient1<F>(f: F, x: &Array1<f64>, h: f64) -> Result<Array1<f64>>
where
    F: Fn(&Array1<f64>) -> Result<f64> + Sync,
{
    let entries: Vec<f64> = (0..x.len())
        .into_par_iter()
        .map(|i| {
            let mut probe = x.clone();
            probe[i] = x[i] + h;
            let up = f(&probe)?;
            probe[i] = x[i] - h;
            let down = f(&probe)?;
            Ok((up - down) / (2.0 * h))
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(Array1::from_vec(entries))
}
