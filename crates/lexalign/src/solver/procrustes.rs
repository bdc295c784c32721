//! Orthogonal Procrustes alignment.
//!
//! Two-space: the closed-form optimum `W = U·Vᵀ` of the cross-covariance
//! SVD, minimizing `‖S·Wᵀ − T‖_F` over orthogonal `W`.
//!
//! Generalized (N spaces): every space is repeatedly superimposed onto a
//! group-average reference shape; after each pass the reference is
//! recomputed as the mean of the mapped point sets. The very first
//! iteration of the very first run seeds the reference with one target
//! space's points; afterwards only the recomputed mean is used.

use std::collections::BTreeMap;

use candle_core::Tensor;

use crate::error::{AlignError, AlignResult};
use crate::mapping::Mapping;
use crate::solver::svd::{matmul, svd_full};
use crate::types::Lang;

/// Fixed iteration count for generalized Procrustes. No convergence
/// check: the count is part of the contract.
pub const GPA_ITERATIONS: usize = 100;

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Procrustes error: {}", e),
    }
}

/// Extract a square tensor into a flat row-major f64 buffer.
fn to_f64_square(t: &Tensor) -> AlignResult<(Vec<f64>, usize)> {
    let (rows, cols) = t.dims2().map_err(map_candle)?;
    if rows != cols {
        return Err(AlignError::ShapeMismatch {
            expected: (rows, rows),
            actual: (rows, cols),
        });
    }
    let data = t.to_vec2::<f32>().map_err(map_candle)?;
    let mut flat = Vec::with_capacity(rows * cols);
    for row in data {
        flat.extend(row.into_iter().map(|x| x as f64));
    }
    Ok((flat, rows))
}

/// Polar factor `U·Vᵀ` of a square matrix, as an f32 tensor on the
/// input's device.
fn polar_factor(m: &Tensor) -> AlignResult<Tensor> {
    let (flat, n) = to_f64_square(m)?;
    let svd = svd_full(&flat, n);
    let w = matmul(&svd.u, &svd.vt, n);
    let w: Vec<f32> = w.into_iter().map(|x| x as f32).collect();
    Tensor::from_vec(w, (n, n), m.device()).map_err(map_candle)
}

/// Solve the two-space orthogonal Procrustes problem for matched point
/// sets `source` and `target`, both `(pairs, dim)`.
///
/// Returns the mapping matrix `W = U·Vᵀ` of `M = Tᵀ·S`, to be applied as
/// `x · Wᵀ`. Duplicate dictionary rows simply contribute duplicate point
/// rows to the covariance.
pub fn procrustes(source: &Tensor, target: &Tensor) -> AlignResult<Tensor> {
    let s_dims = source.dims2().map_err(map_candle)?;
    let t_dims = target.dims2().map_err(map_candle)?;
    if s_dims != t_dims {
        return Err(AlignError::ShapeMismatch {
            expected: s_dims,
            actual: t_dims,
        });
    }
    let m = target
        .t()
        .map_err(map_candle)?
        .matmul(source)
        .map_err(map_candle)?;
    polar_factor(&m)
}

/// Group-average reference shape: the elementwise mean of every space's
/// points after applying its current mapping (`x · Wᵀ`, the same
/// orientation used everywhere a mapping is applied).
fn group_average(
    points: &BTreeMap<Lang, Tensor>,
    mappings: &BTreeMap<Lang, &Mapping>,
) -> AlignResult<Tensor> {
    let mut sum: Option<Tensor> = None;
    for (lang, x) in points {
        let mapping = mappings
            .get(lang)
            .ok_or_else(|| AlignError::UnknownLanguage {
                lang: lang.to_string(),
            })?;
        let mapped = mapping.apply(x)?.detach();
        sum = Some(match sum {
            None => mapped,
            Some(acc) => acc.add(&mapped).map_err(map_candle)?,
        });
    }
    let sum = sum.ok_or_else(|| AlignError::InvalidInput {
        message: "generalized Procrustes needs at least one space".to_string(),
    })?;
    sum.affine(1.0 / points.len() as f64, 0.0).map_err(map_candle)
}

/// Generalized Procrustes over `points` (matched point sets per language,
/// all `(pairs, dim)`), updating each language's mapping in place.
///
/// `reference` names the space whose raw points seed the group average;
/// that seed is only used on the first iteration of an `initial_run`.
/// Runs exactly [`GPA_ITERATIONS`] iterations.
pub fn generalized_procrustes(
    points: &BTreeMap<Lang, Tensor>,
    mappings: &BTreeMap<Lang, &Mapping>,
    reference: &Lang,
    initial_run: bool,
) -> AlignResult<()> {
    if points.len() < 2 {
        return Err(AlignError::InvalidInput {
            message: "generalized Procrustes needs at least two spaces".to_string(),
        });
    }
    if !points.contains_key(reference) {
        return Err(AlignError::UnknownLanguage {
            lang: reference.to_string(),
        });
    }
    for lang in points.keys() {
        if !mappings.contains_key(lang) {
            return Err(AlignError::UnknownLanguage {
                lang: lang.to_string(),
            });
        }
    }

    let mut seed_reference = initial_run;
    for _ in 0..GPA_ITERATIONS {
        let g = if seed_reference {
            points[reference].clone()
        } else {
            group_average(points, mappings)?
        };
        seed_reference = false;

        // Superimpose every space onto the current reference.
        for (lang, x) in points {
            let m = g
                .t()
                .map_err(map_candle)?
                .matmul(x)
                .map_err(map_candle)?;
            let w = polar_factor(&m)?;
            mappings[lang].set_weight(&w)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_points(rng: &mut StdRng, n: usize, d: usize) -> Tensor {
        let data: Vec<f32> = (0..n * d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Tensor::from_vec(data, (n, d), &Device::Cpu).unwrap()
    }

    fn orthogonality_error(w: &Tensor) -> f32 {
        let wtw = w.t().unwrap().matmul(w).unwrap().to_vec2::<f32>().unwrap();
        let mut err = 0.0f32;
        for (i, row) in wtw.iter().enumerate() {
            for (j, &x) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                err = err.max((x - expected).abs());
            }
        }
        err
    }

    #[test]
    fn test_output_is_orthogonal() {
        let mut rng = StdRng::seed_from_u64(3);
        let src = random_points(&mut rng, 40, 6);
        let tgt = random_points(&mut rng, 40, 6);
        let w = procrustes(&src, &tgt).unwrap();
        assert!(orthogonality_error(&w) < 1e-4);
    }

    #[test]
    fn test_identical_spaces_identity_dictionary_gives_identity() {
        let mut rng = StdRng::seed_from_u64(5);
        let pts = random_points(&mut rng, 10, 4);
        let w = procrustes(&pts, &pts).unwrap().to_vec2::<f32>().unwrap();
        for (i, row) in w.iter().enumerate() {
            for (j, &x) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((x - expected).abs() < 1e-4, "W[{}][{}] = {}", i, j, x);
            }
        }
    }

    #[test]
    fn test_recovers_planted_rotation() {
        // target = source rotated by a known orthogonal matrix R;
        // the solver must recover x·Wᵀ ≈ target.
        let mut rng = StdRng::seed_from_u64(9);
        let d = 5;
        let src = random_points(&mut rng, 60, d);
        let raw: Vec<f64> = (0..d * d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let svd = svd_full(&raw, d);
        let r = matmul(&svd.u, &svd.vt, d);
        let r32: Vec<f32> = r.iter().map(|&x| x as f32).collect();
        let r_t = Tensor::from_vec(r32, (d, d), &Device::Cpu).unwrap();
        let tgt = src.matmul(&r_t).unwrap();

        let w = procrustes(&src, &tgt).unwrap();
        let aligned = src.matmul(&w.t().unwrap()).unwrap();
        let diff = aligned
            .sub(&tgt)
            .unwrap()
            .sqr()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff < 1e-6, "residual {}", diff);
    }

    #[test]
    fn test_mismatched_pair_counts_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let src = random_points(&mut rng, 10, 4);
        let tgt = random_points(&mut rng, 12, 4);
        assert!(procrustes(&src, &tgt).is_err());
    }
}
