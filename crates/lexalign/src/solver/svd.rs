//! Full singular value decomposition of square matrices.
//!
//! One-sided (Hestenes) Jacobi on flat row-major `f64` buffers: cyclic
//! sweeps rotate column pairs of the working matrix until all columns are
//! mutually orthogonal, accumulating the rotations into V. Column norms
//! are the singular values; normalized columns form U. Orthogonal
//! completion fills U's null-space columns for rank-deficient inputs:
//! `U` and `V` are always fully orthogonal, so the polar factor `U·Vᵀ`
//! stays well-defined.
//!
//! Mapping matrices are small (embedding dimension squared), so the
//! quadratic sweep cost is irrelevant next to the batched similarity
//! scans elsewhere in the pipeline.

/// Convergence threshold on the normalized off-diagonal dot product.
const JACOBI_TOL: f64 = 1e-13;

/// Hard cap on Jacobi sweeps; convergence is quadratic near the end, so
/// this is never reached for well-conditioned inputs.
const MAX_SWEEPS: usize = 60;

/// Result of a full SVD: `m = u · diag(s) · vt`, singular values in
/// descending order, `u` and `vt` square and orthogonal.
#[derive(Debug, Clone)]
pub struct Svd {
    pub u: Vec<f64>,
    pub s: Vec<f64>,
    pub vt: Vec<f64>,
    pub n: usize,
}

/// Decompose a square `n × n` row-major matrix.
pub fn svd_full(m: &[f64], n: usize) -> Svd {
    assert_eq!(m.len(), n * n, "matrix buffer does not match dimension");
    if n == 0 {
        return Svd {
            u: Vec::new(),
            s: Vec::new(),
            vt: Vec::new(),
            n,
        };
    }

    let mut a = m.to_vec();
    let mut v = identity(n);

    for _ in 0..MAX_SWEEPS {
        let mut rotated = false;
        for p in 0..n {
            for q in (p + 1)..n {
                let mut alpha = 0.0;
                let mut beta = 0.0;
                let mut gamma = 0.0;
                for i in 0..n {
                    let ap = a[i * n + p];
                    let aq = a[i * n + q];
                    alpha += ap * ap;
                    beta += aq * aq;
                    gamma += ap * aq;
                }
                if gamma.abs() <= JACOBI_TOL * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;

                let tau = (beta - alpha) / (2.0 * gamma);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;

                for i in 0..n {
                    let ap = a[i * n + p];
                    let aq = a[i * n + q];
                    a[i * n + p] = c * ap - s * aq;
                    a[i * n + q] = s * ap + c * aq;

                    let vp = v[i * n + p];
                    let vq = v[i * n + q];
                    v[i * n + p] = c * vp - s * vq;
                    v[i * n + q] = s * vp + c * vq;
                }
            }
        }
        if !rotated {
            break;
        }
    }

    // Column norms are the singular values.
    let mut order: Vec<usize> = (0..n).collect();
    let norms: Vec<f64> = (0..n)
        .map(|j| (0..n).map(|i| a[i * n + j] * a[i * n + j]).sum::<f64>().sqrt())
        .collect();
    order.sort_by(|&x, &y| norms[y].partial_cmp(&norms[x]).unwrap_or(std::cmp::Ordering::Equal));

    let s_max = norms[order[0]].max(f64::MIN_POSITIVE);
    let rank_tol = s_max * 1e-12;

    let mut s = Vec::with_capacity(n);
    let mut u = vec![0.0f64; n * n];
    let mut vt = vec![0.0f64; n * n];
    let mut deficient = Vec::new();

    for (col, &j) in order.iter().enumerate() {
        s.push(norms[j]);
        if norms[j] > rank_tol {
            for i in 0..n {
                u[i * n + col] = a[i * n + j] / norms[j];
            }
        } else {
            deficient.push(col);
        }
        for i in 0..n {
            vt[col * n + i] = v[i * n + j];
        }
    }

    // Complete U to an orthonormal basis for rank-deficient inputs.
    for &col in &deficient {
        let mut best: Option<(f64, Vec<f64>)> = None;
        for k in 0..n {
            let mut candidate = vec![0.0f64; n];
            candidate[k] = 1.0;
            // Gram-Schmidt against every already-filled column.
            for other in 0..n {
                if deficient.contains(&other) && other >= col {
                    continue;
                }
                let dot: f64 = (0..n).map(|i| candidate[i] * u[i * n + other]).sum();
                for i in 0..n {
                    candidate[i] -= dot * u[i * n + other];
                }
            }
            let norm: f64 = candidate.iter().map(|x| x * x).sum::<f64>().sqrt();
            if best.as_ref().map(|(b, _)| norm > *b).unwrap_or(true) {
                best = Some((norm, candidate));
            }
        }
        if let Some((norm, candidate)) = best {
            if norm > 0.0 {
                for i in 0..n {
                    u[i * n + col] = candidate[i] / norm;
                }
            }
        }
    }

    Svd { u, s, vt, n }
}

/// Row-major identity matrix.
pub fn identity(n: usize) -> Vec<f64> {
    let mut m = vec![0.0f64; n * n];
    for i in 0..n {
        m[i * n + i] = 1.0;
    }
    m
}

/// Row-major square matrix product `a · b`.
pub fn matmul(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0f64; n * n];
    for i in 0..n {
        for k in 0..n {
            let aik = a[i * n + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..n {
                out[i * n + j] += aik * b[k * n + j];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn reconstruct(svd: &Svd) -> Vec<f64> {
        let n = svd.n;
        let mut us = vec![0.0f64; n * n];
        for i in 0..n {
            for j in 0..n {
                us[i * n + j] = svd.u[i * n + j] * svd.s[j];
            }
        }
        matmul(&us, &svd.vt, n)
    }

    fn assert_orthogonal(m: &[f64], n: usize, tol: f64) {
        for i in 0..n {
            for j in 0..n {
                let dot: f64 = (0..n).map(|k| m[k * n + i] * m[k * n + j]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (dot - expected).abs() < tol,
                    "column dot ({}, {}) = {}",
                    i,
                    j,
                    dot
                );
            }
        }
    }

    #[test]
    fn test_identity_decomposes_to_unit_singular_values() {
        let svd = svd_full(&identity(4), 4);
        for s in &svd.s {
            assert!((s - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reconstruction_random_matrix() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 8;
        let m: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let svd = svd_full(&m, n);

        let rec = reconstruct(&svd);
        for (a, b) in m.iter().zip(rec.iter()) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
        assert_orthogonal(&svd.u, n, 1e-10);
        // vt rows are V's columns; orthogonality check transposes back.
        let v: Vec<f64> = {
            let mut v = vec![0.0f64; n * n];
            for i in 0..n {
                for j in 0..n {
                    v[i * n + j] = svd.vt[j * n + i];
                }
            }
            v
        };
        assert_orthogonal(&v, n, 1e-10);
    }

    #[test]
    fn test_singular_values_descend() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 6;
        let m: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let svd = svd_full(&m, n);
        for w in svd.s.windows(2) {
            assert!(w[0] >= w[1] - 1e-12);
        }
    }

    #[test]
    fn test_rank_deficient_still_orthogonal() {
        // Rank-1 matrix: outer product of two vectors.
        let n = 4;
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [0.5, -1.0, 0.25, 2.0];
        let mut m = vec![0.0f64; n * n];
        for i in 0..n {
            for j in 0..n {
                m[i * n + j] = x[i] * y[j];
            }
        }
        let svd = svd_full(&m, n);
        assert!(svd.s[0] > 1.0);
        for s in &svd.s[1..] {
            assert!(*s < 1e-9);
        }
        assert_orthogonal(&svd.u, n, 1e-9);
        let rec = reconstruct(&svd);
        for (a, b) in m.iter().zip(rec.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
