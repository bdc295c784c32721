//! An embedding space: one language's vocabulary plus its dense matrix.

use candle_core::Tensor;

use crate::error::{AlignError, AlignResult};
use crate::types::{Lang, Vocabulary};

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Embedding space error: {}", e),
    }
}

/// L2-normalize each row of a `(n, d)` tensor. Rows with zero norm are
/// left untouched (the epsilon floor keeps the division finite).
pub fn l2_normalize_rows(t: &Tensor) -> AlignResult<Tensor> {
    let norms = t
        .sqr()
        .map_err(map_candle)?
        .sum_keepdim(1)
        .map_err(map_candle)?
        .sqrt()
        .map_err(map_candle)?
        .clamp(1e-12, f64::INFINITY)
        .map_err(map_candle)?;
    t.broadcast_div(&norms).map_err(map_candle)
}

/// Dense word embeddings for one language.
///
/// The matrix is immutable once loaded; row index is the canonical word
/// id. Mapped (aligned) views are produced by applying a mapping to the
/// matrix, never by mutating it.
#[derive(Debug, Clone)]
pub struct EmbeddingSpace {
    lang: Lang,
    vocab: Vocabulary,
    matrix: Tensor,
}

impl EmbeddingSpace {
    /// Wrap a vocabulary and its `(vocab, dim)` matrix, validating that
    /// they agree on the number of rows.
    pub fn new(lang: Lang, vocab: Vocabulary, matrix: Tensor) -> AlignResult<Self> {
        let (rows, _dim) = matrix.dims2().map_err(map_candle)?;
        if rows != vocab.len() {
            return Err(AlignError::InvalidInput {
                message: format!(
                    "embedding matrix has {} rows for a vocabulary of {} words ({})",
                    rows,
                    vocab.len(),
                    lang
                ),
            });
        }
        Ok(Self {
            lang,
            vocab,
            matrix,
        })
    }

    pub fn lang(&self) -> &Lang {
        &self.lang
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn matrix(&self) -> &Tensor {
        &self.matrix
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    /// Embedding dimension.
    pub fn dim(&self) -> AlignResult<usize> {
        let (_, dim) = self.matrix.dims2().map_err(map_candle)?;
        Ok(dim)
    }

    /// Row-normalized copy of the matrix.
    pub fn normalized(&self) -> AlignResult<Tensor> {
        l2_normalize_rows(&self.matrix)
    }

    /// Gather the rows at `indices` into an `(indices.len(), dim)` tensor.
    pub fn rows(&self, indices: &[usize]) -> AlignResult<Tensor> {
        gather_rows(&self.matrix, indices)
    }
}

/// Gather rows of a `(n, d)` tensor by index.
pub(crate) fn gather_rows(t: &Tensor, indices: &[usize]) -> AlignResult<Tensor> {
    let (rows, _) = t.dims2().map_err(map_candle)?;
    let mut ids = Vec::with_capacity(indices.len());
    for &i in indices {
        if i >= rows {
            return Err(AlignError::InvalidInput {
                message: format!("row index {} out of range for {} rows", i, rows),
            });
        }
        ids.push(i as u32);
    }
    let ids = Tensor::from_vec(ids, indices.len(), t.device()).map_err(map_candle)?;
    t.index_select(&ids, 0).map_err(map_candle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn space(words: &[&str], data: &[f32], dim: usize) -> EmbeddingSpace {
        let vocab =
            Vocabulary::new(words.iter().map(|w| w.to_string()).collect()).unwrap();
        let matrix =
            Tensor::from_vec(data.to_vec(), (words.len(), dim), &Device::Cpu).unwrap();
        EmbeddingSpace::new(Lang::new("en"), vocab, matrix).unwrap()
    }

    #[test]
    fn test_row_count_validated() {
        let vocab = Vocabulary::new(vec!["one".to_string()]).unwrap();
        let matrix = Tensor::zeros((2, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
        let result = EmbeddingSpace::new(Lang::new("en"), vocab, matrix);
        assert!(result.is_err());
    }

    #[test]
    fn test_normalized_rows_have_unit_norm() {
        let s = space(&["a", "b"], &[3.0, 4.0, 0.0, 5.0, 12.0, 0.0], 3);
        let norm = s.normalized().unwrap();
        let rows = norm.to_vec2::<f32>().unwrap();
        for row in rows {
            let n: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((n - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rows_gathers_in_order() {
        let s = space(&["a", "b", "c"], &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0], 2);
        let picked = s.rows(&[2, 0]).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(picked[0][0], 3.0);
        assert_eq!(picked[1][0], 1.0);
    }

    #[test]
    fn test_rows_rejects_out_of_range() {
        let s = space(&["a"], &[1.0, 0.0], 2);
        assert!(s.rows(&[1]).is_err());
    }
}
