//! Text embedding file I/O.
//!
//! The format is the common `.vec` layout: a `count dim` header line,
//! then one `word v₁ … v_d` line per word. Duplicate words are skipped
//! with a warning; the declared dimension is enforced on every line.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use candle_core::{Device, Tensor};

use crate::error::{AlignError, AlignResult};
use crate::types::{EmbeddingSpace, Lang, Vocabulary};

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Embedding I/O error: {}", e),
    }
}

/// Load an embedding space from a text `.vec` file.
///
/// `max_vocab` truncates to the first `n` (most frequent) words;
/// `center` subtracts the per-dimension mean after loading.
pub fn load_embeddings(
    path: &Path,
    lang: Lang,
    max_vocab: Option<usize>,
    center: bool,
    device: &Device,
) -> AlignResult<EmbeddingSpace> {
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let header = lines.next().ok_or_else(|| AlignError::ParseError {
        message: format!("{}: empty embedding file", path.display()),
    })??;
    let mut header_fields = header.split_whitespace();
    let declared: usize = header_fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| AlignError::ParseError {
            message: format!("{}: malformed header '{}'", path.display(), header),
        })?;
    let dim: usize = header_fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| AlignError::ParseError {
            message: format!("{}: malformed header '{}'", path.display(), header),
        })?;

    let capacity = max_vocab.unwrap_or(declared);
    let mut words: Vec<String> = Vec::with_capacity(capacity.min(declared));
    let mut seen: HashSet<String> = HashSet::with_capacity(capacity.min(declared));
    let mut data: Vec<f32> = Vec::with_capacity(capacity.min(declared) * dim);
    let mut duplicates = 0usize;

    for (line_no, line) in lines.enumerate() {
        if let Some(max) = max_vocab {
            if words.len() >= max {
                break;
            }
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let word = fields.next().ok_or_else(|| AlignError::ParseError {
            message: format!("{}:{}: empty line body", path.display(), line_no + 2),
        })?;
        if !seen.insert(word.to_string()) {
            duplicates += 1;
            continue;
        }
        let start = data.len();
        for field in fields {
            let value: f32 = field.parse().map_err(|_| AlignError::ParseError {
                message: format!(
                    "{}:{}: invalid float '{}'",
                    path.display(),
                    line_no + 2,
                    field
                ),
            })?;
            data.push(value);
        }
        if data.len() - start != dim {
            return Err(AlignError::DimensionMismatch {
                expected: dim,
                actual: data.len() - start,
            });
        }
        words.push(word.to_string());
    }

    if duplicates > 0 {
        tracing::warn!(
            "{}: skipped {} duplicate words",
            path.display(),
            duplicates
        );
    }
    tracing::info!(
        "Loaded {} {}-dimensional embeddings for {} from {}",
        words.len(),
        dim,
        lang,
        path.display()
    );

    let count = words.len();
    let vocab = Vocabulary::new(words)?;
    let mut matrix = Tensor::from_vec(data, (count, dim), device).map_err(map_candle)?;
    if center {
        matrix = center_columns(&matrix)?;
    }
    EmbeddingSpace::new(lang, vocab, matrix)
}

/// Subtract the per-dimension mean from every row.
pub fn center_columns(t: &Tensor) -> AlignResult<Tensor> {
    let means = t.mean_keepdim(0).map_err(map_candle)?;
    t.broadcast_sub(&means).map_err(map_candle)
}

/// Export a (typically mapped) embedding matrix in the same text format
/// it was loaded from.
pub fn export_embeddings(vocab: &Vocabulary, matrix: &Tensor, path: &Path) -> AlignResult<()> {
    let (rows, dim) = matrix.dims2().map_err(map_candle)?;
    if rows != vocab.len() {
        return Err(AlignError::InvalidInput {
            message: format!(
                "matrix has {} rows for a vocabulary of {} words",
                rows,
                vocab.len()
            ),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{} {}", rows, dim)?;
    let data = matrix.to_vec2::<f32>().map_err(map_candle)?;
    for (i, row) in data.iter().enumerate() {
        let word = vocab.word(i).ok_or_else(|| AlignError::InvalidInput {
            message: format!("no word for row {}", i),
        })?;
        write!(writer, "{}", word)?;
        for value in row {
            write!(writer, " {:.5}", value)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    tracing::info!("Exported {} embeddings to {}", rows, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_round_trip() {
        let file = write_file("2 3\nhello 1.0 2.0 3.0\nworld 4.0 5.0 6.0\n");
        let space = load_embeddings(file.path(), Lang::new("en"), None, false, &Device::Cpu)
            .unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(space.dim().unwrap(), 3);
        assert_eq!(space.vocab().index("world"), Some(1));

        let out = tempfile::NamedTempFile::new().unwrap();
        export_embeddings(space.vocab(), space.matrix(), out.path()).unwrap();
        let reloaded =
            load_embeddings(out.path(), Lang::new("en"), None, false, &Device::Cpu).unwrap();
        assert_eq!(reloaded.len(), 2);
        let row = reloaded.matrix().to_vec2::<f32>().unwrap();
        assert!((row[1][0] - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_duplicates_skipped() {
        let file = write_file("3 2\na 1.0 0.0\na 2.0 0.0\nb 3.0 0.0\n");
        let space = load_embeddings(file.path(), Lang::new("en"), None, false, &Device::Cpu)
            .unwrap();
        assert_eq!(space.len(), 2);
        // First occurrence wins.
        let rows = space.matrix().to_vec2::<f32>().unwrap();
        assert!((rows[0][0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_max_vocab_truncates() {
        let file = write_file("3 2\na 1.0 0.0\nb 2.0 0.0\nc 3.0 0.0\n");
        let space = load_embeddings(file.path(), Lang::new("en"), Some(2), false, &Device::Cpu)
            .unwrap();
        assert_eq!(space.len(), 2);
    }

    #[test]
    fn test_dimension_enforced() {
        let file = write_file("1 3\na 1.0 2.0\n");
        let result = load_embeddings(file.path(), Lang::new("en"), None, false, &Device::Cpu);
        assert!(matches!(result, Err(AlignError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_centering_zeroes_column_means() {
        let file = write_file("2 2\na 1.0 4.0\nb 3.0 8.0\n");
        let space = load_embeddings(file.path(), Lang::new("en"), None, true, &Device::Cpu)
            .unwrap();
        let cols = space.matrix().mean(0).unwrap().to_vec1::<f32>().unwrap();
        for c in cols {
            assert!(c.abs() < 1e-6);
        }
    }
}
