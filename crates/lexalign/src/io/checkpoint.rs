//! Mapping checkpoints: one safetensors file per language.

use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};

use crate::error::{AlignError, AlignResult};
use crate::mapping::Mapping;
use crate::types::Lang;

fn map_candle(e: candle_core::Error) -> AlignError {
    AlignError::BackendError {
        message: format!("Checkpoint error: {}", e),
    }
}

const TENSOR_NAME: &str = "mapping";

/// Checkpoint file path for one language's mapping.
pub fn mapping_path(dir: &Path, lang: &Lang) -> PathBuf {
    dir.join(format!("mapping.{}.safetensors", lang))
}

/// Serialize a mapping matrix to a safetensors file.
pub fn save_mapping(mapping: &Mapping, path: &Path) -> AlignResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let weight = mapping.weight();
    let shape: Vec<usize> = weight.dims().to_vec();
    let data: Vec<f32> = weight
        .flatten_all()
        .map_err(map_candle)?
        .to_vec1()
        .map_err(map_candle)?;

    let view = safetensors::tensor::TensorView::new(
        safetensors::Dtype::F32,
        shape,
        bytemuck::cast_slice(&data),
    )
    .map_err(|e| AlignError::CheckpointError {
        message: format!("TensorView for {} failed: {}", path.display(), e),
    })?;

    safetensors::tensor::serialize_to_file(
        [(TENSOR_NAME.to_string(), view)],
        &None::<std::collections::HashMap<String, String>>,
        path,
    )
    .map_err(|e| AlignError::CheckpointError {
        message: format!("Failed to write {}: {}", path.display(), e),
    })?;

    tracing::info!(
        "* Saved mapping for {} to {}",
        mapping.lang(),
        path.display()
    );
    Ok(())
}

/// Load a mapping matrix, enforcing the exact `(dim, dim)` shape.
///
/// A shape mismatch is fatal: the checkpoint belongs to an incompatible
/// model and must not be silently adapted.
pub fn load_mapping(path: &Path, dim: usize, device: &Device) -> AlignResult<Tensor> {
    let bytes = std::fs::read(path)?;
    let tensors = safetensors::SafeTensors::deserialize(&bytes).map_err(|e| {
        AlignError::CheckpointError {
            message: format!("Failed to deserialize {}: {}", path.display(), e),
        }
    })?;
    let view = tensors
        .tensor(TENSOR_NAME)
        .map_err(|e| AlignError::CheckpointError {
            message: format!("Missing tensor '{}' in {}: {}", TENSOR_NAME, path.display(), e),
        })?;

    if view.dtype() != safetensors::Dtype::F32 {
        return Err(AlignError::CheckpointError {
            message: format!("{}: expected F32 mapping, got {:?}", path.display(), view.dtype()),
        });
    }
    let shape = view.shape();
    if shape.len() != 2 {
        return Err(AlignError::CheckpointError {
            message: format!("{}: mapping tensor is not 2-D", path.display()),
        });
    }
    if shape[0] != dim || shape[1] != dim {
        return Err(AlignError::ShapeMismatch {
            expected: (dim, dim),
            actual: (shape[0], shape[1]),
        });
    }

    let floats: &[f32] = bytemuck::cast_slice(view.data());
    Tensor::from_slice(floats, (dim, dim), device).map_err(map_candle)
}
