use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use ndarray::{Array, ArrayD, Dimension, IxDyn};
use ndarray_npy::{NpzReader, NpzWriter};

use crate::error::{Result, VQAError};

/// Named `f32` parameters, stored on disk as an `.npz` archive.
#[derive(Debug, Default, Clone)]
pub struct Checkpoint {
    params: BTreeMap<String, ArrayD<f32>>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| VQAError::io(path, e))?;
        let mut npz = NpzReader::new(file)?;
        let mut params = BTreeMap::new();
        for name in npz.names()? {
            let arr: ArrayD<f32> = npz.by_name(&name)?;
            let key = name.strip_suffix(".npy").unwrap_or(&name).to_string();
            params.insert(key, arr);
        }
        log::info!("loaded {} parameters from {}", params.len(), path.display());
        Ok(Checkpoint { params })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| VQAError::io(path, e))?;
        let mut npz = NpzWriter::new(file);
        for (name, arr) in &self.params {
            npz.add_array(name.as_str(), arr)?;
        }
        npz.finish()?;
        Ok(())
    }

    pub fn insert<D: Dimension>(&mut self, name: impl Into<String>, arr: Array<f32, D>) {
        self.params.insert(name.into(), arr.into_dyn());
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn remove(&mut self, name: &str) -> Option<ArrayD<f32>> {
        self.params.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Fetches `name` and checks that it has exactly `shape`.
    pub fn get<D: Dimension>(&self, name: &str, shape: &[usize]) -> Result<Array<f32, D>> {
        let arr = self
            .params
            .get(name)
            .ok_or_else(|| VQAError::MissingParameter(name.to_string()))?;
        if arr.shape() != shape {
            return Err(VQAError::shape_mismatch("checkpoint parameter", shape, arr.shape()));
        }
        Ok(arr.clone().into_dimensionality::<D>()?)
    }

    pub fn get_scalar(&self, name: &str) -> Result<f32> {
        // Scalars may have been saved as 0-d or as a single-element vector.
        let arr = self
            .params
            .get(name)
            .ok_or_else(|| VQAError::MissingParameter(name.to_string()))?;
        if arr.len() != 1 {
            return Err(VQAError::shape_mismatch("checkpoint scalar", &[], arr.shape()));
        }
        Ok(arr[IxDyn(&vec![0; arr.ndim()])])
    }
}

/// Implemented by every layer that owns parameters.
///
/// Names are built as `prefix.field`, nested the same way the layers are composed,
/// e.g. `classifier.lin3.lin.weight_v`.
pub trait Parameters {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint);

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()>;

    fn num_parameters(&self) -> usize {
        let mut ckpt = Checkpoint::new();
        self.export("", &mut ckpt);
        ckpt.params.values().map(|p| p.len()).sum()
    }
}

pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
