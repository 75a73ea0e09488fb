use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use ndarray::{Array1, Array2, ArrayView3, Axis};
use ndarray_npy::{read_npy, ViewNpyExt};
use once_cell::unsync::OnceCell;

use crate::error::{Result, VQAError};

const IDS: &str = "ids.npy";
const FEATURES: &str = "features.npy";
const BOXES: &str = "boxes.npy";
const WIDTHS: &str = "widths.npy";
const HEIGHTS: &str = "heights.npy";

/// Precomputed bottom-up features of one image.
#[derive(Debug, Clone)]
pub struct RegionFeatures {
    /// `[objects, dim]`
    pub features: Array2<f32>,
    /// `[objects, 4]`, pixel coordinates
    pub boxes: Array2<f32>,
    /// 1.0 where the object's feature vector sums to more than zero
    pub obj_mask: Array1<f32>,
    pub width: f32,
    pub height: f32,
}

impl RegionFeatures {
    /// Divides x-coordinates by the image width and y-coordinates by its height.
    pub fn normalize_boxes(&mut self) {
        let (width, height) = (self.width, self.height);
        for mut b in self.boxes.rows_mut() {
            b[0] /= width;
            b[1] /= height;
            b[2] /= width;
            b[3] /= height;
        }
    }
}

/// Image id to row lookup for a region-feature store.
///
/// The store is a directory holding `ids.npy (i64, N)`, `features.npy (f32, N x D x K)`,
/// `boxes.npy (f32, N x 4 x K)`, `widths.npy (i32, N)` and `heights.npy (i32, N)`.
/// Only the ids are read here; the large arrays are opened by each [`FeatureReader`].
#[derive(Debug)]
pub struct FeatureIndex {
    root: PathBuf,
    id_to_index: HashMap<i64, usize>,
}

impl FeatureIndex {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let ids: Array1<i64> = read_npy(root.join(IDS)).map_err(|source| VQAError::ReadNpy {
            name: IDS.to_string(),
            source,
        })?;
        let id_to_index = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect::<HashMap<_, _>>();
        log::info!("indexed {} images in feature store {}", id_to_index.len(), root.display());
        Ok(FeatureIndex { root, id_to_index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.id_to_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_index.is_empty()
    }

    pub fn contains(&self, image_id: i64) -> bool {
        self.id_to_index.contains_key(&image_id)
    }

    pub fn index_of(&self, image_id: i64) -> Result<usize> {
        self.id_to_index
            .get(&image_id)
            .copied()
            .ok_or(VQAError::UnknownImage(image_id))
    }
}

struct FeatureHandle {
    features: Mmap,
    boxes: Mmap,
    widths: Array1<i32>,
    heights: Array1<i32>,
}

impl FeatureHandle {
    fn open(root: &Path) -> Result<Self> {
        let read_dims = |name: &str| -> Result<Array1<i32>> {
            read_npy(root.join(name)).map_err(|source| VQAError::ReadNpy {
                name: name.to_string(),
                source,
            })
        };
        let handle = FeatureHandle {
            features: map_file(&root.join(FEATURES))?,
            boxes: map_file(&root.join(BOXES))?,
            widths: read_dims(WIDTHS)?,
            heights: read_dims(HEIGHTS)?,
        };
        log::debug!("opened feature store {} on {:?}", root.display(), std::thread::current().id());
        Ok(handle)
    }

    fn view<'a>(buf: &'a Mmap, name: &str) -> Result<ArrayView3<'a, f32>> {
        ArrayView3::<f32>::view_npy(buf).map_err(|source| VQAError::ViewNpy {
            name: name.to_string(),
            source,
        })
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| VQAError::io(path, e))?;
    // SAFETY: the store is read-only input data; it must not be modified while mapped.
    unsafe { Mmap::map(&file) }.map_err(|e| VQAError::io(path, e))
}

/// Per-worker reader over a shared [`FeatureIndex`].
///
/// The memory maps are created on the first `load`, not at construction, so every
/// worker ends up with its own handle. Cloning a reader yields a fresh, unopened one.
pub struct FeatureReader {
    index: Arc<FeatureIndex>,
    handle: OnceCell<FeatureHandle>,
}

impl FeatureReader {
    pub fn new(index: Arc<FeatureIndex>) -> Self {
        FeatureReader {
            index,
            handle: OnceCell::new(),
        }
    }

    pub fn index(&self) -> &Arc<FeatureIndex> {
        &self.index
    }

    pub fn is_open(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn load(&self, image_id: i64) -> Result<RegionFeatures> {
        let row = self.index.index_of(image_id)?;
        let handle = self.handle.get_or_try_init(|| FeatureHandle::open(self.index.root()))?;

        let features = FeatureHandle::view(&handle.features, FEATURES)?;
        let boxes = FeatureHandle::view(&handle.boxes, BOXES)?;
        if row >= features.len_of(Axis(0)) || row >= boxes.len_of(Axis(0)) {
            return Err(VQAError::Integrity(format!(
                "feature store {} has fewer rows than ids",
                self.index.root().display()
            )));
        }
        let (num_obj, boxes_shape) = (features.len_of(Axis(2)), boxes.shape());
        if boxes_shape[1] != 4 || boxes_shape[2] != num_obj {
            return Err(VQAError::shape_mismatch(
                "region boxes",
                &[boxes_shape[0], 4, num_obj],
                boxes_shape,
            ));
        }
        let width = *handle.widths.get(row).ok_or(VQAError::UnknownImage(image_id))?;
        let height = *handle.heights.get(row).ok_or(VQAError::UnknownImage(image_id))?;

        // stored as [dim, objects] and [4, objects]
        let img = features.index_axis(Axis(0), row);
        let features = img.t().as_standard_layout().into_owned();
        let boxes = boxes.index_axis(Axis(0), row).t().as_standard_layout().into_owned();
        let obj_mask = img.sum_axis(Axis(0)).mapv(|s| if s > 0. { 1. } else { 0. });

        Ok(RegionFeatures {
            features,
            boxes,
            obj_mask,
            width: width as f32,
            height: height as f32,
        })
    }
}

impl Clone for FeatureReader {
    fn clone(&self) -> Self {
        FeatureReader::new(self.index.clone())
    }
}

impl std::fmt::Debug for FeatureReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureReader")
            .field("root", &self.index.root())
            .field("open", &self.is_open())
            .finish()
    }
}
