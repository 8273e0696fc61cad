use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use burn::data::dataset::{transform::Mapper, Dataset};
use image::DynamicImage;
use itertools::Itertools;

use crate::{
    error::{DataError, Result},
    transform::{tensor::ImageTensor, Compose},
};

pub const IMG_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

/// A labelled image file, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub path: PathBuf,
    pub label: usize,
}

#[derive(Debug, Clone)]
pub struct ImageItem {
    pub img: ImageTensor,
    pub label: usize,
}

/// Decodes an entry as RGB and runs it through the split's pipeline.
#[derive(Debug, Clone)]
struct LoadImage {
    pipeline: Arc<Compose>,
}

impl LoadImage {
    fn load(&self, entry: &FolderEntry) -> Result<ImageItem> {
        let img = image::open(&entry.path).map_err(|source| DataError::Decode {
            path: entry.path.clone(),
            source,
        })?;
        let img = DynamicImage::ImageRgb8(img.to_rgb8());

        let img = self
            .pipeline
            .apply(img)
            .map_err(|source| DataError::Transform {
                path: entry.path.clone(),
                source,
            })?;

        Ok(ImageItem {
            img,
            label: entry.label,
        })
    }
}

impl Mapper<FolderEntry, ImageItem> for LoadImage {
    /// # Panics
    /// The data loader has no error channel, so a file that can't be decoded
    /// or transformed aborts the iteration.
    fn map(&self, item: &FolderEntry) -> ImageItem {
        self.load(item)
            .unwrap_or_else(|err| panic!("{:#}", anyhow::Error::from(err)))
    }
}

/// Images laid out as `root/<class>/**/<image>`. Classes are the immediate
/// subdirectories of `root` in lexicographic order; labels are their indices.
pub struct ImageFolderDataset {
    entries: Vec<FolderEntry>,
    classes: Vec<String>,
    mapper: LoadImage,
}

impl ImageFolderDataset {
    pub fn new(root: impl AsRef<Path>, pipeline: Compose) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(DataError::MissingSplit {
                path: root.to_path_buf(),
            });
        }

        let classes = find_classes(root)?;
        let mut entries = Vec::new();
        for (label, class) in classes.iter().enumerate() {
            let class_dir = root.join(class);
            let mut paths = Vec::new();
            collect_images(&class_dir, &mut paths)?;
            if paths.is_empty() {
                return Err(DataError::EmptyClass {
                    class: class.clone(),
                    path: class_dir,
                });
            }
            entries.extend(paths.into_iter().map(|path| FolderEntry { path, label }));
        }

        log::debug!(
            "found {} images in {} classes under `{}`",
            entries.len(),
            classes.len(),
            root.display()
        );

        Ok(Self {
            entries,
            classes,
            mapper: LoadImage {
                pipeline: Arc::new(pipeline),
            },
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn entries(&self) -> &[FolderEntry] {
        &self.entries
    }

    /// Like [`Dataset::get`], but reports decoding and transform failures.
    pub fn try_get(&self, index: usize) -> Result<Option<ImageItem>> {
        self.entries
            .get(index)
            .map(|entry| self.mapper.load(entry))
            .transpose()
    }
}

impl Dataset<ImageItem> for ImageFolderDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.entries.get(index).map(|entry| self.mapper.map(entry))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DataError + '_ {
    move |source| DataError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn sorted_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        paths.push(entry.map_err(io_err(dir))?.path());
    }
    paths.sort();
    Ok(paths)
}

fn find_classes(root: &Path) -> Result<Vec<String>> {
    let classes = sorted_dir(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .collect_vec();

    if classes.is_empty() {
        return Err(DataError::NoClasses {
            path: root.to_path_buf(),
        });
    }
    Ok(classes)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMG_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Files of a directory come before the contents of its subdirectories.
fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let (dirs, files): (Vec<_>, Vec<_>) = sorted_dir(dir)?
        .into_iter()
        .partition(|path| path.is_dir());

    out.extend(files.into_iter().filter(|path| has_image_extension(path)));
    for sub in dirs {
        collect_images(&sub, out)?;
    }
    Ok(())
}
