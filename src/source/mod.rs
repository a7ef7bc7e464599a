//! Image and annotation acquisition.
//!
//! Annotated image names arrive lower-cased and trimmed, so the local
//! source indexes a directory tree by normalized file name instead of
//! joining paths directly; the remote source resolves names against an
//! HTTP(S) base URL. Load failures are reported per name and the caller
//! decides whether to skip.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::DynamicImage;
use url::Url;
use walkdir::WalkDir;

use crate::error::BoxsliceError;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "png", "jpeg", "bmp", "webp"];
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_LIMIT: u64 = 64 * 1024 * 1024;

/// Where source images are loaded from.
pub enum ImageSource {
    Directory(DirectorySource),
    Remote(RemoteSource),
}

impl ImageSource {
    /// Build a source from a CLI-style spec: an `http(s)://` base URL or a
    /// local directory path.
    pub fn from_spec(spec: &str) -> Result<Self, BoxsliceError> {
        if is_url(spec) {
            Ok(Self::Remote(RemoteSource::new(spec)?))
        } else {
            Ok(Self::Directory(DirectorySource::new(Path::new(spec))?))
        }
    }

    /// Load and decode the image registered under `name`.
    pub fn load(&self, name: &str) -> Result<DynamicImage, BoxsliceError> {
        match self {
            Self::Directory(source) => source.load(name),
            Self::Remote(source) => source.load(name),
        }
    }
}

/// A directory tree of images, indexed by lower-cased file name.
#[derive(Debug)]
pub struct DirectorySource {
    index: BTreeMap<String, PathBuf>,
}

impl DirectorySource {
    /// Walk `root` and index every image file by its normalized name.
    pub fn new(root: &Path) -> Result<Self, BoxsliceError> {
        if !root.is_dir() {
            return Err(BoxsliceError::ImageSourceInvalid {
                location: root.display().to_string(),
                message: "not a directory".to_string(),
            });
        }

        let mut index = BTreeMap::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|source| BoxsliceError::ImageSourceInvalid {
                location: root.display().to_string(),
                message: format!("failed while traversing directory: {source}"),
            })?;

            if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
                continue;
            }
            if let Some(file_name) = entry.path().file_name().and_then(|n| n.to_str()) {
                index
                    .entry(file_name.trim().to_lowercase())
                    .or_insert_with(|| entry.path().to_path_buf());
            }
        }

        Ok(Self { index })
    }

    fn load(&self, name: &str) -> Result<DynamicImage, BoxsliceError> {
        let path = self.index.get(name).ok_or_else(|| BoxsliceError::ImageLoad {
            name: name.to_string(),
            message: "no matching file in the images directory".to_string(),
        })?;

        image::open(path).map_err(|source| BoxsliceError::ImageLoad {
            name: name.to_string(),
            message: source.to_string(),
        })
    }
}

/// Images served relative to an HTTP(S) base URL.
#[derive(Debug)]
pub struct RemoteSource {
    agent: ureq::Agent,
    base: Url,
}

impl RemoteSource {
    /// Build a source for `base`; a missing trailing slash is added so
    /// image names resolve under the base path rather than replacing its
    /// last segment.
    pub fn new(base: &str) -> Result<Self, BoxsliceError> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };

        let parsed = Url::parse(&normalized).map_err(|source| BoxsliceError::ImageSourceInvalid {
            location: base.to_string(),
            message: source.to_string(),
        })?;

        Ok(Self {
            agent: build_agent(),
            base: parsed,
        })
    }

    fn load(&self, name: &str) -> Result<DynamicImage, BoxsliceError> {
        let bytes = self.fetch(name)?;
        image::load_from_memory(&bytes).map_err(|source| BoxsliceError::ImageLoad {
            name: name.to_string(),
            message: source.to_string(),
        })
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>, BoxsliceError> {
        let url = self
            .base
            .join(name)
            .map_err(|source| BoxsliceError::ImageLoad {
                name: name.to_string(),
                message: source.to_string(),
            })?;

        let mut response =
            self.agent
                .get(url.as_str())
                .call()
                .map_err(|source| BoxsliceError::ImageLoad {
                    name: name.to_string(),
                    message: source.to_string(),
                })?;

        response
            .body_mut()
            .with_config()
            .limit(FETCH_LIMIT)
            .read_to_vec()
            .map_err(|source| BoxsliceError::ImageLoad {
                name: name.to_string(),
                message: source.to_string(),
            })
    }
}

/// Read the annotation document from a local path or an HTTP(S) URL.
///
/// Annotation acquisition is the one fatal fetch in the system; without it
/// there is nothing to slice.
pub fn read_annotation_text(spec: &str) -> Result<String, BoxsliceError> {
    if is_url(spec) {
        let agent = build_agent();
        let mut response = agent
            .get(spec)
            .call()
            .map_err(|source| BoxsliceError::AnnotationFetch {
                location: spec.to_string(),
                message: source.to_string(),
            })?;

        response
            .body_mut()
            .with_config()
            .limit(FETCH_LIMIT)
            .read_to_string()
            .map_err(|source| BoxsliceError::AnnotationFetch {
                location: spec.to_string(),
                message: source.to_string(),
            })
    } else {
        fs::read_to_string(spec).map_err(|source| BoxsliceError::AnnotationFetch {
            location: spec.to_string(),
            message: source.to_string(),
        })
    }
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(FETCH_TIMEOUT))
        .build();
    config.into()
}

fn is_url(spec: &str) -> bool {
    spec.starts_with("http://") || spec.starts_with("https://")
}

fn has_image_extension(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    IMAGE_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
}
