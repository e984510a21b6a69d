//! Resolve stored image references to readable file paths.

use std::path::{Component, Path, PathBuf};

use gridwatch_core::{DomainError, DomainResult, ImageRef};

const FILE_SCHEME: &str = "file://";

/// Maps [`ImageRef`]s onto the local media directory.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    root: PathBuf,
}

impl MediaResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative references are joined onto the media root and may not climb out of it.
    pub fn resolve(&self, image: &ImageRef) -> DomainResult<PathBuf> {
        let raw = image.as_str();

        if let Some(path) = raw.strip_prefix(FILE_SCHEME) {
            let path = Path::new(path);
            if !path.is_absolute() {
                return Err(DomainError::invalid_image_ref(format!(
                    "file URI must carry an absolute path: {raw}"
                )));
            }
            return Ok(path.to_path_buf());
        }

        if let Some((scheme, _)) = raw.split_once("://") {
            return Err(DomainError::invalid_image_ref(format!(
                "unsupported storage scheme {scheme:?} in {raw}"
            )));
        }

        let path = Path::new(raw);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(DomainError::invalid_image_ref(format!(
                "relative image path escapes the media root: {raw}"
            )));
        }
        Ok(self.root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwatch_core::UploadId;

    fn image(s: &str) -> ImageRef {
        ImageRef::new(s).unwrap()
    }

    #[test]
    fn relative_paths_land_under_root() {
        let media = MediaResolver::new("/srv/media");
        let upload = UploadId::new();
        let reference = ImageRef::citizen_upload(upload, "pole.jpg").unwrap();

        assert_eq!(
            media.resolve(&reference).unwrap(),
            PathBuf::from(format!("/srv/media/reports/{upload}/citizen/pole.jpg"))
        );
    }

    #[test]
    fn absolute_and_file_uri_pass_through() {
        let media = MediaResolver::new("media");
        assert_eq!(
            media.resolve(&image("/tmp/a.jpg")).unwrap(),
            PathBuf::from("/tmp/a.jpg")
        );
        assert_eq!(
            media.resolve(&image("file:///tmp/b.png")).unwrap(),
            PathBuf::from("/tmp/b.png")
        );
    }

    #[test]
    fn rejects_escapes_and_remote_schemes() {
        let media = MediaResolver::new("media");
        assert!(media.resolve(&image("../secrets/key.jpg")).is_err());
        assert!(media.resolve(&image("s3://bucket/a.jpg")).is_err());
        assert!(media.resolve(&image("file://relative.jpg")).is_err());
    }
}
