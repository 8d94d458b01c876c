use crate::common::*;
use image::ImageFormat;

/// Formats whose decoders are compiled in.
const DECODABLE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Bmp,
    ImageFormat::Gif,
    ImageFormat::Tiff,
    ImageFormat::WebP,
];

/// What to do with a directory entry that is not an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonImagePolicy {
    /// Ignore the entry with a warning.
    Skip,
    /// Reject the whole directory.
    Fail,
}

impl Default for NonImagePolicy {
    fn default() -> Self {
        Self::Skip
    }
}

/// An image file in the dataset directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRecord {
    pub path: PathBuf,
}

impl ImageRecord {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lists the image files of a directory, sorted by file name.
///
/// Files are recognized by the extension of a decodable format. Subdirectories
/// and other files are handled according to `policy`.
pub fn enumerate_images<P>(dir: P, policy: NonImagePolicy) -> Result<Vec<ImageRecord>>
where
    P: AsRef<Path>,
{
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|err| {
        Error::config(format!(
            "unable to read dataset directory '{}': {}",
            dir.display(),
            err
        ))
    })?;

    let mut records = vec![];
    let mut num_skipped = 0;

    for entry in entries {
        let path = entry
            .map_err(|err| {
                Error::config(format!("unable to list '{}': {}", dir.display(), err))
            })?
            .path();
        let is_image = path.is_file() && is_decodable(&path);

        if is_image {
            records.push(ImageRecord { path });
        } else {
            match policy {
                NonImagePolicy::Skip => {
                    warn!("skip non-image entry '{}'", path.display());
                    num_skipped += 1;
                }
                NonImagePolicy::Fail => {
                    return Err(Error::config(format!(
                        "'{}' is not an image file",
                        path.display()
                    )));
                }
            }
        }
    }

    records.sort_by(|lhs, rhs| lhs.path.file_name().cmp(&rhs.path.file_name()));
    debug!(
        "found {} images and {} skipped entries in '{}'",
        records.len(),
        num_skipped,
        dir.display()
    );

    Ok(records)
}

fn is_decodable(path: &Path) -> bool {
    ImageFormat::from_path(path)
        .map(|format| DECODABLE_FORMATS.contains(&format))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_are_sorted_and_others_skipped() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.png", "a.jpg", "c.bmp", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"")?;
        }
        std::fs::create_dir(dir.path().join("nested"))?;

        let records = enumerate_images(dir.path(), NonImagePolicy::Skip)?;
        let names: Vec<_> = records
            .iter()
            .map(|record| record.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jpg", "b.png", "c.bmp"]);
        Ok(())
    }

    #[test]
    fn fail_policy_rejects_other_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.png"), b"")?;
        std::fs::write(dir.path().join("labels.csv"), b"")?;

        let result = enumerate_images(dir.path(), NonImagePolicy::Fail);
        assert!(matches!(result, Err(Error::Configuration(_))));
        Ok(())
    }

    #[test]
    fn formats_without_a_decoder_are_not_images() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["a.png", "b.tga", "c.ico", "d.hdr", "e.webp", "f.TIFF"] {
            std::fs::write(dir.path().join(name), b"")?;
        }

        let records = enumerate_images(dir.path(), NonImagePolicy::Skip)?;
        let names: Vec<_> = records
            .iter()
            .map(|record| record.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "e.webp", "f.TIFF"]);

        let result = enumerate_images(dir.path(), NonImagePolicy::Fail);
        assert!(matches!(result, Err(Error::Configuration(_))));
        Ok(())
    }

    #[test]
    fn missing_directory_is_a_configuration_error() {
        let result = enumerate_images("/nonexistent/images", NonImagePolicy::Skip);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
