use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use mocap_core::Acquisition;
use serde::{Deserialize, Serialize};

use crate::binary::ByteOrder;
use crate::errors::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Ascii,
    Binary,
}

/// How sample values are stored by binary codecs that support both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageFormat {
    #[default]
    Float,
    Integer,
}

/// A file format able to decode (and possibly encode) an [`Acquisition`].
///
/// `can_read_file` and `can_write_file` never fail: every negative case,
/// including I/O errors while probing, answers `false`.
pub trait AcquisitionFileIO {
    fn name(&self) -> &'static str;

    fn has_read_operation(&self) -> bool {
        true
    }

    fn has_write_operation(&self) -> bool;

    fn file_type(&self) -> FileType;

    /// Lower-case extensions, without the dot.
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Content probe. Extensions may only rule a file out.
    fn can_read_file(&self, path: &Path) -> bool;

    fn can_write_file(&self, path: &Path) -> bool {
        self.has_write_operation() && has_extension(path, self.supported_extensions())
    }

    fn read(&mut self, path: &Path) -> Result<Acquisition, CodecError>;

    fn write(&mut self, path: &Path, acquisition: &Acquisition) -> Result<(), CodecError> {
        let _ = (path, acquisition);
        Err(CodecError::WriteUnsupported { codec: self.name() })
    }

    /// Byte order of the last file read or the one used for writing.
    fn byte_order(&self) -> Option<ByteOrder> {
        None
    }

    fn storage_format(&self) -> Option<StorageFormat> {
        None
    }
}

pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    extension(path).is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// Opens `path` for probing when it is a non-empty regular file.
pub(crate) fn open_for_probe(path: &Path) -> Option<(File, u64)> {
    if path.as_os_str().is_empty() {
        return None;
    }
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() || metadata.len() == 0 {
        return None;
    }
    File::open(path).ok().map(|file| (file, metadata.len()))
}

/// First `len` bytes of the file, or fewer if the file is shorter.
pub(crate) fn read_prefix(path: &Path, len: usize) -> Option<Vec<u8>> {
    let (file, _) = open_for_probe(path)?;
    let mut prefix = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut prefix).ok()?;
    Some(prefix)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn extension_matching_ignores_case() {
        assert!(has_extension(Path::new("trial.C3D"), &["c3d"]));
        assert!(!has_extension(Path::new("trial.c3d.bak"), &["c3d"]));
        assert!(!has_extension(Path::new("c3d"), &["c3d"]));
        assert!(!has_extension(&PathBuf::new(), &["c3d"]));
    }

    #[test]
    fn probing_skips_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.trc");
        fs::write(&empty, b"").unwrap();
        assert!(open_for_probe(&empty).is_none());
        assert!(open_for_probe(&dir.path().join("missing.trc")).is_none());
        assert!(open_for_probe(dir.path()).is_none());

        let file = dir.path().join("short.trc");
        fs::write(&file, b"Path").unwrap();
        assert_eq!(read_prefix(&file, 64).unwrap(), b"Path");
    }
}
