//! In-place compression of exported images.

mod jpeg;
mod png;
mod svg;

use std::path::{Path, PathBuf};

use fs_err as fs;
use globset::{Glob, GlobMatcher};
use thiserror::Error;
use walkdir::WalkDir;

/// JPEG quality used when re-encoding.
pub const JPEG_QUALITY: u8 = 84;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinifyStats {
    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl MinifyStats {
    pub fn reduction_percent(&self) -> f64 {
        reduction_percent(self.bytes_before, self.bytes_after)
    }
}

#[derive(Debug, Error)]
pub enum MinifyError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not read the size of {}", path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("could not compress {}", path.display())]
    Encode {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error("bad file pattern")]
    Pattern(#[from] globset::Error),
}

fn image_matcher() -> Result<GlobMatcher, MinifyError> {
    Ok(Glob::new("*.{svg,png,jpg}")?.compile_matcher())
}

/// Compresses every svg, png and jpg file directly inside `dir`. A file is
/// only replaced when its compressed form is smaller.
pub fn minify_dir(dir: &Path) -> Result<MinifyStats, MinifyError> {
    let bytes_before = folder_size(dir)?;
    let matcher = image_matcher()?;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if !entry.file_type()?.is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }

        let original = fs::read(&path)?;
        let compressed = compress(&path, &original).map_err(|source| MinifyError::Encode {
            path: path.clone(),
            source,
        })?;

        match compressed {
            Some(compressed) if !compressed.is_empty() && compressed.len() < original.len() => {
                log::debug!(
                    "{}: {} -> {}",
                    path.display(),
                    format_bytes(original.len() as u64),
                    format_bytes(compressed.len() as u64)
                );
                fs::write(&path, compressed)?;
            }
            _ => log::trace!("{}: already minimal", path.display()),
        }
    }

    Ok(MinifyStats {
        bytes_before,
        bytes_after: folder_size(dir)?,
    })
}

fn compress(path: &Path, data: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
    let extension = path.extension().and_then(|extension| extension.to_str());

    Ok(match extension {
        Some("png") => Some(png::recompress(data)?),
        Some("jpg") => Some(jpeg::recompress(data, JPEG_QUALITY)?),
        Some("svg") => Some(svg::minify(data)?),
        _ => None,
    })
}

/// Total size in bytes of every file below `dir`.
pub fn folder_size(dir: &Path) -> Result<u64, MinifyError> {
    let mut total = 0;

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|source| MinifyError::Walk {
            path: dir.to_owned(),
            source,
        })?;

        if entry.file_type().is_file() {
            let metadata = entry.metadata().map_err(|source| MinifyError::Walk {
                path: entry.path().to_owned(),
                source,
            })?;
            total += metadata.len();
        }
    }

    Ok(total)
}

/// Human readable size using 1024-based units, like `12.3 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "n/a".to_owned();
    }

    let mut exponent = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }

    if exponent == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[exponent])
    }
}

/// Size reduction in percent with two decimals.
pub fn reduction_percent(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }

    ((1.0 - after as f64 / before as f64) * 10000.0).round() / 100.0
}
