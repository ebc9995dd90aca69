//! Streams rendered images from their URLs into the output directory.

use std::path::{Path, PathBuf};

use fs_err::tokio as fs;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::resolve::ResolvedAsset;

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The URL answered with something other than 200; nothing was written.
    Skipped(StatusCode),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub saved: usize,
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("could not create output directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not download {url}")]
    Http { url: String, source: reqwest::Error },

    #[error("could not write {}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} of {total} images could not be saved:\n{}", failures.len(), list_failures(failures))]
    Aggregate {
        total: usize,
        failures: Vec<(String, SaveError)>,
    },
}

fn list_failures(failures: &[(String, SaveError)]) -> String {
    failures
        .iter()
        .map(|(file_name, err)| match std::error::Error::source(err) {
            Some(source) => format!("  {}: {}: {}", file_name, err, source),
            None => format!("  {}: {}", file_name, err),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Downloads `url` into `output_dir/file_name`, creating the directory if it
/// does not exist yet. A non-200 answer is not an error; the file is skipped.
pub async fn save_image(
    http: &Client,
    url: &str,
    output_dir: &Path,
    file_name: &str,
) -> Result<SaveOutcome, SaveError> {
    let mut response = http.get(url).send().await.map_err(|source| SaveError::Http {
        url: url.to_owned(),
        source,
    })?;

    if response.status() != StatusCode::OK {
        return Ok(SaveOutcome::Skipped(response.status()));
    }

    fs::create_dir_all(output_dir)
        .await
        .map_err(|source| SaveError::CreateDir {
            path: output_dir.to_owned(),
            source,
        })?;

    let path = output_dir.join(file_name);
    let write_err = |source| SaveError::Write {
        path: path.clone(),
        source,
    };

    let mut file = fs::File::create(&path).await.map_err(write_err)?;

    let streamed = async {
        while let Some(chunk) = response.chunk().await.map_err(|source| SaveError::Http {
            url: url.to_owned(),
            source,
        })? {
            file.write_all(&chunk).await.map_err(write_err)?;
        }
        file.flush().await.map_err(write_err)
    }
    .await;

    if let Err(err) = streamed {
        // Don't leave a truncated image behind.
        drop(file);
        if let Err(remove_err) = fs::remove_file(&path).await {
            log::debug!("could not remove partial download: {}", remove_err);
        }
        return Err(err);
    }

    log::trace!("saved {}", path.display());
    Ok(SaveOutcome::Saved)
}

/// Saves every asset, at most `concurrency` at a time. All downloads are
/// attempted; failures are collected into a single [`SaveError::Aggregate`].
pub async fn save_all(
    http: &Client,
    assets: &[ResolvedAsset],
    output_dir: &Path,
    concurrency: usize,
) -> Result<SaveSummary, SaveError> {
    fs::create_dir_all(output_dir)
        .await
        .map_err(|source| SaveError::CreateDir {
            path: output_dir.to_owned(),
            source,
        })?;

    let results: Vec<(String, Result<SaveOutcome, SaveError>)> = stream::iter(assets)
        .map(|asset| async move {
            let file_name = asset.file_name();
            let result = save_image(http, &asset.url, output_dir, &file_name).await;
            (file_name, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = SaveSummary::default();
    let mut failures = Vec::new();

    for (file_name, result) in results {
        match result {
            Ok(SaveOutcome::Saved) => summary.saved += 1,
            Ok(SaveOutcome::Skipped(status)) => {
                log::debug!("skipped {}: image url answered {}", file_name, status);
                summary.skipped += 1;
            }
            Err(err) => failures.push((file_name, err)),
        }
    }

    if failures.is_empty() {
        Ok(summary)
    } else {
        Err(SaveError::Aggregate {
            total: assets.len(),
            failures,
        })
    }
}
