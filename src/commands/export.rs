use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use fs_err as fs;
use log::info;
use resolve_path::PathResolveExt;
use thiserror::Error;

use crate::{
    discover::{collect_exportable_nodes, resolve_root},
    document::FigmaFile,
    download::{save_all, SaveError, SaveSummary, DEFAULT_CONCURRENCY},
    figma_api::{file_url, get_client, ClientConfig, FigmaApiClient, FigmaCredentials},
    group::group_by_format,
    minify::{format_bytes, minify_dir, MinifyError, MinifyStats},
    options::Global,
    resolve::{resolve_render_urls, ResolveError, ResolvedAsset},
};

#[derive(Debug, Args)]
pub struct ExportOptions {
    /// The key of the Figma file, found in its URL after `figma.com/file/`.
    #[clap(long = "file", short = 'f')]
    pub file_key: String,

    /// Case-sensitive page name (like "Icons") or node id (like "453:89") to
    /// look for exportable assets in. Defaults to the whole document.
    #[clap(long, short)]
    pub page: Option<String>,

    /// The directory to save images to.
    #[clap(long, short, default_value = "assets/icons")]
    pub output: PathBuf,

    /// Compress the saved svg, png and jpg files.
    #[clap(long)]
    pub compress: bool,

    /// Save the document returned by the Figma API as figma-debug-<file>.json.
    #[clap(long)]
    pub debug: bool,

    /// Seconds to wait for each request to Figma or an image url before giving
    /// up.
    #[clap(long, default_value_t = 60)]
    pub timeout: u64,

    /// How many images to download at once.
    #[clap(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No exportable assets found.")]
    NoExportableAssets,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{source}\nError saving images to filesystem")]
    Save { source: SaveError },

    #[error("{source}\nError minifying assets")]
    Minify { source: MinifyError },

    #[error("could not write debug file {}", path.display())]
    DebugDump {
        path: PathBuf,
        source: anyhow::Error,
    },
}

/// What a finished export did, for reporting and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub exportable_nodes: usize,
    pub assets: Vec<ResolvedAsset>,
    pub saved: SaveSummary,
    pub minified: Option<MinifyStats>,
}

pub async fn export(global: Global, options: ExportOptions) -> Result<()> {
    let timeout = Duration::from_secs(options.timeout);

    let client = get_client(
        FigmaCredentials {
            token: global.token,
        },
        ClientConfig {
            timeout: Some(timeout),
            ..ClientConfig::default()
        },
    )?;
    info!("Connected to Figma");

    let http = reqwest::Client::builder().timeout(timeout).build()?;
    let output = options.output.try_resolve()?.into_owned();

    let report = run_export(client.as_ref(), &http, &options, &output, Path::new(".")).await?;
    log::debug!(
        "saved {} of {} images from {} exportable nodes, compressed: {}",
        report.saved.saved,
        report.assets.len(),
        report.exportable_nodes,
        report.minified.is_some()
    );

    Ok(())
}

/// Runs every stage after connecting. Debug dumps go to `debug_dir`.
pub async fn run_export(
    client: &dyn FigmaApiClient,
    http: &reqwest::Client,
    options: &ExportOptions,
    output: &Path,
    debug_dir: &Path,
) -> Result<ExportReport> {
    let file = client
        .get_file(&options.file_key)
        .await
        .with_context(|| format!("Could not read Figma file {}", options.file_key))?;
    info!("Reading file {}", file_url(&options.file_key));

    if options.debug {
        let path = write_debug_dump(&file, &options.file_key, debug_dir)
            .context("Debug: Save json file for reference")?;
        info!("Debug: saved {}", path.display());
    }

    let root = resolve_root(&file.document, options.page.as_deref());
    let nodes = collect_exportable_nodes(root);
    if nodes.is_empty() {
        return Err(ExportError::NoExportableAssets).context("Find exportable assets");
    }
    info!("Found {} exportable assets", nodes.len());

    let groups = group_by_format(&nodes);
    log::debug!(
        "requesting {} renders in {} groups: {}",
        groups.stub_count(),
        groups.len(),
        groups.keys().collect::<Vec<_>>().join(", ")
    );

    let assets = resolve_render_urls(client, &options.file_key, &groups)
        .await
        .map_err(ExportError::from)
        .context("Get urls for all export formats")?;
    info!("Got {} image urls", assets.len());

    info!("Save {} images to '{}'", assets.len(), output.display());
    let saved = save_all(http, &assets, output, options.concurrency)
        .await
        .map_err(|source| ExportError::Save { source })
        .context("Save images")?;
    if saved.skipped > 0 {
        log::warn!("{} images could not be fetched and were skipped", saved.skipped);
    }
    info!("Saved {} images to '{}'", saved.saved, output.display());

    let minified = if options.compress && !assets.is_empty() {
        let stats = minify(output).await.context("Minify image assets")?;
        info!(
            "Minified images: {} -> {} ({}%)",
            format_bytes(stats.bytes_before),
            format_bytes(stats.bytes_after),
            stats.reduction_percent()
        );
        Some(stats)
    } else {
        if options.compress {
            info!("No images to minify");
        }
        None
    };

    Ok(ExportReport {
        exportable_nodes: nodes.len(),
        assets,
        saved,
        minified,
    })
}

fn write_debug_dump(file: &FigmaFile, file_key: &str, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("figma-debug-{}.json", file_key));

    let write = || -> Result<()> {
        fs::write(&path, file.to_debug_json()?)?;
        Ok(())
    };

    match write() {
        Ok(()) => Ok(path),
        Err(source) => Err(ExportError::DebugDump { path, source }.into()),
    }
}

async fn minify(output: &Path) -> Result<MinifyStats> {
    let dir = output.to_owned();

    let stats = tokio::task::spawn_blocking(move || minify_dir(&dir))
        .await
        .context("image compression task failed")?
        .map_err(|source| ExportError::Minify { source })?;

    Ok(stats)
}
