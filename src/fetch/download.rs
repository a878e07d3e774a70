use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs, io::AsyncWriteExt, time};
use tracing::{debug, info, instrument, warn};

use super::catalog::Resource;

const PROGRESS_EVERY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A non-empty file was already at the destination.
    Skipped,
    Downloaded { bytes: u64 },
}

/// `<raw_dir>/<name with '/' replaced by '-'>.<lower-case format>`
pub fn target_path(raw_dir: &Path, res: &Resource) -> PathBuf {
    let name = res
        .name
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("resource")
        .replace('/', "-");
    let format = res
        .format
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "file".to_string());
    raw_dir.join(format!("{}.{}", name, format))
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

async fn already_present(dest: &Path) -> bool {
    match fs::metadata(dest).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Stream `url` into `dest` unless a non-empty file is already there.
///
/// The body lands in `<dest>.part` and is renamed into place once complete,
/// so an interrupted transfer never looks like a finished download.
///
/// `timeout` bounds the wait for the response headers and the gap between
/// body chunks, not the whole transfer.
#[instrument(level = "info", skip(client, dest, timeout), fields(dest = %dest.display()))]
pub async fn download_to(
    client: &Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
) -> Result<DownloadOutcome> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    if already_present(dest).await {
        info!("skip (already exists)");
        return Ok(DownloadOutcome::Skipped);
    }

    let tmp = part_path(dest);
    match stream_body(client, url, &tmp, timeout).await {
        Ok(bytes) => {
            fs::rename(&tmp, dest)
                .await
                .with_context(|| format!("renaming {} into place", tmp.display()))?;
            info!(bytes, "downloaded");
            Ok(DownloadOutcome::Downloaded { bytes })
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(&tmp).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp.display(), error = %rm, "could not remove partial download");
                }
            }
            Err(e)
        }
    }
}

async fn stream_body(client: &Client, url: &str, tmp: &Path, timeout: Duration) -> Result<u64> {
    let response = time::timeout(timeout, client.get(url).send())
        .await
        .with_context(|| format!("GET {} got no response within {:?}", url, timeout))?
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?;

    let expected = response.content_length();
    let mut file = fs::File::create(tmp)
        .await
        .with_context(|| format!("creating {}", tmp.display()))?;

    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    let mut next_report = PROGRESS_EVERY_BYTES;

    loop {
        let next = time::timeout(timeout, stream.next())
            .await
            .with_context(|| {
                format!("{} stalled for {:?} after {} bytes", url, timeout, written)
            })?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.with_context(|| format!("reading body from {}", url))?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        written += chunk.len() as u64;

        if written >= next_report {
            debug!(written, ?expected, "download progress");
            next_report += PROGRESS_EVERY_BYTES;
        }
    }

    file.flush().await?;
    Ok(written)
}
