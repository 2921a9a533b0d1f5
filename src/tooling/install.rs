// Managed FFmpeg installer: download, extract, verify and mark the toolkit.
use super::*;
use std::io::Read;
use std::time::Instant;

pub(super) const INSTALLED_MARKER: &str = "installed";
const DOWNLOAD_BUFFER_SIZE: usize = 64 * 1024;
const PROGRESS_LOG_INTERVAL_MS: u128 = 1_000;

/// Source of toolkit archives.
pub trait ArchiveFetcher {
    /// Downloads `url` into `destination` and returns the number of bytes written.
    fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, ProvisionError>;
}

/// Plain unauthenticated HTTP(S) GET through `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqFetcher;

impl ArchiveFetcher for UreqFetcher {
    fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, ProvisionError> {
        let source_host = url.host_str().unwrap_or("unknown source").to_string();
        info!("Connecting to {source_host}...");

        let response = ureq::get(url.as_str())
            .call()
            .map_err(|error| ProvisionError::Download {
                url: url.to_string(),
                source: Box::new(error),
            })?;
        let total_size = response
            .header("content-length")
            .and_then(|value| value.parse::<u64>().ok());

        let mut reader = response.into_reader();
        let write_error = |source: io::Error| ProvisionError::Write {
            path: destination.to_path_buf(),
            source,
        };
        let mut file = fs::File::create(destination).map_err(write_error)?;

        let mut downloaded = 0_u64;
        let mut last_logged_percent = -1_i32;
        let mut last_log = Instant::now();
        let mut buffer = vec![0_u8; DOWNLOAD_BUFFER_SIZE];
        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|source| ProvisionError::Transfer {
                    url: url.to_string(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).map_err(write_error)?;
            downloaded += read as u64;

            if last_log.elapsed().as_millis() < PROGRESS_LOG_INTERVAL_MS {
                continue;
            }
            last_log = Instant::now();
            match total_size.filter(|total| *total > 0) {
                Some(total) => {
                    let percent = ((downloaded as f64 / total as f64) * 100.0).round() as i32;
                    if percent != last_logged_percent {
                        last_logged_percent = percent;
                        info!(
                            "Downloading {}: {percent}% ({:.1}/{:.1} MB)",
                            url,
                            downloaded as f64 / (1024.0 * 1024.0),
                            total as f64 / (1024.0 * 1024.0)
                        );
                    }
                }
                None => info!(
                    "Downloading {}: {:.1} MB received",
                    url,
                    downloaded as f64 / (1024.0 * 1024.0)
                ),
            }
        }
        file.flush().map_err(write_error)?;

        info!("Downloaded {downloaded} bytes from {source_host}");
        Ok(downloaded)
    }
}

/// Installs ffmpeg and ffprobe into `<cache root>/doreveal-tools`.
#[derive(Debug)]
pub struct Provisioner<F = UreqFetcher> {
    platform: Platform,
    tools_dir: PathBuf,
    temp_dir: PathBuf,
    fetcher: F,
}

impl Provisioner<UreqFetcher> {
    /// Provisioner for the host platform that downloads over the network.
    pub fn for_host(cache_root: &Path) -> Self {
        Self::new(Platform::current(), cache_root, UreqFetcher)
    }
}

impl<F: ArchiveFetcher> Provisioner<F> {
    pub fn new(platform: Platform, cache_root: &Path, fetcher: F) -> Self {
        Self {
            platform,
            tools_dir: cache_root.join(APP_DIR_NAME),
            temp_dir: std::env::temp_dir(),
            fetcher,
        }
    }

    /// Directory that receives downloaded archives before extraction.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn marker_path(&self) -> PathBuf {
        self.tools_dir.join(INSTALLED_MARKER)
    }

    pub fn assets(&self) -> Result<[BinaryAsset; 2], ProvisionError> {
        self.platform.resolve_assets(&self.tools_dir)
    }

    /// Ready means every executable is present as a regular file.
    pub fn is_ready(&self) -> Result<bool, ProvisionError> {
        Ok(self.assets()?.iter().all(BinaryAsset::is_installed))
    }

    /// Makes sure the toolkit is installed and returns the environment that
    /// launches it. Safe to call on every startup.
    pub fn ensure_ready(&self) -> Result<ToolEnv, ProvisionError> {
        let assets = self.assets()?;
        if assets.iter().all(BinaryAsset::is_installed) {
            debug!("FFmpeg toolkit already present in {}", self.tools_dir.display());
            return Ok(ToolEnv::from_dir(&self.tools_dir));
        }

        let marker = self.marker_path();
        if marker.is_file() {
            warn!(
                "Install marker {} is stale: executables are missing, reinstalling",
                marker.display()
            );
        }

        info!(
            "Installing FFmpeg toolkit for {} into {}",
            self.platform,
            self.tools_dir.display()
        );
        fs::create_dir_all(&self.tools_dir).map_err(|source| ProvisionError::CreateDir {
            path: self.tools_dir.clone(),
            source,
        })?;

        for asset in &assets {
            if asset.is_installed() {
                debug!("{} already present at {}", asset.name, asset.path.display());
                continue;
            }
            self.install_asset(asset)?;
        }

        fs::write(&marker, "1").map_err(|source| ProvisionError::Marker {
            path: marker.clone(),
            source,
        })?;
        info!("FFmpeg installed and verified in {}", self.tools_dir.display());
        Ok(ToolEnv::from_dir(&self.tools_dir))
    }

    fn install_asset(&self, asset: &BinaryAsset) -> Result<(), ProvisionError> {
        let archive_path = self.temp_dir.join(format!(
            "{APP_DIR_NAME}-{}-{}",
            std::process::id(),
            asset.archive_name()
        ));

        let extracted = self
            .fetcher
            .fetch(&asset.url, &archive_path)
            .and_then(|_| extract_archive(&archive_path, &self.tools_dir));
        if let Err(error) = fs::remove_file(&archive_path) {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove temporary archive {}: {error}",
                    archive_path.display()
                );
            }
        }
        let entries = extracted?;
        debug!("Extracted {entries} entries for {}", asset.name);

        finalize_executable(asset, &self.platform)?;
        verify_executable(asset)
    }
}

/// Extracts every entry of the zip archive at `archive_path` into `target_dir`.
pub(super) fn extract_archive(archive_path: &Path, target_dir: &Path) -> Result<usize, ProvisionError> {
    let archive_error = |source: zip::result::ZipError| ProvisionError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };
    let file = fs::File::open(archive_path).map_err(|error| archive_error(error.into()))?;
    let mut archive = ZipArchive::new(file).map_err(archive_error)?;

    let mut written = 0_usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_error)?;
        let name = entry.name().to_string();
        let Some(relative) = entry.enclosed_name() else {
            return Err(ProvisionError::UnsafeEntry { name });
        };
        let out_path = target_dir.join(relative);
        let extract_error = |source: io::Error| ProvisionError::Extract {
            name: name.clone(),
            source,
        };

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(extract_error)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(extract_error)?;
        }

        let mut output = fs::File::create(&out_path).map_err(extract_error)?;
        io::copy(&mut entry, &mut output).map_err(extract_error)?;
        drop(output);

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(extract_error)?;
        }
        written += 1;
    }
    Ok(written)
}

/// Checks the executable landed where expected; macOS archives drop the
/// executable bit, so it is restored there.
pub(super) fn finalize_executable(asset: &BinaryAsset, platform: &Platform) -> Result<(), ProvisionError> {
    if !asset.path.is_file() {
        return Err(ProvisionError::MissingExecutable {
            name: asset.name.to_string(),
            path: asset.path.clone(),
        });
    }

    #[cfg(unix)]
    if platform.is_macos() {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&asset.path, fs::Permissions::from_mode(0o755)).map_err(|source| {
            ProvisionError::Permissions {
                path: asset.path.clone(),
                source,
            }
        })?;
    }
    #[cfg(not(unix))]
    let _ = platform;

    Ok(())
}

/// Runs `<asset> -version` and requires a clean exit.
pub(super) fn verify_executable(asset: &BinaryAsset) -> Result<(), ProvisionError> {
    let output = capture_output(hidden_command(&asset.path).arg("-version")).map_err(|source| {
        ProvisionError::Launch {
            path: asset.path.clone(),
            source,
        }
    })?;
    if !output.status.success() {
        return Err(ProvisionError::Verify {
            name: asset.name.to_string(),
            status: output.status,
            output: combined_text(&output),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or(asset.name);
    info!("{} verified: {}", asset.name, version.trim());
    Ok(())
}
