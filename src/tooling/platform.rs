// Host platform detection and toolkit download locations.
use super::*;

pub(super) const DOWNLOAD_BASE_URL: &str = "https://ffmpeg.martin-riedl.de/redirect/latest";
pub(super) const CODEC_TOOL: &str = "ffmpeg";
pub(super) const PROBE_TOOL: &str = "ffprobe";

/// Operating system and CPU architecture, spelled like `std::env::consts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    pub fn is_macos(&self) -> bool {
        self.os == "macos"
    }

    /// Executable file name for `name` on this platform.
    pub fn executable_name(&self, name: &str) -> String {
        if self.is_windows() {
            format!("{name}.exe")
        } else {
            name.to_string()
        }
    }

    /// Path-list separator used by the `PATH` variable on this platform.
    pub fn path_separator(&self) -> char {
        if self.is_windows() {
            ';'
        } else {
            ':'
        }
    }

    /// Maps the platform onto the `<os>/<arch>` segment of the download URL.
    fn download_segment(&self) -> Result<(&'static str, &'static str), ProvisionError> {
        match self.os.as_str() {
            "macos" => {
                // Everything that is not Apple silicon gets the Intel build.
                let arch = if self.arch == "aarch64" {
                    "arm64"
                } else {
                    "amd64"
                };
                Ok(("macos", arch))
            }
            "windows" => {
                if self.arch != "x86_64" {
                    return Err(ProvisionError::UnsupportedArchitecture {
                        os: self.os.clone(),
                        arch: self.arch.clone(),
                    });
                }
                Ok(("windows", "amd64"))
            }
            _ => Err(ProvisionError::UnsupportedPlatform {
                os: self.os.clone(),
                arch: self.arch.clone(),
            }),
        }
    }

    /// Resolves the codec and probe assets, installed under `target_dir`.
    pub fn resolve_assets(&self, target_dir: &Path) -> Result<[BinaryAsset; 2], ProvisionError> {
        let (os, arch) = self.download_segment()?;
        let asset = |name: &'static str| -> Result<BinaryAsset, ProvisionError> {
            let raw = format!("{DOWNLOAD_BASE_URL}/{os}/{arch}/release/{name}.zip");
            let url = Url::parse(&raw).map_err(|source| ProvisionError::InvalidUrl {
                url: raw.clone(),
                source,
            })?;
            Ok(BinaryAsset {
                name,
                url,
                path: target_dir.join(self.executable_name(name)),
            })
        };
        Ok([asset(CODEC_TOOL)?, asset(PROBE_TOOL)?])
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// One downloadable executable of the toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryAsset {
    pub name: &'static str,
    pub url: Url,
    pub path: PathBuf,
}

impl BinaryAsset {
    /// Installed means present as a regular file, not a directory.
    pub fn is_installed(&self) -> bool {
        self.path.is_file()
    }

    /// Archive file name taken from the last URL segment.
    pub(super) fn archive_name(&self) -> String {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(|name| name.to_string()))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{}.zip", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_platforms_resolve_two_assets() {
        let dir = Path::new("/cache/doreveal-tools");
        for (os, arch) in [
            ("macos", "aarch64"),
            ("macos", "x86_64"),
            ("windows", "x86_64"),
        ] {
            let assets = Platform::new(os, arch).resolve_assets(dir).unwrap();
            assert_eq!(assets.len(), 2);
            for asset in &assets {
                assert!(!asset.url.as_str().is_empty());
                assert!(asset.path.starts_with(dir));
            }
            assert_eq!(assets[0].name, "ffmpeg");
            assert_eq!(assets[1].name, "ffprobe");
        }
    }

    #[test]
    fn test_macos_arch_selection() {
        let dir = Path::new("/c");
        let arm = Platform::new("macos", "aarch64").resolve_assets(dir).unwrap();
        assert_eq!(
            arm[0].url.as_str(),
            "https://ffmpeg.martin-riedl.de/redirect/latest/macos/arm64/release/ffmpeg.zip"
        );
        // Unknown architectures fall back to the Intel build.
        let other = Platform::new("macos", "x86").resolve_assets(dir).unwrap();
        assert_eq!(
            other[1].url.as_str(),
            "https://ffmpeg.martin-riedl.de/redirect/latest/macos/amd64/release/ffprobe.zip"
        );
        assert_eq!(other[1].path, dir.join("ffprobe"));
    }

    #[test]
    fn test_windows_uses_exe_names() {
        let assets = Platform::new("windows", "x86_64")
            .resolve_assets(Path::new("C:/cache"))
            .unwrap();
        assert_eq!(assets[0].path, Path::new("C:/cache").join("ffmpeg.exe"));
        assert_eq!(assets[1].path, Path::new("C:/cache").join("ffprobe.exe"));
        assert!(assets[0].url.as_str().contains("/windows/amd64/"));
    }

    #[test]
    fn test_unsupported_platforms_fail() {
        let dir = Path::new("/c");
        let windows_arm = Platform::new("windows", "aarch64").resolve_assets(dir);
        assert!(matches!(
            windows_arm,
            Err(ProvisionError::UnsupportedArchitecture { .. })
        ));
        for (os, arch) in [("linux", "x86_64"), ("linux", "aarch64"), ("freebsd", "x86_64")] {
            let result = Platform::new(os, arch).resolve_assets(dir);
            assert!(matches!(
                result,
                Err(ProvisionError::UnsupportedPlatform { .. })
            ));
        }
    }

    #[test]
    fn test_archive_name_from_url() {
        let assets = Platform::new("macos", "aarch64")
            .resolve_assets(Path::new("/c"))
            .unwrap();
        assert_eq!(assets[0].archive_name(), "ffmpeg.zip");
        assert_eq!(assets[1].archive_name(), "ffprobe.zip");
    }
}
