// Toolkit settings, the explicit tool environment and common process primitives.
use super::*;
#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

pub(super) const APP_DIR_NAME: &str = "doreveal-tools";
pub(super) const SETTINGS_FILE_NAME: &str = "settings.json";
pub(super) const MAX_SETTINGS_PATH_LEN: usize = 512;
#[cfg(target_os = "windows")]
pub(super) const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub(super) fn hidden_command(program: impl AsRef<OsStr>) -> Command {
    let mut command = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

/// Where the ffmpeg/ffprobe executables come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolsSource {
    /// Downloaded into the per-user cache on first run.
    #[default]
    Managed,
    /// Whatever is already on the inherited `PATH`.
    System,
    /// A user supplied directory holding both executables.
    Custom,
}

impl ToolsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::System => "system",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolkitSettings {
    pub tools_source: ToolsSource,
    pub tools_dir: Option<String>,
    pub cache_dir: Option<String>,
}

impl ToolkitSettings {
    /// Default location of the settings file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| {
            dirs.config_dir()
                .join(APP_DIR_NAME)
                .join(SETTINGS_FILE_NAME)
        })
    }

    /// Loads settings from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed: Self =
            serde_json::from_str(&raw).map_err(|source| SettingsError::Parse { path, source })?;
        parsed.normalized()
    }

    pub fn normalized(mut self) -> Result<Self, SettingsError> {
        self.tools_dir = sanitize_optional_path(self.tools_dir)?;
        self.cache_dir = sanitize_optional_path(self.cache_dir)?;
        if self.tools_source == ToolsSource::Custom && self.tools_dir.is_none() {
            return Err(SettingsError::Invalid(
                "toolsDir is required when toolsSource is \"custom\"".to_string(),
            ));
        }
        Ok(self)
    }

    /// Root under which the managed toolkit directory lives.
    pub fn cache_root(&self) -> Option<PathBuf> {
        match self.cache_dir.as_ref() {
            Some(custom) => Some(PathBuf::from(custom)),
            None => directories::BaseDirs::new().map(|dirs| dirs.cache_dir().to_path_buf()),
        }
    }
}

pub(super) fn sanitize_optional_path(value: Option<String>) -> Result<Option<String>, SettingsError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.len() > MAX_SETTINGS_PATH_LEN {
                return Err(SettingsError::Invalid("Path is too long.".to_string()));
            }
            if trimmed.chars().any(|ch| ch.is_control()) {
                return Err(SettingsError::Invalid(
                    "Path contains invalid control characters.".to_string(),
                ));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

/// Search path used to launch ffmpeg and ffprobe.
///
/// Every component that starts an external tool receives one of these
/// instead of reading or mutating the process-wide `PATH`.
#[derive(Debug, Clone)]
pub struct ToolEnv {
    bin_dir: Option<PathBuf>,
    search_path: OsString,
}

impl ToolEnv {
    /// Tools from `dir` first, then the inherited `PATH`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let separator = Platform::current().path_separator();
        let mut search_path = dir.as_os_str().to_os_string();
        if let Some(inherited) = std::env::var_os("PATH").filter(|value| !value.is_empty()) {
            search_path.push(separator.to_string());
            search_path.push(inherited);
        }
        Self {
            bin_dir: Some(dir),
            search_path,
        }
    }

    /// Tools from the inherited `PATH` only.
    pub fn system() -> Self {
        Self {
            bin_dir: None,
            search_path: std::env::var_os("PATH").unwrap_or_default(),
        }
    }

    pub fn bin_dir(&self) -> Option<&Path> {
        self.bin_dir.as_deref()
    }

    pub fn search_path(&self) -> &OsStr {
        &self.search_path
    }

    /// Locates `tool` on this environment's search path.
    pub fn resolve(&self, tool: &str) -> Result<PathBuf, which::Error> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(tool, Some(&self.search_path), cwd)
    }

    /// A command for `program` that sees this environment's search path.
    pub(super) fn command(&self, program: &Path) -> Command {
        let mut command = hidden_command(program);
        command.env("PATH", &self.search_path);
        command
    }
}

/// Runs `command` to completion with stdout and stderr captured.
pub(super) fn capture_output(command: &mut Command) -> io::Result<Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
}

/// Stdout followed by stderr, trimmed, for diagnostics.
pub(super) fn combined_text(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = stdout.trim();
    let stderr = stderr.trim();
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

pub(super) fn describe_command(program: &Path, args: &[OsString]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

pub(super) fn run_version(env: &ToolEnv, binary: &Path, arg: &str) -> Option<String> {
    let output = capture_output(env.command(binary).arg(arg)).ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
}

pub(super) fn open_with_default_handler(path: &Path) -> io::Result<()> {
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = hidden_command("cmd");
        command.arg("/c").arg("start").arg("").arg(path);
        command
    };

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut command = hidden_command("open");
        command.arg(path);
        command
    };

    #[cfg(all(unix, not(target_os = "macos")))]
    let mut command = {
        let mut command = hidden_command("xdg-open");
        command.arg(path);
        command
    };

    command.spawn()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    pub source: String,
    pub path: Option<String>,
    pub version: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsStatus {
    pub settings: ToolkitSettings,
    pub bin_dir: Option<String>,
    pub ffmpeg: ToolStatus,
    pub ffprobe: ToolStatus,
}

pub(super) fn inspect_tool(env: &ToolEnv, name: &str, source: ToolsSource) -> ToolStatus {
    match env.resolve(name) {
        Ok(path) => {
            let version = run_version(env, &path, "-version");
            let message = if version.is_none() {
                Some("Tool did not answer the version query.".to_string())
            } else {
                None
            };
            ToolStatus {
                name: name.to_string(),
                available: version.is_some(),
                source: source.as_str().to_string(),
                path: Some(path.to_string_lossy().to_string()),
                version,
                message,
            }
        }
        Err(_) => ToolStatus {
            name: name.to_string(),
            available: false,
            source: "missing".to_string(),
            path: None,
            version: None,
            message: Some("Tool not found.".to_string()),
        },
    }
}
