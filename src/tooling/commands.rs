// Caller-facing operations exported by the toolkit.
use super::*;

fn require<'a>(value: &'a str, message: &'static str) -> Result<&'a str, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(message));
    }
    Ok(trimmed)
}

fn absolute_path(raw: &str) -> Result<PathBuf, Error> {
    std::path::absolute(raw).map_err(Error::ResolvePath)
}

/// Builds the tool environment the settings ask for, installing the managed
/// toolkit first when needed.
pub fn prepare_tools(settings: &ToolkitSettings) -> Result<ToolEnv, Error> {
    match settings.tools_source {
        ToolsSource::System => Ok(ToolEnv::system()),
        ToolsSource::Custom => {
            let dir = settings.tools_dir.as_deref().ok_or_else(|| {
                SettingsError::Invalid("toolsDir is required when toolsSource is \"custom\"".to_string())
            })?;
            Ok(ToolEnv::from_dir(dir))
        }
        ToolsSource::Managed => {
            let cache_root = settings
                .cache_root()
                .ok_or(ProvisionError::CacheDirUnavailable)?;
            Ok(Provisioner::for_host(&cache_root).ensure_ready()?)
        }
    }
}

pub fn inspect_media(env: &ToolEnv, path: &str) -> Result<MediaInfo, Error> {
    let path = absolute_path(require(path, "path is required")?)?;
    Ok(Prober::new(env.clone()).load_media_info(&path)?)
}

pub fn convert_media(
    env: &ToolEnv,
    source_path: &str,
    target_format: &str,
    speed: Option<f64>,
) -> Result<ConversionResult, Error> {
    let source = absolute_path(require(source_path, "sourcePath is required")?)?;
    let target = require(target_format, "targetFormat is required")?;

    let prober = Prober::new(env.clone());
    let request = ConversionRequest::new(source, target).with_speed(speed);
    let plan = Planner::new(prober.clone()).plan(&request)?;
    Ok(Executor::new(prober).execute(&plan)?)
}

/// Hands `path` to the desktop's default handler without waiting for it.
pub fn open_path(path: &str) -> Result<(), Error> {
    let path = absolute_path(require(path, "path is required")?)?;
    fs::metadata(&path).map_err(Error::StatPath)?;
    info!("Opening {}", path.display());
    open_with_default_handler(&path).map_err(Error::OpenPath)
}

pub fn tools_status(env: &ToolEnv, settings: &ToolkitSettings) -> ToolsStatus {
    ToolsStatus {
        settings: settings.clone(),
        bin_dir: env
            .bin_dir()
            .map(|dir| dir.to_string_lossy().to_string()),
        ffmpeg: inspect_tool(env, CODEC_TOOL, settings.tools_source),
        ffprobe: inspect_tool(env, PROBE_TOOL, settings.tools_source),
    }
}
