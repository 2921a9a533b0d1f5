// Conversion requests: validation, ffmpeg argument planning and execution.
use super::*;

pub(super) const MIN_SPEED: f64 = 0.5;
pub(super) const MAX_SPEED: f64 = 2.0;
const OUTPUT_SUFFIX: &str = "converted";

/// Containers the toolkit can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Mp4,
    M4a,
    Mp3,
}

impl TargetFormat {
    /// Parses a user supplied token such as `"MP4"` or `".m4a"`.
    pub fn parse(token: &str) -> Result<Self, ConvertError> {
        let normalized = normalize_format(token);
        match normalized.as_str() {
            "" => Err(ConvertError::EmptyFormat),
            "mp4" => Ok(Self::Mp4),
            "m4a" => Ok(Self::M4a),
            "mp3" => Ok(Self::Mp3),
            _ => Err(ConvertError::UnsupportedFormat(normalized)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::M4a => "m4a",
            Self::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trims, lower-cases and drops one leading `.`.
pub(super) fn normalize_format(token: &str) -> String {
    let lowered = token.trim().to_lowercase();
    match lowered.strip_prefix('.') {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

/// Defaults missing or non-positive speeds to 1.0 and enforces the supported range.
pub(super) fn resolve_speed(speed: Option<f64>) -> Result<f64, ConvertError> {
    let speed = match speed {
        Some(value) if value.is_nan() => return Err(ConvertError::UnsupportedSpeed(value)),
        Some(value) if value > 0.0 => value,
        _ => 1.0,
    };
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(ConvertError::UnsupportedSpeed(speed));
    }
    Ok(speed)
}

fn require_kind(source: &MediaInfo, kind: MediaKind, target: TargetFormat) -> Result<(), ConvertError> {
    if source.kind != kind {
        return Err(ConvertError::KindMismatch {
            kind: source.kind,
            format: target.as_str().to_string(),
        });
    }
    Ok(())
}

/// Codec and filter arguments for `target`, without input or output.
pub(super) fn format_arguments(
    source: &MediaInfo,
    target: TargetFormat,
    speed: Option<f64>,
) -> Result<Vec<OsString>, ConvertError> {
    let mut args: Vec<String> = Vec::new();
    match target {
        TargetFormat::Mp4 => {
            require_kind(source, MediaKind::Video, target)?;
            let speed = resolve_speed(speed)?;
            args.extend(
                ["-c:v", "libx264", "-preset", "medium", "-crf", "23"].map(String::from),
            );
            if speed != 1.0 {
                args.push("-filter:v".to_string());
                args.push(format!("setpts=PTS/{speed}"));
                if source.has_audio {
                    args.push("-filter:a".to_string());
                    args.push(format!("atempo={speed}"));
                }
            }
            args.extend(["-c:a", "aac", "-movflags", "+faststart"].map(String::from));
        }
        TargetFormat::M4a => {
            if source.kind == MediaKind::Video {
                args.push("-vn".to_string());
            }
            args.extend(["-c:a", "aac"].map(String::from));
        }
        TargetFormat::Mp3 => {
            require_kind(source, MediaKind::Audio, target)?;
            args.extend(["-codec:a", "libmp3lame", "-qscale:a", "2"].map(String::from));
        }
    }
    Ok(args.into_iter().map(OsString::from).collect())
}

/// Full ffmpeg argument list: `-y -i <source>`, the format arguments, then `output`.
pub(super) fn build_arguments(
    source: &MediaInfo,
    target: TargetFormat,
    speed: Option<f64>,
    output: &Path,
) -> Result<Vec<OsString>, ConvertError> {
    let mut args = vec![
        OsString::from("-y"),
        OsString::from("-i"),
        source.path.as_os_str().to_os_string(),
    ];
    args.extend(format_arguments(source, target, speed)?);
    args.push(output.as_os_str().to_os_string());
    Ok(args)
}

/// First free `<stem>_converted[_N].<extension>` next to `input`.
pub(super) fn unique_output_path(input: &Path, extension: &str) -> Result<PathBuf, ConvertError> {
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let name = input
        .file_name()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_default();
    // Everything from the last `.` is the extension, so `.mov` has no stem.
    let stem = match name.rfind('.') {
        Some(index) => &name[..index],
        None => name.as_str(),
    };
    let stem = if stem.is_empty() { OUTPUT_SUFFIX } else { stem };

    let mut candidate = dir.join(format!("{stem}_{OUTPUT_SUFFIX}.{extension}"));
    let mut index = 1_u32;
    loop {
        match fs::metadata(&candidate) {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(candidate),
            Err(source) => {
                return Err(ConvertError::OutputPath {
                    path: candidate,
                    source,
                })
            }
        }
        candidate = dir.join(format!("{stem}_{OUTPUT_SUFFIX}_{index}.{extension}"));
        index += 1;
    }
}

/// What the caller asked for, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub source: PathBuf,
    pub target: String,
    pub speed: Option<f64>,
}

impl ConversionRequest {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            speed: None,
        }
    }

    pub fn with_speed(mut self, speed: Option<f64>) -> Self {
        self.speed = speed;
        self
    }
}

/// A validated ffmpeg invocation ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    pub source: MediaInfo,
    pub target: TargetFormat,
    pub output: PathBuf,
    pub args: Vec<OsString>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub source: MediaInfo,
    pub output: MediaInfo,
    pub target: String,
}

/// Turns requests into plans. Never launches ffmpeg.
#[derive(Debug, Clone)]
pub struct Planner {
    prober: Prober,
}

impl Planner {
    pub fn new(prober: Prober) -> Self {
        Self { prober }
    }

    pub fn plan(&self, request: &ConversionRequest) -> Result<ConversionPlan, ConvertError> {
        let source = self.prober.load_media_info(&request.source)?;
        let target = TargetFormat::parse(&request.target)?;
        if target != TargetFormat::Mp4 && request.speed.is_some() {
            debug!("Playback speed only applies to mp4, ignoring it for {target}");
        }

        let output = unique_output_path(&source.path, target.as_str())?;
        let args = build_arguments(&source, target, request.speed, &output)?;

        Ok(ConversionPlan {
            source,
            target,
            output,
            args,
        })
    }
}

/// Runs plans with ffmpeg and inspects what they produced.
#[derive(Debug, Clone)]
pub struct Executor {
    prober: Prober,
}

impl Executor {
    pub fn new(prober: Prober) -> Self {
        Self { prober }
    }

    pub fn execute(&self, plan: &ConversionPlan) -> Result<ConversionResult, ConvertError> {
        let env = self.prober.env();
        let ffmpeg = env.resolve(CODEC_TOOL).map_err(ConvertError::ToolNotFound)?;
        debug!("Running {}", describe_command(&ffmpeg, &plan.args));

        let output = capture_output(env.command(&ffmpeg).args(&plan.args))
            .map_err(ConvertError::Launch)?;
        if !output.status.success() {
            return Err(ConvertError::Failed {
                status: output.status,
                output: combined_text(&output),
            });
        }
        info!(
            "Converted {} to {}",
            plan.source.path.display(),
            plan.output.display()
        );

        let output_info = self.prober.load_media_info(&plan.output).map_err(|source| {
            ConvertError::OutputInspection {
                path: plan.output.clone(),
                source,
            }
        })?;
        Ok(ConversionResult {
            source: plan.source.clone(),
            output: output_info,
            target: plan.target.as_str().to_string(),
        })
    }
}
