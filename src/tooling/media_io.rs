// ffprobe invocation, stream classification and media info assembly.
use super::*;

/// Broad classification of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `codec_type` tag ffprobe reports for each stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ProbeDocument {
    #[serde(default)]
    pub(super) format: ProbeFormat,
    #[serde(default)]
    pub(super) streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct ProbeFormat {
    #[serde(default)]
    pub(super) duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ProbeStream {
    #[serde(default)]
    pub(super) codec_type: StreamKind,
}

/// What a single probe learns about a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSummary {
    pub kind: MediaKind,
    /// Seconds; `0.0` when unknown.
    pub duration: f64,
    pub has_audio: bool,
}

impl ProbeSummary {
    pub(super) fn from_document(document: &ProbeDocument) -> Result<Self, MediaError> {
        let (kind, has_audio) = classify_streams(&document.streams)?;
        let duration = document
            .format
            .duration
            .as_deref()
            .map(parse_duration)
            .unwrap_or(0.0);
        Ok(Self {
            kind,
            duration,
            has_audio,
        })
    }
}

/// Any video stream makes the file a video; otherwise any audio stream makes
/// it audio. Returns the kind together with whether an audio stream exists.
pub(super) fn classify_streams(streams: &[ProbeStream]) -> Result<(MediaKind, bool), MediaError> {
    let mut has_video = false;
    let mut has_audio = false;
    for stream in streams {
        match stream.codec_type {
            StreamKind::Video => has_video = true,
            StreamKind::Audio => has_audio = true,
            StreamKind::Subtitle | StreamKind::Data | StreamKind::Attachment | StreamKind::Other => {}
        }
    }
    let kind = match (has_video, has_audio) {
        (true, _) => MediaKind::Video,
        (false, true) => MediaKind::Audio,
        (false, false) => return Err(MediaError::NoMediaStreams),
    };
    Ok((kind, has_audio))
}

/// Unparsable durations are treated as unknown rather than as an error.
pub(super) fn parse_duration(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}

/// Description of one media file, produced fresh by every probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub path: PathBuf,
    pub name: String,
    pub kind: MediaKind,
    pub duration: f64,
    pub size: u64,
    pub has_audio: bool,
}

/// Runs ffprobe through a [`ToolEnv`].
#[derive(Debug, Clone)]
pub struct Prober {
    env: ToolEnv,
}

impl Prober {
    pub fn new(env: ToolEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &ToolEnv {
        &self.env
    }

    /// Probes `path` for its media kind, duration and audio presence.
    pub fn probe(&self, path: &Path) -> Result<ProbeSummary, MediaError> {
        let ffprobe = self
            .env
            .resolve(PROBE_TOOL)
            .map_err(|source| MediaError::ToolNotFound {
                tool: PROBE_TOOL,
                source,
            })?;
        debug!("Probing {} with {}", path.display(), ffprobe.display());

        let output = capture_output(
            self.env
                .command(&ffprobe)
                .args(["-v", "error", "-show_streams", "-show_format", "-of", "json"])
                .arg(path),
        )
        .map_err(|source| MediaError::Launch {
            tool: PROBE_TOOL,
            source,
        })?;

        if !output.status.success() {
            return Err(MediaError::ProbeFailed {
                status: output.status,
                output: combined_text(&output),
            });
        }

        let document: ProbeDocument = serde_json::from_slice(&output.stdout)?;
        ProbeSummary::from_document(&document)
    }

    /// Stats `path`, probes it and assembles a [`MediaInfo`].
    pub fn load_media_info(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        let metadata = fs::metadata(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                MediaError::NotFound {
                    path: path.to_path_buf(),
                    source,
                }
            } else {
                MediaError::Stat {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        if metadata.is_dir() {
            return Err(MediaError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        let summary = self.probe(path)?;
        let name = path
            .file_name()
            .map(|value| value.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Ok(MediaInfo {
            path: path.to_path_buf(),
            name,
            kind: summary.kind,
            duration: if summary.duration > 0.0 {
                summary.duration
            } else {
                0.0
            },
            size: metadata.len(),
            has_audio: summary.has_audio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(json: &str) -> ProbeDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_video_wins_over_audio() {
        let doc = document(
            r#"{
                "format": { "filename": "clip.mkv", "duration": "12.5" },
                "streams": [
                    { "index": 0, "codec_type": "audio", "codec_name": "aac" },
                    { "index": 1, "codec_type": "video", "codec_name": "h264" }
                ]
            }"#,
        );
        let summary = ProbeSummary::from_document(&doc).unwrap();
        assert_eq!(summary.kind, MediaKind::Video);
        assert!(summary.has_audio);
        assert!((summary.duration - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_audio_only_streams() {
        let doc = document(
            r#"{
                "format": { "duration": "180.000000" },
                "streams": [
                    { "codec_type": "audio" },
                    { "codec_type": "audio" }
                ]
            }"#,
        );
        let summary = ProbeSummary::from_document(&doc).unwrap();
        assert_eq!(summary.kind, MediaKind::Audio);
        assert!(summary.has_audio);
    }

    #[test]
    fn test_video_without_audio() {
        let doc = document(r#"{ "format": {}, "streams": [ { "codec_type": "video" } ] }"#);
        let summary = ProbeSummary::from_document(&doc).unwrap();
        assert_eq!(summary.kind, MediaKind::Video);
        assert!(!summary.has_audio);
        assert_eq!(summary.duration, 0.0);
    }

    #[test]
    fn test_empty_stream_list_is_an_error() {
        let doc = document(r#"{ "format": { "duration": "3.0" }, "streams": [] }"#);
        assert!(matches!(
            ProbeSummary::from_document(&doc),
            Err(MediaError::NoMediaStreams)
        ));
    }

    #[test]
    fn test_unknown_stream_types_do_not_classify() {
        let doc = document(
            r#"{ "streams": [ { "codec_type": "subtitle" }, { "codec_type": "timecode" }, {} ] }"#,
        );
        assert_eq!(doc.streams[1].codec_type, StreamKind::Other);
        assert_eq!(doc.streams[2].codec_type, StreamKind::Other);
        let error = ProbeSummary::from_document(&doc).unwrap_err();
        assert_eq!(error.to_string(), "unsupported media: no audio or video stream");
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("12.5"), 12.5);
        assert_eq!(parse_duration("N/A"), 0.0);
        assert_eq!(parse_duration(""), 0.0);
        assert_eq!(parse_duration("-4"), 0.0);
        assert_eq!(parse_duration("0"), 0.0);
        assert_eq!(parse_duration("inf"), 0.0);
    }

    #[test]
    fn test_media_info_serializes_camel_case() {
        let info = MediaInfo {
            path: PathBuf::from("/media/clip.mp4"),
            name: "clip.mp4".to_string(),
            kind: MediaKind::Video,
            duration: 10.0,
            size: 2048,
            has_audio: true,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["kind"], "video");
        assert_eq!(json["hasAudio"], true);
        assert_eq!(json["name"], "clip.mp4");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let prober = Prober::new(ToolEnv::from_dir(dir.path()));
        let error = prober
            .load_media_info(&dir.path().join("missing.mp4"))
            .unwrap_err();
        assert!(matches!(error, MediaError::NotFound { .. }));
        assert!(error.to_string().starts_with("file not found"));
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let prober = Prober::new(ToolEnv::from_dir(dir.path()));
        let error = prober.load_media_info(dir.path()).unwrap_err();
        assert!(matches!(error, MediaError::NotAFile { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_media_info_with_stub_probe() {
        let tools = tempfile::tempdir().unwrap();
        test_support::write_script(
            tools.path(),
            "ffprobe",
            r#"echo '{"format":{"duration":"10.0"},"streams":[{"codec_type":"video"},{"codec_type":"audio"}]}'"#,
        );
        let media = tempfile::tempdir().unwrap();
        let clip = media.path().join("clip.mov");
        fs::write(&clip, vec![0_u8; 64]).unwrap();

        let prober = Prober::new(ToolEnv::from_dir(tools.path()));
        let info = prober.load_media_info(&clip).unwrap();
        assert_eq!(info.name, "clip.mov");
        assert_eq!(info.kind, MediaKind::Video);
        assert!(info.has_audio);
        assert_eq!(info.size, 64);
        assert_eq!(info.duration, 10.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_failure_carries_output() {
        let tools = tempfile::tempdir().unwrap();
        test_support::write_script(
            tools.path(),
            "ffprobe",
            "echo 'clip.bin: Invalid data found when processing input' >&2\nexit 1",
        );
        let media = tempfile::tempdir().unwrap();
        let clip = media.path().join("clip.bin");
        fs::write(&clip, b"garbage").unwrap();

        let prober = Prober::new(ToolEnv::from_dir(tools.path()));
        let error = prober.probe(&clip).unwrap_err();
        match &error {
            MediaError::ProbeFailed { output, .. } => {
                assert!(output.contains("Invalid data found"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(error.to_string().starts_with("ffprobe failed: "));
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_probe_output() {
        let tools = tempfile::tempdir().unwrap();
        test_support::write_script(tools.path(), "ffprobe", "echo 'not json'");
        let media = tempfile::tempdir().unwrap();
        let clip = media.path().join("clip.wav");
        fs::write(&clip, b"RIFF").unwrap();

        let prober = Prober::new(ToolEnv::from_dir(tools.path()));
        assert!(matches!(prober.probe(&clip), Err(MediaError::Parse(_))));
    }
}
