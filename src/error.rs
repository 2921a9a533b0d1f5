//! Error types for provisioning, probing and conversion.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

use crate::tooling::MediaKind;

/// Failures while locating, downloading or verifying the FFmpeg toolkit.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("{os} {arch} not supported; use x64 build")]
    UnsupportedArchitecture { os: String, arch: String },

    #[error("failed to get cache dir")]
    CacheDirUnavailable,

    #[error("invalid download url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("failed to create cache dir {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        source: Box<ureq::Error>,
    },

    #[error("download interrupted for {url}: {source}")]
    Transfer { url: String, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read archive {path}: {source}")]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("archive entry escapes the target directory: {name}")]
    UnsafeEntry { name: String },

    #[error("extract {name} failed: {source}")]
    Extract { name: String, source: io::Error },

    #[error("{name} was not found in the archive (expected at {path})")]
    MissingExecutable { name: String, path: PathBuf },

    #[error("chmod failed for {path}: {source}")]
    Permissions { path: PathBuf, source: io::Error },

    #[error("failed to launch {path}: {source}")]
    Launch { path: PathBuf, source: io::Error },

    #[error("{name} verify failed: {status}; output: {output}")]
    Verify {
        name: String,
        status: ExitStatus,
        output: String,
    },

    #[error("failed to write install flag {path}: {source}")]
    Marker { path: PathBuf, source: io::Error },
}

/// Failures while inspecting a media file.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf, source: io::Error },

    #[error("stat file {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },

    #[error("expected a file but got a directory: {path}")]
    NotAFile { path: PathBuf },

    #[error("{tool} was not found in the tool search path: {source}")]
    ToolNotFound {
        tool: &'static str,
        source: which::Error,
    },

    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: &'static str,
        source: io::Error,
    },

    #[error("ffprobe failed: {}", failure_text(.status, .output))]
    ProbeFailed { status: ExitStatus, output: String },

    #[error("parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported media: no audio or video stream")]
    NoMediaStreams,
}

/// Failures while validating, planning or running a conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Source(#[from] MediaError),

    #[error("invalid target format")]
    EmptyFormat,

    #[error("unsupported target format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot convert {kind} to {format}")]
    KindMismatch { kind: MediaKind, format: String },

    #[error("unsupported playback speed: {0}")]
    UnsupportedSpeed(f64),

    #[error("check output path {path}: {source}")]
    OutputPath { path: PathBuf, source: io::Error },

    #[error("ffmpeg was not found in the tool search path: {0}")]
    ToolNotFound(#[source] which::Error),

    #[error("failed to launch ffmpeg: {0}")]
    Launch(#[source] io::Error),

    #[error("ffmpeg failed: {}", failure_text(.status, .output))]
    Failed { status: ExitStatus, output: String },

    #[error("conversion succeeded but inspecting output failed: {source}")]
    OutputInspection { path: PathBuf, source: MediaError },
}

impl ConvertError {
    /// Whether the request itself was rejected before ffmpeg ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyFormat
                | Self::UnsupportedFormat(_)
                | Self::KindMismatch { .. }
                | Self::UnsupportedSpeed(_)
        )
    }
}

/// Failures while loading or validating the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Errors surfaced by the caller-facing commands.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("resolve path: {0}")]
    ResolvePath(#[source] io::Error),

    #[error("stat path: {0}")]
    StatPath(#[source] io::Error),

    #[error("open path: {0}")]
    OpenPath(#[source] io::Error),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

fn failure_text(status: &ExitStatus, output: &str) -> String {
    if output.is_empty() {
        status.to_string()
    } else {
        format!("{status}; {output}")
    }
}
