use std::path::Path;
use std::process::Command;

use doreveal_lib::{convert_media, inspect_media, tools_status, MediaKind, ToolEnv, ToolkitSettings};

fn system_tools() -> Option<ToolEnv> {
    let env = ToolEnv::system();
    if env.resolve("ffmpeg").is_err() || env.resolve("ffprobe").is_err() {
        eprintln!("ffmpeg/ffprobe not installed, skipping");
        return None;
    }
    Some(env)
}

fn has_encoder(env: &ToolEnv, name: &str) -> bool {
    let ffmpeg = env.resolve("ffmpeg").unwrap();
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .any(|token| token == name)
}

fn make_clip(env: &ToolEnv, path: &Path) {
    let ffmpeg = env.resolve("ffmpeg").unwrap();
    let status = Command::new(ffmpeg)
        .args(["-v", "error", "-y"])
        .args(["-f", "lavfi", "-i", "testsrc=duration=10:size=160x120:rate=10"])
        .args(["-f", "lavfi", "-i", "sine=frequency=440:duration=10"])
        .args(["-c:v", "mpeg4", "-c:a", "pcm_s16le", "-shortest"])
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success(), "failed to generate test clip");
}

#[test]
fn inspect_and_extract_audio() {
    let Some(env) = system_tools() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("sample.avi");
    make_clip(&env, &clip);

    let info = inspect_media(&env, &clip.to_string_lossy()).unwrap();
    assert_eq!(info.kind, MediaKind::Video);
    assert!(info.has_audio);
    assert!((info.duration - 10.0).abs() < 0.5, "duration was {}", info.duration);
    assert_eq!(info.name, "sample.avi");

    let result = convert_media(&env, &clip.to_string_lossy(), ".M4A", None).unwrap();
    assert_eq!(result.target, "m4a");
    assert_eq!(result.output.path, dir.path().join("sample_converted.m4a"));
    assert_eq!(result.output.kind, MediaKind::Audio);
    assert!(result.output.has_audio);

    // A second run must not overwrite the first output.
    let again = convert_media(&env, &clip.to_string_lossy(), "m4a", None).unwrap();
    assert_eq!(again.output.path, dir.path().join("sample_converted_1.m4a"));
}

#[test]
fn mp4_at_one_and_a_half_speed() {
    let Some(env) = system_tools() else {
        return;
    };
    if !has_encoder(&env, "libx264") {
        eprintln!("ffmpeg built without libx264, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("sample.avi");
    make_clip(&env, &clip);

    let result = convert_media(&env, &clip.to_string_lossy(), "mp4", Some(1.5)).unwrap();
    assert_eq!(result.target, "mp4");
    assert_eq!(result.output.path, dir.path().join("sample_converted.mp4"));
    assert_eq!(result.output.kind, MediaKind::Video);
    assert!(result.output.has_audio);
    let expected = 10.0 / 1.5;
    assert!(
        (result.output.duration - expected).abs() < 0.5,
        "duration was {}",
        result.output.duration
    );
}

#[test]
fn video_to_mp3_is_rejected() {
    let Some(env) = system_tools() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("sample.avi");
    make_clip(&env, &clip);

    let error = convert_media(&env, &clip.to_string_lossy(), "mp3", None).unwrap_err();
    assert_eq!(error.to_string(), "cannot convert video to mp3");
    assert!(!dir.path().join("sample_converted.mp3").exists());
}

#[test]
fn status_reports_system_tools() {
    let Some(env) = system_tools() else {
        return;
    };
    let status = tools_status(&env, &ToolkitSettings::default());
    assert!(status.ffmpeg.available);
    assert!(status.ffprobe.available);
    assert!(status.bin_dir.is_none());
}
