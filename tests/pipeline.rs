//! End-to-end conversion tests.
//!
//! A shell script stands in for ffmpeg: called with three arguments it acts
//! like an introspection run (stream info on stderr, exit 1); otherwise it
//! copies prepared frames into the directory of its last argument. Tests
//! that need a real ffmpeg return early when none is installed.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use video2datapack::{
    ConvertOptions, Converter, Decoder, DecoderSource, PackError, Resolution, locate_decoder,
    read_archive_entries,
};

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
    video: PathBuf,
    image_dir: PathBuf,
    decoder: Decoder,
}

fn workspace(namespace: &str, frames: usize, probe_line: &str) -> Workspace {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().join("out");
    fs::create_dir_all(&root).expect("Failed to create output root");

    let video = dir.path().join("input.mp4");
    fs::write(&video, b"not really a video").expect("Failed to write video");

    let source = dir.path().join("source-frames");
    fs::create_dir_all(&source).expect("Failed to create source frames");
    for number in 1..=frames {
        RgbaImage::from_fn(16, 9, |x, y| {
            Rgba([(x * 16) as u8, (y * 28) as u8, (number * 50 % 256) as u8, 255])
        })
        .save(source.join(format!("{namespace}_{number:06}.png")))
        .expect("Failed to write frame");
    }

    let script = dir.path().join("fake-ffmpeg");
    let body = format!(
        "#!/bin/sh\n\
         if [ \"$#\" -le 3 ]; then\n\
         \techo \"Input #0, mov,mp4, from 'input.mp4':\" >&2\n\
         \techo \"{probe_line}\" >&2\n\
         \texit 1\n\
         fi\n\
         for last; do :; done\n\
         out=$(dirname \"$last\")\n\
         for f in '{source}'/*.png; do [ -e \"$f\" ] && cp \"$f\" \"$out\"/; done\n\
         exit 0\n",
        source = source.display()
    );
    fs::write(&script, body).expect("Failed to write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
        .expect("Failed to mark script executable");

    Workspace {
        image_dir: dir.path().join("particleImages"),
        _dir: dir,
        root,
        video,
        decoder: Decoder::new(script),
    }
}

const HD_STREAM: &str = "  Stream #0:0: Video: h264, yuv420p, 1920x1080, 30 fps";

// ── Full conversion ──────────────────────────────────────────────

#[test]
fn converts_video_into_package_and_archive() {
    let ws = workspace("clip", 3, HD_STREAM);
    let options = ConvertOptions::new().with_image_dest_dir(&ws.image_dir);

    let report = Converter::new(&ws.decoder, &options)
        .convert(&ws.video, Some("clip"), &ws.root)
        .expect("Conversion failed");

    assert_eq!(report.namespace, "clip");
    assert_eq!(report.source, Resolution::new(1920, 1080));
    assert!(!report.used_fallback);
    assert_eq!(report.target, Resolution::new(640, 360));
    assert_eq!(report.frame_count, 3);
    assert!(!report.quantized);
    assert_eq!(report.package_root, ws.root.join("clip"));
    assert_eq!(report.archive_path, ws.root.join("clip.zip"));

    for number in 1..=3 {
        assert!(ws.image_dir.join(format!("clip_{number:06}.png")).is_file());
    }

    let entries = read_archive_entries(&report.archive_path).expect("Failed to read archive");
    let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        [
            "data/clip/functions/clip_0.mcfunction",
            "data/clip/functions/clip_1.mcfunction",
            "data/clip/functions/clip_2.mcfunction",
            "data/clip/functions/main.mcfunction",
            "pack.mcmeta",
        ]
    );

    let schedules = entries
        .iter()
        .map(|(_, bytes)| String::from_utf8_lossy(bytes).matches("schedule function").count())
        .sum::<usize>();
    assert_eq!(schedules, 2);

    let summary = report.to_string();
    assert!(summary.contains("/function clip:main"));
}

#[test]
fn default_namespace_is_used() {
    let ws = workspace("videopack", 1, HD_STREAM);
    let options = ConvertOptions::new().with_image_dest_dir(&ws.image_dir);

    let report = Converter::new(&ws.decoder, &options)
        .convert(&ws.video, None, &ws.root)
        .expect("Conversion failed");

    assert_eq!(report.namespace, "videopack");
    assert!(ws.root.join("videopack.zip").is_file());
    let main = ws
        .root
        .join("videopack/data/videopack/functions/main.mcfunction");
    assert_eq!(
        fs::read_to_string(main).expect("main exists"),
        "function videopack:videopack_0\n"
    );
}

#[test]
fn unreadable_probe_falls_back_and_continues() {
    let ws = workspace("clip", 2, "no stream information here");
    let options = ConvertOptions::new().with_image_dest_dir(&ws.image_dir);

    let report = Converter::new(&ws.decoder, &options)
        .convert(&ws.video, Some("clip"), &ws.root)
        .expect("Conversion failed");

    assert!(report.used_fallback);
    assert_eq!(report.source, Resolution::FALLBACK);
    assert_eq!(report.frame_count, 2);
}

#[test]
fn quantized_conversion_limits_colors() {
    let ws = workspace("clip", 2, HD_STREAM);
    let options = ConvertOptions::new()
        .with_image_dest_dir(&ws.image_dir)
        .with_max_colors(Some(8));

    let report = Converter::new(&ws.decoder, &options)
        .convert(&ws.video, Some("clip"), &ws.root)
        .expect("Conversion failed");
    assert!(report.quantized);

    let image = image::open(ws.image_dir.join("clip_000001.png"))
        .expect("copied frame")
        .to_rgba8();
    let colors: std::collections::HashSet<[u8; 4]> = image.pixels().map(|p| p.0).collect();
    assert!(colors.len() <= 8, "got {} colors", colors.len());
}

#[test]
fn rerun_regenerates_identically() {
    let ws = workspace("clip", 3, HD_STREAM);
    let options = ConvertOptions::new().with_image_dest_dir(&ws.image_dir);
    let converter = Converter::new(&ws.decoder, &options);

    let first = converter
        .convert(&ws.video, Some("clip"), &ws.root)
        .expect("Conversion failed");
    let first_entries = read_archive_entries(&first.archive_path).expect("Failed to read");

    let second = converter
        .convert(&ws.video, Some("clip"), &ws.root)
        .expect("Second conversion failed");
    let second_entries = read_archive_entries(&second.archive_path).expect("Failed to read");

    assert_eq!(first.frame_count, second.frame_count);
    assert_eq!(first_entries, second_entries);
}

// ── Failure modes ────────────────────────────────────────────────

#[test]
fn no_frames_means_no_package() {
    let ws = workspace("clip", 0, HD_STREAM);
    let options = ConvertOptions::new().with_image_dest_dir(&ws.image_dir);

    let result = Converter::new(&ws.decoder, &options).convert(&ws.video, Some("clip"), &ws.root);

    assert!(matches!(result, Err(PackError::NothingToPackage(_))));
    assert!(!ws.root.join("clip").exists());
    assert!(!ws.root.join("clip.zip").exists());
}

#[test]
fn missing_video_is_rejected() {
    let ws = workspace("clip", 1, HD_STREAM);
    let options = ConvertOptions::new().with_image_dest_dir(&ws.image_dir);

    let result = Converter::new(&ws.decoder, &options).convert(
        &ws.root.join("missing.mp4"),
        Some("clip"),
        &ws.root,
    );
    assert!(matches!(result, Err(PackError::VideoNotFound(_))));
    assert!(!ws.root.join("frames").exists());
}

#[test]
fn invalid_namespace_is_rejected_before_work() {
    let ws = workspace("clip", 1, HD_STREAM);
    let options = ConvertOptions::new().with_image_dest_dir(&ws.image_dir);

    let result = Converter::new(&ws.decoder, &options).convert(&ws.video, Some("My Clip"), &ws.root);
    assert!(matches!(result, Err(PackError::InvalidNamespace { .. })));
    assert!(!ws.root.join("frames").exists());
}

#[test]
fn probe_reports_target_size() {
    let ws = workspace("clip", 0, HD_STREAM);
    let options = ConvertOptions::new().with_max_width(320);

    let (outcome, target) = Converter::new(&ws.decoder, &options)
        .probe(&ws.video)
        .expect("Probe failed");
    assert_eq!(outcome.resolution, Resolution::new(1920, 1080));
    assert_eq!(target, Resolution::new(320, 180));
}

// ── Real ffmpeg ──────────────────────────────────────────────────

fn sample_video_path() -> &'static Path {
    Path::new("tests/fixtures/sample_video.mp4")
}

#[test]
fn real_ffmpeg_conversion() {
    if !sample_video_path().exists() {
        return;
    }
    let Ok(decoder) = locate_decoder(&[DecoderSource::SystemInstalled]) else {
        return;
    };

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let options = ConvertOptions::new()
        .with_image_dest_dir(dir.path().join("particleImages"))
        .with_frame_rate(2)
        .with_max_width(64);
    let report = Converter::new(&decoder, &options)
        .convert(sample_video_path(), Some("sample"), dir.path())
        .expect("Conversion failed");

    assert!(report.frame_count > 0);
    assert_eq!(report.target.width, 64);
    assert!(report.archive_path.is_file());
}
