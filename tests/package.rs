//! Datapack assembly tests: namespace rules, the frame chain, script text
//! and the on-disk package layout.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use serde_json::Value;
use video2datapack::{
    ChainLink, ConvertOptions, FrameChain, FrameSequence, PackError, PackageAssembler,
    PackageDescriptor, PackageLayout, ParticleOptions, entry_script, frame_script, render_command,
    validate_namespace,
};

fn write_frames(dir: &Path, namespace: &str, count: usize) -> FrameSequence {
    fs::create_dir_all(dir).expect("Failed to create frames dir");
    for number in 1..=count {
        let shade = (number * 40 % 256) as u8;
        let image = RgbaImage::from_pixel(4, 3, Rgba([shade, 0, 255 - shade, 255]));
        image
            .save(dir.join(format!("{namespace}_{number:06}.png")))
            .expect("Failed to write frame");
    }
    FrameSequence::scan(dir, namespace).expect("Failed to scan frames")
}

fn options_for(image_dir: &Path) -> ConvertOptions {
    ConvertOptions::new().with_image_dest_dir(image_dir)
}

fn script_files(functions_dir: &Path) -> BTreeSet<String> {
    fs::read_dir(functions_dir)
        .expect("Failed to list functions")
        .map(|entry| {
            entry
                .expect("Failed to read entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

// ── Namespace validation ─────────────────────────────────────────

#[test]
fn namespace_accepts_engine_characters() {
    for namespace in ["videopack", "clip_2", "my-video", "a.b", "0"] {
        validate_namespace(namespace).expect("namespace should be valid");
    }
}

#[test]
fn namespace_rejects_invalid() {
    for namespace in ["", "Video", "my video", "clip/evil", "ñ", "a:b", "..", "."] {
        assert!(
            matches!(
                validate_namespace(namespace),
                Err(PackError::InvalidNamespace { .. })
            ),
            "{namespace:?} should be rejected"
        );
    }
}

// ── Frame chain ──────────────────────────────────────────────────

#[test]
fn chain_links_forward_and_terminates() {
    let chain = FrameChain::new(3);
    let links: Vec<ChainLink> = chain.links().collect();
    assert_eq!(
        links,
        vec![
            ChainLink {
                index: 0,
                next: Some(1)
            },
            ChainLink {
                index: 1,
                next: Some(2)
            },
            ChainLink {
                index: 2,
                next: None
            },
        ]
    );
    assert!(links[2].is_terminal());
    assert!(chain.link(3).is_none());
}

#[test]
fn single_frame_chain_is_terminal() {
    let chain = FrameChain::new(1);
    let link = chain.link(0).expect("one link");
    assert!(link.is_terminal());
}

#[test]
fn empty_chain_has_no_links() {
    let chain = FrameChain::new(0);
    assert!(chain.is_empty());
    assert_eq!(chain.links().count(), 0);
}

// ── Script text ──────────────────────────────────────────────────

#[test]
fn command_uses_default_particle_settings() {
    assert_eq!(
        render_command(&ParticleOptions::new(), "clip_000001.png"),
        "particleex image minecraft:end_rod ~ ~1 ~ clip_000001.png 0.3 0 0 0 not 10.0 0 0 0 1 \"vy=0\" 1.0 null"
    );
}

#[test]
fn command_reflects_custom_particle() {
    let particle = ParticleOptions::new()
        .with_particle_id("minecraft:flame")
        .with_scale(1.0)
        .with_density(2.5)
        .with_lifetime_ticks(4)
        .with_group("intro");
    let command = render_command(&particle, "f.png");
    assert_eq!(
        command,
        "particleex image minecraft:flame ~ ~1 ~ f.png 1.0 0 0 0 not 2.5 0 0 0 4 \"vy=0\" 1.0 intro"
    );
}

#[test]
fn frame_script_schedules_next() {
    let link = FrameChain::new(2).link(0).expect("link");
    let script = frame_script("clip", link, "clip_000001.png", &ParticleOptions::new(), 1);
    assert_eq!(
        script,
        "execute positioned ~ ~ ~ run particleex image minecraft:end_rod ~ ~1 ~ clip_000001.png 0.3 0 0 0 not 10.0 0 0 0 1 \"vy=0\" 1.0 null\n\
         schedule function clip:clip_1 1t\n"
    );
}

#[test]
fn terminal_frame_script_has_no_schedule() {
    let link = FrameChain::new(2).link(1).expect("link");
    let script = frame_script("clip", link, "clip_000002.png", &ParticleOptions::new(), 1);
    assert!(!script.contains("schedule"));
    assert_eq!(script.lines().count(), 1);
}

#[test]
fn schedule_delay_is_configurable() {
    let link = FrameChain::new(2).link(0).expect("link");
    let script = frame_script("clip", link, "a.png", &ParticleOptions::new(), 3);
    assert!(script.ends_with("schedule function clip:clip_1 3t\n"));
}

#[test]
fn entry_script_starts_at_frame_zero() {
    assert_eq!(entry_script("videopack"), "function videopack:videopack_0\n");
}

// ── Descriptor and layout ────────────────────────────────────────

#[test]
fn descriptor_metadata_json() {
    let descriptor = PackageDescriptor::new("clip", 6);
    let text = descriptor.metadata_json().expect("Failed to serialize");
    assert!(text.contains('\n'), "metadata should be pretty printed");

    let value: Value = serde_json::from_str(&text).expect("valid JSON");
    assert_eq!(value["pack"]["pack_format"], 6);
    assert_eq!(
        value["pack"]["description"],
        "Video particle animation (clip)"
    );
}

#[test]
fn layout_paths() {
    let layout = PackageLayout::new(Path::new("out"), "clip");
    assert_eq!(layout.root(), Path::new("out/clip"));
    assert_eq!(layout.metadata_path(), PathBuf::from("out/clip/pack.mcmeta"));
    assert_eq!(
        layout.functions_dir(),
        PathBuf::from("out/clip/data/clip/functions")
    );
    assert_eq!(
        layout.entry_script_path(),
        PathBuf::from("out/clip/data/clip/functions/main.mcfunction")
    );
    assert_eq!(
        layout.frame_script_path(7),
        PathBuf::from("out/clip/data/clip/functions/clip_7.mcfunction")
    );
}

// ── Assembler ────────────────────────────────────────────────────

#[test]
fn assemble_writes_one_script_per_frame() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let frames = write_frames(&dir.path().join("frames"), "clip", 4);
    let image_dir = dir.path().join("particleImages");
    let options = options_for(&image_dir);

    let package = PackageAssembler::new(&options)
        .assemble(&frames, "clip", dir.path())
        .expect("Failed to assemble");

    assert_eq!(package.frame_count, 4);
    let functions_dir = package.layout.functions_dir();
    let expected: BTreeSet<String> = [
        "main.mcfunction",
        "clip_0.mcfunction",
        "clip_1.mcfunction",
        "clip_2.mcfunction",
        "clip_3.mcfunction",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(script_files(&functions_dir), expected);

    let mut schedule_lines = 0;
    for index in 0..4 {
        let script = fs::read_to_string(package.layout.frame_script_path(index))
            .expect("Failed to read script");
        assert!(script.contains(&format!("clip_{:06}.png", index + 1)));
        for line in script.lines().filter(|l| l.starts_with("schedule")) {
            schedule_lines += 1;
            assert_eq!(line, format!("schedule function clip:clip_{} 1t", index + 1));
        }
    }
    assert_eq!(schedule_lines, 3);

    let entry = fs::read_to_string(package.layout.entry_script_path()).expect("Failed to read");
    assert_eq!(entry, "function clip:clip_0\n");

    let metadata: Value = serde_json::from_str(
        &fs::read_to_string(package.layout.metadata_path()).expect("Failed to read metadata"),
    )
    .expect("valid JSON");
    assert_eq!(metadata["pack"]["pack_format"], 6);
}

#[test]
fn assemble_copies_images_to_destination() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let frames = write_frames(&dir.path().join("frames"), "clip", 2);
    let image_dir = dir.path().join("nested").join("particleImages");
    let options = options_for(&image_dir);

    PackageAssembler::new(&options)
        .assemble(&frames, "clip", dir.path())
        .expect("Failed to assemble");

    for frame in &frames {
        let copied = image_dir.join(frame.file_name());
        assert_eq!(
            fs::read(&copied).expect("copied image exists"),
            fs::read(&frame.path).expect("source image exists")
        );
    }
}

#[test]
fn assemble_without_frames_writes_nothing() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let image_dir = dir.path().join("particleImages");
    let options = options_for(&image_dir);

    let result = PackageAssembler::new(&options).assemble(&FrameSequence::default(), "clip", dir.path());

    assert!(matches!(result, Err(PackError::NothingToPackage(_))));
    assert!(!dir.path().join("clip").exists());
    assert!(!image_dir.exists());
}

#[test]
fn assemble_rejects_bad_namespace() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let frames = write_frames(&dir.path().join("frames"), "Clip", 1);
    let options = options_for(&dir.path().join("particleImages"));

    let result = PackageAssembler::new(&options).assemble(&frames, "Clip", dir.path());
    assert!(matches!(result, Err(PackError::InvalidNamespace { .. })));
    assert!(!dir.path().join("Clip").exists());
}

#[test]
fn reassembling_removes_stale_scripts() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let options = options_for(&dir.path().join("particleImages"));
    let assembler = PackageAssembler::new(&options);

    let long = write_frames(&dir.path().join("long"), "clip", 5);
    assembler
        .assemble(&long, "clip", dir.path())
        .expect("Failed to assemble");

    let short = write_frames(&dir.path().join("short"), "clip", 2);
    let package = assembler
        .assemble(&short, "clip", dir.path())
        .expect("Failed to reassemble");

    let scripts = script_files(&package.layout.functions_dir());
    assert_eq!(scripts.len(), 3, "main plus two frames: {scripts:?}");
    assert!(!scripts.contains("clip_2.mcfunction"));

    let last = fs::read_to_string(package.layout.frame_script_path(1)).expect("Failed to read");
    assert!(!last.contains("schedule"));
}

#[test]
fn reassembling_is_deterministic() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let frames = write_frames(&dir.path().join("frames"), "clip", 3);
    let options = options_for(&dir.path().join("particleImages"));
    let assembler = PackageAssembler::new(&options);

    let read_all = |package: &video2datapack::AssembledPackage| -> Vec<String> {
        (0..package.frame_count)
            .map(|i| {
                fs::read_to_string(package.layout.frame_script_path(i)).expect("Failed to read")
            })
            .collect()
    };

    let first = assembler
        .assemble(&frames, "clip", dir.path())
        .expect("Failed to assemble");
    let first_scripts = read_all(&first);
    let second = assembler
        .assemble(&frames, "clip", dir.path())
        .expect("Failed to reassemble");

    assert_eq!(first.frame_count, second.frame_count);
    assert_eq!(first_scripts, read_all(&second));
}
