//! Full sessions against a real data directory.

use prompt_gallery::backend::{AppContext, Delivery, Notifier};
use prompt_gallery::composer::ComposeOutcome;
use prompt_gallery::config::{self, GalleryConfig};
use prompt_gallery::fs_backend::{FileSink, FsBackend};
use prompt_gallery::gallery::Gallery;
use prompt_gallery::png_text::PngTextDecoder;
use prompt_gallery::registry::UpsertOutcome;
use prompt_gallery::types::Severity;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct Notices(Mutex<Vec<(Severity, String)>>);

impl Notices {
    fn summaries(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }
}

impl Notifier for Notices {
    fn notify(&self, severity: Severity, summary: &str, _detail: &str) {
        self.0.lock().unwrap().push((severity, summary.to_string()));
    }
}

const CONFIG: &str = r#"
[[sources]]
name = "poses.yaml"
category = "Poses"
order = 2

[[sources]]
name = "body.yaml"
category = "Female Body"
order = 1
sections = [{ key = "body_race", label = "Race" }]

[[sources]]
name = "missing.yaml"
category = "Scenes"
order = 3
"#;

const POSES: &str = "\
poses:
  standing:
    wave.png:
      - waving, hand up
    SKIP:
      - placeholder
  sitting:
    chair.png:
      - sitting on chair BREAK indoors
";

const BODY: &str = "\
body:
  body_race:
    elf.png:
      - elf, pointy ears
  body_misc:
    tall.png:
      - tall
";

fn data_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(config::CONFIG_FILENAME), CONFIG).unwrap();
    fs::write(tmp.path().join("poses.yaml"), POSES).unwrap();
    fs::write(tmp.path().join("body.yaml"), BODY).unwrap();
    tmp
}

fn context(dir: &Path, target: &Path, notices: &Arc<Notices>) -> (GalleryConfig, AppContext) {
    let config = config::load_config(dir).unwrap();
    let backend = Arc::new(FsBackend::new(dir, config.persistence.state_file.clone()));
    let ctx = AppContext {
        sources: backend.clone(),
        storage: backend.clone(),
        decoder: Arc::new(PngTextDecoder),
        persistence: backend,
        sink: Arc::new(FileSink::new(Some(target.to_path_buf()))),
        notifier: notices.clone(),
    };
    (config, ctx)
}

/// PNG with a `prompt` text chunk holding a one-node graph.
fn tagged_png(tags: &str) -> Vec<u8> {
    let prompt = format!(r#"{{"6": {{"class_type": "CLIPTextEncode", "inputs": {{"text": "{tags}"}}}}}}"#);
    let mut body = b"prompt\0".to_vec();
    body.extend_from_slice(prompt.as_bytes());

    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    for (kind, data) in [(&b"tEXt"[..], body), (&b"IEND"[..], Vec::new())] {
        png.extend_from_slice(&(data.len() as u32).to_be_bytes());
        png.extend_from_slice(kind);
        png.extend_from_slice(&data);
        png.extend_from_slice(&[0, 0, 0, 0]);
    }
    png
}

#[tokio::test]
async fn browse_upload_compose_and_reopen() {
    let dir = data_dir();
    let target = dir.path().join("prompt.txt");
    let notices = Arc::new(Notices::default());

    let (cfg, ctx) = context(dir.path(), &target, &notices);
    let mut gallery = Gallery::open(cfg, ctx).await;

    // Catalog: missing source is negative-cached, SKIP is dropped
    assert_eq!(gallery.last_report().missing, vec!["missing.yaml"]);
    assert_eq!(gallery.catalog().entries().len(), 4);
    let labels: Vec<String> = gallery.groups("").into_iter().map(|g| g.label).collect();
    assert_eq!(labels, vec!["Female Body", "Race", "Poses", "Custom"]);

    // Search narrows every group
    let found = gallery.groups("ELF");
    let non_empty: Vec<&str> = found
        .iter()
        .filter(|g| !g.items.is_empty())
        .map(|g| g.label.as_str())
        .collect();
    assert_eq!(non_empty, vec!["Race"]);

    // Upload a custom image with an embedded prompt
    let added = gallery
        .add_custom_asset("mine.png", &tagged_png("smile ,, looking at viewer"))
        .await
        .unwrap();
    assert_eq!(added.upsert, UpsertOutcome::Added);
    assert_eq!(added.asset.tag_text.as_deref(), Some("smile, looking at viewer"));
    assert!(dir.path().join("custom/mine.png").is_file());

    // Copy one image's tags
    let delivery = gallery.copy_tags("chair.png").await.unwrap();
    assert_eq!(delivery, Delivery::DeliveredToTarget);
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "sitting on chair. indoors\n"
    );

    // Random prompt from Poses + Custom
    gallery.set_category_included("Custom", true).await;
    gallery.set_category_included("Race", true).await;
    gallery.set_category_included("Female Body", true).await;
    let (outcome, _) = gallery.compose_random(&mut StdRng::seed_from_u64(3)).await;
    let ComposeOutcome::Composed { text, picks } = &outcome else {
        panic!("expected a composition, got {outcome:?}");
    };
    let cats: Vec<&str> = picks.iter().map(|p| p.category.as_str()).collect();
    assert_eq!(cats, vec!["Female Body", "Custom"]);
    assert!(text.ends_with(", smile, looking at viewer"));

    gallery.toggle_sort().await;
    assert!(gallery.close().await);
    assert!(notices.summaries().contains(&"Upload Successful".to_string()));

    // Second session sees the saved state
    let notices = Arc::new(Notices::default());
    let (cfg, ctx) = context(dir.path(), &target, &notices);
    let gallery = Gallery::open(cfg, ctx).await;
    let state = gallery.state();
    assert!(!state.sort_ascending);
    assert_eq!(state.custom_assets.len(), 1);
    assert!(state.is_included("Custom"));
    assert!(state.missing_source_files.contains("missing.yaml"));
    let poses = gallery
        .groups("")
        .into_iter()
        .find(|g| g.label == "Poses")
        .unwrap();
    let names: Vec<&str> = poses.items.iter().map(|i| i.name()).collect();
    assert_eq!(names, vec!["wave.png", "chair.png"]);
}

#[tokio::test]
async fn empty_data_dir_warns_once_dismissed() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("prompt.txt");

    let notices = Arc::new(Notices::default());
    let (cfg, ctx) = context(dir.path(), &target, &notices);
    let mut gallery = Gallery::open(cfg, ctx).await;
    assert!(notices.summaries().contains(&"No Prompt Images Found".to_string()));
    gallery.dismiss_notice().await;
    assert!(gallery.close().await);

    let notices = Arc::new(Notices::default());
    let (cfg, ctx) = context(dir.path(), &target, &notices);
    let _gallery = Gallery::open(cfg, ctx).await;
    assert!(notices.summaries().is_empty());
}

#[tokio::test]
async fn corrupt_state_file_falls_back_to_defaults() {
    let dir = data_dir();
    fs::write(dir.path().join("gallery-state.json"), "{ not json").unwrap();
    let target = dir.path().join("prompt.txt");
    let notices = Arc::new(Notices::default());
    let (cfg, ctx) = context(dir.path(), &target, &notices);
    let gallery = Gallery::open(cfg, ctx).await;
    assert!(gallery.state().sort_ascending);
    assert!(gallery.state().custom_assets.is_empty());
}
