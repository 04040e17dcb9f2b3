//! Inbox event source.
//!
//! Collectors drop event files into a directory. `.json` files hold one
//! event or an array of events; `.jsonl` files hold one event per line.
//! Every event is tagged with its kind:
//!
//! ```json
//! {"kind": "product", "name": "S1A_IW_RAW__0SDV_...", "product_type": "IW_RAW__0S", ...}
//! {"kind": "datatake", "satellite_unit": "S1A", "datatake_id": "4F2A1", ...}
//! ```
//!
//! Unparseable lines and files are skipped with a warning.

use anyhow::{anyhow, bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

use datatake_completeness_core::models::{DatatakeUpdate, ProductEvent};

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboxEvent {
    Product(ProductEvent),
    Datatake(DatatakeUpdate),
}

/// Events read from one inbox file.
#[derive(Debug, Clone)]
pub struct InboxFile {
    pub relative_path: String,
    /// Seconds since the epoch.
    pub modified: i64,
    pub events: Vec<InboxEvent>,
    pub skipped: usize,
}

pub fn scan_inbox(config: &Config) -> Result<Vec<InboxFile>> {
    let inbox = config
        .inbox
        .as_ref()
        .ok_or_else(|| anyhow!("Inbox not configured"))?;

    let root = &inbox.root;
    if !root.exists() {
        bail!("Inbox root does not exist: {}", root.display());
    }

    let include_set = build_globset(&inbox.include_globs)?;
    let exclude_set = build_globset(&inbox.exclude_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(inbox.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match read_inbox_file(path, &rel_str) {
            Ok(file) => files.push(file),
            Err(e) => tracing::warn!(file = %rel_str, error = %e, "skipping unreadable inbox file"),
        }
    }

    // Deterministic replay order.
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

fn read_inbox_file(path: &Path, relative_path: &str) -> Result<InboxFile> {
    let modified = std::fs::metadata(path)?
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let text = std::fs::read_to_string(path)?;

    let jsonl = path.extension().is_some_and(|ext| ext == "jsonl");
    let (events, skipped) = if jsonl {
        parse_jsonl(&text, relative_path)
    } else {
        (parse_json(&text)?, 0)
    };

    Ok(InboxFile {
        relative_path: relative_path.to_string(),
        modified,
        events,
        skipped,
    })
}

/// A single event or an array of events.
pub fn parse_json(text: &str) -> Result<Vec<InboxEvent>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<InboxEvent>),
        One(InboxEvent),
    }

    Ok(match serde_json::from_str::<OneOrMany>(text)? {
        OneOrMany::Many(events) => events,
        OneOrMany::One(event) => vec![event],
    })
}

/// One event per non-blank line. Returns the events and the number of
/// lines that failed to parse.
pub fn parse_jsonl(text: &str, source: &str) -> (Vec<InboxEvent>, usize) {
    let mut events = Vec::new();
    let mut skipped = 0;
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InboxEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!(file = %source, line = index + 1, error = %e, "skipping malformed event");
                skipped += 1;
            }
        }
    }
    (events, skipped)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InboxConfig;
    use std::fs;

    const PRODUCT: &str = r#"{"kind": "product", "name": "S1A_IW_RAW__0SDV_1", "satellite_unit": "S1A",
        "datatake_id": "4F2A1", "product_type": "IW_RAW__0S", "sensing_duration": 25000000}"#;
    const DATATAKE: &str = r#"{"kind": "datatake", "satellite_unit": "S1A", "datatake_id": "4F2A1",
        "instrument_mode": "IW", "l0_sensing_duration": 25000000}"#;

    #[test]
    fn json_accepts_one_or_many() {
        let one = parse_json(PRODUCT).unwrap();
        assert_eq!(one.len(), 1);
        assert!(matches!(&one[0], InboxEvent::Product(p) if p.product_type.as_deref() == Some("IW_RAW__0S")));

        let many = parse_json(&format!("[{}, {}]", DATATAKE, PRODUCT)).unwrap();
        assert_eq!(many.len(), 2);
        assert!(matches!(&many[0], InboxEvent::Datatake(d) if d.datatake_id == "4F2A1"));
    }

    #[test]
    fn jsonl_skips_bad_lines() {
        let text = format!(
            "{}\n\n{{not json}}\n{}\n",
            PRODUCT.replace('\n', " "),
            DATATAKE.replace('\n', " ")
        );
        let (events, skipped) = parse_jsonl(&text, "t.jsonl");
        assert_eq!(events.len(), 2);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(parse_json(r#"{"kind": "orbit", "id": 1}"#).is_err());
    }

    #[test]
    fn scan_applies_globs_and_orders_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("b/events.jsonl"), PRODUCT.replace('\n', " ")).unwrap();
        fs::write(root.join("a.json"), DATATAKE).unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();
        fs::write(root.join("broken.json"), "{").unwrap();
        fs::write(root.join("skip.json"), PRODUCT).unwrap();

        let config: Config = toml::from_str("[db]\npath = \"x\"\n").unwrap();
        let config = Config {
            inbox: Some(InboxConfig {
                root: root.to_path_buf(),
                include_globs: vec!["**/*.json".into(), "**/*.jsonl".into()],
                exclude_globs: vec!["skip.json".into()],
                follow_symlinks: false,
            }),
            ..config
        };

        let files = scan_inbox(&config).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.json", "b/events.jsonl"]);
        assert_eq!(files[1].events.len(), 1);
    }
}
