//! Model reply in, highlighted PDFs and a batch report out.

#[path = "common/fixtures.rs"]
mod fixtures;

use fixtures::{highlight_rects, text_document, write_pangrams, FOX};
use highlight_core::naming::latest_combined_output;
use highlight_core::{
    parse_model_response, EvidenceRequest, HighlightConfig, HighlightSession, ItemStatus, MatchPass,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Chunk metadata as the retrieval layer would resolve it: (source, page).
fn chunks(dir: &TempDir) -> Vec<(PathBuf, usize)> {
    let pangrams = dir.path().join("pangrams.pdf");
    let other = dir.path().join("other.pdf");
    write_pangrams(&pangrams);
    write_pangrams(&other);
    vec![(pangrams.clone(), 0), (pangrams, 1), (other, 0)]
}

fn requests(reply: &str, chunks: &[(PathBuf, usize)]) -> Vec<EvidenceRequest> {
    parse_model_response(reply)
        .unwrap()
        .evidence
        .into_iter()
        .map(|item| {
            let (source, page) = chunks[item.chunk_id].clone();
            EvidenceRequest {
                chunk_id: item.chunk_id,
                text: item.highlight_text,
                source,
                page,
            }
        })
        .collect()
}

#[tokio::test]
async fn test_model_reply_to_highlighted_outputs() {
    let dir = TempDir::new().unwrap();
    let chunks = chunks(&dir);
    let reply = r#"Foxes are quick and sphinxes judge vows.
```json
[
  {"chunk_id": 0, "highlight_text": "The quick brown fox jumps"},
  {"chunk_id": "1", "highlight_text": "judge my vow"},
  {"chunk_id": 2, "highlight_text": "pack my box with fiv dozen liquor jugs"},
  {"chunk_id": 0, "highlight_text": "nowhere in this document at all"}
]
```"#;

    assert_eq!(
        parse_model_response(reply).unwrap().answer,
        "Foxes are quick and sphinxes judge vows."
    );

    let workdir = dir.path().join("work");
    let session = HighlightSession::new(&workdir, HighlightConfig::default()).unwrap();
    let report = session.highlight_batch(requests(reply, &chunks)).await;

    assert_eq!(
        (report.highlighted, report.no_match, report.failed, report.timed_out),
        (3, 1, 0, 0)
    );
    let passes: Vec<Option<MatchPass>> = report
        .items
        .iter()
        .map(|item| match &item.status {
            ItemStatus::Highlighted { pass, .. } => Some(*pass),
            _ => None,
        })
        .collect();
    assert_eq!(
        passes,
        vec![Some(MatchPass::Exact), Some(MatchPass::Exact), Some(MatchPass::Fuzzy), None]
    );

    // One combined output per source document
    let pangrams_out = latest_combined_output(&workdir, &chunks[0].0).unwrap();
    let other_out = latest_combined_output(&workdir, &chunks[2].0).unwrap();
    assert_eq!(highlight_rects(&pangrams_out, 0).len(), 1);
    assert_eq!(highlight_rects(&pangrams_out, 1).len(), 1);
    assert_eq!(highlight_rects(&other_out, 0).len(), 1);
    assert_eq!(highlight_rects(&other_out, 1).len(), 0);
}

#[tokio::test]
async fn test_report_is_json_serializable() {
    let dir = TempDir::new().unwrap();
    let chunks = chunks(&dir);
    let session = HighlightSession::new(dir.path(), HighlightConfig::default()).unwrap();
    let report = session
        .highlight_batch(vec![EvidenceRequest {
            chunk_id: 5,
            text: "lazy dog".into(),
            source: chunks[0].0.clone(),
            page: 9,
        }])
        .await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["failed"], 1);
    assert_eq!(json["items"][0]["chunk_id"], 5);
    assert_eq!(json["items"][0]["status"], "failed");
    assert!(json["items"][0]["error"]
        .as_str()
        .unwrap()
        .contains("out of range"));
}

// ============================================================================
// Timeouts
// ============================================================================

/// Page 0 holds 2000 filler words, page 1 the fox pangram.
fn write_long_document(path: &Path) {
    let lines: Vec<String> = (0..100)
        .map(|line| {
            (0..20)
                .map(|i| format!("w{}", line * 20 + i))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    text_document(&[lines.as_slice(), &[FOX]]).save(path).unwrap();
}

fn request(chunk_id: usize, source: &Path, page: usize, text: &str) -> EvidenceRequest {
    EvidenceRequest {
        chunk_id,
        text: text.to_string(),
        source: source.to_path_buf(),
        page,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_item_does_not_block_later_items_on_same_source() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("long.pdf");
    write_long_document(&source);

    let config = HighlightConfig {
        timeout_ms: 1000,
        ..HighlightConfig::default()
    };
    let session = HighlightSession::new(dir.path().join("work"), config).unwrap();

    // Nothing on page 0 resembles this, so every fuzzy window gets scored
    let unrelated = ["marble", "quartz", "violet", "ember", "canyon", "harbor"]
        .repeat(10)
        .join(" ");
    let started = Instant::now();
    let report = session
        .highlight_batch(vec![
            request(0, &source, 0, &unrelated),
            request(1, &source, 1, "lazy dog"),
            request(2, &source, 1, "over the"),
        ])
        .await;
    let elapsed = started.elapsed();

    assert_eq!(report.items[0].status, ItemStatus::TimedOut);
    for item in &report.items[1..] {
        assert!(
            matches!(item.status, ItemStatus::Highlighted { count: 1, .. }),
            "chunk {} -> {:?}",
            item.chunk_id,
            item.status
        );
    }
    assert!(elapsed < Duration::from_secs(10), "batch took {elapsed:?}");

    // The abandoned item never commits
    let output = session.output_path_for(&source);
    assert_eq!(highlight_rects(&output, 0).len(), 0);
    assert_eq!(highlight_rects(&output, 1).len(), 2);
}
