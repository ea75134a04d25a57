//! Splitting a model reply into its answer and the evidence it cites.
//!
//! The reply is free text followed by a JSON array such as
//!
//! ```text
//! The fox jumps over the dog.
//! [{"chunk_id": 0, "highlight_text": "quick brown fox jumps"}]
//! ```

use crate::error::{HighlightError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

lazy_static! {
    static ref EVIDENCE_ARRAY: Regex =
        Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").expect("valid regex pattern");
}

/// One cited chunk and the text the model says it quoted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(deserialize_with = "chunk_id")]
    pub chunk_id: usize,
    pub highlight_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelResponse {
    pub answer: String,
    pub evidence: Vec<EvidenceItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChunkId {
    Number(usize),
    Text(String),
}

/// Models write ids both as `3` and as `"3"`.
fn chunk_id<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match RawChunkId::deserialize(deserializer)? {
        RawChunkId::Number(n) => Ok(n),
        RawChunkId::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Answer text without trailing whitespace or a dangling code-fence opener.
fn clean_answer(text: &str) -> String {
    let text = text.trim_end();
    let text = text
        .strip_suffix("```json")
        .or_else(|| text.strip_suffix("```"))
        .unwrap_or(text);
    text.trim().to_string()
}

/// Split `text` at the first JSON array of objects.
///
/// No array means the whole text is the answer. An array that is not valid
/// JSON gets one retry with literal `\n` escapes turned into newlines.
pub fn parse_model_response(text: &str) -> Result<ModelResponse> {
    let Some(found) = EVIDENCE_ARRAY.find(text) else {
        return Ok(ModelResponse {
            answer: text.trim().to_string(),
            evidence: Vec::new(),
        });
    };

    let json = found.as_str();
    let evidence = match serde_json::from_str::<Vec<EvidenceItem>>(json) {
        Ok(items) => items,
        Err(_) => serde_json::from_str(&json.replace("\\n", "\n"))
            .map_err(|e| HighlightError::ResponseParse(e.to_string()))?,
    };

    Ok(ModelResponse {
        answer: clean_answer(&text[..found.start()]),
        evidence,
    })
}
