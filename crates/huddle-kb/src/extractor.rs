//! Source-type detection and content extraction for KB ingest.

use huddle_core::types::SourceType;
use huddle_runner::exec_bounded;
use tracing::debug;

use crate::error::{KbError, Result};

const TRANSCRIPT_TIMEOUT_SECS: u64 = 60;
const PDF_TIMEOUT_SECS: u64 = 60;
const EXTRACTOR_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Detects a `SourceType` from a URL's shape, without any network access.
pub fn detect_source_type(url: &str) -> SourceType {
    let lower = url.to_lowercase();
    if lower.contains("youtube.com/watch") || lower.contains("youtu.be/") {
        SourceType::Video
    } else if lower.ends_with(".pdf") {
        SourceType::Pdf
    } else if lower.contains("twitter.com/") || lower.contains("x.com/") {
        SourceType::Tweet
    } else {
        SourceType::Article
    }
}

/// Fetched-and-cleaned source content, ready for hashing/chunking.
pub struct Extracted {
    pub title: String,
    pub content: String,
}

/// Fetches `url` and extracts title/body text appropriate to its detected
/// `SourceType`. Video goes through an external transcript CLI and PDF
/// through an external text-extraction CLI, both via the bounded-exec
/// primitive the sandbox launcher and external tool wrappers already share.
pub async fn extract(client: &reqwest::Client, url: &str) -> Result<(SourceType, Extracted)> {
    let source_type = detect_source_type(url);
    match source_type {
        SourceType::Video => {
            let content = extract_transcript(url).await?;
            return Ok((
                source_type,
                Extracted {
                    title: url.to_string(),
                    content,
                },
            ));
        }
        SourceType::Pdf => {
            let content = extract_pdf_text(url).await?;
            return Ok((
                source_type,
                Extracted {
                    title: url.to_string(),
                    content,
                },
            ));
        }
        _ => {}
    }

    debug!(url, ?source_type, "fetching source for extraction");
    let resp = client
        .get(url)
        .header("user-agent", "huddle-kb/0.1")
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(KbError::ExtractionFailed(format!(
            "fetch returned status {}",
            resp.status()
        )));
    }
    let body = resp.text().await?;
    let title = extract_title(&body).unwrap_or_else(|| url.to_string());
    let content = strip_html(&body);
    Ok((source_type, Extracted { title, content }))
}

/// Runs a transcript CLI against a video URL, argv-only, bounded to
/// `TRANSCRIPT_TIMEOUT_SECS`.
async fn extract_transcript(url: &str) -> Result<String> {
    let output = exec_bounded(
        "transcript-cli",
        &[url.to_string()],
        None,
        TRANSCRIPT_TIMEOUT_SECS,
        EXTRACTOR_MAX_OUTPUT_BYTES,
    )
    .await
    .map_err(|e| KbError::ExtractionFailed(e.to_string()))?;

    if output.exit_code != 0 {
        return Err(KbError::ExtractionFailed(format!(
            "transcript-cli exited {}: {}",
            output.exit_code,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Downloads a PDF to a temp file and runs `pdftotext` against it, argv-only.
async fn extract_pdf_text(url: &str) -> Result<String> {
    let resp = reqwest::get(url).await?;
    if !resp.status().is_success() {
        return Err(KbError::ExtractionFailed(format!(
            "fetch returned status {}",
            resp.status()
        )));
    }
    let bytes = resp.bytes().await?;

    let dir = std::env::temp_dir();
    let path = dir.join(format!("huddle-kb-{}.pdf", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| KbError::ExtractionFailed(e.to_string()))?;

    let output = exec_bounded(
        "pdftotext",
        &[path.to_string_lossy().into_owned(), "-".to_string()],
        None,
        PDF_TIMEOUT_SECS,
        EXTRACTOR_MAX_OUTPUT_BYTES,
    )
    .await
    .map_err(|e| KbError::ExtractionFailed(e.to_string()));

    let _ = tokio::fs::remove_file(&path).await;
    let output = output?;

    if output.exit_code != 0 {
        return Err(KbError::ExtractionFailed(format!(
            "pdftotext exited {}: {}",
            output.exit_code,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Ingests pasted text directly, with no fetch step.
pub fn extract_pasted_text(title: &str, text: &str) -> (SourceType, Extracted) {
    (
        SourceType::Text,
        Extracted {
            title: title.to_string(),
            content: text.trim().to_string(),
        },
    )
}

fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_lowercase();
    let start = lower.find("<title>")? + "<title>".len();
    let end = lower[start..].find("</title>")? + start;
    Some(html[start..end].trim().to_string())
}

/// Strips tags and collapses whitespace. Deliberately simple: no script/style
/// block skipping beyond tag removal, no entity table beyond the common five
/// (matching `huddle_core::xml`'s escape set in reverse).
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_script_or_style = false;
    let lower = html.to_lowercase();
    let mut i = 0;
    let bytes = html.as_bytes();
    while i < bytes.len() {
        if lower[i..].starts_with("<script") || lower[i..].starts_with("<style") {
            in_script_or_style = true;
        }
        if in_script_or_style && (lower[i..].starts_with("</script>") || lower[i..].starts_with("</style>"))
        {
            in_script_or_style = false;
        }
        match bytes[i] as char {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag && !in_script_or_style => out.push(c),
            _ => {}
        }
        i += 1;
    }
    unescape_entities(&collapse_whitespace(&out))
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

fn unescape_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
