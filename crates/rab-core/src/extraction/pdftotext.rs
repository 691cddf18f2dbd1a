use crate::error::RabError;
use crate::extraction::{PageContent, PdfExtractor, TextFragment};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Write;
use std::process::Command;
use tracing::{debug, warn};

/// PDF extraction backend using pdftotext (from poppler-utils).
///
/// Uses `pdftotext -bbox` to get one positioned fragment per word, which the
/// PDF adapter clusters back into table rows.
pub struct PdftotextExtractor;

impl PdftotextExtractor {
    pub fn new() -> Self {
        PdftotextExtractor
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for PdftotextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, RabError> {
        let mut tmpfile =
            tempfile::NamedTempFile::new().map_err(|e| RabError::Extraction(e.to_string()))?;
        tmpfile
            .write_all(pdf_bytes)
            .map_err(|e| RabError::Extraction(e.to_string()))?;

        let output = Command::new("pdftotext")
            .arg("-bbox")
            .arg(tmpfile.path())
            .arg("-") // output to stdout
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RabError::PdftotextNotFound
                } else {
                    RabError::Extraction(format!("pdftotext -bbox failed: {}", e))
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(RabError::PdftotextFailed { code, stderr });
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let pages = parse_bbox_xml(&xml)?;

        let fragments: usize = pages.iter().map(|p| p.fragments.len()).sum();
        if fragments == 0 {
            warn!("pdftotext returned no text; the PDF may be scanned images only");
        }
        debug!(pages = pages.len(), fragments, "pdftotext extraction finished");
        Ok(pages)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

/// Parse `pdftotext -bbox` output into pages of word fragments.
///
/// Word boxes are given with a top-left origin; they are flipped so `y`
/// measures the word's bottom edge from the bottom of the page.
fn parse_bbox_xml(xml: &str) -> Result<Vec<PageContent>, RabError> {
    let mut reader = Reader::from_str(xml);
    let mut pages: Vec<PageContent> = Vec::new();
    let mut page_height = 0.0_f32;
    let mut word: Option<(f32, f32)> = None;
    let mut word_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == b"page" => {
                page_height = attr_f32(e, b"height").unwrap_or_else(|| {
                    warn!(page = pages.len() + 1, "page without height; row order may be reversed");
                    0.0
                });
                pages.push(PageContent {
                    page_number: pages.len() + 1,
                    fragments: Vec::new(),
                });
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"word" => {
                word = attr_f32(e, b"xMin").zip(attr_f32(e, b"yMax"));
                word_text.clear();
            }
            Event::Text(t) if word.is_some() => {
                let text = t
                    .unescape()
                    .unwrap_or_else(|_| String::from_utf8_lossy(t.as_ref()).into_owned().into());
                word_text.push_str(&text);
            }
            Event::End(ref e) if e.local_name().as_ref() == b"word" => {
                if let (Some((x, y_max)), Some(page)) = (word.take(), pages.last_mut()) {
                    let text = word_text.trim();
                    if !text.is_empty() {
                        page.fragments
                            .push(TextFragment::new(text, x, page_height - y_max));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pages)
}

fn attr_f32(element: &BytesStart, key: &[u8]) -> Option<f32> {
    element
        .attributes()
        .with_checks(false)
        .filter_map(Result::ok)
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .and_then(|v| v.trim().parse().ok())
}
