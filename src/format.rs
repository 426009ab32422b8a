//! Per-format policy: which files a pipeline accepts and how it names things.
//!
//! A [`FormatAdapter`] is plain data. Engine acquisition, cancellation and
//! error handling all live in [`crate::pipeline::OperationPipeline`]; adding a
//! new document type means adding a preset here, nothing more.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical extension of every converted document.
pub const PDF_EXTENSION: &str = "pdf";

/// User-facing messages for each phase of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMessages {
    pub loading: String,
    pub converting: String,
    pub done: String,
}

/// Declarative configuration for one document format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatAdapter {
    /// Short identifier, e.g. `"presentation"`.
    pub id: String,
    /// Lower-case extensions without the leading dot.
    pub accepted_extensions: Vec<String>,
    pub expected_file_count: usize,
    /// Extension appended to the derived output name, without the dot.
    pub output_extension: String,
    pub messages: PhaseMessages,
}

impl FormatAdapter {
    /// Build an adapter producing PDF from a single input file.
    pub fn new(id: impl Into<String>, extensions: &[&str], noun: &str) -> Self {
        Self {
            id: id.into(),
            accepted_extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            expected_file_count: 1,
            output_extension: PDF_EXTENSION.to_string(),
            messages: PhaseMessages {
                loading: "Loading conversion engine…".to_string(),
                converting: format!("Converting {noun} to PDF…"),
                done: "Conversion complete".to_string(),
            },
        }
    }

    /// The accepted extension `file_name` ends with, if any (case-insensitive).
    ///
    /// The longest match wins so that `pptx` is preferred over a shorter
    /// suffix sharing its tail.
    pub fn matching_extension(&self, file_name: &str) -> Option<&str> {
        let lower = file_name.to_ascii_lowercase();
        self.accepted_extensions
            .iter()
            .filter(|ext| {
                lower.len() > ext.len()
                    && lower.ends_with(ext.as_str())
                    && lower.as_bytes()[lower.len() - ext.len() - 1] == b'.'
            })
            .max_by_key(|ext| ext.len())
            .map(String::as_str)
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        self.matching_extension(file_name).is_some()
    }

    /// Strip the recognised extension and append the output extension.
    ///
    /// `Report.DOCX` → `Report.pdf`. A name with nothing left after stripping
    /// becomes `document.pdf`.
    pub fn output_file_name(&self, input_name: &str) -> String {
        let base = match self.matching_extension(input_name) {
            // ASCII lower-casing preserves byte offsets.
            Some(ext) => &input_name[..input_name.len() - ext.len() - 1],
            None => input_name,
        };
        let base = if base.is_empty() { "document" } else { base };
        format!("{base}.{}", self.output_extension)
    }
}

// ── Presets ──────────────────────────────────────────────────────────────────

/// The document families supported out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Presentation,
    WordProcessing,
    RichText,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 3] = [
        DocumentFormat::Presentation,
        DocumentFormat::WordProcessing,
        DocumentFormat::RichText,
    ];

    pub fn adapter(&self) -> FormatAdapter {
        match self {
            DocumentFormat::Presentation => FormatAdapter::new(
                "presentation",
                &["ppt", "pptx", "pps", "ppsx", "odp"],
                "presentation",
            ),
            DocumentFormat::WordProcessing => {
                FormatAdapter::new("word", &["doc", "docx", "odt"], "document")
            }
            DocumentFormat::RichText => {
                FormatAdapter::new("rtf", &["rtf"], "rich-text document")
            }
        }
    }

    /// Infer the format from a file name's extension.
    pub fn detect(file_name: &str) -> Option<DocumentFormat> {
        Self::ALL
            .into_iter()
            .find(|format| format.adapter().accepts(file_name))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentFormat::Presentation => "presentation",
            DocumentFormat::WordProcessing => "word",
            DocumentFormat::RichText => "rtf",
        };
        f.write_str(s)
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "presentation" | "ppt" | "pptx" => Ok(DocumentFormat::Presentation),
            "word" | "doc" | "docx" => Ok(DocumentFormat::WordProcessing),
            "rtf" | "rich-text" => Ok(DocumentFormat::RichText),
            other => Err(format!(
                "unknown format '{other}' (expected presentation, word or rtf)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_strips_extension_case_insensitively() {
        let word = DocumentFormat::WordProcessing.adapter();
        assert_eq!(word.output_file_name("Report.DOCX"), "Report.pdf");
        assert_eq!(word.output_file_name("q3.final.docx"), "q3.final.pdf");
    }

    #[test]
    fn output_name_empty_base_falls_back() {
        let rtf = DocumentFormat::RichText.adapter();
        assert_eq!(rtf.output_file_name(".rtf"), "document.pdf");
    }

    #[test]
    fn unrecognised_extension_is_kept() {
        let rtf = DocumentFormat::RichText.adapter();
        assert_eq!(rtf.output_file_name("notes.txt"), "notes.txt.pdf");
    }

    #[test]
    fn extension_needs_a_dot() {
        let word = DocumentFormat::WordProcessing.adapter();
        assert!(!word.accepts("mydocx"));
        assert!(!word.accepts("docx"));
        assert!(word.accepts("a.docx"));
    }

    #[test]
    fn longest_extension_wins() {
        let deck = DocumentFormat::Presentation.adapter();
        assert_eq!(deck.matching_extension("talk.PPSX"), Some("ppsx"));
        assert_eq!(deck.output_file_name("talk.PPSX"), "talk.pdf");
    }

    #[test]
    fn detect_by_extension() {
        assert_eq!(
            DocumentFormat::detect("Deck.pptx"),
            Some(DocumentFormat::Presentation)
        );
        assert_eq!(
            DocumentFormat::detect("letter.odt"),
            Some(DocumentFormat::WordProcessing)
        );
        assert_eq!(
            DocumentFormat::detect("memo.RTF"),
            Some(DocumentFormat::RichText)
        );
        assert_eq!(DocumentFormat::detect("image.png"), None);
    }

    #[test]
    fn presets_require_one_file() {
        for format in DocumentFormat::ALL {
            let adapter = format.adapter();
            assert_eq!(adapter.expected_file_count, 1);
            assert_eq!(adapter.output_extension, "pdf");
        }
    }

    #[test]
    fn parse_format_names() {
        assert_eq!(
            "Presentation".parse::<DocumentFormat>(),
            Ok(DocumentFormat::Presentation)
        );
        assert!("spreadsheet".parse::<DocumentFormat>().is_err());
    }
}
