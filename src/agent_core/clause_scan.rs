//! Keyword-based clause scan over the uploaded document.
//!
//! Splits the document into sentences on a literal `.` (no abbreviation
//! handling, so "U.S." splits too) and flags sentences that contain a
//! negative or a cautionary keyword. The report is Markdown, returned to the
//! model as the result of `analyze_document_sentiments`.

/// Keywords that mark a clause as potentially negative for the reader.
const NEGATIVE_KEYWORDS: &[&str] = &[
    "terminate for convenience",
    "indemnify",
    "liability",
    "waiver of claims",
    "liquidated damages",
    "default",
    "breach",
    "exclusive jurisdiction",
    "no-solicit",
    "penalty",
];

/// Keywords that mark a clause as worth a careful read.
const CAUTION_KEYWORDS: &[&str] = &[
    "sole discretion",
    "best efforts",
    "reasonable efforts",
    "confidentiality",
    "non-disclosure",
    "limitation of liability",
    "force majeure",
    "assignment",
    "governing law",
];

pub const NEGATIVE_HEADING: &str = "## Potentially Negative Clauses";
pub const CAUTION_HEADING: &str = "## Clauses Requiring Caution";
pub const NO_FINDINGS: &str =
    "No specific clauses matching negative or cautionary keywords were found.";

/// Scan `document` and render the findings report.
pub fn analyze_document(document: &str) -> String {
    let mut negative = Vec::new();
    let mut caution = Vec::new();

    for sentence in document.split('.') {
        let lower = sentence.to_lowercase();
        if contains_any(&lower, NEGATIVE_KEYWORDS) {
            negative.push(finding(sentence));
        }
        if contains_any(&lower, CAUTION_KEYWORDS) {
            caution.push(finding(sentence));
        }
    }

    let mut report = String::new();
    push_section(&mut report, NEGATIVE_HEADING, &negative);
    push_section(&mut report, CAUTION_HEADING, &caution);

    if report.is_empty() {
        NO_FINDINGS.to_string()
    } else {
        report
    }
}

fn contains_any(lower_sentence: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lower_sentence.contains(k))
}

fn finding(sentence: &str) -> String {
    format!("{}.", sentence.trim())
}

fn push_section(report: &mut String, heading: &str, findings: &[String]) {
    if findings.is_empty() {
        return;
    }
    report.push_str(heading);
    report.push('\n');
    for f in findings {
        report.push_str("- ");
        report.push_str(f);
        report.push('\n');
    }
    report.push('\n');
}
