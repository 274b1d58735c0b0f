use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use globwalk::GlobWalkerBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Separator between section contents in `fullText`.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

const INSERTED_ID_PREFIX: &str = "section-inserted-";

// Timestamps alone collide when batches land in the same millisecond, so
// inserted ids carry a process-wide sequence number as well.
static INSERTED_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Type discriminant plus the metadata that is only legal for that type.
/// Serializes adjacently tagged so the persisted JSON keeps the original
/// `type` + `metadata` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "metadata", rename_all = "snake_case")]
pub enum SectionKind {
    #[serde(rename_all = "camelCase")]
    Heading {
        level: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clause_number: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Clause {
        clause_number: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
    },
    ListItem {},
    Paragraph {},
}

impl SectionKind {
    pub fn clause_number(&self) -> Option<&str> {
        match self {
            SectionKind::Heading { clause_number, .. } => clause_number.as_deref(),
            SectionKind::Clause { clause_number, .. } => Some(clause_number),
            _ => None,
        }
    }
}

/// One classified, offset-tracked span of a structured document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(flatten)]
    pub kind: SectionKind,
    pub content: String,
    pub start_position: usize,
    pub end_position: usize,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub file_name: String,
    pub file_type: String,
    pub extracted_at_ms: u64,
    pub total_sections: usize,
    pub total_characters: usize,
}

/// Structured form of one uploaded document. `fullText` is always the join
/// of section contents with a blank line; totals are always recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredDocument {
    pub version: u32,
    pub metadata: DocumentMetadata,
    pub sections: Vec<Section>,
    pub full_text: String,
}

/// Heuristics tables that vary per document template / deployment.
/// Everything defaults to the LMA loan-agreement conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructurerConfig {
    /// Garbled glyph sequences stripped verbatim from the raw text.
    pub ocr_artifacts: Vec<String>,
    /// Whole-line regexes for repeated footer boilerplate. Invalid patterns
    /// are skipped rather than failing structuring.
    pub footer_patterns: Vec<String>,
    /// Words that mark a page-wrapped line when they dangle at line end.
    pub dangling_words: Vec<String>,
    /// Standard section titles treated as headings even when short.
    pub lma_section_titles: Vec<String>,
}

impl Default for StructurerConfig {
    fn default() -> Self {
        StructurerConfig {
            ocr_artifacts: vec![
                "\u{fffd}".to_string(),
                "\u{f0b7}".to_string(),
                "\u{f0a7}".to_string(),
                "â€™".to_string(),
                "â€œ".to_string(),
                "â€\u{9d}".to_string(),
                "â€“".to_string(),
            ],
            footer_patterns: vec![
                r"(?i)^\s*page\s+\d+\s+of\s+\d+\s*$".to_string(),
                r"(?i)^\s*(strictly\s+)?(private\s+and\s+)?confidential\s*$".to_string(),
                r"^\s*[A-Z]{2,4}\d{6,}(?:[-/]\d+)?\s*$".to_string(),
            ],
            dangling_words: [
                "a", "an", "and", "at", "by", "for", "from", "in", "of", "on", "or", "the",
                "to", "with",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
            lma_section_titles: [
                "DEFINITIONS AND INTERPRETATION",
                "THE FACILITY",
                "PURPOSE",
                "CONDITIONS OF UTILISATION",
                "UTILISATION",
                "REPAYMENT",
                "PREPAYMENT AND CANCELLATION",
                "INTEREST",
                "INTEREST PERIODS",
                "FEES",
                "TAX GROSS UP AND INDEMNITIES",
                "COSTS AND EXPENSES",
                "GUARANTEE AND INDEMNITY",
                "REPRESENTATIONS",
                "INFORMATION UNDERTAKINGS",
                "FINANCIAL COVENANTS",
                "GENERAL UNDERTAKINGS",
                "EVENTS OF DEFAULT",
                "CHANGES TO THE LENDERS",
                "CHANGES TO THE OBLIGORS",
                "PAYMENT MECHANICS",
                "SET-OFF",
                "NOTICES",
                "GOVERNING LAW",
                "ENFORCEMENT",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Load a YAML overlay for the structuring heuristics. Missing keys fall
/// back to the defaults.
pub fn load_config(path: &Path) -> Result<StructurerConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
    let cfg: StructurerConfig =
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(cfg)
}

static RE_HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00a0}]{2,}").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,4}$").unwrap());
static RE_PAGE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\.\d{1,4}$").unwrap());
static RE_CONTENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(table\s+of\s+)?contents$").unwrap());
static RE_TOP_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(section|part|article)\s+\d{1,3}[a-z]?\.?$").unwrap());
static RE_KEYWORD_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(schedule|part|section|article|exhibit)\b").unwrap());
static RE_SECTION_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^section\s+(\d+[a-z]?)\b").unwrap());
static RE_SECTION_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^section\s+(\d+[a-z]?)$").unwrap());
static RE_LEVEL_ONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(part|article|section)\b").unwrap());
static RE_SCHEDULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^schedule\b").unwrap());
static RE_CLAUSE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(\\d+(?:\\.\\d+)*)\\.?\\s+[\"\u{201c}'A-Za-z]").unwrap());
static RE_LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[•\-\*]\s+|\([a-z]{1,2}\)|\([ivxlcdm]+\)|\([IVXLCDM]+\)|[ivx]+[.)]\s+|[a-z][.)]\s+)",
    )
    .unwrap()
});
static RE_BARE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*\.?$").unwrap());
static RE_BARE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\([a-z]{1,2}\)|\([ivxlcdm]+\)|[a-z][.)]|[ivx]+[.)]|[•\-\*])$").unwrap()
});

/// Words that carry a split list item over into the next paragraph.
const CONTINUATION_WORDS: [&str; 10] =
    ["with", "and", "or", "to", "from", "in", "on", "by", "for", "of"];

fn is_meaningful_caps(content: &str) -> bool {
    if !content.chars().any(|c| c.is_alphabetic()) {
        return false;
    }
    if content != content.to_uppercase() {
        return false;
    }
    content.split_whitespace().count() >= 2 || content.chars().count() >= 8
}

fn is_heading_content(content: &str, cfg: &StructurerConfig) -> bool {
    if content.is_empty() || content.len() >= 100 {
        return false;
    }
    // lines opening with a quote are usually defined-term definitions
    if content.starts_with(&['"', '\u{201c}', '\u{2018}', '\''][..]) {
        return false;
    }
    if RE_KEYWORD_HEADING.is_match(content) {
        return true;
    }
    if cfg
        .lma_section_titles
        .iter()
        .any(|t| t.eq_ignore_ascii_case(content))
    {
        return true;
    }
    is_meaningful_caps(content)
}

fn is_bare_fragment(content: &str) -> bool {
    RE_BARE_CLAUSE.is_match(content)
        || RE_BARE_MARKER.is_match(content)
        || RE_PAGE_REF.is_match(content)
        || RE_PAGE_NUMBER.is_match(content)
}

/// Parent clause number is the numeral minus its final segment; top-level
/// clauses have no parent.
pub fn clause_parent(clause_number: &str) -> Option<String> {
    let (parent, _) = clause_number.rsplit_once('.')?;
    Some(parent.to_string())
}

fn clause_kind(numeral: &str) -> SectionKind {
    let clause_number = numeral.trim_end_matches('.').to_string();
    SectionKind::Clause {
        parent: clause_parent(&clause_number),
        clause_number,
    }
}

fn heading_kind(content: &str) -> SectionKind {
    if let Some(caps) = RE_SECTION_NUMBER.captures(content) {
        return SectionKind::Heading {
            level: 1,
            clause_number: Some(caps[1].to_string()),
        };
    }
    let level = if RE_LEVEL_ONE.is_match(content) {
        1
    } else if RE_SCHEDULE.is_match(content) {
        2
    } else {
        3
    };
    SectionKind::Heading {
        level,
        clause_number: None,
    }
}

fn classify_paragraph(content: &str, cfg: &StructurerConfig) -> SectionKind {
    if is_heading_content(content, cfg) {
        return heading_kind(content);
    }
    if let Some(caps) = RE_CLAUSE_START.captures(content) {
        return clause_kind(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
    }
    if RE_LIST_ITEM.is_match(content) {
        return SectionKind::ListItem {};
    }
    SectionKind::Paragraph {}
}

/// Stage 1: normalize line endings, strip extraction junk, drop page-number
/// and footer lines, excise a table-of-contents block.
fn clean_lines(raw_text: &str, cfg: &StructurerConfig) -> Vec<String> {
    let mut text = raw_text.replace("\r\n", "\n").replace('\r', "\n");
    for junk in &cfg.ocr_artifacts {
        if !junk.is_empty() && text.contains(junk.as_str()) {
            text = text.replace(junk.as_str(), "");
        }
    }

    let footers: Vec<Regex> = cfg
        .footer_patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

    let mut lines: Vec<String> = Vec::new();
    for raw_line in text.lines() {
        let line = RE_HORIZONTAL_WS.replace_all(raw_line, " ");
        let line = line.trim();
        if RE_PAGE_NUMBER.is_match(line) {
            continue;
        }
        if footers.iter().any(|re| re.is_match(line)) {
            continue;
        }
        lines.push(line.to_string());
    }

    excise_contents_block(lines)
}

/// Remove everything from a literal CONTENTS marker up to (excluding) the
/// first real top-level section marker. TOC entries carry trailing page
/// numbers or dot leaders, so only a bare "SECTION n" line marks the real
/// document start.
fn excise_contents_block(mut lines: Vec<String>) -> Vec<String> {
    let start = match lines.iter().position(|l| RE_CONTENTS.is_match(l)) {
        Some(idx) => idx,
        None => return lines,
    };
    let end = lines[start + 1..]
        .iter()
        .position(|l| RE_TOP_MARKER.is_match(l))
        .map(|off| start + 1 + off);
    if let Some(end) = end {
        lines.drain(start..end);
    }
    lines
}

/// Page-wrap continuation test, used only for paginated (PDF) sources.
fn should_join(prev: &str, next: &str, cfg: &StructurerConfig) -> bool {
    if prev.is_empty() || next.is_empty() {
        return false;
    }
    // a numbered clause or keyword heading is never a wrap continuation
    if RE_CLAUSE_START.is_match(next) || RE_KEYWORD_HEADING.is_match(next) {
        return false;
    }
    let last = match prev.chars().rev().find(|c| !c.is_whitespace()) {
        Some(c) => c,
        None => return false,
    };
    if matches!(last, '.' | '!' | '?' | ':' | ';') {
        return false;
    }
    let starts_lower = next.chars().next().map(|c| c.is_lowercase()).unwrap_or(false);
    let last_word = prev
        .split_whitespace()
        .last()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_lowercase();
    let dangling = cfg.dangling_words.iter().any(|w| *w == last_word);
    starts_lower || dangling || last == '('
}

/// Stage 2: walk cleaned lines into an ordered list of paragraph strings.
/// Blank lines close the open paragraph; heading and clause-start lines
/// always open a fresh one. PDF sources additionally re-join page-wrapped
/// lines and treat unjoined hard breaks as paragraph boundaries.
fn assemble_paragraphs(lines: &[String], pdf_source: bool, cfg: &StructurerConfig) -> Vec<String> {
    fn flush(current: &mut String, out: &mut Vec<String>) {
        if !current.is_empty() {
            out.push(std::mem::take(current));
        }
    }

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut last_line = String::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut current, &mut paragraphs);
            last_line.clear();
            continue;
        }
        if pdf_source && !current.is_empty() && should_join(&last_line, line, cfg) {
            current.push(' ');
            current.push_str(line);
            last_line = line.to_string();
            continue;
        }
        if is_heading_content(line, cfg) || RE_CLAUSE_START.is_match(line) {
            flush(&mut current, &mut paragraphs);
            current.push_str(line);
        } else if current.is_empty() {
            current.push_str(line);
        } else if pdf_source {
            // an unjoined hard break in paginated input is a real boundary
            flush(&mut current, &mut paragraphs);
            current.push_str(line);
        } else {
            current.push(' ');
            current.push_str(line);
        }
        last_line = line.to_string();
    }
    flush(&mut current, &mut paragraphs);
    paragraphs
}

fn continues_list_item(prev: &str, cur: &str) -> bool {
    let trailing = prev.chars().rev().find(|c| !c.is_whitespace());
    if matches!(trailing, Some(',' | ':' | ';' | '-' | '\u{2013}' | '\u{2014}')) {
        return true;
    }
    if cur.chars().next().map(|c| c.is_lowercase()).unwrap_or(false) {
        return true;
    }
    let first = cur
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    CONTINUATION_WORDS.contains(&first.as_str())
}

fn is_acronym_false_positive(content: &str, cfg: &StructurerConfig) -> bool {
    if content.split_whitespace().count() != 1 || content.chars().count() > 10 {
        return false;
    }
    if !content.chars().any(|c| c.is_alphabetic()) || content != content.to_uppercase() {
        return false;
    }
    !cfg
        .lma_section_titles
        .iter()
        .any(|t| t.eq_ignore_ascii_case(content))
}

/// Stage 4: single-pass cursor reducer over the classified sections. Each
/// step consumes one or two inputs and emits zero or one outputs, fixing the
/// known segmentation failure modes: extraction noise, orphaned clause
/// numbers, orphaned list markers, split heading titles, acronym headings.
fn merge_pass(
    input: Vec<(SectionKind, String)>,
    cfg: &StructurerConfig,
) -> Vec<(SectionKind, String)> {
    let mut out: Vec<(SectionKind, String)> = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let (kind, content) = &input[i];
        let next = input.get(i + 1);

        // bare page references and stray page numbers are extraction noise
        if RE_PAGE_REF.is_match(content) || RE_PAGE_NUMBER.is_match(content) {
            i += 1;
            continue;
        }

        // "SECTION n" split from its title line
        if matches!(kind, SectionKind::Heading { .. }) {
            if let Some(caps) = RE_SECTION_ONLY.captures(content) {
                if let Some((SectionKind::Heading { .. }, title)) = next {
                    out.push((
                        SectionKind::Heading {
                            level: 1,
                            clause_number: Some(caps[1].to_string()),
                        },
                        format!("{} \u{2014} {}", content, title),
                    ));
                    i += 2;
                    continue;
                }
            }
        }

        // clause numeral split from its text
        if RE_BARE_CLAUSE.is_match(content) {
            if let Some((_, next_content)) = next {
                if !is_bare_fragment(next_content) {
                    out.push((clause_kind(content), format!("{} {}", content, next_content)));
                    i += 2;
                    continue;
                }
            }
        }

        // list marker split from its text
        if RE_BARE_MARKER.is_match(content) {
            if let Some((next_kind, next_content)) = next {
                if !matches!(next_kind, SectionKind::Heading { .. })
                    && !is_bare_fragment(next_content)
                {
                    out.push((
                        SectionKind::ListItem {},
                        format!("{} {}", content, next_content),
                    ));
                    i += 2;
                    continue;
                }
            }
        }

        // list-item text split into its own paragraph
        if matches!(kind, SectionKind::Paragraph {}) {
            if let Some((SectionKind::ListItem {}, prev_content)) = out.last_mut() {
                if continues_list_item(prev_content, content) {
                    prev_content.push(' ');
                    prev_content.push_str(content);
                    i += 1;
                    continue;
                }
            }
        }

        if matches!(kind, SectionKind::Heading { .. }) && is_acronym_false_positive(content, cfg) {
            out.push((SectionKind::Paragraph {}, content.clone()));
            i += 1;
            continue;
        }

        out.push((kind.clone(), content.clone()));
        i += 1;
    }
    out
}

fn section_id(index: usize) -> String {
    format!("section-{:06}", index)
}

/// Re-derive order, positional ids and byte offsets from the final array
/// order, and rebuild the joined full text. Shared by structuring and edit
/// application; synthetic inserted-section ids are left untouched.
fn finalize_sections(sections: &mut [Section]) -> String {
    let mut full_text = String::new();
    let mut pos = 0usize;
    for (idx, section) in sections.iter_mut().enumerate() {
        section.order = idx;
        if !section.id.starts_with(INSERTED_ID_PREFIX) {
            section.id = section_id(idx);
        }
        if idx > 0 {
            full_text.push_str(PARAGRAPH_SEPARATOR);
            pos += PARAGRAPH_SEPARATOR.len();
        }
        section.start_position = pos;
        pos += section.content.len();
        section.end_position = pos;
        full_text.push_str(&section.content);
    }
    full_text
}

/// Structure raw extracted text into addressable sections using the default
/// LMA heuristics. Never fails; malformed input degrades to fewer sections.
pub fn structure_text(raw_text: &str, file_name: &str, file_type: &str) -> StructuredDocument {
    structure_text_with(raw_text, file_name, file_type, &StructurerConfig::default())
}

/// As [`structure_text`], with deployment-specific heuristics.
pub fn structure_text_with(
    raw_text: &str,
    file_name: &str,
    file_type: &str,
    cfg: &StructurerConfig,
) -> StructuredDocument {
    let pdf_source = file_type == MIME_PDF;
    let lines = clean_lines(raw_text, cfg);
    let paragraphs = assemble_paragraphs(&lines, pdf_source, cfg);

    let drafts: Vec<(SectionKind, String)> = paragraphs
        .iter()
        .map(|p| RE_WS.replace_all(p.trim(), " ").to_string())
        .filter(|p| !p.is_empty())
        .map(|content| (classify_paragraph(&content, cfg), content))
        .collect();

    let mut sections: Vec<Section> = merge_pass(drafts, cfg)
        .into_iter()
        .map(|(kind, content)| Section {
            id: String::new(),
            kind,
            content,
            start_position: 0,
            end_position: 0,
            order: 0,
        })
        .collect();

    let full_text = finalize_sections(&mut sections);

    StructuredDocument {
        version: 1,
        metadata: DocumentMetadata {
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            extracted_at_ms: epoch_ms(),
            total_sections: sections.len(),
            total_characters: full_text.len(),
        },
        sections,
        full_text,
    }
}

pub fn find_section_by_id<'a>(doc: &'a StructuredDocument, id: &str) -> Option<&'a Section> {
    doc.sections.iter().find(|s| s.id == id)
}

pub fn find_section_by_clause_number<'a>(
    doc: &'a StructuredDocument,
    clause_number: &str,
) -> Option<&'a Section> {
    doc.sections
        .iter()
        .find(|s| s.kind.clause_number() == Some(clause_number))
}

/// Section whose span contains the byte position, if any. Positions inside
/// the separator between sections resolve to nothing.
pub fn find_section_by_position(doc: &StructuredDocument, position: usize) -> Option<&Section> {
    doc.sections
        .iter()
        .find(|s| position >= s.start_position && position <= s.end_position)
}

/// Human-readable reference for cross-linking issues and proposals.
pub fn section_reference(section: &Section) -> String {
    if let Some(number) = section.kind.clause_number() {
        return format!("Clause {}", number);
    }
    if matches!(section.kind, SectionKind::Heading { .. }) {
        return format!("Heading: {}...", truncate_chars(&section.content, 50));
    }
    format!("Section {}", section.order + 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause_number: Option<String>,
    pub level: u8,
    pub order: usize,
}

/// Headings plus top-level clauses, in document order.
pub fn table_of_contents(doc: &StructuredDocument) -> Vec<TocEntry> {
    doc.sections
        .iter()
        .filter_map(|s| match &s.kind {
            SectionKind::Heading {
                level,
                clause_number,
            } => Some(TocEntry {
                id: s.id.clone(),
                title: truncate_chars(&s.content, 100),
                clause_number: clause_number.clone(),
                level: *level,
                order: s.order,
            }),
            SectionKind::Clause { clause_number, .. } if !clause_number.contains('.') => {
                Some(TocEntry {
                    id: s.id.clone(),
                    title: truncate_chars(&s.content, 100),
                    clause_number: Some(clause_number.clone()),
                    level: 1,
                    order: s.order,
                })
            }
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub total_sections: usize,
    pub headings: usize,
    pub clauses: usize,
    pub paragraphs: usize,
    pub list_items: usize,
    pub total_characters: usize,
    pub version: u32,
}

pub fn document_stats(doc: &StructuredDocument) -> DocumentStats {
    let mut stats = DocumentStats {
        total_sections: doc.sections.len(),
        total_characters: doc.full_text.len(),
        version: doc.version,
        ..DocumentStats::default()
    };
    for section in &doc.sections {
        match section.kind {
            SectionKind::Heading { .. } => stats.headings += 1,
            SectionKind::Clause { .. } => stats.clauses += 1,
            SectionKind::ListItem {} => stats.list_items += 1,
            SectionKind::Paragraph {} => stats.paragraphs += 1,
        }
    }
    stats
}

/// Text excerpt around a byte position, clamped to char boundaries.
pub fn excerpt_around(doc: &StructuredDocument, position: usize, context_chars: usize) -> String {
    let text = &doc.full_text;
    let position = position.min(text.len());
    let mut start = position.saturating_sub(context_chars);
    let mut end = (position + context_chars).min(text.len());
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(&text[start..end]);
    if end < text.len() {
        out.push_str("...");
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub section_id: String,
    pub section_ref: String,
    pub position: usize,
    pub excerpt: String,
}

/// Substring search over the full text, each hit resolved to its section.
pub fn search_document(
    doc: &StructuredDocument,
    query: &str,
    case_sensitive: bool,
) -> Vec<SearchHit> {
    if query.is_empty() {
        return Vec::new();
    }
    let haystack = if case_sensitive {
        doc.full_text.clone()
    } else {
        doc.full_text.to_ascii_lowercase()
    };
    let needle = if case_sensitive {
        query.to_string()
    } else {
        query.to_ascii_lowercase()
    };

    let mut hits = Vec::new();
    let mut from = 0usize;
    while let Some(found) = haystack[from..].find(&needle) {
        let position = from + found;
        if let Some(section) = find_section_by_position(doc, position) {
            hits.push(SearchHit {
                section_id: section.id.clone(),
                section_ref: section_reference(section),
                position,
                excerpt: excerpt_around(doc, position, 40),
            });
        }
        from = position + needle.len();
    }
    hits
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    Replace,
    Modify,
    Delete,
    Insert,
}

/// One accepted change from the proposal workflow. Read-only input to the
/// edit applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalEdit {
    pub section_id: String,
    pub action: EditAction,
    pub original_text: String,
    pub proposed_text: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("section {section_id} not found in document (edit order {order})")]
    SectionNotFound { section_id: String, order: i64 },
    #[error("section {section_id} content has changed since the edit was created; expected \"{expected}\", found \"{found}\"")]
    StaleEdit {
        section_id: String,
        expected: String,
        found: String,
    },
    #[error("edit for section {section_id} is missing proposed text")]
    MissingProposedText { section_id: String },
}

/// Check a batch of edits against the live document. Errors come back as
/// data; the caller decides whether to block application.
pub fn validate_edits(document: &StructuredDocument, edits: &[ProposalEdit]) -> Vec<EditError> {
    let mut errors = Vec::new();
    for edit in edits {
        let section = match find_section_by_id(document, &edit.section_id) {
            Some(s) => s,
            None => {
                errors.push(EditError::SectionNotFound {
                    section_id: edit.section_id.clone(),
                    order: edit.order,
                });
                continue;
            }
        };
        // stale edit: the section moved on since the edit was authored
        if edit.original_text != section.content {
            errors.push(EditError::StaleEdit {
                section_id: edit.section_id.clone(),
                expected: truncate_chars(&edit.original_text, 50),
                found: truncate_chars(&section.content, 50),
            });
        }
        if edit.action != EditAction::Delete && edit.proposed_text.is_empty() {
            errors.push(EditError::MissingProposedText {
                section_id: edit.section_id.clone(),
            });
        }
    }
    errors
}

/// Apply accepted edits in `order`, returning a new document with offsets,
/// ids and full text rebuilt. Edits against unknown section ids are skipped.
pub fn apply_edits(document: &StructuredDocument, edits: &[ProposalEdit]) -> StructuredDocument {
    let mut sections = document.sections.clone();

    let mut sorted: Vec<&ProposalEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.order);

    let stamp = epoch_ms();

    for edit in sorted {
        let idx = match sections.iter().position(|s| s.id == edit.section_id) {
            Some(idx) => idx,
            None => continue,
        };
        match edit.action {
            EditAction::Replace | EditAction::Modify => {
                sections[idx].content = edit.proposed_text.clone();
            }
            EditAction::Delete => {
                sections.remove(idx);
            }
            EditAction::Insert => {
                let seq = INSERTED_COUNTER.fetch_add(1, Ordering::Relaxed);
                let target = &sections[idx];
                let inserted = Section {
                    id: format!("{}{}-{}", INSERTED_ID_PREFIX, stamp, seq),
                    kind: target.kind.clone(),
                    content: edit.proposed_text.clone(),
                    // provisional; overwritten by the final recompute
                    start_position: target.end_position,
                    end_position: target.end_position,
                    order: target.order + 1,
                };
                sections.insert(idx + 1, inserted);
            }
        }
    }

    let full_text = finalize_sections(&mut sections);

    StructuredDocument {
        version: document.version,
        metadata: DocumentMetadata {
            total_sections: sections.len(),
            total_characters: full_text.len(),
            ..document.metadata.clone()
        },
        sections,
        full_text,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSummary {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub total: usize,
}

pub fn summarize_edits(edits: &[ProposalEdit]) -> EditSummary {
    let mut summary = EditSummary {
        total: edits.len(),
        ..EditSummary::default()
    };
    for edit in edits {
        match edit.action {
            EditAction::Insert => summary.added += 1,
            EditAction::Delete => summary.deleted += 1,
            EditAction::Replace | EditAction::Modify => summary.modified += 1,
        }
    }
    summary
}

#[derive(Debug, Error)]
pub enum EnumerateError {
    #[error("NoFilesFound")]
    NoFilesFound { guidance: String },
}

/// Enumerate extracted-text files using a glob pattern (e.g.
/// "./input/**/*.txt"). Returns a sorted list of paths.
pub fn enumerate_inputs(glob_pattern: &str) -> Result<Vec<PathBuf>, EnumerateError> {
    let root = if Path::new(glob_pattern).is_absolute() { "/" } else { "." };
    let pattern = glob_pattern.trim_start_matches("./");
    let mut paths: Vec<PathBuf> = GlobWalkerBuilder::from_patterns(root, &[pattern])
        .case_insensitive(false)
        .follow_links(false)
        .build()
        .map_err(|_| EnumerateError::NoFilesFound {
            guidance: folder_guidance(),
        })?
        .filter_map(|e| e.ok())
        .map(|e| e.path().to_path_buf())
        .collect();

    paths.sort();
    paths.retain(|p| p.is_file());

    if paths.is_empty() {
        return Err(EnumerateError::NoFilesFound {
            guidance: folder_guidance(),
        });
    }

    Ok(paths)
}

fn folder_guidance() -> String {
    "No extracted text found for the input pattern.\n\
Suggested layout:\n\
  ./input/<deal>/<document>.txt\n\
Place the plain-text extraction of each uploaded PDF/DOCX there."
        .to_string()
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("WriteFailed: {0}")]
    WriteFailed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitPaths {
    pub doc_path: String,
    pub meta_path: String,
}

/// Atomically write the structured document and its meta JSON into outdir
/// with the doc_id stem.
pub fn emit_files(
    document: &StructuredDocument,
    meta: &serde_json::Value,
    outdir: &str,
    doc_id: &str,
) -> Result<EmitPaths, EmitError> {
    std::fs::create_dir_all(outdir).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    let doc_path = Path::new(outdir).join(format!("{}.json", doc_id));
    let meta_path = Path::new(outdir).join(format!("{}.meta.json", doc_id));

    // Write temp files then rename
    let pid = std::process::id();
    let doc_tmp = doc_path.with_extension(format!("json.tmp.{}", pid));
    let meta_tmp = meta_path.with_extension(format!("meta.json.tmp.{}", pid));

    let doc_bytes =
        serde_json::to_vec_pretty(document).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    let meta_bytes =
        serde_json::to_vec_pretty(meta).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    std::fs::write(&doc_tmp, doc_bytes).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    std::fs::write(&meta_tmp, meta_bytes).map_err(|e| EmitError::WriteFailed(e.to_string()))?;

    std::fs::rename(&doc_tmp, &doc_path).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    std::fs::rename(&meta_tmp, &meta_path).map_err(|e| EmitError::WriteFailed(e.to_string()))?;

    Ok(EmitPaths {
        doc_path: doc_path.to_string_lossy().to_string(),
        meta_path: meta_path.to_string_lossy().to_string(),
    })
}

// Utility to compute sha256 hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    out.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Milliseconds since the Unix epoch.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
