//! Text extraction from fetched HTML.
//!
//! Only the title, `h1`-`h3` headings and paragraphs are kept; navigation, scripts and the rest
//! of the page never reach the similarity engine.

use kwcannibal_core::PageRecord;

/// Separator between multiple headings of the same level.
pub const HEADING_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: String,
    pub h1: String,
    pub h2: String,
    pub h3: String,
    pub paragraphs: String,
}

impl ExtractedFields {
    /// `title h1 h2 h3 paragraphs`, space-joined with empty fields left as gaps.
    pub fn full_content(&self) -> String {
        [
            self.title.as_str(),
            self.h1.as_str(),
            self.h2.as_str(),
            self.h3.as_str(),
            self.paragraphs.as_str(),
        ]
        .join(" ")
    }

    pub fn into_record(self, index: usize, url: impl Into<String>) -> PageRecord {
        let full_content = self.full_content();
        PageRecord {
            index,
            url: url.into(),
            title: self.title,
            h1: self.h1,
            h2: self.h2,
            h3: self.h3,
            full_content,
        }
    }
}

fn element_text(el: html_scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Trimmed text of every element matching `selector`, in document order. Empty elements are
/// kept so that joined fields show where they were.
fn texts(doc: &html_scraper::Html, selector: &str) -> Vec<String> {
    let Ok(sel) = html_scraper::Selector::parse(selector) else {
        return Vec::new();
    };
    doc.select(&sel).map(element_text).collect()
}

/// Text of the first `<title>` in the document, even when it is empty.
fn first_title(doc: &html_scraper::Html) -> String {
    let Ok(sel) = html_scraper::Selector::parse("title") else {
        return String::new();
    };
    doc.select(&sel).next().map(element_text).unwrap_or_default()
}

pub fn extract(html: &str) -> ExtractedFields {
    if html.trim().is_empty() {
        return ExtractedFields::default();
    }
    // html5ever recovers from any malformed markup, so parsing itself never fails.
    let doc = html_scraper::Html::parse_document(html);

    ExtractedFields {
        title: first_title(&doc),
        h1: texts(&doc, "h1").join(HEADING_SEPARATOR),
        h2: texts(&doc, "h2").join(HEADING_SEPARATOR),
        h3: texts(&doc, "h3").join(HEADING_SEPARATOR),
        paragraphs: texts(&doc, "p").join(" "),
    }
}
