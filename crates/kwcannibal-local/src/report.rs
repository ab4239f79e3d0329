//! Threshold scan over the similarity matrix and CSV report writing.

use crate::similarity::SimilarityMatrix;
use kwcannibal_core::{Error, PageRecord, ReportPolicy, ReportShape, Result};
use serde::Serialize;
use std::path::Path;

pub const PAIRS_HEADER: [&str; 7] = [
    "Page 1 URL",
    "Page 1 Title",
    "Page 1 H1",
    "Page 2 URL",
    "Page 2 Title",
    "Page 2 H1",
    "Similarity Score",
];

pub const PAIRS_SIMPLE_HEADER: [&str; 3] = ["Page 1", "Page 2", "Similarity Score"];

pub const GROUPS_HEADER: [&str; 7] = [
    "Group Main URL",
    "Matched URL",
    "Group Main Title",
    "Matched Title",
    "Group Main H1",
    "Matched H1",
    "Similarity Score",
];

/// Unordered pair, `index_1 < index_2`. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CannibalizationPair {
    #[serde(skip)]
    pub index_1: usize,
    #[serde(skip)]
    pub index_2: usize,
    pub url_1: String,
    pub title_1: String,
    pub h1_1: String,
    pub url_2: String,
    pub title_2: String,
    pub h1_2: String,
    pub similarity: f64,
}

/// Directed match: `main` overlaps `matched`. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CannibalizationMatch {
    #[serde(skip)]
    pub main_index: usize,
    #[serde(skip)]
    pub matched_index: usize,
    pub main_url: String,
    pub matched_url: String,
    pub main_title: String,
    pub matched_title: String,
    pub main_h1: String,
    pub matched_h1: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Pairs(Vec<CannibalizationPair>),
    Groups(Vec<CannibalizationMatch>),
}

impl Report {
    pub fn len(&self) -> usize {
        match self {
            Self::Pairs(rows) => rows.len(),
            Self::Groups(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> ReportPolicy {
        match self {
            Self::Pairs(_) => ReportPolicy::Pairs,
            Self::Groups(_) => ReportPolicy::Groups,
        }
    }
}

pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Every `(i, j)` cell the policy looks at whose raw score is strictly above `threshold`, in
/// ascending `i` then `j` order.
fn scan<'a>(
    corpus: &'a [PageRecord],
    matrix: &'a SimilarityMatrix,
    threshold: f64,
    directed: bool,
) -> impl Iterator<Item = (&'a PageRecord, &'a PageRecord, f64)> + 'a {
    corpus.iter().flat_map(move |a| {
        corpus.iter().filter_map(move |b| {
            let wanted = if directed {
                a.index != b.index
            } else {
                a.index < b.index
            };
            if !wanted {
                return None;
            }
            let s = matrix.get(a.index, b.index)?;
            (s > threshold).then_some((a, b, s))
        })
    })
}

pub fn find_pairs(
    corpus: &[PageRecord],
    matrix: &SimilarityMatrix,
    threshold: f64,
) -> Vec<CannibalizationPair> {
    scan(corpus, matrix, threshold, false)
        .map(|(a, b, s)| CannibalizationPair {
            index_1: a.index,
            index_2: b.index,
            url_1: a.url.clone(),
            title_1: a.title.clone(),
            h1_1: a.h1.clone(),
            url_2: b.url.clone(),
            title_2: b.title.clone(),
            h1_2: b.h1.clone(),
            similarity: round3(s),
        })
        .collect()
}

pub fn find_matches(
    corpus: &[PageRecord],
    matrix: &SimilarityMatrix,
    threshold: f64,
) -> Vec<CannibalizationMatch> {
    scan(corpus, matrix, threshold, true)
        .map(|(a, b, s)| CannibalizationMatch {
            main_index: a.index,
            matched_index: b.index,
            main_url: a.url.clone(),
            matched_url: b.url.clone(),
            main_title: a.title.clone(),
            matched_title: b.title.clone(),
            main_h1: a.h1.clone(),
            matched_h1: b.h1.clone(),
            similarity: round3(s),
        })
        .collect()
}

pub fn build_report(
    policy: ReportPolicy,
    corpus: &[PageRecord],
    matrix: &SimilarityMatrix,
    threshold: f64,
) -> Report {
    match policy {
        ReportPolicy::Pairs => Report::Pairs(find_pairs(corpus, matrix, threshold)),
        ReportPolicy::Groups => Report::Groups(find_matches(corpus, matrix, threshold)),
    }
}

/// Render the report as CSV (header row always present).
pub fn write_csv<W: std::io::Write>(report: &Report, shape: ReportShape, out: W) -> csv::Result<()> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    match (report, shape) {
        (Report::Pairs(rows), ReportShape::Detailed) => {
            w.write_record(PAIRS_HEADER)?;
            for r in rows {
                w.serialize(r)?;
            }
        }
        (Report::Pairs(rows), ReportShape::Simple) => {
            w.write_record(PAIRS_SIMPLE_HEADER)?;
            for r in rows {
                w.serialize((&r.url_1, &r.url_2, r.similarity))?;
            }
        }
        (Report::Groups(rows), _) => {
            w.write_record(GROUPS_HEADER)?;
            for r in rows {
                w.serialize(r)?;
            }
        }
    }
    w.flush()?;
    Ok(())
}

/// Write the report to `path` in one step: rendered into a temp file next to it, then renamed.
pub fn save_csv(report: &Report, shape: ReportShape, path: &Path) -> Result<()> {
    let report_err = |message: String| Error::Report {
        path: path.to_path_buf(),
        message,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".kwcannibal-")
        .suffix(".csv.tmp")
        .tempfile_in(&dir)
        .map_err(|e| report_err(e.to_string()))?;
    write_csv(report, shape, tmp.as_file_mut()).map_err(|e| report_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| report_err(e.error.to_string()))?;
    Ok(())
}
