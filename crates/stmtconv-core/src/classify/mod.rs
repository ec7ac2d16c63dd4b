//! Format classification: pick exactly one template for a document.
//!
//! The header region (first rows plus every header row) is folded and each
//! template's keywords are looked up in it, exactly or fuzzily. Among the
//! templates that qualify, the one demanding the most keyword matches wins,
//! then the one matching the most keywords, then registry order.

use serde::Serialize;
use strsim::normalized_levenshtein;
use tracing::{debug, info};

use crate::error::ClassifyError;
use crate::layout::TokenizedDocument;
use crate::models::config::ClassifierConfig;
use crate::templates::{StatementKind, Template, TemplateRegistry};
use crate::text::fold;

/// How one template fared against a document.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateScore {
    pub template: String,
    pub kind: StatementKind,
    /// Keywords found in the header region.
    pub matched: Vec<String>,
    pub keywords: usize,
    pub min_matches: usize,
    /// Matched share of the template's keywords.
    pub score: f64,
    pub qualified: bool,
}

/// The selected template plus every candidate's score.
#[derive(Debug)]
pub struct Classification<'r> {
    pub template: &'r Template,
    pub scores: Vec<TemplateScore>,
}

pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Folded text of the header region, one entry per row.
    pub fn header_region(&self, document: &TokenizedDocument) -> Vec<String> {
        document
            .header_region(self.config.header_rows)
            .into_iter()
            .map(|row| fold(&row.text()))
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Score every template allowed by the hint, in registry order.
    pub fn scores(
        &self,
        document: &TokenizedDocument,
        registry: &TemplateRegistry,
        hint_kind: Option<&str>,
    ) -> Result<Vec<TemplateScore>, ClassifyError> {
        let kind = parse_hint(hint_kind)?;
        let region = self.header_region(document);

        Ok(registry
            .iter()
            .filter(|t| kind.is_none_or(|k| t.kind == k))
            .map(|t| self.score(t, &region))
            .collect())
    }

    pub fn classify<'r>(
        &self,
        document: &TokenizedDocument,
        registry: &'r TemplateRegistry,
        hint_kind: Option<&str>,
    ) -> Result<Classification<'r>, ClassifyError> {
        let kind = parse_hint(hint_kind)?;
        let region = self.header_region(document);
        debug!("Classifying on {} header lines", region.len());

        let candidates: Vec<(usize, &Template)> = registry
            .iter()
            .enumerate()
            .filter(|(_, t)| kind.is_none_or(|k| t.kind == k))
            .collect();
        if candidates.is_empty() {
            return Err(ClassifyError::NoCandidates(
                kind.map(|k| k.to_string()).unwrap_or_else(|| "any".to_string()),
            ));
        }

        let scores: Vec<TemplateScore> = candidates
            .iter()
            .map(|(_, t)| self.score(t, &region))
            .collect();
        for score in &scores {
            debug!(
                "Template {}: {}/{} keywords (needs {}), qualified: {}",
                score.template,
                score.matched.len(),
                score.keywords,
                score.min_matches,
                score.qualified
            );
        }

        let mut qualified: Vec<(usize, &Template, &TemplateScore)> = candidates
            .iter()
            .zip(&scores)
            .filter(|(_, s)| s.qualified)
            .map(|((i, t), s)| (*i, *t, s))
            .collect();
        qualified.sort_by(|a, b| {
            b.1.min_matches
                .cmp(&a.1.min_matches)
                .then(b.2.matched.len().cmp(&a.2.matched.len()))
                .then(a.0.cmp(&b.0))
        });

        match qualified.first() {
            Some((_, template, score)) => {
                info!(
                    "Selected template {} ({} of {} keywords)",
                    template.name,
                    score.matched.len(),
                    score.keywords
                );
                Ok(Classification {
                    template: *template,
                    scores: scores.clone(),
                })
            }
            None => {
                let best = scores
                    .iter()
                    .max_by(|a, b| a.score.total_cmp(&b.score))
                    .filter(|s| !s.matched.is_empty())
                    .map(|s| format!("{} with {}/{} keywords", s.template, s.matched.len(), s.keywords))
                    .unwrap_or_else(|| "no keyword matched".to_string());
                Err(ClassifyError::NoMatch { best })
            }
        }
    }

    fn score(&self, template: &Template, region: &[String]) -> TemplateScore {
        let matched: Vec<String> = template
            .keywords
            .iter()
            .filter(|k| self.keyword_matches(k, region))
            .cloned()
            .collect();

        let keywords = template.keywords.len();
        let score = if keywords == 0 {
            0.0
        } else {
            matched.len() as f64 / keywords as f64
        };
        let qualified = keywords > 0
            && matched.len() >= template.min_matches
            && score >= self.config.min_score;

        TemplateScore {
            template: template.name.clone(),
            kind: template.kind,
            matched,
            keywords,
            min_matches: template.min_matches,
            score,
            qualified,
        }
    }

    fn keyword_matches(&self, keyword: &str, region: &[String]) -> bool {
        let keyword = fold(keyword);
        if keyword.is_empty() {
            return false;
        }
        if region.iter().any(|line| line.contains(&keyword)) {
            return true;
        }

        let width = keyword.split(' ').count();
        region.iter().any(|line| {
            let tokens: Vec<&str> = line.split(' ').collect();
            tokens.windows(width).any(|window| {
                normalized_levenshtein(&window.join(" "), &keyword) >= self.config.fuzzy_threshold
            })
        })
    }
}

fn parse_hint(hint_kind: Option<&str>) -> Result<Option<StatementKind>, ClassifyError> {
    match hint_kind.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => hint
            .parse::<StatementKind>()
            .map(Some)
            .map_err(|_| ClassifyError::UnknownKind(hint.to_string())),
        None => Ok(None),
    }
}
