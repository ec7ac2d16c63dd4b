//! Statement header metadata (IBAN, period, holder) from preamble rows.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use super::Result;
use crate::error::ExtractionError;
use crate::layout::Row;
use crate::templates::Template;
use crate::text::clean;

/// Apply the template's metadata rules to `rows`; the first match per key wins.
pub fn extract_metadata<'a>(
    rows: impl IntoIterator<Item = &'a Row>,
    template: &Template,
) -> Result<BTreeMap<String, String>> {
    let rules = template
        .metadata
        .iter()
        .map(|rule| {
            Regex::new(&rule.pattern)
                .map(|re| (rule, re))
                .map_err(|e| ExtractionError::Pattern {
                    template: template.name.clone(),
                    reason: e.to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut metadata = BTreeMap::new();
    if rules.is_empty() {
        return Ok(metadata);
    }

    for row in rows {
        let text = clean(&row.text());
        for (rule, re) in &rules {
            if metadata.contains_key(&rule.key) {
                continue;
            }
            let Some(caps) = re.captures(&text) else {
                continue;
            };
            let value = match &rule.value {
                Some(value) => value.clone(),
                None => caps
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            };
            if !value.is_empty() {
                debug!("Metadata {} = {}", rule.key, value);
                metadata.insert(rule.key.clone(), value);
            }
        }
    }

    Ok(metadata)
}
