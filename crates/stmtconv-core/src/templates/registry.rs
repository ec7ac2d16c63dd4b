//! Template registry.

use std::path::Path;

use tracing::{debug, info};

use super::{builtin_templates, StatementKind, Template};
use crate::error::{Result, StmtError};

/// Ordered set of templates, indexed by name and kind.
///
/// Registry order is the final tie-breaker during classification.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl TemplateRegistry {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    /// Registry holding the shipped templates.
    pub fn builtin() -> Self {
        Self::new(builtin_templates())
    }

    /// Add a template, replacing one of the same name in place.
    pub fn register(&mut self, template: Template) -> Result<()> {
        template.validate().map_err(StmtError::Config)?;

        match self.templates.iter_mut().find(|t| t.name == template.name) {
            Some(existing) => {
                debug!("Replacing template {}", template.name);
                *existing = template;
            }
            None => {
                debug!("Registering template {}", template.name);
                self.templates.push(template);
            }
        }
        Ok(())
    }

    /// Merge templates from a JSON file holding a single template or a list.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| StmtError::Config(format!("{}: {}", path.display(), e)))?;

        let templates: Vec<Template> = if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value(value).map(|t| vec![t])
        }
        .map_err(|e| StmtError::Config(format!("{}: {}", path.display(), e)))?;

        let count = templates.len();
        for template in templates {
            self.register(template)?;
        }
        info!("Loaded {} templates from {}", count, path.display());
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn by_kind(&self, kind: StatementKind) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter(move |t| t.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Serialize all templates as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.templates).map_err(|e| StmtError::Config(e.to_string()))
    }
}
