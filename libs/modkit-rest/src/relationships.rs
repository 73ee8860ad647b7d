use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use modkit_db::{Association, EagerLoad};

use crate::template::UrlTemplate;

/// A named relationship: how the engine reaches the related rows and how
/// links to them are built.
pub struct Relationship<J> {
    association: Arc<dyn Association<J>>,
    url_template: UrlTemplate,
}

impl<J> Clone for Relationship<J> {
    fn clone(&self) -> Self {
        Self {
            association: Arc::clone(&self.association),
            url_template: self.url_template.clone(),
        }
    }
}

impl<J> fmt::Debug for Relationship<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relationship")
            .field("url_template", &self.url_template.as_str())
            .finish_non_exhaustive()
    }
}

impl<J> Relationship<J> {
    #[must_use]
    pub fn new(association: impl Association<J> + 'static, url_template: UrlTemplate) -> Self {
        Self {
            association: Arc::new(association),
            url_template,
        }
    }

    #[must_use]
    pub fn url_template(&self) -> &UrlTemplate {
        &self.url_template
    }
}

/// Relationship name → link template, consumed by resource flattening.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkTemplates(BTreeMap<String, UrlTemplate>);

impl LinkTemplates {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UrlTemplate> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UrlTemplate)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of [`Relationships::resolve`].
#[derive(Debug)]
pub struct Resolved<J> {
    /// Associations for the engine to load, in request order.
    pub eager: Vec<EagerLoad<J>>,
    pub templates: LinkTemplates,
}

impl<J> Default for Resolved<J> {
    fn default() -> Self {
        Self {
            eager: Vec::new(),
            templates: LinkTemplates::default(),
        }
    }
}

/// Registry of a collection's relationships, keyed by name.
///
/// Built once alongside the collection and read-only afterwards.
pub struct Relationships<J> {
    by_name: BTreeMap<String, Relationship<J>>,
}

impl<J> Default for Relationships<J> {
    fn default() -> Self {
        Self {
            by_name: BTreeMap::new(),
        }
    }
}

impl<J> Clone for Relationships<J> {
    fn clone(&self) -> Self {
        Self {
            by_name: self.by_name.clone(),
        }
    }
}

impl<J> fmt::Debug for Relationships<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.by_name.iter()).finish()
    }
}

impl<J> Relationships<J> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. A later registration under the same name replaces
    /// the earlier one.
    #[must_use]
    pub fn with(
        mut self,
        name: impl Into<String>,
        association: impl Association<J> + 'static,
        url_template: UrlTemplate,
    ) -> Self {
        self.by_name
            .insert(name.into(), Relationship::new(association, url_template));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Relationship<J>> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Split the requested names into eager loads and link templates.
    ///
    /// Unknown names are dropped; repeated names resolve once.
    #[must_use]
    pub fn resolve(&self, requested: Option<&[String]>) -> Resolved<J> {
        let mut out = Resolved::default();
        for name in requested.unwrap_or_default() {
            let Some(rel) = self.by_name.get(name) else {
                tracing::trace!(relationship = %name, "ignoring unknown relationship");
                continue;
            };
            if out.templates.0.contains_key(name) {
                continue;
            }
            out.eager
                .push(EagerLoad::new(name.clone(), rel.association.describe_join()));
            out.templates
                .0
                .insert(name.clone(), rel.url_template.clone());
        }
        out
    }
}
