use std::collections::BTreeMap;

use modkit_db::{Record, Related, Row};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::TemplateError;
use crate::relationships::LinkTemplates;
use crate::template::UrlTemplate;

/// Attribute of a resource.
///
/// Embedded entities only exist between assembly and flattening; a
/// flattened resource holds plain values only.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Attribute {
    Value(Value),
    Entity(Box<Row>),
    Entities(Vec<Row>),
}

impl Attribute {
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Entity(_) | Self::Entities(_) => None,
        }
    }
}

impl From<Related> for Attribute {
    fn from(related: Related) -> Self {
        match related {
            Related::Missing => Self::Value(Value::Null),
            Related::One(row) => Self::Entity(row),
            Related::Many(rows) => Self::Entities(rows),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Link {
    One(String),
    Many(Vec<String>),
}

impl Link {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::One(url) => Some(url),
            Self::Many(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PageMeta {
    pub number: u64,
    pub size: u64,
    /// Number of pages.
    pub count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CollectionMeta {
    /// Rows matching the query across all pages.
    pub count: u64,
    pub page: PageMeta,
}

impl CollectionMeta {
    #[must_use]
    pub fn new(total: u64, number: u64, size: u64) -> Self {
        let pages = if size == 0 { 0 } else { total.div_ceil(size) };
        Self {
            count: total,
            page: PageMeta {
                number,
                size,
                count: pages,
            },
        }
    }
}

/// Hypermedia representation of a row or a page of rows.
///
/// Serializes as
/// `{"$self", "attributes", "links", "elements", "meta", "includes"}`;
/// empty sections are omitted except `elements` on collections.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    pub self_link: String,
    pub attributes: BTreeMap<String, Attribute>,
    pub links: BTreeMap<String, Link>,
    pub elements: Vec<Resource>,
    /// Present on collections only.
    pub meta: Option<CollectionMeta>,
    pub includes: Vec<Resource>,
}

impl Resource {
    /// Resource for one row; associations become entity attributes.
    #[must_use]
    pub fn single(row: Row, self_link: impl Into<String>) -> Self {
        let mut attributes: BTreeMap<String, Attribute> = row
            .values
            .into_iter()
            .map(|(k, v)| (k, Attribute::Value(v)))
            .collect();
        for (name, related) in row.related {
            attributes.insert(name, related.into());
        }
        Self {
            self_link: self_link.into(),
            attributes,
            ..Self::default()
        }
    }

    /// Collection resource; each element links to `{base_url}/<id>`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingField`] when a row lacks `id_field`.
    pub fn collection(
        rows: Vec<Row>,
        base_url: &str,
        id_field: &str,
        meta: CollectionMeta,
    ) -> Result<Self, TemplateError> {
        let element_link = element_template(base_url, id_field)?;
        let elements = rows
            .into_iter()
            .map(|row| {
                let link = element_link.render(&row.values)?;
                Ok(Self::single(row, link))
            })
            .collect::<Result<Vec<_>, TemplateError>>()?;
        Ok(Self {
            self_link: base_url.to_owned(),
            elements,
            meta: Some(meta),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.get(name)
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.meta.is_some()
    }

    /// Plain (non-entity) attribute values.
    #[must_use]
    pub fn plain_values(&self) -> Record {
        self.attributes
            .iter()
            .filter_map(|(k, a)| a.as_value().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Move embedded entities named in `templates` out of the attributes.
    ///
    /// For each relationship name:
    /// - one entity: link rendered from this resource's fields, one include;
    /// - several entities: the same link per entity, rendered from this
    ///   resource's fields, one include per entity;
    /// - absent, `null` or plain value: left alone, no link.
    ///
    /// Includes are appended as found; duplicates are kept.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a link cannot be rendered. The
    /// relationship being processed is left untouched in that case.
    pub fn flatten(&mut self, templates: &LinkTemplates) -> Result<(), TemplateError> {
        let parent = self.plain_values();

        for (name, template) in templates.iter() {
            let (link, includes) = match self.attributes.get(name) {
                Some(Attribute::Entity(row)) => {
                    let url = template.render(&parent)?;
                    let include = Self::single(row.as_ref().clone(), url.clone());
                    (Link::One(url), vec![include])
                }
                Some(Attribute::Entities(rows)) => {
                    let url = template.render(&parent)?;
                    let includes = rows
                        .iter()
                        .map(|row| Self::single(row.clone(), url.clone()))
                        .collect();
                    (Link::Many(vec![url; rows.len()]), includes)
                }
                Some(Attribute::Value(_)) | None => continue,
            };

            self.attributes.remove(name);
            self.links.insert(name.to_owned(), link);
            self.includes.extend(includes);
        }
        Ok(())
    }

    /// Remove and return the accumulated includes.
    pub fn take_includes(&mut self) -> Vec<Resource> {
        std::mem::take(&mut self.includes)
    }
}

pub(crate) fn element_template(base_url: &str, id_field: &str) -> Result<UrlTemplate, TemplateError> {
    UrlTemplate::parse(&format!("{base_url}/<%={id_field}%>"))
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("$self", &self.self_link)?;
        if !self.attributes.is_empty() {
            map.serialize_entry("attributes", &self.attributes)?;
        }
        if !self.links.is_empty() {
            map.serialize_entry("links", &self.links)?;
        }
        if self.is_collection() || !self.elements.is_empty() {
            map.serialize_entry("elements", &self.elements)?;
        }
        if let Some(meta) = &self.meta {
            map.serialize_entry("meta", meta)?;
        }
        if !self.includes.is_empty() {
            map.serialize_entry("includes", &self.includes)?;
        }
        map.end()
    }
}
