use modkit_db::{Direction, FindQuery, OrderBy, Record, StorageEngine};
use modkit_query::{QueryOptions, Sort, SortDir};
use modkit_security::ConstraintMap;
use serde_json::Value;
use tracing::{field, instrument};

use crate::config::CollectionConfig;
use crate::error::CollectionError;
use crate::filter::{by_id, check_payload, translate};
use crate::pagination::page_links;
use crate::relationships::{LinkTemplates, Relationships};
use crate::resource::{CollectionMeta, Resource, element_template};

/// A REST resource collection over one storage engine.
///
/// Stateless across calls: every operation builds its predicate, runs one
/// engine round trip (two for an update on engines that do not return rows)
/// and assembles a fresh [`Resource`].
///
/// Every operation takes an optional caller [`ConstraintMap`]. It is AND-ed
/// with whatever the request asks for and checked against write payloads, so
/// rows outside it are invisible: lookups return `None`, deletes count `0`.
pub struct Collection<S: StorageEngine> {
    name: String,
    store: S,
    relationships: Relationships<S::Join>,
    config: CollectionConfig,
}

impl<S: StorageEngine> std::fmt::Debug for Collection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("relationships", &self.relationships)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: StorageEngine> Collection<S> {
    /// `name` is the resource type, used as the sparse fieldset scope.
    #[must_use]
    pub fn new(name: impl Into<String>, store: S) -> Self {
        Self {
            name: name.into(),
            store,
            relationships: Relationships::new(),
            config: CollectionConfig::default(),
        }
    }

    #[must_use]
    pub fn with_relationships(mut self, relationships: Relationships<S::Join>) -> Self {
        self.relationships = relationships;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: CollectionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Sparse fieldset for this collection.
    ///
    /// Always includes the identifier and every field the requested
    /// relationship links are rendered from.
    fn projection<Q: QueryOptions>(
        &self,
        options: &Q,
        templates: &LinkTemplates,
    ) -> Option<Vec<String>> {
        options.fields_for(&self.name).map(|fields| {
            let mut out = fields.to_vec();
            let required = std::iter::once(self.config.id_field.as_str())
                .chain(templates.iter().flat_map(|(_, t)| t.fields()));
            for field in required {
                if !out.iter().any(|f| f == field) {
                    out.push(field.to_owned());
                }
            }
            out
        })
    }

    /// One page of rows matching the request's filter and the constraint.
    ///
    /// # Errors
    ///
    /// - [`CollectionError::InvalidFilter`] for an ill-typed filter;
    /// - [`CollectionError::Template`] when a link cannot be rendered;
    /// - [`CollectionError::Storage`] on engine failure.
    #[instrument(skip_all, fields(collection = %self.name, url = %url))]
    pub async fn list<Q: QueryOptions>(
        &self,
        url: &str,
        options: &Q,
        constraint: Option<&ConstraintMap>,
    ) -> Result<Resource, CollectionError> {
        let requested = options.page();
        let number = requested.number.max(1);
        let size = self.config.effective_page_size(requested.size);

        let predicate = translate(options.filter(), constraint)?;
        let resolved = self.relationships.resolve(options.include());
        let query = FindQuery {
            predicate,
            projection: self.projection(options, &resolved.templates),
            order: order_by(options.sort()),
            limit: Some(size),
            offset: (number - 1).saturating_mul(size),
            eager: resolved.eager,
        };
        if let Some(p) = &query.predicate {
            tracing::debug!(predicate = %p, "listing with predicate");
        }

        let found = self.store.find_matching(&query).await?;
        tracing::debug!(returned = found.rows.len(), total = found.total, "listed rows");

        let meta = CollectionMeta::new(found.total, number, size);
        let mut resource = Resource::collection(found.rows, url, &self.config.id_field, meta)?;
        resource.links = page_links(url, options, &meta.page);

        if !resolved.templates.is_empty() {
            let mut includes = Vec::new();
            for element in &mut resource.elements {
                element.flatten(&resolved.templates)?;
                includes.extend(element.take_includes());
            }
            resource.includes = includes;
        }
        Ok(resource)
    }

    /// The row with `id`, if it exists and satisfies the constraint.
    ///
    /// # Errors
    ///
    /// See [`Collection::list`].
    #[instrument(skip_all, fields(collection = %self.name, id = field::Empty))]
    pub async fn get<Q: QueryOptions>(
        &self,
        url: &str,
        id: impl Into<Value>,
        options: &Q,
        constraint: Option<&ConstraintMap>,
    ) -> Result<Option<Resource>, CollectionError> {
        let id = id.into();
        tracing::Span::current().record("id", field::display(&id));

        let predicate = by_id(&self.config.id_field, id, constraint)?;
        let resolved = self.relationships.resolve(options.include());
        let projection = self.projection(options, &resolved.templates);

        let Some(row) = self
            .store
            .find_one(Some(&predicate), projection.as_deref(), &resolved.eager)
            .await?
        else {
            tracing::debug!("row not found");
            return Ok(None);
        };

        let mut resource = Resource::single(row, url);
        resource.flatten(&resolved.templates)?;
        Ok(Some(resource))
    }

    /// Insert `payload` as given. With a constraint, every constrained field
    /// must be present and satisfied.
    ///
    /// # Errors
    ///
    /// - [`CollectionError::ConstraintViolation`] before anything is written;
    /// - [`CollectionError::InvalidFilter`] for an ill-typed constraint;
    /// - [`CollectionError::Template`] when the stored row has no identifier;
    /// - [`CollectionError::Storage`] on engine failure.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn create(
        &self,
        url: &str,
        payload: &Record,
        constraint: Option<&ConstraintMap>,
    ) -> Result<Resource, CollectionError> {
        if let Some(c) = constraint
            && let Err(e) = check_payload(payload, c)
        {
            tracing::warn!(error = %e, "create payload violates constraint");
            return Err(e);
        }

        let row = self.store.insert(payload).await?;
        let link = element_template(url, &self.config.id_field)?.render(&row.values)?;
        tracing::debug!(self_link = %link, "created row");
        Ok(Resource::single(row, link))
    }

    /// Apply `payload` to the row with `id` if it satisfies the constraint.
    ///
    /// As for [`Collection::create`], every constrained field must be present
    /// in the payload and satisfied; nothing is written otherwise.
    ///
    /// # Errors
    ///
    /// See [`Collection::create`].
    #[instrument(skip_all, fields(collection = %self.name, id = field::Empty))]
    pub async fn update(
        &self,
        url: &str,
        id: impl Into<Value>,
        payload: &Record,
        constraint: Option<&ConstraintMap>,
    ) -> Result<Option<Resource>, CollectionError> {
        let id = id.into();
        tracing::Span::current().record("id", field::display(&id));

        if let Some(c) = constraint
            && let Err(e) = check_payload(payload, c)
        {
            tracing::warn!(error = %e, "update payload violates constraint");
            return Err(e);
        }

        let predicate = by_id(&self.config.id_field, id.clone(), constraint)?;
        let outcome = self.store.update_matching(&predicate, payload).await?;
        if outcome.affected == 0 {
            tracing::debug!("no row matched");
            return Ok(None);
        }

        let row = match outcome.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => Some(row),
            None => {
                // Engine reported a count only; read back under the id the
                // row has now.
                let current_id = payload
                    .get(&self.config.id_field)
                    .cloned()
                    .unwrap_or(id);
                let predicate = by_id(&self.config.id_field, current_id, constraint)?;
                self.store.find_one(Some(&predicate), None, &[]).await?
            }
        };
        Ok(row.map(|row| Resource::single(row, url)))
    }

    /// Delete the row with `id` if it satisfies the constraint.
    ///
    /// Returns the number of rows removed; `0` is not an error.
    ///
    /// # Errors
    ///
    /// [`CollectionError::Storage`] on engine failure.
    #[instrument(skip_all, fields(collection = %self.name, id = field::Empty))]
    pub async fn delete(
        &self,
        id: impl Into<Value>,
        constraint: Option<&ConstraintMap>,
    ) -> Result<u64, CollectionError> {
        let id = id.into();
        tracing::Span::current().record("id", field::display(&id));

        let predicate = by_id(&self.config.id_field, id, constraint)?;
        let removed = self.store.delete_matching(&predicate).await?;
        tracing::debug!(removed, "deleted rows");
        Ok(removed)
    }
}

fn order_by(sort: Option<&Sort>) -> Vec<OrderBy> {
    sort.map(|s| {
        s.iter()
            .map(|(field, dir)| {
                let direction = match dir {
                    SortDir::Asc => Direction::Asc,
                    SortDir::Desc => Direction::Desc,
                };
                OrderBy::new(field, direction)
            })
            .collect()
    })
    .unwrap_or_default()
}
