use crate::row::Row;
use crate::where_clause::WhereClause;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    #[must_use]
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// An association to load eagerly, attached to each row under `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EagerLoad<J> {
    pub name: String,
    pub join: J,
}

impl<J> EagerLoad<J> {
    #[must_use]
    pub fn new(name: impl Into<String>, join: J) -> Self {
        Self {
            name: name.into(),
            join,
        }
    }
}

/// Capability of a relationship descriptor to produce an engine join spec.
///
/// Keeps relationship registries independent of the concrete engine.
pub trait Association<J>: Send + Sync {
    fn describe_join(&self) -> J;
}

/// How a related table is reached from the parent table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinKind {
    /// `parent.foreign_key = related.target_key`; loads a single row.
    BelongsTo {
        foreign_key: String,
        target_key: String,
    },
    /// `related.foreign_key = parent.source_key`; loads a single row.
    HasOne {
        foreign_key: String,
        source_key: String,
    },
    /// `related.foreign_key = parent.source_key`; loads all matching rows.
    HasMany {
        foreign_key: String,
        source_key: String,
    },
}

/// Join description understood by the bundled engines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinSpec {
    pub table: String,
    pub kind: JoinKind,
}

impl JoinSpec {
    /// Parent holds `foreign_key` pointing at the related table's `id`.
    #[must_use]
    pub fn belongs_to(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kind: JoinKind::BelongsTo {
                foreign_key: foreign_key.into(),
                target_key: "id".to_owned(),
            },
        }
    }

    /// Related table holds `foreign_key` pointing at the parent's `id`.
    #[must_use]
    pub fn has_one(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kind: JoinKind::HasOne {
                foreign_key: foreign_key.into(),
                source_key: "id".to_owned(),
            },
        }
    }

    /// Related table holds `foreign_key` pointing at the parent's `id`.
    #[must_use]
    pub fn has_many(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kind: JoinKind::HasMany {
                foreign_key: foreign_key.into(),
                source_key: "id".to_owned(),
            },
        }
    }

    /// Replace the parent/target key (default `id`) on the non-foreign side.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        match &mut self.kind {
            JoinKind::BelongsTo { target_key, .. } => *target_key = key.into(),
            JoinKind::HasOne { source_key, .. } | JoinKind::HasMany { source_key, .. } => {
                *source_key = key.into();
            }
        }
        self
    }

    /// Column of the parent row the join reads.
    #[must_use]
    pub fn parent_column(&self) -> &str {
        match &self.kind {
            JoinKind::BelongsTo { foreign_key, .. } => foreign_key,
            JoinKind::HasOne { source_key, .. } | JoinKind::HasMany { source_key, .. } => {
                source_key
            }
        }
    }

    /// Column of the related table matched against [`Self::parent_column`].
    #[must_use]
    pub fn related_column(&self) -> &str {
        match &self.kind {
            JoinKind::BelongsTo { target_key, .. } => target_key,
            JoinKind::HasOne { foreign_key, .. } | JoinKind::HasMany { foreign_key, .. } => {
                foreign_key
            }
        }
    }
}

impl Association<JoinSpec> for JoinSpec {
    fn describe_join(&self) -> JoinSpec {
        self.clone()
    }
}

/// A paged, filtered, projected read.
#[derive(Clone, Debug, PartialEq)]
pub struct FindQuery<J> {
    pub predicate: Option<WhereClause>,
    /// Columns to return; `None` means all.
    pub projection: Option<Vec<String>>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub eager: Vec<EagerLoad<J>>,
}

impl<J> Default for FindQuery<J> {
    fn default() -> Self {
        Self {
            predicate: None,
            projection: None,
            order: Vec::new(),
            limit: None,
            offset: 0,
            eager: Vec::new(),
        }
    }
}

/// One page of rows plus the total number of matches ignoring paging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FoundRows {
    pub rows: Vec<Row>,
    pub total: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateOutcome {
    pub affected: u64,
    /// Updated rows, for engines able to return them.
    pub rows: Option<Vec<Row>>,
}
