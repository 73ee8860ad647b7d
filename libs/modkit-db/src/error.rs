use thiserror::Error;

/// Engine failure. Propagated unchanged by the collection layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error("failed to build statement: {0}")]
    Query(String),

    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("table '{table}' does not exist")]
    MissingTable { table: String },

    #[error("duplicate key {key} in table '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("statement returned no row")]
    NoRowReturned,
}

impl StorageError {
    pub(crate) fn missing_table(table: &str) -> Self {
        Self::MissingTable {
            table: table.to_owned(),
        }
    }
}
