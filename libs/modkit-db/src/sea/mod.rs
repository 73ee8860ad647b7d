//! `SeaORM` engine: [`WhereClause`](crate::WhereClause) compilation and a
//! dynamic-table [`StorageEngine`](crate::StorageEngine).

mod cond;
mod store;

pub use cond::json_to_sea_value;
pub use store::SeaOrmStore;
