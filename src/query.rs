// 🔍 Query Service - read-only access to stored players

use crate::error::QueryError;
use crate::record::{PlayerRecord, StoredRecord};
use crate::store::RecordStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn RecordStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        QueryService { store }
    }

    /// Latest snapshot for `name`. `Ok(None)` is a normal "not found".
    pub fn lookup(&self, name: &str) -> Result<Option<PlayerRecord>, QueryError> {
        let name = validate_name(name)?;
        Ok(self.store.find_by_name(name)?)
    }

    /// All snapshots for `name`, newest first
    pub fn history(&self, name: &str) -> Result<Vec<StoredRecord>, QueryError> {
        let name = validate_name(name)?;
        Ok(self.store.history(name)?)
    }
}

fn validate_name(name: &str) -> Result<&str, QueryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(QueryError::Validation(
            "player name must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
