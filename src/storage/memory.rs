use super::Persistence;
use crate::error::{PuffError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory persistence backend.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryPersistence {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys written so far.
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Persistence for MemoryPersistence {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|e| PuffError::persistence(format!("failed to acquire read lock: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| PuffError::persistence(format!("failed to acquire write lock: {}", e)))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_and_get() {
        let persistence = MemoryPersistence::new();
        assert!(persistence.is_empty());
        assert!(persistence.get("identities").unwrap().is_none());

        persistence.save("identities", &json!({"alice": {}})).unwrap();
        persistence.save("identities", &json!({"bob": {}})).unwrap();

        assert_eq!(persistence.len(), 1);
        assert_eq!(
            persistence.get("identities").unwrap(),
            Some(json!({"bob": {}}))
        );
    }
}
