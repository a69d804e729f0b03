//! # Store Config
//!
//! Data node over a remote key-value store (a SQL table, a document
//! collection, an etcd prefix...). The store connector only has to list its
//! rows; each row becomes one top-level key of the snapshot.

use crate::Result;
use crate::data::{DataConfig, ReadContext, Source};
use std::sync::Arc;
use strata_core::{ConfigMap, Value};

/// A connector listing `(key, value)` rows.
///
/// Connectors enforce their own I/O timeouts; `fetch` blocks until the rows
/// are available or the connector gives up.
pub trait KeyValueStore: Send + Sync {
    fn fetch(&self) -> Result<Vec<(String, Value)>>;

    fn describe(&self) -> String {
        "key-value store".to_string()
    }
}

pub struct StoreSource {
    store: Arc<dyn KeyValueStore>,
}

impl Source for StoreSource {
    fn read(&self, _ctx: &ReadContext<'_>) -> Result<ConfigMap> {
        Ok(self.store.fetch()?.into_iter().collect())
    }

    fn describe(&self) -> String {
        self.store.describe()
    }
}

pub type StoreConfig = DataConfig<StoreSource>;

impl DataConfig<StoreSource> {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_source(StoreSource { store })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ConfigNode, ConfigNodeExt};
    use errors::ConfigError;
    use parking_lot::Mutex;

    struct TableStore {
        rows: Mutex<Result<Vec<(String, Value)>>>,
    }

    impl TableStore {
        fn new(rows: Vec<(&str, Value)>) -> Self {
            Self {
                rows: Mutex::new(Ok(rows.into_iter().map(|(k, v)| (k.to_string(), v)).collect())),
            }
        }

        fn fail(&self) {
            *self.rows.lock() = Err(ConfigError::Source {
                source_name: "table".to_string(),
                reason: "connection refused".to_string(),
            });
        }
    }

    impl KeyValueStore for TableStore {
        fn fetch(&self) -> Result<Vec<(String, Value)>> {
            match &*self.rows.lock() {
                Ok(rows) => Ok(rows.clone()),
                Err(e) => Err(ConfigError::Source {
                    source_name: "table".to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        fn describe(&self) -> String {
            "table".to_string()
        }
    }

    #[test]
    fn test_rows_become_keys() {
        let store = Arc::new(TableStore::new(vec![
            ("db.host", Value::from("h1")),
            ("timeout", Value::Int(30)),
        ]));
        let config = StoreConfig::new(store);
        config.load().unwrap();

        assert_eq!(config.get_str("db.host", "").unwrap(), "h1");
        assert_eq!(config.get_int("TIMEOUT", 0).unwrap(), 30);
        assert_eq!(config.describe(), "table");
    }

    #[test]
    fn test_fetch_failure_keeps_snapshot() {
        let store = Arc::new(TableStore::new(vec![("key", Value::from("v"))]));
        let config = StoreConfig::new(store.clone());
        config.load().unwrap();

        store.fail();
        let err = config.load().unwrap_err();

        assert!(err.to_string().contains("connection refused"));
        assert_eq!(config.get_str("key", "").unwrap(), "v");
    }
}
