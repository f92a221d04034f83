//! In-memory catalog with operation recording.
//!
//! Answers the general queries the engines issue by parsing them with
//! [`CatalogQuery::parse`] and evaluating them against small in-memory
//! tables, so tests exercise the exact query strings sent to a real catalog.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use imprint_core::catalog::{Catalog, CatalogQuery, Column, ObjectStore};
use imprint_core::{Avu, Error, ModAvuInput, Result, path};

/// Record of a catalog operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOp {
    /// General query.
    Query {
        /// Query string as received.
        query: String,
    },
    /// Data object existence check.
    IsDataObject {
        /// Path that was checked.
        path: String,
    },
    /// Object read.
    Read {
        /// Path that was read.
        path: String,
    },
    /// Recursive object listing.
    List {
        /// Collection that was listed.
        collection: String,
    },
}

#[derive(Debug, Default)]
struct CatalogState {
    collections: BTreeSet<String>,
    objects: BTreeMap<String, Bytes>,
    object_avus: Vec<(String, Avu)>,
    collection_avus: Vec<(String, Avu)>,
    user_avus: Vec<(String, Avu)>,
    ops: Vec<CatalogOp>,
    fail_queries: bool,
}

type Row = HashMap<Column, String>;

impl CatalogState {
    fn add_collection(&mut self, collection: &str) {
        let collection = path::normalize(collection).to_string();
        for ancestor in path::ancestors(&collection) {
            self.collections.insert(ancestor.to_string());
        }
        self.collections.insert(collection);
    }

    fn tables(&self) -> Vec<Vec<Row>> {
        let object_avus = self
            .object_avus
            .iter()
            .map(|(object, avu)| {
                let (collection, name) = path::split(object);
                HashMap::from([
                    (Column::CollName, collection.to_string()),
                    (Column::DataName, name.to_string()),
                    (Column::MetaDataAttrName, avu.attribute.clone()),
                    (Column::MetaDataAttrValue, avu.value.clone()),
                    (Column::MetaDataAttrUnits, avu.units.clone()),
                ])
            })
            .collect();
        let collection_avus = self
            .collection_avus
            .iter()
            .map(|(collection, avu)| {
                HashMap::from([
                    (Column::CollName, collection.clone()),
                    (Column::MetaCollAttrName, avu.attribute.clone()),
                    (Column::MetaCollAttrValue, avu.value.clone()),
                    (Column::MetaCollAttrUnits, avu.units.clone()),
                ])
            })
            .collect();
        let user_avus = self
            .user_avus
            .iter()
            .map(|(user, avu)| {
                HashMap::from([
                    (Column::UserName, user.clone()),
                    (Column::MetaUserAttrName, avu.attribute.clone()),
                    (Column::MetaUserAttrValue, avu.value.clone()),
                ])
            })
            .collect();
        let objects = self
            .objects
            .keys()
            .map(|object| {
                let (collection, name) = path::split(object);
                HashMap::from([
                    (Column::CollName, collection.to_string()),
                    (Column::DataName, name.to_string()),
                ])
            })
            .collect();
        let collections = self
            .collections
            .iter()
            .map(|collection| HashMap::from([(Column::CollName, collection.clone())]))
            .collect();

        vec![object_avus, collection_avus, user_avus, objects, collections]
    }

    fn evaluate(&self, query: &CatalogQuery) -> Vec<Vec<String>> {
        let wanted: Vec<Column> = query
            .select
            .iter()
            .copied()
            .chain(query.conditions.iter().map(|c| c.column))
            .collect();

        // The narrowest table holding every referenced column answers the
        // query, even when it has no rows.
        let columns: [&[Column]; 5] = [
            &[
                Column::CollName,
                Column::DataName,
                Column::MetaDataAttrName,
                Column::MetaDataAttrValue,
                Column::MetaDataAttrUnits,
            ],
            &[
                Column::CollName,
                Column::MetaCollAttrName,
                Column::MetaCollAttrValue,
                Column::MetaCollAttrUnits,
            ],
            &[
                Column::UserName,
                Column::MetaUserAttrName,
                Column::MetaUserAttrValue,
            ],
            &[Column::CollName, Column::DataName],
            &[Column::CollName],
        ];
        let Some((index, _)) = columns
            .iter()
            .enumerate()
            .filter(|(_, table)| wanted.iter().all(|c| table.contains(c)))
            .min_by_key(|(_, table)| table.len())
        else {
            return Vec::new();
        };

        self.tables()
            .swap_remove(index)
            .into_iter()
            .filter(|row| {
                query
                    .conditions
                    .iter()
                    .all(|c| row.get(&c.column).is_some_and(|v| *v == c.value))
            })
            .map(|row| {
                query
                    .select
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

/// In-memory catalog for tests.
///
/// ## Example
///
/// ```rust
/// use imprint_core::Avu;
/// use imprint_test_utils::InMemoryCatalog;
///
/// let catalog = InMemoryCatalog::new();
/// catalog.add_data_object("/tempZone/home/alice/file.csv", "a,b\n");
/// catalog.add_collection_avu(
///     "/tempZone/home/alice",
///     Avu::new("irods::publishing::publish", "dataworld", ""),
/// );
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection and its ancestors.
    pub fn add_collection(&self, collection: &str) {
        self.state.lock().unwrap().add_collection(collection);
    }

    /// Adds a data object (and its parent collections) with `contents`.
    pub fn add_data_object(&self, object: &str, contents: impl Into<Bytes>) {
        let mut state = self.state.lock().unwrap();
        if let Some(parent) = path::parent(object) {
            state.add_collection(parent);
        }
        state.objects.insert(object.to_string(), contents.into());
    }

    /// Attaches metadata to a data object.
    pub fn add_object_avu(&self, object: &str, avu: Avu) {
        self.state
            .lock()
            .unwrap()
            .object_avus
            .push((object.to_string(), avu));
    }

    /// Attaches metadata to a collection.
    pub fn add_collection_avu(&self, collection: &str, avu: Avu) {
        let mut state = self.state.lock().unwrap();
        state.add_collection(collection);
        state
            .collection_avus
            .push((path::normalize(collection).to_string(), avu));
    }

    /// Attaches metadata to a user.
    pub fn add_user_avu(&self, user: &str, attribute: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .user_avus
            .push((user.to_string(), Avu::new(attribute, value, "")));
    }

    /// Removes every metadata row named `attribute` from a data object or collection.
    pub fn remove_avus(&self, target: &str, attribute: &str) {
        let mut state = self.state.lock().unwrap();
        let target = path::normalize(target);
        state
            .object_avus
            .retain(|(p, avu)| !(p == target && avu.attribute == attribute));
        state
            .collection_avus
            .retain(|(p, avu)| !(p == target && avu.attribute == attribute));
    }

    /// Commits a metadata modification the way the host does between the
    /// pre and post events.
    pub fn apply_mod_avu(&self, input: &ModAvuInput) {
        let avu = Avu::new(&input.attribute, &input.value, &input.units);
        let object = input.item_type == "-d";
        match input.operation.as_str() {
            "add" => {
                let exists = {
                    let state = self.state.lock().unwrap();
                    let rows = if object {
                        &state.object_avus
                    } else {
                        &state.collection_avus
                    };
                    rows.iter().any(|(p, a)| *p == input.path && *a == avu)
                };
                if !exists {
                    if object {
                        self.add_object_avu(&input.path, avu);
                    } else {
                        self.add_collection_avu(&input.path, avu);
                    }
                }
            }
            "set" => {
                self.remove_avus(&input.path, &input.attribute);
                if object {
                    self.add_object_avu(&input.path, avu);
                } else {
                    self.add_collection_avu(&input.path, avu);
                }
            }
            "rm" => {
                let mut state = self.state.lock().unwrap();
                let rows = if object {
                    &mut state.object_avus
                } else {
                    &mut state.collection_avus
                };
                rows.retain(|(p, a)| !(*p == input.path && *a == avu));
            }
            _ => {}
        }
    }

    /// Makes every later query and lookup fail (or succeed again).
    pub fn fail_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_queries = fail;
    }

    /// Returns all recorded operations.
    pub fn operations(&self) -> Vec<CatalogOp> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Returns the query strings received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                CatalogOp::Query { query } => Some(query),
                _ => None,
            })
            .collect()
    }

    /// Number of catalog round trips (queries and existence checks).
    pub fn round_trips(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, CatalogOp::Query { .. } | CatalogOp::IsDataObject { .. }))
            .count()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.state.lock().unwrap().ops.clear();
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn query(&self, query: &str) -> Result<Vec<Vec<String>>> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(CatalogOp::Query {
            query: query.to_string(),
        });
        if state.fail_queries {
            return Err(Error::catalog_query("injected catalog failure"));
        }
        let parsed = CatalogQuery::parse(query)?;
        Ok(state.evaluate(&parsed))
    }

    async fn is_data_object(&self, path: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(CatalogOp::IsDataObject {
            path: path.to_string(),
        });
        if state.fail_queries {
            return Err(Error::catalog_query("injected catalog failure"));
        }
        Ok(state.objects.contains_key(path))
    }
}

#[async_trait]
impl ObjectStore for InMemoryCatalog {
    async fn read(&self, object: &str) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(CatalogOp::Read {
            path: object.to_string(),
        });
        state
            .objects
            .get(object)
            .cloned()
            .ok_or_else(|| Error::catalog_query(format!("no data object at [{object}]")))
    }

    async fn list_data_objects(&self, collection: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(CatalogOp::List {
            collection: collection.to_string(),
        });
        Ok(state
            .objects
            .keys()
            .filter(|object| path::is_within(object, collection))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_collection_metadata_queries() {
        let catalog = InMemoryCatalog::new();
        catalog.add_collection_avu("/z/home/alice", Avu::new("marker", "dataworld", "v1"));

        let query = CatalogQuery::select([Column::MetaCollAttrValue, Column::MetaCollAttrUnits])
            .filter(Column::MetaCollAttrName, "marker")
            .filter(Column::CollName, "/z/home/alice");
        let rows = catalog.query(&query.to_string()).await.unwrap();
        assert_eq!(rows, vec![vec!["dataworld".to_string(), "v1".to_string()]]);

        let other = CatalogQuery::select([Column::MetaCollAttrValue])
            .filter(Column::MetaCollAttrName, "marker")
            .filter(Column::CollName, "/z/home");
        assert!(catalog.query(&other.to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn answers_object_and_user_queries() {
        let catalog = InMemoryCatalog::new();
        catalog.add_data_object("/z/home/alice/a.csv", "x");
        catalog.add_object_avu("/z/home/alice/a.csv", Avu::new("marker", "dw", ""));
        catalog.add_user_avu("alice", "token", "secret");

        let object = CatalogQuery::select([Column::MetaDataAttrValue])
            .filter(Column::MetaDataAttrName, "marker")
            .filter(Column::CollName, "/z/home/alice")
            .filter(Column::DataName, "a.csv");
        assert_eq!(catalog.query(&object.to_string()).await.unwrap().len(), 1);

        let user = CatalogQuery::select([Column::MetaUserAttrValue])
            .filter(Column::UserName, "alice")
            .filter(Column::MetaUserAttrName, "token");
        assert_eq!(
            catalog.query(&user.to_string()).await.unwrap(),
            vec![vec!["secret".to_string()]]
        );

        assert!(catalog.is_data_object("/z/home/alice/a.csv").await.unwrap());
        assert!(!catalog.is_data_object("/z/home/alice").await.unwrap());
    }

    #[tokio::test]
    async fn injected_failures_are_recorded() {
        let catalog = InMemoryCatalog::new();
        catalog.fail_queries(true);
        assert!(catalog.query("SELECT COLL_NAME").await.is_err());
        assert!(catalog.is_data_object("/z").await.is_err());
        assert_eq!(catalog.round_trips(), 2);
    }

    #[tokio::test]
    async fn lists_objects_recursively() {
        let catalog = InMemoryCatalog::new();
        catalog.add_data_object("/z/ds/a", "1");
        catalog.add_data_object("/z/ds/sub/b", "2");
        catalog.add_data_object("/z/dsx/c", "3");

        let listed = catalog.list_data_objects("/z/ds").await.unwrap();
        assert_eq!(listed, vec!["/z/ds/a".to_string(), "/z/ds/sub/b".to_string()]);
        assert_eq!(catalog.read("/z/ds/a").await.unwrap(), Bytes::from("1"));
        assert!(catalog.read("/z/missing").await.is_err());
    }
}
