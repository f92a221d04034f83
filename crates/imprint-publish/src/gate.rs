//! Metadata gate.
//!
//! Read-only checks against the catalog that decide whether a path is
//! published. A path is published when the publish marker attribute is
//! attached to it or to any collection above it.
//!
//! Catalog failures are treated as "not published": the failure is logged at
//! `warn`, counted, and the operation is allowed to proceed.

use imprint_core::catalog::{Catalog, CatalogQuery, Column};
use imprint_core::path;
use imprint_core::{Avu, MetadataTarget, Result};

use crate::metrics::PublishMetrics;

/// Catalog-backed publish checks for one marker attribute.
#[derive(Clone, Copy)]
pub struct MetadataGate<'a> {
    catalog: &'a dyn Catalog,
    marker: &'a str,
    metrics: PublishMetrics,
}

impl std::fmt::Debug for MetadataGate<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataGate")
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

impl<'a> MetadataGate<'a> {
    /// Creates a gate checking for `marker` through `catalog`.
    #[must_use]
    pub fn new(catalog: &'a dyn Catalog, marker: &'a str) -> Self {
        Self {
            catalog,
            marker,
            metrics: PublishMetrics::new(),
        }
    }

    /// The marker attribute this gate checks for.
    #[must_use]
    pub const fn marker(&self) -> &'a str {
        self.marker
    }

    /// Returns true if the marker is attached directly to `path`.
    ///
    /// Data objects are checked through object metadata, anything else
    /// through collection metadata.
    pub async fn is_published(&self, path: &str) -> bool {
        let lookup = async {
            let query = if self.catalog.is_data_object(path).await? {
                self.object_marker_query(path)
            } else {
                self.collection_marker_query(path)
            };
            self.any_rows(&query).await
        };
        self.fail_open(path, lookup.await)
    }

    /// Returns true if `path` or any collection above it, up to `/`, is published.
    pub async fn is_published_in_ancestry(&self, path: &str) -> bool {
        if self.is_published(path).await {
            return true;
        }
        for ancestor in path::ancestors(path) {
            let query = self.collection_marker_query(ancestor);
            if self.fail_open(ancestor, self.any_rows(&query).await) {
                tracing::debug!(path, ancestor, "published ancestor found");
                return true;
            }
        }
        false
    }

    /// Returns true if `target` already carries exactly `avu`.
    pub async fn metadata_exists(&self, target: &MetadataTarget, avu: &Avu) -> bool {
        let query = match target {
            MetadataTarget::DataObject(p) => {
                let (collection, name) = path::split(p);
                CatalogQuery::select([Column::MetaDataAttrValue, Column::MetaDataAttrUnits])
                    .filter(Column::MetaDataAttrName, avu.attribute.as_str())
                    .filter(Column::CollName, collection)
                    .filter(Column::DataName, name)
            }
            MetadataTarget::Collection(p) => {
                CatalogQuery::select([Column::MetaCollAttrValue, Column::MetaCollAttrUnits])
                    .filter(Column::MetaCollAttrName, avu.attribute.as_str())
                    .filter(Column::CollName, path::normalize(p))
            }
        };

        let rows = match self.catalog.query(&query.to_string()).await {
            Ok(rows) => rows,
            Err(e) => return self.fail_open(target.path(), Err(e)),
        };

        rows.iter().any(|row| match row.as_slice() {
            [value, units, ..] => *value == avu.value && *units == avu.units,
            [value] => *value == avu.value && avu.units.is_empty(),
            [] => false,
        })
    }

    fn object_marker_query(&self, object_path: &str) -> CatalogQuery {
        let (collection, name) = path::split(object_path);
        CatalogQuery::select([Column::MetaDataAttrValue, Column::MetaDataAttrUnits])
            .filter(Column::MetaDataAttrName, self.marker)
            .filter(Column::CollName, collection)
            .filter(Column::DataName, name)
    }

    fn collection_marker_query(&self, collection_path: &str) -> CatalogQuery {
        CatalogQuery::select([Column::MetaCollAttrValue, Column::MetaCollAttrUnits])
            .filter(Column::MetaCollAttrName, self.marker)
            .filter(Column::CollName, path::normalize(collection_path))
    }

    async fn any_rows(&self, query: &CatalogQuery) -> Result<bool> {
        Ok(!self.catalog.query(&query.to_string()).await?.is_empty())
    }

    fn fail_open<T: Default>(&self, path: &str, result: Result<T>) -> T {
        result.unwrap_or_else(|error| {
            self.metrics.record_catalog_failure();
            tracing::warn!(path, %error, "catalog query failed, treating as not published");
            T::default()
        })
    }
}
