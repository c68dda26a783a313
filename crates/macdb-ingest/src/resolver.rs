use std::sync::Arc;

use macdb_db::NewCategory;

use crate::error::StoreError;
use crate::store::{Category, CategoryStore};

/// Catalog ids a scraped category maps to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedCategory {
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
}

impl ResolvedCategory {
    fn top(category: &Category) -> Self {
        Self {
            category_id: Some(category.id),
            subcategory_id: None,
        }
    }

    fn pair(parent_id: i64, child_id: i64) -> Self {
        Self {
            category_id: Some(parent_id),
            subcategory_id: Some(child_id),
        }
    }

    fn placed(category: &Category) -> Self {
        match category.parent_id {
            Some(parent_id) => Self::pair(parent_id, category.id),
            None => Self::top(category),
        }
    }
}

/// Maps scraped category names and source ids onto catalog categories,
/// creating missing ones.
///
/// Resolution order:
/// 1. a known source id wins and yields its stored placement;
/// 2. a name with a parent name finds or creates the parent at top level and
///    the child beneath it;
/// 3. a bare name finds or creates a top-level category;
/// 4. nothing usable resolves to no ids.
///
/// There is no cross-record locking; the store's create is idempotent so two
/// records racing on the same new category end up with the same row.
pub struct CategoryResolver<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for CategoryResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CategoryStore + ?Sized> CategoryResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if a lookup or insert fails.
    pub async fn resolve(
        &self,
        name: &str,
        parent_name: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<ResolvedCategory, StoreError> {
        let external_id = external_id.map(str::trim).filter(|e| !e.is_empty());
        if let Some(external_id) = external_id {
            if let Some(found) = self.store.find_category_by_external_id(external_id).await? {
                return Ok(ResolvedCategory::placed(&found));
            }
        }

        let name = name.trim();
        if name.is_empty() {
            return Ok(ResolvedCategory::default());
        }

        let parent_name = parent_name.map(str::trim).filter(|p| !p.is_empty() && *p != name);
        match parent_name {
            Some(parent_name) => {
                let parent = self.find_or_create(parent_name, None, None).await?;
                let child = self
                    .find_or_create(name, Some(parent.id), external_id)
                    .await?;
                Ok(ResolvedCategory::pair(parent.id, child.id))
            }
            None => {
                let category = self.find_or_create(name, None, external_id).await?;
                Ok(ResolvedCategory::top(&category))
            }
        }
    }

    async fn find_or_create(
        &self,
        name: &str,
        parent_id: Option<i64>,
        external_id: Option<&str>,
    ) -> Result<Category, StoreError> {
        if let Some(found) = self.store.find_category_by_name(name, parent_id).await? {
            return Ok(found);
        }
        tracing::info!(category = name, ?parent_id, "creating category");
        self.store
            .create_category(NewCategory {
                name,
                parent_id,
                external_id,
                description: None,
            })
            .await
    }
}
