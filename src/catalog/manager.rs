use anyhow::{bail, Context, Result};
use std::sync::Arc;

use crate::api::{Category, CategoryDraft, CatalogClient, Subcategory, SubcategoryDraft};
use crate::cache::{DataGroupKey, Invalidate, MatchMode, QueryCache};
use crate::refresh::RefreshHandle;
use crate::util::{catch_task_panic, strip_control_chars};

const CATEGORIES: &str = "categories";
const SUBCATEGORIES: &str = "subcategories";
const PRODUCTS: &str = "products";

/// Category and subcategory administration on top of the query cache.
///
/// Reads go through the cache; mutations go straight to the API and then
/// invalidate the groups they touched.
pub struct CategoryManager {
    pub(super) client: Arc<CatalogClient>,
    pub(super) cache: Arc<QueryCache>,
    pub(super) stats_concurrency: usize,
}

impl CategoryManager {
    /// Longest accepted category or subcategory name, in characters.
    pub const MAX_NAME_LEN: usize = 100;

    const DEFAULT_STATS_CONCURRENCY: usize = 8;

    pub fn new(client: Arc<CatalogClient>, cache: Arc<QueryCache>) -> Self {
        Self {
            client,
            cache,
            stats_concurrency: Self::DEFAULT_STATS_CONCURRENCY,
        }
    }

    /// Cap on concurrent product-count requests made by [`stats`](Self::stats).
    pub fn with_stats_concurrency(mut self, limit: usize) -> Self {
        self.stats_concurrency = limit.max(1);
        self
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// The groups the category screen refreshes together.
    pub fn data_groups() -> Vec<DataGroupKey> {
        vec![
            DataGroupKey::from(CATEGORIES),
            DataGroupKey::from(SUBCATEGORIES),
            DataGroupKey::from(PRODUCTS),
        ]
    }

    fn product_key(category_id: &str) -> DataGroupKey {
        DataGroupKey::new([PRODUCTS, "category", category_id])
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn categories(&self) -> Result<Vec<Category>> {
        let client = Arc::clone(&self.client);
        let categories = self
            .cache
            .get_or_fetch(DataGroupKey::from(CATEGORIES), move || {
                let client = Arc::clone(&client);
                async move { client.list_categories().await }
            })
            .await?;
        Ok(categories)
    }

    pub async fn subcategories(&self) -> Result<Vec<Subcategory>> {
        let client = Arc::clone(&self.client);
        let subcategories = self
            .cache
            .get_or_fetch(DataGroupKey::from(SUBCATEGORIES), move || {
                let client = Arc::clone(&client);
                async move { client.list_subcategories().await }
            })
            .await?;
        Ok(subcategories)
    }

    /// Subcategories whose parent is `category_id`.
    pub async fn subcategories_of(&self, category_id: &str) -> Result<Vec<Subcategory>> {
        Ok(self
            .subcategories()
            .await?
            .into_iter()
            .filter(|s| s.category_id == category_id)
            .collect())
    }

    /// Number of products filed under `category_id`.
    pub async fn product_count(&self, category_id: &str) -> Result<usize> {
        let client = Arc::clone(&self.client);
        let id = category_id.to_owned();
        let products: Vec<crate::api::Product> = self
            .cache
            .get_or_fetch(Self::product_key(category_id), move || {
                let client = Arc::clone(&client);
                let id = id.clone();
                async move { client.list_products_by_category(&id).await }
            })
            .await?;
        Ok(products.len())
    }

    async fn find_category(&self, id: &str) -> Result<Category> {
        self.categories()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .with_context(|| format!("Category {id} not found"))
    }

    async fn find_subcategory(&self, id: &str) -> Result<Subcategory> {
        self.subcategories()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .with_context(|| format!("Subcategory {id} not found"))
    }

    // ========================================================================
    // Category mutations
    // ========================================================================

    pub async fn create_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        let draft = CategoryDraft {
            name: sanitize_name(name)?,
            description: clean_description(description),
            is_active: true,
        };
        let created = self
            .client
            .create_category(&draft)
            .await
            .context("Failed to create category")?;
        tracing::info!(id = %created.id, name = %created.name, "Category created");
        self.invalidate(&[DataGroupKey::from(CATEGORIES)]).await;
        Ok(created)
    }

    /// Rename a category and replace its description. Active state is kept.
    pub async fn update_category(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category> {
        let current = self.find_category(id).await?;
        let draft = CategoryDraft {
            name: sanitize_name(name)?,
            description: clean_description(description),
            ..CategoryDraft::from(&current)
        };
        self.put_category(id, &draft).await
    }

    pub async fn set_category_active(&self, id: &str, active: bool) -> Result<Category> {
        let current = self.find_category(id).await?;
        let draft = CategoryDraft {
            is_active: active,
            ..CategoryDraft::from(&current)
        };
        self.put_category(id, &draft).await
    }

    async fn put_category(&self, id: &str, draft: &CategoryDraft) -> Result<Category> {
        let updated = self
            .client
            .update_category(id, draft)
            .await
            .with_context(|| format!("Failed to update category {id}"))?;
        tracing::info!(id, name = %updated.name, active = updated.is_active, "Category updated");
        self.invalidate(&[DataGroupKey::from(CATEGORIES)]).await;
        Ok(updated)
    }

    /// Delete a category. Its subcategories and product counts are refetched
    /// or dropped, since the server may cascade.
    pub async fn delete_category(&self, id: &str) -> Result<()> {
        self.client
            .delete_category(id)
            .await
            .with_context(|| format!("Failed to delete category {id}"))?;
        tracing::info!(id, "Category deleted");
        self.cache.remove(&Self::product_key(id), MatchMode::Exact);
        self.invalidate(&[DataGroupKey::from(CATEGORIES), DataGroupKey::from(SUBCATEGORIES)])
            .await;
        Ok(())
    }

    // ========================================================================
    // Subcategory mutations
    // ========================================================================

    pub async fn create_subcategory(
        &self,
        category_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Subcategory> {
        let name = sanitize_name(name)?;
        self.find_category(category_id)
            .await
            .context("Subcategory needs an existing parent category")?;

        let draft = SubcategoryDraft {
            name,
            category_id: category_id.to_owned(),
            description: clean_description(description),
            is_active: true,
        };
        let created = self
            .client
            .create_subcategory(&draft)
            .await
            .context("Failed to create subcategory")?;
        tracing::info!(id = %created.id, category_id, name = %created.name, "Subcategory created");
        self.invalidate(&[DataGroupKey::from(SUBCATEGORIES)]).await;
        Ok(created)
    }

    /// Rename a subcategory, replace its description and optionally move it
    /// under another category.
    pub async fn update_subcategory(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        move_to: Option<&str>,
    ) -> Result<Subcategory> {
        let name = sanitize_name(name)?;
        let current = self.find_subcategory(id).await?;
        if let Some(parent) = move_to {
            self.find_category(parent)
                .await
                .context("Subcategory needs an existing parent category")?;
        }

        let draft = SubcategoryDraft {
            name,
            category_id: move_to.map_or_else(|| current.category_id.clone(), str::to_owned),
            description: clean_description(description),
            is_active: current.is_active,
        };
        self.put_subcategory(id, &draft).await
    }

    pub async fn set_subcategory_active(&self, id: &str, active: bool) -> Result<Subcategory> {
        let current = self.find_subcategory(id).await?;
        let draft = SubcategoryDraft {
            is_active: active,
            ..SubcategoryDraft::from(&current)
        };
        self.put_subcategory(id, &draft).await
    }

    async fn put_subcategory(&self, id: &str, draft: &SubcategoryDraft) -> Result<Subcategory> {
        let updated = self
            .client
            .update_subcategory(id, draft)
            .await
            .with_context(|| format!("Failed to update subcategory {id}"))?;
        tracing::info!(id, name = %updated.name, active = updated.is_active, "Subcategory updated");
        self.invalidate(&[DataGroupKey::from(SUBCATEGORIES)]).await;
        Ok(updated)
    }

    pub async fn delete_subcategory(&self, id: &str) -> Result<()> {
        self.client
            .delete_subcategory(id)
            .await
            .with_context(|| format!("Failed to delete subcategory {id}"))?;
        tracing::info!(id, "Subcategory deleted");
        self.invalidate(&[DataGroupKey::from(SUBCATEGORIES)]).await;
        Ok(())
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Refresh every data group now, for a user-initiated request.
    ///
    /// The policy swallows invalidation failures; this wrapper adds the
    /// success log the caller reports and turns a panic into an error.
    pub async fn manual_refresh(&self, handle: &RefreshHandle) -> Result<()> {
        tracing::info!(stale = handle.is_stale(), "Manual refresh requested");
        match catch_task_panic(handle.refresh()).await {
            Ok(()) => {
                tracing::info!("Catalog data refreshed");
                Ok(())
            }
            Err(panic_msg) => {
                tracing::error!(error = %panic_msg, "Manual refresh panicked");
                bail!("Refresh failed: {panic_msg}")
            }
        }
    }

    /// Invalidate `groups` exactly. The mutation already happened, so a
    /// failed refetch is only logged.
    async fn invalidate(&self, groups: &[DataGroupKey]) {
        for group in groups {
            if let Err(e) = self.cache.invalidate(group, MatchMode::Exact).await {
                tracing::warn!(group = %group, error = %e, "Refetch after mutation failed");
            }
        }
    }
}

/// Strip control characters and surrounding whitespace; reject empty or
/// overlong names.
pub(crate) fn sanitize_name(name: &str) -> Result<String> {
    let stripped = strip_control_chars(name);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        bail!("Name cannot be empty or whitespace-only");
    }
    let len = trimmed.chars().count();
    if len > CategoryManager::MAX_NAME_LEN {
        bail!(
            "Name is {len} characters long (max {})",
            CategoryManager::MAX_NAME_LEN
        );
    }
    Ok(trimmed.to_owned())
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(|d| strip_control_chars(d).trim().to_owned())
        .filter(|d| !d.is_empty())
}
