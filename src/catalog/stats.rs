use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::HashMap;

use super::CategoryManager;

/// Per-category line of [`CatalogStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category_id: String,
    pub name: String,
    pub is_active: bool,
    pub subcategories: usize,
    pub products: usize,
}

/// Aggregate numbers for the category screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total_categories: usize,
    pub active_categories: usize,
    pub total_subcategories: usize,
    pub active_subcategories: usize,
    pub total_products: usize,
    /// Sorted by product count, largest first, then by name.
    pub per_category: Vec<CategoryCount>,
}

impl CategoryManager {
    /// Compute [`CatalogStats`].
    ///
    /// Product counts are fetched per category with at most
    /// `stats_concurrency` requests in flight; the first failure aborts.
    pub async fn stats(&self) -> Result<CatalogStats> {
        let categories = self.categories().await?;
        let subcategories = self.subcategories().await?;

        let mut subs_per_category: HashMap<&str, usize> = HashMap::new();
        for sub in &subcategories {
            *subs_per_category.entry(sub.category_id.as_str()).or_default() += 1;
        }

        let counts: Vec<(usize, usize)> = stream::iter(categories.iter().enumerate())
            .map(|(idx, category)| async move {
                self.product_count(&category.id).await.map(|n| (idx, n))
            })
            .buffer_unordered(self.stats_concurrency)
            .try_collect()
            .await?;

        let mut per_category: Vec<CategoryCount> = categories
            .iter()
            .map(|c| CategoryCount {
                category_id: c.id.clone(),
                name: c.name.clone(),
                is_active: c.is_active,
                subcategories: subs_per_category.get(c.id.as_str()).copied().unwrap_or(0),
                products: 0,
            })
            .collect();
        for (idx, products) in counts {
            per_category[idx].products = products;
        }
        per_category.sort_by(|a, b| b.products.cmp(&a.products).then_with(|| a.name.cmp(&b.name)));

        let stats = CatalogStats {
            total_categories: categories.len(),
            active_categories: categories.iter().filter(|c| c.is_active).count(),
            total_subcategories: subcategories.len(),
            active_subcategories: subcategories.iter().filter(|s| s.is_active).count(),
            total_products: per_category.iter().map(|c| c.products).sum(),
            per_category,
        };
        tracing::debug!(
            categories = stats.total_categories,
            subcategories = stats.total_subcategories,
            products = stats.total_products,
            "Catalog stats computed"
        );
        Ok(stats)
    }
}
