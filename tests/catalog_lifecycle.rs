//! Integration tests for the category manager against a mocked admin API.
//!
//! Each test starts its own wiremock server, so request counts are isolated.

use catalog_admin::api::CatalogClient;
use catalog_admin::cache::{DataGroupKey, QueryCache};
use catalog_admin::catalog::{CategoryCount, CategoryManager};
use catalog_admin::refresh::{RefreshPolicyConfig, StalenessRefreshPolicy};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manager_for(server: &MockServer) -> CategoryManager {
    let client = CatalogClient::new(&format!("{}/api", server.uri()), None, Duration::from_secs(5))
        .unwrap();
    CategoryManager::new(Arc::new(client), Arc::new(QueryCache::default())).with_stats_concurrency(2)
}

async fn mount_categories(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/api/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "categories": [
                { "_id": "c1", "name": "Shoes", "isActive": true },
                { "_id": "c2", "name": "Bags", "isActive": false },
                { "_id": "c3", "name": "Hats", "isActive": true }
            ]
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_subcategories(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/subcategories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "_id": "s1", "name": "Boots", "categoryId": "c1" },
                { "_id": "s2", "name": "Sneakers", "category": { "_id": "c1" }, "isActive": false },
                { "_id": "s3", "name": "Totes", "categoryId": "c2" }
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_products(server: &MockServer, category_id: &str, count: usize) {
    let products: Vec<_> = (0..count)
        .map(|i| json!({ "_id": format!("{category_id}-p{i}"), "name": "Item", "price": 9.5 }))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/api/products/category/{category_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "products": products })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_reads_are_served_from_cache() {
    let server = MockServer::start().await;
    mount_categories(&server, 1).await;
    let manager = manager_for(&server);

    let first = manager.categories().await.unwrap();
    let second = manager.categories().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    // `expect(1)` is verified when the server drops
}

#[tokio::test]
async fn test_subcategories_of_filters_by_parent() {
    let server = MockServer::start().await;
    mount_subcategories(&server).await;
    let manager = manager_for(&server);

    let names: Vec<String> = manager
        .subcategories_of("c1")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Boots", "Sneakers"]);
}

#[tokio::test]
async fn test_create_category_sanitizes_and_refetches_list() {
    let server = MockServer::start().await;
    // Initial load plus the refetch triggered by the mutation
    mount_categories(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/api/categories"))
        .and(body_partial_json(json!({ "name": "Gloves", "isActive": true })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "category": { "_id": "c4", "name": "Gloves" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    manager.categories().await.unwrap();
    let created = manager
        .create_category("  \x1b[1mGloves\x1b[0m ", None)
        .await
        .unwrap();

    assert_eq!(created.id, "c4");
    assert_eq!(
        manager.cache().is_invalidated(&DataGroupKey::from("categories")),
        Some(false)
    );
}

#[tokio::test]
async fn test_invalid_names_never_reach_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    assert!(manager.create_category("   ", None).await.is_err());
    assert!(manager
        .create_category(&"x".repeat(CategoryManager::MAX_NAME_LEN + 1), None)
        .await
        .is_err());
}

#[tokio::test]
async fn test_subcategory_requires_existing_parent() {
    let server = MockServer::start().await;
    mount_categories(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/subcategories"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    let err = manager
        .create_subcategory("missing", "Sandals", None)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Category missing not found"));
}

#[tokio::test]
async fn test_toggling_keeps_name_and_flips_active() {
    let server = MockServer::start().await;
    mount_categories(&server, 2).await;
    Mock::given(method("PUT"))
        .and(path("/api/categories/c2"))
        .and(body_partial_json(json!({ "name": "Bags", "isActive": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "_id": "c2", "name": "Bags", "isActive": true }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    let updated = manager.set_category_active("c2", true).await.unwrap();
    assert!(updated.is_active);
}

#[tokio::test]
async fn test_server_errors_surface_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/categories/c1"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "message": "Category still has products" })),
        )
        .mount(&server)
        .await;
    let manager = manager_for(&server);

    let err = manager.delete_category("c1").await.unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("Failed to delete category c1"));
    assert!(chain.contains("Category still has products"));
}

#[tokio::test]
async fn test_stats_aggregate_and_sort_by_product_count() {
    let server = MockServer::start().await;
    mount_categories(&server, 1).await;
    mount_subcategories(&server).await;
    mount_products(&server, "c1", 2).await;
    mount_products(&server, "c2", 5).await;
    // No products route for c3: 404 counts as zero
    let manager = manager_for(&server);

    let stats = manager.stats().await.unwrap();

    assert_eq!(stats.total_categories, 3);
    assert_eq!(stats.active_categories, 2);
    assert_eq!(stats.total_subcategories, 3);
    assert_eq!(stats.active_subcategories, 2);
    assert_eq!(stats.total_products, 7);
    assert_eq!(
        stats.per_category,
        vec![
            CategoryCount {
                category_id: "c2".into(),
                name: "Bags".into(),
                is_active: false,
                subcategories: 1,
                products: 5,
            },
            CategoryCount {
                category_id: "c1".into(),
                name: "Shoes".into(),
                is_active: true,
                subcategories: 2,
                products: 2,
            },
            CategoryCount {
                category_id: "c3".into(),
                name: "Hats".into(),
                is_active: true,
                subcategories: 0,
                products: 0,
            },
        ]
    );
}

#[tokio::test]
async fn test_manual_refresh_refetches_every_group() {
    let server = MockServer::start().await;
    // Initial load plus one refetch from the refresh
    mount_categories(&server, 2).await;
    mount_subcategories(&server).await;
    mount_products(&server, "c1", 1).await;
    let manager = manager_for(&server);

    manager.categories().await.unwrap();
    manager.product_count("c1").await.unwrap();

    let config = RefreshPolicyConfig::new(CategoryManager::data_groups());
    let (_visibility_tx, visibility_rx) = mpsc::channel(4);
    let handle = StalenessRefreshPolicy::new(config, manager.cache().clone())
        .unwrap()
        .activate(visibility_rx);

    manager.manual_refresh(&handle).await.unwrap();
    assert!(!handle.is_stale());

    let product_key = DataGroupKey::new(["products", "category", "c1"]);
    assert_eq!(manager.cache().is_invalidated(&product_key), Some(false));

    handle.deactivate().await;
}

#[tokio::test]
async fn test_refresh_with_failing_api_keeps_data_stale() {
    let server = MockServer::start().await;
    mount_categories(&server, 1).await;
    let manager = manager_for(&server);
    manager.categories().await.unwrap();

    // The API goes down after the first load
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = RefreshPolicyConfig::new(CategoryManager::data_groups())
        .stale_after(Duration::from_millis(1));
    let (_visibility_tx, visibility_rx) = mpsc::channel(4);
    let handle = StalenessRefreshPolicy::new(config, manager.cache().clone())
        .unwrap()
        .activate(visibility_rx);
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Never an error for the caller
    manager.manual_refresh(&handle).await.unwrap();
    assert!(handle.is_stale());
    assert_eq!(
        manager.cache().is_invalidated(&DataGroupKey::from("categories")),
        Some(true)
    );

    handle.deactivate().await;
}
