use std::{
    num::{NonZeroU32, NonZeroUsize},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use storefront::{
    application::{
        auth::{
            AuthService, CredentialHasher, INVALID_CREDENTIALS, INVALID_REFRESH_TOKEN,
            LOGIN_REQUIRED, LoginCommand,
        },
        catalog::Catalog,
        categories::CreateCategoryCommand,
        context::ServiceContext,
        error::AppError,
        filter::QueryPredicate,
        pagination::{PageQuery, PageRequest},
        products::{CreateProductCommand, UpdateProductCommand},
        repos::{DocumentStore, FindOptions, RepoError},
        users::CreateUserCommand,
    },
    cache::{CacheConfig, MemoryCacheStore, ReadThrough},
    domain::{document::Document, types::Collection},
    infra::{auth::JwtIssuer, error::InfraError, memory::InMemoryDocumentStore},
};
use uuid::Uuid;

/// Counts reads so tests can tell cache hits from storage round-trips.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryDocumentStore,
    finds: AtomicUsize,
    lookups: AtomicUsize,
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn count(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
    ) -> Result<u64, RepoError> {
        self.inner.count(collection, predicate).await
    }

    async fn find(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
        options: &FindOptions<'_>,
    ) -> Result<Vec<Document>, RepoError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(collection, predicate, options).await
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepoError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(collection, id).await
    }

    async fn insert(&self, collection: Collection, document: &Document) -> Result<(), RepoError> {
        self.inner.insert(collection, document).await
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        document: &Document,
    ) -> Result<bool, RepoError> {
        self.inner.update_by_id(collection, document).await
    }

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> Result<bool, RepoError> {
        self.inner.delete_by_id(collection, id).await
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.inner.ping().await
    }
}

struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, secret: &str) -> Result<String, InfraError> {
        Ok(format!("plain:{secret}"))
    }

    fn verify(&self, secret: &str, hash: &str) -> Result<bool, InfraError> {
        Ok(hash == format!("plain:{secret}"))
    }
}

struct Harness {
    store: Arc<CountingStore>,
    catalog: Catalog,
}

fn harness(cached: bool, invalidate_on_write: bool) -> Harness {
    let store = Arc::new(CountingStore::default());
    let cache = if cached {
        let config = CacheConfig::default();
        ReadThrough::new(
            Arc::new(MemoryCacheStore::new(
                NonZeroUsize::new(64).expect("non-zero"),
            )),
            &config,
        )
    } else {
        ReadThrough::disabled()
    };
    let ctx = ServiceContext::new(
        store.clone(),
        cache,
        NonZeroU32::new(10).expect("non-zero"),
        invalidate_on_write,
    );
    Harness {
        store,
        catalog: Catalog::new(ctx, Arc::new(PlainHasher)),
    }
}

async fn seed_category(catalog: &Catalog, name: &str) -> Uuid {
    catalog
        .categories
        .create(CreateCategoryCommand {
            name: name.to_string(),
            description: None,
        })
        .await
        .expect("category")
        .id
}

fn product(name: &str, price: f64, category_id: Uuid) -> CreateProductCommand {
    CreateProductCommand {
        name: name.to_string(),
        price,
        category_id: category_id.to_string(),
        ..CreateProductCommand::default()
    }
}

#[tokio::test]
async fn second_page_of_categories_reports_totals() {
    let Harness { catalog, .. } = harness(false, true);
    for index in 0..25 {
        seed_category(&catalog, &format!("Category {index:02}")).await;
    }

    let request = PageRequest::new(Some(2), Some(10)).expect("request");
    let page = catalog.categories.list(&request).await.expect("page");
    assert_eq!(page.total_records, 25);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.data.len(), 10);

    let last = PageRequest::new(Some(3), None).expect("request");
    let page = catalog.categories.list(&last).await.expect("page");
    assert_eq!(page.data.len(), 5);

    let beyond = PageRequest::new(Some(9), None).expect("request");
    let page = catalog.categories.list(&beyond).await.expect("page");
    assert!(page.data.is_empty());
    assert_eq!(page.total_records, 25);
}

#[tokio::test]
async fn legacy_amount_filter_compares_prices() {
    let Harness { catalog, .. } = harness(false, true);
    let category_id = seed_category(&catalog, "Kitchen").await;
    let prices = [25.0, 50.0, 75.0, 99.99, 100.0, 150.0, 220.0, 5.0, 10.0, 60.0];
    for (index, price) in prices.into_iter().enumerate() {
        catalog
            .products
            .create(product(&format!("Item {index}"), price, category_id))
            .await
            .expect("product");
    }

    let query = PageQuery {
        operator: Some(">=".into()),
        filter_value: Some("100".into()),
        ..PageQuery::default()
    };
    let request = PageRequest::try_from(query).expect("request");
    let page = catalog.products.list(&request).await.expect("page");

    assert_eq!(page.total_records, 3);
    assert_eq!(page.total_pages, 1);
    assert!(page.data.iter().all(|product| product.price >= 100.0));
}

#[tokio::test]
async fn name_filter_and_custom_sort() {
    let Harness { catalog, .. } = harness(false, true);
    let category_id = seed_category(&catalog, "Coffee").await;
    for (name, price) in [("Espresso Beans", 18.0), ("Filter Beans", 12.0), ("Grinder", 80.0)] {
        catalog
            .products
            .create(product(name, price, category_id))
            .await
            .expect("product");
    }

    let request = PageRequest::default()
        .with_filter(
            Some("name".into()),
            Some("contains".into()),
            Some(Value::String("beans".into())),
        )
        .with_sort(Some("price".into()), Some("asc".into()));
    let page = catalog.products.list(&request).await.expect("page");

    let names: Vec<_> = page.data.iter().map(|product| product.name.as_str()).collect();
    assert_eq!(names, ["Filter Beans", "Espresso Beans"]);
}

#[tokio::test]
async fn repeated_reads_are_served_from_cache() {
    let Harness { store, catalog } = harness(true, true);
    let category_id = seed_category(&catalog, "Tea").await;
    let finds = store.finds.load(Ordering::SeqCst);
    let lookups = store.lookups.load(Ordering::SeqCst);

    let request = PageRequest::default();
    let first = catalog.categories.list(&request).await.expect("first");
    let explicit = PageRequest::new(Some(1), Some(10)).expect("request");
    let second = catalog.categories.list(&explicit).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(store.finds.load(Ordering::SeqCst) - finds, 1);

    let id = category_id.to_string();
    catalog.categories.get(&id).await.expect("first get");
    catalog.categories.get(&id).await.expect("second get");
    assert_eq!(store.lookups.load(Ordering::SeqCst) - lookups, 1);
}

#[tokio::test]
async fn writes_purge_cached_entries_when_enabled() {
    let Harness { catalog, .. } = harness(true, true);
    let category_id = seed_category(&catalog, "Garden").await;
    let created = catalog
        .products
        .create(product("Hose", 30.0, category_id))
        .await
        .expect("product");
    let id = created.id.to_string();

    assert_eq!(catalog.products.get(&id).await.expect("get").price, 30.0);
    catalog
        .products
        .update(
            &id,
            UpdateProductCommand {
                price: Some(35.0),
                ..UpdateProductCommand::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(catalog.products.get(&id).await.expect("get").price, 35.0);

    catalog.products.delete(&id).await.expect("delete");
    let err = catalog.products.get(&id).await.expect_err("deleted");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn stale_reads_persist_until_expiry_without_invalidation() {
    let Harness { catalog, .. } = harness(true, false);
    let category_id = seed_category(&catalog, "Garden").await;
    let created = catalog
        .products
        .create(product("Rake", 12.0, category_id))
        .await
        .expect("product");
    let id = created.id.to_string();

    catalog.products.get(&id).await.expect("warm");
    catalog
        .products
        .update(
            &id,
            UpdateProductCommand {
                price: Some(14.0),
                ..UpdateProductCommand::default()
            },
        )
        .await
        .expect("update");

    assert_eq!(catalog.products.get(&id).await.expect("get").price, 12.0);
}

#[tokio::test]
async fn invalid_requests_are_validation_errors() {
    let Harness { store, catalog } = harness(true, true);

    let bad_operator = PageRequest::default().with_filter(
        Some("name".into()),
        Some("like".into()),
        Some(Value::String("x".into())),
    );
    let err = catalog
        .categories
        .list(&bad_operator)
        .await
        .expect_err("unsupported operator");
    assert!(matches!(err, AppError::Validation(_)));

    let unknown_field = PageRequest::default().with_filter(
        Some("colour".into()),
        Some("eq".into()),
        Some(Value::String("red".into())),
    );
    let err = catalog
        .products
        .list(&unknown_field)
        .await
        .expect_err("unknown field");
    assert!(matches!(err, AppError::Validation(_)));

    assert!(PageRequest::new(Some(1), Some(0)).is_err());
    assert!(PageRequest::new(Some(1), Some(101)).is_err());
    assert_eq!(store.finds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn user_payloads_never_expose_secrets() {
    let Harness { catalog, .. } = harness(true, true);
    let created = catalog
        .users
        .create(CreateUserCommand {
            email: "ada@example.com".into(),
            password: "hunter22".into(),
            role: None,
        })
        .await
        .expect("user");

    let listing = catalog
        .list(Collection::Users, &PageRequest::default())
        .await
        .expect("list");
    assert_eq!(listing.message, "Users fetched successfully");
    let single = catalog
        .get(Collection::Users, &created.id.to_string())
        .await
        .expect("get");

    for envelope in [listing, single] {
        let rendered = serde_json::to_string(&envelope).expect("json");
        assert!(!rendered.contains("password"), "{rendered}");
        assert!(!rendered.contains("refreshToken"), "{rendered}");
        assert!(!rendered.contains("plain:"), "{rendered}");
    }
}

#[tokio::test]
async fn login_refresh_and_logout() {
    let Harness { catalog, .. } = harness(false, true);
    let user = catalog
        .users
        .create(CreateUserCommand {
            email: "grace@example.com".into(),
            password: "cobol".into(),
            role: None,
        })
        .await
        .expect("user");
    let auth = AuthService::new(
        catalog.users.clone(),
        Arc::new(PlainHasher),
        Arc::new(JwtIssuer::new(
            "access-secret",
            Duration::from_secs(900),
            "refresh-secret",
            Duration::from_secs(3600),
        )),
    );

    let err = auth
        .login(LoginCommand {
            email: "grace@example.com".into(),
            password: "fortran".into(),
        })
        .await
        .expect_err("wrong password");
    assert!(matches!(err, AppError::Unauthorized(message) if message == INVALID_CREDENTIALS));

    let tokens = auth
        .login(LoginCommand {
            email: "grace@example.com".into(),
            password: "cobol".into(),
        })
        .await
        .expect("login");
    assert_eq!(tokens.access_token_expires_in, 900);
    assert_eq!(tokens.refresh_token_expires_in, 3600);

    let refreshed = auth.refresh(&tokens.refresh_token).await.expect("refresh");
    assert!(!refreshed.access_token.is_empty());

    let err = auth
        .refresh(&tokens.access_token)
        .await
        .expect_err("access token is not a refresh token");
    assert!(matches!(err, AppError::Unauthorized(message) if message == INVALID_REFRESH_TOKEN));

    auth.logout(user.id).await.expect("logout");
    let err = auth
        .refresh(&tokens.refresh_token)
        .await
        .expect_err("revoked");
    assert!(matches!(err, AppError::Unauthorized(message) if message == INVALID_REFRESH_TOKEN));

    let err = auth.logout(user.id).await.expect_err("already logged out");
    assert!(matches!(err, AppError::Unauthorized(message) if message == LOGIN_REQUIRED));
}

#[tokio::test]
async fn sparse_product_bodies_read_the_same_through_list_and_get() {
    let Harness { store, catalog } = harness(false, true);
    let category_id = seed_category(&catalog, "Lighting").await;

    let mut body = serde_json::Map::new();
    body.insert("name".into(), Value::from("Desk Lamp"));
    body.insert("price".into(), Value::from(45.0));
    body.insert("categoryId".into(), Value::from(category_id.to_string()));
    body.insert("sku".into(), Value::from("LAMP-01"));
    let now = time::OffsetDateTime::now_utc();
    let document = Document {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        body,
    };
    store
        .insert(Collection::Products, &document)
        .await
        .expect("insert");

    let single = catalog
        .products
        .get(&document.id.to_string())
        .await
        .expect("get");
    let page = catalog
        .products
        .list(&PageRequest::default())
        .await
        .expect("list");

    assert_eq!(page.data, [single.clone()]);
    assert_eq!(single.stock_quantity, 0);
    assert!(single.available);
}

#[tokio::test]
async fn equivalent_filters_hit_one_cache_entry() {
    let Harness { store, catalog } = harness(true, true);
    let category_id = seed_category(&catalog, "Bakeware").await;
    catalog
        .products
        .create(product("Loaf Tin", 120.0, category_id))
        .await
        .expect("product");
    let finds = store.finds.load(Ordering::SeqCst);

    let symbolic = PageRequest::try_from(PageQuery {
        operator: Some(">=".into()),
        filter_value: Some("100".into()),
        sort_order: Some("DESC".into()),
        ..PageQuery::default()
    })
    .expect("request");
    let named = PageRequest::default().with_filter(
        Some("price".into()),
        Some("gte".into()),
        Some(Value::from(100)),
    );

    let first = catalog.products.list(&symbolic).await.expect("first");
    let second = catalog.products.list(&named).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(store.finds.load(Ordering::SeqCst) - finds, 1);
}
