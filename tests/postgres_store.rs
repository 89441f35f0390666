//! Runs against a live Postgres; set `DATABASE_URL` and pass `--ignored`.

use std::{num::NonZeroU32, sync::Arc};

use sqlx::PgPool;
use storefront::{
    application::{
        auth::CredentialHasher,
        catalog::Catalog,
        categories::CreateCategoryCommand,
        context::ServiceContext,
        error::AppError,
        pagination::PageRequest,
        products::CreateProductCommand,
        users::CreateUserCommand,
    },
    cache::ReadThrough,
    domain::types::Collection,
    infra::{db::PostgresDocumentStore, error::InfraError},
};

struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, secret: &str) -> Result<String, InfraError> {
        Ok(format!("plain:{secret}"))
    }

    fn verify(&self, secret: &str, hash: &str) -> Result<bool, InfraError> {
        Ok(hash == format!("plain:{secret}"))
    }
}

fn catalog(pool: PgPool) -> Catalog {
    let ctx = ServiceContext::new(
        Arc::new(PostgresDocumentStore::new(pool)),
        ReadThrough::disabled(),
        NonZeroU32::new(10).expect("non-zero"),
        true,
    );
    Catalog::new(ctx, Arc::new(PlainHasher))
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn price_filter_and_paging_run_in_sql(pool: PgPool) {
    let catalog = catalog(pool);
    let category = catalog
        .categories
        .create(CreateCategoryCommand {
            name: "Audio".into(),
            description: None,
        })
        .await
        .expect("category");

    for (index, price) in [20.0, 99.5, 100.0, 180.0, 450.0].into_iter().enumerate() {
        catalog
            .products
            .create(CreateProductCommand {
                name: format!("Speaker {index}"),
                price,
                category_id: category.id.to_string(),
                ..CreateProductCommand::default()
            })
            .await
            .expect("product");
    }

    let request = PageRequest::new(Some(1), Some(2))
        .expect("request")
        .with_filter(
            Some("price".into()),
            Some("gte".into()),
            Some(serde_json::json!(100)),
        )
        .with_sort(Some("price".into()), Some("desc".into()));
    let page = catalog.products.list(&request).await.expect("page");

    assert_eq!(page.total_records, 3);
    assert_eq!(page.total_pages, 2);
    let prices: Vec<f64> = page.data.iter().map(|product| product.price).collect();
    assert_eq!(prices, [450.0, 180.0]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unique_fields_surface_as_conflicts(pool: PgPool) {
    let catalog = catalog(pool);
    let command = CreateCategoryCommand {
        name: "Books".into(),
        description: None,
    };
    catalog
        .categories
        .create(command.clone())
        .await
        .expect("first");
    let err = catalog
        .categories
        .create(command)
        .await
        .expect_err("duplicate name");
    assert!(matches!(err, AppError::Conflict(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn user_listing_projects_out_credentials(pool: PgPool) {
    let catalog = catalog(pool);
    catalog
        .users
        .create(CreateUserCommand {
            email: "lin@example.com".into(),
            password: "s3cret".into(),
            role: None,
        })
        .await
        .expect("user");

    let envelope = catalog
        .list(Collection::Users, &PageRequest::default())
        .await
        .expect("list");
    let rendered = serde_json::to_string(&envelope).expect("json");
    assert!(rendered.contains("lin@example.com"));
    assert!(!rendered.contains("password"));
    assert!(!rendered.contains("plain:"));
}
