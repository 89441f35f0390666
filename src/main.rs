use std::{process, sync::Arc};

use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use storefront::{
    application::{
        auth::{AuthService, LoginCommand},
        catalog::Catalog,
        context::ServiceContext,
        envelope::Envelope,
        error::AppError,
        pagination::{PageQuery, PageRequest},
        repos::DocumentStore,
        users::INVALID_USER_ID,
    },
    cache::{
        CacheBackendKind, CacheConfig, CacheStore, MemoryCacheStore, ReadThrough, RedisCacheStore,
    },
    config::{self, Command, GetArgs, ListArgs, LoginArgs, LogoutArgs, RefreshArgs, Settings},
    infra::{
        auth::{Argon2Hasher, JwtIssuer},
        db::PostgresDocumentStore,
        error::InfraError,
        telemetry,
        timed::TimedDocumentStore,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        print_envelope(&error.envelope());
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        InfraError::configuration(format!("failed to load configuration: {err}"))
    })?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Migrate => run_migrate(&settings).await,
        Command::Health => run_health(&settings).await,
        Command::List(args) => run_list(&settings, &args).await,
        Command::Get(args) => run_get(&settings, &args).await,
        Command::Login(args) => run_login(&settings, args).await,
        Command::Refresh(args) => run_refresh(&settings, &args).await,
        Command::Logout(args) => run_logout(&settings, &args).await,
    }
}

async fn run_migrate(settings: &Settings) -> Result<(), AppError> {
    let pool = connect_pool(settings).await?;
    PostgresDocumentStore::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(format!("failed to apply migrations: {err}")))?;
    info!("database migrations applied");
    print_envelope(&Envelope::success("Migrations applied", json!(null)));
    Ok(())
}

async fn run_health(settings: &Settings) -> Result<(), AppError> {
    let store = init_store(settings).await?;
    store.ping().await?;

    let cache = init_cache(settings)?;
    cache.ping().await.map_err(InfraError::from)?;

    let cache_status = if cache.is_enabled() { "ok" } else { "disabled" };
    print_envelope(&Envelope::success(
        "Service healthy",
        json!({"storage": "ok", "cache": cache_status}),
    ));
    Ok(())
}

async fn run_list(settings: &Settings, args: &ListArgs) -> Result<(), AppError> {
    let request = PageRequest::try_from(PageQuery::from(args))?;
    let catalog = init_catalog(settings).await?;
    let envelope = catalog.list(args.resource.into(), &request).await?;
    print_envelope(&envelope);
    Ok(())
}

async fn run_get(settings: &Settings, args: &GetArgs) -> Result<(), AppError> {
    let catalog = init_catalog(settings).await?;
    let envelope = catalog.get(args.resource.into(), &args.id).await?;
    print_envelope(&envelope);
    Ok(())
}

async fn run_login(settings: &Settings, args: LoginArgs) -> Result<(), AppError> {
    let auth = init_auth(settings).await?;
    let tokens = auth
        .login(LoginCommand {
            email: args.email,
            password: args.password,
        })
        .await?;
    print_envelope(&Envelope::success("User logged in", tokens));
    Ok(())
}

async fn run_refresh(settings: &Settings, args: &RefreshArgs) -> Result<(), AppError> {
    let auth = init_auth(settings).await?;
    let token = auth.refresh(&args.refresh_token).await?;
    print_envelope(&Envelope::success("Token Refreshed Successfully", token));
    Ok(())
}

async fn run_logout(settings: &Settings, args: &LogoutArgs) -> Result<(), AppError> {
    let user_id = Uuid::parse_str(args.user_id.trim())
        .map_err(|_| AppError::validation(INVALID_USER_ID))?;
    let auth = init_auth(settings).await?;
    auth.logout(user_id).await?;
    print_envelope(&Envelope::success("User logged out", json!(null)));
    Ok(())
}

async fn connect_pool(settings: &Settings) -> Result<PgPool, AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database.url is required"))?;

    PostgresDocumentStore::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn init_store(settings: &Settings) -> Result<Arc<dyn DocumentStore>, AppError> {
    let pool = connect_pool(settings).await?;
    let postgres: Arc<dyn DocumentStore> = Arc::new(PostgresDocumentStore::new(pool));
    Ok(Arc::new(TimedDocumentStore::new(
        postgres,
        settings.database.statement_timeout,
    )))
}

fn init_cache(settings: &Settings) -> Result<ReadThrough, AppError> {
    let config = CacheConfig::from(&settings.cache);
    let store: Arc<dyn CacheStore> = match config.backend {
        CacheBackendKind::Disabled => return Ok(ReadThrough::disabled()),
        CacheBackendKind::Memory => Arc::new(MemoryCacheStore::new(config.capacity)),
        CacheBackendKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("cache.redis_url is required"))?;
            Arc::new(RedisCacheStore::connect(url, config.timeout).map_err(InfraError::from)?)
        }
    };
    Ok(ReadThrough::new(store, &config))
}

async fn init_catalog(settings: &Settings) -> Result<Catalog, AppError> {
    let ctx = ServiceContext::new(
        init_store(settings).await?,
        init_cache(settings)?,
        settings.pagination.default_limit,
        settings.cache.invalidate_on_write,
    );
    Ok(Catalog::new(ctx, Arc::new(Argon2Hasher::new())))
}

async fn init_auth(settings: &Settings) -> Result<AuthService, AppError> {
    let issuer = JwtIssuer::from_settings(&settings.auth)?;
    let catalog = init_catalog(settings).await?;
    Ok(AuthService::new(
        catalog.users,
        Arc::new(Argon2Hasher::new()),
        Arc::new(issuer),
    ))
}

fn print_envelope<T: Serialize>(envelope: &Envelope<T>) {
    match serde_json::to_string_pretty(envelope) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => error!(error = %err, "failed to render response envelope"),
    }
}
