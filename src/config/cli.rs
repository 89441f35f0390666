use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::{application::pagination::PageQuery, domain::types::Collection};

/// Command-line arguments for the storefront binary.
#[derive(Debug, Parser)]
#[command(name = "storefront", version, about = "Catalog backend for categories, products and users")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config",
        env = "STOREFRONT_CONFIG",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the Redis URL used when the cache backend is `redis`.
    #[arg(long = "redis-url", value_name = "URL", global = true)]
    pub redis_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Override the log format (compact|json).
    #[arg(long = "log-format", value_name = "FORMAT", global = true)]
    pub log_format: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Check storage and cache connectivity.
    Health,
    /// Print one page of a resource.
    List(ListArgs),
    /// Print a single record.
    Get(GetArgs),
    /// Exchange credentials for an access and refresh token pair.
    Login(LoginArgs),
    /// Exchange a refresh token for a new access token.
    Refresh(RefreshArgs),
    /// Revoke a user's stored refresh token.
    Logout(LogoutArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceKind {
    Categories,
    Products,
    Users,
}

impl From<ResourceKind> for Collection {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Categories => Collection::Categories,
            ResourceKind::Products => Collection::Products,
            ResourceKind::Users => Collection::Users,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    #[arg(value_enum)]
    pub resource: ResourceKind,

    /// 1-based page number.
    #[arg(long, value_name = "N")]
    pub page: Option<u32>,

    /// Page size, between 1 and 100.
    #[arg(long, value_name = "N")]
    pub limit: Option<u32>,

    #[arg(long = "filter-field", value_name = "FIELD")]
    pub filter_field: Option<String>,

    /// Comparison operator, e.g. `eq`, `gte`, `contains` or `>=`.
    #[arg(long, value_name = "OP", allow_hyphen_values = true)]
    pub operator: Option<String>,

    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    pub value: Option<String>,

    #[arg(long = "sort-by", value_name = "FIELD")]
    pub sort_by: Option<String>,

    #[arg(long = "sort-order", value_name = "ORDER")]
    pub sort_order: Option<String>,
}

impl From<&ListArgs> for PageQuery {
    fn from(args: &ListArgs) -> Self {
        PageQuery {
            page: args.page,
            limit: args.limit,
            filter_field: args.filter_field.clone(),
            operator: args.operator.clone(),
            filter_value: args.value.clone(),
            sort_by: args.sort_by.clone(),
            sort_order: args.sort_order.clone(),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    #[arg(value_enum)]
    pub resource: ResourceKind,

    /// Record id (UUID).
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Debug, Args, Clone)]
pub struct LoginArgs {
    #[arg(long, value_name = "EMAIL")]
    pub email: String,

    #[arg(
        long,
        value_name = "PASSWORD",
        env = "STOREFRONT_PASSWORD",
        hide_env_values = true
    )]
    pub password: String,
}

#[derive(Debug, Args, Clone)]
pub struct RefreshArgs {
    #[arg(long = "refresh-token", value_name = "TOKEN")]
    pub refresh_token: String,
}

#[derive(Debug, Args, Clone)]
pub struct LogoutArgs {
    /// Id (UUID) of the user to log out.
    #[arg(long = "user-id", value_name = "ID")]
    pub user_id: String,
}
