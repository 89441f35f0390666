use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert_eq!(settings.logging.format, LogFormat::Compact);
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 10);
    assert_eq!(settings.database.statement_timeout, Duration::from_secs(5));
    assert_eq!(settings.cache.backend, CacheBackendKind::Memory);
    assert_eq!(settings.cache.ttl_seconds.get(), 10);
    assert_eq!(settings.cache.timeout_ms.get(), 250);
    assert_eq!(settings.cache.capacity.get(), 1024);
    assert!(settings.cache.invalidate_on_write);
    assert_eq!(settings.pagination.default_limit.get(), 10);
    assert_eq!(settings.auth.access_ttl, Duration::from_secs(900));
    assert_eq!(settings.auth.refresh_ttl, Duration::from_secs(604_800));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("postgres://file".to_string());
    raw.logging.level = Some("info".to_string());

    let overrides = GlobalOverrides {
        database_url: Some("postgres://cli".to_string()),
        log_level: Some("debug".to_string()),
        log_format: Some("json".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.database.url.as_deref(), Some("postgres://cli"));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.logging.format, LogFormat::Json);
}

#[test]
fn redis_backend_requires_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some(CacheBackendKind::Redis);

    let err = Settings::from_raw(raw.clone()).expect_err("missing redis url");
    assert!(matches!(err, LoadError::Invalid { key: "cache.redis_url", .. }));

    raw.apply_overrides(&GlobalOverrides {
        redis_url: Some("redis://127.0.0.1:6379".to_string()),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.cache.redis_url.as_deref(),
        Some("redis://127.0.0.1:6379")
    );
}

#[test]
fn default_limit_must_stay_within_page_bounds() {
    for invalid in [0, 101] {
        let mut raw = RawSettings::default();
        raw.pagination.default_limit = Some(invalid);
        let err = Settings::from_raw(raw).expect_err("out of range");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "pagination.default_limit",
                ..
            }
        ));
    }

    let mut raw = RawSettings::default();
    raw.pagination.default_limit = Some(100);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.pagination.default_limit.get(), 100);
}

#[test]
fn zero_durations_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.database.statement_timeout_ms = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn unknown_log_format_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.format = Some("pretty".to_string());
    let err = Settings::from_raw(raw).expect_err("invalid format");
    assert!(matches!(err, LoadError::Invalid { key: "logging.format", .. }));
}

#[test]
fn blank_secrets_are_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.auth.access_secret = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.auth.access_secret.is_none());
}

#[test]
fn list_command_parses_filter_flags() {
    let args = CliArgs::try_parse_from([
        "storefront",
        "--log-level",
        "warn",
        "list",
        "products",
        "--page",
        "2",
        "--operator",
        ">=",
        "--value",
        "100",
    ])
    .expect("parse");

    assert_eq!(args.overrides.log_level.as_deref(), Some("warn"));
    let Command::List(list) = args.command else {
        panic!("expected list command");
    };
    assert_eq!(list.resource, ResourceKind::Products);
    assert_eq!(list.page, Some(2));
    assert_eq!(list.operator.as_deref(), Some(">="));
    assert_eq!(list.value.as_deref(), Some("100"));
}

#[test]
fn auth_commands_parse_their_arguments() {
    let args = CliArgs::try_parse_from([
        "storefront",
        "login",
        "--email",
        "ada@example.com",
        "--password",
        "hunter22",
    ])
    .expect("parse");
    let Command::Login(login) = args.command else {
        panic!("expected login command");
    };
    assert_eq!(login.email, "ada@example.com");
    assert_eq!(login.password, "hunter22");

    let args = CliArgs::try_parse_from(["storefront", "logout", "--user-id", "not-a-uuid"])
        .expect("parse");
    assert!(matches!(args.command, Command::Logout(logout) if logout.user_id == "not-a-uuid"));

    assert!(CliArgs::try_parse_from(["storefront", "refresh"]).is_err());
}
