use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_apply_without_sources() {
    let settings = settings_from_sources(&HashMap::new(), no_env).expect("settings");
    assert_eq!(settings, ClientSettings::default());
}

#[test]
fn settings_file_overrides_defaults() {
    let file_cfg = HashMap::from([
        ("server_url".to_string(), toml::Value::from("https://store.example.org/")),
        ("request_timeout_secs".to_string(), toml::Value::from(3)),
        ("revision_poll_ms".to_string(), toml::Value::from(250)),
    ]);

    let settings = settings_from_sources(&file_cfg, no_env).expect("settings");

    assert_eq!(settings.server_url, "https://store.example.org");
    assert_eq!(settings.request_timeout, Duration::from_secs(3));
    assert_eq!(settings.revision_poll_interval, Duration::from_millis(250));
}

#[test]
fn environment_overrides_settings_file() {
    let file_cfg = HashMap::from([(
        "server_url".to_string(),
        toml::Value::from("http://file.example.org"),
    )]);
    let env = |key: &str| match key {
        "RECIPIENTS_SERVER_URL" => Some("http://legacy.example.org".to_string()),
        "APP__SERVER_URL" => Some("http://env.example.org:9000".to_string()),
        "APP__REVISION_POLL_MS" => Some("75".to_string()),
        _ => None,
    };

    let settings = settings_from_sources(&file_cfg, env).expect("settings");

    assert_eq!(settings.server_url, "http://env.example.org:9000");
    assert_eq!(settings.revision_poll_interval, Duration::from_millis(75));
}

#[test]
fn rejects_invalid_values() {
    let bad_scheme = HashMap::from([(
        "server_url".to_string(),
        toml::Value::from("ftp://store.example.org"),
    )]);
    assert!(settings_from_sources(&bad_scheme, no_env).is_err());

    let negative = HashMap::from([("request_timeout_secs".to_string(), toml::Value::from(-1))]);
    assert!(settings_from_sources(&negative, no_env).is_err());

    let zero_poll = |key: &str| (key == "APP__REVISION_POLL_MS").then(|| "0".to_string());
    assert!(settings_from_sources(&HashMap::new(), zero_poll).is_err());

    let garbage = |key: &str| (key == "APP__REQUEST_TIMEOUT_SECS").then(|| "soon".to_string());
    let err = settings_from_sources(&HashMap::new(), garbage).expect_err("not a number");
    assert!(err.to_string().contains("APP__REQUEST_TIMEOUT_SECS"));
}

#[test]
fn with_server_url_validates_and_trims() {
    let settings = ClientSettings::default()
        .with_server_url("http://10.0.0.5:8080/")
        .expect("valid");
    assert_eq!(settings.server_url, "http://10.0.0.5:8080");
    assert!(ClientSettings::default().with_server_url("not a url").is_err());
}
