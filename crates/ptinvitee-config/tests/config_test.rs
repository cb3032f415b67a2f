// Loading TOML files through the full figment stack.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;

use ptinvitee_config::{Config, engine_config, load_config_from, save_config_to, site_configs};
use ptinvitee_core::SiteAuth;

const SAMPLE: &str = r#"
[defaults]
output = "json"

[engine]
data_dir = "/tmp/ptinvitee-data"
page_size = 25
page_delay = "500ms"
refresh_interval = "2h"

[[sites]]
name = "ssd"
url = "https://springsunday.net/"
cookie = "uid=1; pass=abc"

[[sites]]
name = "mt"
url = "https://kp.m-team.cc/"
api_key = "key"
authorization = "token"
enabled = false
"#;

#[test]
fn loads_sites_and_engine_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(cfg.defaults.output, "json");
    assert_eq!(cfg.sites.len(), 2);

    let engine = engine_config(&cfg).unwrap();
    assert_eq!(engine.data_dir.to_str(), Some("/tmp/ptinvitee-data"));
    assert_eq!(engine.roster.page_size, 25);
    assert_eq!(engine.roster.max_pages, 100);
    assert_eq!(engine.roster.page_delay, Duration::from_millis(500));
    assert_eq!(engine.refresh_interval, Duration::from_secs(7200));

    let sites = site_configs(&cfg).unwrap();
    assert_eq!(sites[0].name, "ssd");
    assert!(sites[0].enabled);
    match &sites[0].auth {
        SiteAuth::Cookie(c) => assert_eq!(c.expose_secret(), "uid=1; pass=abc"),
        other => panic!("expected cookie auth, got {other:?}"),
    }
    assert!(!sites[1].enabled);
    assert!(matches!(sites[1].auth, SiteAuth::ApiToken { .. }));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert!(cfg.sites.is_empty());
    assert_eq!(cfg.engine.page_size, 50);
}

#[test]
fn save_then_load_keeps_sites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut cfg = Config::default();
    cfg.sites.push(ptinvitee_config::SiteEntry {
        name: "demo".into(),
        url: "https://pt.example.org/".into(),
        cookie_env: Some("DEMO_COOKIE".into()),
        enabled: true,
        ..Default::default()
    });
    save_config_to(&cfg, &path).unwrap();

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded.sites.len(), 1);
    assert_eq!(loaded.sites[0].cookie_env.as_deref(), Some("DEMO_COOKIE"));
}
