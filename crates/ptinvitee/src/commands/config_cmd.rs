//! Config subcommand handlers.

use std::fmt::Write as _;
use std::io::Read;

use ptinvitee_config::{Config, ConfigError, store_cookie};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const STARTER: &str = r#"# ptinvitee configuration

[defaults]
output = "table"
color = "auto"

[engine]
# data_dir = "/path/to/data"
page_size = 50
max_pages = 100
page_delay = "0s"
connect_timeout = "10s"
read_timeout = "30s"
refresh_interval = "6h"
cache_ttl = "6h"

# One block per tracker. Credentials resolve from the env var named in
# `cookie_env`, then the system keyring (`ptinvitee config set-cookie`),
# then the plaintext `cookie` value.
#
# [[sites]]
# name = "example"
# url = "https://pt.example.org/"
# cookie_env = "EXAMPLE_COOKIE"
#
# [[sites]]
# name = "mteam"
# url = "https://kp.m-team.cc/"
# api_key_env = "MTEAM_API_KEY"
# authorization_env = "MTEAM_AUTHORIZATION"
"#;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking secrets.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);

    let e = &cfg.engine;
    let _ = writeln!(out);
    let _ = writeln!(out, "[engine]");
    if let Some(ref dir) = e.data_dir {
        let _ = writeln!(out, "data_dir = \"{}\"", dir.display());
    }
    let _ = writeln!(out, "page_size = {}", e.page_size);
    let _ = writeln!(out, "max_pages = {}", e.max_pages);
    let _ = writeln!(out, "page_delay = \"{}\"", e.page_delay);
    let _ = writeln!(out, "connect_timeout = \"{}\"", e.connect_timeout);
    let _ = writeln!(out, "read_timeout = \"{}\"", e.read_timeout);
    let _ = writeln!(out, "refresh_interval = \"{}\"", e.refresh_interval);
    let _ = writeln!(out, "cache_ttl = \"{}\"", e.cache_ttl);

    for s in &cfg.sites {
        let _ = writeln!(out);
        let _ = writeln!(out, "[[sites]]");
        let _ = writeln!(out, "name = \"{}\"", s.name);
        let _ = writeln!(out, "url = \"{}\"", s.url);
        let secrets = [
            ("cookie", &s.cookie, &s.cookie_env),
            ("api_key", &s.api_key, &s.api_key_env),
            ("authorization", &s.authorization, &s.authorization_env),
        ];
        for (key, value, env) in secrets {
            if value.is_some() {
                let _ = writeln!(out, "{key} = \"****\"");
            }
            if let Some(env) = env {
                let _ = writeln!(out, "{key}_env = \"{env}\"");
            }
        }
        if let Some(ref ua) = s.user_agent {
            let _ = writeln!(out, "user_agent = \"{ua}\"");
        }
        if let Some(ref proxy) = s.proxy {
            let _ = writeln!(out, "proxy = \"{proxy}\"");
        }
        let _ = writeln!(out, "enabled = {}", s.enabled);
    }

    out
}

fn read_cookie_from_stdin() -> Result<String, CliError> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf.trim().to_string())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::active_path(global);
    match args.command {
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!("{} already exists (use --force to overwrite)", path.display()),
                });
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, STARTER)?;
            if !global.quiet {
                eprintln!("Config written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            output::print_output(format_config_redacted(&cfg).trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetCookie { site, cookie } => {
            let cfg = config::load(global)?;
            if cfg.site(&site).is_none() {
                return Err(ConfigError::UnknownSite(site).into());
            }
            let cookie = match cookie {
                Some(c) => c.trim().to_string(),
                None => read_cookie_from_stdin()?,
            };
            if cookie.is_empty() {
                return Err(CliError::Validation {
                    field: "cookie".into(),
                    reason: "must not be empty".into(),
                });
            }
            store_cookie(&site, &cookie)?;
            if !global.quiet {
                eprintln!("Cookie for '{site}' stored in the system keyring");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ptinvitee_config::SiteEntry;

    use super::*;

    #[test]
    fn starter_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, STARTER).unwrap();
        let cfg = ptinvitee_config::load_config_from(&path).unwrap();
        assert_eq!(cfg.engine.refresh_interval, "6h");
        assert!(cfg.sites.is_empty());
    }

    #[test]
    fn redacted_output_masks_secrets() {
        let mut cfg = Config::default();
        cfg.sites.push(SiteEntry {
            name: "ssd".into(),
            url: "https://springsunday.net/".into(),
            cookie: Some("uid=1; pass=topsecret".into()),
            authorization_env: Some("SSD_AUTH".into()),
            enabled: true,
            ..SiteEntry::default()
        });
        let out = format_config_redacted(&cfg);
        assert!(out.contains("cookie = \"****\""));
        assert!(out.contains("authorization_env = \"SSD_AUTH\""));
        assert!(!out.contains("topsecret"));
    }
}
