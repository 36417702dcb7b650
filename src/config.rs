use std::{env, time::Duration};

use anyhow::Context;

pub const DEFAULT_WHATSAPP_PHONE: &str = "254722240558";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Direct Postgres connection; enables the change feed when set.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub whatsapp_phone: String,
    pub admin_roles: Vec<String>,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("missing required environment variable {key}"))
        };
        let supabase_url = required("SUPABASE_URL")?;
        let supabase_anon_key = required("SUPABASE_ANON_KEY")?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        let host = lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("APP_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let whatsapp_phone =
            lookup("WHATSAPP_PHONE").unwrap_or_else(|| DEFAULT_WHATSAPP_PHONE.to_string());
        let admin_roles = parse_roles(lookup("ADMIN_ROLES").as_deref());
        let request_timeout = lookup("REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            database_url,
            host,
            port,
            whatsapp_phone,
            admin_roles,
            request_timeout,
        })
    }
}

fn parse_roles(raw: Option<&str>) -> Vec<String> {
    let roles = raw
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if roles.is_empty() {
        vec!["admin".to_string(), "super_admin".to_string()]
    } else {
        roles
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn backend_credentials_are_required() {
        let err = config(&[("SUPABASE_URL", "https://x.supabase.co")]).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_ANON_KEY"));
        assert!(config(&[("SUPABASE_URL", " "), ("SUPABASE_ANON_KEY", "k")]).is_err());
    }

    #[test]
    fn defaults_fill_optional_values() {
        let cfg = config(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 3000);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.whatsapp_phone, DEFAULT_WHATSAPP_PHONE);
        assert_eq!(cfg.admin_roles, vec!["admin", "super_admin"]);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn admin_roles_are_comma_separated() {
        let cfg = config(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("ADMIN_ROLES", "admin, moderator,,"),
            ("APP_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(cfg.admin_roles, vec!["admin", "moderator"]);
        assert_eq!(cfg.port, 8080);
    }
}
