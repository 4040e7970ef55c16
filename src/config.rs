use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Secret mixed into confirmation-code derivation. Rotating it
    /// invalidates every outstanding code.
    pub secret_key: String,
    pub banned_usernames: Vec<String>,
    pub api_version: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let secret_key = std::env::var("SECRET_KEY")?;
        let banned_usernames = parse_banned(
            &std::env::var("BANNED_USERNAMES").unwrap_or_else(|_| "me,admin".into()),
        );
        let api_version = std::env::var("API_VERSION").unwrap_or_else(|_| "v1".into());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| secret_key.clone()),
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "critiq".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "critiq-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".into()),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(25),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from_email: std::env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@critiq.local".into()),
        };
        Ok(Self {
            database_url,
            secret_key,
            banned_usernames,
            api_version,
            jwt,
            smtp,
        })
    }

    pub fn is_banned(&self, username: &str) -> bool {
        self.banned_usernames.iter().any(|b| b == username)
    }
}

fn parse_banned(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_banned(raw: &str) -> AppConfig {
        AppConfig {
            database_url: String::new(),
            secret_key: "s".into(),
            banned_usernames: parse_banned(raw),
            api_version: "v1".into(),
            jwt: JwtConfig {
                secret: "s".into(),
                issuer: "i".into(),
                audience: "a".into(),
                ttl_minutes: 5,
            },
            smtp: SmtpConfig {
                host: "localhost".into(),
                port: 25,
                username: None,
                password: None,
                from_email: "noreply@critiq.local".into(),
            },
        }
    }

    #[test]
    fn parse_banned_trims_and_drops_empty() {
        let banned = parse_banned("me, admin,,  root ");
        assert_eq!(banned, vec!["me", "admin", "root"]);
    }

    #[test]
    fn is_banned_matches_exactly() {
        let config = config_with_banned("me,admin");
        assert!(config.is_banned("me"));
        assert!(config.is_banned("admin"));
        assert!(!config.is_banned("Me"));
        assert!(!config.is_banned("neo"));
    }
}
