use anyhow::Result;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub database: Database,
    pub voting: Voting,
    pub scoring: Scoring,
    pub observability: Observability,
    pub web: Option<Web>,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub path: String,
}

/// Ballot rules applied to every portfolio submission.
#[derive(Debug, Deserialize, Clone)]
pub struct Voting {
    /// Starting wallet for newly registered participants, in whole units.
    pub wallet_balance: i64,
    /// Exact number of distinct teams a ballot must fund.
    pub team_count: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Scoring {
    pub jury_weight: f64,
    pub investment_weight: f64,
    /// Multipliers for investments into the rank-1, rank-2, ... teams.
    /// Must be monotonically decreasing.
    pub rank_multipliers: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Observability {
    pub prometheus_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Web {
    pub port: u16,
    pub host: String,
    /// Bearer token for admin routes. None = open (local dev).
    pub api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let content = std::fs::read_to_string("config/default.toml")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.voting.wallet_balance <= 0 {
            anyhow::bail!("voting.wallet_balance must be positive");
        }
        if self.voting.team_count == 0 {
            anyhow::bail!("voting.team_count must be at least 1");
        }
        if self.scoring.jury_weight < 0.0 || self.scoring.investment_weight < 0.0 {
            anyhow::bail!("scoring weights must be non-negative");
        }
        if self.scoring.rank_multipliers.is_empty() {
            anyhow::bail!("scoring.rank_multipliers must not be empty");
        }
        let decreasing = self
            .scoring
            .rank_multipliers
            .windows(2)
            .all(|w| w[0] > w[1]);
        if !decreasing {
            anyhow::bail!("scoring.rank_multipliers must be monotonically decreasing");
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_config() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.voting.wallet_balance, 1000);
        assert_eq!(config.voting.team_count, 3);
        assert!((config.scoring.jury_weight - 0.7).abs() < 1e-9);
        assert!((config.scoring.investment_weight - 0.3).abs() < 1e-9);
        assert_eq!(config.scoring.rank_multipliers.len(), 3);
    }

    #[test]
    fn test_web_config_section() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        let web = config.web.expect("web section should be present");
        assert_eq!(web.port, 8080);
        assert_eq!(web.host, "0.0.0.0");
        assert!(web.api_key.is_none());
    }

    #[test]
    fn test_web_config_optional() {
        // Config without [web] section should still parse
        let toml = r#"
[general]
log_level = "info"

[database]
path = "data/ideafund.db"

[voting]
wallet_balance = 1000
team_count = 3

[scoring]
jury_weight = 0.7
investment_weight = 0.3
rank_multipliers = [3.0, 2.0, 1.0]

[observability]
prometheus_port = 9184
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert!(config.web.is_none());
    }

    #[test]
    fn test_rejects_increasing_rank_multipliers() {
        let toml = r#"
[general]
log_level = "info"

[database]
path = ":memory:"

[voting]
wallet_balance = 1000
team_count = 3

[scoring]
jury_weight = 0.7
investment_weight = 0.3
rank_multipliers = [1.0, 2.0, 3.0]

[observability]
prometheus_port = 9184
"#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("monotonically decreasing"));
    }

    #[test]
    fn test_rejects_zero_team_count() {
        let toml = r#"
[general]
log_level = "info"

[database]
path = ":memory:"

[voting]
wallet_balance = 1000
team_count = 0

[scoring]
jury_weight = 0.7
investment_weight = 0.3
rank_multipliers = [3.0, 2.0, 1.0]

[observability]
prometheus_port = 9184
"#;
        assert!(Config::from_toml_str(toml).is_err());
    }
}
