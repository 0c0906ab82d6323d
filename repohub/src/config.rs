use gateway::config::Config as GatewayConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize, Debug)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn gateway_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://public@sentry.example.com/1
            gateway:
                listener:
                    host: 0.0.0.0
                    port: 9000
                upstream:
                    token: ghp_example
                login:
                    username: admin
                    password: secret
                jwt:
                    signing_key: signing-key
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_host, "127.0.0.1");
        assert_eq!(metrics.statsd_port, 8125);
        assert!(config.common.logging.is_some());

        assert_eq!(config.gateway.listener.port, 9000);
        assert_eq!(config.gateway.upstream.token, "ghp_example");
        assert_eq!(config.gateway.login.username, "admin");
        assert!(config.gateway.validate().is_ok());
    }

    #[test]
    fn common_sections_are_optional() {
        let yaml = r#"
            gateway:
                upstream:
                    token: ghp_example
                login:
                    username: admin
                    password: secret
                jwt:
                    signing_key: signing-key
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.common.metrics.is_none());
        assert!(config.common.logging.is_none());
    }

    #[test]
    fn environment_overrides_gateway_secrets() {
        let yaml = r#"
            gateway:
                upstream:
                    token: ghp_example
                login:
                    username: admin
                    password: ""
                jwt:
                    signing_key: signing-key
            "#;
        let tmp = write_tmp_file(yaml);
        let mut config = Config::from_file(tmp.path()).expect("load config");
        assert_eq!(
            config.gateway.validate(),
            Err(gateway::config::ValidationError::EmptyPassword)
        );

        let applied = config.gateway.apply_overrides(|key| {
            (key == "GATEWAY_LOGIN_PASSWORD").then(|| "from-env".to_string())
        });

        assert_eq!(applied, ["GATEWAY_LOGIN_PASSWORD"]);
        assert_eq!(config.gateway.login.password, "from-env");
        assert!(config.gateway.validate().is_ok());
    }

    #[test]
    fn missing_gateway_section() {
        let tmp = write_tmp_file("metrics:\n    statsd_host: localhost\n    statsd_port: 8125\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn missing_file() {
        let result = Config::from_file(std::path::Path::new("/nonexistent/repohub.yaml"));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
