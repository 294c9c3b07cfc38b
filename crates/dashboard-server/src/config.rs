use std::{
    env, fmt,
    net::{AddrParseError, SocketAddr},
    time::Duration,
};

use streaming::EngineSettings;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_PROVIDER_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_MAX_DEVIATION_PCT: f64 = 6.0;
const DEFAULT_PRICE_WINDOW: u64 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_JSON: bool = false;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub provider_url: String,
    pub poll_interval: Duration,
    pub max_deviation_pct: f64,
    pub price_window: usize,
    pub http_timeout: Duration,
    pub log_json: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidListenAddr(AddrParseError),
    InvalidProviderUrl,
    InvalidPollInterval,
    InvalidMaxDeviationPct,
    InvalidPriceWindow,
    InvalidHttpTimeout,
    InvalidLogJson,
    NonUnicodeListenAddr,
    NonUnicodeProviderUrl,
    NonUnicodePollInterval,
    NonUnicodeMaxDeviationPct,
    NonUnicodePriceWindow,
    NonUnicodeHttpTimeout,
    NonUnicodeLogJson,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidListenAddr(err) => {
                write!(f, "DASHBOARD_ADDR is not a valid socket address: {err}")
            }
            Self::InvalidProviderUrl => {
                write!(f, "DASHBOARD_PROVIDER_URL must be an http:// or https:// URL")
            }
            Self::InvalidPollInterval => {
                write!(f, "DASHBOARD_POLL_INTERVAL_SECS must be a whole number of seconds above 0")
            }
            Self::InvalidMaxDeviationPct => {
                write!(
                    f,
                    "DASHBOARD_MAX_DEVIATION_PCT must be a finite percentage between 0 and 100"
                )
            }
            Self::InvalidPriceWindow => {
                write!(f, "DASHBOARD_PRICE_WINDOW must be a whole number above 0")
            }
            Self::InvalidHttpTimeout => {
                write!(f, "DASHBOARD_HTTP_TIMEOUT_SECS must be a whole number of seconds above 0")
            }
            Self::InvalidLogJson => {
                write!(f, "DASHBOARD_LOG_JSON must be true or false")
            }
            Self::NonUnicodeListenAddr => {
                write!(f, "DASHBOARD_ADDR contains non-unicode data")
            }
            Self::NonUnicodeProviderUrl => {
                write!(f, "DASHBOARD_PROVIDER_URL contains non-unicode data")
            }
            Self::NonUnicodePollInterval => {
                write!(f, "DASHBOARD_POLL_INTERVAL_SECS contains non-unicode data")
            }
            Self::NonUnicodeMaxDeviationPct => {
                write!(f, "DASHBOARD_MAX_DEVIATION_PCT contains non-unicode data")
            }
            Self::NonUnicodePriceWindow => {
                write!(f, "DASHBOARD_PRICE_WINDOW contains non-unicode data")
            }
            Self::NonUnicodeHttpTimeout => {
                write!(f, "DASHBOARD_HTTP_TIMEOUT_SECS contains non-unicode data")
            }
            Self::NonUnicodeLogJson => {
                write!(f, "DASHBOARD_LOG_JSON contains non-unicode data")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidListenAddr(err) => Some(err),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = match env::var("DASHBOARD_ADDR") {
            Ok(value) => value.parse().map_err(ConfigError::InvalidListenAddr)?,
            Err(env::VarError::NotPresent) => DEFAULT_LISTEN_ADDR
                .parse()
                .expect("default listen address must be valid"),
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::NonUnicodeListenAddr);
            }
        };

        let provider_url = match env::var("DASHBOARD_PROVIDER_URL") {
            Ok(value) => {
                let value = value.trim();
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(ConfigError::InvalidProviderUrl);
                }
                value.to_owned()
            }
            Err(env::VarError::NotPresent) => DEFAULT_PROVIDER_URL.to_owned(),
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::NonUnicodeProviderUrl);
            }
        };

        let poll_interval = Duration::from_secs(parse_positive_env(
            "DASHBOARD_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
            ConfigError::InvalidPollInterval,
            ConfigError::NonUnicodePollInterval,
        )?);

        let max_deviation_pct = parse_percentage_env(
            "DASHBOARD_MAX_DEVIATION_PCT",
            DEFAULT_MAX_DEVIATION_PCT,
            ConfigError::InvalidMaxDeviationPct,
            ConfigError::NonUnicodeMaxDeviationPct,
        )?;

        let price_window = parse_positive_env(
            "DASHBOARD_PRICE_WINDOW",
            DEFAULT_PRICE_WINDOW,
            ConfigError::InvalidPriceWindow,
            ConfigError::NonUnicodePriceWindow,
        )?;
        let price_window =
            usize::try_from(price_window).map_err(|_| ConfigError::InvalidPriceWindow)?;

        let http_timeout = Duration::from_secs(parse_positive_env(
            "DASHBOARD_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
            ConfigError::InvalidHttpTimeout,
            ConfigError::NonUnicodeHttpTimeout,
        )?);

        let log_json = match env::var("DASHBOARD_LOG_JSON") {
            Ok(value) => parse_bool(value.as_str()).ok_or(ConfigError::InvalidLogJson)?,
            Err(env::VarError::NotPresent) => DEFAULT_LOG_JSON,
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::NonUnicodeLogJson);
            }
        };

        Ok(Self {
            listen_addr,
            provider_url,
            poll_interval,
            max_deviation_pct,
            price_window,
            http_timeout,
            log_json,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            poll_interval: self.poll_interval,
            window_len: self.price_window,
            max_deviation: self.max_deviation_pct / 100.0,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_positive_env(
    key: &str,
    default_value: u64,
    invalid_error: ConfigError,
    non_unicode_error: ConfigError,
) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(invalid_error),
        },
        Err(env::VarError::NotPresent) => Ok(default_value),
        Err(env::VarError::NotUnicode(_)) => Err(non_unicode_error),
    }
}

fn parse_percentage_env(
    key: &str,
    default_value: f64,
    invalid_error: ConfigError,
    non_unicode_error: ConfigError,
) -> Result<f64, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let parsed = match value.parse::<f64>() {
                Ok(parsed) => parsed,
                Err(_) => return Err(invalid_error),
            };
            if !parsed.is_finite() || parsed <= 0.0 || parsed > 100.0 {
                return Err(invalid_error);
            }
            Ok(parsed)
        }
        Err(env::VarError::NotPresent) => Ok(default_value),
        Err(env::VarError::NotUnicode(_)) => Err(non_unicode_error),
    }
}

#[cfg(test)]
mod tests {
    use std::{env, sync::Mutex, time::Duration};

    use super::{Config, ConfigError};

    static ENV_LOCK: Mutex<()> = Mutex::new(());
    const ENV_ADDR_KEY: &str = "DASHBOARD_ADDR";
    const ENV_PROVIDER_KEY: &str = "DASHBOARD_PROVIDER_URL";
    const ENV_POLL_KEY: &str = "DASHBOARD_POLL_INTERVAL_SECS";
    const ENV_DEVIATION_KEY: &str = "DASHBOARD_MAX_DEVIATION_PCT";
    const ENV_WINDOW_KEY: &str = "DASHBOARD_PRICE_WINDOW";
    const ENV_TIMEOUT_KEY: &str = "DASHBOARD_HTTP_TIMEOUT_SECS";
    const ENV_LOG_JSON_KEY: &str = "DASHBOARD_LOG_JSON";

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }

        fn unset(key: &'static str) -> Self {
            let previous = env::var_os(key);
            env::remove_var(key);
            Self { key, previous }
        }

        #[cfg(unix)]
        fn set_os(key: &'static str, value: std::ffi::OsString) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    fn reset_config_env_baseline() -> [EnvVarGuard; 7] {
        [
            EnvVarGuard::unset(ENV_ADDR_KEY),
            EnvVarGuard::unset(ENV_PROVIDER_KEY),
            EnvVarGuard::unset(ENV_POLL_KEY),
            EnvVarGuard::unset(ENV_DEVIATION_KEY),
            EnvVarGuard::unset(ENV_WINDOW_KEY),
            EnvVarGuard::unset(ENV_TIMEOUT_KEY),
            EnvVarGuard::unset(ENV_LOG_JSON_KEY),
        ]
    }

    #[test]
    fn defaults_match_the_streaming_constants() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.provider_url, "https://query1.finance.yahoo.com");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.price_window, 10);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert!(!config.log_json);
        assert_eq!(config.engine_settings(), streaming::EngineSettings::default());
    }

    #[test]
    fn uses_listen_address_override_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_ADDR_KEY, "127.0.0.1:9090");

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:9090".parse().unwrap());
    }

    #[test]
    fn returns_error_for_invalid_listen_address_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_ADDR_KEY, "not-an-addr");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidListenAddr(_)));
    }

    #[test]
    fn returns_error_for_provider_url_without_scheme() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_PROVIDER_KEY, "query1.finance.yahoo.com");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidProviderUrl));
    }

    #[test]
    fn deviation_percentage_becomes_a_fraction() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_DEVIATION_KEY, "2.5");

        let config = Config::from_env().unwrap();

        assert_eq!(config.max_deviation_pct, 2.5);
        assert_eq!(config.engine_settings().max_deviation, 0.025);
    }

    #[test]
    fn returns_error_for_out_of_range_deviation() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        for value in ["0", "-1", "100.5", "NaN", "six"] {
            let _guard = EnvVarGuard::set(ENV_DEVIATION_KEY, value);

            let err = Config::from_env().unwrap_err();

            assert!(matches!(err, ConfigError::InvalidMaxDeviationPct), "{value}");
        }
    }

    #[test]
    fn uses_poll_interval_and_window_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _poll = EnvVarGuard::set(ENV_POLL_KEY, "3");
        let _window = EnvVarGuard::set(ENV_WINDOW_KEY, "25");

        let settings = Config::from_env().unwrap().engine_settings();

        assert_eq!(settings.poll_interval, Duration::from_secs(3));
        assert_eq!(settings.window_len, 25);
    }

    #[test]
    fn returns_error_for_zero_poll_interval() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_POLL_KEY, "0");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidPollInterval));
    }

    #[test]
    fn returns_error_for_non_numeric_window() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_WINDOW_KEY, "ten");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidPriceWindow));
    }

    #[test]
    fn returns_error_for_invalid_log_json_flag() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_LOG_JSON_KEY, "yes");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidLogJson));
    }

    #[cfg(unix)]
    #[test]
    fn returns_error_for_non_unicode_env_var() {
        use std::os::unix::ffi::OsStringExt;

        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set_os(
            ENV_ADDR_KEY,
            std::ffi::OsString::from_vec(vec![0x66, 0x6f, 0x80]),
        );

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::NonUnicodeListenAddr));
    }

    #[cfg(unix)]
    #[test]
    fn returns_error_for_non_unicode_timeout_env_var() {
        use std::os::unix::ffi::OsStringExt;

        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set_os(
            ENV_TIMEOUT_KEY,
            std::ffi::OsString::from_vec(vec![0x31, 0x80]),
        );

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::NonUnicodeHttpTimeout));
    }
}
