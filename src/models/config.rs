//! 控制台配置
//!
//! 提供配置驱动的会话创建，支持：
//! - TOML/JSON 配置文件加载
//! - 分层加载（配置文件 + `LOG_CONSOLE__*` 环境变量）
//! - 开发和生产环境的默认配置
//! - 配置验证和错误处理

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// 环境变量前缀，例如 `LOG_CONSOLE__SEARCH__DEBOUNCE_MS=100`
pub const ENV_PREFIX: &str = "LOG_CONSOLE";

/// 控制台配置
#[derive(Default, Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConsoleConfig {
    /// 搜索配置
    #[serde(default)]
    #[validate(nested)]
    pub search: SearchConfig,
    /// 实时查询配置
    #[serde(default)]
    #[validate(nested)]
    pub live_query: LiveQueryConfig,
    /// 事件总线配置
    #[serde(default)]
    #[validate(nested)]
    pub event_bus: EventBusConfig,
    /// 日志配置
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    /// "最近" 预设的时间窗口（秒）
    #[serde(default = "default_recent_window_secs")]
    #[validate(range(min = 1, max = 604800))]
    pub recent_window_secs: u64,
    /// 正则表达式缓存大小
    #[serde(default = "default_regex_cache_capacity")]
    #[validate(range(min = 1, max = 10000))]
    pub regex_cache_capacity: usize,
    /// 文本输入防抖间隔（毫秒），0 表示不防抖
    #[serde(default = "default_debounce_ms")]
    #[validate(range(max = 10000))]
    pub debounce_ms: u64,
    /// 快捷过滤器最大保存数量
    #[serde(default = "default_max_quick_filters")]
    #[validate(range(min = 1, max = 100))]
    pub max_quick_filters: usize,
}

fn default_recent_window_secs() -> u64 {
    600 // 10 分钟
}

fn default_regex_cache_capacity() -> usize {
    64
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_max_quick_filters() -> usize {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            recent_window_secs: default_recent_window_secs(),
            regex_cache_capacity: default_regex_cache_capacity(),
            debounce_ms: default_debounce_ms(),
            max_quick_filters: default_max_quick_filters(),
        }
    }
}

impl SearchConfig {
    pub fn recent_window(&self) -> Duration {
        Duration::from_secs(self.recent_window_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// 实时查询配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LiveQueryConfig {
    /// 分页获取时的默认页大小
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100000))]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    100
}

impl Default for LiveQueryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// 事件总线配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventBusConfig {
    /// 通道容量
    #[serde(default = "default_event_bus_capacity")]
    #[validate(range(min = 1, max = 1000000))]
    pub capacity: usize,
}

fn default_event_bus_capacity() -> usize {
    1000
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_bus_capacity(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// 默认日志级别（RUST_LOG 优先）
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1, max = 200))]
    pub level: String,
    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ConsoleConfig {
    /// 从 TOML 文件加载配置
    ///
    /// # Errors
    /// 如果文件不存在或格式错误，返回错误
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse TOML config: {}", path.display()))?;

        tracing::info!("Loaded console configuration from: {}", path.display());
        Ok(config)
    }

    /// 从 JSON 文件加载配置
    ///
    /// # Errors
    /// 如果文件不存在或格式错误，返回错误
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse JSON config: {}", path.display()))?;

        tracing::info!("Loaded console configuration from: {}", path.display());
        Ok(config)
    }

    /// 分层加载：可选配置文件，然后由环境变量覆盖
    ///
    /// 文件格式根据扩展名推断（.toml / .json）。加载后会执行验证。
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .wrap_err("Failed to build layered configuration")?
            .try_deserialize()
            .wrap_err("Failed to deserialize layered configuration")?;

        config.validate()?;
        tracing::debug!(?path, "Layered console configuration loaded");
        Ok(config)
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).wrap_err("Failed to serialize config to TOML")?;

        std::fs::write(path, content)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved console configuration to: {}", path.display());
        Ok(())
    }

    /// 创建开发环境默认配置
    pub fn development() -> Self {
        Self {
            search: SearchConfig {
                recent_window_secs: 300,
                regex_cache_capacity: 32,
                debounce_ms: 100,
                max_quick_filters: 10,
            },
            live_query: LiveQueryConfig { page_size: 50 },
            event_bus: EventBusConfig { capacity: 1000 },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }

    /// 创建生产环境默认配置
    pub fn production() -> Self {
        Self {
            search: SearchConfig {
                recent_window_secs: 600,
                regex_cache_capacity: 256,
                debounce_ms: 250,
                max_quick_filters: 20,
            },
            live_query: LiveQueryConfig { page_size: 200 },
            event_bus: EventBusConfig { capacity: 4000 },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: true,
            },
        }
    }

    /// 验证配置
    ///
    /// # Errors
    /// 如果配置无效，返回错误
    pub fn validate(&self) -> Result<()> {
        <Self as Validate>::validate(self)
            .map_err(|e| eyre::eyre!("Invalid console configuration: {}", e))?;

        tracing::debug!("Console configuration validated successfully");
        Ok(())
    }
}
