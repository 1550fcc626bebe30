//! 日志系统初始化

use tracing_subscriber::EnvFilter;

use crate::models::config::LoggingConfig;

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 环境变量优先于配置中的默认级别。重复调用不会报错，
/// 只有第一次调用生效（返回 false 表示已存在全局订阅者）。
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    match result {
        Ok(()) => {
            tracing::info!(level = %config.level, json = config.json, "Tracing initialized");
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
