use miette::Diagnostic;
use thiserror::Error;

/**
 * 应用错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * 匹配器本身从不返回错误（非法正则视为不匹配），
 * 这里的错误主要来自记录存储和配置加载。
 */
#[derive(Error, Debug, Diagnostic)]
pub enum AppError {
    #[error("Store error: {message}")]
    #[diagnostic(
        code(console::store_error),
        help("The record store could not be queried; the last known results are kept and the query is retried on the next change")
    )]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Pattern error: {0}")]
    #[diagnostic(code(console::pattern_error), help("Check your regex pattern syntax"))]
    Pattern(String),

    #[error("Validation error: {0}")]
    #[diagnostic(
        code(console::validation_error),
        help("Check that your input meets the required format and constraints")
    )]
    Validation(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(console::config_error))]
    Config(String),
}

impl AppError {
    /**
     * 为错误添加上下文信息
     */
    pub fn with_context(self, context: impl Into<String>) -> Self {
        let context = context.into();
        match self {
            AppError::Store { message, source } => AppError::Store {
                message: format!("{}: {}", context, message),
                source,
            },
            AppError::Pattern(message) => AppError::Pattern(format!("{}: {}", context, message)),
            other => other,
        }
    }

    /**
     * 创建存储错误
     */
    pub fn store_error(message: impl Into<String>) -> Self {
        AppError::Store {
            message: message.into(),
            source: None,
        }
    }

    /**
     * 创建模式错误
     */
    pub fn pattern_error(message: impl Into<String>) -> Self {
        AppError::Pattern(message.into())
    }

    /**
     * 创建验证错误
     */
    pub fn validation_error(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /**
     * 创建配置错误
     */
    pub fn config_error(message: impl Into<String>) -> Self {
        AppError::Config(message.into())
    }

    /// 是否可以通过下一次重新计算自动恢复
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Store { .. })
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = AppError::store_error("fetch failed");
        assert!(matches!(error, AppError::Store { .. }));

        let error = AppError::validation_error("Invalid input");
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[test]
    fn test_error_with_context() {
        let error = AppError::store_error("fetch failed");
        let with_context = error.with_context("count logs");

        if let AppError::Store { message, .. } = with_context {
            assert!(message.contains("count logs"), "got: {:?}", message);
            assert!(message.contains("fetch failed"), "got: {:?}", message);
        } else {
            panic!("Expected Store error");
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::store_error("boom").is_retryable());
        assert!(!AppError::pattern_error("([").is_retryable());
        assert!(!AppError::config_error("bad").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let error = AppError::pattern_error("unclosed group");
        assert_eq!(error.to_string(), "Pattern error: unclosed group");
    }
}
