use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 推理强度
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl std::str::FromStr for ReasoningEffort {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            other => Err(ConfigError::invalid(
                "reasoning_effort",
                format!("未知取值 '{}'", other),
            )),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 模型标识
    pub model_identifier: String,
    /// 推理强度（None 表示不发送该参数）
    pub reasoning_effort: Option<ReasoningEffort>,
    pub temperature: f32,
    /// 是否允许模型使用联网搜索
    pub enable_web_search: bool,
    // --- 重试配置 ---
    /// 单次调用的最大尝试次数
    pub max_retries: u32,
    /// 退避基准延迟（毫秒），每次尝试翻倍
    pub base_backoff_ms: u64,
    /// 每个网络分段的最长等待时间（秒）
    pub per_attempt_timeout_secs: u64,
    // --- 批处理配置 ---
    /// 单个分块的最大页数
    pub page_budget: u32,
    /// 单个批次的最大累计页数
    pub batch_page_budget: u32,
    // --- 输入输出 ---
    /// 待分析文档所在目录
    pub input_folder: String,
    /// 用户画像 TOML 文件
    pub profile_path: String,
    /// 报告输出文件
    pub output_report_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            model_identifier: "gpt-5".to_string(),
            reasoning_effort: Some(ReasoningEffort::Medium),
            temperature: 0.2,
            enable_web_search: false,
            max_retries: 3,
            base_backoff_ms: 1000,
            per_attempt_timeout_secs: 120,
            page_budget: 250,
            batch_page_budget: 250,
            input_folder: "documents".to_string(),
            profile_path: "profile.toml".to_string(),
            output_report_file: "report.json".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 先读取配置文件（可选），再用环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Load { message, .. } => ConfigError::Load {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Load {
            path: String::new(),
            message: e.to_string(),
        })
    }

    /// 环境变量覆盖；无法解析的值保留原值
    pub fn with_env_overrides(self) -> Self {
        let current = self;
        Self {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(current.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(current.llm_api_base_url),
            model_identifier: std::env::var("LLM_MODEL_NAME").unwrap_or(current.model_identifier),
            reasoning_effort: std::env::var("LLM_REASONING_EFFORT").ok().and_then(|v| v.parse().ok()).map(Some).unwrap_or(current.reasoning_effort),
            temperature: std::env::var("LLM_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(current.temperature),
            enable_web_search: std::env::var("LLM_WEB_SEARCH").ok().and_then(|v| v.parse().ok()).unwrap_or(current.enable_web_search),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(current.max_retries),
            base_backoff_ms: std::env::var("BASE_BACKOFF_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.base_backoff_ms),
            per_attempt_timeout_secs: std::env::var("PER_ATTEMPT_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.per_attempt_timeout_secs),
            page_budget: std::env::var("PAGE_BUDGET").ok().and_then(|v| v.parse().ok()).unwrap_or(current.page_budget),
            batch_page_budget: std::env::var("BATCH_PAGE_BUDGET").ok().and_then(|v| v.parse().ok()).unwrap_or(current.batch_page_budget),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(current.input_folder),
            profile_path: std::env::var("PROFILE_PATH").unwrap_or(current.profile_path),
            output_report_file: std::env::var("OUTPUT_REPORT_FILE").unwrap_or(current.output_report_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(current.verbose_logging),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::invalid("max_retries", "至少需要 1 次尝试"));
        }
        if self.page_budget == 0 {
            return Err(ConfigError::invalid("page_budget", "页数预算必须大于 0"));
        }
        if self.batch_page_budget == 0 {
            return Err(ConfigError::invalid("batch_page_budget", "批次页数预算必须大于 0"));
        }
        if self.per_attempt_timeout_secs == 0 {
            return Err(ConfigError::invalid("per_attempt_timeout_secs", "超时时间必须大于 0"));
        }
        if self.model_identifier.trim().is_empty() {
            return Err(ConfigError::invalid("model_identifier", "模型标识不能为空"));
        }
        Ok(())
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.per_attempt_timeout_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.page_budget, 250);
        assert_eq!(config.per_attempt_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_toml_partial_override_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            model_identifier = "gpt-5-mini"
            reasoning_effort = "high"
            batch_page_budget = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.model_identifier, "gpt-5-mini");
        assert_eq!(config.reasoning_effort, Some(ReasoningEffort::High));
        assert_eq!(config.batch_page_budget, 100);
        assert_eq!(config.page_budget, 250);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = Config {
            batch_page_budget: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_page_budget"));
    }

    #[test]
    fn test_reasoning_effort_parse() {
        assert_eq!("HIGH".parse::<ReasoningEffort>().unwrap(), ReasoningEffort::High);
        assert!("extreme".parse::<ReasoningEffort>().is_err());
    }
}
