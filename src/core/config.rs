//! 核心配置
//!
//! 定义导航核心的配置结构和加载逻辑。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 注册表配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// 是否启用历史模式
    #[serde(default = "default_true")]
    pub history_enabled: bool,

    /// 守卫超时时间（毫秒）
    #[serde(default = "default_guard_timeout_ms")]
    pub guard_timeout_ms: u64,

    /// 加载器结果缓存容量
    #[serde(default = "default_loader_cache_capacity")]
    pub loader_cache_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_guard_timeout_ms() -> u64 {
    5000
}

fn default_loader_cache_capacity() -> usize {
    64
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            history_enabled: true,
            guard_timeout_ms: default_guard_timeout_ms(),
            loader_cache_capacity: default_loader_cache_capacity(),
        }
    }
}

/// 历史配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// 主区域名（其组件标签占据 URL 路径段）
    #[serde(default = "default_primary_area")]
    pub primary_area: String,

    /// 初始位置（仅内存历史栈使用）
    #[serde(default = "default_initial_location")]
    pub initial_location: String,
}

fn default_primary_area() -> String {
    "main".to_string()
}

fn default_initial_location() -> String {
    "/".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            primary_area: default_primary_area(),
            initial_location: default_initial_location(),
        }
    }
}

/// 传送配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleportConfig {
    /// 发现等待窗口（毫秒）
    #[serde(default = "default_discover_timeout_ms")]
    pub discover_timeout_ms: u64,
}

fn default_discover_timeout_ms() -> u64 {
    50
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            discover_timeout_ms: default_discover_timeout_ms(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// 保留日志文件数
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

fn default_max_files() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
            max_files: default_max_files(),
        }
    }
}

/// 核心配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 注册表配置
    #[serde(default)]
    pub registry: RegistryConfig,

    /// 历史配置
    #[serde(default)]
    pub history: HistoryConfig,

    /// 传送配置
    #[serde(default)]
    pub teleport: TeleportConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            registry: RegistryConfig::default(),
            history: HistoryConfig::default(),
            teleport: TeleportConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl CoreConfig {
    /// 创建配置构建器
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// 从文件加载配置
    pub async fn from_file(path: impl Into<PathBuf>) -> crate::utils::Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await?;

        let mut config: CoreConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.config_path = Some(path);
        Ok(config)
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: CoreConfig) {
        // 只覆盖非默认值的配置
        if !other.registry.history_enabled {
            self.registry.history_enabled = false;
        }
        if other.registry.guard_timeout_ms != default_guard_timeout_ms() {
            self.registry.guard_timeout_ms = other.registry.guard_timeout_ms;
        }
        if other.registry.loader_cache_capacity != default_loader_cache_capacity() {
            self.registry.loader_cache_capacity = other.registry.loader_cache_capacity;
        }
        if other.history.primary_area != default_primary_area() {
            self.history.primary_area = other.history.primary_area;
        }
        if other.history.initial_location != default_initial_location() {
            self.history.initial_location = other.history.initial_location;
        }
        if other.teleport.discover_timeout_ms != default_discover_timeout_ms() {
            self.teleport.discover_timeout_ms = other.teleport.discover_timeout_ms;
        }
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// 设置配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// 关闭历史模式（静默导航）
    pub fn silent(mut self) -> Self {
        self.config.registry.history_enabled = false;
        self
    }

    /// 设置主区域
    pub fn primary_area(mut self, area: impl Into<String>) -> Self {
        self.config.history.primary_area = area.into();
        self
    }

    /// 设置初始位置
    pub fn initial_location(mut self, location: impl Into<String>) -> Self {
        self.config.history.initial_location = location.into();
        self
    }

    /// 设置守卫超时（毫秒）
    pub fn guard_timeout_ms(mut self, ms: u64) -> Self {
        self.config.registry.guard_timeout_ms = ms;
        self
    }

    /// 设置传送发现窗口（毫秒）
    pub fn discover_timeout_ms(mut self, ms: u64) -> Self {
        self.config.teleport.discover_timeout_ms = ms;
        self
    }

    /// 设置加载器缓存容量
    pub fn loader_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.registry.loader_cache_capacity = capacity;
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> CoreConfig {
        self.config
    }
}
