// ==========================================
// 畜群月报 - 配置层
// ==========================================
// 职责: 月报配置读取
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, BulletinConfig, ConfigManager};
