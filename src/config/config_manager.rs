// ==========================================
// 畜群月报 - 配置管理器
// ==========================================
// 职责: 月报配置加载（缺失/格式错误时回退默认值）
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::table_exists;
use crate::engine::age_resolver::DEFAULT_DAYS_PER_MONTH;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 配置键
pub mod config_keys {
    pub const RECENT_INVOICE_WINDOW: &str = "bulletin/recent_invoice_window";
    pub const UNSPECIFIED_BREED_LABEL: &str = "bulletin/unspecified_breed_label";
    pub const DAYS_PER_MONTH: &str = "bulletin/days_per_month";
    pub const MAX_UNIT_QUANTITY: &str = "bulletin/max_unit_quantity";
}

/// 默认补捞发票张数
pub const DEFAULT_RECENT_INVOICE_WINDOW: usize = 10;

/// 单条记录允许的最大头数（超出视为异常记录）
pub const DEFAULT_MAX_UNIT_QUANTITY: u32 = 10_000;

/// 默认品种占位名
pub const DEFAULT_UNSPECIFIED_BREED: &str = "Unspecified";

// ==========================================
// BulletinConfig - 月报配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletinConfig {
    pub recent_invoice_window: usize,
    pub unspecified_breed_label: String,
    pub days_per_month: f64,
    pub max_unit_quantity: u32,
}

impl Default for BulletinConfig {
    fn default() -> Self {
        Self {
            recent_invoice_window: DEFAULT_RECENT_INVOICE_WINDOW,
            unspecified_breed_label: DEFAULT_UNSPECIFIED_BREED.to_string(),
            days_per_month: DEFAULT_DAYS_PER_MONTH,
            max_unit_quantity: DEFAULT_MAX_UNIT_QUANTITY,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在，或 config_kv 表不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        if !table_exists(&conn, "config_kv")? {
            return Ok(None);
        }

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取并解析配置，缺失或解析失败时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr,
    {
        match self.get_global_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(key, value = %raw, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 加载月报配置
    pub fn load_bulletin_config(&self) -> Result<BulletinConfig, Box<dyn Error>> {
        let defaults = BulletinConfig::default();

        let recent_invoice_window = self.get_parsed_or_default(
            config_keys::RECENT_INVOICE_WINDOW,
            defaults.recent_invoice_window,
        )?;

        let unspecified_breed_label = self
            .get_global_config_value(config_keys::UNSPECIFIED_BREED_LABEL)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.unspecified_breed_label);

        let mut days_per_month =
            self.get_parsed_or_default(config_keys::DAYS_PER_MONTH, defaults.days_per_month)?;
        if !(days_per_month.is_finite() && days_per_month > 0.0) {
            warn!(days_per_month, "每月天数必须为正数，使用默认值");
            days_per_month = DEFAULT_DAYS_PER_MONTH;
        }

        let mut max_unit_quantity =
            self.get_parsed_or_default(config_keys::MAX_UNIT_QUANTITY, defaults.max_unit_quantity)?;
        if max_unit_quantity == 0 {
            warn!("单条记录最大头数必须为正数，使用默认值");
            max_unit_quantity = DEFAULT_MAX_UNIT_QUANTITY;
        }

        let config = BulletinConfig {
            recent_invoice_window,
            unspecified_breed_label,
            days_per_month,
            max_unit_quantity,
        };
        debug!(?config, "月报配置加载完成");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(entries: &[(&str, &str)]) -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE config_kv (
                scope_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (scope_id, key)
            );
            "#,
        )
        .unwrap();
        for (key, value) in entries {
            conn.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)",
                params![key, value],
            )
            .unwrap();
        }
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_defaults_without_config_table() {
        let conn = Connection::open_in_memory().unwrap();
        let manager = ConfigManager::from_connection(Arc::new(Mutex::new(conn)));
        assert_eq!(manager.load_bulletin_config().unwrap(), BulletinConfig::default());
    }

    #[test]
    fn test_overrides_from_config_kv() {
        let manager = manager_with(&[
            (config_keys::RECENT_INVOICE_WINDOW, "25"),
            (config_keys::UNSPECIFIED_BREED_LABEL, "Sem raça"),
            (config_keys::DAYS_PER_MONTH, "30"),
            (config_keys::MAX_UNIT_QUANTITY, "500"),
        ]);
        let config = manager.load_bulletin_config().unwrap();
        assert_eq!(config.recent_invoice_window, 25);
        assert_eq!(config.unspecified_breed_label, "Sem raça");
        assert_eq!(config.days_per_month, 30.0);
        assert_eq!(config.max_unit_quantity, 500);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let manager = manager_with(&[
            (config_keys::RECENT_INVOICE_WINDOW, "many"),
            (config_keys::UNSPECIFIED_BREED_LABEL, "   "),
            (config_keys::DAYS_PER_MONTH, "-1"),
            (config_keys::MAX_UNIT_QUANTITY, "0"),
        ]);
        assert_eq!(manager.load_bulletin_config().unwrap(), BulletinConfig::default());
    }
}
