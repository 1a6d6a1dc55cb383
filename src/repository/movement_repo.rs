// ==========================================
// 畜群月报 - 结构化进出场记录仓储
// ==========================================
// 表: animal_movement
// 红线: Repository 不含业务逻辑（不解析年龄、不判定性别）
// ==========================================

use crate::db::{build_in_clause, optional_column_expr, table_exists};
use crate::domain::movement::{DateRange, MovementRecord};
use crate::domain::types::{Direction, SourceTier};
use crate::engine::sources::StructuredMovementSource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_values::{extra_data_sex, value_as_f64, value_as_quantity, value_as_text};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::debug;

const TABLE: &str = "animal_movement";

/// SQLite 的 UPPER 只折叠 ASCII，重音字母先替换（Saída / SAÍDA → SAIDA）
const MOVEMENT_TYPE_EXPR: &str =
    "UPPER(TRIM(REPLACE(REPLACE(movement_type, 'í', 'i'), 'Í', 'I')))";

// ==========================================
// StructuredMovementRepository - 第一层数据源
// ==========================================
pub struct StructuredMovementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StructuredMovementRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl StructuredMovementSource for StructuredMovementRepository {
    /// 按方向/期间/场点读取进出场记录
    ///
    /// # 说明
    /// - movement_type 大小写不敏感，兼容英文/葡文编码
    /// - age_label / extra_data / birth_date 为可选列，不存在时按 NULL 读取
    /// - 表不存在视为主存储不可用（致命错误）
    fn query_movements(
        &self,
        direction: Direction,
        range: &DateRange,
        site_filter: &str,
    ) -> RepositoryResult<Vec<MovementRecord>> {
        let conn = self.get_conn()?;

        if !table_exists(&conn, TABLE)? {
            return Err(RepositoryError::MissingTable(TABLE.to_string()));
        }

        let age_label_expr = optional_column_expr(&conn, TABLE, "age_label");
        let extra_data_expr = optional_column_expr(&conn, TABLE, "extra_data");
        let birth_date_expr = optional_column_expr(&conn, TABLE, "birth_date");
        debug!(
            direction = %direction,
            age_label = %age_label_expr,
            extra_data = %extra_data_expr,
            birth_date = %birth_date_expr,
            "animal_movement 列能力探测"
        );

        let codes = direction.db_codes();
        let sql = format!(
            r#"
            SELECT id, breed, sex, {extra}, age_months, {label}, {birth}, quantity
            FROM animal_movement
            WHERE {type_clause}
              AND date(movement_date) BETWEEN ? AND ?
              AND (? = '' OR site_id = ?)
            ORDER BY id
            "#,
            extra = extra_data_expr,
            label = age_label_expr,
            birth = birth_date_expr,
            type_clause = build_in_clause(MOVEMENT_TYPE_EXPR, codes),
        );

        let site = site_filter.trim().to_string();
        let mut params: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        params.push(range.start.format("%Y-%m-%d").to_string());
        params.push(range.end.format("%Y-%m-%d").to_string());
        params.push(site.clone());
        params.push(site);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
            let id: i64 = row.get(0)?;
            Ok(MovementRecord {
                direction,
                breed: value_as_text(row.get::<_, Value>(1)?).unwrap_or_default(),
                sex_raw: value_as_text(row.get::<_, Value>(2)?),
                sex_extra_raw: extra_data_sex(row.get::<_, Value>(3)?),
                age_months_raw: value_as_f64(row.get::<_, Value>(4)?),
                age_label_raw: value_as_text(row.get::<_, Value>(5)?),
                birth_date: value_as_text(row.get::<_, Value>(6)?),
                quantity: value_as_quantity(row.get::<_, Value>(7)?),
                source_tier: SourceTier::Structured,
                source_ref: format!("animal_movement#{}", id),
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
