// ==========================================
// 畜群月报 - 发票仓储
// ==========================================
// 表: invoice（抬头 + 内嵌明细原文）/ invoice_item（明细表）
// 红线: Repository 不含业务逻辑，明细原文交由引擎层解析
// ==========================================

use crate::db::{optional_column_expr, table_exists};
use crate::domain::movement::{DateRange, InvoiceHeader, MovementRecord};
use crate::domain::types::{Direction, SourceTier};
use crate::engine::sources::InvoiceSource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_values::{value_as_f64, value_as_quantity, value_as_text};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

/// 名称包含匹配的最少字符数（更短的过滤值只按对方编号精确匹配）
const MIN_NAME_MATCH_CHARS: usize = 3;

/// 对方匹配条件: 场点为空不过滤；否则按对方编号精确匹配或名称包含（不区分大小写）
///
/// ?1 为场点原文，?{pattern_param} 为已转义的 LIKE 模式（NULL 表示不按名称匹配）
fn counterparty_filter(pattern_param: usize) -> String {
    format!(
        r#"
    (?1 = ''
     OR counterparty_id = ?1
     OR LOWER(COALESCE(counterparty_name, '')) LIKE LOWER(?{}) ESCAPE '\')
"#,
        pattern_param
    )
}

/// 名称包含匹配的 LIKE 模式: 转义 \ % _，过短时返回 None
fn name_like_pattern(site_filter: &str) -> Option<String> {
    let trimmed = site_filter.trim();
    if trimmed.chars().count() < MIN_NAME_MATCH_CHARS {
        return None;
    }
    let mut pattern = String::with_capacity(trimmed.len() + 2);
    pattern.push('%');
    for ch in trimmed.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}

// ==========================================
// InvoiceRepository - 第二/三层数据源
// ==========================================
pub struct InvoiceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InvoiceRepository {
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

    fn ensure_table(conn: &Connection, table: &str) -> RepositoryResult<()> {
        if table_exists(conn, table)? {
            Ok(())
        } else {
            Err(RepositoryError::MissingTable(table.to_string()))
        }
    }

    fn map_header(row: &Row<'_>) -> rusqlite::Result<InvoiceHeader> {
        Ok(InvoiceHeader {
            id: row.get(0)?,
            issue_date: value_as_text(row.get::<_, Value>(1)?),
            counterparty_id: value_as_text(row.get::<_, Value>(2)?),
            counterparty_name: value_as_text(row.get::<_, Value>(3)?),
            items_raw: value_as_text(row.get::<_, Value>(4)?),
        })
    }
}

impl InvoiceSource for InvoiceRepository {
    fn query_invoices(&self, range: &DateRange, site_filter: &str) -> RepositoryResult<Vec<InvoiceHeader>> {
        let conn = self.get_conn()?;
        Self::ensure_table(&conn, "invoice")?;

        let sql = format!(
            r#"
            SELECT id, issue_date, counterparty_id, counterparty_name, items
            FROM invoice
            WHERE date(issue_date) BETWEEN ?2 AND ?3
              AND {}
            ORDER BY id
            "#,
            counterparty_filter(4)
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                site_filter.trim(),
                range.start.format("%Y-%m-%d").to_string(),
                range.end.format("%Y-%m-%d").to_string(),
                name_like_pattern(site_filter),
            ],
            Self::map_header,
        )?;

        let mut headers = Vec::new();
        for row in rows {
            headers.push(row?);
        }
        Ok(headers)
    }

    fn recent_invoices(&self, site_filter: &str, limit: usize) -> RepositoryResult<Vec<InvoiceHeader>> {
        let conn = self.get_conn()?;
        Self::ensure_table(&conn, "invoice")?;

        // 按录入顺序（id）取最近，日期缺失的发票也能被捞到
        let sql = format!(
            r#"
            SELECT id, issue_date, counterparty_id, counterparty_name, items
            FROM invoice
            WHERE {}
            ORDER BY id DESC
            LIMIT ?2
            "#,
            counterparty_filter(3)
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![site_filter.trim(), limit as i64, name_like_pattern(site_filter)],
            Self::map_header,
        )?;

        let mut headers = Vec::new();
        for row in rows {
            headers.push(row?);
        }
        Ok(headers)
    }

    fn query_line_items(&self, invoice_id: i64) -> RepositoryResult<Vec<MovementRecord>> {
        let conn = self.get_conn()?;
        Self::ensure_table(&conn, "invoice_item")?;

        let age_label_expr = optional_column_expr(&conn, "invoice_item", "age_label");
        let birth_date_expr = optional_column_expr(&conn, "invoice_item", "birth_date");
        let sql = format!(
            r#"
            SELECT id, breed, sex, age_months, {}, {}, quantity
            FROM invoice_item
            WHERE invoice_id = ?1
            ORDER BY id
            "#,
            age_label_expr, birth_date_expr
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![invoice_id], |row| {
            let id: i64 = row.get(0)?;
            Ok(MovementRecord {
                direction: Direction::Entry,
                breed: value_as_text(row.get::<_, Value>(1)?).unwrap_or_default(),
                sex_raw: value_as_text(row.get::<_, Value>(2)?),
                sex_extra_raw: None,
                age_months_raw: value_as_f64(row.get::<_, Value>(3)?),
                age_label_raw: value_as_text(row.get::<_, Value>(4)?),
                birth_date: value_as_text(row.get::<_, Value>(5)?),
                quantity: value_as_quantity(row.get::<_, Value>(6)?),
                source_tier: SourceTier::InvoiceLineItem,
                source_ref: format!("invoice#{}/invoice_item#{}", invoice_id, id),
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
