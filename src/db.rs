// ==========================================
// 畜群月报 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，报表读取与 CRUD 写入并发时减少偶发 busy 错误
// - 提供表/列存在性探测（可选列按能力标记处理，不视为错误）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 构建 IN 子句的 SQL 片段，例如: "movement_type IN (?, ?)"
///
/// 空列表时返回永假条件，确保 SQL 语法正确
pub fn build_in_clause<T: AsRef<str>>(column_expr: &str, values: &[T]) -> String {
    if values.is_empty() {
        return "1 = 0".to_string();
    }
    let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    format!("{} IN ({})", column_expr, placeholders)
}

/// 可选列的 SELECT 表达式: 列存在时原样选取，否则选 NULL
pub fn optional_column_expr(conn: &Connection, table: &str, col: &str) -> String {
    if table_has_column(conn, table, col) {
        col.to_string()
    } else {
        format!("NULL AS {}", col)
    }
}

/// 检查表是否存在
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found: Option<i32> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?1 LIMIT 1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// 检查表是否存在指定列
///
/// # 返回
/// - `true`: 列存在
/// - `false`: 列不存在或查询失败
///
/// # 说明
/// - 使用 `pragma_table_info` 查询表结构
/// - 表名来自内部常量，转义后内联；列名参数化
pub fn table_has_column(conn: &Connection, table: &str, col: &str) -> bool {
    if table.trim().is_empty() || col.trim().is_empty() {
        return false;
    }
    // NOTE: `pragma_table_info(?1)` is not reliably parameterizable across SQLite builds.
    let table_escaped = table.replace('\'', "''");
    let sql = format!(
        "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?1",
        table_escaped
    );
    conn.query_row(&sql, rusqlite::params![col], |row| row.get::<_, i32>(0))
        .map(|v| v > 0)
        .unwrap_or(false)
}
