// ==========================================
// 畜群月报 - 采集数据源接口
// ==========================================
// 职责: 定义采集器所需的三层数据读取接口（不包含实现）
// 实现者: repository 层（SQLite）；测试中可用内存实现替换
// 红线: 只读，不含分类逻辑
// ==========================================

use crate::domain::movement::{DateRange, InvoiceHeader, MovementRecord};
use crate::domain::types::Direction;
use crate::repository::error::RepositoryResult;

/// 第一层: 结构化进出场记录
pub trait StructuredMovementSource {
    /// 按方向/期间/场点读取（site_filter 为空表示不过滤）
    fn query_movements(
        &self,
        direction: Direction,
        range: &DateRange,
        site_filter: &str,
    ) -> RepositoryResult<Vec<MovementRecord>>;
}

/// 第二/三层: 发票抬头（内嵌明细）与发票明细表
pub trait InvoiceSource {
    /// 期间内、对方匹配场点的发票
    fn query_invoices(&self, range: &DateRange, site_filter: &str) -> RepositoryResult<Vec<InvoiceHeader>>;

    /// 最近 limit 张发票（不限期间，用于补捞补录/无日期发票）
    fn recent_invoices(&self, site_filter: &str, limit: usize) -> RepositoryResult<Vec<InvoiceHeader>>;

    /// 发票明细表中的明细（入场方向）
    fn query_line_items(&self, invoice_id: i64) -> RepositoryResult<Vec<MovementRecord>>;
}
