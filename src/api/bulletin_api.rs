// ==========================================
// 畜群月报 - 月报 API（组装器）
// ==========================================
// 流程: 校验期间 → 读取配置 → 采集入场/出场 → 解析/分桶/轧差 → 组装月报
// 红线: 输入错误在采集前拒绝；主存储不可用直接返回错误
// 红线: 每次调用独立构建并丢弃矩阵，不持有跨调用的可变状态
// ==========================================

use crate::api::dto::{BulletinHeader, BulletinReport, BulletinRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::config::{BulletinConfig, ConfigManager};
use crate::domain::movement::DateRange;
use crate::domain::types::Direction;
use crate::engine::age_resolver::AgeResolver;
use crate::engine::movement_acquirer::{AcquirerConfig, MovementAcquirer};
use crate::engine::netting::NettingAggregator;
use crate::engine::sources::{InvoiceSource, StructuredMovementSource};
use crate::repository::{InvoiceRepository, StructuredMovementRepository};
use chrono::{Local, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};
use uuid::Uuid;

// ==========================================
// BulletinApi - 月报API
// ==========================================
pub struct BulletinApi {
    conn: Arc<Mutex<Connection>>,
}

impl BulletinApi {
    /// 创建新的 BulletinApi 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 生成月报
    ///
    /// # 参数
    /// - request: 期间、场点、品种过滤与基准日
    ///
    /// # 返回
    /// - Ok(BulletinReport): 品种 × 年龄桶矩阵及剔除/采集统计
    /// - Err(ApiError::InvalidInput): 期间缺失或无效
    /// - Err(其他): 主存储不可用
    #[instrument(skip(self, request), fields(start = %request.start_date, end = %request.end_date))]
    pub fn generate_bulletin(&self, request: &BulletinRequest) -> ApiResult<BulletinReport> {
        let range = DateRange::parse(&request.start_date, &request.end_date)?;

        let config = ConfigManager::from_connection(self.conn.clone())
            .load_bulletin_config()
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        let structured = StructuredMovementRepository::from_connection(self.conn.clone());
        let invoices = InvoiceRepository::from_connection(self.conn.clone());

        assemble_bulletin(&structured, &invoices, &config, range, request)
    }
}

/// 在给定数据源上执行完整流程
///
/// 期间已校验；数据源可替换（测试中使用内存实现）
pub fn assemble_bulletin(
    structured: &dyn StructuredMovementSource,
    invoices: &dyn InvoiceSource,
    config: &BulletinConfig,
    range: DateRange,
    request: &BulletinRequest,
) -> ApiResult<BulletinReport> {
    let report_id = Uuid::new_v4().to_string();
    let reference_date = request.today.unwrap_or_else(|| Local::now().date_naive());
    let site_filter = request.site_filter.trim();
    let breed_filter = request
        .breed_filter
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());

    info!(
        report_id = %report_id,
        site = site_filter,
        breed = breed_filter.unwrap_or("*"),
        reference_date = %reference_date,
        "开始生成月报"
    );

    let acquirer = MovementAcquirer::new(
        structured,
        invoices,
        AcquirerConfig {
            recent_invoice_window: config.recent_invoice_window,
            unspecified_breed: config.unspecified_breed_label.clone(),
            max_unit_quantity: config.max_unit_quantity,
        },
    );

    let entries = acquirer.acquire(breed_filter, &range, site_filter, Direction::Entry)?;
    let exits = acquirer.acquire(breed_filter, &range, site_filter, Direction::Exit)?;

    let aggregator = NettingAggregator::new(
        AgeResolver::new(reference_date, config.days_per_month),
        config.unspecified_breed_label.clone(),
    );
    let outcome = aggregator.aggregate(&entries.records, &exits.records);

    let report = BulletinReport::assemble(
        BulletinHeader {
            report_id,
            generated_at: Utc::now(),
            period: range,
            site_filter: site_filter.to_string(),
            breed_filter: breed_filter.map(str::to_string),
            reference_date,
        },
        outcome,
        entries.summary,
        exits.summary,
    );

    info!(
        report_id = %report.report_id,
        breeds = report.rows.len(),
        grand_total = report.grand_total(),
        skipped = report.skipped.total,
        "月报生成完成"
    );

    Ok(report)
}
