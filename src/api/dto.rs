// ==========================================
// 畜群月报 - API 数据传输对象
// ==========================================
// 职责: 月报请求 / 月报结果（品种行 + 合计行 + 剔除统计 + 采集统计）
// 输出形状: 每个品种一行（字母序），列按固定年龄桶顺序，末尾合计行
// ==========================================

use crate::domain::movement::DateRange;
use crate::domain::types::AgeBucket;
use crate::engine::movement_acquirer::AcquisitionSummary;
use crate::engine::netting::{breed_key, NettingOutcome, PassCounts};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// BulletinRequest - 月报请求（显式报表上下文）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletinRequest {
    /// 起始日期 (YYYY-MM-DD，含)
    pub start_date: String,

    /// 结束日期 (YYYY-MM-DD，含)
    pub end_date: String,

    /// 场点过滤（空串表示全部）
    #[serde(default)]
    pub site_filter: String,

    /// 品种过滤
    #[serde(default)]
    pub breed_filter: Option<String>,

    /// 月龄计算基准日（默认当天）
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

impl BulletinRequest {
    pub fn new(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            site_filter: String::new(),
            breed_filter: None,
            today: None,
        }
    }

    pub fn with_site(mut self, site_filter: impl Into<String>) -> Self {
        self.site_filter = site_filter.into();
        self
    }

    pub fn with_breed(mut self, breed: impl Into<String>) -> Self {
        self.breed_filter = Some(breed.into());
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

// ==========================================
// BulletinRow - 品种行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinRow {
    pub breed: String,

    /// 按 columns 顺序的带符号计数
    pub counts: Vec<i64>,

    pub total: i64,
}

impl BulletinRow {
    pub fn get(&self, bucket: AgeBucket) -> i64 {
        self.counts[bucket.index()]
    }
}

// ==========================================
// SkippedSummary - 剔除统计（操作员可见）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSummary {
    pub entries: PassCounts,
    pub exits: PassCounts,
    pub total: usize,
}

// ==========================================
// BulletinReport - 月报结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletinReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub period: DateRange,
    pub site_filter: String,
    pub breed_filter: Option<String>,
    pub reference_date: NaiveDate,

    /// 列键 (femea_0-7 ... macho_36+)
    pub columns: Vec<String>,

    /// 品种行（字母序）
    pub rows: Vec<BulletinRow>,

    /// 合计行
    pub totals: BulletinRow,

    pub skipped: SkippedSummary,
    pub entry_acquisition: AcquisitionSummary,
    pub exit_acquisition: AcquisitionSummary,
}

/// 合计行的品种名
pub const TOTAL_ROW_LABEL: &str = "TOTAL";

/// 月报头部信息
#[derive(Debug, Clone)]
pub struct BulletinHeader {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub period: DateRange,
    pub site_filter: String,
    pub breed_filter: Option<String>,
    pub reference_date: NaiveDate,
}

impl BulletinReport {
    /// 由轧差结果组装月报
    pub fn assemble(
        header: BulletinHeader,
        outcome: NettingOutcome,
        entry_acquisition: AcquisitionSummary,
        exit_acquisition: AcquisitionSummary,
    ) -> Self {
        let rows: Vec<BulletinRow> = outcome
            .matrix
            .rows()
            .map(|row| BulletinRow {
                breed: row.breed.clone(),
                counts: row.counts.to_vec(),
                total: row.total(),
            })
            .collect();

        let totals = BulletinRow {
            breed: TOTAL_ROW_LABEL.to_string(),
            counts: outcome.matrix.bucket_totals().to_vec(),
            total: outcome.matrix.grand_total(),
        };

        Self {
            report_id: header.report_id,
            generated_at: header.generated_at,
            period: header.period,
            site_filter: header.site_filter,
            breed_filter: header.breed_filter,
            reference_date: header.reference_date,
            columns: AgeBucket::ALL.iter().map(|b| b.key().to_string()).collect(),
            rows,
            totals,
            skipped: SkippedSummary {
                entries: outcome.entries,
                exits: outcome.exits,
                total: outcome.skipped_total(),
            },
            entry_acquisition,
            exit_acquisition,
        }
    }

    /// 按品种名查找行（不区分大小写，忽略首尾空白）
    pub fn row(&self, breed: &str) -> Option<&BulletinRow> {
        let key = breed_key(breed);
        self.rows.iter().find(|row| breed_key(&row.breed) == key)
    }

    pub fn grand_total(&self) -> i64 {
        self.totals.total
    }
}
