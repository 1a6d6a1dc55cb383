// ==========================================
// 畜群月报 - 进出场记录实体
// ==========================================
// 职责: 定义 MovementRecord / ResolvedAnimal / DateRange / InvoiceHeader
// 红线: 进入轧差阶段的记录 quantity 必须为 1（已展开）
// ==========================================

use crate::domain::types::{Direction, Sex, SourceTier};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==========================================
// MovementRecord - 单头牲畜的进出场事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub direction: Direction,

    /// 品种（原文，缺失时为占位名）
    pub breed: String,

    /// 性别原文（主字段）
    pub sex_raw: Option<String>,

    /// 性别原文（扩展数据字段，主字段为空时使用）
    pub sex_extra_raw: Option<String>,

    /// 月龄原值
    pub age_months_raw: Option<f64>,

    /// 年龄段标签原文 (例如 "24/36", "18-22", "+36")
    pub age_label_raw: Option<String>,

    /// 出生日期原文
    pub birth_date: Option<String>,

    /// 代表的头数 (>= 1)
    pub quantity: u32,

    /// 来源层级（仅诊断用）
    pub source_tier: SourceTier,

    /// 来源定位 (例如 "animal_movement#12", "invoice#5")
    pub source_ref: String,
}

impl MovementRecord {
    /// 创建仅含方向/品种/来源的空记录，其余信号缺失
    pub fn new(direction: Direction, breed: impl Into<String>, source_tier: SourceTier) -> Self {
        Self {
            direction,
            breed: breed.into(),
            sex_raw: None,
            sex_extra_raw: None,
            age_months_raw: None,
            age_label_raw: None,
            birth_date: None,
            quantity: 1,
            source_tier,
            source_ref: String::new(),
        }
    }

    pub fn with_sex(mut self, sex: impl Into<String>) -> Self {
        self.sex_raw = Some(sex.into());
        self
    }

    pub fn with_age_months(mut self, months: f64) -> Self {
        self.age_months_raw = Some(months);
        self
    }

    pub fn with_age_label(mut self, label: impl Into<String>) -> Self {
        self.age_label_raw = Some(label.into());
        self
    }

    pub fn with_birth_date(mut self, birth_date: impl Into<String>) -> Self {
        self.birth_date = Some(birth_date.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
}

// ==========================================
// ResolvedAnimal - 年龄/性别解析结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAnimal {
    pub sex: Sex,

    /// 月龄，None 表示无法判定
    pub age_months: Option<f64>,
}

// ==========================================
// DateRange - 报表期间（闭区间）
// ==========================================
#[derive(Debug, Error, PartialEq)]
pub enum DateRangeError {
    #[error("缺少日期: {0}")]
    Missing(&'static str),

    #[error("日期格式错误 ({field}): {value}")]
    Malformed { field: &'static str, value: String },

    #[error("起始日期晚于结束日期: start={start}, end={end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// 从 YYYY-MM-DD 字符串解析
    pub fn parse(start: &str, end: &str) -> Result<Self, DateRangeError> {
        let start = parse_bound("start_date", start)?;
        let end = parse_bound("end_date", end)?;
        Self::new(start, end)
    }
}

fn parse_bound(field: &'static str, value: &str) -> Result<NaiveDate, DateRangeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DateRangeError::Missing(field));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| DateRangeError::Malformed {
        field,
        value: trimmed.to_string(),
    })
}

// ==========================================
// InvoiceHeader - 发票抬头（含内嵌明细原文）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub id: i64,
    pub issue_date: Option<String>,
    pub counterparty_id: Option<String>,
    pub counterparty_name: Option<String>,

    /// 内嵌明细原文（对象 / 数组 / JSON 编码字符串）
    pub items_raw: Option<String>,
}
