// ==========================================
// 畜群月报 - 领域类型定义
// ==========================================
// 职责: 进出方向 / 性别 / 数据来源层级 / 年龄桶
// 红线: 年龄桶按性别不对称，顺序固定（报表列顺序）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 进出方向 (Direction)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Entry, // 入场
    Exit,  // 出场
}

impl Direction {
    /// 数据库中 movement_type 可接受的编码（大写、去重音后比较）
    pub fn db_codes(&self) -> &'static [&'static str] {
        match self {
            Direction::Entry => &["ENTRY", "ENTRADA"],
            Direction::Exit => &["EXIT", "SAIDA"],
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Entry => write!(f, "ENTRY"),
            Direction::Exit => write!(f, "EXIT"),
        }
    }
}

// ==========================================
// 性别 (Sex)
// ==========================================
// 无法判定时为 Unresolved，不做默认归类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sex {
    Male,
    Female,
    Unresolved,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "MALE"),
            Sex::Female => write!(f, "FEMALE"),
            Sex::Unresolved => write!(f, "UNRESOLVED"),
        }
    }
}

// ==========================================
// 数据来源层级 (Source Tier)
// ==========================================
// 仅用于诊断，不参与分类逻辑
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceTier {
    Structured,      // 结构化进出场表
    InvoiceItem,     // 发票内嵌明细
    InvoiceLineItem, // 发票明细表
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTier::Structured => write!(f, "STRUCTURED"),
            SourceTier::InvoiceItem => write!(f, "INVOICE_ITEM"),
            SourceTier::InvoiceLineItem => write!(f, "INVOICE_LINE_ITEM"),
        }
    }
}

// ==========================================
// 年龄桶 (Age Bucket)
// ==========================================
// 母畜: 0-7 / 7-12 / 12-18 / 18-24 / 24+
// 公畜: 0-7 / 7-15 / 15-18 / 18-22 / 36+（22 个月以上全部归入 36+）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeBucket {
    #[serde(rename = "femea_0-7")]
    Female0To7,
    #[serde(rename = "femea_7-12")]
    Female7To12,
    #[serde(rename = "femea_12-18")]
    Female12To18,
    #[serde(rename = "femea_18-24")]
    Female18To24,
    #[serde(rename = "femea_24+")]
    Female24Plus,
    #[serde(rename = "macho_0-7")]
    Male0To7,
    #[serde(rename = "macho_7-15")]
    Male7To15,
    #[serde(rename = "macho_15-18")]
    Male15To18,
    #[serde(rename = "macho_18-22")]
    Male18To22,
    #[serde(rename = "macho_36+")]
    Male36Plus,
}

impl AgeBucket {
    /// 报表列顺序（母畜在前，公畜在后）
    pub const ALL: [AgeBucket; 10] = [
        AgeBucket::Female0To7,
        AgeBucket::Female7To12,
        AgeBucket::Female12To18,
        AgeBucket::Female18To24,
        AgeBucket::Female24Plus,
        AgeBucket::Male0To7,
        AgeBucket::Male7To15,
        AgeBucket::Male15To18,
        AgeBucket::Male18To22,
        AgeBucket::Male36Plus,
    ];

    /// 列下标（与 ALL 一致）
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// 报表列键
    pub fn key(&self) -> &'static str {
        match self {
            AgeBucket::Female0To7 => "femea_0-7",
            AgeBucket::Female7To12 => "femea_7-12",
            AgeBucket::Female12To18 => "femea_12-18",
            AgeBucket::Female18To24 => "femea_18-24",
            AgeBucket::Female24Plus => "femea_24+",
            AgeBucket::Male0To7 => "macho_0-7",
            AgeBucket::Male7To15 => "macho_7-15",
            AgeBucket::Male15To18 => "macho_15-18",
            AgeBucket::Male18To22 => "macho_18-22",
            AgeBucket::Male36Plus => "macho_36+",
        }
    }

    /// 报表表头中的区间文字（不含性别）
    pub fn range_label(&self) -> &'static str {
        match self {
            AgeBucket::Female0To7 | AgeBucket::Male0To7 => "0-7",
            AgeBucket::Female7To12 => "7-12",
            AgeBucket::Female12To18 => "12-18",
            AgeBucket::Female18To24 => "18-24",
            AgeBucket::Female24Plus => "24+",
            AgeBucket::Male7To15 => "7-15",
            AgeBucket::Male15To18 => "15-18",
            AgeBucket::Male18To22 => "18-22",
            AgeBucket::Male36Plus => "36+",
        }
    }

    pub fn sex(&self) -> Sex {
        if self.index() < 5 {
            Sex::Female
        } else {
            Sex::Male
        }
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
