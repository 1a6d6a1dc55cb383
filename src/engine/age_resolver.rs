// ==========================================
// 畜群月报 - 月龄解析器
// ==========================================
// 职责: 出生日期 / 月龄原值 / 年龄段标签 → 月龄
// 红线: 优先级固定，命中即返回；无法判定返回 None，不做默认值
// ==========================================
// 标签表是全系统唯一的一份，进场与出场共用
// ==========================================

use crate::domain::movement::MovementRecord;
use chrono::NaiveDate;

/// 默认每月天数
pub const DEFAULT_DAYS_PER_MONTH: f64 = 30.44;

/// 复合区间标签 (下限, 上限, 月龄)，必须先于单边标签判定
const RANGE_LABELS: [(u32, u32, f64); 6] = [
    (24, 36, 30.0),
    (12, 24, 18.0),
    (18, 22, 20.0),
    (7, 15, 11.0),
    (15, 18, 16.5),
    (12, 18, 15.0),
];

// ==========================================
// AgeResolver - 月龄解析器
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct AgeResolver {
    today: NaiveDate,
    days_per_month: f64,
}

impl AgeResolver {
    /// 创建月龄解析器
    ///
    /// # 参数
    /// - today: 计算出生日期月龄的基准日
    /// - days_per_month: 每月天数（一般为 30.44）
    pub fn new(today: NaiveDate, days_per_month: f64) -> Self {
        Self {
            today,
            days_per_month,
        }
    }

    /// 解析记录月龄
    ///
    /// 规则（顺序执行，命中即返回）:
    /// 1) birth_date 可解析且不晚于 today → floor(天数 / days_per_month)
    /// 2) age_months_raw 为有限正数 → 原值
    /// 3) age_label_raw 命中标签表 → 表中月龄
    /// 4) 其他 → None
    pub fn resolve(&self, record: &MovementRecord) -> Option<f64> {
        if let Some(months) = record
            .birth_date
            .as_deref()
            .and_then(parse_birth_date)
            .and_then(|birth| self.months_since(birth))
        {
            return Some(months);
        }

        if let Some(raw) = record.age_months_raw {
            if raw.is_finite() && raw > 0.0 {
                return Some(raw);
            }
        }

        record.age_label_raw.as_deref().and_then(resolve_age_label)
    }

    /// 出生至今的整月数（出生日期在未来时视为无效）
    fn months_since(&self, birth: NaiveDate) -> Option<f64> {
        let days = (self.today - birth).num_days();
        if days < 0 {
            return None;
        }
        Some((days as f64 / self.days_per_month).floor())
    }
}

/// 解析出生日期
///
/// 支持: YYYY-MM-DD / DD/MM/YYYY / 带时间部分的时间戳（取日期部分）
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .ok()
        .or_else(|| {
            trimmed
                .get(..10)
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        })
}

// ==========================================
// 年龄段标签 → 月龄
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum LabelToken {
    Number(u32),
    Separator,
    Other,
}

/// 标签切分: 连续数字 → Number，'/' 或 '-' → Separator，空白忽略
fn tokenize(label: &str) -> Vec<LabelToken> {
    let mut tokens = Vec::new();
    let mut digits = String::new();

    for ch in label.trim().to_lowercase().chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        if !digits.is_empty() {
            // 超长数字串不可能是月龄
            tokens.push(digits.parse().map(LabelToken::Number).unwrap_or(LabelToken::Other));
            digits.clear();
        }
        match ch {
            '/' | '-' => tokens.push(LabelToken::Separator),
            c if c.is_whitespace() => {}
            _ => tokens.push(LabelToken::Other),
        }
    }
    if !digits.is_empty() {
        tokens.push(digits.parse().map(LabelToken::Number).unwrap_or(LabelToken::Other));
    }

    tokens
}

fn has_range(tokens: &[LabelToken], low: u32, high: u32) -> bool {
    tokens.windows(3).any(|w| {
        w[0] == LabelToken::Number(low) && w[1] == LabelToken::Separator && w[2] == LabelToken::Number(high)
    })
}

fn has_number(tokens: &[LabelToken], n: u32) -> bool {
    tokens.contains(&LabelToken::Number(n))
}

/// 年龄段标签解析为月龄
///
/// 复合区间（"24/36"、"18-22" 等）先于单边标签（"+36"、"24" 等）判定，
/// 避免 "24/36 meses" 被误判为 24。未命中返回 None。
pub fn resolve_age_label(label: &str) -> Option<f64> {
    let tokens = tokenize(label);
    if tokens.is_empty() {
        return None;
    }

    if let Some((_, _, months)) = RANGE_LABELS
        .iter()
        .find(|(low, high, _)| has_range(&tokens, *low, *high))
    {
        return Some(*months);
    }

    let has = |n: u32| has_number(&tokens, n);

    if has(36) {
        Some(36.0)
    } else if has(24) {
        Some(24.0)
    } else if has(22) {
        Some(22.0)
    } else if has(18) && !has(22) && !has(15) {
        Some(18.0)
    } else if has(15) {
        Some(15.0)
    } else if has(12) {
        Some(12.0)
    } else if has(7) && !has(15) {
        Some(7.0)
    } else {
        None
    }
}
