// ==========================================
// 畜群月报 - 性别标准化
// ==========================================
// 规则: 小写 + TRIM 后
//   包含 "fêmea"/"femea" 或等于 "f" → Female
//   包含 "macho" 或等于 "m"          → Male
//   其他                              → Unresolved
// ==========================================

use crate::domain::types::Sex;

/// 单字段性别标准化
pub fn normalize(raw: &str) -> Sex {
    let value = raw.trim().to_lowercase();

    if value.contains("fêmea") || value.contains("femea") || value == "f" {
        Sex::Female
    } else if value.contains("macho") || value == "m" {
        Sex::Male
    } else {
        Sex::Unresolved
    }
}

/// 多字段性别标准化：第一个非空字段生效
///
/// 注意：第一个非空字段即使无法识别，也不会回退到后续字段
pub fn normalize_first<'a, I>(fields: I) -> Sex
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    fields
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(normalize)
        .unwrap_or(Sex::Unresolved)
}
