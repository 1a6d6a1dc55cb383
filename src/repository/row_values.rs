// ==========================================
// 畜群月报 - 行值宽松读取
// ==========================================
// 背景: 历史数据中月龄/头数列类型不一（INTEGER / REAL / TEXT 混存）
// ==========================================

use rusqlite::types::Value;

/// 文本值（数字转文本），空串视为缺失
pub fn value_as_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        _ => None,
    }
}

/// 数值（支持数字字符串与逗号小数）
pub fn value_as_f64(value: Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(i as f64),
        Value::Real(r) => Some(r),
        Value::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
}

/// 头数: 缺失、非数值或小于 1 时按 1 处理
pub fn value_as_quantity(value: Value) -> u32 {
    value_as_f64(value)
        .filter(|q| q.is_finite() && *q >= 1.0)
        .map(|q| q.min(u32::MAX as f64).floor() as u32)
        .unwrap_or(1)
}

/// 扩展数据 JSON 中的性别字段
pub fn extra_data_sex(value: Value) -> Option<String> {
    let raw = value_as_text(value)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let obj = parsed.as_object()?;
    ["sexo", "sex"].iter().find_map(|k| match obj.get(*k)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}
