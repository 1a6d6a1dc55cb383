// ==========================================
// 畜群月报 - 发票内嵌明细解析
// ==========================================
// 职责: 发票 items 字段（数组 / 含 items 字段的对象 / JSON 编码字符串）
//       在入口处一次性解析为 MovementRecord 列表
// 红线: 不编造年龄/性别信号，缺失即保持 None
// ==========================================

use crate::domain::movement::MovementRecord;
use crate::domain::types::{Direction, SourceTier};
use serde_json::{Map, Value};
use thiserror::Error;

/// 编码字符串最多解包层数
const MAX_ENCODING_DEPTH: usize = 2;

const ITEMS_KEYS: [&str; 2] = ["items", "itens"];
const BREED_KEYS: [&str; 3] = ["raca", "raça", "breed"];
const SEX_KEYS: [&str; 2] = ["sexo", "sex"];
const EXTRA_KEYS: [&str; 2] = ["dados_extras", "extra"];
const AGE_MONTHS_KEYS: [&str; 2] = ["idade_meses", "age_months"];
const AGE_LABEL_KEYS: [&str; 3] = ["faixa_etaria", "idade", "age_label"];
const BIRTH_DATE_KEYS: [&str; 2] = ["data_nascimento", "birth_date"];
const QUANTITY_KEYS: [&str; 3] = ["quantidade", "qtd", "quantity"];

/// 明细解析错误
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("明细 JSON 格式错误: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("不支持的明细结构: {0}")]
    UnsupportedShape(String),

    #[error("明细对象缺少 items 字段")]
    MissingItemsField,

    #[error("明细编码层数超过上限 ({0})")]
    TooDeeplyEncoded(usize),
}

// ==========================================
// ItemsPayload - 明细原文的三种形态
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum ItemsPayload {
    /// JSON 数组
    RawArray(Vec<Value>),
    /// 含 items/itens 字段的对象（或以序号为键的对象）
    RawObjectWithItemsField(Map<String, Value>),
    /// JSON 编码后再次存为字符串
    EncodedString(String),
}

impl ItemsPayload {
    /// 从数据库原文解析形态（空串/null 视为空数组）
    pub fn from_raw(raw: &str) -> Result<Self, PayloadError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(ItemsPayload::RawArray(Vec::new()));
        }
        let value: Value = serde_json::from_str(trimmed)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        match value {
            Value::Null => Ok(ItemsPayload::RawArray(Vec::new())),
            Value::Array(items) => Ok(ItemsPayload::RawArray(items)),
            Value::Object(map) => Ok(ItemsPayload::RawObjectWithItemsField(map)),
            Value::String(s) => Ok(ItemsPayload::EncodedString(s)),
            other => Err(PayloadError::UnsupportedShape(other.to_string())),
        }
    }

    /// 展开为明细列表
    pub fn into_items(self) -> Result<Vec<Value>, PayloadError> {
        self.into_items_at_depth(0)
    }

    fn into_items_at_depth(self, depth: usize) -> Result<Vec<Value>, PayloadError> {
        match self {
            ItemsPayload::RawArray(items) => Ok(items),
            ItemsPayload::RawObjectWithItemsField(mut map) => {
                if let Some(inner) = ITEMS_KEYS.iter().find_map(|k| map.remove(*k)) {
                    return Self::from_value(inner)?.into_items_at_depth(depth);
                }
                // 以序号为键的对象: {"0": {...}, "1": {...}}
                if !map.is_empty() && map.values().all(Value::is_object) {
                    return Ok(map.into_iter().map(|(_, v)| v).collect());
                }
                Err(PayloadError::MissingItemsField)
            }
            ItemsPayload::EncodedString(encoded) => {
                if depth >= MAX_ENCODING_DEPTH {
                    return Err(PayloadError::TooDeeplyEncoded(depth));
                }
                Self::from_raw(&encoded)?.into_items_at_depth(depth + 1)
            }
        }
    }
}

// ==========================================
// 明细 → MovementRecord
// ==========================================

/// 明细转换上下文
#[derive(Debug, Clone, Copy)]
pub struct ItemContext {
    pub direction: Direction,
    pub tier: SourceTier,
    pub invoice_id: i64,
}

/// 明细列表转换为记录（非对象明细跳过并返回跳过数）
pub fn records_from_items(items: &[Value], ctx: ItemContext) -> (Vec<MovementRecord>, usize) {
    let mut records = Vec::with_capacity(items.len());
    let mut rejected = 0;

    for (idx, item) in items.iter().enumerate() {
        match item.as_object() {
            Some(obj) => records.push(record_from_object(obj, idx, ctx)),
            None => rejected += 1,
        }
    }

    (records, rejected)
}

fn record_from_object(obj: &Map<String, Value>, idx: usize, ctx: ItemContext) -> MovementRecord {
    // 品种缺失时留空，由采集器统一填充占位名
    let breed = text_field(obj, &BREED_KEYS).unwrap_or_default();
    let extra = EXTRA_KEYS.iter().find_map(|k| obj.get(*k)).and_then(as_object_lenient);

    MovementRecord {
        direction: ctx.direction,
        breed,
        sex_raw: text_field(obj, &SEX_KEYS),
        sex_extra_raw: extra.as_ref().and_then(|e| text_field(e, &SEX_KEYS)),
        age_months_raw: number_field(obj, &AGE_MONTHS_KEYS),
        age_label_raw: text_field(obj, &AGE_LABEL_KEYS),
        birth_date: text_field(obj, &BIRTH_DATE_KEYS),
        quantity: quantity_field(obj),
        source_tier: ctx.tier,
        source_ref: format!("invoice#{}/item#{}", ctx.invoice_id, idx),
    }
}

/// 扩展数据可能是对象，也可能是 JSON 编码的字符串
fn as_object_lenient(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// 文本字段（数字也转为文本），空串视为缺失
pub fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// 数值字段（支持数字或数字字符串，逗号小数）
pub fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    })
}

/// 头数: 缺失、非数值或小于 1 时按 1 处理
fn quantity_field(obj: &Map<String, Value>) -> u32 {
    number_field(obj, &QUANTITY_KEYS)
        .filter(|q| q.is_finite() && *q >= 1.0)
        .map(|q| q.min(u32::MAX as f64).floor() as u32)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ItemContext {
        ItemContext {
            direction: Direction::Entry,
            tier: SourceTier::InvoiceItem,
            invoice_id: 7,
        }
    }

    #[test]
    fn test_raw_array_shape() {
        let payload = ItemsPayload::from_raw(r#"[{"raca":"Nelore"},{"raca":"Angus"}]"#).unwrap();
        assert!(matches!(payload, ItemsPayload::RawArray(_)));
        assert_eq!(payload.into_items().unwrap().len(), 2);
    }

    #[test]
    fn test_object_with_items_field_shape() {
        let payload = ItemsPayload::from_raw(r#"{"itens":[{"raca":"Nelore"}],"total":10}"#).unwrap();
        assert!(matches!(payload, ItemsPayload::RawObjectWithItemsField(_)));
        assert_eq!(payload.into_items().unwrap().len(), 1);
    }

    #[test]
    fn test_indexed_object_shape() {
        let payload = ItemsPayload::from_raw(r#"{"0":{"raca":"Nelore"},"1":{"raca":"Gir"}}"#).unwrap();
        assert_eq!(payload.into_items().unwrap().len(), 2);
    }

    #[test]
    fn test_encoded_string_shape() {
        let inner = r#"[{"raca":"Nelore","sexo":"Macho"}]"#;
        let raw = serde_json::to_string(inner).unwrap();
        let payload = ItemsPayload::from_raw(&raw).unwrap();
        assert!(matches!(payload, ItemsPayload::EncodedString(_)));
        assert_eq!(payload.into_items().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_and_null_are_empty_lists() {
        assert!(ItemsPayload::from_raw("").unwrap().into_items().unwrap().is_empty());
        assert!(ItemsPayload::from_raw("null").unwrap().into_items().unwrap().is_empty());
        assert!(ItemsPayload::from_raw("[]").unwrap().into_items().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_payloads_error() {
        assert!(matches!(ItemsPayload::from_raw("{not json"), Err(PayloadError::MalformedJson(_))));
        assert!(matches!(ItemsPayload::from_raw("42"), Err(PayloadError::UnsupportedShape(_))));
        let no_items = ItemsPayload::from_raw(r#"{"total": 3}"#).unwrap();
        assert!(matches!(no_items.into_items(), Err(PayloadError::MissingItemsField)));
    }

    #[test]
    fn test_item_field_aliases_and_numeric_strings() {
        let items = vec![json!({
            "breed": "Angus",
            "sex": "Fêmea",
            "idade_meses": "5",
            "faixa_etaria": "0-7",
            "data_nascimento": "2025-01-10",
            "qtd": "3"
        })];
        let (records, rejected) = records_from_items(&items, ctx());
        assert_eq!(rejected, 0);
        let rec = &records[0];
        assert_eq!(rec.breed, "Angus");
        assert_eq!(rec.sex_raw.as_deref(), Some("Fêmea"));
        assert_eq!(rec.age_months_raw, Some(5.0));
        assert_eq!(rec.age_label_raw.as_deref(), Some("0-7"));
        assert_eq!(rec.birth_date.as_deref(), Some("2025-01-10"));
        assert_eq!(rec.quantity, 3);
        assert_eq!(rec.source_tier, SourceTier::InvoiceItem);
        assert_eq!(rec.source_ref, "invoice#7/item#0");
    }

    #[test]
    fn test_missing_signals_stay_missing() {
        let items = vec![json!({"quantidade": 0}), json!("garbage")];
        let (records, rejected) = records_from_items(&items, ctx());
        assert_eq!(rejected, 1);
        let rec = &records[0];
        assert_eq!(rec.breed, "");
        assert_eq!(rec.sex_raw, None);
        assert_eq!(rec.age_months_raw, None);
        assert_eq!(rec.age_label_raw, None);
        assert_eq!(rec.quantity, 1);
    }

    #[test]
    fn test_extra_data_sex() {
        let items = vec![
            json!({"raca": "Gir", "dados_extras": {"sexo": "F"}}),
            json!({"raca": "Gir", "extra": "{\"sexo\":\"M\"}"}),
        ];
        let (records, _) = records_from_items(&items, ctx());
        assert_eq!(records[0].sex_extra_raw.as_deref(), Some("F"));
        assert_eq!(records[1].sex_extra_raw.as_deref(), Some("M"));
    }
}
