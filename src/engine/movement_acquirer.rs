// ==========================================
// 畜群月报 - 进出场记录采集器
// ==========================================
// 采集顺序（命中即停，顺序执行，不并发试探）:
//   1) 结构化进出场表（第一层）非空 → 直接使用
//   2) 第一层为空且为入场方向 → 发票内嵌明细（第二层）
//      + 补捞最近 N 张发票（不限期间，按发票 id 去重）
//   3) 单张发票内嵌明细为空 → 该发票的明细表（第三层）
// 出场方向只使用第一层
// ==========================================
// 红线: 第一层读取失败为致命错误；第二/三层失败记日志并按空结果处理
// 红线: quantity > 1 的记录必须展开为 quantity 条单头记录
// 红线: quantity 超过上限的记录视为异常，计数剔除，不展开
// ==========================================

use crate::domain::movement::{DateRange, InvoiceHeader, MovementRecord};
use crate::domain::types::{Direction, SourceTier};
use crate::engine::items_payload::{records_from_items, ItemContext, ItemsPayload};
use crate::engine::netting::breed_key;
use crate::engine::sources::{InvoiceSource, StructuredMovementSource};
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// 采集器配置
#[derive(Debug, Clone, PartialEq)]
pub struct AcquirerConfig {
    /// 补捞最近发票张数（0 表示不补捞）
    pub recent_invoice_window: usize,
    /// 品种为空时的占位名
    pub unspecified_breed: String,
    /// 单条记录允许的最大头数
    pub max_unit_quantity: u32,
}

/// 降级的数据层（错误已记录，按空结果处理）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierFailure {
    pub tier: SourceTier,
    pub context: String,
    pub error: String,
}

/// 单方向采集统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub direction: Direction,

    /// 展开后各层记录数
    pub unit_counts: BTreeMap<SourceTier, usize>,

    /// 展开前源记录数
    pub source_records: usize,

    /// 扫描的发票张数（含补捞）
    pub invoices_scanned: usize,

    /// 补捞新增的发票张数
    pub invoices_from_widening: usize,

    /// 无法识别的明细条数（非对象）
    pub rejected_items: usize,

    /// 品种过滤掉的单头记录数
    pub filtered_out: usize,

    /// 头数超过上限而剔除的源记录数
    pub oversized_records: usize,

    pub degraded_tiers: Vec<TierFailure>,
}

impl AcquisitionSummary {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            unit_counts: BTreeMap::new(),
            source_records: 0,
            invoices_scanned: 0,
            invoices_from_widening: 0,
            rejected_items: 0,
            filtered_out: 0,
            oversized_records: 0,
            degraded_tiers: Vec::new(),
        }
    }

    fn degrade(&mut self, tier: SourceTier, context: String, error: String) {
        warn!(tier = %tier, context = %context, error = %error, "数据层读取失败，按空结果处理");
        self.degraded_tiers.push(TierFailure { tier, context, error });
    }

    pub fn total_units(&self) -> usize {
        self.unit_counts.values().sum()
    }
}

/// 采集结果: 已展开的单头记录 + 统计
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub records: Vec<MovementRecord>,
    pub summary: AcquisitionSummary,
}

/// 将 quantity > 1 的记录展开为单头记录（其余字段保持一致）
///
/// 调用方须先剔除头数超过上限的记录
pub fn expand_quantity(records: Vec<MovementRecord>) -> Vec<MovementRecord> {
    let mut units = Vec::with_capacity(records.iter().map(|r| r.quantity.max(1) as usize).sum());
    for record in records {
        let copies = record.quantity.max(1);
        let unit = MovementRecord { quantity: 1, ..record };
        for _ in 1..copies {
            units.push(unit.clone());
        }
        units.push(unit);
    }
    units
}

// ==========================================
// MovementAcquirer - 采集器
// ==========================================
pub struct MovementAcquirer<'a> {
    structured: &'a dyn StructuredMovementSource,
    invoices: &'a dyn InvoiceSource,
    config: AcquirerConfig,
}

impl<'a> MovementAcquirer<'a> {
    pub fn new(
        structured: &'a dyn StructuredMovementSource,
        invoices: &'a dyn InvoiceSource,
        config: AcquirerConfig,
    ) -> Self {
        Self {
            structured,
            invoices,
            config,
        }
    }

    /// 采集单方向记录
    ///
    /// # 参数
    /// - breed_filter: 品种过滤（按归一化键比较），None 表示全部
    /// - range: 报表期间
    /// - site_filter: 场点过滤（不透明参数，空串表示全部）
    /// - direction: 入场 / 出场
    ///
    /// # 返回
    /// - Ok(Acquisition): 已展开、已填充品种占位名的单头记录
    /// - Err: 第一层不可用（致命）
    #[instrument(skip(self, range), fields(start = %range.start, end = %range.end))]
    pub fn acquire(
        &self,
        breed_filter: Option<&str>,
        range: &DateRange,
        site_filter: &str,
        direction: Direction,
    ) -> RepositoryResult<Acquisition> {
        let mut summary = AcquisitionSummary::new(direction);

        let mut records = self.structured.query_movements(direction, range, site_filter)?;
        debug!(rows = records.len(), "第一层结构化记录");

        if records.is_empty() && direction == Direction::Entry {
            records = self.acquire_from_invoices(range, site_filter, &mut summary);
        }

        summary.source_records = records.len();

        let max_quantity = self.config.max_unit_quantity;
        records.retain(|record| {
            if record.quantity <= max_quantity {
                return true;
            }
            warn!(
                source = %record.source_ref,
                quantity = record.quantity,
                max_quantity,
                "头数超过上限，视为异常记录，不展开"
            );
            false
        });
        summary.oversized_records = summary.source_records - records.len();

        for record in records.iter_mut() {
            if record.breed.trim().is_empty() {
                record.breed = self.config.unspecified_breed.clone();
            }
        }

        let mut units = expand_quantity(records);

        if let Some(filter) = breed_filter.map(breed_key).filter(|k| !k.is_empty()) {
            let before = units.len();
            units.retain(|r| breed_key(&r.breed) == filter);
            summary.filtered_out = before - units.len();
        }

        for unit in &units {
            *summary.unit_counts.entry(unit.source_tier).or_insert(0) += 1;
        }

        info!(
            direction = %direction,
            source_records = summary.source_records,
            units = units.len(),
            degraded = summary.degraded_tiers.len(),
            oversized = summary.oversized_records,
            "采集完成"
        );

        Ok(Acquisition {
            records: units,
            summary,
        })
    }

    /// 第二/三层回退采集（失败不致命）
    fn acquire_from_invoices(
        &self,
        range: &DateRange,
        site_filter: &str,
        summary: &mut AcquisitionSummary,
    ) -> Vec<MovementRecord> {
        info!("第一层无入场记录，回退到发票明细");

        let mut headers = match self.invoices.query_invoices(range, site_filter) {
            Ok(headers) => headers,
            Err(e) => {
                summary.degrade(SourceTier::InvoiceItem, "invoice".to_string(), e.to_string());
                Vec::new()
            }
        };

        if self.config.recent_invoice_window > 0 {
            let mut seen: HashSet<i64> = headers.iter().map(|h| h.id).collect();
            match self
                .invoices
                .recent_invoices(site_filter, self.config.recent_invoice_window)
            {
                Ok(recent) => {
                    for header in recent {
                        if seen.insert(header.id) {
                            summary.invoices_from_widening += 1;
                            headers.push(header);
                        }
                    }
                }
                Err(e) => summary.degrade(
                    SourceTier::InvoiceItem,
                    "invoice(recent)".to_string(),
                    e.to_string(),
                ),
            }
        }

        summary.invoices_scanned = headers.len();

        let mut records = Vec::new();
        for header in &headers {
            let mut invoice_records = self.embedded_items(header, summary);
            if invoice_records.is_empty() {
                invoice_records = match self.invoices.query_line_items(header.id) {
                    Ok(items) => items,
                    Err(e) => {
                        summary.degrade(
                            SourceTier::InvoiceLineItem,
                            format!("invoice#{}", header.id),
                            e.to_string(),
                        );
                        Vec::new()
                    }
                };
                debug!(invoice_id = header.id, items = invoice_records.len(), "第三层发票明细表");
            }
            records.extend(invoice_records);
        }

        records
    }

    /// 第二层: 解析发票内嵌明细（格式错误按空处理）
    fn embedded_items(&self, header: &InvoiceHeader, summary: &mut AcquisitionSummary) -> Vec<MovementRecord> {
        let raw = match header.items_raw.as_deref() {
            Some(raw) => raw,
            None => return Vec::new(),
        };

        let items = match ItemsPayload::from_raw(raw).and_then(ItemsPayload::into_items) {
            Ok(items) => items,
            Err(e) => {
                summary.degrade(
                    SourceTier::InvoiceItem,
                    format!("invoice#{}", header.id),
                    e.to_string(),
                );
                return Vec::new();
            }
        };

        let ctx = ItemContext {
            direction: Direction::Entry,
            tier: SourceTier::InvoiceItem,
            invoice_id: header.id,
        };
        let (records, rejected) = records_from_items(&items, ctx);
        if rejected > 0 {
            warn!(invoice_id = header.id, rejected, "发票明细中存在无法识别的条目");
        }
        summary.rejected_items += rejected;
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::error::RepositoryError;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    // ==========================================
    // 内存数据源
    // ==========================================

    #[derive(Default)]
    struct FakeStructured {
        entries: Vec<MovementRecord>,
        exits: Vec<MovementRecord>,
        fail: bool,
    }

    impl StructuredMovementSource for FakeStructured {
        fn query_movements(
            &self,
            direction: Direction,
            _range: &DateRange,
            _site_filter: &str,
        ) -> RepositoryResult<Vec<MovementRecord>> {
            if self.fail {
                return Err(RepositoryError::DatabaseConnectionError("unreachable".to_string()));
            }
            Ok(match direction {
                Direction::Entry => self.entries.clone(),
                Direction::Exit => self.exits.clone(),
            })
        }
    }

    #[derive(Default)]
    struct FakeInvoices {
        in_range: Vec<InvoiceHeader>,
        recent: Vec<InvoiceHeader>,
        line_items: HashMap<i64, Vec<MovementRecord>>,
        fail_invoices: bool,
        fail_line_items: bool,
        calls: RefCell<Vec<String>>,
    }

    impl InvoiceSource for FakeInvoices {
        fn query_invoices(&self, _range: &DateRange, _site: &str) -> RepositoryResult<Vec<InvoiceHeader>> {
            self.calls.borrow_mut().push("invoices".to_string());
            if self.fail_invoices {
                return Err(RepositoryError::DatabaseQueryError("boom".to_string()));
            }
            Ok(self.in_range.clone())
        }

        fn recent_invoices(&self, _site: &str, limit: usize) -> RepositoryResult<Vec<InvoiceHeader>> {
            self.calls.borrow_mut().push("recent".to_string());
            Ok(self.recent.iter().take(limit).cloned().collect())
        }

        fn query_line_items(&self, invoice_id: i64) -> RepositoryResult<Vec<MovementRecord>> {
            self.calls.borrow_mut().push(format!("line_items#{}", invoice_id));
            if self.fail_line_items {
                return Err(RepositoryError::DatabaseQueryError("line items broken".to_string()));
            }
            Ok(self.line_items.get(&invoice_id).cloned().unwrap_or_default())
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        )
        .unwrap()
    }

    fn config(window: usize) -> AcquirerConfig {
        AcquirerConfig {
            recent_invoice_window: window,
            unspecified_breed: "Unspecified".to_string(),
            max_unit_quantity: 100,
        }
    }

    fn invoice(id: i64, items: Option<&str>) -> InvoiceHeader {
        InvoiceHeader {
            id,
            issue_date: Some("2026-01-10".to_string()),
            counterparty_id: Some("FAZ-01".to_string()),
            counterparty_name: Some("Fazenda Boa Vista".to_string()),
            items_raw: items.map(str::to_string),
        }
    }

    fn structured(direction: Direction, breed: &str) -> MovementRecord {
        MovementRecord::new(direction, breed, SourceTier::Structured).with_sex("Macho")
    }

    // ==========================================
    // 测试用例
    // ==========================================

    #[test]
    fn test_structured_tier_short_circuits_fallback() {
        let structured_src = FakeStructured {
            entries: vec![structured(Direction::Entry, "Nelore")],
            ..Default::default()
        };
        let invoices = FakeInvoices {
            in_range: vec![invoice(1, Some(r#"[{"raca":"Angus"}]"#))],
            ..Default::default()
        };
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(10));

        let result = acquirer.acquire(None, &range(), "", Direction::Entry).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].breed, "Nelore");
        assert!(invoices.calls.borrow().is_empty());
    }

    #[test]
    fn test_exit_direction_never_falls_back() {
        let structured_src = FakeStructured::default();
        let invoices = FakeInvoices {
            in_range: vec![invoice(1, Some(r#"[{"raca":"Angus"}]"#))],
            ..Default::default()
        };
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(10));

        let result = acquirer.acquire(None, &range(), "", Direction::Exit).unwrap();
        assert!(result.records.is_empty());
        assert!(invoices.calls.borrow().is_empty());
    }

    #[test]
    fn test_empty_structured_falls_back_to_embedded_then_line_items() {
        let structured_src = FakeStructured::default();
        let mut line_items = HashMap::new();
        line_items.insert(
            2,
            vec![MovementRecord::new(Direction::Entry, "Gir", SourceTier::InvoiceLineItem).with_quantity(2)],
        );
        let invoices = FakeInvoices {
            in_range: vec![
                invoice(1, Some(r#"{"items":[{"raca":"Angus","sexo":"F","idade_meses":5}]}"#)),
                invoice(2, Some("[]")),
            ],
            line_items,
            ..Default::default()
        };
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(0));

        let result = acquirer.acquire(None, &range(), "FAZ-01", Direction::Entry).unwrap();
        assert_eq!(result.records.len(), 3);
        assert_eq!(result.summary.unit_counts.get(&SourceTier::InvoiceItem), Some(&1));
        assert_eq!(result.summary.unit_counts.get(&SourceTier::InvoiceLineItem), Some(&2));
        assert_eq!(
            *invoices.calls.borrow(),
            vec!["invoices".to_string(), "line_items#2".to_string()]
        );
    }

    #[test]
    fn test_malformed_payload_degrades_to_line_items() {
        let structured_src = FakeStructured::default();
        let mut line_items = HashMap::new();
        line_items.insert(
            5,
            vec![MovementRecord::new(Direction::Entry, "Nelore", SourceTier::InvoiceLineItem)],
        );
        let invoices = FakeInvoices {
            in_range: vec![invoice(5, Some("{broken"))],
            line_items,
            ..Default::default()
        };
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(0));

        let result = acquirer.acquire(None, &range(), "", Direction::Entry).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].source_tier, SourceTier::InvoiceLineItem);
        assert_eq!(result.summary.degraded_tiers.len(), 1);
        assert_eq!(result.summary.degraded_tiers[0].tier, SourceTier::InvoiceItem);
    }

    #[test]
    fn test_lower_tier_failures_are_not_fatal() {
        let structured_src = FakeStructured::default();
        let invoices = FakeInvoices {
            fail_invoices: true,
            recent: vec![invoice(9, None)],
            fail_line_items: true,
            ..Default::default()
        };
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(5));

        let result = acquirer.acquire(None, &range(), "", Direction::Entry).unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.summary.degraded_tiers.len(), 2);
        assert_eq!(result.summary.invoices_from_widening, 1);
    }

    #[test]
    fn test_structured_failure_is_fatal() {
        let structured_src = FakeStructured {
            fail: true,
            ..Default::default()
        };
        let invoices = FakeInvoices::default();
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(5));

        assert!(acquirer.acquire(None, &range(), "", Direction::Entry).is_err());
        assert!(invoices.calls.borrow().is_empty());
    }

    #[test]
    fn test_widening_skips_duplicate_invoice_ids() {
        let structured_src = FakeStructured::default();
        let invoices = FakeInvoices {
            in_range: vec![invoice(1, Some(r#"[{"raca":"Angus"}]"#))],
            recent: vec![
                invoice(3, Some(r#"[{"raca":"Gir"}]"#)),
                invoice(1, Some(r#"[{"raca":"Angus"}]"#)),
            ],
            ..Default::default()
        };
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(10));

        let result = acquirer.acquire(None, &range(), "", Direction::Entry).unwrap();
        assert_eq!(result.summary.invoices_scanned, 2);
        assert_eq!(result.summary.invoices_from_widening, 1);
        let breeds: Vec<&str> = result.records.iter().map(|r| r.breed.as_str()).collect();
        assert_eq!(breeds, vec!["Angus", "Gir"]);
    }

    #[test]
    fn test_breed_placeholder_and_filter() {
        let structured_src = FakeStructured {
            entries: vec![
                structured(Direction::Entry, "").with_quantity(2),
                structured(Direction::Entry, " NELORE"),
                structured(Direction::Entry, "Angus"),
            ],
            ..Default::default()
        };
        let invoices = FakeInvoices::default();
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(0));

        let all = acquirer.acquire(None, &range(), "", Direction::Entry).unwrap();
        assert_eq!(all.records.len(), 4);
        assert_eq!(all.records[0].breed, "Unspecified");

        let nelore = acquirer.acquire(Some("nelore"), &range(), "", Direction::Entry).unwrap();
        assert_eq!(nelore.records.len(), 1);
        assert_eq!(nelore.summary.filtered_out, 3);
    }

    #[test]
    fn test_oversized_quantity_is_rejected_not_expanded() {
        let structured_src = FakeStructured::default();
        let invoices = FakeInvoices {
            in_range: vec![invoice(
                1,
                Some(r#"[{"raca":"Nelore","sexo":"M","idade_meses":10,"quantidade":1e12},{"raca":"Gir","sexo":"F","idade_meses":10,"quantidade":3}]"#),
            )],
            ..Default::default()
        };
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(0));

        let result = acquirer.acquire(None, &range(), "", Direction::Entry).unwrap();
        assert_eq!(result.records.len(), 3);
        assert!(result.records.iter().all(|r| r.breed == "Gir"));
        assert_eq!(result.summary.source_records, 2);
        assert_eq!(result.summary.oversized_records, 1);
    }

    #[test]
    fn test_quantity_at_limit_is_expanded() {
        let structured_src = FakeStructured {
            entries: vec![
                structured(Direction::Entry, "Nelore").with_quantity(100),
                structured(Direction::Entry, "Angus").with_quantity(101),
            ],
            ..Default::default()
        };
        let invoices = FakeInvoices::default();
        let acquirer = MovementAcquirer::new(&structured_src, &invoices, config(0));

        let result = acquirer.acquire(None, &range(), "", Direction::Entry).unwrap();
        assert_eq!(result.records.len(), 100);
        assert_eq!(result.summary.oversized_records, 1);
    }

    #[test]
    fn test_expand_quantity_copies_fields() {
        let record = MovementRecord::new(Direction::Entry, "Angus", SourceTier::InvoiceItem)
            .with_sex("Fêmea")
            .with_age_months(5.0)
            .with_quantity(3);
        let units = expand_quantity(vec![record.clone()]);
        assert_eq!(units.len(), 3);
        for unit in &units {
            assert_eq!(unit.quantity, 1);
            assert_eq!(*unit, MovementRecord { quantity: 1, ..record.clone() });
        }
    }

    proptest! {
        // quantity = N 展开为 N 条，quantity 均为 1，其余字段不变
        #[test]
        fn prop_expansion_yields_n_identical_units(
            quantities in prop::collection::vec(1u32..20, 0..10),
            age in prop::option::of(0.0f64..60.0),
        ) {
            let records: Vec<MovementRecord> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let mut r = MovementRecord::new(Direction::Entry, format!("B{}", i), SourceTier::Structured)
                        .with_quantity(*q);
                    r.age_months_raw = age;
                    r
                })
                .collect();

            let units = expand_quantity(records.clone());
            let expected: u32 = quantities.iter().sum();
            prop_assert_eq!(units.len(), expected as usize);
            prop_assert!(units.iter().all(|u| u.quantity == 1));

            for original in &records {
                let copies = units.iter().filter(|u| u.breed == original.breed).count();
                prop_assert_eq!(copies, original.quantity as usize);
                for unit in units.iter().filter(|u| u.breed == original.breed) {
                    prop_assert_eq!(unit, &MovementRecord { quantity: 1, ..original.clone() });
                }
            }
        }
    }
}
