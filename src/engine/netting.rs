// ==========================================
// 畜群月报 - 进出场轧差汇总
// ==========================================
// 职责: 入场 +1 / 出场 -1，按 品种 × 年龄桶 汇总
// 红线: 负数是合法结果（出场多于入场），不得截断为 0
// 红线: 性别或月龄无法判定的记录剔除并计数，不归入任何桶
// ==========================================
// 品种键: TRIM + 小写；展示名取同键下字典序最小的原文，
//         保证结果与记录顺序无关
// ==========================================

use crate::domain::movement::{MovementRecord, ResolvedAnimal};
use crate::domain::types::{AgeBucket, Sex};
use crate::engine::age_resolver::AgeResolver;
use crate::engine::bucket_classifier::classify;
use crate::engine::sex_normalizer::normalize_first;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// 年龄桶个数
pub const BUCKET_COUNT: usize = AgeBucket::ALL.len();

/// 品种归一化键（TRIM + 小写）
pub fn breed_key(breed: &str) -> String {
    breed.trim().to_lowercase()
}

// ==========================================
// BreedRow - 单个品种的十个带符号计数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedRow {
    /// 展示名（原文）
    pub breed: String,

    /// 按 AgeBucket::ALL 顺序的计数
    pub counts: [i64; BUCKET_COUNT],
}

impl BreedRow {
    fn new(breed: String) -> Self {
        Self {
            breed,
            counts: [0; BUCKET_COUNT],
        }
    }

    pub fn get(&self, bucket: AgeBucket) -> i64 {
        self.counts[bucket.index()]
    }

    /// 十个桶之和（可为负）
    pub fn total(&self) -> i64 {
        self.counts.iter().sum()
    }
}

// ==========================================
// BreedBucketMatrix - 品种 × 年龄桶矩阵
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedBucketMatrix {
    rows: BTreeMap<String, BreedRow>,
}

impl BreedBucketMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对 (品种, 桶) 加上 delta
    pub fn apply(&mut self, breed: &str, bucket: AgeBucket, delta: i64) {
        let display = breed.trim();
        let row = self
            .rows
            .entry(breed_key(breed))
            .or_insert_with(|| BreedRow::new(display.to_string()));
        if display < row.breed.as_str() {
            row.breed = display.to_string();
        }
        row.counts[bucket.index()] += delta;
    }

    /// 按归一化品种读取计数（不存在为 0）
    pub fn get(&self, breed: &str, bucket: AgeBucket) -> i64 {
        self.rows
            .get(&breed_key(breed))
            .map(|row| row.get(bucket))
            .unwrap_or(0)
    }

    pub fn row(&self, breed: &str) -> Option<&BreedRow> {
        self.rows.get(&breed_key(breed))
    }

    /// 按品种字母序（归一化键）输出
    pub fn rows(&self) -> impl Iterator<Item = &BreedRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 各桶跨品种合计
    pub fn bucket_totals(&self) -> [i64; BUCKET_COUNT] {
        let mut totals = [0; BUCKET_COUNT];
        for row in self.rows.values() {
            for (total, count) in totals.iter_mut().zip(row.counts.iter()) {
                *total += count;
            }
        }
        totals
    }

    /// 总计 = 各品种合计之和
    pub fn grand_total(&self) -> i64 {
        self.rows.values().map(BreedRow::total).sum()
    }
}

// ==========================================
// PassCounts - 单方向计入/剔除统计
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassCounts {
    /// 计入矩阵的记录数
    pub applied: usize,
    /// 剔除的记录数
    pub skipped: usize,
    /// 性别无法判定的记录数
    pub unresolved_sex: usize,
    /// 月龄无法判定的记录数
    pub unresolved_age: usize,
}

/// 轧差结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NettingOutcome {
    pub matrix: BreedBucketMatrix,
    pub entries: PassCounts,
    pub exits: PassCounts,
}

impl NettingOutcome {
    pub fn skipped_total(&self) -> usize {
        self.entries.skipped + self.exits.skipped
    }
}

// ==========================================
// NettingAggregator - 轧差汇总器
// ==========================================
#[derive(Debug, Clone)]
pub struct NettingAggregator {
    age_resolver: AgeResolver,
    unspecified_breed: String,
}

impl NettingAggregator {
    /// 创建轧差汇总器
    ///
    /// # 参数
    /// - age_resolver: 月龄解析器（携带基准日）
    /// - unspecified_breed: 品种为空时使用的占位名
    pub fn new(age_resolver: AgeResolver, unspecified_breed: impl Into<String>) -> Self {
        Self {
            age_resolver,
            unspecified_breed: unspecified_breed.into(),
        }
    }

    /// 解析单条记录的性别与月龄
    pub fn resolve(&self, record: &MovementRecord) -> ResolvedAnimal {
        ResolvedAnimal {
            sex: normalize_first([record.sex_raw.as_deref(), record.sex_extra_raw.as_deref()]),
            age_months: self.age_resolver.resolve(record),
        }
    }

    /// 入场 +1、出场 -1 汇总为矩阵
    #[instrument(skip_all, fields(entries = entries.len(), exits = exits.len()))]
    pub fn aggregate(&self, entries: &[MovementRecord], exits: &[MovementRecord]) -> NettingOutcome {
        let mut matrix = BreedBucketMatrix::new();
        let entry_counts = self.apply_records(&mut matrix, entries, 1);
        let exit_counts = self.apply_records(&mut matrix, exits, -1);

        debug!(
            breeds = matrix.len(),
            grand_total = matrix.grand_total(),
            skipped = entry_counts.skipped + exit_counts.skipped,
            "轧差汇总完成"
        );

        NettingOutcome {
            matrix,
            entries: entry_counts,
            exits: exit_counts,
        }
    }

    /// 将一批单头记录以 delta 计入矩阵
    pub fn apply_records(
        &self,
        matrix: &mut BreedBucketMatrix,
        records: &[MovementRecord],
        delta: i64,
    ) -> PassCounts {
        let mut counts = PassCounts::default();

        for record in records {
            debug_assert_eq!(record.quantity, 1, "记录未展开: {}", record.source_ref);

            let resolved = self.resolve(record);
            let bucket = match classify(resolved.sex, resolved.age_months) {
                Some(bucket) => bucket,
                None => {
                    counts.skipped += 1;
                    if resolved.sex == Sex::Unresolved {
                        counts.unresolved_sex += 1;
                    }
                    if resolved.age_months.is_none() {
                        counts.unresolved_age += 1;
                    }
                    debug!(source = %record.source_ref, sex = %resolved.sex, "记录无法分桶，已剔除");
                    continue;
                }
            };

            let breed = if record.breed.trim().is_empty() {
                self.unspecified_breed.as_str()
            } else {
                record.breed.as_str()
            };
            matrix.apply(breed, bucket, delta);
            counts.applied += 1;
        }

        counts
    }
}
