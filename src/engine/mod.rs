// ==========================================
// 畜群月报 - 引擎层
// ==========================================
// 职责: 采集 → 月龄/性别解析 → 分桶 → 轧差
// 红线: Engine 不拼 SQL；无法判定的记录必须计数剔除，不得默认归桶
// ==========================================

pub mod age_resolver;
pub mod bucket_classifier;
pub mod items_payload;
pub mod movement_acquirer;
pub mod netting;
pub mod sex_normalizer;
pub mod sources;

// 重导出核心引擎
pub use age_resolver::{resolve_age_label, AgeResolver, DEFAULT_DAYS_PER_MONTH};
pub use bucket_classifier::classify;
pub use items_payload::{ItemsPayload, PayloadError};
pub use movement_acquirer::{
    expand_quantity, Acquisition, AcquisitionSummary, AcquirerConfig, MovementAcquirer, TierFailure,
};
pub use netting::{BreedBucketMatrix, BreedRow, NettingAggregator, NettingOutcome, PassCounts};
pub use sources::{InvoiceSource, StructuredMovementSource};
