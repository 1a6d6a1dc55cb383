// ==========================================
// 畜群月报 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod movement;
pub mod types;

// 重导出核心类型
pub use movement::{DateRange, DateRangeError, InvoiceHeader, MovementRecord, ResolvedAnimal};
pub use types::{AgeBucket, Direction, Sex, SourceTier};
