// ==========================================
// 畜群月报 - 数据仓储层
// ==========================================
// 职责: 三层数据源的只读访问
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod error;
pub mod invoice_repo;
pub mod movement_repo;
pub mod row_values;

// 重导出
pub use error::{RepositoryError, RepositoryResult};
pub use invoice_repo::InvoiceRepository;
pub use movement_repo::StructuredMovementRepository;
