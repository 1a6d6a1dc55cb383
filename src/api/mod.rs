// ==========================================
// 畜群月报 - API 层
// ==========================================
// 职责: 月报生成接口，供命令行 / 上层界面调用
// ==========================================

pub mod bulletin_api;
pub mod dto;
pub mod error;
pub mod export;

// 重导出核心类型
pub use bulletin_api::{assemble_bulletin, BulletinApi};
pub use dto::{BulletinReport, BulletinRequest, BulletinRow, SkippedSummary, TOTAL_ROW_LABEL};
pub use error::{ApiError, ApiResult};
