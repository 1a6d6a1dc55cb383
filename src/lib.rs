// ==========================================
// 畜群月报 - 核心库
// ==========================================
// 职责: 进出场记录对账，按品种 × 性别/月龄桶输出会计期间净变动
// 技术栈: Rust + SQLite
// 流程: 采集（三层数据源）→ 解析 → 分桶 → 轧差 → 月报
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/列探测）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{AgeBucket, DateRange, Direction, MovementRecord, Sex, SourceTier};

// 引擎
pub use engine::{AgeResolver, BreedBucketMatrix, MovementAcquirer, NettingAggregator};

// API
pub use api::{ApiError, BulletinApi, BulletinReport, BulletinRequest};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "畜群月报";
