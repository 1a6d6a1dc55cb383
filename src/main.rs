// ==========================================
// 畜群月报 - 命令行入口
// ==========================================
// 用法:
//   herd-bulletin <start_date> <end_date> [选项]
//
// 选项:
//   --db <path>       数据库路径（默认 HERD_BULLETIN_DB_PATH 或用户数据目录）
//   --site <id>       场点过滤
//   --breed <name>    品种过滤
//   --today <date>    月龄计算基准日 (YYYY-MM-DD)
//   --json            以 JSON 输出完整月报（默认 CSV 矩阵）
// ==========================================

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use herd_bulletin::db::open_sqlite_connection;
use herd_bulletin::{logging, BulletinApi, BulletinRequest};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// 数据库路径环境变量
const DB_PATH_ENV: &str = "HERD_BULLETIN_DB_PATH";

#[derive(Debug)]
struct CliArgs {
    db_path: String,
    request: BulletinRequest,
    json: bool,
}

fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let path = dirs::data_dir()
        .map(|dir| dir.join("herd-bulletin").join("herd_bulletin.db"))
        .unwrap_or_else(|| PathBuf::from("./herd_bulletin.db"));

    path.to_string_lossy().to_string()
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut positional = Vec::new();
    let mut db_path = None;
    let mut site = None;
    let mut breed = None;
    let mut today = None;
    let mut json = false;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--db" | "--site" | "--breed" | "--today" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("选项 {} 缺少参数值", arg))?;
                match arg.as_str() {
                    "--db" => db_path = Some(value),
                    "--site" => site = Some(value),
                    "--breed" => breed = Some(value),
                    _ => {
                        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                            .with_context(|| format!("无效的基准日: {}", value))?;
                        today = Some(date);
                    }
                }
            }
            other if other.starts_with("--") => bail!("未知选项: {}", other),
            _ => positional.push(arg),
        }
    }

    if positional.len() != 2 {
        bail!("用法: herd-bulletin <start_date> <end_date> [--db PATH] [--site ID] [--breed NAME] [--today YYYY-MM-DD] [--json]");
    }

    let end_date = positional.pop().unwrap_or_default();
    let start_date = positional.pop().unwrap_or_default();

    let mut request = BulletinRequest::new(start_date, end_date);
    if let Some(site) = site {
        request = request.with_site(site);
    }
    if let Some(breed) = breed {
        request = request.with_breed(breed);
    }
    if let Some(today) = today {
        request = request.with_today(today);
    }

    Ok(CliArgs {
        db_path: db_path.unwrap_or_else(default_db_path),
        request,
        json,
    })
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let args = parse_args(std::env::args().skip(1))?;

    tracing::info!("{} v{}", herd_bulletin::APP_NAME, herd_bulletin::VERSION);
    tracing::info!("使用数据库: {}", args.db_path);

    let conn = open_sqlite_connection(&args.db_path)
        .with_context(|| format!("无法打开数据库: {}", args.db_path))?;
    let api = BulletinApi::new(Arc::new(Mutex::new(conn)));

    let report = api.generate_bulletin(&args.request)?;

    if report.skipped.total > 0 {
        tracing::warn!(
            entries_unresolved_sex = report.skipped.entries.unresolved_sex,
            entries_unresolved_age = report.skipped.entries.unresolved_age,
            exits_unresolved_sex = report.skipped.exits.unresolved_sex,
            exits_unresolved_age = report.skipped.exits.unresolved_age,
            "{} 条记录无法判定性别或月龄，未计入月报",
            report.skipped.total
        );
    }

    let oversized = report.entry_acquisition.oversized_records + report.exit_acquisition.oversized_records;
    if oversized > 0 {
        tracing::warn!("{} 条记录头数超过上限，未计入月报", oversized);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        report.write_csv(&mut out)?;
    }

    Ok(())
}
