// ==========================================
// 畜群月报 - 矩阵表格导出
// ==========================================
// 表头两行: 第一行性别分组 (FÊMEAS / MACHOS)，第二行年龄区间
// 数据行: 每个品种一行（字母序），末尾合计行
// ==========================================

use crate::api::dto::BulletinReport;
use crate::domain::types::{AgeBucket, Sex};
use std::io::Write;

/// 第一列表头
pub const BREED_HEADER: &str = "RAÇA / BREED";

/// 合计列表头
pub const TOTAL_HEADER: &str = "TOTAL";

impl BulletinReport {
    /// 表格形状的行（含两行表头与合计行），每行列数一致
    pub fn table_rows(&self) -> Vec<Vec<String>> {
        let mut table = Vec::with_capacity(self.rows.len() + 3);

        let mut group_header = vec![String::new()];
        group_header.extend(AgeBucket::ALL.iter().map(|b| {
            let group = match b.sex() {
                Sex::Female => "FÊMEAS / FEMALES",
                _ => "MACHOS / MALES",
            };
            group.to_string()
        }));
        group_header.push(String::new());
        table.push(group_header);

        let mut range_header = vec![BREED_HEADER.to_string()];
        range_header.extend(AgeBucket::ALL.iter().map(|b| b.range_label().to_string()));
        range_header.push(TOTAL_HEADER.to_string());
        table.push(range_header);

        for row in self.rows.iter().chain(std::iter::once(&self.totals)) {
            let mut line = vec![row.breed.clone()];
            line.extend(row.counts.iter().map(|c| c.to_string()));
            line.push(row.total.to_string());
            table.push(line);
        }

        table
    }

    /// 以 CSV 写出矩阵
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        for line in self.table_rows() {
            wtr.write_record(&line)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
