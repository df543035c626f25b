//! Excel (.xlsx) への書き出し
//!
//! 同じディレクトリの一時ファイルに書いてから、既存ファイルを上書きしない
//! 形で目的のパスへ移す。書き出しが失敗しても目的のパスにファイルは残らない。

pub mod workbook;

pub use workbook::{Cell, ExportWorkbook, Sheet};

use std::path::{Path, PathBuf};

use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, info};

use crate::error::ScraperError;
use crate::gnavi::ListingRecord;

pub const XLSX_EXTENSION: &str = "xlsx";

/// `<base>_<YYYYmmdd_HHMMSS>` 形式のファイル名
pub fn timestamped_file_name(base: &str) -> String {
    format!("{}_{}", base.trim(), Local::now().format("%Y%m%d_%H%M%S"))
}

/// 出力先パス。拡張子が無ければ `.xlsx` を付ける
pub fn resolve_output_path(directory: &Path, file_name: &str) -> PathBuf {
    directory.join(with_extension(file_name.trim()))
}

fn with_extension(file_name: &str) -> String {
    let has_extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(XLSX_EXTENSION))
        .unwrap_or(false);
    if has_extension {
        file_name.to_string()
    } else {
        format!("{}.{}", file_name, XLSX_EXTENSION)
    }
}

/// レコードをワークブックとして書き出す
#[derive(Debug, Clone)]
pub struct TabularExporter {
    sentinel: String,
}

impl TabularExporter {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    /// `destination` に書き出し、実際に書いたパスを返す
    ///
    /// レコードが空なら何も書かずに `EmptyResultSet`。
    /// 既に同名のファイルがあれば `ExportWrite`。
    pub fn export_records(
        &self,
        records: &[ListingRecord],
        destination: &Path,
    ) -> Result<PathBuf, ScraperError> {
        let workbook = ExportWorkbook::from_records(records, &self.sentinel)?;

        let path = match destination.file_name().and_then(|name| name.to_str()) {
            Some(name) => destination.with_file_name(with_extension(name)),
            None => {
                return Err(ScraperError::ExportWrite(format!(
                    "出力先が不正です: {}",
                    destination.display()
                )))
            }
        };
        if path.exists() {
            return Err(ScraperError::ExportWrite(format!(
                "ファイルが既に存在します: {}",
                path.display()
            )));
        }

        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&directory)?;

        let temp = tempfile::Builder::new()
            .prefix(".gnavi-export-")
            .suffix(".xlsx")
            .tempfile_in(&directory)?;
        debug!("一時ファイルへ書き込み: {:?}", temp.path());
        write_xlsx(&workbook, temp.path())?;

        temp.persist_noclobber(&path)
            .map_err(|e| ScraperError::ExportWrite(format!("{}: {}", path.display(), e.error)))?;

        info!("Excelファイル保存完了: {:?} ({}件)", path, records.len());
        Ok(path)
    }
}

fn write_xlsx(model: &ExportWorkbook, path: &Path) -> Result<(), ScraperError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in model.sheets() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name())?;

        for (col, title) in sheet.header().iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, title.as_str(), &header_format)?;
        }
        for (i, row) in sheet.rows().iter().enumerate() {
            let row_index = (i + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(row_index, col as u16, text.as_str())?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(row_index, col as u16, *n)?;
                    }
                }
            }
        }
        for (col, width) in sheet.column_widths().into_iter().enumerate() {
            worksheet.set_column_width(col as u16, width as f64)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSet;
    use crate::gnavi::Field;

    fn records(n: usize) -> Vec<ListingRecord> {
        (0..n)
            .map(|i| {
                let mut record = ListingRecord::blank(
                    FieldSet::Basic,
                    format!("https://r.gnavi.co.jp/s{}/", i),
                    "2025-01-01 12:00:00",
                    "-",
                );
                record.set(Field::Name, format!("店舗{}", i));
                record.set(Field::Address, "東京都港区六本木6-10-1");
                record
            })
            .collect()
    }

    fn temp_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".gnavi-export-"))
            .count()
    }

    #[test]
    fn test_resolve_output_path_appends_extension() {
        let dir = Path::new("/tmp/out");
        assert_eq!(
            resolve_output_path(dir, "tokyo"),
            PathBuf::from("/tmp/out/tokyo.xlsx")
        );
        assert_eq!(
            resolve_output_path(dir, "tokyo.XLSX"),
            PathBuf::from("/tmp/out/tokyo.XLSX")
        );
        assert_eq!(
            resolve_output_path(dir, "v1.2"),
            PathBuf::from("/tmp/out/v1.2.xlsx")
        );
    }

    #[test]
    fn test_timestamped_file_name() {
        let name = timestamped_file_name("ぐるなび_東京都");
        let suffix = name.strip_prefix("ぐるなび_東京都_").unwrap();
        assert_eq!(suffix.len(), 15);
        assert!(chrono::NaiveDateTime::parse_from_str(suffix, "%Y%m%d_%H%M%S").is_ok());
    }

    #[test]
    fn test_export_writes_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = TabularExporter::new("-");

        let path = exporter
            .export_records(&records(3), &dir.path().join("result"))
            .unwrap();

        assert_eq!(path, dir.path().join("result.xlsx"));
        assert!(path.is_file());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert_eq!(temp_entries(dir.path()), 0);
    }

    #[test]
    fn test_export_with_oversized_value_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut records = records(1);
        records[0].set(Field::BusinessHours, "9".repeat(40_000));

        let path = TabularExporter::new("-")
            .export_records(&records, &dir.path().join("long"))
            .unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_export_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("out.xlsx");

        let path = TabularExporter::new("-")
            .export_records(&records(1), &nested)
            .unwrap();
        assert_eq!(path, nested);
        assert!(path.is_file());
    }

    #[test]
    fn test_empty_records_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("empty.xlsx");

        let err = TabularExporter::new("-")
            .export_records(&[], &target)
            .unwrap_err();

        assert!(matches!(err, ScraperError::EmptyResultSet));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("keep.xlsx");
        std::fs::write(&target, b"original").unwrap();

        let err = TabularExporter::new("-")
            .export_records(&records(2), &target)
            .unwrap_err();

        assert!(matches!(err, ScraperError::ExportWrite(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"original");
        assert_eq!(temp_entries(dir.path()), 0);
    }
}
