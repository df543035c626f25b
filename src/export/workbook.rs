//! 出力用ワークブックのモデル
//!
//! 店舗データシートと、そこから導出する集計シート（統計情報・ジャンル別・
//! エリア別）。作成後は変更しない。

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScraperError;
use crate::gnavi::{Field, ListingRecord};

pub const DATA_SHEET: &str = "店舗データ";
pub const STATISTICS_SHEET: &str = "統計情報";
pub const GENRE_SHEET: &str = "ジャンル別集計";
pub const AREA_SHEET: &str = "エリア別集計";

pub const TOTAL_LABEL: &str = "総取得件数";

/// 列幅 = min(最長セル文字数 + COLUMN_PADDING, MAX_COLUMN_WIDTH)
pub const COLUMN_PADDING: usize = 2;
pub const MAX_COLUMN_WIDTH: usize = 60;

/// Excelの1セルに入る文字数（UTF-16単位）
pub const MAX_CELL_TEXT: usize = 32_767;

static PREFECTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:〒?\s*\d{3}-?\d{4}\s*)?(東京都|北海道|京都府|大阪府|\p{Han}{2,3}県)")
        .expect("valid prefecture regex")
});

/// 住所の先頭から都道府県を取り出す
pub fn prefecture_of(address: &str) -> Option<&str> {
    PREFECTURE
        .captures(address)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn display(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// セルの上限を超える部分を切り捨てる
fn clamp_cell_text(mut text: String) -> String {
    let mut units = 0;
    let cut = text.char_indices().find_map(|(i, c)| {
        units += c.len_utf16();
        (units > MAX_CELL_TEXT).then_some(i)
    });
    if let Some(cut) = cut {
        text.truncate(cut);
    }
    text
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(clamp_cell_text(value))
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(name: &str, header: &[&str], rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.to_string(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// 見出し行を含む行数
    pub fn row_count(&self) -> usize {
        self.rows.len() + 1
    }

    /// シートごとの列幅（文字数）
    pub fn column_widths(&self) -> Vec<usize> {
        (0..self.header.len())
            .map(|col| {
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.display().chars().count())
                    .chain(std::iter::once(self.header[col].chars().count()))
                    .max()
                    .unwrap_or(0);
                (longest + COLUMN_PADDING).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportWorkbook {
    sheets: Vec<Sheet>,
}

impl ExportWorkbook {
    /// レコードからワークブックを組み立てる。`sentinel` は欠損値として集計から除く
    pub fn from_records(records: &[ListingRecord], sentinel: &str) -> Result<Self, ScraperError> {
        let first = records.first().ok_or(ScraperError::EmptyResultSet)?;
        let fields = first.field_set().fields();

        let sheets = vec![
            data_sheet(records, fields),
            statistics_sheet(records, fields, sentinel),
            breakdown_sheet(
                GENRE_SHEET,
                "ジャンル",
                records,
                |record| present(record.get(Field::Genre), sentinel),
            ),
            breakdown_sheet(AREA_SHEET, "都道府県", records, |record| {
                present(record.get(Field::Address), sentinel).and_then(prefecture_of)
            }),
        ];
        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

fn present<'a>(value: Option<&'a str>, sentinel: &str) -> Option<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != sentinel)
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}

fn data_sheet(records: &[ListingRecord], fields: &[Field]) -> Sheet {
    let header: Vec<&str> = fields.iter().map(|f| f.label()).collect();
    let rows = records
        .iter()
        .map(|record| record.row().into_iter().map(Cell::from).collect())
        .collect();
    Sheet::new(DATA_SHEET, &header, rows)
}

fn statistics_sheet(records: &[ListingRecord], fields: &[Field], sentinel: &str) -> Sheet {
    let total = records.len();
    let mut rows = vec![vec![
        Cell::from(TOTAL_LABEL),
        Cell::from(total),
        Cell::from(100.0),
    ]];

    for field in fields.iter().filter(|f| f.is_scraped()) {
        let count = records
            .iter()
            .filter(|record| present(record.get(*field), sentinel).is_some())
            .count();
        rows.push(vec![
            Cell::from(format!("{}あり", field.label())),
            Cell::from(count),
            Cell::from(percentage(count, total)),
        ]);
    }

    Sheet::new(STATISTICS_SHEET, &["項目", "件数", "割合(%)"], rows)
}

/// 件数の多い順（同数なら最初に現れた順）
fn breakdown_sheet<'a, F>(name: &str, key_label: &str, records: &'a [ListingRecord], key: F) -> Sheet
where
    F: Fn(&'a ListingRecord) -> Option<&'a str>,
{
    let mut order: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for value in records.iter().filter_map(key) {
        match index.get(value) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(value, order.len());
                order.push((value, 1));
            }
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));

    let total = records.len();
    let rows = order
        .into_iter()
        .map(|(value, count)| {
            vec![
                Cell::from(value),
                Cell::from(count),
                Cell::from(percentage(count, total)),
            ]
        })
        .collect();
    Sheet::new(name, &[key_label, "件数", "割合(%)"], rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSet;

    fn record(name: &str, genre: &str, address: &str) -> ListingRecord {
        let mut record = ListingRecord::blank(
            FieldSet::Basic,
            format!("https://r.gnavi.co.jp/{}/", name),
            "2025-01-01 12:00:00",
            "-",
        );
        record.set(Field::Name, name);
        record.set(Field::Genre, genre);
        record.set(Field::Address, address);
        record
    }

    fn records() -> Vec<ListingRecord> {
        vec![
            record("a1", "居酒屋", "東京都新宿区西新宿1-1-1"),
            record("b2", "ラーメン", "大阪府大阪市北区梅田1-1"),
            record("c3", "ラーメン", "〒600-8001 京都府京都市下京区四条通"),
            record("d4", "-", "神奈川県横浜市西区高島2-1"),
            record("e5", "居酒屋", "-"),
            record("f6", "ラーメン", "東京都渋谷区道玄坂2-1"),
        ]
    }

    #[test]
    fn test_prefecture_of() {
        assert_eq!(prefecture_of("東京都千代田区丸の内1-1"), Some("東京都"));
        assert_eq!(prefecture_of("京都府京都市中京区"), Some("京都府"));
        assert_eq!(prefecture_of("北海道札幌市中央区"), Some("北海道"));
        assert_eq!(prefecture_of("鹿児島県鹿児島市"), Some("鹿児島県"));
        assert_eq!(prefecture_of("〒460-0008 愛知県名古屋市中区栄"), Some("愛知県"));
        assert_eq!(prefecture_of("新宿区西新宿"), None);
        assert_eq!(prefecture_of(""), None);
    }

    #[test]
    fn test_empty_records_are_rejected() {
        assert!(matches!(
            ExportWorkbook::from_records(&[], "-"),
            Err(ScraperError::EmptyResultSet)
        ));
    }

    #[test]
    fn test_data_sheet_has_header_and_one_row_per_record() {
        let workbook = ExportWorkbook::from_records(&records(), "-").unwrap();
        let data = workbook.sheet(DATA_SHEET).unwrap();

        assert_eq!(data.row_count(), 7);
        assert_eq!(data.header()[0], "URL");
        assert_eq!(data.header()[1], "店舗名");
        assert_eq!(data.rows()[2][1], Cell::from("c3"));
        assert_eq!(workbook.sheets()[0].name(), DATA_SHEET);
    }

    #[test]
    fn test_statistics_sheet() {
        let workbook = ExportWorkbook::from_records(&records(), "-").unwrap();
        let stats = workbook.sheet(STATISTICS_SHEET).unwrap();

        assert_eq!(stats.rows()[0][0], Cell::from(TOTAL_LABEL));
        assert_eq!(stats.rows()[0][1], Cell::Number(6.0));

        let genre_row = stats
            .rows()
            .iter()
            .find(|row| row[0] == Cell::from("ジャンルあり"))
            .unwrap();
        assert_eq!(genre_row[1], Cell::Number(5.0));
        assert_eq!(genre_row[2], Cell::Number(83.3));

        let phone_row = stats
            .rows()
            .iter()
            .find(|row| row[0] == Cell::from("電話番号あり"))
            .unwrap();
        assert_eq!(phone_row[1], Cell::Number(0.0));
    }

    #[test]
    fn test_genre_breakdown_is_sorted_by_count() {
        let workbook = ExportWorkbook::from_records(&records(), "-").unwrap();
        let genres = workbook.sheet(GENRE_SHEET).unwrap();

        assert_eq!(genres.rows().len(), 2);
        assert_eq!(genres.rows()[0][0], Cell::from("ラーメン"));
        assert_eq!(genres.rows()[0][1], Cell::Number(3.0));
        assert_eq!(genres.rows()[0][2], Cell::Number(50.0));
        assert_eq!(genres.rows()[1][0], Cell::from("居酒屋"));
    }

    #[test]
    fn test_area_breakdown() {
        let workbook = ExportWorkbook::from_records(&records(), "-").unwrap();
        let areas = workbook.sheet(AREA_SHEET).unwrap();
        let names: Vec<_> = areas.rows().iter().map(|row| row[0].clone()).collect();

        assert_eq!(
            names,
            vec![
                Cell::from("東京都"),
                Cell::from("大阪府"),
                Cell::from("京都府"),
                Cell::from("神奈川県")
            ]
        );
        assert_eq!(areas.rows()[0][1], Cell::Number(2.0));
    }

    #[test]
    fn test_oversized_text_is_clamped_to_cell_limit() {
        let mut record = record("h8", "和食", "東京都");
        record.set(Field::BusinessHours, "営".repeat(40_000));
        let workbook = ExportWorkbook::from_records(&[record], "-").unwrap();
        let data = workbook.sheet(DATA_SHEET).unwrap();

        match &data.rows()[0][5] {
            Cell::Text(text) => assert_eq!(text.chars().count(), MAX_CELL_TEXT),
            other => panic!("unexpected cell: {:?}", other),
        }
    }

    #[test]
    fn test_clamp_counts_utf16_units() {
        let text = format!("{}🍣🍣", "a".repeat(MAX_CELL_TEXT - 3));
        let clamped = clamp_cell_text(text);
        assert_eq!(clamped.encode_utf16().count(), MAX_CELL_TEXT - 1);
        assert!(clamped.ends_with('🍣'));

        assert_eq!(clamp_cell_text("短い".to_string()), "短い");
    }

    #[test]
    fn test_column_widths_are_padded_and_capped() {
        let mut long = record("g7", "和食", "東京都");
        long.set(Field::BusinessHours, "営".repeat(100));
        let workbook = ExportWorkbook::from_records(&[long], "-").unwrap();
        let data = workbook.sheet(DATA_SHEET).unwrap();
        let widths = data.column_widths();

        // URL: "https://r.gnavi.co.jp/g7/" は25文字
        assert_eq!(widths[0], 27);
        // 店舗名: 見出し3文字 > "g7"
        assert_eq!(widths[1], 5);
        assert_eq!(widths[5], MAX_COLUMN_WIDTH);
    }
}
