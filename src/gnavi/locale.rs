//! 地域コードと検索URLの構築
//!
//! 都道府県は `https://r.gnavi.co.jp/area/<code>/rs/` で表される。
//! 市区町村レベルのエリアコードは一部しか持たないため、未登録のエリアは
//! フリーワード検索にフォールバックする。

use url::Url;

use crate::error::ScraperError;

use super::types::{non_blank, SearchCriteria};

pub const BASE_URL: &str = "https://r.gnavi.co.jp/";

const FREE_TEXT_PARAM: &str = "freeword";
const GENRE_PARAM: &str = "category";
const STATION_PARAM: &str = "station";

/// 都道府県 → エリアコード（北から順）
const REGIONS: &[(&str, &str)] = &[
    ("北海道", "hokkaido"),
    ("青森県", "aomori"),
    ("岩手県", "iwate"),
    ("宮城県", "miyagi"),
    ("秋田県", "akita"),
    ("山形県", "yamagata"),
    ("福島県", "fukushima"),
    ("茨城県", "ibaraki"),
    ("栃木県", "tochigi"),
    ("群馬県", "gunma"),
    ("埼玉県", "saitama"),
    ("千葉県", "chiba"),
    ("東京都", "tokyo"),
    ("神奈川県", "kanagawa"),
    ("新潟県", "niigata"),
    ("富山県", "toyama"),
    ("石川県", "ishikawa"),
    ("福井県", "fukui"),
    ("山梨県", "yamanashi"),
    ("長野県", "nagano"),
    ("岐阜県", "gifu"),
    ("静岡県", "shizuoka"),
    ("愛知県", "aichi"),
    ("三重県", "mie"),
    ("滋賀県", "shiga"),
    ("京都府", "kyoto"),
    ("大阪府", "osaka"),
    ("兵庫県", "hyogo"),
    ("奈良県", "nara"),
    ("和歌山県", "wakayama"),
    ("鳥取県", "tottori"),
    ("島根県", "shimane"),
    ("岡山県", "okayama"),
    ("広島県", "hiroshima"),
    ("山口県", "yamaguchi"),
    ("徳島県", "tokushima"),
    ("香川県", "kagawa"),
    ("愛媛県", "ehime"),
    ("高知県", "kochi"),
    ("福岡県", "fukuoka"),
    ("佐賀県", "saga"),
    ("長崎県", "nagasaki"),
    ("熊本県", "kumamoto"),
    ("大分県", "oita"),
    ("宮崎県", "miyazaki"),
    ("鹿児島県", "kagoshima"),
    ("沖縄県", "okinawa"),
];

/// (都道府県, エリア名, エリアコード)
const LOCALITIES: &[(&str, &str, &str)] = &[
    ("北海道", "札幌駅", "aream5502"),
    ("北海道", "すすきの", "aream5504"),
    ("北海道", "函館", "aream5570"),
    ("宮城県", "仙台駅", "aream4402"),
    ("東京都", "銀座", "aream2101"),
    ("東京都", "新橋", "aream2103"),
    ("東京都", "丸の内", "aream2107"),
    ("東京都", "新宿", "aream2115"),
    ("東京都", "渋谷", "aream2126"),
    ("東京都", "恵比寿", "aream2129"),
    ("東京都", "池袋", "aream2147"),
    ("東京都", "上野", "aream2161"),
    ("東京都", "浅草", "aream2164"),
    ("東京都", "吉祥寺", "aream2187"),
    ("神奈川県", "横浜駅", "aream2501"),
    ("神奈川県", "みなとみらい", "aream2503"),
    ("神奈川県", "川崎", "aream2531"),
    ("愛知県", "名古屋駅", "aream3302"),
    ("愛知県", "栄", "aream3305"),
    ("京都府", "河原町", "aream3402"),
    ("京都府", "祇園", "aream3406"),
    ("京都府", "京都駅", "aream3410"),
    ("大阪府", "梅田", "aream3502"),
    ("大阪府", "心斎橋", "aream3511"),
    ("大阪府", "難波", "aream3514"),
    ("大阪府", "天王寺", "aream3520"),
    ("兵庫県", "三宮", "aream3602"),
    ("広島県", "広島駅", "aream4602"),
    ("福岡県", "博多", "aream5102"),
    ("福岡県", "天神", "aream5105"),
    ("沖縄県", "那覇", "aream6202"),
];

/// ジャンルの候補
const GENRES: &[&str] = &[
    "居酒屋",
    "焼肉・ホルモン",
    "ラーメン",
    "寿司",
    "イタリアン",
    "フレンチ",
    "中華",
    "和食",
    "洋食",
    "カフェ・喫茶店",
    "ファストフード",
    "韓国料理",
    "タイ料理",
    "インド料理",
    "ピザ",
    "ハンバーガー",
    "お好み焼き・もんじゃ",
    "うどん・そば",
    "天ぷら",
    "鍋料理",
    "しゃぶしゃぶ",
    "すき焼き",
    "海鮮料理",
    "串焼き・串カツ",
    "とんかつ",
    "ステーキ",
    "ハンバーグ",
    "オムライス",
];

pub fn region_code(region: &str) -> Option<&'static str> {
    let region = region.trim();
    REGIONS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, code)| *code)
}

pub fn locality_code(region: &str, locality: &str) -> Option<&'static str> {
    let (region, locality) = (region.trim(), locality.trim());
    LOCALITIES
        .iter()
        .find(|(r, l, _)| *r == region && *l == locality)
        .map(|(_, _, code)| *code)
}

fn area_url(code: &str) -> Result<Url, ScraperError> {
    Url::parse(&format!("{}area/{}/rs/", BASE_URL, code))
        .map_err(|e| ScraperError::UnsupportedRegion(format!("{}: {}", code, e)))
}

/// 都道府県の検索URL
pub fn build_region_url(region: &str) -> Result<Url, ScraperError> {
    let code =
        region_code(region).ok_or_else(|| ScraperError::UnsupportedRegion(region.to_string()))?;
    area_url(code)
}

/// エリアの検索URL。未登録のエリアは都道府県URLにフリーワードを付ける
pub fn build_locality_url(region: &str, locality: &str) -> Result<Url, ScraperError> {
    match locality_code(region, locality) {
        Some(code) => area_url(code),
        None => {
            let mut url = build_region_url(region)?;
            url.query_pairs_mut()
                .append_pair(FREE_TEXT_PARAM, locality.trim());
            Ok(url)
        }
    }
}

/// 検索開始URL
pub fn build_search_url(criteria: &SearchCriteria) -> Result<Url, ScraperError> {
    let region = criteria.region.as_str();

    let mut free_words: Vec<&str> = Vec::new();
    let mut url = match non_blank(&criteria.locality) {
        Some(locality) => match locality_code(region, locality) {
            Some(code) => area_url(code)?,
            None => {
                free_words.push(locality);
                build_region_url(region)?
            }
        },
        None => build_region_url(region)?,
    };

    if let Some(text) = non_blank(&criteria.free_text) {
        free_words.push(text);
    }

    {
        let mut query = url.query_pairs_mut();
        if let Some(genre) = non_blank(&criteria.genre) {
            query.append_pair(GENRE_PARAM, genre);
        }
        if let Some(station) = non_blank(&criteria.station) {
            query.append_pair(STATION_PARAM, station);
        }
        if !free_words.is_empty() {
            query.append_pair(FREE_TEXT_PARAM, &free_words.join(" "));
        }
    }

    // 付与するパラメータが無いときに末尾の "?" を残さない
    if url.query() == Some("") {
        url.set_query(None);
    }
    Ok(url)
}

/// エリアコードが登録されているエリア名
pub fn list_known_localities(region: &str) -> Vec<&'static str> {
    let region = region.trim();
    LOCALITIES
        .iter()
        .filter(|(r, _, _)| *r == region)
        .map(|(_, locality, _)| *locality)
        .collect()
}

pub fn list_regions() -> Vec<&'static str> {
    REGIONS.iter().map(|(name, _)| *name).collect()
}

pub fn list_genres() -> &'static [&'static str] {
    GENRES
}
