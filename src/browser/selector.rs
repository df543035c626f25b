//! セレクタのフォールバック解決
//!
//! 店舗ページのマークアップはテンプレートごとに異なるため、項目ごとに
//! 具体的なセレクタから汎用的なクラス名マッチへと順に試す。

use std::fmt;

use tracing::debug;

use crate::traits::BrowserSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorKind {
    Css,
    XPath,
}

/// 要素の探し方（種類とクエリ文字列の組）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    pub kind: LocatorKind,
    pub query: &'static str,
}

impl Locator {
    pub const fn css(query: &'static str) -> Self {
        Self {
            kind: LocatorKind::Css,
            query,
        }
    }

    pub const fn xpath(query: &'static str) -> Self {
        Self {
            kind: LocatorKind::XPath,
            query,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LocatorKind::Css => write!(f, "css:{}", self.query),
            LocatorKind::XPath => write!(f, "xpath:{}", self.query),
        }
    }
}

/// 先頭から順にセレクタを試し、最初に得られた空でないテキストを返す。
///
/// 表示テキストが空なら textContent を使う。どれにも一致しなければ空文字列。
/// 見つからないことはエラーではない。
pub async fn resolve_text<S>(session: &S, locators: &[Locator]) -> String
where
    S: BrowserSession + ?Sized,
{
    for locator in locators {
        match session.query_text(locator).await {
            Ok(Some(text)) => {
                let visible = text.visible.trim();
                if !visible.is_empty() {
                    return visible.to_string();
                }
                let content = text.content.trim();
                if !content.is_empty() {
                    return content.to_string();
                }
            }
            Ok(None) => continue,
            Err(e) => {
                debug!("セレクタ {} でエラー: {}", locator, e);
                continue;
            }
        }
    }
    String::new()
}
