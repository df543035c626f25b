//! ブラウザ操作
//!
//! chromiumoxide によるセッションと、セッションを専有して
//! ページ遷移を行うナビゲーター

mod chrome;
mod navigator;
mod selector;

pub use chrome::{ChromeBackend, ChromeSession};
pub use navigator::{Navigator, Pacer, PageState, NEXT_PAGE_LOCATORS};
pub use selector::{resolve_text, Locator, LocatorKind};
