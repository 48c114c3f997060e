//! Built-in tasks.

pub mod bundle_css;
pub mod copy_static;
pub mod generate_feed;
pub mod generate_items;
pub mod generate_nav_data;
pub mod generate_pages;
pub mod generate_paginated;
pub mod generate_sitemap;
pub mod prepare_output;
pub mod set_global_from_markdown;
pub mod set_globals;

pub use bundle_css::BundleCss;
pub use copy_static::CopyStatic;
pub use generate_feed::GenerateFeed;
pub use generate_items::{DefaultItemHooks, GenerateItems, ItemHooks};
pub use generate_nav_data::GenerateNavData;
pub use generate_pages::{GeneratePages, PagesHooks};
pub use generate_paginated::{GeneratePaginated, PageHooks};
pub use generate_sitemap::GenerateSitemap;
pub use prepare_output::PrepareOutput;
pub use set_global_from_markdown::SetGlobalFromMarkdown;
pub use set_globals::SetGlobals;

use serde_json::Value;

/// A string field of an unresolved config, for task titles.
pub(crate) fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}
