use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Navigation metadata for one page, rebuilt from scratch for every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items_per_page: usize,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_url: Option<String>,
    pub prev_url: Option<String>,
    pub first_url: String,
    pub last_url: String,
    pub pages: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLink {
    pub number: usize,
    pub url: String,
    pub is_current: bool,
}

/// One slice of the item list together with its navigation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub meta: PaginationMeta,
}

/// Split `items` into pages of at most `per_page` items.
///
/// There is always at least one page; an empty list yields a single empty
/// page. `per_page` must be non-zero, which callers validate beforehand.
pub fn paginate<'a, T>(items: &'a [T], per_page: usize, base_path: &str) -> Vec<Page<'a, T>> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let mut chunks: Vec<&[T]> = items.chunks(per_page).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    let total_pages = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, items)| Page {
            items,
            meta: build_meta(i + 1, total_pages, total_items, per_page, base_path),
        })
        .collect()
}

pub fn build_meta(
    page: usize,
    total_pages: usize,
    total_items: usize,
    per_page: usize,
    base_path: &str,
) -> PaginationMeta {
    let pages = (1..=total_pages)
        .map(|number| PageLink {
            number,
            url: page_url(number, base_path),
            is_current: number == page,
        })
        .collect();

    PaginationMeta {
        current_page: page,
        total_pages,
        total_items,
        items_per_page: per_page,
        has_next: page < total_pages,
        has_prev: page > 1,
        next_url: (page < total_pages).then(|| page_url(page + 1, base_path)),
        prev_url: (page > 1).then(|| page_url(page - 1, base_path)),
        first_url: page_url(1, base_path),
        last_url: page_url(total_pages, base_path),
        pages,
    }
}

/// `/base` for page one, `/base/page/N` afterwards.
pub fn page_url(page: usize, base_path: &str) -> String {
    let base = if base_path.starts_with('/') {
        base_path.to_string()
    } else {
        format!("/{base_path}")
    };
    if page == 1 {
        base
    } else {
        format!("{}/page/{}", base.trim_end_matches('/'), page)
    }
}

/// Output file mirroring [`page_url`] under `out_dir`.
pub fn page_output_path(page: usize, base_path: &str, out_dir: &Path) -> PathBuf {
    let base = base_path.trim_matches('/');
    if page == 1 {
        out_dir.join(format!("{base}.html"))
    } else {
        out_dir.join(base).join("page").join(format!("{page}.html"))
    }
}
