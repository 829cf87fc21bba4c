//! View state for the product table: sorting, filters, column visibility,
//! row selection and pagination. Everything here is a pure projection over a
//! borrowed product slice; nothing mutates the products themselves.

use serde::{Deserialize, Serialize};
use shelf_protocol::{Product, ProductId};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

pub const PAGE_SIZES: [usize; 5] = [10, 20, 30, 40, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("page size {0} is not one of 10, 20, 30, 40, 50")]
    UnsupportedPageSize(usize),
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Id,
    Title,
    Price,
    Description,
    Category,
    Images,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Id,
        Column::Title,
        Column::Price,
        Column::Description,
        Column::Category,
        Column::Images,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Title => "title",
            Column::Price => "price",
            Column::Description => "description",
            Column::Category => "category",
            Column::Images => "images",
        }
    }

    fn compare(self, a: &Product, b: &Product) -> Ordering {
        match self {
            Column::Id => a.id.cmp(&b.id),
            Column::Title => cmp_text(&a.title, &b.title),
            Column::Price => a.price.total_cmp(&b.price),
            Column::Description => cmp_text(&a.description, &b.description),
            Column::Category => cmp_text(&a.category.name, &b.category.name),
            Column::Images => a.images.len().cmp(&b.images.len()),
        }
    }
}

impl FromStr for Column {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TableError::UnknownColumn(s.to_string()))
    }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: Column,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: Column,
    pub value: String,
}

impl ColumnFilter {
    /// Text columns match case-insensitively on substrings. `id` matches
    /// exactly. `price` takes either a single number or a `min..max` range
    /// with optional bounds. `images` filters on the image count.
    pub fn matches(&self, product: &Product) -> bool {
        let needle = self.value.trim();
        if needle.is_empty() {
            return true;
        }
        match self.column {
            Column::Id => product.id.to_string() == needle,
            Column::Title => contains_ci(&product.title, needle),
            Column::Description => contains_ci(&product.description, needle),
            Column::Category => contains_ci(&product.category.name, needle),
            Column::Price => price_matches(product.price, needle),
            Column::Images => needle
                .parse::<usize>()
                .map(|n| product.images.len() == n)
                .unwrap_or(false),
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn price_matches(price: f64, filter: &str) -> bool {
    if let Some((lo, hi)) = filter.split_once("..") {
        let lo = lo.trim();
        let hi = hi.trim();
        let above = lo.is_empty() || lo.parse::<f64>().map(|v| price >= v).unwrap_or(false);
        let below = hi.is_empty() || hi.parse::<f64>().map(|v| price <= v).unwrap_or(false);
        return above && below;
    }
    filter
        .parse::<f64>()
        .map(|v| (price - v).abs() < 1e-9)
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableViewState {
    pub sorting: Vec<SortSpec>,
    pub hidden_columns: BTreeSet<Column>,
    pub row_selection: BTreeSet<ProductId>,
    pub column_filters: Vec<ColumnFilter>,
    pub pagination: Pagination,
}

/// Serializable snapshot of one rendered page.
#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub rows: Vec<Product>,
    pub columns: Vec<Column>,
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub filtered_rows: usize,
    pub total_rows: usize,
    pub can_previous: bool,
    pub can_next: bool,
    pub selected: Vec<ProductId>,
    pub sorting: Vec<SortSpec>,
    pub filters: Vec<ColumnFilter>,
}

impl TableViewState {
    // ── SORTING ─────────────────────────────────────────────────

    /// Makes `column` the only sort key. Re-sorting returns to the first page.
    pub fn sort_by(&mut self, column: Column, descending: bool) {
        self.sorting = vec![SortSpec { column, descending }];
        self.pagination.page_index = 0;
    }

    /// Cycles a column through ascending, descending, unsorted.
    pub fn toggle_sort(&mut self, column: Column) {
        match self.sorting.iter().find(|s| s.column == column).copied() {
            None => self.sort_by(column, false),
            Some(SortSpec { descending: false, .. }) => self.sort_by(column, true),
            Some(SortSpec { descending: true, .. }) => self.clear_sorting(),
        }
    }

    pub fn clear_sorting(&mut self) {
        self.sorting.clear();
        self.pagination.page_index = 0;
    }

    // ── FILTERS ─────────────────────────────────────────────────

    /// Sets or replaces the filter on `column`; an empty value removes it.
    /// Any filter change sends the view back to the first page.
    pub fn set_filter(&mut self, column: Column, value: impl Into<String>) {
        let value = value.into();
        self.column_filters.retain(|f| f.column != column);
        if !value.trim().is_empty() {
            self.column_filters.push(ColumnFilter { column, value });
        }
        self.pagination.page_index = 0;
    }

    pub fn clear_filters(&mut self) {
        self.column_filters.clear();
        self.pagination.page_index = 0;
    }

    // ── VISIBILITY ──────────────────────────────────────────────

    pub fn set_column_visible(&mut self, column: Column, visible: bool) {
        if visible {
            self.hidden_columns.remove(&column);
        } else {
            self.hidden_columns.insert(column);
        }
    }

    pub fn visible_columns(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|c| !self.hidden_columns.contains(c))
            .collect()
    }

    // ── SELECTION ───────────────────────────────────────────────

    pub fn toggle_row(&mut self, id: &ProductId) {
        if !self.row_selection.remove(id) {
            self.row_selection.insert(id.clone());
        }
    }

    /// Selects every row of the current page, or clears them when they are
    /// all selected already.
    pub fn toggle_page_selection(&mut self, products: &[Product]) {
        let page: Vec<ProductId> = self
            .page_rows(products)
            .into_iter()
            .map(|p| p.id.clone())
            .collect();
        let all_selected =
            !page.is_empty() && page.iter().all(|id| self.row_selection.contains(id));
        for id in page {
            if all_selected {
                self.row_selection.remove(&id);
            } else {
                self.row_selection.insert(id);
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.row_selection.clear();
    }

    /// Drops selected ids that no longer exist in `products`.
    pub fn retain_existing(&mut self, products: &[Product]) {
        self.row_selection
            .retain(|id| products.iter().any(|p| &p.id == id));
    }

    pub fn selected_rows<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        products
            .iter()
            .filter(|p| self.row_selection.contains(&p.id))
            .collect()
    }

    // ── PAGINATION ──────────────────────────────────────────────

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), TableError> {
        if !PAGE_SIZES.contains(&page_size) {
            return Err(TableError::UnsupportedPageSize(page_size));
        }
        self.pagination.page_size = page_size;
        self.pagination.page_index = 0;
        Ok(())
    }

    /// Moves to `page_index`, clamped to the last page.
    pub fn set_page_index(&mut self, page_index: usize, products: &[Product]) {
        let last = self.page_count(products).saturating_sub(1);
        self.pagination.page_index = page_index.min(last);
    }

    pub fn next_page(&mut self, products: &[Product]) {
        if self.can_next(products) {
            self.pagination.page_index += 1;
        }
    }

    pub fn previous_page(&mut self) {
        self.pagination.page_index = self.pagination.page_index.saturating_sub(1);
    }

    pub fn page_count(&self, products: &[Product]) -> usize {
        self.filtered_rows(products)
            .len()
            .div_ceil(self.pagination.page_size.max(1))
    }

    pub fn can_previous(&self) -> bool {
        self.pagination.page_index > 0
    }

    pub fn can_next(&self, products: &[Product]) -> bool {
        self.pagination.page_index + 1 < self.page_count(products)
    }

    // ── DERIVED ROWS ────────────────────────────────────────────

    pub fn filtered_rows<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        products
            .iter()
            .filter(|p| self.column_filters.iter().all(|f| f.matches(p)))
            .collect()
    }

    /// Filtered rows in sort order. The sort is stable, so ties and the
    /// unsorted case keep collection order (including local reorders).
    pub fn sorted_rows<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        let mut rows = self.filtered_rows(products);
        if !self.sorting.is_empty() {
            rows.sort_by(|a, b| {
                for spec in &self.sorting {
                    let ord = spec.column.compare(a, b);
                    let ord = if spec.descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        rows
    }

    pub fn page_rows<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        let Pagination {
            page_index,
            page_size,
        } = self.pagination;
        self.sorted_rows(products)
            .into_iter()
            .skip(page_index.saturating_mul(page_size))
            .take(page_size)
            .collect()
    }

    pub fn view(&self, products: &[Product]) -> TableView {
        TableView {
            rows: self.page_rows(products).into_iter().cloned().collect(),
            columns: self.visible_columns(),
            page_index: self.pagination.page_index,
            page_size: self.pagination.page_size,
            page_count: self.page_count(products),
            filtered_rows: self.filtered_rows(products).len(),
            total_rows: products.len(),
            can_previous: self.can_previous(),
            can_next: self.can_next(products),
            selected: self.selected_rows(products).into_iter().map(|p| p.id.clone()).collect(),
            sorting: self.sorting.clone(),
            filters: self.column_filters.clone(),
        }
    }
}
