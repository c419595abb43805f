use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::trace;

use crate::schema::{Field, FieldKind, Record};
use crate::visibility::ColumnVisibility;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub field: Field,
    pub direction: SortDirection,
}

impl SortState {
    pub fn ascending(field: Field) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: Field) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }
}

/// Global query plus per-column queries. All matching is case-insensitive
/// substring matching and every non-empty query has to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub global: String,
    pub columns: BTreeMap<Field, String>,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        !self.global.is_empty() || !self.columns.is_empty()
    }

    fn matcher(&self) -> FilterMatcher {
        FilterMatcher {
            global: (!self.global.is_empty()).then(|| self.global.to_lowercase()),
            columns: self
                .columns
                .iter()
                .map(|(f, q)| (*f, q.to_lowercase()))
                .collect(),
        }
    }
}

struct FilterMatcher {
    global: Option<String>,
    columns: Vec<(Field, String)>,
}

impl FilterMatcher {
    fn matches(&self, record: &Record) -> bool {
        if let Some(term) = &self.global
            && !Field::ALL
                .iter()
                .any(|&f| contains_ignore_case(record.get(f), term))
        {
            return false;
        }
        self.columns
            .iter()
            .all(|(f, term)| contains_ignore_case(record.get(*f), term))
    }
}

fn contains_ignore_case(value: &str, lowercase_term: &str) -> bool {
    value.to_lowercase().contains(lowercase_term)
}

/// What the rendering surface shows: the current page restricted to the
/// visible columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub columns: Vec<Field>,
    pub rows: Vec<Vec<String>>,
    /// Dataset indices of `rows`.
    pub row_indices: Vec<usize>,
    /// Dataset indices of every filtered row in sorted order, ignoring pagination.
    pub filtered: Arc<Vec<usize>>,
    pub page_index: usize,
    pub page_count: usize,
    pub page_size: usize,
}

impl Projection {
    pub fn filtered_count(&self) -> usize {
        self.filtered.len()
    }

    pub fn can_previous_page(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next_page(&self) -> bool {
        self.page_index + 1 < self.page_count
    }
}

/// Derive the visible projection. Pure in all of its inputs.
pub fn project(
    dataset: &[Record],
    sort: Option<SortState>,
    filter: &FilterState,
    visibility: &ColumnVisibility,
    page_index: usize,
    page_size: usize,
) -> Projection {
    let mut rows: Vec<usize> = if filter.is_active() {
        let matcher = filter.matcher();
        (0..dataset.len())
            .into_par_iter()
            .filter(|&idx| matcher.matches(&dataset[idx]))
            .collect()
    } else {
        (0..dataset.len()).collect()
    };

    if let Some(sort) = sort {
        sort_rows(dataset, &mut rows, sort);
    }

    let page_count = rows.len().div_ceil(page_size);
    let page_index = page_index.min(page_count.saturating_sub(1));
    let begin = std::cmp::min(page_index * page_size, rows.len());
    let end = std::cmp::min(begin + page_size, rows.len());

    let columns = visibility.visible_fields();
    let row_indices = rows[begin..end].to_vec();
    let page_rows = row_indices
        .iter()
        .map(|&ridx| {
            columns
                .iter()
                .map(|&f| dataset[ridx].get(f).to_string())
                .collect()
        })
        .collect();

    Projection {
        columns,
        rows: page_rows,
        row_indices,
        filtered: Arc::new(rows),
        page_index,
        page_count,
        page_size,
    }
}

/// Stable sort of dataset indices by one field.
fn sort_rows(dataset: &[Record], rows: &mut [usize], sort: SortState) {
    let numeric = sort.field.kind() == FieldKind::Numeric;
    rows.sort_by(|&a, &b| {
        let a = dataset[a].get(sort.field);
        let b = dataset[b].get(sort.field);
        let ord = if numeric {
            compare_numeric(a, b)
        } else {
            a.cmp(b)
        };
        match sort.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

// Finite numbers come first, everything else (NaN and inf included)
// compares as text.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    match (finite_number(a), finite_number(b)) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn finite_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Owns the dataset and every piece of user controlled view state.
///
/// Each mutation recomputes the projection before returning, so callers can
/// never observe a stale or partially updated view.
#[derive(Debug, Clone)]
pub struct TableState {
    dataset: Vec<Record>,
    sort: Option<SortState>,
    filter: FilterState,
    visibility: ColumnVisibility,
    page_index: usize,
    projection: Projection,
    revision: u64,
}

impl Default for TableState {
    fn default() -> Self {
        Self::new(Vec::new(), ColumnVisibility::default())
    }
}

impl TableState {
    pub fn new(dataset: Vec<Record>, visibility: ColumnVisibility) -> Self {
        let mut table = Self {
            dataset,
            sort: None,
            filter: FilterState::default(),
            visibility,
            page_index: 0,
            projection: Projection::default(),
            revision: 0,
        };
        table.refresh();
        table
    }

    pub fn dataset(&self) -> &[Record] {
        &self.dataset
    }

    pub fn sort(&self) -> Option<SortState> {
        self.sort
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn visibility(&self) -> &ColumnVisibility {
        &self.visibility
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn visible_fields(&self) -> &[Field] {
        &self.projection.columns
    }

    /// Every row passing the filters in sorted order, across all pages.
    pub fn filtered_records(&self) -> impl Iterator<Item = &Record> {
        self.projection.filtered.iter().map(|&idx| &self.dataset[idx])
    }

    pub fn set_dataset(&mut self, records: Vec<Record>) {
        trace!("Replacing dataset with {} records", records.len());
        self.dataset = records;
        self.page_index = 0;
        self.refresh();
    }

    pub fn set_sort(&mut self, sort: Option<SortState>) {
        trace!("Sort: {:?} -> {:?}", self.sort, sort);
        self.sort = sort;
        self.page_index = 0;
        self.refresh();
    }

    /// Ascending on first use of a field, then flips between directions.
    pub fn toggle_sort(&mut self, field: Field) {
        let next = match self.sort {
            Some(SortState {
                field: f,
                direction: SortDirection::Ascending,
            }) if f == field => SortState::descending(field),
            _ => SortState::ascending(field),
        };
        self.set_sort(Some(next));
    }

    pub fn set_global_filter(&mut self, query: impl Into<String>) {
        self.filter.global = query.into();
        trace!("Global filter: {:?}", self.filter.global);
        self.page_index = 0;
        self.refresh();
    }

    /// `None` or an empty query removes the column filter.
    pub fn set_column_filter(&mut self, field: Field, query: Option<String>) {
        match query.filter(|q| !q.is_empty()) {
            Some(q) => {
                self.filter.columns.insert(field, q);
            }
            None => {
                self.filter.columns.remove(&field);
            }
        }
        trace!("Column filters: {:?}", self.filter.columns);
        self.page_index = 0;
        self.refresh();
    }

    pub fn set_column_visible(&mut self, field: Field, visible: bool) {
        self.visibility.set(field, visible);
        self.refresh();
    }

    pub fn toggle_column(&mut self, field: Field) {
        let visible = self.visibility.is_visible(field);
        self.set_column_visible(field, !visible);
    }

    pub fn set_visibility(&mut self, visibility: ColumnVisibility) {
        self.visibility = visibility;
        self.refresh();
    }

    pub fn set_page(&mut self, index: usize) {
        self.page_index = index;
        self.refresh();
    }

    pub fn next_page(&mut self) {
        if self.projection.can_next_page() {
            self.set_page(self.page_index + 1);
        }
    }

    pub fn previous_page(&mut self) {
        if self.projection.can_previous_page() {
            self.set_page(self.page_index - 1);
        }
    }

    pub fn first_page(&mut self) {
        self.set_page(0);
    }

    pub fn last_page(&mut self) {
        self.set_page(self.projection.page_count.saturating_sub(1));
    }

    fn refresh(&mut self) {
        self.projection = project(
            &self.dataset,
            self.sort,
            &self.filter,
            &self.visibility,
            self.page_index,
            PAGE_SIZE,
        );
        self.page_index = self.projection.page_index;
        self.revision += 1;
        trace!(
            "Projection r{}: page {}/{}, {} of {} rows, columns {:?}",
            self.revision,
            self.projection.page_index + 1,
            self.projection.page_count,
            self.projection.filtered_count(),
            self.dataset.len(),
            self.projection.columns
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    const FIXTURE: &str = include_str!("../tests/fixtures/testdata_01.csv");

    fn fixture() -> Vec<Record> {
        codec::decode(FIXTURE).unwrap()
    }

    fn record(id: usize, name: &str, age: &str) -> Record {
        Record {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            age: age.to_string(),
            role: "Engineer".to_string(),
            ..Default::default()
        }
    }

    fn ids(table: &TableState) -> Vec<String> {
        table.filtered_records().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn empty_dataset_projects_nothing() {
        let table = TableState::default();
        let p = table.projection();
        assert!(p.rows.is_empty());
        assert_eq!(p.page_count, 0);
        assert_eq!(p.page_index, 0);
        assert!(!p.can_next_page());
        assert!(!p.can_previous_page());
    }

    #[test]
    fn twenty_five_rows_make_three_pages() {
        let mut table = TableState::new(fixture(), ColumnVisibility::default());
        assert_eq!(table.projection().page_count, 3);
        assert_eq!(table.projection().rows.len(), 10);
        assert!(table.projection().can_next_page());

        table.set_page(2);
        assert_eq!(table.projection().rows.len(), 5);
        assert_eq!(table.projection().row_indices, vec![20, 21, 22, 23, 24]);
        assert!(!table.projection().can_next_page());
        assert!(table.projection().can_previous_page());
    }

    #[test]
    fn page_index_is_clamped() {
        let mut table = TableState::new(fixture(), ColumnVisibility::default());
        table.set_page(99);
        assert_eq!(table.page_index(), 2);
        table.next_page();
        assert_eq!(table.page_index(), 2);
        table.first_page();
        table.previous_page();
        assert_eq!(table.page_index(), 0);
        table.last_page();
        assert_eq!(table.page_index(), 2);
    }

    #[test]
    fn projection_contains_only_visible_columns_in_schema_order() {
        let mut table = TableState::new(fixture(), ColumnVisibility::default());
        assert_eq!(
            table.visible_fields(),
            &[Field::Id, Field::Name, Field::Email, Field::Age, Field::Role]
        );

        table.set_column_visible(Field::Email, false);
        table.set_column_visible(Field::Location, true);
        assert_eq!(
            table.visible_fields(),
            &[Field::Id, Field::Name, Field::Age, Field::Role, Field::Location]
        );
        assert_eq!(
            table.projection().rows[0],
            vec!["1", "Alice Johnson", "34", "Engineer", "Vienna"]
        );
    }

    #[test]
    fn global_filter_is_case_insensitive_over_all_fields() {
        let records = fixture();
        let mut table = TableState::new(records.clone(), ColumnVisibility::default());
        table.set_global_filter("ann");

        let kept: Vec<&Record> = table.filtered_records().collect();
        assert!(!kept.is_empty());
        for r in kept.iter() {
            assert!(Field::ALL.iter().any(|&f| r.get(f).to_lowercase().contains("ann")));
        }
        for r in records.iter().filter(|r| !kept.contains(r)) {
            assert!(!Field::ALL.iter().any(|&f| r.get(f).to_lowercase().contains("ann")));
        }
    }

    #[test]
    fn filter_matches_hidden_columns_too() {
        let mut table = TableState::new(fixture(), ColumnVisibility::default());
        table.set_global_filter("VIENNA");
        assert_eq!(ids(&table), vec!["1", "25"]);
    }

    #[test]
    fn column_filters_combine_with_the_global_filter() {
        let mut table = TableState::new(fixture(), ColumnVisibility::default());
        table.set_column_filter(Field::Role, Some("engineer".into()));
        assert_eq!(table.projection().filtered_count(), 7);

        table.set_global_filter("berlin");
        assert!(ids(&table).is_empty());
        assert_eq!(table.projection().page_count, 0);
        assert!(!table.projection().can_next_page());

        table.set_global_filter("");
        table.set_column_filter(Field::Role, None);
        assert_eq!(table.projection().filtered_count(), 25);
    }

    #[test]
    fn numeric_sort_is_not_lexicographic() {
        let records = vec![record(1, "a", "9"), record(2, "b", "10"), record(3, "c", "100")];
        let mut table = TableState::new(records, ColumnVisibility::default());

        table.set_sort(Some(SortState::ascending(Field::Age)));
        assert_eq!(ids(&table), vec!["1", "2", "3"]);

        table.set_sort(Some(SortState::descending(Field::Age)));
        assert_eq!(ids(&table), vec!["3", "2", "1"]);

        table.set_sort(None);
        assert_eq!(ids(&table), vec!["1", "2", "3"]);
    }

    #[test]
    fn unparsable_numbers_sort_after_numbers() {
        let records = vec![record(1, "a", "n/a"), record(2, "b", "40"), record(3, "c", "")];
        let mut table = TableState::new(records, ColumnVisibility::default());
        table.set_sort(Some(SortState::ascending(Field::Age)));
        assert_eq!(ids(&table), vec!["2", "3", "1"]);
    }

    #[test]
    fn non_finite_ages_sort_as_text() {
        let records = vec![
            record(1, "a", "5"),
            record(2, "b", "NaN"),
            record(3, "c", "1"),
            record(4, "d", "inf"),
        ];
        let mut table = TableState::new(records, ColumnVisibility::default());
        table.set_sort(Some(SortState::ascending(Field::Age)));
        assert_eq!(ids(&table), vec!["3", "1", "2", "4"]);

        table.set_sort(Some(SortState::descending(Field::Age)));
        assert_eq!(ids(&table), vec!["4", "2", "1", "3"]);
    }

    #[test]
    fn numbers_stay_ordered_among_many_nan_ages() {
        let records: Vec<Record> = (0..200)
            .map(|i| {
                let age = if i % 3 == 0 {
                    "NaN".to_string()
                } else {
                    ((i * 37) % 101).to_string()
                };
                record(i, "x", &age)
            })
            .collect();
        let mut table = TableState::new(records, ColumnVisibility::default());
        table.set_sort(Some(SortState::ascending(Field::Age)));

        let ages: Vec<&str> = table.filtered_records().map(|r| r.age.as_str()).collect();
        let split = ages.iter().position(|a| *a == "NaN").unwrap();
        let numbers: Vec<f64> = ages[..split].iter().map(|a| a.parse().unwrap()).collect();
        assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
        assert!(ages[split..].iter().all(|a| *a == "NaN"));
        assert_eq!(ages.len(), 200);
    }

    #[test]
    fn text_sort_is_lexicographic() {
        let records = vec![record(1, "bob", "1"), record(2, "Bob", "1"), record(3, "alice", "1")];
        let mut table = TableState::new(records, ColumnVisibility::default());
        table.set_sort(Some(SortState::ascending(Field::Name)));
        assert_eq!(ids(&table), vec!["2", "3", "1"]);
    }

    #[test]
    fn sort_is_stable_and_a_permutation() {
        let records = fixture();
        let mut table = TableState::new(records.clone(), ColumnVisibility::default());

        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            table.set_sort(Some(SortState {
                field: Field::Role,
                direction,
            }));
            let sorted: Vec<&Record> = table.filtered_records().collect();

            let mut sorted_ids: Vec<&str> = sorted.iter().map(|r| r.id.as_str()).collect();
            sorted_ids.sort();
            let mut all_ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
            all_ids.sort();
            assert_eq!(sorted_ids, all_ids);

            for pair in sorted.windows(2) {
                if pair[0].role == pair[1].role {
                    let a: usize = pair[0].id.parse().unwrap();
                    let b: usize = pair[1].id.parse().unwrap();
                    assert!(a < b, "equal keys kept insertion order");
                }
            }
        }
    }

    #[test]
    fn toggle_sort_flips_direction() {
        let mut table = TableState::new(fixture(), ColumnVisibility::default());
        table.toggle_sort(Field::Age);
        assert_eq!(table.sort(), Some(SortState::ascending(Field::Age)));
        table.toggle_sort(Field::Age);
        assert_eq!(table.sort(), Some(SortState::descending(Field::Age)));
        table.toggle_sort(Field::Age);
        assert_eq!(table.sort(), Some(SortState::ascending(Field::Age)));
        table.toggle_sort(Field::Name);
        assert_eq!(table.sort(), Some(SortState::ascending(Field::Name)));
    }

    #[test]
    fn sort_and_filter_changes_reset_the_page() {
        let mut table = TableState::new(fixture(), ColumnVisibility::default());

        table.set_page(2);
        table.set_sort(Some(SortState::ascending(Field::Name)));
        assert_eq!(table.page_index(), 0);

        table.set_page(2);
        table.set_global_filter("e");
        assert_eq!(table.page_index(), 0);

        table.set_page(1);
        table.set_column_filter(Field::Age, Some("3".into()));
        assert_eq!(table.page_index(), 0);

        table.set_page(1);
        table.set_dataset(fixture());
        assert_eq!(table.page_index(), 0);
    }

    #[test]
    fn visibility_changes_keep_the_page() {
        let mut table = TableState::new(fixture(), ColumnVisibility::default());
        table.set_page(1);
        table.toggle_column(Field::Department);
        assert_eq!(table.page_index(), 1);
        assert!(table.visibility().is_visible(Field::Department));
    }

    #[test]
    fn mutations_bump_the_revision() {
        let mut table = TableState::default();
        let r0 = table.revision();
        table.set_dataset(fixture());
        table.set_global_filter("x");
        assert_eq!(table.revision(), r0 + 2);
    }

    #[test]
    fn project_is_pure() {
        let records = fixture();
        let filter = FilterState {
            global: "engineer".into(),
            columns: BTreeMap::new(),
        };
        let visibility = ColumnVisibility::default();
        let sort = Some(SortState::descending(Field::Age));
        let a = project(&records, sort, &filter, &visibility, 0, PAGE_SIZE);
        let b = project(&records, sort, &filter, &visibility, 0, PAGE_SIZE);
        assert_eq!(a, b);
        assert_eq!(a.rows[0][3], "47");
    }
}
