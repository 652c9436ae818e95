//! Filter/sort pipeline
//!
//! A single pure function turns a snapshot's rows plus per-column settings
//! into the presented view: a list of indices into the row array. Both the
//! windowed and the full renderer consume the same view.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use tabula_core::{Row, Value};
use unicase::UniCase;

use crate::filter::{ColumnFilter, SortDirection};

/// Filter (logical AND of every active data filter) and then stably sort by
/// ascending sort priority. Filters naming unknown columns are ignored.
pub fn apply_pipeline(
    rows: &[Arc<Row>],
    columns: &[String],
    filters: &BTreeMap<String, ColumnFilter>,
) -> Vec<usize> {
    let known = |name: &str| columns.iter().any(|c| c == name);

    let data_filters: Vec<_> = filters
        .iter()
        .filter(|(name, _)| known(name.as_str()))
        .filter_map(|(name, f)| f.data_filter.as_ref().map(|df| (name.as_str(), df)))
        .filter(|(_, df)| df.is_active())
        .collect();

    let mut view: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            data_filters
                .iter()
                .all(|(name, df)| df.matches(row.get(name).unwrap_or(&Value::Null)))
        })
        .map(|(i, _)| i)
        .collect();

    let mut sort_keys: Vec<(u32, &str, SortDirection)> = filters
        .iter()
        .filter(|(name, _)| known(name.as_str()))
        .filter_map(|(name, f)| f.sorting.map(|s| (s.priority, name.as_str(), s.direction)))
        .collect();
    if sort_keys.is_empty() {
        return view;
    }
    sort_keys.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    view.sort_by(|&a, &b| {
        for (_, column, direction) in &sort_keys {
            let va = rows[a].get(column).unwrap_or(&Value::Null);
            let vb = rows[b].get(column).unwrap_or(&Value::Null);
            let ordering = compare_cell_values(va, vb);
            if ordering != Ordering::Equal {
                return match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                };
            }
        }
        Ordering::Equal
    });
    view
}

/// Numbers (values that parse as finite numbers) order before everything
/// else and compare numerically; the rest compare as case-folded text with
/// the raw text as tie-break.
pub fn compare_cell_values(a: &Value, b: &Value) -> Ordering {
    match (sort_number(a), sort_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => {
            let ta = a.display_text();
            let tb = b.display_text();
            UniCase::new(ta.as_str())
                .cmp(&UniCase::new(tb.as_str()))
                .then_with(|| ta.cmp(&tb))
        }
    }
}

fn sort_number(value: &Value) -> Option<f64> {
    // -0.0 and 0.0 must tie under total_cmp
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .map(|n| if n == 0.0 { 0.0 } else { n })
}
