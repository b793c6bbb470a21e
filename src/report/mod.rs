//! Experiment report aggregation
//!
//! Stored records are selected, their configuration flattened, constant
//! configuration keys pruned away and duplicate rows merged. Records that
//! kept raw results are scored here, against whatever the
//! [`MetricRegistry`] holds at report time.

pub mod metrics;
pub mod render;

pub use metrics::MetricRegistry;
pub use render::{render_csv, render_pretty};

use crate::config::{Context, ReportConfig};
use crate::error::{CkptError, CkptResult};
use crate::experiment::{ExperimentStore, ShortHashIndex, StoredRecord};
use crate::hash::scalar_repr;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Flatten nested configuration into `parent-child` keys
///
/// Two distinct paths that flatten to the same key are an error.
pub fn flatten(config: &Map<String, Value>) -> CkptResult<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    flatten_into(config, None, &mut out)?;
    Ok(out)
}

fn flatten_into(
    config: &Map<String, Value>,
    prefix: Option<&str>,
    out: &mut BTreeMap<String, Value>,
) -> CkptResult<()> {
    for (key, value) in config {
        let key = match prefix {
            Some(prefix) => format!("{}-{}", prefix, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => flatten_into(nested, Some(&key), out)?,
            _ => {
                if out.insert(key.clone(), value.clone()).is_some() {
                    return Err(CkptError::FlattenCollision { key });
                }
            }
        }
    }
    Ok(())
}

/// One record as it enters the report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Full content address
    pub id: String,
    pub name: String,
    /// Flattened configuration
    pub config: BTreeMap<String, Value>,
    pub metrics: BTreeMap<String, f64>,
}

impl ReportRow {
    pub fn from_stored(stored: &StoredRecord, registry: &MetricRegistry) -> CkptResult<Self> {
        Ok(Self {
            id: stored.address.clone(),
            name: stored.record.name.clone(),
            config: flatten(&stored.record.configuration)?,
            metrics: stored.record.metrics(registry),
        })
    }

    fn same_content(&self, other: &Self) -> bool {
        self.name == other.name && self.config == other.config && self.metrics == other.metrics
    }
}

/// Keep only configuration keys whose value varies, then merge equal rows
///
/// A key missing from some rows counts as varying. Of rows that become
/// identical, the first one (and its id) is kept.
pub fn prune(rows: Vec<ReportRow>) -> Vec<ReportRow> {
    let keys: BTreeSet<&String> = rows.iter().flat_map(|r| r.config.keys()).collect();

    let varying: BTreeSet<String> = keys
        .into_iter()
        .filter(|key| {
            let values: BTreeSet<Option<String>> = rows
                .iter()
                .map(|r| r.config.get(*key).map(scalar_repr))
                .collect();
            values.len() > 1
        })
        .cloned()
        .collect();

    let mut pruned: Vec<ReportRow> = Vec::new();
    for mut row in rows {
        row.config.retain(|key, _| varying.contains(key));
        if pruned.iter().any(|kept| kept.same_content(&row)) {
            debug!("Merging duplicate report row {}", row.id);
            continue;
        }
        pruned.push(row);
    }
    pruned
}

/// A rendered table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    /// Missing cells sort after everything else
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Missing, Cell::Missing) => Ordering::Equal,
            (Cell::Missing, _) => Ordering::Greater,
            (_, Cell::Missing) => Ordering::Less,
            (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
        }
    }

    pub fn display(&self, config: &ReportConfig) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format!("{:.*}", config.float_precision, n),
            Cell::Missing => config.missing_value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Stable sort on a header column
    pub fn sort_by(&mut self, column: &str, descending: bool) -> CkptResult<()> {
        let index = self
            .headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| CkptError::UnknownColumn(column.to_string()))?;

        self.rows.sort_by(|a, b| {
            let ordering = a[index].compare(&b[index]);
            match (descending, &a[index], &b[index]) {
                // Missing stays last either way
                (true, Cell::Missing, _) | (true, _, Cell::Missing) => ordering,
                (true, _, _) => ordering.reverse(),
                (false, _, _) => ordering,
            }
        });
        Ok(())
    }
}

/// Build the table: id, name, joined config, then sorted metric columns
pub fn tabulate(rows: &[ReportRow], index: &ShortHashIndex, config: &ReportConfig) -> Table {
    let metric_keys: BTreeSet<&String> = rows
        .iter()
        .flat_map(|r| r.metrics.keys())
        .filter(|k| !config.ignore_metrics.contains(*k))
        .collect();

    let mut headers = vec!["id".to_string(), "name".to_string(), "config".to_string()];
    headers.extend(metric_keys.iter().map(|k| k.to_string()));

    let rows = rows
        .iter()
        .map(|row| {
            let joined = row
                .config
                .iter()
                .filter(|(k, _)| !config.ignore_config.contains(*k))
                .map(|(k, v)| format!("{}={}", k, scalar_repr(v)))
                .collect::<Vec<_>>()
                .join(", ");

            let mut cells = vec![
                Cell::Text(index.short(&row.id).to_string()),
                Cell::Text(row.name.clone()),
                Cell::Text(joined),
            ];
            cells.extend(metric_keys.iter().map(|k| match row.metrics.get(*k) {
                Some(v) => Cell::Number(*v),
                None => Cell::Missing,
            }));
            cells
        })
        .collect();

    Table { headers, rows }
}

/// Which records a report covers and how it is ordered
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    /// Short or full ids; empty selects everything
    pub ids: Vec<String>,
    /// Only records with this name
    pub pipe: Option<String>,
    /// `(flattened key, value)` pairs that must match
    pub config_filters: Vec<(String, String)>,
    pub sort_by: Option<String>,
    pub descending: bool,
}

impl ReportQuery {
    /// Parse a `key:value` filter
    pub fn parse_filter(filter: &str) -> CkptResult<(String, String)> {
        match filter.split_once(':') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CkptError::User(format!(
                "Invalid config filter '{}', expected key:value",
                filter
            ))),
        }
    }

    fn matches(&self, row: &ReportRow) -> bool {
        if let Some(pipe) = &self.pipe {
            if &row.name != pipe {
                return false;
            }
        }
        self.config_filters.iter().all(|(key, expected)| {
            row.config
                .get(key)
                .is_some_and(|value| &scalar_repr(value) == expected)
        })
    }
}

/// Select, score, prune and tabulate stored experiments
pub fn build_report(
    ctx: &Context,
    registry: &MetricRegistry,
    query: &ReportQuery,
) -> CkptResult<Table> {
    let report_config = &ctx.config().report;
    let store = ExperimentStore::new(ctx);
    let stored = store.list()?;
    let index = ShortHashIndex::new(
        stored.iter().map(|s| s.address.clone()),
        report_config.min_short_hash,
    );

    let selected: Vec<&StoredRecord> = if query.ids.is_empty() {
        stored.iter().collect()
    } else {
        let mut wanted = BTreeSet::new();
        for id in &query.ids {
            wanted.insert(index.resolve(id)?.to_string());
        }
        stored.iter().filter(|s| wanted.contains(&s.address)).collect()
    };

    let mut rows = Vec::new();
    for record in selected {
        let row = ReportRow::from_stored(record, registry)?;
        if row.metrics.is_empty() {
            debug!("Nothing to report for {}", row.id);
            continue;
        }
        if query.matches(&row) {
            rows.push(row);
        }
    }

    let mut table = tabulate(&prune(rows), &index, report_config);
    if let Some(column) = &query.sort_by {
        table.sort_by(column, query.descending)?;
    }
    Ok(table)
}
