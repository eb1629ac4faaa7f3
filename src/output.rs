//! Channel selection and labeled result tables

use crate::error::{EffectError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Which model output channels end up in the result tables
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelSelection {
    /// Every output channel
    #[default]
    All,
    /// Explicit indices, kept in the given order
    Indices(Vec<usize>),
    /// Every channel whose label is in the set, in label order
    Names(Vec<String>),
}

impl ChannelSelection {
    /// Build from the optional mask / name filters of a request
    ///
    /// # Errors
    /// `InvalidArgument` when both filters are given.
    pub fn from_options(mask: Option<Vec<usize>>, names: Option<Vec<String>>) -> Result<Self> {
        match (mask, names) {
            (Some(_), Some(_)) => Err(EffectError::invalid(
                "channel mask and wanted channel names are mutually exclusive",
            )),
            (Some(mask), None) => Ok(Self::Indices(mask)),
            (None, Some(names)) => Ok(Self::Names(names)),
            (None, None) => Ok(Self::All),
        }
    }

    /// Resolve to indices into `labels`
    pub fn resolve(&self, labels: &[String]) -> Result<Vec<usize>> {
        match self {
            Self::All => Ok((0..labels.len()).collect()),
            Self::Indices(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= labels.len()) {
                    return Err(EffectError::invalid(format!(
                        "channel index {} out of range for {} labels",
                        bad,
                        labels.len()
                    )));
                }
                Ok(indices.clone())
            }
            Self::Names(wanted) => {
                let known: HashSet<&str> = labels.iter().map(String::as_str).collect();
                let unknown: Vec<&str> = wanted
                    .iter()
                    .map(String::as_str)
                    .filter(|name| !known.contains(name))
                    .collect();
                if !unknown.is_empty() {
                    return Err(EffectError::invalid(format!(
                        "unknown channel names: {}",
                        unknown.join(", ")
                    )));
                }

                let wanted: HashSet<&str> = wanted.iter().map(String::as_str).collect();
                let indices: Vec<usize> = labels
                    .iter()
                    .enumerate()
                    .filter(|(_, label)| wanted.contains(label.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                if indices.is_empty() {
                    return Err(EffectError::invalid("channel name filter selects nothing"));
                }
                Ok(indices)
            }
        }
    }
}

/// One statistic: rows are variants, columns are the selected channels
#[derive(Debug, Clone, PartialEq)]
pub struct EffectTable {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl EffectTable {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(EffectError::shape(
                "table columns",
                &[values.ncols()],
                &[columns.len()],
            ));
        }
        Ok(Self { columns, values })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.values.get((row, col)).copied()
    }

    pub fn column(&self, column: &str) -> Option<ArrayView1<'_, f64>> {
        let col = self.columns.iter().position(|c| c == column)?;
        Some(self.values.index_axis(Axis(1), col))
    }
}

/// Result tables of one estimate run
#[derive(Debug, Clone, PartialEq)]
pub struct EffectReport {
    pub pv: EffectTable,
    pub ref_mean: EffectTable,
    pub alt_mean: EffectTable,
    pub ref_var: EffectTable,
    pub alt_var: EffectTable,
    pub cvar: EffectTable,
    pub diff: EffectTable,
}

impl EffectReport {
    pub const STATISTICS: [&'static str; 7] = [
        "pv", "ref_mean", "alt_mean", "ref_var", "alt_var", "cvar", "diff",
    ];

    /// Tables keyed `"{prefix}_{statistic}"`
    pub fn into_named(self, prefix: &str) -> BTreeMap<String, EffectTable> {
        let tables = [
            self.pv,
            self.ref_mean,
            self.alt_mean,
            self.ref_var,
            self.alt_var,
            self.cvar,
            self.diff,
        ];
        Self::STATISTICS
            .iter()
            .zip(tables)
            .map(|(stat, table)| (format!("{}_{}", prefix, stat), table))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn labels() -> Vec<String> {
        ["DNase", "H3K4me3", "CTCF"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_selects_every_label() {
        assert_eq!(ChannelSelection::All.resolve(&labels()).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_indices_keep_given_order() {
        let selection = ChannelSelection::Indices(vec![2, 0]);
        assert_eq!(selection.resolve(&labels()).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_indices_out_of_range() {
        let err = ChannelSelection::Indices(vec![3]).resolve(&labels()).unwrap_err();
        assert!(matches!(err, EffectError::InvalidArgument(_)));
    }

    #[test]
    fn test_names_follow_label_order() {
        let selection = ChannelSelection::Names(names(&["CTCF", "DNase"]));
        assert_eq!(selection.resolve(&labels()).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_unknown_name_rejected() {
        let selection = ChannelSelection::Names(names(&["CTCF", "POLR2A"]));
        let err = selection.resolve(&labels()).unwrap_err();
        assert!(err.to_string().contains("POLR2A"));
    }

    #[test]
    fn test_empty_name_filter_rejected() {
        let selection = ChannelSelection::Names(Vec::new());
        assert!(selection.resolve(&labels()).is_err());
    }

    #[test]
    fn test_from_options() {
        assert_eq!(
            ChannelSelection::from_options(None, None).unwrap(),
            ChannelSelection::All
        );
        assert_eq!(
            ChannelSelection::from_options(Some(vec![1]), None).unwrap(),
            ChannelSelection::Indices(vec![1])
        );
        assert!(ChannelSelection::from_options(Some(vec![0]), Some(names(&["CTCF"]))).is_err());
    }

    #[test]
    fn test_table_lookup() {
        let table = EffectTable::new(names(&["a", "b"]), arr2(&[[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(table.nrows(), 2);
        assert_eq!(table.ncols(), 2);
        assert_eq!(table.get(1, "b"), Some(4.0));
        assert_eq!(table.get(2, "b"), None);
        assert_eq!(table.get(0, "c"), None);
        assert_eq!(table.column("a").unwrap().to_vec(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_table_rejects_label_count_mismatch() {
        assert!(EffectTable::new(names(&["a"]), arr2(&[[1.0, 2.0]])).is_err());
    }

    #[test]
    fn test_into_named_keys() {
        let table = EffectTable::new(names(&["a"]), arr2(&[[0.5]])).unwrap();
        let report = EffectReport {
            pv: table.clone(),
            ref_mean: table.clone(),
            alt_mean: table.clone(),
            ref_var: table.clone(),
            alt_var: table.clone(),
            cvar: table.clone(),
            diff: table,
        };
        let named = report.into_named("do");
        let keys: Vec<&str> = named.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["do_alt_mean", "do_alt_var", "do_cvar", "do_diff", "do_pv", "do_ref_mean", "do_ref_var"]
        );
    }
}
