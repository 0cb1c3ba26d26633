use crate::models::NormalizedTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grouping key: one entity, one named series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub entity: String,
    pub series: String,
}

/// Summary statistics for a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub key: GroupKey,
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

/// Compute grouped statistics by (entity, series), sorted by key.
pub fn grouped_summary(table: &NormalizedTable) -> Vec<Summary> {
    let mut groups: BTreeMap<GroupKey, (Vec<f64>, usize)> = BTreeMap::new();
    for row in &table.rows {
        for (name, v) in table.series.iter().zip(&row.values) {
            let key = GroupKey {
                entity: row.entity.clone(),
                series: name.clone(),
            };
            let slot = groups.entry(key).or_default();
            match v {
                Some(x) if x.is_finite() => slot.0.push(*x),
                _ => slot.1 += 1,
            }
        }
    }

    let mut out = Vec::new();
    for (key, (mut vals, missing)) in groups {
        vals.sort_by(f64::total_cmp);
        let count = vals.len();
        let min = vals.first().cloned();
        let max = vals.last().cloned();
        let mean = if count > 0 {
            Some(vals.iter().copied().sum::<f64>() / count as f64)
        } else {
            None
        };
        let median = if count == 0 {
            None
        } else if count % 2 == 1 {
            Some(vals[count / 2])
        } else {
            Some((vals[count / 2 - 1] + vals[count / 2]) / 2.0)
        };
        out.push(Summary {
            key,
            count,
            missing,
            min,
            max,
            mean,
            median,
        });
    }
    out
}
