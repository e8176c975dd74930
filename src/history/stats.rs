//! Statistics over history query results.
//!
//! Pure functions; aggregates are recomputed from a query result on every
//! request and never persisted.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Consumable, LedgerEntry, TxnAction};

/// Activity counts over a set of ledger entries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total: usize,
    pub checkouts: usize,
    pub checkins: usize,
    pub most_active: Vec<StaffActivity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffActivity {
    pub job_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_name: Option<String>,
    pub count: usize,
}

/// Count entries by action and rank staff by activity, most active first.
pub fn activity_stats(entries: &[LedgerEntry]) -> ActivityStats {
    let checkouts = entries
        .iter()
        .filter(|e| e.action == TxnAction::Checkout)
        .count();

    let mut by_staff: BTreeMap<&str, (Option<&str>, usize)> = BTreeMap::new();
    for entry in entries {
        if let Some(job_code) = entry.job_code.as_deref() {
            let slot = by_staff.entry(job_code).or_insert((None, 0));
            slot.0 = slot.0.or(entry.staff_name.as_deref());
            slot.1 += 1;
        }
    }

    let mut most_active: Vec<StaffActivity> = by_staff
        .into_iter()
        .map(|(job_code, (name, count))| StaffActivity {
            job_code: job_code.to_string(),
            staff_name: name.map(str::to_string),
            count,
        })
        .collect();
    most_active.sort_by(|a, b| b.count.cmp(&a.count).then(a.job_code.cmp(&b.job_code)));

    ActivityStats {
        total: entries.len(),
        checkouts,
        checkins: entries.len() - checkouts,
        most_active,
    }
}

/// Stock report over consumables against their configured thresholds.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReport {
    pub total: usize,
    pub low_stock: Vec<Consumable>,
    pub out_of_stock: Vec<Consumable>,
}

pub fn stock_report(consumables: &[Consumable]) -> StockReport {
    StockReport {
        total: consumables.len(),
        low_stock: consumables
            .iter()
            .filter(|c| c.is_low_stock())
            .cloned()
            .collect(),
        out_of_stock: consumables
            .iter()
            .filter(|c| c.is_out_of_stock())
            .cloned()
            .collect(),
    }
}
