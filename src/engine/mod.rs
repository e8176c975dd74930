//! Transaction engine: the check-out/check-in ledger core.
//!
//! A tool has two states, `Available` and `CheckedOut`. Check-out and
//! check-in flip the state and the holder's `assignedToolIds` together inside
//! one version-conditioned store transaction, so concurrent attempts on the
//! same tool are serialized by the store and only one can win. The ledger
//! append that follows is best-effort and handled by [`LedgerWriter`].

mod ledger;

pub use ledger::LedgerWriter;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::cache::IdCache;
use crate::errors::AppError;
use crate::models::{
    batch_id, entry_id, from_doc, BatchOutcome, LedgerEntry, Staff, Tool, ToolStatus,
    ToolStatusInfo, TxnAction,
};
use crate::store::{collections, DocumentStore, TxnWrite};

/// Optional context carried by every transaction.
#[derive(Debug, Clone, Default)]
pub struct TxnOptions {
    pub notes: Option<String>,
    pub admin_name: Option<String>,
    pub batch_id: Option<String>,
}

pub struct TransactionEngine {
    store: Arc<dyn DocumentStore>,
    cache: Arc<IdCache>,
    writer: LedgerWriter,
}

impl TransactionEngine {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<IdCache>) -> Self {
        let writer = LedgerWriter::new(store.clone());
        Self {
            store,
            cache,
            writer,
        }
    }

    /// Check a tool out to a staff member.
    ///
    /// Fails with `NotFound` if either readable id is unresolvable, with
    /// `AlreadyCheckedOut` if the tool is held, and with `Conflict` if the
    /// atomic update loses a race (not retried; the caller re-issues the scan).
    pub async fn check_out(
        &self,
        tool_id: &str,
        job_code: &str,
        opts: &TxnOptions,
    ) -> Result<LedgerEntry, AppError> {
        let tool_ref = self
            .cache
            .tool_internal_id(tool_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tool {} not found", tool_id)))?;
        let staff_ref = self
            .cache
            .staff_internal_id(job_code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", job_code)))?;

        let tool_doc = self
            .store
            .get(collections::TOOLS, &tool_ref)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tool {} not found", tool_id)))?;
        let tool: Tool = from_doc(&tool_doc)?;
        if tool.status == ToolStatus::CheckedOut {
            return Err(AppError::AlreadyCheckedOut {
                tool_id: tool_id.to_string(),
                holder: tool.last_assigned_to.clone(),
            });
        }

        let staff_doc = self
            .store
            .get(collections::STAFF, &staff_ref)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", job_code)))?;
        let staff: Staff = from_doc(&staff_doc)?;

        let now = Utc::now();

        let mut tool_fields = Map::new();
        tool_fields.insert(
            "status".to_string(),
            serde_json::to_value(ToolStatus::CheckedOut)?,
        );
        tool_fields.insert(
            "currentHolder".to_string(),
            Value::String(staff_ref.clone()),
        );
        tool_fields.insert(
            "lastAssignedTo".to_string(),
            Value::String(staff.display_name.clone()),
        );
        tool_fields.insert(
            "lastAssignedBy".to_string(),
            opts.admin_name
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        tool_fields.insert(
            "lastAssignedAt".to_string(),
            Value::String(now.to_rfc3339()),
        );

        let mut assigned = staff.assigned_tool_ids.clone();
        if !assigned.iter().any(|t| t == tool_id) {
            assigned.push(tool_id.to_string());
        }
        let mut staff_fields = Map::new();
        staff_fields.insert("assignedToolIds".to_string(), serde_json::to_value(assigned)?);

        self.store
            .run_transaction(vec![
                TxnWrite::new(collections::TOOLS, &tool_ref, tool_fields)
                    .expecting(tool_doc.version),
                TxnWrite::new(collections::STAFF, &staff_ref, staff_fields)
                    .expecting(staff_doc.version),
            ])
            .await?;

        let entry = LedgerEntry {
            id: entry_id(now),
            action: TxnAction::Checkout,
            tool_ref,
            tool_id: tool_id.to_string(),
            staff_ref: Some(staff_ref.clone()),
            job_code: Some(staff.job_code.clone()),
            staff_name: Some(staff.display_name.clone()),
            admin_name: opts.admin_name.clone(),
            batch_id: opts.batch_id.clone(),
            notes: opts.notes.clone(),
            tool_name: tool.name.clone(),
            brand: tool.brand.clone(),
            model: tool.model.clone(),
            timestamp: now,
        };
        self.writer.record(&entry).await;
        Ok(entry)
    }

    /// Check a tool back in.
    ///
    /// Fails with `NotFound` if the tool id is unresolvable and with
    /// `AlreadyAvailable` if the tool is not held. A missing or unresolvable
    /// previous holder is tolerated and recorded as "Unknown".
    pub async fn check_in(&self, tool_id: &str, opts: &TxnOptions) -> Result<LedgerEntry, AppError> {
        let tool_ref = self
            .cache
            .tool_internal_id(tool_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tool {} not found", tool_id)))?;
        let tool_doc = self
            .store
            .get(collections::TOOLS, &tool_ref)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tool {} not found", tool_id)))?;
        let tool: Tool = from_doc(&tool_doc)?;
        if tool.status == ToolStatus::Available {
            return Err(AppError::AlreadyAvailable {
                tool_id: tool_id.to_string(),
            });
        }

        let now = Utc::now();
        let mut writes = Vec::new();

        let mut tool_fields = Map::new();
        tool_fields.insert(
            "status".to_string(),
            serde_json::to_value(ToolStatus::Available)?,
        );
        tool_fields.insert("currentHolder".to_string(), Value::Null);
        tool_fields.insert(
            "lastCheckinBy".to_string(),
            opts.admin_name
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        tool_fields.insert("lastCheckinAt".to_string(), Value::String(now.to_rfc3339()));
        writes.push(
            TxnWrite::new(collections::TOOLS, &tool_ref, tool_fields).expecting(tool_doc.version),
        );

        // Resolve the previous holder for denormalization and to keep the
        // assignedToolIds mirror in sync within the same transaction.
        let mut staff_ref = None;
        let mut job_code = None;
        let mut staff_name = "Unknown".to_string();
        if let Some(holder_ref) = tool.current_holder.as_deref() {
            match self.store.get(collections::STAFF, holder_ref).await? {
                Some(staff_doc) => {
                    let staff: Staff = from_doc(&staff_doc)?;
                    let remaining: Vec<String> = staff
                        .assigned_tool_ids
                        .iter()
                        .filter(|t| t.as_str() != tool_id)
                        .cloned()
                        .collect();
                    let mut staff_fields = Map::new();
                    staff_fields
                        .insert("assignedToolIds".to_string(), serde_json::to_value(remaining)?);
                    writes.push(
                        TxnWrite::new(collections::STAFF, holder_ref, staff_fields)
                            .expecting(staff_doc.version),
                    );
                    staff_ref = Some(holder_ref.to_string());
                    job_code = Some(staff.job_code.clone());
                    staff_name = staff.display_name.clone();
                }
                None => {
                    tracing::warn!(
                        "Tool {} holder {} has no staff document; recording as Unknown",
                        tool_id,
                        holder_ref
                    );
                }
            }
        } else {
            tracing::warn!("Tool {} is checked out with no holder reference", tool_id);
        }

        self.store.run_transaction(writes).await?;

        let entry = LedgerEntry {
            id: entry_id(now),
            action: TxnAction::Checkin,
            tool_ref,
            tool_id: tool_id.to_string(),
            staff_ref,
            job_code,
            staff_name: Some(staff_name),
            admin_name: opts.admin_name.clone(),
            batch_id: opts.batch_id.clone(),
            notes: opts.notes.clone(),
            tool_name: tool.name.clone(),
            brand: tool.brand.clone(),
            model: tool.model.clone(),
            timestamp: now,
        };
        self.writer.record(&entry).await;
        Ok(entry)
    }

    /// Check several tools out to one staff member under a shared batch id.
    ///
    /// Items run sequentially with per-item error isolation; the batch as a
    /// whole is not atomic and partial success is reported, not rolled back.
    pub async fn batch_check_out(
        &self,
        tool_ids: &[String],
        job_code: &str,
        opts: &TxnOptions,
    ) -> BatchOutcome {
        let shared = opts
            .batch_id
            .clone()
            .unwrap_or_else(|| batch_id(Utc::now()));
        let item_opts = batch_item_opts(opts, &shared);

        let mut results = BTreeMap::new();
        let mut errors = Vec::new();
        for tool_id in tool_ids {
            match self.check_out(tool_id, job_code, &item_opts).await {
                Ok(_) => {
                    results.insert(tool_id.clone(), true);
                }
                Err(e) => {
                    results.insert(tool_id.clone(), false);
                    errors.push(format!("{}: {}", tool_id, e.message()));
                }
            }
        }
        outcome(shared, results, errors)
    }

    /// Check several tools back in under a shared batch id.
    pub async fn batch_check_in(&self, tool_ids: &[String], opts: &TxnOptions) -> BatchOutcome {
        let shared = opts
            .batch_id
            .clone()
            .unwrap_or_else(|| batch_id(Utc::now()));
        let item_opts = batch_item_opts(opts, &shared);

        let mut results = BTreeMap::new();
        let mut errors = Vec::new();
        for tool_id in tool_ids {
            match self.check_in(tool_id, &item_opts).await {
                Ok(_) => {
                    results.insert(tool_id.clone(), true);
                }
                Err(e) => {
                    results.insert(tool_id.clone(), false);
                    errors.push(format!("{}: {}", tool_id, e.message()));
                }
            }
        }
        outcome(shared, results, errors)
    }

    /// Status view of a tool for the scanning screens.
    pub async fn tool_status_info(&self, tool_id: &str) -> Result<ToolStatusInfo, AppError> {
        let tool_ref = self
            .cache
            .tool_internal_id(tool_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tool {} not found", tool_id)))?;
        let tool_doc = self
            .store
            .get(collections::TOOLS, &tool_ref)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tool {} not found", tool_id)))?;
        let tool: Tool = from_doc(&tool_doc)?;

        let assigned_staff = match tool.current_holder.as_deref() {
            Some(holder_ref) => self
                .store
                .get(collections::STAFF, holder_ref)
                .await?
                .map(|doc| from_doc::<Staff>(&doc))
                .transpose()?,
            None => None,
        };

        let can_check_out = tool.status == ToolStatus::Available;
        Ok(ToolStatusInfo {
            can_check_out,
            can_check_in: !can_check_out,
            tool,
            assigned_staff,
        })
    }
}

/// Per-item options for a batch: the shared correlation id goes on the entry
/// and into the notes text, so the batch stays visible in plain history views.
fn batch_item_opts(opts: &TxnOptions, shared: &str) -> TxnOptions {
    let notes = Some(match opts.notes.as_deref() {
        Some(notes) => format!("{} ({})", notes, shared),
        None => shared.to_string(),
    });
    TxnOptions {
        batch_id: Some(shared.to_string()),
        notes,
        ..opts.clone()
    }
}

fn outcome(
    batch_id: String,
    results: BTreeMap<String, bool>,
    errors: Vec<String>,
) -> BatchOutcome {
    let succeeded = results.values().filter(|ok| **ok).count();
    let failed = results.len() - succeeded;
    BatchOutcome {
        batch_id,
        results,
        succeeded,
        failed,
        errors,
    }
}
