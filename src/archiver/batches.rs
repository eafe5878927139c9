//! One category batch: fetch, persist, patch.

use super::{ASSETS_DIR, Archiver};
use crate::error::{Error, Result};
use crate::extraction::{AssetPlan, AssetReference, PatchTarget};
use crate::fetcher::{FetchOptions, Relay};
use crate::types::{AssetKind, AssetOutcome, AssetRecord, Event};
use crate::utils::{extension_for_content_type, unique_asset_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Batches run strictly in this order; later batches see earlier patches applied
pub(crate) const BATCH_ORDER: [AssetKind; 4] = [
    AssetKind::Background,
    AssetKind::Image,
    AssetKind::Audio,
    AssetKind::Video,
];

/// Move the references of one batch out of the plan
pub(crate) fn take_batch(plan: &mut AssetPlan, batch: AssetKind) -> Vec<AssetReference> {
    match batch {
        AssetKind::Background => std::mem::take(&mut plan.backgrounds),
        AssetKind::Image => std::mem::take(&mut plan.images),
        AssetKind::Audio => std::mem::take(&mut plan.audio),
        AssetKind::Video => std::mem::take(&mut plan.video),
        AssetKind::Card => Vec::new(),
    }
}

/// Write `local` into the reference's patch target
pub(crate) fn apply_patch(plan: &AssetPlan, reference: &AssetReference, local: &str) -> Result<()> {
    let not_found = || Error::PatchTargetNotFound {
        kind: reference.kind.to_string(),
        url: reference.url.clone(),
    };
    match &reference.target {
        PatchTarget::Attribute { element, name } => {
            if element.node().parent().is_none() {
                return Err(not_found());
            }
            element.set_attr(name, local);
        }
        PatchTarget::Widget { widget, name } => {
            plan.widget(*widget).ok_or_else(not_found)?.set_attr(name, local);
        }
        PatchTarget::StyleText => {
            if plan.rewrite_backgrounds(&reference.url, local) == 0 {
                return Err(not_found());
            }
        }
    }
    Ok(())
}

impl Archiver {
    /// Run one batch through the pool; every reference ends Saved or Skipped
    pub(crate) async fn run_batch(
        &self,
        batch: AssetKind,
        references: Vec<AssetReference>,
        plan: &AssetPlan,
        assets_dir: &Path,
    ) -> Vec<AssetRecord> {
        if references.is_empty() {
            return Vec::new();
        }

        let failures: RefCell<HashMap<usize, String>> = RefCell::new(HashMap::new());
        let items: Vec<(usize, AssetReference)> = references.iter().cloned().enumerate().collect();

        let results = self
            .pool
            .downloads(batch.as_str(), items, |(index, reference), relay| {
                let failures = &failures;
                async move {
                    let saved = self.save_asset(&reference, relay, plan, assets_dir).await;
                    if let Err(e) = &saved {
                        failures.borrow_mut().insert(index, e.to_string());
                    }
                    saved
                }
            })
            .await;

        let mut failures = failures.into_inner();
        let records: Vec<AssetRecord> = references
            .into_iter()
            .zip(results)
            .enumerate()
            .map(|(index, (reference, result))| {
                let outcome = match result {
                    Some(path) => AssetOutcome::Saved { path },
                    None => {
                        let reason = failures
                            .remove(&index)
                            .unwrap_or_else(|| "download failed".to_string());
                        self.emit_event(Event::AssetSkipped {
                            kind: reference.kind,
                            url: reference.url.clone(),
                            reason: reason.clone(),
                        });
                        AssetOutcome::Skipped { reason }
                    }
                };
                AssetRecord {
                    kind: reference.kind,
                    url: reference.url,
                    outcome,
                }
            })
            .collect();

        let saved = records.iter().filter(|r| r.is_saved()).count();
        self.emit_event(Event::BatchComplete {
            kind: batch,
            saved,
            skipped: records.len() - saved,
        });
        records
    }

    /// Fetch one asset, write it under the assets directory and patch the document
    async fn save_asset(
        &self,
        reference: &AssetReference,
        relay: Option<Relay>,
        plan: &AssetPlan,
        assets_dir: &Path,
    ) -> Result<String> {
        let options = FetchOptions {
            credentialed: false,
            timeout: self.config.fetch.asset_timeout,
        };
        let fetched = self
            .fetcher
            .fetch(&reference.fetch_url(), relay.as_ref(), options)
            .await?;

        let extension = extension_for_content_type(fetched.content_type.as_deref());
        let file_name = unique_asset_name(extension);
        tokio::fs::write(assets_dir.join(&file_name), &fetched.body).await?;

        let local = format!("./{ASSETS_DIR}/{file_name}");
        apply_patch(plan, reference, &local)?;

        tracing::debug!(
            kind = %reference.kind,
            url = %reference.url,
            path = %local,
            bytes = fetched.body.len(),
            "asset saved"
        );
        self.emit_event(Event::AssetSaved {
            kind: reference.kind,
            url: reference.url.clone(),
            path: local.clone(),
        });
        Ok(local)
    }
}
