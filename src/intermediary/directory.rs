use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::Intermediary;
use super::registry::IntermediarySource;
use crate::swap::SwapDirection;

/// Candidate intermediaries and the blacklist of those that misbehaved.
///
/// The blacklist only grows: a refresh through [`IntermediaryDirectory::init`] never brings a
/// blacklisted URL back for the lifetime of this directory.
pub struct IntermediaryDirectory {
    source: Arc<dyn IntermediarySource>,
    intermediaries: Mutex<Vec<Intermediary>>,
    blacklist: Mutex<HashSet<String>>,
}

impl IntermediaryDirectory {
    pub fn new(source: Arc<dyn IntermediarySource>) -> Self {
        Self {
            source,
            intermediaries: Mutex::new(Vec::new()),
            blacklist: Mutex::new(HashSet::new()),
        }
    }

    /// Fetches the candidate set from the source, replacing the current one. Safe to call
    /// again to force a refresh.
    pub async fn init(&self) -> Result<()> {
        let fetched = self.source.fetch().await?;
        let blacklist = self.blacklist.lock().expect("blacklist mutex poisoned").clone();

        let mut accepted = Vec::with_capacity(fetched.len());
        for lp in fetched {
            if blacklist.contains(lp.key()) {
                tracing::debug!(url = %lp.url, "skipping blacklisted intermediary");
                continue;
            }
            if let Some((direction, svc)) = lp.services.iter().find(|(_, s)| s.min_sats > s.max_sats) {
                tracing::warn!(
                    url = %lp.url,
                    %direction,
                    min_sats = svc.min_sats,
                    max_sats = svc.max_sats,
                    "ignoring intermediary with inverted bounds"
                );
                continue;
            }
            accepted.push(lp);
        }

        tracing::info!(count = accepted.len(), "intermediary directory loaded");
        *self.intermediaries.lock().expect("directory mutex poisoned") = accepted;
        Ok(())
    }

    /// Intermediaries able to serve `direction` for `token`, cheapest first (ties by URL).
    /// `amount_sats` of `None` skips the bounds filter.
    pub fn candidates(
        &self,
        direction: SwapDirection,
        amount_sats: Option<u64>,
        token: &str,
    ) -> Vec<Intermediary> {
        let blacklist = self.blacklist.lock().expect("blacklist mutex poisoned");
        let intermediaries = self.intermediaries.lock().expect("directory mutex poisoned");

        let mut out: Vec<(u64, Intermediary)> = intermediaries
            .iter()
            .filter(|lp| !blacklist.contains(lp.key()) && lp.supports_token(token))
            .filter_map(|lp| {
                let svc = lp.service(direction)?;
                let fee = match amount_sats {
                    Some(amount) if !svc.bounds().contains(amount) => return None,
                    Some(amount) => svc.fee.fee_for(amount),
                    None => svc.fee.fee_for(svc.min_sats),
                };
                Some((fee, lp.clone()))
            })
            .collect();

        out.sort_by(|(fa, a), (fb, b)| fa.cmp(fb).then_with(|| a.url.cmp(&b.url)));
        out.into_iter().map(|(_, lp)| lp).collect()
    }

    /// Blacklists `candidate`. Returns `false` if it already was.
    pub fn remove_intermediary(&self, candidate: &Intermediary) -> bool {
        let key = candidate.key().to_string();
        let inserted = self
            .blacklist
            .lock()
            .expect("blacklist mutex poisoned")
            .insert(key.clone());
        self.intermediaries
            .lock()
            .expect("directory mutex poisoned")
            .retain(|lp| lp.key() != key);
        if inserted {
            tracing::warn!(url = %candidate.url, "intermediary blacklisted");
        }
        inserted
    }

    pub fn is_blacklisted(&self, url: &str) -> bool {
        self.blacklist
            .lock()
            .expect("blacklist mutex poisoned")
            .contains(url.trim_end_matches('/'))
    }

    pub fn len(&self) -> usize {
        self.intermediaries.lock().expect("directory mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest minimum any known intermediary advertises for `direction`.
    pub fn swap_minimum(&self, direction: SwapDirection) -> Option<u64> {
        self.intermediaries
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .filter_map(|lp| lp.service(direction).map(|s| s.min_sats))
            .min()
    }

    /// Largest maximum any known intermediary advertises for `direction`.
    pub fn swap_maximum(&self, direction: SwapDirection) -> Option<u64> {
        self.intermediaries
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .filter_map(|lp| lp.service(direction).map(|s| s.max_sats))
            .max()
    }
}
