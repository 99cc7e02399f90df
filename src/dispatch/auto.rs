//! Auto mode: try provider/model candidates in priority order.

use super::direct::DirectDispatcher;
use super::TextStream;
use crate::catalog::{ordered_candidates, Candidate, Catalog};
use crate::client::error_classification::classify;
use crate::error_code::ErrorCategory;
use crate::types::{AutoFallbackInfo, ChatRequest, ChatResponse};
use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Whether a failed candidate may be skipped in favour of the next one.
///
/// A structural request error reproduces identically on every provider, so it propagates.
pub fn can_fall_back(error: &Error) -> bool {
    if error.is_cancelled() {
        return false;
    }
    let c = classify(error);
    c.is_retryable || c.category != ErrorCategory::InvalidRequest
}

#[derive(Clone)]
pub struct AutoFallbackDispatcher {
    direct: DirectDispatcher,
    catalog: Arc<dyn Catalog>,
}

impl AutoFallbackDispatcher {
    pub fn new(direct: DirectDispatcher, catalog: Arc<dyn Catalog>) -> Self {
        Self { direct, catalog }
    }

    /// Ordered candidates, limited to registered providers and optionally to one model name.
    pub async fn candidates(&self, model: Option<&str>) -> Result<Vec<Candidate>> {
        let all = ordered_candidates(self.catalog.as_ref()).await?;
        Ok(all
            .into_iter()
            .filter(|c| {
                let registered = self.direct.registry().contains(&c.provider);
                if !registered {
                    warn!(provider = c.provider.as_str(), "skipping provider without adapter");
                }
                registered
            })
            .filter(|c| model.map_or(true, |m| c.model == m))
            .collect())
    }

    pub async fn dispatch(&self, request: &ChatRequest, model: Option<&str>) -> Result<ChatResponse> {
        let candidates = self.candidates(model).await?;
        let (mut response, winner) = self
            .try_candidates(&candidates, |c| self.direct.dispatch(&c.provider, &c.model, request))
            .await?;

        if winner > 0 {
            let original = &candidates[0];
            let last = &candidates[winner];
            response.auto_fallback = Some(AutoFallbackInfo {
                original_provider: original.provider.clone(),
                original_model: original.model.clone(),
                final_provider: last.provider.clone(),
                final_model: last.model.clone(),
                fallback_count: winner as u32,
            });
        }
        Ok(response)
    }

    pub async fn dispatch_stream(&self, request: &ChatRequest, model: Option<&str>) -> Result<TextStream> {
        let candidates = self.candidates(model).await?;
        let (stream, _winner) = self
            .try_candidates(&candidates, |c| {
                self.direct.dispatch_stream(&c.provider, &c.model, request)
            })
            .await?;
        Ok(stream)
    }

    /// Returns the first success and the index of the candidate that produced it.
    async fn try_candidates<'a, T, F, Fut>(
        &self,
        candidates: &'a [Candidate],
        call: F,
    ) -> Result<(T, usize)>
    where
        F: Fn(&'a Candidate) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if candidates.is_empty() {
            return Err(Error::NoCandidates);
        }

        let mut attempted = Vec::with_capacity(candidates.len());
        let mut last_err: Option<Error> = None;

        for (idx, candidate) in candidates.iter().enumerate() {
            attempted.push(candidate.token());
            match call(candidate).await {
                Ok(value) => {
                    if idx > 0 {
                        info!(
                            original = candidates[0].token().as_str(),
                            selected = candidate.token().as_str(),
                            fallback_count = idx,
                            "auto fallback succeeded"
                        );
                    }
                    return Ok((value, idx));
                }
                Err(e) if !can_fall_back(&e) => return Err(e),
                Err(e) => {
                    warn!(
                        candidate = candidate.token().as_str(),
                        category = %classify(&e).category,
                        error = %e,
                        "candidate failed, falling back"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(Error::AllCandidatesFailed {
            attempted,
            source: Box::new(last_err.unwrap_or(Error::NoCandidates)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_rules() {
        assert!(can_fall_back(&Error::provider("a", Some(503), "down")));
        assert!(can_fall_back(&Error::provider("a", Some(401), "nope")));
        assert!(can_fall_back(&Error::NoEligibleKeys { provider: "a".into() }));
        assert!(!can_fall_back(&Error::provider("a", Some(400), "bad request")));
        assert!(!can_fall_back(&Error::Cancelled));
    }
}
