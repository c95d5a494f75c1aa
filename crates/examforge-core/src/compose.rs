//! Question-pool composition.
//!
//! Assembles the session's question list once at session start: quota
//! split between the base and supplemental pools, concurrent fan-out with
//! per-source failure isolation, two-pass deduplication, a single top-up
//! fetch for shortfalls, and an unbiased shuffle. The output is ordered
//! and final; the session persists it so a reload reconstructs the
//! identical set without re-fetching.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use rand::seq::SliceRandom;

use crate::error::ComposeError;
use crate::model::{CorrectAnswer, DifficultyBand, Question, TypeFilter};
use crate::traits::{PoolQuery, QuestionSource};

/// Requested configuration for one composed set.
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub event: String,
    /// Total question count N.
    pub count: usize,
    pub type_filter: TypeFilter,
    pub difficulty: Vec<DifficultyBand>,
    pub subtopics: Vec<String>,
    /// Supplemental identification percentage P, clamped to [0, 100].
    /// Only meaningful for events with a supplemental pool.
    pub id_percentage: u8,
}

impl ComposeRequest {
    pub fn new(event: impl Into<String>, count: usize) -> Self {
        ComposeRequest {
            event: event.into(),
            count,
            type_filter: TypeFilter::Any,
            difficulty: Vec::new(),
            subtopics: Vec::new(),
            id_percentage: 0,
        }
    }
}

/// Which events carry a supplemental identification pool, and which are
/// composite events whose base fetch rotates across fixed sub-events.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    id_events: HashSet<String>,
    composites: Vec<(String, Vec<String>)>,
}

impl EventCatalog {
    pub fn new(
        id_events: impl IntoIterator<Item = String>,
        composites: Vec<(String, Vec<String>)>,
    ) -> Self {
        EventCatalog {
            id_events: id_events.into_iter().collect(),
            composites,
        }
    }

    /// The standard catalog used in production.
    pub fn standard() -> Self {
        let id_events = [
            "Rocks and Minerals",
            "Entomology",
            "Anatomy & Physiology",
            "Dynamic Planet",
            "Water Quality",
            "Remote Sensing",
            "Circuit Lab",
            "Astronomy",
            "Designer Genes",
            "Forensics",
            "Meteorology",
            "Potions and Poisons",
            "Solar System",
        ]
        .into_iter()
        .map(String::from);

        let composites = vec![(
            "Anatomy & Physiology".to_string(),
            vec![
                "Anatomy - Endocrine".to_string(),
                "Anatomy - Nervous".to_string(),
                "Anatomy - Sense Organs".to_string(),
            ],
        )];

        EventCatalog::new(id_events, composites)
    }

    /// Does this event have a supplemental identification pool?
    /// Composite sub-event names ("Anatomy - Sense Organs") match on
    /// their base name.
    pub fn supports_id(&self, event: &str) -> bool {
        if self.id_events.contains(event) {
            return true;
        }
        let base = event.split(" - ").next().unwrap_or("");
        if base == "Anatomy" {
            return self.id_events.contains("Anatomy & Physiology");
        }
        self.id_events.contains(base)
    }

    /// Sub-events for a composite event, if any.
    pub fn sub_events(&self, event: &str) -> Option<&[String]> {
        self.composites
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, subs)| subs.as_slice())
    }
}

/// Assembles question sets from a base pool and an optional supplemental
/// identification pool.
pub struct PoolComposer {
    base: Arc<dyn QuestionSource>,
    supplemental: Option<Arc<dyn QuestionSource>>,
    catalog: EventCatalog,
}

impl PoolComposer {
    pub fn new(
        base: Arc<dyn QuestionSource>,
        supplemental: Option<Arc<dyn QuestionSource>>,
        catalog: EventCatalog,
    ) -> Self {
        PoolComposer {
            base,
            supplemental,
            catalog,
        }
    }

    /// Compose the ordered, final question list for one session.
    pub async fn compose(&self, request: &ComposeRequest) -> Result<Vec<Question>, ComposeError> {
        let total = request.count;
        let supports_id =
            self.supplemental.is_some() && self.catalog.supports_id(&request.event);
        let id_pct = request.id_percentage.min(100) as f64;
        let id_count = if supports_id {
            ((id_pct / 100.0) * total as f64).round() as usize
        } else {
            0
        };
        let base_count = total.saturating_sub(id_count);

        tracing::debug!(
            event = %request.event,
            total,
            id_count,
            base_count,
            "composing question set"
        );

        // Fan out every sub-fetch concurrently and gate on all of them;
        // a failed or empty source degrades to an empty set.
        let mut fetches = Vec::new();
        if base_count > 0 {
            match self.catalog.sub_events(&request.event) {
                Some(subs) => {
                    for (sub, share) in even_shares(base_count, subs.len()) {
                        let query = self.base_query(request, &subs[sub], share);
                        fetches.push(self.isolated_fetch(self.base.clone(), query));
                    }
                }
                None => {
                    let query = self.base_query(request, &request.event, base_count);
                    fetches.push(self.isolated_fetch(self.base.clone(), query));
                }
            }
        }
        if id_count > 0 {
            if let Some(supplemental) = &self.supplemental {
                let query = self.base_query(request, &request.event, id_count);
                fetches.push(self.isolated_fetch(supplemental.clone(), query));
            }
        }

        let mut pool: Vec<Question> = join_all(fetches).await.into_iter().flatten().collect();
        pool = dedupe(pool);

        // Exactly one top-up against the base pool for any shortfall;
        // partial fulfillment is accepted silently.
        if pool.len() < total && base_count > 0 {
            let need = total - pool.len();
            let query = self.base_query(request, &request.event, need);
            let extras = self.isolated_fetch(self.base.clone(), query).await;
            pool.extend(extras);
            pool = dedupe(pool);
        }

        if pool.is_empty() {
            return Err(ComposeError::Exhausted {
                event: request.event.clone(),
            });
        }

        Ok(finalize(pool, total))
    }

    fn base_query(&self, request: &ComposeRequest, event: &str, limit: usize) -> PoolQuery {
        PoolQuery {
            event: event.to_string(),
            limit,
            type_filter: request.type_filter,
            difficulty: DifficultyBand::envelope(&request.difficulty),
            subtopics: request.subtopics.clone(),
        }
    }

    /// Run one sub-fetch, degrading any failure to an empty set.
    async fn isolated_fetch(
        &self,
        source: Arc<dyn QuestionSource>,
        query: PoolQuery,
    ) -> Vec<Question> {
        match source.fetch(&query).await {
            Ok(questions) => query.type_filter.retain(questions),
            Err(e) => {
                tracing::warn!(
                    source = source.name(),
                    event = %query.event,
                    error = %e,
                    "source degraded to empty set"
                );
                Vec::new()
            }
        }
    }
}

/// Even share split: `count` divided across `parts`, remainder to the
/// first parts. Yields `(part_index, share)` for non-zero shares.
fn even_shares(count: usize, parts: usize) -> Vec<(usize, usize)> {
    if parts == 0 {
        return Vec::new();
    }
    let base = count / parts;
    let remainder = count % parts;
    (0..parts)
        .map(|i| (i, base + usize::from(i < remainder)))
        .filter(|(_, share)| *share > 0)
        .collect()
}

/// Two-pass deduplication: by stable id, then by normalized prompt text.
/// The second pass guards against the same content arriving from two
/// different source pools.
fn dedupe(questions: Vec<Question>) -> Vec<Question> {
    let mut seen_ids = HashSet::new();
    let mut seen_text = HashSet::new();
    let mut out = Vec::with_capacity(questions.len());

    for q in questions {
        if let Some(id) = &q.id {
            if !seen_ids.insert(id.clone()) {
                continue;
            }
        }
        let text = q.normalized_prompt();
        if !text.is_empty() && !seen_text.insert(text) {
            continue;
        }
        out.push(q);
    }
    out
}

/// Shuffle uniformly, truncate to the requested count, canonicalize
/// answers to option text, and attach originating-pool indices.
fn finalize(mut pool: Vec<Question>, total: usize) -> Vec<Question> {
    // Pool index refers to the composed (pre-shuffle) order so the share
    // collaborator can reconstruct the identical set and ordering.
    for (idx, q) in pool.iter_mut().enumerate() {
        q.pool_index = Some(idx);
    }

    let mut rng = rand::rng();
    pool.shuffle(&mut rng);
    pool.truncate(total);

    for q in &mut pool {
        let resolved: Vec<CorrectAnswer> = q
            .answers
            .iter()
            .filter_map(|a| a.resolve(&q.options).map(CorrectAnswer::ByText))
            .collect();
        q.answers = resolved;
    }
    pool
}

/// The ordered originating-pool indices of a composed set, for the
/// share/replay collaborator.
pub fn share_indices(questions: &[Question]) -> Vec<usize> {
    questions.iter().filter_map(|q| q.pool_index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubSource {
        name: &'static str,
        questions: Vec<Question>,
        fail: bool,
        calls: AtomicU32,
    }

    impl StubSource {
        fn new(name: &'static str, questions: Vec<Question>) -> Self {
            StubSource {
                name,
                questions,
                fail: false,
                calls: AtomicU32::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            StubSource {
                name,
                questions: vec![],
                fail: true,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl QuestionSource for StubSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, query: &PoolQuery) -> Result<Vec<Question>, SourceError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(SourceError::Network("connection refused".into()));
            }
            Ok(self
                .questions
                .iter()
                .take(query.limit)
                .cloned()
                .collect())
        }
    }

    fn q(id: &str, prompt: &str) -> Question {
        Question {
            id: Some(id.into()),
            prompt: prompt.into(),
            options: vec!["a".into(), "b".into()],
            answers: vec![CorrectAnswer::ByIndex(1)],
            difficulty: 0.5,
            subtopics: vec![],
            image: None,
            pool_index: None,
        }
    }

    fn bank(n: usize, prefix: &str) -> Vec<Question> {
        (0..n)
            .map(|i| q(&format!("{prefix}-{i}"), &format!("{prefix} question {i}?")))
            .collect()
    }

    #[tokio::test]
    async fn id_quota_split_matches_percentage() {
        // Entomology, N=10, P=20 => 2 identification + 8 base.
        let base = Arc::new(StubSource::new("base", bank(20, "base")));
        let supplemental = Arc::new(StubSource::new("id", bank(20, "id")));
        let composer = PoolComposer::new(
            base.clone(),
            Some(supplemental.clone()),
            EventCatalog::standard(),
        );

        let mut request = ComposeRequest::new("Entomology", 10);
        request.id_percentage = 20;
        let set = composer.compose(&request).await.unwrap();

        assert_eq!(set.len(), 10);
        let id_count = set.iter().filter(|q| {
            q.id.as_deref().is_some_and(|id| id.starts_with("id-"))
        }).count();
        assert_eq!(id_count, 2);
    }

    #[tokio::test]
    async fn id_percentage_ignored_without_supplemental_support() {
        let base = Arc::new(StubSource::new("base", bank(20, "base")));
        let supplemental = Arc::new(StubSource::new("id", bank(20, "id")));
        let composer =
            PoolComposer::new(base, Some(supplemental.clone()), EventCatalog::standard());

        // "Write It Do It" is not in the identification catalog.
        let mut request = ComposeRequest::new("Write It Do It", 10);
        request.id_percentage = 50;
        let set = composer.compose(&request).await.unwrap();

        assert_eq!(set.len(), 10);
        assert_eq!(supplemental.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn failed_source_degrades_not_fatal() {
        let base = Arc::new(StubSource::new("base", bank(10, "base")));
        let supplemental = Arc::new(StubSource::failing("id"));
        let composer = PoolComposer::new(base, Some(supplemental), EventCatalog::standard());

        let mut request = ComposeRequest::new("Entomology", 10);
        request.id_percentage = 20;
        let set = composer.compose(&request).await.unwrap();

        // Supplemental degraded; base + top-up still deliver.
        assert!(!set.is_empty());
        assert!(set.len() <= 10);
    }

    #[tokio::test]
    async fn all_sources_empty_is_exhausted() {
        let base = Arc::new(StubSource::failing("base"));
        let composer = PoolComposer::new(base, None, EventCatalog::standard());

        let err = composer
            .compose(&ComposeRequest::new("Entomology", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn composed_set_has_unique_normalized_prompts() {
        // Same content via two ids and noisy formatting.
        let mut questions = bank(6, "base");
        questions.push(q("dup-1", "Base   QUESTION 3?"));
        let base = Arc::new(StubSource::new("base", questions));
        let composer = PoolComposer::new(base, None, EventCatalog::standard());

        let set = composer
            .compose(&ComposeRequest::new("Entomology", 10))
            .await
            .unwrap();

        let mut texts = HashSet::new();
        for q in &set {
            assert!(texts.insert(q.normalized_prompt()), "duplicate prompt text");
        }
        assert_eq!(set.len(), 6);
    }

    #[tokio::test]
    async fn never_more_than_requested() {
        let base = Arc::new(StubSource::new("base", bank(50, "base")));
        let composer = PoolComposer::new(base, None, EventCatalog::standard());

        let set = composer
            .compose(&ComposeRequest::new("Entomology", 7))
            .await
            .unwrap();
        assert_eq!(set.len(), 7);
    }

    #[tokio::test]
    async fn composite_event_fans_out_per_sub_event() {
        let base = Arc::new(StubSource::new("base", bank(30, "base")));
        let composer = PoolComposer::new(base.clone(), None, EventCatalog::standard());

        let set = composer
            .compose(&ComposeRequest::new("Anatomy & Physiology", 9))
            .await
            .unwrap();
        assert!(!set.is_empty());
        // One fetch per sub-event (dedup collapses the identical stub
        // banks, then one top-up fires for the shortfall).
        assert!(base.calls.load(Ordering::Relaxed) >= 3);
    }

    #[tokio::test]
    async fn answers_are_canonical_text_after_composition() {
        let base = Arc::new(StubSource::new("base", bank(5, "base")));
        let composer = PoolComposer::new(base, None, EventCatalog::standard());

        let set = composer
            .compose(&ComposeRequest::new("Entomology", 5))
            .await
            .unwrap();
        for q in &set {
            for a in &q.answers {
                assert!(a.as_text().is_some(), "answers must resolve to text");
            }
        }
    }

    #[tokio::test]
    async fn pool_indices_support_share_replay() {
        let base = Arc::new(StubSource::new("base", bank(10, "base")));
        let composer = PoolComposer::new(base, None, EventCatalog::standard());

        let set = composer
            .compose(&ComposeRequest::new("Entomology", 10))
            .await
            .unwrap();
        let indices = share_indices(&set);
        assert_eq!(indices.len(), set.len());
        let unique: HashSet<_> = indices.iter().collect();
        assert_eq!(unique.len(), indices.len());
    }

    #[test]
    fn even_shares_distributes_remainder_first() {
        assert_eq!(even_shares(8, 3), vec![(0, 3), (1, 3), (2, 2)]);
        assert_eq!(even_shares(2, 3), vec![(0, 1), (1, 1)]);
        assert_eq!(even_shares(0, 3), Vec::new());
    }
}
