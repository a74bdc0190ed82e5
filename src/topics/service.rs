//! Topics service
//!
//! Facade tying the graph repository, the cache layer and the shadow store
//! together. Reads prefer the graph (through the cache) and fall back to the
//! shadow copy when the graph is unreachable. Fallback results are never
//! written to the cache.

use super::hierarchy::{build_hierarchy, HierarchyError};
use super::models::{Forest, Topic, TopicContext, TopicStats};
use super::queries::TopicRepository;
use crate::cache::{CacheKey, CacheStats, TopicCache};
use crate::neo4j::{GraphError, QueryExecutor};
use crate::shadow::{ShadowError, ShadowStore, SyncOutcome, SyncReconciler, SyncType};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Number of tags reported by [`TopicsService::stats`]
const TOP_TAGS: usize = 10;
/// Number of sync runs reported by [`TopicsService::stats`]
const RECENT_SYNCS: usize = 5;

pub struct TopicsService {
    repository: TopicRepository,
    cache: TopicCache,
    shadow: Arc<dyn ShadowStore>,
    reconciler: SyncReconciler,
}

impl TopicsService {
    pub fn new(
        graph: Arc<dyn QueryExecutor>,
        cache: TopicCache,
        shadow: Arc<dyn ShadowStore>,
        sync_debounce: Duration,
    ) -> Self {
        Self {
            repository: TopicRepository::new(graph),
            reconciler: SyncReconciler::new(shadow.clone(), sync_debounce),
            cache,
            shadow,
        }
    }

    pub fn repository(&self) -> &TopicRepository {
        &self.repository
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// All topics. Never fails: graph, then shadow store, then empty.
    ///
    /// With `sync_if_missing`, the fetched list is reconciled into the shadow
    /// store as an incremental run when the shadow store holds nothing yet.
    pub async fn get_all(&self, use_cache: bool, sync_if_missing: bool) -> Vec<Topic> {
        match self.load_all(use_cache).await {
            Ok(topics) => {
                if sync_if_missing {
                    self.sync_if_missing(&topics).await;
                }
                topics
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching topics, using shadow store");
                self.shadow_topics().await
            }
        }
    }

    /// A single topic. Falls back to the shadow row when the graph is down.
    pub async fn get_by_id(&self, id: &str, use_cache: bool) -> Result<Option<Topic>, ShadowError> {
        let key = CacheKey::Detail(id.to_string());
        if use_cache {
            if let Some(hit) = self.cache.lookup::<Topic>(&key).await {
                return Ok(Some(hit));
            }
        }

        match self.repository.fetch_by_id(id).await {
            Ok(Some(topic)) => {
                if use_cache {
                    self.cache.store(&key, &topic, self.cache.ttl()).await;
                }
                Ok(Some(topic))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::error!(topic_id = %id, error = %e, "Error fetching topic, using shadow store");
                Ok(self
                    .shadow
                    .get_topic(id)
                    .await?
                    .filter(|row| row.is_active)
                    .map(|row| row.to_topic()))
            }
        }
    }

    /// Topics at one level of the hierarchy.
    pub async fn get_by_level(&self, level: u32, use_cache: bool) -> Vec<Topic> {
        let compute = || async {
            let topics = self.load_all(use_cache).await?;
            Ok::<_, GraphError>(topics.into_iter().filter(|t| t.level == level).collect())
        };
        let result = if use_cache {
            self.cache
                .get_or_compute(&CacheKey::Level(level), self.cache.ttl(), compute)
                .await
        } else {
            compute().await
        };

        match result {
            Ok(topics) => topics,
            Err(e) => {
                tracing::error!(level, error = %e, "Error fetching topics by level, using shadow store");
                self.shadow_topics()
                    .await
                    .into_iter()
                    .filter(|t| t.level == level)
                    .collect()
            }
        }
    }

    /// Case-insensitive search. A blank term matches nothing.
    pub async fn search(&self, term: &str, use_cache: bool) -> Vec<Topic> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }

        let compute = || self.repository.search(term);
        let result = if use_cache {
            self.cache
                .get_or_compute(&CacheKey::search(term), self.cache.search_ttl(), compute)
                .await
        } else {
            compute().await
        };

        match result {
            Ok(topics) => topics,
            Err(e) => {
                tracing::error!(term, error = %e, "Error searching topics, using shadow store");
                match self.shadow.search_topics(term).await {
                    Ok(rows) => rows.iter().map(|row| row.to_topic()).collect(),
                    Err(e) => {
                        tracing::error!(error = %e, "Shadow store search failed");
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Topic forest, or the subtree under `root_id`.
    ///
    /// `Ok(None)` means `root_id` names no known topic. Only the full forest
    /// is cached.
    pub async fn get_hierarchy(
        &self,
        root_id: Option<&str>,
    ) -> Result<Option<Forest>, HierarchyError> {
        if let Some(root) = root_id {
            let topics = self.get_all(true, false).await;
            if !topics.iter().any(|t| t.id == root) {
                return Ok(None);
            }
            return build_hierarchy(&topics, Some(root)).map(Some);
        }

        if let Some(hit) = self.cache.lookup::<Forest>(&CacheKey::Hierarchy).await {
            return Ok(Some(hit));
        }

        match self.load_all(true).await {
            Ok(topics) => {
                let forest = build_hierarchy(&topics, None)?;
                self.cache
                    .store(&CacheKey::Hierarchy, &forest, self.cache.ttl())
                    .await;
                Ok(Some(forest))
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching topics for hierarchy, using shadow store");
                let topics = self.shadow_topics().await;
                build_hierarchy(&topics, None).map(Some)
            }
        }
    }

    /// Resolve a slug through the shadow store, then read the topic.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Topic>, ShadowError> {
        match self.shadow.get_topic_by_slug(slug).await? {
            Some(row) => self.get_by_id(&row.graph_id, true).await,
            None => Ok(None),
        }
    }

    /// A topic with its parent, children, siblings and breadcrumb trail.
    pub async fn get_context(&self, id: &str) -> Result<Option<TopicContext>, ShadowError> {
        let Some(topic) = self.get_by_id(id, true).await? else {
            return Ok(None);
        };
        let all = self.get_all(true, false).await;
        let by_id: HashMap<&str, &Topic> = all.iter().map(|t| (t.id.as_str(), t)).collect();

        let parent = topic
            .parent
            .as_deref()
            .and_then(|p| by_id.get(p))
            .map(|t| (*t).clone());
        let children = all
            .iter()
            .filter(|t| t.parent.as_deref() == Some(topic.id.as_str()))
            .cloned()
            .collect();
        let siblings = match topic.parent.as_deref() {
            Some(p) => all
                .iter()
                .filter(|t| t.parent.as_deref() == Some(p) && t.id != topic.id)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let mut breadcrumbs = vec![topic.clone()];
        let mut seen: HashSet<&str> = HashSet::from([topic.id.as_str()]);
        let mut current = topic.parent.as_deref();
        while let Some(parent_id) = current {
            let Some(ancestor) = by_id.get(parent_id) else {
                break;
            };
            if !seen.insert(ancestor.id.as_str()) {
                tracing::warn!(topic_id = %id, "Parent cycle while building breadcrumbs");
                break;
            }
            breadcrumbs.push((*ancestor).clone());
            current = ancestor.parent.as_deref();
        }
        breadcrumbs.reverse();

        Ok(Some(TopicContext {
            topic,
            parent,
            children,
            siblings,
            breadcrumbs,
        }))
    }

    /// Totals, level distribution, top tags, recent syncs and cache state.
    pub async fn stats(&self) -> TopicStats {
        let all = self.get_all(true, false).await;

        let mut level_distribution: BTreeMap<u32, usize> = BTreeMap::new();
        for topic in &all {
            *level_distribution.entry(topic.level).or_default() += 1;
        }

        let recent_syncs = match self.shadow.recent_syncs(RECENT_SYNCS, true).await {
            Ok(syncs) => syncs,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read sync history");
                Vec::new()
            }
        };

        TopicStats {
            total_topics: all.len(),
            level_distribution,
            top_tags: top_tags(&all, TOP_TAGS),
            recent_syncs,
            cache_stats: self.cache.stats().await,
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Full reconciliation from the graph; clears the aggregate cache on success.
    pub async fn sync(&self, force: bool) -> SyncOutcome {
        let outcome = self
            .reconciler
            .sync(force, || self.repository.fetch_all())
            .await;
        if outcome.success {
            self.cache.clear_related().await;
        }
        outcome
    }

    pub async fn clear_cache(&self) {
        self.cache.clear_related().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn load_all(&self, use_cache: bool) -> Result<Vec<Topic>, GraphError> {
        if use_cache {
            self.cache
                .get_or_compute(&CacheKey::All, self.cache.ttl(), || {
                    self.repository.fetch_all()
                })
                .await
        } else {
            self.repository.fetch_all().await
        }
    }

    async fn sync_if_missing(&self, topics: &[Topic]) {
        match self.shadow.count_topics().await {
            Ok(0) if !topics.is_empty() => {
                tracing::info!(count = topics.len(), "Shadow store empty, reconciling");
                self.reconciler
                    .reconcile(topics, SyncType::Incremental)
                    .await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not count shadow topics"),
        }
    }

    async fn shadow_topics(&self) -> Vec<Topic> {
        match self.shadow.list_topics().await {
            Ok(rows) => rows.iter().map(|row| row.to_topic()).collect(),
            Err(e) => {
                tracing::error!(error = %e, "Error fetching from shadow store");
                Vec::new()
            }
        }
    }
}

/// Most used tags, highest count first; ties keep first-seen order
fn top_tags(topics: &[Topic], limit: usize) -> Vec<(String, usize)> {
    // tag -> (first seen, count)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for tag in topics.iter().flat_map(|t| t.tags.iter()) {
        let seen = counts.len();
        counts.entry(tag.as_str()).or_insert((seen, 0)).1 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (a_seen, a_count)), (_, (b_seen, b_count))| {
        b_count.cmp(a_count).then(a_seen.cmp(b_seen))
    });
    ranked
        .into_iter()
        .take(limit)
        .map(|(tag, (_, count))| (tag.to_string(), count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{topic_record, TestTopics};
    use crate::topics::queries::{ALL_TOPICS_QUERY, SEARCH_TOPICS_QUERY, TOPIC_BY_ID_QUERY};

    fn sample() -> Vec<crate::neo4j::RawRecord> {
        vec![
            topic_record("virtues", None, 0, &["core"]),
            topic_record("faith", Some("virtues"), 1, &["core", "pauline"]),
            topic_record("hope", Some("virtues"), 1, &["pauline"]),
            topic_record("love", Some("virtues"), 1, &["core"]),
            topic_record("agape", Some("love"), 2, &[]),
            topic_record("wisdom", None, 0, &[]),
        ]
    }

    #[tokio::test]
    async fn test_get_all_caches_graph_result() {
        let t = TestTopics::seeded(sample()).await;

        let first = t.service.get_all(true, false).await;
        let second = t.service.get_all(true, false).await;

        assert_eq!(first.len(), 6);
        assert_eq!(first, second);
        assert_eq!(t.graph.call_count(ALL_TOPICS_QUERY).await, 1);

        t.service.get_all(false, false).await;
        assert_eq!(t.graph.call_count(ALL_TOPICS_QUERY).await, 2);
    }

    #[tokio::test]
    async fn test_get_all_syncs_empty_shadow_store() {
        let t = TestTopics::seeded(sample()).await;
        t.service.get_all(true, true).await;
        assert_eq!(t.shadow.count_topics().await.unwrap(), 6);

        let logs = t.shadow.recent_syncs(10, false).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].sync_type, SyncType::Incremental);

        // populated store is left alone
        t.service.get_all(false, true).await;
        assert_eq!(t.shadow.recent_syncs(10, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_graph_failure_falls_back_to_shadow() {
        let t = TestTopics::seeded(sample()).await;
        t.service.sync(true).await;
        t.service.clear_cache().await;
        t.graph.set_unavailable(true);

        let topics = t.service.get_all(true, false).await;
        assert_eq!(topics.len(), 6);
        // shadow order: level then title
        assert_eq!(topics[0].id, "virtues");

        let level_one = t.service.get_by_level(1, true).await;
        assert_eq!(level_one.len(), 3);

        let hope = t.service.get_by_id("hope", true).await.unwrap().unwrap();
        assert_eq!(hope.parent.as_deref(), Some("virtues"));

        let found = t.service.search("AGA", true).await;
        assert_eq!(found.len(), 1);

        // fallback results are not cached
        assert!(!t.service.cache_stats().await.all);
    }

    #[tokio::test]
    async fn test_double_failure_returns_empty() {
        let t = TestTopics::seeded(sample()).await;
        t.graph.set_unavailable(true);
        t.shadow.set_failing(true);

        assert!(t.service.get_all(true, false).await.is_empty());
        assert!(t.service.get_by_level(0, true).await.is_empty());
        assert!(t.service.search("faith", true).await.is_empty());
        assert!(t.service.get_by_id("faith", true).await.is_err());
    }

    #[tokio::test]
    async fn test_get_by_id_caches_only_found_topics() {
        let t = TestTopics::new().await;
        t.graph
            .respond(TOPIC_BY_ID_QUERY, vec![topic_record("faith", None, 0, &[])])
            .await;

        let found = t.service.get_by_id("faith", true).await.unwrap();
        assert_eq!(found.unwrap().id, "faith");
        t.service.get_by_id("faith", true).await.unwrap();
        assert_eq!(t.graph.call_count(TOPIC_BY_ID_QUERY).await, 1);

        t.graph.respond(TOPIC_BY_ID_QUERY, vec![]).await;
        assert!(t.service.get_by_id("ghost", true).await.unwrap().is_none());
        assert!(t.service.get_by_id("ghost", true).await.unwrap().is_none());
        assert_eq!(t.graph.call_count(TOPIC_BY_ID_QUERY).await, 3);
    }

    #[tokio::test]
    async fn test_get_by_level_cached_slice() {
        let t = TestTopics::seeded(sample()).await;
        let roots = t.service.get_by_level(0, true).await;
        let ids: Vec<&str> = roots.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["virtues", "wisdom"]);
        assert!(t.service.get_by_level(7, true).await.is_empty());
        t.service.get_by_level(7, true).await;
        assert_eq!(t.graph.call_count(ALL_TOPICS_QUERY).await, 1);
    }

    #[tokio::test]
    async fn test_search() {
        let t = TestTopics::new().await;
        t.graph
            .respond(SEARCH_TOPICS_QUERY, vec![topic_record("grace", None, 0, &[])])
            .await;

        assert!(t.service.search("   ", true).await.is_empty());
        assert_eq!(t.graph.call_count(SEARCH_TOPICS_QUERY).await, 0);

        assert_eq!(t.service.search("Grace", true).await.len(), 1);
        assert_eq!(t.service.search("GRACE", true).await.len(), 1);
        assert_eq!(t.graph.call_count(SEARCH_TOPICS_QUERY).await, 1);

        // search entries survive clear_related
        t.service.clear_cache().await;
        t.service.search("grace", true).await;
        assert_eq!(t.graph.call_count(SEARCH_TOPICS_QUERY).await, 1);
    }

    #[tokio::test]
    async fn test_hierarchy_full_and_subtree() {
        let t = TestTopics::seeded(sample()).await;

        let forest = t.service.get_hierarchy(None).await.unwrap().unwrap();
        assert_eq!(forest.root_count, 2);
        assert_eq!(forest.total_count, 6);
        assert!(t.service.cache_stats().await.hierarchy);

        let subtree = t.service.get_hierarchy(Some("love")).await.unwrap().unwrap();
        assert_eq!(subtree.total_count, 2);
        assert_eq!(subtree.topics[0].children[0].topic.id, "agape");

        assert!(t.service.get_hierarchy(Some("nowhere")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hierarchy_cycle_is_an_error() {
        let t = TestTopics::seeded(vec![
            topic_record("a", Some("b"), 1, &[]),
            topic_record("b", Some("a"), 1, &[]),
        ])
        .await;
        let err = t.service.get_hierarchy(None).await.unwrap_err();
        assert_eq!(err, HierarchyError::Cycle { id: "a".to_string() });
        assert!(!t.service.cache_stats().await.hierarchy);
    }

    #[tokio::test]
    async fn test_sync_clears_related_cache() {
        let t = TestTopics::seeded(sample()).await;
        t.service.get_all(true, false).await;
        t.service.get_hierarchy(None).await.unwrap();
        assert!(t.service.cache_stats().await.all);

        let outcome = t.service.sync(false).await;
        assert!(outcome.success);
        assert_eq!(outcome.records_processed, 6);
        assert_eq!(outcome.message, "Successfully synced 6 topics");

        let stats = t.service.cache_stats().await;
        assert!(!stats.all);
        assert!(!stats.hierarchy);

        let skipped = t.service.sync(false).await;
        assert!(!skipped.success);
        assert_eq!(skipped.message, "Recent sync exists");
    }

    #[tokio::test]
    async fn test_sync_graph_failure() {
        let t = TestTopics::seeded(sample()).await;
        t.service.get_all(true, false).await;
        t.graph.set_unavailable(true);

        let outcome = t.service.sync(true).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Sync failed:"));
        // failed run leaves the cache alone
        assert!(t.service.cache_stats().await.all);
    }

    #[tokio::test]
    async fn test_get_by_slug() {
        let t = TestTopics::seeded(vec![topic_record("Fruit of the Spirit", None, 0, &[])]).await;
        t.graph
            .respond(
                TOPIC_BY_ID_QUERY,
                vec![topic_record("Fruit of the Spirit", None, 0, &[])],
            )
            .await;
        t.service.sync(true).await;

        let topic = t.service.get_by_slug("fruit-of-the-spirit").await.unwrap();
        assert_eq!(topic.unwrap().id, "Fruit of the Spirit");
        assert!(t.service.get_by_slug("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_context() {
        let t = TestTopics::seeded(sample()).await;
        t.graph
            .respond(
                TOPIC_BY_ID_QUERY,
                vec![topic_record("agape", Some("love"), 2, &[])],
            )
            .await;

        let ctx = t.service.get_context("agape").await.unwrap().unwrap();
        assert_eq!(ctx.parent.unwrap().id, "love");
        assert!(ctx.children.is_empty());
        assert!(ctx.siblings.is_empty());
        let crumbs: Vec<&str> = ctx.breadcrumbs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(crumbs, vec!["virtues", "love", "agape"]);
    }

    #[tokio::test]
    async fn test_context_siblings_and_children() {
        let t = TestTopics::seeded(sample()).await;
        t.graph
            .respond(
                TOPIC_BY_ID_QUERY,
                vec![topic_record("love", Some("virtues"), 1, &[])],
            )
            .await;

        let ctx = t.service.get_context("love").await.unwrap().unwrap();
        let siblings: Vec<&str> = ctx.siblings.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(siblings, vec!["faith", "hope"]);
        assert_eq!(ctx.children.len(), 1);
        assert_eq!(ctx.breadcrumbs.len(), 2);
    }

    #[tokio::test]
    async fn test_context_breadcrumbs_stop_on_cycle() {
        let t = TestTopics::seeded(vec![
            topic_record("a", Some("b"), 1, &[]),
            topic_record("b", Some("a"), 1, &[]),
        ])
        .await;
        t.graph
            .respond(TOPIC_BY_ID_QUERY, vec![topic_record("a", Some("b"), 1, &[])])
            .await;

        let ctx = t.service.get_context("a").await.unwrap().unwrap();
        let crumbs: Vec<&str> = ctx.breadcrumbs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(crumbs, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_stats() {
        let t = TestTopics::seeded(sample()).await;
        t.service.sync(true).await;

        let stats = t.service.stats().await;
        assert_eq!(stats.total_topics, 6);
        assert_eq!(stats.level_distribution.get(&0), Some(&2));
        assert_eq!(stats.level_distribution.get(&1), Some(&3));
        assert_eq!(stats.level_distribution.get(&2), Some(&1));
        assert_eq!(
            stats.top_tags,
            vec![("core".to_string(), 3), ("pauline".to_string(), 2)]
        );
        assert_eq!(stats.recent_syncs.len(), 1);
        assert!(stats.cache_stats.all);
    }

    #[test]
    fn test_top_tags_ties_keep_first_seen_order() {
        let topics: Vec<Topic> = [
            topic_record("a", None, 0, &["zeal", "alms"]),
            topic_record("b", None, 0, &["alms", "mercy"]),
            topic_record("c", None, 0, &["mercy", "zeal", "fasting"]),
        ]
        .iter()
        .map(crate::topics::normalize)
        .collect();

        let ranked = top_tags(&topics, 10);
        let names: Vec<&str> = ranked.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(names, vec!["zeal", "alms", "mercy", "fasting"]);
        assert_eq!(ranked[0].1, 2);
        assert_eq!(ranked[3].1, 1);

        assert_eq!(top_tags(&topics, 2).len(), 2);
        assert!(top_tags(&[], 10).is_empty());
    }
}
