//! Topic data structures

use serde::{Deserialize, Serialize};

/// Maximum length of `short_description`, ellipsis included
pub const SHORT_DESCRIPTION_MAX: usize = 150;

/// A node of the knowledge hierarchy in canonical form.
///
/// Built by [`normalize`](super::normalizer::normalize); never mutated in
/// place afterwards. `has_children` is only ever set on copies produced by the
/// hierarchy builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub has_children: bool,
}

/// A topic with its resolved children, produced by hierarchy construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    #[serde(flatten)]
    pub topic: Topic,
    pub children: Vec<TopicNode>,
}

impl TopicNode {
    /// Depth-first pre-order walk over this node and its descendants.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a Topic>) {
        out.push(&self.topic);
        for child in &self.children {
            child.walk(out);
        }
    }
}

/// Ordered collection of root-level nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Forest {
    pub topics: Vec<TopicNode>,
    pub total_count: usize,
    pub root_count: usize,
}

impl Forest {
    /// Flatten the forest back into a pre-order list of topics.
    pub fn flatten(&self) -> Vec<&Topic> {
        let mut out = Vec::with_capacity(self.total_count);
        for root in &self.topics {
            root.walk(&mut out);
        }
        out
    }
}

/// A topic together with its neighbourhood in the hierarchy.
#[derive(Debug, Clone, Serialize)]
pub struct TopicContext {
    pub topic: Topic,
    pub parent: Option<Topic>,
    pub children: Vec<Topic>,
    pub siblings: Vec<Topic>,
    /// Root-first chain ending with `topic`
    pub breadcrumbs: Vec<Topic>,
}

/// Aggregate numbers over the full topic list.
#[derive(Debug, Clone, Serialize)]
pub struct TopicStats {
    pub total_topics: usize,
    pub level_distribution: std::collections::BTreeMap<u32, usize>,
    pub top_tags: Vec<(String, usize)>,
    pub recent_syncs: Vec<crate::shadow::SyncLogEntry>,
    pub cache_stats: crate::cache::CacheStats,
}
