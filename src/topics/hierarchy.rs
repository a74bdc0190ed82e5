//! Hierarchy materialization
//!
//! Rebuilds the topic forest from the flat list returned by the graph.
//!
//! ## Algorithm
//!
//! 1. In subtree mode, narrow the working set to the requested node and its
//!    direct children.
//! 2. Index topics by id (last write wins; first-seen position kept for order).
//! 3. Group child ids under their parent, but only when the parent resolves
//!    inside the working set. Everything else is a root.
//! 4. Attach children depth-first from the roots, setting `has_children`.
//!    The walk keeps its own stack, so deep chains do not grow the call stack.
//!
//! Roots and children keep input order. Callers wanting another order sort the
//! input first.
//!
//! A topic never reached from a root can only be sitting on a parent cycle
//! (every non-root has a resolvable parent, so following parents either hits a
//! root or loops). Such input is rejected with [`HierarchyError::Cycle`].

use super::models::{Forest, Topic, TopicNode};
use std::collections::{HashMap, HashSet};

/// Data-integrity failures detected while building the forest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("topic '{id}' is part of a parent cycle")]
    Cycle { id: String },
}

/// Build a forest from `topics`, optionally narrowed to the subtree rooted at `root_id`.
pub fn build_hierarchy(topics: &[Topic], root_id: Option<&str>) -> Result<Forest, HierarchyError> {
    let working: Vec<&Topic> = match root_id {
        Some(root) => topics
            .iter()
            .filter(|t| t.id == root || t.parent.as_deref() == Some(root))
            .collect(),
        None => topics.iter().collect(),
    };

    let mut order: Vec<&str> = Vec::with_capacity(working.len());
    let mut by_id: HashMap<&str, &Topic> = HashMap::with_capacity(working.len());
    for topic in &working {
        if by_id.insert(topic.id.as_str(), *topic).is_none() {
            order.push(topic.id.as_str());
        }
    }

    let mut children_by_parent: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut roots: Vec<&str> = Vec::new();
    for &id in &order {
        let parent = by_id[id]
            .parent
            .as_deref()
            .filter(|p| by_id.contains_key(p));
        match parent {
            Some(p) => children_by_parent.entry(p).or_default().push(id),
            None => roots.push(id),
        }
    }

    let index = Index {
        by_id: &by_id,
        children_by_parent: &children_by_parent,
    };
    let mut visited: HashSet<&str> = HashSet::with_capacity(order.len());
    let nodes = index.build(&roots, &mut visited);

    if let Some(stranded) = order.iter().find(|id| !visited.contains(*id)) {
        tracing::warn!(topic_id = %stranded, "Parent cycle detected while building hierarchy");
        return Err(HierarchyError::Cycle {
            id: stranded.to_string(),
        });
    }

    Ok(Forest {
        root_count: nodes.len(),
        total_count: working.len(),
        topics: nodes,
    })
}

struct Index<'a> {
    by_id: &'a HashMap<&'a str, &'a Topic>,
    children_by_parent: &'a HashMap<&'a str, Vec<&'a str>>,
}

/// A node whose children are still being built
struct Frame<'a> {
    id: &'a str,
    next: usize,
    children: Vec<TopicNode>,
}

impl<'a> Frame<'a> {
    fn new(id: &'a str) -> Self {
        Self {
            id,
            next: 0,
            children: Vec::new(),
        }
    }
}

impl<'a> Index<'a> {
    fn children_of(&self, id: &str) -> &'a [&'a str] {
        self.children_by_parent
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Post-order walk from each root, marking every reached id in `visited`
    fn build(&self, roots: &[&'a str], visited: &mut HashSet<&'a str>) -> Vec<TopicNode> {
        let mut forest = Vec::with_capacity(roots.len());
        for &root in roots {
            visited.insert(root);
            let mut stack = vec![Frame::new(root)];
            while let Some(frame) = stack.last_mut() {
                if let Some(&child) = self.children_of(frame.id).get(frame.next) {
                    frame.next += 1;
                    visited.insert(child);
                    stack.push(Frame::new(child));
                    continue;
                }

                let Some(done) = stack.pop() else { break };
                let node = self.finish(done);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => forest.push(node),
                }
            }
        }
        forest
    }

    fn finish(&self, frame: Frame<'a>) -> TopicNode {
        let mut topic = self.by_id[frame.id].clone();
        topic.has_children = !frame.children.is_empty();
        TopicNode {
            topic,
            children: frame.children,
        }
    }
}
