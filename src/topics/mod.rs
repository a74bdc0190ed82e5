//! Topic hierarchy: canonical model, normalization, tree building, queries
//! and the service facade

pub mod hierarchy;
pub mod models;
pub mod normalizer;
pub mod queries;
pub mod service;

pub use hierarchy::{build_hierarchy, HierarchyError};
pub use models::{Forest, Topic, TopicContext, TopicNode, TopicStats};
pub use normalizer::normalize;
pub use queries::TopicRepository;
pub use service::TopicsService;
