use crate::tag::TagConfig;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNode {
    pub tag: String,
    pub display_name: String,
    pub senders: Vec<String>,
}

/// Edge from a dependency to the tag that depends on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DependencyLink {
    pub source: String,
    pub target: String,
}

/// Tags of a project and the dependencies declared between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<TagNode>,
    pub links: Vec<DependencyLink>,
}

impl DependencyGraph {
    /// One node per tag config, sorted by tag, and one link per distinct
    /// `(dependency, tag)` pair.
    pub fn build<'a>(
        tag_configs: impl IntoIterator<Item = &'a TagConfig>,
        tags_to_senders: &BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        let mut nodes = BTreeMap::new();
        let mut links = BTreeSet::new();

        for config in tag_configs {
            let senders = tags_to_senders
                .get(&config.tag)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default();
            nodes.insert(
                config.tag.clone(),
                TagNode {
                    tag: config.tag.clone(),
                    display_name: config.display_name.clone(),
                    senders,
                },
            );
            for dependency in &config.dependencies {
                links.insert(DependencyLink {
                    source: dependency.clone(),
                    target: config.tag.clone(),
                });
            }
        }

        for link in &links {
            if !nodes.contains_key(&link.source) {
                tracing::debug!(
                    tag = %link.target,
                    dependency = %link.source,
                    "Dependency has no tag config"
                );
            }
        }

        Self {
            nodes: nodes.into_values().collect(),
            links: links.into_iter().collect(),
        }
    }

    /// Tags that declare `tag` as a dependency.
    pub fn dependents_of(&self, tag: &str) -> Vec<&str> {
        self.links
            .iter()
            .filter(|l| l.source == tag)
            .map(|l| l.target.as_str())
            .collect()
    }

    pub fn dependencies_of(&self, tag: &str) -> Vec<&str> {
        self.links
            .iter()
            .filter(|l| l.target == tag)
            .map(|l| l.source.as_str())
            .collect()
    }
}
