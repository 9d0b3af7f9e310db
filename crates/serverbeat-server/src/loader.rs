use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use serverbeat_alert::{AlertConfig, AlertDocument};
use serverbeat_project::tree::tags_to_senders;
use serverbeat_project::{DependencyGraph, ProjectConfig, TagConfig, TagDocument};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const TREE_FILE: &str = "tree.yaml";
pub const PROJECT_CONFIG_FILE: &str = "projectConfig.yaml";
pub const TAGS_DIR: &str = "tags";
pub const ALERTS_DIR: &str = "alerts";

type Result<T> = std::result::Result<T, ConfigError>;

/// Source of the per-project documents the evaluator works from.
pub trait ConfigLoader: Send + Sync {
    /// The raw crumbs tree, left unparsed so callers can pick a traversal.
    fn project_tree(&self, project: &str) -> Result<Value>;

    fn tag_config(&self, project: &str, tag: &str) -> Result<TagConfig>;

    fn alert_config(&self, project: &str, alert_name: &str) -> Result<AlertConfig>;

    fn project_config(&self, project: &str) -> Result<ProjectConfig>;

    /// Configs of every tag referenced by the project tree, keyed by tag.
    fn tag_configs(&self, project: &str) -> Result<BTreeMap<String, TagConfig>> {
        let tree = self.project_tree(project)?;
        let by_tag = tags_to_senders(&tree).map_err(|source| ConfigError::InvalidTree {
            project: project.to_string(),
            source,
        })?;
        by_tag
            .keys()
            .map(|tag| -> Result<(String, TagConfig)> {
                Ok((tag.clone(), self.tag_config(project, tag)?))
            })
            .collect()
    }

    fn dependency_graph(&self, project: &str) -> Result<DependencyGraph> {
        let tree = self.project_tree(project)?;
        let by_tag = tags_to_senders(&tree).map_err(|source| ConfigError::InvalidTree {
            project: project.to_string(),
            source,
        })?;
        let configs = self.tag_configs(project)?;
        Ok(DependencyGraph::build(configs.values(), &by_tag))
    }
}

/// Reads YAML documents laid out as
/// `<root>/<project>/{tree.yaml, projectConfig.yaml, tags/<tag>, alerts/<name>}`.
#[derive(Debug, Clone)]
pub struct YamlProjectLoader {
    root: PathBuf,
}

impl YamlProjectLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, project: &str, relative: &[&str]) -> PathBuf {
        let mut path = self.root.join(project);
        for part in relative {
            path.push(part);
        }
        path
    }

    fn read_document<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

impl ConfigLoader for YamlProjectLoader {
    fn project_tree(&self, project: &str) -> Result<Value> {
        self.read_document(&self.document_path(project, &[TREE_FILE]))
    }

    fn tag_config(&self, project: &str, tag: &str) -> Result<TagConfig> {
        let path = self.document_path(project, &[TAGS_DIR, tag]);
        let doc: TagDocument = self.read_document(&path)?;
        TagConfig::from_document(tag, doc).map_err(|source| ConfigError::InvalidTag {
            path: path.display().to_string(),
            source,
        })
    }

    fn alert_config(&self, project: &str, alert_name: &str) -> Result<AlertConfig> {
        let path = self.document_path(project, &[ALERTS_DIR, alert_name]);
        let doc: AlertDocument = self.read_document(&path)?;
        AlertConfig::from_document(alert_name, doc).map_err(|source| ConfigError::InvalidAlert {
            path: path.display().to_string(),
            source,
        })
    }

    fn project_config(&self, project: &str) -> Result<ProjectConfig> {
        self.read_document(&self.document_path(project, &[PROJECT_CONFIG_FILE]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serverbeat_alert::AlertKind;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "shop/tree.yaml",
            "eu:\n  tagsAndSenders:\n    - { tag: orders, sender: db-01 }\n    - { tag: invoices, sender: db-01 }\n",
        );
        write(
            dir.path(),
            "shop/tags/orders",
            "type: time_series\nfrequency: 60\nsla: 15\n",
        );
        write(
            dir.path(),
            "shop/tags/invoices",
            "type: single\nfrequency: 1440\nsla: 60\ndependencies: [orders]\n",
        );
        write(
            dir.path(),
            "shop/alerts/failing",
            "type: snapshot\nsnapshot_count: 3\nconditions:\n  RED: NOT_OK >= 2\n  YELLOW: NOT_OK >= 1\n",
        );
        write(
            dir.path(),
            "shop/projectConfig.yaml",
            "available_views: [tree]\ndefault_view: tree\n",
        );
        dir
    }

    #[test]
    fn reads_project_documents() {
        let dir = project_dir();
        let loader = YamlProjectLoader::new(dir.path());

        let tree = loader.project_tree("shop").unwrap();
        assert!(tree.get("eu").is_some());

        let orders = loader.tag_config("shop", "orders").unwrap();
        assert_eq!(orders.timing.frequency_minutes, 60);
        assert_eq!(orders.default_subtag().subtag, "default");

        let alert = loader.alert_config("shop", "failing").unwrap();
        assert_eq!(alert.name, "failing");
        assert_eq!(alert.kind, AlertKind::Snapshot);
        assert_eq!(alert.snapshot_count, 3);

        let project = loader.project_config("shop").unwrap();
        assert_eq!(project.default_view.as_deref(), Some("tree"));
    }

    #[test]
    fn tag_configs_and_graph_follow_the_tree() {
        let dir = project_dir();
        let loader = YamlProjectLoader::new(dir.path());

        let configs = loader.tag_configs("shop").unwrap();
        assert_eq!(
            configs.keys().collect::<Vec<_>>(),
            vec!["invoices", "orders"]
        );

        let graph = loader.dependency_graph("shop").unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.dependents_of("orders"), vec!["invoices"]);
    }

    #[test]
    fn errors_name_the_file() {
        let dir = project_dir();
        write(dir.path(), "shop/alerts/broken", "type: snapshot\nconditions:\n  RED: NOT_OK\n");
        write(dir.path(), "shop/tags/bad", "type: [unclosed\n");
        let loader = YamlProjectLoader::new(dir.path());

        match loader.project_tree("nowhere").unwrap_err() {
            ConfigError::Read { path, .. } => assert!(path.ends_with("tree.yaml")),
            other => panic!("unexpected error {other:?}"),
        }
        match loader.tag_config("shop", "bad").unwrap_err() {
            ConfigError::Parse { path, .. } => assert!(path.ends_with("bad")),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            loader.alert_config("shop", "broken").unwrap_err(),
            ConfigError::InvalidAlert { .. }
        ));
    }
}
