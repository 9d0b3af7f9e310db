//! Project tree traversal.
//!
//! A project tree is a nested YAML map. Keys holding maps are crumbs, the
//! `tagsAndSenders` key lists the leaves of the node it sits in, and any other
//! key holding a list is a leaf node named after the key:
//!
//! ```yaml
//! prod:
//!   tagsAndSenders:
//!     - { tag: partitions, sender: etl-01, alerts: { health: [default] } }
//!   ingest:
//!     kafka:
//!       - { tag: lag, sender: consumer-01 }
//! ```
//!
//! Every projection is a [`TreeVisitor`] driven by the same walk.

use crate::error::{ProjectError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const TAGS_AND_SENDERS_KEY: &str = "tagsAndSenders";

/// One `{sender, tag, alerts}` entry of a tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafEntry {
    pub sender: String,
    pub tag: String,
    /// Alert name to the subtags it applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<BTreeMap<String, Vec<String>>>,
}

/// A leaf entry together with the crumbs path it was found under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagAndSender {
    pub sender: String,
    pub tag: String,
    pub alerts: Option<BTreeMap<String, Vec<String>>>,
    pub crumbs: Vec<String>,
}

pub trait TreeVisitor {
    /// Called when the walk descends into the node at `crumbs`.
    fn enter(&mut self, _crumbs: &[String]) {}

    /// Called with the leaves attached to the node at `crumbs`.
    fn leaves(&mut self, crumbs: &[String], entries: &[LeafEntry]);
}

/// Walks a raw tree document, feeding `visitor`.
pub fn walk<V: TreeVisitor>(raw: &Value, visitor: &mut V) -> Result<()> {
    let mut crumbs = Vec::new();
    match raw {
        Value::Null => Ok(()),
        Value::Mapping(map) => walk_mapping(map, &mut crumbs, visitor),
        Value::Sequence(items) => {
            let entries = parse_leaves(items, &crumbs)?;
            visitor.leaves(&crumbs, &entries);
            Ok(())
        }
        _ => Err(ProjectError::MalformedTree {
            path: String::new(),
            reason: "root must be a map".to_string(),
        }),
    }
}

fn walk_mapping<V: TreeVisitor>(
    map: &Mapping,
    crumbs: &mut Vec<String>,
    visitor: &mut V,
) -> Result<()> {
    for (key, value) in map {
        let key = crumb_name(key, crumbs)?;
        match value {
            Value::Sequence(items) if key == TAGS_AND_SENDERS_KEY => {
                let entries = parse_leaves(items, crumbs)?;
                visitor.leaves(crumbs, &entries);
            }
            Value::Sequence(items) => {
                crumbs.push(key);
                let entries = parse_leaves(items, crumbs)?;
                visitor.enter(crumbs);
                visitor.leaves(crumbs, &entries);
                crumbs.pop();
            }
            Value::Mapping(child) => {
                crumbs.push(key);
                visitor.enter(crumbs);
                walk_mapping(child, crumbs, visitor)?;
                crumbs.pop();
            }
            Value::Null => {
                crumbs.push(key);
                visitor.enter(crumbs);
                crumbs.pop();
            }
            _ => tracing::debug!(
                path = %crumbs.join("/"),
                key = %key,
                "Ignoring scalar value in project tree"
            ),
        }
    }
    Ok(())
}

fn crumb_name(key: &Value, crumbs: &[String]) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ProjectError::MalformedTree {
            path: crumbs.join("/"),
            reason: "keys must be scalars".to_string(),
        }),
    }
}

fn parse_leaves(items: &[Value], crumbs: &[String]) -> Result<Vec<LeafEntry>> {
    items
        .iter()
        .map(|item| {
            serde_yaml::from_value(item.clone()).map_err(|e| ProjectError::MalformedTree {
                path: crumbs.join("/"),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTreeNode {
    pub name: String,
    pub crumbs: Vec<String>,
    pub tags_and_senders: Vec<LeafEntry>,
    pub children: Vec<ProjectTreeNode>,
}

impl ProjectTreeNode {
    fn new(name: &str, crumbs: &[String]) -> Self {
        Self {
            name: name.to_string(),
            crumbs: crumbs.to_vec(),
            tags_and_senders: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Materialized project tree. The root is unnamed; leaves declared at the top
/// level live in `tags_and_senders`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTree {
    pub tags_and_senders: Vec<LeafEntry>,
    pub nodes: Vec<ProjectTreeNode>,
}

impl ProjectTree {
    pub fn from_value(raw: &Value) -> Result<Self> {
        let mut tree = Self::default();
        walk(raw, &mut tree)?;
        Ok(tree)
    }

    pub fn find(&self, crumbs: &[String]) -> Option<&ProjectTreeNode> {
        let (first, rest) = crumbs.split_first()?;
        let mut node = self.nodes.iter().find(|n| &n.name == first)?;
        for name in rest {
            node = node.children.iter().find(|n| &n.name == name)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, crumbs: &[String]) -> Option<&mut ProjectTreeNode> {
        if crumbs.is_empty() {
            return None;
        }
        let mut level = &mut self.nodes;
        for depth in 0..crumbs.len() - 1 {
            let idx = position_or_insert(level, &crumbs[..=depth]);
            level = &mut level[idx].children;
        }
        let idx = position_or_insert(level, crumbs);
        Some(&mut level[idx])
    }
}

fn position_or_insert(level: &mut Vec<ProjectTreeNode>, crumbs: &[String]) -> usize {
    let name = &crumbs[crumbs.len() - 1];
    match level.iter().position(|n| &n.name == name) {
        Some(idx) => idx,
        None => {
            level.push(ProjectTreeNode::new(name, crumbs));
            level.len() - 1
        }
    }
}

impl TreeVisitor for ProjectTree {
    fn enter(&mut self, crumbs: &[String]) {
        self.node_mut(crumbs);
    }

    fn leaves(&mut self, crumbs: &[String], entries: &[LeafEntry]) {
        match self.node_mut(crumbs) {
            Some(node) => node.tags_and_senders.extend_from_slice(entries),
            None => self.tags_and_senders.extend_from_slice(entries),
        }
    }
}

#[derive(Default)]
struct TagsToSenders(BTreeMap<String, BTreeSet<String>>);

impl TreeVisitor for TagsToSenders {
    fn leaves(&mut self, _crumbs: &[String], entries: &[LeafEntry]) {
        for entry in entries {
            self.0
                .entry(entry.tag.clone())
                .or_default()
                .insert(entry.sender.clone());
        }
    }
}

#[derive(Default)]
struct SendersToTags(BTreeMap<String, BTreeSet<String>>);

impl TreeVisitor for SendersToTags {
    fn leaves(&mut self, _crumbs: &[String], entries: &[LeafEntry]) {
        for entry in entries {
            self.0
                .entry(entry.sender.clone())
                .or_default()
                .insert(entry.tag.clone());
        }
    }
}

#[derive(Default)]
struct Flatten(Vec<TagAndSender>);

impl TreeVisitor for Flatten {
    fn leaves(&mut self, crumbs: &[String], entries: &[LeafEntry]) {
        self.0.extend(entries.iter().map(|entry| TagAndSender {
            sender: entry.sender.clone(),
            tag: entry.tag.clone(),
            alerts: entry.alerts.clone(),
            crumbs: crumbs.to_vec(),
        }));
    }
}

/// Tag name to every sender reporting it anywhere in the tree.
pub fn tags_to_senders(raw: &Value) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut visitor = TagsToSenders::default();
    walk(raw, &mut visitor)?;
    Ok(visitor.0)
}

pub fn senders_to_tags(raw: &Value) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut visitor = SendersToTags::default();
    walk(raw, &mut visitor)?;
    Ok(visitor.0)
}

/// One record per leaf entry, in document order.
pub fn flatten(raw: &Value) -> Result<Vec<TagAndSender>> {
    let mut visitor = Flatten::default();
    walk(raw, &mut visitor)?;
    Ok(visitor.0)
}
