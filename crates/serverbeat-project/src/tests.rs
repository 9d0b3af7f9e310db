use crate::error::ProjectError;
use crate::graph::DependencyGraph;
use crate::tag::{SubtagConfig, SubtagType, TagConfig, TagDocument, TagTiming};
use crate::tree::{flatten, senders_to_tags, tags_to_senders, ProjectTree};
use crate::view::ProjectConfig;
use serde_yaml::Value;
use std::collections::BTreeSet;

const TREE: &str = r#"
a:
  tagsAndSenders:
    - tag: t
      sender: s
      alerts: {}
  b:
    tagsAndSenders:
      - tag: t
        sender: s2
        alerts:
          health: [default]
prod:
  ingest:
    kafka:
      - tag: lag
        sender: consumer-01
  retired: ~
  owner: data-platform
"#;

fn raw_tree() -> Value {
    serde_yaml::from_str(TREE).unwrap()
}

fn subtag(name: &str, is_default: bool) -> SubtagConfig {
    SubtagConfig {
        subtag_type: SubtagType::TimeSeries,
        subtag: name.into(),
        display_name: name.to_uppercase(),
        is_default,
        draw_missing: false,
    }
}

fn timing() -> TagTiming {
    TagTiming {
        frequency_minutes: 60,
        tolerance_minutes: 5,
        sla_minutes: 30,
        critical_window_minutes: 600,
    }
}

fn crumbs(path: &[&str]) -> Vec<String> {
    path.iter().map(|s| s.to_string()).collect()
}

#[test]
fn flatten_captures_crumbs_at_each_leaf() {
    let leaves = flatten(&raw_tree()).unwrap();
    assert_eq!(leaves.len(), 3);

    assert_eq!(leaves[0].crumbs, crumbs(&["a"]));
    assert_eq!(leaves[0].sender, "s");
    assert_eq!(leaves[0].alerts.as_ref().map(|a| a.len()), Some(0));

    assert_eq!(leaves[1].crumbs, crumbs(&["a", "b"]));
    let alerts = leaves[1].alerts.as_ref().unwrap();
    assert_eq!(alerts["health"], vec!["default".to_string()]);

    // a list under any other key is a leaf node of that name
    assert_eq!(leaves[2].crumbs, crumbs(&["prod", "ingest", "kafka"]));
    assert_eq!(leaves[2].alerts, None);
}

#[test]
fn tags_and_senders_maps_are_inverse() {
    let raw = raw_tree();
    let by_tag = tags_to_senders(&raw).unwrap();
    assert_eq!(
        by_tag["t"],
        BTreeSet::from(["s".to_string(), "s2".to_string()])
    );
    assert_eq!(by_tag["lag"], BTreeSet::from(["consumer-01".to_string()]));

    let by_sender = senders_to_tags(&raw).unwrap();
    assert_eq!(by_sender.len(), 3);
    assert_eq!(by_sender["s2"], BTreeSet::from(["t".to_string()]));
}

#[test]
fn materialized_tree_mirrors_document() {
    let tree = ProjectTree::from_value(&raw_tree()).unwrap();
    let names: Vec<&str> = tree.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["a", "prod"]);

    let a = tree.find(&crumbs(&["a"])).unwrap();
    assert_eq!(a.tags_and_senders.len(), 1);
    assert_eq!(a.children.len(), 1);

    let b = tree.find(&crumbs(&["a", "b"])).unwrap();
    assert_eq!(b.crumbs, crumbs(&["a", "b"]));
    assert_eq!(b.tags_and_senders[0].sender, "s2");

    let kafka = tree.find(&crumbs(&["prod", "ingest", "kafka"])).unwrap();
    assert_eq!(kafka.tags_and_senders[0].tag, "lag");
    assert!(kafka.children.is_empty());

    // null children still become nodes, scalars do not
    assert!(tree.find(&crumbs(&["prod", "retired"])).is_some());
    assert!(tree.find(&crumbs(&["prod", "owner"])).is_none());
}

#[test]
fn root_level_leaves_have_empty_crumbs() {
    let raw: Value = serde_yaml::from_str(
        "tagsAndSenders:\n  - { tag: t, sender: s }\nx:\n  tagsAndSenders: []\n",
    )
    .unwrap();
    let leaves = flatten(&raw).unwrap();
    assert_eq!(leaves.len(), 1);
    assert!(leaves[0].crumbs.is_empty());

    let tree = ProjectTree::from_value(&raw).unwrap();
    assert_eq!(tree.tags_and_senders.len(), 1);
    assert_eq!(tree.nodes.len(), 1);
}

#[test]
fn empty_document_has_no_leaves() {
    assert!(flatten(&Value::Null).unwrap().is_empty());
}

#[test]
fn malformed_leaf_is_rejected() {
    let raw: Value = serde_yaml::from_str("a:\n  tagsAndSenders:\n    - { tag: t }\n").unwrap();
    let err = flatten(&raw).unwrap_err();
    match err {
        ProjectError::MalformedTree { path, .. } => assert_eq!(path, "a"),
        other => panic!("unexpected error {other:?}"),
    }

    let scalar_root = Value::String("nope".into());
    assert!(matches!(
        ProjectTree::from_value(&scalar_root),
        Err(ProjectError::MalformedTree { .. })
    ));
}

#[test]
fn tag_config_needs_exactly_one_default() {
    let err = TagConfig::new(
        "t",
        "T",
        "",
        timing(),
        vec![subtag("x", false), subtag("y", false)],
        vec![],
    )
    .unwrap_err();
    assert_eq!(
        err,
        ProjectError::DefaultSubtag {
            tag: "t".into(),
            found: 0
        }
    );

    let err = TagConfig::new(
        "t",
        "T",
        "",
        timing(),
        vec![subtag("x", true), subtag("y", true)],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, ProjectError::DefaultSubtag { found: 2, .. }));
}

#[test]
fn subtag_lookup() {
    let config = TagConfig::new(
        "t",
        "T",
        "",
        timing(),
        vec![subtag("x", false), subtag("y", true)],
        vec![],
    )
    .unwrap();
    assert_eq!(config.default_subtag().subtag, "y");
    assert!(config.has_subtag("x"));
    assert!(!config.has_subtag("z"));
    assert_eq!(config.subtag_config("x").unwrap().display_name, "X");
    assert_eq!(
        config.subtag_config("z").unwrap_err(),
        ProjectError::UnknownSubtag {
            tag: "t".into(),
            subtag: "z".into()
        }
    );
}

#[test]
fn subtag_predicates() {
    let single = SubtagConfig::create_default(SubtagType::SingleWithSize);
    assert!(single.is_single());
    assert!(single.has_numeric_value());
    assert!(!single.is_time_series());
    assert_eq!(single.subtag, "default");
    assert!(single.draw_missing);

    let series = SubtagConfig::create_default(SubtagType::TimeSeries);
    assert!(series.is_time_series());
    assert!(!series.has_numeric_value());
}

#[test]
fn simple_tag_document_gets_default_subtag() {
    let doc: TagDocument = serde_yaml::from_str(
        r#"
type: time_series
display_name: Partitions
description: daily partitions
frequency: 1440
tolerance: 60
sla: 120
critical_window: 10080
dependencies: [upstream]
"#,
    )
    .unwrap();
    let config = TagConfig::from_document("partitions", doc).unwrap();
    assert_eq!(config.subtags().len(), 1);
    assert_eq!(config.default_subtag().subtag_type, SubtagType::TimeSeries);
    assert_eq!(config.timing.frequency_minutes, 1440);
    assert_eq!(config.timing.critical_window_minutes, 10080);
    assert_eq!(config.dependencies, vec!["upstream".to_string()]);
}

#[test]
fn multi_tag_document_lists_subtags() {
    let doc: TagDocument = serde_yaml::from_str(
        r#"
type: multi
frequency: 60
sla: 30
subtags:
  - { type: single, subtag: marker, display_name: Marker, is_default: true, draw_missing: true }
  - { type: single_with_size, subtag: size, display_name: Size }
"#,
    )
    .unwrap();
    let config = TagConfig::from_document("files", doc).unwrap();
    assert_eq!(config.subtags().len(), 2);
    assert_eq!(config.default_subtag().subtag, "marker");
    assert!(config.subtag_config("size").unwrap().has_numeric_value());
    assert!(!config.subtag_config("size").unwrap().draw_missing);
    assert_eq!(config.timing.tolerance_minutes, 0);
}

#[test]
fn tag_document_type_errors() {
    let multi_without_subtags = TagDocument {
        kind: "multi".into(),
        ..Default::default()
    };
    assert_eq!(
        TagConfig::from_document("m", multi_without_subtags).unwrap_err(),
        ProjectError::MissingSubtags("m".into())
    );

    let single_with_subtags = TagDocument {
        kind: "single".into(),
        subtags: Some(vec![]),
        ..Default::default()
    };
    assert_eq!(
        TagConfig::from_document("s", single_with_subtags).unwrap_err(),
        ProjectError::UnexpectedSubtags("s".into())
    );

    let unknown = TagDocument {
        kind: "histogram".into(),
        ..Default::default()
    };
    assert!(matches!(
        TagConfig::from_document("h", unknown).unwrap_err(),
        ProjectError::UnknownTagType { .. }
    ));
}

#[test]
fn dependency_graph_links_dependencies_to_dependents() {
    let raw = raw_tree();
    let by_tag = tags_to_senders(&raw).unwrap();
    let t = TagConfig::new(
        "t",
        "T",
        "",
        timing(),
        vec![subtag("default", true)],
        vec!["lag".into(), "lag".into()],
    )
    .unwrap();
    let lag = TagConfig::new(
        "lag",
        "Lag",
        "",
        timing(),
        vec![subtag("default", true)],
        vec![],
    )
    .unwrap();

    let graph = DependencyGraph::build([&t, &lag], &by_tag);
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[0].tag, "lag");
    assert_eq!(graph.nodes[1].senders, vec!["s".to_string(), "s2".to_string()]);
    assert_eq!(graph.links.len(), 1);
    assert_eq!(graph.dependents_of("lag"), vec!["t"]);
    assert_eq!(graph.dependencies_of("t"), vec!["lag"]);
    assert!(graph.dependents_of("t").is_empty());
}

#[test]
fn project_config_reads_snake_case_keys() {
    let config: ProjectConfig =
        serde_yaml::from_str("available_views: [tree, graph]\ndefault_view: tree\n").unwrap();
    assert_eq!(config.default_view.as_deref(), Some("tree"));
    assert!(config.available_views.is_some());
}
