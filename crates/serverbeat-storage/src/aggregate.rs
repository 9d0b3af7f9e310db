use crate::AlertRecord;
use serde::Serialize;
use serverbeat_common::types::{join_crumbs, ServerbeatAlert, TrafficLight};
use std::collections::BTreeMap;

/// Subtag-level view: every alert evaluated for the subtag, folded into one
/// verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAlert {
    pub alert_names: Vec<String>,
    pub alert: ServerbeatAlert,
}

/// Folds `next` into `acc`: worst light wins, the earliest timestamp is kept.
fn fold_worst(acc: &mut ServerbeatAlert, next: &ServerbeatAlert) {
    acc.traffic_light = acc.traffic_light.max(next.traffic_light);
    acc.timestamp = acc.timestamp.min(next.timestamp);
}

fn summary(record: &AlertRecord) -> ServerbeatAlert {
    ServerbeatAlert::new(record.alert.traffic_light, "", record.alert.timestamp)
}

pub fn worst_by_crumbs(records: &[AlertRecord]) -> BTreeMap<String, ServerbeatAlert> {
    let mut grouped: BTreeMap<String, ServerbeatAlert> = BTreeMap::new();
    for record in records {
        let key = join_crumbs(&record.crumbs);
        match grouped.get_mut(&key) {
            Some(acc) => fold_worst(acc, &record.alert),
            None => {
                grouped.insert(key, summary(record));
            }
        }
    }
    grouped
}

pub fn worst_by_crumbs_and_tag(
    records: &[AlertRecord],
) -> BTreeMap<String, BTreeMap<String, ServerbeatAlert>> {
    let mut grouped: BTreeMap<String, BTreeMap<String, ServerbeatAlert>> = BTreeMap::new();
    for record in records {
        let by_tag = grouped.entry(join_crumbs(&record.crumbs)).or_default();
        match by_tag.get_mut(&record.tag) {
            Some(acc) => fold_worst(acc, &record.alert),
            None => {
                by_tag.insert(record.tag.clone(), summary(record));
            }
        }
    }
    grouped
}

/// Groups the alerts of one `(tag, sender)` whose crumbs key starts with the
/// key of `crumbs`, by subtag. Messages are joined with `,` in row order.
pub fn detailed_tag_alerts(
    records: &[AlertRecord],
    tag: &str,
    sender: &str,
    crumbs: &[String],
) -> BTreeMap<String, DetailedAlert> {
    let prefix = join_crumbs(crumbs);
    let mut grouped: BTreeMap<String, DetailedAlert> = BTreeMap::new();
    for record in records
        .iter()
        .filter(|r| r.tag == tag && r.sender == sender)
        .filter(|r| join_crumbs(&r.crumbs).starts_with(&prefix))
    {
        match grouped.get_mut(&record.subtag) {
            Some(detail) => {
                fold_worst(&mut detail.alert, &record.alert);
                detail.alert.message.push(',');
                detail.alert.message.push_str(&record.alert.message);
                detail.alert_names.push(record.alert_name.clone());
            }
            None => {
                grouped.insert(
                    record.subtag.clone(),
                    DetailedAlert {
                        alert_names: vec![record.alert_name.clone()],
                        alert: record.alert.clone(),
                    },
                );
            }
        }
    }
    grouped
}

/// The stored verdict, or GRAY when there is none.
pub fn or_gray(alert: Option<&ServerbeatAlert>) -> ServerbeatAlert {
    match alert {
        Some(alert) => alert.clone(),
        None => ServerbeatAlert::gray(None),
    }
}

/// Worst light over any set of verdicts; GRAY for an empty set.
pub fn worst_light<'a>(alerts: impl IntoIterator<Item = &'a ServerbeatAlert>) -> TrafficLight {
    alerts
        .into_iter()
        .map(|a| a.traffic_light)
        .max()
        .unwrap_or(TrafficLight::Gray)
}
