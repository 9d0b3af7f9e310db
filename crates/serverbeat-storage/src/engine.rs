use crate::database::Database;
use crate::error::{Result, StorageError};
use crate::{AlertRecord, AlertStore, SenderTag, SeriesAt, SignalStore};
use rusqlite::{params, params_from_iter, OptionalExtension};
use serverbeat_common::signal::{DataPoint, DataPointRecord, SignalRecord, TimeSeriesSignal};
use serverbeat_common::types::{join_crumbs, split_crumbs, ServerbeatAlert, TrafficLight};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
enum SignalTable {
    TimeSeries,
    Single,
}

impl SignalTable {
    fn name(self) -> &'static str {
        match self {
            Self::TimeSeries => "time_series_signal",
            Self::Single => "single_signal",
        }
    }
}

/// SQLite-backed [`SignalStore`] and [`AlertStore`].
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }

    fn timestamps(
        &self,
        table: SignalTable,
        project: &str,
        tag: &str,
        subtag: &str,
        senders: &[String],
    ) -> Result<Vec<i64>> {
        let sender_filter = if senders.is_empty() {
            String::new()
        } else {
            let placeholders = (0..senders.len())
                .map(|i| format!("?{}", i + 4))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" AND sender IN ({placeholders})")
        };
        let sql = format!(
            "SELECT DISTINCT signal_timestamp FROM {}
             WHERE project_id = ?1 AND serverbeat_tag = ?2 AND serverbeat_subtag = ?3{sender_filter}
             ORDER BY signal_timestamp ASC",
            table.name()
        );
        let values = [project, tag, subtag]
            .into_iter()
            .map(str::to_string)
            .chain(senders.iter().cloned());
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(rows)
        })
    }

    fn remove_older_than(&self, table: SignalTable, project: &str, cutoff: i64) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE project_id = ?1 AND signal_timestamp < ?2",
            table.name()
        );
        let removed = self
            .db
            .with_connection(|conn| Ok(conn.execute(&sql, params![project, cutoff])?))?;
        if removed > 0 {
            tracing::info!(project, table = table.name(), removed, cutoff, "Removed old signals");
        }
        Ok(removed)
    }
}

fn single_sender(senders: &[String]) -> Result<&str> {
    match senders {
        [sender] => Ok(sender.as_str()),
        _ => Err(StorageError::InvalidArgument(format!(
            "only one sender is supported, got {}",
            senders.len()
        ))),
    }
}

impl SignalStore for SqliteStore {
    fn get_time_series(
        &self,
        project: &str,
        tag: &str,
        subtag: &str,
        at: SeriesAt,
        senders: &[String],
    ) -> Result<Option<TimeSeriesSignal>> {
        let sender = single_sender(senders)?;
        let data: Option<String> = self.db.with_connection(|conn| {
            let data = match at {
                SeriesAt::At(ts) => conn
                    .query_row(
                        "SELECT signal_data FROM time_series_signal
                         WHERE project_id = ?1 AND serverbeat_tag = ?2 AND serverbeat_subtag = ?3
                           AND sender = ?4 AND signal_timestamp = ?5",
                        params![project, tag, subtag, sender, ts],
                        |row| row.get(0),
                    )
                    .optional()?,
                SeriesAt::Latest => conn
                    .query_row(
                        "SELECT signal_data FROM time_series_signal
                         WHERE project_id = ?1 AND serverbeat_tag = ?2 AND serverbeat_subtag = ?3
                           AND sender = ?4
                         ORDER BY signal_timestamp DESC
                         LIMIT 1",
                        params![project, tag, subtag, sender],
                        |row| row.get(0),
                    )
                    .optional()?,
            };
            Ok(data)
        })?;

        match data {
            Some(json) => {
                let record: SignalRecord = serde_json::from_str(&json)?;
                Ok(Some(TimeSeriesSignal::from_record(record, true)?))
            }
            None => Ok(None),
        }
    }

    fn get_single_as_time_series(
        &self,
        project: &str,
        tag: &str,
        subtag: &str,
        max_timestamp: i64,
        senders: &[String],
    ) -> Result<TimeSeriesSignal> {
        let sender = single_sender(senders)?;
        let rows = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT signal_timestamp, actual_status, actual_message, actual_timestamp, numeric_value
                 FROM (
                     SELECT *,
                         row_number() OVER (PARTITION BY actual_timestamp ORDER BY signal_timestamp DESC)
                             AS signal_row_number
                     FROM single_signal
                     WHERE project_id = ?1 AND serverbeat_tag = ?2 AND serverbeat_subtag = ?3
                       AND sender = ?4 AND signal_timestamp <= ?5
                 )
                 WHERE signal_row_number = 1
                 ORDER BY actual_timestamp ASC",
            )?;
            let rows = stmt
                .query_map(params![project, tag, subtag, sender, max_timestamp], |row| {
                    let signal_timestamp: i64 = row.get(0)?;
                    Ok((
                        signal_timestamp,
                        DataPointRecord {
                            status: row.get(1)?,
                            message: Some(row.get(2)?),
                            timestamp: row.get(3)?,
                            numeric_value: row.get(4)?,
                        },
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let signal_timestamp = rows
            .iter()
            .map(|(ts, _)| *ts)
            .max()
            .unwrap_or(max_timestamp);
        let points = rows
            .into_iter()
            .map(|(_, record)| DataPoint::from_record(record))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(TimeSeriesSignal::new(
            sender,
            points,
            signal_timestamp,
            tag,
            subtag,
            false,
        )?)
    }

    fn write_time_series_signal(&self, project: &str, signal: &TimeSeriesSignal) -> Result<()> {
        let data = serde_json::to_string(signal)?;
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO time_series_signal
                     (project_id, sender, serverbeat_tag, serverbeat_subtag, signal_data, signal_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (project_id, sender, serverbeat_tag, serverbeat_subtag, signal_timestamp)
                 DO UPDATE SET signal_data = excluded.signal_data",
                params![
                    project,
                    signal.sender(),
                    signal.tag(),
                    signal.subtag(),
                    data,
                    signal.signal_timestamp(),
                ],
            )?;
            Ok(())
        })
    }

    fn write_single_signal(&self, project: &str, signal: &TimeSeriesSignal) -> Result<()> {
        let point = match signal.data_points() {
            [point] => point.to_record(),
            points => {
                return Err(StorageError::InvalidArgument(format!(
                    "expected one data point for tag '{}' subtag '{}', got {}",
                    signal.tag(),
                    signal.subtag(),
                    points.len()
                )))
            }
        };
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO single_signal
                     (project_id, sender, serverbeat_tag, serverbeat_subtag, signal_timestamp,
                      actual_status, actual_message, actual_timestamp, numeric_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (project_id, sender, serverbeat_tag, serverbeat_subtag,
                              signal_timestamp, actual_timestamp)
                 DO UPDATE SET actual_status = excluded.actual_status,
                               actual_message = excluded.actual_message,
                               numeric_value = excluded.numeric_value",
                params![
                    project,
                    signal.sender(),
                    signal.tag(),
                    signal.subtag(),
                    signal.signal_timestamp(),
                    point.status,
                    point.message.unwrap_or_default(),
                    point.timestamp,
                    point.numeric_value,
                ],
            )?;
            Ok(())
        })
    }

    fn time_series_timestamps(
        &self,
        project: &str,
        tag: &str,
        subtag: &str,
        senders: &[String],
    ) -> Result<Vec<i64>> {
        self.timestamps(SignalTable::TimeSeries, project, tag, subtag, senders)
    }

    fn single_signal_timestamps(
        &self,
        project: &str,
        tag: &str,
        subtag: &str,
        senders: &[String],
    ) -> Result<Vec<i64>> {
        self.timestamps(SignalTable::Single, project, tag, subtag, senders)
    }

    fn tags_and_senders(&self, project: &str) -> Result<Vec<SenderTag>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT sender, serverbeat_tag FROM single_signal WHERE project_id = ?1
                 UNION
                 SELECT sender, serverbeat_tag FROM time_series_signal WHERE project_id = ?1
                 ORDER BY sender, serverbeat_tag",
            )?;
            let rows = stmt
                .query_map(params![project], |row| {
                    Ok(SenderTag {
                        sender: row.get(0)?,
                        tag: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn project_ids(&self) -> Result<Vec<String>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT project_id FROM single_signal
                 UNION
                 SELECT project_id FROM time_series_signal
                 ORDER BY project_id",
            )?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(rows)
        })
    }

    fn remove_time_series_older_than(&self, project: &str, cutoff: i64) -> Result<usize> {
        self.remove_older_than(SignalTable::TimeSeries, project, cutoff)
    }

    fn remove_single_signals_older_than(&self, project: &str, cutoff: i64) -> Result<usize> {
        self.remove_older_than(SignalTable::Single, project, cutoff)
    }
}

impl AlertStore for SqliteStore {
    fn write_alert(&self, record: &AlertRecord) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO alert
                     (project_id, crumbs, sender, serverbeat_tag, serverbeat_subtag, alert_name,
                      alert_status_code, alert_message, alert_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (project_id, crumbs, sender, serverbeat_tag, serverbeat_subtag, alert_name)
                 DO UPDATE SET alert_status_code = excluded.alert_status_code,
                               alert_message = excluded.alert_message,
                               alert_timestamp = excluded.alert_timestamp",
                params![
                    &record.project,
                    join_crumbs(&record.crumbs),
                    &record.sender,
                    &record.tag,
                    &record.subtag,
                    &record.alert_name,
                    record.alert.traffic_light.code(),
                    &record.alert.message,
                    record.alert.timestamp,
                ],
            )?;
            Ok(())
        })
    }

    fn delete_alerts_older_than(&self, project: &str, cutoff: i64) -> Result<usize> {
        self.db.with_connection(|conn| {
            Ok(conn.execute(
                "DELETE FROM alert WHERE project_id = ?1 AND alert_timestamp < ?2",
                params![project, cutoff],
            )?)
        })
    }

    fn list_alerts(&self, project: &str) -> Result<Vec<AlertRecord>> {
        let rows = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT crumbs, sender, serverbeat_tag, serverbeat_subtag, alert_name,
                        alert_status_code, alert_message, alert_timestamp
                 FROM alert
                 WHERE project_id = ?1
                 ORDER BY crumbs, sender, serverbeat_tag, serverbeat_subtag, alert_name",
            )?;
            let rows = stmt
                .query_map(params![project], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, i64>(7)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(
                |(crumbs, sender, tag, subtag, alert_name, code, message, timestamp)| {
                    let traffic_light = TrafficLight::from_code(code).ok_or(
                        StorageError::UnexpectedColumnType {
                            column: "alert_status_code",
                            expected: "a traffic light code (-1, 0, 1, 2)",
                        },
                    )?;
                    Ok(AlertRecord {
                        project: project.to_string(),
                        crumbs: split_crumbs(&crumbs),
                        sender,
                        tag,
                        subtag,
                        alert_name,
                        alert: ServerbeatAlert::new(traffic_light, message, timestamp),
                    })
                },
            )
            .collect()
    }
}
