//! Shared test utilities for tempora-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use tempora_core::{HistoryNaming, ManualClock};

    use crate::TemporaDb;
    use crate::service::HistoryService;

    /// Fixed start instant of the manual test clock.
    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    /// Create an in-memory HistoryService with default naming.
    pub async fn test_service() -> HistoryService {
        test_service_with_clock().await.0
    }

    /// Same as `test_service`, also returning the clock to advance it.
    pub async fn test_service_with_clock() -> (HistoryService, Arc<ManualClock>) {
        let db = TemporaDb::open_local(":memory:").await.unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let svc = HistoryService::from_db(db, HistoryNaming::default()).with_clock(clock.clone());
        (svc, clock)
    }

    /// `widget(id, name)` and `gadget(id, name, color)` with gadget
    /// inheriting widget.
    pub async fn widget_schema(svc: &HistoryService) {
        svc.db()
            .conn()
            .execute_batch(
                "CREATE TABLE widget (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT 'unnamed');
                 CREATE TABLE gadget (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT 'unnamed', color TEXT);",
            )
            .await
            .unwrap();
        svc.declare_inheritance("gadget", "widget").await.unwrap();
    }

    pub async fn count_rows(svc: &HistoryService, table: &str) -> i64 {
        let mut rows = svc
            .db()
            .conn()
            .query(&format!("SELECT COUNT(*) FROM \"{table}\""), ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    pub async fn history_columns(svc: &HistoryService, table: &str) -> Vec<String> {
        svc.introspector()
            .columns(svc.db().conn(), table)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect()
    }
}
