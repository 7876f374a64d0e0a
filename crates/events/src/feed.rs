//! Filtered subscriptions over the [`EventBus`](crate::bus::EventBus).

use labflow_core::error::CoreError;
use labflow_core::types::DbId;
use tokio::sync::broadcast;

use crate::bus::{ChangeEvent, WATCHABLE_TABLES};

/// Which changes a subscriber wants: one table, optionally one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: String,
    pub row_id: Option<DbId>,
}

impl ChangeFilter {
    /// Build a filter, rejecting tables that are not watchable.
    pub fn new(table: &str, row_id: Option<DbId>) -> Result<Self, CoreError> {
        if !WATCHABLE_TABLES.contains(&table) {
            return Err(CoreError::Validation(format!(
                "Unknown table '{table}'. Must be one of: {}",
                WATCHABLE_TABLES.join(", ")
            )));
        }
        Ok(Self {
            table: table.to_string(),
            row_id,
        })
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && self.row_id.map_or(true, |id| id == event.row_id)
    }
}

/// A receiver that yields only the events matching its filter.
pub struct ChangeSubscription {
    filter: ChangeFilter,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    pub fn new(filter: ChangeFilter, receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { filter, receiver }
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Wait for the next matching event.
    ///
    /// Events missed because the subscriber lagged are skipped with a
    /// warning. Returns `None` once the bus is dropped.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        table = %self.filter.table,
                        "Change subscription lagged, some events were skipped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventBus, TABLE_LAB_SCRIPTS, TABLE_PATIENTS};

    #[test]
    fn unknown_table_rejected() {
        assert!(ChangeFilter::new("users", None).is_err());
    }

    #[test]
    fn row_filter_narrows_table_filter() {
        let table_only = ChangeFilter::new(TABLE_LAB_SCRIPTS, None).unwrap();
        let one_row = ChangeFilter::new(TABLE_LAB_SCRIPTS, Some(5)).unwrap();
        let e5 = ChangeEvent::updated(TABLE_LAB_SCRIPTS, 5);
        let e6 = ChangeEvent::updated(TABLE_LAB_SCRIPTS, 6);
        let other = ChangeEvent::updated(TABLE_PATIENTS, 5);

        assert!(table_only.matches(&e5) && table_only.matches(&e6));
        assert!(one_row.matches(&e5));
        assert!(!one_row.matches(&e6));
        assert!(!one_row.matches(&other));
    }

    #[tokio::test]
    async fn subscription_skips_non_matching_events() {
        let bus = EventBus::default();
        let mut sub = ChangeSubscription::new(
            ChangeFilter::new(TABLE_LAB_SCRIPTS, Some(2)).unwrap(),
            bus.subscribe(),
        );
        bus.publish(ChangeEvent::updated(TABLE_PATIENTS, 2));
        bus.publish(ChangeEvent::updated(TABLE_LAB_SCRIPTS, 1));
        bus.publish(ChangeEvent::updated(TABLE_LAB_SCRIPTS, 2));

        let event = sub.next().await.unwrap();
        assert_eq!((event.table.as_str(), event.row_id), (TABLE_LAB_SCRIPTS, 2));
    }

    #[tokio::test]
    async fn lagged_subscription_recovers() {
        let bus = EventBus::new(2);
        let mut sub = ChangeSubscription::new(
            ChangeFilter::new(TABLE_LAB_SCRIPTS, None).unwrap(),
            bus.subscribe(),
        );
        for id in 1..=5 {
            bus.publish(ChangeEvent::updated(TABLE_LAB_SCRIPTS, id));
        }
        let event = sub.next().await.unwrap();
        assert_eq!(event.row_id, 4);
    }

    #[tokio::test]
    async fn closed_bus_ends_subscription() {
        let bus = EventBus::default();
        let mut sub = ChangeSubscription::new(
            ChangeFilter::new(TABLE_PATIENTS, None).unwrap(),
            bus.subscribe(),
        );
        drop(bus);
        assert!(sub.next().await.is_none());
    }
}
