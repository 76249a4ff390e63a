//! Event sinks for harvest progress
//!
//! The pipeline reports every stage through [`EventSink::emit_event`].
//! Sinks never fail the run: delivery problems are logged and dropped.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::domain::events::HarvestEvent;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit_event(&self, event: HarvestEvent);
}

/// Renders events as structured log lines
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit_event(&self, event: HarvestEvent) {
        let name = event.event_name();
        match &event {
            HarvestEvent::RunStarted { units_planned, .. } => {
                info!(event = name, units_planned, "Harvest run started");
            }
            HarvestEvent::UnitStarted { unit, urls_planned } => {
                info!(event = name, unit = %unit, urls_planned, "Unit started");
            }
            HarvestEvent::UnitStateChanged { unit, state } => {
                debug!(event = name, unit = %unit, state = %state, "Unit state changed");
            }
            HarvestEvent::FetchFailed { unit, url } => {
                warn!(event = name, unit = %unit, url = %url, "Fetch failed, advancing plan");
            }
            HarvestEvent::StrategyEvaluated { unit, url, attempt } => {
                debug!(
                    event = name,
                    unit = %unit,
                    url = %url,
                    strategy = %attempt.strategy,
                    containers = attempt.containers_found,
                    extracted = attempt.candidates_extracted,
                    validated = attempt.validated,
                    kept = attempt.kept,
                    "Strategy evaluated"
                );
            }
            HarvestEvent::DiagnosticsCaptured { unit, url, summary } => {
                warn!(event = name, unit = %unit, url = %url, "No records extracted: {}", summary);
            }
            HarvestEvent::UnitDeduplicated { unit, before, after } => {
                debug!(event = name, unit = %unit, before, after, "Unit deduplicated");
            }
            HarvestEvent::UnitPersisted { unit, saved, total } => {
                info!(event = name, unit = %unit, saved, total, "Unit persisted");
            }
            HarvestEvent::UnitFinished { unit, state, records } => {
                info!(event = name, unit = %unit, state = %state, records, "Unit finished");
            }
            HarvestEvent::RunFinished {
                units_completed,
                total_records,
                cancelled,
                ..
            } => {
                info!(event = name, units_completed, total_records, cancelled, "Harvest run finished");
            }
        }
    }
}

/// Forwards events to an external observer over an unbounded channel
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<HarvestEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HarvestEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit_event(&self, event: HarvestEvent) {
        let name = event.event_name();
        if self.sender.send(event).is_err() {
            debug!("Event receiver dropped, discarding {}", name);
        }
    }
}

/// Keeps every event in memory
#[derive(Clone, Default)]
pub struct CollectingEventSink {
    events: Arc<RwLock<Vec<HarvestEvent>>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<HarvestEvent> {
        self.events.read().await.clone()
    }

    pub async fn names(&self) -> Vec<&'static str> {
        self.events.read().await.iter().map(HarvestEvent::event_name).collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit_event(&self, event: HarvestEvent) {
        self.events.write().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{UnitKey, UnitState};
    use crate::domain::product::Category;

    fn finished() -> HarvestEvent {
        HarvestEvent::UnitFinished {
            unit: UnitKey::new("KBDfans", Category::Keycaps),
            state: UnitState::Exhausted,
            records: 0,
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut receiver) = ChannelEventSink::new();
        sink.emit_event(finished()).await;
        assert_eq!(receiver.recv().await, Some(finished()));
    }

    #[tokio::test]
    async fn test_channel_sink_survives_dropped_receiver() {
        let (sink, receiver) = ChannelEventSink::new();
        drop(receiver);
        sink.emit_event(finished()).await;
    }

    #[tokio::test]
    async fn test_collecting_sink_behind_shared_handle() {
        let sink = Arc::new(CollectingEventSink::new());
        let shared: Arc<dyn EventSink> = sink.clone();
        shared.emit_event(finished()).await;
        TracingEventSink.emit_event(finished()).await;
        assert_eq!(sink.names().await, vec!["unit-finished"]);
    }
}
