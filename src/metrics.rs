use lazy_static::lazy_static;
use prometheus::{opts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    // 기본 레지스트리에 자동 등록하지 않고 register_custom_metrics 에서 수동으로 등록한다.

    /// Matches currently owned by a running `MatchActor`.
    pub static ref ACTIVE_MATCHES: IntGauge =
        IntGauge::with_opts(opts!("active_matches", "Number of matches currently running")).unwrap();

    pub static ref MATCHES_CREATED_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("matches_created_total", "Total number of matches created")).unwrap();

    pub static ref MATCHES_FINISHED_TOTAL: IntCounterVec =
        IntCounterVec::new(Opts::new("matches_finished_total", "Finished matches by outcome"), &["reason"]).unwrap();

    /// Active websocket connections.
    pub static ref ACTIVE_WS_CONNECTIONS: IntGauge =
        IntGauge::with_opts(opts!("active_ws_connections", "Number of active websocket connections")).unwrap();

    pub static ref ACTIONS_TOTAL: IntCounterVec =
        IntCounterVec::new(Opts::new("actions_total", "Submitted intents by kind and result"), &["intent", "result"]).unwrap();

    pub static ref CARDS_USED_TOTAL: IntCounterVec =
        IntCounterVec::new(Opts::new("cards_used_total", "Arcana activations by card"), &["card"]).unwrap();

    pub static ref REVEAL_TIMEOUTS_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("reveal_timeouts_total", "Reveals finalized by the fallback timer")).unwrap();

    pub static ref AI_TIMEOUTS_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("ai_timeouts_total", "AI turns forfeited after the think timeout")).unwrap();

    pub static ref ABNORMAL_INVALID_PAYLOAD_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("abnormal_invalid_payload_total", "Client messages that failed to parse")).unwrap();
}

pub fn register_custom_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(ACTIVE_MATCHES.clone()))?;
    registry.register(Box::new(MATCHES_CREATED_TOTAL.clone()))?;
    registry.register(Box::new(MATCHES_FINISHED_TOTAL.clone()))?;
    registry.register(Box::new(ACTIVE_WS_CONNECTIONS.clone()))?;
    registry.register(Box::new(ACTIONS_TOTAL.clone()))?;
    registry.register(Box::new(CARDS_USED_TOTAL.clone()))?;
    registry.register(Box::new(REVEAL_TIMEOUTS_TOTAL.clone()))?;
    registry.register(Box::new(AI_TIMEOUTS_TOTAL.clone()))?;
    registry.register(Box::new(ABNORMAL_INVALID_PAYLOAD_TOTAL.clone()))?;
    Ok(())
}

/// Thin handle passed around in `AppState`, mirroring the free metrics.
pub struct MetricsCtx;

impl MetricsCtx {
    pub fn new() -> Self {
        Self
    }

    pub fn match_created(&self) {
        MATCHES_CREATED_TOTAL.inc();
        ACTIVE_MATCHES.inc();
    }

    pub fn match_closed(&self) {
        ACTIVE_MATCHES.dec();
    }

    pub fn match_finished(&self, reason: &str) {
        MATCHES_FINISHED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn action(&self, intent: &str, result: &str) {
        ACTIONS_TOTAL.with_label_values(&[intent, result]).inc();
    }

    pub fn card_used(&self, card: &str) {
        CARDS_USED_TOTAL.with_label_values(&[card]).inc();
    }

    pub fn reveal_timeout(&self) {
        REVEAL_TIMEOUTS_TOTAL.inc();
    }

    pub fn ai_timeout(&self) {
        AI_TIMEOUTS_TOTAL.inc();
    }

    pub fn ws_connected(&self) {
        ACTIVE_WS_CONNECTIONS.inc();
    }

    pub fn ws_disconnected(&self) {
        ACTIVE_WS_CONNECTIONS.dec();
    }

    pub fn invalid_payload(&self) {
        ABNORMAL_INVALID_PAYLOAD_TOTAL.inc();
    }
}

impl Default for MetricsCtx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_metrics_register_once_per_registry() {
        let registry = Registry::new();
        register_custom_metrics(&registry).unwrap();
        assert!(register_custom_metrics(&registry).is_err());
    }
}
