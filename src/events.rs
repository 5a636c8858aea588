/// Test-lifecycle event emission: the adapter-agnostic replacement for the
/// original's direct Datadog API calls (`sendDatadogEvent` in
/// `accelerator.py`). Delivery to a real Datadog endpoint is out of scope —
/// same class of exclusion as the cloud provider client itself — so the only
/// concrete sink shipped here emits a structured `tracing` event carrying the
/// same title/text/tags fields the original sent.
use crate::config::DatadogConfig;

#[derive(Debug, Clone)]
pub struct RunEvent {
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: RunEvent) {}
}

pub struct TracingEventSink {
    extra_tags: Vec<String>,
}

impl TracingEventSink {
    pub fn new(extra_tags: Vec<String>) -> Self {
        Self { extra_tags }
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, event: RunEvent) {
        let mut tags = event.tags;
        tags.extend(self.extra_tags.iter().cloned());
        tracing::info!(title = %event.title, text = %event.text, tags = ?tags, "run event");
    }
}

/// Build the sink a run should use: a no-op unless `datadog.enable` is set.
pub fn sink_for(config: &DatadogConfig) -> Box<dyn EventSink> {
    if config.enable {
        Box::new(TracingEventSink::new(config.tags.clone()))
    } else {
        Box::new(NoopEventSink)
    }
}

pub fn test_start_event(run_name: &str, tests: &[String]) -> RunEvent {
    RunEvent {
        title: format!("cloudpunch-{run_name} test started"),
        text: format!("running tests: {}", tests.join(", ")),
        tags: vec![format!("run:{run_name}")],
    }
}

pub fn test_end_event(run_name: &str, reporter_count: usize) -> RunEvent {
    RunEvent {
        title: format!("cloudpunch-{run_name} test completed"),
        text: format!("{reporter_count} workers reported results"),
        tags: vec![format!("run:{run_name}")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_does_not_panic() {
        NoopEventSink.emit(test_start_event("123", &["ping".into()]));
    }

    #[test]
    fn sink_for_picks_tracing_sink_only_when_enabled() {
        let disabled = DatadogConfig::default();
        let _ = sink_for(&disabled);

        let enabled = DatadogConfig {
            enable: true,
            api_key: None,
            tags: vec!["env:test".into()],
        };
        let sink = sink_for(&enabled);
        sink.emit(test_end_event("123", 4));
    }
}
