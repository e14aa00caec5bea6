//! Metrics/tracing hooks.
//!
//! Events go through `tracing` only; exporting them is up to the binary that
//! installs a subscriber.

/// Emit one metric event with key/value fields under a `sluice` span.
pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::span!(tracing::Level::TRACE, "sluice", event);
    let _entered = span.enter();
    for (k, v) in key_values {
        tracing::trace!(%event, %k, %v, "metric");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitting_without_subscriber_is_harmless() {
        emit_span("pipeline_run", &[("steps", "3".to_string())]);
    }
}
