//! Stream Selector
//!
//! One normalizer invocation per stream kind against shared decoded metadata.
//! Calls hold no state between them, so the three kinds may be selected in
//! any order or concurrently.

use std::sync::Arc;
use telex_common::{DecodedMetadata, DeviceTelemetry, StreamKind};
use tracing::debug;

use crate::services::telemetry_normalizer::{
    NormalizeError, NormalizeOptions, NormalizerPolicy, TelemetryNormalizer,
};

#[derive(Clone)]
pub struct StreamSelector {
    normalizer: Arc<dyn TelemetryNormalizer>,
    policy: NormalizerPolicy,
}

impl StreamSelector {
    pub fn new(normalizer: Arc<dyn TelemetryNormalizer>) -> Self {
        Self {
            normalizer,
            policy: NormalizerPolicy::DEFAULT,
        }
    }

    /// Normalize `metadata` for `kind` and keep only that stream
    ///
    /// **Errors:** [`NormalizeError::StreamAbsent`] when no device carries the
    /// stream; a missing stream never degrades to an empty table.
    pub async fn select(
        &self,
        metadata: &DecodedMetadata,
        kind: StreamKind,
    ) -> Result<DeviceTelemetry, NormalizeError> {
        let options = NormalizeOptions::for_stream(kind, &self.policy);
        let telemetry = self
            .normalizer
            .normalize(metadata, &options)
            .await?
            .scoped_to(kind.tag());

        if !telemetry.contains_stream(kind.tag()) {
            return Err(NormalizeError::StreamAbsent(kind));
        }

        debug!(
            stream = %kind,
            devices = telemetry.devices.len(),
            samples = telemetry.sample_count(),
            "Stream selected"
        );
        Ok(telemetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns the same multi-stream telemetry whatever is asked for
    struct VerboseNormalizer {
        seen: Mutex<Vec<NormalizeOptions>>,
    }

    #[async_trait]
    impl TelemetryNormalizer for VerboseNormalizer {
        async fn normalize(
            &self,
            _metadata: &DecodedMetadata,
            options: &NormalizeOptions,
        ) -> Result<DeviceTelemetry, NormalizeError> {
            self.seen.lock().unwrap().push(options.clone());
            Ok(DeviceTelemetry::try_from(json!({
                "1": {"streams": {
                    "GPS5": {"samples": [{"cts": 0}]},
                    "ACCL": {"samples": [{"cts": 0}, {"cts": 5}]}
                }}
            }))
            .unwrap())
        }
    }

    fn selector() -> (StreamSelector, Arc<VerboseNormalizer>) {
        let normalizer = Arc::new(VerboseNormalizer {
            seen: Mutex::new(Vec::new()),
        });
        (StreamSelector::new(normalizer.clone()), normalizer)
    }

    #[tokio::test]
    async fn test_select_scopes_to_requested_stream() {
        let (selector, normalizer) = selector();
        let metadata = DecodedMetadata::new(json!({}));

        let telemetry = selector.select(&metadata, StreamKind::Acceleration).await.unwrap();
        assert!(telemetry.contains_stream("ACCL"));
        assert!(!telemetry.contains_stream("GPS5"));
        assert_eq!(telemetry.sample_count(), 2);

        let seen = normalizer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].stream, "ACCL");
        assert_eq!(seen[0].gps_fix, 2);
        assert_eq!(seen[0].gps_precision, 500);
    }

    #[tokio::test]
    async fn test_absent_stream_is_an_error() {
        let (selector, _) = selector();
        let metadata = DecodedMetadata::new(json!({}));

        let err = selector.select(&metadata, StreamKind::AngularRate).await.unwrap_err();
        assert!(matches!(err, NormalizeError::StreamAbsent(StreamKind::AngularRate)));
    }

    #[tokio::test]
    async fn test_concurrent_selection_is_independent() {
        let (selector, normalizer) = selector();
        let metadata = DecodedMetadata::new(json!({}));

        let (gps, accl) = tokio::join!(
            selector.select(&metadata, StreamKind::Position),
            selector.select(&metadata, StreamKind::Acceleration),
        );
        assert_eq!(gps.unwrap().sample_count(), 1);
        assert_eq!(accl.unwrap().sample_count(), 2);
        assert_eq!(normalizer.seen.lock().unwrap().len(), 2);
    }
}
