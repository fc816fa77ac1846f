//! Service modules for the telemetry extraction pipeline
//!
//! External collaborators (metadata decoder, telemetry normalizer) sit behind
//! traits; everything else is the request pipeline and its storage.

pub mod artifact_store;
pub mod csv_formatter;
pub mod diagnostics;
pub mod external_tool;
pub mod extraction_orchestrator;
pub mod metadata_decoder;
pub mod retention;
pub mod stream_selector;
pub mod telemetry_combiner;
pub mod telemetry_normalizer;
pub mod upload_staging;

pub use artifact_store::{
    artifact_name, ArtifactDescriptor, ArtifactStore, PendingArtifact, ResponseManifest, WriteError,
};
pub use csv_formatter::{format_stream, format_stream_in};
pub use diagnostics::DiagnosticsDump;
pub use external_tool::{run_tool, ToolError};
pub use extraction_orchestrator::{ExtractionError, ExtractionOrchestrator, ExtractionRequest};
pub use metadata_decoder::{CommandDecoder, DecodeError, MetadataDecoder};
pub use retention::{spawn_sweeper, sweep_expired, SweepReport};
pub use stream_selector::StreamSelector;
pub use telemetry_combiner::{combine_files, combine_tables, CombineError, StreamTables};
pub use telemetry_normalizer::{
    CommandNormalizer, NormalizeError, NormalizeOptions, NormalizerPolicy, TelemetryNormalizer,
};
pub use upload_staging::{display_base_name, StagedUpload, StagingError, UploadStager};
