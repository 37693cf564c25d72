//! Shared helpers for integration tests.

use meshrelay::classify::StaticClassifier;
use meshrelay::pipeline::IngestionPipeline;
use meshrelay::store::{self, StoreReader};

/// Pipeline with the static classifier and no relay, plus a reader on its store.
#[allow(dead_code)]
pub fn offline_pipeline(capacity: usize) -> (IngestionPipeline, StoreReader) {
    let (writer, reader) = store::shared(capacity);
    (
        IngestionPipeline::new(writer, StaticClassifier.into()),
        reader,
    )
}
