//! Pipeline threads and their wiring.
//!
//! Three long-lived threads process frames in capture order: the
//! external sensor-sync producer, the feature worker and the mapping
//! worker. Each stage owns one queue; hand-off between stages goes
//! through delegates registered before the producer starts.

pub mod feature;
pub mod mapping;

pub use feature::{FeatureEvent, FeatureStage};
pub use mapping::{MappingHandle, MappingOutput, MappingStage};

use crate::config::PipelineConfig;
use crate::core::types::SyncedMessage;
use crate::engine::LoopClosure;
use crate::error::Result;
use crate::io::Fanout;

/// The assembled two-stage pipeline.
///
/// Construction validates the configuration, spawns both workers and
/// registers the feature delegate feeding the mapping queue; only
/// then may the upstream producer call [`ingest`].
///
/// [`ingest`]: Pipeline::ingest
pub struct Pipeline {
    feature: FeatureStage,
    mapping: MappingStage,
}

impl Pipeline {
    /// Validate `config` and start both stages.
    pub fn new(
        config: &PipelineConfig,
        loop_module: Option<Box<dyn LoopClosure>>,
        output: Box<dyn MappingOutput>,
    ) -> Result<Self> {
        config.validate()?;

        let mapping = MappingStage::spawn(config, loop_module, output)?;

        let mut delegate = Fanout::new();
        let handle = mapping.handle();
        delegate.append(move |event: &FeatureEvent| handle.push(event.clone()));
        let feature = FeatureStage::spawn(config, delegate)?;

        Ok(Self { feature, mapping })
    }

    /// Feed one synchronized message (the sensor-sync delegate target).
    pub fn ingest(&self, message: SyncedMessage) {
        self.feature.push(message);
    }

    /// Shut down both stages in pipeline order. The mapping stage
    /// drains its queue epilogue (trajectory dump) before returning.
    pub fn shutdown(self) {
        self.feature.shutdown();
        self.mapping.shutdown();
    }
}
