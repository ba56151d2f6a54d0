// Resolution Module - expand references, then merge fragments
//
// Architecture: Expander (Registry + Adapters) → Fragments → Merge Resolver →
// Aggregate Record

pub mod expander;
pub mod merger;

pub use expander::{expand_references, Expansion};
pub use merger::merge_fragments;

use crate::error::Result;
use crate::services::AdapterRegistry;
use crate::types::{AggregateRecord, Reference, ServiceRecord};
use nrs_common::config::{EnrichConfig, ErrorPolicy, ExpansionStrategy};
use tracing::info;

/// One adapter's contribution to an entry
#[derive(Debug)]
pub struct Fragment {
    /// Position of the producing route in the registry
    pub route_index: usize,
    /// Route label, for logs
    pub source: String,
    pub record: ServiceRecord,
}

/// Resolution knobs, derived from `[enrich]` configuration
#[derive(Debug, Clone)]
pub struct ResolutionSettings {
    pub error_policy: ErrorPolicy,
    pub expansion: ExpansionStrategy,
    pub max_passes: usize,
    /// Value written into `generatedBy` on references the engine adds
    pub generated_by: String,
}

impl ResolutionSettings {
    pub fn from_config(config: &EnrichConfig) -> Self {
        Self {
            error_policy: config.error_policy,
            expansion: config.expansion,
            max_passes: config.max_passes,
            generated_by: config
                .generated_by
                .clone()
                .unwrap_or_else(default_generated_by),
        }
    }
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self::from_config(&EnrichConfig::default())
    }
}

/// Tag identifying this build and run
fn default_generated_by() -> String {
    format!(
        "nrs-enrich {}-{:x}",
        env!("CARGO_PKG_VERSION"),
        chrono::Utc::now().timestamp()
    )
}

/// Outcome of resolving one entry
#[derive(Debug)]
pub struct Resolution {
    /// `None` when no adapter produced data
    pub aggregate: Option<AggregateRecord>,
    pub passes: usize,
    pub converged: bool,
    pub isolated_failures: usize,
}

/// Expand `seeds` through the registry and merge what comes back
pub async fn resolve_references(
    registry: &AdapterRegistry,
    settings: &ResolutionSettings,
    entry_id: &str,
    seeds: Vec<Reference>,
) -> Result<Resolution> {
    let seed_count = seeds.len();
    let expansion = expand_references(registry, settings, entry_id, seeds).await?;

    info!(
        "{}: {} seed references expanded to {} in {} passes, {} fragments",
        entry_id,
        seed_count,
        expansion.references.len(),
        expansion.passes,
        expansion.fragments.len()
    );

    let aggregate = merge_fragments(expansion.fragments, expansion.references);

    Ok(Resolution {
        aggregate,
        passes: expansion.passes,
        converged: expansion.converged,
        isolated_failures: expansion.isolated_failures,
    })
}
