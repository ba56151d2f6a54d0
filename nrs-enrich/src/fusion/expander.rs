// Reference Expander - follows cross-references between sources
//
// Each pass walks the registry in order. For every route, the scan covers the
// working list as it grows, so references appended by the route currently
// scanning are picked up in the same pass, while references appended by a
// later route wait for the next pass (fixed-point mode) or are never
// dispatched (single-pass mode).

use super::{Fragment, ResolutionSettings};
use crate::error::{EnrichError, Result};
use crate::services::{AdapterRegistry, Dispatch};
use crate::types::{Reference, ReferenceKey};
use nrs_common::config::{ErrorPolicy, ExpansionStrategy};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Result of expanding one entry's references
#[derive(Debug)]
pub struct Expansion {
    /// Seeds followed by every discovered reference, in discovery order
    pub references: Vec<Reference>,
    /// One fragment per successful load, ordered by route
    pub fragments: Vec<Fragment>,
    pub passes: usize,
    /// False when the pass bound stopped expansion with work pending
    pub converged: bool,
    /// Adapter failures downgraded to "no data"
    pub isolated_failures: usize,
}

pub async fn expand_references(
    registry: &AdapterRegistry,
    settings: &ResolutionSettings,
    entry_id: &str,
    seeds: Vec<Reference>,
) -> Result<Expansion> {
    let max_passes = match settings.expansion {
        ExpansionStrategy::SinglePass => 1,
        ExpansionStrategy::FixedPoint => settings.max_passes.max(1),
    };

    let mut working = seeds;
    let mut visited: HashSet<(usize, ReferenceKey)> = HashSet::new();
    let mut fragments = Vec::new();
    let mut isolated_failures = 0;
    let mut passes = 0;

    let converged = loop {
        passes += 1;

        for (route_index, route) in registry.routes().iter().enumerate() {
            let mut cursor = 0;
            while cursor < working.len() {
                let reference = working[cursor].clone();
                cursor += 1;

                if registry.route_index(&reference.name) != Some(route_index) {
                    continue;
                }
                if !visited.insert((route_index, reference.key())) {
                    continue;
                }

                debug!("{}: dispatching {} via {}", entry_id, reference, route.label());
                let dispatch = match route.adapter().dispatch(&reference.src).await {
                    Ok(dispatch) => dispatch,
                    Err(error) => match settings.error_policy {
                        ErrorPolicy::Abort => {
                            return Err(EnrichError::Upstream {
                                entry_id: entry_id.to_string(),
                                source_name: route.label().to_string(),
                                reference: reference.src.clone(),
                                error,
                            });
                        }
                        ErrorPolicy::Isolate => {
                            warn!(
                                "{}: adapter '{}' failed on {} ({}), treating as no data",
                                entry_id,
                                route.label(),
                                reference.src,
                                error
                            );
                            isolated_failures += 1;
                            continue;
                        }
                    },
                };

                match dispatch {
                    Dispatch::Unrecognized => {
                        debug!("{}: {} not recognized by {}", entry_id, reference.src, route.label());
                    }
                    Dispatch::NoData => {
                        debug!("{}: no data behind {}", entry_id, reference.src);
                    }
                    Dispatch::Record(record) => {
                        working.extend(record.references().iter().map(|discovered| {
                            let mut discovered = discovered.clone();
                            discovered.mark_generated(settings.generated_by.as_str());
                            discovered
                        }));
                        fragments.push(Fragment {
                            route_index,
                            source: route.label().to_string(),
                            record,
                        });
                    }
                }
            }
        }

        let pending = working
            .iter()
            .filter_map(|reference| {
                registry
                    .route_index(&reference.name)
                    .map(|index| (index, reference.key()))
            })
            .filter(|slot| !visited.contains(slot))
            .count();

        if pending == 0 {
            break true;
        }
        if passes >= max_passes {
            match settings.expansion {
                ExpansionStrategy::FixedPoint => warn!(
                    "{}: expansion stopped after {} passes with {} references pending",
                    entry_id, passes, pending
                ),
                ExpansionStrategy::SinglePass => debug!(
                    "{}: single pass left {} references undispatched",
                    entry_id, pending
                ),
            }
            break false;
        }
    };

    // Merge precedence follows registry order, not discovery order
    fragments.sort_by_key(|fragment| fragment.route_index);

    Ok(Expansion {
        references: working,
        fragments,
        passes,
        converged,
        isolated_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AdapterError, AdapterResult};
    use crate::services::Adapter;
    use crate::types::{ArtistRecord, ServiceRecord};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves canned artist records keyed by URL and counts loads
    #[derive(Default)]
    struct LinkAdapter {
        links: HashMap<String, Vec<Reference>>,
        failing: Vec<String>,
        loads: AtomicUsize,
    }

    impl LinkAdapter {
        fn link(mut self, url: &str, to: Vec<Reference>) -> Self {
            self.links.insert(url.to_string(), to);
            self
        }
    }

    #[async_trait]
    impl Adapter for Arc<LinkAdapter> {
        type Url = String;

        async fn parse_url(&self, raw: &str) -> AdapterResult<Option<String>> {
            Ok(raw.starts_with("https://").then(|| raw.to_string()))
        }

        async fn load(&self, url: &String) -> AdapterResult<Option<ServiceRecord>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(url) {
                return Err(AdapterError::UpstreamShape(format!("bad payload at {}", url)));
            }
            Ok(self.links.get(url).map(|references| {
                ServiceRecord::Artist(ArtistRecord {
                    title: Some(url.clone()),
                    references: references.clone(),
                })
            }))
        }
    }

    fn settings(expansion: ExpansionStrategy, error_policy: ErrorPolicy) -> ResolutionSettings {
        ResolutionSettings {
            error_policy,
            expansion,
            max_passes: 8,
            generated_by: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_route_discoveries_followed_in_one_pass() {
        let a = Arc::new(
            LinkAdapter::default()
                .link("https://a/1", vec![Reference::new("a", "https://a/2")])
                .link("https://a/2", vec![]),
        );
        let registry = AdapterRegistry::new().with_prefix("a", Arc::clone(&a));

        let expansion = expand_references(
            &registry,
            &settings(ExpansionStrategy::SinglePass, ErrorPolicy::Abort),
            "M-X",
            vec![Reference::new("a", "https://a/1")],
        )
        .await
        .unwrap();

        assert_eq!(expansion.fragments.len(), 2);
        assert_eq!(expansion.passes, 1);
        assert!(expansion.converged);
        assert_eq!(expansion.references[1].provenance(), crate::types::Provenance::Generated);
        assert_eq!(expansion.references[0].provenance(), crate::types::Provenance::Manual);
    }

    #[tokio::test]
    async fn test_single_pass_undershoots_backward_reference() {
        // b discovers an a reference after a has finished scanning
        let a = Arc::new(LinkAdapter::default().link("https://a/1", vec![]));
        let b = Arc::new(
            LinkAdapter::default().link("https://b/1", vec![Reference::new("a", "https://a/1")]),
        );
        let registry = AdapterRegistry::new()
            .with_prefix("a", Arc::clone(&a))
            .with_prefix("b", Arc::clone(&b));
        let seeds = vec![Reference::new("b", "https://b/1")];

        let single = expand_references(
            &registry,
            &settings(ExpansionStrategy::SinglePass, ErrorPolicy::Abort),
            "M-X",
            seeds.clone(),
        )
        .await
        .unwrap();
        assert_eq!(single.fragments.len(), 1);
        assert!(!single.converged);

        let fixed = expand_references(
            &registry,
            &settings(ExpansionStrategy::FixedPoint, ErrorPolicy::Abort),
            "M-X",
            seeds,
        )
        .await
        .unwrap();
        assert_eq!(fixed.fragments.len(), 2);
        assert_eq!(fixed.passes, 2);
        assert!(fixed.converged);
        // Route order, not discovery order
        assert_eq!(fixed.fragments[0].source, "a");
        assert_eq!(fixed.fragments[1].source, "b");
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let a = Arc::new(
            LinkAdapter::default().link("https://a/1", vec![Reference::new("b", "https://b/1")]),
        );
        let b = Arc::new(
            LinkAdapter::default().link("https://b/1", vec![Reference::new("a", "https://a/1")]),
        );
        let registry = AdapterRegistry::new()
            .with_prefix("a", Arc::clone(&a))
            .with_prefix("b", Arc::clone(&b));

        let expansion = expand_references(
            &registry,
            &settings(ExpansionStrategy::FixedPoint, ErrorPolicy::Abort),
            "M-X",
            vec![Reference::new("a", "https://a/1")],
        )
        .await
        .unwrap();

        assert!(expansion.converged);
        assert_eq!(a.loads.load(Ordering::SeqCst), 1);
        assert_eq!(b.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_policy() {
        let a = Arc::new(LinkAdapter {
            failing: vec!["https://a/bad".to_string()],
            ..LinkAdapter::default()
                .link("https://a/1", vec![])
                .link("https://a/2", vec![])
        });
        let registry = AdapterRegistry::new().with_prefix("a", Arc::clone(&a));
        let seeds = vec![
            Reference::new("a", "https://a/1"),
            Reference::new("a", "https://a/bad"),
            Reference::new("a", "https://a/2"),
        ];

        let aborted = expand_references(
            &registry,
            &settings(ExpansionStrategy::FixedPoint, ErrorPolicy::Abort),
            "M-X",
            seeds.clone(),
        )
        .await;
        match aborted {
            Err(EnrichError::Upstream {
                entry_id,
                source_name,
                reference,
                ..
            }) => {
                assert_eq!(entry_id, "M-X");
                assert_eq!(source_name, "a");
                assert_eq!(reference, "https://a/bad");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }

        let isolated = expand_references(
            &registry,
            &settings(ExpansionStrategy::FixedPoint, ErrorPolicy::Isolate),
            "M-X",
            seeds,
        )
        .await
        .unwrap();
        assert_eq!(isolated.fragments.len(), 2);
        assert_eq!(isolated.isolated_failures, 1);
    }

    #[tokio::test]
    async fn test_unroutable_and_unrecognized_are_skipped() {
        let a = Arc::new(LinkAdapter::default().link("https://a/1", vec![]));
        let registry = AdapterRegistry::new().with_prefix("a", Arc::clone(&a));

        let expansion = expand_references(
            &registry,
            &settings(ExpansionStrategy::FixedPoint, ErrorPolicy::Abort),
            "M-X",
            vec![
                Reference::new("twitter", "https://twitter.com/x"),
                Reference::new("a", "spotify:album:x"),
                Reference::new("a", "https://a/unknown"),
            ],
        )
        .await
        .unwrap();

        assert!(expansion.fragments.is_empty());
        assert_eq!(expansion.references.len(), 3);
        assert!(expansion.converged);
        assert_eq!(a.loads.load(Ordering::SeqCst), 1);
    }
}
