//! Last computed transform + flattened series, published as whole
//! generations.

use std::sync::Arc;

use crate::flatten::FlattenedSeries;
use crate::matrix::TransformMatrix;
use crate::selection::BaseRequest;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheGeneration {
    pub generation: u64,
    /// Selection this generation was computed for
    pub request: BaseRequest,
    /// Fingerprint of the p-value table the transform was computed from
    pub source: String,
    pub logs: TransformMatrix,
    pub flattened: FlattenedSeries,
    pub logs_fingerprint: String,
    pub flattened_fingerprint: String,
}

/// Readers get an `Arc` to a complete generation; a new generation replaces
/// the pointer, never the contents of the old one.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    current: Option<Arc<CacheGeneration>>,
    published: u64,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<CacheGeneration>> {
        self.current.clone()
    }

    /// Number the next published generation will carry.
    pub fn next_generation(&self) -> u64 {
        self.published + 1
    }

    pub fn publish(&mut self, generation: CacheGeneration) -> Arc<CacheGeneration> {
        let gen = Arc::new(generation);
        self.published = self.published.max(gen.generation);
        self.current = Some(Arc::clone(&gen));
        gen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use crate::matrix::PValueMatrix;
    use crate::transform::pairwise_transform;

    fn generation(n: u64, base: &str) -> CacheGeneration {
        let m = PValueMatrix::from_rows(&["A", "B"], &[1.0, 0.1, 0.1, 1.0], 1e-9).unwrap();
        let logs = pairwise_transform(&m, &[base.to_string()], 1e-9).unwrap();
        CacheGeneration {
            generation: n,
            request: BaseRequest::Variables(vec![base.to_string()]),
            source: "pvalues".to_string(),
            flattened: flatten(&logs),
            logs,
            logs_fingerprint: format!("logs-{}", n),
            flattened_fingerprint: format!("flat-{}", n),
        }
    }

    #[test]
    fn test_publish_swaps_without_touching_readers() {
        let mut cache = ArtifactCache::new();
        assert!(cache.current().is_none());
        assert_eq!(cache.next_generation(), 1);

        let first = cache.publish(generation(cache.next_generation(), "A"));
        let reader = cache.current().unwrap();
        assert!(Arc::ptr_eq(&first, &reader));

        let second = cache.publish(generation(cache.next_generation(), "B"));
        assert_eq!(second.generation, 2);
        // The old reader still sees the complete first generation.
        assert_eq!(reader.generation, 1);
        assert_eq!(reader.request, BaseRequest::Variables(vec!["A".to_string()]));
        assert!(Arc::ptr_eq(&cache.current().unwrap(), &second));
    }
}
