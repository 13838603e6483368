//! Operator trait and registry.
//!
//! Vertices name their compute step by tag; the [`OperatorRegistry`] resolves tags to
//! [`Operator`] implementations when a graph is compiled.
//! - Define custom operators by implementing [`Operator`].
//! - Start from [`OperatorRegistry::with_builtins`] to get the built-in set.
use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::Result;
use crate::graph::spec::Params;
use crate::graph::{ops, VertexId};
use crate::mask::{MapMask, MaskKind};

/// Everything an operator may read besides its masks.
#[derive(Clone, Debug)]
pub struct OpContext {
    pub stage: String,
    pub vertex: VertexId,
    /// Seed derived from the run seed, stage and vertex.
    pub seed: u64,
    pub params: Params,
}

impl OpContext {
    /// Fresh RNG for this vertex.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    pub fn param(&self, name: &str, default: f32) -> f32 {
        self.params.get(name, default)
    }
}

/// A compute step applied to one vertex mask.
pub trait Operator: Send + Sync {
    /// Check input and output kinds. The message is reported as a compile error.
    fn check(&self, inputs: &[MaskKind], output: MaskKind) -> std::result::Result<(), String>;

    /// Mutate `target` given the vertex inputs in declaration order.
    fn apply(&self, ctx: &OpContext, target: &mut MapMask, inputs: Vec<MapMask>) -> Result<()>;
}

/// Registry mapping operator tags to implementations.
#[non_exhaustive]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// Creates a new, empty [`OperatorRegistry`].
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Registry holding every built-in operator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        ops::register_builtins(&mut registry);
        registry
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Registers an operator under `tag`, replacing any previous one.
    pub fn register<O>(&mut self, tag: impl Into<String>, operator: O)
    where
        O: Operator + 'static,
    {
        self.operators.insert(tag.into(), Arc::new(operator));
    }

    pub fn register_arc(&mut self, tag: impl Into<String>, operator: Arc<dyn Operator>) {
        self.operators.insert(tag.into(), operator);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.operators.contains_key(tag)
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn Operator>> {
        self.operators.get(tag).cloned()
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fill(f32);

    impl Operator for Fill {
        fn check(&self, inputs: &[MaskKind], output: MaskKind) -> std::result::Result<(), String> {
            if inputs.is_empty() && output == MaskKind::Float {
                Ok(())
            } else {
                Err("fill takes no inputs and writes a float mask".into())
            }
        }

        fn apply(&self, _: &OpContext, target: &mut MapMask, _: Vec<MapMask>) -> Result<()> {
            target.as_float_mut()?.data_mut().fill(self.0);
            Ok(())
        }
    }

    #[test]
    fn builtins_cover_every_stage_operator() {
        let registry = OperatorRegistry::with_builtins();
        for tag in [
            "port",
            "noise",
            "smooth",
            "add",
            "multiply",
            "scale",
            "normalize",
            "one_minus",
            "slope",
            "threshold",
            "invert",
            "and",
            "and_not",
            "erode",
            "normal",
            "shadow",
            "splat",
            "scatter_poisson",
            "scatter_jitter",
        ] {
            assert!(registry.contains(tag), "missing built-in '{tag}'");
        }
        assert_eq!(registry.len(), 19);
    }

    #[test]
    fn custom_operators_can_be_registered() {
        let mut registry = OperatorRegistry::new();
        assert!(registry.is_empty());
        registry.register("fill", Fill(3.0));

        let op = registry.get("fill").expect("registered");
        let ctx = OpContext {
            stage: "test".into(),
            vertex: "v".into(),
            seed: 1,
            params: Params::new(),
        };
        let mut target = MapMask::empty(MaskKind::Float, 2, 2);
        op.apply(&ctx, &mut target, Vec::new()).unwrap();
        assert_eq!(target.as_float().unwrap().data(), &[3.0; 4]);
        assert!(op.check(&[MaskKind::Float], MaskKind::Float).is_err());
        assert_eq!(registry.tags(), vec!["fill"]);
    }
}
