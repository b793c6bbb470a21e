//! Stage abstraction and the fit-with-cache wrapper
//!
//! A stage declares the capabilities it has as separate facets
//! ([`Fittable`], [`Transformable`], [`Predictable`]). Anything that can
//! compute, persist and restore an output implements [`CachedStage`] and
//! runs through [`compute_cached`], the only place where the
//! cache-or-recompute decision is made.

use crate::checkpoint::{Checkpoint, CheckpointChain, CheckpointState, Dependency};
use crate::error::CkptResult;
use crate::hash::{digest_of, ParamMap};
use serde::Serialize;
use std::marker::PhantomData;
use tracing::info;

/// Parameter introspection shared by every stage
pub trait Stage {
    /// Display and checkpoint name
    fn name(&self) -> String;

    /// Current parameter values
    fn params(&self) -> ParamMap;

    /// Constructor defaults
    fn default_params(&self) -> ParamMap {
        ParamMap::new()
    }

    /// Parameters whose current value differs from the default
    fn changed_params(&self) -> ParamMap {
        let defaults = self.default_params();
        self.params()
            .into_iter()
            .filter(|(key, value)| defaults.get(key) != Some(value))
            .collect()
    }
}

/// A stage that learns state from `(x, y)` and can save it
pub trait Fittable<X, Y>: Stage {
    fn fit(&mut self, x: &X, y: Option<&Y>) -> CkptResult<()>;

    fn save_model(&self, checkpoint: &Checkpoint) -> CkptResult<()>;

    fn load_model(&mut self, checkpoint: &Checkpoint) -> CkptResult<()>;
}

pub trait Transformable<X, Y>: Stage {
    fn transform(&self, x: X, y: Option<Y>) -> CkptResult<(X, Option<Y>)>;
}

pub trait Predictable<X, Y>: Stage {
    fn predict(&self, x: &X) -> CkptResult<Y>;
}

/// A fittable stage usable inside a [`crate::pipeline::Pipeline`]
///
/// Stages expose the other facets they support by overriding the
/// accessors.
pub trait PipelineStage<X, Y>: Fittable<X, Y> {
    fn as_transformable(&self) -> Option<&dyn Transformable<X, Y>> {
        None
    }

    fn as_predictable(&self) -> Option<&dyn Predictable<X, Y>> {
        None
    }
}

/// An expensive computation whose output can be cached in a checkpoint
pub trait CachedStage: Stage {
    /// Hashed as an opaque dependency of the checkpoint
    type Input: Serialize + ?Sized;
    type Output;

    fn checkpoint_name(&self) -> String {
        self.name()
    }

    fn compute(&mut self, input: &Self::Input) -> CkptResult<Self::Output>;

    fn persist(&self, checkpoint: &Checkpoint, output: &Self::Output) -> CkptResult<()>;

    fn restore(&mut self, checkpoint: &Checkpoint) -> CkptResult<Self::Output>;
}

/// Restore `stage`'s output from its checkpoint or compute and persist it
///
/// The checkpoint is appended to `chain`, keyed by the stage's changed
/// parameters and a digest of `input`. An address already resolved in
/// this chain is always restored, never recomputed.
pub fn compute_cached<S: CachedStage + ?Sized>(
    chain: &mut CheckpointChain,
    stage: &mut S,
    input: &S::Input,
) -> CkptResult<S::Output> {
    let require_complete = chain.context().config().checkpoints.require_complete;
    let dependencies = vec![Dependency::Digest(digest_of(input)?)];
    let checkpoint = chain.add(stage.checkpoint_name(), stage.changed_params(), dependencies);

    let scope = checkpoint.acquire()?;
    let address = scope.address()?.to_string();
    let state = scope.state()?;

    if chain.is_resolved(&address) || state.is_hit(require_complete) {
        info!(
            "Loading checkpoint for {} from {}",
            scope.name(),
            scope.path()?.display()
        );
        let output = stage.restore(&scope)?;
        chain.mark_resolved(&address);
        return Ok(output);
    }

    if state == CheckpointState::Building {
        scope.clear()?;
    }

    let output = stage.compute(input)?;
    info!(
        "Saving checkpoint for {} to {}",
        scope.name(),
        scope.path()?.display()
    );
    stage.persist(&scope, &output)?;
    scope.seal()?;
    chain.mark_resolved(&address);

    Ok(output)
}

/// Training data as hashed into a fit checkpoint
#[derive(Debug, Serialize)]
pub struct FitInput<'a, X, Y> {
    pub x: &'a X,
    pub y: Option<&'a Y>,
}

/// Adapts a [`Fittable`] stage to [`CachedStage`] under `<name>.fit`
pub struct FitStep<'s, 'a, X, Y, S: ?Sized> {
    stage: &'s mut S,
    _data: PhantomData<FitInput<'a, X, Y>>,
}

impl<'s, X, Y, S: Fittable<X, Y> + ?Sized> FitStep<'s, '_, X, Y, S> {
    pub fn new(stage: &'s mut S) -> Self {
        Self {
            stage,
            _data: PhantomData,
        }
    }
}

impl<X, Y, S: Fittable<X, Y> + ?Sized> Stage for FitStep<'_, '_, X, Y, S> {
    fn name(&self) -> String {
        self.stage.name()
    }

    fn params(&self) -> ParamMap {
        self.stage.params()
    }

    fn default_params(&self) -> ParamMap {
        self.stage.default_params()
    }

    fn changed_params(&self) -> ParamMap {
        self.stage.changed_params()
    }
}

impl<'a, X, Y, S> CachedStage for FitStep<'_, 'a, X, Y, S>
where
    X: Serialize,
    Y: Serialize,
    S: Fittable<X, Y> + ?Sized,
{
    type Input = FitInput<'a, X, Y>;
    type Output = ();

    fn checkpoint_name(&self) -> String {
        format!("{}.fit", self.stage.name())
    }

    fn compute(&mut self, input: &Self::Input) -> CkptResult<()> {
        self.stage.fit(input.x, input.y)
    }

    fn persist(&self, checkpoint: &Checkpoint, _output: &()) -> CkptResult<()> {
        self.stage.save_model(checkpoint)
    }

    fn restore(&mut self, checkpoint: &Checkpoint) -> CkptResult<()> {
        self.stage.load_model(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Context};
    use crate::error::CkptError;
    use serde_json::json;
    use tempfile::TempDir;

    /// Sums its input, counting how often it really ran
    struct Summer {
        scale: f64,
        computed: usize,
        restored: usize,
        write_nothing: bool,
    }

    impl Summer {
        fn new(scale: f64) -> Self {
            Self {
                scale,
                computed: 0,
                restored: 0,
                write_nothing: false,
            }
        }
    }

    impl Stage for Summer {
        fn name(&self) -> String {
            "Summer".to_string()
        }

        fn params(&self) -> ParamMap {
            let mut params = ParamMap::new();
            params.insert("scale".to_string(), json!(self.scale));
            params
        }

        fn default_params(&self) -> ParamMap {
            let mut params = ParamMap::new();
            params.insert("scale".to_string(), json!(1.0));
            params
        }
    }

    impl CachedStage for Summer {
        type Input = [f64];
        type Output = f64;

        fn compute(&mut self, input: &[f64]) -> CkptResult<f64> {
            self.computed += 1;
            Ok(input.iter().sum::<f64>() * self.scale)
        }

        fn persist(&self, checkpoint: &Checkpoint, output: &f64) -> CkptResult<()> {
            if self.write_nothing {
                return Ok(());
            }
            checkpoint.write_json("sum.json", output)
        }

        fn restore(&mut self, checkpoint: &Checkpoint) -> CkptResult<f64> {
            self.restored += 1;
            checkpoint.read_json("sum.json")
        }
    }

    fn ctx(dir: &TempDir) -> Context {
        Context::new(dir.path(), Config::default())
    }

    #[test]
    fn changed_params_hides_defaults() {
        assert!(Summer::new(1.0).changed_params().is_empty());
        assert_eq!(Summer::new(2.0).changed_params()["scale"], json!(2.0));
    }

    #[test]
    fn computes_then_restores_across_runs() {
        let dir = TempDir::new().unwrap();
        let input = [1.0, 2.0, 3.0];

        let mut first = Summer::new(2.0);
        let mut chain = CheckpointChain::new(&ctx(&dir));
        assert_eq!(compute_cached(&mut chain, &mut first, &input[..]).unwrap(), 12.0);
        assert_eq!(first.computed, 1);
        assert!(chain.last().unwrap().exists().unwrap());

        // Fresh chain and stage, as in a new process
        let mut second = Summer::new(2.0);
        let mut chain = CheckpointChain::new(&ctx(&dir));
        assert_eq!(compute_cached(&mut chain, &mut second, &input[..]).unwrap(), 12.0);
        assert_eq!(second.computed, 0);
        assert_eq!(second.restored, 1);
    }

    #[test]
    fn different_input_recomputes() {
        let dir = TempDir::new().unwrap();
        let mut stage = Summer::new(1.0);

        let mut chain = CheckpointChain::new(&ctx(&dir));
        compute_cached(&mut chain, &mut stage, &[1.0][..]).unwrap();
        let mut chain = CheckpointChain::new(&ctx(&dir));
        compute_cached(&mut chain, &mut stage, &[2.0][..]).unwrap();

        assert_eq!(stage.computed, 2);
    }

    #[test]
    fn failed_compute_leaves_no_directory() {
        struct Failing;

        impl Stage for Failing {
            fn name(&self) -> String {
                "Failing".to_string()
            }

            fn params(&self) -> ParamMap {
                ParamMap::new()
            }
        }

        impl CachedStage for Failing {
            type Input = ();
            type Output = ();

            fn compute(&mut self, _input: &()) -> CkptResult<()> {
                Err(CkptError::User("diverged".to_string()))
            }

            fn persist(&self, _checkpoint: &Checkpoint, _output: &()) -> CkptResult<()> {
                Ok(())
            }

            fn restore(&mut self, _checkpoint: &Checkpoint) -> CkptResult<()> {
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let mut chain = CheckpointChain::new(&ctx(&dir));

        assert!(compute_cached(&mut chain, &mut Failing, &()).is_err());
        assert!(!chain.last().unwrap().path().unwrap().exists());
    }

    #[test]
    fn resolved_address_is_not_recomputed() {
        let dir = TempDir::new().unwrap();
        let mut stage = Summer::new(1.0);
        stage.write_nothing = true;

        let mut chain = CheckpointChain::new(&ctx(&dir));
        compute_cached(&mut chain, &mut stage, &[1.0][..]).unwrap();

        // The first checkpoint materialized nothing, so the second one
        // lands on the same address and must restore instead of computing
        let err = compute_cached(&mut chain, &mut stage, &[1.0][..]).unwrap_err();
        assert!(matches!(err, CkptError::CheckpointFileMissing(_)));
        assert_eq!(
            chain.get(0).unwrap().address().unwrap(),
            chain.get(1).unwrap().address().unwrap()
        );
        assert_eq!(stage.computed, 1);
        assert_eq!(stage.restored, 1);
    }

    #[test]
    fn require_complete_recomputes_partial_entry() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.checkpoints.require_complete = true;
        let ctx = Context::new(dir.path(), config);
        let input = [4.0];

        // Simulate an interrupted run: payload written, never sealed
        let probe = Checkpoint::new(&ctx, "Summer", ParamMap::new())
            .with_dependency(Dependency::Digest(digest_of(&input[..]).unwrap()));
        probe.write_json("sum.json", &999.0).unwrap();
        assert_eq!(probe.state().unwrap(), CheckpointState::Building);

        let mut stage = Summer::new(1.0);
        let mut chain = CheckpointChain::new(&ctx);
        assert_eq!(compute_cached(&mut chain, &mut stage, &input[..]).unwrap(), 4.0);
        assert_eq!(stage.computed, 1);
        assert_eq!(probe.state().unwrap(), CheckpointState::Complete);
    }

    #[test]
    fn partial_entry_is_a_stale_hit_by_default() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        let input = [4.0];

        let probe = Checkpoint::new(&ctx, "Summer", ParamMap::new())
            .with_dependency(Dependency::Digest(digest_of(&input[..]).unwrap()));
        probe.write_json("sum.json", &999.0).unwrap();

        let mut stage = Summer::new(1.0);
        let mut chain = CheckpointChain::new(&ctx);
        assert_eq!(compute_cached(&mut chain, &mut stage, &input[..]).unwrap(), 999.0);
        assert_eq!(stage.computed, 0);
    }
}
