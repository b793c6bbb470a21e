//! Ordered checkpoints of one pipeline run

use crate::checkpoint::slot::{Checkpoint, Dependency};
use crate::config::Context;
use crate::error::CkptResult;
use crate::hash::ParamMap;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Checkpoints where position `i` is chained after position `i - 1`
///
/// The chain owns its checkpoints; each one only holds a weak back
/// reference to its predecessor. Addresses must be resolved strictly in
/// chain order, after the predecessor's output has been written.
#[derive(Debug)]
pub struct CheckpointChain {
    ctx: Context,
    checkpoints: Vec<Rc<Checkpoint>>,
    resolved: RefCell<HashSet<String>>,
}

impl CheckpointChain {
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            checkpoints: Vec::new(),
            resolved: RefCell::new(HashSet::new()),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Append a checkpoint chained after the current last one
    pub fn add(
        &mut self,
        name: impl Into<String>,
        params: ParamMap,
        dependencies: Vec<Dependency>,
    ) -> Rc<Checkpoint> {
        let mut checkpoint = Checkpoint::new(&self.ctx, name, params).with_dependencies(dependencies);
        if let Some(last) = self.checkpoints.last() {
            checkpoint = checkpoint.after(last);
        }

        let checkpoint = Rc::new(checkpoint);
        self.checkpoints.push(Rc::clone(&checkpoint));
        checkpoint
    }

    pub fn last(&self) -> Option<&Rc<Checkpoint>> {
        self.checkpoints.last()
    }

    pub fn get(&self, index: usize) -> Option<&Rc<Checkpoint>> {
        self.checkpoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Checkpoint>> {
        self.checkpoints.iter()
    }

    /// Addresses in chain order
    pub fn addresses(&self) -> CkptResult<Vec<String>> {
        self.checkpoints
            .iter()
            .map(|c| c.address().map(str::to_string))
            .collect()
    }

    /// Record that `address` was computed or restored in this traversal
    ///
    /// Returns false if it had already been resolved.
    pub fn mark_resolved(&self, address: &str) -> bool {
        self.resolved.borrow_mut().insert(address.to_string())
    }

    pub fn is_resolved(&self, address: &str) -> bool {
        self.resolved.borrow().contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use tempfile::TempDir;

    fn lr(value: f64) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("lr".to_string(), json!(value));
        params
    }

    #[test]
    fn successors_differ_from_predecessors() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::new(dir.path(), Config::default());
        let mut chain = CheckpointChain::new(&ctx);

        let first = chain.add("test", lr(0.1), vec![]);
        first.write_bytes("test", b"test\n").unwrap();

        let second = chain.add("test", lr(0.1), vec![]);
        assert_ne!(first.address().unwrap(), second.address().unwrap());
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn predecessor_bytes_propagate_downstream() {
        let run = |payload: &[u8]| -> Vec<String> {
            let dir = TempDir::new().unwrap();
            let ctx = Context::new(dir.path(), Config::default());
            let mut chain = CheckpointChain::new(&ctx);

            let first = chain.add("load", lr(0.1), vec![]);
            first.write_bytes("data", payload).unwrap();

            let second = chain.add("fit", lr(0.1), vec![]);
            second.write_bytes("model", &[&b"model-"[..], payload].concat()).unwrap();

            chain.add("score", ParamMap::new(), vec![]);
            chain.addresses().unwrap()
        };

        let original = run(b"v1");
        let same = run(b"v1");
        let bugfix = run(b"v2");

        assert_eq!(original, same);
        // Stage 1 config is unchanged, so only its own address is stable
        assert_eq!(original[0], bugfix[0]);
        assert_ne!(original[1], bugfix[1]);
        assert_ne!(original[2], bugfix[2]);
    }

    #[test]
    fn identical_intermediate_bytes_stop_invalidation() {
        let run = |payload: &[u8]| -> Vec<String> {
            let dir = TempDir::new().unwrap();
            let ctx = Context::new(dir.path(), Config::default());
            let mut chain = CheckpointChain::new(&ctx);

            let first = chain.add("load", lr(0.1), vec![]);
            first.write_bytes("data", payload).unwrap();

            let second = chain.add("fit", lr(0.1), vec![]);
            second.write_bytes("model", b"same").unwrap();

            chain.add("score", ParamMap::new(), vec![]);
            chain.addresses().unwrap()
        };

        let original = run(b"v1");
        let changed = run(b"v2");

        assert_ne!(original[1], changed[1]);
        // Only the immediate predecessor's files feed an address
        assert_eq!(original[2], changed[2]);
    }

    #[test]
    fn predecessor_file_order_is_sorted() {
        let addresses = |names: [&str; 2]| -> String {
            let dir = TempDir::new().unwrap();
            let ctx = Context::new(dir.path(), Config::default());
            let mut chain = CheckpointChain::new(&ctx);

            let first = chain.add("load", ParamMap::new(), vec![]);
            first.write_bytes(names[0], names[0].as_bytes()).unwrap();
            first.write_bytes(names[1], names[1].as_bytes()).unwrap();

            let second = chain.add("fit", ParamMap::new(), vec![]);
            second.address().unwrap().to_string()
        };

        assert_eq!(addresses(["a", "b"]), addresses(["b", "a"]));
    }

    #[test]
    fn resolved_tracking() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::new(dir.path(), Config::default());
        let chain = CheckpointChain::new(&ctx);

        assert!(!chain.is_resolved("abc"));
        assert!(chain.mark_resolved("abc"));
        assert!(!chain.mark_resolved("abc"));
        assert!(chain.is_resolved("abc"));
    }
}
