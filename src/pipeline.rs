//! The tersify pipeline: check, scan, plan, render.

use tersify_ir::{StructuralChecker, scan_module};
use tracing::{debug, info, trace};

use crate::checker::SyntaxChecker;
use crate::errors::TersifyResult;
use crate::rewrite::{AliasOrder, BindingOrigin, RewritePlan};

/// Configured rewriter.
///
/// The default uses the built-in [`StructuralChecker`] and emits
/// declarations in first-occurrence order.
pub struct Tersifier {
    checker: Box<dyn SyntaxChecker>,
    order: AliasOrder,
}

impl Default for Tersifier {
    fn default() -> Self {
        Self {
            checker: Box::new(StructuralChecker),
            order: AliasOrder::default(),
        }
    }
}

impl Tersifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checker(mut self, checker: impl SyntaxChecker + 'static) -> Self {
        self.checker = Box::new(checker);
        self
    }

    pub fn with_alias_order(mut self, order: AliasOrder) -> Self {
        self.order = order;
        self
    }

    /// Check and scan `text` and bind every encoding in it, without
    /// rendering.
    pub fn plan(&self, text: &str) -> TersifyResult<RewritePlan> {
        self.checker.check(text)?;
        let module = scan_module(text)?;
        let plan = RewritePlan::build(&module);

        for (key, binding) in plan.bindings() {
            match binding.origin {
                BindingOrigin::Hoisted => debug!(alias = %binding.name, %key, "new alias"),
                BindingOrigin::Declared => debug!(alias = %binding.name, %key, "reusing declared alias"),
            }
        }
        for replacement in plan.replacements() {
            trace!(
                start = replacement.span.start,
                end = replacement.span.end,
                alias = %replacement.alias,
                "replacing encoding literal"
            );
        }
        Ok(plan)
    }

    /// Rewrite `text`, hoisting every distinct encoding into an alias.
    pub fn run(&self, text: &str) -> TersifyResult<String> {
        let plan = self.plan(text)?;
        let output = plan.apply(text, self.order);
        info!(
            occurrences = plan.replacements().len(),
            aliases = plan.hoisted(self.order).len(),
            "tersified module"
        );
        Ok(output)
    }
}

/// Rewrite `text` with the default options.
pub fn tersify(text: &str) -> TersifyResult<String> {
    Tersifier::default().run(text)
}
