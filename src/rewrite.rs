//! Rewrite engine: turns a scanned module into aliased text.
//!
//! A [`RewritePlan`] binds each canonical key to one alias name, in the order
//! keys are first seen, and records which alias replaces every occurrence.
//! Rendering the plan splices the alias references into the original text
//! and prepends a declaration for every binding the input did not already
//! declare.

use indexmap::IndexMap;
use tersify_ir::{CanonicalKey, EncodingLiteral, ScannedModule, Span};

use crate::namer::AliasNamer;

/// Order of the declarations prepended to the module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AliasOrder {
    /// The order in which encodings first appear in the module.
    #[default]
    FirstOccurrence,
    /// Sorted by alias name, the way `mlir-opt` prints aliases.
    Alphabetical,
}

/// Where an alias binding came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingOrigin {
    /// Declared in the input; reused, never re-emitted.
    Declared,
    /// Created by this run; emitted as a new declaration.
    Hoisted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasBinding {
    pub name: String,
    /// The spelling the alias was named after.
    pub literal: EncodingLiteral,
    pub origin: BindingOrigin,
}

impl AliasBinding {
    /// The declaration this binding emits.
    pub fn declaration(&self) -> String {
        render_declaration(&self.name, &self.literal)
    }
}

/// One occurrence and the alias that replaces it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub span: Span,
    pub alias: String,
}

#[derive(Clone, Debug, Default)]
pub struct RewritePlan {
    bindings: IndexMap<CanonicalKey, AliasBinding>,
    replacements: Vec<Replacement>,
}

impl RewritePlan {
    /// Bind every encoding in `module` to an alias.
    ///
    /// Existing encoding aliases are bound first so that literals equal to
    /// them reuse the declared name. When the input declares the same
    /// encoding twice, the first declaration wins.
    pub fn build(module: &ScannedModule) -> Self {
        let mut namer = AliasNamer::new(module.identifiers.iter().cloned());
        let mut bindings = IndexMap::new();

        for declaration in &module.declarations {
            let Some(literal) = &declaration.encoding else {
                continue;
            };
            bindings
                .entry(literal.canonical_key())
                .or_insert_with(|| AliasBinding {
                    name: declaration.name.clone(),
                    literal: literal.clone(),
                    origin: BindingOrigin::Declared,
                });
        }

        let replacements = module
            .occurrences
            .iter()
            .map(|occurrence| {
                let binding = bindings
                    .entry(occurrence.literal.canonical_key())
                    .or_insert_with(|| AliasBinding {
                        name: namer.name(&occurrence.literal),
                        literal: occurrence.literal.clone(),
                        origin: BindingOrigin::Hoisted,
                    });
                Replacement {
                    span: occurrence.span,
                    alias: binding.name.clone(),
                }
            })
            .collect();

        Self {
            bindings,
            replacements,
        }
    }

    /// All bindings in first-seen order, declared ones included.
    pub fn bindings(&self) -> impl Iterator<Item = (&CanonicalKey, &AliasBinding)> {
        self.bindings.iter()
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    /// Bindings this run introduces, in emission order.
    pub fn hoisted(&self, order: AliasOrder) -> Vec<&AliasBinding> {
        let mut hoisted: Vec<_> = self
            .bindings
            .values()
            .filter(|binding| binding.origin == BindingOrigin::Hoisted)
            .collect();
        if order == AliasOrder::Alphabetical {
            hoisted.sort_by(|a, b| a.name.cmp(&b.name));
        }
        hoisted
    }

    /// Render the rewritten module.
    pub fn apply(&self, src: &str, order: AliasOrder) -> String {
        let body = self.rewrite_body(src);
        let hoisted = self.hoisted(order);
        if hoisted.is_empty() {
            return body;
        }

        let mut out = String::with_capacity(body.len() + hoisted.len() * 160);
        for binding in hoisted {
            out.push_str(&binding.declaration());
            out.push_str("\n\n");
        }
        out.push_str(without_leading_blank_lines(&body));
        out
    }

    fn rewrite_body(&self, src: &str) -> String {
        let mut out = String::with_capacity(src.len());
        let mut cursor = 0;
        for replacement in &self.replacements {
            out.push_str(&src[cursor..replacement.span.start]);
            out.push('#');
            out.push_str(&replacement.alias);
            cursor = replacement.span.end;
        }
        out.push_str(&src[cursor..]);
        out
    }
}

/// Drop whitespace-only lines at the start of `text`, keeping the
/// indentation of the first non-blank line.
fn without_leading_blank_lines(text: &str) -> &str {
    let blank = text.len() - text.trim_start().len();
    match text[..blank].rfind('\n') {
        Some(newline) => &text[newline + 1..],
        None => text,
    }
}

/// Render `#name = #sparse_tensor.encoding<{ ... }>` in the multi-line
/// layout, one parameter per line.
pub fn render_declaration(name: &str, literal: &EncodingLiteral) -> String {
    let levels = literal
        .level_types
        .iter()
        .map(|level| format!("\"{level}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let mut params = vec![format!("dimLevelType = [ {levels} ]")];
    if let Some(ordering) = &literal.dim_ordering {
        params.push(format!("dimOrdering = {ordering}"));
    }
    params.push(format!("pointerBitWidth = {}", literal.pointer_bit_width));
    params.push(format!("indexBitWidth = {}", literal.index_bit_width));

    format!(
        "#{name} = #sparse_tensor.encoding<{{ \n    {} \n}}>",
        params.join(", \n    ")
    )
}
