//! Translation of a validated query into per-selector index lookups.
//!
//! The translator is a visitor over the constraint tree. Each selector
//! receives the subtree that references it, lowered into an
//! [`IndexLookup`] and intersected with its type universe. AND splits
//! cleanly across selectors; OR and NOT must stay within one selector, a
//! restriction checked here because the index cannot answer a disjunction
//! spanning candidate sets.

use ahash::AHashSet;

use crate::error::{Result, XiphosError};
use crate::index::IndexLookup;
use crate::query::{
    Comparison, Constraint, FullTextSearch, Literal, Operator, Query, QueryModelVisitor,
    SelectorName, VisitFlow,
};

/// The lookup one selector executes against the index snapshot.
#[derive(Debug, Clone)]
pub struct SelectorPlan {
    /// The selector name.
    pub selector: SelectorName,
    /// The selector's content type.
    pub type_name: String,
    /// The lookup to evaluate.
    pub lookup: IndexLookup,
}

/// The translated query: one lookup per selector, in declared order.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Per-selector plans, in the query's selector order.
    pub selectors: Vec<SelectorPlan>,
}

/// Translate a validated query into a [`QueryPlan`].
pub fn translate(query: &Query) -> Result<QueryPlan> {
    let mut selectors = Vec::with_capacity(query.selectors().len());
    for selector in query.selectors() {
        let mut parts = vec![IndexLookup::MatchType {
            type_name: selector.type_name().to_string(),
        }];

        if let Some(constraint) = query.constraint() {
            let mut translator = ConstraintTranslator {
                target: selector.name().clone(),
                type_name: selector.type_name().to_string(),
                stack: Vec::new(),
            };
            constraint.accept(&mut translator)?;
            debug_assert_eq!(translator.stack.len(), 1);
            if let Some(Some(lookup)) = translator.stack.pop() {
                parts.push(lookup);
            }
        }

        let lookup = if parts.len() == 1 {
            parts.pop().expect("type universe lookup")
        } else {
            IndexLookup::And(parts)
        };
        selectors.push(SelectorPlan {
            selector: selector.name().clone(),
            type_name: selector.type_name().to_string(),
            lookup,
        });
    }
    Ok(QueryPlan { selectors })
}

/// Visitor lowering one selector's constraint subtree.
///
/// Children are translated bottom-up onto a stack; every combinator
/// handler recurses itself and returns [`VisitFlow::Skip`] so the default
/// walk does not descend a second time. `None` on the stack means "no
/// restriction on the target selector".
struct ConstraintTranslator {
    target: SelectorName,
    type_name: String,
    stack: Vec<Option<IndexLookup>>,
}

impl ConstraintTranslator {
    fn lower_child(&mut self, child: &Constraint) -> Result<Option<IndexLookup>> {
        child.accept(self)?;
        Ok(self.stack.pop().expect("child translation"))
    }
}

impl QueryModelVisitor for ConstraintTranslator {
    fn visit_and(&mut self, left: &Constraint, right: &Constraint) -> Result<VisitFlow> {
        let left = self.lower_child(left)?;
        let right = self.lower_child(right)?;
        let combined = match (left, right) {
            (Some(l), Some(r)) => Some(IndexLookup::And(vec![l, r])),
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        };
        self.stack.push(combined);
        Ok(VisitFlow::Skip)
    }

    fn visit_or(&mut self, left: &Constraint, right: &Constraint) -> Result<VisitFlow> {
        let left_refs = referenced_selectors(left);
        let right_refs = referenced_selectors(right);
        let refs_target =
            left_refs.contains(&self.target) || right_refs.contains(&self.target);

        if !refs_target {
            // The disjunction constrains other selectors only.
            self.stack.push(None);
            return Ok(VisitFlow::Skip);
        }
        if left_refs.len() != 1 || right_refs.len() != 1 || left_refs != right_refs {
            return Err(XiphosError::invalid_query(
                "OR constraint spans more than one selector",
            ));
        }

        let left = self.lower_child(left)?.expect("single-selector branch");
        let right = self.lower_child(right)?.expect("single-selector branch");
        self.stack.push(Some(IndexLookup::Or(vec![left, right])));
        Ok(VisitFlow::Skip)
    }

    fn visit_not(&mut self, inner: &Constraint) -> Result<VisitFlow> {
        let inner_refs = referenced_selectors(inner);
        if !inner_refs.contains(&self.target) {
            self.stack.push(None);
            return Ok(VisitFlow::Skip);
        }
        if inner_refs.len() != 1 {
            return Err(XiphosError::invalid_query(
                "NOT constraint spans more than one selector",
            ));
        }

        let lowered = self.lower_child(inner)?.expect("single-selector branch");
        // Negation within the selector's type universe.
        self.stack.push(Some(IndexLookup::Difference(
            Box::new(IndexLookup::MatchType {
                type_name: self.type_name.clone(),
            }),
            Box::new(lowered),
        )));
        Ok(VisitFlow::Skip)
    }

    fn visit_comparison(&mut self, comparison: &Comparison) -> Result<()> {
        if comparison.selector != self.target {
            self.stack.push(None);
            return Ok(());
        }
        let lookup = match comparison.operator {
            Operator::Like => match &comparison.value {
                Literal::Text(pattern) => IndexLookup::like(&comparison.property, pattern)?,
                _ => {
                    return Err(XiphosError::invalid_query(format!(
                        "LIKE on property '{}' requires a text literal",
                        comparison.property
                    )));
                }
            },
            operator => IndexLookup::PropertyCompare {
                property: comparison.property.clone(),
                operator,
                value: comparison.value.clone(),
            },
        };
        self.stack.push(Some(lookup));
        Ok(())
    }

    fn visit_full_text(&mut self, search: &FullTextSearch) -> Result<()> {
        if search.selector != self.target {
            self.stack.push(None);
            return Ok(());
        }
        if search.expression.is_empty() {
            return Err(XiphosError::invalid_query(
                "full-text search carries no terms",
            ));
        }
        self.stack.push(Some(IndexLookup::FullText {
            property: search.property.clone(),
            terms: search.expression.terms().to_vec(),
        }));
        Ok(())
    }
}

/// Collect the selectors a constraint subtree references.
fn referenced_selectors(constraint: &Constraint) -> AHashSet<SelectorName> {
    struct Collector {
        selectors: AHashSet<SelectorName>,
    }
    impl QueryModelVisitor for Collector {
        fn visit_comparison(&mut self, comparison: &Comparison) -> Result<()> {
            self.selectors.insert(comparison.selector.clone());
            Ok(())
        }
        fn visit_full_text(&mut self, search: &FullTextSearch) -> Result<()> {
            self.selectors.insert(search.selector.clone());
            Ok(())
        }
    }

    let mut collector = Collector {
        selectors: AHashSet::new(),
    };
    // Collection cannot fail.
    let _ = constraint.accept(&mut collector);
    collector.selectors
}
