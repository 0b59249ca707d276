//! Structural validation of a query against the type registry.
//!
//! Validation runs once, before planning; execution never re-checks the
//! references it proves here. It is side-effect free and idempotent.

use ahash::AHashMap;

use crate::error::{Result, XiphosError};
use crate::query::column::Column;
use crate::query::constraint::{Comparison, FullTextSearch};
use crate::query::join::{ChildNodeJoin, DescendantNodeJoin, EquiJoin, SameNodeJoin};
use crate::query::model::Query;
use crate::query::ordering::Ordering;
use crate::query::selector::{Selector, SelectorName};
use crate::query::visitor::{QueryModelVisitor, walk_query};
use crate::schema::{TypeDefinition, TypeRegistry};

/// Validates selector references and property existence for a query.
#[derive(Debug)]
pub struct QueryValidator<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> QueryValidator<'a> {
    /// Create a validator over a type registry.
    pub fn new(registry: &'a TypeRegistry) -> Self {
        QueryValidator { registry }
    }

    /// Validate a query; the error names the offending node.
    pub fn validate(&self, query: &Query) -> Result<()> {
        if query.selectors().is_empty() {
            return Err(XiphosError::invalid_query("query declares no selectors"));
        }
        let mut visitor = ValidationVisitor {
            registry: self.registry,
            selectors: AHashMap::new(),
        };
        walk_query(query, &mut visitor)
    }
}

struct ValidationVisitor<'a> {
    registry: &'a TypeRegistry,
    selectors: AHashMap<SelectorName, &'a TypeDefinition>,
}

impl<'a> ValidationVisitor<'a> {
    fn resolve(&self, selector: &SelectorName, node: &str) -> Result<&'a TypeDefinition> {
        self.selectors.get(selector).copied().ok_or_else(|| {
            XiphosError::invalid_query(format!(
                "{node} references undeclared selector '{selector}'"
            ))
        })
    }

    fn check_property(&self, selector: &SelectorName, property: &str, node: &str) -> Result<()> {
        let definition = self.resolve(selector, node)?;
        if !definition.has_property(property) {
            return Err(XiphosError::invalid_query(format!(
                "{node} references property '{property}' which does not exist on type '{}' \
                 (selector '{selector}')",
                definition.name()
            )));
        }
        Ok(())
    }
}

impl QueryModelVisitor for ValidationVisitor<'_> {
    fn visit_selector(&mut self, selector: &Selector) -> Result<()> {
        let definition = self.registry.get(selector.type_name()).ok_or_else(|| {
            XiphosError::invalid_query(format!(
                "selector '{}' names unknown type '{}'",
                selector.name(),
                selector.type_name()
            ))
        })?;
        if !definition.is_queryable() {
            return Err(XiphosError::invalid_query(format!(
                "selector '{}' names non-queryable type '{}'",
                selector.name(),
                selector.type_name()
            )));
        }
        if self
            .selectors
            .insert(selector.name().clone(), definition)
            .is_some()
        {
            return Err(XiphosError::invalid_query(format!(
                "selector name '{}' is declared twice",
                selector.name()
            )));
        }
        Ok(())
    }

    fn visit_same_node(&mut self, condition: &SameNodeJoin) -> Result<()> {
        self.resolve(&condition.selector1, "same-node join")?;
        self.resolve(&condition.selector2, "same-node join")?;
        if let Some(path) = &condition.selector2_path
            && path.is_empty()
        {
            return Err(XiphosError::invalid_query(
                "same-node join carries an empty relative path",
            ));
        }
        Ok(())
    }

    fn visit_child_node(&mut self, condition: &ChildNodeJoin) -> Result<()> {
        self.resolve(&condition.child_selector, "child-node join")?;
        self.resolve(&condition.parent_selector, "child-node join")?;
        Ok(())
    }

    fn visit_descendant_node(&mut self, condition: &DescendantNodeJoin) -> Result<()> {
        self.resolve(&condition.descendant_selector, "descendant-node join")?;
        self.resolve(&condition.ancestor_selector, "descendant-node join")?;
        Ok(())
    }

    fn visit_equi_join(&mut self, condition: &EquiJoin) -> Result<()> {
        self.check_property(&condition.selector1, &condition.property1, "equi-join")?;
        self.check_property(&condition.selector2, &condition.property2, "equi-join")?;
        Ok(())
    }

    fn visit_comparison(&mut self, comparison: &Comparison) -> Result<()> {
        self.check_property(&comparison.selector, &comparison.property, "comparison")
    }

    fn visit_full_text(&mut self, search: &FullTextSearch) -> Result<()> {
        match &search.property {
            Some(property) => self.check_property(&search.selector, property, "full-text search"),
            None => self.resolve(&search.selector, "full-text search").map(|_| ()),
        }
    }

    fn visit_ordering(&mut self, ordering: &Ordering) -> Result<()> {
        self.check_property(&ordering.selector, &ordering.property, "ordering")
    }

    fn visit_column(&mut self, column: &Column) -> Result<()> {
        self.check_property(&column.selector, &column.property, "column")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::constraint::{Constraint, Literal, Operator};
    use crate::query::join::{Join, JoinCondition};
    use crate::schema::{BaseType, PropertyKind};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .add_type(
                TypeDefinition::new("document", BaseType::Document)
                    .with_property("title", PropertyKind::Text)
                    .with_property("pages", PropertyKind::Integer),
            )
            .unwrap();
        registry
            .add_type(
                TypeDefinition::new("folder", BaseType::Folder)
                    .with_property("title", PropertyKind::Text),
            )
            .unwrap();
        registry
            .add_type(TypeDefinition::new("hidden", BaseType::Document).not_queryable())
            .unwrap();
        registry
    }

    fn valid_query() -> Query {
        Query::builder(Selector::aliased("document", "d"))
            .join(
                Selector::aliased("folder", "f"),
                Join::inner(JoinCondition::child_node("d".into(), "f".into())),
            )
            .constrain(Constraint::comparison(
                "d".into(),
                "pages",
                Operator::Gt,
                Literal::Integer(3),
            ))
            .select(Column::new("d".into(), "title"))
            .build()
    }

    #[test]
    fn test_valid_query_passes() {
        let registry = registry();
        let validator = QueryValidator::new(&registry);
        validator.validate(&valid_query()).unwrap();
    }

    #[test]
    fn test_validation_is_idempotent() {
        let registry = registry();
        let validator = QueryValidator::new(&registry);
        let query = valid_query();
        validator.validate(&query).unwrap();
        validator.validate(&query).unwrap();
    }

    #[test]
    fn test_unknown_type_rejected() {
        let registry = registry();
        let validator = QueryValidator::new(&registry);
        let query = Query::builder(Selector::new("missing")).build();

        let error = validator.validate(&query).unwrap_err();
        assert!(error.to_string().contains("unknown type 'missing'"));
    }

    #[test]
    fn test_non_queryable_type_rejected() {
        let registry = registry();
        let validator = QueryValidator::new(&registry);
        let query = Query::builder(Selector::new("hidden")).build();

        assert!(validator.validate(&query).is_err());
    }

    #[test]
    fn test_undeclared_join_selector_rejected() {
        let registry = registry();
        let validator = QueryValidator::new(&registry);
        let query = Query::builder(Selector::aliased("document", "d"))
            .join(
                Selector::aliased("folder", "f"),
                Join::inner(JoinCondition::same_node("d".into(), "elsewhere".into())),
            )
            .build();

        let error = validator.validate(&query).unwrap_err();
        assert!(error.to_string().contains("undeclared selector 'elsewhere'"));
    }

    #[test]
    fn test_unknown_property_rejected() {
        let registry = registry();
        let validator = QueryValidator::new(&registry);
        let query = Query::builder(Selector::aliased("document", "d"))
            .constrain(Constraint::comparison(
                "d".into(),
                "missing",
                Operator::Eq,
                Literal::Boolean(true),
            ))
            .build();

        let error = validator.validate(&query).unwrap_err();
        assert!(error.to_string().contains("property 'missing'"));
        assert!(error.to_string().contains("comparison"));
    }

    #[test]
    fn test_duplicate_selector_rejected() {
        let registry = registry();
        let validator = QueryValidator::new(&registry);
        let query = Query::builder(Selector::aliased("document", "d"))
            .join(
                Selector::aliased("folder", "d"),
                Join::inner(JoinCondition::child_node("d".into(), "d".into())),
            )
            .build();

        let error = validator.validate(&query).unwrap_err();
        assert!(error.to_string().contains("declared twice"));
    }
}
