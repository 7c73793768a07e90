//! Arena nodes parked outside the owned tree
//!
//! Each parked node gets an [`OpaqueId`] and an [`OpaqueInfo`] describing the
//! names it touches. Emission takes the node back; a second take means the
//! rewriter duplicated an opaque reference, which is a transform bug.

use oxc_ast::ast::{
    AssignmentTarget, BindingPattern, Expression, ObjectPropertyKind, PropertyKey, Statement,
};
use oxc_ast_visit::Visit;

use super::scan::InfoCollector;
use crate::error::{Error, Result};
use crate::ir::{InfoTable, OpaqueId, OpaqueInfo, OpaqueKind};

pub enum OpaqueNode<'a> {
    Expr(Expression<'a>),
    Stmt(Statement<'a>),
    Pattern(BindingPattern<'a>),
    Target(AssignmentTarget<'a>),
    Key(PropertyKey<'a>),
    Property(ObjectPropertyKind<'a>),
}

impl OpaqueNode<'_> {
    fn describe(&self) -> &'static str {
        match self {
            OpaqueNode::Expr(_) => "expression",
            OpaqueNode::Stmt(_) => "statement",
            OpaqueNode::Pattern(_) => "binding pattern",
            OpaqueNode::Target(_) => "assignment target",
            OpaqueNode::Key(_) => "property key",
            OpaqueNode::Property(_) => "property",
        }
    }
}

#[derive(Default)]
pub struct OpaqueStore<'a> {
    nodes: Vec<Option<OpaqueNode<'a>>>,
    infos: InfoTable,
}

impl<'a> OpaqueStore<'a> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            infos: InfoTable::new(),
        }
    }

    pub fn infos(&self) -> &InfoTable {
        &self.infos
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of parked nodes that were never emitted
    pub fn remaining(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn park(&mut self, node: OpaqueNode<'a>) -> OpaqueId {
        let info = describe_node(&node);
        let id = self.infos.push(info);
        self.nodes.push(Some(node));
        id
    }

    pub fn take(&mut self, id: OpaqueId) -> Result<OpaqueNode<'a>> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| Error::invariant(format!("opaque node {} emitted twice", id.0)))
    }

    pub fn take_expr(&mut self, id: OpaqueId) -> Result<Expression<'a>> {
        match self.take(id)? {
            OpaqueNode::Expr(expr) => Ok(expr),
            other => Err(mismatch(id, "expression", &other)),
        }
    }

    pub fn take_stmt(&mut self, id: OpaqueId) -> Result<Statement<'a>> {
        match self.take(id)? {
            OpaqueNode::Stmt(stmt) => Ok(stmt),
            other => Err(mismatch(id, "statement", &other)),
        }
    }

    pub fn take_pattern(&mut self, id: OpaqueId) -> Result<BindingPattern<'a>> {
        match self.take(id)? {
            OpaqueNode::Pattern(pattern) => Ok(pattern),
            other => Err(mismatch(id, "binding pattern", &other)),
        }
    }

    pub fn take_target(&mut self, id: OpaqueId) -> Result<AssignmentTarget<'a>> {
        match self.take(id)? {
            OpaqueNode::Target(target) => Ok(target),
            other => Err(mismatch(id, "assignment target", &other)),
        }
    }

    pub fn take_key(&mut self, id: OpaqueId) -> Result<PropertyKey<'a>> {
        match self.take(id)? {
            OpaqueNode::Key(key) => Ok(key),
            other => Err(mismatch(id, "property key", &other)),
        }
    }

    pub fn take_property(&mut self, id: OpaqueId) -> Result<ObjectPropertyKind<'a>> {
        match self.take(id)? {
            OpaqueNode::Property(property) => Ok(property),
            other => Err(mismatch(id, "property", &other)),
        }
    }
}

fn mismatch(id: OpaqueId, expected: &str, found: &OpaqueNode<'_>) -> Error {
    Error::invariant(format!(
        "opaque node {} is a {}, expected a {}",
        id.0,
        found.describe(),
        expected
    ))
}

fn expression_kind(expr: &Expression<'_>) -> OpaqueKind {
    match expr {
        Expression::BooleanLiteral(literal) => OpaqueKind::Literal {
            truthy: Some(literal.value),
        },
        Expression::NullLiteral(_) => OpaqueKind::Literal { truthy: Some(false) },
        Expression::StringLiteral(literal) => OpaqueKind::Literal {
            truthy: Some(!literal.value.is_empty()),
        },
        Expression::NumericLiteral(literal) => OpaqueKind::Number(literal.value),
        Expression::RegExpLiteral(_) => OpaqueKind::Literal { truthy: Some(true) },
        Expression::BigIntLiteral(_) => OpaqueKind::Literal { truthy: None },
        Expression::FunctionExpression(_) | Expression::ArrowFunctionExpression(_) => OpaqueKind::Function,
        _ => OpaqueKind::Other,
    }
}

fn expression_hint(expr: &Expression<'_>) -> Option<String> {
    match expr {
        Expression::Identifier(ident) => Some(ident.name.to_string()),
        Expression::ThisExpression(_) => Some("this".to_string()),
        Expression::StaticMemberExpression(member) => match expression_hint(&member.object) {
            Some(object) => Some(format!("{}${}", object.trim_start_matches('_'), member.property.name)),
            None => Some(member.property.name.to_string()),
        },
        Expression::ComputedMemberExpression(member) => expression_hint(&member.object),
        Expression::CallExpression(call) => expression_hint(&call.callee),
        Expression::NewExpression(call) => expression_hint(&call.callee),
        Expression::ParenthesizedExpression(inner) => expression_hint(&inner.expression),
        _ => None,
    }
}

fn describe_node(node: &OpaqueNode<'_>) -> OpaqueInfo {
    let kind = match node {
        OpaqueNode::Expr(expr) => expression_kind(expr),
        _ => OpaqueKind::Other,
    };
    let mut collector = InfoCollector::default();
    match node {
        OpaqueNode::Expr(expr) => collector.visit_expression(expr),
        OpaqueNode::Stmt(stmt) => collector.visit_statement(stmt),
        OpaqueNode::Pattern(pattern) => collector.visit_binding_pattern(pattern),
        OpaqueNode::Target(target) => collector.visit_assignment_target(target),
        OpaqueNode::Key(key) => collector.visit_property_key(key),
        OpaqueNode::Property(property) => collector.visit_object_property_kind(property),
    }
    let mut info = OpaqueInfo::new(kind);
    info.references = collector.references;
    info.assigned = collector.assigned;
    info.captured = collector.captured;
    if let OpaqueNode::Expr(expr) = node {
        info.hint = expression_hint(expr);
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_ast::AstBuilder;
    use oxc_span::SPAN;

    #[test]
    fn test_second_take_is_an_invariant_violation() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut store = OpaqueStore::new();
        let id = store.park(OpaqueNode::Expr(ast.expression_null_literal(SPAN)));

        assert!(store.take_expr(id).is_ok());
        assert!(matches!(store.take_expr(id), Err(Error::Invariant { .. })));
        assert_eq!(store.remaining(), 0);
    }

    #[test]
    fn test_parked_literal_is_constant() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut store = OpaqueStore::new();
        let id = store.park(OpaqueNode::Expr(ast.expression_boolean_literal(SPAN, false)));
        let info = store.infos().get(id).unwrap();
        assert!(info.is_constant());
        assert_eq!(info.truthiness(), Some(false));
    }

    #[test]
    fn test_member_chain_carries_a_name_hint() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut store = OpaqueStore::new();
        let object = ast.expression_identifier(SPAN, "_config");
        let member = ast.alloc_static_member_expression(SPAN, object, ast.identifier_name(SPAN, "items"), false);
        let id = store.park(OpaqueNode::Expr(Expression::StaticMemberExpression(member)));
        assert_eq!(store.infos().get(id).and_then(|info| info.hint.as_deref()), Some("config$items"));
    }

    #[test]
    fn test_kind_mismatch_is_reported() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut store = OpaqueStore::new();
        let id = store.park(OpaqueNode::Stmt(ast.statement_empty(SPAN)));
        assert!(matches!(store.take_expr(id), Err(Error::Invariant { .. })));
    }
}
