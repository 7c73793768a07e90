//! Lowering of oxc async function bodies into the owned `ir` tree
//!
//! Statements are always lowered structurally so the rewriter can see every
//! jump. Expressions are only lowered down to the nodes that contain a
//! suspension point; any subtree without one is parked in the
//! [`OpaqueStore`] and emitted back untouched.

mod expressions;
mod statements;

use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::{Expression, Statement};
use oxc_span::Span;

use super::opaque_store::{OpaqueNode, OpaqueStore};
use super::scan;
use crate::error::{Error, Result};
use crate::ir::{Expr, Stmt};

pub struct Lowerer<'a, 's> {
    store: &'s mut OpaqueStore<'a>,
    source: &'s str,
    /// `yield` suspends too
    generator: bool,
}

impl<'a, 's> Lowerer<'a, 's> {
    pub fn new(store: &'s mut OpaqueStore<'a>, source: &'s str, generator: bool) -> Self {
        Self {
            store,
            source,
            generator,
        }
    }

    /// Lower the statements of a function body
    pub fn lower_body(&mut self, statements: ArenaVec<'a, Statement<'a>>) -> Result<Vec<Stmt>> {
        self.lower_list(statements)
    }

    fn lower_list(&mut self, statements: ArenaVec<'a, Statement<'a>>) -> Result<Vec<Stmt>> {
        let mut lowered = Vec::with_capacity(statements.len());
        for statement in statements {
            match self.lower_statement(statement)? {
                Stmt::Empty => {}
                stmt => lowered.push(stmt),
            }
        }
        Ok(lowered)
    }

    fn suspends(&self, expr: &Expression<'a>) -> bool {
        scan::expression_suspends(expr, self.generator)
    }

    fn park_expr(&mut self, expr: Expression<'a>) -> Expr {
        Expr::Opaque(self.store.park(OpaqueNode::Expr(expr)))
    }

    fn unsupported(&self, construct: &str, span: Span) -> Error {
        Error::unsupported(construct, self.source, span.start, span.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Arg, Binding, ForHead, IndexedLoop, Target, VarKind};
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn lower(source: &str) -> Result<(Vec<Stmt>, usize)> {
        let allocator = Allocator::default();
        let wrapped = format!("async function f() {{ {} }}", source);
        let program = Parser::new(&allocator, &wrapped, SourceType::mjs()).parse().program;
        let mut body = program.body;
        let Some(Statement::FunctionDeclaration(function)) = body.pop() else {
            panic!("expected a function declaration");
        };
        let statements = function.unbox().body.unwrap().unbox().statements;
        let mut store = OpaqueStore::new();
        let lowered = Lowerer::new(&mut store, &wrapped, false)
            .lower_body(statements)?;
        Ok((lowered, store.len()))
    }

    #[test]
    fn test_statement_without_await_keeps_structure() {
        let (body, parked) = lower("if (a) { b(); } return c;").unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], Stmt::If(Expr::Ident(name), _, None) if name == "a"));
        assert!(matches!(&body[1], Stmt::Return { value: Some(Expr::Ident(_)), .. }));
        // only `b()` is parked
        assert_eq!(parked, 1);
    }

    #[test]
    fn test_await_path_is_lowered_and_siblings_parked() {
        let (body, _) = lower("g(a.b, await x);").unwrap();
        let Stmt::Expr(Expr::Call(callee, args)) = &body[0] else {
            panic!("unexpected {:?}", body);
        };
        assert_eq!(**callee, Expr::ident("g"));
        assert!(matches!(&args[0], Arg::Expr(Expr::Opaque(_))));
        assert!(matches!(&args[1], Arg::Expr(Expr::Await(inner)) if **inner == Expr::ident("x")));
    }

    #[test]
    fn test_member_callee_is_lowered_when_arguments_suspend() {
        let (body, _) = lower("list.push(await x);").unwrap();
        let Stmt::Expr(Expr::Call(callee, args)) = &body[0] else {
            panic!("unexpected {:?}", body);
        };
        assert_eq!(**callee, Expr::member(Expr::ident("list"), "push"));
        assert!(matches!(&args[0], Arg::Expr(Expr::Await(_))));
    }

    #[test]
    fn test_captured_and_reassigned_loop_binding_is_unsupported() {
        let error = lower("for (let i = 0; i < n; i++) { await x; fns.push(() => i); i++; }").unwrap_err();
        assert!(matches!(error, Error::Unsupported { .. }));
        assert!(lower("for (let i = 0; i < n; i++) { fns.push(() => i); i++; }").is_ok());
    }

    #[test]
    fn test_indexed_loop_is_detected() {
        let (body, _) = lower("for (let i = 0; i < items.length; i++) { await items[i]; }").unwrap();
        let Stmt::For { indexed, .. } = &body[0] else {
            panic!("unexpected {:?}", body);
        };
        assert_eq!(
            indexed,
            &Some(IndexedLoop {
                index: "i".to_string(),
                array: "items".to_string()
            })
        );
    }

    #[test]
    fn test_for_of_head_and_patterns() {
        let (body, _) = lower("for (const { a, b } of list) { await a; } for (x of list) {}").unwrap();
        match &body[0] {
            Stmt::ForOf {
                left: ForHead::Var(VarKind::Const, Binding::Pattern { names, .. }),
                ..
            } => assert_eq!(names, &vec!["a".to_string(), "b".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            &body[1],
            Stmt::ForOf {
                left: ForHead::Target(Target::Ident(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_await_in_template_is_unsupported() {
        let error = lower("return `${await x}`;").unwrap_err();
        assert!(matches!(error, Error::Unsupported { .. }));
    }

    #[test]
    fn test_await_in_optional_call_is_unsupported() {
        let error = lower("a?.b(await x);").unwrap_err();
        assert!(matches!(error, Error::Unsupported { .. }));
    }
}
