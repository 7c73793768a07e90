//! Cleanup of rewritten bodies
//!
//! Splitting at suspension points leaves dead statements and trivial returns
//! behind; this pass removes them from a body and every function nested in it.

use crate::ir::visit::{walk_stmt_mut, VisitorMut};
use crate::ir::{Expr, Function, Stmt};

struct Simplifier;

impl VisitorMut for Simplifier {
    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
        match stmt {
            Stmt::Block(stmts) => simplify_list(stmts),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                simplify_list(block);
                if let Some(handler) = handler {
                    simplify_list(&mut handler.body);
                }
                if let Some(finalizer) = finalizer {
                    simplify_list(finalizer);
                }
            }
            _ => {}
        }
    }

    fn visit_function(&mut self, function: &mut Function) {
        simplify_function_body(&mut function.body);
    }
}

/// Simplify a function body in place
pub(crate) fn simplify_function_body(body: &mut Vec<Stmt>) {
    for stmt in body.iter_mut() {
        Simplifier.visit_stmt(stmt);
    }
    simplify_list(body);
    while matches!(body.last(), Some(Stmt::Return { value: None, .. })) {
        body.pop();
    }
}

fn simplify_list(stmts: &mut Vec<Stmt>) {
    drop_unreachable(stmts);
    merge_conditional_returns(stmts);
}

/// Nothing after `return` or `throw` runs, except hoisted function declarations
fn drop_unreachable(stmts: &mut Vec<Stmt>) {
    let Some(exit) = stmts
        .iter()
        .position(|stmt| matches!(stmt, Stmt::Return { .. } | Stmt::Throw(_)))
    else {
        return;
    };
    let mut index = 0;
    stmts.retain(|stmt| {
        let keep = index <= exit || matches!(stmt, Stmt::FunctionDecl { .. });
        index += 1;
        keep
    });
}

/// `if (c) return a; return b;` becomes `return c ? a : b;`
fn merge_conditional_returns(stmts: &mut Vec<Stmt>) {
    let len = stmts.len();
    if len < 2 {
        return;
    }
    let mergeable = matches!(
        (&stmts[len - 2], &stmts[len - 1]),
        (Stmt::If(_, consequent, None), Stmt::Return { value: Some(_), .. })
            if returned_value(consequent).is_some()
    );
    if !mergeable {
        return;
    }
    let (Some(Stmt::Return { value: Some(otherwise), exit }), Some(Stmt::If(test, consequent, None))) =
        (stmts.pop(), stmts.pop())
    else {
        return;
    };
    let Some(value) = into_returned_value(*consequent) else {
        return;
    };
    stmts.push(Stmt::Return {
        value: Some(Expr::Conditional(Box::new(test), Box::new(value), Box::new(otherwise))),
        exit,
    });
}

fn returned_value(stmt: &Stmt) -> Option<&Expr> {
    match stmt {
        Stmt::Return { value: Some(value), .. } => Some(value),
        Stmt::Block(stmts) if stmts.len() == 1 => returned_value(&stmts[0]),
        _ => None,
    }
}

fn into_returned_value(stmt: Stmt) -> Option<Expr> {
    match stmt {
        Stmt::Return { value, .. } => value,
        Stmt::Block(mut stmts) if stmts.len() == 1 => stmts.pop().and_then(into_returned_value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_bare_return_is_dropped() {
        let mut body = vec![Stmt::expr(Expr::ident("a")), Stmt::ret(None)];
        simplify_function_body(&mut body);
        assert_eq!(body, vec![Stmt::expr(Expr::ident("a"))]);
    }

    #[test]
    fn test_code_after_throw_is_dropped_but_declarations_kept() {
        let mut body = vec![
            Stmt::Throw(Expr::ident("error")),
            Stmt::expr(Expr::ident("dead")),
            Stmt::FunctionDecl {
                name: "helper".to_string(),
                id: crate::ir::OpaqueId(0),
            },
        ];
        simplify_function_body(&mut body);
        assert_eq!(body.len(), 2);
        assert!(matches!(body[1], Stmt::FunctionDecl { .. }));
    }

    #[test]
    fn test_conditional_returns_merge() {
        let mut body = vec![
            Stmt::If(
                Expr::ident("c"),
                Box::new(Stmt::Block(vec![Stmt::ret(Some(Expr::ident("a")))])),
                None,
            ),
            Stmt::ret(Some(Expr::ident("b"))),
        ];
        simplify_function_body(&mut body);
        assert_eq!(
            body,
            vec![Stmt::ret(Some(Expr::Conditional(
                Box::new(Expr::ident("c")),
                Box::new(Expr::ident("a")),
                Box::new(Expr::ident("b"))
            )))]
        );
    }

    #[test]
    fn test_nested_continuations_are_simplified() {
        let continuation = Function::thunk(vec![Stmt::expr(Expr::ident("a")), Stmt::ret(None)]);
        let mut body = vec![Stmt::ret(Some(Expr::call(
            Expr::ident("_await"),
            vec![Expr::ident("x"), Expr::function(continuation)],
        )))];
        simplify_function_body(&mut body);
        let Stmt::Return {
            value: Some(Expr::Call(_, args)),
            ..
        } = &body[0]
        else {
            panic!("unexpected {:?}", body);
        };
        match &args[1] {
            crate::ir::Arg::Expr(Expr::Function(function)) => assert_eq!(function.body.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }
}
