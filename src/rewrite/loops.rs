use log::debug;

use super::jumps::{JumpScope, Owner};
use super::{local_return, Resume, Rewriter};
use crate::analysis::references::{stmt_assigned_names, stmt_captured_names};
use crate::error::{Error, Result};
use crate::ir::{
    AssignmentOperator, Binding, Expr, ForHead, ForInit, Function, IndexedLoop, Stmt, VarDecl, VarKind,
};

impl Rewriter<'_> {
    /// Rewrite a suspending loop carrying `labels`, followed by `tail`
    pub(crate) fn rewrite_loop(&mut self, stmt: Stmt, labels: Vec<String>, tail: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let mut scope = JumpScope::new(Owner::Loop(labels), true);
        let mut prelude: Vec<Stmt> = Vec::new();
        let mut lexical = false;

        let (helper, mut args) = match stmt {
            Stmt::For {
                init,
                test,
                update,
                body,
                indexed,
            } => {
                if let Some(indexed) = indexed.filter(|indexed| self.counts_over(indexed, &body)) {
                    debug!("loop over {} lowered to an indexed walk", indexed.array);
                    let body = self.loop_body(*body, Vec::new(), &mut scope)?;
                    let array = Expr::Ident(indexed.array);
                    let body = Expr::function(Function::new(vec![indexed.index], body));
                    ("_forTo", vec![array, body])
                } else {
                    let mut copies = Vec::new();
                    match init {
                        Some(ForInit::Var(decl)) => {
                            lexical = decl.kind != VarKind::Var;
                            if lexical {
                                copies = self.captured_bindings(&decl, &body);
                            }
                            prelude.push(Stmt::Var(decl));
                        }
                        Some(ForInit::Expr(expr)) => prelude.push(Stmt::expr(expr)),
                        None => {}
                    }
                    let test = self.optional_thunk(test.map(|test| vec![local_return(Some(test))]))?;
                    let update = self.optional_thunk(update.map(|update| vec![Stmt::expr(update)]))?;
                    let body = self.loop_body(*body, Vec::new(), &mut scope)?;
                    ("_for", vec![test, update, per_iteration(copies, body)])
                }
            }
            Stmt::While(test, body) => {
                let test = self.optional_thunk(Some(vec![local_return(Some(test))]))?;
                let body = self.loop_body(*body, Vec::new(), &mut scope)?;
                ("_for", vec![test, Expr::Undefined, Expr::function(Function::thunk(body))])
            }
            Stmt::DoWhile(body, test) => {
                let body = self.loop_body(*body, Vec::new(), &mut scope)?;
                let test = self.optional_thunk(Some(vec![local_return(Some(test))]))?;
                ("_do", vec![Expr::function(Function::thunk(body)), test])
            }
            Stmt::ForIn { left, right, body } => {
                let (params, prefix) = self.loop_binding(left);
                let body = self.loop_body(*body, prefix, &mut scope)?;
                ("_forIn", vec![right, Expr::function(Function::new(params, body))])
            }
            Stmt::ForOf {
                left,
                right,
                body,
                is_await,
            } => {
                let (params, prefix) = self.loop_binding(left);
                let body = self.loop_body(*body, prefix, &mut scope)?;
                let helper = if is_await { "_forAwaitOf" } else { "_forOf" };
                (helper, vec![right, Expr::function(Function::new(params, body))])
            }
            other => return Err(Error::invariant(format!("not a loop: {:?}", other))),
        };

        let escaping = scope.escaping();
        let mut checked: Vec<Expr> = scope.break_flag().map(Expr::ident).into_iter().collect();
        checked.extend(escaping.iter().cloned().map(Expr::Ident));
        if let Some(check) = Expr::any_of(checked) {
            args.push(Expr::function(Function::thunk(vec![local_return(Some(check))])));
        }
        let call = self.call_helper(helper, args)?;
        prelude.extend(scope.declarations());

        let out = self.resume_after(prelude, Resume::Value(call), escaping, tail)?;
        if lexical {
            Ok(vec![Stmt::Block(out)])
        } else {
            Ok(out)
        }
    }

    /// `_forTo` is only equivalent when neither the counter nor the array
    /// variable is reassigned, by the body or by any other code that could
    /// run while the loop is suspended
    fn counts_over(&self, indexed: &IndexedLoop, body: &Stmt) -> bool {
        let assigned = stmt_assigned_names(body, self.infos);
        let reassigned_elsewhere = self.module_assigned.is_some_and(|module| module.contains(&indexed.array));
        !assigned.contains(&indexed.index)
            && !assigned.contains(&indexed.array)
            && !self.assigned.contains(&indexed.array)
            && !reassigned_elsewhere
    }

    /// Head bindings that a closure in the body captures; each iteration
    /// needs its own copy of them
    fn captured_bindings(&self, decl: &VarDecl, body: &Stmt) -> Vec<String> {
        let captured = stmt_captured_names(body, self.infos);
        decl.declarators
            .iter()
            .flat_map(|declarator| declarator.binding.names())
            .filter(|name| captured.contains(name))
            .collect()
    }

    fn optional_thunk(&mut self, body: Option<Vec<Stmt>>) -> Result<Expr> {
        match body {
            Some(body) => {
                let body = self.rewrite_block(body)?;
                Ok(Expr::function(Function::thunk(body)))
            }
            None => Ok(Expr::Undefined),
        }
    }

    fn loop_body(&mut self, body: Stmt, prefix: Vec<Stmt>, scope: &mut JumpScope) -> Result<Vec<Stmt>> {
        let body = self.rewrite_jumps(body.into_list(), scope)?;
        let mut stmts: Vec<Stmt> = scope
            .skip_flag()
            .and_then(|flag| Stmt::declare(vec![flag.to_string()]))
            .into_iter()
            .collect();
        stmts.extend(prefix);
        stmts.extend(body);
        self.rewrite_block(stmts)
    }

    /// Parameters of the per-item callback and the statements that bind the
    /// loop variable from them
    fn loop_binding(&mut self, left: ForHead) -> (Vec<String>, Vec<Stmt>) {
        match left {
            ForHead::Var(_, Binding::Ident(name)) => (vec![name], Vec::new()),
            ForHead::Var(kind, binding) => {
                let value = self.names.fresh("value");
                let declaration = Stmt::Var(VarDecl::single(kind, binding, Some(Expr::Ident(value.clone()))));
                (vec![value], vec![declaration])
            }
            ForHead::Target(target) => {
                let value = self.names.fresh("value");
                let assignment = Stmt::expr(Expr::Assign(
                    AssignmentOperator::Assign,
                    Box::new(target),
                    Box::new(Expr::Ident(value.clone())),
                ));
                (vec![value], vec![assignment])
            }
        }
    }
}

/// Loop body callback. Captured head bindings are passed to an inner function
/// whose parameters shadow them, so closures created in one iteration keep
/// that iteration's values.
fn per_iteration(copies: Vec<String>, body: Vec<Stmt>) -> Expr {
    if copies.is_empty() {
        return Expr::function(Function::thunk(body));
    }
    debug!("per-iteration copies of {:?}", copies);
    let args = copies.iter().cloned().map(Expr::Ident).collect();
    let inner = Expr::function(Function::new(copies, body));
    Expr::function(Function::thunk(vec![local_return(Some(Expr::call(inner, args)))]))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::helpers::HelperTable;
    use crate::ir::{
        Arg, Binding, Expr, ForInit, InfoTable, NameGenerator, OpaqueInfo, OpaqueKind, Stmt, VarDecl, VarKind,
    };
    use crate::options::TransformOptions;
    use crate::rewrite::Rewriter;

    fn rewrite(body: Vec<Stmt>) -> Vec<Stmt> {
        let mut names = NameGenerator::with_reserved(["items", "item", "work", "i"]);
        let mut helpers = HelperTable::new();
        HelperTable::reserve_names(&mut names);
        let infos = InfoTable::new();
        let options = TransformOptions::default();
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options);
        rewriter.rewrite_function(&[], body).unwrap()
    }

    fn helper_call(stmt: &Stmt) -> (&str, &[Arg]) {
        match stmt {
            Stmt::Return {
                value: Some(Expr::Call(callee, args)),
                ..
            } => (callee.as_ident().unwrap_or_default(), args.as_slice()),
            other => panic!("unexpected {:?}", other),
        }
    }

    fn await_work() -> Stmt {
        Stmt::expr(Expr::Await(Box::new(Expr::call(Expr::ident("work"), Vec::new()))))
    }

    #[test]
    fn test_for_of_uses_for_of_helper() {
        let body = rewrite(vec![Stmt::ForOf {
            left: crate::ir::ForHead::Var(VarKind::Const, Binding::Ident("item".to_string())),
            right: Expr::ident("items"),
            body: Box::new(Stmt::Block(vec![await_work()])),
            is_await: false,
        }]);
        let (helper, args) = helper_call(&body[0]);
        assert_eq!(helper, "_forOf");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_break_adds_check_and_flag() {
        let body = rewrite(vec![Stmt::While(
            Expr::Bool(true),
            Box::new(Stmt::Block(vec![await_work(), Stmt::Break(None)])),
        )]);
        assert_eq!(body[0], Stmt::declare(vec!["_interrupt".to_string()]).unwrap());
        let (helper, args) = helper_call(&body[1]);
        assert_eq!(helper, "_for");
        assert_eq!(args.len(), 4);
    }

    fn indexed_loop() -> Stmt {
        Stmt::For {
            init: None,
            test: None,
            update: None,
            body: Box::new(Stmt::Block(vec![await_work()])),
            indexed: Some(crate::ir::IndexedLoop {
                index: "i".to_string(),
                array: "items".to_string(),
            }),
        }
    }

    #[test]
    fn test_array_reassigned_elsewhere_falls_back_to_for() {
        let mut names = NameGenerator::with_reserved(["items", "work", "i"]);
        let mut helpers = HelperTable::new();
        HelperTable::reserve_names(&mut names);
        let infos = InfoTable::new();
        let options = TransformOptions::default();
        let reassigned: HashSet<String> = ["items".to_string()].into_iter().collect();
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options).with_module_assigned(&reassigned);
        let body = rewriter.rewrite_function(&[], vec![indexed_loop()]).unwrap();
        let (helper, _) = helper_call(&body[0]);
        assert_eq!(helper, "_for");
    }

    #[test]
    fn test_captured_head_binding_is_copied_per_iteration() {
        let mut names = NameGenerator::with_reserved(["fns", "work", "i", "n"]);
        let mut helpers = HelperTable::new();
        HelperTable::reserve_names(&mut names);
        let mut infos = InfoTable::new();
        let mut push = OpaqueInfo::new(OpaqueKind::Other);
        push.references = ["fns".to_string(), "i".to_string()].into_iter().collect();
        push.captured = ["i".to_string()].into_iter().collect();
        let push = infos.push(push);
        let options = TransformOptions::default();
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options);

        let stmt = Stmt::For {
            init: Some(ForInit::Var(VarDecl::single(
                VarKind::Let,
                Binding::Ident("i".to_string()),
                Some(Expr::Number(0.0)),
            ))),
            test: Some(Expr::Binary(
                crate::ir::BinaryOperator::LessThan,
                Box::new(Expr::ident("i")),
                Box::new(Expr::ident("n")),
            )),
            update: None,
            body: Box::new(Stmt::Block(vec![await_work(), Stmt::expr(Expr::Opaque(push))])),
            indexed: None,
        };
        let body = rewriter.rewrite_function(&[], vec![stmt]).unwrap();
        let flat: Vec<&Stmt> = body
            .iter()
            .flat_map(|stmt| match stmt {
                Stmt::Block(inner) => inner.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .collect();
        let call = flat
            .iter()
            .find(|stmt| matches!(stmt, Stmt::Return { value: Some(Expr::Call(..)), .. }))
            .unwrap_or_else(|| panic!("no helper call in {:?}", body));
        let (helper, args) = helper_call(call);
        assert_eq!(helper, "_for");
        let Arg::Expr(Expr::Function(callback)) = &args[2] else {
            panic!("unexpected {:?}", args);
        };
        assert!(callback.params.is_empty());
        match &callback.body[..] {
            [Stmt::Return {
                value: Some(Expr::Call(inner, copies)),
                ..
            }] => {
                assert!(matches!(&**inner, Expr::Function(function) if function.params == vec!["i".to_string()]));
                assert_eq!(copies, &vec![Arg::Expr(Expr::ident("i"))]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_indexed_loop_uses_for_to() {
        let body = rewrite(vec![indexed_loop()]);
        let (helper, args) = helper_call(&body[0]);
        assert_eq!(helper, "_forTo");
        match &args[1] {
            Arg::Expr(Expr::Function(function)) => assert_eq!(function.params, vec!["i".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }
}
