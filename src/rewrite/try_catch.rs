use super::jumps::{JumpScope, Owner};
use super::{local_return, Resume, Rewriter};
use crate::analysis::reachability::may_fall_through;
use crate::error::Result;
use crate::ir::{Binding, CatchClause, Expr, Function, Stmt, VarDecl, VarKind};

impl Rewriter<'_> {
    /// `try` becomes `_catch`, `_finally` or `_finallyRethrows` around thunks
    pub(crate) fn rewrite_try(
        &mut self,
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
        tail: Vec<Stmt>,
    ) -> Result<Vec<Stmt>> {
        // With nothing after the statement a `return` already ends the function
        let mut scope = JumpScope::new(Owner::Thunk, !tail.is_empty());

        let block = self.rewrite_jumps(block, &mut scope)?;
        let mut guarded = Expr::function(Function::thunk(self.rewrite_block(block)?));
        let mut settled = false;

        if let Some(handler) = handler {
            let recover = self.recover_function(handler, &mut scope)?;
            guarded = self.call_helper("_catch", vec![guarded, Expr::function(recover)])?;
            settled = true;
        }

        if let Some(finalizer) = finalizer {
            if settled {
                guarded = Expr::function(Function::thunk(vec![local_return(Some(guarded))]));
            }
            let always_exits = !may_fall_through(&finalizer, self.infos);
            let finalizer = self.rewrite_jumps(finalizer, &mut scope)?;
            guarded = if always_exits {
                let finalizer = Function::thunk(self.rewrite_block(finalizer)?);
                self.call_helper("_finally", vec![guarded, Expr::function(finalizer)])?
            } else {
                let was_thrown = self.names.fresh("wasThrown");
                let result = self.names.fresh("result");
                let mut body = finalizer;
                body.push(Stmt::If(
                    Expr::Ident(was_thrown.clone()),
                    Box::new(Stmt::Throw(Expr::Ident(result.clone()))),
                    None,
                ));
                body.push(local_return(Some(Expr::Ident(result.clone()))));
                let finalizer = Function::new(vec![was_thrown, result], self.rewrite_block(body)?);
                self.call_helper("_finallyRethrows", vec![guarded, Expr::function(finalizer)])?
            };
            settled = true;
        }

        if !settled {
            guarded = Expr::call(guarded, Vec::new());
        }
        let escaping = scope.escaping();
        self.resume_after(Vec::new(), Resume::Value(guarded), escaping, tail)
    }

    fn recover_function(&mut self, handler: CatchClause, scope: &mut JumpScope) -> Result<Function> {
        let body = self.rewrite_jumps(handler.body, scope)?;
        let (params, mut stmts) = match handler.param {
            None => (Vec::new(), Vec::new()),
            Some(Binding::Ident(name)) => (vec![name], Vec::new()),
            Some(pattern) => {
                let error = self.names.fresh("e");
                let declaration = Stmt::Var(VarDecl::single(VarKind::Let, pattern, Some(Expr::Ident(error.clone()))));
                (vec![error], vec![declaration])
            }
        };
        stmts.extend(body);
        Ok(Function::new(params, self.rewrite_block(stmts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::HelperTable;
    use crate::ir::{Arg, InfoTable, NameGenerator};
    use crate::options::TransformOptions;

    fn rewrite(body: Vec<Stmt>) -> (Vec<Stmt>, Vec<&'static str>) {
        let mut names = NameGenerator::with_reserved(["work", "cleanup", "error"]);
        let mut helpers = HelperTable::new();
        HelperTable::reserve_names(&mut names);
        let infos = InfoTable::new();
        let options = TransformOptions::default();
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options);
        let body = rewriter.rewrite_function(&[], body).unwrap();
        (body, rewriter.used_helpers())
    }

    fn await_work() -> Stmt {
        Stmt::expr(Expr::Await(Box::new(Expr::call(Expr::ident("work"), Vec::new()))))
    }

    fn callee(stmt: &Stmt) -> &str {
        match stmt {
            Stmt::Return {
                value: Some(Expr::Call(callee, _)),
                ..
            } => callee.as_ident().unwrap_or_default(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_try_catch_uses_catch() {
        let (body, used) = rewrite(vec![Stmt::Try {
            block: vec![await_work()],
            handler: Some(CatchClause {
                param: Some(Binding::Ident("error".to_string())),
                body: vec![Stmt::expr(Expr::call(Expr::ident("cleanup"), vec![Expr::ident("error")]))],
            }),
            finalizer: None,
        }]);
        assert_eq!(callee(&body[0]), "_catch");
        assert!(used.contains(&"_catch"));
    }

    #[test]
    fn test_falling_finalizer_rethrows() {
        let (body, _) = rewrite(vec![Stmt::Try {
            block: vec![await_work()],
            handler: None,
            finalizer: Some(vec![Stmt::expr(Expr::call(Expr::ident("cleanup"), Vec::new()))]),
        }]);
        assert_eq!(callee(&body[0]), "_finallyRethrows");
        let Stmt::Return {
            value: Some(Expr::Call(_, args)),
            ..
        } = &body[0]
        else {
            unreachable!();
        };
        match &args[1] {
            Arg::Expr(Expr::Function(finalizer)) => {
                assert_eq!(finalizer.params, vec!["_wasThrown".to_string(), "_result".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_exiting_finalizer_uses_finally() {
        let (body, _) = rewrite(vec![Stmt::Try {
            block: vec![await_work()],
            handler: None,
            finalizer: Some(vec![Stmt::ret(Some(Expr::Number(0.0)))]),
        }]);
        assert_eq!(callee(&body[0]), "_finally");
    }
}
