//! Continuation-passing rewrite of async function bodies
//!
//! The rewriter walks a lowered body statement by statement. Statements that
//! never suspend are kept as they are. The first statement that suspends
//! consumes everything after it: the rest of the block becomes a continuation
//! handed to a runtime helper, and the same process repeats inside the
//! continuation. Compound statements that suspend (loops, `switch`, `try`)
//! become helper calls whose callbacks are rewritten recursively.
//!
//! Jumps that would have to cross one of the synthesized functions (`return`
//! from inside a loop body, `break` out of a `switch` case, ...) are turned
//! into "set flag, return" pairs by [`jumps`] before a construct is rewritten.
//! The helper and the continuation after it check those flags.

mod block;
mod expressions;
mod hygiene;
mod jumps;
mod loops;
mod simplify;
mod switch;
mod try_catch;

use std::collections::{BTreeSet, HashSet};

use log::trace;

use crate::analysis::references::assigned_names;
use crate::error::Result;
use crate::helpers::HelperTable;
use crate::ir::{Exit, Expr, Function, InfoTable, NameGenerator, Stmt};
use crate::options::TransformOptions;

pub use hygiene::{hoist_functions, HoistedFunction};

/// A value with the rest of the computation attached
pub(crate) enum Continuation {
    /// The rest just returns the awaited value
    Passthrough,
    /// Nothing left to do
    Empty,
    /// The rest is a plain call of a stable function with the awaited value
    Reference(Expr),
    General(Function),
}

/// What a construct hands to the code that follows it
pub(crate) enum Resume {
    /// Run this thunk first
    Invoke(Function),
    /// Wait for this (possibly promise) value first
    Value(Expr),
}

pub struct Rewriter<'c> {
    pub(crate) names: &'c mut NameGenerator,
    pub(crate) helpers: &'c mut HelperTable,
    pub(crate) infos: &'c InfoTable,
    pub(crate) options: &'c TransformOptions,
    /// Names assigned anywhere in the function being rewritten
    pub(crate) assigned: HashSet<String>,
    /// Names assigned anywhere in the module, by any function
    pub(crate) module_assigned: Option<&'c HashSet<String>>,
    exit_flag: Option<String>,
    generator: Option<String>,
    used_helpers: BTreeSet<&'static str>,
}

impl<'c> Rewriter<'c> {
    pub fn new(
        names: &'c mut NameGenerator,
        helpers: &'c mut HelperTable,
        infos: &'c InfoTable,
        options: &'c TransformOptions,
    ) -> Self {
        Self {
            names,
            helpers,
            infos,
            options,
            assigned: HashSet::new(),
            module_assigned: None,
            exit_flag: None,
            generator: None,
            used_helpers: BTreeSet::new(),
        }
    }

    /// Treat `yield` as a suspension on the generator object bound to `name`
    pub fn with_generator(mut self, name: impl Into<String>) -> Self {
        self.generator = Some(name.into());
        self
    }

    /// Names that some function of the module reassigns
    pub fn with_module_assigned(mut self, assigned: &'c HashSet<String>) -> Self {
        self.module_assigned = Some(assigned);
        self
    }

    /// Canonical names of the helpers this rewriter referenced
    pub fn used_helpers(&self) -> Vec<&'static str> {
        self.used_helpers.iter().copied().collect()
    }

    /// Rewrite a whole async function body. `params` are the parameter names
    /// of the source function, which `var` hoisting must not redeclare.
    pub fn rewrite_function(&mut self, params: &[String], body: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let mut body = hygiene::hoist_vars(body, params);
        self.assigned = assigned_names(&body, self.infos);
        trace!("assigned names: {:?}", self.assigned);

        body = self.rewrite_block(body)?;
        if let Some(flag) = self.exit_flag.clone() {
            if let Some(declaration) = Stmt::declare(vec![flag]) {
                let position = body.iter().take_while(|stmt| matches!(stmt, Stmt::Var(_))).count();
                body.insert(position, declaration);
            }
        }
        simplify::simplify_function_body(&mut body);
        Ok(body)
    }

    /// Local name of helper `name`
    pub(crate) fn helper(&mut self, name: &'static str) -> Result<Expr> {
        self.used_helpers.insert(name);
        Ok(Expr::Ident(self.helpers.reference(name, self.names)?))
    }

    pub(crate) fn call_helper(&mut self, name: &'static str, args: Vec<Expr>) -> Result<Expr> {
        let callee = self.helper(name)?;
        Ok(Expr::call(callee, args))
    }

    /// `Promise.resolve(value)`
    fn promise_resolve(value: Expr) -> Expr {
        Expr::call(Expr::member(Expr::ident("Promise"), "resolve"), vec![value])
    }

    /// `Promise.resolve(value).then(then)`
    fn promise_then(value: Expr, then: Expr) -> Expr {
        Expr::call(Expr::member(Self::promise_resolve(value), "then"), vec![then])
    }

    pub(crate) fn continuation_expr(&mut self, continuation: Continuation) -> Result<Option<Expr>> {
        Ok(match continuation {
            Continuation::Passthrough => None,
            Continuation::Empty if self.options.inline_helpers => {
                Some(Expr::function(Function::default()))
            }
            Continuation::Empty => Some(self.helper("_empty")?),
            Continuation::Reference(callee) => Some(callee),
            Continuation::General(function) => Some(Expr::function(function)),
        })
    }

    /// Wait for `value`, then continue
    pub(crate) fn await_call(&mut self, value: Expr, continuation: Continuation) -> Result<Expr> {
        let then = self.continuation_expr(continuation)?;
        if self.options.inline_helpers {
            return Ok(match then {
                Some(then) => Self::promise_then(value, then),
                None => Self::promise_resolve(value),
            });
        }
        let mut args = vec![value];
        args.extend(then);
        self.call_helper("_await", args)
    }

    /// Run `thunk`, then continue with `then`
    pub(crate) fn invoke_call(&mut self, thunk: Function, then: Expr) -> Result<Expr> {
        if self.options.inline_helpers {
            let started = Expr::call(Expr::function(thunk), Vec::new());
            return Ok(Self::promise_then(started, then));
        }
        self.call_helper("_invoke", vec![Expr::function(thunk), then])
    }

    /// Continue with `then` once `value` settles
    pub(crate) fn continue_call(&mut self, value: Expr, then: Expr) -> Result<Expr> {
        if self.options.inline_helpers {
            return Ok(Self::promise_then(value, then));
        }
        self.call_helper("_continue", vec![value, then])
    }

    /// Promise for the completion of a whole rewritten body
    pub fn start_call(&mut self, body: Function) -> Result<Expr> {
        if self.options.inline_helpers {
            let resolve = self.names.fresh("resolve");
            let executor = Function::new(
                vec![resolve.clone()],
                vec![Stmt::expr(Expr::call(
                    Expr::Ident(resolve),
                    vec![Expr::call(Expr::function(body), Vec::new())],
                ))],
            );
            return Ok(Expr::New(
                Box::new(Expr::ident("Promise")),
                vec![crate::ir::Arg::Expr(Expr::function(executor))],
            ));
        }
        self.call_helper("_call", vec![Expr::function(body)])
    }

    /// Value stored into jump flags
    pub(crate) fn flag_value(&self) -> Expr {
        if self.options.minify {
            Expr::Number(1.0)
        } else {
            Expr::Bool(true)
        }
    }

    pub(crate) fn exit_flag(&mut self) -> String {
        if let Some(flag) = &self.exit_flag {
            return flag.clone();
        }
        let flag = self.names.fresh("exit");
        self.exit_flag = Some(flag.clone());
        flag
    }

    /// Whether evaluating `expr` later yields the same value as evaluating it now
    pub(crate) fn is_stable(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Number(_)
            | Expr::Str(_)
            | Expr::Bool(_)
            | Expr::Null
            | Expr::Undefined
            | Expr::This
            | Expr::Function(_) => true,
            Expr::Ident(name) => !self.assigned.contains(name),
            Expr::Opaque(id) => self.infos.get(*id).is_some_and(|info| info.is_constant()),
            _ => false,
        }
    }

    /// Shape the rest of a body into a continuation receiving `hole`
    pub(crate) fn continuation(&self, hole: &str, body: Vec<Stmt>) -> Continuation {
        match body.as_slice() {
            [] => return Continuation::Empty,
            [Stmt::Return {
                value: Some(Expr::Ident(name)),
                ..
            }] if name == hole => return Continuation::Passthrough,
            [Stmt::Return {
                value: Some(Expr::Call(callee, args)),
                ..
            }] => {
                let passes_hole = matches!(
                    args.as_slice(),
                    [crate::ir::Arg::Expr(Expr::Ident(name))] if name == hole
                );
                if passes_hole {
                    if let Expr::Ident(function) = callee.as_ref() {
                        if function != hole && self.is_stable(callee) {
                            return Continuation::Reference(Expr::Ident(function.clone()));
                        }
                    }
                }
            }
            _ => {}
        }
        let uses_hole = crate::analysis::references::references(&body, self.infos).contains(hole);
        let params = if uses_hole { vec![hole.to_string()] } else { Vec::new() };
        Continuation::General(Function::new(params, body))
    }

    /// Emit `prelude; return <construct>` and attach `tail` as the code that
    /// runs once the construct settles. `escaping` are the flags that mean the
    /// construct already decided the function's outcome.
    pub(crate) fn resume_after(
        &mut self,
        mut prelude: Vec<Stmt>,
        resume: Resume,
        escaping: Vec<String>,
        tail: Vec<Stmt>,
    ) -> Result<Vec<Stmt>> {
        if tail.is_empty() {
            let value = match resume {
                Resume::Invoke(thunk) => Expr::call(Expr::function(thunk), Vec::new()),
                Resume::Value(value) => value,
            };
            prelude.push(local_return(Some(value)));
            return Ok(prelude);
        }

        let mut body = self.rewrite_block(tail)?;
        let mut params = Vec::new();
        let checks: Vec<Expr> = escaping.into_iter().map(Expr::Ident).collect();
        if let Some(check) = Expr::any_of(checks) {
            let result = self.names.fresh("result");
            body.insert(
                0,
                Stmt::If(check, Box::new(local_return(Some(Expr::Ident(result.clone())))), None),
            );
            params.push(result);
        }
        let then = Expr::function(Function::new(params, body));
        let call = match resume {
            Resume::Invoke(thunk) => self.invoke_call(thunk, then)?,
            Resume::Value(value) => self.continue_call(value, then)?,
        };
        prelude.push(local_return(Some(call)));
        Ok(prelude)
    }

    pub(crate) fn generator(&self) -> Option<&str> {
        self.generator.as_deref()
    }
}

/// A `return` the rewriter synthesized; never reinterpreted as a source jump
pub(crate) fn local_return(value: Option<Expr>) -> Stmt {
    Stmt::Return {
        value,
        exit: Exit::Local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Arg, VarKind};

    fn rewrite(body: Vec<Stmt>) -> (Vec<Stmt>, Vec<&'static str>) {
        let mut names = NameGenerator::with_reserved(["value", "fetch", "log"]);
        let mut helpers = HelperTable::new();
        HelperTable::reserve_names(&mut names);
        let infos = InfoTable::new();
        let options = TransformOptions::default();
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options);
        let rewritten = rewriter.rewrite_function(&[], body).unwrap();
        (rewritten, rewriter.used_helpers())
    }

    fn await_expr(expr: Expr) -> Expr {
        Expr::Await(Box::new(expr))
    }

    #[test]
    fn test_return_await_is_passthrough() {
        let (body, used) = rewrite(vec![Stmt::ret(Some(await_expr(Expr::ident("value"))))]);
        assert_eq!(used, vec!["_await"]);
        assert_eq!(
            body,
            vec![local_return(Some(Expr::call(
                Expr::ident("_await"),
                vec![Expr::ident("value")]
            )))]
        );
    }

    #[test]
    fn test_discarded_await_uses_empty() {
        let (body, used) = rewrite(vec![Stmt::expr(await_expr(Expr::ident("value")))]);
        assert!(used.contains(&"_empty"));
        assert_eq!(
            body,
            vec![local_return(Some(Expr::call(
                Expr::ident("_await"),
                vec![Expr::ident("value"), Expr::ident("_empty")]
            )))]
        );
    }

    #[test]
    fn test_declared_await_binds_parameter() {
        let (body, _) = rewrite(vec![
            Stmt::Var(crate::ir::VarDecl::single(
                VarKind::Const,
                crate::ir::Binding::Ident("data".to_string()),
                Some(await_expr(Expr::call(Expr::ident("fetch"), Vec::new()))),
            )),
            Stmt::ret(Some(Expr::member(Expr::ident("data"), "body"))),
        ]);
        let Some(Stmt::Return {
            value: Some(Expr::Call(_, args)),
            ..
        }) = body.first()
        else {
            panic!("unexpected {:?}", body);
        };
        match &args[1] {
            Arg::Expr(Expr::Function(function)) => assert_eq!(function.params, vec!["data".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_eta_reduced_continuation() {
        let (body, _) = rewrite(vec![Stmt::ret(Some(Expr::call(
            Expr::ident("log"),
            vec![await_expr(Expr::ident("value"))],
        )))]);
        assert_eq!(
            body,
            vec![local_return(Some(Expr::call(
                Expr::ident("_await"),
                vec![Expr::ident("value"), Expr::ident("log")]
            )))]
        );
    }

    #[test]
    fn test_inline_helpers_use_promise_methods() {
        let mut names = NameGenerator::new();
        let mut helpers = HelperTable::new();
        let infos = InfoTable::new();
        let options = TransformOptions {
            inline_helpers: true,
            ..TransformOptions::default()
        };
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options);
        let body = rewriter
            .rewrite_function(&[], vec![Stmt::ret(Some(await_expr(Expr::ident("value"))))])
            .unwrap();
        assert!(rewriter.used_helpers().is_empty());
        assert_eq!(
            body,
            vec![local_return(Some(Expr::call(
                Expr::member(Expr::ident("Promise"), "resolve"),
                vec![Expr::ident("value")]
            )))]
        );
    }
}
