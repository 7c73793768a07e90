//! Jump rewriting
//!
//! Before a construct's body moves into a synthesized function, every jump
//! that leaves the construct is turned into an assignment to a flag followed
//! by a `return`. The construct's helper and the continuation after it read
//! the flags to find out how the body finished.

use log::trace;

use super::Rewriter;
use crate::analysis::references::stmt_suspends;
use crate::error::{Error, Result};
use crate::ir::{Exit, Expr, Stmt};

/// The construct whose body is being rewritten
#[derive(Debug, Clone)]
pub(crate) enum Owner {
    /// A plain thunk; only `return` leaves it
    Thunk,
    /// A loop carrying these labels
    Loop(Vec<String>),
    /// A `switch` carrying these labels
    Switch(Vec<String>),
    /// A labeled statement that is neither a loop nor a `switch`
    Label(Vec<String>),
}

#[derive(Debug)]
pub(crate) struct JumpScope {
    owner: Owner,
    /// Turn source `return`s into flagged returns
    flag_returns: bool,
    break_flag: Option<String>,
    skip_flag: Option<String>,
    escaping: Vec<String>,
}

impl JumpScope {
    pub(crate) fn new(owner: Owner, flag_returns: bool) -> Self {
        Self {
            owner,
            flag_returns,
            break_flag: None,
            skip_flag: None,
            escaping: Vec::new(),
        }
    }

    /// Flags set by jumps that leave the construct altogether
    pub(crate) fn escaping(&self) -> Vec<String> {
        self.escaping.clone()
    }

    /// Flag set by a `break` out of the construct itself
    pub(crate) fn break_flag(&self) -> Option<&str> {
        self.break_flag.as_deref()
    }

    /// Flag set by a `continue` from inside a nested construct
    pub(crate) fn skip_flag(&self) -> Option<&str> {
        self.skip_flag.as_deref()
    }

    /// `var <break flag>;` for the code that runs the construct
    pub(crate) fn declarations(&self) -> Option<Stmt> {
        Stmt::declare(self.break_flag.clone())
    }

    fn note_escape(&mut self, flag: &str) {
        if !self.escaping.iter().any(|existing| existing == flag) {
            self.escaping.push(flag.to_string());
        }
    }

    fn owns_break(&self, label: Option<&str>) -> bool {
        match (&self.owner, label) {
            (Owner::Loop(_) | Owner::Switch(_), None) => true,
            (Owner::Loop(labels) | Owner::Switch(labels) | Owner::Label(labels), Some(label)) => {
                labels.iter().any(|owned| owned == label)
            }
            _ => false,
        }
    }

    fn owns_continue(&self, label: Option<&str>) -> bool {
        match (&self.owner, label) {
            (Owner::Loop(_), None) => true,
            (Owner::Loop(labels), Some(label)) => labels.iter().any(|owned| owned == label),
            _ => false,
        }
    }
}

/// Jump targets inside the construct's body
#[derive(Debug, Clone)]
enum Inner {
    Loop(Vec<String>),
    Switch(Vec<String>),
    Label(String),
}

fn resolves_break(inner: &[Inner], label: Option<&str>) -> bool {
    inner.iter().rev().any(|target| match (target, label) {
        (Inner::Loop(_) | Inner::Switch(_), None) => true,
        (Inner::Loop(labels) | Inner::Switch(labels), Some(label)) => labels.iter().any(|owned| owned == label),
        (Inner::Label(owned), Some(label)) => owned == label,
        (Inner::Label(_), None) => false,
    })
}

fn resolves_continue(inner: &[Inner], label: Option<&str>) -> bool {
    inner.iter().rev().any(|target| match (target, label) {
        (Inner::Loop(_), None) => true,
        (Inner::Loop(labels), Some(label)) => labels.iter().any(|owned| owned == label),
        _ => false,
    })
}

impl Rewriter<'_> {
    pub(crate) fn rewrite_jumps(&mut self, stmts: Vec<Stmt>, scope: &mut JumpScope) -> Result<Vec<Stmt>> {
        let mut inner = Vec::new();
        stmts
            .into_iter()
            .map(|stmt| self.jumps_in(stmt, scope, &mut inner, false))
            .collect()
    }

    fn jumps_in_list(
        &mut self,
        stmts: Vec<Stmt>,
        scope: &mut JumpScope,
        inner: &mut Vec<Inner>,
        nested: bool,
    ) -> Result<Vec<Stmt>> {
        stmts
            .into_iter()
            .map(|stmt| self.jumps_in(stmt, scope, inner, nested))
            .collect()
    }

    fn jumps_in_boxed(
        &mut self,
        stmt: Box<Stmt>,
        scope: &mut JumpScope,
        inner: &mut Vec<Inner>,
        nested: bool,
    ) -> Result<Box<Stmt>> {
        Ok(Box::new(self.jumps_in(*stmt, scope, inner, nested)?))
    }

    /// `nested` is set once the walk is inside a compound statement that
    /// suspends, i.e. one that becomes its own synthesized function
    fn jumps_in(&mut self, stmt: Stmt, scope: &mut JumpScope, inner: &mut Vec<Inner>, nested: bool) -> Result<Stmt> {
        let children_nested = nested || stmt_suspends(&stmt);
        match stmt {
            Stmt::Return { value, exit } => match exit {
                Exit::Source if scope.flag_returns => {
                    let flag = self.exit_flag();
                    scope.note_escape(&flag);
                    Ok(self.flagged_return(flag, value))
                }
                Exit::Flagged(flag) => {
                    scope.note_escape(&flag);
                    Ok(Stmt::Return {
                        value,
                        exit: Exit::Flagged(flag),
                    })
                }
                exit => Ok(Stmt::Return { value, exit }),
            },
            Stmt::Break(label) => {
                if resolves_break(inner, label.as_deref()) {
                    return Ok(Stmt::Break(label));
                }
                if !scope.owns_break(label.as_deref()) {
                    return Err(Error::invariant(format!("break to unknown target {:?}", label)));
                }
                let ends_label = matches!(scope.owner, Owner::Label(_)) && !nested;
                if ends_label {
                    return Ok(Stmt::Return {
                        value: None,
                        exit: Exit::Local,
                    });
                }
                let flag = self.scope_break_flag(scope, label.as_deref());
                Ok(self.flagged_return(flag, None))
            }
            Stmt::Continue(label) => {
                if resolves_continue(inner, label.as_deref()) {
                    return Ok(Stmt::Continue(label));
                }
                if !scope.owns_continue(label.as_deref()) {
                    return Err(Error::invariant(format!("continue to unknown target {:?}", label)));
                }
                if !nested {
                    return Ok(Stmt::Return {
                        value: None,
                        exit: Exit::Local,
                    });
                }
                let flag = match &scope.skip_flag {
                    Some(flag) => flag.clone(),
                    None => {
                        let flag = self.names.fresh("skip");
                        scope.skip_flag = Some(flag.clone());
                        flag
                    }
                };
                Ok(self.flagged_return(flag, None))
            }
            Stmt::If(test, consequent, alternate) => {
                let consequent = self.jumps_in_boxed(consequent, scope, inner, children_nested)?;
                let alternate = alternate
                    .map(|alternate| self.jumps_in_boxed(alternate, scope, inner, children_nested))
                    .transpose()?;
                Ok(Stmt::If(test, consequent, alternate))
            }
            Stmt::Block(stmts) => Ok(Stmt::Block(self.jumps_in_list(stmts, scope, inner, children_nested)?)),
            Stmt::Labeled(label, body) => {
                let mut labels = vec![label];
                let mut body = *body;
                while let Stmt::Labeled(label, inner_body) = body {
                    labels.push(label);
                    body = *inner_body;
                }
                let target = if body.is_loop() {
                    Inner::Loop(labels.clone())
                } else if matches!(body, Stmt::Switch(..)) {
                    Inner::Switch(labels.clone())
                } else {
                    Inner::Label(labels[0].clone())
                };
                let pushed = match &target {
                    Inner::Label(_) => labels.iter().map(|label| Inner::Label(label.clone())).collect(),
                    _ => vec![target],
                };
                let depth = inner.len();
                inner.extend(pushed);
                let body = self.jumps_in_target(body, scope, inner, children_nested);
                inner.truncate(depth);
                let mut rebuilt = body?;
                for label in labels.into_iter().rev() {
                    rebuilt = Stmt::Labeled(label, Box::new(rebuilt));
                }
                Ok(rebuilt)
            }
            stmt if stmt.is_loop() || matches!(stmt, Stmt::Switch(..)) => {
                let target = if stmt.is_loop() {
                    Inner::Loop(Vec::new())
                } else {
                    Inner::Switch(Vec::new())
                };
                inner.push(target);
                let result = self.jumps_in_target(stmt, scope, inner, children_nested);
                inner.pop();
                result
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let block = self.jumps_in_list(block, scope, inner, children_nested)?;
                let handler = match handler {
                    Some(mut handler) => {
                        handler.body = self.jumps_in_list(handler.body, scope, inner, children_nested)?;
                        Some(handler)
                    }
                    None => None,
                };
                let finalizer = finalizer
                    .map(|finalizer| self.jumps_in_list(finalizer, scope, inner, children_nested))
                    .transpose()?;
                Ok(Stmt::Try {
                    block,
                    handler,
                    finalizer,
                })
            }
            other => Ok(other),
        }
    }

    /// Body of a loop or `switch` whose jump target is already on `inner`
    fn jumps_in_target(
        &mut self,
        stmt: Stmt,
        scope: &mut JumpScope,
        inner: &mut Vec<Inner>,
        nested: bool,
    ) -> Result<Stmt> {
        Ok(match stmt {
            Stmt::For {
                init,
                test,
                update,
                body,
                indexed,
            } => Stmt::For {
                init,
                test,
                update,
                body: self.jumps_in_boxed(body, scope, inner, nested)?,
                indexed,
            },
            Stmt::ForIn { left, right, body } => Stmt::ForIn {
                left,
                right,
                body: self.jumps_in_boxed(body, scope, inner, nested)?,
            },
            Stmt::ForOf {
                left,
                right,
                body,
                is_await,
            } => Stmt::ForOf {
                left,
                right,
                body: self.jumps_in_boxed(body, scope, inner, nested)?,
                is_await,
            },
            Stmt::While(test, body) => Stmt::While(test, self.jumps_in_boxed(body, scope, inner, nested)?),
            Stmt::DoWhile(body, test) => Stmt::DoWhile(self.jumps_in_boxed(body, scope, inner, nested)?, test),
            Stmt::Switch(discriminant, cases) => {
                let mut rewritten = Vec::with_capacity(cases.len());
                for mut case in cases {
                    case.body = self.jumps_in_list(case.body, scope, inner, nested)?;
                    rewritten.push(case);
                }
                Stmt::Switch(discriminant, rewritten)
            }
            other => self.jumps_in(other, scope, inner, nested)?,
        })
    }

    fn scope_break_flag(&mut self, scope: &mut JumpScope, label: Option<&str>) -> String {
        if let Some(flag) = &scope.break_flag {
            return flag.clone();
        }
        let hint = match (&scope.owner, label) {
            (Owner::Label(_), Some(label)) => label.to_string(),
            _ => "interrupt".to_string(),
        };
        let flag = self.names.fresh(&hint);
        trace!("break flag {} for {:?}", flag, scope.owner);
        scope.break_flag = Some(flag.clone());
        flag
    }

    /// `[var t = value;] flag = true; return t;`
    pub(crate) fn flagged_return(&mut self, flag: String, value: Option<Expr>) -> Stmt {
        let mut stmts = Vec::with_capacity(3);
        let value = match value {
            Some(value) if !self.is_stable(&value) => {
                let temp = self.names.fresh_for(&value, self.infos);
                stmts.push(Stmt::var(temp.clone(), Some(value)));
                Some(Expr::Ident(temp))
            }
            value => value,
        };
        stmts.push(Stmt::expr(Expr::assign(flag.clone(), self.flag_value())));
        stmts.push(Stmt::Return {
            value,
            exit: Exit::Flagged(flag),
        });
        Stmt::Block(stmts)
    }
}
