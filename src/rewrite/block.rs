use std::collections::HashSet;

use log::trace;

use super::jumps::{JumpScope, Owner};
use super::{local_return, Resume, Rewriter};
use crate::analysis::reachability::stmt_may_fall_through;
use crate::analysis::references::{
    breaks_to_label, expr_suspends, lexical_names, references, stmt_suspends, stmts_suspend,
};
use crate::error::{Error, Result};
use crate::ir::{
    Arg, ArrayItem, Binding, Declarator, Expr, ForHead, ForInit, Function, MemberProp, ObjectEntry, PropertyKey,
    Stmt, SwitchCase, Target, VarDecl, VarKind,
};

impl Rewriter<'_> {
    /// Rewrite a statement list whose normal completion is the completion of
    /// the enclosing (possibly synthesized) function
    pub(crate) fn rewrite_block(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>> {
        if !stmts_suspend(&stmts) {
            return Ok(stmts);
        }
        let stmts = hoist_function_declarations(stmts);

        let mut out: Vec<Stmt> = Vec::with_capacity(stmts.len());
        let mut rest = stmts.into_iter();
        while let Some(mut stmt) = rest.next() {
            if !stmt_suspends(&stmt) {
                out.push(stmt);
                continue;
            }
            let mut tail: Vec<Stmt> = rest.by_ref().collect();
            self.hoist_lexical(&mut out, &mut stmt, &mut tail);
            out.extend(self.rewrite_statement(stmt, tail)?);
            break;
        }
        Ok(out)
    }

    /// Block-scoped names declared in the part of a block that moves into
    /// continuations, but still read by statements that stay behind, are
    /// declared up front instead
    fn hoist_lexical(&mut self, out: &mut Vec<Stmt>, stmt: &mut Stmt, tail: &mut [Stmt]) {
        if out.is_empty() {
            return;
        }
        let referenced = references(out, self.infos);
        let mut hoisted: Vec<String> = Vec::new();
        for declaring in std::iter::once(&*stmt).chain(tail.iter()) {
            for name in lexical_names(declaring) {
                if referenced.contains(&name) && !hoisted.contains(&name) {
                    hoisted.push(name);
                }
            }
        }
        if hoisted.is_empty() {
            return;
        }
        trace!("hoisting block-scoped names {:?}", hoisted);
        let names: HashSet<String> = hoisted.iter().cloned().collect();
        out.push(Stmt::Var(VarDecl {
            kind: VarKind::Let,
            declarators: hoisted
                .into_iter()
                .map(|name| Declarator {
                    binding: Binding::Ident(name),
                    init: None,
                })
                .collect(),
        }));
        declarations_to_assignments(stmt, &names);
        for stmt in tail.iter_mut() {
            declarations_to_assignments(stmt, &names);
        }
    }

    /// Rewrite a suspending statement followed by `tail`
    fn rewrite_statement(&mut self, stmt: Stmt, tail: Vec<Stmt>) -> Result<Vec<Stmt>> {
        if head_suspends(&stmt) {
            return self.rewrite_head(stmt, tail);
        }
        match stmt {
            Stmt::If(test, consequent, alternate) => self.rewrite_if(test, *consequent, alternate.map(|alt| *alt), tail),
            Stmt::Block(stmts) => self.rewrite_nested_block(stmts, tail),
            Stmt::Labeled(label, body) => self.rewrite_labeled(vec![label], *body, tail),
            Stmt::Switch(discriminant, cases) => self.rewrite_switch(discriminant, cases, Vec::new(), tail),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => self.rewrite_try(block, handler, finalizer, tail),
            stmt if stmt.is_loop() => self.rewrite_loop(stmt, Vec::new(), tail),
            other => Err(Error::invariant(format!(
                "suspension in a statement that cannot suspend: {:?}",
                other
            ))),
        }
    }

    fn rewrite_if(
        &mut self,
        test: Expr,
        consequent: Stmt,
        alternate: Option<Stmt>,
        tail: Vec<Stmt>,
    ) -> Result<Vec<Stmt>> {
        let settles = |branch: &Stmt| !stmt_suspends(branch) || !stmt_may_fall_through(branch, self.infos);
        let in_place = tail.is_empty() || (settles(&consequent) && alternate.as_ref().map_or(true, settles));

        if in_place {
            let consequent = self.rewrite_branch(consequent)?;
            let alternate = alternate.map(|alt| self.rewrite_branch(alt)).transpose()?;
            let mut out = vec![Stmt::If(test, Box::new(consequent), alternate.map(Box::new))];
            out.extend(self.rewrite_block(tail)?);
            return Ok(out);
        }

        let statement = Stmt::If(test, Box::new(consequent), alternate.map(Box::new));
        self.rewrite_thunk(vec![statement], Owner::Thunk, tail)
    }

    fn rewrite_branch(&mut self, branch: Stmt) -> Result<Stmt> {
        if !stmt_suspends(&branch) {
            return Ok(branch);
        }
        Ok(Stmt::Block(self.rewrite_block(branch.into_list())?))
    }

    fn rewrite_nested_block(&mut self, stmts: Vec<Stmt>, mut tail: Vec<Stmt>) -> Result<Vec<Stmt>> {
        if !Stmt::has_lexical_declaration(&stmts) {
            let mut spliced = stmts;
            spliced.append(&mut tail);
            return self.rewrite_block(spliced);
        }
        if tail.is_empty() {
            return Ok(vec![Stmt::Block(self.rewrite_block(stmts)?)]);
        }
        self.rewrite_thunk(vec![Stmt::Block(stmts)], Owner::Thunk, tail)
    }

    fn rewrite_labeled(&mut self, mut labels: Vec<String>, body: Stmt, tail: Vec<Stmt>) -> Result<Vec<Stmt>> {
        match body {
            Stmt::Labeled(label, inner) => {
                labels.push(label);
                self.rewrite_labeled(labels, *inner, tail)
            }
            body if body.is_loop() => self.rewrite_loop(body, labels, tail),
            Stmt::Switch(discriminant, cases) => self.rewrite_switch(discriminant, cases, labels, tail),
            body => {
                let body = vec![body];
                let targeted: Vec<String> = labels
                    .into_iter()
                    .filter(|label| breaks_to_label(&body, label))
                    .collect();
                if targeted.is_empty() {
                    let mut stmts = body;
                    stmts.extend(tail);
                    return self.rewrite_block(stmts);
                }
                if tail.is_empty() {
                    let mut scope = JumpScope::new(Owner::Label(targeted), false);
                    let body = self.rewrite_jumps(body, &mut scope)?;
                    let mut out: Vec<Stmt> = scope.declarations().into_iter().collect();
                    out.push(Stmt::Block(self.rewrite_block(body)?));
                    return Ok(out);
                }
                self.rewrite_thunk(body, Owner::Label(targeted), tail)
            }
        }
    }

    /// Run `body` in a thunk, then continue with `tail`
    fn rewrite_thunk(&mut self, body: Vec<Stmt>, owner: Owner, tail: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let mut scope = JumpScope::new(owner, true);
        let body = self.rewrite_jumps(body, &mut scope)?;
        let body = self.rewrite_block(body)?;
        let prelude: Vec<Stmt> = scope.declarations().into_iter().collect();
        let escaping = scope.escaping();
        self.resume_after(prelude, Resume::Invoke(Function::thunk(body)), escaping, tail)
    }

    /// Statement whose own head expression suspends
    fn rewrite_head(&mut self, stmt: Stmt, tail: Vec<Stmt>) -> Result<Vec<Stmt>> {
        match stmt {
            Stmt::Var(decl) if decl.declarators.len() > 1 => {
                let kind = decl.kind;
                let mut stmts: Vec<Stmt> = decl
                    .declarators
                    .into_iter()
                    .map(|declarator| {
                        Stmt::Var(VarDecl {
                            kind,
                            declarators: vec![declarator],
                        })
                    })
                    .collect();
                stmts.extend(tail);
                self.rewrite_block(stmts)
            }
            Stmt::For {
                init: Some(init),
                test,
                update,
                body,
                indexed,
            } => {
                let lexical = matches!(&init, ForInit::Var(decl) if decl.kind != VarKind::Var);
                let init = match init {
                    ForInit::Var(decl) => Stmt::Var(decl),
                    ForInit::Expr(expr) => Stmt::Expr(expr),
                };
                let rest = Stmt::For {
                    init: None,
                    test,
                    update,
                    body,
                    indexed,
                };
                if lexical {
                    self.rewrite_nested_block(vec![init, rest], tail)
                } else {
                    let mut stmts = vec![init, rest];
                    stmts.extend(tail);
                    self.rewrite_block(stmts)
                }
            }
            stmt => self.rewrite_suspension(stmt, tail),
        }
    }

    /// Split off the first suspension point of a statement's head and
    /// continue with the rebuilt statement and `tail`
    fn rewrite_suspension(&mut self, stmt: Stmt, tail: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let (expr, head) = Head::split(stmt)?;

        // `const x = await y` binds the awaited value directly
        if let Head::Var { binding: Binding::Ident(name), .. } = &head {
            if let Expr::Await(operand) = &expr {
                if !expr_suspends(operand) {
                    let name = name.clone();
                    let Expr::Await(operand) = expr else {
                        return Err(Error::invariant("await operand vanished"));
                    };
                    let body = self.rewrite_block(tail)?;
                    let continuation = self.continuation(&name, body);
                    let call = self.await_call(*operand, continuation)?;
                    return Ok(vec![local_return(Some(call))]);
                }
            }
        }

        let hole = self.names.fresh_for(first_operand(&expr).unwrap_or(&expr), self.infos);
        let mut prelude = Vec::new();
        match self.extract(expr, &hole, &mut prelude)? {
            super::expressions::Extracted::Suspend {
                rebuilt,
                operand,
                is_yield,
            } => {
                let mut rest = Vec::with_capacity(tail.len() + 1);
                let discarded = matches!((&head, &rebuilt), (Head::Expr, Expr::Ident(name)) if *name == hole);
                if !discarded {
                    rest.push(head.rebuild(rebuilt));
                }
                rest.extend(tail);
                let operand = match (is_yield, self.generator()) {
                    (true, Some(generator)) => {
                        Expr::call(Expr::member(Expr::ident(generator), "_yield"), vec![operand])
                    }
                    (true, None) => return Err(Error::invariant("yield outside of an async generator")),
                    (false, _) => operand,
                };
                let body = self.rewrite_block(rest)?;
                let continuation = self.continuation(&hole, body);
                prelude.push(local_return(Some(self.await_call(operand, continuation)?)));
                Ok(prelude)
            }
            super::expressions::Extracted::Expand { rebuilt, stmts } => {
                prelude.extend(stmts);
                prelude.push(head.rebuild(rebuilt));
                prelude.extend(tail);
                self.rewrite_block(prelude)
            }
        }
    }
}

/// The part of a statement around its head expression
enum Head {
    Expr,
    Throw,
    Return,
    Var { kind: VarKind, binding: Binding },
    If(Box<Stmt>, Option<Box<Stmt>>),
    Switch(Vec<SwitchCase>),
    ForIn { left: ForHead, body: Box<Stmt> },
    ForOf { left: ForHead, body: Box<Stmt>, is_await: bool },
}

impl Head {
    fn split(stmt: Stmt) -> Result<(Expr, Head)> {
        Ok(match stmt {
            Stmt::Expr(expr) => (expr, Head::Expr),
            Stmt::Throw(expr) => (expr, Head::Throw),
            Stmt::Return { value: Some(value), .. } => (value, Head::Return),
            Stmt::Var(mut decl) if decl.declarators.len() == 1 => {
                let declarator = decl.declarators.remove(0);
                let init = declarator
                    .init
                    .ok_or_else(|| Error::invariant("suspending declaration without initializer"))?;
                (
                    init,
                    Head::Var {
                        kind: decl.kind,
                        binding: declarator.binding,
                    },
                )
            }
            Stmt::If(test, consequent, alternate) => (test, Head::If(consequent, alternate)),
            Stmt::Switch(discriminant, cases) => (discriminant, Head::Switch(cases)),
            Stmt::ForIn { left, right, body } => (right, Head::ForIn { left, body }),
            Stmt::ForOf {
                left,
                right,
                body,
                is_await,
            } => (right, Head::ForOf { left, body, is_await }),
            other => return Err(Error::invariant(format!("no head expression in {:?}", other))),
        })
    }

    fn rebuild(self, expr: Expr) -> Stmt {
        match self {
            Head::Expr => Stmt::Expr(expr),
            Head::Throw => Stmt::Throw(expr),
            Head::Return => Stmt::ret(Some(expr)),
            Head::Var { kind, binding } => Stmt::Var(VarDecl::single(kind, binding, Some(expr))),
            Head::If(consequent, alternate) => Stmt::If(expr, consequent, alternate),
            Head::Switch(cases) => Stmt::Switch(expr, cases),
            Head::ForIn { left, body } => Stmt::ForIn { left, right: expr, body },
            Head::ForOf { left, body, is_await } => Stmt::ForOf {
                left,
                right: expr,
                body,
                is_await,
            },
        }
    }
}

/// Whether the expression a statement evaluates before anything else suspends
fn head_suspends(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(expr) | Stmt::Throw(expr) => expr_suspends(expr),
        Stmt::Var(decl) => decl
            .declarators
            .iter()
            .any(|declarator| declarator.init.as_ref().is_some_and(expr_suspends)),
        Stmt::Return { value: Some(value), .. } => expr_suspends(value),
        Stmt::If(test, ..) => expr_suspends(test),
        Stmt::Switch(discriminant, _) => expr_suspends(discriminant),
        Stmt::ForIn { right, .. } | Stmt::ForOf { right, .. } => expr_suspends(right),
        Stmt::For { init: Some(init), .. } => match init {
            ForInit::Var(decl) => decl
                .declarators
                .iter()
                .any(|declarator| declarator.init.as_ref().is_some_and(expr_suspends)),
            ForInit::Expr(expr) => expr_suspends(expr),
        },
        _ => false,
    }
}

/// The operand of the first suspension point in evaluation order, used to
/// name its result
fn first_operand(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::Await(operand) => first_operand(operand).or(Some(operand)),
        Expr::Yield(Some(operand)) => first_operand(operand).or(Some(operand)),
        Expr::Unary(_, operand) => first_operand(operand),
        Expr::Binary(_, left, right) | Expr::Logical(_, left, right) => {
            first_operand(left).or_else(|| first_operand(right))
        }
        Expr::Conditional(test, consequent, alternate) => first_operand(test)
            .or_else(|| first_operand(consequent))
            .or_else(|| first_operand(alternate)),
        Expr::Assign(_, target, value) => {
            let in_target = match target.as_ref() {
                Target::Member(object, property) => first_operand(object).or_else(|| match property {
                    MemberProp::Computed(property) => first_operand(property),
                    MemberProp::Static(_) => None,
                }),
                _ => None,
            };
            in_target.or_else(|| first_operand(value))
        }
        Expr::Call(callee, args) | Expr::New(callee, args) => first_operand(callee).or_else(|| {
            args.iter().find_map(|arg| match arg {
                Arg::Expr(expr) | Arg::Spread(expr) => first_operand(expr),
            })
        }),
        Expr::Member(object, property) => first_operand(object).or_else(|| match property {
            MemberProp::Computed(property) => first_operand(property),
            MemberProp::Static(_) => None,
        }),
        Expr::Sequence(exprs) => exprs.iter().find_map(first_operand),
        Expr::Array(items) => items.iter().find_map(|item| match item {
            ArrayItem::Expr(expr) | ArrayItem::Spread(expr) => first_operand(expr),
            ArrayItem::Hole => None,
        }),
        Expr::Object(entries) => entries.iter().find_map(|entry| match entry {
            ObjectEntry::Property { key, value } => match key {
                PropertyKey::Computed(key) => first_operand(key).or_else(|| first_operand(value)),
                _ => first_operand(value),
            },
            ObjectEntry::Spread(expr) => first_operand(expr),
            ObjectEntry::Opaque(_) => None,
        }),
        _ => None,
    }
}

/// Function declarations move to the front of a block that gets split, so
/// they stay visible to every continuation
fn hoist_function_declarations(stmts: Vec<Stmt>) -> Vec<Stmt> {
    if !stmts.iter().any(|stmt| matches!(stmt, Stmt::FunctionDecl { .. })) {
        return stmts;
    }
    let (mut functions, rest): (Vec<Stmt>, Vec<Stmt>) = stmts
        .into_iter()
        .partition(|stmt| matches!(stmt, Stmt::FunctionDecl { .. }));
    functions.extend(rest);
    functions
}

/// Turn `let`/`const` declarations of `names` into plain assignments
fn declarations_to_assignments(stmt: &mut Stmt, names: &HashSet<String>) {
    let Stmt::Var(decl) = stmt else {
        return;
    };
    if decl.kind == VarKind::Var {
        return;
    }
    let declares = decl.declarators.iter().any(
        |declarator| matches!(&declarator.binding, Binding::Ident(name) if names.contains(name)),
    );
    if !declares {
        return;
    }

    let kind = decl.kind;
    let mut replacement: Vec<Stmt> = Vec::new();
    for declarator in std::mem::take(&mut decl.declarators) {
        match declarator.binding {
            Binding::Ident(name) if names.contains(&name) => {
                if let Some(init) = declarator.init {
                    replacement.push(Stmt::expr(Expr::assign(name, init)));
                }
            }
            binding => replacement.push(Stmt::Var(VarDecl::single(kind, binding, declarator.init))),
        }
    }
    *stmt = match replacement.len() {
        0 => Stmt::Empty,
        1 => replacement.remove(0),
        _ => Stmt::Block(replacement),
    };
}
