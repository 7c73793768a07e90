//! Generic traversal over the owned tree
//!
//! Hooks run before children are walked and decide how the walk proceeds
//! through [`VisitControl`]. Walkers return `ControlFlow::Break` once a hook
//! asked to stop, so callers can bail out with `?`.

use std::ops::ControlFlow;

use super::{
    Arg, ArrayItem, Binding, CatchClause, Expr, ForHead, ForInit, Function, MemberProp,
    ObjectEntry, PropertyKey, Stmt, Target, VarDecl,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    /// Walk the children
    Continue,
    /// Do not descend into this node
    Skip,
    /// Abort the whole walk
    Stop,
}

pub trait Visitor {
    fn enter_stmt(&mut self, _stmt: &Stmt) -> VisitControl {
        VisitControl::Continue
    }

    fn enter_expr(&mut self, _expr: &Expr) -> VisitControl {
        VisitControl::Continue
    }

    fn enter_target(&mut self, _target: &Target) -> VisitControl {
        VisitControl::Continue
    }

    fn enter_binding(&mut self, _binding: &Binding) {}

    fn enter_function(&mut self, _function: &Function) -> VisitControl {
        VisitControl::Continue
    }
}

fn dispatch(control: VisitControl) -> ControlFlow<(), bool> {
    match control {
        VisitControl::Continue => ControlFlow::Continue(true),
        VisitControl::Skip => ControlFlow::Continue(false),
        VisitControl::Stop => ControlFlow::Break(()),
    }
}

pub fn walk_stmts<V: Visitor + ?Sized>(visitor: &mut V, stmts: &[Stmt]) -> ControlFlow<()> {
    for stmt in stmts {
        walk_stmt(visitor, stmt)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, function: &Function) -> ControlFlow<()> {
    if dispatch(visitor.enter_function(function))? {
        walk_stmts(visitor, &function.body)?;
    }
    ControlFlow::Continue(())
}

fn walk_var_decl<V: Visitor + ?Sized>(visitor: &mut V, decl: &VarDecl) -> ControlFlow<()> {
    for declarator in &decl.declarators {
        visitor.enter_binding(&declarator.binding);
        if let Some(init) = &declarator.init {
            walk_expr(visitor, init)?;
        }
    }
    ControlFlow::Continue(())
}

fn walk_for_head<V: Visitor + ?Sized>(visitor: &mut V, head: &ForHead) -> ControlFlow<()> {
    match head {
        ForHead::Var(_, binding) => visitor.enter_binding(binding),
        ForHead::Target(target) => walk_target(visitor, target)?,
    }
    ControlFlow::Continue(())
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) -> ControlFlow<()> {
    if !dispatch(visitor.enter_stmt(stmt))? {
        return ControlFlow::Continue(());
    }
    match stmt {
        Stmt::Expr(expr) | Stmt::Throw(expr) => walk_expr(visitor, expr)?,
        Stmt::Var(decl) => walk_var_decl(visitor, decl)?,
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                walk_expr(visitor, value)?;
            }
        }
        Stmt::If(test, consequent, alternate) => {
            walk_expr(visitor, test)?;
            walk_stmt(visitor, consequent)?;
            if let Some(alternate) = alternate {
                walk_stmt(visitor, alternate)?;
            }
        }
        Stmt::Block(stmts) => walk_stmts(visitor, stmts)?,
        Stmt::For {
            init,
            test,
            update,
            body,
            ..
        } => {
            match init {
                Some(ForInit::Var(decl)) => walk_var_decl(visitor, decl)?,
                Some(ForInit::Expr(expr)) => walk_expr(visitor, expr)?,
                None => {}
            }
            if let Some(test) = test {
                walk_expr(visitor, test)?;
            }
            if let Some(update) = update {
                walk_expr(visitor, update)?;
            }
            walk_stmt(visitor, body)?;
        }
        Stmt::ForIn { left, right, body } | Stmt::ForOf { left, right, body, .. } => {
            walk_for_head(visitor, left)?;
            walk_expr(visitor, right)?;
            walk_stmt(visitor, body)?;
        }
        Stmt::While(test, body) => {
            walk_expr(visitor, test)?;
            walk_stmt(visitor, body)?;
        }
        Stmt::DoWhile(body, test) => {
            walk_stmt(visitor, body)?;
            walk_expr(visitor, test)?;
        }
        Stmt::Labeled(_, body) => walk_stmt(visitor, body)?,
        Stmt::Switch(discriminant, cases) => {
            walk_expr(visitor, discriminant)?;
            for case in cases {
                if let Some(test) = &case.test {
                    walk_expr(visitor, test)?;
                }
                walk_stmts(visitor, &case.body)?;
            }
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            walk_stmts(visitor, block)?;
            if let Some(CatchClause { param, body }) = handler {
                if let Some(param) = param {
                    visitor.enter_binding(param);
                }
                walk_stmts(visitor, body)?;
            }
            if let Some(finalizer) = finalizer {
                walk_stmts(visitor, finalizer)?;
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::FunctionDecl { .. } | Stmt::Opaque(_) | Stmt::Empty => {}
    }
    ControlFlow::Continue(())
}

pub fn walk_target<V: Visitor + ?Sized>(visitor: &mut V, target: &Target) -> ControlFlow<()> {
    if !dispatch(visitor.enter_target(target))? {
        return ControlFlow::Continue(());
    }
    if let Target::Member(object, property) = target {
        walk_expr(visitor, object)?;
        walk_member_prop(visitor, property)?;
    }
    ControlFlow::Continue(())
}

fn walk_member_prop<V: Visitor + ?Sized>(visitor: &mut V, property: &MemberProp) -> ControlFlow<()> {
    if let MemberProp::Computed(expr) = property {
        walk_expr(visitor, expr)?;
    }
    ControlFlow::Continue(())
}

fn walk_args<V: Visitor + ?Sized>(visitor: &mut V, args: &[Arg]) -> ControlFlow<()> {
    for arg in args {
        match arg {
            Arg::Expr(expr) | Arg::Spread(expr) => walk_expr(visitor, expr)?,
        }
    }
    ControlFlow::Continue(())
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) -> ControlFlow<()> {
    if !dispatch(visitor.enter_expr(expr))? {
        return ControlFlow::Continue(());
    }
    match expr {
        Expr::Ident(_)
        | Expr::This
        | Expr::Number(_)
        | Expr::Str(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Undefined
        | Expr::Opaque(_) => {}
        Expr::Function(function) => walk_function(visitor, function)?,
        Expr::Unary(_, operand) | Expr::Await(operand) => walk_expr(visitor, operand)?,
        Expr::Binary(_, left, right) | Expr::Logical(_, left, right) => {
            walk_expr(visitor, left)?;
            walk_expr(visitor, right)?;
        }
        Expr::Conditional(test, consequent, alternate) => {
            walk_expr(visitor, test)?;
            walk_expr(visitor, consequent)?;
            walk_expr(visitor, alternate)?;
        }
        Expr::Assign(_, target, value) => {
            walk_target(visitor, target)?;
            walk_expr(visitor, value)?;
        }
        Expr::Call(callee, args) | Expr::New(callee, args) => {
            walk_expr(visitor, callee)?;
            walk_args(visitor, args)?;
        }
        Expr::Member(object, property) => {
            walk_expr(visitor, object)?;
            walk_member_prop(visitor, property)?;
        }
        Expr::Sequence(exprs) => {
            for expr in exprs {
                walk_expr(visitor, expr)?;
            }
        }
        Expr::Array(items) => {
            for item in items {
                match item {
                    ArrayItem::Expr(expr) | ArrayItem::Spread(expr) => walk_expr(visitor, expr)?,
                    ArrayItem::Hole => {}
                }
            }
        }
        Expr::Object(entries) => {
            for entry in entries {
                match entry {
                    ObjectEntry::Property { key, value } => {
                        if let PropertyKey::Computed(key) = key {
                            walk_expr(visitor, key)?;
                        }
                        walk_expr(visitor, value)?;
                    }
                    ObjectEntry::Spread(expr) => walk_expr(visitor, expr)?,
                    ObjectEntry::Opaque(_) => {}
                }
            }
        }
        Expr::Yield(argument) => {
            if let Some(argument) = argument {
                walk_expr(visitor, argument)?;
            }
        }
    }
    ControlFlow::Continue(())
}

/// Mutable traversal in the style of `oxc_ast_visit::VisitMut`: override a
/// `visit_*` method and call the matching `walk_*_mut` to keep descending.
pub trait VisitorMut {
    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }

    fn visit_function(&mut self, function: &mut Function) {
        walk_stmts_mut(self, &mut function.body);
    }
}

pub fn walk_stmts_mut<V: VisitorMut + ?Sized>(visitor: &mut V, stmts: &mut [Stmt]) {
    for stmt in stmts {
        visitor.visit_stmt(stmt);
    }
}

fn walk_var_decl_mut<V: VisitorMut + ?Sized>(visitor: &mut V, decl: &mut VarDecl) {
    for declarator in &mut decl.declarators {
        if let Some(init) = &mut declarator.init {
            visitor.visit_expr(init);
        }
    }
}

fn walk_target_mut<V: VisitorMut + ?Sized>(visitor: &mut V, target: &mut Target) {
    if let Target::Member(object, property) = target {
        visitor.visit_expr(object);
        if let MemberProp::Computed(expr) = property {
            visitor.visit_expr(expr);
        }
    }
}

pub fn walk_stmt_mut<V: VisitorMut + ?Sized>(visitor: &mut V, stmt: &mut Stmt) {
    match stmt {
        Stmt::Expr(expr) | Stmt::Throw(expr) => visitor.visit_expr(expr),
        Stmt::Var(decl) => walk_var_decl_mut(visitor, decl),
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        Stmt::If(test, consequent, alternate) => {
            visitor.visit_expr(test);
            visitor.visit_stmt(consequent);
            if let Some(alternate) = alternate {
                visitor.visit_stmt(alternate);
            }
        }
        Stmt::Block(stmts) => walk_stmts_mut(visitor, stmts),
        Stmt::For {
            init,
            test,
            update,
            body,
            ..
        } => {
            match init {
                Some(ForInit::Var(decl)) => walk_var_decl_mut(visitor, decl),
                Some(ForInit::Expr(expr)) => visitor.visit_expr(expr),
                None => {}
            }
            if let Some(test) = test {
                visitor.visit_expr(test);
            }
            if let Some(update) = update {
                visitor.visit_expr(update);
            }
            visitor.visit_stmt(body);
        }
        Stmt::ForIn { left, right, body } | Stmt::ForOf { left, right, body, .. } => {
            if let ForHead::Target(target) = left {
                walk_target_mut(visitor, target);
            }
            visitor.visit_expr(right);
            visitor.visit_stmt(body);
        }
        Stmt::While(test, body) => {
            visitor.visit_expr(test);
            visitor.visit_stmt(body);
        }
        Stmt::DoWhile(body, test) => {
            visitor.visit_stmt(body);
            visitor.visit_expr(test);
        }
        Stmt::Labeled(_, body) => visitor.visit_stmt(body),
        Stmt::Switch(discriminant, cases) => {
            visitor.visit_expr(discriminant);
            for case in cases {
                if let Some(test) = &mut case.test {
                    visitor.visit_expr(test);
                }
                walk_stmts_mut(visitor, &mut case.body);
            }
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            walk_stmts_mut(visitor, block);
            if let Some(handler) = handler {
                walk_stmts_mut(visitor, &mut handler.body);
            }
            if let Some(finalizer) = finalizer {
                walk_stmts_mut(visitor, finalizer);
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::FunctionDecl { .. } | Stmt::Opaque(_) | Stmt::Empty => {}
    }
}

pub fn walk_expr_mut<V: VisitorMut + ?Sized>(visitor: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Ident(_)
        | Expr::This
        | Expr::Number(_)
        | Expr::Str(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Undefined
        | Expr::Opaque(_) => {}
        Expr::Function(function) => visitor.visit_function(function),
        Expr::Unary(_, operand) | Expr::Await(operand) => visitor.visit_expr(operand),
        Expr::Binary(_, left, right) | Expr::Logical(_, left, right) => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::Conditional(test, consequent, alternate) => {
            visitor.visit_expr(test);
            visitor.visit_expr(consequent);
            visitor.visit_expr(alternate);
        }
        Expr::Assign(_, target, value) => {
            walk_target_mut(visitor, target);
            visitor.visit_expr(value);
        }
        Expr::Call(callee, args) | Expr::New(callee, args) => {
            visitor.visit_expr(callee);
            for arg in args {
                match arg {
                    Arg::Expr(expr) | Arg::Spread(expr) => visitor.visit_expr(expr),
                }
            }
        }
        Expr::Member(object, property) => {
            visitor.visit_expr(object);
            if let MemberProp::Computed(expr) = property {
                visitor.visit_expr(expr);
            }
        }
        Expr::Sequence(exprs) => {
            for expr in exprs {
                visitor.visit_expr(expr);
            }
        }
        Expr::Array(items) => {
            for item in items {
                match item {
                    ArrayItem::Expr(expr) | ArrayItem::Spread(expr) => visitor.visit_expr(expr),
                    ArrayItem::Hole => {}
                }
            }
        }
        Expr::Object(entries) => {
            for entry in entries {
                match entry {
                    ObjectEntry::Property { key, value } => {
                        if let PropertyKey::Computed(key) = key {
                            visitor.visit_expr(key);
                        }
                        visitor.visit_expr(value);
                    }
                    ObjectEntry::Spread(expr) => visitor.visit_expr(expr),
                    ObjectEntry::Opaque(_) => {}
                }
            }
        }
        Expr::Yield(argument) => {
            if let Some(argument) = argument {
                visitor.visit_expr(argument);
            }
        }
    }
}

/// Whether any node satisfies `predicate`, without entering synthesized functions
pub fn any_expr(stmts: &[Stmt], predicate: impl FnMut(&Expr) -> bool) -> bool {
    struct Finder<F> {
        predicate: F,
        found: bool,
    }

    impl<F: FnMut(&Expr) -> bool> Visitor for Finder<F> {
        fn enter_expr(&mut self, expr: &Expr) -> VisitControl {
            if (self.predicate)(expr) {
                self.found = true;
                VisitControl::Stop
            } else {
                VisitControl::Continue
            }
        }

        fn enter_function(&mut self, _function: &Function) -> VisitControl {
            VisitControl::Skip
        }
    }

    let mut finder = Finder {
        predicate,
        found: false,
    };
    let _ = walk_stmts(&mut finder, stmts);
    finder.found
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdentCounter {
        count: usize,
    }

    impl Visitor for IdentCounter {
        fn enter_expr(&mut self, expr: &Expr) -> VisitControl {
            if matches!(expr, Expr::Ident(_)) {
                self.count += 1;
            }
            VisitControl::Continue
        }

        fn enter_function(&mut self, _function: &Function) -> VisitControl {
            VisitControl::Skip
        }
    }

    #[test]
    fn test_skip_does_not_enter_functions() {
        let stmts = vec![
            Stmt::expr(Expr::call(Expr::ident("f"), vec![Expr::ident("a")])),
            Stmt::expr(Expr::function(Function::thunk(vec![Stmt::expr(Expr::ident("hidden"))]))),
        ];
        let mut counter = IdentCounter { count: 0 };
        let _ = walk_stmts(&mut counter, &stmts);
        assert_eq!(counter.count, 2);
    }

    struct Renamer;

    impl VisitorMut for Renamer {
        fn visit_expr(&mut self, expr: &mut Expr) {
            if let Expr::Ident(name) = expr {
                if name == "a" {
                    *name = "b".to_string();
                }
            }
            walk_expr_mut(self, expr);
        }
    }

    #[test]
    fn test_visitor_mut_reaches_nested_functions() {
        let mut stmts = vec![Stmt::ret(Some(Expr::function(Function::thunk(vec![Stmt::expr(
            Expr::ident("a"),
        )]))))];
        walk_stmts_mut(&mut Renamer, &mut stmts);
        assert!(any_expr(
            match &stmts[0] {
                Stmt::Return { value: Some(Expr::Function(function)), .. } => &function.body,
                other => panic!("unexpected {:?}", other),
            },
            |expr| expr == &Expr::ident("b")
        ));
    }

    #[test]
    fn test_any_expr_stops_early() {
        let stmts = vec![Stmt::Throw(Expr::Await(Box::new(Expr::ident("x"))))];
        assert!(any_expr(&stmts, |expr| matches!(expr, Expr::Await(_))));
        assert!(!any_expr(&stmts, |expr| matches!(expr, Expr::This)));
    }
}
