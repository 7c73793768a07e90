//! Declaration hygiene around the rewrite
//!
//! `var` declarations are hoisted before the body is split so that every
//! continuation sees the same binding, and with the `hoist` option the
//! synthesized functions that capture nothing local are lifted out to the
//! top level.

use std::collections::HashSet;

use log::debug;

use crate::analysis::references::{function_free_names, var_names};
use crate::ir::visit::{walk_expr_mut, walk_stmt_mut, VisitorMut};
use crate::ir::{
    Binding, Expr, ForHead, ForInit, Function, InfoTable, NameGenerator, Stmt, SwitchCase, Target, VarDecl,
    VarKind,
};

/// Hoist every `var` of an async body into one declaration at its top.
/// Parameters are never redeclared and destructuring patterns stay where
/// they are.
pub(crate) fn hoist_vars(mut body: Vec<Stmt>, params: &[String]) -> Vec<Stmt> {
    let declared = var_names(&body);
    if declared.is_empty() {
        return body;
    }
    // a `var` naming a parameter still becomes an assignment to it
    let names: Vec<String> = declared.into_iter().filter(|name| !params.contains(name)).collect();
    debug!("hoisting vars {:?}", names);

    hoist_in_list(&mut body);
    let mut out: Vec<Stmt> = Stmt::declare(names).into_iter().collect();
    out.extend(body);
    out
}

fn hoist_in_list(stmts: &mut Vec<Stmt>) {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in std::mem::take(stmts) {
        match stmt {
            Stmt::Var(decl) if decl.kind == VarKind::Var => out.extend(var_to_assignments(decl)),
            mut stmt => {
                hoist_in_stmt(&mut stmt);
                out.push(stmt);
            }
        }
    }
    *stmts = out;
}

/// Hoisting inside a single statement position such as an `if` branch
fn hoist_in_body(stmt: &mut Stmt) {
    if !matches!(stmt, Stmt::Var(decl) if decl.kind == VarKind::Var) {
        hoist_in_stmt(stmt);
        return;
    }
    if let Stmt::Var(decl) = std::mem::replace(stmt, Stmt::Empty) {
        let mut stmts = var_to_assignments(decl);
        *stmt = match stmts.len() {
            0 => Stmt::Empty,
            1 => stmts.remove(0),
            _ => Stmt::Block(stmts),
        };
    }
}

fn hoist_in_stmt(stmt: &mut Stmt) {
    match stmt {
        Stmt::If(_, consequent, alternate) => {
            hoist_in_body(consequent);
            if let Some(alternate) = alternate {
                hoist_in_body(alternate);
            }
        }
        Stmt::Block(stmts) => hoist_in_list(stmts),
        Stmt::For { init, body, .. } => {
            if let Some(ForInit::Var(decl)) = init {
                if decl.kind == VarKind::Var && all_identifiers(decl) {
                    let assignments: Vec<Expr> = std::mem::take(&mut decl.declarators)
                        .into_iter()
                        .filter_map(|declarator| match (declarator.binding, declarator.init) {
                            (Binding::Ident(name), Some(init)) => Some(Expr::assign(name, init)),
                            _ => None,
                        })
                        .collect();
                    *init = match assignments.len() {
                        0 => None,
                        1 => assignments.into_iter().next().map(ForInit::Expr),
                        _ => Some(ForInit::Expr(Expr::Sequence(assignments))),
                    };
                }
            }
            hoist_in_body(body);
        }
        Stmt::ForIn { left, body, .. } | Stmt::ForOf { left, body, .. } => {
            if let ForHead::Var(VarKind::Var, Binding::Ident(name)) = left {
                *left = ForHead::Target(Target::Ident(std::mem::take(name)));
            }
            hoist_in_body(body);
        }
        Stmt::While(_, body) | Stmt::DoWhile(body, _) | Stmt::Labeled(_, body) => hoist_in_body(body),
        Stmt::Switch(_, cases) => {
            for SwitchCase { body, .. } in cases {
                hoist_in_list(body);
            }
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            hoist_in_list(block);
            if let Some(handler) = handler {
                hoist_in_list(&mut handler.body);
            }
            if let Some(finalizer) = finalizer {
                hoist_in_list(finalizer);
            }
        }
        _ => {}
    }
}

fn all_identifiers(decl: &VarDecl) -> bool {
    decl.declarators
        .iter()
        .all(|declarator| matches!(declarator.binding, Binding::Ident(_)))
}

/// `var a = 1, {b} = c, d;` becomes `a = 1; var {b} = c;`
fn var_to_assignments(decl: VarDecl) -> Vec<Stmt> {
    decl.declarators
        .into_iter()
        .filter_map(|declarator| match declarator.binding {
            Binding::Ident(name) => declarator.init.map(|init| Stmt::expr(Expr::assign(name, init))),
            pattern => Some(Stmt::Var(VarDecl::single(VarKind::Var, pattern, declarator.init))),
        })
        .collect()
}

/// A synthesized function moved to a top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub struct HoistedFunction {
    pub name: String,
    pub function: Function,
}

struct Hoister<'h> {
    names: &'h mut NameGenerator,
    infos: &'h InfoTable,
    /// Bindings of the async function and every function around it
    enclosing: &'h HashSet<String>,
    /// Generated names that live at the top level (helpers, earlier hoists)
    shared: HashSet<String>,
    hoisted: Vec<HoistedFunction>,
}

impl Hoister<'_> {
    fn captures_nothing(&self, function: &Function) -> bool {
        if crate::analysis::references::uses_this(&function.body) {
            return false;
        }
        function_free_names(function, self.infos).iter().all(|name| {
            name != "this"
                && name != "arguments"
                && !self.enclosing.contains(name)
                && (!self.names.is_generated(name) || self.shared.contains(name))
        })
    }
}

impl VisitorMut for Hoister<'_> {
    fn visit_expr(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
        let Expr::Function(function) = expr else {
            return;
        };
        if !self.captures_nothing(function) {
            return;
        }
        let name = self.names.fresh("temp");
        debug!("hoisting continuation as {}", name);
        let function = std::mem::take(function.as_mut());
        self.shared.insert(name.clone());
        self.hoisted.push(HoistedFunction {
            name: name.clone(),
            function,
        });
        *expr = Expr::Ident(name);
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }
}

/// Move the synthesized functions of `body` that capture nothing from
/// `enclosing` (and no generated local) out to top-level declarations.
/// Inner functions are considered first, so a continuation that only
/// referred to an already hoisted one can move too.
pub fn hoist_functions(
    body: &mut [Stmt],
    names: &mut NameGenerator,
    infos: &InfoTable,
    enclosing: &HashSet<String>,
    shared: impl IntoIterator<Item = String>,
) -> Vec<HoistedFunction> {
    let mut hoister = Hoister {
        names,
        infos,
        enclosing,
        shared: shared.into_iter().collect(),
        hoisted: Vec::new(),
    };
    for stmt in body.iter_mut() {
        hoister.visit_stmt(stmt);
    }
    hoister.hoisted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Declarator;

    fn var(declarators: Vec<(&str, Option<Expr>)>) -> Stmt {
        Stmt::Var(VarDecl {
            kind: VarKind::Var,
            declarators: declarators
                .into_iter()
                .map(|(name, init)| Declarator {
                    binding: Binding::Ident(name.to_string()),
                    init,
                })
                .collect(),
        })
    }

    #[test]
    fn test_vars_become_assignments() {
        let body = vec![
            var(vec![("a", Some(Expr::Number(1.0))), ("b", None)]),
            Stmt::If(
                Expr::ident("a"),
                Box::new(var(vec![("c", Some(Expr::ident("a")))])),
                None,
            ),
        ];
        let hoisted = hoist_vars(body, &[]);
        assert_eq!(
            hoisted,
            vec![
                Stmt::declare(vec!["a".to_string(), "b".to_string(), "c".to_string()]).unwrap(),
                Stmt::expr(Expr::assign("a", Expr::Number(1.0))),
                Stmt::If(
                    Expr::ident("a"),
                    Box::new(Stmt::expr(Expr::assign("c", Expr::ident("a")))),
                    None
                ),
            ]
        );
    }

    #[test]
    fn test_parameters_are_not_redeclared() {
        let body = vec![var(vec![("value", Some(Expr::Null))])];
        let hoisted = hoist_vars(body, &["value".to_string()]);
        assert_eq!(hoisted, vec![Stmt::expr(Expr::assign("value", Expr::Null))]);
    }

    #[test]
    fn test_for_of_head_becomes_target() {
        let body = vec![Stmt::ForOf {
            left: ForHead::Var(VarKind::Var, Binding::Ident("item".to_string())),
            right: Expr::ident("items"),
            body: Box::new(Stmt::Empty),
            is_await: false,
        }];
        let hoisted = hoist_vars(body, &[]);
        assert!(matches!(
            &hoisted[1],
            Stmt::ForOf {
                left: ForHead::Target(Target::Ident(name)),
                ..
            } if name == "item"
        ));
    }

    #[test]
    fn test_only_capture_free_functions_are_hoisted() {
        let mut names = NameGenerator::with_reserved(["x", "log"]);
        let infos = InfoTable::new();
        let enclosing: HashSet<String> = ["x".to_string()].into_iter().collect();
        let free = Expr::function(Function::new(
            vec!["value".to_string()],
            vec![Stmt::expr(Expr::call(Expr::ident("log"), vec![Expr::ident("value")]))],
        ));
        let capturing = Expr::function(Function::thunk(vec![Stmt::ret(Some(Expr::ident("x")))]));
        let mut body = vec![Stmt::expr(free), Stmt::expr(capturing.clone())];

        let hoisted = hoist_functions(&mut body, &mut names, &infos, &enclosing, Vec::new());
        assert_eq!(hoisted.len(), 1);
        assert_eq!(hoisted[0].name, "_temp");
        assert_eq!(body[0], Stmt::expr(Expr::ident("_temp")));
        assert_eq!(body[1], Stmt::expr(capturing));
    }
}
