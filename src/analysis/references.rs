//! Name and suspension-point queries over the owned tree

use std::collections::HashSet;

use crate::ir::visit::{any_expr, walk_expr, walk_function, walk_stmt, walk_stmts, VisitControl, Visitor};
use crate::ir::{Binding, Expr, ForHead, Function, InfoTable, Stmt, Target, VarKind};

/// Whether `expr` is a suspension point
fn is_suspension(expr: &Expr) -> bool {
    matches!(expr, Expr::Await(_) | Expr::Yield(_))
}

struct SuspensionFinder {
    found: bool,
}

impl Visitor for SuspensionFinder {
    fn enter_stmt(&mut self, stmt: &Stmt) -> VisitControl {
        if matches!(stmt, Stmt::ForOf { is_await: true, .. }) {
            self.found = true;
            return VisitControl::Stop;
        }
        VisitControl::Continue
    }

    fn enter_expr(&mut self, expr: &Expr) -> VisitControl {
        if is_suspension(expr) {
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

pub fn stmt_suspends(stmt: &Stmt) -> bool {
    let mut finder = SuspensionFinder { found: false };
    let _ = walk_stmt(&mut finder, stmt);
    finder.found
}

pub fn stmts_suspend(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_suspends)
}

pub fn expr_suspends(expr: &Expr) -> bool {
    let mut finder = SuspensionFinder { found: false };
    let _ = walk_expr(&mut finder, expr);
    finder.found
}

/// Number of suspension points, `for await` loops included
pub fn count_suspensions(stmts: &[Stmt]) -> usize {
    struct Counter(usize);

    impl Visitor for Counter {
        fn enter_stmt(&mut self, stmt: &Stmt) -> VisitControl {
            if matches!(stmt, Stmt::ForOf { is_await: true, .. }) {
                self.0 += 1;
            }
            VisitControl::Continue
        }

        fn enter_expr(&mut self, expr: &Expr) -> VisitControl {
            if is_suspension(expr) {
                self.0 += 1;
            }
            VisitControl::Continue
        }

        fn enter_function(&mut self, _function: &Function) -> VisitControl {
            VisitControl::Skip
        }
    }

    let mut counter = Counter(0);
    let _ = walk_stmts(&mut counter, stmts);
    counter.0
}

/// Collects identifier usage, looking through opaque nodes via their info
struct NameCollector<'t> {
    infos: &'t InfoTable,
    references: HashSet<String>,
    assigned: HashSet<String>,
    captured: HashSet<String>,
    enter_functions: bool,
}

impl<'t> NameCollector<'t> {
    fn new(infos: &'t InfoTable, enter_functions: bool) -> Self {
        Self {
            infos,
            references: HashSet::new(),
            assigned: HashSet::new(),
            captured: HashSet::new(),
            enter_functions,
        }
    }

    fn opaque(&mut self, id: crate::ir::OpaqueId, assigned: bool) {
        if let Some(info) = self.infos.get(id) {
            self.references.extend(info.references.iter().cloned());
            self.assigned.extend(info.assigned.iter().cloned());
            self.captured.extend(info.captured.iter().cloned());
            if assigned {
                self.assigned.extend(info.references.iter().cloned());
            }
        }
    }
}

impl Visitor for NameCollector<'_> {
    fn enter_stmt(&mut self, stmt: &Stmt) -> VisitControl {
        match stmt {
            Stmt::Opaque(id) => self.opaque(*id, false),
            Stmt::FunctionDecl { name, id } => {
                self.references.insert(name.clone());
                self.opaque(*id, false);
            }
            _ => {}
        }
        VisitControl::Continue
    }

    fn enter_expr(&mut self, expr: &Expr) -> VisitControl {
        match expr {
            Expr::Ident(name) => {
                self.references.insert(name.clone());
            }
            Expr::Opaque(id) => self.opaque(*id, false),
            Expr::Object(entries) => {
                for entry in entries {
                    match entry {
                        crate::ir::ObjectEntry::Opaque(id)
                        | crate::ir::ObjectEntry::Property {
                            key: crate::ir::PropertyKey::Opaque(id),
                            ..
                        } => self.opaque(*id, false),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        VisitControl::Continue
    }

    fn enter_target(&mut self, target: &Target) -> VisitControl {
        match target {
            Target::Ident(name) => {
                self.references.insert(name.clone());
                self.assigned.insert(name.clone());
            }
            Target::Opaque(id) => self.opaque(*id, true),
            Target::Member(..) => {}
        }
        VisitControl::Continue
    }

    fn enter_binding(&mut self, binding: &Binding) {
        match binding {
            Binding::Ident(name) => {
                self.references.insert(name.clone());
            }
            Binding::Pattern { id, names } => {
                self.references.extend(names.iter().cloned());
                self.opaque(*id, false);
            }
        }
    }

    fn enter_function(&mut self, function: &Function) -> VisitControl {
        if self.enter_functions {
            self.references.extend(function.params.iter().cloned());
            VisitControl::Continue
        } else {
            VisitControl::Skip
        }
    }
}

/// Every identifier read, written or bound in `stmts`, synthesized functions included
pub fn references(stmts: &[Stmt], infos: &InfoTable) -> HashSet<String> {
    let mut collector = NameCollector::new(infos, true);
    let _ = walk_stmts(&mut collector, stmts);
    collector.references
}

/// Identifiers referenced by a synthesized function, its own parameters excluded
pub fn function_free_names(function: &Function, infos: &InfoTable) -> HashSet<String> {
    let mut collector = NameCollector::new(infos, true);
    let _ = walk_function(&mut collector, function);
    let mut names = collector.references;
    for param in &function.params {
        names.remove(param);
    }
    names
}

/// Identifiers written by assignments or updates anywhere in `stmts`
pub fn assigned_names(stmts: &[Stmt], infos: &InfoTable) -> HashSet<String> {
    let mut collector = NameCollector::new(infos, true);
    let _ = walk_stmts(&mut collector, stmts);
    collector.assigned
}

pub fn stmt_assigned_names(stmt: &Stmt, infos: &InfoTable) -> HashSet<String> {
    let mut collector = NameCollector::new(infos, true);
    let _ = walk_stmt(&mut collector, stmt);
    collector.assigned
}

/// Identifiers that source closures inside `stmt` refer to
pub fn stmt_captured_names(stmt: &Stmt, infos: &InfoTable) -> HashSet<String> {
    let mut collector = NameCollector::new(infos, true);
    let _ = walk_stmt(&mut collector, stmt);
    collector.captured
}

/// Names a statement declares with `let`, `const` or a function declaration
/// at its own block level
pub fn lexical_names(stmt: &Stmt) -> Vec<String> {
    match stmt {
        Stmt::Var(decl) if decl.kind != VarKind::Var => decl
            .declarators
            .iter()
            .flat_map(|declarator| declarator.binding.names())
            .collect(),
        _ => Vec::new(),
    }
}

/// Names declared with `var` anywhere in `stmts`, excluding synthesized functions
pub fn var_names(stmts: &[Stmt]) -> Vec<String> {
    struct VarCollector(Vec<String>);

    impl VarCollector {
        fn add(&mut self, binding: &Binding) {
            for name in binding.names() {
                if !self.0.contains(&name) {
                    self.0.push(name);
                }
            }
        }
    }

    impl Visitor for VarCollector {
        fn enter_stmt(&mut self, stmt: &Stmt) -> VisitControl {
            match stmt {
                Stmt::Var(decl) if decl.kind == VarKind::Var => {
                    for declarator in &decl.declarators {
                        self.add(&declarator.binding);
                    }
                }
                Stmt::For {
                    init: Some(crate::ir::ForInit::Var(decl)),
                    ..
                } if decl.kind == VarKind::Var => {
                    for declarator in &decl.declarators {
                        self.add(&declarator.binding);
                    }
                }
                Stmt::ForIn { left: ForHead::Var(VarKind::Var, binding), .. }
                | Stmt::ForOf { left: ForHead::Var(VarKind::Var, binding), .. } => self.add(binding),
                _ => {}
            }
            VisitControl::Continue
        }

        fn enter_expr(&mut self, _expr: &Expr) -> VisitControl {
            VisitControl::Skip
        }

        fn enter_function(&mut self, _function: &Function) -> VisitControl {
            VisitControl::Skip
        }
    }

    let mut collector = VarCollector(Vec::new());
    let _ = walk_stmts(&mut collector, stmts);
    collector.0
}

/// Whether a `break label` targeting `label` occurs in `stmts`
pub fn breaks_to_label(stmts: &[Stmt], label: &str) -> bool {
    struct LabelFinder<'l> {
        label: &'l str,
        found: bool,
    }

    impl Visitor for LabelFinder<'_> {
        fn enter_stmt(&mut self, stmt: &Stmt) -> VisitControl {
            match stmt {
                Stmt::Break(Some(label)) | Stmt::Continue(Some(label)) if label == self.label => {
                    self.found = true;
                    VisitControl::Stop
                }
                _ => VisitControl::Continue,
            }
        }

        fn enter_expr(&mut self, _expr: &Expr) -> VisitControl {
            VisitControl::Skip
        }
    }

    let mut finder = LabelFinder { label, found: false };
    let _ = walk_stmts(&mut finder, stmts);
    finder.found
}

/// Whether `this` appears outside synthesized functions
pub fn uses_this(stmts: &[Stmt]) -> bool {
    any_expr(stmts, |expr| matches!(expr, Expr::This))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AssignmentOperator, OpaqueInfo, OpaqueKind};

    #[test]
    fn test_suspension_detection_skips_functions() {
        let nested = Stmt::expr(Expr::function(Function::thunk(vec![Stmt::expr(Expr::Await(
            Box::new(Expr::ident("x")),
        ))])));
        assert!(!stmt_suspends(&nested));
        let direct = Stmt::ret(Some(Expr::Await(Box::new(Expr::ident("x")))));
        assert!(stmt_suspends(&direct));
        assert_eq!(count_suspensions(&[nested, direct]), 1);
    }

    #[test]
    fn test_assigned_names_include_opaque_info() {
        let mut infos = InfoTable::new();
        let mut info = OpaqueInfo::new(OpaqueKind::Other);
        info.references.insert("i".to_string());
        info.assigned.insert("i".to_string());
        let id = infos.push(info);
        let stmts = vec![
            Stmt::expr(Expr::Opaque(id)),
            Stmt::expr(Expr::Assign(
                AssignmentOperator::Assign,
                Box::new(Target::Ident("x".to_string())),
                Box::new(Expr::Number(1.0)),
            )),
        ];
        let assigned = assigned_names(&stmts, &infos);
        assert!(assigned.contains("i"));
        assert!(assigned.contains("x"));
        assert!(references(&stmts, &infos).contains("i"));
    }

    #[test]
    fn test_var_names_are_collected_in_order() {
        let stmts = vec![
            Stmt::var("a", None),
            Stmt::Block(vec![Stmt::var("b", None), Stmt::var("a", None)]),
        ];
        assert_eq!(var_names(&stmts), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_breaks_to_label() {
        let stmts = vec![Stmt::If(
            Expr::ident("c"),
            Box::new(Stmt::Break(Some("done".to_string()))),
            None,
        )];
        assert!(breaks_to_label(&stmts, "done"));
        assert!(!breaks_to_label(&stmts, "other"));
    }
}
