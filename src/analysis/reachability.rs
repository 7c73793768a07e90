//! Control-flow reachability over the owned tree
//!
//! Answers whether some path (`any`) or every path (`all`) through a statement
//! list ends in one of a requested set of exits. The query is pure: jump
//! targets are resolved against a scratch label stack owned by the query.
//! Synthesized functions and opaque nodes are never entered.

use std::collections::BTreeSet;
use std::ops::BitOr;

use crate::ir::{Expr, InfoTable, Stmt};

/// Set of exit kinds a query is interested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitKinds(u8);

impl ExitKinds {
    pub const NONE: ExitKinds = ExitKinds(0);
    pub const RETURN: ExitKinds = ExitKinds(1);
    pub const THROW: ExitKinds = ExitKinds(1 << 1);
    pub const BREAK: ExitKinds = ExitKinds(1 << 2);
    pub const CONTINUE: ExitKinds = ExitKinds(1 << 3);
    pub const ALL: ExitKinds = ExitKinds(0b1111);

    pub fn contains(self, other: ExitKinds) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ExitKinds {
    type Output = ExitKinds;

    fn bitor(self, rhs: ExitKinds) -> ExitKinds {
        ExitKinds(self.0 | rhs.0)
    }
}

/// Result of a reachability query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reach {
    /// Some path ends in a requested exit
    pub any: bool,
    /// Every path ends in a requested exit
    pub all: bool,
}

/// Ways a region can complete, with unresolved jump targets kept by label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Outcomes {
    normal: bool,
    returns: bool,
    throws: bool,
    breaks: BTreeSet<Option<String>>,
    continues: BTreeSet<Option<String>>,
}

impl Outcomes {
    fn normal() -> Self {
        Self {
            normal: true,
            ..Self::default()
        }
    }

    fn merge(&mut self, other: Outcomes) {
        self.normal |= other.normal;
        self.returns |= other.returns;
        self.throws |= other.throws;
        self.breaks.extend(other.breaks);
        self.continues.extend(other.continues);
    }

    /// Resolve jumps that target the construct owning `labels`
    fn resolve(&mut self, labels: &[String], unlabeled: bool, is_loop: bool) {
        let owns = |target: &Option<String>| match target {
            None => unlabeled,
            Some(label) => labels.contains(label),
        };
        let before = self.breaks.len();
        self.breaks.retain(|target| !owns(target));
        if self.breaks.len() != before {
            self.normal = true;
        }
        if is_loop {
            self.continues.retain(|target| !owns(target));
        }
    }

    fn reach(&self, targets: ExitKinds) -> Reach {
        let kinds = [
            (self.returns, ExitKinds::RETURN),
            (self.throws, ExitKinds::THROW),
            (!self.breaks.is_empty(), ExitKinds::BREAK),
            (!self.continues.is_empty(), ExitKinds::CONTINUE),
        ];
        let any = kinds.iter().any(|(present, kind)| *present && targets.contains(*kind));
        let all = !self.normal
            && kinds
                .iter()
                .all(|(present, kind)| !*present || targets.contains(*kind));
        Reach { any, all }
    }
}

struct Analyzer<'t> {
    infos: &'t InfoTable,
}

impl<'t> Analyzer<'t> {
    fn truthiness(&self, expr: &Expr) -> Option<bool> {
        match expr {
            Expr::Bool(value) => Some(*value),
            Expr::Number(value) => Some(*value != 0.0 && !value.is_nan()),
            Expr::Str(value) => Some(!value.is_empty()),
            Expr::Null | Expr::Undefined => Some(false),
            Expr::Function(_) => Some(true),
            Expr::Opaque(id) => self.infos.get(*id).and_then(|info| info.truthiness()),
            _ => None,
        }
    }

    fn block(&self, stmts: &[Stmt]) -> Outcomes {
        let mut result = Outcomes::normal();
        for stmt in stmts {
            if !result.normal {
                break;
            }
            result.normal = false;
            result.merge(self.stmt(stmt, &[]));
        }
        result
    }

    fn stmt(&self, stmt: &Stmt, labels: &[String]) -> Outcomes {
        match stmt {
            Stmt::Return { .. } => Outcomes {
                returns: true,
                ..Outcomes::default()
            },
            Stmt::Throw(_) => Outcomes {
                throws: true,
                ..Outcomes::default()
            },
            Stmt::Break(label) => Outcomes {
                breaks: BTreeSet::from([label.clone()]),
                ..Outcomes::default()
            },
            Stmt::Continue(label) => Outcomes {
                continues: BTreeSet::from([label.clone()]),
                ..Outcomes::default()
            },
            Stmt::Block(stmts) => {
                let mut result = self.block(stmts);
                result.resolve(labels, false, false);
                result
            }
            Stmt::If(test, consequent, alternate) => {
                let mut result = match self.truthiness(test) {
                    Some(true) => self.stmt(consequent, &[]),
                    Some(false) => alternate
                        .as_ref()
                        .map(|alternate| self.stmt(alternate, &[]))
                        .unwrap_or_else(Outcomes::normal),
                    None => {
                        let mut result = self.stmt(consequent, &[]);
                        match alternate {
                            Some(alternate) => result.merge(self.stmt(alternate, &[])),
                            None => result.normal = true,
                        }
                        result
                    }
                };
                result.resolve(labels, false, false);
                result
            }
            Stmt::Labeled(label, body) => {
                let mut nested = labels.to_vec();
                nested.push(label.clone());
                let mut result = self.stmt(body, &nested);
                result.resolve(&nested, false, false);
                result
            }
            Stmt::For { test, body, .. } => {
                let infinite = match test {
                    None => true,
                    Some(test) => self.truthiness(test) == Some(true),
                };
                self.pre_test_loop(body, infinite, labels)
            }
            Stmt::While(test, body) => {
                let infinite = self.truthiness(test) == Some(true);
                self.pre_test_loop(body, infinite, labels)
            }
            Stmt::ForIn { body, .. } | Stmt::ForOf { body, .. } => {
                self.pre_test_loop(body, false, labels)
            }
            Stmt::DoWhile(body, test) => {
                let mut result = self.stmt(body, &[]);
                let repeats = result.normal || self.continues_here(&result, labels);
                let broke = self.breaks_here(&result, labels);
                result.resolve(labels, true, true);
                if self.truthiness(test) == Some(true) {
                    // only a resolved break can leave the loop normally
                    result.normal = broke;
                } else if repeats {
                    result.normal = true;
                }
                result
            }
            Stmt::Switch(_, cases) => {
                let mut after = Outcomes::normal();
                let mut result = Outcomes::default();
                let mut has_default = false;
                for case in cases.iter().rev() {
                    has_default |= case.test.is_none();
                    let mut entry = self.block(&case.body);
                    if entry.normal {
                        entry.normal = false;
                        entry.merge(after.clone());
                    }
                    result.merge(entry.clone());
                    after = entry;
                }
                if !has_default {
                    result.normal = true;
                }
                result.resolve(labels, true, false);
                result
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.block(block);
                if let Some(handler) = handler {
                    result.throws = false;
                    result.merge(self.block(&handler.body));
                }
                if let Some(finalizer) = finalizer {
                    let finally = self.block(finalizer);
                    if !finally.normal {
                        return finally;
                    }
                    let mut abrupt = finally;
                    abrupt.normal = false;
                    result.merge(abrupt);
                }
                result.resolve(labels, false, false);
                result
            }
            Stmt::Expr(_)
            | Stmt::Var(_)
            | Stmt::FunctionDecl { .. }
            | Stmt::Opaque(_)
            | Stmt::Empty => Outcomes::normal(),
        }
    }

    fn pre_test_loop(&self, body: &Stmt, infinite: bool, labels: &[String]) -> Outcomes {
        let body = self.stmt(body, &[]);
        let broke = self.breaks_here(&body, labels);
        let mut result = body;
        result.resolve(labels, true, true);
        result.normal = if infinite { broke } else { true };
        result
    }

    fn breaks_here(&self, outcomes: &Outcomes, labels: &[String]) -> bool {
        outcomes.breaks.iter().any(|target| match target {
            None => true,
            Some(label) => labels.contains(label),
        })
    }

    fn continues_here(&self, outcomes: &Outcomes, labels: &[String]) -> bool {
        outcomes.continues.iter().any(|target| match target {
            None => true,
            Some(label) => labels.contains(label),
        })
    }
}

/// Whether paths through `stmts` reach any exit in `targets`
pub fn paths_reach(stmts: &[Stmt], targets: ExitKinds, infos: &InfoTable) -> Reach {
    Analyzer { infos }.block(stmts).reach(targets)
}

/// Every path through `stmts` ends in a return or a throw
pub fn always_exits(stmts: &[Stmt], infos: &InfoTable) -> bool {
    paths_reach(stmts, ExitKinds::RETURN | ExitKinds::THROW, infos).all
}

/// Some path through `stmts` completes normally
pub fn may_fall_through(stmts: &[Stmt], infos: &InfoTable) -> bool {
    Analyzer { infos }.block(stmts).normal
}

/// Same as [`may_fall_through`] for a single statement
pub fn stmt_may_fall_through(stmt: &Stmt, infos: &InfoTable) -> bool {
    Analyzer { infos }.stmt(stmt, &[]).normal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SwitchCase;

    fn ret() -> Stmt {
        Stmt::ret(Some(Expr::Number(1.0)))
    }

    fn call(name: &str) -> Stmt {
        Stmt::expr(Expr::call(Expr::ident(name), vec![]))
    }

    #[test]
    fn test_if_with_both_branches_returning() {
        let infos = InfoTable::new();
        let stmts = vec![Stmt::If(
            Expr::ident("c"),
            Box::new(ret()),
            Some(Box::new(Stmt::Throw(Expr::ident("e")))),
        )];
        let reach = paths_reach(&stmts, ExitKinds::RETURN | ExitKinds::THROW, &infos);
        assert_eq!(reach, Reach { any: true, all: true });
        assert_eq!(paths_reach(&stmts, ExitKinds::RETURN, &infos), Reach { any: true, all: false });
    }

    #[test]
    fn test_if_with_one_branch_returning() {
        let infos = InfoTable::new();
        let stmts = vec![Stmt::If(Expr::ident("c"), Box::new(ret()), None), call("f")];
        let reach = paths_reach(&stmts, ExitKinds::RETURN, &infos);
        assert!(reach.any);
        assert!(!reach.all);
    }

    #[test]
    fn test_query_is_idempotent() {
        let infos = InfoTable::new();
        let stmts = vec![Stmt::While(
            Expr::ident("c"),
            Box::new(Stmt::Block(vec![Stmt::If(
                Expr::ident("d"),
                Box::new(Stmt::Break(None)),
                None,
            )])),
        )];
        let first = paths_reach(&stmts, ExitKinds::ALL, &infos);
        let second = paths_reach(&stmts, ExitKinds::ALL, &infos);
        assert_eq!(first, second);
    }

    #[test]
    fn test_break_inside_loop_is_resolved() {
        let infos = InfoTable::new();
        let stmts = vec![Stmt::While(Expr::Bool(true), Box::new(Stmt::Break(None)))];
        let reach = paths_reach(&stmts, ExitKinds::BREAK, &infos);
        assert!(!reach.any);
        assert!(may_fall_through(&stmts, &infos));
    }

    #[test]
    fn test_infinite_loop_without_break_never_completes() {
        let infos = InfoTable::new();
        let stmts = vec![Stmt::For {
            init: None,
            test: None,
            update: None,
            body: Box::new(Stmt::If(Expr::ident("c"), Box::new(ret()), None)),
            indexed: None,
        }];
        assert!(!may_fall_through(&stmts, &infos));
        assert!(always_exits(&stmts, &infos));
    }

    #[test]
    fn test_labeled_break_resolves_at_label() {
        let infos = InfoTable::new();
        let inner = Stmt::While(
            Expr::ident("c"),
            Box::new(Stmt::Break(Some("outer".to_string()))),
        );
        let stmts = vec![Stmt::Labeled(
            "outer".to_string(),
            Box::new(Stmt::While(Expr::Bool(true), Box::new(inner))),
        )];
        let reach = paths_reach(&stmts, ExitKinds::BREAK, &infos);
        assert!(!reach.any);
        assert!(may_fall_through(&stmts, &infos));
    }

    #[test]
    fn test_switch_without_default_falls_through() {
        let infos = InfoTable::new();
        let cases = vec![SwitchCase {
            test: Some(Expr::Number(1.0)),
            body: vec![ret()],
        }];
        let stmts = vec![Stmt::Switch(Expr::ident("x"), cases.clone())];
        assert!(!always_exits(&stmts, &infos));

        let mut exhaustive = cases;
        exhaustive.push(SwitchCase {
            test: None,
            body: vec![Stmt::Throw(Expr::ident("e"))],
        });
        let stmts = vec![Stmt::Switch(Expr::ident("x"), exhaustive)];
        assert!(always_exits(&stmts, &infos));
    }

    #[test]
    fn test_switch_case_falls_into_returning_case() {
        let infos = InfoTable::new();
        let cases = vec![
            SwitchCase {
                test: Some(Expr::Number(1.0)),
                body: vec![call("f")],
            },
            SwitchCase {
                test: None,
                body: vec![ret()],
            },
        ];
        let stmts = vec![Stmt::Switch(Expr::ident("x"), cases)];
        assert!(always_exits(&stmts, &infos));
    }

    #[test]
    fn test_finally_that_always_exits_wins() {
        let infos = InfoTable::new();
        let stmts = vec![Stmt::Try {
            block: vec![call("f")],
            handler: None,
            finalizer: Some(vec![ret()]),
        }];
        assert!(always_exits(&stmts, &infos));
    }

    #[test]
    fn test_try_requires_block_and_handler() {
        let infos = InfoTable::new();
        let stmts = vec![Stmt::Try {
            block: vec![ret()],
            handler: Some(crate::ir::CatchClause {
                param: None,
                body: vec![call("log")],
            }),
            finalizer: None,
        }];
        assert!(!always_exits(&stmts, &infos));
    }

    #[test]
    fn test_do_while_body_runs_once() {
        let infos = InfoTable::new();
        let stmts = vec![Stmt::DoWhile(Box::new(ret()), Expr::ident("c"))];
        assert!(always_exits(&stmts, &infos));
    }
}
