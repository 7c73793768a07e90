use super::jumps::{JumpScope, Owner};
use super::{local_return, Resume, Rewriter};
use crate::analysis::reachability::may_fall_through;
use crate::error::Result;
use crate::ir::{ArrayItem, Expr, Function, Stmt, SwitchCase};

/// A case after rewriting, before its fall-through test is known
struct LoweredCase {
    test: Expr,
    body: Expr,
    falls_through: bool,
}

impl Rewriter<'_> {
    /// `_switch(discriminant, [[test, body, fallthrough], ...])`
    pub(crate) fn rewrite_switch(
        &mut self,
        discriminant: Expr,
        cases: Vec<SwitchCase>,
        labels: Vec<String>,
        tail: Vec<Stmt>,
    ) -> Result<Vec<Stmt>> {
        let mut scope = JumpScope::new(Owner::Switch(labels.clone()), true);
        let mut lowered = Vec::with_capacity(cases.len());

        for case in cases {
            let test = match case.test {
                Some(test) => {
                    let thunk = self.rewrite_block(vec![local_return(Some(test))])?;
                    Expr::function(Function::thunk(thunk))
                }
                None => Expr::Undefined,
            };
            let (body, breaks) = strip_trailing_break(case.body, &labels);
            let falls_through = !breaks && may_fall_through(&body, self.infos);
            let body = self.rewrite_jumps(body, &mut scope)?;
            let body = self.rewrite_block(body)?;
            let body = if body.is_empty() {
                Expr::Undefined
            } else {
                Expr::function(Function::thunk(body))
            };
            lowered.push(LoweredCase {
                test,
                body,
                falls_through,
            });
        }

        let escaping = scope.escaping();
        let mut stops: Vec<Expr> = scope.break_flag().map(Expr::ident).into_iter().collect();
        stops.extend(escaping.iter().cloned().map(Expr::Ident));
        let stop = Expr::any_of(stops);

        let cases: Vec<ArrayItem> = lowered
            .into_iter()
            .map(|case| {
                let mut entry = vec![ArrayItem::Expr(case.test), ArrayItem::Expr(case.body)];
                if case.falls_through {
                    let fallthrough = match &stop {
                        Some(stop) => Expr::function(Function::thunk(vec![local_return(Some(Expr::not(
                            stop.clone(),
                        )))])),
                        None => self.flag_value(),
                    };
                    entry.push(ArrayItem::Expr(fallthrough));
                } else {
                    trim_undefined(&mut entry);
                }
                ArrayItem::Expr(Expr::Array(entry))
            })
            .collect();

        let call = self.call_helper("_switch", vec![discriminant, Expr::Array(cases)])?;
        let prelude: Vec<Stmt> = scope.declarations().into_iter().collect();
        self.resume_after(prelude, Resume::Value(call), escaping, tail)
    }
}

/// Drop a final `break` that targets the `switch` itself
fn strip_trailing_break(mut body: Vec<Stmt>, labels: &[String]) -> (Vec<Stmt>, bool) {
    let ends_with_break = match body.last() {
        Some(Stmt::Break(None)) => true,
        Some(Stmt::Break(Some(label))) => labels.contains(label),
        _ => false,
    };
    if ends_with_break {
        body.pop();
    }
    (body, ends_with_break)
}

/// `[void 0, void 0]` entries shrink to `[]`
fn trim_undefined(entry: &mut Vec<ArrayItem>) {
    while matches!(entry.last(), Some(ArrayItem::Expr(Expr::Undefined))) {
        entry.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::HelperTable;
    use crate::ir::{Arg, InfoTable, NameGenerator};
    use crate::options::TransformOptions;

    fn rewrite(body: Vec<Stmt>) -> Vec<Stmt> {
        let mut names = NameGenerator::with_reserved(["x", "work"]);
        let mut helpers = HelperTable::new();
        HelperTable::reserve_names(&mut names);
        let infos = InfoTable::new();
        let options = TransformOptions::default();
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options);
        rewriter.rewrite_function(&[], body).unwrap()
    }

    fn await_work() -> Stmt {
        Stmt::expr(Expr::Await(Box::new(Expr::call(Expr::ident("work"), Vec::new()))))
    }

    fn case_entries(stmt: &Stmt) -> Vec<Vec<ArrayItem>> {
        let Stmt::Return {
            value: Some(Expr::Call(_, args)),
            ..
        } = stmt
        else {
            panic!("unexpected {:?}", stmt);
        };
        let Arg::Expr(Expr::Array(cases)) = &args[1] else {
            panic!("unexpected {:?}", args);
        };
        cases
            .iter()
            .map(|case| match case {
                ArrayItem::Expr(Expr::Array(entry)) => entry.clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_trailing_break_ends_case() {
        let body = rewrite(vec![Stmt::Switch(
            Expr::ident("x"),
            vec![
                SwitchCase {
                    test: Some(Expr::Number(1.0)),
                    body: vec![await_work(), Stmt::Break(None)],
                },
                SwitchCase {
                    test: None,
                    body: vec![Stmt::expr(Expr::call(Expr::ident("work"), Vec::new()))],
                },
            ],
        )]);
        let entries = case_entries(&body[0]);
        assert_eq!(entries[0].len(), 2);
        // The default case falls off the end of the switch
        assert_eq!(entries[1].len(), 3);
        assert_eq!(entries[1][0], ArrayItem::Expr(Expr::Undefined));
    }

    #[test]
    fn test_empty_case_falls_through() {
        let body = rewrite(vec![Stmt::Switch(
            Expr::ident("x"),
            vec![
                SwitchCase {
                    test: Some(Expr::Number(1.0)),
                    body: Vec::new(),
                },
                SwitchCase {
                    test: Some(Expr::Number(2.0)),
                    body: vec![await_work(), Stmt::Break(None)],
                },
            ],
        )]);
        let entries = case_entries(&body[0]);
        assert_eq!(
            entries[0],
            vec![
                ArrayItem::Expr(Expr::function(Function::thunk(vec![local_return(Some(Expr::Number(1.0)))]))),
                ArrayItem::Expr(Expr::Undefined),
                ArrayItem::Expr(Expr::Bool(true)),
            ]
        );
    }
}
