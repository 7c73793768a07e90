//! Splitting an expression at its first suspension point
//!
//! Everything evaluated before the suspension keeps its place in evaluation
//! order: values computed earlier are either stable (constants, never
//! reassigned names) or saved into a temporary in the prelude. The
//! suspension itself is replaced by the continuation's parameter, the "hole".

use super::Rewriter;
use crate::analysis::references::expr_suspends;
use crate::error::{Error, Result};
use crate::ir::{
    Arg, ArrayItem, AssignmentOperator, BinaryOperator, Expr, LogicalOperator, MemberProp, ObjectEntry,
    PropertyKey, Stmt, Target,
};

#[derive(Debug)]
pub(crate) enum Extracted {
    /// `rebuilt` reads the hole where `operand` was awaited
    Suspend {
        rebuilt: Expr,
        operand: Expr,
        is_yield: bool,
    },
    /// A suspension that may not run (`a && await b`, `c ? await d : e`) was
    /// expanded into statements; `rebuilt` reads their result
    Expand { rebuilt: Expr, stmts: Vec<Stmt> },
}

impl Extracted {
    fn map(self, rebuild: impl FnOnce(Expr) -> Expr) -> Extracted {
        match self {
            Extracted::Suspend {
                rebuilt,
                operand,
                is_yield,
            } => Extracted::Suspend {
                rebuilt: rebuild(rebuilt),
                operand,
                is_yield,
            },
            Extracted::Expand { rebuilt, stmts } => Extracted::Expand {
                rebuilt: rebuild(rebuilt),
                stmts,
            },
        }
    }
}

fn binary_for(operator: AssignmentOperator) -> Option<BinaryOperator> {
    Some(match operator {
        AssignmentOperator::Addition => BinaryOperator::Addition,
        AssignmentOperator::Subtraction => BinaryOperator::Subtraction,
        AssignmentOperator::Multiplication => BinaryOperator::Multiplication,
        AssignmentOperator::Division => BinaryOperator::Division,
        AssignmentOperator::Remainder => BinaryOperator::Remainder,
        AssignmentOperator::Exponential => BinaryOperator::Exponential,
        AssignmentOperator::ShiftLeft => BinaryOperator::ShiftLeft,
        AssignmentOperator::ShiftRight => BinaryOperator::ShiftRight,
        AssignmentOperator::ShiftRightZeroFill => BinaryOperator::ShiftRightZeroFill,
        AssignmentOperator::BitwiseOR => BinaryOperator::BitwiseOR,
        AssignmentOperator::BitwiseXOR => BinaryOperator::BitwiseXOR,
        AssignmentOperator::BitwiseAnd => BinaryOperator::BitwiseAnd,
        _ => return None,
    })
}

fn logical_for(operator: AssignmentOperator) -> Option<LogicalOperator> {
    match operator {
        AssignmentOperator::LogicalAnd => Some(LogicalOperator::And),
        AssignmentOperator::LogicalOr => Some(LogicalOperator::Or),
        AssignmentOperator::LogicalNullish => Some(LogicalOperator::Coalesce),
        _ => None,
    }
}

/// Read of the location an assignment target names
fn target_value(target: &Target) -> Option<Expr> {
    match target {
        Target::Ident(name) => Some(Expr::Ident(name.clone())),
        Target::Member(object, property) => Some(Expr::Member(Box::new(object.clone()), property.clone())),
        Target::Opaque(_) => None,
    }
}

impl Rewriter<'_> {
    /// Split `expr` at its first suspension point, pushing the statements that
    /// must run before it onto `prelude`
    pub(crate) fn extract(&mut self, expr: Expr, hole: &str, prelude: &mut Vec<Stmt>) -> Result<Extracted> {
        match expr {
            Expr::Await(operand) => {
                if expr_suspends(&operand) {
                    let inner = self.extract(*operand, hole, prelude)?;
                    return Ok(inner.map(|rebuilt| Expr::Await(Box::new(rebuilt))));
                }
                Ok(Extracted::Suspend {
                    rebuilt: Expr::Ident(hole.to_string()),
                    operand: *operand,
                    is_yield: false,
                })
            }
            Expr::Yield(argument) => {
                let argument = argument.map(|argument| *argument).unwrap_or(Expr::Undefined);
                if expr_suspends(&argument) {
                    let inner = self.extract(argument, hole, prelude)?;
                    return Ok(inner.map(|rebuilt| Expr::Yield(Some(Box::new(rebuilt)))));
                }
                Ok(Extracted::Suspend {
                    rebuilt: Expr::Ident(hole.to_string()),
                    operand: argument,
                    is_yield: true,
                })
            }
            Expr::Unary(operator, operand) => {
                Ok(self.extract(*operand, hole, prelude)?.map(|rebuilt| Expr::Unary(operator, Box::new(rebuilt))))
            }
            Expr::Binary(operator, left, right) => {
                if expr_suspends(&left) {
                    return Ok(self
                        .extract(*left, hole, prelude)?
                        .map(|rebuilt| Expr::Binary(operator, Box::new(rebuilt), right)));
                }
                let left = self.stabilize(*left, prelude);
                Ok(self
                    .extract(*right, hole, prelude)?
                    .map(|rebuilt| Expr::Binary(operator, Box::new(left), Box::new(rebuilt))))
            }
            Expr::Logical(operator, left, right) => {
                if expr_suspends(&left) {
                    return Ok(self
                        .extract(*left, hole, prelude)?
                        .map(|rebuilt| Expr::Logical(operator, Box::new(rebuilt), right)));
                }
                Ok(self.expand_logical(operator, *left, *right))
            }
            Expr::Conditional(test, consequent, alternate) => {
                if expr_suspends(&test) {
                    return Ok(self
                        .extract(*test, hole, prelude)?
                        .map(|rebuilt| Expr::Conditional(Box::new(rebuilt), consequent, alternate)));
                }
                Ok(self.expand_conditional(*test, *consequent, *alternate))
            }
            Expr::Assign(operator, target, value) => self.extract_assignment(operator, *target, *value, hole, prelude),
            Expr::Call(callee, args) => {
                let (callee, args) = self.extract_call(*callee, args, hole, prelude)?;
                Ok(match (callee, args) {
                    (Ok(callee), Err(extracted)) => extracted.map(|rebuilt| match rebuilt {
                        Expr::Array(items) => Expr::Call(Box::new(callee), items_to_args(items)),
                        other => other,
                    }),
                    (Err(extracted), Ok(args)) => extracted.map(|rebuilt| Expr::Call(Box::new(rebuilt), args)),
                    _ => return Err(Error::invariant("call split twice")),
                })
            }
            Expr::New(callee, args) => {
                let (callee, args) = self.extract_call(*callee, args, hole, prelude)?;
                Ok(match (callee, args) {
                    (Ok(callee), Err(extracted)) => extracted.map(|rebuilt| match rebuilt {
                        Expr::Array(items) => Expr::New(Box::new(callee), items_to_args(items)),
                        other => other,
                    }),
                    (Err(extracted), Ok(args)) => extracted.map(|rebuilt| Expr::New(Box::new(rebuilt), args)),
                    _ => return Err(Error::invariant("constructor call split twice")),
                })
            }
            Expr::Member(object, property) => {
                if expr_suspends(&object) {
                    return Ok(self
                        .extract(*object, hole, prelude)?
                        .map(|rebuilt| Expr::Member(Box::new(rebuilt), property)));
                }
                let MemberProp::Computed(property) = property else {
                    return Err(Error::invariant("static member without suspension"));
                };
                let object = self.stabilize(*object, prelude);
                Ok(self.extract(*property, hole, prelude)?.map(|rebuilt| {
                    Expr::Member(Box::new(object), MemberProp::Computed(Box::new(rebuilt)))
                }))
            }
            Expr::Sequence(exprs) => {
                let mut exprs = exprs.into_iter();
                for expr in exprs.by_ref() {
                    if !expr_suspends(&expr) {
                        prelude.push(Stmt::expr(expr));
                        continue;
                    }
                    let rest: Vec<Expr> = exprs.collect();
                    return Ok(self.extract(expr, hole, prelude)?.map(|rebuilt| {
                        if rest.is_empty() {
                            rebuilt
                        } else {
                            let mut sequence = vec![rebuilt];
                            sequence.extend(rest);
                            Expr::Sequence(sequence)
                        }
                    }));
                }
                Err(Error::invariant("sequence without suspension"))
            }
            Expr::Array(items) => self.extract_items(items, hole, prelude),
            Expr::Object(entries) => self.extract_entries(entries, hole, prelude),
            other => Err(Error::invariant(format!("no suspension to extract in {:?}", other))),
        }
    }

    /// Value of `expr` as it is now, saved into a temporary unless re-reading
    /// it later is equivalent
    pub(crate) fn stabilize(&mut self, expr: Expr, prelude: &mut Vec<Stmt>) -> Expr {
        if self.is_stable(&expr) {
            return expr;
        }
        let temp = self.names.fresh_for(&expr, self.infos);
        prelude.push(Stmt::var(temp.clone(), Some(expr)));
        Expr::Ident(temp)
    }

    /// Like [`Self::stabilize`], but the result may be duplicated
    fn stabilize_copyable(&mut self, expr: Expr, prelude: &mut Vec<Stmt>) -> Expr {
        if matches!(expr, Expr::Opaque(_) | Expr::Function(_)) {
            let temp = self.names.fresh_for(&expr, self.infos);
            prelude.push(Stmt::var(temp.clone(), Some(expr)));
            return Expr::Ident(temp);
        }
        self.stabilize(expr, prelude)
    }

    fn stabilize_property(&mut self, property: MemberProp, prelude: &mut Vec<Stmt>) -> MemberProp {
        match property {
            MemberProp::Computed(expr) => MemberProp::Computed(Box::new(self.stabilize_copyable(*expr, prelude))),
            property => property,
        }
    }

    /// Split a call. Exactly one side of the result is the extraction: the
    /// callee, or the arguments (rebuilt as an array of the new arguments).
    #[allow(clippy::type_complexity)]
    fn extract_call(
        &mut self,
        callee: Expr,
        args: Vec<Arg>,
        hole: &str,
        prelude: &mut Vec<Stmt>,
    ) -> Result<(std::result::Result<Expr, Extracted>, std::result::Result<Vec<Arg>, Extracted>)> {
        if expr_suspends(&callee) {
            return Ok((Err(self.extract(callee, hole, prelude)?), Ok(args)));
        }
        // Keep the receiver so `this` still binds correctly
        let callee = match callee {
            Expr::Member(object, property) => {
                let object = self.stabilize_copyable(*object, prelude);
                let property = self.stabilize_property(property, prelude);
                Expr::Member(Box::new(object), property)
            }
            callee => self.stabilize(callee, prelude),
        };
        let items: Vec<ArrayItem> = args
            .into_iter()
            .map(|arg| match arg {
                Arg::Expr(expr) => ArrayItem::Expr(expr),
                Arg::Spread(expr) => ArrayItem::Spread(expr),
            })
            .collect();
        Ok((Ok(callee), Err(self.extract_items(items, hole, prelude)?)))
    }

    fn extract_items(&mut self, items: Vec<ArrayItem>, hole: &str, prelude: &mut Vec<Stmt>) -> Result<Extracted> {
        let mut before: Vec<ArrayItem> = Vec::with_capacity(items.len());
        let mut items = items.into_iter();
        while let Some(item) = items.next() {
            let (expr, spread) = match item {
                ArrayItem::Hole => {
                    before.push(ArrayItem::Hole);
                    continue;
                }
                ArrayItem::Expr(expr) => (expr, false),
                ArrayItem::Spread(expr) => (expr, true),
            };
            if !expr_suspends(&expr) {
                let expr = if spread {
                    // Spreading iterates, so it cannot be deferred
                    let temp = self.names.fresh("spread");
                    prelude.push(Stmt::var(temp.clone(), Some(Expr::Array(vec![ArrayItem::Spread(expr)]))));
                    before.push(ArrayItem::Spread(Expr::Ident(temp)));
                    continue;
                } else {
                    self.stabilize(expr, prelude)
                };
                before.push(ArrayItem::Expr(expr));
                continue;
            }
            let after: Vec<ArrayItem> = items.collect();
            let extracted = self.extract(expr, hole, prelude)?;
            return Ok(extracted.map(|rebuilt| {
                let mut all = before;
                all.push(if spread {
                    ArrayItem::Spread(rebuilt)
                } else {
                    ArrayItem::Expr(rebuilt)
                });
                all.extend(after);
                Expr::Array(all)
            }));
        }
        Err(Error::invariant("array without suspension"))
    }

    fn extract_entries(&mut self, entries: Vec<ObjectEntry>, hole: &str, prelude: &mut Vec<Stmt>) -> Result<Extracted> {
        let mut before: Vec<ObjectEntry> = Vec::with_capacity(entries.len());
        let mut entries = entries.into_iter();
        while let Some(entry) = entries.next() {
            match entry {
                ObjectEntry::Property { key, value } => {
                    let key_suspends = matches!(&key, PropertyKey::Computed(key) if expr_suspends(key));
                    if key_suspends {
                        let PropertyKey::Computed(key) = key else {
                            return Err(Error::invariant("computed key vanished"));
                        };
                        let after: Vec<ObjectEntry> = entries.collect();
                        return Ok(self.extract(key, hole, prelude)?.map(|rebuilt| {
                            let mut all = before;
                            all.push(ObjectEntry::Property {
                                key: PropertyKey::Computed(rebuilt),
                                value,
                            });
                            all.extend(after);
                            Expr::Object(all)
                        }));
                    }
                    let key = match key {
                        PropertyKey::Computed(key) => PropertyKey::Computed(self.stabilize(key, prelude)),
                        key => key,
                    };
                    if !expr_suspends(&value) {
                        let value = self.stabilize(value, prelude);
                        before.push(ObjectEntry::Property { key, value });
                        continue;
                    }
                    let after: Vec<ObjectEntry> = entries.collect();
                    return Ok(self.extract(value, hole, prelude)?.map(|rebuilt| {
                        let mut all = before;
                        all.push(ObjectEntry::Property { key, value: rebuilt });
                        all.extend(after);
                        Expr::Object(all)
                    }));
                }
                ObjectEntry::Spread(expr) => {
                    if !expr_suspends(&expr) {
                        let temp = self.names.fresh("spread");
                        prelude.push(Stmt::var(
                            temp.clone(),
                            Some(Expr::Object(vec![ObjectEntry::Spread(expr)])),
                        ));
                        before.push(ObjectEntry::Spread(Expr::Ident(temp)));
                        continue;
                    }
                    let after: Vec<ObjectEntry> = entries.collect();
                    return Ok(self.extract(expr, hole, prelude)?.map(|rebuilt| {
                        let mut all = before;
                        all.push(ObjectEntry::Spread(rebuilt));
                        all.extend(after);
                        Expr::Object(all)
                    }));
                }
                ObjectEntry::Opaque(id) => {
                    // Getters and methods are only defined, never run, here
                    before.push(ObjectEntry::Opaque(id));
                }
            }
        }
        Err(Error::invariant("object without suspension"))
    }

    fn extract_assignment(
        &mut self,
        operator: AssignmentOperator,
        target: Target,
        value: Expr,
        hole: &str,
        prelude: &mut Vec<Stmt>,
    ) -> Result<Extracted> {
        // The target's own subexpressions run first
        let target = match target {
            Target::Member(object, property) => {
                if expr_suspends(&object) {
                    return Ok(self.extract(object, hole, prelude)?.map(|rebuilt| {
                        Expr::Assign(operator, Box::new(Target::Member(rebuilt, property)), Box::new(value))
                    }));
                }
                if let MemberProp::Computed(key) = &property {
                    if expr_suspends(key) {
                        let object = self.stabilize_copyable(object, prelude);
                        let MemberProp::Computed(key) = property else {
                            return Err(Error::invariant("computed property vanished"));
                        };
                        return Ok(self.extract(*key, hole, prelude)?.map(|rebuilt| {
                            Expr::Assign(
                                operator,
                                Box::new(Target::Member(object, MemberProp::Computed(Box::new(rebuilt)))),
                                Box::new(value),
                            )
                        }));
                    }
                }
                let object = self.stabilize_copyable(object, prelude);
                let property = self.stabilize_property(property, prelude);
                Target::Member(object, property)
            }
            target => target,
        };

        if let Some(logical) = logical_for(operator) {
            // `x ||= await y` assigns only when the test fails
            let current = target_value(&target)
                .ok_or_else(|| Error::invariant("logical assignment to a pattern"))?;
            let assignment = Expr::Assign(AssignmentOperator::Assign, Box::new(target), Box::new(value));
            return Ok(self.expand_logical(logical, current, assignment));
        }

        if let Some(binary) = binary_for(operator) {
            // The old value is read before the suspension
            let current = target_value(&target)
                .ok_or_else(|| Error::invariant("compound assignment to a pattern"))?;
            let current = self.stabilize(current, prelude);
            let current = match current {
                Expr::Ident(name) if matches!(&target, Target::Ident(target) if *target == name) => {
                    let temp = self.names.fresh(&name);
                    prelude.push(Stmt::var(temp.clone(), Some(Expr::Ident(name))));
                    Expr::Ident(temp)
                }
                current => current,
            };
            return Ok(self.extract(value, hole, prelude)?.map(|rebuilt| {
                Expr::Assign(
                    AssignmentOperator::Assign,
                    Box::new(target),
                    Box::new(Expr::Binary(binary, Box::new(current), Box::new(rebuilt))),
                )
            }));
        }

        Ok(self
            .extract(value, hole, prelude)?
            .map(|rebuilt| Expr::Assign(operator, Box::new(target), Box::new(rebuilt))))
    }

    /// `left && right` with a suspending `right` as statements:
    /// `var t = left; if (t) t = right;`
    fn expand_logical(&mut self, operator: LogicalOperator, left: Expr, right: Expr) -> Extracted {
        let temp = self.names.fresh("temp");
        let current = Expr::Ident(temp.clone());
        let test = match operator {
            LogicalOperator::And => current.clone(),
            LogicalOperator::Or => Expr::not(current.clone()),
            LogicalOperator::Coalesce => Expr::Binary(BinaryOperator::Equality, Box::new(current.clone()), Box::new(Expr::Null)),
        };
        let stmts = vec![
            Stmt::var(temp.clone(), Some(left)),
            Stmt::If(test, Box::new(Stmt::expr(Expr::assign(temp, right))), None),
        ];
        Extracted::Expand { rebuilt: current, stmts }
    }

    /// `test ? a : b` with a suspending branch as an `if` statement
    fn expand_conditional(&mut self, test: Expr, consequent: Expr, alternate: Expr) -> Extracted {
        let temp = self.names.fresh("temp");
        let stmts = vec![
            Stmt::var(temp.clone(), None),
            Stmt::If(
                test,
                Box::new(Stmt::expr(Expr::assign(temp.clone(), consequent))),
                Some(Box::new(Stmt::expr(Expr::assign(temp.clone(), alternate)))),
            ),
        ];
        Extracted::Expand {
            rebuilt: Expr::Ident(temp),
            stmts,
        }
    }
}

fn items_to_args(items: Vec<ArrayItem>) -> Vec<Arg> {
    items
        .into_iter()
        .filter_map(|item| match item {
            ArrayItem::Expr(expr) => Some(Arg::Expr(expr)),
            ArrayItem::Spread(expr) => Some(Arg::Spread(expr)),
            ArrayItem::Hole => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::HelperTable;
    use crate::ir::{InfoTable, NameGenerator};
    use crate::options::TransformOptions;

    fn extract(expr: Expr, assigned: &[&str]) -> (Extracted, Vec<Stmt>) {
        let mut names = NameGenerator::with_reserved(["a", "b", "f", "obj"]);
        let mut helpers = HelperTable::new();
        let infos = InfoTable::new();
        let options = TransformOptions::default();
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options);
        rewriter.assigned = assigned.iter().map(|name| name.to_string()).collect();
        let mut prelude = Vec::new();
        let extracted = rewriter.extract(expr, "_hole", &mut prelude).unwrap();
        (extracted, prelude)
    }

    fn await_of(name: &str) -> Expr {
        Expr::Await(Box::new(Expr::ident(name)))
    }

    #[test]
    fn test_reassigned_left_operand_is_saved() {
        let expr = Expr::Binary(BinaryOperator::Addition, Box::new(Expr::ident("a")), Box::new(await_of("b")));
        let (extracted, prelude) = extract(expr, &["a"]);
        assert_eq!(prelude, vec![Stmt::var("_a", Some(Expr::ident("a")))]);
        match extracted {
            Extracted::Suspend { rebuilt, operand, .. } => {
                assert_eq!(operand, Expr::ident("b"));
                assert_eq!(
                    rebuilt,
                    Expr::Binary(
                        BinaryOperator::Addition,
                        Box::new(Expr::ident("_a")),
                        Box::new(Expr::ident("_hole"))
                    )
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stable_operand_is_not_copied() {
        let expr = Expr::Binary(BinaryOperator::Addition, Box::new(Expr::ident("a")), Box::new(await_of("b")));
        let (_, prelude) = extract(expr, &[]);
        assert!(prelude.is_empty());
    }

    #[test]
    fn test_method_call_keeps_receiver() {
        let expr = Expr::Call(
            Box::new(Expr::member(Expr::ident("obj"), "send")),
            vec![Arg::Expr(await_of("b"))],
        );
        let (extracted, prelude) = extract(expr, &["obj"]);
        assert_eq!(prelude, vec![Stmt::var("_obj", Some(Expr::ident("obj")))]);
        match extracted {
            Extracted::Suspend { rebuilt, .. } => assert_eq!(
                rebuilt,
                Expr::Call(
                    Box::new(Expr::member(Expr::ident("_obj"), "send")),
                    vec![Arg::Expr(Expr::ident("_hole"))]
                )
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parked_receiver_temp_is_named_after_its_path() {
        use crate::ir::{OpaqueInfo, OpaqueKind};

        let mut names = NameGenerator::new();
        let mut helpers = HelperTable::new();
        let mut infos = InfoTable::new();
        let mut info = OpaqueInfo::new(OpaqueKind::Other);
        info.hint = Some("state$items".to_string());
        let id = infos.push(info);
        let options = TransformOptions::default();
        let mut rewriter = Rewriter::new(&mut names, &mut helpers, &infos, &options);

        let expr = Expr::Call(
            Box::new(Expr::member(Expr::Opaque(id), "push")),
            vec![Arg::Expr(await_of("b"))],
        );
        let mut prelude = Vec::new();
        let extracted = rewriter.extract(expr, "_hole", &mut prelude).unwrap();
        assert_eq!(prelude, vec![Stmt::var("_state$items", Some(Expr::Opaque(id)))]);
        match extracted {
            Extracted::Suspend { rebuilt, .. } => assert_eq!(
                rebuilt,
                Expr::Call(
                    Box::new(Expr::member(Expr::ident("_state$items"), "push")),
                    vec![Arg::Expr(Expr::ident("_hole"))]
                )
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment_reads_old_value_first() {
        let expr = Expr::Assign(
            AssignmentOperator::Addition,
            Box::new(Target::Ident("a".to_string())),
            Box::new(await_of("b")),
        );
        let (extracted, prelude) = extract(expr, &["a"]);
        assert_eq!(prelude, vec![Stmt::var("_a", Some(Expr::ident("a")))]);
        match extracted {
            Extracted::Suspend { rebuilt, .. } => assert_eq!(
                rebuilt,
                Expr::Assign(
                    AssignmentOperator::Assign,
                    Box::new(Target::Ident("a".to_string())),
                    Box::new(Expr::Binary(
                        BinaryOperator::Addition,
                        Box::new(Expr::ident("_a")),
                        Box::new(Expr::ident("_hole"))
                    ))
                )
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lazy_await_expands() {
        let expr = Expr::Logical(LogicalOperator::And, Box::new(Expr::ident("a")), Box::new(await_of("b")));
        let (extracted, _) = extract(expr, &[]);
        match extracted {
            Extracted::Expand { rebuilt, stmts } => {
                assert_eq!(rebuilt, Expr::ident("_temp"));
                assert_eq!(stmts.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
