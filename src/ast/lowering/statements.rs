use oxc_allocator::Box as ArenaBox;
use oxc_ast::ast::{
    AssignmentOperator, AssignmentTarget, BinaryOperator as OxcBinaryOperator, BindingPattern, BindingPatternKind, CatchClause as OxcCatchClause,
    Expression, ForStatement, ForStatementInit, ForStatementLeft, SimpleAssignmentTarget, Statement, SwitchCase as OxcSwitchCase,
    TryStatement, UpdateOperator, VariableDeclaration, VariableDeclarationKind,
};
use oxc_span::GetSpan;

use super::Lowerer;
use crate::ast::opaque_store::OpaqueNode;
use crate::ast::scan;
use crate::error::{Error, Result};
use crate::ir::{
    Binding, CatchClause, Declarator, ForHead, ForInit, IndexedLoop, Stmt, SwitchCase, VarDecl, VarKind,
};

impl<'a> Lowerer<'a, '_> {
    pub(crate) fn lower_statement(&mut self, statement: Statement<'a>) -> Result<Stmt> {
        Ok(match statement {
            Statement::ExpressionStatement(stmt) => Stmt::Expr(self.lower_expression(stmt.unbox().expression)?),
            Statement::BlockStatement(block) => Stmt::Block(self.lower_list(block.unbox().body)?),
            Statement::EmptyStatement(_) => Stmt::Empty,
            Statement::VariableDeclaration(decl) if is_using(decl.kind) => {
                if decl.kind == VariableDeclarationKind::AwaitUsing {
                    return Err(self.unsupported("await using declaration", decl.span));
                }
                self.park_statement(Statement::VariableDeclaration(decl), "using declaration")?
            }
            Statement::VariableDeclaration(decl) => Stmt::Var(self.lower_var_decl(decl.unbox())?),
            Statement::ReturnStatement(stmt) => {
                let value = match stmt.unbox().argument {
                    Some(argument) => Some(self.lower_expression(argument)?),
                    None => None,
                };
                Stmt::ret(value)
            }
            Statement::ThrowStatement(stmt) => Stmt::Throw(self.lower_expression(stmt.unbox().argument)?),
            Statement::IfStatement(stmt) => {
                let stmt = stmt.unbox();
                let test = self.lower_expression(stmt.test)?;
                let consequent = self.lower_statement(stmt.consequent)?;
                let alternate = match stmt.alternate {
                    Some(alternate) => Some(Box::new(self.lower_statement(alternate)?)),
                    None => None,
                };
                Stmt::If(test, Box::new(consequent), alternate)
            }
            Statement::ForStatement(stmt) => self.lower_for(stmt.unbox())?,
            Statement::ForInStatement(stmt) => {
                let stmt = stmt.unbox();
                Stmt::ForIn {
                    left: self.lower_for_head(stmt.left)?,
                    right: self.lower_expression(stmt.right)?,
                    body: Box::new(self.lower_statement(stmt.body)?),
                }
            }
            Statement::ForOfStatement(stmt) => {
                let stmt = stmt.unbox();
                Stmt::ForOf {
                    left: self.lower_for_head(stmt.left)?,
                    right: self.lower_expression(stmt.right)?,
                    body: Box::new(self.lower_statement(stmt.body)?),
                    is_await: stmt.r#await,
                }
            }
            Statement::WhileStatement(stmt) => {
                let stmt = stmt.unbox();
                let test = self.lower_expression(stmt.test)?;
                Stmt::While(test, Box::new(self.lower_statement(stmt.body)?))
            }
            Statement::DoWhileStatement(stmt) => {
                let stmt = stmt.unbox();
                let body = self.lower_statement(stmt.body)?;
                Stmt::DoWhile(Box::new(body), self.lower_expression(stmt.test)?)
            }
            Statement::LabeledStatement(stmt) => {
                let stmt = stmt.unbox();
                Stmt::Labeled(stmt.label.name.to_string(), Box::new(self.lower_statement(stmt.body)?))
            }
            Statement::BreakStatement(stmt) => Stmt::Break(stmt.label.as_ref().map(|label| label.name.to_string())),
            Statement::ContinueStatement(stmt) => {
                Stmt::Continue(stmt.label.as_ref().map(|label| label.name.to_string()))
            }
            Statement::SwitchStatement(stmt) => {
                let stmt = stmt.unbox();
                let discriminant = self.lower_expression(stmt.discriminant)?;
                let mut cases = Vec::with_capacity(stmt.cases.len());
                for case in stmt.cases {
                    cases.push(self.lower_case(case)?);
                }
                Stmt::Switch(discriminant, cases)
            }
            Statement::TryStatement(stmt) => self.lower_try(stmt)?,
            Statement::FunctionDeclaration(function) => match function.id.as_ref().map(|id| id.name.to_string()) {
                Some(name) => Stmt::FunctionDecl {
                    name,
                    id: self.store.park(OpaqueNode::Stmt(Statement::FunctionDeclaration(function))),
                },
                None => Stmt::Opaque(self.store.park(OpaqueNode::Stmt(Statement::FunctionDeclaration(function)))),
            },
            other => self.park_statement(other, "statement")?,
        })
    }

    fn park_statement(&mut self, statement: Statement<'a>, construct: &str) -> Result<Stmt> {
        if scan::statement_suspends(&statement, self.generator) {
            return Err(self.unsupported(construct, statement.span()));
        }
        Ok(Stmt::Opaque(self.store.park(OpaqueNode::Stmt(statement))))
    }

    fn lower_case(&mut self, case: OxcSwitchCase<'a>) -> Result<SwitchCase> {
        let test = match case.test {
            Some(test) => Some(self.lower_expression(test)?),
            None => None,
        };
        Ok(SwitchCase {
            test,
            body: self.lower_list(case.consequent)?,
        })
    }

    fn lower_try(&mut self, stmt: ArenaBox<'a, TryStatement<'a>>) -> Result<Stmt> {
        let stmt = stmt.unbox();
        let block = self.lower_list(stmt.block.unbox().body)?;
        let handler = match stmt.handler {
            Some(handler) => Some(self.lower_catch(handler.unbox())?),
            None => None,
        };
        let finalizer = match stmt.finalizer {
            Some(finalizer) => Some(self.lower_list(finalizer.unbox().body)?),
            None => None,
        };
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn lower_catch(&mut self, clause: OxcCatchClause<'a>) -> Result<CatchClause> {
        let param = match clause.param {
            Some(param) => Some(self.lower_binding(param.pattern)?),
            None => None,
        };
        Ok(CatchClause {
            param,
            body: self.lower_list(clause.body.unbox().body)?,
        })
    }

    pub(crate) fn lower_binding(&mut self, pattern: BindingPattern<'a>) -> Result<Binding> {
        if let BindingPatternKind::BindingIdentifier(ident) = &pattern.kind {
            return Ok(Binding::Ident(ident.name.to_string()));
        }
        if scan::pattern_suspends(&pattern, self.generator) {
            return Err(self.unsupported("destructuring default value", pattern.span()));
        }
        let names = scan::binding_names(&pattern);
        let id = self.store.park(OpaqueNode::Pattern(pattern));
        Ok(Binding::Pattern { id, names })
    }

    fn lower_var_decl(&mut self, decl: VariableDeclaration<'a>) -> Result<VarDecl> {
        let kind = var_kind(decl.kind);
        let mut declarators = Vec::with_capacity(decl.declarations.len());
        for declarator in decl.declarations {
            let binding = self.lower_binding(declarator.id)?;
            let init = match declarator.init {
                Some(init) => Some(self.lower_expression(init)?),
                None => None,
            };
            declarators.push(Declarator { binding, init });
        }
        Ok(VarDecl { kind, declarators })
    }

    fn lower_for(&mut self, stmt: ForStatement<'a>) -> Result<Stmt> {
        let indexed = detect_indexed_loop(&stmt);
        if let Some(ForStatementInit::VariableDeclaration(decl)) = &stmt.init {
            // each iteration runs with a copy of the head bindings, which a
            // write in the body would never reach
            if decl.kind != VariableDeclarationKind::Var && self.for_suspends(&stmt) {
                let names: Vec<String> = decl
                    .declarations
                    .iter()
                    .flat_map(|declarator| scan::binding_names(&declarator.id))
                    .collect();
                if !scan::captured_and_reassigned(&names, &stmt.body).is_empty() {
                    return Err(self.unsupported("loop binding captured by a closure and reassigned in the body", stmt.span));
                }
            }
        }
        let init = match stmt.init {
            None => None,
            Some(ForStatementInit::VariableDeclaration(decl)) if is_using(decl.kind) => {
                return Err(self.unsupported("using declaration", decl.span));
            }
            Some(ForStatementInit::VariableDeclaration(decl)) => Some(ForInit::Var(self.lower_var_decl(decl.unbox())?)),
            Some(init) => Some(ForInit::Expr(self.lower_expression(init.into_expression())?)),
        };
        let test = match stmt.test {
            Some(test) => Some(self.lower_expression(test)?),
            None => None,
        };
        let update = match stmt.update {
            Some(update) => Some(self.lower_expression(update)?),
            None => None,
        };
        Ok(Stmt::For {
            init,
            test,
            update,
            body: Box::new(self.lower_statement(stmt.body)?),
            indexed,
        })
    }

    fn for_suspends(&self, stmt: &ForStatement<'a>) -> bool {
        scan::statement_suspends(&stmt.body, self.generator)
            || stmt.test.as_ref().is_some_and(|test| self.suspends(test))
            || stmt.update.as_ref().is_some_and(|update| self.suspends(update))
    }

    fn lower_for_head(&mut self, left: ForStatementLeft<'a>) -> Result<ForHead> {
        let left = match left {
            ForStatementLeft::VariableDeclaration(decl) => {
                if is_using(decl.kind) {
                    return Err(self.unsupported("using declaration", decl.span));
                }
                let decl = decl.unbox();
                let kind = var_kind(decl.kind);
                let declarator = decl
                    .declarations
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::invariant("for-in/of declaration without a declarator"))?;
                return Ok(ForHead::Var(kind, self.lower_binding(declarator.id)?));
            }
            other => other,
        };
        let target = for_left_into_target(left)
            .ok_or_else(|| Error::invariant("unexpected for-in/of left-hand side"))?;
        Ok(ForHead::Target(self.lower_target(target)?))
    }
}

fn is_using(kind: VariableDeclarationKind) -> bool {
    matches!(kind, VariableDeclarationKind::Using | VariableDeclarationKind::AwaitUsing)
}

fn var_kind(kind: VariableDeclarationKind) -> VarKind {
    match kind {
        VariableDeclarationKind::Let => VarKind::Let,
        VariableDeclarationKind::Const => VarKind::Const,
        _ => VarKind::Var,
    }
}

fn for_left_into_target(left: ForStatementLeft<'_>) -> Option<AssignmentTarget<'_>> {
    Some(match left {
        ForStatementLeft::AssignmentTargetIdentifier(it) => AssignmentTarget::AssignmentTargetIdentifier(it),
        ForStatementLeft::ComputedMemberExpression(it) => AssignmentTarget::ComputedMemberExpression(it),
        ForStatementLeft::StaticMemberExpression(it) => AssignmentTarget::StaticMemberExpression(it),
        ForStatementLeft::PrivateFieldExpression(it) => AssignmentTarget::PrivateFieldExpression(it),
        ForStatementLeft::ArrayAssignmentTarget(it) => AssignmentTarget::ArrayAssignmentTarget(it),
        ForStatementLeft::ObjectAssignmentTarget(it) => AssignmentTarget::ObjectAssignmentTarget(it),
        _ => return None,
    })
}

/// Matches `for (let i = 0; i < array.length; i++)` with `array` a plain identifier
fn detect_indexed_loop(stmt: &ForStatement<'_>) -> Option<IndexedLoop> {
    let Some(ForStatementInit::VariableDeclaration(decl)) = &stmt.init else {
        return None;
    };
    if decl.kind != VariableDeclarationKind::Let || decl.declarations.len() != 1 {
        return None;
    }
    let declarator = &decl.declarations[0];
    let BindingPatternKind::BindingIdentifier(index) = &declarator.id.kind else {
        return None;
    };
    let Some(Expression::NumericLiteral(start)) = &declarator.init else {
        return None;
    };
    if start.value != 0.0 {
        return None;
    }

    let Some(Expression::BinaryExpression(test)) = &stmt.test else {
        return None;
    };
    if test.operator != OxcBinaryOperator::LessThan {
        return None;
    }
    let Expression::Identifier(left) = &test.left else {
        return None;
    };
    let Expression::StaticMemberExpression(length) = &test.right else {
        return None;
    };
    let Expression::Identifier(array) = &length.object else {
        return None;
    };
    if left.name != index.name || length.property.name != "length" || array.name == index.name {
        return None;
    }

    let increments = match &stmt.update {
        Some(Expression::UpdateExpression(update)) => {
            update.operator == UpdateOperator::Increment
                && matches!(&update.argument,
                    SimpleAssignmentTarget::AssignmentTargetIdentifier(updated) if updated.name == index.name)
        }
        Some(Expression::AssignmentExpression(assign)) => {
            assign.operator == AssignmentOperator::Addition
                && matches!(&assign.left,
                    AssignmentTarget::AssignmentTargetIdentifier(updated) if updated.name == index.name)
                && matches!(&assign.right, Expression::NumericLiteral(step) if step.value == 1.0)
        }
        _ => false,
    };
    if !increments {
        return None;
    }

    Some(IndexedLoop {
        index: index.name.to_string(),
        array: array.name.to_string(),
    })
}
