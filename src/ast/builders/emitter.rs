//! `ir` to oxc conversion
//!
//! The emitter owns no tree of its own: it consumes rewritten `ir` values and
//! builds arena nodes with the [`AstBuilder`], taking parked nodes back out of
//! the [`OpaqueStore`] as their ids come up.

use oxc_allocator::{Box as ArenaBox, Vec as ArenaVec};
use oxc_ast::ast::{
    Argument, ArrayExpressionElement, AssignmentTarget, BindingIdentifier, BindingPattern, Expression,
    ForStatementInit, ForStatementLeft, FormalParameterKind, FormalParameters, FunctionBody, FunctionType,
    ObjectPropertyKind, PropertyKey as OxcPropertyKey, PropertyKind, Statement, TSThisParameter,
    TSTypeAnnotation, TSTypeParameterDeclaration, TSTypeParameterInstantiation, VariableDeclaration,
    VariableDeclarationKind,
};
use oxc_ast::AstBuilder;
use oxc_span::SPAN;
use oxc_syntax::number::NumberBase;

use crate::ast::opaque_store::OpaqueStore;
use crate::error::{Error, Result};
use crate::ir::{
    Arg, ArrayItem, Binding, Declarator, Expr, ForHead, ForInit, Function, MemberProp, ObjectEntry, PropertyKey,
    Stmt, Target, UnaryOperator, VarDecl, VarKind,
};

pub struct Emitter<'a, 's> {
    ast: AstBuilder<'a>,
    store: &'s mut OpaqueStore<'a>,
    /// Synthesized functions become arrow functions
    arrows: bool,
}

impl<'a, 's> Emitter<'a, 's> {
    pub fn new(ast: AstBuilder<'a>, store: &'s mut OpaqueStore<'a>, arrows: bool) -> Self {
        Self { ast, store, arrows }
    }

    pub fn statements(&mut self, stmts: Vec<Stmt>) -> Result<ArenaVec<'a, Statement<'a>>> {
        let mut emitted = self.ast.vec_with_capacity(stmts.len());
        for stmt in stmts {
            emitted.push(self.statement(stmt)?);
        }
        Ok(emitted)
    }

    pub fn function_body(&mut self, stmts: Vec<Stmt>) -> Result<ArenaBox<'a, FunctionBody<'a>>> {
        let statements = self.statements(stmts)?;
        Ok(self.ast.alloc_function_body(SPAN, self.ast.vec(), statements))
    }

    pub fn formal_parameters(&self, params: &[String]) -> ArenaBox<'a, FormalParameters<'a>> {
        let mut items = self.ast.vec_with_capacity(params.len());
        for param in params {
            items.push(self.ast.formal_parameter(
                SPAN,
                self.ast.vec(),
                self.binding_identifier(param),
                None,
                false,
                false,
            ));
        }
        self.ast.alloc_formal_parameters(
            SPAN,
            FormalParameterKind::FormalParameter,
            items,
            None::<oxc_ast::ast::BindingRestElement>,
        )
    }

    /// `function name(params) { body }`
    pub fn function_declaration(&mut self, name: &str, function: Function) -> Result<Statement<'a>> {
        let params = self.formal_parameters(&function.params);
        let body = self.function_body(function.body)?;
        let id = self.ast.binding_identifier(SPAN, self.ast.atom(name));
        Ok(Statement::FunctionDeclaration(self.ast.alloc_function(
            SPAN,
            FunctionType::FunctionDeclaration,
            Some(id),
            false,
            false,
            false,
            None::<TSTypeParameterDeclaration>,
            None::<TSThisParameter>,
            params,
            None::<TSTypeAnnotation>,
            Some(body),
        )))
    }

    /// A plain `function` expression, regardless of the arrow setting
    pub fn function_expression(&mut self, function: Function) -> Result<Expression<'a>> {
        let params = self.formal_parameters(&function.params);
        let body = self.function_body(function.body)?;
        Ok(self.ast.expression_function(
            SPAN,
            FunctionType::FunctionExpression,
            None::<BindingIdentifier>,
            false,
            false,
            false,
            None::<TSTypeParameterDeclaration>,
            None::<TSThisParameter>,
            params,
            None::<TSTypeAnnotation>,
            Some(body),
        ))
    }

    fn arrow_function(&mut self, mut function: Function) -> Result<Expression<'a>> {
        let params = self.formal_parameters(&function.params);
        let concise = matches!(
            function.body.as_slice(),
            [Stmt::Return { value: Some(value), .. }] if !matches!(value, Expr::Object(_))
        );
        if concise {
            if let Some(Stmt::Return { value: Some(value), .. }) = function.body.pop() {
                let value = self.expression(value)?;
                let statement = self.ast.statement_expression(SPAN, value);
                let body = self.ast.alloc_function_body(SPAN, self.ast.vec(), self.ast.vec1(statement));
                return Ok(self.ast.expression_arrow_function(
                    SPAN,
                    true,
                    false,
                    None::<TSTypeParameterDeclaration>,
                    params,
                    None::<TSTypeAnnotation>,
                    body,
                ));
            }
        }
        let body = self.function_body(function.body)?;
        Ok(self.ast.expression_arrow_function(
            SPAN,
            false,
            false,
            None::<TSTypeParameterDeclaration>,
            params,
            None::<TSTypeAnnotation>,
            body,
        ))
    }

    pub fn statement(&mut self, stmt: Stmt) -> Result<Statement<'a>> {
        Ok(match stmt {
            Stmt::Expr(expr) => {
                let expr = self.expression(expr)?;
                self.ast.statement_expression(SPAN, expr)
            }
            Stmt::Var(decl) => Statement::VariableDeclaration(self.variable_declaration(decl)?),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => Some(self.expression(value)?),
                    None => None,
                };
                self.ast.statement_return(SPAN, value)
            }
            Stmt::Throw(expr) => {
                let expr = self.expression(expr)?;
                self.ast.statement_throw(SPAN, expr)
            }
            Stmt::If(test, consequent, alternate) => {
                let test = self.expression(test)?;
                let consequent = self.statement(*consequent)?;
                let alternate = match alternate {
                    Some(alternate) => Some(self.statement(*alternate)?),
                    None => None,
                };
                self.ast.statement_if(SPAN, test, consequent, alternate)
            }
            Stmt::Block(stmts) => {
                let body = self.statements(stmts)?;
                self.ast.statement_block(SPAN, body)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                let init = match init {
                    Some(ForInit::Var(decl)) => {
                        Some(ForStatementInit::VariableDeclaration(self.variable_declaration(decl)?))
                    }
                    Some(ForInit::Expr(expr)) => Some(ForStatementInit::from(self.expression(expr)?)),
                    None => None,
                };
                let test = self.optional_expression(test)?;
                let update = self.optional_expression(update)?;
                let body = self.statement(*body)?;
                self.ast.statement_for(SPAN, init, test, update, body)
            }
            Stmt::ForIn { left, right, body } => {
                let left = self.for_head(left)?;
                let right = self.expression(right)?;
                let body = self.statement(*body)?;
                self.ast.statement_for_in(SPAN, left, right, body)
            }
            Stmt::ForOf {
                left,
                right,
                body,
                is_await,
            } => {
                let left = self.for_head(left)?;
                let right = self.expression(right)?;
                let body = self.statement(*body)?;
                self.ast.statement_for_of(SPAN, is_await, left, right, body)
            }
            Stmt::While(test, body) => {
                let test = self.expression(test)?;
                let body = self.statement(*body)?;
                self.ast.statement_while(SPAN, test, body)
            }
            Stmt::DoWhile(body, test) => {
                let body = self.statement(*body)?;
                let test = self.expression(test)?;
                self.ast.statement_do_while(SPAN, body, test)
            }
            Stmt::Labeled(label, body) => {
                let label = self.ast.label_identifier(SPAN, self.ast.atom(&label));
                let body = self.statement(*body)?;
                self.ast.statement_labeled(SPAN, label, body)
            }
            Stmt::Break(label) => {
                let label = label.map(|label| self.ast.label_identifier(SPAN, self.ast.atom(&label)));
                self.ast.statement_break(SPAN, label)
            }
            Stmt::Continue(label) => {
                let label = label.map(|label| self.ast.label_identifier(SPAN, self.ast.atom(&label)));
                self.ast.statement_continue(SPAN, label)
            }
            Stmt::Switch(discriminant, cases) => {
                let discriminant = self.expression(discriminant)?;
                let mut emitted = self.ast.vec_with_capacity(cases.len());
                for case in cases {
                    let test = self.optional_expression(case.test)?;
                    let body = self.statements(case.body)?;
                    emitted.push(self.ast.switch_case(SPAN, test, body));
                }
                self.ast.statement_switch(SPAN, discriminant, emitted)
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let block = self.statements(block)?;
                let block = self.ast.block_statement(SPAN, block);
                let handler = match handler {
                    Some(handler) => {
                        let param = match handler.param {
                            Some(binding) => {
                                let pattern = self.binding(binding)?;
                                Some(self.ast.catch_parameter(SPAN, pattern))
                            }
                            None => None,
                        };
                        let body = self.statements(handler.body)?;
                        Some(self.ast.catch_clause(SPAN, param, self.ast.block_statement(SPAN, body)))
                    }
                    None => None,
                };
                let finalizer = match finalizer {
                    Some(finalizer) => {
                        let body = self.statements(finalizer)?;
                        Some(self.ast.block_statement(SPAN, body))
                    }
                    None => None,
                };
                self.ast.statement_try(SPAN, block, handler, finalizer)
            }
            Stmt::FunctionDecl { id, .. } | Stmt::Opaque(id) => self.store.take_stmt(id)?,
            Stmt::Empty => self.ast.statement_empty(SPAN),
        })
    }

    fn optional_expression(&mut self, expr: Option<Expr>) -> Result<Option<Expression<'a>>> {
        match expr {
            Some(expr) => Ok(Some(self.expression(expr)?)),
            None => Ok(None),
        }
    }

    fn variable_declaration(&mut self, decl: VarDecl) -> Result<ArenaBox<'a, VariableDeclaration<'a>>> {
        let kind = match decl.kind {
            VarKind::Var => VariableDeclarationKind::Var,
            VarKind::Let => VariableDeclarationKind::Let,
            VarKind::Const => VariableDeclarationKind::Const,
        };
        let mut declarations = self.ast.vec_with_capacity(decl.declarators.len());
        for Declarator { binding, init } in decl.declarators {
            let id = self.binding(binding)?;
            let init = self.optional_expression(init)?;
            declarations.push(self.ast.variable_declarator(SPAN, kind, id, init, false));
        }
        Ok(self.ast.alloc_variable_declaration(SPAN, kind, declarations, false))
    }

    fn binding_identifier(&self, name: &str) -> BindingPattern<'a> {
        self.ast.binding_pattern(
            self.ast.binding_pattern_kind_binding_identifier(SPAN, self.ast.atom(name)),
            None::<TSTypeAnnotation>,
            false,
        )
    }

    fn binding(&mut self, binding: Binding) -> Result<BindingPattern<'a>> {
        match binding {
            Binding::Ident(name) => Ok(self.binding_identifier(&name)),
            Binding::Pattern { id, .. } => self.store.take_pattern(id),
        }
    }

    fn for_head(&mut self, head: ForHead) -> Result<ForStatementLeft<'a>> {
        Ok(match head {
            ForHead::Var(kind, binding) => ForStatementLeft::VariableDeclaration(self.variable_declaration(
                VarDecl::single(kind, binding, None),
            )?),
            ForHead::Target(target) => match self.target(target)? {
                AssignmentTarget::AssignmentTargetIdentifier(it) => ForStatementLeft::AssignmentTargetIdentifier(it),
                AssignmentTarget::ComputedMemberExpression(it) => ForStatementLeft::ComputedMemberExpression(it),
                AssignmentTarget::StaticMemberExpression(it) => ForStatementLeft::StaticMemberExpression(it),
                AssignmentTarget::PrivateFieldExpression(it) => ForStatementLeft::PrivateFieldExpression(it),
                AssignmentTarget::ArrayAssignmentTarget(it) => ForStatementLeft::ArrayAssignmentTarget(it),
                AssignmentTarget::ObjectAssignmentTarget(it) => ForStatementLeft::ObjectAssignmentTarget(it),
                _ => return Err(Error::invariant("assignment target cannot head a for-in/of loop")),
            },
        })
    }

    fn target(&mut self, target: Target) -> Result<AssignmentTarget<'a>> {
        Ok(match target {
            Target::Ident(name) => {
                AssignmentTarget::AssignmentTargetIdentifier(self.ast.alloc_identifier_reference(SPAN, self.ast.atom(&name)))
            }
            Target::Member(object, MemberProp::Static(property)) => {
                let object = self.expression(object)?;
                let property = self.ast.identifier_name(SPAN, self.ast.atom(&property));
                AssignmentTarget::StaticMemberExpression(
                    self.ast.alloc_static_member_expression(SPAN, object, property, false),
                )
            }
            Target::Member(object, MemberProp::Computed(property)) => {
                let object = self.expression(object)?;
                let property = self.expression(*property)?;
                AssignmentTarget::ComputedMemberExpression(
                    self.ast.alloc_computed_member_expression(SPAN, object, property, false),
                )
            }
            Target::Opaque(id) => self.store.take_target(id)?,
        })
    }

    pub fn expression(&mut self, expr: Expr) -> Result<Expression<'a>> {
        Ok(match expr {
            Expr::Ident(name) => self.ast.expression_identifier(SPAN, self.ast.atom(&name)),
            Expr::This => self.ast.expression_this(SPAN),
            Expr::Number(value) => self.ast.expression_numeric_literal(SPAN, value, None, NumberBase::Decimal),
            Expr::Str(value) => self.ast.expression_string_literal(SPAN, self.ast.atom(&value), None),
            Expr::Bool(value) => self.ast.expression_boolean_literal(SPAN, value),
            Expr::Null => self.ast.expression_null_literal(SPAN),
            Expr::Undefined => {
                let zero = self.ast.expression_numeric_literal(SPAN, 0.0, None, NumberBase::Decimal);
                self.ast.expression_unary(SPAN, UnaryOperator::Void, zero)
            }
            Expr::Opaque(id) => self.store.take_expr(id)?,
            Expr::Function(function) if self.arrows => self.arrow_function(*function)?,
            Expr::Function(function) => self.function_expression(*function)?,
            Expr::Unary(operator, argument) => {
                let argument = self.expression(*argument)?;
                self.ast.expression_unary(SPAN, operator, argument)
            }
            Expr::Binary(operator, left, right) => {
                let left = self.expression(*left)?;
                let right = self.expression(*right)?;
                self.ast.expression_binary(SPAN, left, operator, right)
            }
            Expr::Logical(operator, left, right) => {
                let left = self.expression(*left)?;
                let right = self.expression(*right)?;
                self.ast.expression_logical(SPAN, left, operator, right)
            }
            Expr::Conditional(test, consequent, alternate) => {
                let test = self.expression(*test)?;
                let consequent = self.expression(*consequent)?;
                let alternate = self.expression(*alternate)?;
                self.ast.expression_conditional(SPAN, test, consequent, alternate)
            }
            Expr::Assign(operator, target, value) => {
                let target = self.target(*target)?;
                let value = self.expression(*value)?;
                self.ast.expression_assignment(SPAN, operator, target, value)
            }
            Expr::Call(callee, args) => {
                let callee = self.expression(*callee)?;
                let args = self.arguments(args)?;
                self.ast
                    .expression_call(SPAN, callee, None::<TSTypeParameterInstantiation>, args, false)
            }
            Expr::New(callee, args) => {
                let callee = self.expression(*callee)?;
                let args = self.arguments(args)?;
                self.ast.expression_new(SPAN, callee, None::<TSTypeParameterInstantiation>, args)
            }
            Expr::Member(object, MemberProp::Static(property)) => {
                let object = self.expression(*object)?;
                let property = self.ast.identifier_name(SPAN, self.ast.atom(&property));
                Expression::StaticMemberExpression(self.ast.alloc_static_member_expression(SPAN, object, property, false))
            }
            Expr::Member(object, MemberProp::Computed(property)) => {
                let object = self.expression(*object)?;
                let property = self.expression(*property)?;
                Expression::ComputedMemberExpression(
                    self.ast.alloc_computed_member_expression(SPAN, object, property, false),
                )
            }
            Expr::Sequence(exprs) => {
                let mut emitted = self.ast.vec_with_capacity(exprs.len());
                for expr in exprs {
                    emitted.push(self.expression(expr)?);
                }
                self.ast.expression_sequence(SPAN, emitted)
            }
            Expr::Array(items) => {
                let mut elements = self.ast.vec_with_capacity(items.len());
                for item in items {
                    elements.push(match item {
                        ArrayItem::Expr(expr) => ArrayExpressionElement::from(self.expression(expr)?),
                        ArrayItem::Spread(expr) => {
                            let argument = self.expression(expr)?;
                            ArrayExpressionElement::SpreadElement(self.ast.alloc_spread_element(SPAN, argument))
                        }
                        ArrayItem::Hole => ArrayExpressionElement::Elision(self.ast.elision(SPAN)),
                    });
                }
                self.ast.expression_array(SPAN, elements)
            }
            Expr::Object(entries) => {
                let mut properties = self.ast.vec_with_capacity(entries.len());
                for entry in entries {
                    properties.push(self.object_entry(entry)?);
                }
                self.ast.expression_object(SPAN, properties)
            }
            Expr::Await(_) => return Err(Error::invariant("await left in rewritten body")),
            Expr::Yield(_) => return Err(Error::invariant("yield left in rewritten body")),
        })
    }

    fn arguments(&mut self, args: Vec<Arg>) -> Result<ArenaVec<'a, Argument<'a>>> {
        let mut emitted = self.ast.vec_with_capacity(args.len());
        for arg in args {
            emitted.push(match arg {
                Arg::Expr(expr) => Argument::from(self.expression(expr)?),
                Arg::Spread(expr) => {
                    let argument = self.expression(expr)?;
                    Argument::SpreadElement(self.ast.alloc_spread_element(SPAN, argument))
                }
            });
        }
        Ok(emitted)
    }

    fn object_entry(&mut self, entry: ObjectEntry) -> Result<ObjectPropertyKind<'a>> {
        Ok(match entry {
            ObjectEntry::Property { key, value } => {
                let computed = matches!(key, PropertyKey::Computed(_));
                let key = match key {
                    PropertyKey::Static(name) => {
                        OxcPropertyKey::StaticIdentifier(self.ast.alloc_identifier_name(SPAN, self.ast.atom(&name)))
                    }
                    PropertyKey::Computed(expr) => OxcPropertyKey::from(self.expression(expr)?),
                    PropertyKey::Opaque(id) => self.store.take_key(id)?,
                };
                let value = self.expression(value)?;
                ObjectPropertyKind::ObjectProperty(self.ast.alloc_object_property(
                    SPAN,
                    PropertyKind::Init,
                    key,
                    value,
                    false,
                    false,
                    computed,
                ))
            }
            ObjectEntry::Spread(expr) => {
                let argument = self.expression(expr)?;
                ObjectPropertyKind::SpreadProperty(self.ast.alloc_spread_element(SPAN, argument))
            }
            ObjectEntry::Opaque(id) => self.store.take_property(id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::opaque_store::OpaqueNode;
    use oxc_allocator::Allocator;
    use oxc_codegen::Codegen;
    use oxc_span::SourceType;

    fn print<'a>(ast: AstBuilder<'a>, statements: ArenaVec<'a, Statement<'a>>) -> String {
        let program = ast.program(
            SPAN,
            SourceType::mjs(),
            "",
            ast.vec(),
            None,
            ast.vec(),
            statements,
        );
        Codegen::new().build(&program).code
    }

    #[test]
    fn test_undefined_and_flags() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut store = OpaqueStore::new();
        let mut emitter = Emitter::new(ast, &mut store, false);
        let statements = emitter
            .statements(vec![
                Stmt::var("_exit", None),
                Stmt::ret(Some(Expr::Undefined)),
            ])
            .unwrap();
        let code = print(ast, statements);
        assert!(code.contains("var _exit;"), "{}", code);
        assert!(code.contains("return void 0;"), "{}", code);
    }

    #[test]
    fn test_arrow_with_single_return_is_concise() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut store = OpaqueStore::new();
        let mut emitter = Emitter::new(ast, &mut store, true);
        let continuation = Function::new(
            vec!["_value".to_string()],
            vec![Stmt::ret(Some(Expr::call(Expr::ident("g"), vec![Expr::ident("_value")])))],
        );
        let call = Expr::call(Expr::ident("_await"), vec![Expr::ident("x"), Expr::function(continuation)]);
        let statements = emitter.statements(vec![Stmt::ret(Some(call))]).unwrap();
        let code = print(ast, statements);
        assert!(code.contains("=> g(_value)"), "{}", code);
    }

    #[test]
    fn test_leftover_await_is_an_invariant_violation() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut store = OpaqueStore::new();
        let mut emitter = Emitter::new(ast, &mut store, false);
        let result = emitter.expression(Expr::Await(Box::new(Expr::ident("x"))));
        assert!(matches!(result, Err(Error::Invariant { .. })));
    }

    #[test]
    fn test_opaque_expression_is_emitted_once() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut store = OpaqueStore::new();
        let id = store.park(OpaqueNode::Expr(ast.expression_string_literal(SPAN, "kept", None)));
        let mut emitter = Emitter::new(ast, &mut store, false);
        assert!(emitter.expression(Expr::Opaque(id)).is_ok());
        assert!(emitter.expression(Expr::Opaque(id)).is_err());
    }
}
