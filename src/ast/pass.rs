//! Post-order pass that lowers every async function in a program
//!
//! Nested functions are visited before the function that contains them, so
//! by the time an async body is lowered every inner async function has
//! already become plain code.

use std::collections::HashSet;
use std::fmt;

use log::{debug, trace};
use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::{
    ArrowFunctionExpression, Expression, FormalParameters, Function, FunctionBody, MethodDefinition, ObjectProperty,
    PropertyKey as OxcPropertyKey, PropertyKind, Statement, TSTypeParameterInstantiation, VariableDeclarator,
};
use oxc_ast::AstBuilder;
use oxc_ast_visit::{walk_mut, VisitMut};
use oxc_span::{Span, SPAN};
use oxc_syntax::scope::ScopeFlags;
use serde::Serialize;

use super::builders::Emitter;
use super::lowering::Lowerer;
use super::opaque_store::OpaqueStore;
use super::scan::{parameter_names, BodyScan, ContextRenamer};
use crate::analysis::{count_suspensions, paths_reach, ExitKinds};
use crate::error::{line_column, Error, Result};
use crate::helpers::HelperTable;
use crate::ir::{Arg, Binding, Declarator, Expr, Function as IrFunction, NameGenerator, Stmt, VarDecl, VarKind};
use crate::options::TransformOptions;
use crate::rewrite::{hoist_functions, HoistedFunction, Rewriter};

/// How an async function is wrapped once its body is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionForm {
    /// `function f() { return _call(...) }`
    Declaration,
    /// `_async(function () { ... })`
    Expression,
    /// Object and class methods, getters and setters; same shape as declarations
    Method,
    Arrow,
    /// `return new _AsyncGenerator(function (_generator) { ... })`
    Generator,
}

impl fmt::Display for FunctionForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionForm::Declaration => "declaration",
            FunctionForm::Expression => "expression",
            FunctionForm::Method => "method",
            FunctionForm::Arrow => "arrow",
            FunctionForm::Generator => "generator",
        };
        f.write_str(name)
    }
}

/// What happened to one async function
#[derive(Debug, Clone, Serialize)]
pub struct FunctionReport {
    pub name: String,
    pub line: usize,
    pub column: usize,
    pub form: FunctionForm,
    /// `await`, `for await` and generator `yield` points in the body
    pub suspensions: usize,
    /// Every path through the source body ends in `return`
    pub always_returns: bool,
    /// Helpers referenced by this function's rewrite
    pub helpers: Vec<&'static str>,
}

/// Result of running the pass over a program
pub struct PassOutput<'a> {
    /// Continuations moved to the top level with the `hoist` option
    pub hoisted: ArenaVec<'a, Statement<'a>>,
    pub reports: Vec<FunctionReport>,
}

struct AsyncBody<'b, 'a> {
    name: Option<String>,
    span: Span,
    form: FunctionForm,
    params: &'b FormalParameters<'a>,
    body: &'b mut FunctionBody<'a>,
    expression_body: bool,
}

pub struct AsyncLowering<'a, 'c> {
    ast: AstBuilder<'a>,
    source: &'c str,
    options: &'c TransformOptions,
    names: &'c mut NameGenerator,
    helpers: &'c mut HelperTable,
    /// Names bound below the program's top level
    nested: HashSet<String>,
    /// Names assigned anywhere in the program
    reassigned: HashSet<String>,
    hoisted: ArenaVec<'a, Statement<'a>>,
    hoisted_names: Vec<String>,
    reports: Vec<FunctionReport>,
    error: Option<Error>,
    /// Name for the next function entered, taken from its property or declarator
    pending_name: Option<String>,
    /// The next function entered is an object or class method
    pending_method: bool,
    /// The next function entered sits directly in an expression position
    pending_expression: bool,
    /// Local name of `_async` to wrap the function expression just visited
    wrap_with: Option<String>,
}

impl<'a, 'c> AsyncLowering<'a, 'c> {
    pub fn new(
        ast: AstBuilder<'a>,
        source: &'c str,
        options: &'c TransformOptions,
        names: &'c mut NameGenerator,
        helpers: &'c mut HelperTable,
        nested: HashSet<String>,
        reassigned: HashSet<String>,
    ) -> Self {
        Self {
            ast,
            source,
            options,
            names,
            helpers,
            nested,
            reassigned,
            hoisted: ast.vec(),
            hoisted_names: Vec::new(),
            reports: Vec::new(),
            error: None,
            pending_name: None,
            pending_method: false,
            pending_expression: false,
            wrap_with: None,
        }
    }

    pub fn run(mut self, program: &mut oxc_ast::ast::Program<'a>) -> Result<PassOutput<'a>> {
        self.visit_program(program);
        match self.error {
            Some(error) => Err(error),
            None => Ok(PassOutput {
                hoisted: self.hoisted,
                reports: self.reports,
            }),
        }
    }

    fn unsupported(&self, construct: &str, span: Span) -> Error {
        Error::unsupported(construct, self.source, span.start, span.size())
    }

    /// Rewrite one async body in place. Returns the `_async` wrapper name
    /// when the function has to be wrapped at its expression position.
    fn lower_function(&mut self, function: AsyncBody<'_, 'a>) -> Result<Option<String>> {
        let AsyncBody {
            name,
            span,
            form,
            params,
            body,
            expression_body,
        } = function;
        let name = name.unwrap_or_else(|| "<anonymous>".to_string());
        debug!("lowering async {} {}", form, name);

        let scan = BodyScan::scan(body);
        if let Some(eval) = scan.eval {
            return Err(Error::eval_in_async(self.source, eval.start, eval.size()));
        }
        if let Some(delegate) = scan.yield_delegate {
            return Err(self.unsupported("yield*", delegate));
        }
        let capture = !self.options.arrow_continuations();
        if let (true, Some(super_span)) = (capture, scan.super_span) {
            return Err(self.unsupported("super access with es5 continuations", super_span));
        }
        let this_name = (capture && scan.uses_this).then(|| self.names.fresh("this"));
        let arguments_name = (capture && scan.uses_arguments).then(|| self.names.fresh("arguments"));
        if this_name.is_some() || arguments_name.is_some() {
            ContextRenamer::new(self.ast, this_name.clone(), arguments_name.clone()).rename(body);
        }

        let generator = form == FunctionForm::Generator;
        let statements = std::mem::replace(&mut body.statements, self.ast.vec());
        let mut store = OpaqueStore::new();
        let mut lowered = Lowerer::new(&mut store, self.source, generator).lower_body(statements)?;
        if expression_body {
            if let Some(last) = lowered.pop() {
                lowered.push(match last {
                    Stmt::Expr(expr) => Stmt::ret(Some(expr)),
                    other => other,
                });
            }
        }
        let param_names = parameter_names(params);
        let suspensions = count_suspensions(&lowered);
        let always_returns = paths_reach(&lowered, ExitKinds::RETURN, store.infos()).all;
        trace!("{} suspension points, {} parked nodes", suspensions, store.len());

        let generator_name = generator.then(|| self.names.fresh("generator"));
        let (mut rewritten, helpers, wrapper) = {
            let mut rewriter = Rewriter::new(self.names, self.helpers, store.infos(), self.options)
                .with_module_assigned(&self.reassigned);
            if let Some(generator_name) = &generator_name {
                rewriter = rewriter.with_generator(generator_name.clone());
            }
            let body = rewriter.rewrite_function(&param_names, lowered)?;
            let (body, wrapper) = match form {
                FunctionForm::Generator => {
                    let constructor = rewriter.helper("_AsyncGenerator")?;
                    let entry = IrFunction::new(generator_name.into_iter().collect(), body);
                    let created = Expr::New(Box::new(constructor), vec![Arg::Expr(Expr::function(entry))]);
                    (vec![Stmt::ret(Some(created))], None)
                }
                FunctionForm::Expression => {
                    let wrapper = rewriter.helper("_async")?;
                    (body, wrapper.as_ident().map(str::to_string))
                }
                _ => {
                    let started = rewriter.start_call(IrFunction::thunk(body))?;
                    (vec![Stmt::ret(Some(started))], None)
                }
            };
            (body, rewriter.used_helpers(), wrapper)
        };

        let mut captured = Vec::new();
        if let Some(this_name) = this_name {
            captured.push(Declarator {
                binding: Binding::Ident(this_name),
                init: Some(Expr::This),
            });
        }
        if let Some(arguments_name) = arguments_name {
            captured.push(Declarator {
                binding: Binding::Ident(arguments_name),
                init: Some(Expr::ident("arguments")),
            });
        }
        if !captured.is_empty() {
            rewritten.insert(
                0,
                Stmt::Var(VarDecl {
                    kind: VarKind::Var,
                    declarators: captured,
                }),
            );
        }

        let hoisted = if self.options.hoist {
            let shared: Vec<String> = self
                .helpers
                .used()
                .iter()
                .filter_map(|helper| self.helpers.local_name(helper))
                .map(str::to_string)
                .chain(self.hoisted_names.iter().cloned())
                .collect();
            hoist_functions(&mut rewritten, self.names, store.infos(), &self.nested, shared)
        } else {
            Vec::new()
        };

        let mut emitter = Emitter::new(self.ast, &mut store, self.options.arrow_continuations());
        for HoistedFunction { name, function } in hoisted {
            debug!("hoisted continuation {}", name);
            self.hoisted.push(emitter.function_declaration(&name, function)?);
            self.hoisted_names.push(name);
        }
        body.statements = emitter.statements(rewritten)?;
        if store.remaining() > 0 {
            trace!("{} parked nodes were unreachable and dropped", store.remaining());
        }

        let (line, column) = line_column(self.source, span.start);
        self.reports.push(FunctionReport {
            name,
            line,
            column,
            form,
            suspensions,
            always_returns,
            helpers,
        });
        Ok(wrapper)
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

fn static_key_name(key: &OxcPropertyKey<'_>) -> Option<String> {
    key.static_name().map(|name| name.to_string())
}

impl<'a> VisitMut<'a> for AsyncLowering<'a, '_> {
    fn visit_expression(&mut self, it: &mut Expression<'a>) {
        if self.error.is_some() {
            return;
        }
        if let Expression::FunctionExpression(function) = it {
            self.pending_expression = function.r#async && !function.generator;
        }
        walk_mut::walk_expression(self, it);

        if let Some(wrapper) = self.wrap_with.take() {
            let function = std::mem::replace(it, self.ast.expression_null_literal(SPAN));
            let callee = self.ast.expression_identifier(SPAN, self.ast.atom(&wrapper));
            *it = self.ast.expression_call(
                SPAN,
                callee,
                None::<TSTypeParameterInstantiation>,
                self.ast.vec1(oxc_ast::ast::Argument::from(function)),
                false,
            );
        }
    }

    fn visit_variable_declarator(&mut self, it: &mut VariableDeclarator<'a>) {
        self.visit_binding_pattern(&mut it.id);
        if let Some(init) = &mut it.init {
            if matches!(init, Expression::FunctionExpression(_) | Expression::ArrowFunctionExpression(_)) {
                self.pending_name = it.id.get_identifier_name().map(|name| name.to_string());
            }
            self.visit_expression(init);
        }
    }

    fn visit_object_property(&mut self, it: &mut ObjectProperty<'a>) {
        self.visit_property_key(&mut it.key);
        let is_method = it.method || it.kind != PropertyKind::Init;
        match &mut it.value {
            Expression::FunctionExpression(function) if is_method => {
                self.pending_name = static_key_name(&it.key);
                self.pending_method = true;
                self.visit_function(function, ScopeFlags::Function);
            }
            Expression::FunctionExpression(_) | Expression::ArrowFunctionExpression(_) => {
                self.pending_name = static_key_name(&it.key);
                self.visit_expression(&mut it.value);
            }
            _ => self.visit_expression(&mut it.value),
        }
    }

    fn visit_method_definition(&mut self, it: &mut MethodDefinition<'a>) {
        for decorator in it.decorators.iter_mut() {
            self.visit_decorator(decorator);
        }
        self.visit_property_key(&mut it.key);
        self.pending_name = static_key_name(&it.key);
        self.pending_method = true;
        self.visit_function(&mut it.value, ScopeFlags::Function);
    }

    fn visit_function(&mut self, it: &mut Function<'a>, flags: ScopeFlags) {
        let name = self
            .pending_name
            .take()
            .or_else(|| it.id.as_ref().map(|id| id.name.to_string()));
        let as_method = std::mem::take(&mut self.pending_method);
        let as_expression = std::mem::take(&mut self.pending_expression);

        walk_mut::walk_function(self, it, flags);
        if self.error.is_some() || !it.r#async {
            return;
        }
        let form = if it.generator {
            FunctionForm::Generator
        } else if as_method {
            FunctionForm::Method
        } else if as_expression {
            FunctionForm::Expression
        } else {
            FunctionForm::Declaration
        };
        let Some(body) = it.body.as_mut() else {
            return;
        };
        let result = self.lower_function(AsyncBody {
            name,
            span: it.span,
            form,
            params: &it.params,
            body,
            expression_body: false,
        });
        match result {
            Ok(wrapper) => {
                it.r#async = false;
                it.generator = false;
                self.wrap_with = wrapper;
            }
            Err(error) => self.fail(error),
        }
    }

    fn visit_arrow_function_expression(&mut self, it: &mut ArrowFunctionExpression<'a>) {
        let name = self.pending_name.take();
        self.pending_method = false;
        self.pending_expression = false;

        walk_mut::walk_arrow_function_expression(self, it);
        if self.error.is_some() || !it.r#async {
            return;
        }
        let expression_body = it.expression;
        let result = self.lower_function(AsyncBody {
            name,
            span: it.span,
            form: FunctionForm::Arrow,
            params: &it.params,
            body: &mut it.body,
            expression_body,
        });
        match result {
            Ok(_) => {
                it.r#async = false;
                it.expression = false;
            }
            Err(error) => self.fail(error),
        }
    }
}
