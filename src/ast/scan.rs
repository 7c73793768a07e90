//! Read-only queries over oxc nodes

use std::collections::HashSet;

use oxc_ast::ast::{
    ArrowFunctionExpression, AssignmentTarget, AssignmentTargetPropertyIdentifier, AwaitExpression, BindingIdentifier,
    BindingPattern, BlockStatement, CallExpression, CatchClause, Class, Expression, ForInStatement, ForOfStatement,
    ForStatement, FormalParameters, Function, FunctionBody, IdentifierReference, LabelIdentifier, ObjectPropertyKind,
    Program, SimpleAssignmentTarget, Statement, Super, SwitchStatement, ThisExpression, YieldExpression,
};
use oxc_ast::AstBuilder;
use oxc_ast_visit::{walk, walk_mut, Visit, VisitMut};
use oxc_span::{GetSpan, Span};
use oxc_syntax::scope::ScopeFlags;

use crate::ir::NameGenerator;

/// Names read, written and bound by an opaque node
#[derive(Default)]
pub(crate) struct InfoCollector {
    pub references: HashSet<String>,
    pub assigned: HashSet<String>,
    /// Names referenced from inside a nested function or arrow
    pub captured: HashSet<String>,
    function_depth: usize,
    closure_depth: usize,
}

impl<'a> Visit<'a> for InfoCollector {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        self.references.insert(it.name.to_string());
        if self.closure_depth > 0 {
            self.captured.insert(it.name.to_string());
        }
    }

    fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
        self.references.insert(it.name.to_string());
    }

    fn visit_simple_assignment_target(&mut self, it: &SimpleAssignmentTarget<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) = it {
            self.assigned.insert(ident.name.to_string());
        }
        walk::walk_simple_assignment_target(self, it);
    }

    fn visit_assignment_target_property_identifier(&mut self, it: &AssignmentTargetPropertyIdentifier<'a>) {
        self.assigned.insert(it.binding.name.to_string());
        walk::walk_assignment_target_property_identifier(self, it);
    }

    fn visit_this_expression(&mut self, _it: &ThisExpression) {
        if self.function_depth == 0 {
            self.references.insert("this".to_string());
        }
    }

    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        self.function_depth += 1;
        self.closure_depth += 1;
        walk::walk_function(self, it, flags);
        self.closure_depth -= 1;
        self.function_depth -= 1;
    }

    fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
        self.closure_depth += 1;
        walk::walk_arrow_function_expression(self, it);
        self.closure_depth -= 1;
    }
}

/// Identifiers written by an assignment or update anywhere in the program,
/// in any scope
pub fn assigned_anywhere(program: &Program<'_>) -> HashSet<String> {
    let mut collector = InfoCollector::default();
    collector.visit_program(program);
    collector.assigned
}

/// Names of a loop-head `let` or `const` that a closure in `body` captures
/// while `body` also reassigns them
pub fn captured_and_reassigned(names: &[String], body: &Statement<'_>) -> Vec<String> {
    let mut collector = InfoCollector::default();
    collector.visit_statement(body);
    names
        .iter()
        .filter(|name| collector.captured.contains(*name) && collector.assigned.contains(*name))
        .cloned()
        .collect()
}

/// Every identifier spelled anywhere in the program, so fresh names never
/// shadow or capture one
pub fn reserve_program_names(program: &Program<'_>, names: &mut NameGenerator) {
    struct Reserver<'n>(&'n mut NameGenerator);

    impl<'a> Visit<'a> for Reserver<'_> {
        fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
            self.0.reserve(it.name.as_str());
        }

        fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
            self.0.reserve(it.name.as_str());
        }

        fn visit_label_identifier(&mut self, it: &LabelIdentifier<'a>) {
            self.0.reserve(it.name.as_str());
        }
    }

    Reserver(names).visit_program(program);
}

/// Facts about an async function body that decide how it is wrapped
#[derive(Debug, Default)]
pub struct BodyScan {
    pub eval: Option<Span>,
    pub uses_this: bool,
    pub uses_arguments: bool,
    pub super_span: Option<Span>,
    pub yield_delegate: Option<Span>,
}

impl BodyScan {
    pub fn scan(body: &FunctionBody<'_>) -> Self {
        let mut scan = BodyScanner {
            result: BodyScan::default(),
            function_depth: 0,
        };
        scan.visit_function_body(body);
        scan.result
    }
}

struct BodyScanner {
    result: BodyScan,
    /// Non-arrow functions entered; `this` and `arguments` are rebound inside
    function_depth: usize,
}

impl<'a> Visit<'a> for BodyScanner {
    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            if callee.name == "eval" && self.result.eval.is_none() {
                self.result.eval = Some(it.span);
            }
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_this_expression(&mut self, _it: &ThisExpression) {
        if self.function_depth == 0 {
            self.result.uses_this = true;
        }
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if self.function_depth == 0 && it.name == "arguments" {
            self.result.uses_arguments = true;
        }
    }

    fn visit_super(&mut self, it: &Super) {
        if self.function_depth == 0 && self.result.super_span.is_none() {
            self.result.super_span = Some(it.span);
        }
    }

    fn visit_yield_expression(&mut self, it: &YieldExpression<'a>) {
        if self.function_depth == 0 && it.delegate && self.result.yield_delegate.is_none() {
            self.result.yield_delegate = Some(it.span);
        }
        walk::walk_yield_expression(self, it);
    }

    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        self.function_depth += 1;
        walk::walk_function(self, it, flags);
        self.function_depth -= 1;
    }

    fn visit_class(&mut self, it: &Class<'a>) {
        self.function_depth += 1;
        walk::walk_class(self, it);
        self.function_depth -= 1;
    }
}

/// Finds `await`, `for await` and (inside async generators) `yield` that
/// belong to the function being lowered
struct SuspensionFinder {
    generator: bool,
    found: bool,
}

impl<'a> Visit<'a> for SuspensionFinder {
    fn visit_await_expression(&mut self, _it: &AwaitExpression<'a>) {
        self.found = true;
    }

    fn visit_yield_expression(&mut self, it: &YieldExpression<'a>) {
        if self.generator {
            self.found = true;
        } else {
            walk::walk_yield_expression(self, it);
        }
    }

    fn visit_for_of_statement(&mut self, it: &ForOfStatement<'a>) {
        if it.r#await {
            self.found = true;
            return;
        }
        walk::walk_for_of_statement(self, it);
    }

    fn visit_function(&mut self, _it: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _it: &ArrowFunctionExpression<'a>) {}

    fn visit_class(&mut self, _it: &Class<'a>) {}
}

fn find_suspension(generator: bool, visit: impl FnOnce(&mut SuspensionFinder)) -> bool {
    let mut finder = SuspensionFinder { generator, found: false };
    visit(&mut finder);
    finder.found
}

pub fn expression_suspends(expr: &Expression<'_>, generator: bool) -> bool {
    find_suspension(generator, |finder| finder.visit_expression(expr))
}

pub fn statement_suspends(stmt: &Statement<'_>, generator: bool) -> bool {
    find_suspension(generator, |finder| finder.visit_statement(stmt))
}

pub fn target_suspends(target: &AssignmentTarget<'_>, generator: bool) -> bool {
    find_suspension(generator, |finder| finder.visit_assignment_target(target))
}

pub fn pattern_suspends(pattern: &BindingPattern<'_>, generator: bool) -> bool {
    find_suspension(generator, |finder| finder.visit_binding_pattern(pattern))
}

pub fn property_suspends(property: &ObjectPropertyKind<'_>, generator: bool) -> bool {
    find_suspension(generator, |finder| finder.visit_object_property_kind(property))
}

/// Names bound by a pattern, not looking into default values' functions
pub fn binding_names(pattern: &BindingPattern<'_>) -> Vec<String> {
    struct Collector(Vec<String>);

    impl<'a> Visit<'a> for Collector {
        fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
            let name = it.name.to_string();
            if !self.0.contains(&name) {
                self.0.push(name);
            }
        }

        fn visit_function(&mut self, _it: &Function<'a>, _flags: ScopeFlags) {}

        fn visit_arrow_function_expression(&mut self, _it: &ArrowFunctionExpression<'a>) {}
    }

    let mut collector = Collector(Vec::new());
    collector.visit_binding_pattern(pattern);
    collector.0
}

/// Names bound anywhere below the top level of the program: inside functions,
/// classes, blocks, loop heads and catch clauses. A function moved to the top
/// level must not refer to any of them.
pub fn nested_bindings(program: &Program<'_>) -> HashSet<String> {
    struct Collector {
        names: HashSet<String>,
        depth: usize,
    }

    impl Collector {
        fn nested(&mut self, visit: impl FnOnce(&mut Self)) {
            self.depth += 1;
            visit(self);
            self.depth -= 1;
        }
    }

    impl<'a> Visit<'a> for Collector {
        fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
            if self.depth > 0 {
                self.names.insert(it.name.to_string());
            }
        }

        fn visit_function(&mut self, it: &Function<'a>, _flags: ScopeFlags) {
            if it.is_declaration() {
                if let Some(id) = &it.id {
                    self.visit_binding_identifier(id);
                }
            }
            self.nested(|collector| {
                if let (false, Some(id)) = (it.is_declaration(), &it.id) {
                    collector.visit_binding_identifier(id);
                }
                collector.visit_formal_parameters(&it.params);
                if let Some(body) = &it.body {
                    collector.visit_function_body(body);
                }
            });
        }

        fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
            self.nested(|collector| walk::walk_arrow_function_expression(collector, it));
        }

        fn visit_class(&mut self, it: &Class<'a>) {
            if it.is_declaration() {
                if let Some(id) = &it.id {
                    self.visit_binding_identifier(id);
                }
            }
            self.nested(|collector| {
                if let (false, Some(id)) = (it.is_declaration(), &it.id) {
                    collector.visit_binding_identifier(id);
                }
                if let Some(super_class) = &it.super_class {
                    collector.visit_expression(super_class);
                }
                collector.visit_class_body(&it.body);
            });
        }

        fn visit_block_statement(&mut self, it: &BlockStatement<'a>) {
            self.nested(|collector| walk::walk_block_statement(collector, it));
        }

        fn visit_for_statement(&mut self, it: &ForStatement<'a>) {
            self.nested(|collector| walk::walk_for_statement(collector, it));
        }

        fn visit_for_in_statement(&mut self, it: &ForInStatement<'a>) {
            self.nested(|collector| walk::walk_for_in_statement(collector, it));
        }

        fn visit_for_of_statement(&mut self, it: &ForOfStatement<'a>) {
            self.nested(|collector| walk::walk_for_of_statement(collector, it));
        }

        fn visit_catch_clause(&mut self, it: &CatchClause<'a>) {
            self.nested(|collector| walk::walk_catch_clause(collector, it));
        }

        fn visit_switch_statement(&mut self, it: &SwitchStatement<'a>) {
            self.nested(|collector| walk::walk_switch_statement(collector, it));
        }
    }

    let mut collector = Collector {
        names: HashSet::new(),
        depth: 0,
    };
    collector.visit_program(program);
    collector.names
}

/// Names of the simple, destructured and rest parameters
pub fn parameter_names(params: &FormalParameters<'_>) -> Vec<String> {
    let mut names: Vec<String> = params
        .items
        .iter()
        .flat_map(|param| binding_names(&param.pattern))
        .collect();
    if let Some(rest) = &params.rest {
        names.extend(binding_names(&rest.argument));
    }
    names
}

/// Rebinds `this` and `arguments` of an async body to captured variables so
/// the body can move into plain function expressions
pub struct ContextRenamer<'a> {
    ast: AstBuilder<'a>,
    this_name: Option<String>,
    arguments_name: Option<String>,
}

impl<'a> ContextRenamer<'a> {
    pub fn new(ast: AstBuilder<'a>, this_name: Option<String>, arguments_name: Option<String>) -> Self {
        Self {
            ast,
            this_name,
            arguments_name,
        }
    }

    pub fn rename(&mut self, body: &mut FunctionBody<'a>) {
        self.visit_function_body(body);
    }
}

impl<'a> VisitMut<'a> for ContextRenamer<'a> {
    fn visit_expression(&mut self, it: &mut Expression<'a>) {
        if let (Expression::ThisExpression(this), Some(name)) = (&*it, &self.this_name) {
            let span = this.span();
            *it = self.ast.expression_identifier(span, self.ast.atom(name));
            return;
        }
        walk_mut::walk_expression(self, it);
    }

    fn visit_identifier_reference(&mut self, it: &mut IdentifierReference<'a>) {
        if let Some(name) = &self.arguments_name {
            if it.name == "arguments" {
                it.name = self.ast.atom(name);
            }
        }
    }

    fn visit_function(&mut self, _it: &mut Function<'a>, _flags: ScopeFlags) {}

    fn visit_class(&mut self, _it: &mut Class<'a>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn first_function<'p, 'a>(program: &'p Program<'a>) -> &'p Function<'a> {
        match &program.body[0] {
            Statement::FunctionDeclaration(function) => function,
            _ => panic!("expected a function declaration"),
        }
    }

    #[test]
    fn test_body_scan_ignores_nested_functions() {
        let allocator = Allocator::default();
        let source = "async function f() { this.a; function g() { return arguments; } eval('1'); }";
        let program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let function = first_function(&program);
        let scan = BodyScan::scan(function.body.as_ref().unwrap());
        assert!(scan.uses_this);
        assert!(!scan.uses_arguments);
        assert!(scan.eval.is_some());
    }

    #[test]
    fn test_suspension_in_nested_function_does_not_count() {
        let allocator = Allocator::default();
        let source = "async function f() { g(async () => await x); }";
        let program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let function = first_function(&program);
        let body = function.body.as_ref().unwrap();
        assert!(!statement_suspends(&body.statements[0], false));
    }

    #[test]
    fn test_program_names_are_reserved() {
        let allocator = Allocator::default();
        let source = "const _await = 1; label: for (;;) { break label; }";
        let program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let mut names = NameGenerator::new();
        reserve_program_names(&program, &mut names);
        assert!(names.is_used("_await"));
        assert!(names.is_used("label"));
    }

    #[test]
    fn test_nested_bindings_skip_top_level() {
        let allocator = Allocator::default();
        let source = "const top = 1; function outer(param) { let inner; } { let block; } class Top {}";
        let program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let nested = nested_bindings(&program);
        assert!(nested.contains("param"));
        assert!(nested.contains("inner"));
        assert!(nested.contains("block"));
        assert!(!nested.contains("top"));
        assert!(!nested.contains("outer"));
        assert!(!nested.contains("Top"));
    }

    #[test]
    fn test_assignments_in_any_scope_are_collected() {
        let allocator = Allocator::default();
        let source = "let items = []; let count = 0; function reset() { items = []; } const f = () => { count++; };";
        let program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let assigned = assigned_anywhere(&program);
        assert!(assigned.contains("items"));
        assert!(assigned.contains("count"));
        assert!(!assigned.contains("f"));
    }

    #[test]
    fn test_captured_and_reassigned_loop_binding() {
        let allocator = Allocator::default();
        let source = "{ fns.push(() => i); j = i; i += 2; }";
        let program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let names = vec!["i".to_string(), "j".to_string()];
        assert_eq!(captured_and_reassigned(&names, &program.body[0]), vec!["i".to_string()]);
    }

    #[test]
    fn test_parameter_names_include_patterns_and_rest() {
        let allocator = Allocator::default();
        let source = "async function f(a, { b, c: [d] }, ...rest) {}";
        let program = Parser::new(&allocator, source, SourceType::mjs()).parse().program;
        let function = first_function(&program);
        assert_eq!(parameter_names(&function.params), vec!["a", "b", "d", "rest"]);
    }
}
