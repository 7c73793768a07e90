//! Whole-file transform
//!
//! Parses a module, lowers every async function with [`AsyncLowering`],
//! splices the referenced helpers (inline or imported) and any hoisted
//! continuations in after the leading imports, and prints the result.

use log::{debug, info};
use oxc_allocator::{Allocator, Vec as ArenaVec};
use oxc_ast::ast::{Program, Statement};
use oxc_ast::AstBuilder;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::Serialize;

use crate::ast::scan::{assigned_anywhere, nested_bindings, reserve_program_names};
use crate::ast::{AsyncLowering, FunctionReport};
use crate::error::{Error, Result};
use crate::helpers::HelperTable;
use crate::ir::NameGenerator;
use crate::options::TransformOptions;

/// Printed module plus what the transform did to it
#[derive(Debug, Clone, Serialize)]
pub struct TransformOutput {
    pub code: String,
    /// Canonical names of the helpers the output uses, in dependency order
    pub helpers: Vec<&'static str>,
    pub functions: Vec<FunctionReport>,
}

/// Lowers async functions in JavaScript modules
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    options: TransformOptions,
}

impl Transformer {
    pub fn new(options: TransformOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Transform one module
    pub fn transform(&self, source: &str) -> Result<TransformOutput> {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut program = parse(&allocator, source)?;

        let mut names = NameGenerator::new();
        reserve_program_names(&program, &mut names);
        HelperTable::reserve_names(&mut names);
        let nested = nested_bindings(&program);
        let reassigned = assigned_anywhere(&program);

        let mut helpers = HelperTable::new();
        let output = AsyncLowering::new(ast, source, &self.options, &mut names, &mut helpers, nested, reassigned)
            .run(&mut program)?;
        info!(
            "lowered {} async functions using {} helpers",
            output.reports.len(),
            helpers.used().len()
        );

        let mut prelude = ast.vec();
        if !helpers.is_empty() {
            let text = if self.options.external_helpers {
                helpers.render_import(&self.options.helper_module)
            } else {
                helpers.render_inline()
            };
            let text = allocator.alloc_str(&text);
            let helper_program = parse(&allocator, text)
                .map_err(|error| Error::invariant(format!("helper source does not parse: {}", error)))?;
            prelude.extend(helper_program.body);
        }
        prelude.extend(output.hoisted);
        splice_prelude(&mut program, prelude, ast);

        let code = Codegen::new()
            .with_options(CodegenOptions {
                minify: self.options.minify,
                ..CodegenOptions::default()
            })
            .build(&program)
            .code;

        Ok(TransformOutput {
            code,
            helpers: helpers.used(),
            functions: output.reports,
        })
    }
}

fn parse<'a>(allocator: &'a Allocator, source: &'a str) -> Result<Program<'a>> {
    let parsed = Parser::new(allocator, source, SourceType::mjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .map(|error| error.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::Parse {
            message: if message.is_empty() {
                "parser gave up".to_string()
            } else {
                message
            },
        });
    }
    Ok(parsed.program)
}

/// Insert `prelude` after the module's leading imports
fn splice_prelude<'a>(program: &mut Program<'a>, prelude: ArenaVec<'a, Statement<'a>>, ast: AstBuilder<'a>) {
    if prelude.is_empty() {
        return;
    }
    let position = program
        .body
        .iter()
        .take_while(|stmt| matches!(stmt, Statement::ImportDeclaration(_)))
        .count();
    debug!("inserting {} top-level statements at {}", prelude.len(), position);
    let body = std::mem::replace(&mut program.body, ast.vec());
    let mut spliced = ast.vec_with_capacity(body.len() + prelude.len());
    let mut body = body.into_iter();
    spliced.extend(body.by_ref().take(position));
    spliced.extend(prelude);
    spliced.extend(body);
    program.body = spliced;
}

/// Transform `source` with `options`
pub fn transform(source: &str, options: &TransformOptions) -> Result<TransformOutput> {
    Transformer::new(options.clone()).transform(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_without_async_is_reprinted() {
        let output = transform("const a = 1;\nfunction f() { return a; }\n", &TransformOptions::default()).unwrap();
        assert!(output.helpers.is_empty());
        assert!(output.functions.is_empty());
        assert!(output.code.contains("function f()"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let error = transform("async function (", &TransformOptions::default()).unwrap_err();
        assert!(matches!(error, Error::Parse { .. }));
    }

    #[test]
    fn test_helpers_follow_imports() {
        let source = "import { x } from \"x\";\nexport async function f() { await x; }\n";
        let output = transform(source, &TransformOptions::default()).unwrap();
        let import = output.code.find("import").unwrap();
        let helper = output.code.find("function _await(").unwrap();
        let exported = output.code.find("export function f").unwrap();
        assert!(import < helper && helper < exported, "{}", output.code);
    }
}
