//! Owned tree for async function bodies
//!
//! Async function bodies are lowered from the oxc arena into this closed sum
//! type before rewriting. Only the nodes the rewriter has to inspect are
//! modeled; everything else is parked in an opaque side table and referenced
//! by [`OpaqueId`].

pub mod names;
pub mod opaque;
pub mod visit;

pub use names::NameGenerator;
pub use opaque::{InfoTable, OpaqueId, OpaqueInfo, OpaqueKind};
pub use oxc_syntax::operator::{
    AssignmentOperator, BinaryOperator, LogicalOperator, UnaryOperator,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    This,
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    /// `void 0`
    Undefined,
    Opaque(OpaqueId),
    Function(Box<Function>),
    Unary(UnaryOperator, Box<Expr>),
    Binary(BinaryOperator, Box<Expr>, Box<Expr>),
    Logical(LogicalOperator, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(AssignmentOperator, Box<Target>, Box<Expr>),
    Call(Box<Expr>, Vec<Arg>),
    New(Box<Expr>, Vec<Arg>),
    Member(Box<Expr>, MemberProp),
    Sequence(Vec<Expr>),
    Array(Vec<ArrayItem>),
    Object(Vec<ObjectEntry>),
    Await(Box<Expr>),
    /// `yield` inside an async generator; delegation is rejected during lowering
    Yield(Option<Box<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Expr(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    Expr(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEntry {
    Property { key: PropertyKey, value: Expr },
    Spread(Expr),
    /// Methods, getters and setters
    Opaque(OpaqueId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Static(String),
    Computed(Expr),
    Opaque(OpaqueId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Ident(String),
    Member(Expr, MemberProp),
    /// Destructuring targets
    Opaque(OpaqueId),
}

/// Synthesized function: continuations, thunks and loop bodies
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Function {
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

impl Function {
    pub fn new(params: Vec<String>, body: Vec<Stmt>) -> Self {
        Self { params, body }
    }

    pub fn thunk(body: Vec<Stmt>) -> Self {
        Self::new(Vec::new(), body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Ident(String),
    Pattern { id: OpaqueId, names: Vec<String> },
}

impl Binding {
    /// Names introduced by this binding
    pub fn names(&self) -> Vec<String> {
        match self {
            Binding::Ident(name) => vec![name.clone()],
            Binding::Pattern { names, .. } => names.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub binding: Binding,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarators: Vec<Declarator>,
}

impl VarDecl {
    pub fn single(kind: VarKind, binding: Binding, init: Option<Expr>) -> Self {
        Self {
            kind,
            declarators: vec![Declarator { binding, init }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

/// Left side of `for-in` / `for-of`
#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    Var(VarKind, Binding),
    Target(Target),
}

/// How a `return` leaves the function it appears in
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Exit {
    /// Written in the input program
    #[default]
    Source,
    /// A jump that crossed a synthesized function after setting this flag
    Flagged(String),
    /// A `continue` or labeled `break` that only ends the current synthesized function
    Local,
}

/// Shape `for (let i = 0; i < arr.length; i++)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedLoop {
    pub index: String,
    pub array: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Binding>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Var(VarDecl),
    Return {
        value: Option<Expr>,
        exit: Exit,
    },
    Throw(Expr),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    Block(Vec<Stmt>),
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        indexed: Option<IndexedLoop>,
    },
    ForIn {
        left: ForHead,
        right: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        left: ForHead,
        right: Expr,
        body: Box<Stmt>,
        is_await: bool,
    },
    While(Expr, Box<Stmt>),
    DoWhile(Box<Stmt>, Expr),
    Labeled(String, Box<Stmt>),
    Break(Option<String>),
    Continue(Option<String>),
    Switch(Expr, Vec<SwitchCase>),
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    FunctionDecl {
        name: String,
        id: OpaqueId,
    },
    Opaque(OpaqueId),
    Empty,
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call(Box::new(callee), args.into_iter().map(Arg::Expr).collect())
    }

    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member(Box::new(object), MemberProp::Static(property.into()))
    }

    pub fn function(function: Function) -> Self {
        Expr::Function(Box::new(function))
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Unary(UnaryOperator::LogicalNot, Box::new(expr))
    }

    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Expr::Assign(
            AssignmentOperator::Assign,
            Box::new(Target::Ident(name.into())),
            Box::new(value),
        )
    }

    /// `a || b || c`, or `None` for an empty list
    pub fn any_of(mut exprs: Vec<Expr>) -> Option<Expr> {
        if exprs.is_empty() {
            return None;
        }
        let first = exprs.remove(0);
        Some(exprs.into_iter().fold(first, |acc, next| {
            Expr::Logical(LogicalOperator::Or, Box::new(acc), Box::new(next))
        }))
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }
}

impl Stmt {
    pub fn ret(value: Option<Expr>) -> Self {
        Stmt::Return {
            value,
            exit: Exit::Source,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    /// `var name = init;`
    pub fn var(name: impl Into<String>, init: Option<Expr>) -> Self {
        Stmt::Var(VarDecl::single(VarKind::Var, Binding::Ident(name.into()), init))
    }

    /// `var a, b;`
    pub fn declare(names: impl IntoIterator<Item = String>) -> Option<Self> {
        let declarators: Vec<Declarator> = names
            .into_iter()
            .map(|name| Declarator {
                binding: Binding::Ident(name),
                init: None,
            })
            .collect();
        if declarators.is_empty() {
            None
        } else {
            Some(Stmt::Var(VarDecl {
                kind: VarKind::Var,
                declarators,
            }))
        }
    }

    /// Statements of a block, or the statement itself
    pub fn into_list(self) -> Vec<Stmt> {
        match self {
            Stmt::Block(stmts) => stmts,
            Stmt::Empty => Vec::new(),
            other => vec![other],
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            Stmt::For { .. } | Stmt::ForIn { .. } | Stmt::ForOf { .. } | Stmt::While(..) | Stmt::DoWhile(..)
        )
    }

    /// Whether a block of this statement declares block-scoped names
    pub fn has_lexical_declaration(stmts: &[Stmt]) -> bool {
        stmts.iter().any(|stmt| match stmt {
            Stmt::Var(decl) => decl.kind != VarKind::Var,
            Stmt::FunctionDecl { .. } | Stmt::Opaque(_) => true,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_of_folds_left() {
        let expr = Expr::any_of(vec![Expr::ident("a"), Expr::ident("b"), Expr::ident("c")]).unwrap();
        match expr {
            Expr::Logical(LogicalOperator::Or, left, right) => {
                assert_eq!(*right, Expr::ident("c"));
                assert!(matches!(*left, Expr::Logical(LogicalOperator::Or, _, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Expr::any_of(Vec::new()).is_none());
    }

    #[test]
    fn test_declare_skips_empty() {
        assert!(Stmt::declare(Vec::new()).is_none());
        let stmt = Stmt::declare(vec!["a".to_string(), "b".to_string()]).unwrap();
        match stmt {
            Stmt::Var(decl) => assert_eq!(decl.declarators.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_into_list_flattens_blocks() {
        let block = Stmt::Block(vec![Stmt::Empty, Stmt::Break(None)]);
        assert_eq!(block.into_list().len(), 2);
        assert!(Stmt::Empty.into_list().is_empty());
    }
}
