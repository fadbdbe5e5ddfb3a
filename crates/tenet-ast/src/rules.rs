//! Abstract syntax of the rule language.
//!
//! A [`RuleModule`] holds option interfaces and options. Each declares traits
//! (named relations over program entities) and statements that realize them
//! from a constraint expression. Patterns inside expressions describe program
//! syntax with free variables.
//!
//! The concrete grammar lives outside this workspace; the [`build`] module
//! offers constructors with synthetic spans for programmatic rule sets.

use crate::{Entity, NodeTag, Span, Spanned, TypeDesc};

/// The reserved variable name that matches anything and binds nothing.
pub const WILDCARD: &str = "_";

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

pub type Pattern = Spanned<PatternKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// A variable: free, wildcard, or bound in the enclosing scope.
    Var(String),
    /// An already-resolved entity (a literal, a named type, an identifier).
    Resolved(Entity),
    /// Partial structure: a node of a given kind with one pattern per slot.
    Node { tag: NodeTag, slots: Vec<Pattern> },
    /// A child list matched element-wise in order.
    List(Vec<Pattern>),
    /// A child list matched without regard to order (modifier sets).
    Unordered(Vec<Pattern>),
    /// The access-specifier position of an unordered modifier set. Binds the
    /// named variable to the access modifier, or to nothing for package access.
    AccessSlot(Option<String>),
    /// An absent optional child.
    Empty,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

pub type Expr = Spanned<ExprKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    True,
    False,
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),
    Exists {
        binders: Vec<Binder>,
        body: Box<Expr>,
    },
    /// For every solution of `range`, `body` holds.
    Forall {
        binders: Vec<Binder>,
        range: Box<Expr>,
        body: Box<Expr>,
    },
    /// Membership in a trait: `name(args...)`.
    Trait {
        name: String,
        args: Vec<Term>,
    },
    /// `subject matches pattern`.
    Matches {
        subject: Term,
        pattern: Pattern,
    },
    Eq(Term, Term),
    Ne(Term, Term),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(String),
    Entity(Entity),
    Pattern(Pattern),
    Apply { func: Builtin, args: Vec<Term> },
}

/// Functions over program entities supplied by the fact supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Static type of an expression or declared type of a declaration.
    TypeOf,
    /// Declaration node of a type, when it is part of the program.
    DeclarationOf,
    /// Declared name of a declaration.
    NameOf,
    /// Signature descriptor of a method.
    SignatureOf,
    /// Type declaring a member.
    DeclaringType,
}

impl Builtin {
    pub fn as_str(self) -> &'static str {
        match self {
            Builtin::TypeOf => "typeOf",
            Builtin::DeclarationOf => "declarationOf",
            Builtin::NameOf => "nameOf",
            Builtin::SignatureOf => "signatureOf",
            Builtin::DeclaringType => "declaringType",
        }
    }
}

/// A quantified variable with its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Binder {
    pub name: String,
    pub ty: TypeExpr,
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A type as written in a parameter or binder declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A syntactic category by name (`expr`, `field`, `modifiers`, ...).
    Category(String),
    /// A program type (`String`, `int`, `java.util.List`).
    Program(TypeDesc),
    /// A relation-valued parameter with its own formal parameters.
    Relation(Vec<ParamDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: Spanned<String>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraitModifiers {
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_builtin: bool,
    pub is_singleton: bool,
    pub is_local: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDecl {
    pub name: Spanned<String>,
    pub params: Vec<ParamDecl>,
    pub modifiers: TraitModifiers,
    pub requires: Vec<Require>,
    pub span: Span,
}

/// A guard clause with the message shown when it does not hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Require {
    pub expr: Expr,
    pub message: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Realize traits from program facts.
    Realize,
    /// Static definition, evaluated once at interface level.
    Define,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub realizes: Vec<Spanned<String>>,
    pub body: Expr,
    pub requires: Vec<Require>,
    /// Message used when a realized singleton has no unique solution.
    pub message: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: Spanned<String>,
    pub params: Vec<ParamDecl>,
    pub traits: Vec<TraitDecl>,
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub name: Spanned<String>,
    pub interface: Spanned<String>,
    pub params: Vec<ParamDecl>,
    pub traits: Vec<TraitDecl>,
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleModule {
    pub interfaces: Vec<InterfaceDecl>,
    pub options: Vec<OptionDecl>,
}

impl RuleModule {
    pub fn find_interface(&self, name: &str) -> Option<&InterfaceDecl> {
        self.interfaces.iter().find(|decl| decl.name.node == name)
    }

    pub fn find_option(&self, name: &str) -> Option<&OptionDecl> {
        self.options.iter().find(|decl| decl.name.node == name)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Constructors with synthetic spans.
pub mod build {
    use super::*;
    use crate::{Literal, Modifier};

    pub fn var(name: &str) -> Pattern {
        Spanned::synthetic(PatternKind::Var(name.to_string()))
    }

    pub fn wildcard() -> Pattern {
        var(WILDCARD)
    }

    pub fn resolved(entity: impl Into<Entity>) -> Pattern {
        Spanned::synthetic(PatternKind::Resolved(entity.into()))
    }

    pub fn ident(name: &str) -> Pattern {
        resolved(Entity::name(name))
    }

    pub fn ty(name: &str) -> Pattern {
        resolved(TypeDesc::named(name))
    }

    pub fn modifier(modifier: Modifier) -> Pattern {
        resolved(modifier)
    }

    pub fn node(tag: NodeTag, slots: Vec<Pattern>) -> Pattern {
        Spanned::synthetic(PatternKind::Node { tag, slots })
    }

    pub fn list(items: Vec<Pattern>) -> Pattern {
        Spanned::synthetic(PatternKind::List(items))
    }

    pub fn unordered(items: Vec<Pattern>) -> Pattern {
        Spanned::synthetic(PatternKind::Unordered(items))
    }

    pub fn access(name: Option<&str>) -> Pattern {
        Spanned::synthetic(PatternKind::AccessSlot(name.map(str::to_string)))
    }

    pub fn empty() -> Pattern {
        Spanned::synthetic(PatternKind::Empty)
    }

    /// A string literal expression pattern.
    pub fn lit_str(value: &str) -> Pattern {
        node(
            NodeTag::Literal,
            vec![resolved(Literal::Str(value.to_string()))],
        )
    }

    /// `modifiers annotations type name = init;` with an ordered annotation list.
    pub fn field(
        modifiers: Pattern,
        annotations: Pattern,
        ty: Pattern,
        name: Pattern,
        init: Pattern,
    ) -> Pattern {
        node(NodeTag::Field, vec![modifiers, annotations, ty, name, init])
    }

    pub fn expr(kind: ExprKind) -> Expr {
        Spanned::synthetic(kind)
    }

    pub fn and(items: Vec<Expr>) -> Expr {
        expr(ExprKind::And(items))
    }

    pub fn or(items: Vec<Expr>) -> Expr {
        expr(ExprKind::Or(items))
    }

    pub fn not(inner: Expr) -> Expr {
        expr(ExprKind::Not(Box::new(inner)))
    }

    pub fn iff(left: Expr, right: Expr) -> Expr {
        expr(ExprKind::Iff(Box::new(left), Box::new(right)))
    }

    pub fn implies(left: Expr, right: Expr) -> Expr {
        expr(ExprKind::Implies(Box::new(left), Box::new(right)))
    }

    pub fn exists(binders: Vec<Binder>, body: Expr) -> Expr {
        expr(ExprKind::Exists {
            binders,
            body: Box::new(body),
        })
    }

    pub fn forall(binders: Vec<Binder>, range: Expr, body: Expr) -> Expr {
        expr(ExprKind::Forall {
            binders,
            range: Box::new(range),
            body: Box::new(body),
        })
    }

    pub fn trait_app(name: &str, args: Vec<Term>) -> Expr {
        expr(ExprKind::Trait {
            name: name.to_string(),
            args,
        })
    }

    pub fn matches(subject: Term, pattern: Pattern) -> Expr {
        expr(ExprKind::Matches { subject, pattern })
    }

    pub fn eq(left: Term, right: Term) -> Expr {
        expr(ExprKind::Eq(left, right))
    }

    pub fn ne(left: Term, right: Term) -> Expr {
        expr(ExprKind::Ne(left, right))
    }

    pub fn tvar(name: &str) -> Term {
        Term::Var(name.to_string())
    }

    pub fn apply(func: Builtin, args: Vec<Term>) -> Term {
        Term::Apply { func, args }
    }

    pub fn binder(name: &str, category: &str) -> Binder {
        Binder {
            name: name.to_string(),
            ty: TypeExpr::Category(category.to_string()),
        }
    }

    pub fn param(name: &str, ty: TypeExpr) -> ParamDecl {
        ParamDecl {
            name: Spanned::synthetic(name.to_string()),
            ty,
        }
    }

    pub fn category(name: &str) -> TypeExpr {
        TypeExpr::Category(name.to_string())
    }

    pub fn program_type(name: &str) -> TypeExpr {
        TypeExpr::Program(TypeDesc::named(name))
    }

    pub fn trait_decl(name: &str, params: Vec<ParamDecl>, modifiers: TraitModifiers) -> TraitDecl {
        TraitDecl {
            name: Spanned::synthetic(name.to_string()),
            params,
            modifiers,
            requires: Vec::new(),
            span: Span::synthetic(),
        }
    }

    pub fn realize(realizes: &[&str], body: Expr) -> Statement {
        Statement {
            kind: StatementKind::Realize,
            realizes: realizes
                .iter()
                .map(|name| Spanned::synthetic(name.to_string()))
                .collect(),
            body,
            requires: Vec::new(),
            message: None,
            span: Span::synthetic(),
        }
    }

    pub fn define(realizes: &[&str], body: Expr) -> Statement {
        Statement {
            kind: StatementKind::Define,
            ..realize(realizes, body)
        }
    }

    pub fn require(expr: Expr, message: Option<&str>) -> Require {
        Require {
            expr,
            message: message.map(str::to_string),
            span: Span::synthetic(),
        }
    }

    pub fn singleton() -> TraitModifiers {
        TraitModifiers {
            is_singleton: true,
            ..TraitModifiers::default()
        }
    }

    pub fn abstract_() -> TraitModifiers {
        TraitModifiers {
            is_abstract: true,
            ..TraitModifiers::default()
        }
    }

    pub fn local() -> TraitModifiers {
        TraitModifiers {
            is_local: true,
            ..TraitModifiers::default()
        }
    }

    pub fn static_() -> TraitModifiers {
        TraitModifiers {
            is_static: true,
            ..TraitModifiers::default()
        }
    }

    pub fn plain() -> TraitModifiers {
        TraitModifiers::default()
    }
}
