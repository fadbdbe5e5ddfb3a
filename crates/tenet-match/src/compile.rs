use tenet_ast::rules::{Pattern, PatternKind, WILDCARD};
use tenet_ast::{Entity, NodeTag, Span};
use tenet_diag::{Category, Diagnostic};
use tenet_types::{EntityType, ParamType};

use crate::{Fragment, Lookup, VariableScope, span_location};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("{message}")]
    Unsupported { message: String, span: Span },
    #[error("a {tag} pattern takes {expected} parts, found {found}")]
    Arity {
        tag: &'static str,
        expected: usize,
        found: usize,
        span: Span,
    },
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::Unsupported { span, .. } | CompileError::Arity { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let category = match self {
            CompileError::Unsupported { .. } => Category::UnsupportedPattern,
            CompileError::Arity { .. } => Category::ArityMismatch,
        };
        Diagnostic::error(category, self.to_string()).at_opt(span_location(self.span()))
    }
}

/// Compiles rule patterns against a variable scope.
pub struct FragmentCompiler<'a> {
    scope: &'a dyn VariableScope,
}

impl<'a> FragmentCompiler<'a> {
    pub fn new(scope: &'a dyn VariableScope) -> Self {
        Self { scope }
    }

    pub fn compile(&self, pattern: &Pattern) -> Result<Fragment, CompileError> {
        match &pattern.node {
            PatternKind::Var(name) => Ok(self.variable(name)),
            PatternKind::Resolved(entity) => Ok(Fragment::Resolved(entity.clone())),
            PatternKind::Empty => Ok(Fragment::Empty),
            PatternKind::List(items) => Ok(Fragment::Ordered(self.compile_all(items)?)),
            PatternKind::Unordered(items) => self.unordered(items, pattern.span),
            PatternKind::AccessSlot(_) => Err(CompileError::Unsupported {
                message: "an access slot may only appear in a modifier set".to_string(),
                span: pattern.span,
            }),
            PatternKind::Node { tag, slots } => self.node(*tag, slots, pattern.span),
        }
    }

    fn compile_all(&self, items: &[Pattern]) -> Result<Vec<Fragment>, CompileError> {
        items.iter().map(|item| self.compile(item)).collect()
    }

    fn variable(&self, name: &str) -> Fragment {
        if name == WILDCARD {
            return Fragment::Wildcard;
        }
        match self.scope.lookup(name) {
            Lookup::Bound(entity) => Fragment::Resolved(entity),
            Lookup::Free(ty) => Fragment::var(name, ty),
            Lookup::Unknown => Fragment::var(name, ParamType::any()),
        }
    }

    fn node(&self, tag: NodeTag, slots: &[Pattern], span: Span) -> Result<Fragment, CompileError> {
        if slots.len() != tag.slot_count() {
            return Err(CompileError::Arity {
                tag: tag.as_str(),
                expected: tag.slot_count(),
                found: slots.len(),
                span,
            });
        }
        match tag {
            NodeTag::FieldAccess => self.field_access(slots, false),
            NodeTag::Assign => match &slots[0].node {
                PatternKind::Node {
                    tag: NodeTag::FieldAccess,
                    slots: target,
                } if target.len() == NodeTag::FieldAccess.slot_count() => {
                    Ok(Fragment::FieldAssign {
                        target: Box::new(self.field_access(target, true)?),
                        value: Box::new(self.compile(&slots[1])?),
                    })
                }
                _ => Ok(Fragment::Structure {
                    tag,
                    slots: self.compile_all(slots)?,
                }),
            },
            _ => Ok(Fragment::Structure {
                tag,
                slots: self.compile_all(slots)?,
            }),
        }
    }

    fn field_access(&self, slots: &[Pattern], as_lhs: bool) -> Result<Fragment, CompileError> {
        Ok(Fragment::FieldAccess {
            receiver: Box::new(self.compile(&slots[0])?),
            field: Box::new(self.compile(&slots[1])?),
            as_lhs,
        })
    }

    fn unordered(&self, items: &[Pattern], span: Span) -> Result<Fragment, CompileError> {
        let mut access: Option<Box<Fragment>> = None;
        let mut fixed = Vec::new();
        let mut rest: Option<Box<Fragment>> = None;

        for item in items {
            let fragment = match &item.node {
                PatternKind::AccessSlot(Some(name)) if name != WILDCARD => {
                    match self.scope.lookup(name) {
                        Lookup::Bound(entity) => Fragment::Resolved(entity),
                        Lookup::Free(_) | Lookup::Unknown => Fragment::var(
                            name.clone(),
                            ParamType::Category(EntityType::AccessSpecifier),
                        ),
                    }
                }
                PatternKind::AccessSlot(_) => Fragment::Wildcard,
                _ => self.compile(item)?,
            };
            let is_access = matches!(item.node, PatternKind::AccessSlot(_))
                || is_access_fragment(&fragment);
            if is_access {
                if access.is_some() {
                    return Err(CompileError::Unsupported {
                        message: "a modifier set can constrain the access specifier only once"
                            .to_string(),
                        span: item.span,
                    });
                }
                access = Some(Box::new(fragment));
            } else if matches!(fragment, Fragment::Var { .. } | Fragment::Wildcard) {
                if rest.is_some() {
                    return Err(CompileError::Unsupported {
                        message: "a modifier set may contain at most one variable besides \
                                  its access specifier"
                            .to_string(),
                        span,
                    });
                }
                rest = Some(Box::new(fragment));
            } else {
                fixed.push(fragment);
            }
        }

        Ok(Fragment::Unordered {
            access,
            fixed,
            rest,
        })
    }
}

fn is_access_fragment(fragment: &Fragment) -> bool {
    match fragment {
        Fragment::Resolved(Entity::Modifier(modifier)) => modifier.is_access(),
        Fragment::Var {
            ty: ParamType::Category(EntityType::AccessSpecifier),
            ..
        } => true,
        _ => false,
    }
}
