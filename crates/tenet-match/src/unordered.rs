//! Matching of modifier sets, where order carries no meaning.

use tenet_ast::Entity;
use tenet_diag::InternalError;
use tenet_types::BindingMap;

use crate::matching::COMPONENT;
use crate::{Fragment, MatchEnv};

pub(crate) fn match_unordered(
    access: Option<&Fragment>,
    fixed: &[Fragment],
    rest: Option<&Fragment>,
    entity: &Entity,
    env: &MatchEnv<'_>,
) -> Result<Option<BindingMap>, InternalError> {
    let items: &[Entity] = match entity {
        Entity::List(items) => items,
        Entity::Empty => &[],
        _ => return Ok(None),
    };

    // The access specifier comes out before anything else is paired.
    let (specifiers, remaining): (Vec<&Entity>, Vec<&Entity>) = items
        .iter()
        .partition(|item| matches!(item, Entity::Modifier(m) if m.is_access()));
    if specifiers.len() > 1 {
        return Ok(None);
    }
    let mut merged = BindingMap::with_result(entity.clone());
    if let Some(access) = access {
        let specifier = specifiers.first().copied().cloned().unwrap_or(Entity::Empty);
        // Package access: an access variable binds to nothing.
        let bound = match (access, &specifier) {
            (Fragment::Var { name, .. }, Entity::Empty) => {
                let mut map = BindingMap::new();
                map.bind(name, Entity::Empty);
                Some(map)
            }
            _ => access.match_entity(&specifier, env)?,
        };
        let Some(bound) = bound else {
            return Ok(None);
        };
        match merged.unify_merge(&bound.without_result()) {
            Some(next) => merged = next,
            None => return Ok(None),
        }
    }

    let mut used = vec![false; remaining.len()];
    pair(fixed, &remaining, &mut used, merged, rest, env)
}

/// Assign each fixed fragment to a distinct unused item, backtracking on
/// failure, then hand the leftovers to `rest`.
fn pair(
    fixed: &[Fragment],
    items: &[&Entity],
    used: &mut [bool],
    acc: BindingMap,
    rest: Option<&Fragment>,
    env: &MatchEnv<'_>,
) -> Result<Option<BindingMap>, InternalError> {
    let Some((first, others)) = fixed.split_first() else {
        let leftovers: Vec<&Entity> = items
            .iter()
            .zip(used.iter())
            .filter(|(_, used)| !**used)
            .map(|(item, _)| *item)
            .collect();
        return bind_rest(rest, &leftovers, acc, env);
    };
    for idx in 0..items.len() {
        if used[idx] {
            continue;
        }
        let Some(bound) = first.match_entity(items[idx], env)? else {
            continue;
        };
        let Some(next) = acc.unify_merge(&bound.without_result()) else {
            continue;
        };
        used[idx] = true;
        let found = pair(others, items, used, next, rest, env)?;
        used[idx] = false;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn bind_rest(
    rest: Option<&Fragment>,
    leftovers: &[&Entity],
    mut acc: BindingMap,
    env: &MatchEnv<'_>,
) -> Result<Option<BindingMap>, InternalError> {
    match rest {
        None => Ok(leftovers.is_empty().then_some(acc)),
        Some(Fragment::Wildcard) => Ok(Some(acc)),
        Some(Fragment::Var { name, .. }) if leftovers.is_empty() => {
            Ok(acc.bind(name, Entity::Empty).then_some(acc))
        }
        Some(var @ Fragment::Var { .. }) => match leftovers {
            [single] => {
                let Some(bound) = var.match_entity(single, env)? else {
                    return Ok(None);
                };
                Ok(acc.unify_merge(&bound.without_result()))
            }
            _ => Ok(None),
        },
        Some(other) => Err(InternalError::new(
            COMPONENT,
            format!("modifier set remainder must be a variable, found `{other}`"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use tenet_ast::Modifier;
    use tenet_ast::rules::build;
    use tenet_types::IntrinsicTypes;

    use crate::{EmptyScope, FragmentCompiler, NoContext};

    use super::*;

    fn modifiers(items: &[Modifier]) -> Entity {
        Entity::List(items.iter().copied().map(Entity::Modifier).collect())
    }

    fn matches(pattern: Vec<tenet_ast::rules::Pattern>, entity: &Entity) -> Option<BindingMap> {
        let fragment = FragmentCompiler::new(&EmptyScope)
            .compile(&build::unordered(pattern))
            .unwrap();
        fragment
            .match_entity(entity, &MatchEnv::new(&NoContext, &IntrinsicTypes))
            .unwrap()
    }

    #[test]
    fn access_specifier_is_extracted_first() {
        for order in [
            [Modifier::Public, Modifier::Static],
            [Modifier::Static, Modifier::Public],
        ] {
            let map = matches(
                vec![build::access(Some("access")), build::var("m")],
                &modifiers(&order),
            )
            .unwrap();
            assert_eq!(
                map.lookup_entity("access"),
                Some(&Entity::Modifier(Modifier::Public))
            );
            assert_eq!(map.lookup_entity("m"), Some(&Entity::Modifier(Modifier::Static)));
        }
    }

    #[test]
    fn package_access_binds_empty() {
        let map = matches(
            vec![build::access(Some("access")), build::modifier(Modifier::Final)],
            &modifiers(&[Modifier::Final]),
        )
        .unwrap();
        assert_eq!(map.lookup_entity("access"), Some(&Entity::Empty));
    }

    #[test]
    fn fixed_modifiers_pair_in_any_order() {
        let pattern = || {
            vec![
                build::modifier(Modifier::Final),
                build::modifier(Modifier::Static),
            ]
        };
        assert!(matches(pattern(), &modifiers(&[Modifier::Static, Modifier::Final])).is_some());
        assert!(matches(pattern(), &modifiers(&[Modifier::Final])).is_none());
        assert!(matches(
            pattern(),
            &modifiers(&[Modifier::Static, Modifier::Final, Modifier::Volatile])
        )
        .is_none());
    }

    #[test]
    fn remainder_variable_takes_at_most_one_item() {
        let with_rest = || vec![build::modifier(Modifier::Static), build::var("m")];
        let none = matches(with_rest(), &modifiers(&[Modifier::Static])).unwrap();
        assert_eq!(none.lookup_entity("m"), Some(&Entity::Empty));
        assert!(matches(
            with_rest(),
            &modifiers(&[Modifier::Static, Modifier::Final, Modifier::Transient])
        )
        .is_none());
        let wildcard = matches(
            vec![build::wildcard()],
            &modifiers(&[Modifier::Final, Modifier::Transient]),
        );
        assert!(wildcard.is_some());
    }

    #[test]
    fn unconstrained_access_is_ignored() {
        let map = matches(
            vec![build::modifier(Modifier::Static)],
            &modifiers(&[Modifier::Private, Modifier::Static]),
        );
        assert!(map.is_some());
    }

    #[test]
    fn two_access_specifiers_never_match() {
        assert!(matches(
            vec![build::wildcard()],
            &modifiers(&[Modifier::Public, Modifier::Private])
        )
        .is_none());
    }
}
