//! Type-directed lookup of constructors and methods.
//!
//! Resolution runs in two passes over the members of one class:
//!
//! 1. **Exact**: arity matches and every parameter [`types_match`] the
//!    argument's runtime type (boxed and primitive forms are equivalent, a
//!    `double` parameter takes any integral or `float` argument, null fits any
//!    reference parameter). The first member in declaration order wins.
//! 2. **Loose**: arity matches and every parameter is assignable from the
//!    argument, or the argument type from the parameter. Among several
//!    candidates the one with the most exactly matching positions wins; ties
//!    go to declaration order and are logged as ambiguous.
//!
//! Results are cached per session, so the same class, member name and
//! argument-type tuple always resolve to the same member.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::ResolutionError;
use crate::obs;
use crate::universe::{ClassHandle, Signature, TypeUniverse};
use crate::value::{JType, Origin, Prim, Value};

/// What is being looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Constructor,
    Method(String),
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Constructor => f.write_str("constructor"),
            MemberKind::Method(name) => write!(f, "method {}", name),
        }
    }
}

/// Which pass produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    Exact,
    Loose,
}

/// A resolved constructor or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Index into the class's constructor or method list.
    pub index: usize,
    pub signature: Signature,
    pub pass: MatchPass,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResolutionKey {
    origin: Origin,
    class_name: String,
    kind: MemberKind,
    arg_types: Vec<Option<JType>>,
}

/// Runtime type of one argument and everything it is assignable to.
struct ArgType {
    ty: Option<JType>,
    ancestors: Vec<String>,
}

impl ArgType {
    fn of(universe: &dyn TypeUniverse, value: &Value) -> Self {
        let ty = value.runtime_type();
        let mut ancestors = ty
            .as_ref()
            .map(|t| ancestors_of(universe, t))
            .unwrap_or_default();
        if let Some(obj) = value.as_object() {
            for name in obj.ancestors() {
                if !ancestors.contains(&name) {
                    ancestors.push(name);
                }
            }
        }
        Self { ty, ancestors }
    }
}

/// Session-scoped resolver with a deterministic result cache.
#[derive(Debug, Default)]
pub struct ArgumentResolver {
    cache: Mutex<HashMap<ResolutionKey, Member>>,
}

impl ArgumentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_constructor(
        &self,
        universe: &dyn TypeUniverse,
        class: &dyn ClassHandle,
        args: &[Value],
    ) -> Result<Member, ResolutionError> {
        self.resolve(universe, class, MemberKind::Constructor, args)
    }

    pub fn resolve_method(
        &self,
        universe: &dyn TypeUniverse,
        class: &dyn ClassHandle,
        name: &str,
        args: &[Value],
    ) -> Result<Member, ResolutionError> {
        self.resolve(universe, class, MemberKind::Method(name.to_string()), args)
    }

    pub fn resolve(
        &self,
        universe: &dyn TypeUniverse,
        class: &dyn ClassHandle,
        kind: MemberKind,
        args: &[Value],
    ) -> Result<Member, ResolutionError> {
        let key = ResolutionKey {
            origin: class.origin(),
            class_name: class.name().to_string(),
            kind: kind.clone(),
            arg_types: args.iter().map(Value::runtime_type).collect(),
        };
        if let Some(hit) = self.lock().get(&key) {
            return Ok(hit.clone());
        }

        let members: Vec<(usize, Signature)> = match &kind {
            MemberKind::Constructor => class.constructors().into_iter().enumerate().collect(),
            MemberKind::Method(name) => class
                .methods()
                .into_iter()
                .enumerate()
                .filter(|(_, sig)| &sig.name == name)
                .collect(),
        };
        let arg_types: Vec<ArgType> = args.iter().map(|v| ArgType::of(universe, v)).collect();
        let same_arity: Vec<&(usize, Signature)> = members
            .iter()
            .filter(|(_, sig)| sig.arity() == args.len())
            .collect();

        let exact = same_arity.iter().find(|(_, sig)| {
            sig.params
                .iter()
                .zip(&arg_types)
                .all(|(p, a)| types_match(p, a.ty.as_ref()))
        });

        let member = match exact {
            Some((index, sig)) => Member {
                index: *index,
                signature: sig.clone(),
                pass: MatchPass::Exact,
            },
            None => {
                let loose: Vec<(usize, &Signature, usize)> = same_arity
                    .iter()
                    .filter(|(_, sig)| {
                        sig.params
                            .iter()
                            .zip(&arg_types)
                            .all(|(p, a)| loosely_matches(universe, p, a))
                    })
                    .map(|(index, sig)| (*index, sig, exact_positions(sig, &arg_types)))
                    .collect();
                let chosen = loose
                    .iter()
                    .min_by_key(|(index, _, score)| (Reverse(*score), *index))
                    .ok_or_else(|| ResolutionError {
                        class_name: class.name().to_string(),
                        member: kind.to_string(),
                        arg_types: describe_arg_types(args),
                        considered: members.iter().map(|(_, sig)| sig.to_string()).collect(),
                    })?;
                let tied = loose.iter().filter(|c| c.2 == chosen.2).count();
                if tied > 1 {
                    obs::emit_resolution_ambiguous(
                        class.name(),
                        &kind.to_string(),
                        &chosen.1.to_string(),
                        tied,
                    );
                }
                Member {
                    index: chosen.0,
                    signature: chosen.1.clone(),
                    pass: MatchPass::Loose,
                }
            }
        };

        self.lock().insert(key, member.clone());
        Ok(member)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ResolutionKey, Member>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exact-pass compatibility of one parameter with one argument type (`None` = null).
pub fn types_match(param: &JType, arg: Option<&JType>) -> bool {
    let Some(arg) = arg else {
        return !param.is_primitive();
    };
    if param == arg {
        return true;
    }
    match (param.prim(), arg.prim()) {
        (Some(p), Some(a)) if p == a => true,
        (Some(Prim::Double), Some(a)) => {
            matches!(a, Prim::Int | Prim::Short | Prim::Long | Prim::Float)
        }
        _ => false,
    }
}

fn loosely_matches(universe: &dyn TypeUniverse, param: &JType, arg: &ArgType) -> bool {
    match &arg.ty {
        None => !param.is_primitive(),
        Some(ty) => {
            types_match(param, Some(ty))
                || assignable_from(universe, param, ty, &arg.ancestors)
                || assignable_from(universe, ty, param, &ancestors_of(universe, param))
        }
    }
}

fn exact_positions(sig: &Signature, args: &[ArgType]) -> usize {
    sig.params
        .iter()
        .zip(args)
        .filter(|(p, a)| types_match(p, a.ty.as_ref()))
        .count()
}

/// Whether a `target` slot accepts a value of type `source`.
fn assignable_from(
    universe: &dyn TypeUniverse,
    target: &JType,
    source: &JType,
    source_ancestors: &[String],
) -> bool {
    if target == source {
        return true;
    }
    match (target, source) {
        (JType::Primitive(_), _) | (_, JType::Primitive(_)) => false,
        (JType::Object, _) => true,
        (JType::Array(t), JType::Array(s)) => {
            assignable_from(universe, t, s, &ancestors_of(universe, s))
        }
        (JType::Array(_), _) => false,
        _ => {
            let wanted = target.to_string();
            source_ancestors.iter().any(|a| *a == wanted)
        }
    }
}

/// Transitive supertypes of a type, nearest first.
fn ancestors_of(universe: &dyn TypeUniverse, ty: &JType) -> Vec<String> {
    let fixed: &[&str] = match ty {
        JType::Boxed(p) if p.is_numeric() => &["Number", "Comparable", "Object"],
        JType::Boxed(_) => &["Comparable", "Object"],
        JType::Str => &["CharSequence", "Comparable", "Object"],
        JType::Array(_) => &["Object"],
        JType::Object | JType::Primitive(_) => &[],
        JType::Class(name) => return class_ancestors(universe, name),
    };
    fixed.iter().map(|s| s.to_string()).collect()
}

fn class_ancestors(universe: &dyn TypeUniverse, name: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut queue: VecDeque<String> = universe.supertypes_of(name).into();
    while let Some(next) = queue.pop_front() {
        if seen.insert(next.clone()) {
            queue.extend(universe.supertypes_of(&next));
            out.push(next);
        }
    }
    if !out.iter().any(|a| a == "Object") {
        out.push("Object".to_string());
    }
    out
}

/// Human-readable runtime types of an argument list.
pub fn describe_arg_types(args: &[Value]) -> Vec<String> {
    args.iter()
        .map(|v| {
            v.runtime_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "null".to_string())
        })
        .collect()
}
