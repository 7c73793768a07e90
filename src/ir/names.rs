//! Collision-free identifier generation
//!
//! One generator is shared by every function of a file, so names synthesized
//! for an inner function never shadow names synthesized for its parent.

use std::collections::HashSet;

use super::{Expr, InfoTable, MemberProp};

const MAX_HINT_LEN: usize = 24;

#[derive(Debug, Default, Clone)]
pub struct NameGenerator {
    used: HashSet<String>,
    generated: HashSet<String>,
    held: HashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with every identifier already present in the program
    pub fn with_reserved<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            used: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into());
    }

    /// Keep `name` away from [`fresh`](Self::fresh) until it is claimed.
    /// Names the program already uses cannot be held.
    pub fn hold(&mut self, name: &str) -> bool {
        if self.used.contains(name) {
            return false;
        }
        self.used.insert(name.to_string());
        self.held.insert(name.to_string());
        true
    }

    /// Take a held name; false when it was never held or already claimed
    pub fn claim(&mut self, name: &str) -> bool {
        if self.held.remove(name) {
            self.generated.insert(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Whether `name` was produced by this generator
    pub fn is_generated(&self, name: &str) -> bool {
        self.generated.contains(name)
    }

    /// A fresh `_hint`, `_hint2`, `_hint3`, ...
    pub fn fresh(&mut self, hint: &str) -> String {
        let base = sanitize(hint);
        let mut candidate = base.clone();
        let mut counter = 2;
        while self.used.contains(&candidate) {
            candidate = format!("{}{}", base, counter);
            counter += 1;
        }
        self.used.insert(candidate.clone());
        self.generated.insert(candidate.clone());
        candidate
    }

    /// Fresh name derived from the shape of an expression, e.g. `_response$json`.
    /// Parked nodes are named from the hint recorded in `infos`.
    pub fn fresh_for(&mut self, expr: &Expr, infos: &InfoTable) -> String {
        let hint = hint_for(expr, infos).unwrap_or_else(|| "temp".to_string());
        self.fresh(&hint)
    }
}

fn sanitize(hint: &str) -> String {
    let trimmed: String = hint
        .trim_start_matches('_')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .take(MAX_HINT_LEN)
        .collect();
    if trimmed.is_empty() {
        "_temp".to_string()
    } else {
        format!("_{}", trimmed)
    }
}

fn hint_for(expr: &Expr, infos: &InfoTable) -> Option<String> {
    match expr {
        Expr::Ident(name) => Some(name.clone()),
        Expr::This => Some("this".to_string()),
        Expr::Opaque(id) => infos.get(*id).and_then(|info| info.hint.clone()),
        Expr::Call(callee, _) | Expr::New(callee, _) => hint_for(callee, infos),
        Expr::Member(object, MemberProp::Static(property)) => match hint_for(object, infos) {
            Some(object) => Some(format!("{}${}", object.trim_start_matches('_'), property)),
            None => Some(property.clone()),
        },
        Expr::Member(object, MemberProp::Computed(_)) => hint_for(object, infos),
        Expr::Await(inner) => hint_for(inner, infos),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_avoids_reserved_names() {
        let mut names = NameGenerator::with_reserved(["_this", "_this2"]);
        assert_eq!(names.fresh("this"), "_this3");
        assert_eq!(names.fresh("_result"), "_result");
        assert_eq!(names.fresh("result"), "_result2");
        assert!(names.is_generated("_result2"));
        assert!(!names.is_generated("_this"));
    }

    #[test]
    fn test_fresh_for_member_call() {
        let mut names = NameGenerator::new();
        let infos = InfoTable::new();
        let expr = Expr::call(Expr::member(Expr::ident("response"), "json"), vec![]);
        assert_eq!(names.fresh_for(&expr, &infos), "_response$json");
        assert_eq!(names.fresh_for(&Expr::Number(1.0), &infos), "_temp");
    }

    #[test]
    fn test_fresh_for_parked_member() {
        use crate::ir::{OpaqueInfo, OpaqueKind};

        let mut names = NameGenerator::new();
        let mut infos = InfoTable::new();
        let mut info = OpaqueInfo::new(OpaqueKind::Other);
        info.hint = Some("config$items".to_string());
        let id = infos.push(info);
        let anonymous = infos.push(OpaqueInfo::new(OpaqueKind::Other));
        let callee = Expr::member(Expr::Opaque(id), "push");
        assert_eq!(names.fresh_for(&callee, &infos), "_config$items$push");
        assert_eq!(names.fresh_for(&Expr::Opaque(anonymous), &infos), "_temp");
    }

    #[test]
    fn test_held_names_are_claimed_once() {
        let mut names = NameGenerator::with_reserved(["_call"]);
        assert!(names.hold("_await"));
        assert!(!names.hold("_call"));
        assert_eq!(names.fresh("await"), "_await2");
        assert!(names.claim("_await"));
        assert!(!names.claim("_await"));
        assert!(!names.claim("_call"));
    }

    #[test]
    fn test_sanitize_strips_invalid_characters() {
        assert_eq!(sanitize("a-b c"), "_abc");
        assert_eq!(sanitize("___"), "_temp");
    }
}
