//! Conversation scopes.
//!
//! A [`ScopeSet`] describes which conversations a registration applies to.
//! Each context kind (one-to-one users, groups, discussions) is an axis
//! holding either an inclusion set or an exclusion set of ids. All
//! operations are pure and work on sorted, deduplicated id vectors, so
//! they run in time linear to the set sizes.
//!
//! # Examples
//!
//! ```
//! use cqbot_proto::{ContextKind, ScopeSet};
//!
//! let groups = ScopeSet::all_groups();
//! let quiet = groups.difference(&ScopeSet::group(42));
//!
//! assert!(quiet.matches(ContextKind::Group, 7));
//! assert!(!quiet.matches(ContextKind::Group, 42));
//! assert!(groups.contains(&quiet));
//! assert!(!quiet.contains(&groups));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Not, Sub};

use crate::path::{ContextKind, Target};

/// One axis of a scope: an explicit inclusion or exclusion set of ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdSet {
    /// Exactly these ids. An empty inclusion matches nothing.
    Include(Vec<i64>),
    /// Every id except these. An empty exclusion matches everything.
    Exclude(Vec<i64>),
}

impl IdSet {
    /// The axis matching every id.
    pub fn any() -> Self {
        IdSet::Exclude(Vec::new())
    }

    /// The axis matching no id.
    pub fn none() -> Self {
        IdSet::Include(Vec::new())
    }

    /// An inclusion axis built from arbitrary ids.
    pub fn include<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        IdSet::Include(normalize(ids))
    }

    /// An exclusion axis built from arbitrary ids.
    pub fn exclude<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        IdSet::Exclude(normalize(ids))
    }

    /// Whether `id` lies on this axis.
    pub fn matches(&self, id: i64) -> bool {
        match self {
            IdSet::Include(ids) => ids.binary_search(&id).is_ok(),
            IdSet::Exclude(ids) => ids.binary_search(&id).is_err(),
        }
    }

    /// Whether this axis matches no id at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdSet::Include(ids) if ids.is_empty())
    }

    /// Whether this axis matches every id.
    pub fn is_universal(&self) -> bool {
        matches!(self, IdSet::Exclude(ids) if ids.is_empty())
    }

    /// The complement of this axis.
    pub fn inverse(&self) -> Self {
        match self {
            IdSet::Include(ids) => IdSet::Exclude(ids.clone()),
            IdSet::Exclude(ids) => IdSet::Include(ids.clone()),
        }
    }

    /// Ids matched by either axis.
    pub fn union(&self, other: &Self) -> Self {
        use IdSet::*;
        match (self, other) {
            (Include(a), Include(b)) => Include(merge_union(a, b)),
            (Include(a), Exclude(b)) => Exclude(merge_difference(b, a)),
            (Exclude(a), Include(b)) => Exclude(merge_difference(a, b)),
            (Exclude(a), Exclude(b)) => Exclude(merge_intersection(a, b)),
        }
    }

    /// Ids matched by both axes.
    pub fn intersect(&self, other: &Self) -> Self {
        use IdSet::*;
        match (self, other) {
            (Include(a), Include(b)) => Include(merge_intersection(a, b)),
            (Include(a), Exclude(b)) => Include(merge_difference(a, b)),
            (Exclude(a), Include(b)) => Include(merge_difference(b, a)),
            (Exclude(a), Exclude(b)) => Exclude(merge_union(a, b)),
        }
    }

    /// Ids matched by this axis but not by `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.intersect(&other.inverse())
    }

    /// Whether every id matched by `inner` is matched by `self`.
    pub fn contains(&self, inner: &Self) -> bool {
        use IdSet::*;
        match (self, inner) {
            (Include(outer), Include(inner)) => is_subset(inner, outer),
            // a finite set never covers a cofinite one
            (Include(_), Exclude(_)) => false,
            (Exclude(outer), Include(inner)) => is_disjoint(inner, outer),
            (Exclude(outer), Exclude(inner)) => is_subset(outer, inner),
        }
    }
}

impl Default for IdSet {
    fn default() -> Self {
        IdSet::none()
    }
}

/// The set of conversations a registration applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScopeSet {
    users: IdSet,
    groups: IdSet,
    discusses: IdSet,
}

impl ScopeSet {
    /// Builds a scope from its three axes.
    pub fn new(users: IdSet, groups: IdSet, discusses: IdSet) -> Self {
        Self {
            users,
            groups,
            discusses,
        }
    }

    /// The universal scope (the application root).
    pub fn all() -> Self {
        Self::new(IdSet::any(), IdSet::any(), IdSet::any())
    }

    /// The empty scope.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every one-to-one conversation.
    pub fn all_users() -> Self {
        Self::only(ContextKind::User, IdSet::any())
    }

    /// Every group.
    pub fn all_groups() -> Self {
        Self::only(ContextKind::Group, IdSet::any())
    }

    /// Every discussion.
    pub fn all_discusses() -> Self {
        Self::only(ContextKind::Discuss, IdSet::any())
    }

    /// The one-to-one conversation with a single user.
    pub fn user(id: i64) -> Self {
        Self::only(ContextKind::User, IdSet::Include(vec![id]))
    }

    /// A single group.
    pub fn group(id: i64) -> Self {
        Self::only(ContextKind::Group, IdSet::Include(vec![id]))
    }

    /// A single discussion.
    pub fn discuss(id: i64) -> Self {
        Self::only(ContextKind::Discuss, IdSet::Include(vec![id]))
    }

    /// A scope covering only the given ids of one kind.
    pub fn of<I: IntoIterator<Item = i64>>(kind: ContextKind, ids: I) -> Self {
        Self::only(kind, IdSet::include(ids))
    }

    fn only(kind: ContextKind, axis: IdSet) -> Self {
        let mut scope = Self::none();
        *scope.axis_mut(kind) = axis;
        scope
    }

    /// The axis for one context kind.
    pub fn axis(&self, kind: ContextKind) -> &IdSet {
        match kind {
            ContextKind::User => &self.users,
            ContextKind::Group => &self.groups,
            ContextKind::Discuss => &self.discusses,
        }
    }

    fn axis_mut(&mut self, kind: ContextKind) -> &mut IdSet {
        match kind {
            ContextKind::User => &mut self.users,
            ContextKind::Group => &mut self.groups,
            ContextKind::Discuss => &mut self.discusses,
        }
    }

    fn zip(&self, other: &Self, f: impl Fn(&IdSet, &IdSet) -> IdSet) -> Self {
        Self::new(
            f(&self.users, &other.users),
            f(&self.groups, &other.groups),
            f(&self.discusses, &other.discusses),
        )
    }

    /// Whether the conversation `(kind, id)` lies in this scope.
    pub fn matches(&self, kind: ContextKind, id: i64) -> bool {
        self.axis(kind).matches(id)
    }

    /// Whether an event target lies in this scope.
    ///
    /// Events without a conversation (friend requests, meta events) are
    /// seen only by the universal scope.
    pub fn matches_target(&self, target: Option<Target>) -> bool {
        match target {
            Some(target) => self.matches(target.kind, target.id),
            None => self.is_universal(),
        }
    }

    /// Whether this is the universal scope.
    pub fn is_universal(&self) -> bool {
        ContextKind::ALL
            .iter()
            .all(|&kind| self.axis(kind).is_universal())
    }

    /// Whether this scope matches nothing.
    pub fn is_empty(&self) -> bool {
        ContextKind::ALL.iter().all(|&kind| self.axis(kind).is_empty())
    }

    /// The complement scope.
    pub fn inverse(&self) -> Self {
        Self::new(
            self.users.inverse(),
            self.groups.inverse(),
            self.discusses.inverse(),
        )
    }

    /// Conversations in either scope.
    pub fn union(&self, other: &Self) -> Self {
        self.zip(other, IdSet::union)
    }

    /// Conversations in both scopes.
    pub fn intersect(&self, other: &Self) -> Self {
        self.zip(other, IdSet::intersect)
    }

    /// Conversations in this scope but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.zip(other, IdSet::difference)
    }

    /// Whether `inner` is a subset of this scope on every axis.
    pub fn contains(&self, inner: &Self) -> bool {
        ContextKind::ALL
            .iter()
            .all(|&kind| self.axis(kind).contains(inner.axis(kind)))
    }
}

impl Add for &ScopeSet {
    type Output = ScopeSet;

    fn add(self, rhs: &ScopeSet) -> ScopeSet {
        self.union(rhs)
    }
}

impl Sub for &ScopeSet {
    type Output = ScopeSet;

    fn sub(self, rhs: &ScopeSet) -> ScopeSet {
        self.difference(rhs)
    }
}

impl Not for &ScopeSet {
    type Output = ScopeSet;

    fn not(self) -> ScopeSet {
        self.inverse()
    }
}

impl fmt::Display for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, ids) = match self {
            IdSet::Include(ids) => ("+", ids),
            IdSet::Exclude(ids) => ("-", ids),
        };
        f.write_str(sign)?;
        f.write_str("[")?;
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user{} group{} discuss{}",
            self.users, self.groups, self.discusses
        )
    }
}

// ============================================================================
// Sorted-vector set operations
// ============================================================================

fn normalize<I: IntoIterator<Item = i64>>(ids: I) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn merge_union(a: &[i64], b: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn merge_intersection(a: &[i64], b: &[i64]) -> Vec<i64> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn merge_difference(a: &[i64], b: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for &x in a {
        while j < b.len() && b[j] < x {
            j += 1;
        }
        if j >= b.len() || b[j] != x {
            out.push(x);
        }
    }
    out
}

fn is_subset(inner: &[i64], outer: &[i64]) -> bool {
    merge_difference(inner, outer).is_empty()
}

fn is_disjoint(a: &[i64], b: &[i64]) -> bool {
    merge_intersection(a, b).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_axes() {
        assert!(!IdSet::none().matches(1));
        assert!(IdSet::any().matches(1));
        assert!(!ScopeSet::none().matches(ContextKind::Group, 1));
        assert!(ScopeSet::all().matches(ContextKind::Discuss, -5));
    }

    #[test]
    fn test_four_case_contains() {
        let inc12 = IdSet::include([2, 1]);
        let inc1 = IdSet::include([1]);
        let exc3 = IdSet::exclude([3]);
        let exc34 = IdSet::exclude([3, 4]);

        assert!(inc12.contains(&inc1));
        assert!(!inc1.contains(&inc12));
        assert!(!inc12.contains(&exc3));
        assert!(exc3.contains(&inc12));
        assert!(!exc3.contains(&IdSet::include([3])));
        assert!(exc3.contains(&exc34));
        assert!(!exc34.contains(&exc3));
    }

    #[test]
    fn test_union_and_difference() {
        let a = IdSet::include([1, 2, 3]);
        let b = IdSet::exclude([2, 5]);

        assert_eq!(a.union(&b), IdSet::exclude([5]));
        assert_eq!(a.difference(&b), IdSet::include([2]));
        assert_eq!(b.difference(&a), IdSet::exclude([1, 2, 3, 5]));
        assert_eq!(a.intersect(&b), IdSet::include([1, 3]));
    }

    #[test]
    fn test_scope_constructors() {
        let users = ScopeSet::all_users();
        assert!(users.matches(ContextKind::User, 10000));
        assert!(!users.matches(ContextKind::Group, 10000));
        assert!(ScopeSet::all().contains(&users));
        assert!(ScopeSet::all().is_universal());
        assert!(ScopeSet::none().is_empty());
    }

    #[test]
    fn test_contextless_target() {
        assert!(ScopeSet::all().matches_target(None));
        assert!(!ScopeSet::all_groups().matches_target(None));
        let target = Target::new(ContextKind::Group, 3);
        assert!(ScopeSet::group(3).matches_target(Some(target)));
    }

    #[test]
    fn test_operators() {
        let all = ScopeSet::all();
        let g = ScopeSet::group(1);
        let rest = &all - &g;
        assert!(!rest.matches(ContextKind::Group, 1));
        assert_eq!(&rest + &g, all);
        assert_eq!(!&!&g, g);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ScopeSet::group(7).to_string(),
            "user+[] group+[7] discuss+[]"
        );
    }
}
