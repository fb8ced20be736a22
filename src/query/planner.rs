//! Index bound derivation.
//!
//! A bounded scan is only chosen when the indexed field's clauses rewrite exactly
//! into one contiguous key range; anything else falls back to a full scan.

use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::value::compare;

use super::types::{Clause, CmpOp, CompiledQuery, Operator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexDirection {
    Asc,
    Desc,
}

/// Descriptor of a single-field index offered to the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub field: String,
    pub direction: IndexDirection,
    /// Set once any indexed document contributed more than one key.
    #[serde(default)]
    pub multikey: bool,
}

impl IndexSpec {
    #[must_use]
    pub fn new(field: impl Into<String>, direction: IndexDirection) -> Self {
        Self { field: field.into(), direction, multikey: false }
    }

    /// Index name in `field_1` / `field_-1` form.
    #[must_use]
    pub fn name(&self) -> String {
        match self.direction {
            IndexDirection::Asc => format!("{}_1", self.field),
            IndexDirection::Desc => format!("{}_-1", self.field),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyBound {
    pub value: Bson,
    pub inclusive: bool,
}

/// Contiguous key range in ascending key order. `None` is MinKey / MaxKey.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBounds {
    pub field: String,
    pub lower: Option<KeyBound>,
    pub upper: Option<KeyBound>,
}

impl IndexBounds {
    #[must_use]
    pub fn full(field: impl Into<String>) -> Self {
        Self { field: field.into(), lower: None, upper: None }
    }

    /// True when the bounds admit at most one key and are closed on both ends.
    #[must_use]
    pub fn is_point(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(l), Some(u)) => {
                l.inclusive && u.inclusive && compare(&l.value, &u.value) == Ordering::Equal
            }
            _ => false,
        }
    }

    /// True when no key can satisfy both ends.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(l), Some(u)) => match compare(&l.value, &u.value) {
                Ordering::Greater => true,
                Ordering::Equal => !(l.inclusive && u.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    /// Whether `key` lies within the bounds.
    #[must_use]
    pub fn contains(&self, key: &Bson) -> bool {
        let above = self.lower.as_ref().is_none_or(|l| match compare(key, &l.value) {
            Ordering::Greater => true,
            Ordering::Equal => l.inclusive,
            Ordering::Less => false,
        });
        let below = self.upper.as_ref().is_none_or(|u| match compare(key, &u.value) {
            Ordering::Less => true,
            Ordering::Equal => u.inclusive,
            Ordering::Greater => false,
        });
        above && below
    }

    fn tighten_lower(&mut self, b: KeyBound) {
        let replace = match &self.lower {
            None => true,
            Some(cur) => match compare(&b.value, &cur.value) {
                Ordering::Greater => true,
                Ordering::Equal => !b.inclusive,
                Ordering::Less => false,
            },
        };
        if replace {
            self.lower = Some(b);
        }
    }

    fn tighten_upper(&mut self, b: KeyBound) {
        let replace = match &self.upper {
            None => true,
            Some(cur) => match compare(&b.value, &cur.value) {
                Ordering::Less => true,
                Ordering::Equal => !b.inclusive,
                Ordering::Greater => false,
            },
        };
        if replace {
            self.upper = Some(b);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessPath {
    BoundedScan(IndexBounds),
    FullScan,
}

impl AccessPath {
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        matches!(self, Self::BoundedScan(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub index: IndexSpec,
    pub access: AccessPath,
}

/// Derive the access path for `query` over `index`. Never fails: anything that
/// cannot be bounded exactly becomes a full scan.
#[must_use]
pub fn plan(query: &CompiledQuery, index: &IndexSpec) -> QueryPlan {
    let access = derive_bounds(query, index).map_or(AccessPath::FullScan, AccessPath::BoundedScan);
    log::debug!(
        "plan: index={} bounded={} clauses={}",
        index.name(),
        access.is_bounded(),
        query.clause_count()
    );
    QueryPlan { index: index.clone(), access }
}

fn derive_bounds(query: &CompiledQuery, index: &IndexSpec) -> Option<IndexBounds> {
    let fp = query.field(&index.field)?;
    if fp.clauses.is_empty() || (index.multikey && fp.clauses.len() > 1) {
        return None;
    }
    let mut bounds = IndexBounds::full(&index.field);
    for clause in &fp.clauses {
        apply_clause(&mut bounds, clause)?;
    }
    Some(bounds)
}

fn boundable(v: &Bson) -> bool {
    !matches!(v, Bson::Array(_) | Bson::RegularExpression(_) | Bson::MinKey | Bson::MaxKey)
}

fn apply_clause(bounds: &mut IndexBounds, clause: &Clause) -> Option<()> {
    let Operator::Cmp { op, value } = &clause.op else {
        return None;
    };
    if !boundable(value) {
        return None;
    }
    let point = |b: &mut IndexBounds| {
        b.tighten_lower(KeyBound { value: value.clone(), inclusive: true });
        b.tighten_upper(KeyBound { value: value.clone(), inclusive: true });
    };
    match (op, clause.negated) {
        // not(ne(x)) is eq(x)
        (CmpOp::Eq, false) | (CmpOp::Ne, true) => point(bounds),
        (CmpOp::Gt, false) => bounds.tighten_lower(KeyBound { value: value.clone(), inclusive: false }),
        (CmpOp::Gte, false) => bounds.tighten_lower(KeyBound { value: value.clone(), inclusive: true }),
        (CmpOp::Lt, false) => bounds.tighten_upper(KeyBound { value: value.clone(), inclusive: false }),
        (CmpOp::Lte, false) => bounds.tighten_upper(KeyBound { value: value.clone(), inclusive: true }),
        _ => return None,
    }
    Some(())
}

/// Diagnostic description of a plan, in the shape reported by `explain()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explain {
    pub cursor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_key: Option<BsonDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_key: Option<BsonDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_inclusive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_inclusive: Option<bool>,
    pub all_plans: usize,
}

impl Explain {
    #[must_use]
    pub fn full_scan() -> Self {
        Self {
            cursor: "BasicCursor".to_string(),
            start_key: None,
            end_key: None,
            start_inclusive: None,
            end_inclusive: None,
            all_plans: 1,
        }
    }

    #[must_use]
    pub fn from_plan(plan: &QueryPlan) -> Self {
        let AccessPath::BoundedScan(bounds) = &plan.access else {
            return Self::full_scan();
        };
        let key = |b: &Option<KeyBound>, open: Bson| {
            let mut d = BsonDocument::new();
            d.insert(bounds.field.clone(), b.as_ref().map_or(open, |k| k.value.clone()));
            d
        };
        let incl = |b: &Option<KeyBound>| b.as_ref().is_none_or(|k| k.inclusive);
        let lower = key(&bounds.lower, Bson::MinKey);
        let upper = key(&bounds.upper, Bson::MaxKey);
        let (cursor, start, end, start_incl, end_incl) = match plan.index.direction {
            IndexDirection::Asc => (
                format!("BtreeCursor {}", plan.index.name()),
                lower,
                upper,
                incl(&bounds.lower),
                incl(&bounds.upper),
            ),
            IndexDirection::Desc => (
                format!("BtreeCursor {} reverse", plan.index.name()),
                upper,
                lower,
                incl(&bounds.upper),
                incl(&bounds.lower),
            ),
        };
        Self {
            cursor,
            start_key: Some(start),
            end_key: Some(end),
            start_inclusive: Some(start_incl),
            end_inclusive: Some(end_incl),
            all_plans: 1,
        }
    }

    #[must_use]
    pub fn is_btree(&self) -> bool {
        self.cursor.starts_with("BtreeCursor")
    }
}

impl fmt::Display for Explain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cursor: {}", self.cursor)?;
        if let Some(s) = &self.start_key {
            writeln!(f, "startKey: {s}")?;
        }
        if let Some(e) = &self.end_key {
            writeln!(f, "endKey: {e}")?;
        }
        write!(f, "allPlans: {}", self.all_plans)
    }
}
