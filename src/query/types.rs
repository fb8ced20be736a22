use bson::Bson;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }
}

/// A compiled regular expression together with the source it was built from.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    pub options: String,
    pub regex: regex::Regex,
}

impl Pattern {
    #[must_use]
    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

/// Member of a `$in`, `$nin` or `$all` set.
#[derive(Debug, Clone)]
pub enum SetMember {
    Value(Bson),
    Pattern(Pattern),
}

#[derive(Debug, Clone)]
pub enum ElemMatch {
    /// Elements are sub-documents tested against a nested query.
    Document(CompiledQuery),
    /// Elements are tested directly against operator clauses, e.g. `{$elemMatch: {$gt: 1}}`.
    Value(Vec<Clause>),
}

#[derive(Debug, Clone)]
pub enum Operator {
    Cmp { op: CmpOp, value: Bson },
    In(Vec<SetMember>),
    Nin(Vec<SetMember>),
    Exists(bool),
    Type(u8),
    Size(usize),
    All(Vec<SetMember>),
    ElemMatch(ElemMatch),
    Mod { divisor: i64, remainder: i64 },
    Regex(Pattern),
}

impl Operator {
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Cmp { op, .. } => op.symbol(),
            Self::In(_) => "$in",
            Self::Nin(_) => "$nin",
            Self::Exists(_) => "$exists",
            Self::Type(_) => "$type",
            Self::Size(_) => "$size",
            Self::All(_) => "$all",
            Self::ElemMatch(_) => "$elemMatch",
            Self::Mod { .. } => "$mod",
            Self::Regex(_) => "$regex",
        }
    }
}

/// One operator bound to a field. A negated clause matches exactly when the
/// operator alone would not; negation never spans more than one clause.
#[derive(Debug, Clone)]
pub struct Clause {
    pub op: Operator,
    pub negated: bool,
}

impl Clause {
    #[must_use]
    pub const fn new(op: Operator) -> Self {
        Self { op, negated: false }
    }

    #[must_use]
    pub const fn negated(op: Operator) -> Self {
        Self { op, negated: true }
    }
}

/// Conjunction of every clause given for one field.
#[derive(Debug, Clone)]
pub struct FieldPredicate {
    pub field: String,
    pub clauses: Vec<Clause>,
}

/// Validated query: the conjunction of its field predicates. Immutable once built
/// and safe to share across threads for repeated matching and planning.
#[derive(Debug, Clone, Default)]
pub struct CompiledQuery {
    pub fields: Vec<FieldPredicate>,
}

impl CompiledQuery {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldPredicate> {
        self.fields.iter().find(|f| f.field == name)
    }

    #[must_use]
    pub fn clause_count(&self) -> usize {
        self.fields.iter().map(|f| f.clauses.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Options for `Collection::find`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    pub limit: Option<usize>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}
