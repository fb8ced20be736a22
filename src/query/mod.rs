//! Query compilation, matching, planning and cursors.

mod cursor;
pub mod eval;
pub mod parse;
pub mod planner;
mod types;

pub use cursor::Cursor;
pub use eval::{clause_matches, field_matches, matches};
pub use parse::{build_pattern, compile, parse_query_json};
pub use planner::{
    AccessPath, Explain, IndexBounds, IndexDirection, IndexSpec, KeyBound, QueryPlan, plan,
};
pub use types::{
    Clause, CmpOp, CompiledQuery, ElemMatch, FieldPredicate, FindOptions, Operator, Pattern,
    SetMember,
};
