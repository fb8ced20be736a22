use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use crate::value::{self, compare_bracketed, type_tag, values_equal};

use super::types::{Clause, CmpOp, CompiledQuery, ElemMatch, FieldPredicate, Operator, Pattern, SetMember};

/// True when `doc` satisfies every field predicate of `query`.
#[must_use]
pub fn matches(doc: &BsonDocument, query: &CompiledQuery) -> bool {
    query.fields.iter().all(|fp| field_matches(doc, fp))
}

#[must_use]
pub fn field_matches(doc: &BsonDocument, fp: &FieldPredicate) -> bool {
    let v = get_path(doc, &fp.field);
    fp.clauses.iter().all(|c| clause_matches(v, c))
}

/// Evaluate one clause against a field value (`None` when the field is absent).
#[must_use]
pub fn clause_matches(v: Option<&Bson>, clause: &Clause) -> bool {
    operator_matches(v, &clause.op) != clause.negated
}

fn operator_matches(v: Option<&Bson>, op: &Operator) -> bool {
    match op {
        Operator::Cmp { op: CmpOp::Eq, value } => eq_matches(v, value),
        Operator::Cmp { op: CmpOp::Ne, value } => !eq_matches(v, value),
        Operator::Cmp { op, value } => {
            let accept = |o: Ordering| match op {
                CmpOp::Gt => o == Ordering::Greater,
                CmpOp::Gte => o != Ordering::Less,
                CmpOp::Lt => o == Ordering::Less,
                CmpOp::Lte => o != Ordering::Greater,
                CmpOp::Eq | CmpOp::Ne => false,
            };
            let x = v.unwrap_or(&Bson::Null);
            any_or_whole(x, |e| compare_bracketed(e, value).is_some_and(accept))
        }
        Operator::In(set) => in_matches(v, set),
        Operator::Nin(set) => !in_matches(v, set),
        Operator::Exists(want) => v.is_some() == *want,
        Operator::Type(code) => v.is_some_and(|x| any_or_whole(x, |e| type_tag(e) == *code)),
        Operator::Size(n) => matches!(v, Some(Bson::Array(items)) if items.len() == *n),
        Operator::All(set) => match v {
            Some(Bson::Array(items)) => {
                !set.is_empty() && set.iter().all(|m| items.iter().any(|e| member_matches(e, m)))
            }
            _ => false,
        },
        Operator::ElemMatch(em) => match v {
            Some(Bson::Array(items)) => items.iter().any(|e| elem_matches(e, em)),
            Some(sub @ Bson::Document(_)) => elem_matches(sub, em),
            _ => false,
        },
        Operator::Mod { divisor, remainder } => v.is_some_and(|x| {
            any_or_whole(x, |e| {
                value::is_number(e)
                    && value::to_truncated_i64(e)
                        .is_some_and(|n| n.wrapping_rem(*divisor) == *remainder)
            })
        }),
        Operator::Regex(p) => v.is_some_and(|x| any_or_whole(x, |e| pattern_matches(e, p))),
    }
}

/// Apply `f` to the value itself and, for arrays, to each element.
fn any_or_whole(v: &Bson, f: impl Fn(&Bson) -> bool) -> bool {
    if f(v) {
        return true;
    }
    match v {
        Bson::Array(items) => items.iter().any(f),
        _ => false,
    }
}

fn eq_matches(v: Option<&Bson>, operand: &Bson) -> bool {
    match v {
        None => matches!(operand, Bson::Null),
        Some(x) => any_or_whole(x, |e| values_equal(e, operand)),
    }
}

fn in_matches(v: Option<&Bson>, set: &[SetMember]) -> bool {
    match v {
        None => set.iter().any(|m| matches!(m, SetMember::Value(Bson::Null))),
        Some(x) => any_or_whole(x, |e| set.iter().any(|m| member_matches(e, m))),
    }
}

fn member_matches(e: &Bson, m: &SetMember) -> bool {
    match m {
        SetMember::Value(want) => values_equal(e, want),
        SetMember::Pattern(p) => pattern_matches(e, p),
    }
}

fn pattern_matches(e: &Bson, p: &Pattern) -> bool {
    match e {
        Bson::String(s) | Bson::Symbol(s) => p.is_match(s),
        Bson::RegularExpression(re) => re.pattern == p.source && re.options == p.options,
        _ => false,
    }
}

fn elem_matches(e: &Bson, em: &ElemMatch) -> bool {
    match em {
        ElemMatch::Document(q) => match e {
            Bson::Document(d) => matches(d, q),
            _ => false,
        },
        ElemMatch::Value(clauses) => clauses.iter().all(|c| clause_matches(Some(e), c)),
    }
}

/// Resolve a dotted path through embedded documents. Path length is bounded
/// when the query is compiled.
#[must_use]
pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get(first)?;
    for part in parts {
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::query::parse::compile;
    use bson::{Regex, doc};

    fn check(doc: &BsonDocument, spec: BsonDocument) -> bool {
        matches(doc, &compile(&spec, &QueryConfig::default()).unwrap())
    }

    fn re(p: &str) -> Bson {
        Bson::RegularExpression(Regex { pattern: p.into(), options: String::new() })
    }

    #[test]
    fn compound_not_negates_each_clause() {
        let a = doc! {"i": "a"};
        let b = doc! {"i": "b"};
        let q = doc! {"i": {"$not": {"$gt": "c", "$lt": "b"}}};
        assert!(!check(&a, q.clone()));
        assert!(check(&b, q));
    }

    #[test]
    fn not_ne_behaves_like_eq() {
        let a = doc! {"i": "a"};
        let b = doc! {"i": "b"};
        for d in [&a, &b] {
            assert_eq!(check(d, doc! {"i": {"$not": {"$ne": "a"}}}), check(d, doc! {"i": "a"}));
        }
        assert!(check(&a, doc! {"i": {"$not": {"$ne": "a"}}}));
    }

    #[test]
    fn negated_exists_edges() {
        let d = doc! {"i": "a"};
        assert!(!check(&d, doc! {"i": {"$not": {"$exists": true}}}));
        assert!(!check(&d, doc! {"j": {"$not": {"$exists": false}}}));
        assert!(check(&d, doc! {"j": {"$not": {"$exists": true}}}));
    }

    #[test]
    fn array_any_element_under_negation() {
        let d = doc! {"i": ["a", "b"]};
        assert!(!check(&d, doc! {"i": {"$not": {"$gt": "a"}}}));
        assert!(check(&d, doc! {"i": {"$not": {"$gt": "c"}}}));
        assert!(!check(&d, doc! {"i": {"$not": {"$size": 2}}}));
        assert!(check(&d, doc! {"i": {"$not": {"$size": 3}}}));
        assert!(!check(&d, doc! {"i": {"$not": {"$all": ["a", "b"]}}}));
        assert!(check(&d, doc! {"i": {"$not": {"$all": ["c"]}}}));
    }

    #[test]
    fn negated_size_on_scalar_is_true() {
        assert!(check(&doc! {"i": "a"}, doc! {"i": {"$not": {"$size": 1}}}));
    }

    #[test]
    fn mod_and_negated_mod() {
        let d = doc! {"i": 1};
        assert!(!check(&d, doc! {"i": {"$not": {"$mod": [5, 1]}}}));
        assert!(!check(&d, doc! {"i": {"$mod": [5, 2]}}));
        assert!(check(&d, doc! {"i": {"$not": {"$mod": [5, 2]}}}));
        assert!(!check(&doc! {"i": "x"}, doc! {"i": {"$mod": [5, 0]}}));
    }

    #[test]
    fn membership_and_patterns() {
        let a = doc! {"i": "a"};
        assert!(!check(&a, doc! {"i": {"$not": {"$in": ["a"]}}}));
        assert!(check(&a, doc! {"i": {"$not": {"$in": ["g"]}}}));
        assert!(check(&a, doc! {"i": {"$not": {"$nin": ["a"]}}}));
        assert!(!check(&a, doc! {"i": {"$not": re("a")}}));
        assert!(check(&a, doc! {"i": {"$not": re("aa")}}));
        assert!(!check(&a, doc! {"i": {"$not": re("a"), "$regex": "a"}}));
        assert!(check(&a, doc! {"i": {"$in": [re("^a")]}}));
        assert!(check(&doc! {"i": "ABC"}, doc! {"i": {"$regex": "^abc$", "$options": "i"}}));
    }

    #[test]
    fn type_operator() {
        let a = doc! {"i": "a"};
        assert!(check(&a, doc! {"i": {"$type": 2}}));
        assert!(check(&a, doc! {"i": {"$not": {"$type": 1}}}));
        assert!(!check(&a, doc! {"i": {"$not": {"$type": 2}}}));
        assert!(check(&doc! {"i": [1.5, "x"]}, doc! {"i": {"$type": 1}}));
        assert!(!check(&doc! {}, doc! {"i": {"$type": 10}}));
    }

    #[test]
    fn elem_match_on_embedded_documents_and_arrays() {
        let a = doc! {"i": {"j": "a"}};
        let b = doc! {"i": {"j": "b"}};
        let q = doc! {"i": {"$not": {"$elemMatch": {"j": "a"}}}};
        assert!(!check(&a, q.clone()));
        assert!(check(&b, q));
        let arr = doc! {"i": [{"j": "x"}, {"j": "a"}]};
        assert!(check(&arr, doc! {"i": {"$elemMatch": {"j": "a"}}}));
        assert!(check(&doc! {"n": [1, 5, 9]}, doc! {"n": {"$elemMatch": {"$gt": 4, "$lt": 6}}}));
        assert!(!check(&doc! {"n": [1, 9]}, doc! {"n": {"$elemMatch": {"$gt": 4, "$lt": 6}}}));
    }

    #[test]
    fn missing_field_reads_as_null() {
        let d = doc! {"i": "a"};
        assert!(check(&d, doc! {"j": Bson::Null}));
        assert!(!check(&d, doc! {"j": {"$ne": Bson::Null}}));
        assert!(check(&d, doc! {"j": {"$in": [Bson::Null]}}));
        assert!(!check(&d, doc! {"j": {"$gt": "a"}}));
        assert!(check(&d, doc! {"j": {"$not": {"$gt": "a"}}}));
    }

    #[test]
    fn range_operators_are_type_bracketed() {
        let d = doc! {"i": 5};
        assert!(!check(&d, doc! {"i": {"$gt": "a"}}));
        assert!(!check(&d, doc! {"i": {"$lt": "a"}}));
        assert!(check(&d, doc! {"i": {"$gte": 5.0}}));
    }

    #[test]
    fn dotted_paths_reach_embedded_fields() {
        let d = doc! {"a": {"b": {"c": 3}}};
        assert!(check(&d, doc! {"a.b.c": {"$gt": 2}}));
        assert!(check(&d, doc! {"a.x": {"$exists": false}}));
    }

    #[test]
    fn whole_array_equality() {
        let d = doc! {"i": ["a", "b"]};
        assert!(check(&d, doc! {"i": ["a", "b"]}));
        assert!(check(&d, doc! {"i": "b"}));
        assert!(!check(&d, doc! {"i": {"$ne": "b"}}));
    }

    #[test]
    fn path_depth_follows_configured_limit() {
        let mut d = doc! {"leaf": 1};
        for _ in 0..39 {
            d = doc! {"n": d};
        }
        let path = format!("{}leaf", "n.".repeat(39));
        let cfg = QueryConfig { max_nesting_depth: 40, ..QueryConfig::default() };
        let mut query = BsonDocument::new();
        query.insert(path.clone(), 1);
        let q = compile(&query, &cfg).unwrap();
        assert!(matches(&d, &q));
        assert_eq!(get_path(&d, &path), Some(&Bson::Int32(1)));
    }
}
