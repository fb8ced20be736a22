use bson::{Bson, Document as BsonDocument};

use crate::config::QueryConfig;
use crate::errors::{CompileError, DbError};
use crate::value::{self, TYPE_MAX_KEY, TYPE_MIN_KEY};

use super::types::{
    Clause, CmpOp, CompiledQuery, ElemMatch, FieldPredicate, Operator, Pattern, SetMember,
};

/// Compile a query specification of the form `{field: literal | {$op: operand, ...}}`.
///
/// # Errors
/// Returns a `CompileError` for any malformed operator document, including every
/// invalid `$not` operand.
pub fn compile(spec: &BsonDocument, cfg: &QueryConfig) -> Result<CompiledQuery, CompileError> {
    compile_at(spec, cfg, 0).inspect_err(|e| log::debug!("query rejected: {e}"))
}

/// Parse a JSON query and compile it.
///
/// # Errors
/// Returns an error if the JSON is malformed or the query does not compile.
pub fn parse_query_json(json: &str, cfg: &QueryConfig) -> Result<CompiledQuery, DbError> {
    let spec = crate::utils::json::parse_json_to_bson_document(json)?;
    Ok(compile(&spec, cfg)?)
}

fn compile_at(
    spec: &BsonDocument,
    cfg: &QueryConfig,
    depth: usize,
) -> Result<CompiledQuery, CompileError> {
    if depth > cfg.max_nesting_depth {
        return Err(CompileError::bad_operand("$elemMatch", "nesting too deep"));
    }
    let mut fields = Vec::with_capacity(spec.len());
    for (field, value) in spec {
        if field.starts_with('$') {
            return Err(CompileError::UnknownOperator(field.clone()));
        }
        if field.is_empty() || field.split('.').count() > cfg.max_nesting_depth {
            return Err(CompileError::bad_operand(field, "invalid field path"));
        }
        let clauses = compile_value(field, value, cfg, depth)?;
        fields.push(FieldPredicate { field: field.clone(), clauses });
    }
    Ok(CompiledQuery { fields })
}

fn compile_value(
    field: &str,
    value: &Bson,
    cfg: &QueryConfig,
    depth: usize,
) -> Result<Vec<Clause>, CompileError> {
    match value {
        Bson::Document(d) if is_operator_document(field, d)? => compile_operators(d, cfg, depth),
        Bson::RegularExpression(re) => {
            Ok(vec![Clause::new(Operator::Regex(build_pattern(&re.pattern, &re.options, cfg)?))])
        }
        other => Ok(vec![Clause::new(Operator::Cmp { op: CmpOp::Eq, value: other.clone() })]),
    }
}

/// A document whose keys all start with `$` holds operators; one with only plain
/// keys is a literal. Mixing both is rejected.
fn is_operator_document(field: &str, d: &BsonDocument) -> Result<bool, CompileError> {
    let ops = d.keys().filter(|k| k.starts_with('$')).count();
    if ops == 0 {
        Ok(false)
    } else if ops == d.len() {
        Ok(true)
    } else {
        Err(CompileError::MixedOperatorDocument(field.to_string()))
    }
}

fn compile_operators(
    ops: &BsonDocument,
    cfg: &QueryConfig,
    depth: usize,
) -> Result<Vec<Clause>, CompileError> {
    let options = match ops.get("$options") {
        None => None,
        Some(Bson::String(s)) => Some(s.as_str()),
        Some(_) => return Err(CompileError::bad_operand("$options", "expected a string")),
    };
    if options.is_some() && !ops.contains_key("$regex") {
        return Err(CompileError::OptionsWithoutRegex);
    }

    let mut clauses = Vec::with_capacity(ops.len());
    for (key, operand) in ops {
        match key.as_str() {
            "$not" => clauses.extend(compile_not(operand, cfg, depth)?),
            "$regex" => clauses.push(Clause::new(regex_operator(operand, options, cfg)?)),
            "$options" => {}
            _ => clauses.push(Clause::new(parse_operator(key, operand, cfg, depth)?)),
        }
    }
    Ok(clauses)
}

/// Decompose a `$not` operand into independently negated clauses.
fn compile_not(
    operand: &Bson,
    cfg: &QueryConfig,
    depth: usize,
) -> Result<Vec<Clause>, CompileError> {
    match operand {
        Bson::RegularExpression(re) => Ok(vec![Clause::negated(Operator::Regex(build_pattern(
            &re.pattern,
            &re.options,
            cfg,
        )?))]),
        Bson::Document(d) if d.is_empty() => Err(CompileError::EmptyNot),
        Bson::Document(d) => {
            let mut out = Vec::with_capacity(d.len());
            for (key, sub) in d {
                match key.as_str() {
                    "$not" => return Err(CompileError::NestedNot),
                    "$regex" | "$options" => {
                        return Err(CompileError::DisallowedInNot(key.clone()));
                    }
                    k if !is_known_operator(k) => {
                        return Err(CompileError::DisallowedInNot(key.clone()));
                    }
                    _ => out.push(Clause::negated(parse_operator(key, sub, cfg, depth)?)),
                }
            }
            Ok(out)
        }
        _ => Err(CompileError::NotRequiresDocument),
    }
}

const KNOWN_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$exists", "$type", "$size",
    "$all", "$elemMatch", "$mod",
];

fn is_known_operator(key: &str) -> bool {
    KNOWN_OPERATORS.contains(&key)
}

fn parse_operator(
    key: &str,
    operand: &Bson,
    cfg: &QueryConfig,
    depth: usize,
) -> Result<Operator, CompileError> {
    let cmp = |op| Operator::Cmp { op, value: operand.clone() };
    Ok(match key {
        "$eq" => cmp(CmpOp::Eq),
        "$ne" => cmp(CmpOp::Ne),
        "$gt" => cmp(CmpOp::Gt),
        "$gte" => cmp(CmpOp::Gte),
        "$lt" => cmp(CmpOp::Lt),
        "$lte" => cmp(CmpOp::Lte),
        "$in" => Operator::In(parse_set(key, operand, cfg)?),
        "$nin" => Operator::Nin(parse_set(key, operand, cfg)?),
        "$all" => Operator::All(parse_set(key, operand, cfg)?),
        "$exists" => Operator::Exists(value::truthy(operand)),
        "$type" => Operator::Type(parse_type_code(operand)?),
        "$size" => {
            let n = value::to_exact_i64(operand)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| CompileError::bad_operand(key, "expected a non-negative integer"))?;
            Operator::Size(n)
        }
        "$mod" => parse_mod(operand)?,
        "$elemMatch" => Operator::ElemMatch(parse_elem_match(operand, cfg, depth)?),
        other => return Err(CompileError::UnknownOperator(other.to_string())),
    })
}

fn parse_set(key: &str, operand: &Bson, cfg: &QueryConfig) -> Result<Vec<SetMember>, CompileError> {
    let Bson::Array(items) = operand else {
        return Err(CompileError::bad_operand(key, "expected an array"));
    };
    if items.len() > cfg.max_set_size {
        return Err(CompileError::bad_operand(
            key,
            format!("{} members exceeds limit {}", items.len(), cfg.max_set_size),
        ));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::RegularExpression(re) => {
                build_pattern(&re.pattern, &re.options, cfg).map(SetMember::Pattern)
            }
            Bson::Document(d) if d.keys().any(|k| k.starts_with('$')) => {
                Err(CompileError::bad_operand(key, "operators are not allowed in a value set"))
            }
            other => Ok(SetMember::Value(other.clone())),
        })
        .collect()
}

fn parse_type_code(operand: &Bson) -> Result<u8, CompileError> {
    match value::to_exact_i64(operand) {
        Some(TYPE_MIN_KEY) => Ok(0xFF),
        Some(TYPE_MAX_KEY) => Ok(0x7F),
        Some(n) if (1..=255).contains(&n) => {
            u8::try_from(n).map_err(|_| CompileError::bad_operand("$type", "out of range"))
        }
        _ => Err(CompileError::bad_operand("$type", "expected a numeric type code")),
    }
}

fn parse_mod(operand: &Bson) -> Result<Operator, CompileError> {
    let Bson::Array(parts) = operand else {
        return Err(CompileError::bad_operand("$mod", "expected [divisor, remainder]"));
    };
    let [d, r] = parts.as_slice() else {
        return Err(CompileError::bad_operand("$mod", "expected [divisor, remainder]"));
    };
    let divisor = value::to_truncated_i64(d)
        .ok_or_else(|| CompileError::bad_operand("$mod", "divisor must be a number"))?;
    if divisor == 0 {
        return Err(CompileError::bad_operand("$mod", "divisor must not be zero"));
    }
    let remainder = value::to_truncated_i64(r)
        .ok_or_else(|| CompileError::bad_operand("$mod", "remainder must be a number"))?;
    Ok(Operator::Mod { divisor, remainder })
}

fn parse_elem_match(
    operand: &Bson,
    cfg: &QueryConfig,
    depth: usize,
) -> Result<ElemMatch, CompileError> {
    let Bson::Document(d) = operand else {
        return Err(CompileError::bad_operand("$elemMatch", "expected a document"));
    };
    if d.is_empty() {
        return Err(CompileError::bad_operand("$elemMatch", "expected a non-empty document"));
    }
    if is_operator_document("$elemMatch", d)? {
        if depth + 1 > cfg.max_nesting_depth {
            return Err(CompileError::bad_operand("$elemMatch", "nesting too deep"));
        }
        Ok(ElemMatch::Value(compile_operators(d, cfg, depth + 1)?))
    } else {
        Ok(ElemMatch::Document(compile_at(d, cfg, depth + 1)?))
    }
}

fn regex_operator(
    operand: &Bson,
    options: Option<&str>,
    cfg: &QueryConfig,
) -> Result<Operator, CompileError> {
    let pattern = match operand {
        Bson::String(s) => build_pattern(s, options.unwrap_or(""), cfg)?,
        Bson::RegularExpression(re) => {
            let opts = options.unwrap_or(re.options.as_str());
            build_pattern(&re.pattern, opts, cfg)?
        }
        _ => return Err(CompileError::bad_operand("$regex", "expected a string or regex")),
    };
    Ok(Operator::Regex(pattern))
}

/// Compile a pattern with `imsx` options into a `regex::Regex`.
///
/// # Errors
/// Returns an error for unknown options, oversized patterns, or invalid syntax.
pub fn build_pattern(source: &str, options: &str, cfg: &QueryConfig) -> Result<Pattern, CompileError> {
    if source.len() > cfg.max_pattern_len {
        return Err(CompileError::bad_operand(
            "$regex",
            format!("pattern longer than {} bytes", cfg.max_pattern_len),
        ));
    }
    let mut builder = regex::RegexBuilder::new(source);
    for c in options.chars() {
        match c {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(CompileError::bad_operand("$options", format!("unsupported option '{other}'")));
            }
        };
    }
    let regex = builder.build().map_err(|e| CompileError::InvalidRegex(e.to_string()))?;
    Ok(Pattern { source: source.to_string(), options: options.to_string(), regex })
}
