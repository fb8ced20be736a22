//! Value model: canonical type ranks, a total order over `Bson`, and the public
//! element-type codes used by `$type`.

use bson::{Bson, Decimal128, Document as BsonDocument};
use std::cmp::Ordering;

/// BSON element-type code for MinKey as accepted by `$type`.
pub const TYPE_MIN_KEY: i64 = -1;
/// BSON element-type code for MaxKey as accepted by `$type`.
pub const TYPE_MAX_KEY: i64 = 127;

/// Stable element-type code of a value (double=1, string=2, object=3, array=4, ...).
///
/// MinKey (0xFF) is reported as 255 so that the code fits in a `u8`.
#[must_use]
pub fn type_tag(v: &Bson) -> u8 {
    v.element_type() as u8
}

/// Rank used to order values of different types. Numeric types share a rank, as do
/// string and symbol, so that they compare by value rather than by representation.
#[must_use]
pub fn canonical_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::MinKey => 0,
        T::Null | T::Undefined => 5,
        T::Int32(_) | T::Int64(_) | T::Double(_) | T::Decimal128(_) => 10,
        T::String(_) | T::Symbol(_) => 15,
        T::Document(_) => 20,
        T::Array(_) => 25,
        T::Binary(_) => 30,
        T::ObjectId(_) => 35,
        T::Boolean(_) => 40,
        T::DateTime(_) => 45,
        T::Timestamp(_) => 47,
        T::RegularExpression(_) => 50,
        T::DbPointer(_) => 55,
        T::JavaScriptCode(_) => 60,
        T::JavaScriptCodeWithScope(_) => 65,
        T::MaxKey => 100,
    }
}

#[must_use]
pub fn is_number(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn to_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Integral view of a number; doubles must carry no fractional part.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
#[must_use]
pub fn to_exact_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.is_finite() && f.trunc() == *f => Some(*f as i64),
        _ => None,
    }
}

/// Truncating integral view of a number, as used by `$mod`.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn to_truncated_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.is_finite() => Some(f.trunc() as i64),
        _ => None,
    }
}

/// Truthiness of an operand such as the one given to `$exists`.
#[must_use]
pub fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Decimal128(d) => !matches!(decode_decimal(d), Dec::Finite { coeff: 0, .. }),
        other => to_f64(other).is_none_or(|f| f != 0.0),
    }
}

/// Total order across every value variant: canonical rank first, then a
/// type-specific comparison within the rank.
#[must_use]
pub fn compare(a: &Bson, b: &Bson) -> Ordering {
    let (ra, rb) = (canonical_rank(a), canonical_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    compare_same_rank(a, b)
}

/// Comparison restricted to values of the same canonical type. Range operators
/// use this so that `{$gt: "a"}` never matches a number.
#[must_use]
pub fn compare_bracketed(a: &Bson, b: &Bson) -> Option<Ordering> {
    (canonical_rank(a) == canonical_rank(b)).then(|| compare_same_rank(a, b))
}

#[must_use]
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    compare(a, b) == Ordering::Equal
}

pub fn compare_documents(a: &BsonDocument, b: &BsonDocument) -> Ordering {
    let mut ia = a.iter();
    let mut ib = b.iter();
    loop {
        match (ia.next(), ib.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some((ka, va)), Some((kb, vb))) => {
                let ord = compare(va, vb).then_with(|| ka.cmp(kb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_arrays(a: &[Bson], b: &[Bson]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = compare(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_numbers(a: &Bson, b: &Bson) -> Ordering {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => i64::from(*x).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&i64::from(*y)),
        (Bson::Decimal128(x), Bson::Decimal128(y)) => compare_decimals(x, y),
        // Decimal128 has no lossless f64 view; decimals sort below every other number
        (Bson::Decimal128(_), _) => Ordering::Less,
        (_, Bson::Decimal128(_)) => Ordering::Greater,
        _ => {
            let x = to_f64(a).unwrap_or(f64::NAN);
            let y = to_f64(b).unwrap_or(f64::NAN);
            match (x.is_nan(), y.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            }
        }
    }
}

const DECIMAL_EXPONENT_BIAS: i32 = 6176;
const DECIMAL_MAX_COEFF: u128 = 10u128.pow(34) - 1;

/// Decoded IEEE 754-2008 decimal128 (BID encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dec {
    Nan,
    Inf { neg: bool },
    Finite { neg: bool, coeff: u128, exp: i32 },
}

impl Dec {
    const fn order_class(self) -> u8 {
        match self {
            Self::Nan => 0,
            Self::Inf { neg: true } => 1,
            Self::Finite { .. } => 2,
            Self::Inf { neg: false } => 3,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn decode_decimal(d: &Decimal128) -> Dec {
    let bits = u128::from_le_bytes(d.bytes());
    let neg = bits >> 127 == 1;
    match (bits >> 122) & 0x1f {
        0x1f => return Dec::Nan,
        0x1e => return Dec::Inf { neg },
        _ => {}
    }
    let (exp_bits, coeff) = if (bits >> 125) & 0b11 == 0b11 {
        // implied 0b100 prefix puts the coefficient above 10^34: non-canonical, reads as zero
        ((bits >> 111) & 0x3fff, 0)
    } else {
        ((bits >> 113) & 0x3fff, bits & ((1u128 << 113) - 1))
    };
    let coeff = if coeff > DECIMAL_MAX_COEFF { 0 } else { coeff };
    Dec::Finite { neg, coeff, exp: exp_bits as i32 - DECIMAL_EXPONENT_BIAS }
}

fn digit_count(mut c: u128) -> u32 {
    let mut n = 1;
    while c >= 10 {
        c /= 10;
        n += 1;
    }
    n
}

/// Compare `c1 * 10^e1` with `c2 * 10^e2` for coefficients below 10^34.
#[allow(clippy::cast_possible_wrap)]
fn compare_magnitudes(c1: u128, e1: i32, c2: u128, e2: i32) -> Ordering {
    if c1 == 0 || c2 == 0 {
        return c1.cmp(&c2);
    }
    let (d1, d2) = (digit_count(c1), digit_count(c2));
    let (adj1, adj2) = (e1 + d1 as i32, e2 + d2 as i32);
    if adj1 != adj2 {
        return adj1.cmp(&adj2);
    }
    // same leading-digit position: pad the shorter coefficient, stays below 10^34
    if d1 < d2 {
        (c1 * 10u128.pow(d2 - d1)).cmp(&c2)
    } else {
        c1.cmp(&(c2 * 10u128.pow(d1 - d2)))
    }
}

/// Exact order over decimal128 values: NaN < -inf < finite < +inf, with
/// `1.0 == 1` and `-0 == 0`.
fn compare_decimals(a: &Decimal128, b: &Decimal128) -> Ordering {
    match (decode_decimal(a), decode_decimal(b)) {
        (
            Dec::Finite { neg: n1, coeff: c1, exp: e1 },
            Dec::Finite { neg: n2, coeff: c2, exp: e2 },
        ) => {
            let sign = |neg: bool, c: u128| match (c, neg) {
                (0, _) => 0i8,
                (_, true) => -1,
                (_, false) => 1,
            };
            let (s1, s2) = (sign(n1, c1), sign(n2, c2));
            if s1 != s2 {
                return s1.cmp(&s2);
            }
            let mag = compare_magnitudes(c1, e1, c2, e2);
            if s1 < 0 { mag.reverse() } else { mag }
        }
        (x, y) => x.order_class().cmp(&y.order_class()),
    }
}

fn str_of(v: &Bson) -> &str {
    match v {
        Bson::String(s) | Bson::Symbol(s) => s,
        _ => "",
    }
}

fn compare_same_rank(a: &Bson, b: &Bson) -> Ordering {
    use bson::Bson as T;
    if is_number(a) {
        return compare_numbers(a, b);
    }
    match (a, b) {
        (T::String(_) | T::Symbol(_), T::String(_) | T::Symbol(_)) => str_of(a).cmp(str_of(b)),
        (T::Document(x), T::Document(y)) => compare_documents(x, y),
        (T::Array(x), T::Array(y)) => compare_arrays(x, y),
        (T::Binary(x), T::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then_with(|| u8::from(x.subtype).cmp(&u8::from(y.subtype)))
            .then_with(|| x.bytes.cmp(&y.bytes)),
        (T::ObjectId(x), T::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (T::Boolean(x), T::Boolean(y)) => x.cmp(y),
        (T::Timestamp(x), T::Timestamp(y)) => {
            x.time.cmp(&y.time).then_with(|| x.increment.cmp(&y.increment))
        }
        (T::DateTime(x), T::DateTime(y)) => x.cmp(y),
        (T::RegularExpression(x), T::RegularExpression(y)) => {
            x.pattern.cmp(&y.pattern).then_with(|| x.options.cmp(&y.options))
        }
        (T::JavaScriptCode(x), T::JavaScriptCode(y)) => x.cmp(y),
        (T::JavaScriptCodeWithScope(x), T::JavaScriptCodeWithScope(y)) => {
            x.code.cmp(&y.code).then_with(|| compare_documents(&x.scope, &y.scope))
        }
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Regex, Timestamp, doc};

    fn dec(neg: bool, coeff: u128, exp: i32) -> Bson {
        let biased = u128::try_from(exp + DECIMAL_EXPONENT_BIAS).unwrap();
        let bits = (u128::from(neg) << 127) | (biased << 113) | coeff;
        Bson::Decimal128(Decimal128::from_bytes(bits.to_le_bytes()))
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert_eq!(compare(&Bson::Int32(1), &Bson::Double(1.0)), Ordering::Equal);
        assert_eq!(compare(&Bson::Int64(2), &Bson::Double(1.5)), Ordering::Greater);
        assert!(values_equal(&Bson::Int32(7), &Bson::Int64(7)));
    }

    #[test]
    fn type_rank_orders_mixed_types() {
        let null = Bson::Null;
        let num = Bson::Int32(100);
        let s = Bson::String("a".into());
        let obj = Bson::Document(doc! {"a": 1});
        let arr = Bson::Array(vec![Bson::Int32(1)]);
        let b = Bson::Boolean(false);
        assert_eq!(compare(&Bson::MinKey, &null), Ordering::Less);
        assert_eq!(compare(&null, &num), Ordering::Less);
        assert_eq!(compare(&num, &s), Ordering::Less);
        assert_eq!(compare(&s, &obj), Ordering::Less);
        assert_eq!(compare(&obj, &arr), Ordering::Less);
        assert_eq!(compare(&arr, &b), Ordering::Less);
        assert_eq!(compare(&b, &Bson::MaxKey), Ordering::Less);
    }

    #[test]
    fn bracketed_compare_rejects_cross_type() {
        assert_eq!(compare_bracketed(&Bson::Int32(1), &Bson::String("a".into())), None);
        assert_eq!(
            compare_bracketed(&Bson::String("b".into()), &Bson::String("a".into())),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn arrays_compare_elementwise_then_length() {
        let a = Bson::Array(vec!["a".into(), "b".into()]);
        let b = Bson::Array(vec!["a".into(), "c".into()]);
        let c = Bson::Array(vec!["a".into()]);
        assert_eq!(compare(&a, &b), Ordering::Less);
        assert_eq!(compare(&c, &a), Ordering::Less);
    }

    #[test]
    fn type_tags_follow_element_codes() {
        assert_eq!(type_tag(&Bson::Double(1.0)), 1);
        assert_eq!(type_tag(&Bson::String("x".into())), 2);
        assert_eq!(type_tag(&Bson::Document(doc! {})), 3);
        assert_eq!(type_tag(&Bson::Array(vec![])), 4);
        assert_eq!(type_tag(&Bson::Boolean(true)), 8);
        assert_eq!(type_tag(&Bson::Null), 10);
        let re = Bson::RegularExpression(Regex { pattern: "a".into(), options: String::new() });
        assert_eq!(type_tag(&re), 11);
        assert_eq!(type_tag(&Bson::Int32(1)), 16);
        assert_eq!(type_tag(&Bson::Int64(1)), 18);
        assert_eq!(type_tag(&Bson::MaxKey), 127);
    }

    #[test]
    fn truthiness() {
        assert!(truthy(&Bson::Boolean(true)));
        assert!(!truthy(&Bson::Int32(0)));
        assert!(truthy(&Bson::Double(2.5)));
        assert!(!truthy(&Bson::Null));
        assert!(truthy(&Bson::String(String::new())));
    }

    #[test]
    fn distinct_decimals_are_not_equal() {
        let one = Bson::Decimal128(Decimal128::from_bytes([1; 16]));
        let two = Bson::Decimal128(Decimal128::from_bytes([2; 16]));
        assert!(!values_equal(&one, &two));
        assert!(!crate::matches_query(&doc! {"i": two.clone()}, &doc! {"i": one.clone()}).unwrap());
        assert!(crate::matches_query(&doc! {"i": two.clone()}, &doc! {"i": two}).unwrap());
    }

    #[test]
    fn decimals_order_by_value() {
        assert_eq!(compare(&dec(false, 1, 0), &dec(false, 10, -1)), Ordering::Equal);
        assert_eq!(compare(&dec(false, 1, 0), &dec(false, 2, 0)), Ordering::Less);
        assert_eq!(compare(&dec(false, 15, -1), &dec(false, 2, 0)), Ordering::Less);
        assert_eq!(compare(&dec(false, 1, 3), &dec(false, 999, 0)), Ordering::Greater);
        assert_eq!(compare(&dec(true, 5, 0), &dec(false, 1, 0)), Ordering::Less);
        assert_eq!(compare(&dec(true, 5, 0), &dec(true, 1, 0)), Ordering::Less);
        assert_eq!(compare(&dec(true, 0, 0), &dec(false, 0, 4)), Ordering::Equal);
        // decimals sit below the other numeric representations
        assert_eq!(compare(&dec(false, 9, 0), &Bson::Double(f64::NAN)), Ordering::Less);
        assert!(!truthy(&dec(false, 0, 2)));
        assert!(truthy(&dec(false, 3, 0)));
    }

    #[test]
    fn timestamps_rank_after_dates() {
        let date = Bson::DateTime(bson::DateTime::from_millis(1000));
        let t0 = Bson::Timestamp(Timestamp { time: 1, increment: 0 });
        let t5 = Bson::Timestamp(Timestamp { time: 1, increment: 5 });
        assert_eq!(compare(&t0, &t5), Ordering::Less);
        assert_eq!(compare(&date, &t0), Ordering::Less);
        assert_eq!(compare(&date, &t5), Ordering::Less);
        assert_eq!(compare_bracketed(&date, &t0), None);
    }
}
