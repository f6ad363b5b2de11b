//! Tag-dispatched value operations
//!
//! Every function takes operands in push order (`a` pushed before `b`) and
//! matches on the dynamic tags. No implicit int/double coercion happens.

use crate::bytecode::Opcode;
use crate::value::{RuntimeError, RuntimeErrorKind, Value};
use std::cmp::Ordering;

/// ADD, SUB, MUL, DIV, MOD
pub fn arithmetic(op: Opcode, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => int_arithmetic(op, *x, *y),
        (Value::Double(x), Value::Double(y)) => double_arithmetic(op, *x, *y),
        _ if op == Opcode::Add => concat(&a, &b),
        _ => Err(mismatch(op, &a, &b)),
    }
}

fn int_arithmetic(op: Opcode, x: i64, y: i64) -> Result<Value, RuntimeError> {
    let result = match op {
        Opcode::Add => x.wrapping_add(y),
        Opcode::Sub => x.wrapping_sub(y),
        Opcode::Mul => x.wrapping_mul(y),
        Opcode::Div | Opcode::Mod if y == 0 => {
            return Err(RuntimeError::new(
                RuntimeErrorKind::DivideByZero,
                format!("{} {} 0", x, if op == Opcode::Div { "/" } else { "%" }),
            ))
        }
        Opcode::Div => x.wrapping_div(y),
        Opcode::Mod => x.wrapping_rem(y),
        _ => return Err(RuntimeError::type_mismatch(format!("{} is not arithmetic", op))),
    };
    Ok(Value::Int(result))
}

fn double_arithmetic(op: Opcode, x: f64, y: f64) -> Result<Value, RuntimeError> {
    let result = match op {
        Opcode::Add => x + y,
        Opcode::Sub => x - y,
        Opcode::Mul => x * y,
        Opcode::Div => x / y,
        Opcode::Mod => x % y,
        _ => return Err(RuntimeError::type_mismatch(format!("{} is not arithmetic", op))),
    };
    Ok(Value::Double(result))
}

/// String/char concatenation for ADD
fn concat(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let mut joined = String::new();
    for value in [a, b] {
        match value {
            Value::String(s) => joined.push_str(s),
            Value::Char(c) => joined.push(*c),
            _ => return Err(mismatch(Opcode::Add, a, b)),
        }
    }
    Ok(Value::string(joined))
}

/// NEG
pub fn negate(a: Value) -> Result<Value, RuntimeError> {
    match a {
        Value::Int(x) => Ok(Value::Int(x.wrapping_neg())),
        Value::Double(x) => Ok(Value::Double(-x)),
        other => Err(RuntimeError::type_mismatch(format!(
            "Invalid operand for NEG: {}",
            other.type_name()
        ))),
    }
}

/// AND, OR
pub fn logic(op: Opcode, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (&a, &b, op) {
        (Value::Bool(x), Value::Bool(y), Opcode::And) => Ok(Value::Bool(*x && *y)),
        (Value::Bool(x), Value::Bool(y), Opcode::Or) => Ok(Value::Bool(*x || *y)),
        _ => Err(mismatch(op, &a, &b)),
    }
}

/// NOT
pub fn not(a: Value) -> Result<Value, RuntimeError> {
    match a {
        Value::Bool(x) => Ok(Value::Bool(!x)),
        other => Err(RuntimeError::type_mismatch(format!(
            "Invalid operand for NOT: {}",
            other.type_name()
        ))),
    }
}

/// CMPLT, CMPLE, CMPGT, CMPGE, CMPEQ, CMPNE
pub fn compare(op: Opcode, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match op {
        Opcode::CmpEq => return Ok(Value::Bool(a == b)),
        Opcode::CmpNe => return Ok(Value::Bool(a != b)),
        _ => {}
    }

    let ordering = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Some(x.cmp(y)),
        _ => return Err(mismatch(op, &a, &b)),
    };

    // NaN compares false under every ordering
    let result = match ordering {
        None => false,
        Some(ord) => match op {
            Opcode::CmpLt => ord == Ordering::Less,
            Opcode::CmpLe => ord != Ordering::Greater,
            Opcode::CmpGt => ord == Ordering::Greater,
            Opcode::CmpGe => ord != Ordering::Less,
            _ => return Err(RuntimeError::type_mismatch(format!("{} is not a comparison", op))),
        },
    };
    Ok(Value::Bool(result))
}

/// LEN
pub fn length(a: Value) -> Result<Value, RuntimeError> {
    match a {
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(RuntimeError::type_mismatch(format!(
            "Invalid operand for LEN: {}",
            other.type_name()
        ))),
    }
}

/// GETCHR: character of `string` at `index`
pub fn char_at(index: Value, string: Value) -> Result<Value, RuntimeError> {
    let (idx, s) = match (&index, &string) {
        (Value::Int(i), Value::String(s)) => (*i, s),
        _ => return Err(mismatch(Opcode::GetChr, &index, &string)),
    };
    usize::try_from(idx)
        .ok()
        .and_then(|i| s.chars().nth(i))
        .map(Value::Char)
        .ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::IndexOutOfRange,
                format!("index {} out of range for string of length {}", idx, s.chars().count()),
            )
        })
}

/// TOINT
pub fn to_int(a: Value) -> Result<Value, RuntimeError> {
    match a {
        Value::Int(x) => Ok(Value::Int(x)),
        // Truncates toward zero; saturates outside the i64 range
        Value::Double(x) => Ok(Value::Int(x as i64)),
        Value::String(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::new(
                RuntimeErrorKind::InvalidConversion,
                format!("cannot convert \"{}\" to int", s),
            )
        }),
        other => Err(RuntimeError::type_mismatch(format!(
            "Invalid operand for TOINT: {}",
            other.type_name()
        ))),
    }
}

/// TODBL
pub fn to_double(a: Value) -> Result<Value, RuntimeError> {
    match a {
        Value::Double(x) => Ok(Value::Double(x)),
        Value::Int(x) => Ok(Value::Double(x as f64)),
        Value::String(s) => s.trim().parse::<f64>().map(Value::Double).map_err(|_| {
            RuntimeError::new(
                RuntimeErrorKind::InvalidConversion,
                format!("cannot convert \"{}\" to double", s),
            )
        }),
        other => Err(RuntimeError::type_mismatch(format!(
            "Invalid operand for TODBL: {}",
            other.type_name()
        ))),
    }
}

/// TOSTR
pub fn to_string(a: Value) -> Result<Value, RuntimeError> {
    match a {
        Value::String(_) => Ok(a),
        Value::ObjectRef(_) => Err(RuntimeError::type_mismatch(
            "Invalid operand for TOSTR: object",
        )),
        other => Ok(Value::string(other.to_string())),
    }
}

fn mismatch(op: Opcode, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::type_mismatch(format!(
        "Invalid operands for {}: {} and {}",
        op,
        a.type_name(),
        b.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn s(text: &str) -> Value {
        Value::string(text)
    }

    #[rstest]
    #[case::int_add(Opcode::Add, Value::Int(3), Value::Int(4), Value::Int(7))]
    #[case::double_add(Opcode::Add, Value::Double(3.5), Value::Double(4.25), Value::Double(7.75))]
    #[case::int_div_truncates(Opcode::Div, Value::Int(7), Value::Int(2), Value::Int(3))]
    #[case::int_mod(Opcode::Mod, Value::Int(7), Value::Int(2), Value::Int(1))]
    #[case::double_div(Opcode::Div, Value::Double(5.0), Value::Double(4.0), Value::Double(1.25))]
    #[case::string_concat(Opcode::Add, s("ab"), s("cd"), s("abcd"))]
    #[case::string_char(Opcode::Add, s("ab"), Value::Char('c'), s("abc"))]
    #[case::char_string(Opcode::Add, Value::Char('a'), s("bc"), s("abc"))]
    #[case::char_char(Opcode::Add, Value::Char('a'), Value::Char('b'), s("ab"))]
    fn test_arithmetic(#[case] op: Opcode, #[case] a: Value, #[case] b: Value, #[case] expected: Value) {
        assert_eq!(arithmetic(op, a, b).unwrap(), expected);
    }

    #[rstest]
    #[case::int_plus_double(Opcode::Add, Value::Int(1), Value::Double(1.0))]
    #[case::nil_plus_int(Opcode::Add, Value::Nil, Value::Int(1))]
    #[case::string_minus_string(Opcode::Sub, s("a"), s("b"))]
    #[case::bool_times_bool(Opcode::Mul, Value::Bool(true), Value::Bool(true))]
    #[case::string_plus_int(Opcode::Add, s("a"), Value::Int(1))]
    fn test_arithmetic_mismatch(#[case] op: Opcode, #[case] a: Value, #[case] b: Value) {
        assert_eq!(
            arithmetic(op, a, b).unwrap_err().kind,
            RuntimeErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_integer_division_by_zero() {
        let err = arithmetic(Opcode::Div, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::DivideByZero);
        let err = arithmetic(Opcode::Mod, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::DivideByZero);
    }

    #[rstest]
    #[case::int_lt(Opcode::CmpLt, Value::Int(1), Value::Int(2), true)]
    #[case::int_ge(Opcode::CmpGe, Value::Int(1), Value::Int(2), false)]
    #[case::double_le(Opcode::CmpLe, Value::Double(2.0), Value::Double(2.0), true)]
    #[case::string_lex(Opcode::CmpLt, s("abc"), s("abd"), true)]
    #[case::string_gt(Opcode::CmpGt, s("b"), s("abc"), true)]
    #[case::char_le(Opcode::CmpLe, Value::Char('a'), Value::Char('b'), true)]
    #[case::nil_eq_nil(Opcode::CmpEq, Value::Nil, Value::Nil, true)]
    #[case::nil_ne_int(Opcode::CmpNe, Value::Nil, Value::Int(0), true)]
    #[case::int_eq_double(Opcode::CmpEq, Value::Int(1), Value::Double(1.0), false)]
    #[case::string_eq(Opcode::CmpEq, s("x"), s("x"), true)]
    #[case::object_ne(Opcode::CmpNe, Value::ObjectRef(1111), Value::ObjectRef(1112), true)]
    fn test_compare(#[case] op: Opcode, #[case] a: Value, #[case] b: Value, #[case] expected: bool) {
        assert_eq!(compare(op, a, b).unwrap(), Value::Bool(expected));
    }

    #[test]
    fn test_ordering_across_tags_is_error() {
        let err = compare(Opcode::CmpLt, Value::Int(1), Value::Double(2.0)).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::TypeMismatch);
        let err = compare(Opcode::CmpLt, Value::Nil, Value::Nil).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::TypeMismatch);
    }

    #[test]
    fn test_logic_requires_bools() {
        assert_eq!(
            logic(Opcode::And, Value::Bool(true), Value::Bool(false)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            logic(Opcode::Or, Value::Bool(false), Value::Bool(true)).unwrap(),
            Value::Bool(true)
        );
        assert!(logic(Opcode::And, Value::Int(1), Value::Bool(true)).is_err());
        assert!(not(Value::Nil).is_err());
    }

    #[test]
    fn test_char_at_bounds() {
        assert_eq!(char_at(Value::Int(0), s("foobar")).unwrap(), Value::Char('f'));
        assert_eq!(char_at(Value::Int(5), s("foobar")).unwrap(), Value::Char('r'));
        for bad in [6, -1] {
            assert_eq!(
                char_at(Value::Int(bad), s("foobar")).unwrap_err().kind,
                RuntimeErrorKind::IndexOutOfRange
            );
        }
    }

    #[rstest]
    #[case::string_to_int(to_int(s("42")), Value::Int(42))]
    #[case::double_to_int(to_int(Value::Double(-2.9)), Value::Int(-2))]
    #[case::string_to_double(to_double(s("2.5")), Value::Double(2.5))]
    #[case::int_to_double(to_double(Value::Int(4)), Value::Double(4.0))]
    #[case::int_to_string(to_string(Value::Int(8)), s("8"))]
    #[case::double_to_string(to_string(Value::Double(3.0)), s("3.0"))]
    fn test_conversions(#[case] result: Result<Value, RuntimeError>, #[case] expected: Value) {
        assert_eq!(result.unwrap(), expected);
    }

    #[test]
    fn test_malformed_conversions() {
        assert_eq!(
            to_int(s("bar")).unwrap_err().kind,
            RuntimeErrorKind::InvalidConversion
        );
        assert_eq!(
            to_double(s("bar")).unwrap_err().kind,
            RuntimeErrorKind::InvalidConversion
        );
    }

    proptest! {
        #[test]
        fn prop_int_add_matches_wrapping(x in any::<i64>(), y in any::<i64>()) {
            prop_assert_eq!(
                arithmetic(Opcode::Add, Value::Int(x), Value::Int(y)).unwrap(),
                Value::Int(x.wrapping_add(y))
            );
        }

        #[test]
        fn prop_mixed_numeric_never_coerces(x in any::<i64>(), y in any::<f64>()) {
            for op in [Opcode::Add, Opcode::Sub, Opcode::Mul, Opcode::Div, Opcode::Mod] {
                let err = arithmetic(op, Value::Int(x), Value::Double(y)).unwrap_err();
                prop_assert_eq!(err.kind, RuntimeErrorKind::TypeMismatch);
            }
        }

        #[test]
        fn prop_int_string_round_trip(x in any::<i64>()) {
            let text = to_string(Value::Int(x)).unwrap();
            prop_assert_eq!(to_int(text).unwrap(), Value::Int(x));
        }
    }
}
