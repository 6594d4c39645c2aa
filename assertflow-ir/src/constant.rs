//! [`Constant`] is a typed constant value.

use crate::{context::Context, irtype::Type, value::Value};

/// A [`Type`] and constant value, including [`ConstantValue::Unit`] for when the value is not
/// required.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    pub ty: Type,
    pub value: ConstantValue,
}

/// A constant representation of each of the supported [`Type`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    Unit,
    Bool(bool),
    Uint(u64),
    String(Vec<u8>),
}

impl Constant {
    pub fn new_unit() -> Self {
        Constant {
            ty: Type::Unit,
            value: ConstantValue::Unit,
        }
    }

    pub fn new_bool(b: bool) -> Self {
        Constant {
            ty: Type::Bool,
            value: ConstantValue::Bool(b),
        }
    }

    pub fn new_uint(n: u64) -> Self {
        Constant {
            ty: Type::Uint64,
            value: ConstantValue::Uint(n),
        }
    }

    pub fn new_string(string: Vec<u8>) -> Self {
        Constant {
            ty: Type::StringSlice,
            value: ConstantValue::String(string),
        }
    }

    pub fn get_bool(context: &mut Context, value: bool) -> Value {
        Value::new_constant(context, Constant::new_bool(value))
    }

    pub fn get_uint(context: &mut Context, value: u64) -> Value {
        Value::new_constant(context, Constant::new_uint(value))
    }

    pub fn get_string(context: &mut Context, value: Vec<u8>) -> Value {
        Value::new_constant(context, Constant::new_string(value))
    }

    /// Returns the boolean inside this constant, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            ConstantValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the tag and value of this constant as a string, suitable for the printer.
    pub fn as_lit_string(&self) -> String {
        match &self.value {
            ConstantValue::Unit => "() ()".into(),
            ConstantValue::Bool(b) => format!("bool {}", if *b { "true" } else { "false" }),
            ConstantValue::Uint(v) => format!("u64 {v}"),
            ConstantValue::String(bs) => format!(
                "str \"{}\"",
                bs.iter()
                    .map(|b| {
                        if b.is_ascii() && !b.is_ascii_control() && *b != b'\\' && *b != b'"' {
                            format!("{}", *b as char)
                        } else {
                            format!("\\x{b:02x}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("")
            ),
        }
    }
}
