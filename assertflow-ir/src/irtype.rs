//! Each of the valid `Value` types.
//!
//! The analysed procedures only ever need a handful of scalar types, so unlike richer IRs there is
//! no aggregate or pointer support and [`Type`] is a plain `Copy` enum rather than a handle into
//! the [`Context`](crate::Context).

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Type {
    Unit,
    Bool,
    Uint64,
    StringSlice,
}

impl Type {
    /// Returns a string representation of the type, as used by the printer and the parser.
    pub fn as_string(&self) -> String {
        match self {
            Type::Unit => "()",
            Type::Bool => "bool",
            Type::Uint64 => "u64",
            Type::StringSlice => "str",
        }
        .into()
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_uint(&self) -> bool {
        matches!(self, Type::Uint64)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_string())
    }
}
