//! Tagged value tree shared by requests and responses

use std::fmt;

/// An XML-RPC value
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    String(String),
    Int(i64),
    Double(f64),
    Boolean(bool),
    Struct(Vec<RpcMember>),
    Array(Vec<RpcValue>),
}

/// A named struct member
#[derive(Debug, Clone, PartialEq)]
pub struct RpcMember {
    pub name: String,
    pub value: RpcValue,
}

impl RpcMember {
    pub fn new(name: impl Into<String>, value: impl Into<RpcValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl RpcValue {
    /// Look up a member by name, case-insensitively.
    ///
    /// Structs are searched member by member and arrays item by item, so
    /// `{"data": [{"IDSubtitleFile": ..}]}` answers `find("data")` but the
    /// nested struct is only reached through the returned array. Member
    /// values are not descended into.
    pub fn find(&self, name: &str) -> Option<&RpcValue> {
        match self {
            Self::Struct(members) => members
                .iter()
                .find(|member| member.name.eq_ignore_ascii_case(name))
                .map(|member| &member.value),
            Self::Array(items) => items.iter().find_map(|item| item.find(name)),
            _ => None,
        }
    }

    /// String content; numbers are not converted
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content; numeric strings are accepted since the service
    /// sends most ids as strings
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RpcValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[RpcMember]> {
        match self {
            Self::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Convenience for `find(name)` followed by [`as_str`](Self::as_str)
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(Self::as_str)
    }

    /// XML-RPC element name for the scalar variants
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::Struct(_) => "struct",
            Self::Array(_) => "array",
        }
    }
}

impl fmt::Display for RpcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{}", u8::from(*value)),
            Self::Struct(members) => {
                write!(f, "{{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}' => '{}'", member.name, member.value)?;
                }
                write!(f, "}}")
            }
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for RpcValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RpcValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for RpcValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for RpcValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for RpcValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for RpcValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}
