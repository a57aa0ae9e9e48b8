//! Literal values, their types, and typed interfaces.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named literal values, e.g. the inputs or outputs of one invocation.
pub type LiteralMap = IndexMap<String, Literal>;

/// The declared type of an input or output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralType {
    Integer,
    Float,
    String,
    Boolean,
    Blob,
    List(Box<LiteralType>),
    Map(Box<LiteralType>),
}

impl LiteralType {
    pub fn list(item: LiteralType) -> Self {
        LiteralType::List(Box::new(item))
    }

    pub fn map(value: LiteralType) -> Self {
        LiteralType::Map(Box::new(value))
    }
}

impl Display for LiteralType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LiteralType::Integer => f.write_str("integer"),
            LiteralType::Float => f.write_str("float"),
            LiteralType::String => f.write_str("string"),
            LiteralType::Boolean => f.write_str("boolean"),
            LiteralType::Blob => f.write_str("blob"),
            LiteralType::List(item) => write!(f, "list<{item}>"),
            LiteralType::Map(value) => write!(f, "map<{value}>"),
        }
    }
}

/// A concrete value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Blob { uri: String },
    List(Vec<Literal>),
    Map(IndexMap<String, Literal>),
}

impl Literal {
    /// Infers the type of this value.
    ///
    /// Returns `None` for empty collections and for collections whose items
    /// disagree, since no single type describes them.
    pub fn literal_type(&self) -> Option<LiteralType> {
        match self {
            Literal::Integer(_) => Some(LiteralType::Integer),
            Literal::Float(_) => Some(LiteralType::Float),
            Literal::String(_) => Some(LiteralType::String),
            Literal::Boolean(_) => Some(LiteralType::Boolean),
            Literal::Blob { .. } => Some(LiteralType::Blob),
            Literal::List(items) => common_type(items.iter()).map(LiteralType::list),
            Literal::Map(entries) => common_type(entries.values()).map(LiteralType::map),
        }
    }

    /// Recursive type check against a declared type.
    pub fn conforms_to(&self, ty: &LiteralType) -> bool {
        match (self, ty) {
            (Literal::Integer(_), LiteralType::Integer)
            | (Literal::Float(_), LiteralType::Float)
            | (Literal::String(_), LiteralType::String)
            | (Literal::Boolean(_), LiteralType::Boolean)
            | (Literal::Blob { .. }, LiteralType::Blob) => true,
            (Literal::List(items), LiteralType::List(item)) => {
                items.iter().all(|lit| lit.conforms_to(item))
            }
            (Literal::Map(entries), LiteralType::Map(value)) => {
                entries.values().all(|lit| lit.conforms_to(value))
            }
            _ => false,
        }
    }

    /// Short description used in error messages when no type can be inferred.
    pub(crate) fn describe(&self) -> String {
        match (self.literal_type(), self) {
            (Some(ty), _) => ty.to_string(),
            (None, Literal::Map(_)) => "map<?>".to_string(),
            (None, _) => "list<?>".to_string(),
        }
    }
}

fn common_type<'a>(mut items: impl Iterator<Item = &'a Literal>) -> Option<LiteralType> {
    let first = items.next()?.literal_type()?;
    for item in items {
        if item.literal_type()? != first {
            return None;
        }
    }
    Some(first)
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl<T: Into<Literal>> From<Vec<T>> for Literal {
    fn from(value: Vec<T>) -> Self {
        Literal::List(value.into_iter().map(Into::into).collect())
    }
}

/// A declared input: its type and optional default value.
///
/// An input is required exactly when it has no default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub ty: LiteralType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
}

impl Parameter {
    pub fn required(ty: LiteralType) -> Self {
        Self { ty, default: None }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Ordered, named inputs and outputs of a task, graph or launch plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypedInterface {
    #[serde(default)]
    pub inputs: IndexMap<String, Parameter>,
    #[serde(default)]
    pub outputs: IndexMap<String, LiteralType>,
}

impl TypedInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: impl Into<String>, ty: LiteralType) -> Self {
        self.inputs.insert(name.into(), Parameter::required(ty));
        self
    }

    pub fn with_default(
        mut self,
        name: impl Into<String>,
        ty: LiteralType,
        default: impl Into<Literal>,
    ) -> Self {
        self.inputs.insert(
            name.into(),
            Parameter {
                ty,
                default: Some(default.into()),
            },
        );
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, ty: LiteralType) -> Self {
        self.outputs.insert(name.into(), ty);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conformance() {
        assert!(Literal::Integer(3).conforms_to(&LiteralType::Integer));
        assert!(!Literal::Integer(3).conforms_to(&LiteralType::Float));
        assert!(Literal::from("x").conforms_to(&LiteralType::String));
    }

    #[test]
    fn test_nested_conformance() {
        let lit = Literal::from(vec![1i64, 2, 3]);
        assert!(lit.conforms_to(&LiteralType::list(LiteralType::Integer)));
        assert!(!lit.conforms_to(&LiteralType::list(LiteralType::String)));

        // An empty list conforms to any list type.
        assert!(Literal::List(vec![]).conforms_to(&LiteralType::list(LiteralType::Blob)));
    }

    #[test]
    fn test_inferred_types() {
        let mixed = Literal::List(vec![Literal::Integer(1), Literal::from("a")]);
        assert_eq!(mixed.literal_type(), None);
        assert_eq!(mixed.describe(), "list<?>");

        let mut map = IndexMap::new();
        map.insert("k".to_string(), Literal::Boolean(true));
        assert_eq!(
            Literal::Map(map).literal_type(),
            Some(LiteralType::map(LiteralType::Boolean))
        );
    }

    #[test]
    fn test_interface_required_inputs() {
        let iface = TypedInterface::new()
            .with_input("a", LiteralType::Integer)
            .with_default("b", LiteralType::String, "hello")
            .with_output("o", LiteralType::Integer);

        assert!(iface.inputs["a"].is_required());
        assert!(!iface.inputs["b"].is_required());
        assert_eq!(iface.outputs["o"], LiteralType::Integer);
    }
}
