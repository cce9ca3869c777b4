use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;

use super::Variables;
use crate::record::FieldKey;

/// Argument value of a compiled field, possibly referencing variables
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    Literal(Value),
    Variable(String),
    Object(BTreeMap<String, ArgumentValue>),
    List(Vec<ArgumentValue>),
}

impl ArgumentValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        ArgumentValue::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        ArgumentValue::Variable(name.into())
    }

    /// Substitutes variables. An undefined variable resolves to `null`.
    pub fn resolve(
        &self,
        variables: &Variables,
    ) -> Value {
        match self {
            ArgumentValue::Literal(v) => v.clone(),
            ArgumentValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
            ArgumentValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.resolve(variables)))
                    .collect(),
            ),
            ArgumentValue::List(items) => {
                Value::Array(items.iter().map(|v| v.resolve(variables)).collect())
            }
        }
    }
}

/// `@include(if: $var)` / `@skip(if: $var)` directive on a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub variable: String,
    /// true for `@skip`
    pub inverted: bool,
}

impl Condition {
    pub fn include_if(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            inverted: false,
        }
    }

    pub fn skip_if(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            inverted: true,
        }
    }

    fn evaluate(
        &self,
        variables: &Variables,
    ) -> bool {
        let value = variables.get(&self.variable).and_then(Value::as_bool).unwrap_or(false);
        value != self.inverted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompiledSelection {
    Field(CompiledField),
    Fragment(CompiledFragment),
}

impl From<CompiledField> for CompiledSelection {
    fn from(field: CompiledField) -> Self {
        CompiledSelection::Field(field)
    }
}

impl From<CompiledFragment> for CompiledSelection {
    fn from(fragment: CompiledFragment) -> Self {
        CompiledSelection::Fragment(fragment)
    }
}

/// A field of a selection set. Object-typed fields carry sub-selections,
/// leaf fields carry none.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledField {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: BTreeMap<String, ArgumentValue>,
    pub conditions: Vec<Condition>,
    pub selections: Vec<CompiledSelection>,
}

impl CompiledField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: BTreeMap::new(),
            conditions: Vec::new(),
            selections: Vec::new(),
        }
    }

    pub fn alias(
        mut self,
        alias: impl Into<String>,
    ) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(
        mut self,
        name: impl Into<String>,
        value: ArgumentValue,
    ) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn condition(
        mut self,
        condition: Condition,
    ) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn selections<I, S>(
        mut self,
        selections: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompiledSelection>,
    {
        self.selections = selections.into_iter().map(Into::into).collect();
        self
    }

    /// Key of this field in response objects
    pub fn response_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_composite(&self) -> bool {
        !self.selections.is_empty()
    }

    pub fn should_include(
        &self,
        variables: &Variables,
    ) -> bool {
        self.conditions.iter().all(|c| c.evaluate(variables))
    }

    /// Resolved argument values, keyed by argument name
    pub fn resolve_arguments(
        &self,
        variables: &Variables,
    ) -> Map<String, Value> {
        self.arguments
            .iter()
            .map(|(name, value)| (name.clone(), value.resolve(variables)))
            .collect()
    }

    /// Field key inside a record: the field name, followed by the
    /// canonically encoded arguments when there are any, e.g.
    /// `hero({"episode":"JEDI"})`.
    pub fn field_key(
        &self,
        variables: &Variables,
    ) -> FieldKey {
        if self.arguments.is_empty() {
            return self.name.clone();
        }
        let arguments = canonicalize(Value::Object(self.resolve_arguments(variables)));
        format!("{}({})", self.name, arguments)
    }
}

/// Inline fragment or fragment spread, applied when the object's
/// `__typename` is one of `possible_types`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFragment {
    pub type_condition: String,
    pub possible_types: Vec<String>,
    pub selections: Vec<CompiledSelection>,
}

impl CompiledFragment {
    pub fn new(type_condition: impl Into<String>) -> Self {
        let type_condition = type_condition.into();
        Self {
            possible_types: vec![type_condition.clone()],
            type_condition,
            selections: Vec::new(),
        }
    }

    pub fn possible_types<I, S>(
        mut self,
        types: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn selections<I, S>(
        mut self,
        selections: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompiledSelection>,
    {
        self.selections = selections.into_iter().map(Into::into).collect();
        self
    }

    pub fn applies_to(
        &self,
        typename: &str,
    ) -> bool {
        self.possible_types.iter().any(|t| t == typename)
    }
}

/// Encodes a JSON value with object keys sorted at every depth, so that
/// argument order in the document never changes a field key.
pub(crate) fn canonicalize(value: Value) -> String {
    fn sort(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, sort(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.into_iter().map(sort).collect()),
            other => other,
        }
    }
    sort(value).to_string()
}
