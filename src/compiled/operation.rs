use serde::Deserialize;
use serde::Serialize;

use super::CompiledSelection;
use super::Variables;
use crate::constants::MUTATION_ROOT_KEY;
use crate::constants::QUERY_ROOT_KEY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    /// Record key under which the operation's root fields are normalized
    pub fn root_key(&self) -> &'static str {
        match self {
            OperationKind::Query => QUERY_ROOT_KEY,
            OperationKind::Mutation => MUTATION_ROOT_KEY,
        }
    }
}

/// A compiled operation together with the variables of one execution
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: String,
    pub document: String,
    pub selections: Vec<CompiledSelection>,
    pub variables: Variables,
}

impl Operation {
    pub fn query(
        name: impl Into<String>,
        document: impl Into<String>,
    ) -> Self {
        Self::new(OperationKind::Query, name, document)
    }

    pub fn mutation(
        name: impl Into<String>,
        document: impl Into<String>,
    ) -> Self {
        Self::new(OperationKind::Mutation, name, document)
    }

    fn new(
        kind: OperationKind,
        name: impl Into<String>,
        document: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            document: document.into(),
            selections: Vec::new(),
            variables: Variables::new(),
        }
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

    pub fn variable(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn root_key(&self) -> &'static str {
        self.kind.root_key()
    }
}
