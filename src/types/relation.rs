//! Merge relations between named variables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::host::{GraphHost, NodeSpec};
use super::variable::Variable;

/// Binary rule combining two named variables into a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Name matched by the A slot.
    #[serde(rename = "a")]
    pub name_a: String,
    /// Name (or alias) matched by the B slot.
    #[serde(rename = "b")]
    pub name_b: String,
    /// Merge operation (`plus`, `over`, ...).
    pub operation: String,
    /// Name of the resulting variable. Unnamed results cannot be matched again.
    #[serde(rename = "result", default, skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
}

impl Relation {
    /// Create a relation.
    pub fn new(
        name_a: impl Into<String>,
        name_b: impl Into<String>,
        operation: impl Into<String>,
        result_name: Option<String>,
    ) -> Self {
        Self {
            name_a: name_a.into(),
            name_b: name_b.into(),
            operation: operation.into(),
            result_name,
        }
    }

    /// Whether the variable's name equals the A name.
    pub fn is_valid_for_a(&self, var: &Variable) -> bool {
        var.name() == self.name_a
    }

    /// Whether the variable's name equals the B name.
    pub fn is_valid_for_b(&self, var: &Variable) -> bool {
        var.name() == self.name_b
    }

    /// Whether one of the variable's aliases equals the B name.
    pub fn alias_is_valid_for_b(&self, var: &Variable) -> bool {
        var.has_alias(&self.name_b)
    }

    /// Display name of the merge node: `<A>_<op>_<B>`.
    pub fn node_name(&self) -> String {
        format!("{}_{}_{}", self.name_a, self.operation, self.name_b)
    }

    /// Display name of the pass-through dot inserted before B.
    pub fn passthrough_name(&self, a: &Variable, b: &Variable) -> String {
        format!("dot_{}{}{}", a.name(), self.operation, b.name())
    }

    /// Create the merge node for `a` and `b` and return the result variable.
    ///
    /// The node takes `[B, A]` as inputs. The result sits one step after the
    /// deeper of its operands.
    pub fn process<H: GraphHost>(
        &self,
        host: &mut H,
        a: &Variable,
        b: &Variable,
    ) -> PipelineResult<Variable> {
        let node_a = a.require_node()?;
        let node_b = b.require_node()?;
        let node = host
            .create_node(
                NodeSpec::merge(&self.operation)
                    .named(self.node_name())
                    .inputs([node_b, node_a]),
            )
            .map_err(PipelineError::from_host)?;

        let step = a.step().max(b.step()) + 1;
        let name = self.result_name.clone().unwrap_or_default();
        Ok(Variable::new(name, Some(node), step))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name_a, self.operation, self.name_b)?;
        if let Some(result) = &self.result_name {
            write!(f, " -> {result}")?;
        }
        Ok(())
    }
}
