//! Variables and the variable set.
//!
//! A [`Variable`] is a named handle bound to a graph node somewhere in the
//! pipeline. [`StartVariable`]s are the rule-defined variables of a rule set;
//! each discovered layer gets its own instance. The [`VariablesSet`] tracks
//! which variables are currently *active*, i.e. eligible for shuffle and merge.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::host::NodeId;
use super::options::{LayerOptions, Rgb};
use super::rule::LayerRule;

/// Identity of a variable.
///
/// Several variables may share a name (one per light-group instance, for
/// example); identity is never derived from the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(Uuid);

impl VarId {
    /// Generate a fresh identity.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Violations of the active-set invariants.
///
/// These are programming errors, never normal outcomes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Tried to deactivate a variable that is not active.
    #[error("Variable {0} is not active")]
    NotActive(VarId),
    /// Tried to activate a variable twice.
    #[error("Variable {name:?} ({id}) is already active")]
    AlreadyActive {
        /// Variable identity.
        id: VarId,
        /// Variable name, for diagnostics.
        name: String,
    },
    /// A variable reached a stage without a bound node.
    #[error("Variable {0:?} has no bound node")]
    Unbound(String),
}

/// A named handle bound to a graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    id: VarId,
    name: String,
    node: Option<NodeId>,
    step: u32,
    aliases: Vec<String>,
    /// Raw layer name for variables that come from a discovered layer.
    layer: Option<String>,
    /// Operation used to pre-combine instances sharing this name.
    group_operation: Option<String>,
}

impl Variable {
    /// Create a variable with a fresh identity.
    pub fn new(name: impl Into<String>, node: Option<NodeId>, step: u32) -> Self {
        Self {
            id: VarId::fresh(),
            name: name.into(),
            node,
            step,
            aliases: Vec::new(),
            layer: None,
            group_operation: None,
        }
    }

    /// Variable bound to `node` at step 0.
    pub fn bound(name: impl Into<String>, node: NodeId) -> Self {
        Self::new(name, Some(node), 0)
    }

    /// Set the aliases.
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Set the source layer.
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Set the group operation.
    pub fn with_group_operation(mut self, operation: Option<String>) -> Self {
        self.group_operation = operation;
        self
    }

    /// New variable standing for the same logical value at a later stage.
    ///
    /// Keeps name, aliases, layer and group operation; gets a fresh identity.
    pub fn successor(&self, node: NodeId, step: u32) -> Self {
        Self {
            id: VarId::fresh(),
            name: self.name.clone(),
            node: Some(node),
            step,
            aliases: self.aliases.clone(),
            layer: self.layer.clone(),
            group_operation: self.group_operation.clone(),
        }
    }

    /// Identity.
    pub fn id(&self) -> VarId {
        self.id
    }

    /// Name (may be empty for unnamed merge results).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound node.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Bound node, or [`ModelError::Unbound`].
    pub fn require_node(&self) -> Result<NodeId, ModelError> {
        self.node.ok_or_else(|| ModelError::Unbound(self.name.clone()))
    }

    /// Rebind to another node.
    pub fn set_node(&mut self, node: NodeId) {
        self.node = Some(node);
    }

    /// Topological depth.
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Alternate names usable in relation matching.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Whether `name` is one of the aliases.
    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a == name)
    }

    /// Source layer.
    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    /// Group operation.
    pub fn group_operation(&self) -> Option<&str> {
        self.group_operation.as_deref()
    }

    /// Key used in backdrop paths: the layer when known, else the name.
    pub fn layout_key(&self) -> &str {
        self.layer.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A rule-defined variable.
#[derive(Debug, Clone, PartialEq)]
pub struct StartVariable {
    variable: Variable,
    rule: LayerRule,
    order: usize,
    options: LayerOptions,
}

impl StartVariable {
    /// Create a start variable from its rule-set definition.
    pub fn new(name: impl Into<String>, rule: LayerRule, order: usize, options: LayerOptions) -> Self {
        Self {
            variable: Variable::new(name, None, 0),
            rule,
            order,
            options,
        }
    }

    /// Set the aliases.
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.variable.aliases = aliases;
        self
    }

    /// Set the group operation.
    pub fn with_group_operation(mut self, operation: Option<String>) -> Self {
        self.variable.group_operation = operation;
        self
    }

    /// Independent instance bound to one discovered layer.
    ///
    /// Shares rule, options, aliases and group operation; gets its own
    /// identity, layer and (unset) node.
    pub fn instantiate(&self, layer: &str) -> Self {
        let mut instance = self.clone();
        instance.variable.id = VarId::fresh();
        instance.variable.node = None;
        instance.variable.layer = Some(layer.to_string());
        instance
    }

    /// Underlying variable.
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// Name.
    pub fn name(&self) -> &str {
        &self.variable.name
    }

    /// Matching rule.
    pub fn rule(&self) -> &LayerRule {
        &self.rule
    }

    /// Configuration order.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Per-variable options.
    pub fn options(&self) -> &LayerOptions {
        &self.options
    }

    /// Configured color or the default layer color.
    pub fn color(&self) -> Rgb {
        self.options.color_or_default()
    }

    /// Bound layer.
    pub fn layer(&self) -> Option<&str> {
        self.variable.layer()
    }

    /// Rebind to another layer.
    pub fn set_layer(&mut self, layer: impl Into<String>) {
        self.variable.layer = Some(layer.into());
    }

    /// Bound node.
    pub fn node(&self) -> Option<NodeId> {
        self.variable.node
    }

    /// Bind to a node.
    pub fn set_node(&mut self, node: NodeId) {
        self.variable.node = Some(node);
    }

    /// Group operation.
    pub fn group_operation(&self) -> Option<&str> {
        self.variable.group_operation()
    }

    /// Whether the rule accepts the layer name.
    pub fn is_rule_valid(&self, layer: &str) -> bool {
        self.rule.matches(layer)
    }
}

impl fmt::Display for StartVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rule-defined start variables plus the ordered list of active variables.
#[derive(Debug, Clone, Default)]
pub struct VariablesSet {
    start_vars: Vec<StartVariable>,
    active_vars: Vec<Variable>,
}

impl VariablesSet {
    /// Create a set from start variables in configuration order.
    pub fn new(start_vars: Vec<StartVariable>) -> Self {
        Self {
            start_vars,
            active_vars: Vec::new(),
        }
    }

    /// Start variables in configuration order.
    pub fn start_vars(&self) -> &[StartVariable] {
        &self.start_vars
    }

    /// Active variables in activation order.
    pub fn active_vars(&self) -> &[Variable] {
        &self.active_vars
    }

    /// First start variable (configuration order) whose rule matches.
    pub fn start_variable_valid_for(&self, layer: &str) -> Option<&StartVariable> {
        self.start_vars.iter().find(|v| v.is_rule_valid(layer))
    }

    /// Whether a variable is active.
    pub fn is_active(&self, id: VarId) -> bool {
        self.active_vars.iter().any(|v| v.id == id)
    }

    /// Active variable by identity.
    pub fn active(&self, id: VarId) -> Option<&Variable> {
        self.active_vars.iter().find(|v| v.id == id)
    }

    /// Append a variable to the active list.
    pub fn activate(&mut self, var: Variable) -> Result<(), ModelError> {
        if self.is_active(var.id) {
            return Err(ModelError::AlreadyActive { id: var.id, name: var.name });
        }
        self.active_vars.push(var);
        Ok(())
    }

    /// Remove a variable from the active list and return it.
    pub fn deactivate(&mut self, id: VarId) -> Result<Variable, ModelError> {
        match self.active_vars.iter().position(|v| v.id == id) {
            Some(index) => Ok(self.active_vars.remove(index)),
            None => Err(ModelError::NotActive(id)),
        }
    }

    /// Activate or deactivate a variable.
    pub fn active_var(&mut self, var: Variable, active: bool) -> Result<(), ModelError> {
        if active {
            self.activate(var)
        } else {
            self.deactivate(var.id).map(|_| ())
        }
    }

    /// Drop every active variable.
    pub fn clear_active(&mut self) {
        self.active_vars.clear();
    }
}
