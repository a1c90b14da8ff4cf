//! Dataflow transforms: variable splitting, dead-code elimination,
//! propagation, type resolution, and declaration placement. All operate
//! in place on the graph and the def/use maps through a single mutable
//! pass context, rather than threading separate parameters through every
//! call or reaching for hidden globals.

pub mod dce;
pub mod declarations;
pub mod new_instance;
pub mod propagation;
pub mod split_variables;
pub mod types;

use std::collections::HashMap;

use crate::config::Config;
use crate::defuse::{DefUseMap, UseDefMap};
use crate::graph::Graph;
use crate::ir::{JavaType, Register};

pub use split_variables::VarId;

/// Per-variable metadata, filled in progressively as the pipeline runs:
/// `ty` by `resolve_variables_type`, `declaration_block` by
/// `place_declarations`.
#[derive(Debug, Clone)]
pub struct VarMeta {
    pub id: VarId,
    pub source_register: Register,
    /// `None` until `split_variables` assigns a fresh name; `Some` for
    /// variables introduced later (e.g. by `new_instance_propagation`).
    pub synthetic_name: Option<String>,
    pub ty: JavaType,
    pub declaration_block: Option<crate::ir::BlockId>,
}

impl VarMeta {
    /// The name the Writer renders: the synthetic name if one was
    /// assigned, otherwise derived from the originating register.
    pub fn display_name(&self) -> String {
        self.synthetic_name
            .clone()
            .unwrap_or_else(|| format!("v{}", self.source_register.0))
    }
}

/// The explicit mutable context every transform pass takes: the graph
/// itself, the naming/variable environment, and the def/use maps. No
/// hidden globals — every pass that needs state takes it through this
/// struct.
pub struct PassContext<'a> {
    pub graph: &'a mut Graph,
    pub use_defs: &'a mut UseDefMap,
    pub def_uses: &'a mut DefUseMap,
    pub variables: &'a mut VariableEnv,
    pub config: &'a Config,
}

/// The variable-naming environment: which variable a given def/use site
/// belongs to, and per-variable metadata. Mutated by `split_variables`
/// (initial population), `new_instance_propagation` (registers newly
/// introduced temporaries), `resolve_variables_type`, and
/// `place_declarations`.
#[derive(Debug, Clone, Default)]
pub struct VariableEnv {
    pub use_var: HashMap<crate::defuse::UseSite, VarId>,
    pub def_var: HashMap<crate::defuse::DefSite, VarId>,
    pub variables: HashMap<VarId, VarMeta>,
    next_id: VarId,
}

impl VariableEnv {
    pub fn fresh_id(&mut self) -> VarId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn variable_of_def(&self, def: crate::defuse::DefSite) -> Option<VarId> {
        self.def_var.get(&def).copied()
    }

    pub fn variable_of_use(&self, use_site: crate::defuse::UseSite) -> Option<VarId> {
        self.use_var.get(&use_site).copied()
    }
}
