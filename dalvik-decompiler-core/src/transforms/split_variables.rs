//! Partition register uses into non-interfering variables.

use std::collections::HashMap;

use crate::defuse::{DefSite, DefUseMap, UseDefMap, UseSite};

use super::VariableEnv;

/// Identifies a logical variable after splitting; distinct from the raw
/// register it originated from.
pub type VarId = u32;

/// Partition register uses into equivalence classes where two uses are
/// equivalent iff their reaching-def sets are identical, then assign each
/// class a fresh variable id. A definition that reaches uses in more than
/// one class (the same physical register carries logically distinct
/// lifetimes through a join) is recorded under each class it feeds; its
/// primary variable (used when the definition itself needs a home, e.g.
/// for declaration placement of a write with no reads) is the
/// lowest-numbered class it contributes to, which keeps the assignment
/// deterministic.
///
/// A definition with no uses at all is not yet dead — dead-code
/// elimination decides that — but has no use-class to join, so it is given
/// its own singleton variable.
pub fn split_variables(use_defs: &UseDefMap, def_uses: &DefUseMap, env: &mut VariableEnv) {
    let mut classes: HashMap<Vec<DefSite>, Vec<UseSite>> = HashMap::new();
    for (use_site, defs) in &use_defs.0 {
        let mut key = defs.clone();
        key.sort_by_key(|d| (d.register.0, d.block.0, d.index));
        classes.entry(key).or_default().push(*use_site);
    }

    let mut def_to_classes: HashMap<DefSite, Vec<VarId>> = HashMap::new();
    let mut ordered_keys: Vec<Vec<DefSite>> = classes.keys().cloned().collect();
    ordered_keys.sort_by(|a, b| {
        let ak: Vec<(u16, u32, usize)> = a.iter().map(|d| (d.register.0, d.block.0, d.index)).collect();
        let bk: Vec<(u16, u32, usize)> = b.iter().map(|d| (d.register.0, d.block.0, d.index)).collect();
        ak.cmp(&bk)
    });

    for key in &ordered_keys {
        let uses = &classes[key];
        let var_id = env.fresh_id();
        let source_register = uses
            .first()
            .map(|u| u.register)
            .or_else(|| key.first().map(|d| d.register))
            .expect("a variable class always has at least one use or one def");
        env.variables.insert(
            var_id,
            super::VarMeta {
                id: var_id,
                source_register,
                synthetic_name: None,
                ty: crate::ir::JavaType::Unknown,
                declaration_block: None,
            },
        );
        for use_site in uses {
            env.use_var.insert(*use_site, var_id);
        }
        for def in key {
            def_to_classes.entry(*def).or_default().push(var_id);
        }
    }

    for (def, mut var_ids) in def_to_classes {
        var_ids.sort_unstable();
        env.def_var.insert(def, var_ids[0]);
    }

    // Definitions with no uses at all never appear as a value in
    // `use_defs`, so they never joined a class above. Give each its own
    // singleton variable; dead-code elimination decides whether it
    // survives.
    let mut unused_defs: Vec<DefSite> = def_uses
        .0
        .keys()
        .filter(|d| !env.def_var.contains_key(d))
        .copied()
        .collect();
    unused_defs.sort_by_key(|d| (d.register.0, d.block.0, d.index));
    for def in unused_defs {
        let var_id = env.fresh_id();
        env.variables.insert(
            var_id,
            super::VarMeta {
                id: var_id,
                source_register: def.register,
                synthetic_name: None,
                ty: crate::ir::JavaType::Unknown,
                declaration_block: None,
            },
        );
        env.def_var.insert(def, var_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::defuse::build_def_use;
    use crate::graph::Graph;
    use crate::ir::{BlockId, ConstValue, ExceptionRange, Instruction, MethodSource, Register, SourceBlock};

    struct Source {
        blocks: Vec<SourceBlock>,
    }

    impl MethodSource for Source {
        fn entry_block(&self) -> BlockId {
            BlockId(0)
        }
        fn basic_blocks(&self) -> &[SourceBlock] {
            &self.blocks
        }
        fn params_type(&self) -> &[String] {
            &[]
        }
        fn registers_size(&self) -> u16 {
            1
        }
        fn ins_size(&self) -> u16 {
            0
        }
        fn access_flags(&self) -> crate::ir::AccessFlags {
            crate::ir::AccessFlags(0)
        }
        fn exception_table(&self) -> &[ExceptionRange] {
            &[]
        }
    }

    /// Two independent definitions of the same register, each with their
    /// own single use, split into two distinct variables.
    #[test]
    fn unrelated_definitions_of_same_register_split_into_distinct_variables() {
        let source = Source {
            blocks: vec![SourceBlock {
                id: BlockId(0),
                instructions: vec![
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(1) },
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(2) },
                    Instruction::Return { value: Some(Register(0)) },
                ],
            }],
        };
        let config = Config::default();
        let graph = Graph::construct(&source, &config).unwrap();
        let (use_defs, def_uses) = build_def_use(&graph, &[], &config).unwrap();
        let mut env = VariableEnv::default();
        split_variables(&use_defs, &def_uses, &mut env);

        let first_def = crate::defuse::DefSite { register: Register(0), block: BlockId(0), index: 0 };
        let second_def = crate::defuse::DefSite { register: Register(0), block: BlockId(0), index: 1 };
        let first_var = env.variable_of_def(first_def).unwrap();
        let second_var = env.variable_of_def(second_def).unwrap();
        assert_ne!(first_var, second_var);
    }

    /// A definition with no uses at all still gets its own variable, so
    /// later passes (e.g. DCE) have somewhere to record its fate.
    #[test]
    fn unused_definition_still_gets_a_variable() {
        let source = Source {
            blocks: vec![SourceBlock {
                id: BlockId(0),
                instructions: vec![
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(5) },
                    Instruction::Return { value: None },
                ],
            }],
        };
        let config = Config::default();
        let graph = Graph::construct(&source, &config).unwrap();
        let (use_defs, def_uses) = build_def_use(&graph, &[], &config).unwrap();
        let mut env = VariableEnv::default();
        split_variables(&use_defs, &def_uses, &mut env);

        let def = crate::defuse::DefSite { register: Register(0), block: BlockId(0), index: 0 };
        assert!(env.variable_of_def(def).is_some());
    }
}
