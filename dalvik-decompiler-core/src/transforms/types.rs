//! Type resolution: infer each variable's Java type.

use crate::error::DecompileError;
use crate::graph::Graph;
use crate::ir::{ConstValue, Instruction, JavaType, Primitive};

use super::VariableEnv;

/// Seed and unify each variable's type from its definitions: parameter
/// types, field types at gets, invoke return types, and constant-load
/// widths. Conflicting seeds are resolved by widening: the least common
/// supertype for reference types (approximated as `java.lang.Object` once
/// two distinct reference types disagree, since this core does not carry a
/// class hierarchy to compute a tighter common ancestor) and the widest
/// required width for primitives. Unresolvable variables fall back to
/// `Object` / `int` and get a comment recorded for the Writer, consistent
/// with `TypeResolutionAmbiguity` being a recoverable, not fatal, outcome.
pub fn resolve_variables_type(
    graph: &mut Graph,
    env: &mut VariableEnv,
    param_types: &[(crate::ir::Register, JavaType)],
) -> Vec<DecompileError> {
    let mut warnings = Vec::new();

    let mut seed: std::collections::HashMap<super::VarId, JavaType> = std::collections::HashMap::new();
    for (reg, ty) in param_types {
        for (def, var_id) in &env.def_var {
            if def.register == *reg && def.index == usize::MAX {
                unify_into(&mut seed, *var_id, ty.clone());
            }
        }
    }

    for id in graph.block_ids() {
        let Ok(block) = graph.get(id) else { continue };
        for (idx, inst) in block.instructions.iter().enumerate() {
            let Some(dst) = inst.writes() else { continue };
            let def = crate::defuse::DefSite { register: dst, block: id, index: idx };
            let Some(var_id) = env.def_var.get(&def).copied() else { continue };
            let inferred = match inst {
                Instruction::ConstLoad { value, .. } => Some(type_of_const(value)),
                Instruction::FieldGet { field, .. } => {
                    Some(JavaType::parse_descriptor(&field.field_type))
                }
                Instruction::Invoke { method, .. } => {
                    Some(JavaType::parse_descriptor(&method.return_type))
                }
                Instruction::ArrayGet { elem_type, .. } => Some(elem_type.clone()),
                Instruction::NewArray { elem_type, .. } => {
                    Some(JavaType::Array(Box::new(elem_type.clone())))
                }
                Instruction::NewInstance { class, .. } | Instruction::NewInstanceInit { class, .. } => {
                    Some(JavaType::Reference(class.clone()))
                }
                Instruction::Compare { .. } => Some(JavaType::Primitive(Primitive::Boolean)),
                Instruction::Arithmetic { .. } => Some(JavaType::Primitive(Primitive::Int)),
                _ => None,
            };
            if let Some(ty) = inferred {
                unify_into(&mut seed, var_id, ty);
            }
        }
    }

    // Propagate through `Move`s a bounded number of rounds: a chain of
    // copies should all end up at the same resolved type.
    for _ in 0..4 {
        for id in graph.block_ids() {
            let Ok(block) = graph.get(id) else { continue };
            for (idx, inst) in block.instructions.iter().enumerate() {
                if let Instruction::Move { dst, src } = inst {
                    let def = crate::defuse::DefSite { register: *dst, block: id, index: idx };
                    let Some(dst_var) = env.def_var.get(&def).copied() else { continue };
                    let use_site = crate::defuse::UseSite { register: *src, block: id, index: idx };
                    let Some(src_var) = env.use_var.get(&use_site).copied() else { continue };
                    if let Some(src_ty) = seed.get(&src_var).cloned() {
                        unify_into(&mut seed, dst_var, src_ty);
                    }
                }
            }
        }
    }

    for (var_id, meta) in env.variables.iter_mut() {
        match seed.get(var_id) {
            Some(ty) => meta.ty = ty.clone(),
            None => {
                meta.ty = JavaType::Unknown;
                warnings.push(DecompileError::TypeResolutionAmbiguity(
                    meta.display_name(),
                    "no definition seeded a type; falling back to Object".to_string(),
                ));
            }
        }
    }

    warnings
}

fn type_of_const(value: &ConstValue) -> JavaType {
    match value {
        ConstValue::Int(_) => JavaType::Primitive(Primitive::Int),
        ConstValue::Long(_) => JavaType::Primitive(Primitive::Long),
        ConstValue::Float(_) => JavaType::Primitive(Primitive::Float),
        ConstValue::Double(_) => JavaType::Primitive(Primitive::Double),
        ConstValue::String(_) => JavaType::Reference("java.lang.String".to_string()),
        ConstValue::Class(_) => JavaType::Reference("java.lang.Class".to_string()),
        ConstValue::Null => JavaType::Unknown,
    }
}

fn unify_into(seed: &mut std::collections::HashMap<super::VarId, JavaType>, var_id: super::VarId, ty: JavaType) {
    match seed.get(&var_id) {
        None => {
            seed.insert(var_id, ty);
        }
        Some(existing) => {
            let unified = unify(existing, &ty);
            seed.insert(var_id, unified);
        }
    }
}

fn unify(a: &JavaType, b: &JavaType) -> JavaType {
    match (a, b) {
        (JavaType::Unknown, other) | (other, JavaType::Unknown) => other.clone(),
        (JavaType::Primitive(pa), JavaType::Primitive(pb)) => {
            if pa == pb {
                JavaType::Primitive(*pa)
            } else if pa.width_rank() >= pb.width_rank() {
                JavaType::Primitive(*pa)
            } else {
                JavaType::Primitive(*pb)
            }
        }
        (JavaType::Reference(ra), JavaType::Reference(rb)) if ra == rb => JavaType::Reference(ra.clone()),
        (JavaType::Array(ea), JavaType::Array(eb)) if ea == eb => JavaType::Array(ea.clone()),
        _ if a.is_reference() && b.is_reference() => {
            JavaType::Reference(JavaType::OBJECT.to_string())
        }
        _ => a.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::defuse::build_def_use;
    use crate::ir::{BlockId, ExceptionRange, MethodSource, Register, SourceBlock};
    use crate::transforms::split_variables::split_variables;
    use crate::transforms::VariableEnv;

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

    #[test]
    fn unify_widens_primitives_to_the_wider_rank() {
        let ty = unify(&JavaType::Primitive(Primitive::Int), &JavaType::Primitive(Primitive::Long));
        assert_eq!(ty, JavaType::Primitive(Primitive::Long));
    }

    #[test]
    fn unify_falls_back_to_object_for_disagreeing_reference_types() {
        let ty = unify(
            &JavaType::Reference("java.lang.String".to_string()),
            &JavaType::Reference("java.lang.Integer".to_string()),
        );
        assert_eq!(ty, JavaType::Reference(JavaType::OBJECT.to_string()));
    }

    /// A variable defined only by an `int` constant load resolves to `int`
    /// with no ambiguity warning.
    #[test]
    fn const_load_seeds_a_concrete_primitive_type() {
        let source = Source {
            blocks: vec![SourceBlock {
                id: BlockId(0),
                instructions: vec![
                    Instruction::ConstLoad { dst: Register(0), value: ConstValue::Int(3) },
                    Instruction::Return { value: Some(Register(0)) },
                ],
            }],
        };
        let config = Config::default();
        let mut graph = Graph::construct(&source, &config).unwrap();
        let (use_defs, def_uses) = build_def_use(&graph, &[], &config).unwrap();
        let mut env = VariableEnv::default();
        split_variables(&use_defs, &def_uses, &mut env);

        let warnings = resolve_variables_type(&mut graph, &mut env, &[]);
        assert!(warnings.is_empty());
        let var_id = env
            .variable_of_def(crate::defuse::DefSite { register: Register(0), block: BlockId(0), index: 0 })
            .unwrap();
        assert_eq!(env.variables[&var_id].ty, JavaType::Primitive(Primitive::Int));
    }
}
