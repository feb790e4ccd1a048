//! Pretty-printing for IR nodes
//!
//! Display implementations for debugging and dump output. A tree dump
//! prints one node per line, children indented under their user in
//! execution order:
//!
//! ```text
//! [000003] ---XG--- ADD int
//! [000001]   ---XG--- IND int
//! [000000]     -------- LCL_VAR byref V00
//! [000002]   -------- CNS_INT int 2
//! ```

use std::fmt::{self, Write as _};

use crate::arena::IrArena;
use crate::error::IrResult;
use crate::flags::GenFlags;
use crate::node::{Node, NodeId, NodeKind};

const FLAG_CHARS: [(GenFlags, char); 8] = [
    (GenFlags::REVERSE_OPS, 'R'),
    (GenFlags::CONTAINED, 'c'),
    (GenFlags::ASG, 'A'),
    (GenFlags::EXCEPT, 'X'),
    (GenFlags::GLOB_REF, 'G'),
    (GenFlags::CALL, 'C'),
    (GenFlags::ORDER_SIDEEFF, 'O'),
    (GenFlags::DONT_CSE, 'N'),
];

fn flag_string(flags: GenFlags) -> String {
    FLAG_CHARS
        .iter()
        .map(|(flag, c)| if flags.contains(*flag) { *c } else { '-' })
        .collect()
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", flag_string(self.flags()), self.oper(), self.ty())?;
        match self.kind() {
            NodeKind::IntCon(icon) => match icon.handle {
                Some(handle) => write!(f, " {:#x} {:?}", icon.value, handle)?,
                None => write!(f, " {}", icon.value)?,
            },
            NodeKind::DblCon(dbl) => write!(f, " {}", dbl.value)?,
            NodeKind::StrCon(s) => write!(f, " token {:#x}", s.token)?,
            NodeKind::LclVar(lcl) => write!(f, " {}", lcl.lcl)?,
            NodeKind::LclFld(fld) => write!(f, " {}[+{}]", fld.lcl, fld.offset)?,
            NodeKind::PhiArg(arg) => write!(f, " {} from {}", arg.lcl, arg.pred)?,
            NodeKind::Cast(cast) => {
                write!(f, " <- {}", cast.cast_to)?;
                if cast.overflow {
                    write!(f, " ovf")?;
                }
            }
            NodeKind::Blk(blk) => write!(f, " <{}>", blk.size)?,
            NodeKind::Field(field) => write!(f, " {} +{}", field.field, field.offset)?,
            NodeKind::AddrMode(lea) => write!(f, " (b+i*{}+{})", lea.scale, lea.offset)?,
            NodeKind::PhysReg(reg) => write!(f, " {}", reg.reg)?,
            NodeKind::Intrinsic(intrinsic) => write!(f, " #{}", intrinsic.id.0)?,
            NodeKind::MultiOp(op) => write!(f, " #{} {} x{}", op.intrinsic.0, op.base_type, op.simd_size)?,
            NodeKind::PutArgStk(put) => write!(f, " (+{}, {} bytes)", put.byte_offset, put.byte_size)?,
            NodeKind::RetExpr(ret) => write!(f, " (inl {})", ret.inline_candidate)?,
            NodeKind::Call(call) => {
                let args = call.args();
                write!(f, " ({} args, {:?})", args.count_args(), args.stage())?;
            }
            _ => {}
        }
        if let Some(reg) = self.reg() {
            write!(f, " REG {}", reg)?;
        }
        if !self.vn_pair().liberal.is_none() {
            write!(f, " {}", self.vn_pair())?;
        }
        Ok(())
    }
}

impl IrArena {
    /// Text dump of the tree rooted at `root`
    pub fn dump_tree(&self, root: NodeId) -> IrResult<String> {
        let mut out = String::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id)?;
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{} {:indent$}{}", id, "", node, indent = depth * 2);
            let children: Vec<NodeId> = self.operands(id)?.collect();
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oper::Oper;
    use crate::types::{LclNum, VarType};

    #[test]
    fn test_flag_string() {
        assert_eq!(flag_string(GenFlags::empty()), "--------");
        assert_eq!(flag_string(GenFlags::EXCEPT | GenFlags::GLOB_REF), "---XG---");
    }

    #[test]
    fn test_dump_tree() {
        let mut arena = IrArena::new();
        let addr = arena.new_lcl_var(LclNum(0), VarType::ByRef).unwrap();
        let load = arena.new_indir(VarType::Int, addr).unwrap();
        let two = arena.new_icon(2, VarType::Int).unwrap();
        let add = arena.new_binop(Oper::Add, VarType::Int, load, two).unwrap();

        let dump = arena.dump_tree(add).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("[000003] ---XG--- ADD int"));
        assert!(lines[1].contains("  ---XG--- IND int"));
        assert!(lines[2].contains("LCL_VAR byref"));
        assert!(lines[3].ends_with("CNS_INT int 2"));
    }
}
