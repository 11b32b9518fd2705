//! Opcode Lifters
//!
//! One module per opcode family. All lifters share the same contract: the
//! low-level list is always built from the literal operands, the high-level
//! list only from xdata, and base-register write-backs come last in both.

pub mod branch;
pub mod call;
pub mod compare;
pub mod data_processing;
pub mod load;
pub mod moves;
pub mod multiple;
pub mod store;

use crate::lifter::arm::convert::{xvariable_lval, xxpr_expr};
use crate::lifter::arm::operand::Writeback;
use crate::lifter::arm::{InstrContext, InstrPair};
use crate::lifter::ast::NodeId;
use crate::lifter::builder::AstBuilder;
use crate::lifter::xdata::layouts::BaseUpdate;

/// Emit the low-level base write-back and, if xdata describes it, its
/// high-level counterpart. Both are appended to `pair`.
pub(crate) fn emit_writeback(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    writeback: Writeback,
    update: Option<BaseUpdate>,
    pair: &mut InstrPair,
) {
    let ll_assign: NodeId = ctx.emit_assign(builder, writeback.lhs, writeback.rhs);
    pair.low.push(ll_assign);
    let (vrn, updated) = match update {
        Some(BaseUpdate {
            vrn: Some(vrn),
            xrn_updated: Some(updated),
        }) => (vrn, updated),
        Some(_) => {
            log::error!("{}: base update slots are error values; low-level only", ctx.iaddr);
            ctx.record_low(builder, ll_assign);
            return;
        }
        None => {
            log::warn!("{}: write-back without base update in xdata; low-level only", ctx.iaddr);
            ctx.record_low(builder, ll_assign);
            return;
        }
    };
    let hl_lhs: NodeId = xvariable_lval(builder, vrn, ctx.iaddr);
    let hl_rhs: NodeId = xxpr_expr(builder, updated, ctx.iaddr);
    let hl_assign: NodeId = ctx.emit_assign(builder, hl_lhs, hl_rhs);
    ctx.record_pair(builder, hl_assign, ll_assign);
    builder.add_lval_mapping(hl_lhs, writeback.lhs);
    builder.add_expr_mapping(hl_rhs, writeback.rhs);
    pair.high.push(hl_assign);
}
