//! Flag-setting comparisons: CMP, CMN, TST, TEQ, VCMP.
//!
//! These only write the condition flags, which neither view models as
//! variables. Both lists stay empty; the setter is recorded so that a later
//! conditional branch can be traced back to it.

use crate::lifter::arm::{InstrContext, InstrPair, InstructionRecord};
use crate::lifter::builder::AstBuilder;
use crate::lifter::error::LiftResult;

pub fn lift(
    builder: &mut AstBuilder,
    ctx: &InstrContext,
    instr: &InstructionRecord,
) -> LiftResult<InstrPair> {
    let stem: String = instr.opcode.stem();
    builder.add_condition_setter(ctx.iaddr, &stem);
    log::trace!("{}: {} sets flags only", ctx.iaddr, instr.opcode);
    Ok(InstrPair::empty())
}
