//! Condition Codes
//!
//! Maps the analyzer's condition tags to ARM mnemonic extensions and builds the
//! low-level flag test for each condition over the N, Z, C and V flags.

use crate::lifter::ast::{NodeId, Operator};
use crate::lifter::builder::AstBuilder;

/// Analyzer condition tag -> mnemonic extension.
const EXTENSIONS: [(&str, &str); 16] = [
    ("eq", "EQ"),
    ("ne", "NE"),
    ("cs", "CS"),
    ("cc", "CC"),
    ("neg", "MI"),
    ("nneg", "PL"),
    ("ov", "VS"),
    ("nov", "VC"),
    ("uh", "HI"),
    ("nuh", "LS"),
    ("ge", "GE"),
    ("lt", "LT"),
    ("gt", "GT"),
    ("le", "LE"),
    ("a", ""),
    ("unc", ""),
];

/// Mnemonic extension of a condition tag. Unknown tags are returned unchanged.
pub fn mnemonic_extension(tag: &str) -> &str {
    EXTENSIONS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, ext)| *ext)
        .unwrap_or(tag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionCode {
    Eq,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
}

impl ConditionCode {
    /// Parse a mnemonic extension (`EQ`, `HS`, ...). Empty and `AL` mean always.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let cc = match ext.to_ascii_uppercase().as_str() {
            "EQ" => ConditionCode::Eq,
            "NE" => ConditionCode::Ne,
            "CS" | "HS" => ConditionCode::Cs,
            "CC" | "LO" => ConditionCode::Cc,
            "MI" => ConditionCode::Mi,
            "PL" => ConditionCode::Pl,
            "VS" => ConditionCode::Vs,
            "VC" => ConditionCode::Vc,
            "HI" => ConditionCode::Hi,
            "LS" => ConditionCode::Ls,
            "GE" => ConditionCode::Ge,
            "LT" => ConditionCode::Lt,
            "GT" => ConditionCode::Gt,
            "LE" => ConditionCode::Le,
            "" | "AL" => ConditionCode::Al,
            _ => return None,
        };
        Some(cc)
    }

    /// Parse an analyzer condition tag or, failing that, a mnemonic extension.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::from_extension(mnemonic_extension(tag))
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ConditionCode::Eq => "EQ",
            ConditionCode::Ne => "NE",
            ConditionCode::Cs => "CS",
            ConditionCode::Cc => "CC",
            ConditionCode::Mi => "MI",
            ConditionCode::Pl => "PL",
            ConditionCode::Vs => "VS",
            ConditionCode::Vc => "VC",
            ConditionCode::Hi => "HI",
            ConditionCode::Ls => "LS",
            ConditionCode::Ge => "GE",
            ConditionCode::Lt => "LT",
            ConditionCode::Gt => "GT",
            ConditionCode::Le => "LE",
            ConditionCode::Al => "",
        }
    }

    pub fn is_unconditional(self) -> bool {
        self == ConditionCode::Al
    }
}

fn flag_equals(builder: &mut AstBuilder, flag: &str, value: i64) -> NodeId {
    let flag: NodeId = builder.mk_flag_variable_expr(flag);
    let value: NodeId = builder.mk_integer_constant(value);
    builder.mk_binary_op(Operator::Eq, flag, value)
}

fn flags_compare(builder: &mut AstBuilder, op: Operator, lhs: &str, rhs: &str) -> NodeId {
    let lhs: NodeId = builder.mk_flag_variable_expr(lhs);
    let rhs: NodeId = builder.mk_flag_variable_expr(rhs);
    builder.mk_binary_op(op, lhs, rhs)
}

/// Low-level flag test for a condition. Always-true conditions give the constant 1.
pub fn condition_expr(builder: &mut AstBuilder, cc: ConditionCode) -> NodeId {
    match cc {
        ConditionCode::Eq => flag_equals(builder, "Z", 1),
        ConditionCode::Ne => flag_equals(builder, "Z", 0),
        ConditionCode::Cs => flag_equals(builder, "C", 1),
        ConditionCode::Cc => flag_equals(builder, "C", 0),
        ConditionCode::Mi => flag_equals(builder, "N", 1),
        ConditionCode::Pl => flag_equals(builder, "N", 0),
        ConditionCode::Vs => flag_equals(builder, "V", 1),
        ConditionCode::Vc => flag_equals(builder, "V", 0),
        ConditionCode::Hi => {
            let carry: NodeId = flag_equals(builder, "C", 1);
            let nonzero: NodeId = flag_equals(builder, "Z", 0);
            builder.mk_binary_op(Operator::And, carry, nonzero)
        }
        ConditionCode::Ls => {
            let no_carry: NodeId = flag_equals(builder, "C", 0);
            let zero: NodeId = flag_equals(builder, "Z", 1);
            builder.mk_binary_op(Operator::Lor, no_carry, zero)
        }
        ConditionCode::Ge => flags_compare(builder, Operator::Eq, "N", "V"),
        ConditionCode::Lt => flags_compare(builder, Operator::Ne, "N", "V"),
        ConditionCode::Gt => {
            // Literal form (Z == 0) == (N == V); not the conjunction.
            let nonzero: NodeId = flag_equals(builder, "Z", 0);
            let same_sign: NodeId = flags_compare(builder, Operator::Eq, "N", "V");
            builder.mk_binary_op(Operator::Eq, nonzero, same_sign)
        }
        ConditionCode::Le => {
            let zero: NodeId = flag_equals(builder, "Z", 1);
            let sign_differs: NodeId = flags_compare(builder, Operator::Ne, "N", "V");
            builder.mk_binary_op(Operator::Lor, zero, sign_differs)
        }
        ConditionCode::Al => builder.mk_integer_constant(1),
    }
}

/// Flag test for an analyzer condition tag; `None` if the tag is not a condition.
pub fn condition_expr_for_tag(builder: &mut AstBuilder, tag: &str) -> Option<NodeId> {
    ConditionCode::from_tag(tag).map(|cc| condition_expr(builder, cc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_table() {
        assert_eq!(mnemonic_extension("neg"), "MI");
        assert_eq!(mnemonic_extension("uh"), "HI");
        assert_eq!(mnemonic_extension("unc"), "");
        assert_eq!(mnemonic_extension("xyz"), "xyz");
    }

    #[test]
    fn test_hs_alias() {
        assert_eq!(ConditionCode::from_extension("HS"), Some(ConditionCode::Cs));
        assert_eq!(ConditionCode::from_tag("a"), Some(ConditionCode::Al));
        assert_eq!(ConditionCode::from_tag("bogus"), None);
    }
}
