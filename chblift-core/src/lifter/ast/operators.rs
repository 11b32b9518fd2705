//! Operator Table
//!
//! Fixed mapping from symbolic operator tags to their C-like text. The text
//! includes the surrounding spaces so that binary operators render as
//! `(lhs + rhs)` and unary operators as ` ! x`; `~` and unary `-` are
//! written without spaces.

/// Operators known to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operator {
    And,
    Bor,
    Bxor,
    Asr,
    Band,
    Div,
    Eq,
    Ge,
    Gt,
    Le,
    Lnot,
    Lor,
    Lsl,
    Lsr,
    Lt,
    Mod,
    ShiftLt,
    ShiftRt,
    Minus,
    Mult,
    Ne,
    Neq,
    Plus,
    Bnot,
    Land,
    Neg,
}

impl Operator {
    pub const ALL: [Operator; 26] = [
        Operator::And,
        Operator::Bor,
        Operator::Bxor,
        Operator::Asr,
        Operator::Band,
        Operator::Div,
        Operator::Eq,
        Operator::Ge,
        Operator::Gt,
        Operator::Le,
        Operator::Lnot,
        Operator::Lor,
        Operator::Lsl,
        Operator::Lsr,
        Operator::Lt,
        Operator::Mod,
        Operator::ShiftLt,
        Operator::ShiftRt,
        Operator::Minus,
        Operator::Mult,
        Operator::Ne,
        Operator::Neq,
        Operator::Plus,
        Operator::Bnot,
        Operator::Land,
        Operator::Neg,
    ];

    /// Symbolic tag as it appears in wire records.
    pub fn tag(self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Bor => "bor",
            Operator::Bxor => "bxor",
            Operator::Asr => "asr",
            Operator::Band => "band",
            Operator::Div => "div",
            Operator::Eq => "eq",
            Operator::Ge => "ge",
            Operator::Gt => "gt",
            Operator::Le => "le",
            Operator::Lnot => "lnot",
            Operator::Lor => "lor",
            Operator::Lsl => "lsl",
            Operator::Lsr => "lsr",
            Operator::Lt => "lt",
            Operator::Mod => "mod",
            Operator::ShiftLt => "shiftlt",
            Operator::ShiftRt => "shiftrt",
            Operator::Minus => "minus",
            Operator::Mult => "mult",
            Operator::Ne => "ne",
            Operator::Neq => "neq",
            Operator::Plus => "plus",
            Operator::Bnot => "bnot",
            Operator::Land => "land",
            Operator::Neg => "neg",
        }
    }

    /// Rendered text, spaces included.
    pub fn text(self) -> &'static str {
        match self {
            Operator::And => " && ",
            Operator::Bor => " | ",
            Operator::Bxor => " ^ ",
            Operator::Asr => " >> ",
            Operator::Band => " & ",
            Operator::Div => " / ",
            Operator::Eq => " == ",
            Operator::Ge => " >= ",
            Operator::Gt => " > ",
            Operator::Le => " <= ",
            Operator::Lnot => " ! ",
            Operator::Lor => " || ",
            Operator::Lsl => " << ",
            Operator::Lsr => " >> ",
            Operator::Lt => " < ",
            Operator::Mod => " % ",
            Operator::ShiftLt => " << ",
            Operator::ShiftRt => " >> ",
            Operator::Minus => " - ",
            Operator::Mult => " * ",
            Operator::Ne => " != ",
            Operator::Neq => " != ",
            Operator::Plus => " + ",
            Operator::Bnot => "~",
            Operator::Land => " && ",
            Operator::Neg => "-",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Operator> {
        Operator::ALL.iter().copied().find(|op| op.tag() == tag)
    }
}

/// Text for an operator tag, `None` if the tag is not in the table.
pub fn operator_text(tag: &str) -> Option<&'static str> {
    Operator::from_tag(tag).map(Operator::text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_unique() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_tag(op.tag()), Some(op));
        }
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(operator_text("rotate"), None);
    }
}
