//! C-like Rendering
//!
//! Renders arena nodes as C-like source text.
//!
//! # Rules
//! - Binary operators are always parenthesized: `(lhs<op>rhs)`; unary operators
//!   render as `<op><operand>`. Operator text comes from the fixed operator table
//!   and an unknown tag is an error here, not at construction.
//! - Integer constants render as their macro name if present, as hex if the value
//!   exceeds 1000, otherwise as decimal.
//! - Memref lvals pick their shape from the offset: `memexp->field`, `memexp + index`,
//!   or `*(memexp)` followed by the offset text.
//! - Assignments and calls end with a `// <id> (<span>)` provenance comment,
//!   governed by [`ProvenanceMode`].
//! - Blocks and sequences render children at the same indent; branches nest by
//!   [`C_INDENT`].

use crate::config::ProvenanceMode;
use crate::lifter::ast::{operators, AstNode, NodeCache, NodeId, NodeKind, SpanMap, C_INDENT};
use crate::lifter::error::{LiftError, LiftResult};

/// Integer constants above this value render as hex.
pub const HEX_THRESHOLD: i64 = 1000;

/// Renderer over one node cache.
pub struct CRenderer<'a> {
    cache: &'a NodeCache,
    spans: Option<&'a SpanMap>,
    provenance: ProvenanceMode,
}

impl<'a> CRenderer<'a> {
    pub fn new(cache: &'a NodeCache) -> Self {
        Self {
            cache,
            spans: None,
            provenance: ProvenanceMode::Optional,
        }
    }

    pub fn with_spans(mut self, spans: &'a SpanMap) -> Self {
        self.spans = Some(spans);
        self
    }

    pub fn with_provenance(mut self, provenance: ProvenanceMode) -> Self {
        self.provenance = provenance;
        self
    }

    /// Render the node with the given id at `indent` spaces.
    pub fn render(&self, id: NodeId, indent: usize) -> LiftResult<String> {
        let node: &AstNode = self.cache.lookup(id)?;
        self.render_node(node, indent)
    }

    /// Render an already resolved node.
    pub fn render_node(&self, node: &AstNode, indent: usize) -> LiftResult<String> {
        let cache: &NodeCache = self.cache;
        let pad: String = " ".repeat(indent);
        match &node.kind {
            NodeKind::Return => {
                if node.args.is_empty() {
                    Ok(format!("{}return;", pad))
                } else {
                    let expr: String = self.render_node(node.operand(cache, 0)?, 0)?;
                    Ok(format!("{}return {};", pad, expr))
                }
            }
            NodeKind::Block | NodeKind::InstrSequence => {
                let mut lines: Vec<String> = Vec::with_capacity(node.args.len());
                for child in node.children(cache)? {
                    let text: String = self.render_node(child, indent)?;
                    if !text.is_empty() {
                        lines.push(text);
                    }
                }
                Ok(lines.join("\n"))
            }
            NodeKind::Branch => {
                let condition: String = self.render_node(node.condition(cache)?, 0)?;
                let mut lines: Vec<String> = Vec::with_capacity(5);
                lines.push(format!("{}if ({}){{", pad, condition));
                lines.push(self.render_node(node.if_branch(cache)?, indent + C_INDENT)?);
                lines.push(format!("{}}} else {{", pad));
                lines.push(self.render_node(node.else_branch(cache)?, indent + C_INDENT)?);
                lines.push(format!("{}}}", pad));
                Ok(lines.join("\n"))
            }
            NodeKind::Assign => {
                let lhs: String = match node.lhs(cache)? {
                    Some(lval) => self.render_node(lval, 0)?,
                    None => return Err(LiftError::wrong_variant(node.id, node.tag.clone(), "lval")),
                };
                let rhs: String = self.render_node(node.rhs(cache)?, 0)?;
                let comment: String = self.provenance_comment(node.id)?;
                Ok(format!("{}{} = {};{}", pad, lhs, rhs, comment))
            }
            NodeKind::Call => {
                let target: String = self.render_node(node.call_target(cache)?, 0)?;
                let args: Vec<String> = node
                    .call_arguments(cache)?
                    .into_iter()
                    .map(|arg| self.render_node(arg, 0))
                    .collect::<LiftResult<Vec<String>>>()?;
                let comment: String = self.provenance_comment(node.id)?;
                let call: String = format!("{}({});{}", target, args.join(", "), comment);
                match node.lhs(cache)? {
                    Some(lval) => Ok(format!("{}{} = {}", pad, self.render_node(lval, 0)?, call)),
                    None => Ok(format!("{}{}", pad, call)),
                }
            }
            NodeKind::Lval => self.render_lval(node),
            NodeKind::VarInfo { .. } => Ok(node.display_name()?.to_string()),
            NodeKind::Variable => Ok(node.varinfo(cache)?.display_name()?.to_string()),
            NodeKind::MemRef => Ok(format!("*({})", self.render_node(node.memexp(cache)?, 0)?)),
            NodeKind::NoOffset | NodeKind::FieldOffset { .. } | NodeKind::IndexOffset => {
                self.render_offset(Some(node))
            }
            NodeKind::IntegerConstant { value, macroname } => {
                Ok(render_integer(*value, macroname.as_deref()))
            }
            NodeKind::StringConstant { cstr, .. } => Ok(format!("\"{}\"", cstr)),
            NodeKind::LvalExpr => self.render_node(node.lval(cache)?, 0),
            NodeKind::SubstitutedExpr => self.render_node(node.substituted_expr(cache)?, 0),
            NodeKind::CastE { tgttype } => Ok(format!(
                "({}){}",
                tgttype,
                self.render_node(node.operand(cache, 0)?, 0)?
            )),
            NodeKind::UnaryOp { op } => {
                let text: &str =
                    operators::operator_text(op).ok_or_else(|| LiftError::unknown_operator(node.id, op))?;
                Ok(format!("{}{}", text, self.render_node(node.operand(cache, 0)?, 0)?))
            }
            NodeKind::BinaryOp { op } => {
                let text: &str =
                    operators::operator_text(op).ok_or_else(|| LiftError::unknown_operator(node.id, op))?;
                Ok(format!(
                    "({}{}{})",
                    self.render_node(node.operand(cache, 0)?, 0)?,
                    text,
                    self.render_node(node.operand(cache, 1)?, 0)?
                ))
            }
            NodeKind::Question => Ok(format!(
                "({} ? {} : {})",
                self.render_node(node.operand(cache, 0)?, 0)?,
                self.render_node(node.operand(cache, 1)?, 0)?,
                self.render_node(node.operand(cache, 2)?, 0)?
            )),
            NodeKind::AddressOf => Ok(format!("&{}", self.render_node(node.lval(cache)?, 0)?)),
            NodeKind::Generic => {
                let args: Vec<String> = node.args.iter().map(|a| a.to_string()).collect();
                Ok(format!("{}{}: {}[{}]", pad, node.id, node.tag, args.join(", ")))
            }
        }
    }

    fn render_lval(&self, lval: &AstNode) -> LiftResult<String> {
        let cache: &NodeCache = self.cache;
        let lhost: &AstNode = lval.lhost(cache)?;
        let offset: Option<&AstNode> = lval.offset(cache)?;
        if lhost.kind == NodeKind::MemRef {
            let memexp: String = self.render_node(lhost.memexp(cache)?, 0)?;
            match offset.map(|o| &o.kind) {
                Some(NodeKind::FieldOffset { .. }) => {
                    let text: String = self.render_offset(offset)?;
                    Ok(format!("{}->{}", memexp, &text[1..]))
                }
                Some(NodeKind::IndexOffset) => {
                    let index: String = match offset {
                        Some(o) => self.render_node(o.index_expr(cache)?, 0)?,
                        None => String::new(),
                    };
                    Ok(format!("{} + {}", memexp, index))
                }
                _ => Ok(format!("*({}){}", memexp, self.render_offset(offset)?)),
            }
        } else {
            Ok(format!(
                "{}{}",
                self.render_node(lhost, 0)?,
                self.render_offset(offset)?
            ))
        }
    }

    /// Text of an offset chain: `.f` per field, `[i]` per index, nothing at the end.
    fn render_offset(&self, offset: Option<&AstNode>) -> LiftResult<String> {
        let mut text: String = String::new();
        let mut current: Option<&AstNode> = offset;
        let mut steps: usize = 0;
        while let Some(node) = current {
            match &node.kind {
                NodeKind::FieldOffset { fname } => {
                    text.push('.');
                    text.push_str(fname);
                }
                NodeKind::IndexOffset => {
                    text.push_str(&format!("[{}]", self.render_node(node.index_expr(self.cache)?, 0)?));
                }
                _ => break,
            }
            steps += 1;
            if steps > self.cache.len() {
                return Err(LiftError::OffsetCycle {
                    id: offset.map(|o| o.id).unwrap_or(node.id),
                });
            }
            current = node.offset(self.cache)?;
        }
        Ok(text)
    }

    fn provenance_comment(&self, id: NodeId) -> LiftResult<String> {
        let span: Option<&str> = self.spans.and_then(|spans| spans.get(id));
        match (self.provenance, span) {
            (ProvenanceMode::Omit, _) => Ok(String::new()),
            (_, Some(span)) => Ok(format!(" // {} ({})", id, span)),
            (ProvenanceMode::Optional, None) => Ok(format!(" // {} (no span found)", id)),
            (ProvenanceMode::Required, None) => Err(LiftError::missing_span(id)),
        }
    }
}

/// Integer constant text: macro name, else hex above the threshold, else decimal.
pub fn render_integer(value: i64, macroname: Option<&str>) -> String {
    match macroname {
        Some(name) => name.to_string(),
        None if value > HEX_THRESHOLD => format!("0x{:x}", value),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_rendering_heuristic() {
        assert_eq!(render_integer(500, None), "500");
        assert_eq!(render_integer(1000, None), "1000");
        assert_eq!(render_integer(1001, None), "0x3e9");
        assert_eq!(render_integer(5000, None), "0x1388");
        assert_eq!(render_integer(5000, Some("FOO")), "FOO");
        assert_eq!(render_integer(-5000, None), "-5000");
    }
}
