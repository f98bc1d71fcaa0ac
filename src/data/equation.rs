// ============================================================
// Layer 4 — Equation Normalizer
// ============================================================
// Converts a masked infix equation into postfix and prefix form.
//
// Grammar:
//   binary operators, lowest to highest precedence
//       <BRG> ;    (joins equations of a system)
//       =
//       +  -
//       *  /
//       ^          (right-associative, all others left)
//   brackets  ( )  and  [ ]  group, and must close their own kind
//   unary minus  a '-' where an operand is expected; it binds to
//                the next primary only and is written out as 0 - x
//                so "- NUM_0 ^ 2" means (0 - NUM_0) ^ 2
//   operands     every other token
//
// Two operands in a row (implicit multiplication) are rejected.
//
// Pipeline:
//   infix tokens ──shunting-yard──▶ RPN ──stack──▶ expression tree
//   tree ──post-order──▶ postfix
//   tree ──pre-order───▶ prefix
//
// Reference: Dijkstra (1961) shunting-yard algorithm
//            Rust Book §8 (Vectors), §15 (Box<T>)

pub use crate::domain::error::EquationError;

use crate::domain::error::DataError;
use crate::domain::record::{MaskedRecord, Record};
use crate::domain::symbols::BRG_TOKEN;

/// Operand the unary minus is rewritten against.
pub const IMPLICIT_ZERO: &str = "0";
const NEGATE_PRECEDENCE: u8 = 6;

/// The three renderings of one equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationForms {
    pub infix:   Vec<String>,
    pub postfix: Vec<String>,
    pub prefix:  Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

fn binary_operator(token: &str) -> Option<(u8, Assoc)> {
    match token {
        BRG_TOKEN | ";" => Some((1, Assoc::Left)),
        "="             => Some((2, Assoc::Left)),
        "+" | "-"       => Some((3, Assoc::Left)),
        "*" | "/"       => Some((4, Assoc::Left)),
        "^"             => Some((5, Assoc::Right)),
        _ => None,
    }
}

fn closer_for(open: &str) -> Option<&'static str> {
    match open {
        "(" => Some(")"),
        "[" => Some("]"),
        _ => None,
    }
}

fn is_closer(token: &str) -> bool {
    token == ")" || token == "]"
}

enum Pending<'a> {
    Open(&'a str),
    Binary(&'a str, u8),
    Negate,
}

impl Pending<'_> {
    fn precedence(&self) -> Option<u8> {
        match self {
            Pending::Open(_)      => None,
            Pending::Binary(_, p) => Some(*p),
            Pending::Negate       => Some(NEGATE_PRECEDENCE),
        }
    }
}

enum Rpn<'a> {
    Operand(&'a str),
    Binary(&'a str),
    Negate,
}

fn pending_to_rpn(p: Pending<'_>) -> Option<Rpn<'_>> {
    match p {
        Pending::Open(_)      => None,
        Pending::Binary(t, _) => Some(Rpn::Binary(t)),
        Pending::Negate       => Some(Rpn::Negate),
    }
}

// ─── Shunting-yard ────────────────────────────────────────────────────────────
fn to_rpn(infix: &[String]) -> Result<Vec<Rpn<'_>>, EquationError> {
    let mut output: Vec<Rpn<'_>>       = Vec::with_capacity(infix.len());
    let mut stack:  Vec<Pending<'_>>   = Vec::new();
    let mut expect_operand             = true;

    for (position, token) in infix.iter().enumerate() {
        let token = token.as_str();

        if expect_operand {
            if closer_for(token).is_some() {
                stack.push(Pending::Open(token));
            } else if token == "-" {
                stack.push(Pending::Negate);
            } else if binary_operator(token).is_some() || is_closer(token) {
                return Err(EquationError::MissingOperand { token: token.into(), position });
            } else {
                output.push(Rpn::Operand(token));
                expect_operand = false;
            }
            continue;
        }

        if let Some((prec, assoc)) = binary_operator(token) {
            while let Some(top) = stack.last().and_then(Pending::precedence) {
                if top > prec || (top == prec && assoc == Assoc::Left) {
                    if let Some(rpn) = stack.pop().and_then(pending_to_rpn) {
                        output.push(rpn);
                    }
                } else {
                    break;
                }
            }
            stack.push(Pending::Binary(token, prec));
            expect_operand = true;
        } else if is_closer(token) {
            loop {
                match stack.pop() {
                    None => {
                        return Err(EquationError::UnbalancedClose { token: token.into(), position });
                    }
                    Some(Pending::Open(open)) => {
                        if closer_for(open) != Some(token) {
                            return Err(EquationError::MismatchedBracket {
                                open:  open.into(),
                                close: token.into(),
                                position,
                            });
                        }
                        break;
                    }
                    Some(other) => {
                        if let Some(rpn) = pending_to_rpn(other) {
                            output.push(rpn);
                        }
                    }
                }
            }
        } else {
            return Err(EquationError::UnexpectedOperand { token: token.into(), position });
        }
    }

    if expect_operand {
        return match infix.last() {
            None => Err(EquationError::Empty),
            Some(last) => Err(EquationError::MissingOperand {
                token:    last.clone(),
                position: infix.len() - 1,
            }),
        };
    }

    while let Some(pending) = stack.pop() {
        match pending {
            Pending::Open(open) => return Err(EquationError::UnbalancedOpen(open.into())),
            other => {
                if let Some(rpn) = pending_to_rpn(other) {
                    output.push(rpn);
                }
            }
        }
    }

    Ok(output)
}

// ─── Expression tree ──────────────────────────────────────────────────────────
enum Node<'a> {
    Leaf(&'a str),
    Binary(&'a str, Box<Node<'a>>, Box<Node<'a>>),
}

impl<'a> Node<'a> {
    fn postfix(&self, out: &mut Vec<String>) {
        match self {
            Node::Leaf(t) => out.push((*t).to_string()),
            Node::Binary(op, l, r) => {
                l.postfix(out);
                r.postfix(out);
                out.push((*op).to_string());
            }
        }
    }

    fn prefix(&self, out: &mut Vec<String>) {
        match self {
            Node::Leaf(t) => out.push((*t).to_string()),
            Node::Binary(op, l, r) => {
                out.push((*op).to_string());
                l.prefix(out);
                r.prefix(out);
            }
        }
    }
}

fn build_tree<'a>(rpn: Vec<Rpn<'a>>) -> Result<Node<'a>, EquationError> {
    let mut stack: Vec<Node<'a>> = Vec::new();
    let missing = |token: &str| EquationError::MissingOperand { token: token.into(), position: 0 };

    for item in rpn {
        match item {
            Rpn::Operand(t) => stack.push(Node::Leaf(t)),
            Rpn::Negate => {
                let x = stack.pop().ok_or_else(|| missing("-"))?;
                stack.push(Node::Binary("-", Box::new(Node::Leaf(IMPLICIT_ZERO)), Box::new(x)));
            }
            Rpn::Binary(op) => {
                let r = stack.pop().ok_or_else(|| missing(op))?;
                let l = stack.pop().ok_or_else(|| missing(op))?;
                stack.push(Node::Binary(op, Box::new(l), Box::new(r)));
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        (None, _)          => Err(EquationError::Empty),
        (Some(_), false)   => Err(EquationError::UnexpectedOperand { token: String::new(), position: 0 }),
    }
}

/// Convert an infix token sequence into its three forms.
/// Pure: the same input always gives the same output.
pub fn normalize(infix: &[String]) -> Result<EquationForms, EquationError> {
    let root = build_tree(to_rpn(infix)?)?;

    let mut postfix = Vec::with_capacity(infix.len());
    let mut prefix  = Vec::with_capacity(infix.len());
    root.postfix(&mut postfix);
    root.prefix(&mut prefix);

    Ok(EquationForms { infix: infix.to_vec(), postfix, prefix })
}

/// Build a prepared record from a masked one.
pub fn normalize_record(masked: MaskedRecord) -> Result<Record, DataError> {
    let forms = normalize(&masked.equation).map_err(|source| DataError::MalformedEquation {
        id:       masked.id.clone(),
        equation: masked.equation.join(" "),
        source,
    })?;

    Ok(Record {
        id:               masked.id,
        question:         masked.question,
        equation:         masked.equation,
        infix_equation:   forms.infix,
        postfix_equation: forms.postfix,
        prefix_equation:  forms.prefix,
        num_list:         masked.num_list,
        answer:           masked.answer,
        pos:              None,
        parse_tree:       None,
    })
}
