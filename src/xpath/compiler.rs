//! XPath Expression Compiler
//!
//! Lowers the parsed AST to a postfix program for the stack evaluator.
//! Function names, arities and variable references are checked here, so
//! a compiled expression only fails at run time on type errors.

use super::functions;
use super::parser::{self, Axis, BinaryOp, Expr, NodeTest, Step};

/// A postfix program. Predicates are nested programs.
#[derive(Debug, Clone)]
pub struct Program {
    pub ops: Vec<Op>,
}

/// Compiled operation
#[derive(Debug, Clone)]
pub enum Op {
    /// Push the evaluation root
    Root,
    /// Push the context node
    Context,
    /// Replace the node-set on top with the step's result
    Step {
        axis: Axis,
        test: NodeTest,
        predicates: Vec<Program>,
    },
    /// Filter the node-set on top, positions in document order
    Filter(Program),
    Union,
    Number(f64),
    String(String),
    Call(String, usize),
    Binary(BinaryOp),
    Negate,
}

/// A compiled XPath expression, immutable and shareable across threads
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    program: Program,
    node_set: bool,
}

impl CompiledExpr {
    /// The expression text this was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether evaluation always yields a node-set
    pub fn is_node_set(&self) -> bool {
        self.node_set
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl Program {
    fn compile(expr: &Expr) -> Result<Self, String> {
        let mut ops = Vec::new();
        compile_expr(expr, &mut ops)?;
        Ok(Program { ops })
    }
}

fn compile_expr(expr: &Expr, ops: &mut Vec<Op>) -> Result<(), String> {
    match expr {
        Expr::Root => ops.push(Op::Root),
        Expr::Number(n) => ops.push(Op::Number(*n)),
        Expr::String(s) => ops.push(Op::String(s.clone())),
        Expr::Variable(name) => return Err(format!("variables are not supported: ${}", name)),
        Expr::Negate(inner) => {
            compile_expr(inner, ops)?;
            ops.push(Op::Negate);
        }
        Expr::Binary(left, op, right) => {
            compile_expr(left, ops)?;
            compile_expr(right, ops)?;
            ops.push(Op::Binary(*op));
        }
        Expr::Union(left, right) => {
            compile_expr(left, ops)?;
            compile_expr(right, ops)?;
            ops.push(Op::Union);
        }
        Expr::Path(base, step) => {
            compile_expr(base, ops)?;
            ops.push(compile_step(step)?);
        }
        Expr::Filter(base, pred) => {
            compile_expr(base, ops)?;
            ops.push(Op::Filter(Program::compile(pred)?));
        }
        Expr::Step(step) => {
            ops.push(Op::Context);
            ops.push(compile_step(step)?);
        }
        Expr::Function(name, args) => {
            functions::check_call(name, args.len())?;
            for arg in args {
                compile_expr(arg, ops)?;
            }
            ops.push(Op::Call(name.clone(), args.len()));
        }
    }
    Ok(())
}

fn compile_step(step: &Step) -> Result<Op, String> {
    let predicates = step
        .predicates
        .iter()
        .map(Program::compile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Op::Step {
        axis: step.axis,
        test: step.node_test.clone(),
        predicates,
    })
}

/// Compile an XPath expression string
pub fn compile(xpath: &str) -> Result<CompiledExpr, String> {
    let expr = parser::parse(xpath)?;
    Ok(CompiledExpr {
        source: xpath.to_string(),
        node_set: expr.is_node_set(),
        program: Program::compile(&expr)?,
    })
}
