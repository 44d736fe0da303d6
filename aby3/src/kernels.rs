//! Operator descriptors and the kernel dispatcher.
//!
//! An [`Operator`] carries no behaviour of its own. Shape checking happens in
//! [`Operator::infer_shapes`]; [`DispatchKernel::compile`] turns the
//! descriptor into a kernel over share tensors.

use crate::context::Aby3Context;
use crate::error::{Error, Result};
use crate::replicated::{self, broadcast_shape, RepTensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    AddGrad,
    Sub,
    SubGrad,
    MulSameDim,
    Mul,
    MulGrad,
    Square,
    SquareGrad,
}

impl OpKind {
    pub const ALL: [OpKind; 9] = [
        OpKind::Add,
        OpKind::AddGrad,
        OpKind::Sub,
        OpKind::SubGrad,
        OpKind::MulSameDim,
        OpKind::Mul,
        OpKind::MulGrad,
        OpKind::Square,
        OpKind::SquareGrad,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Add => "mpc_elementwise_add",
            OpKind::AddGrad => "mpc_elementwise_add_grad",
            OpKind::Sub => "mpc_elementwise_sub",
            OpKind::SubGrad => "mpc_elementwise_sub_grad",
            OpKind::MulSameDim => "mpc_mul_with_same_dim",
            OpKind::Mul => "mpc_elementwise_mul",
            OpKind::MulGrad => "mpc_elementwise_mul_grad",
            OpKind::Square => "mpc_square",
            OpKind::SquareGrad => "mpc_square_grad",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<OpKind> {
        OpKind::ALL
            .iter()
            .find(|kind| kind.name() == s)
            .copied()
            .ok_or_else(|| Error::InvalidArgument(format!("unknown operator {}", s)))
    }
}

/// How an operator relates the shapes of its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeRule {
    SameShape,
    Broadcast { axis: Option<usize> },
    Unary,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Operator {
    pub kind: OpKind,
    /// Where the lower-rank operand is aligned; only used by broadcasting ops.
    #[serde(default)]
    pub axis: Option<usize>,
}

impl Operator {
    pub fn new(kind: OpKind) -> Operator {
        Operator { kind, axis: None }
    }

    pub fn with_axis(kind: OpKind, axis: usize) -> Operator {
        Operator {
            kind,
            axis: Some(axis),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Number of share tensors the operator consumes.
    ///
    /// Gradient operators take their forward inputs first and the output
    /// gradient last.
    pub fn arity(&self) -> usize {
        match self.kind {
            OpKind::SubGrad | OpKind::Square => 1,
            OpKind::Add | OpKind::Sub | OpKind::MulSameDim | OpKind::Mul | OpKind::SquareGrad => 2,
            OpKind::AddGrad | OpKind::MulGrad => 3,
        }
    }

    pub fn shape_rule(&self) -> ShapeRule {
        match self.kind {
            OpKind::Add | OpKind::AddGrad | OpKind::Mul | OpKind::MulGrad => {
                ShapeRule::Broadcast { axis: self.axis }
            }
            OpKind::Sub | OpKind::MulSameDim | OpKind::SquareGrad => ShapeRule::SameShape,
            OpKind::SubGrad | OpKind::Square => ShapeRule::Unary,
        }
    }

    /// Whether running the operator involves an exchange with the other parties.
    pub fn communicates(&self) -> bool {
        matches!(
            self.kind,
            OpKind::MulSameDim | OpKind::Mul | OpKind::MulGrad | OpKind::Square | OpKind::SquareGrad
        )
    }

    /// Checks the input shapes and returns the shapes of the outputs.
    pub fn infer_shapes(&self, shapes: &[&[usize]]) -> Result<Vec<Vec<usize>>> {
        if shapes.len() != self.arity() {
            return Err(Error::InvalidArgument(format!(
                "{} takes {} inputs but got {}",
                self.name(),
                self.arity(),
                shapes.len()
            )));
        }
        if self.axis.is_some() && !matches!(self.shape_rule(), ShapeRule::Broadcast { .. }) {
            return Err(Error::InvalidArgument(format!(
                "{} does not broadcast and takes no axis",
                self.name()
            )));
        }

        match self.kind {
            OpKind::Add | OpKind::Mul => Ok(vec![broadcast_shape(shapes[0], shapes[1], self.axis)?]),
            OpKind::AddGrad | OpKind::MulGrad => {
                let out = broadcast_shape(shapes[0], shapes[1], self.axis)?;
                expect_same(self.name(), &out, shapes[2])?;
                Ok(vec![shapes[0].to_vec(), shapes[1].to_vec()])
            }
            OpKind::Sub | OpKind::MulSameDim | OpKind::SquareGrad => {
                expect_same(self.name(), shapes[0], shapes[1])?;
                Ok(vec![shapes[0].to_vec()])
            }
            OpKind::SubGrad => Ok(vec![shapes[0].to_vec(), shapes[0].to_vec()]),
            OpKind::Square => Ok(vec![shapes[0].to_vec()]),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.axis {
            Some(axis) => write!(f, "{}(axis={})", self.name(), axis),
            None => write!(f, "{}", self.name()),
        }
    }
}

fn expect_same(op: &str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch(format!(
            "{} expects shape {:?} but got {:?}",
            op, expected, actual
        )));
    }
    Ok(())
}

pub type Kernel = Box<dyn Fn(&Aby3Context, &[&RepTensor]) -> Result<Vec<RepTensor>>>;

pub trait DispatchKernel {
    fn compile(&self) -> Kernel;

    fn execute(&self, ctx: &Aby3Context, inputs: &[&RepTensor]) -> Result<Vec<RepTensor>> {
        let kernel = self.compile();
        kernel(ctx, inputs)
    }
}

impl DispatchKernel for Operator {
    fn compile(&self) -> Kernel {
        let op = *self;
        Box::new(move |ctx: &Aby3Context, inputs: &[&RepTensor]| -> Result<Vec<RepTensor>> {
            let shapes: Vec<&[usize]> = inputs.iter().map(|x| x.shape()).collect();
            op.infer_shapes(&shapes)?;
            tracing::debug!("{} running {}", ctx.party(), op);

            let axis = op.axis;
            match op.kind {
                OpKind::Add => Ok(vec![replicated::add(inputs[0], inputs[1], axis)?]),
                OpKind::AddGrad => {
                    let (dx, dy) = replicated::add_grad(inputs[0], inputs[1], inputs[2], axis)?;
                    Ok(vec![dx, dy])
                }
                OpKind::Sub => Ok(vec![replicated::sub(inputs[0], inputs[1])?]),
                OpKind::SubGrad => {
                    let (dx, dy) = replicated::sub_grad(inputs[0]);
                    Ok(vec![dx, dy])
                }
                OpKind::MulSameDim => Ok(vec![replicated::mul_with_same_dim(
                    ctx, inputs[0], inputs[1],
                )?]),
                OpKind::Mul => Ok(vec![replicated::mul(ctx, inputs[0], inputs[1], axis)?]),
                OpKind::MulGrad => {
                    let (dx, dy) =
                        replicated::mul_grad(ctx, inputs[0], inputs[1], inputs[2], axis)?;
                    Ok(vec![dx, dy])
                }
                OpKind::Square => Ok(vec![replicated::square(ctx, inputs[0])?]),
                OpKind::SquareGrad => Ok(vec![replicated::square_grad(ctx, inputs[0], inputs[1])?]),
            }
        })
    }
}

/// Runs `op` on this party's shares.
pub fn execute(ctx: &Aby3Context, op: &Operator, inputs: &[&RepTensor]) -> Result<Vec<RepTensor>> {
    op.execute(ctx, inputs)
}
