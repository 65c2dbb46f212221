//! Tree-walking execution of the AST.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::{
    alu,
    ast::{Expr, ForIn, FunctionDecl, Position, Stmt},
    context::{InternalContext, Runtime},
    error::{RuntimeError, RuntimeErrorKind},
    iter::{self, IterFilter, MethodFilter},
    out::{DiscardOut, Out},
    value::{IterHandle, Value},
};

pub type ExecResult<T> = Result<T, RuntimeError>;

/// How control leaves a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break(usize),
    Continue(usize),
    Return(Value),
}

fn positioned(pos: Position) -> impl Fn(RuntimeErrorKind) -> RuntimeError {
    move |kind| RuntimeError::at(pos, kind)
}

impl Expr {
    pub fn evaluate(&self, ctx: &mut InternalContext<'_>) -> ExecResult<Value> {
        match self {
            Self::Direct { value, .. } => Ok(value.clone()),
            Self::Var { slot, .. } => Ok(ctx.get(*slot)),
            Self::Binary {
                op,
                left,
                right,
                pos,
            } => {
                let left = left.evaluate(ctx)?;
                let right = right.evaluate(ctx)?;
                alu::binary(*op, &left, &right).map_err(positioned(*pos))
            }
            Self::Unary { op, operand, pos } => {
                let operand = operand.evaluate(ctx)?;
                alu::unary(*op, &operand).map_err(positioned(*pos))
            }
            Self::And { left, right, .. } => Ok(Value::Bool(
                left.evaluate(ctx)?.is_truthy() && right.evaluate(ctx)?.is_truthy(),
            )),
            Self::Or { left, right, .. } => Ok(Value::Bool(
                left.evaluate(ctx)?.is_truthy() || right.evaluate(ctx)?.is_truthy(),
            )),
            Self::Property { target, key, pos } => {
                let target = target.evaluate(ctx)?;
                ctx.resolvers().get(&target, key).map_err(positioned(*pos))
            }
            Self::Index { target, index, pos } => {
                let target = target.evaluate(ctx)?;
                let index = index.evaluate(ctx)?;
                ctx.resolvers().get(&target, &index).map_err(positioned(*pos))
            }
            Self::Call { callee, args, pos } => {
                let callee = callee.evaluate(ctx)?;
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(ctx))
                    .collect::<ExecResult<Vec<_>>>()?;
                call(&callee, args, ctx.runtime, &mut *ctx.out, *pos)
            }
            Self::Function(decl) => Ok(Value::Function(Arc::clone(decl))),
            Self::List { items, .. } => Ok(Value::list(
                items
                    .iter()
                    .map(|item| item.evaluate(ctx))
                    .collect::<ExecResult<Vec<_>>>()?,
            )),
        }
    }
}

/// Invokes a script or native function. Any other value fails with
/// [`RuntimeErrorKind::NotFunction`].
pub fn call(
    callee: &Value,
    args: Vec<Value>,
    runtime: &Arc<Runtime>,
    out: &mut dyn Out,
    pos: Position,
) -> ExecResult<Value> {
    match callee {
        Value::Function(decl) => invoke(decl, args, runtime, out),
        Value::Native(native) => native.call(&args).map_err(positioned(pos)),
        other => Err(RuntimeError::at(
            pos,
            RuntimeErrorKind::NotFunction {
                type_name: other.type_name().to_owned(),
            },
        )),
    }
}

/// Runs a script function in a fresh frame. Missing arguments are `null`
/// and extra arguments are ignored.
pub fn invoke(
    decl: &FunctionDecl,
    args: Vec<Value>,
    runtime: &Arc<Runtime>,
    out: &mut dyn Out,
) -> ExecResult<Value> {
    let mut vars = vec![Value::Null; decl.frame_size];
    for (var, arg) in vars.iter_mut().zip(args.into_iter().take(decl.arity)) {
        *var = arg;
    }
    let mut ctx = InternalContext::new(vars, out, runtime);
    match execute_block(&decl.body, &mut ctx)? {
        Flow::Return(value) => Ok(value),
        Flow::Normal | Flow::Break(_) | Flow::Continue(_) => Ok(Value::Null),
    }
}

pub fn execute_block(stmts: &[Stmt], ctx: &mut InternalContext<'_>) -> ExecResult<Flow> {
    for stmt in stmts {
        match stmt.execute(ctx)? {
            Flow::Normal => {}
            flow @ (Flow::Break(_) | Flow::Continue(_) | Flow::Return(_)) => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

fn write_value(value: &Value, ctx: &mut InternalContext<'_>) -> Result<(), RuntimeErrorKind> {
    match value {
        Value::Null => Ok(()),
        Value::Str(text) if !ctx.out.is_byte_stream() => ctx.out.write_str(text),
        value if ctx.out.is_byte_stream() => {
            let bytes = ctx.resolvers().to_bytes(value, ctx.out.encoding())?;
            match bytes {
                Some(bytes) => ctx.out.write_bytes(&bytes),
                None => Ok(()),
            }
        }
        value => ctx.out.write_str(&value.to_string()),
    }
}

impl Stmt {
    pub fn execute(&self, ctx: &mut InternalContext<'_>) -> ExecResult<Flow> {
        match self {
            Self::Text { text, pos } => {
                ctx.out.write_str(text).map_err(positioned(*pos))?;
            }
            Self::Placeholder { expr, pos } => {
                let value = expr.evaluate(ctx)?;
                write_value(&value, ctx).map_err(positioned(*pos))?;
            }
            Self::Expr(expr) => {
                expr.evaluate(ctx)?;
            }
            Self::Assign { slot, value, .. } => {
                let value = value.evaluate(ctx)?;
                ctx.set(*slot, value);
            }
            Self::SetProperty {
                target,
                key,
                value,
                pos,
            } => {
                let target = target.evaluate(ctx)?;
                let value = value.evaluate(ctx)?;
                set_property(ctx, &target, key, value, *pos)?;
            }
            Self::SetIndex {
                target,
                index,
                value,
                pos,
            } => {
                let target = target.evaluate(ctx)?;
                let index = index.evaluate(ctx)?;
                let value = value.evaluate(ctx)?;
                set_property(ctx, &target, &index, value, *pos)?;
            }
            Self::Block(stmts) => return execute_block(stmts, ctx),
            Self::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                let branch = if cond.evaluate(ctx)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                return execute_block(branch, ctx);
            }
            Self::ForIn(for_in) => return for_in.execute(ctx),
            Self::Return { value, .. } => {
                let value = match value {
                    Some(expr) => expr.evaluate(ctx)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            Self::Break { label, .. } => return Ok(Flow::Break(label.unwrap_or(ctx.indexer))),
            Self::Continue { label, .. } => {
                return Ok(Flow::Continue(label.unwrap_or(ctx.indexer)));
            }
        }
        Ok(Flow::Normal)
    }
}

fn set_property(
    ctx: &InternalContext<'_>,
    target: &Value,
    property: &Value,
    value: Value,
    pos: Position,
) -> ExecResult<()> {
    let stored = ctx
        .resolvers()
        .set(target, property, value)
        .map_err(positioned(pos))?;
    if stored {
        Ok(())
    } else {
        Err(RuntimeError::at(
            pos,
            RuntimeErrorKind::PropertyNotWritable {
                type_name: target.type_name().to_owned(),
                property: property.to_string(),
            },
        ))
    }
}

impl ForIn {
    /// Builds the loop's iterator, wrapping it in the `where` filter. The
    /// filter function runs in its own frame with its output discarded.
    fn iterator(&self, ctx: &mut InternalContext<'_>) -> ExecResult<Option<IterHandle>> {
        let collection = self.collection.evaluate(ctx)?;
        let Some(mut iter) = iter::to_iter(collection).map_err(positioned(self.pos))? else {
            return Ok(None);
        };
        if let Some(filter) = &self.filter {
            let method = filter.evaluate(ctx)?;
            let runtime = Arc::clone(ctx.runtime);
            let pos = filter.position();
            iter = Box::new(IterFilter::new(
                iter,
                MethodFilter::new(move |item: &Value| {
                    call(&method, vec![item.clone()], &runtime, &mut DiscardOut, pos)
                        .map_err(RuntimeErrorKind::from)
                }),
            ));
        }
        if iter.has_next().map_err(positioned(self.pos))? {
            Ok(Some(Arc::new(Mutex::new(iter))))
        } else {
            Ok(None)
        }
    }

    pub fn execute(&self, ctx: &mut InternalContext<'_>) -> ExecResult<Flow> {
        let Some(handle) = self.iterator(ctx)? else {
            trace!(line = self.pos.line, "loop has no items");
            return match &self.else_body {
                Some(stmts) => execute_block(stmts, ctx),
                None => Ok(Flow::Normal),
            };
        };
        let saved = ctx.indexer;
        ctx.indexer = self.label;
        ctx.set(self.iter_slot, Value::Iter(Arc::clone(&handle)));
        let flow = self.run(&handle, ctx);
        ctx.indexer = saved;
        flow
    }

    fn run(&self, handle: &IterHandle, ctx: &mut InternalContext<'_>) -> ExecResult<Flow> {
        let at = positioned(self.pos);
        loop {
            let item = handle.lock().next().map_err(&at)?;
            ctx.set(self.item_slot, item);
            match execute_block(&self.body, ctx)? {
                Flow::Normal => {}
                Flow::Continue(label) if label == self.label => {}
                Flow::Break(label) if label == self.label => return Ok(Flow::Normal),
                flow @ (Flow::Break(_) | Flow::Continue(_) | Flow::Return(_)) => return Ok(flow),
            }
            if !handle.lock().has_next().map_err(&at)? {
                return Ok(Flow::Normal);
            }
        }
    }
}
