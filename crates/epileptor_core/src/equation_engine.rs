use crate::error::{Result, SymbolicError};
use crate::expr::Expr;
use crate::symbols::{Shape, Symbol, SymbolGroup, VarMap};
use crate::traits::Scalar;
use nalgebra::DMatrix;
use std::collections::{BTreeMap, HashMap};

/// OpCodes for the Stack-based Virtual Machine.
/// The VM operates on a stack of `Scalar` values (f64 or Dual).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the value of an argument slot onto the stack.
    /// Slots follow the flattened order of the declared parameters.
    LoadSlot(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top value (a), pushes a^n.
    Powi(i32),
    /// Pops top value (a), pushes exp(a).
    Exp,
    /// Pops top value (a), pushes -a.
    Neg,
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stack-based Virtual Machine for evaluating compiled expressions.
///
/// The VM is stateless; `execute` takes all necessary context:
/// - `bytecode`: Instructions to run.
/// - `slots`: Flattened argument values (read-only).
/// - `stack`: A mutable buffer for intermediate computations.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, slots: &[T], stack: &mut Vec<T>) -> T {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(T::from_f64(val)),
                OpCode::LoadSlot(idx) => stack.push(slots[idx]),
                OpCode::Add => binary(stack, |a, b| a + b),
                OpCode::Sub => binary(stack, |a, b| a - b),
                OpCode::Mul => binary(stack, |a, b| a * b),
                OpCode::Div => binary(stack, |a, b| a / b),
                OpCode::Powi(n) => unary(stack, |a| a.powi(n)),
                OpCode::Exp => unary(stack, |a| a.exp()),
                OpCode::Neg => unary(stack, |a| -a),
            }
        }

        // Compiled bytecode always leaves exactly one value behind.
        stack.pop().unwrap_or_else(T::zero)
    }
}

fn binary<T: Scalar>(stack: &mut Vec<T>, op: impl Fn(T, T) -> T) {
    let b = stack.pop().unwrap_or_else(T::zero);
    let a = stack.pop().unwrap_or_else(T::zero);
    stack.push(op(a, b));
}

fn unary<T: Scalar>(stack: &mut Vec<T>, op: impl Fn(T) -> T) {
    let a = stack.pop().unwrap_or_else(T::zero);
    stack.push(op(a));
}

/// One declared positional argument of a compiled function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub group: SymbolGroup,
}

impl Parameter {
    pub fn new(name: impl Into<String>, group: SymbolGroup) -> Self {
        Self {
            name: name.into(),
            group,
        }
    }

    /// Looks up `names` in `vars`, in the given order.
    pub fn list(vars: &VarMap, names: &[&str]) -> Result<Vec<Parameter>> {
        names
            .iter()
            .map(|&name| {
                vars.get(name)
                    .cloned()
                    .map(|group| Parameter::new(name, group))
                    .ok_or_else(|| SymbolicError::UnboundVariable(name.to_string()))
            })
            .collect()
    }
}

/// A numeric argument bound to a `Parameter`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(DMatrix<f64>),
}

impl Value {
    pub fn shape(&self) -> Shape {
        match self {
            Value::Scalar(_) => Shape::Scalar,
            Value::Vector(v) => Shape::Vector(v.len()),
            Value::Matrix(m) => Shape::Matrix(m.nrows(), m.ncols()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::Vector(values)
    }
}

impl From<&[f64]> for Value {
    fn from(values: &[f64]) -> Self {
        Value::Vector(values.to_vec())
    }
}

impl From<DMatrix<f64>> for Value {
    fn from(matrix: DMatrix<f64>) -> Self {
        Value::Matrix(matrix)
    }
}

/// Numeric values keyed by variable map name.
pub type Bindings = BTreeMap<String, Value>;

/// Compiles expressions into `Bytecode`, resolving symbols to argument slots.
pub struct Compiler {
    pub slot_map: HashMap<Symbol, usize>,
}

impl Compiler {
    pub fn new(params: &[Parameter]) -> Self {
        let mut slot_map = HashMap::new();
        let symbols = params.iter().flat_map(|p| p.group.symbols());
        for (slot, symbol) in symbols.enumerate() {
            // First declaration wins if a symbol is listed twice.
            slot_map.entry(symbol.clone()).or_insert(slot);
        }
        Self { slot_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<()> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Symbol(symbol) => {
                let slot = self
                    .slot_map
                    .get(symbol)
                    .ok_or_else(|| SymbolicError::UnboundVariable(symbol.name().to_string()))?;
                ops.push(OpCode::LoadSlot(*slot));
            }
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                self.compile_recursive(a, ops)?;
                self.compile_recursive(b, ops)?;
                ops.push(match expr {
                    Expr::Add(..) => OpCode::Add,
                    Expr::Sub(..) => OpCode::Sub,
                    Expr::Mul(..) => OpCode::Mul,
                    _ => OpCode::Div,
                });
            }
            Expr::Powi(a, n) => {
                self.compile_recursive(a, ops)?;
                ops.push(OpCode::Powi(*n));
            }
            Expr::Exp(a) => {
                self.compile_recursive(a, ops)?;
                ops.push(OpCode::Exp);
            }
            Expr::Neg(a) => {
                self.compile_recursive(a, ops)?;
                ops.push(OpCode::Neg);
            }
        }
        Ok(())
    }
}

/// A vectorized numeric function compiled from a list of expressions.
///
/// Arguments are positional, one per declared `Parameter`; each is broadcast
/// over the region (or region-pair) axis of its symbol group. The result is
/// the flat list of output values in expression order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    params: Vec<Parameter>,
    offsets: Vec<usize>,
    slot_count: usize,
    outputs: Vec<Bytecode>,
}

impl CompiledFunction {
    pub fn compile(params: Vec<Parameter>, exprs: &[Expr]) -> Result<Self> {
        let compiler = Compiler::new(&params);
        let outputs = exprs
            .iter()
            .map(|e| compiler.compile(e))
            .collect::<Result<Vec<_>>>()?;

        let mut offsets = Vec::with_capacity(params.len());
        let mut slot_count = 0;
        for p in &params {
            offsets.push(slot_count);
            slot_count += p.group.len();
        }

        Ok(Self {
            params,
            offsets,
            slot_count,
            outputs,
        })
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn output_len(&self) -> usize {
        self.outputs.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Total number of VM instructions across all outputs.
    pub fn op_count(&self) -> usize {
        self.outputs.iter().map(|b| b.ops.len()).sum()
    }

    /// Evaluates with positional arguments.
    pub fn call(&self, args: &[Value]) -> Result<Vec<f64>> {
        let slots = self.pack(args)?;
        let mut out = vec![0.0; self.outputs.len()];
        self.eval_prepared(&slots, &mut out);
        Ok(out)
    }

    /// Evaluates with arguments looked up by parameter name.
    pub fn call_named(&self, bindings: &Bindings) -> Result<Vec<f64>> {
        let args = self
            .params
            .iter()
            .map(|p| {
                bindings
                    .get(&p.name)
                    .cloned()
                    .ok_or_else(|| SymbolicError::UnboundVariable(p.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.call(&args)
    }

    /// Flattens positional arguments into the slot buffer.
    pub fn pack(&self, args: &[Value]) -> Result<Vec<f64>> {
        if args.len() != self.params.len() {
            return Err(SymbolicError::ArgumentCount {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        let mut slots = vec![0.0; self.slot_count];
        for (index, value) in args.iter().enumerate() {
            self.write_param(index, value, &mut slots)?;
        }
        Ok(slots)
    }

    /// Writes one argument into its slot range, broadcasting scalars.
    pub fn write_param(&self, index: usize, value: &Value, slots: &mut [f64]) -> Result<()> {
        let param = self.params.get(index).ok_or(SymbolicError::ArgumentCount {
            expected: self.params.len(),
            got: index + 1,
        })?;
        let offset = self.offsets[index];
        let shape = param.group.shape();
        let target = &mut slots[offset..offset + shape.len()];

        match (shape, value) {
            (_, Value::Scalar(v)) => target.fill(*v),
            (Shape::Vector(n), Value::Vector(values)) if values.len() == n => {
                target.copy_from_slice(values);
            }
            (Shape::Matrix(rows, cols), Value::Matrix(m)) if m.shape() == (rows, cols) => {
                for i in 0..rows {
                    for j in 0..cols {
                        target[i * cols + j] = m[(i, j)];
                    }
                }
            }
            (expected, got) => {
                return Err(SymbolicError::ShapeMismatch {
                    name: param.name.clone(),
                    expected: expected.to_string(),
                    got: got.shape().to_string(),
                })
            }
        }
        Ok(())
    }

    /// Evaluates every output over a flat slot buffer laid out as `pack`
    /// produces it. `out` must hold exactly one value per output.
    pub fn eval_slots<T: Scalar>(&self, slots: &[T], out: &mut [T]) -> Result<()> {
        if slots.len() != self.slot_count {
            return Err(SymbolicError::ShapeMismatch {
                name: "slots".to_string(),
                expected: Shape::Vector(self.slot_count).to_string(),
                got: Shape::Vector(slots.len()).to_string(),
            });
        }
        if out.len() != self.outputs.len() {
            return Err(SymbolicError::ShapeMismatch {
                name: "out".to_string(),
                expected: Shape::Vector(self.outputs.len()).to_string(),
                got: Shape::Vector(out.len()).to_string(),
            });
        }
        self.eval_prepared(slots, out);
        Ok(())
    }

    /// `eval_slots` for buffers whose lengths the caller already guarantees.
    pub(crate) fn eval_prepared<T: Scalar>(&self, slots: &[T], out: &mut [T]) {
        let mut stack = Vec::with_capacity(32);
        for (i, code) in self.outputs.iter().enumerate() {
            out[i] = VM::execute(code, slots, &mut stack);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolGenerator;

    fn quadratic() -> (CompiledFunction, VarMap) {
        let generator = SymbolGenerator::new(2);
        let ([x, a], vars) = generator.vectors(["x", "a"]);
        let exprs: Vec<Expr> = (0..2)
            .map(|i| Expr::from(&a[i]) * Expr::from(&x[i]).powi(2) - 1.0)
            .collect();
        let params = Parameter::list(&vars, &["x", "a"]).expect("declared names");
        let f = CompiledFunction::compile(params, &exprs).expect("compiles");
        (f, vars)
    }

    #[test]
    fn vm_executes_postfix_program() {
        let code = Bytecode {
            ops: vec![
                OpCode::LoadSlot(0),
                OpCode::LoadConst(2.0),
                OpCode::Mul,
                OpCode::Exp,
                OpCode::Neg,
            ],
        };
        let mut stack = Vec::new();
        let value = VM::execute(&code, &[0.5], &mut stack);
        assert!((value + 1.0f64.exp()).abs() < 1e-12);
    }

    #[test]
    fn call_evaluates_per_region_with_scalar_broadcast() {
        let (f, _) = quadratic();
        let out = f
            .call(&[Value::from(vec![1.0, 2.0]), Value::Scalar(3.0)])
            .expect("valid arguments");
        assert_eq!(out, vec![2.0, 11.0]);
    }

    #[test]
    fn call_named_binds_by_variable_name() {
        let (f, _) = quadratic();
        let mut bindings = Bindings::new();
        bindings.insert("x".into(), Value::from(vec![0.0, -1.0]));
        bindings.insert("a".into(), Value::from(vec![5.0, 2.0]));
        assert_eq!(f.call_named(&bindings).unwrap(), vec![-1.0, 1.0]);

        bindings.remove("a");
        let err = f.call_named(&bindings).expect_err("a is unbound");
        assert_eq!(err, SymbolicError::UnboundVariable("a".to_string()));
    }

    #[test]
    fn wrong_argument_count_and_length_are_rejected() {
        let (f, _) = quadratic();
        let err = f.call(&[Value::Scalar(1.0)]).expect_err("too few");
        assert_eq!(err, SymbolicError::ArgumentCount { expected: 2, got: 1 });

        let err = f
            .call(&[Value::from(vec![1.0, 2.0, 3.0]), Value::Scalar(1.0)])
            .expect_err("too long");
        assert!(matches!(err, SymbolicError::ShapeMismatch { ref name, .. } if name == "x"));
    }

    #[test]
    fn matrix_arguments_fill_row_major() {
        let generator = SymbolGenerator::new(2);
        let w = generator.matrix("w");
        let mut vars = VarMap::new();
        vars.insert("w", SymbolGroup::Matrix(w.clone()));
        let exprs = vec![Expr::from(&w[0][1]), Expr::from(&w[1][0])];
        let f = CompiledFunction::compile(Parameter::list(&vars, &["w"]).unwrap(), &exprs).unwrap();
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(f.call(&[Value::Matrix(m)]).unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn eval_slots_checks_buffer_lengths() {
        let (f, _) = quadratic();
        let mut out = vec![0.0; 2];
        f.eval_slots(&[1.0, 2.0, 3.0, 3.0], &mut out).expect("full buffers");
        assert_eq!(out, vec![2.0, 11.0]);

        let err = f.eval_slots(&[1.0, 2.0], &mut out).expect_err("short slots");
        assert!(matches!(err, SymbolicError::ShapeMismatch { ref name, .. } if name == "slots"));

        let mut short = vec![0.0; 1];
        let err = f
            .eval_slots(&[1.0, 2.0, 3.0, 3.0], &mut short)
            .expect_err("short output");
        assert!(matches!(err, SymbolicError::ShapeMismatch { ref name, .. } if name == "out"));
    }

    #[test]
    fn compiling_an_undeclared_symbol_fails() {
        let expr = Expr::from(Symbol::region("q", 0));
        let err = CompiledFunction::compile(Vec::new(), &[expr]).expect_err("q is undeclared");
        assert_eq!(err, SymbolicError::UnboundVariable("q_0".to_string()));
    }
}
