//! Ejecución directa de IR.
//!
//! Un intérprete sencillo de [`Module`], útil para probar programas
//! sin pasar por el backend nativo. La salida de `printf` se escribe
//! en el [`Write`] que indique el llamador.

use std::io::{self, Write};
use thiserror::Error;

use crate::ir::{
    ArithOp, BlockId, Callee, Condition, Function, FunctionId, Instruction, LogicOp, Module,
    StringId, Terminator, Type, Value,
};

/// Máxima profundidad de llamadas anidadas.
const MAX_DEPTH: usize = 256;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("I/O error")]
    Io(#[from] io::Error),

    #[error("Entrypoint `main` not found")]
    NoMain,

    #[error("Block `{1}` in `{0}` has no terminator")]
    MissingTerminator(String, String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Call depth exceeded, limit is {}", MAX_DEPTH)]
    StackOverflow,

    #[error("Type confusion in {0}")]
    TypeConfusion(&'static str),
}

/// Ejecuta `main` y retorna su código de salida.
pub fn execute<W: Write>(module: &Module, output: &mut W) -> Result<i32, ExecError> {
    let main = module.find("main").ok_or(ExecError::NoMain)?;

    let mut machine = Machine {
        module,
        output,
        depth: 0,
    };

    let status = match machine.call(main, Vec::new())? {
        Datum::Int(status) => status,
        Datum::Void => 0,
        _ => return Err(ExecError::TypeConfusion("return value of `main`")),
    };

    machine.output.flush()?;
    tracing::debug!(status, "execution finished");

    Ok(status)
}

/// Valor en tiempo de ejecución.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Datum {
    Int(i32),
    Float(f64),
    Bool(bool),
    Str(StringId),
    Void,
}

impl Datum {
    fn zero(typ: Type) -> Self {
        match typ {
            Type::I1 => Datum::Bool(false),
            Type::I32 => Datum::Int(0),
            Type::F64 => Datum::Float(0.0),
            Type::Ptr | Type::Void => Datum::Void,
        }
    }
}

struct Frame {
    temps: Vec<Datum>,
    slots: Vec<Datum>,
    parameters: Vec<Datum>,
}

impl Frame {
    fn eval(&self, value: &Value) -> Result<Datum, ExecError> {
        let datum = match *value {
            Value::Int(integer) => Datum::Int(integer),
            Value::Float(float) => Datum::Float(float),
            Value::Bool(boolean) => Datum::Bool(boolean),
            Value::Str(string) => Datum::Str(string),
            Value::Temp(temp, _) => self.temps[temp.0 as usize],
            Value::Void => Datum::Void,
            Value::Param(index) => *self
                .parameters
                .get(index as usize)
                .ok_or(ExecError::TypeConfusion("parameter access"))?,
        };

        Ok(datum)
    }
}

struct Machine<'a, W> {
    module: &'a Module,
    output: &'a mut W,
    depth: usize,
}

impl<W: Write> Machine<'_, W> {
    fn call(&mut self, id: FunctionId, arguments: Vec<Datum>) -> Result<Datum, ExecError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExecError::StackOverflow);
        }

        let module = self.module;
        let function = module.function(id);
        tracing::trace!(function = %function.name, depth = self.depth, "call");

        let mut frame = Frame {
            temps: vec![Datum::Void; function.temps.len()],
            slots: function.slots.iter().map(|slot| Datum::zero(slot.typ)).collect(),
            parameters: arguments,
        };

        self.depth += 1;
        let result = self.run(function, &mut frame);
        self.depth -= 1;

        result
    }

    fn run(&mut self, function: &Function, frame: &mut Frame) -> Result<Datum, ExecError> {
        let missing_terminator = |label: &str| {
            ExecError::MissingTerminator(function.name.clone(), label.to_string())
        };

        if function.blocks.is_empty() {
            return Err(missing_terminator("entry"));
        }

        let mut current = BlockId(0);
        loop {
            let block = function.block(current);
            for instruction in &block.instructions {
                self.step(frame, instruction)?;
            }

            current = match &block.terminator {
                Some(Terminator::Jump(target)) => *target,

                Some(Terminator::Branch {
                    condition,
                    then,
                    otherwise,
                }) => match frame.eval(condition)? {
                    Datum::Bool(true) => *then,
                    Datum::Bool(false) => *otherwise,
                    _ => return Err(ExecError::TypeConfusion("branch condition")),
                },

                Some(Terminator::Return(Some(value))) => return frame.eval(value),
                Some(Terminator::Return(None)) => return Ok(Datum::Void),
                None => return Err(missing_terminator(&block.label)),
            };
        }
    }

    fn step(&mut self, frame: &mut Frame, instruction: &Instruction) -> Result<(), ExecError> {
        use Instruction::*;

        let (into, datum) = match instruction {
            Arithmetic { into, op, lhs, rhs } => {
                let result = arithmetic(*op, frame.eval(lhs)?, frame.eval(rhs)?)?;
                (*into, result)
            }

            Compare {
                into,
                condition,
                lhs,
                rhs,
            } => {
                let result = compare(*condition, frame.eval(lhs)?, frame.eval(rhs)?)?;
                (*into, Datum::Bool(result))
            }

            Logic { into, op, lhs, rhs } => match (frame.eval(lhs)?, frame.eval(rhs)?) {
                (Datum::Bool(lhs), Datum::Bool(rhs)) => {
                    let result = match op {
                        LogicOp::And => lhs && rhs,
                        LogicOp::Or => lhs || rhs,
                    };

                    (*into, Datum::Bool(result))
                }

                _ => return Err(ExecError::TypeConfusion("logical operator")),
            },

            Neg(into, operand) => match frame.eval(operand)? {
                Datum::Int(integer) => (*into, Datum::Int(integer.wrapping_neg())),
                Datum::Bool(boolean) => (*into, Datum::Bool(boolean)),
                _ => return Err(ExecError::TypeConfusion("negation")),
            },

            FNeg(into, operand) => match frame.eval(operand)? {
                Datum::Float(float) => (*into, Datum::Float(-float)),
                _ => return Err(ExecError::TypeConfusion("negation")),
            },

            Not(into, operand) => match frame.eval(operand)? {
                Datum::Bool(boolean) => (*into, Datum::Bool(!boolean)),
                _ => return Err(ExecError::TypeConfusion("logical not")),
            },

            ZExt(into, operand) => match frame.eval(operand)? {
                Datum::Bool(boolean) => (*into, Datum::Int(boolean as i32)),
                _ => return Err(ExecError::TypeConfusion("zero extension")),
            },

            Load { into, from, .. } => (*into, frame.slots[from.0 as usize]),

            Store { value, into } => {
                frame.slots[into.0 as usize] = frame.eval(value)?;
                return Ok(());
            }

            Call {
                into,
                callee,
                arguments,
            } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| frame.eval(argument))
                    .collect::<Result<Vec<_>, _>>()?;

                let result = match callee {
                    Callee::Function(id) => self.call(*id, arguments)?,
                    Callee::Printf => Datum::Int(self.printf(&arguments)?),
                };

                match into {
                    Some(into) => (*into, result),
                    None => return Ok(()),
                }
            }
        };

        frame.temps[into.0 as usize] = datum;
        Ok(())
    }

    /// Subconjunto de `printf()`: `%d`, `%f`, `%s` y `%%`.
    fn printf(&mut self, arguments: &[Datum]) -> Result<i32, ExecError> {
        let module = self.module;
        let (format, mut rest) = match arguments.split_first() {
            Some((Datum::Str(format), rest)) => (module.string(*format), rest.iter()),
            _ => return Err(ExecError::TypeConfusion("printf format")),
        };

        let mut text = String::new();
        let mut chars = format.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                text.push(c);
                continue;
            }

            let argument = match chars.next() {
                Some('%') => {
                    text.push('%');
                    continue;
                }

                Some(conversion) => (conversion, rest.next()),
                None => {
                    text.push('%');
                    break;
                }
            };

            match argument {
                ('d', Some(Datum::Int(integer))) => text.push_str(&integer.to_string()),
                ('f', Some(Datum::Float(float))) if float.is_nan() => text.push_str("nan"),
                ('f', Some(Datum::Float(float))) => text.push_str(&format!("{:.6}", float)),
                ('s', Some(Datum::Str(string))) => text.push_str(module.string(*string)),
                _ => return Err(ExecError::TypeConfusion("printf argument")),
            }
        }

        self.output.write_all(text.as_bytes())?;
        Ok(text.len() as i32)
    }
}

fn arithmetic(op: ArithOp, lhs: Datum, rhs: Datum) -> Result<Datum, ExecError> {
    use ArithOp::*;

    let result = match (op, lhs, rhs) {
        (Add, Datum::Int(a), Datum::Int(b)) => Datum::Int(a.wrapping_add(b)),
        (Sub, Datum::Int(a), Datum::Int(b)) => Datum::Int(a.wrapping_sub(b)),
        (Mul, Datum::Int(a), Datum::Int(b)) => Datum::Int(a.wrapping_mul(b)),
        (SDiv, Datum::Int(_), Datum::Int(0)) => return Err(ExecError::DivisionByZero),
        (SDiv, Datum::Int(a), Datum::Int(b)) => Datum::Int(a.wrapping_div(b)),

        // Aritmética de un bit, módulo 2
        (Add | Sub, Datum::Bool(a), Datum::Bool(b)) => Datum::Bool(a ^ b),
        (Mul, Datum::Bool(a), Datum::Bool(b)) => Datum::Bool(a && b),
        (SDiv, Datum::Bool(_), Datum::Bool(false)) => return Err(ExecError::DivisionByZero),
        (SDiv, Datum::Bool(a), Datum::Bool(true)) => Datum::Bool(a),

        (FAdd, Datum::Float(a), Datum::Float(b)) => Datum::Float(a + b),
        (FSub, Datum::Float(a), Datum::Float(b)) => Datum::Float(a - b),
        (FMul, Datum::Float(a), Datum::Float(b)) => Datum::Float(a * b),
        (FDiv, Datum::Float(a), Datum::Float(b)) => Datum::Float(a / b),
        _ => return Err(ExecError::TypeConfusion("arithmetic")),
    };

    Ok(result)
}

fn compare(condition: Condition, lhs: Datum, rhs: Datum) -> Result<bool, ExecError> {
    use Condition::*;

    let result = match (condition, lhs, rhs) {
        (Eq, Datum::Bool(a), Datum::Bool(b)) => a == b,
        (Ne, Datum::Bool(a), Datum::Bool(b)) => a != b,
        (Slt | Sle | Sgt | Sge, Datum::Bool(a), Datum::Bool(b)) => {
            return compare(condition, Datum::Int(signed(a)), Datum::Int(signed(b)));
        }

        (Eq, Datum::Int(a), Datum::Int(b)) => a == b,
        (Ne, Datum::Int(a), Datum::Int(b)) => a != b,
        (Slt, Datum::Int(a), Datum::Int(b)) => a < b,
        (Sle, Datum::Int(a), Datum::Int(b)) => a <= b,
        (Sgt, Datum::Int(a), Datum::Int(b)) => a > b,
        (Sge, Datum::Int(a), Datum::Int(b)) => a >= b,

        // Las comparaciones ordenadas son falsas ante NaN
        (One, Datum::Float(a), Datum::Float(b)) => !a.is_nan() && !b.is_nan() && a != b,
        (Oeq, Datum::Float(a), Datum::Float(b)) => a == b,
        (Olt, Datum::Float(a), Datum::Float(b)) => a < b,
        (Ole, Datum::Float(a), Datum::Float(b)) => a <= b,
        (Ogt, Datum::Float(a), Datum::Float(b)) => a > b,
        (Oge, Datum::Float(a), Datum::Float(b)) => a >= b,

        _ => return Err(ExecError::TypeConfusion("comparison")),
    };

    Ok(result)
}

/// Un `i1` con signo vale `0` o `-1`.
fn signed(boolean: bool) -> i32 {
    -(boolean as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Builder;

    fn run(module: &Module) -> (Result<i32, ExecError>, String) {
        let mut output = Vec::new();
        let result = execute(module, &mut output);

        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn printf_conversions() {
        let mut builder = Builder::new("test");
        let main = builder.add_function("main", 0, Type::I32);
        let entry = builder.append_block(main, "entry");
        builder.position_at_end(main, entry);

        let format = Value::Str(builder.intern_string("%d|%f|%s|100%%\n"));
        let word = Value::Str(builder.intern_string("hi"));
        let arguments = vec![format, Value::Int(-7), Value::Float(2.5), word];
        builder.call(Callee::Printf, arguments, Type::Void);
        builder.ret(Some(Value::Int(3)));

        let (status, output) = run(&builder.finish());
        assert_eq!(status.unwrap(), 3);
        assert_eq!(output, "-7|2.500000|hi|100%\n");
    }

    #[test]
    fn division_by_zero_is_reported() {
        let mut builder = Builder::new("test");
        let main = builder.add_function("main", 0, Type::I32);
        let entry = builder.append_block(main, "entry");
        builder.position_at_end(main, entry);

        let quotient = builder.arithmetic(ArithOp::SDiv, Value::Int(1), Value::Int(0));
        builder.ret(Some(quotient));

        let (status, _) = run(&builder.finish());
        assert!(matches!(status, Err(ExecError::DivisionByZero)));
    }

    #[test]
    fn one_bit_integers_are_signed() {
        assert!(compare(Condition::Slt, Datum::Bool(true), Datum::Bool(false)).unwrap());
        assert!(compare(Condition::Sge, Datum::Bool(false), Datum::Bool(true)).unwrap());

        let sum = arithmetic(ArithOp::Add, Datum::Bool(true), Datum::Bool(true)).unwrap();
        assert_eq!(sum, Datum::Bool(false));

        let quotient = arithmetic(ArithOp::SDiv, Datum::Bool(true), Datum::Bool(false));
        assert!(matches!(quotient, Err(ExecError::DivisionByZero)));
    }

    #[test]
    fn unterminated_blocks_are_rejected() {
        let mut builder = Builder::new("test");
        let main = builder.add_function("main", 0, Type::I32);
        let entry = builder.append_block(main, "entry");
        let dangling = builder.append_block(main, "dangling");
        builder.position_at_end(main, entry);
        builder.jump(dangling);

        let (status, _) = run(&builder.finish());
        match status {
            Err(ExecError::MissingTerminator(function, block)) => {
                assert_eq!(function, "main");
                assert_eq!(block, "dangling1");
            }

            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unbounded_recursion_is_cut_short() {
        let mut builder = Builder::new("test");
        let main = builder.add_function("main", 0, Type::I32);
        let forever = builder.add_function("user_forever", 0, Type::Void);

        let entry = builder.append_block(forever, "entry");
        builder.position_at_end(forever, entry);
        builder.call(Callee::Function(forever), Vec::new(), Type::Void);
        builder.ret(None);

        let entry = builder.append_block(main, "entry");
        builder.position_at_end(main, entry);
        builder.call(Callee::Function(forever), Vec::new(), Type::Void);
        builder.ret(Some(Value::Int(0)));

        let (status, _) = run(&builder.finish());
        assert!(matches!(status, Err(ExecError::StackOverflow)));
    }

    #[test]
    fn missing_entrypoint() {
        let (status, _) = run(&Builder::new("empty").finish());
        assert!(matches!(status, Err(ExecError::NoMain)));
    }
}
