//! Representación intermedia.
//!
//! Un [`Module`] contiene funciones compuestas por bloques básicos.
//! Cada bloque es una secuencia lineal de instrucciones que termina en
//! exactamente un [`Terminator`]. Los valores intermedios son
//! temporales de asignación única con tipo conocido; las variables del
//! programa viven en ranuras de pila ([`Slot`]) que se leen y escriben
//! de forma explícita.
//!
//! La forma textual de un módulo (su implementación de [`Display`]) es
//! LLVM IR válido, el cual se entrega al backend nativo en [`crate::link`].

use std::{
    fmt::{self, Display},
    rc::Rc,
};

/// Tipo de un valor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Booleano de un bit.
    I1,

    /// Entero con signo de 32 bits.
    I32,

    /// Punto flotante de doble precisión.
    F64,

    /// Puntero, usado únicamente para cadenas.
    Ptr,

    /// Ausencia de valor.
    Void,
}

impl Type {
    pub fn is_float(self) -> bool {
        self == Type::F64
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::I1 => "i1",
            Type::I32 => "i32",
            Type::F64 => "double",
            Type::Ptr => "ptr",
            Type::Void => "void",
        };

        fmt.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Slot(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Temp(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StringId(pub u32);

/// Operando de una instrucción.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f64),
    Bool(bool),
    Str(StringId),
    Temp(Temp, Type),

    /// Parámetro entrante de la función actual.
    Param(u32),

    /// Resultado de una llamada a una función sin valor de retorno.
    Void,
}

impl Value {
    pub fn typ(&self) -> Type {
        match self {
            Value::Int(_) => Type::I32,
            Value::Float(_) => Type::F64,
            Value::Bool(_) => Type::I1,
            Value::Str(_) => Type::Ptr,
            Value::Temp(_, typ) => *typ,
            Value::Param(_) => Type::I32,
            Value::Void => Type::Void,
        }
    }
}

impl Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(integer) => write!(fmt, "{}", integer),
            // LLVM exige representación exacta, la forma hexadecimal siempre lo es
            Value::Float(float) => write!(fmt, "0x{:016X}", float.to_bits()),
            Value::Bool(boolean) => write!(fmt, "{}", boolean),
            Value::Str(StringId(id)) => write!(fmt, "@.str.{}", id),
            Value::Temp(Temp(id), _) => write!(fmt, "%t{}", id),
            Value::Param(index) => write!(fmt, "%arg{}", index),
            Value::Void => fmt.write_str("undef"),
        }
    }
}

/// Operación aritmética. Las variantes `F*` operan sobre flotantes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    SDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl Display for ArithOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::SDiv => "sdiv",
            ArithOp::FAdd => "fadd",
            ArithOp::FSub => "fsub",
            ArithOp::FMul => "fmul",
            ArithOp::FDiv => "fdiv",
        };

        fmt.write_str(name)
    }
}

/// Predicado de comparación.
///
/// Las comparaciones enteras son con signo. Las flotantes son
/// ordenadas: cualquier comparación contra NaN es falsa.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl Condition {
    pub fn is_float(self) -> bool {
        use Condition::*;
        matches!(self, Oeq | One | Olt | Ole | Ogt | Oge)
    }
}

impl Display for Condition {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Slt => "slt",
            Condition::Sle => "sle",
            Condition::Sgt => "sgt",
            Condition::Sge => "sge",
            Condition::Oeq => "oeq",
            Condition::One => "one",
            Condition::Olt => "olt",
            Condition::Ole => "ole",
            Condition::Ogt => "ogt",
            Condition::Oge => "oge",
        };

        fmt.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// Destino de una llamada.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Callee {
    /// Función definida en este módulo.
    Function(FunctionId),

    /// `int printf(const char *format, ...)` de la biblioteca de C.
    Printf,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Arithmetic {
        into: Temp,
        op: ArithOp,
        lhs: Value,
        rhs: Value,
    },

    Compare {
        into: Temp,
        condition: Condition,
        lhs: Value,
        rhs: Value,
    },

    Logic {
        into: Temp,
        op: LogicOp,
        lhs: Value,
        rhs: Value,
    },

    Neg(Temp, Value),
    FNeg(Temp, Value),
    Not(Temp, Value),

    /// Extensión con ceros de `i1` a `i32`.
    ZExt(Temp, Value),

    Load {
        into: Temp,
        typ: Type,
        from: Slot,
    },

    Store {
        value: Value,
        into: Slot,
    },

    Call {
        into: Option<Temp>,
        callee: Callee,
        arguments: Vec<Value>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        condition: Value,
        then: BlockId,
        otherwise: BlockId,
    },
    Return(Option<Value>),
}

/// Ranura de pila, el equivalente de un `alloca`.
#[derive(Clone, Debug)]
pub struct SlotInfo {
    pub name: String,
    pub typ: Type,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub parameters: u32,
    pub returns: Type,
    pub slots: Vec<SlotInfo>,
    pub temps: Vec<Type>,
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn block(&self, BlockId(id): BlockId) -> &Block {
        &self.blocks[id as usize]
    }

    pub fn slot(&self, Slot(id): Slot) -> &SlotInfo {
        &self.slots[id as usize]
    }
}

#[derive(Clone, Debug)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub strings: Vec<Rc<str>>,
}

impl Module {
    pub fn function(&self, FunctionId(id): FunctionId) -> &Function {
        &self.functions[id as usize]
    }

    pub fn string(&self, StringId(id): StringId) -> &str {
        &self.strings[id as usize]
    }

    /// Busca una función por su símbolo.
    pub fn find(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|function| function.name == name)
            .map(|index| FunctionId(index as u32))
    }
}

/// Punto de inserción de instrucciones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub function: FunctionId,
    pub block: BlockId,
}

/// Constructor incremental de módulos.
///
/// Mantiene un cursor que indica el bloque donde se insertan las
/// siguientes instrucciones. Emitir sin cursor es un error de
/// programación del generador, no del programa fuente.
pub struct Builder {
    module: Module,
    cursor: Option<Cursor>,
}

impl Builder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Builder {
            module: Module {
                name: name.into(),
                functions: Vec::new(),
                strings: Vec::new(),
            },
            cursor: None,
        }
    }

    /// Declara una nueva función, todavía sin bloques.
    pub fn add_function<S: Into<String>>(
        &mut self,
        name: S,
        parameters: u32,
        returns: Type,
    ) -> FunctionId {
        let id = FunctionId(self.module.functions.len() as u32);
        self.module.functions.push(Function {
            name: name.into(),
            parameters,
            returns,
            slots: Vec::new(),
            temps: Vec::new(),
            blocks: Vec::new(),
        });

        id
    }

    /// Agrega un bloque vacío al final de una función.
    ///
    /// El primer bloque de una función es su punto de entrada. A los
    /// demás se les agrega un sufijo numérico que los hace únicos.
    pub fn append_block(&mut self, function: FunctionId, label: &str) -> BlockId {
        let function = &mut self.module.functions[function.0 as usize];
        let id = function.blocks.len() as u32;

        let label = if id == 0 {
            label.to_string()
        } else {
            format!("{}{}", label, id)
        };

        function.blocks.push(Block {
            label,
            instructions: Vec::new(),
            terminator: None,
        });

        BlockId(id)
    }

    pub fn position_at_end(&mut self, function: FunctionId, block: BlockId) {
        self.cursor = Some(Cursor { function, block });
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    /// Restaura un cursor previamente guardado con [`Builder::cursor()`].
    pub fn restore(&mut self, cursor: Option<Cursor>) {
        self.cursor = cursor;
    }

    /// Determina si el bloque actual ya fue terminado.
    pub fn has_terminator(&self) -> bool {
        match self.cursor {
            Some(Cursor { function, block }) => self
                .module
                .function(function)
                .block(block)
                .terminator
                .is_some(),

            None => false,
        }
    }

    /// Reserva una ranura de pila en la función actual.
    ///
    /// Todas las ranuras se ubican en el prólogo del bloque de
    /// entrada, sin importar en qué bloque se soliciten.
    pub fn alloca(&mut self, typ: Type, name: &str) -> Slot {
        let function = self.function_mut();
        let id = function.slots.len() as u32;

        function.slots.push(SlotInfo {
            name: format!("{}.{}", name, id),
            typ,
        });

        Slot(id)
    }

    pub fn load(&mut self, from: Slot) -> Value {
        let typ = self.function_mut().slots[from.0 as usize].typ;
        let into = self.temp(typ);
        self.push(Instruction::Load { into, typ, from });

        Value::Temp(into, typ)
    }

    pub fn store(&mut self, value: Value, into: Slot) {
        self.push(Instruction::Store { value, into });
    }

    /// El tipo del resultado es el del operando izquierdo.
    pub fn arithmetic(&mut self, op: ArithOp, lhs: Value, rhs: Value) -> Value {
        let typ = lhs.typ();
        let into = self.temp(typ);
        self.push(Instruction::Arithmetic { into, op, lhs, rhs });

        Value::Temp(into, typ)
    }

    pub fn compare(&mut self, condition: Condition, lhs: Value, rhs: Value) -> Value {
        let into = self.temp(Type::I1);
        self.push(Instruction::Compare {
            into,
            condition,
            lhs,
            rhs,
        });

        Value::Temp(into, Type::I1)
    }

    pub fn logic(&mut self, op: LogicOp, lhs: Value, rhs: Value) -> Value {
        let into = self.temp(Type::I1);
        self.push(Instruction::Logic { into, op, lhs, rhs });

        Value::Temp(into, Type::I1)
    }

    pub fn neg(&mut self, operand: Value) -> Value {
        self.unary(Instruction::Neg, operand, operand.typ())
    }

    pub fn fneg(&mut self, operand: Value) -> Value {
        self.unary(Instruction::FNeg, operand, Type::F64)
    }

    pub fn not(&mut self, operand: Value) -> Value {
        self.unary(Instruction::Not, operand, Type::I1)
    }

    pub fn zext(&mut self, operand: Value) -> Value {
        self.unary(Instruction::ZExt, operand, Type::I32)
    }

    /// Emite una llamada. Si `returns` es [`Type::Void`] el resultado
    /// es [`Value::Void`].
    pub fn call(&mut self, callee: Callee, arguments: Vec<Value>, returns: Type) -> Value {
        let into = match returns {
            Type::Void => None,
            typ => Some(self.temp(typ)),
        };

        self.push(Instruction::Call {
            into,
            callee,
            arguments,
        });

        match into {
            Some(temp) => Value::Temp(temp, returns),
            None => Value::Void,
        }
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate(Terminator::Jump(target));
    }

    pub fn branch(&mut self, condition: Value, then: BlockId, otherwise: BlockId) {
        self.terminate(Terminator::Branch {
            condition,
            then,
            otherwise,
        });
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.terminate(Terminator::Return(value));
    }

    /// Obtiene una cadena constante del módulo, reutilizando duplicados.
    pub fn intern_string(&mut self, string: &str) -> StringId {
        let strings = &mut self.module.strings;
        let index = match strings.iter().position(|known| &**known == string) {
            Some(index) => index,
            None => {
                strings.push(Rc::from(string));
                strings.len() - 1
            }
        };

        StringId(index as u32)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    fn unary<F>(&mut self, instruction: F, operand: Value, typ: Type) -> Value
    where
        F: FnOnce(Temp, Value) -> Instruction,
    {
        let into = self.temp(typ);
        self.push(instruction(into, operand));

        Value::Temp(into, typ)
    }

    fn temp(&mut self, typ: Type) -> Temp {
        let function = self.function_mut();
        function.temps.push(typ);

        Temp(function.temps.len() as u32 - 1)
    }

    fn push(&mut self, instruction: Instruction) {
        let block = self.block_mut();
        debug_assert!(block.terminator.is_none(), "emitting into a sealed block");

        block.instructions.push(instruction);
    }

    fn terminate(&mut self, terminator: Terminator) {
        let block = self.block_mut();
        debug_assert!(block.terminator.is_none(), "block terminated twice");

        block.terminator = Some(terminator);
    }

    fn function_mut(&mut self) -> &mut Function {
        let cursor = self.cursor.expect("builder has no insertion point");
        &mut self.module.functions[cursor.function.0 as usize]
    }

    fn block_mut(&mut self) -> &mut Block {
        let cursor = self.cursor.expect("builder has no insertion point");
        &mut self.module.functions[cursor.function.0 as usize].blocks[cursor.block.0 as usize]
    }
}

impl Display for Module {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "; ModuleID = '{}'", self.name)?;
        writeln!(fmt, "source_filename = \"{}\"", self.name)?;
        writeln!(fmt)?;

        for (id, string) in self.strings.iter().enumerate() {
            writeln!(
                fmt,
                "@.str.{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
                id,
                string.len() + 1,
                Escaped(string)
            )?;
        }

        if !self.strings.is_empty() {
            writeln!(fmt)?;
        }

        writeln!(fmt, "declare i32 @printf(ptr, ...)")?;

        for function in &self.functions {
            writeln!(fmt)?;
            write_function(fmt, self, function)?;
        }

        Ok(())
    }
}

fn write_function(fmt: &mut fmt::Formatter<'_>, module: &Module, function: &Function) -> fmt::Result {
    write!(fmt, "define {} @{}(", function.returns, function.name)?;
    for index in 0..function.parameters {
        let separator = if index == 0 { "" } else { ", " };
        write!(fmt, "{}i32 {}", separator, Value::Param(index))?;
    }

    writeln!(fmt, ") {{")?;

    for (index, block) in function.blocks.iter().enumerate() {
        writeln!(fmt, "{}:", block.label)?;

        if index == 0 {
            for slot in &function.slots {
                writeln!(fmt, "  %{} = alloca {}", slot.name, slot.typ)?;
            }
        }

        for instruction in &block.instructions {
            write!(fmt, "  ")?;
            write_instruction(fmt, module, function, instruction)?;
            writeln!(fmt)?;
        }

        write!(fmt, "  ")?;
        match &block.terminator {
            Some(Terminator::Jump(target)) => {
                writeln!(fmt, "br label %{}", function.block(*target).label)?
            }

            Some(Terminator::Branch {
                condition,
                then,
                otherwise,
            }) => writeln!(
                fmt,
                "br i1 {}, label %{}, label %{}",
                condition,
                function.block(*then).label,
                function.block(*otherwise).label
            )?,

            Some(Terminator::Return(Some(value))) => writeln!(fmt, "ret {} {}", value.typ(), value)?,
            Some(Terminator::Return(None)) => writeln!(fmt, "ret void")?,
            None => writeln!(fmt, "unreachable")?,
        }
    }

    writeln!(fmt, "}}")
}

fn write_instruction(
    fmt: &mut fmt::Formatter<'_>,
    module: &Module,
    function: &Function,
    instruction: &Instruction,
) -> fmt::Result {
    use Instruction::*;

    let temp = |temp: &Temp| Value::Temp(*temp, function.temps[temp.0 as usize]);

    match instruction {
        Arithmetic { into, op, lhs, rhs } => {
            write!(fmt, "{} = {} {} {}, {}", temp(into), op, lhs.typ(), lhs, rhs)
        }

        Compare {
            into,
            condition,
            lhs,
            rhs,
        } => {
            let opcode = if condition.is_float() { "fcmp" } else { "icmp" };
            write!(
                fmt,
                "{} = {} {} {} {}, {}",
                temp(into),
                opcode,
                condition,
                lhs.typ(),
                lhs,
                rhs
            )
        }

        Logic { into, op, lhs, rhs } => {
            let opcode = match op {
                LogicOp::And => "and",
                LogicOp::Or => "or",
            };

            write!(fmt, "{} = {} i1 {}, {}", temp(into), opcode, lhs, rhs)
        }

        Neg(into, operand) => write!(fmt, "{} = sub {} 0, {}", temp(into), operand.typ(), operand),
        FNeg(into, operand) => write!(fmt, "{} = fneg double {}", temp(into), operand),
        Not(into, operand) => write!(fmt, "{} = xor i1 {}, true", temp(into), operand),
        ZExt(into, operand) => write!(fmt, "{} = zext i1 {} to i32", temp(into), operand),

        Load { into, typ, from } => write!(
            fmt,
            "{} = load {}, ptr %{}",
            temp(into),
            typ,
            function.slot(*from).name
        ),

        Store { value, into } => write!(
            fmt,
            "store {} {}, ptr %{}",
            value.typ(),
            value,
            function.slot(*into).name
        ),

        Call {
            into,
            callee,
            arguments,
        } => {
            if let Some(into) = into {
                write!(fmt, "{} = ", temp(into))?;
            }

            match callee {
                Callee::Printf => write!(fmt, "call i32 (ptr, ...) @printf(")?,
                Callee::Function(id) => {
                    let target = module.function(*id);
                    write!(fmt, "call {} @{}(", target.returns, target.name)?
                }
            }

            for (index, argument) in arguments.iter().enumerate() {
                let separator = if index == 0 { "" } else { ", " };
                write!(fmt, "{}{} {}", separator, argument.typ(), argument)?;
            }

            write!(fmt, ")")
        }
    }
}

/// Escapa una cadena al formato `c"..."` de LLVM.
struct Escaped<'a>(&'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.bytes() {
            match byte {
                b'"' | b'\\' => write!(fmt, "\\{:02X}", byte)?,
                0x20..=0x7e => write!(fmt, "{}", byte as char)?,
                _ => write!(fmt, "\\{:02X}", byte)?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_llvm_text() {
        let mut builder = Builder::new("demo");
        let main = builder.add_function("main", 0, Type::I32);
        let entry = builder.append_block(main, "entry");
        let then = builder.append_block(main, "then");
        let merge = builder.append_block(main, "merge");

        builder.position_at_end(main, entry);
        let x = builder.alloca(Type::I32, "x");
        builder.store(Value::Int(5), x);
        let loaded = builder.load(x);
        let sum = builder.arithmetic(ArithOp::Add, loaded, Value::Int(1));
        let test = builder.compare(Condition::Slt, sum, Value::Int(10));
        builder.branch(test, then, merge);

        builder.position_at_end(main, then);
        let format = builder.intern_string("%d\n");
        builder.call(Callee::Printf, vec![Value::Str(format), sum], Type::Void);
        builder.jump(merge);

        builder.position_at_end(main, merge);
        builder.ret(Some(Value::Int(0)));

        let text = builder.finish().to_string();
        let expected = "\
; ModuleID = 'demo'
source_filename = \"demo\"

@.str.0 = private unnamed_addr constant [4 x i8] c\"%d\\0A\\00\"

declare i32 @printf(ptr, ...)

define i32 @main() {
entry:
  %x.0 = alloca i32
  store i32 5, ptr %x.0
  %t0 = load i32, ptr %x.0
  %t1 = add i32 %t0, 1
  %t2 = icmp slt i32 %t1, 10
  br i1 %t2, label %then1, label %merge2
then1:
  call i32 (ptr, ...) @printf(ptr @.str.0, i32 %t1)
  br label %merge2
merge2:
  ret i32 0
}
";

        assert_eq!(text, expected);
    }

    #[test]
    fn floats_are_exact_and_strings_deduplicated() {
        let mut builder = Builder::new("demo");
        let first = builder.intern_string("hi \"there\"");
        let second = builder.intern_string("hi \"there\"");

        assert_eq!(first, second);
        assert_eq!(Value::Float(1.5).to_string(), "0x3FF8000000000000");
        assert_eq!(Escaped("a\"b\\").to_string(), "a\\22b\\5C");
    }

    #[test]
    fn cursor_save_and_restore() {
        let mut builder = Builder::new("demo");
        let main = builder.add_function("main", 0, Type::I32);
        let entry = builder.append_block(main, "entry");
        builder.position_at_end(main, entry);

        let saved = builder.cursor();
        let other = builder.add_function("user_f", 1, Type::Void);
        let other_entry = builder.append_block(other, "entry");
        builder.position_at_end(other, other_entry);
        builder.ret(None);
        assert!(builder.has_terminator());

        builder.restore(saved);
        assert_eq!(builder.cursor().map(|cursor| cursor.function), Some(main));
        assert!(!builder.has_terminator());
    }
}
