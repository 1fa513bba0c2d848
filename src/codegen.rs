//! Generación de código intermedio.
//!
//! Recorre el [`Ast`] y construye un [`Module`] de IR. El programa
//! completo queda envuelto en una función `main` implícita que retorna
//! `0` al llegar al final. Las funciones declaradas por el usuario se
//! emiten como funciones aparte, con prefijo `user_` en su símbolo.
//!
//! A diferencia del parser, este recorrido no se recupera de errores:
//! el primer error de generación aborta la unidad completa.

use std::collections::HashMap;
use thiserror::Error;

use crate::{
    ir::{
        ArithOp, BlockId, Builder, Callee, Condition, FunctionId, LogicOp, Module, Slot, Type, Value,
    },
    lex::{Identifier, Keyword, Literal, Token},
    parse::{Ast, Expr, Statement},
    source::{Located, Location},
};

pub type Lowering<T> = Result<T, Located<LoweringError>>;

#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum LoweringError {
    #[error("Undefined variable '{0}'")]
    UndefinedVariable(Identifier),

    #[error("Unsupported binary operator {0}")]
    UnsupportedBinaryOperator(Token),

    #[error("Unsupported logical operator {0}")]
    UnsupportedLogicalOperator(Token),

    #[error("Unsupported unary operator {0}")]
    UnsupportedUnaryOperator(Token),

    #[error("Unsupported literal type: {0}")]
    UnsupportedLiteral(Literal),

    #[error("Unsupported type for printing: `{0}`")]
    UnsupportedPrintType(Type),

    #[error("Invalid condition type: `{0}`")]
    InvalidCondition(Type),

    #[error("Type mismatch: expected `{0}`, found `{1}`")]
    TypeMismatch(Type, Type),

    #[error("Operator {0} cannot be applied to `{1}`")]
    UnsupportedOperand(Token, Type),

    #[error("Can only call functions")]
    NotCallable,

    #[error("Expected {0} arguments but got {1}")]
    ArityMismatch(usize, usize),

    #[error("Function arguments must be `i32`, found `{0}`")]
    InvalidArgument(Type),

    #[error("Function calls produce no value")]
    VoidValue,
}

/// Genera el módulo de IR de un programa completo.
pub fn generate(ast: &Ast, module_name: &str) -> Lowering<Module> {
    let mut builder = Builder::new(module_name);
    let main = builder.add_function("main", 0, Type::I32);
    let entry = builder.append_block(main, "entry");
    builder.position_at_end(main, entry);

    let mut generator = Generator {
        builder,
        scopes: Scopes::new(),
        function: main,
    };

    for statement in ast.statements() {
        generator.statement(statement)?;
    }

    if !generator.builder.has_terminator() {
        generator.builder.ret(Some(Value::Int(0)));
    }

    let module = generator.builder.finish();
    tracing::debug!(
        module = module_name,
        functions = module.functions.len(),
        blocks = module.functions.iter().map(|f| f.blocks.len()).sum::<usize>(),
        "lowering finished"
    );

    Ok(module)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct ScopeId(usize);

#[derive(Copy, Clone, Debug, PartialEq)]
enum Binding {
    Variable {
        slot: Slot,
        typ: Type,
        owner: FunctionId,
    },

    Function {
        id: FunctionId,
        arity: usize,
    },
}

struct Scope {
    parent: Option<ScopeId>,
    bindings: HashMap<Identifier, Binding>,
}

/// Cadena de ámbitos léxicos.
///
/// Los ámbitos viven en una arena que crece y decrece como pila: un
/// ámbito nuevo siempre es hijo del actual, y al abandonarlo se
/// descarta junto con todo lo que se creó después de él.
struct Scopes {
    arena: Vec<Scope>,
    current: ScopeId,
}

impl Scopes {
    fn new() -> Self {
        Scopes {
            arena: vec![Scope {
                parent: None,
                bindings: HashMap::new(),
            }],
            current: ScopeId(0),
        }
    }

    /// Abre un ámbito hijo del actual.
    fn enter(&mut self) -> ScopeId {
        let id = ScopeId(self.arena.len());
        self.arena.push(Scope {
            parent: Some(self.current),
            bindings: HashMap::new(),
        });

        self.current = id;
        id
    }

    /// Cierra un ámbito abierto por [`Scopes::enter()`].
    fn leave(&mut self, scope: ScopeId) {
        let parent = self.arena[scope.0].parent;
        debug_assert!(parent.is_some(), "the root scope is never left");

        self.arena.truncate(scope.0);
        self.current = parent.unwrap_or(ScopeId(0));
    }

    /// Redeclarar en el mismo ámbito reemplaza la definición anterior.
    fn bind(&mut self, name: Identifier, binding: Binding) {
        self.arena[self.current.0].bindings.insert(name, binding);
    }

    fn lookup(&self, name: &Identifier) -> Option<Binding> {
        let mut scope = Some(self.current);
        while let Some(ScopeId(index)) = scope {
            let Scope { parent, bindings } = &self.arena[index];
            if let Some(binding) = bindings.get(name) {
                return Some(*binding);
            }

            scope = *parent;
        }

        None
    }
}

struct Generator {
    builder: Builder,
    scopes: Scopes,
    function: FunctionId,
}

impl Generator {
    fn statement(&mut self, statement: &Statement) -> Lowering<()> {
        match statement {
            Statement::Expression(expr) => {
                self.expression(expr)?;
            }

            Statement::Print(expr) => self.print(expr)?,

            Statement::Let { name, initializer } => {
                let value = match initializer {
                    Some(initializer) => self.value(initializer)?,
                    None => Value::Int(0),
                };

                let typ = value.typ();
                let slot = self.builder.alloca(typ, name.as_ref().as_ref());
                self.builder.store(value, slot);

                let owner = self.function;
                let binding = Binding::Variable { slot, typ, owner };
                self.scopes.bind(name.as_ref().clone(), binding);
            }

            Statement::Block(statements) => {
                let scope = self.scopes.enter();
                for statement in statements {
                    self.statement(statement)?;
                }

                self.scopes.leave(scope);
            }

            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_statement(condition, then_branch, else_branch.as_deref())?,

            Statement::While { condition, body } => self.while_statement(condition, body)?,

            Statement::Function {
                name,
                parameters,
                body,
            } => self.function_declaration(name, parameters, body)?,
        }

        Ok(())
    }

    fn print(&mut self, expr: &Located<Expr>) -> Lowering<()> {
        let value = self.expression(expr)?;

        let (format, value) = match value.typ() {
            Type::I32 => ("%d\n", value),
            Type::I1 => ("%d\n", self.builder.zext(value)),
            Type::F64 => ("%f\n", value),
            Type::Ptr => ("%s\n", value),
            Type::Void => {
                let error = LoweringError::UnsupportedPrintType(Type::Void);
                return Err(Located::at(error, expr.location().clone()));
            }
        };

        let format = Value::Str(self.builder.intern_string(format));
        self.builder
            .call(Callee::Printf, vec![format, value], Type::Void);

        Ok(())
    }

    fn if_statement(
        &mut self,
        condition: &Located<Expr>,
        then_branch: &Statement,
        else_branch: Option<&Statement>,
    ) -> Lowering<()> {
        let condition = self.condition(condition)?;

        let function = self.function;
        let then_block = self.builder.append_block(function, "then");
        let else_block = else_branch.map(|_| self.builder.append_block(function, "else"));
        let merge = self.builder.append_block(function, "merge");

        self.builder
            .branch(condition, then_block, else_block.unwrap_or(merge));

        self.builder.position_at_end(function, then_block);
        self.statement(then_branch)?;
        self.fall_through(merge);

        if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
            self.builder.position_at_end(function, else_block);
            self.statement(else_branch)?;
            self.fall_through(merge);
        }

        self.builder.position_at_end(function, merge);
        Ok(())
    }

    fn while_statement(&mut self, condition: &Located<Expr>, body: &Statement) -> Lowering<()> {
        let function = self.function;
        let cond_block = self.builder.append_block(function, "cond");
        let body_block = self.builder.append_block(function, "body");
        let end = self.builder.append_block(function, "end");

        self.builder.jump(cond_block);

        self.builder.position_at_end(function, cond_block);
        let condition = self.condition(condition)?;
        self.builder.branch(condition, body_block, end);

        self.builder.position_at_end(function, body_block);
        self.statement(body)?;
        self.fall_through(cond_block);

        self.builder.position_at_end(function, end);
        Ok(())
    }

    fn function_declaration(
        &mut self,
        name: &Located<Identifier>,
        parameters: &[Located<Identifier>],
        body: &[Statement],
    ) -> Lowering<()> {
        tracing::debug!(function = %name.as_ref(), parameters = parameters.len(), "lowering function");

        let symbol = self.mangle(name.as_ref());
        let id = self
            .builder
            .add_function(symbol, parameters.len() as u32, Type::Void);

        // Visible antes del cuerpo para permitir recursión
        let arity = parameters.len();
        self.scopes
            .bind(name.as_ref().clone(), Binding::Function { id, arity });

        let saved_cursor = self.builder.cursor();
        let saved_function = self.function;

        let entry = self.builder.append_block(id, "entry");
        self.builder.position_at_end(id, entry);
        self.function = id;

        let scope = self.scopes.enter();
        for (index, parameter) in parameters.iter().enumerate() {
            let slot = self.builder.alloca(Type::I32, parameter.as_ref().as_ref());
            self.builder.store(Value::Param(index as u32), slot);

            let binding = Binding::Variable {
                slot,
                typ: Type::I32,
                owner: id,
            };

            self.scopes.bind(parameter.as_ref().clone(), binding);
        }

        for statement in body {
            self.statement(statement)?;
        }

        if !self.builder.has_terminator() {
            self.builder.ret(None);
        }

        self.scopes.leave(scope);
        self.builder.restore(saved_cursor);
        self.function = saved_function;

        Ok(())
    }

    /// Termina el bloque actual con un salto, si no ha sido terminado.
    fn fall_through(&mut self, target: BlockId) {
        if !self.builder.has_terminator() {
            self.builder.jump(target);
        }
    }

    fn expression(&mut self, expr: &Located<Expr>) -> Lowering<Value> {
        let location = expr.location();

        match expr.as_ref() {
            Expr::Literal(literal) => self.literal(literal, location),
            Expr::Variable(name) => self.load(name, location),
            Expr::Grouping(inner) => self.expression(inner),

            Expr::Assign { name, value } => {
                let stored = self.value(value)?;
                let (slot, typ) = self.variable(name.as_ref(), name.location())?;

                if stored.typ() != typ {
                    let error = LoweringError::TypeMismatch(typ, stored.typ());
                    return Err(Located::at(error, value.location().clone()));
                }

                self.builder.store(stored, slot);
                Ok(stored)
            }

            Expr::Unary(operator, operand) => {
                let value = self.value(operand)?;

                match operator.as_ref() {
                    Token::Minus => match value.typ() {
                        Type::F64 => Ok(self.builder.fneg(value)),
                        Type::I32 | Type::I1 => Ok(self.builder.neg(value)),
                        other => Err(unsupported_operand(operator, other)),
                    },

                    Token::Bang => {
                        let value = self.coerce(value, operand.location())?;
                        Ok(self.builder.not(value))
                    }

                    other => {
                        let error = LoweringError::UnsupportedUnaryOperator(other.clone());
                        Err(Located::at(error, operator.location().clone()))
                    }
                }
            }

            Expr::Binary(left, operator, right) => self.binary(left, operator, right),

            Expr::Logical(left, operator, right) => {
                let lhs = self.value(left)?;
                let lhs = self.coerce(lhs, left.location())?;
                let rhs = self.value(right)?;
                let rhs = self.coerce(rhs, right.location())?;

                let op = match operator.as_ref() {
                    Token::Keyword(Keyword::And) => LogicOp::And,
                    Token::Keyword(Keyword::Or) => LogicOp::Or,
                    other => {
                        let error = LoweringError::UnsupportedLogicalOperator(other.clone());
                        return Err(Located::at(error, operator.location().clone()));
                    }
                };

                Ok(self.builder.logic(op, lhs, rhs))
            }

            Expr::Call { callee, arguments } => self.call(expr, callee, arguments),
        }
    }

    /// Como [`Generator::expression()`], pero rechaza llamadas sin valor.
    fn value(&mut self, expr: &Located<Expr>) -> Lowering<Value> {
        match self.expression(expr)? {
            Value::Void => Err(Located::at(LoweringError::VoidValue, expr.location().clone())),
            value => Ok(value),
        }
    }

    fn literal(&mut self, literal: &Literal, location: &Location) -> Lowering<Value> {
        match literal {
            Literal::Int(integer) => Ok(Value::Int(*integer)),
            Literal::Float(float) => Ok(Value::Float(*float)),
            Literal::Bool(boolean) => Ok(Value::Bool(*boolean)),
            Literal::Str(string) => Ok(Value::Str(self.builder.intern_string(string))),
            Literal::Identifier(name) => self.load(name, location),

            other => {
                let error = LoweringError::UnsupportedLiteral(other.clone());
                Err(Located::at(error, location.clone()))
            }
        }
    }

    fn binary(
        &mut self,
        left: &Located<Expr>,
        operator: &Located<Token>,
        right: &Located<Expr>,
    ) -> Lowering<Value> {
        let lhs = self.value(left)?;
        let rhs = self.value(right)?;

        // La forma de la instrucción la decide el operando izquierdo
        let typ = lhs.typ();
        let float = typ.is_float();

        enum Form {
            Arithmetic(ArithOp, ArithOp),
            Compare(Condition, Condition),
        }

        let form = match operator.as_ref() {
            Token::Plus => Form::Arithmetic(ArithOp::Add, ArithOp::FAdd),
            Token::Minus => Form::Arithmetic(ArithOp::Sub, ArithOp::FSub),
            Token::Times => Form::Arithmetic(ArithOp::Mul, ArithOp::FMul),
            Token::Slash => Form::Arithmetic(ArithOp::SDiv, ArithOp::FDiv),
            Token::Less => Form::Compare(Condition::Slt, Condition::Olt),
            Token::LessOrEqual => Form::Compare(Condition::Sle, Condition::Ole),
            Token::Greater => Form::Compare(Condition::Sgt, Condition::Ogt),
            Token::GreaterOrEqual => Form::Compare(Condition::Sge, Condition::Oge),
            Token::Equal => Form::Compare(Condition::Eq, Condition::Oeq),
            Token::NotEqual => Form::Compare(Condition::Ne, Condition::One),

            other => {
                let error = LoweringError::UnsupportedBinaryOperator(other.clone());
                return Err(Located::at(error, operator.location().clone()));
            }
        };

        // `i1` sigue la forma entera, como cualquier tipo no flotante
        match typ {
            Type::I1 | Type::I32 | Type::F64 => (),
            other => return Err(unsupported_operand(operator, other)),
        }

        if rhs.typ() != typ {
            let error = LoweringError::TypeMismatch(typ, rhs.typ());
            return Err(Located::at(error, right.location().clone()));
        }

        let value = match form {
            Form::Arithmetic(int, fp) => {
                let op = if float { fp } else { int };
                self.builder.arithmetic(op, lhs, rhs)
            }

            Form::Compare(int, fp) => {
                let condition = if float { fp } else { int };
                self.builder.compare(condition, lhs, rhs)
            }
        };

        Ok(value)
    }

    fn call(
        &mut self,
        expr: &Located<Expr>,
        callee: &Located<Expr>,
        arguments: &[Located<Expr>],
    ) -> Lowering<Value> {
        let not_callable = || Located::at(LoweringError::NotCallable, callee.location().clone());

        let name = match callee.as_ref() {
            Expr::Variable(name) => name,
            _ => return Err(not_callable()),
        };

        let (id, arity) = match self.scopes.lookup(name) {
            Some(Binding::Function { id, arity }) => (id, arity),
            Some(Binding::Variable { .. }) => return Err(not_callable()),
            None => {
                let error = LoweringError::UndefinedVariable(name.clone());
                return Err(Located::at(error, callee.location().clone()));
            }
        };

        if arguments.len() != arity {
            let error = LoweringError::ArityMismatch(arity, arguments.len());
            return Err(Located::at(error, expr.location().clone()));
        }

        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = self.value(argument)?;
            if value.typ() != Type::I32 {
                let error = LoweringError::InvalidArgument(value.typ());
                return Err(Located::at(error, argument.location().clone()));
            }

            values.push(value);
        }

        Ok(self.builder.call(Callee::Function(id), values, Type::Void))
    }

    fn condition(&mut self, expr: &Located<Expr>) -> Lowering<Value> {
        let value = self.value(expr)?;
        self.coerce(value, expr.location())
    }

    /// Reduce un valor a `i1`: cualquier valor distinto de cero es verdadero.
    fn coerce(&mut self, value: Value, location: &Location) -> Lowering<Value> {
        match value.typ() {
            Type::I1 => Ok(value),
            Type::I32 => Ok(self.builder.compare(Condition::Ne, value, Value::Int(0))),
            Type::F64 => Ok(self.builder.compare(Condition::One, value, Value::Float(0.0))),
            other => Err(Located::at(
                LoweringError::InvalidCondition(other),
                location.clone(),
            )),
        }
    }

    fn load(&mut self, name: &Identifier, location: &Location) -> Lowering<Value> {
        let (slot, _) = self.variable(name, location)?;
        Ok(self.builder.load(slot))
    }

    /// Resuelve una variable de la función actual.
    fn variable(&self, name: &Identifier, location: &Location) -> Lowering<(Slot, Type)> {
        match self.scopes.lookup(name) {
            Some(Binding::Variable { slot, typ, owner }) if owner == self.function => {
                Ok((slot, typ))
            }

            _ => Err(Located::at(
                LoweringError::UndefinedVariable(name.clone()),
                location.clone(),
            )),
        }
    }

    fn mangle(&self, name: &Identifier) -> String {
        let base = format!("user_{}", name);
        let module = self.builder.module();

        if module.find(&base).is_none() {
            return base;
        }

        let mut suffix = 1;
        loop {
            let candidate = format!("{}.{}", base, suffix);
            if module.find(&candidate).is_none() {
                return candidate;
            }

            suffix += 1;
        }
    }
}

fn unsupported_operand(operator: &Located<Token>, typ: Type) -> Located<LoweringError> {
    let error = LoweringError::UnsupportedOperand(operator.as_ref().clone(), typ);
    Located::at(error, operator.location().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, parse, source};

    fn lower(code: &str) -> Lowering<Module> {
        let (start, stream) = source::consume(code.as_bytes(), "test.mb");
        let tokens = Lexer::new(start, stream)
            .try_exhaustive()
            .expect("lexical error in test input");

        let (ast, errors) = parse::parse(tokens);
        assert!(errors.is_empty(), "syntax errors: {:?}", errors);

        generate(&ast, "test.mb")
    }

    fn lowering_error(code: &str) -> (LoweringError, Option<String>) {
        let error = lower(code).expect_err("lowering should fail");
        let snippet = error.location().snippet();

        (error.into_inner(), snippet)
    }

    fn ir(code: &str) -> String {
        lower(code).expect("lowering failed").to_string()
    }

    #[test]
    fn undefined_variable_is_fatal() {
        let (error, snippet) = lowering_error("print y;");

        assert_eq!(error, LoweringError::UndefinedVariable(Identifier::from("y")));
        assert_eq!(snippet.as_deref(), Some("y"));
        assert_eq!(error.to_string(), "Undefined variable 'y'");
    }

    #[test]
    fn block_bindings_do_not_leak() {
        let (error, _) = lowering_error("{ let z = 1; } print z;");
        assert_eq!(error, LoweringError::UndefinedVariable(Identifier::from("z")));

        assert!(lower("let z = 1; { let z = 2.5; print z; } print z;").is_ok());
        assert!(lower("let a = 1; let a = true; print a;").is_ok());
    }

    #[test]
    fn assignment_requires_a_declaration_of_the_same_type() {
        let (error, _) = lowering_error("x = 1;");
        assert_eq!(error, LoweringError::UndefinedVariable(Identifier::from("x")));

        let (error, snippet) = lowering_error("let x = 1; x = 2.0;");
        assert_eq!(error, LoweringError::TypeMismatch(Type::I32, Type::F64));
        assert_eq!(snippet.as_deref(), Some("2.0"));
    }

    #[test]
    fn instruction_form_follows_the_left_operand() {
        let text = ir("let a = 1.5 * 2.0; let b = 7 / 2; print a < 3.0;");

        assert!(text.contains("fmul double 0x3FF8000000000000, 0x4000000000000000"));
        assert!(text.contains("sdiv i32 7, 2"));
        assert!(text.contains("fcmp olt double"));
        assert!(text.contains("zext i1"));

        let (error, _) = lowering_error("print 1 + 1.5;");
        assert_eq!(error, LoweringError::TypeMismatch(Type::I32, Type::F64));

        let (error, _) = lowering_error("print \"a\" + \"b\";");
        assert_eq!(error, LoweringError::UnsupportedOperand(Token::Plus, Type::Ptr));
    }

    #[test]
    fn booleans_take_the_integer_form() {
        let text = ir("print true < false; print -true; print true + false;");

        assert!(text.contains("icmp slt i1 true, false"));
        assert!(text.contains("sub i1 0, true"));
        assert!(text.contains("add i1 true, false"));

        let (error, _) = lowering_error("print -\"a\";");
        assert_eq!(error, LoweringError::UnsupportedOperand(Token::Minus, Type::Ptr));

        let (error, _) = lowering_error("print true < 1;");
        assert_eq!(error, LoweringError::TypeMismatch(Type::I1, Type::I32));
    }

    #[test]
    fn conditions_are_coerced_to_booleans() {
        let text = ir("if (1) print 1; while (0.5) print 2; print !3;");

        assert!(text.contains("icmp ne i32 1, 0"));
        assert!(text.contains("fcmp one double"));
        assert!(text.contains("xor i1"));

        let (error, _) = lowering_error("if (\"s\") print 1;");
        assert_eq!(error, LoweringError::InvalidCondition(Type::Ptr));
    }

    #[test]
    fn if_without_else_branches_to_merge() {
        let text = ir("if (true) print 1;");

        assert!(text.contains("br i1 true, label %then1, label %merge2"));
        assert!(text.contains("then1:\n"));
        assert!(text.contains("br label %merge2"));
        assert!(text.trim_end().ends_with("ret i32 0\n}"));
    }

    #[test]
    fn while_loops_back_to_its_condition() {
        let text = ir("let i = 0; while (i < 3) i = i + 1;");

        assert!(text.contains("br label %cond1"));
        assert!(text.contains("label %body2, label %end3"));
        assert_eq!(text.matches("br label %cond1").count(), 2);
    }

    #[test]
    fn nil_is_an_unsupported_literal() {
        let (error, snippet) = lowering_error("print nil;");

        assert_eq!(error, LoweringError::UnsupportedLiteral(Literal::Nil));
        assert_eq!(snippet.as_deref(), Some("nil"));
    }

    #[test]
    fn unexpected_operator_tokens_are_rejected() {
        let (start, _) = source::consume("1 , 2".as_bytes(), "test.mb");
        let operand = |value| Box::new(Located::at(Expr::Literal(Literal::Int(value)), start.clone()));
        let comma = Located::at(Token::Comma, start.clone());

        let expr = Expr::Binary(operand(1), comma, operand(2));
        let ast = Ast::new(vec![Statement::Expression(Located::at(expr, start.clone()))]);

        let error = generate(&ast, "test.mb").expect_err("lowering should fail");
        assert_eq!(
            error.into_inner(),
            LoweringError::UnsupportedBinaryOperator(Token::Comma)
        );
    }

    #[test]
    fn functions_take_integers_and_return_nothing() {
        let text = ir("fun add(a, b) { print a + b; } add(1, 2);");

        assert!(text.contains("define void @user_add(i32 %arg0, i32 %arg1)"));
        assert!(text.contains("store i32 %arg1, ptr %b.1"));
        assert!(text.contains("call void @user_add(i32 1, i32 2)"));
        assert!(text.contains("ret void"));
    }

    #[test]
    fn functions_may_recurse_but_not_capture_locals() {
        assert!(lower("fun down(n) { if (n > 0) down(n - 1); } down(3);").is_ok());

        let (error, _) = lowering_error("let x = 1; fun f() { print x; }");
        assert_eq!(error, LoweringError::UndefinedVariable(Identifier::from("x")));
    }

    #[test]
    fn call_errors() {
        let (error, _) = lowering_error("fun f(a) {} f(1, 2);");
        assert_eq!(error, LoweringError::ArityMismatch(1, 2));

        let (error, _) = lowering_error("let g = 1; g();");
        assert_eq!(error, LoweringError::NotCallable);

        let (error, _) = lowering_error("fun f(a) {} f(1.5);");
        assert_eq!(error, LoweringError::InvalidArgument(Type::F64));

        let (error, _) = lowering_error("fun f() {} let x = f();");
        assert_eq!(error, LoweringError::VoidValue);

        let (error, _) = lowering_error("fun f() {} print f();");
        assert_eq!(error, LoweringError::UnsupportedPrintType(Type::Void));
    }

    #[test]
    fn redeclared_functions_get_distinct_symbols() {
        let text = ir("fun f() {} fun f() { print 1; } f();");

        assert!(text.contains("define void @user_f()"));
        assert!(text.contains("define void @user_f.1()"));
        assert!(text.contains("call void @user_f.1()"));
    }

    #[test]
    fn scopes_shadow_and_discard() {
        let mut scopes = Scopes::new();
        let x = Identifier::from("x");
        let outer = Binding::Function {
            id: FunctionId(0),
            arity: 0,
        };
        let inner = Binding::Function {
            id: FunctionId(1),
            arity: 0,
        };

        scopes.bind(x.clone(), outer);
        let scope = scopes.enter();
        assert_eq!(scopes.lookup(&x), Some(outer));

        scopes.bind(x.clone(), inner);
        assert_eq!(scopes.lookup(&x), Some(inner));

        scopes.leave(scope);
        assert_eq!(scopes.lookup(&x), Some(outer));
        assert_eq!(scopes.arena.len(), 1);
    }
}
