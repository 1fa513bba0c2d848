//! Análisis sintáctico.
//!
//! Parser descendente recursivo con un solo token de lookahead. Las
//! producciones binarias se construyen de forma iterativa y asocian a
//! la izquierda; la asignación asocia a la derecha y su destino se
//! valida luego de haber reconocido el lado izquierdo.
//!
//! Un error de sintaxis no detiene el análisis. El error se registra,
//! el parser descarta tokens hasta el siguiente punto seguro (ver
//! [`Parser::synchronize()`]) y continúa con la siguiente declaración.
//! El resultado es siempre un [`Ast`] con todo lo que se logró recuperar,
//! junto a la lista de errores encontrados.

use std::fmt::{self, Display};
use thiserror::Error;

use crate::{
    lex::{Identifier, Keyword, Literal, Token},
    source::{Located, Location},
};

/// Máxima cantidad de argumentos o parámetros en una llamada o función.
const MAX_ARGUMENTS: usize = 255;

/// Programa completo, como secuencia de declaraciones de primer nivel.
#[derive(Debug, Default)]
pub struct Ast(Vec<Statement>);

impl Ast {
    pub(crate) fn new(statements: Vec<Statement>) -> Self {
        Ast(statements)
    }

    pub fn statements(&self) -> &[Statement] {
        &self.0
    }
}

#[derive(Debug)]
pub enum Statement {
    Expression(Located<Expr>),

    Print(Located<Expr>),

    Let {
        name: Located<Identifier>,
        initializer: Option<Located<Expr>>,
    },

    Block(Vec<Statement>),

    If {
        condition: Located<Expr>,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },

    While {
        condition: Located<Expr>,
        body: Box<Statement>,
    },

    Function {
        name: Located<Identifier>,
        parameters: Vec<Located<Identifier>>,
        body: Vec<Statement>,
    },
}

/// Expresión.
///
/// Los operadores se conservan como el token que los originó. La
/// selección de instrucciones ocurre hasta la generación de código.
#[derive(Debug)]
pub enum Expr {
    Literal(Literal),
    Variable(Identifier),
    Assign {
        name: Located<Identifier>,
        value: Box<Located<Expr>>,
    },
    Unary(Located<Token>, Box<Located<Expr>>),
    Binary(Box<Located<Expr>>, Located<Token>, Box<Located<Expr>>),
    Logical(Box<Located<Expr>>, Located<Token>, Box<Located<Expr>>),
    Grouping(Box<Located<Expr>>),
    Call {
        callee: Box<Located<Expr>>,
        arguments: Vec<Located<Expr>>,
    },
}

#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParserError {
    #[error("Expect expression.")]
    ExpectedExpr,

    #[error("Expect ')' after expression.")]
    UnclosedGrouping,

    #[error("Expect ';' after value.")]
    MissingSemicolon,

    #[error("Expect ';' after variable declaration.")]
    UnterminatedLet,

    #[error("Expect variable name.")]
    ExpectedVariableName,

    #[error("Expect '}}' after block.")]
    UnclosedBlock,

    #[error("Expect '(' after '{0}'.")]
    MissingOpenParen(Keyword),

    #[error("Expect ')' after {0} condition.")]
    UnclosedCondition(Keyword),

    #[error("Expect function name.")]
    ExpectedFunctionName,

    #[error("Expect '(' after function name.")]
    MissingParameterList,

    #[error("Expect parameter name.")]
    ExpectedParameterName,

    #[error("Expect ')' after parameters.")]
    UnclosedParameterList,

    #[error("Expect '{{' before function body.")]
    MissingFunctionBody,

    #[error("Expect ')' after arguments.")]
    UnclosedArguments,

    #[error("Can't have more than {} arguments.", MAX_ARGUMENTS)]
    TooManyArguments,

    #[error("Can't have more than {} parameters.", MAX_ARGUMENTS)]
    TooManyParameters,

    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
}

/// Construye un árbol sintáctico a partir de un flujo de tokens.
///
/// Esta operación nunca falla. Las construcciones mal formadas se
/// omiten del árbol y se reportan en la lista de errores, la cual
/// está vacía si y solo si el programa es sintácticamente correcto.
/// El flujo debería terminar en [`Token::Eof`]; si no es así, se
/// asume el fin justo después del último token.
pub fn parse<I>(tokens: I) -> (Ast, Vec<Located<ParserError>>)
where
    I: IntoIterator<Item = Located<Token>>,
{
    let mut tokens: Vec<_> = tokens.into_iter().collect();
    match tokens.last() {
        None => return (Ast::default(), Vec::new()),
        Some(last) if *last.as_ref() != Token::Eof => {
            let eof = Located::at(Token::Eof, last.location().clone());
            tokens.push(eof);
        }

        Some(_) => (),
    }

    let mut parser = Parser {
        tokens,
        current: 0,
        errors: Vec::new(),
    };

    let ast = parser.program();
    tracing::debug!(
        statements = ast.statements().len(),
        errors = parser.errors.len(),
        "parsing finished"
    );

    (ast, parser.errors)
}

struct Parser {
    tokens: Vec<Located<Token>>,
    current: usize,
    errors: Vec<Located<ParserError>>,
}

type Parse<T> = Result<T, Located<ParserError>>;

impl Parser {
    fn program(&mut self) -> Ast {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }

        Ast::new(statements)
    }

    /// `declaration ::= fun_decl | let_decl | statement`
    ///
    /// Este es el punto de recuperación de errores.
    fn declaration(&mut self) -> Option<Statement> {
        let result = if self.matches(&Token::Keyword(Keyword::Let)) {
            self.let_declaration()
        } else if self.matches(&Token::Keyword(Keyword::Fun)) {
            self.function()
        } else {
            self.statement()
        };

        match result {
            Ok(statement) => Some(statement),
            Err(error) => {
                tracing::trace!(error = %error.as_ref(), "syntax error, synchronizing");

                self.errors.push(error);
                self.synchronize();
                None
            }
        }
    }

    fn let_declaration(&mut self) -> Parse<Statement> {
        let name = self.id(ParserError::ExpectedVariableName)?;

        let initializer = if self.matches(&Token::Assign) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(&Token::Semicolon, ParserError::UnterminatedLet)?;
        Ok(Statement::Let { name, initializer })
    }

    fn function(&mut self) -> Parse<Statement> {
        let name = self.id(ParserError::ExpectedFunctionName)?;
        self.consume(&Token::OpenParen, ParserError::MissingParameterList)?;

        let mut parameters = Vec::new();
        if !self.check(&Token::CloseParen) {
            loop {
                if parameters.len() >= MAX_ARGUMENTS {
                    let error = self.error_here(ParserError::TooManyParameters);
                    self.errors.push(error);
                }

                parameters.push(self.id(ParserError::ExpectedParameterName)?);
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }

        self.consume(&Token::CloseParen, ParserError::UnclosedParameterList)?;
        self.consume(&Token::OpenCurly, ParserError::MissingFunctionBody)?;
        let body = self.block()?;

        Ok(Statement::Function {
            name,
            parameters,
            body,
        })
    }

    fn statement(&mut self) -> Parse<Statement> {
        if self.matches(&Token::Keyword(Keyword::Print)) {
            let value = self.expression()?;
            self.consume(&Token::Semicolon, ParserError::MissingSemicolon)?;

            Ok(Statement::Print(value))
        } else if self.matches(&Token::Keyword(Keyword::If)) {
            self.if_statement()
        } else if self.matches(&Token::Keyword(Keyword::While)) {
            self.while_statement()
        } else if self.matches(&Token::OpenCurly) {
            Ok(Statement::Block(self.block()?))
        } else {
            let expr = self.expression()?;
            self.consume(&Token::Semicolon, ParserError::MissingSemicolon)?;

            Ok(Statement::Expression(expr))
        }
    }

    fn if_statement(&mut self) -> Parse<Statement> {
        let condition = self.condition(Keyword::If)?;
        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.matches(&Token::Keyword(Keyword::Else)) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Parse<Statement> {
        let condition = self.condition(Keyword::While)?;
        let body = Box::new(self.statement()?);

        Ok(Statement::While { condition, body })
    }

    /// `"(" expression ")"` luego de `if` o `while`.
    fn condition(&mut self, keyword: Keyword) -> Parse<Located<Expr>> {
        self.consume(&Token::OpenParen, ParserError::MissingOpenParen(keyword))?;
        let condition = self.expression()?;
        self.consume(&Token::CloseParen, ParserError::UnclosedCondition(keyword))?;

        Ok(condition)
    }

    /// Cuerpo de un bloque, luego de `{`.
    fn block(&mut self) -> Parse<Vec<Statement>> {
        let mut statements = Vec::new();
        while !self.check(&Token::CloseCurly) && !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }

        self.consume(&Token::CloseCurly, ParserError::UnclosedBlock)?;
        Ok(statements)
    }

    fn expression(&mut self) -> Parse<Located<Expr>> {
        self.assignment()
    }

    fn assignment(&mut self) -> Parse<Located<Expr>> {
        let target = self.logic_or()?;
        if !self.matches(&Token::Assign) {
            return Ok(target);
        }

        let equals = self.previous().location().clone();
        let value = self.assignment()?;

        let (target_location, target) = target.split();
        match target {
            Expr::Variable(name) => {
                let location = Location::span(target_location.clone(), value.location());
                let name = Located::at(name, target_location);

                Ok(Located::at(
                    Expr::Assign {
                        name,
                        value: Box::new(value),
                    },
                    location,
                ))
            }

            _ => Err(Located::at(ParserError::InvalidAssignmentTarget, equals)),
        }
    }

    fn logic_or(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(
            &[Token::Keyword(Keyword::Or)],
            Parser::logic_and,
            Expr::Logical,
        )
    }

    fn logic_and(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(
            &[Token::Keyword(Keyword::And)],
            Parser::equality,
            Expr::Logical,
        )
    }

    fn equality(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(
            &[Token::NotEqual, Token::Equal],
            Parser::comparison,
            Expr::Binary,
        )
    }

    fn comparison(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(
            &[
                Token::Greater,
                Token::GreaterOrEqual,
                Token::Less,
                Token::LessOrEqual,
            ],
            Parser::term,
            Expr::Binary,
        )
    }

    fn term(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(&[Token::Minus, Token::Plus], Parser::factor, Expr::Binary)
    }

    fn factor(&mut self) -> Parse<Located<Expr>> {
        self.left_associative(&[Token::Slash, Token::Times], Parser::unary, Expr::Binary)
    }

    fn unary(&mut self) -> Parse<Located<Expr>> {
        if self.matches_any(&[Token::Bang, Token::Minus]) {
            let operator = self.previous().clone();
            let operand = self.unary()?;

            let location = Location::span(operator.location().clone(), operand.location());
            return Ok(Located::at(
                Expr::Unary(operator, Box::new(operand)),
                location,
            ));
        }

        self.call()
    }

    fn call(&mut self) -> Parse<Located<Expr>> {
        let mut expr = self.primary()?;

        while self.matches(&Token::OpenParen) {
            let mut arguments = Vec::new();
            if !self.check(&Token::CloseParen) {
                loop {
                    if arguments.len() >= MAX_ARGUMENTS {
                        let error = self.error_here(ParserError::TooManyArguments);
                        self.errors.push(error);
                    }

                    arguments.push(self.expression()?);
                    if !self.matches(&Token::Comma) {
                        break;
                    }
                }
            }

            let paren = self.consume(&Token::CloseParen, ParserError::UnclosedArguments)?;

            let location = Location::span(expr.location().clone(), paren.location());
            expr = Located::at(
                Expr::Call {
                    callee: Box::new(expr),
                    arguments,
                },
                location,
            );
        }

        Ok(expr)
    }

    fn primary(&mut self) -> Parse<Located<Expr>> {
        let (location, token) = self.peek().clone().split();

        let expr = match token {
            Token::Id(id) => Expr::Variable(id),

            Token::OpenParen => {
                self.advance();
                let inner = self.expression()?;
                let close = self.consume(&Token::CloseParen, ParserError::UnclosedGrouping)?;

                let location = Location::span(location, close.location());
                return Ok(Located::at(Expr::Grouping(Box::new(inner)), location));
            }

            token => match token.literal() {
                Some(literal) => Expr::Literal(literal),
                None => return Err(self.error_here(ParserError::ExpectedExpr)),
            },
        };

        self.advance();
        Ok(Located::at(expr, location))
    }

    /// Producción binaria iterativa: `next ( operator next )*`.
    fn left_associative<N, C>(
        &mut self,
        operators: &[Token],
        mut next: N,
        mut constructor: C,
    ) -> Parse<Located<Expr>>
    where
        N: FnMut(&mut Self) -> Parse<Located<Expr>>,
        C: FnMut(Box<Located<Expr>>, Located<Token>, Box<Located<Expr>>) -> Expr,
    {
        let mut expr = next(self)?;

        while self.matches_any(operators) {
            let operator = self.previous().clone();
            let right = next(self)?;

            let location = Location::span(expr.location().clone(), right.location());
            expr = Located::at(
                constructor(Box::new(expr), operator, Box::new(right)),
                location,
            );
        }

        Ok(expr)
    }

    /// Descarta tokens hasta el inicio probable de otra sentencia.
    ///
    /// Se detiene luego de consumir `;` o antes de una palabra clave
    /// que inicia una declaración o sentencia.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if *self.previous().as_ref() == Token::Semicolon {
                return;
            }

            if let Token::Keyword(keyword) = self.peek().as_ref() {
                if keyword.starts_statement() {
                    return;
                }
            }

            self.advance();
        }
    }

    fn id(&mut self, error: ParserError) -> Parse<Located<Identifier>> {
        match self.peek().as_ref() {
            Token::Id(id) => {
                let id = Located::at(id.clone(), self.peek().location().clone());
                self.advance();

                Ok(id)
            }

            _ => Err(self.error_here(error)),
        }
    }

    fn consume(&mut self, token: &Token, error: ParserError) -> Parse<Located<Token>> {
        if self.check(token) {
            Ok(self.advance().clone())
        } else {
            Err(self.error_here(error))
        }
    }

    fn matches_any(&mut self, tokens: &[Token]) -> bool {
        tokens.iter().any(|token| self.matches(token))
    }

    fn matches(&mut self, token: &Token) -> bool {
        let matched = self.check(token);
        if matched {
            self.advance();
        }

        matched
    }

    fn check(&self, token: &Token) -> bool {
        !self.is_at_end() && self.peek().as_ref() == token
    }

    fn advance(&mut self) -> &Located<Token> {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        *self.peek().as_ref() == Token::Eof
    }

    fn peek(&self) -> &Located<Token> {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Located<Token> {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn error_here(&self, error: ParserError) -> Located<ParserError> {
        Located::at(error, self.peek().location().clone())
    }
}

impl Display for Ast {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in self.statements() {
            writeln!(fmt, "{}", statement)?;
        }

        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Expression(expr) => write!(fmt, "(; {})", expr.as_ref()),
            Statement::Print(expr) => write!(fmt, "(print {})", expr.as_ref()),

            Statement::Let { name, initializer } => match initializer {
                Some(value) => write!(fmt, "(let {} {})", name.as_ref(), value.as_ref()),
                None => write!(fmt, "(let {})", name.as_ref()),
            },

            Statement::Block(statements) => {
                fmt.write_str("(block")?;
                for statement in statements {
                    write!(fmt, " {}", statement)?;
                }

                fmt.write_str(")")
            }

            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(fmt, "(if {} {}", condition.as_ref(), then_branch)?;
                if let Some(else_branch) = else_branch {
                    write!(fmt, " {}", else_branch)?;
                }

                fmt.write_str(")")
            }

            Statement::While { condition, body } => {
                write!(fmt, "(while {} {})", condition.as_ref(), body)
            }

            Statement::Function {
                name,
                parameters,
                body,
            } => {
                write!(fmt, "(fun {} (", name.as_ref())?;
                for (i, parameter) in parameters.iter().enumerate() {
                    let separator = if i == 0 { "" } else { " " };
                    write!(fmt, "{}{}", separator, parameter.as_ref())?;
                }

                fmt.write_str(")")?;
                for statement in body {
                    write!(fmt, " {}", statement)?;
                }

                fmt.write_str(")")
            }
        }
    }
}

impl Display for Expr {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(literal) => write!(fmt, "{}", literal),
            Expr::Variable(name) => write!(fmt, "{}", name),
            Expr::Assign { name, value } => {
                write!(fmt, "(= {} {})", name.as_ref(), value.as_ref().as_ref())
            }

            Expr::Unary(operator, operand) => write!(
                fmt,
                "({} {})",
                operator_text(operator.as_ref()),
                operand.as_ref().as_ref()
            ),

            Expr::Binary(left, operator, right) | Expr::Logical(left, operator, right) => write!(
                fmt,
                "({} {} {})",
                operator_text(operator.as_ref()),
                left.as_ref().as_ref(),
                right.as_ref().as_ref()
            ),

            Expr::Grouping(inner) => write!(fmt, "(group {})", inner.as_ref().as_ref()),

            Expr::Call { callee, arguments } => {
                write!(fmt, "(call {}", callee.as_ref().as_ref())?;
                for argument in arguments {
                    write!(fmt, " {}", argument.as_ref())?;
                }

                fmt.write_str(")")
            }
        }
    }
}

fn operator_text(token: &Token) -> String {
    match (token, token.symbol()) {
        (_, Some(symbol)) => symbol.to_string(),
        (Token::Keyword(keyword), None) => keyword.to_string(),
        (other, None) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, source};

    fn parse_str(code: &str) -> (Ast, Vec<Located<ParserError>>) {
        let (start, stream) = source::consume(code.as_bytes(), "test.mb");
        let tokens = Lexer::new(start, stream)
            .try_exhaustive()
            .expect("lexical error in test input");

        parse(tokens)
    }

    fn printed(code: &str) -> String {
        let (ast, errors) = parse_str(code);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        ast.to_string()
    }

    fn error_kinds(errors: &[Located<ParserError>]) -> Vec<&ParserError> {
        errors.iter().map(Located::val).collect()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(printed("1 + 2 * 3;"), "(; (+ 1 (* 2 3)))\n");
        assert_eq!(printed("1 - 2 - 3;"), "(; (- (- 1 2) 3))\n");
        assert_eq!(printed("(1 + 2) * 3;"), "(; (* (group (+ 1 2)) 3))\n");
        assert_eq!(printed("8 / 4 / 2;"), "(; (/ (/ 8 4) 2))\n");
        assert_eq!(printed("-a * !b;"), "(; (* (- a) (! b)))\n");
        assert_eq!(
            printed("a < b == c >= d;"),
            "(; (== (< a b) (>= c d)))\n"
        );
    }

    #[test]
    fn logical_operators_bind_looser_than_equality() {
        assert_eq!(
            printed("a or b and c == d;"),
            "(; (or a (and b (== c d))))\n"
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(printed("a = b = 1;"), "(; (= a (= b 1)))\n");
    }

    #[test]
    fn invalid_assignment_target_recovers() {
        let (ast, errors) = parse_str("1 = 2;\nprint 3;");

        assert_eq!(error_kinds(&errors), vec![&ParserError::InvalidAssignmentTarget]);
        assert_eq!(errors[0].location().snippet().as_deref(), Some("="));
        assert_eq!(ast.to_string(), "(print 3)\n");
    }

    #[test]
    fn errors_accumulate_across_statements() {
        let (ast, errors) = parse_str("let = 1;\nlet y = 2;\nprint (y;\nprint y;");

        assert_eq!(
            error_kinds(&errors),
            vec![
                &ParserError::ExpectedVariableName,
                &ParserError::UnclosedGrouping,
            ]
        );

        assert_eq!(errors[0].location().start().line(), 1);
        assert_eq!(errors[1].location().start().line(), 3);
        assert_eq!(ast.to_string(), "(let y 2)\n(print y)\n");
    }

    #[test]
    fn synchronization_skips_the_offending_token() {
        let (ast, errors) = parse_str("print 1\nprint 2;\nprint 3;");

        assert_eq!(error_kinds(&errors), vec![&ParserError::MissingSemicolon]);
        assert_eq!(errors[0].location().snippet().as_deref(), Some("print"));
        assert_eq!(ast.to_string(), "(print 3)\n");
    }

    #[test]
    fn statements_and_declarations() {
        assert_eq!(
            printed("let x; let y = 1.5; { print \"s\"; }"),
            "(let x)\n(let y 1.5)\n(block (print \"s\"))\n"
        );

        assert_eq!(
            printed("if (x) print 1; else { print 2; }"),
            "(if x (print 1) (block (print 2)))\n"
        );

        assert_eq!(
            printed("while (i < 3) i = i + 1;"),
            "(while (< i 3) (; (= i (+ i 1))))\n"
        );

        assert_eq!(
            printed("fun add(a, b) { print a + b; } add(1, 2)(3);"),
            "(fun add (a b) (print (+ a b)))\n(; (call (call add 1 2) 3))\n"
        );
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        assert_eq!(
            printed("if (a) if (b) print 1; else print 2;"),
            "(if a (if b (print 1) (print 2)))\n"
        );
    }

    #[test]
    fn errors_inside_blocks_recover_locally() {
        let (ast, errors) = parse_str("{ let = 3; print 4; }\nprint 5;");

        assert_eq!(error_kinds(&errors), vec![&ParserError::ExpectedVariableName]);
        assert_eq!(ast.to_string(), "(block (print 4))\n(print 5)\n");
    }

    #[test]
    fn missing_closing_brace_reports_at_end() {
        let (_, errors) = parse_str("{ print 1;");

        assert_eq!(error_kinds(&errors), vec![&ParserError::UnclosedBlock]);
        assert_eq!(errors[0].location().snippet(), None);
    }

    #[test]
    fn argument_and_parameter_limits() {
        let zeros = |count: usize| vec!["0"; count].join(", ");
        let names = |count: usize| {
            let names: Vec<_> = (0..count).map(|i| format!("p{}", i)).collect();
            names.join(", ")
        };

        let (_, errors) = parse_str(&format!("f({});", zeros(MAX_ARGUMENTS)));
        assert!(errors.is_empty());

        let code = format!("f({});\nprint 1;", zeros(MAX_ARGUMENTS + 1));
        let (ast, errors) = parse_str(&code);
        assert_eq!(error_kinds(&errors), vec![&ParserError::TooManyArguments]);
        assert_eq!(ast.statements().len(), 2);

        let code = format!("fun f({}) {{ print 1; }}\nprint 2;", names(MAX_ARGUMENTS + 1));
        let (ast, errors) = parse_str(&code);
        assert_eq!(error_kinds(&errors), vec![&ParserError::TooManyParameters]);
        assert_eq!(errors[0].location().snippet().as_deref(), Some("p255"));
        assert_eq!(ast.statements().len(), 2);
    }

    #[test]
    fn empty_stream_is_an_empty_program() {
        let (ast, errors) = parse(Vec::new());

        assert!(ast.statements().is_empty());
        assert!(errors.is_empty());
    }
}
