//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios de línea (`// ...`) se descartan durante esta
//! operación. Cada token emitido está asociado a una ubicación en el código
//! fuente original, de la cual se puede recuperar su lexema exacto con
//! [`Location::snippet()`].
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por lo que son y no
//! incluyen lexemas. Los identificadores incluyen su nombre. Las constantes
//! literales se resuelven a sus valores: enteros de 32 bits, flotantes de
//! doble precisión o cadenas. El flujo siempre termina en [`Token::Eof`].
//!
//! # Reglas importantes del lenguaje
//! - El lenguaje distingue mayúsculas de minúsculas.
//! - Un número con punto decimal es flotante, `1.` incluido.
//! - Las cadenas no pueden abarcar más de una línea y no tienen escapes.
//!
//! # Errores
//! El lexer se recupera de errores descartando el resto de la línea donde
//! ocurrieron. Esto permite reportar más de un error por ejecución, pero
//! ningún programa con errores léxicos avanza a las demás fases.

use crate::source::{InputStream, Located, Location};
use std::{
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Unexpected character {0:?}")]
    BadChar(char),

    /// Una cadena llegó al fin de línea sin cerrarse.
    #[error("Unterminated string")]
    UnterminatedString,

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", i32::MAX)]
    IntOverflow,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Valor literal que lleva un token.
///
/// Esta es la carga útil que el parser traslada a los nodos
/// [`Expr::Literal`](crate::parse::Expr::Literal).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f64),
    Str(Rc<str>),
    Bool(bool),
    Identifier(Identifier),
    Nil,
}

impl Display for Literal {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(integer) => write!(fmt, "{}", integer),
            Literal::Float(float) => write!(fmt, "{:?}", float),
            Literal::Str(string) => write!(fmt, "{:?}", string),
            Literal::Bool(boolean) => write!(fmt, "{}", boolean),
            Literal::Identifier(id) => write!(fmt, "{}", id),
            Literal::Nil => fmt.write_str("nil"),
        }
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i32),

    /// Literal de punto flotante.
    FloatLiteral(f64),

    /// Literal de cadena.
    StrLiteral(Rc<str>),

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `,`
    Comma,

    /// `.`
    Period,

    /// `-`
    Minus,

    /// `+`
    Plus,

    /// `;`
    Semicolon,

    /// `/`
    Slash,

    /// `*`
    Times,

    /// `!`
    Bang,

    /// `!=`
    NotEqual,

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// Fin del flujo.
    Eof,
}

impl Token {
    /// Obtiene el valor literal de este token, si tiene alguno.
    pub fn literal(&self) -> Option<Literal> {
        let literal = match self {
            Token::Id(id) => Literal::Identifier(id.clone()),
            Token::IntLiteral(integer) => Literal::Int(*integer),
            Token::FloatLiteral(float) => Literal::Float(*float),
            Token::StrLiteral(string) => Literal::Str(Rc::clone(string)),
            Token::Keyword(Keyword::True) => Literal::Bool(true),
            Token::Keyword(Keyword::False) => Literal::Bool(false),
            Token::Keyword(Keyword::Nil) => Literal::Nil,
            _ => return None,
        };

        Some(literal)
    }
}

impl Token {
    /// Texto fijo de los tokens de puntuación y operadores.
    pub fn symbol(&self) -> Option<&'static str> {
        use Token::*;

        let symbol = match self {
            OpenParen => "(",
            CloseParen => ")",
            OpenCurly => "{",
            CloseCurly => "}",
            Comma => ",",
            Period => ".",
            Minus => "-",
            Plus => "+",
            Semicolon => ";",
            Slash => "/",
            Times => "*",
            Bang => "!",
            NotEqual => "!=",
            Assign => "=",
            Equal => "==",
            Greater => ">",
            GreaterOrEqual => ">=",
            Less => "<",
            LessOrEqual => "<=",
            _ => return None,
        };

        Some(symbol)
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            FloatLiteral(float) => write!(fmt, "literal `{:?}`", float),
            StrLiteral(string) => write!(fmt, "literal {:?}", string),
            Eof => fmt.write_str("end of input"),
            punctuation => match punctuation.symbol() {
                Some(symbol) => write!(fmt, "`{}`", symbol),
                None => write!(fmt, "{:?}", punctuation),
            },
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Let,
    While,
}

impl Keyword {
    /// Palabras clave que inician una declaración o sentencia.
    ///
    /// El parser se sincroniza en estos puntos luego de un error.
    pub fn starts_statement(self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Class | Fun | Let | For | If | While | Print | Return
        )
    }
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("and",    Keyword::And),
    ("class",  Keyword::Class),
    ("else",   Keyword::Else),
    ("false",  Keyword::False),
    ("fun",    Keyword::Fun),
    ("for",    Keyword::For),
    ("if",     Keyword::If),
    ("nil",    Keyword::Nil),
    ("or",     Keyword::Or),
    ("print",  Keyword::Print),
    ("return", Keyword::Return),
    ("super",  Keyword::Super),
    ("this",   Keyword::This),
    ("true",   Keyword::True),
    ("let",    Keyword::Let),
    ("while",  Keyword::While),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map(|&(name, _)| name)
            .unwrap_or("?");

        fmt.write_str(name)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: std::iter::Peekable<S>,
    state: State,
    start: Location,
    next: Location,
    finished: bool,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error, descarta hasta el fin de línea.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró uno de `!`, `=`, `<` o `>`.
    ///
    /// Si sigue `=` se forma el operador de dos caracteres.
    Operator(char),

    /// Se encontró `/`, que puede iniciar un comentario.
    SlashOrComment,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Parte entera de una constante numérica.
    Integer(String),

    /// Constante numérica luego del punto decimal.
    Fraction(String),

    /// Interior de una cadena, sin las comillas.
    Str(String),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let next = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            next,
            finished: false,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        tracing::debug!(tokens = tokens.len(), "lexing finished");
        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<(Token, Location)>, LexerError> {
        use {State::*, Token::*};

        let mut last_accepted = self.start.clone();
        let token = loop {
            let next_char = match self.source.peek() {
                None => None,
                Some(Ok((c, _))) => Some(*c),
                Some(Err(_)) => match self.source.next() {
                    Some(Err(error)) => break Err(error.into()),
                    _ => continue,
                },
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next.clone();
            }

            match (&mut self.state, next_char) {
                // Se descarta la línea donde ocurrió el error
                (Error, Some('\n')) | (Error, None) => self.state = Start,
                (Error, Some(_)) => (),

                (Start, None) if self.finished => return Ok(None),
                (Start, None) => {
                    self.finished = true;
                    last_accepted = self.start.clone();
                    break Ok(Eof);
                }

                // Tokens triviales
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('{')) => self.state = Complete(OpenCurly),
                (Start, Some('}')) => self.state = Complete(CloseCurly),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('.')) => self.state = Complete(Period),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('/')) => self.state = SlashOrComment,
                (Start, Some('"')) => self.state = Str(String::new()),
                (Start, Some(c @ ('!' | '=' | '<' | '>'))) => self.state = Operator(c),

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                (Start, Some(c)) if c.is_ascii_digit() => self.state = Integer(c.to_string()),

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Eof)),

                (Operator(first), Some('=')) => {
                    let token = match first {
                        '!' => NotEqual,
                        '=' => Equal,
                        '<' => LessOrEqual,
                        _ => GreaterOrEqual,
                    };

                    self.state = Complete(token);
                }

                (Operator(first), _) => {
                    break Ok(match first {
                        '!' => Bang,
                        '=' => Assign,
                        '<' => Less,
                        _ => Greater,
                    })
                }

                (SlashOrComment, Some('/')) => self.state = Comment,
                (SlashOrComment, _) => break Ok(Token::Slash),

                (Comment, Some('\n')) | (Comment, None) => self.state = Start,
                (Comment, Some(_)) => (),

                (Integer(digits), Some(c)) if c.is_ascii_digit() => digits.push(c),
                (Integer(digits), Some('.')) => {
                    let mut digits = std::mem::take(digits);
                    digits.push('.');
                    self.state = Fraction(digits);
                }

                (Integer(digits), _) => match digits.parse() {
                    Ok(integer) => break Ok(IntLiteral(integer)),
                    Err(_) => break Err(LexerError::IntOverflow),
                },

                (Fraction(digits), Some(c)) if c.is_ascii_digit() => digits.push(c),
                (Fraction(digits), _) => match digits.parse() {
                    Ok(float) => break Ok(FloatLiteral(float)),
                    Err(_) => unreachable!("malformed float literal {:?}", digits),
                },

                (Str(string), Some('"')) => {
                    let string = Rc::from(std::mem::take(string).as_str());
                    self.state = Complete(StrLiteral(string));
                }

                (Str(_), Some('\n')) | (Str(_), None) => break Err(LexerError::UnterminatedString),
                (Str(string), Some(c)) => string.push(c),

                (Word(word), Some(c)) if is_word_char(c) => word.push(c),
                (Word(word), _) => {
                    if let Ok(keyword) = self::Keyword::from_str(word) {
                        break Ok(Keyword(keyword));
                    } else {
                        break Ok(Id(Identifier::from(word.as_str())));
                    }
                }
            }

            // Se consume el carácter que se observó con lookahead anteriormente
            if let Some(Ok((_, next_position))) = self.source.next() {
                last_accepted = std::mem::replace(&mut self.next, next_position);
            }
        };

        token.map(|token| Some((token, last_accepted)))
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some((token, last_accepted))) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &last_accepted);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.start.clone())))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;

    fn lex(code: &str) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let (start, stream) = source::consume(code.as_bytes(), "test.mb");
        Lexer::new(start, stream).try_exhaustive()
    }

    fn tokens(code: &str) -> Vec<Token> {
        lex(code)
            .unwrap()
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    #[test]
    fn operators_and_punctuation() {
        use Token::*;

        assert_eq!(
            tokens("( ) { } , . - + ; / * ! != = == > >= < <="),
            vec![
                OpenParen, CloseParen, OpenCurly, CloseCurly, Comma, Period, Minus, Plus,
                Semicolon, Slash, Times, Bang, NotEqual, Assign, Equal, Greater,
                GreaterOrEqual, Less, LessOrEqual, Eof,
            ]
        );
    }

    #[test]
    fn literals_keywords_and_identifiers() {
        assert_eq!(
            tokens("let x_1 = 42; print 2.50; \"hi there\" true nil While"),
            vec![
                Token::Keyword(Keyword::Let),
                Token::Id(Identifier::from("x_1")),
                Token::Assign,
                Token::IntLiteral(42),
                Token::Semicolon,
                Token::Keyword(Keyword::Print),
                Token::FloatLiteral(2.5),
                Token::Semicolon,
                Token::StrLiteral(Rc::from("hi there")),
                Token::Keyword(Keyword::True),
                Token::Keyword(Keyword::Nil),
                Token::Id(Identifier::from("While")),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_discarded() {
        assert_eq!(
            tokens("1 // 2 3\n/ 4"),
            vec![
                Token::IntLiteral(1),
                Token::Slash,
                Token::IntLiteral(4),
                Token::Eof
            ]
        );
    }

    #[test]
    fn locations_recover_lexemes() {
        let tokens = lex("let count = 10.25;\nprint count;").unwrap();
        let lexemes: Vec<_> = tokens
            .iter()
            .map(|token| token.location().snippet())
            .collect();

        assert_eq!(
            lexemes,
            vec![
                Some("let".to_string()),
                Some("count".to_string()),
                Some("=".to_string()),
                Some("10.25".to_string()),
                Some(";".to_string()),
                Some("print".to_string()),
                Some("count".to_string()),
                Some(";".to_string()),
                None,
            ]
        );

        assert_eq!(tokens[6].location().start().to_string(), "2:7");
    }

    #[test]
    fn errors_accumulate_per_line() {
        let errors = lex("let a = @;\nlet b = \"open\nlet c = 99999999999;").unwrap_err();
        let errors: Vec<_> = errors
            .iter()
            .map(|error| (error.location().start().line(), error.as_ref().to_string()))
            .collect();

        assert_eq!(
            errors,
            vec![
                (1, "Unexpected character '@'".to_string()),
                (2, "Unterminated string".to_string()),
                (3, format!("Integer literal overflow, valid range is [0, {}]", i32::MAX)),
            ]
        );
    }
}
