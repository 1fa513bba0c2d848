//! Rastreo de ubicaciones en código fuente.
//!
//! Todo objeto que el compilador construye a partir del programa
//! fuente (tokens, nodos del AST, errores) lleva consigo la ubicación
//! de donde proviene. Esto permite que los diagnósticos señalen el
//! archivo, la línea, la columna y el texto exacto del problema.

use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Formatter},
    io::{self, BufRead},
    iter,
    ops::Range,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un flujo de entrada, carácter por carácter.
///
/// Cada carácter viene acompañado de la ubicación del carácter que
/// le sigue, ver [`consume()`].
pub trait InputStream: Iterator<Item = Result<(char, Location), io::Error>> {}

impl<I> InputStream for I where I: Iterator<Item = Result<(char, Location), io::Error>> {}

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
///
/// El rango es semiabierto: `end` es la primera columna que ya no
/// pertenece a la ubicación.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin.
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Nombre del archivo o flujo de origen.
    pub fn name(&self) -> &str {
        &self.from.name
    }

    /// Invoca a `callback` con el texto de una línea del mismo origen.
    ///
    /// Retorna `None` si esa línea aún no se ha leído o no existe.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> Option<R>
    where
        F: FnOnce(&str) -> R,
    {
        let index = (line as usize).checked_sub(1)?;
        let lines = self.from.lines.borrow();

        lines.get(index).map(|line| callback(line))
    }

    /// Recupera el texto exacto que cubre esta ubicación.
    ///
    /// Si el rango abarca varias líneas, el texto se corta al final de
    /// la primera. Una ubicación posterior al fin de la entrada no
    /// tiene texto asociado.
    pub fn snippet(&self) -> Option<String> {
        let Range { start, end } = self.position;
        let multiline = start.line != end.line;

        self.with_line(start.line, |line| {
            columns(line)
                .filter(|&(column, _)| column >= start.column)
                .filter(|&(column, _)| multiline || column < end.column)
                .map(|(_, c)| c)
                .collect::<String>()
        })
        .filter(|snippet| !snippet.is_empty())
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end == start.advance() {
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.saturating_sub(1).max(1),
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }

    /// Posición que sigue a un carácter que se encuentra en esta posición.
    fn after(self, c: char) -> Position {
        match c {
            '\n' => self.newline(),
            '\t' => self.tab(),
            _ => self.advance(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Transforma un flujo de entrada estándar en uno que itera por carácter.
///
/// La ubicación que se encuentra en la tupla de retorno es la posición
/// que le corresponderá al primer carácter en la salida. Cada carácter
/// emitido incluye a la ubicación del siguiente. Toda línea termina en
/// `'\n'`, incluso si el flujo original no lo hacía.
pub fn consume<R, S>(reader: R, name: S) -> (Location, impl InputStream)
where
    R: BufRead,
    S: Into<String>,
{
    let source = Rc::new(Source {
        name: name.into(),
        lines: Default::default(),
    });

    let start = Location {
        from: Rc::clone(&source),
        position: Position::default()..Position::default().advance(),
    };

    let chars = reader
        .lines()
        .enumerate()
        .flat_map(move |(line_index, line)| {
            let source = Rc::clone(&source);

            Fallible::new(line.map(move |line| {
                let line_chars: Vec<_> = line.chars().collect();
                source.lines.borrow_mut().push(line);

                let mut here = Position {
                    line: line_index as u32 + 1,
                    column: 1,
                };

                line_chars
                    .into_iter()
                    .chain(iter::once('\n'))
                    .map(move |c| {
                        let next = here.after(c);
                        here = next;

                        let location = Location {
                            from: Rc::clone(&source),
                            position: next..next.advance(),
                        };

                        (c, location)
                    })
            }))
        })
        .fuse();

    (start, chars)
}

/// Asocia cada carácter de una línea con su columna.
fn columns(line: &str) -> impl Iterator<Item = (u32, char)> + '_ {
    let mut here = Position::default();
    line.chars().map(move |c| {
        let column = here.column;
        here = here.after(c);

        (column, c)
    })
}

/// Nombre de origen e histórico interior de líneas.
struct Source {
    name: String,
    lines: RefCell<Vec<String>>,
}

/// Un iterador que emite un solo error o encapsula las salidas de
/// otro iterador en `Ok`, pero nunca ambas.
struct Fallible<I, E>(Result<I, iter::Once<E>>);

impl<I, E> Fallible<I, E> {
    /// Crea un iterador a partir de un `Result`.
    pub fn new(result: Result<I, E>) -> Self {
        Fallible(result.map_err(iter::once))
    }
}

impl<I: Iterator, E> Iterator for Fallible<I, E> {
    type Item = Result<I::Item, E>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            Ok(ok) => ok.next().map(Ok),
            Err(error) => error.next().map(Err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_char_carries_the_next_location() {
        let (start, stream) = consume("ab\nc".as_bytes(), "test.mb");
        assert_eq!(start.start(), Position { line: 1, column: 1 });

        let chars: Vec<_> = stream.map(Result::unwrap).collect();
        let rendered: Vec<_> = chars
            .iter()
            .map(|(c, location)| (*c, location.start().to_string()))
            .collect();

        assert_eq!(
            rendered,
            vec![
                ('a', "1:2".to_string()),
                ('b', "1:3".to_string()),
                ('\n', "2:1".to_string()),
                ('c', "2:2".to_string()),
                ('\n', "3:1".to_string()),
            ]
        );
    }

    #[test]
    fn snippet_honors_tab_stops() {
        let (start, stream) = consume("\tlet x;".as_bytes(), "test.mb");
        let chars: Vec<_> = stream.map(Result::unwrap).collect();

        // `let` comienza en la columna 5 por el tabulador
        let first = &chars[0].1;
        let last = &chars[3].1;
        assert_eq!(first.start().column(), 5);

        let span = Location::span(first.clone(), &Location {
            from: Rc::clone(&start.from),
            position: last.start()..last.start(),
        });

        assert_eq!(span.snippet().as_deref(), Some("let"));
        assert_eq!(span.name(), "test.mb");
    }

    #[test]
    fn past_the_end_has_no_snippet() {
        let (_, stream) = consume("x".as_bytes(), "test.mb");
        let (_, end) = stream.map(Result::unwrap).last().unwrap();

        assert_eq!(end.start().line(), 2);
        assert_eq!(end.snippet(), None);
    }

    #[test]
    fn multiline_snippet_stops_at_the_first_line() {
        let (_, stream) = consume("x = (2.0\n);".as_bytes(), "test.mb");
        let chars: Vec<_> = stream.map(Result::unwrap).collect();

        // Desde `(` en 1:5 hasta `)` en la línea 2
        let open = Location {
            from: Rc::clone(&chars[0].1.from),
            position: Position { line: 1, column: 5 }..Position { line: 1, column: 6 },
        };

        let span = Location::span(open, &chars[9].1);
        assert_eq!(span.end().line(), 2);
        assert_eq!(span.snippet().as_deref(), Some("(2.0"));
    }
}
