//! Reporte de errores al usuario.
//!
//! Cada fase del compilador define su propio tipo de error y lo
//! asocia a una ubicación por medio de [`Located`]. Esta sección
//! unifica todos esos errores en un único colector, [`Diagnostics`],
//! que se encarga de presentarlos en un formato común:
//!
//! ```text
//! <archivo>:<línea>:<columna> at '<lexema>': error: <mensaje>
//! ```

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

/// Un error cualquiera que conoce su ubicación de origen.
pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Colector de diagnósticos.
///
/// Se pueden acumular errores de distintas fases. Un colector vacío
/// significa que la compilación tuvo éxito.
#[derive(Default)]
pub struct Diagnostics {
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    /// Agrega un error al colector.
    pub fn push<E: 'static + LocatedError>(&mut self, error: E) {
        self.errors.push(Box::new(error));
    }

    /// Agrega una secuencia de errores al colector.
    pub fn extend<E, I>(&mut self, errors: I)
    where
        E: 'static + LocatedError,
        I: IntoIterator<Item = E>,
    {
        for error in errors {
            self.push(error);
        }
    }

    /// Determina si no se ha reportado ningún error.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Cantidad de errores reportados.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Línea de encabezado de cada error, en orden de reporte.
    pub fn headlines(&self) -> impl Iterator<Item = String> + '_ {
        self.errors.iter().map(|error| headline(error.as_ref()))
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(error);
        diagnostics
    }
}

impl<E: 'static + LocatedError> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        let mut diagnostics = Diagnostics::default();
        diagnostics.extend(errors);
        diagnostics
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}", headline(error.as_ref()))?;
            excerpt(fmt, error.location())?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, fmt)
    }
}

/// `<archivo>:<línea>:<columna> at '<lexema>': error: <mensaje>`
fn headline(error: &dyn LocatedError) -> String {
    let location = error.location();
    let culprit = location.snippet().unwrap_or_else(|| String::from("<end>"));

    format!(
        "{}:{} at '{}': error: {}",
        location.name(),
        location.start(),
        culprit,
        error.source()
    )
}

/// Muestra la línea afectada y subraya el rango de la ubicación.
fn excerpt(fmt: &mut fmt::Formatter<'_>, location: &Location) -> fmt::Result {
    let line_number = location.start().line();
    let line = match location.with_line(line_number, str::to_owned) {
        Some(line) => line,
        None => return writeln!(fmt),
    };

    let digits = line_number.to_string().chars().count();
    writeln!(fmt, "{:digits$} |", "", digits = digits)?;
    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)?;

    let from = location.start().column();
    let to = if location.end().line() == line_number {
        location.end().column().max(from + 1)
    } else {
        from + 1
    };

    let skip = (from - 1) as usize;
    let highlight = (to - from) as usize;

    writeln!(
        fmt,
        "{:digits$} | {:skip$}{:^<highlight$}",
        "",
        "",
        "",
        digits = digits,
        skip = skip,
        highlight = highlight
    )?;

    writeln!(fmt)
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, parse, source};

    #[test]
    fn excerpt_underlines_the_culprit() {
        let (start, stream) = source::consume("let x = 1;\nlet yy == 2;".as_bytes(), "test.mb");
        let tokens = Lexer::new(start, stream).try_exhaustive().unwrap();
        let (_, errors) = parse::parse(tokens);

        let expected = "\
test.mb:2:8 at '==': error: Expect ';' after variable declaration.
  |
2 | let yy == 2;
  |        ^^

Build failed with 1 error
";

        assert_eq!(Diagnostics::from(errors).to_string(), expected);
    }

    #[test]
    fn empty_collector() {
        let diagnostics = Diagnostics::default();

        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.headlines().count(), 0);
    }
}
