//! Compilador de Marbl.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente.
//! Este archivo se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens. El flujo de tokens se
//! dispone en un AST por medio de análisis sintáctico en [`parse`].
//! Los errores de sintaxis se acumulan; el parser se recupera de cada
//! uno y continúa con la siguiente sentencia.
//!
//! # Back end
//! El árbol sintáctico se traduce a una representación intermedia
//! de bloques básicos, descrita en [`ir`], por medio de [`codegen`].
//! El módulo resultante puede ejecutarse directamente con [`exec`] o
//! entregarse como LLVM IR textual al backend nativo en [`link`].
//!
//! Todos los errores con ubicación se reportan a través de
//! [`error::Diagnostics`].

use std::io::BufRead;

pub mod codegen;
pub mod error;
pub mod exec;
pub mod ir;
pub mod lex;
pub mod link;
pub mod parse;
pub mod source;

use error::Diagnostics;
use ir::Module;
use lex::Lexer;
use parse::Ast;

/// Análisis léxico y sintáctico de una unidad de compilación.
///
/// Si hay errores léxicos, el análisis sintáctico no se intenta.
pub fn parse_source<R: BufRead>(reader: R, name: &str) -> Result<Ast, Diagnostics> {
    let (start, stream) = source::consume(reader, name);
    let tokens = Lexer::new(start, stream)
        .try_exhaustive()
        .map_err(Diagnostics::from)?;

    let (ast, errors) = parse::parse(tokens);
    if errors.is_empty() {
        Ok(ast)
    } else {
        Err(Diagnostics::from(errors))
    }
}

/// Pipeline completa desde código fuente hasta IR.
pub fn compile<R: BufRead>(reader: R, name: &str) -> Result<Module, Diagnostics> {
    let ast = parse_source(reader, name)?;
    codegen::generate(&ast, name).map_err(Diagnostics::from)
}
