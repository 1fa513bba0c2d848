//! Emisión de código nativo.
//!
//! El IR textual que produce [`crate::ir::Module`] se entrega por
//! stdin a `clang`, el cual lo compila a un objeto (o a ensamblador)
//! para la plataforma anfitriona con CPU genérico.

use std::{
    ffi::OsString,
    io::BufWriter,
    path::Path,
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
};

use bitflags::bitflags;
use thiserror::Error;

/// Compilador externo que consume LLVM IR.
const BACKEND: &str = "clang";

bitflags! {
    /// Opciones a aplicar durante el ensamblado.
    pub struct AssembleOptions: u32 {
        /// Optimizar con `-O2`.
        const OPTIMIZE = 0x01;

        /// Emitir ensamblador en vez de un objeto.
        const ASSEMBLY = 0x02;
    }
}

/// Un error de ensamblado.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LinkerError {
    /// Ocurrió un evento de error de E/S durante la invocación
    /// de comandos externos.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// El backend inició su ejecución, pero falló en compilar.
    #[error("Backend exited with status code {0:?}")]
    Failed(ExitStatus),
}

/// Instancia del backend para un archivo de salida definido.
pub struct Assembler {
    child: Child,
    stdin: BufWriter<ChildStdin>,
}

impl Assembler {
    /// Inicia una instancia del backend.
    ///
    /// El resultado se escribirá en la ruta indicada por `output`.
    pub fn spawn<O>(output: &O, opts: AssembleOptions) -> Result<Self, LinkerError>
    where
        O: AsRef<Path>,
    {
        let mut command = Command::new(BACKEND);
        command.args(arguments(output.as_ref(), opts)).stdin(Stdio::piped());

        tracing::debug!(?command, "spawning backend");

        let mut child = command.spawn()?;
        let stdin = match child.stdin.take() {
            Some(stdin) => BufWriter::new(stdin),
            None => {
                let _ = child.kill();
                let error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "no stdin");
                return Err(LinkerError::Io(error));
            }
        };

        Ok(Assembler { child, stdin })
    }

    /// Obtiene la entrada estándar del proceso que espera recibir IR.
    pub fn stdin(&mut self) -> &mut BufWriter<ChildStdin> {
        &mut self.stdin
    }

    /// Indica el fin del flujo de IR y espera a que termine el backend.
    pub fn finish(mut self) -> Result<(), LinkerError> {
        drop(self.stdin);

        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(LinkerError::Failed(status))
        }
    }
}

/// Línea de comandos del backend, sin incluir el ejecutable.
fn arguments(output: &Path, opts: AssembleOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();

    let mode = if opts.contains(AssembleOptions::ASSEMBLY) {
        "-S"
    } else {
        "-c"
    };

    args.push(mode.into());
    if opts.contains(AssembleOptions::OPTIMIZE) {
        args.push("-O2".into());
    }

    // La entrada es IR textual por stdin
    args.extend(["-x", "ir", "-", "-o"].iter().map(OsString::from));
    args.push(output.into());

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_reflects_options() {
        let output = Path::new("build/out.o");

        assert_eq!(
            arguments(output, AssembleOptions::empty()),
            ["-c", "-x", "ir", "-", "-o", "build/out.o"]
        );

        assert_eq!(
            arguments(output, AssembleOptions::OPTIMIZE | AssembleOptions::ASSEMBLY),
            ["-S", "-O2", "-x", "ir", "-", "-o", "build/out.o"]
        );
    }
}
