// subcommand implementations for the qgate binary

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde_json::to_writer_pretty;

use qgate::asm::program::Program;
use qgate::asm::Codec;
use qgate::diagnostics::{render_error, RenderSink};
use qgate::error::Error;
use qgate::ir::catalog::{OpForm, SlotKind};
use qgate::resolve::TypedScope;

fn read_source(path: &Path) -> Result<String, Error> {
    debug!("reading {}", path.display());
    Ok(fs::read_to_string(path)?)
}

fn parse_strict(codec: &Codec, path: &Path) -> Result<Result<Program, String>, Error> {
    let src = read_source(path)?;
    let mut scope = TypedScope::new();
    Ok(codec
        .parse_program_strict(&src, &mut scope)
        .map_err(|err| render_error(&src, &path.display().to_string(), &err)))
}

/// Reformats each file to stdout, or with `check` only reports files that
/// are not already canonical. Returns whether everything succeeded.
pub fn fmt(codec: &Codec, files: &[PathBuf], check: bool) -> Result<bool, Error> {
    let mut ok = true;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for path in files {
        let program = match parse_strict(codec, path)? {
            Ok(program) => program,
            Err(rendered) => {
                eprint!("{}", rendered);
                ok = false;
                continue;
            }
        };
        let formatted = codec.print_program(&program)?;
        if check {
            let original = read_source(path)?;
            if original != formatted {
                println!("{}: not canonical", path.display());
                ok = false;
            }
        } else {
            out.write_all(formatted.as_bytes())?;
        }
    }
    Ok(ok)
}

/// Parses every file in parallel, reporting every statement that fails.
pub fn check(codec: &Codec, files: &[PathBuf]) -> Result<bool, Error> {
    let reports: Mutex<Vec<(usize, PathBuf, usize, Vec<String>)>> = Mutex::new(Vec::new());

    files
        .par_iter()
        .enumerate()
        .try_for_each(|(i, path)| -> Result<(), Error> {
            let src = read_source(path)?;
            let name = path.display().to_string();
            let mut sink = RenderSink::new(&src, &name);
            let mut scope = TypedScope::new();
            let program = codec.parse_program(&src, &mut scope, &mut sink);
            reports
                .lock()
                .push((i, path.clone(), program.len(), sink.rendered));
            Ok(())
        })?;

    let mut reports = reports.into_inner();
    reports.sort_by_key(|(i, ..)| *i);

    let mut failed = 0usize;
    for (_, path, statements, rendered) in &reports {
        for diag in rendered {
            eprint!("{}", diag);
        }
        if rendered.is_empty() {
            info!("{}: {} statements ok", path.display(), statements);
        } else {
            failed += 1;
            eprintln!("{}: {} error(s)", path.display(), rendered.len());
        }
    }
    info!("checked {} files, {} with errors, {} types interned", reports.len(), failed, codec.registry().len());
    Ok(failed == 0)
}

/// Dumps one parsed program as pretty JSON.
pub fn json(codec: &Codec, source: &Path, output: Option<&Path>) -> Result<bool, Error> {
    let program = match parse_strict(codec, source)? {
        Ok(program) => program,
        Err(rendered) => {
            eprint!("{}", rendered);
            return Ok(false);
        }
    };
    let written = match output {
        Some(path) => {
            to_writer_pretty(File::create(path)?, &program).map_err(io::Error::from)?;
            info!("wrote {} statements to {}", program.len(), path.display());
            Ok(())
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            to_writer_pretty(&mut out, &program)
                .map_err(io::Error::from)
                .and_then(|()| writeln!(out))
        }
    };
    written?;
    Ok(true)
}

/// Parses a type and prints its canonical form.
pub fn type_(codec: &Codec, text: &str) -> Result<bool, Error> {
    match codec.parse_type(text) {
        Ok(ty) => {
            println!("{}", codec.print_type(&ty));
            Ok(true)
        }
        Err(err) => {
            eprint!("{}", render_error(text, "<type>", &err));
            Ok(false)
        }
    }
}

/// Lists every known instruction kind.
pub fn ops(codec: &Codec) -> Result<bool, Error> {
    for kind in codec.catalog().kinds() {
        let form = match kind.form {
            OpForm::Generic => "generic",
            OpForm::Rotation => "rotation",
            OpForm::Call => "call",
        };
        let slots: Vec<&str> = kind
            .slots
            .iter()
            .map(|s| match s {
                SlotKind::Plain => "plain",
                SlotKind::Register => "register",
            })
            .collect();
        println!(
            "{:<12} {:<9} required={} slots=[{}]",
            kind.name,
            form,
            kind.required,
            slots.join(", ")
        );
    }
    Ok(true)
}
