//! monke-drv — driver: CLI entry point, the REPL, and batch file
//! execution (spec.md §6). Owns one long-lived `Compiler` and one
//! long-lived `Vm` for the session so globals and the heap persist
//! across REPL submissions and `require`d modules.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use monke_compile::Compiler;
use monke_util::{Diagnostic, Span};
use monke_vm::{RuntimeError, Vm};

/// What the driver was asked to do (spec.md §6).
#[derive(Debug, Clone)]
pub struct Config {
    /// The script to run; `None` starts the interactive REPL.
    pub script: Option<PathBuf>,
}

/// One driver invocation's state: a persistent compiler and VM, plus
/// every source buffer ever submitted to them. The buffers are kept
/// alive for the session's lifetime (spec.md §6) even though nothing
/// in this crate borrows back into them today — spans are plain
/// offsets, not references.
pub struct Session {
    config: Config,
    compiler: Compiler,
    vm: Vm,
    sources: Vec<String>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            compiler: Compiler::new(),
            vm: Vm::new(monke_runtime::builtins()),
            sources: Vec::new(),
        }
    }

    /// Runs the session to completion and returns the process exit code
    /// (spec.md §6: 0 success, 1 any pipeline failure, 2 CLI misuse).
    pub fn run(&mut self) -> i32 {
        match self.config.script.clone() {
            Some(path) => self.run_file(&path),
            None => self.run_repl(),
        }
    }

    fn run_file(&mut self, path: &std::path::Path) -> i32 {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("monke: cannot read {}: {}", path.display(), e);
                return 2;
            }
        };

        match self.submit(&source) {
            Outcome::Ok => 0,
            Outcome::Failed(message) => {
                eprintln!("{}", message);
                1
            }
        }
    }

    fn run_repl(&mut self) -> i32 {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        let mut buffer = String::new();
        let mut continuing = false;

        loop {
            print!("{}", if continuing { ".. " } else { ">> " });
            let _ = io::stdout().flush();

            let Some(line) = lines.next() else {
                println!();
                return 0;
            };
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    eprintln!("monke: error reading stdin: {}", e);
                    return 1;
                }
            };

            if continuing {
                if line.trim().is_empty() {
                    continuing = false;
                    match self.submit(&buffer) {
                        Outcome::Ok => {}
                        Outcome::Failed(message) => eprintln!("{}", message),
                    }
                    buffer.clear();
                    continue;
                }
                buffer.push_str(&line);
                buffer.push('\n');
                continue;
            }

            if line.trim_end().ends_with('{') || line.trim_end().ends_with('(') {
                buffer.push_str(&line);
                buffer.push('\n');
                continuing = true;
                continue;
            }

            buffer.push_str(&line);
            buffer.push('\n');
            match self.submit(&buffer) {
                Outcome::Ok => {}
                Outcome::Failed(message) => eprintln!("{}", message),
            }
            buffer.clear();
        }
    }

    /// Parses, compiles, and runs one submission against the session's
    /// persistent compiler and VM, printing the REPL's last-popped
    /// value when running interactively (spec.md §6).
    fn submit(&mut self, source: &str) -> Outcome {
        let print_result = self.config.script.is_none();
        self.sources.push(source.to_string());
        let owned_source = self.sources.last().expect("just pushed").clone();

        let program = match monke_par::parse(&owned_source) {
            Ok(program) => program,
            Err(errors) => {
                let first = &errors[0];
                return Outcome::Failed(render_failure("parse", &first.message, first.span, &owned_source));
            }
        };

        if let Err(e) = self.compiler.compile_program(&owned_source, &program) {
            return Outcome::Failed(render_failure("compile", &e.message, e.span, &owned_source));
        }
        let bytecode = self.compiler.take_bytecode();

        match self.vm.run(&bytecode) {
            Ok(()) => {
                if print_result {
                    let value = self.vm.last_popped();
                    if !matches!(value, monke_obj::Object::Null) {
                        println!("{}", value);
                    }
                }
                Outcome::Ok
            }
            Err(err) => Outcome::Failed(render_runtime_failure(&err)),
        }
    }
}

enum Outcome {
    Ok,
    Failed(String),
}

fn render_failure(stage: &'static str, message: &str, span: Span, source: &str) -> String {
    Diagnostic::error(stage, message, span).render(source)
}

fn render_runtime_failure(err: &RuntimeError) -> String {
    format!("Woops! runtime failed!\n{}", err.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Config { script: None })
    }

    #[test]
    fn submit_runs_a_top_level_statement() {
        let mut s = session();
        assert!(matches!(s.submit("1 + 1;"), Outcome::Ok));
    }

    #[test]
    fn submit_reports_a_parse_error() {
        let mut s = session();
        match s.submit("let x = ;") {
            Outcome::Failed(message) => assert!(message.contains("Woops! parse failed!")),
            Outcome::Ok => panic!("expected a parse failure"),
        }
    }

    #[test]
    fn submit_reports_a_compile_error() {
        let mut s = session();
        match s.submit("undefined_name;") {
            Outcome::Failed(message) => assert!(message.contains("Woops! compile failed!")),
            Outcome::Ok => panic!("expected a compile failure"),
        }
    }

    #[test]
    fn submit_reports_a_runtime_error() {
        let mut s = session();
        match s.submit("1 / 0;") {
            Outcome::Failed(message) => assert!(message.contains("Woops! runtime failed!")),
            Outcome::Ok => panic!("expected a runtime failure"),
        }
    }

    #[test]
    fn globals_persist_across_submissions() {
        let mut s = session();
        assert!(matches!(s.submit("let x = 41;"), Outcome::Ok));
        assert!(matches!(s.submit("x + 1;"), Outcome::Ok));
        assert!(matches!(s.vm.last_popped(), monke_obj::Object::Integer(42)));
    }
}
