//! `esaltest shell`: call vendor library functions interactively
//!
//! Each line is `<function> <arg1> <arg2> ...` with literal arguments.
//! TAB completes function names; after a name the remaining parameter
//! names are shown as a hint.

use std::path::Path;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::{
    CompletionType, Config as EditorConfig, Context, EditMode, Editor, Helper, Highlighter, Validator,
};
use serde_json::Value as Json;

use crate::common::{Error, Result};
use crate::literal;
use crate::vendor::{lookup, CallResult, VendorLib};

const PROMPT: &str = "CLI: ";

const HELP: &str = "Use TAB for interactive help OR type exit to leave\n\
                    <func_name> <arg1> <arg2> ... <argn>\n\
                    list        functions exported by the library\n\
                    help <func> signature of one function";

#[derive(Helper, Highlighter, Validator)]
struct VendorHelper {
    names: Vec<&'static str>,
}

impl Completer for VendorHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        // only the first word is completed
        if before.contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }
        let candidates = self
            .names
            .iter()
            .filter(|name| name.starts_with(before))
            .map(|name| Pair {
                display: name.to_string(),
                replacement: name.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for VendorHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        parameter_hint(line)
    }
}

/// Names of the parameters still to be typed after a function name
fn parameter_hint(line: &str) -> Option<String> {
    let mut words = line.split_whitespace();
    let sig = lookup(words.next()?)?;
    let typed = words.count();
    let rest = sig.params.get(typed..).filter(|rest| !rest.is_empty())?;
    let names: Vec<&str> = rest.iter().map(|p| p.name).collect();
    let sep = if line.ends_with(char::is_whitespace) { "" } else { " " };
    Some(format!("{}{}", sep, names.join(" ")))
}

pub fn repl(lib_path: &Path) -> Result<()> {
    let lib = VendorLib::open(lib_path)?;
    let names = lib.available().into_iter().map(|sig| sig.name).collect();

    let config = EditorConfig::builder()
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();
    let mut editor: Editor<VendorHelper, DefaultHistory> = Editor::with_config(config)
        .map_err(|e| Error::Internal(format!("Failed to start line editor: {e}")))?;
    editor.set_helper(Some(VendorHelper { names }));

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => match respond(&lib, line.trim()) {
                Some(text) if text.is_empty() => {}
                Some(text) => println!("{}", text),
                None => break,
            },
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(e) => return Err(Error::Internal(format!("Failed to read input: {e}"))),
        }
    }

    println!("Stop CLI");
    Ok(())
}

/// Text printed for one input line; `None` ends the shell
fn respond(lib: &VendorLib, line: &str) -> Option<String> {
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    Some(match name {
        "" => String::new(),
        "exit" => return None,
        "?" => HELP.to_string(),
        "list" => lib
            .available()
            .iter()
            .map(|sig| sig.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        "help" => match lookup(rest) {
            Some(sig) => sig.to_string(),
            None => Error::UnknownFunction(rest.to_string()).to_string(),
        },
        _ if lookup(name).is_none() => Error::UnknownFunction(name.to_string()).to_string(),
        _ => match literal::eval_args(rest).and_then(|args| lib.call(name, &args)) {
            Ok(result) => format_result(&result),
            Err(e) => call_error(&e),
        },
    })
}

fn call_error(error: &Error) -> String {
    match error {
        Error::BadArguments { .. } | Error::Literal(_) => {
            tracing::debug!("{}", error);
            "Error! Check arguments!".to_string()
        }
        other => other.to_string(),
    }
}

/// `rc: <rc>` followed by every parameter, sorted by name
fn format_result(result: &CallResult) -> String {
    let rc = result
        .rc
        .map(|rc| rc.to_string())
        .unwrap_or_else(|| "None".to_string());
    let mut lines = vec![format!("rc: {}", rc)];
    for (name, value) in result.fields.iter().filter(|(name, _)| name.as_str() != "rc") {
        lines.push(format!("{}: {}", name, display_value(value)));
    }
    lines.join("\n")
}

fn display_value(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Bool(true) => "True".to_string(),
        Json::Bool(false) => "False".to_string(),
        Json::Array(items) => {
            let items: Vec<String> = items.iter().map(display_value).collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}
