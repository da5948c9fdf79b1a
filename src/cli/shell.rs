use std::{
    borrow::Cow,
    fmt, fs,
    io::{self, BufRead},
    path::Path,
};

use rustyline::{
    completion::{Completer, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::DefaultHistory,
    validate::{ValidationContext, ValidationResult, Validator},
    Context as ReadlineContext, Editor, Helper,
};
use shell_words::split;

use crate::cli::commands::profile::PROFILE_VERBS;
use crate::cli::core::{CliError, CliMode, CommandError, LoopControl, ShellContext};
use crate::cli::output::info as output_info;
use crate::utils::build_info;

const SCRIPT_ENV: &str = "ANSELUS_CLI_SCRIPT";

pub fn run_cli() -> Result<(), CliError> {
    let mode = if std::env::var_os(SCRIPT_ENV).is_some() {
        CliMode::Script
    } else {
        CliMode::Interactive
    };

    let mut context = ShellContext::new(mode)?;

    let result = match mode {
        CliMode::Interactive => run_interactive(&mut context),
        CliMode::Script => run_script(&mut context),
    };
    context.client.disconnect()?;
    result
}

fn run_interactive(context: &mut ShellContext) -> Result<(), CliError> {
    let mut editor = Editor::<CommandHelper, DefaultHistory>::new()?;
    let mut names: Vec<&'static str> = context.registry.names().collect();
    for entry in context.registry.list() {
        names.extend(entry.aliases.iter().copied());
    }
    editor.set_helper(Some(CommandHelper::new(names)));

    output_info(format!(
        "Anselus CLI {}. Type `help` for a list of commands.",
        build_info::CLIENT_VERSION
    ));

    loop {
        if !context.running {
            break;
        }
        if let Some(helper) = editor.helper_mut() {
            helper.profiles = context.profile_names();
        }
        let prompt = context.prompt();
        let line = editor.readline(&prompt);

        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                editor.add_history_entry(trimmed).ok();

                match handle_line(context, trimmed) {
                    Ok(LoopControl::Continue) => {}
                    Ok(LoopControl::Exit) => break,
                    Err(err) => context.report_error(err)?,
                }
            }
            Err(ReadlineError::Interrupted) => {
                if context.confirm_exit()? {
                    break;
                }
            }
            Err(ReadlineError::Eof) => {
                output_info("Exiting shell.");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn run_script(context: &mut ShellContext) -> Result<(), CliError> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        if !context.running {
            break;
        }
        let line = line?;
        match handle_line(context, &line) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => break,
            Err(err) => context.report_error(err)?,
        }
    }
    Ok(())
}

fn handle_line(context: &mut ShellContext, line: &str) -> Result<LoopControl, CommandError> {
    let tokens = match parse_command_line(line) {
        Ok(tokens) => tokens,
        Err(err) => {
            context.print_warning(&err.message);
            return Ok(LoopControl::Continue);
        }
    };

    if tokens.is_empty() {
        return Ok(LoopControl::Continue);
    }

    let raw = &tokens[0];
    let command = raw.to_lowercase();
    let args: Vec<&str> = tokens.iter().skip(1).map(String::as_str).collect();

    match context.dispatch(&command, raw, &args) {
        Ok(LoopControl::Exit) => {
            context.running = false;
            Ok(LoopControl::Exit)
        }
        other => other,
    }
}

struct CommandHelper {
    commands: Vec<String>,
    profiles: Vec<String>,
}

impl CommandHelper {
    fn new(names: Vec<&'static str>) -> Self {
        let mut commands: Vec<String> = names
            .into_iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();
        commands.sort();
        commands.dedup();
        Self {
            commands,
            profiles: Vec::new(),
        }
    }

    fn candidates(&self, tokens: &[&str], needle: &str) -> Vec<Pair> {
        match tokens {
            [] => prefixed(self.commands.iter().map(String::as_str), needle),
            [command, rest @ ..] => match (command.to_ascii_lowercase().as_str(), rest.len()) {
                ("profile", 0) => prefixed(PROFILE_VERBS.iter().copied(), needle),
                ("profile", 1) if rest[0] != "list" && rest[0] != "create" => {
                    prefixed(self.profiles.iter().map(String::as_str), needle)
                }
                ("chdir" | "cd" | "ls" | "dir", 0) => directory_candidates(needle),
                _ => Vec::new(),
            },
        }
    }
}

fn prefixed<'a>(items: impl Iterator<Item = &'a str>, needle: &str) -> Vec<Pair> {
    let needle = needle.to_lowercase();
    items
        .filter(|item| item.to_lowercase().starts_with(&needle))
        .map(|item| Pair {
            display: item.to_string(),
            replacement: item.to_string(),
        })
        .collect()
}

/// Completes directory names below the directory part of `partial`.
fn directory_candidates(partial: &str) -> Vec<Pair> {
    let quoted = partial.starts_with('"');
    let partial = partial.trim_start_matches('"');
    let (dir_part, file_part) = match partial.rfind(['/', '\\']) {
        Some(idx) => partial.split_at(idx + 1),
        None => ("", partial),
    };
    let search = if dir_part.is_empty() { "." } else { dir_part };
    let Ok(entries) = fs::read_dir(Path::new(search)) else {
        return Vec::new();
    };

    let mut out: Vec<Pair> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(file_part))
        .map(|name| {
            let display = format!("{dir_part}{name}");
            let replacement = if quoted || display.contains(' ') {
                format!("\"{display}\"")
            } else {
                display.clone()
            };
            Pair {
                display,
                replacement,
            }
        })
        .collect();
    out.sort_by(|a, b| a.display.cmp(&b.display));
    out
}

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &ReadlineContext<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];
        let start = prefix
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(idx, c)| idx + c.len_utf8())
            .unwrap_or(0);
        let finished: Vec<&str> = prefix[..start].split_whitespace().collect();
        Ok((start, self.candidates(&finished, &prefix[start..])))
    }
}

impl Hinter for CommandHelper {
    type Hint = String;
}

impl Highlighter for CommandHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for CommandHelper {
    fn validate(&self, _ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        Ok(ValidationResult::Valid(None))
    }
}

pub(crate) fn parse_command_line(input: &str) -> Result<Vec<String>, ParseError> {
    split(input).map_err(|err| ParseError {
        message: err.to_string(),
    })
}

#[derive(Debug)]
pub(crate) struct ParseError {
    message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
