use std::io::Write;
use std::path::PathBuf;

use clap::{Command, ValueEnum};
use clap_complete::{generate, shells};

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
    Elvish,
}

pub fn run_completions(
    shell: CompletionShell,
    output: Option<&PathBuf>,
    cmd: &mut Command,
) -> Result<(), CliError> {
    let mut buffer: Vec<u8> = Vec::new();
    let name = cmd.get_name().to_string();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, cmd, name, &mut buffer),
        CompletionShell::Zsh => generate(shells::Zsh, cmd, name, &mut buffer),
        CompletionShell::Fish => generate(shells::Fish, cmd, name, &mut buffer),
        CompletionShell::Powershell => generate(shells::PowerShell, cmd, name, &mut buffer),
        CompletionShell::Elvish => generate(shells::Elvish, cmd, name, &mut buffer),
    }

    match output {
        Some(path) => std::fs::write(path, buffer)?,
        None => std::io::stdout().lock().write_all(&buffer)?,
    }
    Ok(())
}
