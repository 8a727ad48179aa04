//! Shell completion generation
//!
//! - hanjictl completion bash > /etc/bash_completion.d/hanjictl
//! - hanjictl completion zsh  > ~/.zsh/completion/_hanjictl
//! - hanjictl completion fish > ~/.config/fish/completions/hanjictl.fish

use std::io::{self, Write};

use anyhow::Result;
use clap::{CommandFactory, ValueEnum};
use clap_complete::{generate, Shell as ClapShell};

use crate::cli::Cli;

/// Supported shells
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
    Elvish,
}

impl From<Shell> for ClapShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => ClapShell::Bash,
            Shell::Zsh => ClapShell::Zsh,
            Shell::Fish => ClapShell::Fish,
            Shell::Powershell => ClapShell::PowerShell,
            Shell::Elvish => ClapShell::Elvish,
        }
    }
}

impl Shell {
    /// Where the generated script usually goes
    fn install_hint(self) -> &'static str {
        match self {
            Shell::Bash => "hanjictl completion bash > /etc/bash_completion.d/hanjictl",
            Shell::Zsh => "hanjictl completion zsh > ~/.zsh/completion/_hanjictl",
            Shell::Fish => "hanjictl completion fish > ~/.config/fish/completions/hanjictl.fish",
            Shell::Powershell => "hanjictl completion powershell > hanjictl.ps1",
            Shell::Elvish => "hanjictl completion elvish > ~/.elvish/lib/hanjictl.elv",
        }
    }
}

fn write_completion(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(ClapShell::from(shell), &mut cmd, name, out);
}

/// Print the completion script to stdout and install instructions to stderr
pub fn execute(shell: Shell) -> Result<()> {
    write_completion(shell, &mut io::stdout());

    eprintln!();
    eprintln!("# Install with:");
    eprintln!("#    {}", shell.install_hint());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_conversion() {
        let bash: ClapShell = Shell::Bash.into();
        assert!(matches!(bash, ClapShell::Bash));

        let ps: ClapShell = Shell::Powershell.into();
        assert!(matches!(ps, ClapShell::PowerShell));
    }

    #[test]
    fn test_bash_script_mentions_subcommands() {
        let mut buf = Vec::new();
        write_completion(Shell::Bash, &mut buf);

        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("hanjictl"));
        assert!(script.contains("serve"));
        assert!(script.contains("completion"));
    }
}
