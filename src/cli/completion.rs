//! Shell completion generation for mongowire
//!
//! Scripts for bash, zsh and fish are generated from the clap definition.
//! Bash additionally completes `--ns` from the namespaces used earlier in
//! the shell history.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

const BIN_NAME: &str = "mongowire";

/// Print the completion script for `shell_name` to stdout
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish)
///
/// # Returns
/// * `Result<()>` - Success or error
pub fn generate_completion(shell_name: &str) -> Result<()> {
    let shell = parse_shell(shell_name)?;
    let script = render_completion(shell);
    io::stdout().write_all(script.as_bytes())?;
    Ok(())
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        _ => Err(ConfigError::InvalidValue {
            field: "shell".to_string(),
            value: format!("{shell_name} (supported shells: bash, zsh, fish)"),
        }
        .into()),
    }
}

fn render_completion(shell: Shell) -> String {
    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, BIN_NAME, &mut buffer);
    let basic_completion = String::from_utf8_lossy(&buffer);

    match shell {
        Shell::Bash => format!(
            r#"{basic_completion}
# Offer namespaces seen in earlier --ns arguments
_mongowire_namespaces() {{
    history 2>/dev/null | grep -o -- '--ns [^ ]*' | cut -d' ' -f2 | sort -u
}}

_mongowire_enhanced() {{
    local cur prev words cword
    _init_completion || return

    if [[ "$prev" == "--ns" ]]; then
        COMPREPLY=($(compgen -W "$(_mongowire_namespaces)" -- "$cur"))
        return 0
    fi

    _mongowire "$@"
}}

complete -F _mongowire_enhanced {BIN_NAME}
"#
        ),
        _ => basic_completion.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell() {
        assert!(matches!(parse_shell("bash"), Ok(Shell::Bash)));
        assert!(matches!(parse_shell("zsh"), Ok(Shell::Zsh)));
        assert!(matches!(parse_shell("fish"), Ok(Shell::Fish)));
        assert!(parse_shell("powershell").is_err());
    }

    #[test]
    fn test_parse_shell_case_insensitive() {
        assert!(matches!(parse_shell("BASH"), Ok(Shell::Bash)));
        assert!(matches!(parse_shell("FiSh"), Ok(Shell::Fish)));
    }

    #[test]
    fn test_scripts_name_the_binary() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            assert!(render_completion(shell).contains(BIN_NAME));
        }
        assert!(render_completion(Shell::Bash).contains("complete -F _mongowire_enhanced mongowire"));
    }
}
