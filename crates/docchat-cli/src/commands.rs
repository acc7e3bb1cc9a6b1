//! Slash commands for interactive mode

use std::path::PathBuf;

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Select files for upload, replacing the pending batch
    Add(Vec<PathBuf>),
    /// Remove one pending file by its zero-based index
    Remove(usize),
    /// Drop every pending file
    Clear,
    /// Upload the pending batch
    Upload,
    /// Open the document list
    Files,
    Help,
    Quit,
    /// Known command with bad arguments; carries the usage line
    Usage(&'static str),
    Unknown(String),
}

/// Parse a slash command. Returns `None` for anything that is not one.
pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };

    Some(match command.to_lowercase().as_str() {
        "add" | "a" => {
            let paths: Vec<PathBuf> = args.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                Command::Usage("/add <path> [path...]")
            } else {
                Command::Add(paths)
            }
        }
        "remove" | "rm" => match args.parse::<usize>() {
            Ok(n) if n >= 1 => Command::Remove(n - 1),
            _ => Command::Usage("/remove <n>  (n as shown in the batch, from 1)"),
        },
        "clear" => Command::Clear,
        "upload" | "u" => Command::Upload,
        "files" | "f" => Command::Files,
        "help" | "h" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    })
}

pub fn help_message() -> String {
    r#"Available commands:
  /add <paths...>      Select .txt/.md files for upload (replaces the batch)
  /remove <n>          Remove file n from the batch
  /clear               Remove every file from the batch
  /upload, /u          Upload the batch
  /files, /f           Show stored documents
  /help, /h, /?        Show this help message
  /quit, /exit, /q     Exit docchat

Keys:
  Enter       Ask the question
  Ctrl+U      Upload the batch
  Ctrl+F      Show stored documents (d/Delete removes the selected one)
  PgUp/PgDn   Scroll the conversation
  Ctrl+C/Esc  Quit"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_command() {
        assert_eq!(parse_command("what is rag?"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_add_collects_paths() {
        assert_eq!(
            parse_command("/add notes.md  docs/a.txt"),
            Some(Command::Add(vec![
                PathBuf::from("notes.md"),
                PathBuf::from("docs/a.txt")
            ]))
        );
        assert!(matches!(parse_command("/add"), Some(Command::Usage(_))));
    }

    #[test]
    fn test_remove_is_one_based() {
        assert_eq!(parse_command("/remove 1"), Some(Command::Remove(0)));
        assert_eq!(parse_command("/rm 3"), Some(Command::Remove(2)));
        assert!(matches!(parse_command("/remove 0"), Some(Command::Usage(_))));
        assert!(matches!(parse_command("/remove x"), Some(Command::Usage(_))));
    }

    #[test]
    fn test_simple_commands_and_aliases() {
        assert_eq!(parse_command("  /UPLOAD "), Some(Command::Upload));
        assert_eq!(parse_command("/f"), Some(Command::Files));
        assert_eq!(parse_command("/clear"), Some(Command::Clear));
        assert_eq!(parse_command("/?"), Some(Command::Help));
        assert_eq!(parse_command("/exit"), Some(Command::Quit));
        assert_eq!(
            parse_command("/model"),
            Some(Command::Unknown("model".into()))
        );
    }
}
