//! Command types and parsing for the interactive prompt

use thiserror::Error;

/// Help information for a command
#[derive(Debug, Clone)]
pub struct CommandHelp {
    pub name: &'static str,
    pub description: &'static str,
}

/// Parsed command from user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Sync,
    /// 1-based row of the inbox list
    Open(usize),
    Tone(String),
    Regen(Option<String>),
    Edit(String),
    Send,
    Save,
    Logout,
    /// Open the login page, or adopt a pasted session token
    Login(Option<String>),
    Status,
    Help,
    Quit,
}

impl ParsedCommand {
    /// Whether running the command waits on the backend
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ParsedCommand::Sync
                | ParsedCommand::Open(_)
                | ParsedCommand::Regen(_)
                | ParsedCommand::Send
                | ParsedCommand::Save
                | ParsedCommand::Logout
                | ParsedCommand::Login(Some(_))
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0} (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("not a row number: {0}")]
    InvalidIndex(String),
}

fn rest(arg: Option<&str>) -> Option<String> {
    arg.map(str::trim).filter(|a| !a.is_empty()).map(str::to_string)
}

/// Parse a command line into a ParsedCommand
pub fn parse_command(input: &str) -> Result<ParsedCommand, CommandError> {
    let trimmed = input.trim();
    let (name, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg)),
        None => (trimmed, None),
    };

    match name {
        "sync" | "s" | "refresh" => Ok(ParsedCommand::Sync),
        "open" | "o" => {
            let arg = rest(arg).ok_or(CommandError::MissingArgument("open"))?;
            match arg.parse::<usize>() {
                Ok(n) if n > 0 => Ok(ParsedCommand::Open(n)),
                _ => Err(CommandError::InvalidIndex(arg)),
            }
        }
        "tone" => rest(arg)
            .map(ParsedCommand::Tone)
            .ok_or(CommandError::MissingArgument("tone")),
        "regen" | "regenerate" => Ok(ParsedCommand::Regen(rest(arg))),
        // Edits keep their inner whitespace
        "edit" => arg
            .filter(|a| !a.trim().is_empty())
            .map(|a| ParsedCommand::Edit(a.to_string()))
            .ok_or(CommandError::MissingArgument("edit")),
        "send" => Ok(ParsedCommand::Send),
        "save" => Ok(ParsedCommand::Save),
        "logout" => Ok(ParsedCommand::Logout),
        "login" => Ok(ParsedCommand::Login(rest(arg))),
        "status" => Ok(ParsedCommand::Status),
        "help" | "h" | "?" => Ok(ParsedCommand::Help),
        "q" | "quit" | "exit" => Ok(ParsedCommand::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// Get all available commands for help display
pub fn available_commands() -> Vec<CommandHelp> {
    vec![
        CommandHelp {
            name: "sync",
            description: "Fetch the latest unread conversations",
        },
        CommandHelp {
            name: "open <n>",
            description: "Open conversation n and generate a reply draft",
        },
        CommandHelp {
            name: "tone <tone>",
            description: "Set the tone for new drafts",
        },
        CommandHelp {
            name: "regen [tone]",
            description: "Regenerate the draft, optionally in another tone",
        },
        CommandHelp {
            name: "edit <text>",
            description: "Replace the draft text",
        },
        CommandHelp {
            name: "send",
            description: "Send the draft as a reply",
        },
        CommandHelp {
            name: "save",
            description: "Save the draft to the mailbox without sending",
        },
        CommandHelp {
            name: "login [token]",
            description: "Open the login page, or sign in with a session token",
        },
        CommandHelp {
            name: "logout",
            description: "Sign out and forget the stored session",
        },
        CommandHelp {
            name: "status",
            description: "Show account, polling and last sync",
        },
        CommandHelp {
            name: "help",
            description: "Show this help message",
        },
        CommandHelp {
            name: "quit",
            description: "Exit the application",
        },
    ]
}
