//! Chat command classification and the static texts the commands reply with.

use genie_session::{ConversationState, UserSession};

const SETUSER_PREFIX: &str = "/setuser";
const INFO_WORDS: &[&str] = &["info", "/info"];
const LOGOUT_WORDS: &[&str] = &["logout", "/logout", "sign out", "disconnect"];
const HELP_WORDS: &[&str] = &[
    "help",
    "/help",
    "commands",
    "/commands",
    "information",
    "about",
    "what is this",
];
const RESET_WORDS: &[&str] = &[
    "new conversation",
    "new chat",
    "start over",
    "reset",
    "clear conversation",
    "/new",
    "/reset",
    "/clear",
    "/start",
    "begin again",
    "fresh start",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Emulator-only identity override.
    SetUser(String),
    SetUserUsage,
    Info,
    Logout,
    Help,
    Reset,
    /// Not a command; forward to Genie.
    Question,
}

/// Classifies trimmed message text; first match in precedence order wins.
pub fn classify(text: &str, is_emulator: bool) -> Command {
    let text = text.trim();
    if let Some(command) = parse_setuser(text).filter(|_| is_emulator) {
        return command;
    }

    let lowered = text.to_lowercase();
    let is = |words: &[&str]| words.contains(&lowered.as_str());
    if is(INFO_WORDS) {
        Command::Info
    } else if is(LOGOUT_WORDS) {
        Command::Logout
    } else if is(HELP_WORDS) {
        Command::Help
    } else if is(RESET_WORDS) {
        Command::Reset
    } else {
        Command::Question
    }
}

fn parse_setuser(text: &str) -> Option<Command> {
    let head = text.get(..SETUSER_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(SETUSER_PREFIX) {
        return None;
    }
    let rest = &text[SETUSER_PREFIX.len()..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    match rest.trim() {
        "" => Some(Command::SetUserUsage),
        name => Some(Command::SetUser(name.to_string())),
    }
}

pub fn help_text() -> String {
    "🤖 **Genie Data Bot**\n\n\
**What I do:**\n\
I am a Teams bot connected to a Databricks Genie space, so you can explore your data in natural language right here in Teams.\n\n\
**How I work:**\n\
• I connect to the Databricks workspace with the configured credentials\n\
• I remember our conversation so follow-up questions keep their context\n\n\
**Session management:**\n\
• Conversations restart automatically after **4 hours** of inactivity\n\
• You can restart at any time by typing `reset` or `new chat`\n\n\
**Available commands:**\n\
• `help` - Show this information\n\
• `info` - Show your session and quick usage tips\n\
• `reset` - Start a new conversation\n\
• `logout` - Clear your session"
        .to_string()
}

pub fn info_text(session: &UserSession, is_emulator: bool) -> String {
    let mut text = format!(
        "🤖 **Genie Data Bot Commands**\n\
**👤 User:** {}\n\n\
**Start a new conversation:**\n\
- `reset` or `new chat`\n\n\
**User commands:**\n\
- `help` - Show detailed bot information\n\
- `logout` - Clear your session (you will be identified again on your next message)\n",
        session.display_name
    );
    if is_emulator {
        text.push_str(
            "\n**Emulator test commands:**\n\
- `/setuser Your Name` - Change your display name\n\
- Example: `/setuser Jane Doe`\n",
        );
    }
    let status = match session.state() {
        ConversationState::New => "New conversation",
        ConversationState::Active => "Continuing existing conversation",
    };
    text.push_str(&format!(
        "\n**General usage:**\n\
- Ask anything about your data\n\
- I will remember the context of our conversation\n\
- Use the commands above to restart when needed\n\n\
**Current status:** {status}"
    ));
    text
}

pub fn logout_text(display_name: &str) -> String {
    format!(
        "👋 **Goodbye, {display_name}!**\n\n\
Your session has been cleared. You will be identified again when you send your next message."
    )
}

pub fn reset_text(display_name: &str) -> String {
    format!(
        "🔄 **Starting a new conversation, {display_name}!**\n\n\
You can ask me anything about your data."
    )
}

pub fn setuser_text(display_name: &str) -> String {
    format!(
        "✅ **Identity updated!**\n\n\
**Name:** {display_name}\n\
You can now ask me questions about your data!"
    )
}

pub fn setuser_usage_text() -> String {
    "❌ **Invalid format**\n\n\
Use: `/setuser Your Name`\n\
Example: `/setuser Jane Doe`"
        .to_string()
}

pub fn timeout_notice_text() -> String {
    "⏰ **Conversation restarted**\n\n\
Your previous conversation expired (more than 4 hours of inactivity). \
Starting a new conversation context.\n\n\
I'm processing your question now!"
        .to_string()
}

pub fn welcome_text(display_name: &str, sample_questions: &[String]) -> String {
    let mut text = format!(
        "🤖 **Welcome to the Genie Data Bot, {display_name}!**\n\
I can help you analyze your data using natural language. \
I keep the context of our conversation so you can ask follow-up questions.\n\n\
**Quick commands:**\n\
- `help` - Detailed bot information\n\
- `info` - Show bot information\n\
- `reset` - Restart the conversation\n"
    );
    if !sample_questions.is_empty() {
        text.push_str("\n**Try asking:**\n");
        for question in sample_questions {
            text.push_str(&format!("- {question}\n"));
        }
    }
    text.push_str("\n**Ready to start?**\nJust ask me anything about your data!");
    text
}
