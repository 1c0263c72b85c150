use crate::event::Command as EngineCommand;
use teloxide::utils::command::BotCommands;

/// Supported commands for the bot
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Mavjud buyruqlar:")]
pub enum Command {
    /// Start the bot and show the menu
    #[command(description = "Botni ishga tushirish")]
    Start,
    /// About the restaurant
    #[command(description = "Ma'lumot")]
    Info,
    /// Current order
    #[command(description = "Mening buyurtmam")]
    MyOrder,
    /// Clear the current order
    #[command(description = "Buyurtmani tozalash")]
    ClearOrder,
    /// Start a quiz
    #[command(description = "Matematik viktorina")]
    Quiz,
    /// Enter the AI chat mode
    #[command(
        rename = "suniy_intellekt",
        description = "Sun'iy intellekt bilan suhbat"
    )]
    AiChat,
}

impl From<Command> for EngineCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::Start => Self::Start,
            Command::Info => Self::Info,
            Command::MyOrder => Self::MyOrder,
            Command::ClearOrder => Self::ClearOrder,
            Command::Quiz => Self::Quiz,
            Command::AiChat => Self::AiChat,
        }
    }
}

/// Parses a command message, accepting the `/cmd@bot_username` form.
#[must_use]
pub fn parse_command(text: &str, bot_username: &str) -> Option<EngineCommand> {
    Command::parse(text, bot_username).ok().map(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(
            parse_command("/start", "mazza_bot"),
            Some(EngineCommand::Start)
        );
        assert_eq!(
            parse_command("/myorder", "mazza_bot"),
            Some(EngineCommand::MyOrder)
        );
        assert_eq!(
            parse_command("/clearorder", "mazza_bot"),
            Some(EngineCommand::ClearOrder)
        );
        assert_eq!(
            parse_command("/suniy_intellekt", "mazza_bot"),
            Some(EngineCommand::AiChat)
        );
        assert_eq!(
            parse_command("/quiz@mazza_bot", "mazza_bot"),
            Some(EngineCommand::Quiz)
        );
    }

    #[test]
    fn test_unknown_command_is_not_parsed() {
        assert_eq!(parse_command("/menu", "mazza_bot"), None);
        assert_eq!(parse_command("salom", "mazza_bot"), None);
    }

    #[test]
    fn test_command_menu_lists_all_commands() {
        assert_eq!(Command::bot_commands().len(), 6);
    }
}
