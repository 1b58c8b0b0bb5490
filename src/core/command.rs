//! Parsers for slash commands and callback data

use super::action::{Button, ExportFormat, RangePreset};

/// Parsed slash command from a text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reset the session and show the main window
    Start,
    /// Open the API key prompt
    SetKey,
    /// Toggle mainnet / testnet
    SwitchNetwork,
    /// Unknown command
    Unknown(String),
}

/// Parse a command string (with the leading /)
///
/// Returns `None` when the text is not a command at all.
pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.trim();
    let body = input.strip_prefix('/')?;
    let mut parts = body.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    // Commands addressed in groups carry a @botname suffix
    let cmd = cmd.split('@').next().unwrap_or(cmd);

    let parsed = match cmd.to_lowercase().as_str() {
        "start" => Command::Start,
        "set_key" | "set_api_key" | "key" => Command::SetKey,
        "switch_network" | "network" => Command::SwitchNetwork,
        _ => Command::Unknown(input.to_string()),
    };
    Some(parsed)
}

/// Parse inline button callback data
pub fn parse_callback(data: &str) -> Option<Button> {
    let data = data.trim();
    if let Some((prefix, arg)) = data.split_once(':') {
        return match prefix {
            "event" => arg.parse().ok().map(Button::SelectEvent),
            "page" => arg
                .parse()
                .ok()
                .filter(|page: &u32| *page > 0)
                .map(Button::Page),
            "range" => match arg {
                "all" => Some(Button::Range(RangePreset::AllTime)),
                days => days
                    .parse()
                    .ok()
                    .filter(|days: &u32| *days > 0)
                    .map(|days| Button::Range(RangePreset::LastDays(days))),
            },
            "fmt" => match arg {
                "csv" => Some(Button::Format(ExportFormat::Csv)),
                "json" => Some(Button::Format(ExportFormat::Json)),
                _ => None,
            },
            _ => None,
        };
    }

    match data {
        "go_main" => Some(Button::GoMain),
        "back" => Some(Button::Back),
        "set_key" => Some(Button::SetKey),
        "del_key" => Some(Button::DeleteKey),
        "network" => Some(Button::ToggleNetwork),
        "events" => Some(Button::Events),
        "metadata" => Some(Button::Metadata),
        "attributes" => Some(Button::Attributes),
        "export" => Some(Button::Export),
        "json" => Some(Button::ShowJson),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/start@tonview_bot"), Some(Command::Start));
        assert_eq!(parse_command("/set_api_key"), Some(Command::SetKey));
        assert_eq!(parse_command("/network"), Some(Command::SwitchNetwork));
        assert_eq!(
            parse_command("/nope"),
            Some(Command::Unknown("/nope".to_string()))
        );
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_command("foundation.ton"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_parse_simple_callbacks() {
        assert_eq!(parse_callback("go_main"), Some(Button::GoMain));
        assert_eq!(parse_callback("back"), Some(Button::Back));
        assert_eq!(parse_callback("del_key"), Some(Button::DeleteKey));
        assert_eq!(parse_callback("json"), Some(Button::ShowJson));
    }

    #[test]
    fn test_parse_argument_callbacks() {
        assert_eq!(parse_callback("page:4"), Some(Button::Page(4)));
        assert_eq!(parse_callback("page:0"), None);
        assert_eq!(parse_callback("page:x"), None);
        assert_eq!(parse_callback("event:12"), Some(Button::SelectEvent(12)));
        assert_eq!(
            parse_callback("range:all"),
            Some(Button::Range(RangePreset::AllTime))
        );
        assert_eq!(
            parse_callback("range:30"),
            Some(Button::Range(RangePreset::LastDays(30)))
        );
        assert_eq!(
            parse_callback("fmt:json"),
            Some(Button::Format(ExportFormat::Json))
        );
        assert_eq!(parse_callback("fmt:xml"), None);
    }

    #[test]
    fn test_callback_data_matches_parser() {
        let buttons = [
            Button::GoMain,
            Button::Events,
            Button::Attributes,
            Button::Page(3),
            Button::SelectEvent(7),
            Button::Range(RangePreset::LastDays(7)),
            Button::Format(ExportFormat::Csv),
        ];
        for button in buttons {
            assert_eq!(parse_callback(&button.callback_data()), Some(button));
        }
    }
}
