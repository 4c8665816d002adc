use crossterm::style::Stylize;

/// Colour a line received from the server according to its leading tag.
///
/// The first `[...]` selects the style: `ERR` is red and bold, `INFO` is
/// yellow, and `MSG` drops the tag and colours only the sender name. Lines
/// without a recognized tag are returned unchanged.
pub fn style_line(raw: &str) -> String {
    let (Some(open), Some(close)) = (raw.find('['), raw.find(']')) else {
        return raw.to_string();
    };
    if close < open {
        return raw.to_string();
    }
    let tag = &raw[open + 1..close];
    let rest = raw[close + 1..].trim();
    match tag {
        "ERR" => rest.red().bold().to_string(),
        "INFO" => rest.yellow().to_string(),
        "MSG" => style_sender(rest),
        _ => raw.to_string(),
    }
}

fn style_sender(message: &str) -> String {
    match (message.find('['), message.find(']')) {
        (Some(open), Some(close)) if open < close => format!(
            "[{}]{}",
            message[open + 1..close].cyan(),
            &message[close + 1..]
        ),
        _ => message.to_string(),
    }
}
