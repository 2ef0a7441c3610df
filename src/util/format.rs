/// Format a Unix timestamp as YYYY-MM-DD string
pub fn format_timestamp(timestamp: i64) -> String {
    use time::OffsetDateTime;
    use time::macros::format_description;

    if timestamp == 0 {
        return "unknown".to_string();
    }

    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .and_then(|dt| {
            let format = format_description!("[year]-[month]-[day]");
            dt.format(&format).ok()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// reStructuredText section heading, underlined with `marker`
pub fn rst_heading(title: &str, marker: char) -> String {
    let underline: String = std::iter::repeat_n(marker, title.chars().count().max(1)).collect();
    format!("{title}\n{underline}\n")
}
