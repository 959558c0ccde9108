//! HTML email bodies.

/// Escape text for inclusion in HTML attributes and content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn button(href: &str, label: &str, color: &str) -> String {
    format!(
        r#"<table border="0" cellspacing="0" cellpadding="0">
    <tr>
        <td align="center" style="border-radius: 3px;" bgcolor="{color}">
            <a href="{href}" target="_blank" style="font-size: 14px; font-family: Helvetica, Arial, sans-serif; color: #ffffff;
               text-decoration: none; border-radius: 3px; padding: 8px; border: 1px solid {color}; display: inline-block;">
               {label}</a>
        </td>
    </tr>
</table>"#,
        href = escape(href),
        label = escape(label),
        color = color,
    )
}

/// Body of the "archive ready" email.
pub fn success_body(
    url: &str,
    download_url: &str,
    size: &str,
    schedule_url: Option<&str>,
) -> String {
    let download = button(download_url, &format!("Download archive ({})", size), "#00d1b2");
    let schedule_row = schedule_url
        .map(|href| {
            format!(
                "<tr><td>{}</td></tr>",
                button(href, "Edit schedule", "#209cee")
            )
        })
        .unwrap_or_default();

    format!(
        r#"<p>Hello,</p>
<p>Your archive of <b><a href="{url}">{url}</a></b> is ready.</p>
<table width="100%" border="0" cellspacing="0" cellpadding="0">
    <tr><td style="padding-bottom:10px;">{download}</td></tr>
    {schedule_row}
</table>
<p>Kind regards,<br>Arkivdium</p>"#,
        url = escape(url),
        download = download,
        schedule_row = schedule_row,
    )
}

/// Body of the "archive failed" email.
pub fn failure_body(url: &str) -> String {
    format!(
        r#"<p><b>Your archive of <a href="{url}">{url}</a> could not be completed.</b></p>
<p>We are sorry for the inconvenience. Please check the settings and try again.</p>
<p>Kind regards,<br>Arkivdium</p>"#,
        url = escape(url),
    )
}
