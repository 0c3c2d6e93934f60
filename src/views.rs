//! Page and mail body rendering.

use chrono::{DateTime, Utc};
use url::Url;

use crate::{
    dto::TimeOptionView,
    models::{EventTime, PendingEvent},
};

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Path of the scheduling link for `key`, with the key as one percent-encoded segment.
pub fn event_path(key: &str) -> String {
    match Url::parse("http://localhost/event") {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.push(key);
            }
            url.path().to_string()
        }
        Err(_) => "/event".to_string(),
    }
}

pub fn format_range(time: &EventTime) -> String {
    format!(
        "{} - {} UTC",
        time.start().format("%A, %B %-d, %Y %H:%M"),
        end_format(time.start(), time.end())
    )
}

fn end_format(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    if start.date_naive() == end.date_naive() {
        end.format("%H:%M").to_string()
    } else {
        end.format("%A, %B %-d, %Y %H:%M").to_string()
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

pub fn bad_event_link() -> String {
    page(
        "Bad link",
        "<h1>This link is no longer valid</h1>\n<p>The event may already have been scheduled.</p>",
    )
}

pub fn error_page(message: &str) -> String {
    page("Error", &format!("<h1>Something went wrong</h1>\n<p>{}</p>", escape_html(message)))
}

pub fn scheduled(pending: &PendingEvent, time: &EventTime) -> String {
    page(
        "Scheduled",
        &format!(
            "<h1>Success!</h1>\n<p>{} is scheduled for {}. An invitation was sent to all attendees.</p>",
            escape_html(&pending.event.title),
            escape_html(&format_range(time))
        ),
    )
}

/// Selection page: one form per time option, `selected_key` preselected.
pub fn show_event(pending: &PendingEvent, selected_key: &str) -> String {
    let event = &pending.event;
    let mut body = format!("<h1>{}</h1>\n", escape_html(&event.title));
    if !event.location.is_empty() {
        body.push_str(&format!("<p class=\"location\">{}</p>\n", escape_html(&event.location)));
    }
    if !event.description.is_empty() {
        body.push_str(&format!("<p class=\"description\">{}</p>\n", escape_html(&event.description)));
    }

    body.push_str("<ul class=\"times\">\n");
    for time in &pending.times {
        let selected = time.key == selected_key;
        body.push_str(&format!(
            "<li class=\"time{}\"><form method=\"post\" action=\"/event/{}\">\
             <input type=\"radio\" name=\"key\" value=\"{}\"{}> {} \
             <button type=\"submit\">Schedule</button></form></li>\n",
            if selected { " selected" } else { "" },
            escape_html(&event_path(&time.key)),
            escape_html(&time.key),
            if selected { " checked" } else { "" },
            escape_html(&format_range(time)),
        ));
    }
    body.push_str("</ul>\n");

    let times: Vec<TimeOptionView> = pending.times.iter().map(TimeOptionView::from).collect();
    let times_json = serde_json::to_string(&times)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/");
    body.push_str(&format!(
        "<script>\nwindow.times = {};\nwindow.selectedKey = {};\n</script>",
        times_json,
        serde_json::to_string(selected_key).unwrap_or_else(|_| "null".to_string()).replace("</", "<\\/")
    ));

    page(&event.title, &body)
}

pub fn email_text(pending: &PendingEvent, time: &EventTime) -> String {
    let event = &pending.event;
    let mut text = format!("You're invited: {}\n\nWhen: {}\n", event.title, format_range(time));
    if !event.location.is_empty() {
        text.push_str(&format!("Where: {}\n", event.location));
    }
    text.push_str("Who:\n");
    for attendee in &pending.attendees {
        text.push_str(&format!("  {} <{}>\n", attendee.name, attendee.email));
    }
    if !event.description.is_empty() {
        text.push_str(&format!("\n{}\n", event.description));
    }
    text
}

pub fn email_html(pending: &PendingEvent, time: &EventTime) -> String {
    let event = &pending.event;
    let mut html = format!(
        "<html>\n<body>\n<h2>{}</h2>\n<p><b>When:</b> {}</p>\n",
        escape_html(&event.title),
        escape_html(&format_range(time))
    );
    if !event.location.is_empty() {
        html.push_str(&format!("<p><b>Where:</b> {}</p>\n", escape_html(&event.location)));
    }
    html.push_str("<p><b>Who:</b></p>\n<ul>\n");
    for attendee in &pending.attendees {
        html.push_str(&format!(
            "<li>{} &lt;{}&gt;</li>\n",
            escape_html(&attendee.name),
            escape_html(&attendee.email)
        ));
    }
    html.push_str("</ul>\n");
    if !event.description.is_empty() {
        html.push_str(&format!("<p>{}</p>\n", escape_html(&event.description)));
    }
    html.push_str("</body>\n</html>\n");
    html
}
