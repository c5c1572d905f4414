//! HTML pages served by the dashboard.

use crate::chart::ChartComponents;
use crate::formatter::FormattedPrediction;

/// Escape text for use in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 2rem auto; max-width: 760px; color: #222; }
h1 { font-size: 1.5rem; }
nav a { margin-right: 0.75rem; }
nav a.current { font-weight: bold; text-decoration: none; color: #222; }
form { margin-top: 1.5rem; display: grid; grid-template-columns: 180px 1fr; gap: 0.5rem 1rem; align-items: center; }
form button { grid-column: 2; justify-self: start; padding: 0.4rem 1rem; }
.summary { color: #555; }
.error { color: #b00020; }
footer { margin-top: 2rem; font-size: 0.8rem; color: #888; }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape_html(title),
        style = STYLE,
        body = body
    )
}

/// Prediction form field: a feature name and the values to offer.
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub options: Vec<String>,
}

/// Everything the index page shows.
#[derive(Debug, Clone)]
pub struct IndexPage<'a> {
    pub chart: &'a ChartComponents,
    pub feature_names: &'a [&'a str],
    pub current_feature_name: &'a str,
    pub form_fields: &'a [FormField],
    pub total_users: u64,
    pub total_converted: u64,
    pub loaded_at: &'a str,
}

pub fn render_index(page: &IndexPage<'_>) -> String {
    let nav: Vec<String> = page
        .feature_names
        .iter()
        .map(|name| {
            let class = if *name == page.current_feature_name {
                r#" class="current""#
            } else {
                ""
            };
            format!(
                r#"<a href="/?feature={name}"{class}>{name}</a>"#,
                name = escape_html(name),
                class = class
            )
        })
        .collect();

    let mut form = String::from(r#"<form action="/result" method="get">"#);
    for field in page.form_fields {
        let name = escape_html(&field.name);
        form.push_str(&format!(
            r#"<label for="{name}">{name}</label><select id="{name}" name="{name}">"#
        ));
        for option in &field.options {
            let label = if option.is_empty() { "(none)" } else { option.as_str() };
            form.push_str(&format!(
                r#"<option value="{value}">{label}</option>"#,
                value = escape_html(option),
                label = escape_html(label)
            ));
        }
        form.push_str("</select>");
    }
    form.push_str(r#"<button type="submit">Predict</button></form>"#);

    let rate = if page.total_users == 0 {
        0.0
    } else {
        page.total_converted as f64 / page.total_users as f64 * 100.0
    };

    let body = format!(
        r#"<h1>Marketing conversion</h1>
<nav>{nav}</nav>
<p class="summary">{converted} of {users} users converted ({rate:.2}%)</p>
{div}
{script}
<h2>Will this user convert?</h2>
{form}
<footer>Data loaded at {loaded_at}</footer>"#,
        nav = nav.join(""),
        converted = page.total_converted,
        users = page.total_users,
        rate = rate,
        div = page.chart.div,
        script = page.chart.script,
        form = form,
        loaded_at = escape_html(page.loaded_at)
    );

    layout(
        &format!("Conversion by {}", page.current_feature_name),
        &body,
    )
}

pub fn render_result(result: &FormattedPrediction) -> String {
    let body = format!(
        r#"<h1>Prediction</h1>
<p class="prediction">{prediction}</p>
<p class="probability">{probability}</p>
<p><a href="/">Back to dashboard</a></p>"#,
        prediction = escape_html(&result.prediction),
        probability = escape_html(&result.probability)
    );
    layout("Prediction", &body)
}

pub fn render_error(title: &str, message: &str) -> String {
    let body = format!(
        r#"<h1>{title}</h1>
<p class="error">{message}</p>
<p><a href="/">Back to dashboard</a></p>"#,
        title = escape_html(title),
        message = escape_html(message)
    );
    layout(title, &body)
}
