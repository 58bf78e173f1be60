//! Markdown rendering of Genie answers.

use genie_client::{ColumnInfo, GenieAnswer};
use serde_json::Value;

use crate::telemetry::render_with_span;

pub const NO_DATA_TEXT: &str = "No data available.";

/// Renders an answer body without the user header.
pub fn render(answer: &GenieAnswer) -> String {
    render_with_span(answer, || {
        let mut out = String::new();
        if let Some(description) = answer.query_description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(description);
            out.push_str("\n\n");
        }

        match (&answer.columns, &answer.rows) {
            (Some(columns), Some(rows)) => out.push_str(&markdown_table(columns, rows)),
            _ => {
                let text = answer
                    .error
                    .as_deref()
                    .or(answer.message.as_deref())
                    .unwrap_or(NO_DATA_TEXT);
                out.push_str(text);
            }
        }
        out
    })
}

/// Renders an answer addressed to `display_name`.
pub fn render_for(display_name: &str, answer: &GenieAnswer) -> String {
    with_user_header(display_name, &render(answer))
}

/// Prefixes `body` with the bold user line every bot bubble starts with.
pub fn with_user_header(display_name: &str, body: &str) -> String {
    format!("**👤 {display_name}**\n\n{body}")
}

pub fn markdown_table(columns: &[ColumnInfo], rows: &[Vec<Value>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    lines.push(format!("| {} |", names.join(" | ")));
    lines.push(format!("|{}|", vec!["---"; columns.len()].join("|")));
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(columns)
            .map(|(value, column)| format_cell(value, &column.type_name))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

/// Formats one result cell according to its declared SQL type.
///
/// Values that do not parse as the declared numeric type keep their plain form.
pub fn format_cell(value: &Value, type_name: &str) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }
    let kind = type_name.to_ascii_uppercase();
    match kind.as_str() {
        "DECIMAL" | "DOUBLE" | "FLOAT" => as_f64(value)
            .map(format_decimal)
            .unwrap_or_else(|| plain(value)),
        "INT" | "BIGINT" | "LONG" => integer_digits(value)
            .map(|digits| group_thousands(&digits))
            .unwrap_or_else(|| plain(value)),
        _ => plain(value),
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

/// Signed decimal digits of an integer cell; strings of any length are accepted.
fn integer_digits(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string()))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| format!("{:.0}", f.trunc()))
            }),
        Value::String(s) => {
            let s = s.trim();
            let unsigned = s.strip_prefix('-').unwrap_or(s);
            (!unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()))
                .then(|| s.to_string())
        }
        _ => None,
    }
}

fn format_decimal(n: f64) -> String {
    let fixed = format!("{n:.2}");
    match fixed.split_once('.') {
        Some((int, frac)) => format!("{}.{frac}", group_thousands(int)),
        None => group_thousands(&fixed),
    }
}

/// Inserts `,` every three digits of an optionally signed integer string.
fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn double_column_renders_two_decimals_with_separators() {
        let answer = GenieAnswer::table(
            None,
            vec![ColumnInfo::new("amt", "DOUBLE")],
            vec![vec![json!(1234.5)]],
        );
        insta::assert_snapshot!(render(&answer), @r"
        | amt |
        |---|
        | 1,234.50 |
        ");
    }

    #[test]
    fn null_cells_render_as_null_for_any_type() {
        for type_name in ["DOUBLE", "BIGINT", "STRING", "DATE"] {
            assert_eq!(format_cell(&Value::Null, type_name), "NULL");
        }
    }

    #[test]
    fn cells_follow_declared_type() {
        assert_eq!(format_cell(&json!("1234567"), "BIGINT"), "1,234,567");
        assert_eq!(format_cell(&json!(-1234567), "INT"), "-1,234,567");
        assert_eq!(format_cell(&json!("0.5"), "DECIMAL"), "0.50");
        assert_eq!(format_cell(&json!("-98765.432"), "FLOAT"), "-98,765.43");
        assert_eq!(format_cell(&json!(999), "LONG"), "999");
        assert_eq!(format_cell(&json!("2024-05-01"), "DATE"), "2024-05-01");
        assert_eq!(format_cell(&json!(true), "BOOLEAN"), "true");
        assert_eq!(format_cell(&json!("n/a"), "DOUBLE"), "n/a");
    }

    #[test]
    fn bigint_strings_beyond_i64_are_still_grouped() {
        assert_eq!(
            format_cell(&json!("123456789012345678901234"), "BIGINT"),
            "123,456,789,012,345,678,901,234"
        );
        assert_eq!(
            format_cell(&json!(" -99999999999999999999 "), "BIGINT"),
            "-99,999,999,999,999,999,999"
        );
        assert_eq!(format_cell(&json!(18446744073709551615u64), "BIGINT"), "18,446,744,073,709,551,615");
        assert_eq!(format_cell(&json!("12.7"), "INT"), "12.7");
        assert_eq!(format_cell(&json!("-"), "INT"), "-");
    }

    #[test]
    fn description_precedes_table_in_schema_order() {
        let answer = GenieAnswer::table(
            Some("Sales by region".into()),
            vec![ColumnInfo::new("region", "STRING"), ColumnInfo::new("total", "BIGINT")],
            vec![vec![json!("south"), json!("1200")], vec![json!("north"), Value::Null]],
        );
        let text = render(&answer);
        assert_eq!(
            text,
            "Sales by region\n\n| region | total |\n|---|---|\n| south | 1,200 |\n| north | NULL |"
        );
    }

    #[test]
    fn falls_back_through_error_message_and_placeholder() {
        let mut answer = GenieAnswer::message("hello");
        answer.error = Some("boom".into());
        assert_eq!(render(&answer), "boom");
        assert_eq!(render(&GenieAnswer::message("hello")), "hello");
        assert_eq!(render(&GenieAnswer::default()), NO_DATA_TEXT);
    }

    #[test]
    fn user_header_prefixes_every_bubble() {
        assert_eq!(
            render_for("Ana", &GenieAnswer::message("hi")),
            "**👤 Ana**\n\nhi"
        );
    }
}
