//! HTML table rendering and header prettifying.

use crate::record::{ResultRecord, SqlValue};

/// Escapes text for element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Title-cases a column name: underscores become spaces, each word starts upper-case.
///
/// A letter is upper-cased when the previous character is not a letter, so `2nd_place`
/// becomes `2Nd Place`, the same as common `title()` implementations.
pub fn pretty_header(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut prev_is_letter = false;
    for c in column.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

fn cell(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => String::new(),
        other => escape(&other.to_string()),
    }
}

/// Renders records as a table. Headers come from the first record.
pub fn render_table(records: &[ResultRecord]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };

    let thead: String = first
        .columns()
        .map(|c| format!("<th>{}</th>", escape(&pretty_header(c))))
        .collect();

    let tbody: String = records
        .iter()
        .map(|record| {
            let cells: String = record.values().map(|v| format!("<td>{}</td>", cell(v))).collect();
            format!("<tr>{}</tr>", cells)
        })
        .collect();

    format!(
        "<div class='table-container'><table><thead><tr>{}</tr></thead><tbody>{}</tbody></table></div>",
        thead, tbody
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_header() {
        assert_eq!(pretty_header("total_sales"), "Total Sales");
        assert_eq!(pretty_header("CUSTOMER_ID"), "Customer Id");
        assert_eq!(pretty_header("count(*)"), "Count(*)");
        assert_eq!(pretty_header("2nd_place"), "2Nd Place");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>&'\""), "&lt;b&gt;&amp;&#x27;&quot;");
    }

    #[test]
    fn test_nulls_render_as_empty_cells() {
        let record: ResultRecord = vec![("name", SqlValue::Text("Ada".into())), ("email", SqlValue::Null)]
            .into_iter()
            .collect();
        let html = render_table(&[record]);
        assert!(html.contains("<th>Name</th><th>Email</th>"));
        assert!(html.contains("<tr><td>Ada</td><td></td></tr>"));
    }

    #[test]
    fn test_empty_records_render_nothing() {
        assert_eq!(render_table(&[]), "");
    }
}
