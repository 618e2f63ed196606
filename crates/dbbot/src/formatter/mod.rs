//! Turns a successful result set into the answer shown in the chat window.

pub mod comparative;
pub mod html;

use std::fmt;

use crate::record::ResultRecord;
use html::{escape, pretty_header, render_table};

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    NoResults,
    /// One row with one column.
    SingleValue { label: String, value: String },
    /// One row with two numbers whose column names could be compared.
    Comparative { sentence: String, table: String },
    Table { count: usize, table: String },
}

impl Answer {
    /// Picks the rendering for `records`. Never fails.
    pub fn from_records(records: &[ResultRecord]) -> Self {
        match records {
            [] => Answer::NoResults,
            [record] if record.len() == 1 => {
                let (column, value) = &record.fields()[0];
                Answer::SingleValue {
                    label: pretty_header(column),
                    value: value.to_string(),
                }
            }
            [_] => match comparative::compare(records) {
                Some(cmp) => Answer::Comparative {
                    sentence: cmp.sentence(),
                    table: render_table(records),
                },
                None => Answer::table(records),
            },
            _ => Answer::table(records),
        }
    }

    fn table(records: &[ResultRecord]) -> Self {
        Answer::Table {
            count: records.len(),
            table: render_table(records),
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            Answer::NoResults => "<p>No results found.</p>".to_string(),
            Answer::SingleValue { label, value } => {
                format!("<p><strong>{}:</strong> {}</p>", escape(label), escape(value))
            }
            Answer::Comparative { sentence, table } => {
                format!("<p>{}</p>{}", escape(sentence), table)
            }
            Answer::Table { count, table } => format!("<p>Found {} records.</p>{}", count, table),
        }
    }
}

/// Plain-text form, without markup.
impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::NoResults => f.write_str("No results found."),
            Answer::SingleValue { label, value } => write!(f, "{}: {}", label, value),
            Answer::Comparative { sentence, .. } => f.write_str(sentence),
            Answer::Table { count, .. } => write!(f, "Found {} records.", count),
        }
    }
}

/// Renders `records` as chat-window HTML.
pub fn format_results(records: &[ResultRecord]) -> String {
    Answer::from_records(records).to_html()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SqlValue;

    fn row(fields: Vec<(&str, SqlValue)>) -> ResultRecord {
        fields.into_iter().collect()
    }

    #[test]
    fn test_empty_result() {
        let answer = Answer::from_records(&[]);
        assert_eq!(answer, Answer::NoResults);
        assert_eq!(answer.to_string(), "No results found.");
        assert_eq!(answer.to_html(), "<p>No results found.</p>");
    }

    #[test]
    fn test_single_cell() {
        let records = vec![row(vec![("total_sales", SqlValue::Integer(500))])];
        let answer = Answer::from_records(&records);
        assert_eq!(answer.to_string(), "Total Sales: 500");
        assert_eq!(answer.to_html(), "<p><strong>Total Sales:</strong> 500</p>");
    }

    #[test]
    fn test_single_cell_null_shows_none() {
        let records = vec![row(vec![("max_price", SqlValue::Null)])];
        assert_eq!(Answer::from_records(&records).to_string(), "Max Price: None");
    }

    #[test]
    fn test_comparative_answer_has_sentence_and_table() {
        let records = vec![row(vec![
            ("sales_for_nike", SqlValue::Integer(500)),
            ("sales_for_adidas", SqlValue::Integer(300)),
        ])];
        let answer = Answer::from_records(&records);
        assert_eq!(answer.to_string(), "Yes, the sales for NIKE is higher than for ADIDAS.");

        let html = answer.to_html();
        assert!(html.starts_with("<p>Yes, the sales for NIKE is higher than for ADIDAS.</p>"));
        assert!(html.contains("<th>Sales For Nike</th><th>Sales For Adidas</th>"));
        assert!(html.contains("<tr><td>500</td><td>300</td></tr>"));
    }

    #[test]
    fn test_two_numbers_without_for_fall_back_to_table() {
        let records = vec![row(vec![("min", SqlValue::Integer(1)), ("max", SqlValue::Integer(9))])];
        let answer = Answer::from_records(&records);
        assert!(matches!(answer, Answer::Table { count: 1, .. }));
        assert!(answer.to_html().starts_with("<p>Found 1 records.</p>"));
    }

    #[test]
    fn test_text_and_number_row_is_a_table() {
        let records = vec![row(vec![
            ("country", SqlValue::Text("France".into())),
            ("count", SqlValue::Integer(12)),
        ])];
        let html = format_results(&records);
        assert!(html.contains("<td>France</td><td>12</td>"));
    }

    #[test]
    fn test_many_rows_table_is_escaped() {
        let records = vec![
            row(vec![("name", SqlValue::Text("<script>".into())), ("qty", SqlValue::Integer(1))]),
            row(vec![("name", SqlValue::Text("Bolt".into())), ("qty", SqlValue::Null)]),
        ];
        let html = format_results(&records);
        assert!(html.starts_with("<p>Found 2 records.</p><div class='table-container'><table>"));
        assert!(html.contains("<td>&lt;script&gt;</td>"));
        assert!(html.contains("<tr><td>Bolt</td><td></td></tr>"));
    }
}
