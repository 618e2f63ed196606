//! Yes/no answers for single-row, two-number results.
//!
//! Column names such as `sales_for_nike` and `sales_for_adidas` are split on the word
//! `for`: the words before it name the metric, the words after it name the entity.
//! This is a heuristic. It returns `None` whenever the names or values do not fit, and
//! callers fall back to the generic table.

use crate::record::{ResultRecord, SqlValue};

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub metric: String,
    pub first: String,
    pub second: String,
    pub ordering: std::cmp::Ordering,
}

impl Comparison {
    pub fn sentence(&self) -> String {
        use std::cmp::Ordering::*;
        match self.ordering {
            Greater => format!(
                "Yes, the {} for {} is higher than for {}.",
                self.metric, self.first, self.second
            ),
            Less => format!(
                "No, the {} for {} is not higher than for {}.",
                self.metric, self.first, self.second
            ),
            Equal => format!(
                "The {} is the same for both {} and {}.",
                self.metric, self.first, self.second
            ),
        }
    }
}

/// Splits a column name into (metric, entity) around the `for` word.
fn split_on_for(column: &str) -> Option<(String, String)> {
    let words: Vec<&str> = column
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();
    let at = words.iter().position(|w| w.eq_ignore_ascii_case("for"))?;
    let metric = words[..at].join(" ");
    let entity = words[at + 1..].join(" ").to_uppercase();
    if metric.is_empty() || entity.is_empty() {
        return None;
    }
    Some((metric, entity))
}

pub fn compare(records: &[ResultRecord]) -> Option<Comparison> {
    let [record] = records else {
        return None;
    };
    let [(first_col, first_val), (second_col, second_val)] = record.fields() else {
        return None;
    };
    if !first_val.is_numeric() || !second_val.is_numeric() {
        return None;
    }

    let ordering = match (first_val, second_val) {
        // Exact for integers past 2^53, where the f64 cast loses precision.
        (SqlValue::Integer(a), SqlValue::Integer(b)) => a.cmp(b),
        _ => first_val.as_f64()?.partial_cmp(&second_val.as_f64()?)?,
    };

    let (metric, first) = split_on_for(first_col)?;
    let (_, second) = split_on_for(second_col)?;

    Some(Comparison {
        metric,
        first,
        second,
        ordering,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn pair(a: (&str, SqlValue), b: (&str, SqlValue)) -> Vec<ResultRecord> {
        vec![vec![a, b].into_iter().collect()]
    }

    #[test]
    fn test_higher_first_entity() {
        let records = pair(
            ("sales_for_nike", SqlValue::Integer(500)),
            ("sales_for_adidas", SqlValue::Integer(300)),
        );
        let cmp = compare(&records).unwrap();
        assert_eq!(cmp.metric, "sales");
        assert_eq!(cmp.first, "NIKE");
        assert_eq!(cmp.second, "ADIDAS");
        assert_eq!(cmp.ordering, Ordering::Greater);
        assert_eq!(cmp.sentence(), "Yes, the sales for NIKE is higher than for ADIDAS.");
    }

    #[test]
    fn test_lower_and_equal() {
        let lower = pair(
            ("revenue_for_north", SqlValue::Float(1.5)),
            ("revenue_for_south", SqlValue::Decimal("2.25".into())),
        );
        assert_eq!(
            compare(&lower).unwrap().sentence(),
            "No, the revenue for NORTH is not higher than for SOUTH."
        );

        let equal = pair(
            ("total_orders_for_q1", SqlValue::Integer(7)),
            ("total_orders_for_q2", SqlValue::Integer(7)),
        );
        assert_eq!(
            compare(&equal).unwrap().sentence(),
            "The total orders is the same for both Q1 and Q2."
        );
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let records = pair(
            ("rows_for_a", SqlValue::Integer(9_007_199_254_740_993)),
            ("rows_for_b", SqlValue::Integer(9_007_199_254_740_992)),
        );
        assert_eq!(compare(&records).unwrap().ordering, Ordering::Greater);
    }

    #[test]
    fn test_names_without_for_do_not_compare() {
        let records = pair(("nike", SqlValue::Integer(5)), ("adidas", SqlValue::Integer(3)));
        assert!(compare(&records).is_none());
    }

    #[test]
    fn test_for_inside_a_word_is_not_a_split() {
        let records = pair(
            ("format_count", SqlValue::Integer(5)),
            ("platform_count", SqlValue::Integer(3)),
        );
        assert!(compare(&records).is_none());
    }

    #[test]
    fn test_non_numeric_values_do_not_compare() {
        let records = pair(
            ("country", SqlValue::Text("France".into())),
            ("count_for_x", SqlValue::Integer(3)),
        );
        assert!(compare(&records).is_none());
    }

    #[test]
    fn test_nan_does_not_compare() {
        let records = pair(
            ("sales_for_a", SqlValue::Float(f64::NAN)),
            ("sales_for_b", SqlValue::Float(1.0)),
        );
        assert!(compare(&records).is_none());
    }
}
