//! Pairwise correlation between numeric fields

use crate::ml::stats::correlation;
use crate::structs::{Dataset, FieldCorrelation};

/// Values of `first` and `second` from the rows where both are numeric
#[must_use]
pub fn paired_values(dataset: &Dataset, first: &str, second: &str) -> (Vec<f64>, Vec<f64>) {
    dataset
        .rows
        .iter()
        .filter_map(|row| {
            let x = row.get(first)?.as_number()?;
            let y = row.get(second)?.as_number()?;
            Some((x, y))
        })
        .unzip()
}

/// Correlation for every unordered pair of `fields`, in field order
///
/// Pairs with fewer than two paired rows are skipped.
#[must_use]
pub fn pairwise_correlations(dataset: &Dataset, fields: &[String]) -> Vec<FieldCorrelation> {
    let mut results = Vec::new();

    for (i, first) in fields.iter().enumerate() {
        for second in &fields[i + 1..] {
            let (x, y) = paired_values(dataset, first, second);
            let Ok(r) = correlation(&x, &y) else {
                continue;
            };
            results.push(FieldCorrelation {
                first: first.clone(),
                second: second.clone(),
                r,
                pairs: x.len(),
            });
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Value;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_pairwise_correlations() {
        let content = "a,b,c\n1.0,2.0,10.0\n2.0,4.0,5.0\n3.0,6.0,30.0";
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(content.as_bytes()).expect("write");

        let data = Dataset::from_csv_path(file.path(), false).expect("parse");
        let fields = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let corr = pairwise_correlations(&data, &fields);

        assert_eq!(corr.len(), 3);
        assert_eq!((corr[0].first.as_str(), corr[0].second.as_str()), ("a", "b"));
        // a and b are perfectly correlated
        assert!((corr[0].r - 1.0).abs() < 0.01);
        assert_eq!(corr[0].pairs, 3);
    }

    #[test]
    fn test_only_paired_rows_count() {
        let data = Dataset::from_records(vec![
            vec![("x", Value::Number(1.0)), ("y", Value::Number(1.0))],
            vec![("x", Value::Null), ("y", Value::Number(100.0))],
            vec![("x", Value::Number(2.0)), ("y", Value::Number(2.0))],
            vec![("x", Value::Number(3.0)), ("y", Value::Text("n/a".into()))],
            vec![("x", Value::Number(4.0)), ("y", Value::Number(4.0))],
        ]);
        let (x, y) = paired_values(&data, "x", "y");
        assert_eq!(x, vec![1.0, 2.0, 4.0]);
        assert_eq!(y, vec![1.0, 2.0, 4.0]);

        let corr = pairwise_correlations(&data, &["x".into(), "y".into()]);
        assert!((corr[0].r - 1.0).abs() < 1e-9);
    }
}
