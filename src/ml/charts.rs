//! Visualization recommendations from field types and cardinality

use crate::ml::classify::{classify, select_profiles};
use crate::structs::{
    ChartConfig, ChartReport, ChartSuggestion, ChartType, Dataset, FieldKind, FieldProfile, Result,
};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Category count up to which pie charts score well
const PIE_MAX_CATEGORIES: usize = 10;
const HISTOGRAM_BINS: usize = 20;

/// Suggest charts for the given fields (all columns when `None`)
///
/// # Errors
/// Returns error if the dataset is empty or a requested field does not exist
pub fn suggest(dataset: &Dataset, fields: Option<&[String]>) -> Result<ChartReport> {
    let profiles = classify(dataset, None)?;
    let selected = select_profiles(&profiles, fields)?;

    let candidates = match selected.as_slice() {
        [] => Vec::new(),
        [single] => suggest_single(dataset, single),
        [first, second] => {
            let mut pair = suggest_pair(first, second);
            pair.extend(suggest_pair(second, first));
            pair
        }
        many => suggest_many(many),
    };

    let suggestions = dedupe(candidates);
    let recommended = suggestions.first().map(|s| s.chart);
    tracing::debug!(count = suggestions.len(), ?recommended, "Chart suggestions ready");

    Ok(ChartReport {
        suggestions,
        recommended,
    })
}

fn suggestion(
    chart: ChartType,
    score: f64,
    reason: &str,
    fields: Vec<String>,
    config: Option<ChartConfig>,
) -> ChartSuggestion {
    ChartSuggestion {
        chart,
        score,
        reason: reason.to_string(),
        fields,
        config,
    }
}

fn axes(x: &str, y: &str) -> Option<ChartConfig> {
    Some(ChartConfig {
        x: Some(x.to_string()),
        y: Some(y.to_string()),
        ..ChartConfig::default()
    })
}

/// Pie score: flat up to ten categories, then shrinking with every extra one
#[allow(clippy::cast_precision_loss)]
fn pie_score(categories: usize, few: f64, many: f64) -> f64 {
    if categories <= PIE_MAX_CATEGORIES {
        few
    } else {
        many * PIE_MAX_CATEGORIES as f64 / categories as f64
    }
}

/// A column plays the categorical role when it has few distinct values,
/// whatever its kind
const fn is_categorical(profile: &FieldProfile) -> bool {
    profile.low_cardinality
}

fn suggest_single(dataset: &Dataset, profile: &FieldProfile) -> Vec<ChartSuggestion> {
    let name = &profile.name;
    if profile.kind == FieldKind::Numeric {
        let values = dataset.numeric_series(name);
        if values.is_empty() {
            return Vec::new();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut out = vec![
            suggestion(
                ChartType::Histogram,
                0.9,
                "Shows the distribution of numeric values",
                vec![name.clone()],
                Some(ChartConfig {
                    bins: Some(HISTOGRAM_BINS),
                    ..ChartConfig::default()
                }),
            ),
            suggestion(
                ChartType::BoxPlot,
                0.8,
                "Shows spread and outliers",
                vec![name.clone()],
                None,
            ),
        ];
        if min >= 0.0 && max <= 100.0 {
            out.push(suggestion(
                ChartType::Gauge,
                0.7,
                "Values look like percentages",
                vec![name.clone()],
                Some(ChartConfig {
                    min: Some(min),
                    max: Some(max),
                    ..ChartConfig::default()
                }),
            ));
        }
        return out;
    }

    if !is_categorical(profile) {
        return Vec::new();
    }
    let few = profile.distinct_count <= PIE_MAX_CATEGORIES;
    vec![suggestion(
        ChartType::PieChart,
        pie_score(profile.distinct_count, 0.9, 0.6),
        if few {
            "Few categories; shares read well as slices"
        } else {
            "Many categories; slices get small"
        },
        vec![name.clone()],
        None,
    )]
}

/// Suggestions for `first` playing the value role against `second`
fn suggest_pair(first: &FieldProfile, second: &FieldProfile) -> Vec<ChartSuggestion> {
    let (a, b) = (&first.name, &second.name);
    let first_numeric = first.kind == FieldKind::Numeric;
    let second_numeric = second.kind == FieldKind::Numeric;
    let mut out = Vec::new();

    if first_numeric && is_categorical(second) {
        out.push(suggestion(
            ChartType::BarChart,
            0.95,
            "Compares numeric values across categories",
            vec![b.clone(), a.clone()],
            axes(b, a),
        ));
        let few = second.distinct_count <= PIE_MAX_CATEGORIES;
        out.push(suggestion(
            ChartType::PieChart,
            pie_score(second.distinct_count, 0.8, 0.5),
            if few {
                "Few categories; shares read well as slices"
            } else {
                "Too many categories for a pie"
            },
            vec![b.clone(), a.clone()],
            None,
        ));
    }

    if is_categorical(first) && second_numeric {
        out.push(suggestion(
            ChartType::BarChart,
            0.95,
            "Compares numeric values across categories",
            vec![a.clone(), b.clone()],
            axes(a, b),
        ));
    }

    if first_numeric && second_numeric {
        out.push(suggestion(
            ChartType::ScatterChart,
            0.9,
            "Shows the relationship between two numeric variables",
            vec![a.clone(), b.clone()],
            axes(a, b),
        ));
        out.push(suggestion(
            ChartType::LineChart,
            0.7,
            "Works for ordered sequences",
            vec![a.clone(), b.clone()],
            None,
        ));
    }

    if first.kind == FieldKind::Temporal && second_numeric {
        out.push(suggestion(
            ChartType::LineChart,
            0.95,
            "Time series",
            vec![a.clone(), b.clone()],
            axes(a, b),
        ));
        out.push(suggestion(
            ChartType::AreaChart,
            0.85,
            "Time series with emphasis on volume",
            vec![a.clone(), b.clone()],
            None,
        ));
    }

    out
}

fn suggest_many(profiles: &[&FieldProfile]) -> Vec<ChartSuggestion> {
    let categorical: Vec<String> = profiles
        .iter()
        .filter(|p| is_categorical(p))
        .map(|p| p.name.clone())
        .collect();
    let numeric: Vec<String> = profiles
        .iter()
        .filter(|p| p.kind == FieldKind::Numeric)
        .map(|p| p.name.clone())
        .collect();
    let all: Vec<String> = profiles.iter().map(|p| p.name.clone()).collect();

    let mut out = Vec::new();
    if categorical.len() >= 2 {
        out.push(suggestion(
            ChartType::Heatmap,
            0.8,
            "Cross-tabulates two categorical variables",
            categorical[..2].to_vec(),
            None,
        ));
    }

    out.push(suggestion(
        ChartType::PivotTable,
        0.9,
        "Multidimensional breakdown",
        all,
        None,
    ));

    if categorical.len() >= 2 {
        if let Some(measure) = numeric.first() {
            let hierarchy = vec![categorical[0].clone(), categorical[1].clone(), measure.clone()];
            out.push(suggestion(
                ChartType::Treemap,
                0.75,
                "Hierarchical categories sized by a measure",
                hierarchy.clone(),
                None,
            ));
            out.push(suggestion(
                ChartType::Sunburst,
                0.7,
                "Multi-level hierarchy",
                hierarchy,
                None,
            ));
        }
    }

    out
}

/// Keep the best suggestion per chart type and field set, best first
fn dedupe(candidates: Vec<ChartSuggestion>) -> Vec<ChartSuggestion> {
    let mut kept: Vec<ChartSuggestion> = Vec::new();

    for candidate in candidates {
        let key: BTreeSet<&str> = candidate.fields.iter().map(String::as_str).collect();
        let existing = kept.iter().position(|s| {
            s.chart == candidate.chart
                && s.fields.iter().map(String::as_str).collect::<BTreeSet<_>>() == key
        });
        match existing {
            Some(i) if candidate.score > kept[i].score => kept[i] = candidate,
            Some(_) => {}
            None => kept.push(candidate),
        }
    }

    kept.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Value;

    fn sales_with_categories(categories: usize) -> Dataset {
        // Enough rows that the category column stays categorical
        let rows = categories * 4;
        Dataset::from_records((0..rows).map(|i| {
            vec![
                ("region", Value::Text(format!("r{}", i % categories))),
                ("sales", Value::Number((i * 13 % 97) as f64 + 0.5)),
            ]
        }))
    }

    fn score_of(report: &ChartReport, chart: ChartType) -> f64 {
        report
            .suggestions
            .iter()
            .find(|s| s.chart == chart)
            .map(|s| s.score)
            .expect("suggestion present")
    }

    #[test]
    fn test_numeric_and_categorical() {
        let report = suggest(&sales_with_categories(4), None).expect("suggest");

        assert_eq!(report.recommended, Some(ChartType::BarChart));
        // bar suggested from both orders collapses to one
        assert_eq!(
            report.suggestions.iter().filter(|s| s.chart == ChartType::BarChart).count(),
            1
        );
        assert!((score_of(&report, ChartType::PieChart) - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bar_beats_pie_and_pie_decreases() {
        let mut previous = f64::INFINITY;
        for categories in [11, 12, 15, 20] {
            let report = suggest(&sales_with_categories(categories), None).expect("suggest");
            let bar = score_of(&report, ChartType::BarChart);
            let pie = score_of(&report, ChartType::PieChart);
            assert!(bar >= pie);
            assert!(pie < previous);
            previous = pie;
        }
    }

    #[test]
    fn test_single_numeric_field() {
        let data = Dataset::from_numeric_columns(&[("pct", &[10.0, 55.0, 99.0])]);
        let report = suggest(&data, None).expect("suggest");

        assert_eq!(report.recommended, Some(ChartType::Histogram));
        let gauge = report
            .suggestions
            .iter()
            .find(|s| s.chart == ChartType::Gauge)
            .expect("gauge");
        let config = gauge.config.as_ref().expect("config");
        assert_eq!(config.min, Some(10.0));
        assert_eq!(config.max, Some(99.0));
    }

    #[test]
    fn test_temporal_and_numeric() {
        let data = Dataset::from_records((1..=6).map(|d| {
            vec![
                ("day", Value::Text(format!("2024-03-0{d}"))),
                ("visits", Value::Number(f64::from(d) * 100.0)),
            ]
        }));
        let report = suggest(&data, None).expect("suggest");
        assert_eq!(report.recommended, Some(ChartType::LineChart));
        assert!((score_of(&report, ChartType::AreaChart) - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_many_fields() {
        let data = Dataset::from_records((0..20).map(|i| {
            vec![
                ("country", Value::Text(format!("c{}", i % 3))),
                ("product", Value::Text(format!("p{}", i % 4))),
                ("revenue", Value::Number(f64::from(i) * 7.5)),
            ]
        }));
        let report = suggest(&data, None).expect("suggest");

        assert_eq!(report.recommended, Some(ChartType::PivotTable));
        let treemap = report
            .suggestions
            .iter()
            .find(|s| s.chart == ChartType::Treemap)
            .expect("treemap");
        assert_eq!(treemap.fields, vec!["country", "product", "revenue"]);
        assert!(report.suggestions.iter().any(|s| s.chart == ChartType::Heatmap));
        assert!(report.suggestions.iter().any(|s| s.chart == ChartType::Sunburst));
    }

    #[test]
    fn test_identifier_column_is_not_categorical() {
        let data = Dataset::from_records((0..200).map(|i| {
            vec![
                ("order_id", Value::Text(format!("ORD-{i:05}"))),
                ("amount", Value::Number(f64::from(i) * 1.25)),
            ]
        }));
        let report = suggest(&data, None).expect("suggest");

        assert!(report
            .suggestions
            .iter()
            .all(|s| s.chart != ChartType::BarChart && s.chart != ChartType::PieChart));
        assert_ne!(report.recommended, Some(ChartType::BarChart));

        let ids = vec!["order_id".to_string()];
        let single = suggest(&data, Some(ids.as_slice())).expect("suggest");
        assert!(single.suggestions.is_empty());
        assert!(single.recommended.is_none());
    }

    #[test]
    fn test_low_cardinality_numeric_is_categorical() {
        let data = Dataset::from_records((0..40).map(|i| {
            vec![
                ("rating", Value::Number(f64::from(i % 5 + 1))),
                ("price", Value::Number(f64::from(i) * 3.5 + 0.25)),
            ]
        }));
        let report = suggest(&data, None).expect("suggest");

        let bar = report
            .suggestions
            .iter()
            .find(|s| s.chart == ChartType::BarChart)
            .expect("bar");
        assert_eq!(bar.fields, vec!["rating", "price"]);
        assert!(report.suggestions.iter().any(|s| s.chart == ChartType::ScatterChart));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let missing = vec!["nope".to_string()];
        assert!(suggest(&sales_with_categories(3), Some(missing.as_slice())).is_err());
    }
}
