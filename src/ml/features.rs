use crate::structs::{Dataset, DatasenseError, FeatureMatrix, NormalizedFeatures, Result};

impl FeatureMatrix {
    /// Extract a numeric matrix over `fields`, keeping only complete rows
    ///
    /// # Errors
    /// Returns error if no fields are given or no row has every field numeric
    pub fn from_dataset(dataset: &Dataset, fields: &[String]) -> Result<Self> {
        if fields.is_empty() {
            return Err(DatasenseError::Ml("No numeric columns found".into()));
        }

        let mut data = Vec::new();
        let mut row_indices = Vec::new();

        for (row_idx, row) in dataset.rows.iter().enumerate() {
            let features: Option<Vec<f64>> = fields
                .iter()
                .map(|f| row.get(f).and_then(crate::structs::Value::as_number))
                .collect();

            if let Some(features) = features {
                data.push(features);
                row_indices.push(row_idx);
            }
        }

        if data.is_empty() {
            return Err(DatasenseError::Ml(
                "No complete rows with numeric data".into(),
            ));
        }

        Ok(Self {
            names: fields.to_vec(),
            data,
            row_indices,
        })
    }

    /// Normalize features using min-max scaling to [0, 1]
    #[must_use]
    pub fn normalize(&self) -> NormalizedFeatures {
        let mut mins = vec![f64::MAX; self.n_features()];
        let mut maxs = vec![f64::MIN; self.n_features()];

        // Find min/max for each feature
        for row in &self.data {
            for (i, &val) in row.iter().enumerate() {
                mins[i] = mins[i].min(val);
                maxs[i] = maxs[i].max(val);
            }
        }

        let normalized_data: Vec<Vec<f64>> = self
            .data
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, &val)| {
                        let range = maxs[i] - mins[i];
                        if range == 0.0 {
                            0.5 // Constant column
                        } else {
                            (val - mins[i]) / range
                        }
                    })
                    .collect()
            })
            .collect();

        NormalizedFeatures {
            names: self.names.clone(),
            data: normalized_data,
            row_indices: self.row_indices.clone(),
            mins,
            maxs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Value;

    fn create_test_dataset() -> Dataset {
        Dataset::from_records(vec![
            vec![("name", Value::Text("a".into())), ("x", Value::Number(1.0)), ("y", Value::Number(10.0))],
            vec![("name", Value::Text("b".into())), ("x", Value::Number(2.0)), ("y", Value::Null)],
            vec![("name", Value::Text("c".into())), ("x", Value::Number(3.0)), ("y", Value::Number(30.0))],
        ])
    }

    #[test]
    fn test_feature_extraction_keeps_complete_rows() {
        let data = create_test_dataset();
        let features =
            FeatureMatrix::from_dataset(&data, &["x".into(), "y".into()]).expect("extract features");

        assert_eq!(features.n_samples(), 2);
        assert_eq!(features.n_features(), 2);
        assert_eq!(features.row_indices, vec![0, 2]);
        assert_eq!(features.column(1), Some(vec![10.0, 30.0]));
    }

    #[test]
    fn test_no_fields_is_error() {
        assert!(FeatureMatrix::from_dataset(&create_test_dataset(), &[]).is_err());
        assert!(FeatureMatrix::from_dataset(&create_test_dataset(), &["name".into()]).is_err());
    }

    #[test]
    fn test_normalization() {
        let data = create_test_dataset();
        let features = FeatureMatrix::from_dataset(&data, &["x".into()]).expect("extract features");
        let normalized = features.normalize();

        // First value should be 0.0, last should be 1.0
        assert!((normalized.data[0][0] - 0.0).abs() < 0.01);
        assert!((normalized.data[2][0] - 1.0).abs() < 0.01);
        assert!((normalized.denormalize(0, 0.5) - 2.0).abs() < 0.01);
    }
}
