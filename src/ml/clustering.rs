use crate::ml::classify::{classify, numeric_fields, select_profiles};
use crate::structs::{
    ClusterOptions, ClusterResult, Dataset, DatasenseError, FeatureMatrix, NormalizedFeatures,
    Result,
};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::Array2;

/// Largest k picked automatically
const MAX_AUTO_K: usize = 10;

/// Cluster the complete numeric rows of a dataset
///
/// Too few complete rows for the requested k gives an empty result.
///
/// # Errors
/// Returns error if the dataset is empty, a requested field does not exist,
/// or k-means itself fails
pub fn cluster(dataset: &Dataset, options: &ClusterOptions) -> Result<ClusterResult> {
    let profiles = classify(dataset, None)?;
    let selected = select_profiles(&profiles, options.fields.as_deref())?;
    let fields = numeric_fields(&selected);

    let Ok(matrix) = FeatureMatrix::from_dataset(dataset, &fields) else {
        tracing::debug!("No complete numeric rows to cluster");
        return Ok(ClusterResult::empty(fields));
    };
    let features = matrix.normalize();

    let k = if options.k == 0 {
        suggest_k(&features, MAX_AUTO_K)
    } else {
        options.k
    };
    if features.n_samples() < k || features.n_samples() < 2 {
        tracing::debug!(samples = features.n_samples(), k, "Too few samples to cluster");
        return Ok(ClusterResult::empty(fields));
    }

    let result = kmeans(&features, k)?;
    tracing::info!(k, samples = features.n_samples(), "Clustering complete");
    Ok(result)
}

/// Perform K-means clustering on normalized features
///
/// # Errors
/// Returns error if k is zero, exceeds the sample count, or clustering fails
pub fn kmeans(features: &NormalizedFeatures, k: usize) -> Result<ClusterResult> {
    let n_samples = features.n_samples();

    if k == 0 {
        return Err(DatasenseError::Ml("k must be at least 1".into()));
    }
    if n_samples < k {
        return Err(DatasenseError::Ml(format!(
            "Cannot create {k} clusters with only {n_samples} samples"
        )));
    }

    let flat_data: Vec<f64> = features.to_flat();
    let array = Array2::from_shape_vec((n_samples, features.n_features()), flat_data)
        .map_err(|e| DatasenseError::Ml(format!("Failed to create array: {e}")))?;

    let dataset = DatasetBase::from(array);

    let model = KMeans::params(k)
        .max_n_iterations(100)
        .tolerance(1e-4)
        .fit(&dataset)
        .map_err(|e| DatasenseError::Ml(format!("K-means failed: {e}")))?;

    let predictions = model.predict(&dataset);
    let labels: Vec<usize> = predictions.iter().copied().collect();

    let mut sizes = vec![0usize; k];
    let mut cluster_members = vec![Vec::new(); k];
    for (sample, &cluster_id) in labels.iter().enumerate() {
        sizes[cluster_id] += 1;
        cluster_members[cluster_id].push(features.row_indices[sample]);
    }

    let centroids = model
        .centroids()
        .outer_iter()
        .map(|row| row.to_vec())
        .collect();

    Ok(ClusterResult {
        fields: features.names.clone(),
        labels,
        k,
        sizes,
        cluster_members,
        centroids,
    })
}

/// Square root of the sample count, clamped to `[2, max_k]`
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn suggest_k(features: &NormalizedFeatures, max_k: usize) -> usize {
    let n = features.n_samples();
    let suggested = (n as f64).sqrt().round() as usize;
    suggested.clamp(2, max_k.max(2))
}
