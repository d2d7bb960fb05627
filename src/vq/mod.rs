mod codebook;
mod kmeans;

pub use codebook::{Codebook, CodebookError, ModelLoad, ModelSave};
pub use kmeans::{KMeans, TrainError, TrainedCluster};
pub(crate) use kmeans::squared_distance;
