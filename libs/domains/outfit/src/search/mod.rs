mod atlas;
mod gateway;

pub use atlas::{
    AtlasVectorSearch, MAX_CANDIDATES, MAX_TOP_K, VectorIndexDefinition, VectorSearchSettings,
};
pub use gateway::SimilaritySearch;

#[cfg(test)]
pub use gateway::MockSimilaritySearch;
