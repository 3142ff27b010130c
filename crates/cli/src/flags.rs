use clap::ValueEnum;

/// Which artifact a `dendrogram` export is built from
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum DendrogramSource {
    /// Feature embeddings, labelled by short signature
    Features,
    /// Entity embeddings
    Entities,
    /// Feature trace embeddings
    Traces,
    /// Weighted access-trace similarity of entities
    Similarity,
}

impl DendrogramSource {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            DendrogramSource::Features => "features",
            DendrogramSource::Entities => "entities",
            DendrogramSource::Traces => "traces",
            DendrogramSource::Similarity => "similarity",
        }
    }
}
