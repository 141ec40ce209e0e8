//! Input data structures: delimited tables, reference ontology, sample
//! metadata and molecular-network clusters.

mod network;
mod reference;
mod sample;
mod table;

pub use network::{
    ClusterRecord, Network, CLUSTER_INDEX_COLUMN, DEFAULT_GROUPS_COLUMN, SOURCE_FILES_COLUMN,
    SOURCE_FILE_DELIMITER,
};
pub use reference::{
    ReferenceFile, ReferenceMetadata, SampleTypeFilter, SAMPLE_NAME_COLUMN, SAMPLE_TYPE_COLUMNS,
};
pub use sample::{SampleMetadata, GROUP_COLUMN};
pub use table::{
    delimiter_for, load_metadata, strip_spectral_extension, MetadataKind, Table, FILENAME_COLUMN,
};
