use thiserror::Error;

/// Precondition failures of the data pipeline.
///
/// These are returned instead of partially-built output: a
/// dataset with mixed image sizes yields `NonUniformShape`, never
/// a mis-shaped array.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    #[error("No uniform shape: '{path}' is {found_width}x{found_height}, expected {width}x{height}")]
    NonUniformShape {
        path: String,
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },

    #[error("Image has no strictly positive samples, its mean intensity is undefined")]
    NoPositiveSamples,

    #[error("Dataset '{0}' contains no samples")]
    EmptyDataset(String),

    #[error("Sample '{file_name}' has no position for landmark '{landmark}'")]
    MissingLandmark { file_name: String, landmark: String },

    #[error("No file entry for sample '{0}'")]
    MissingFileEntry(String),

    #[error("Cannot parse coordinate '{value}' in column '{column}'")]
    InvalidCoordinate { column: String, value: String },

    #[error("Vocabulary '{0}' names no landmarks")]
    EmptyVocabulary(String),

    #[error("Table '{path}' has no '{column}' column")]
    MissingColumn { path: String, column: String },

    #[error("Binning factor {factor} is invalid for a {width}x{height} image")]
    InvalidBinning { factor: u32, width: u32, height: u32 },

    #[error("Zoom factor must be positive and finite, got {0}")]
    InvalidZoom(f64),

    #[error("Noise standard deviation must be finite and non-negative, got {0}")]
    InvalidNoise(f32),

    #[error("Validation fraction must lie in [0, 1], got {0}")]
    InvalidFraction(f64),

    #[error("Image of {width}x{height} is too small, the network needs at least {min}x{min}")]
    ImageTooSmall { width: u32, height: u32, min: u32 },

    #[error("Unsupported image layout in '{0}'")]
    UnsupportedImage(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
