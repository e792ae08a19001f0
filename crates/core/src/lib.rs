mod batch;
mod config;
mod document;
mod error;
mod exif_reader;
mod extractor;
mod generator;
mod markup;
mod model;
mod relaxed;
mod scanner;
mod sorter;
mod writer;

pub use batch::{run_batch, AlbumReport, AlbumStatus, BatchReport, BatchStats};
pub use config::{app_paths, load_config, save_config_if_absent, AppPaths, PipelineConfig};
pub use document::{build_album_document, encode_album_document, render_album_document};
pub use error::PipelineError;
pub use exif_reader::{inspect_capture_time, read_capture_time, MetadataError};
pub use extractor::{
    extract_all, extract_document, extract_unique_tag_names, load_corpus, SourceDocument,
};
pub use generator::{create_album, generate_album, read_image_records, AlbumOutcome};
pub use markup::{decode_album_document, MarkupError};
pub use model::{
    AlbumDocument, AlbumDraft, AlbumHeader, AlbumRef, AlbumRefError, GeoTag, ImageRecord,
    PhotoDeclaration, PhotoWithTags, Row,
};
pub use relaxed::{normalize_relaxed_literal, parse_geo_tags, LiteralError, TagParseError};
pub use scanner::{scan_images, IMAGE_EXTENSIONS};
pub use sorter::{natural_cmp, sort_chronologically};
pub use writer::{write_if_absent, WriteOutcome};
