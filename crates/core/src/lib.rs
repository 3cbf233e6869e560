pub mod config;
pub mod event;
pub mod path;
pub mod request;
pub mod title;

pub use config::SearchConfig;
pub use event::{
  CompleteInfo, ErrorInfo, ErrorKind, PathFound, ProgressInfo, ResolvedTitles, ResolvingInfo, SearchEvent,
  SearchStats, StartInfo,
};
pub use path::{jaccard_distance, GraphEdge, GraphNode, MergedGraph, Path, PathError, PathSet};
pub use request::{RequestError, SearchRequest, ValidatedRequest, MAX_PATHS, MAX_TERM_LEN};
pub use title::{Title, TitleError, MAX_TITLE_BYTES};
