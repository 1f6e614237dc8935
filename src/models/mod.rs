mod url;

pub use url::{
    BatchEntry, BatchItem, BatchResult, SavedEntry, ShortenRequest, ShortenResponse,
    StatsSnapshot, UrlMapping, UserUrl,
};
