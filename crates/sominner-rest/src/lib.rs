pub mod api;
pub mod client;
pub mod error;
pub mod memory;
pub mod query;

pub use api::{decode_rows, DataApi, DataApiExt, UserScoped};
pub use client::{parse_rows, Credential, RestClient};
pub use error::{RestError, Result};
pub use memory::{MemoryDataApi, RecordedCall};
pub use query::{Embed, Filter, Op, Order, Query, Returning, Select};

pub use tokio_util::sync::CancellationToken;
