//! Typed views of the stock `posts` and `projects` records.
//!
//! Records store metadata as a generic [`Metadata`](crate::validate::Metadata)
//! map so any configured kind works. Code that knows which kind it is
//! reading can convert to a struct instead:
//!
//! ```ignore
//! let post: Post = record.metadata_as()?;
//! println!("{} ({})", post.title, record.read_time());
//! ```

use crate::registry::Record;
use serde::Deserialize;
use serde::de::DeserializeOwned;

impl Record {
    /// Deserialize the validated metadata into `T`.
    ///
    /// Numbers are `f64` and dates are the authored strings; use
    /// [`Record::date`] for parsed timestamps.
    pub fn metadata_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(&self.metadata)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub title: String,
    pub publish_date: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub thumbnail: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub year: f64,
    pub study_case: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub thumbnail: String,
    pub link_live: Option<String>,
    pub link_github: Option<String>,
}
