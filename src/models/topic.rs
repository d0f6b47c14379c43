use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub query: String,
    pub icon: String,
}

/// Body of `POST /topics`. Missing fields get a fresh id and the default icon.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTopic {
    #[serde(default)]
    pub id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub icon: Option<String>,
}

pub const DEFAULT_TOPIC_ICON: &str = "📰";

impl NewTopic {
    pub fn into_topic(self) -> Topic {
        Topic {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            query: self.query.trim().to_string(),
            icon: self
                .icon
                .filter(|icon| !icon.is_empty())
                .unwrap_or_else(|| DEFAULT_TOPIC_ICON.to_string()),
        }
    }
}
