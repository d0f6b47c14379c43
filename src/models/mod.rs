mod article;
mod topic;

pub use article::{dedupe_citations, word_count, Article, ArticleState, NewArticle};
pub use topic::{NewTopic, Topic};
