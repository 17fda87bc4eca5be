//! Shared fixtures for the integration tests.
//!
//! These tests need a running MongoDB. Point LODESTONE_MONGODB_URI at it and
//! run with `--ignored`. Every test works in its own throwaway database.

#![allow(dead_code)]

use bson::oid::ObjectId;
use lodestone_mongodb::{relations, Connection, Model, ModelBase, Relation, Settings};
use serde::{Deserialize, Serialize};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connect to a fresh database named after the test
pub async fn connect(test: &str) -> anyhow::Result<Connection> {
    init_tracing();
    let mut settings = Settings::from_env()?;
    settings.database = format!("lodestone_it_{}_{}", test, ObjectId::new().to_hex());
    Ok(Connection::from_settings(&settings).await?)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(flatten)]
    pub base: ModelBase,
    pub name: String,
}

impl Model for Author {
    fn type_name() -> &'static str {
        "Author"
    }

    fn id(&self) -> Option<ObjectId> {
        self.base.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(flatten)]
    pub base: ModelBase,
    pub post_id: Option<ObjectId>,
    pub text: String,
}

impl Model for Comment {
    fn type_name() -> &'static str {
        "Comment"
    }

    fn id(&self) -> Option<ObjectId> {
        self.base.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(flatten)]
    pub base: ModelBase,
    pub title: String,
    pub views: i32,
    pub author_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Vec<Comment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<i32>,
}

impl Model for Post {
    fn type_name() -> &'static str {
        "Post"
    }

    fn id(&self) -> Option<ObjectId> {
        self.base.id
    }

    fn relations() -> &'static [Relation] {
        relations![
            "Author" => { local: "author_id", foreign: "_id", just_one: true },
            "Comment" => { local: "_id", foreign: "post_id" },
            "Replies" => { local: "_id", foreign: "post_id", count: true, from: "comments" },
        ]
    }
}

pub fn post(title: &str, views: i32) -> Post {
    Post {
        title: title.to_string(),
        views,
        ..Post::default()
    }
}
