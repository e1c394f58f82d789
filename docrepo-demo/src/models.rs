//! Documents stored by the demo scenarios.

use docrepo::{bson::oid::ObjectId, document::Model};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    #[serde(default)]
    pub address: UserAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub todos: Vec<Todo>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }
}

impl Model for User {
    fn collection_name() -> &'static str {
        "users"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAddress {
    pub physical_address: String,
    pub road: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub user_id: ObjectId,
    pub text: String,
    pub done: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub user_id: ObjectId,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo::{bson::doc, document::ModelExt};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_user_document_shape() {
        let document = User::new("emmanuel").to_document().unwrap();

        assert_eq!(
            document,
            doc! {
                "username": "emmanuel",
                "address": { "physical_address": "", "road": "" },
            }
        );
    }

    #[test]
    fn test_user_decodes_with_missing_optional_fields() {
        let id = ObjectId::new();
        let user = User::from_document(doc! { "_id": id, "username": "kamuel" }).unwrap();

        assert_eq!(user.id, Some(id));
        assert_eq!(user.address, UserAddress::default());
        assert_eq!(user.phone, None);
        assert!(user.todos.is_empty());
    }

    #[test]
    fn test_todo_round_trip_through_document() {
        let author = ObjectId::new();
        let user = User {
            todos: vec![Todo {
                user_id: author,
                text: "talk to madam about the cream".into(),
                done: false,
                comments: vec![Comment { user_id: author, content: "soon".into() }],
            }],
            ..User::new("naile")
        };

        let decoded = User::from_document(user.to_document().unwrap()).unwrap();
        assert_eq!(decoded, user);
    }
}
