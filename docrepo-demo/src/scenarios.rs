//! The demo scenarios, each a single repository call followed by a read of
//! the resulting state.

use docrepo::{
    bson::{Bson, oid::ObjectId, ser::serialize_to_bson},
    document::parse_object_id,
    error::{RepositoryError, RepositoryResult},
    prelude::{StoreBackend, TypedRepository},
    query::{Filter, Update},
};
use tracing::info;

use crate::models::{Todo, User, UserAddress};

pub type Users<B> = TypedRepository<B, User>;

pub const DEFAULT_USERNAME: &str = "emmanuel";
pub const DEFAULT_PHONES: [&str; 2] = ["0955404864", "0973827172"];
pub const DEFAULT_PHYSICAL_ADDRESS: &str = "chilenje south";
pub const DEFAULT_ROAD: &str = "kalomo rd";
pub const DEFAULT_TODO: &str = "talk to madam about the cream";

pub async fn add_user<B: StoreBackend>(users: &Users<B>, username: &str) -> RepositoryResult<User> {
    users.insert_one(&User::new(username)).await
}

/// Inserts the five demo users as one ordered batch.
pub async fn add_many_users<B: StoreBackend>(users: &Users<B>) -> RepositoryResult<Vec<User>> {
    let batch = ["naile", "kamuel", "nickolas", "esnart", "samuel"].map(|username| User {
        id: Some(ObjectId::new()),
        phone: (username == "naile").then(|| vec!["0945934878".to_string()]),
        ..User::new(username)
    });

    let inserted = users.insert_many(&batch).await?;

    for user in &inserted {
        info!(id = ?user.id, username = %user.username, "inserted user");
    }

    Ok(inserted)
}

/// Appends each phone number to the user's `phone` array.
pub async fn add_phone<B: StoreBackend>(users: &Users<B>, user_id: &str, phones: &[String]) -> RepositoryResult<User> {
    users
        .update_by_id(user_id, Update::push_each("phone", phones.iter().map(String::as_str)))
        .await
}

pub async fn set_address<B: StoreBackend>(
    users: &Users<B>,
    user_id: &str,
    address: UserAddress,
) -> RepositoryResult<UserAddress> {
    let address = serialize_to_bson(&address)?;
    let user = users.update_by_id(user_id, Update::set("address", address)).await?;

    Ok(user.address)
}

pub async fn add_todo<B: StoreBackend>(users: &Users<B>, user_id: &str, text: &str) -> RepositoryResult<Vec<Todo>> {
    let todo = Todo {
        user_id: parse_object_id(user_id)?,
        text: text.to_string(),
        done: false,
        comments: vec![],
    };

    let user = users
        .update_by_id(user_id, Update::push("todos", serialize_to_bson(&todo)?))
        .await?;
    info!(count = user.todos.len(), "todos after insert");

    Ok(user.todos)
}

/// Removes the todo at `index`. The element is unset first, which leaves a
/// `null` in its slot, and the `null` is then pulled so the array stays dense.
pub async fn delete_todo<B: StoreBackend>(users: &Users<B>, user_id: &str, index: usize) -> RepositoryResult<Vec<Todo>> {
    ensure_todo_exists(users, user_id, index).await?;

    users
        .untyped()
        .update_by_id(user_id, Update::unset(format!("todos.{index}")))
        .await?;

    let user = users
        .update_by_id(user_id, Update::pull("todos", Bson::Null))
        .await?;
    info!(count = user.todos.len(), "todos after delete");

    Ok(user.todos)
}

pub async fn mark_done<B: StoreBackend>(users: &Users<B>, user_id: &str, index: usize) -> RepositoryResult<Vec<Todo>> {
    ensure_todo_exists(users, user_id, index).await?;

    let user = users
        .update_by_id(user_id, Update::set(format!("todos.{index}.done"), true))
        .await?;

    Ok(user.todos)
}

pub async fn find_user<B: StoreBackend>(users: &Users<B>, username: &str) -> RepositoryResult<User> {
    users.find_one(Filter::eq("username", username)).await
}

/// Fails unless the user has a todo at `index`. Writing past the end of an
/// array would pad it with `null`s instead.
async fn ensure_todo_exists<B: StoreBackend>(users: &Users<B>, user_id: &str, index: usize) -> RepositoryResult<()> {
    let count = users.find_by_id(user_id).await?.todos.len();

    if index >= count {
        return Err(RepositoryError::invalid_document(format!(
            "todo index {index} is out of range, the user has {count} todos"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo::memory::InMemoryStore;
    use pretty_assertions::assert_eq;

    async fn seeded(store: &InMemoryStore) -> (Users<&InMemoryStore>, String) {
        let users = Users::new(store, "mongolang");
        let user = add_user(&users, DEFAULT_USERNAME).await.unwrap();
        let id = user.id.unwrap().to_hex();
        (users, id)
    }

    #[tokio::test]
    async fn test_add_user() {
        let store = InMemoryStore::new();
        let (users, id) = seeded(&store).await;

        let user = users.find_by_id(&id).await.unwrap();
        assert_eq!(user.username, DEFAULT_USERNAME);
    }

    #[tokio::test]
    async fn test_add_many_users() {
        let store = InMemoryStore::new();
        let users = Users::new(&store, "mongolang");

        let inserted = add_many_users(&users).await.unwrap();

        assert_eq!(
            inserted.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            vec!["naile", "kamuel", "nickolas", "esnart", "samuel"]
        );
        assert_eq!(inserted[0].phone, Some(vec!["0945934878".to_string()]));
        assert_eq!(inserted[1].phone, None);

        let esnart = find_user(&users, "esnart").await.unwrap();
        assert_eq!(esnart.id, inserted[3].id);
    }

    #[tokio::test]
    async fn test_add_phone_appends_each_number() {
        let store = InMemoryStore::new();
        let (users, id) = seeded(&store).await;
        let phones = DEFAULT_PHONES.map(String::from);

        add_phone(&users, &id, &phones).await.unwrap();
        let user = add_phone(&users, &id, &phones[..1]).await.unwrap();

        assert_eq!(
            user.phone,
            Some(vec!["0955404864".to_string(), "0973827172".to_string(), "0955404864".to_string()])
        );
    }

    #[tokio::test]
    async fn test_set_address() {
        let store = InMemoryStore::new();
        let (users, id) = seeded(&store).await;
        let address = UserAddress {
            physical_address: DEFAULT_PHYSICAL_ADDRESS.into(),
            road: DEFAULT_ROAD.into(),
        };

        let stored = set_address(&users, &id, address.clone()).await.unwrap();
        assert_eq!(stored, address);
    }

    #[tokio::test]
    async fn test_todo_lifecycle() {
        let store = InMemoryStore::new();
        let (users, id) = seeded(&store).await;

        for text in ["first", "second", "third"] {
            add_todo(&users, &id, text).await.unwrap();
        }

        let todos = mark_done(&users, &id, 2).await.unwrap();
        assert_eq!(todos.iter().map(|t| t.done).collect::<Vec<_>>(), vec![false, false, true]);

        let todos = delete_todo(&users, &id, 1).await.unwrap();
        assert_eq!(todos.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(), vec!["first", "third"]);
        assert!(todos[1].done);
    }

    #[tokio::test]
    async fn test_todo_index_out_of_range() {
        let store = InMemoryStore::new();
        let (users, id) = seeded(&store).await;
        add_todo(&users, &id, DEFAULT_TODO).await.unwrap();

        let err = mark_done(&users, &id, 1).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidDocument(_)));

        let err = delete_todo(&users, &id, 5).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidDocument(_)));

        assert_eq!(users.find_by_id(&id).await.unwrap().todos.len(), 1);
    }

    #[tokio::test]
    async fn test_scenarios_reject_malformed_ids() {
        let store = InMemoryStore::new();
        let (users, _) = seeded(&store).await;

        let err = add_todo(&users, "5f7ef973", DEFAULT_TODO).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidIdFormat(_)));

        let err = set_address(&users, "xyz", UserAddress::default()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidIdFormat(_)));
    }

    #[tokio::test]
    async fn test_find_user_missing() {
        let store = InMemoryStore::new();
        let users = Users::new(&store, "mongolang");

        assert!(find_user(&users, "nobody").await.unwrap_err().is_not_found());
    }
}
