use async_stream::stream;
use futures_util::Stream;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::repo;
use crate::error::{Error, Result};

const LIST_PAGE_SIZE: i64 = 100;

/// Storage-backed operations behind the `/user` endpoints.
#[derive(Clone)]
pub struct UserService {
    pool: SqlitePool,
}

impl UserService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Lazily streams every user in insertion order.
    pub fn list(&self) -> impl Stream<Item = Result<User>> + Send + use<> {
        self.list_in_pages(LIST_PAGE_SIZE)
    }

    /// Reads `page_size` rows at a time, holding a connection only while a page is fetched,
    /// so a slow consumer never starves other requests of the pool.
    fn list_in_pages(&self, page_size: i64) -> impl Stream<Item = Result<User>> + Send + use<> {
        let pool = self.pool.clone();
        stream! {
            let mut after = 0;
            loop {
                let page = match repo::list_users_page(&pool, after, page_size).await {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(Error::from(err));
                        break;
                    }
                };
                let done = (page.len() as i64) < page_size;

                for (rowid, user) in page {
                    after = rowid;
                    yield Ok(user);
                }

                if done {
                    break;
                }
            }
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<User> {
        repo::get_user(&self.pool, id)
            .await?
            .ok_or_else(|| Error::not_found(id))
    }

    /// Replaces the user if its id is known, otherwise inserts it under a fresh id.
    pub async fn create_or_update(&self, mut user: User) -> Result<User> {
        if user.has_id() {
            if let Some(updated) = repo::update_user(&self.pool, &user).await? {
                debug!("Replaced user {}", updated.id);
                return Ok(updated);
            }
            debug!("Unknown user id {}, assigning a new one", user.id);
        }

        user.id = Uuid::new_v4().to_string();
        repo::insert_user(&self.pool, &user).await?;
        debug!("Created user {}", user.id);

        Ok(user)
    }

    /// Replaces the user stored under `id`; any id carried by `user` is discarded.
    pub async fn update(&self, id: &str, mut user: User) -> Result<User> {
        user.id = id.to_string();
        repo::update_user(&self.pool, &user)
            .await?
            .ok_or_else(|| Error::not_found(id))
    }

    pub async fn delete(&self, id: &str) -> Result<User> {
        repo::delete_user(&self.pool, id)
            .await?
            .ok_or_else(|| Error::not_found(id))
    }
}
