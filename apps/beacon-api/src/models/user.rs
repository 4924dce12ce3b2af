use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::users;

/// The slice of a user account the realtime core needs.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    /// Home community chosen at registration.
    pub community: String,
}
