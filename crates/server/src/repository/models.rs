use git_http::{Repository, Visibility};
use serde::Serialize;

#[derive(Clone, Debug, sqlx::FromRow, Serialize)]
pub struct RepositoryRecord {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub visibility: String,
    pub created_at: String,
}

impl TryFrom<RepositoryRecord> for Repository {
    type Error = anyhow::Error;

    fn try_from(record: RepositoryRecord) -> anyhow::Result<Self> {
        let visibility: Visibility = record.visibility.parse()?;
        Ok(Repository {
            id: record.id,
            owner: record.owner,
            name: record.name,
            visibility,
        })
    }
}
