//! Projects: a named container for one conversation with the builder.

use super::now_timestamp;
use anyhow::Result;
use rand::seq::IndexedRandom;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brave", "bright", "calm", "clever", "cosmic", "crisp", "curious", "daring",
    "eager", "fancy", "gentle", "golden", "happy", "humble", "jolly", "keen", "lively", "lucky",
    "mellow", "mighty", "nimble", "noble", "proud", "quick", "quiet", "rapid", "shiny", "silent",
    "swift", "tidy", "vivid", "witty", "young", "zesty",
];

const NOUNS: &[&str] = &[
    "anchor", "badger", "beacon", "breeze", "canyon", "comet", "coral", "falcon", "forest",
    "garden", "glacier", "harbor", "island", "jungle", "lantern", "meadow", "meteor", "otter",
    "panda", "pebble", "phoenix", "planet", "river", "rocket", "sparrow", "summit", "thunder",
    "tiger", "valley", "voyage", "walrus", "willow", "wizard", "zephyr",
];

/// Random two-word kebab-case project name, e.g. `swift-otter`.
pub fn generate_slug() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("new");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("project");
    format!("{adjective}-{noun}")
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

pub fn create_project(conn: &Connection, name: &str) -> Result<Project> {
    let now = now_timestamp();
    let project = Project {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO projects (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![project.id, project.name, project.created_at, project.updated_at],
    )?;
    Ok(project)
}

pub fn get_project(conn: &Connection, id: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT id, name, created_at, updated_at FROM projects WHERE id = ?1",
            params![id],
            from_row,
        )
        .optional()?;
    Ok(project)
}

/// All projects, newest first.
pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at, updated_at FROM projects
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let projects = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

/// Bump `updated_at`, e.g. when a new message arrives.
pub fn touch_project(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
        params![now_timestamp(), id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn slug_is_two_kebab_words() {
        for _ in 0..20 {
            let slug = generate_slug();
            let parts: Vec<&str> = slug.split('-').collect();
            assert_eq!(parts.len(), 2, "{slug}");
            assert!(ADJECTIVES.contains(&parts[0]));
            assert!(NOUNS.contains(&parts[1]));
        }
    }

    #[test]
    fn create_get_and_list() {
        let store = Store::open_in_memory().unwrap();
        let first = store.with(|c| create_project(c, "first")).unwrap();
        let second = store.with(|c| create_project(c, "second")).unwrap();

        let fetched = store.with(|c| get_project(c, &first.id)).unwrap();
        assert_eq!(fetched, Some(first.clone()));
        assert_eq!(store.with(|c| get_project(c, "missing")).unwrap(), None);

        let names: Vec<String> = store
            .with(list_projects)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, [second.name, first.name]);
    }
}
