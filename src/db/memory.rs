//! A [`Db`] that keeps everything in process memory. It enforces the
//! same uniqueness and client-reference rules as the Postgres schema,
//! which is what the HTTP tests rely on.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{ready, BoxFuture, FutureExt};
use uuid::Uuid;

use super::Db;
use crate::auth::{Credential, Identity};
use crate::body::{ActivityLevel, BodyComposition, GoalDiet};
use crate::client::{Client, ClientDetails, ClientId};
use crate::errors::BackendError;
use crate::nutrition::NutritionEntry;
use crate::training::{SessionUpdate, TrainingSession};

#[derive(Default)]
struct State {
    credentials: HashMap<String, Credential>,
    logins: HashMap<Uuid, String>,
    exercises: Vec<String>,
    activity_levels: Vec<ActivityLevel>,
    goal_diets: Vec<GoalDiet>,
    clients: BTreeMap<ClientId, Client>,
    sessions: Vec<TrainingSession>,
    body_compositions: Vec<BodyComposition>,
    nutrition: Vec<NutritionEntry>,
}

impl State {
    fn require_client(&self, id: &ClientId) -> Result<(), BackendError> {
        if self.clients.contains_key(id) {
            Ok(())
        } else {
            Err(BackendError::UnknownClient)
        }
    }
}

#[derive(Default)]
pub struct MemoryDb {
    state: RwLock<State>,
}

impl MemoryDb {
    pub fn new() -> Self {
        MemoryDb::default()
    }

    /// Fills the lookup tables with the same rows the migrations seed.
    pub fn with_default_lookups() -> Self {
        let db = MemoryDb::new();

        if let Ok(mut state) = db.state.write() {
            state.activity_levels = vec![
                ActivityLevel::new("sedentary", 1.2),
                ActivityLevel::new("lightly_active", 1.375),
                ActivityLevel::new("moderately_active", 1.55),
                ActivityLevel::new("very_active", 1.725),
                ActivityLevel::new("extra_active", 1.9),
            ];
            state.goal_diets = vec![
                GoalDiet::new("cut", -500.0, 40.0, 30.0, 30.0),
                GoalDiet::new("maintain", 0.0, 30.0, 40.0, 30.0),
                GoalDiet::new("bulk", 300.0, 30.0, 45.0, 25.0),
            ];
        }

        db
    }

    fn read(&self) -> Result<RwLockReadGuard<State>, BackendError> {
        self.state.read().map_err(|_| BackendError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<State>, BackendError> {
        self.state.write().map_err(|_| BackendError::LockPoisoned)
    }

    fn with_read<T, F>(&self, f: F) -> BoxFuture<Result<T, BackendError>>
    where
        T: Send + 'static,
        F: FnOnce(&State) -> Result<T, BackendError>,
    {
        ready(self.read().and_then(|state| f(&state))).boxed()
    }

    fn with_write<T, F>(&self, f: F) -> BoxFuture<Result<T, BackendError>>
    where
        T: Send + 'static,
        F: FnOnce(&mut State) -> Result<T, BackendError>,
    {
        ready(self.write().and_then(|mut state| f(&mut state))).boxed()
    }
}

fn newest_first(sessions: &mut Vec<TrainingSession>) {
    sessions.sort_by(|a, b| {
        b.date()
            .cmp(&a.date())
            .then_with(|| a.exercise().cmp(b.exercise()))
            .then_with(|| a.id().cmp(b.id()))
    });
}

impl Db for MemoryDb {
    fn retrieve_credential(
        &self,
        username: &str,
    ) -> BoxFuture<Result<Option<Credential>, BackendError>> {
        self.with_read(|state| Ok(state.credentials.get(username).cloned()))
    }

    fn create_credential(&self, credential: Credential) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(move |state| {
            if state.credentials.contains_key(&credential.username) {
                return Err(BackendError::UsernameAlreadyExists);
            }

            state
                .credentials
                .insert(credential.username.clone(), credential);

            Ok(())
        })
    }

    fn create_login(&self, username: &str) -> BoxFuture<Result<Uuid, BackendError>> {
        self.with_write(|state| {
            let token = Uuid::new_v4();
            state.logins.insert(token, username.to_owned());

            Ok(token)
        })
    }

    fn lookup_login(&self, token: &Uuid) -> BoxFuture<Result<Option<Identity>, BackendError>> {
        self.with_read(|state| {
            Ok(state
                .logins
                .get(token)
                .and_then(|username| state.credentials.get(username))
                .map(|c| Identity::new(c.username.clone(), c.name.clone())))
        })
    }

    fn delete_login(&self, token: &Uuid) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(|state| {
            state.logins.remove(token);

            Ok(())
        })
    }

    fn retrieve_exercises(&self) -> BoxFuture<Result<Vec<String>, BackendError>> {
        self.with_read(|state| {
            let mut names = state.exercises.clone();
            names.sort();

            Ok(names)
        })
    }

    fn insert_exercise(&self, name: &str) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(|state| {
            if state.exercises.iter().any(|e| e == name) {
                return Err(BackendError::ExerciseAlreadyExists);
            }

            state.exercises.push(name.to_owned());

            Ok(())
        })
    }

    fn retrieve_activity_levels(&self) -> BoxFuture<Result<Vec<ActivityLevel>, BackendError>> {
        self.with_read(|state| Ok(state.activity_levels.clone()))
    }

    fn retrieve_goal_diets(&self) -> BoxFuture<Result<Vec<GoalDiet>, BackendError>> {
        self.with_read(|state| Ok(state.goal_diets.clone()))
    }

    fn retrieve_clients(&self) -> BoxFuture<Result<Vec<Client>, BackendError>> {
        self.with_read(|state| Ok(state.clients.values().cloned().collect()))
    }

    fn retrieve_client(&self, id: &ClientId) -> BoxFuture<Result<Option<Client>, BackendError>> {
        self.with_read(|state| Ok(state.clients.get(id).cloned()))
    }

    fn insert_client(&self, client: Client) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(move |state| {
            if state.clients.contains_key(client.id()) {
                return Err(BackendError::ClientAlreadyExists);
            }

            state.clients.insert(client.id().clone(), client);

            Ok(())
        })
    }

    fn update_client(
        &self,
        id: &ClientId,
        details: ClientDetails,
    ) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(move |state| match state.clients.get_mut(id) {
            Some(client) => {
                client.details = details;
                Ok(())
            }
            None => Err(BackendError::NonExistentClient(id.to_string())),
        })
    }

    fn delete_client(&self, id: &ClientId) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(|state| {
            if state.clients.remove(id).is_none() {
                return Err(BackendError::NonExistentClient(id.to_string()));
            }

            state.sessions.retain(|s| &s.client_id != id);
            state.body_compositions.retain(|b| &b.client_id != id);
            state.nutrition.retain(|n| &n.client_id != id);

            Ok(())
        })
    }

    fn count_clients(&self) -> BoxFuture<Result<i64, BackendError>> {
        self.with_read(|state| Ok(state.clients.len() as i64))
    }

    fn retrieve_sessions(
        &self,
        client: Option<&ClientId>,
    ) -> BoxFuture<Result<Vec<TrainingSession>, BackendError>> {
        self.with_read(|state| {
            let mut sessions = state
                .sessions
                .iter()
                .filter(|s| client.map_or(true, |id| &s.client_id == id))
                .cloned()
                .collect::<Vec<_>>();
            newest_first(&mut sessions);

            Ok(sessions)
        })
    }

    fn retrieve_session(
        &self,
        id: &Uuid,
    ) -> BoxFuture<Result<Option<TrainingSession>, BackendError>> {
        self.with_read(|state| Ok(state.sessions.iter().find(|s| &s.id == id).cloned()))
    }

    fn insert_session(&self, session: TrainingSession) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(move |state| {
            state.require_client(&session.client_id)?;
            state.sessions.push(session);

            Ok(())
        })
    }

    fn update_session(
        &self,
        id: &Uuid,
        update: SessionUpdate,
    ) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(move |state| {
            let session = state
                .sessions
                .iter_mut()
                .find(|s| &s.id == id)
                .ok_or(BackendError::NonExistentSession(*id))?;
            session.apply(update);

            Ok(())
        })
    }

    fn delete_session(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(|state| {
            let before = state.sessions.len();
            state.sessions.retain(|s| &s.id != id);

            if state.sessions.len() == before {
                Err(BackendError::NonExistentSession(*id))
            } else {
                Ok(())
            }
        })
    }

    fn retrieve_body_compositions(
        &self,
        client: &ClientId,
    ) -> BoxFuture<Result<Vec<BodyComposition>, BackendError>> {
        self.with_read(|state| {
            let mut snapshots = state
                .body_compositions
                .iter()
                .filter(|b| &b.client_id == client)
                .cloned()
                .collect::<Vec<_>>();
            snapshots.sort_by(|a, b| b.measured_on().cmp(&a.measured_on()));

            Ok(snapshots)
        })
    }

    fn insert_body_composition(
        &self,
        snapshot: BodyComposition,
    ) -> BoxFuture<Result<(), BackendError>> {
        self.with_write(move |state| {
            state.require_client(&snapshot.client_id)?;
            state.body_compositions.push(snapshot);

            Ok(())
        })
    }

    fn retrieve_nutrition(
        &self,
        client: &ClientId,
    ) -> BoxFuture<Result<Vec<NutritionEntry>, BackendError>> {
        self.with_read(|state| {
            let mut entries = state
                .nutrition
                .iter()
                .filter(|n| &n.client_id == client)
                .cloned()
                .collect::<Vec<_>>();
            entries.sort_by(|a, b| b.date.cmp(&a.date));

            Ok(entries)
        })
    }

    fn upsert_nutrition(&self, entry: NutritionEntry) -> BoxFuture<Result<Uuid, BackendError>> {
        self.with_write(move |state| {
            state.require_client(&entry.client_id)?;

            let existing = state.nutrition.iter_mut().find(|n| {
                n.client_id == entry.client_id && n.date == entry.date && n.meal == entry.meal
            });

            match existing {
                Some(existing) => {
                    existing.image_url = entry.image_url;
                    Ok(existing.id)
                }
                None => {
                    let id = entry.id;
                    state.nutrition.push(entry);
                    Ok(id)
                }
            }
        })
    }
}
